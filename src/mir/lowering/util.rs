//! Shared helpers for CFG construction.

use crate::hir::{self, LiteralValue, TypeId};
use crate::mir::types::{BinOp, Constant, ConstantKind, UnOp};

// ============================================================================
// Operator Conversion
// ============================================================================

/// Convert a surface binary op to a MIR binary op.
///
/// The short-circuit operators have no MIR counterpart; callers dispatch
/// on [`hir::BinOp::is_lazy`] before reaching here.
pub fn convert_binop(op: hir::BinOp) -> BinOp {
    match op {
        hir::BinOp::Add => BinOp::Add,
        hir::BinOp::Sub => BinOp::Sub,
        hir::BinOp::Mul => BinOp::Mul,
        hir::BinOp::Div => BinOp::Div,
        hir::BinOp::Rem => BinOp::Rem,
        hir::BinOp::BitAnd => BinOp::BitAnd,
        hir::BinOp::BitOr => BinOp::BitOr,
        hir::BinOp::BitXor => BinOp::BitXor,
        hir::BinOp::Shl => BinOp::Shl,
        hir::BinOp::Shr => BinOp::Shr,
        hir::BinOp::Eq => BinOp::Eq,
        hir::BinOp::Ne => BinOp::Ne,
        hir::BinOp::Lt => BinOp::Lt,
        hir::BinOp::Le => BinOp::Le,
        hir::BinOp::Gt => BinOp::Gt,
        hir::BinOp::Ge => BinOp::Ge,
        hir::BinOp::And | hir::BinOp::Or => {
            panic!("ICE: short-circuit operators must use branch lowering, not convert_binop")
        }
    }
}

/// Convert a surface unary op to a MIR unary op.
pub fn convert_unop(op: hir::UnaryOp) -> UnOp {
    match op {
        hir::UnaryOp::Neg => UnOp::Neg,
        hir::UnaryOp::Not => UnOp::Not,
    }
}

// ============================================================================
// Literal Conversion
// ============================================================================

/// Convert a typed-tree literal into a MIR constant.
pub fn lower_literal_to_constant(lit: &LiteralValue, ty: TypeId) -> Constant {
    let kind = match lit {
        LiteralValue::Int(v) => ConstantKind::Int(*v),
        LiteralValue::Uint(v) => ConstantKind::Uint(*v),
        LiteralValue::Float(v) => ConstantKind::Float(*v),
        LiteralValue::Bool(v) => ConstantKind::Bool(*v),
        LiteralValue::Str(v) => ConstantKind::Str(v.clone()),
        LiteralValue::Unit => ConstantKind::Unit,
    };
    Constant::new(ty, kind)
}
