//! Block-local constant folding and copy propagation.
//!
//! A forward scan through each block tracks two facts about bare locals:
//! the constant last assigned to them, and the local they are a plain copy
//! of. `Copy` operands are rewritten through both maps, and operators
//! whose inputs are all constant fold to their result at the source
//! language's semantics: integers wrap at their declared width, floats
//! follow IEEE, comparisons yield bool.
//!
//! `Move` operands are never rewritten; a move transfers ownership and the
//! borrow discipline depends on the moved temp staying in place. Folding
//! never introduces a trap either: division by a constant zero and
//! oversized shifts are left for the runtime.
//!
//! The maps die at block boundaries. Calls can write through borrow
//! arguments, so a call clears everything.

use std::collections::HashMap;

use crate::diagnostics::LimitError;
use crate::hir::{LocalId, TypeId, TypeKind, TypeTable};
use crate::session::Limits;

use super::super::body::MirBody;
use super::super::types::{
    BinOp, Constant, ConstantKind, Operand, Rvalue, StatementKind, TerminatorKind, UnOp,
};
use super::Pass;

/// The constant folding pass.
pub struct ConstFold<'a> {
    types: &'a TypeTable,
}

impl<'a> ConstFold<'a> {
    pub fn new(types: &'a TypeTable) -> Self {
        Self { types }
    }
}

impl Pass for ConstFold<'_> {
    fn name(&self) -> &'static str {
        "const-fold"
    }

    fn run(&mut self, body: &mut MirBody, _limits: &Limits) -> Result<bool, LimitError> {
        let mut changed = false;
        let local_types: Vec<TypeId> = body.locals.iter().map(|l| l.ty).collect();

        for block in &mut body.basic_blocks {
            let mut known: HashMap<LocalId, Constant> = HashMap::new();
            let mut copies: HashMap<LocalId, LocalId> = HashMap::new();

            for stmt in &mut block.statements {
                match &mut stmt.kind {
                    StatementKind::Assign(place, rvalue) => {
                        changed |= substitute_rvalue(rvalue, &known, &copies);

                        let dest = place.as_local();
                        if let Some(dest) = dest {
                            let dest_ty = local_types[dest.index as usize];
                            if let Some(folded) = fold_rvalue(rvalue, dest_ty, self.types) {
                                *rvalue = Rvalue::Use(Operand::Constant(folded));
                                changed = true;
                            }
                        }

                        if matches!(rvalue, Rvalue::Call { .. }) {
                            // The callee may write through borrow args.
                            known.clear();
                            copies.clear();
                            continue;
                        }

                        match dest {
                            Some(dest) => {
                                kill(dest, &mut known, &mut copies);
                                match rvalue {
                                    Rvalue::Use(Operand::Constant(constant)) => {
                                        known.insert(dest, constant.clone());
                                    }
                                    Rvalue::Use(Operand::Copy(src)) => {
                                        if let Some(src) = src.as_local() {
                                            if src != dest {
                                                copies.insert(dest, src);
                                            }
                                        }
                                    }
                                    _ => {}
                                }
                            }
                            // A projected store changes part of the base.
                            None => kill(place.local, &mut known, &mut copies),
                        }
                    }
                    StatementKind::Release(operand) => {
                        if let Some(place) = operand.place() {
                            if let Some(local) = place.as_local() {
                                kill(local, &mut known, &mut copies);
                            }
                        }
                    }
                    StatementKind::Check(_) | StatementKind::Nop => {}
                }
            }

            if let Some(term) = &mut block.terminator {
                if let TerminatorKind::Branch {
                    cond,
                    then_block,
                    else_block,
                } = &mut term.kind
                {
                    changed |= substitute_operand(cond, &known, &copies);
                    if let Some(taken) = cond.constant().and_then(|c| c.kind.as_bool()) {
                        let target = if taken { *then_block } else { *else_block };
                        term.kind = TerminatorKind::Goto { target };
                        changed = true;
                    }
                }
            }
        }
        Ok(changed)
    }
}

/// Forget everything recorded about a local after it is written or moved
/// out of.
fn kill(local: LocalId, known: &mut HashMap<LocalId, Constant>, copies: &mut HashMap<LocalId, LocalId>) {
    known.remove(&local);
    copies.remove(&local);
    copies.retain(|_, src| *src != local);
}

fn substitute_rvalue(
    rvalue: &mut Rvalue,
    known: &HashMap<LocalId, Constant>,
    copies: &HashMap<LocalId, LocalId>,
) -> bool {
    match rvalue {
        Rvalue::Use(operand) | Rvalue::UnaryOp { operand, .. } => {
            substitute_operand(operand, known, copies)
        }
        Rvalue::BinaryOp { left, right, .. } => {
            let l = substitute_operand(left, known, copies);
            let r = substitute_operand(right, known, copies);
            l | r
        }
        Rvalue::Call { args, .. } => {
            let mut changed = false;
            for arg in args {
                changed |= substitute_operand(arg, known, copies);
            }
            changed
        }
        Rvalue::Aggregate { operands } => {
            let mut changed = false;
            for operand in operands {
                changed |= substitute_operand(operand, known, copies);
            }
            changed
        }
        // The borrowed place must stay as written.
        Rvalue::Ref { .. } => false,
    }
}

/// Rewrite a `Copy` of a bare local through the copy and constant maps.
fn substitute_operand(
    operand: &mut Operand,
    known: &HashMap<LocalId, Constant>,
    copies: &HashMap<LocalId, LocalId>,
) -> bool {
    let Operand::Copy(place) = operand else {
        return false;
    };
    if !place.projection.is_empty() {
        return false;
    }
    let mut changed = false;
    if let Some(&src) = copies.get(&place.local) {
        place.local = src;
        changed = true;
    }
    if let Some(constant) = known.get(&place.local) {
        *operand = Operand::Constant(constant.clone());
        return true;
    }
    changed
}

/// Fold an all-constant operator application, if the semantics allow.
fn fold_rvalue(rvalue: &Rvalue, dest_ty: TypeId, types: &TypeTable) -> Option<Constant> {
    match rvalue {
        Rvalue::BinaryOp { op, left, right } => {
            let left = left.constant()?;
            let right = right.constant()?;
            let kind = eval_binop(*op, &left.kind, &right.kind, left.ty, types)?;
            Some(Constant::new(dest_ty, kind))
        }
        Rvalue::UnaryOp { op, operand } => {
            let operand = operand.constant()?;
            let kind = eval_unop(*op, &operand.kind, operand.ty, types)?;
            Some(Constant::new(dest_ty, kind))
        }
        _ => None,
    }
}

/// Bit width of an integer type, if `ty` is one.
fn int_width(types: &TypeTable, ty: TypeId) -> Option<u32> {
    match types.kind(ty)? {
        TypeKind::Int(int) => Some(int.bit_width()),
        TypeKind::Uint(uint) => Some(uint.bit_width()),
        _ => None,
    }
}

/// Truncate a signed value to `bits`, sign-extending back to i128.
fn truncate_int(value: i128, bits: u32) -> i128 {
    if bits >= 128 {
        return value;
    }
    let shift = 128 - bits;
    (value << shift) >> shift
}

/// Truncate an unsigned value to `bits`.
fn truncate_uint(value: u128, bits: u32) -> u128 {
    if bits >= 128 {
        return value;
    }
    value & ((1u128 << bits) - 1)
}

fn eval_binop(
    op: BinOp,
    left: &ConstantKind,
    right: &ConstantKind,
    operand_ty: TypeId,
    types: &TypeTable,
) -> Option<ConstantKind> {
    use ConstantKind::*;

    if op.is_comparison() {
        let result = match (left, right) {
            (Int(l), Int(r)) => compare(op, l.partial_cmp(r)?),
            (Uint(l), Uint(r)) => compare(op, l.partial_cmp(r)?),
            (Float(l), Float(r)) => match l.partial_cmp(r) {
                Some(ordering) => compare(op, ordering),
                // NaN compares false except under `!=`.
                None => matches!(op, BinOp::Ne),
            },
            (Bool(l), Bool(r)) => match op {
                BinOp::Eq => l == r,
                BinOp::Ne => l != r,
                _ => return None,
            },
            (Str(l), Str(r)) => match op {
                BinOp::Eq => l == r,
                BinOp::Ne => l != r,
                _ => return None,
            },
            _ => return None,
        };
        return Some(Bool(result));
    }

    match (left, right) {
        (Int(l), Int(r)) => {
            let bits = int_width(types, operand_ty)?;
            let value = match op {
                BinOp::Add => l.wrapping_add(*r),
                BinOp::Sub => l.wrapping_sub(*r),
                BinOp::Mul => l.wrapping_mul(*r),
                // Leave a constant zero divisor for the runtime trap.
                BinOp::Div if *r != 0 => l.wrapping_div(*r),
                BinOp::Rem if *r != 0 => l.wrapping_rem(*r),
                BinOp::BitAnd => l & r,
                BinOp::BitOr => l | r,
                BinOp::BitXor => l ^ r,
                BinOp::Shl if (*r as u128) < bits as u128 => l << r,
                BinOp::Shr if (*r as u128) < bits as u128 => l >> r,
                _ => return None,
            };
            Some(Int(truncate_int(value, bits)))
        }
        (Uint(l), Uint(r)) => {
            let bits = int_width(types, operand_ty)?;
            let value = match op {
                BinOp::Add => l.wrapping_add(*r),
                BinOp::Sub => l.wrapping_sub(*r),
                BinOp::Mul => l.wrapping_mul(*r),
                BinOp::Div if *r != 0 => l / r,
                BinOp::Rem if *r != 0 => l % r,
                BinOp::BitAnd => l & r,
                BinOp::BitOr => l | r,
                BinOp::BitXor => l ^ r,
                BinOp::Shl if *r < bits as u128 => l << r,
                BinOp::Shr if *r < bits as u128 => l >> r,
                _ => return None,
            };
            Some(Uint(truncate_uint(value, bits)))
        }
        (Float(l), Float(r)) => {
            let value = match op {
                BinOp::Add => l + r,
                BinOp::Sub => l - r,
                BinOp::Mul => l * r,
                BinOp::Div => l / r,
                BinOp::Rem => l % r,
                _ => return None,
            };
            Some(Float(value))
        }
        (Bool(l), Bool(r)) => {
            let value = match op {
                BinOp::BitAnd => l & r,
                BinOp::BitOr => l | r,
                BinOp::BitXor => l ^ r,
                _ => return None,
            };
            Some(Bool(value))
        }
        _ => None,
    }
}

fn compare(op: BinOp, ordering: std::cmp::Ordering) -> bool {
    match op {
        BinOp::Eq => ordering.is_eq(),
        BinOp::Ne => ordering.is_ne(),
        BinOp::Lt => ordering.is_lt(),
        BinOp::Le => ordering.is_le(),
        BinOp::Gt => ordering.is_gt(),
        BinOp::Ge => ordering.is_ge(),
        _ => false,
    }
}

fn eval_unop(
    op: UnOp,
    operand: &ConstantKind,
    operand_ty: TypeId,
    types: &TypeTable,
) -> Option<ConstantKind> {
    use ConstantKind::*;
    match (op, operand) {
        (UnOp::Neg, Int(v)) => {
            let bits = int_width(types, operand_ty)?;
            Some(Int(truncate_int(v.wrapping_neg(), bits)))
        }
        (UnOp::Neg, Float(v)) => Some(Float(-v)),
        (UnOp::Not, Bool(v)) => Some(Bool(!v)),
        (UnOp::Not, Int(v)) => {
            let bits = int_width(types, operand_ty)?;
            Some(Int(truncate_int(!v, bits)))
        }
        (UnOp::Not, Uint(v)) => {
            let bits = int_width(types, operand_ty)?;
            Some(Uint(truncate_uint(!v, bits)))
        }
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================
