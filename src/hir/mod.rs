//! The typed tree (HIR) this crate consumes and desugars.
//!
//! The front end resolves names and types before anything here runs. Key
//! properties of the tree as received:
//!
//! 1. **Types are resolved** - every expression carries a `TypeId` into the
//!    session's type table, which also fixes its ownership regime
//! 2. **Names are resolved** - every reference is a `LocalId`, `FnId`, or
//!    `FieldId`; method calls already name their target function
//! 3. **Sugar is still present** - method calls, compound assignment,
//!    `for`, and string interpolation survive until [`desugar`] runs
//! 4. **Spans are preserved** - every node points back at source
//!
//! # Structure
//!
//! - [`Module`] - all functions of one compilation unit
//! - [`Function`] - id plus typed [`Body`]
//! - [`Body`] - local table and statement list
//! - [`Expr`] / [`Stmt`] - typed nodes
//!
//! # Pipeline position
//!
//! ```text
//! front end -> Module -> desugar -> CFG construction -> optimize -> verify
//! ```

pub mod def;
pub mod desugar;
pub mod expr;
pub mod ty;

pub use def::{
    FieldId, FloatTy, FnId, FnSig, FnTable, IntTy, LocalId, Regime, SymbolId, TypeId, UintTy,
};
pub use expr::{
    BinOp, Block, Body, Expr, ExprKind, InterpPart, LiteralValue, Local, Stmt, StmtKind, UnaryOp,
};
pub use ty::{FieldDef, TypeDef, TypeKind, TypeTable};

use crate::span::Span;

/// One function of a compilation unit.
#[derive(Debug, Clone)]
pub struct Function {
    /// The function's id; its signature lives in the session's table.
    pub id: FnId,
    /// The typed body.
    pub body: Body,
    /// The span of the whole declaration.
    pub span: Span,
}

/// A compilation unit in typed-tree form.
///
/// Functions are mutually independent from here on; nothing in this crate
/// reads one function's artifacts while processing another.
#[derive(Debug, Clone, Default)]
pub struct Module {
    /// All functions, in declaration order.
    pub functions: Vec<Function>,
}

impl Module {
    /// Create an empty module.
    pub fn new() -> Self {
        Self {
            functions: Vec::new(),
        }
    }

    /// Get a function by id, if it is declared in this module.
    pub fn get_function(&self, id: FnId) -> Option<&Function> {
        self.functions.iter().find(|f| f.id == id)
    }
}
