//! The typed tree this crate consumes.
//!
//! The front end's type checker produces one [`Body`] per function: a local
//! table and a statement list in which every expression carries a resolved
//! [`TypeId`] and every reference a resolved id. The tree still contains
//! surface sugar (method calls, compound assignment, `for`, string
//! interpolation); desugaring rewrites those in place before CFG
//! construction, so a desugared tree uses only the primitive forms.
//!
//! Two node kinds never come from the parser:
//! - [`ExprKind::Borrow`] is synthesized by desugaring for method-call
//!   receivers.
//! - [`ExprKind::Deref`] is inserted by the type checker wherever a handle
//!   is used where its pointee is required, so field access and indexing
//!   always see a value-typed base here.

use serde::{Deserialize, Serialize};

use crate::span::{Span, Spanned};
use super::def::{FieldId, FnId, LocalId, SymbolId, TypeId};

/// A function body as produced by the type checker.
///
/// Local slot 0 is the return place, slots 1..=param_count the parameters
/// in declaration order, later slots the declared variables.
#[derive(Debug, Clone)]
pub struct Body {
    /// The return slot, parameters, and declared variables.
    pub locals: Vec<Local>,
    /// The number of parameters (locals 1..=param_count).
    pub param_count: usize,
    /// The statements of the body, in source order.
    pub stmts: Vec<Stmt>,
    /// The span of the whole body.
    pub span: Span,
}

impl Body {
    /// Get the return type (type of local 0).
    pub fn return_type(&self) -> TypeId {
        self.locals[0].ty
    }

    /// Iterate over parameters.
    pub fn params(&self) -> impl Iterator<Item = &Local> {
        self.locals.iter().skip(1).take(self.param_count)
    }

    /// Get a local by ID.
    pub fn get_local(&self, id: LocalId) -> Option<&Local> {
        self.locals.get(id.index as usize)
    }
}

/// A local variable (return slot, parameter, or declared variable).
#[derive(Debug, Clone)]
pub struct Local {
    /// The local ID.
    pub id: LocalId,
    /// The type of this local.
    pub ty: TypeId,
    /// Whether this local is mutable.
    pub mutable: bool,
    /// The name of this local (None for the return slot).
    pub name: Option<SymbolId>,
    /// The span where this local was declared.
    pub span: Span,
}

/// A typed expression.
#[derive(Debug, Clone)]
pub struct Expr {
    /// The expression kind.
    pub kind: ExprKind,
    /// The type of this expression.
    pub ty: TypeId,
    /// The source span.
    pub span: Span,
}

impl Expr {
    /// Create a new expression.
    pub fn new(kind: ExprKind, ty: TypeId, span: Span) -> Self {
        Self { kind, ty, span }
    }

    /// Check if this is an error expression.
    pub fn is_error(&self) -> bool {
        matches!(self.kind, ExprKind::Error)
    }

    /// Whether this expression is surface sugar that desugaring removes.
    pub fn is_sugar(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::MethodCall { .. } | ExprKind::StringInterp { .. }
        )
    }
}

/// The kind of an expression.
#[derive(Debug, Clone)]
pub enum ExprKind {
    /// A literal value.
    Literal(LiteralValue),

    /// A local variable reference.
    Local(LocalId),

    /// Binary operation: `a + b`, including short-circuit `&&` / `||`.
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Unary operation: `-x`, `!x`
    Unary { op: UnaryOp, operand: Box<Expr> },

    /// Direct function call: `f(x, y)`. Resolution happened upstream.
    Call { func: FnId, args: Vec<Expr> },

    /// Method call sugar: `x.m(y)`. The method is already resolved; only
    /// the receiver rewrite is left for desugaring.
    MethodCall {
        receiver: Box<Expr>,
        method: FnId,
        args: Vec<Expr>,
    },

    /// Field access: `x.field`. The base is always value-typed.
    Field { base: Box<Expr>, field: FieldId },

    /// Array indexing: `x[i]`. The base is always value-typed.
    Index { base: Box<Expr>, index: Box<Expr> },

    /// Struct construction with fields in declaration order. The struct
    /// type is this expression's type.
    StructLiteral { fields: Vec<Expr> },

    /// String interpolation sugar: `"a{x}b"`.
    StringInterp { parts: Vec<InterpPart> },

    /// A non-escaping borrow of a place. Synthesized by desugaring for
    /// method receivers; never written by users.
    Borrow { place: Box<Expr> },

    /// Dereference of a handle or borrow: `*p`. Inserted by the type
    /// checker wherever the pointee is required.
    Deref { handle: Box<Expr> },

    /// Error placeholder (front-end recovery). Reaching this crate is a
    /// defect.
    Error,
}

/// One piece of an interpolated string.
#[derive(Debug, Clone)]
pub enum InterpPart {
    /// A literal chunk, with the span of that chunk.
    Lit(Spanned<String>),
    /// An interpolated expression.
    Expr(Expr),
}

/// A literal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LiteralValue {
    /// Integer literal.
    Int(i128),
    /// Unsigned integer literal.
    Uint(u128),
    /// Floating-point literal.
    Float(f64),
    /// Boolean literal.
    Bool(bool),
    /// String literal.
    Str(String),
    /// The unit value.
    Unit,
}

/// A statement.
#[derive(Debug, Clone)]
pub struct Stmt {
    /// The statement kind.
    pub kind: StmtKind,
    /// The source span.
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// The kind of a statement.
#[derive(Debug, Clone)]
pub enum StmtKind {
    /// Variable declaration: `let x = e;`
    Let { local: LocalId, init: Option<Expr> },

    /// Assignment to a place: `x.f = e;`
    Assign { target: Expr, value: Expr },

    /// Compound assignment sugar: `x += e;`
    CompoundAssign {
        op: BinOp,
        target: Expr,
        value: Expr,
    },

    /// Expression evaluated for effect: `f(x);`
    Expr(Expr),

    /// Conditional: `if cond { .. } else { .. }`
    If {
        cond: Expr,
        then_branch: Block,
        else_branch: Option<Block>,
    },

    /// Loop: `while cond { .. }`
    While { cond: Expr, body: Block },

    /// Range loop sugar: `for i in a..b { .. }`. The binding local is
    /// declared in the body's local table like any other variable.
    For {
        var: LocalId,
        start: Expr,
        end: Expr,
        body: Block,
    },

    /// Exit the innermost loop.
    Break,

    /// Jump to the innermost loop's next iteration.
    Continue,

    /// Return from the function: `return e;`
    Return { value: Option<Expr> },

    /// Release a manual handle: `free(p);`
    Free { handle: Expr },

    /// A nested scope.
    Block(Block),
}

/// A braced statement sequence.
#[derive(Debug, Clone)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

impl Block {
    pub fn new(stmts: Vec<Stmt>, span: Span) -> Self {
        Self { stmts, span }
    }

    pub fn empty(span: Span) -> Self {
        Self {
            stmts: Vec::new(),
            span,
        }
    }
}

/// Binary operators of the surface language.
///
/// `And` and `Or` are short-circuiting and never reach MIR as operator
/// applications; CFG construction turns them into branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinOp {
    /// Whether this operator short-circuits.
    pub fn is_lazy(&self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }

    /// Whether this operator yields bool regardless of operand type.
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }
}

/// Unary operators of the surface language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Arithmetic negation: `-x`
    Neg,
    /// Logical/bitwise not: `!x`
    Not,
}
