//! Core MIR type definitions.
//!
//! The MIR represents a function as an arena of basic blocks connected
//! only through terminator targets; there is no fall-through and no
//! pointer graph, so loop back-edges are plain indices and a whole body is
//! relocatable and serializable.
//!
//! # Relationship to the typed tree
//!
//! | Typed tree                 | MIR                                    |
//! |----------------------------|----------------------------------------|
//! | nested statements/exprs    | flat blocks of statements              |
//! | `if` / `while` / `&&`      | `Branch` terminators and join blocks   |
//! | method call (desugared)    | borrow statement + call statement      |
//! | implicit bounds/null rules | explicit `Check` statements            |
//! | `free(p)`                  | `Release` statement                    |
//!
//! # Structure
//!
//! ```text
//! MirBody
//! ├── locals: Vec<MirLocal>        (_0 return slot, params, temps)
//! └── basic_blocks: Vec<BasicBlockData>
//!     ├── statements: Vec<Statement>
//!     └── terminator: Terminator    (exactly one, always last)
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::hir::{FnId, LocalId, TypeId};
use crate::span::Span;

// ============================================================================
// Basic Blocks
// ============================================================================

/// Identifies a basic block within a function.
///
/// Block ids are dense indices into the body's block vector. They are only
/// meaningful within their own function.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BasicBlockId(pub u32);

impl BasicBlockId {
    /// The entry block of every function.
    pub const ENTRY: BasicBlockId = BasicBlockId(0);

    /// Create a block id from an index.
    pub const fn new(index: u32) -> Self {
        BasicBlockId(index)
    }

    /// The index of this block.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for BasicBlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

impl fmt::Display for BasicBlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// A basic block: straight-line statements followed by one terminator.
///
/// The terminator is `None` only while the builder is filling the block;
/// every finished body has one in every block, and the representation
/// makes a statement after the terminator impossible.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BasicBlockData {
    /// The statements, executed in order.
    pub statements: Vec<Statement>,
    /// The single exit.
    pub terminator: Option<Terminator>,
}

impl BasicBlockData {
    pub fn new() -> Self {
        Self {
            statements: Vec::new(),
            terminator: None,
        }
    }

    /// Whether this block already has its terminator.
    pub fn is_terminated(&self) -> bool {
        self.terminator.is_some()
    }

    /// The blocks this one can transfer to.
    pub fn successors(&self) -> Vec<BasicBlockId> {
        match &self.terminator {
            Some(term) => term.kind.successors(),
            None => Vec::new(),
        }
    }
}

// ============================================================================
// Statements
// ============================================================================

/// A statement within a basic block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    /// What the statement does.
    pub kind: StatementKind,
    /// Source span, for diagnostics.
    pub span: Span,
}

impl Statement {
    pub fn new(kind: StatementKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn nop(span: Span) -> Self {
        Self {
            kind: StatementKind::Nop,
            span,
        }
    }

    pub fn is_nop(&self) -> bool {
        matches!(self.kind, StatementKind::Nop)
    }
}

/// The kind of a statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StatementKind {
    /// Evaluate an rvalue into a place: `_1 = ...`
    Assign(Place, Rvalue),

    /// A runtime check. Yields no value; traps on failure.
    Check(CheckKind),

    /// Release a manually managed handle. The verifier rejects any operand
    /// whose regime is not `ManualHandle`.
    Release(Operand),

    /// No operation. Passes blank out statements with this and a later
    /// sweep removes them.
    Nop,
}

impl StatementKind {
    /// Whether removing this statement could change observable behavior.
    ///
    /// Calls and checks and releases are observable; a pure assignment is
    /// not, so dead-temporary elimination may drop it.
    pub fn has_effects(&self) -> bool {
        match self {
            StatementKind::Assign(_, rvalue) => rvalue.has_effects(),
            StatementKind::Check(_) => true,
            StatementKind::Release(_) => true,
            StatementKind::Nop => false,
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementKind::Assign(place, rvalue) => write!(f, "{} = {}", place, rvalue),
            StatementKind::Check(CheckKind::Null { handle }) => {
                write!(f, "check null({})", handle)
            }
            StatementKind::Check(CheckKind::Bounds { array, index }) => {
                write!(f, "check bounds({}[{}])", array, index)
            }
            StatementKind::Release(operand) => write!(f, "release({})", operand),
            StatementKind::Nop => write!(f, "nop"),
        }
    }
}

/// A runtime check inserted during CFG construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CheckKind {
    /// The handle must not be null. Inserted before synthesized derefs.
    Null { handle: Operand },
    /// The index must be in bounds for the array. Inserted before `Index`
    /// projections.
    Bounds { array: Place, index: Operand },
}

// ============================================================================
// Terminators
// ============================================================================

/// The single control transfer ending a basic block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Terminator {
    /// What kind of transfer.
    pub kind: TerminatorKind,
    /// Source span, for diagnostics.
    pub span: Span,
}

impl Terminator {
    pub fn new(kind: TerminatorKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// The kind of a terminator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TerminatorKind {
    /// Unconditional jump.
    Goto { target: BasicBlockId },

    /// Two-way conditional branch on a boolean operand.
    Branch {
        cond: Operand,
        then_block: BasicBlockId,
        else_block: BasicBlockId,
    },

    /// Multi-way branch on an integer discriminant. Reserved for future
    /// use; nothing in the current builder emits it.
    Switch {
        discr: Operand,
        targets: SwitchTargets,
    },

    /// Return from the function. The value is in `_0`.
    Return,

    /// Unrecoverable trap with a diagnostic reason.
    Trap { reason: TrapReason },
}

impl TerminatorKind {
    /// All blocks this terminator can transfer to.
    pub fn successors(&self) -> Vec<BasicBlockId> {
        match self {
            TerminatorKind::Goto { target } => vec![*target],
            TerminatorKind::Branch {
                then_block,
                else_block,
                ..
            } => vec![*then_block, *else_block],
            TerminatorKind::Switch { targets, .. } => targets.all_targets(),
            TerminatorKind::Return | TerminatorKind::Trap { .. } => Vec::new(),
        }
    }

    /// Whether control never proceeds to another block.
    pub fn is_diverging(&self) -> bool {
        matches!(self, TerminatorKind::Return | TerminatorKind::Trap { .. })
    }

    /// Rewrite every target through `f`. Used when passes renumber blocks.
    pub fn retarget(&mut self, mut f: impl FnMut(BasicBlockId) -> BasicBlockId) {
        match self {
            TerminatorKind::Goto { target } => *target = f(*target),
            TerminatorKind::Branch {
                then_block,
                else_block,
                ..
            } => {
                *then_block = f(*then_block);
                *else_block = f(*else_block);
            }
            TerminatorKind::Switch { targets, .. } => {
                for (_, target) in &mut targets.branches {
                    *target = f(*target);
                }
                targets.otherwise = f(targets.otherwise);
            }
            TerminatorKind::Return | TerminatorKind::Trap { .. } => {}
        }
    }
}

impl fmt::Display for TerminatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminatorKind::Goto { target } => write!(f, "goto -> {}", target),
            TerminatorKind::Branch {
                cond,
                then_block,
                else_block,
            } => write!(
                f,
                "branch({}) -> [true: {}, false: {}]",
                cond, then_block, else_block
            ),
            TerminatorKind::Switch { discr, targets } => {
                write!(f, "switch({}) -> [", discr)?;
                for (value, target) in &targets.branches {
                    write!(f, "{}: {}, ", value, target)?;
                }
                write!(f, "otherwise: {}]", targets.otherwise)
            }
            TerminatorKind::Return => write!(f, "return"),
            TerminatorKind::Trap { reason } => write!(f, "trap({})", reason),
        }
    }
}

/// Branch table for the reserved multi-way terminator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchTargets {
    /// Pairs of (discriminant value, target block).
    pub branches: Vec<(u128, BasicBlockId)>,
    /// Where to go when no value matches.
    pub otherwise: BasicBlockId,
}

impl SwitchTargets {
    pub fn new(branches: Vec<(u128, BasicBlockId)>, otherwise: BasicBlockId) -> Self {
        Self {
            branches,
            otherwise,
        }
    }

    /// All distinct targets, otherwise last.
    pub fn all_targets(&self) -> Vec<BasicBlockId> {
        let mut targets: Vec<BasicBlockId> = self.branches.iter().map(|(_, b)| *b).collect();
        targets.push(self.otherwise);
        targets
    }

    /// The target for a discriminant value.
    pub fn target_for_value(&self, value: u128) -> BasicBlockId {
        self.branches
            .iter()
            .find(|(v, _)| *v == value)
            .map(|(_, b)| *b)
            .unwrap_or(self.otherwise)
    }
}

/// Why a trap terminator fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrapReason {
    /// Code the builder proved unreachable (after `return`, `break`,
    /// `continue`).
    Unreachable,
    /// Integer division or remainder by zero.
    DivideByZero,
    /// Dereference of a null handle.
    NullDereference,
    /// Array index out of bounds.
    IndexOutOfBounds,
}

impl TrapReason {
    pub fn descr(&self) -> &'static str {
        match self {
            TrapReason::Unreachable => "unreachable code",
            TrapReason::DivideByZero => "division by zero",
            TrapReason::NullDereference => "null dereference",
            TrapReason::IndexOutOfBounds => "index out of bounds",
        }
    }
}

impl fmt::Display for TrapReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.descr())
    }
}

// ============================================================================
// Places
// ============================================================================

/// An addressable location: a base local plus projections.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Place {
    /// The base local.
    pub local: LocalId,
    /// Projections applied left to right.
    pub projection: Vec<PlaceElem>,
}

impl Place {
    /// A place that is just a local.
    pub fn local(local: LocalId) -> Self {
        Self {
            local,
            projection: Vec::new(),
        }
    }

    /// The return place `_0`.
    pub fn return_place() -> Self {
        Self::local(LocalId::RETURN_PLACE)
    }

    /// Extend with another projection element.
    pub fn project(mut self, elem: PlaceElem) -> Self {
        self.projection.push(elem);
        self
    }

    /// Project a struct field.
    pub fn field(self, index: u32) -> Self {
        self.project(PlaceElem::Field(index))
    }

    /// Dereference a handle or borrow.
    pub fn deref(self) -> Self {
        self.project(PlaceElem::Deref)
    }

    /// Index with the value of another local.
    pub fn index(self, index: LocalId) -> Self {
        self.project(PlaceElem::Index(index))
    }

    /// If this place is a bare local, return it.
    pub fn as_local(&self) -> Option<LocalId> {
        if self.projection.is_empty() {
            Some(self.local)
        } else {
            None
        }
    }
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for elem in self.projection.iter().rev() {
            if matches!(elem, PlaceElem::Deref) {
                write!(f, "*")?;
            }
        }
        write!(f, "{}", self.local)?;
        for elem in &self.projection {
            match elem {
                PlaceElem::Deref => {}
                PlaceElem::Field(index) => write!(f, ".{}", index)?,
                PlaceElem::Index(local) => write!(f, "[{}]", local)?,
            }
        }
        Ok(())
    }
}

/// One projection step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaceElem {
    /// Select a struct field by declaration index.
    Field(u32),
    /// Follow a handle or borrow to its pointee.
    Deref,
    /// Index an array with the value of a local.
    Index(LocalId),
}

// ============================================================================
// Operands and Rvalues
// ============================================================================

/// A value-producing input to an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    /// Read a place, duplicating under its regime's rules.
    Copy(Place),
    /// Read a place, transferring ownership; the source is conceptually
    /// invalid afterwards. Used for manual-handle transfers.
    Move(Place),
    /// A literal constant.
    Constant(Constant),
}

impl Operand {
    /// The place this operand reads, if any.
    pub fn place(&self) -> Option<&Place> {
        match self {
            Operand::Copy(place) | Operand::Move(place) => Some(place),
            Operand::Constant(_) => None,
        }
    }

    /// The constant this operand carries, if any.
    pub fn constant(&self) -> Option<&Constant> {
        match self {
            Operand::Constant(constant) => Some(constant),
            _ => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Copy(place) => write!(f, "copy {}", place),
            Operand::Move(place) => write!(f, "move {}", place),
            Operand::Constant(constant) => write!(f, "{}", constant),
        }
    }
}

/// A value-producing computation, the right side of an assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Rvalue {
    /// Direct use of an operand.
    Use(Operand),

    /// Unary operator application.
    UnaryOp { op: UnOp, operand: Operand },

    /// Binary operator application. Never a short-circuit operator; those
    /// become branches during CFG construction.
    BinaryOp {
        op: BinOp,
        left: Operand,
        right: Operand,
    },

    /// Call the function with the given arguments.
    Call { func: FnId, args: Vec<Operand> },

    /// Construct a struct from field operands in declaration order. The
    /// destination's type decides the struct and its regime.
    Aggregate { operands: Vec<Operand> },

    /// Borrow a place. The destination is always a `Borrow`-regime
    /// temporary consumed by the immediately following call.
    Ref { place: Place },
}

impl Rvalue {
    /// Whether evaluating this rvalue can have observable effects besides
    /// producing the value.
    pub fn has_effects(&self) -> bool {
        matches!(self, Rvalue::Call { .. })
    }
}

impl fmt::Display for Rvalue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rvalue::Use(operand) => write!(f, "{}", operand),
            Rvalue::UnaryOp { op, operand } => write!(f, "{:?}({})", op, operand),
            Rvalue::BinaryOp { op, left, right } => {
                write!(f, "{:?}({}, {})", op, left, right)
            }
            Rvalue::Call { func, args } => {
                write!(f, "call {}(", func)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Rvalue::Aggregate { operands } => {
                write!(f, "struct(")?;
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", operand)?;
                }
                write!(f, ")")
            }
            Rvalue::Ref { place } => write!(f, "&{}", place),
        }
    }
}

/// Binary operators at the MIR level.
///
/// Logical `&&`/`||` have no MIR operator; they are lowered to branch
/// shapes before this level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
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
    /// Whether this operator yields bool regardless of operand type.
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }
}

/// Unary operators at the MIR level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnOp {
    /// Arithmetic negation.
    Neg,
    /// Logical/bitwise not.
    Not,
}

// ============================================================================
// Constants
// ============================================================================

/// A literal constant with its type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constant {
    /// The constant's type (and through it, regime; always `Value`).
    pub ty: TypeId,
    /// The value.
    pub kind: ConstantKind,
}

impl Constant {
    pub fn new(ty: TypeId, kind: ConstantKind) -> Self {
        Self { ty, kind }
    }

    /// An integer constant.
    pub fn int(ty: TypeId, value: i128) -> Self {
        Self::new(ty, ConstantKind::Int(value))
    }

    /// A boolean constant.
    pub fn bool(ty: TypeId, value: bool) -> Self {
        Self::new(ty, ConstantKind::Bool(value))
    }

    /// The unit constant.
    pub fn unit(ty: TypeId) -> Self {
        Self::new(ty, ConstantKind::Unit)
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "const {}", self.kind)
    }
}

/// The value of a constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstantKind {
    /// Signed integer.
    Int(i128),
    /// Unsigned integer.
    Uint(u128),
    /// IEEE float.
    Float(f64),
    /// Boolean.
    Bool(bool),
    /// String.
    Str(String),
    /// Unit.
    Unit,
}

impl ConstantKind {
    /// The boolean value, if this is a bool constant.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConstantKind::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for ConstantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantKind::Int(value) => write!(f, "{}", value),
            ConstantKind::Uint(value) => write!(f, "{}", value),
            ConstantKind::Float(value) => write!(f, "{}", value),
            ConstantKind::Bool(value) => write!(f, "{}", value),
            ConstantKind::Str(value) => write!(f, "{:?}", value),
            ConstantKind::Unit => write!(f, "()"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_successors() {
        let kind = TerminatorKind::Branch {
            cond: Operand::Constant(Constant::bool(TypeId::new(0), true)),
            then_block: BasicBlockId::new(1),
            else_block: BasicBlockId::new(2),
        };
        assert_eq!(
            kind.successors(),
            vec![BasicBlockId::new(1), BasicBlockId::new(2)]
        );
        assert!(!kind.is_diverging());
    }

    #[test]
    fn test_switch_targets() {
        let targets = SwitchTargets::new(
            vec![(0, BasicBlockId::new(1)), (1, BasicBlockId::new(2))],
            BasicBlockId::new(3),
        );
        assert_eq!(targets.target_for_value(0), BasicBlockId::new(1));
        assert_eq!(targets.target_for_value(1), BasicBlockId::new(2));
        assert_eq!(targets.target_for_value(7), BasicBlockId::new(3));
        assert_eq!(targets.all_targets().len(), 3);
    }

    #[test]
    fn test_terminator_is_diverging() {
        assert!(TerminatorKind::Return.is_diverging());
        assert!(TerminatorKind::Trap {
            reason: TrapReason::Unreachable
        }
        .is_diverging());
        assert!(!TerminatorKind::Goto {
            target: BasicBlockId::ENTRY
        }
        .is_diverging());
    }

    #[test]
    fn test_retarget_rewrites_all_targets() {
        let mut kind = TerminatorKind::Branch {
            cond: Operand::Constant(Constant::bool(TypeId::new(0), true)),
            then_block: BasicBlockId::new(1),
            else_block: BasicBlockId::new(2),
        };
        kind.retarget(|b| BasicBlockId::new(b.0 + 10));
        assert_eq!(
            kind.successors(),
            vec![BasicBlockId::new(11), BasicBlockId::new(12)]
        );
    }

    #[test]
    fn test_place_display() {
        let place = Place::local(LocalId::new(1)).field(0);
        assert_eq!(place.to_string(), "_1.0");

        let derefed = Place::local(LocalId::new(2)).deref().field(1);
        assert_eq!(derefed.to_string(), "*_2.1");

        let indexed = Place::local(LocalId::new(3)).index(LocalId::new(4));
        assert_eq!(indexed.to_string(), "_3[_4]");
    }

    #[test]
    fn test_place_as_local() {
        assert_eq!(
            Place::local(LocalId::new(5)).as_local(),
            Some(LocalId::new(5))
        );
        assert_eq!(Place::local(LocalId::new(5)).field(0).as_local(), None);
    }

    #[test]
    fn test_rvalue_effects() {
        let call = Rvalue::Call {
            func: FnId::new(0),
            args: Vec::new(),
        };
        assert!(call.has_effects());
        let pure = Rvalue::Use(Operand::Constant(Constant::int(TypeId::new(0), 1)));
        assert!(!pure.has_effects());
    }

    #[test]
    fn test_statement_effects() {
        let release = StatementKind::Release(Operand::Copy(Place::local(LocalId::new(1))));
        assert!(release.has_effects());
        assert!(!StatementKind::Nop.has_effects());
    }
}
