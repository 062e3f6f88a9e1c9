//! The mid-level intermediate representation.
//!
//! MIR is an explicit control-flow graph over flattened statements: no
//! nesting, no fall-through, every block ends in exactly one terminator.
//! Expression sugar is gone by the time a body exists; borrows are pinned
//! to two-statement windows, handle derefs carry explicit null checks, and
//! array accesses carry explicit bounds checks.
//!
//! The stages, in pipeline order:
//!
//! - [`lowering`] builds a body per function from checked HIR
//! - [`opt`] canonicalizes and shrinks the bodies
//! - [`validate`] rejects anything a backend could not trust
//! - [`pretty`] renders deterministic textual dumps

pub mod body;
pub mod lowering;
pub mod opt;
pub mod pretty;
pub mod types;
pub mod validate;
pub mod visitor;

pub use body::{LocalKind, MirBody, MirBodyBuilder, MirLocal};
pub use lowering::MirLowering;
pub use opt::{optimize_body, optimize_module, Pass, PassManager};
pub use pretty::dump_body;
pub use types::{
    BasicBlockData, BasicBlockId, CheckKind, Constant, ConstantKind, Operand, Place, PlaceElem,
    Rvalue, Statement, StatementKind, Terminator, TerminatorKind, TrapReason,
};
pub use validate::{validate_body, validate_module, ValidationResults};
pub use visitor::{walk_body, Location, PlaceContext, Visitor};
