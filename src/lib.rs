//! # Marrow MIR
//!
//! The middle end of the Marrow compiler: construction and optimization of
//! the mid-level intermediate representation for a statically typed,
//! struct-only language with explicit ownership regimes.
//!
//! Every value lives under one of four regimes:
//!
//! 1. **Value** - plain data, copied freely
//! 2. **GcHandle** - collector-traced heap handle
//! 3. **ManualHandle** - heap handle released by an explicit `free`
//! 4. **Borrow** - a non-escaping reference that exists only to feed a call
//!
//! ## Pipeline
//!
//! ```text
//! typed HIR -> desugar -> MIR construction -> optimize -> verify -> backend
//! ```
//!
//! The front end hands this crate a fully resolved typed tree plus a frozen
//! [`Session`] snapshot (type table, signature table, symbols). The middle
//! end desugars residual conveniences, lowers each function to an explicit
//! control-flow graph, canonicalizes and shrinks it, and verifies the
//! structural and ownership invariants a backend relies on.
//!
//! ## Quick Start
//!
//! ```no_run
//! use marrow_mir::{compile_module, Session};
//! # fn frontend() -> (Session, marrow_mir::hir::Module) { unimplemented!() }
//!
//! let (session, mut module) = frontend();
//! match compile_module(&session, &mut module) {
//!     Ok(bodies) => println!("lowered {} functions", bodies.len()),
//!     Err(errors) => {
//!         for error in &errors {
//!             eprintln!("{}", error.message);
//!         }
//!     }
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`hir`] - the typed tree as received, and its desugarer
//! - [`mir`] - CFG types, lowering, the optimization pipeline, the verifier
//! - [`session`] - the frozen compilation snapshot and resource limits
//! - [`diagnostics`] - structured reports with stable error codes
//! - [`span`] - source positions carried through every stage

pub mod diagnostics;
pub mod hir;
pub mod mir;
pub mod session;
pub mod span;

pub use diagnostics::{Diagnostic, DiagnosticEmitter, DiagnosticKind, ErrorCode};
pub use hir::desugar::desugar_module;
pub use mir::{
    optimize_module, validate_module, MirBody, MirLowering, ValidationResults,
};
pub use session::{BuiltinFns, Limits, Session, Strictness};
pub use span::Span;

use std::collections::HashMap;

use hir::{FnId, Module};

/// Run the whole middle end over one module.
///
/// Desugars in place, lowers every function, optimizes, and verifies. Each
/// stage processes all functions before the pipeline decides whether to
/// continue, so one run reports every failure the module has at that
/// stage. Verifier warnings land in the session's diagnostic sink.
pub fn compile_module(
    session: &Session,
    module: &mut Module,
) -> Result<HashMap<FnId, MirBody>, Vec<Diagnostic>> {
    desugar_module(session, module)?;

    let mut bodies = MirLowering::new(session).lower_module(module)?;
    optimize_module(session, &mut bodies)?;

    let results = validate_module(session, &bodies);
    let is_valid = results.is_valid();
    session.report_all(results.warnings);
    if is_valid {
        Ok(bodies)
    } else {
        Err(results.errors)
    }
}
