//! The MIR optimization pipeline.
//!
//! Three passes run over every body:
//!
//! 1. [`CleanupCfg`] - canonicalizes the control-flow graph: constant and
//!    degenerate branches become gotos, empty forwarding blocks are
//!    threaded away, straight-line chains merge, unreachable blocks drop.
//! 2. [`DeadTempElim`] - removes locals that are never read and the pure
//!    assignments that fed them, then renumbers the local table densely.
//! 3. [`ConstFold`] - block-local constant and copy propagation with
//!    operator folding at the source language's wrapping semantics.
//!
//! Constant folding can expose new cleanup and elimination work (a folded
//! branch strands a block, a threaded block strands a temp), so the driver
//! re-runs the first two passes until nothing changes. Every pass is
//! semantics-preserving and the whole pipeline is idempotent: running it
//! on its own output changes nothing.

pub mod cleanup;
pub mod const_fold;
pub mod dce;

pub use cleanup::CleanupCfg;
pub use const_fold::ConstFold;
pub use dce::DeadTempElim;

use std::collections::HashMap;

use crate::diagnostics::{Diagnostic, LimitError, MirLocator, Stage};
use crate::hir::{FnId, TypeTable};
use crate::session::{Limits, Session};

use super::body::MirBody;

/// A single MIR-to-MIR transformation.
///
/// `run` reports whether it changed the body, so drivers can iterate to a
/// fixed point; a pass that cannot stabilize within the session's
/// iteration limit surfaces that as an error instead of spinning.
pub trait Pass {
    /// Stable name, used in iteration-limit reports.
    fn name(&self) -> &'static str;

    /// Transform the body. Returns whether anything changed.
    fn run(&mut self, body: &mut MirBody, limits: &Limits) -> Result<bool, LimitError>;
}

/// An ordered collection of passes run as one unit.
pub struct PassManager<'a> {
    passes: Vec<Box<dyn Pass + 'a>>,
}

impl<'a> PassManager<'a> {
    /// An empty manager.
    pub fn new() -> Self {
        Self { passes: Vec::new() }
    }

    /// The standard pipeline in canonical order.
    pub fn standard(types: &'a TypeTable) -> Self {
        let mut manager = Self::new();
        manager.register(Box::new(CleanupCfg));
        manager.register(Box::new(DeadTempElim));
        manager.register(Box::new(ConstFold::new(types)));
        manager
    }

    /// Append a pass.
    pub fn register(&mut self, pass: Box<dyn Pass + 'a>) {
        self.passes.push(pass);
    }

    /// Run every pass once, in order.
    pub fn run(&mut self, body: &mut MirBody, limits: &Limits) -> Result<bool, LimitError> {
        let mut changed = false;
        for pass in &mut self.passes {
            changed |= pass.run(body, limits)?;
        }
        Ok(changed)
    }
}

impl Default for PassManager<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the standard pipeline on one body.
///
/// Cleanup, elimination, and folding run once; cleanup and elimination
/// then re-run until the body stabilizes, bounded by the iteration limit.
pub fn optimize_body(
    types: &TypeTable,
    body: &mut MirBody,
    limits: &Limits,
) -> Result<bool, LimitError> {
    let mut changed = CleanupCfg.run(body, limits)?;
    changed |= DeadTempElim.run(body, limits)?;
    changed |= ConstFold::new(types).run(body, limits)?;

    let mut iterations = 0;
    loop {
        let mut round = CleanupCfg.run(body, limits)?;
        round |= DeadTempElim.run(body, limits)?;
        if !round {
            break;
        }
        changed = true;
        iterations += 1;
        if iterations >= limits.max_pass_iterations {
            return Err(LimitError::IterationLimit {
                pass: "optimize",
                limit: limits.max_pass_iterations,
                span: body.span,
            });
        }
    }
    Ok(changed)
}

/// Optimize every body of a module, in function order.
///
/// A limit in one function does not stop the others; all failures come
/// back together.
pub fn optimize_module(
    session: &Session,
    bodies: &mut HashMap<FnId, MirBody>,
) -> Result<(), Vec<Diagnostic>> {
    let mut errors = Vec::new();
    let mut ids: Vec<FnId> = bodies.keys().copied().collect();
    ids.sort_by_key(|id| id.index);

    for id in ids {
        if let Some(body) = bodies.get_mut(&id) {
            if let Err(limit) = optimize_body(&session.types, body, &session.limits) {
                errors.push(
                    Diagnostic::from(limit)
                        .with_locator(MirLocator::function(Stage::Optimize, id.index)),
                );
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
