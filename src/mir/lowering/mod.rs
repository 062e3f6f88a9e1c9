//! Desugared-tree to MIR lowering.
//!
//! Walks each function's desugared body and emits an explicit CFG: nested
//! expressions become flat statements over temporaries, implicit control
//! flow becomes terminator edges, loops become back-edges to a dedicated
//! header block.
//!
//! # Example
//!
//! ```text
//! // desugared tree
//! if x > 0 { y = 1; } else { y = 2; }
//!
//! // MIR
//! bb0:
//!     _3 = Gt(copy _1, const 0)
//!     branch(copy _3) -> [true: bb1, false: bb2]
//! bb1:
//!     _2 = const 1
//!     goto -> bb3
//! bb2:
//!     _2 = const 2
//!     goto -> bb3
//! bb3:
//!     // continue...
//! ```
//!
//! The builder is allowed to emit redundant blocks and temporaries; the
//! optimization pipeline canonicalizes afterwards. The structural
//! invariants (every block terminated, every target in range, borrows
//! consumed by the next statement) hold already at this stage.

mod function;
mod util;

use std::collections::HashMap;

use crate::diagnostics::Diagnostic;
use crate::hir::{FnId, Module};
use crate::session::Session;

use super::body::MirBody;
use super::types::BasicBlockId;

pub use function::FunctionLowering;
pub use util::{convert_binop, convert_unop, lower_literal_to_constant};

// ============================================================================
// MIR Lowering Pass
// ============================================================================

/// Lowers every function of a module to MIR.
pub struct MirLowering<'a> {
    /// The session snapshot (types, signatures, limits).
    session: &'a Session,
    /// Lowered bodies.
    bodies: HashMap<FnId, MirBody>,
    /// Collected diagnostics.
    diagnostics: Vec<Diagnostic>,
}

impl<'a> MirLowering<'a> {
    /// Create a new lowering pass.
    pub fn new(session: &'a Session) -> Self {
        Self {
            session,
            bodies: HashMap::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Lower all functions in the module.
    ///
    /// Functions are independent; a failure in one does not stop the rest,
    /// so one run surfaces every problem in the module. The result is an
    /// error if any function failed.
    pub fn lower_module(
        &mut self,
        module: &Module,
    ) -> Result<HashMap<FnId, MirBody>, Vec<Diagnostic>> {
        for function in &module.functions {
            let lowering = FunctionLowering::new(self.session, function);
            match lowering.lower() {
                Ok(body) => {
                    self.bodies.insert(function.id, body);
                }
                Err(errors) => self.diagnostics.extend(errors),
            }
        }

        if self.diagnostics.is_empty() {
            Ok(std::mem::take(&mut self.bodies))
        } else {
            Err(std::mem::take(&mut self.diagnostics))
        }
    }
}

/// Context for the innermost enclosing loop.
#[derive(Debug, Clone, Copy)]
pub(super) struct LoopContext {
    /// Block `break` jumps to (the loop exit).
    pub break_block: BasicBlockId,
    /// Block `continue` jumps to (the loop header).
    pub continue_block: BasicBlockId,
}

// ============================================================================
// Tests
// ============================================================================
