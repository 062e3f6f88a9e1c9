//! MIR function bodies.
//!
//! A [`MirBody`] is the unit every later stage works on: the local table,
//! the basic-block arena, and the function's identity. Blocks hold indices
//! into the arena, never references, so a finished body is relocatable and
//! can be serialized or handed across threads whole.
//!
//! # Local convention
//!
//! - `_0`: return place
//! - `_1..=_n`: parameters (n = `param_count`)
//! - `_(n+1)..`: declared variables and synthesized temporaries

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::hir::{FnId, LocalId, Regime, SymbolId, TypeId};
use crate::span::Span;
use super::types::{BasicBlockData, BasicBlockId, Statement, Terminator};

/// A MIR function body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirBody {
    /// The function this body belongs to.
    pub fn_id: FnId,
    /// All locals (return place at index 0, then params, then the rest).
    pub locals: Vec<MirLocal>,
    /// Number of parameters (not counting the return place).
    pub param_count: usize,
    /// The basic blocks of the CFG. Block 0 is the entry.
    pub basic_blocks: Vec<BasicBlockData>,
    /// Source span of the function.
    pub span: Span,
}

impl MirBody {
    /// Create an empty body.
    pub fn new(fn_id: FnId, span: Span) -> Self {
        Self {
            fn_id,
            locals: Vec::new(),
            param_count: 0,
            basic_blocks: Vec::new(),
            span,
        }
    }

    /// The return place (always local 0).
    pub fn return_place(&self) -> LocalId {
        LocalId::RETURN_PLACE
    }

    /// The return type.
    pub fn return_type(&self) -> TypeId {
        self.locals[0].ty
    }

    /// Iterate over parameter locals.
    pub fn params(&self) -> impl Iterator<Item = &MirLocal> {
        self.locals.iter().skip(1).take(self.param_count)
    }

    /// Get a local by id.
    pub fn get_local(&self, id: LocalId) -> Option<&MirLocal> {
        self.locals.get(id.index as usize)
    }

    /// Allocate a new local and return its id.
    pub fn new_local(&mut self, ty: TypeId, regime: Regime, kind: LocalKind, span: Span) -> LocalId {
        let id = LocalId::new(self.locals.len() as u32);
        self.locals.push(MirLocal {
            id,
            ty,
            regime,
            kind,
            mutable: false,
            name: None,
            span,
        });
        id
    }

    /// Allocate a new temporary.
    pub fn new_temp(&mut self, ty: TypeId, regime: Regime, span: Span) -> LocalId {
        self.new_local(ty, regime, LocalKind::Temp, span)
    }

    /// Get a basic block by id.
    pub fn get_block(&self, id: BasicBlockId) -> Option<&BasicBlockData> {
        self.basic_blocks.get(id.index())
    }

    /// Get a mutable reference to a basic block.
    pub fn get_block_mut(&mut self, id: BasicBlockId) -> Option<&mut BasicBlockData> {
        self.basic_blocks.get_mut(id.index())
    }

    /// Allocate a new basic block and return its id.
    pub fn new_block(&mut self) -> BasicBlockId {
        let id = BasicBlockId::new(self.basic_blocks.len() as u32);
        self.basic_blocks.push(BasicBlockData::new());
        id
    }

    /// All block ids in index order.
    pub fn block_ids(&self) -> impl Iterator<Item = BasicBlockId> {
        (0..self.basic_blocks.len()).map(|i| BasicBlockId::new(i as u32))
    }

    /// Iterate over all blocks with their ids.
    pub fn blocks(&self) -> impl Iterator<Item = (BasicBlockId, &BasicBlockData)> {
        self.basic_blocks
            .iter()
            .enumerate()
            .map(|(i, bb)| (BasicBlockId::new(i as u32), bb))
    }

    /// Whether every block has its terminator.
    pub fn is_complete(&self) -> bool {
        self.basic_blocks.iter().all(|bb| bb.is_terminated())
    }

    /// Add a statement to a block.
    pub fn push_statement(&mut self, block: BasicBlockId, stmt: Statement) {
        if let Some(bb) = self.basic_blocks.get_mut(block.index()) {
            bb.statements.push(stmt);
        }
    }

    /// Set the terminator for a block.
    pub fn set_terminator(&mut self, block: BasicBlockId, term: Terminator) {
        if let Some(bb) = self.basic_blocks.get_mut(block.index()) {
            bb.terminator = Some(term);
        }
    }

    /// Compute predecessors for all blocks.
    pub fn predecessors(&self) -> HashMap<BasicBlockId, Vec<BasicBlockId>> {
        let mut preds: HashMap<_, Vec<_>> = HashMap::new();

        for id in self.block_ids() {
            preds.insert(id, Vec::new());
        }

        for (id, block) in self.blocks() {
            for succ in block.successors() {
                preds.entry(succ).or_default().push(id);
            }
        }

        preds
    }

    /// Whether a block is reachable from the entry block.
    pub fn is_reachable(&self, target: BasicBlockId) -> bool {
        if self.basic_blocks.is_empty() {
            return false;
        }
        let mut visited = vec![false; self.basic_blocks.len()];
        let mut worklist = vec![BasicBlockId::ENTRY];

        while let Some(bb) = worklist.pop() {
            if bb == target {
                return true;
            }
            if visited[bb.index()] {
                continue;
            }
            visited[bb.index()] = true;

            if let Some(block) = self.get_block(bb) {
                for succ in block.successors() {
                    if succ.index() < visited.len() && !visited[succ.index()] {
                        worklist.push(succ);
                    }
                }
            }
        }

        false
    }

    /// The set of blocks reachable from the entry block.
    pub fn reachable_blocks(&self) -> Vec<bool> {
        let mut visited = vec![false; self.basic_blocks.len()];
        if self.basic_blocks.is_empty() {
            return visited;
        }
        let mut worklist = vec![BasicBlockId::ENTRY];
        while let Some(bb) = worklist.pop() {
            if visited[bb.index()] {
                continue;
            }
            visited[bb.index()] = true;
            if let Some(block) = self.get_block(bb) {
                for succ in block.successors() {
                    if succ.index() < visited.len() && !visited[succ.index()] {
                        worklist.push(succ);
                    }
                }
            }
        }
        visited
    }

    /// Blocks in reverse postorder, for dataflow-style traversal.
    pub fn reverse_postorder(&self) -> Vec<BasicBlockId> {
        let mut visited = vec![false; self.basic_blocks.len()];
        let mut postorder = Vec::new();

        fn visit(
            body: &MirBody,
            bb: BasicBlockId,
            visited: &mut [bool],
            postorder: &mut Vec<BasicBlockId>,
        ) {
            if visited[bb.index()] {
                return;
            }
            visited[bb.index()] = true;

            if let Some(block) = body.get_block(bb) {
                for succ in block.successors() {
                    if succ.index() < visited.len() {
                        visit(body, succ, visited, postorder);
                    }
                }
            }

            postorder.push(bb);
        }

        if !self.basic_blocks.is_empty() {
            visit(self, BasicBlockId::ENTRY, &mut visited, &mut postorder);
        }
        postorder.reverse();
        postorder
    }
}

/// A local variable in MIR.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirLocal {
    /// The local id.
    pub id: LocalId,
    /// The type of this local.
    pub ty: TypeId,
    /// The ownership regime of the type. Duplicated from the type table so
    /// a backend can decide safepoint registration without the table.
    pub regime: Regime,
    /// The kind of local (return place, param, var, temp).
    pub kind: LocalKind,
    /// Whether this local is mutable.
    pub mutable: bool,
    /// The name, for debug output (None for the return place and temps).
    pub name: Option<SymbolId>,
    /// Where this local was declared.
    pub span: Span,
}

impl MirLocal {
    pub fn new(id: LocalId, ty: TypeId, regime: Regime, kind: LocalKind, span: Span) -> Self {
        Self {
            id,
            ty,
            regime,
            kind,
            mutable: false,
            name: None,
            span,
        }
    }

    /// Whether this is the return place.
    pub fn is_return_place(&self) -> bool {
        self.id.index == 0
    }

    /// Whether this is a parameter.
    pub fn is_param(&self) -> bool {
        matches!(self.kind, LocalKind::Arg)
    }

    /// Whether this is a synthesized temporary.
    pub fn is_temp(&self) -> bool {
        matches!(self.kind, LocalKind::Temp)
    }
}

/// The kind of a local variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocalKind {
    /// Return place (always index 0).
    ReturnPlace,
    /// Function argument.
    Arg,
    /// User-declared variable.
    Var,
    /// Compiler-generated temporary.
    Temp,
}

// ============================================================================
// Builder helpers
// ============================================================================

/// Builder for constructing MIR bodies.
///
/// Tracks the current block so the CFG builder can append statements
/// without threading a block id through every call.
pub struct MirBodyBuilder {
    body: MirBody,
    current_block: BasicBlockId,
}

impl MirBodyBuilder {
    /// Create a builder with an empty entry block.
    pub fn new(fn_id: FnId, span: Span) -> Self {
        let mut body = MirBody::new(fn_id, span);
        let entry = body.new_block();
        Self {
            body,
            current_block: entry,
        }
    }

    /// Set the return place (local 0).
    pub fn set_return_type(&mut self, ty: TypeId, regime: Regime) {
        let local = MirLocal::new(
            LocalId::RETURN_PLACE,
            ty,
            regime,
            LocalKind::ReturnPlace,
            self.body.span,
        );
        if self.body.locals.is_empty() {
            self.body.locals.push(local);
        } else {
            self.body.locals[0] = local;
        }
    }

    /// Add a parameter local.
    pub fn add_param(
        &mut self,
        name: Option<SymbolId>,
        ty: TypeId,
        regime: Regime,
        span: Span,
    ) -> LocalId {
        let id = LocalId::new(self.body.locals.len() as u32);
        let mut local = MirLocal::new(id, ty, regime, LocalKind::Arg, span);
        local.name = name;
        self.body.locals.push(local);
        self.body.param_count += 1;
        id
    }

    /// Add a user-declared variable local.
    pub fn add_var(
        &mut self,
        name: Option<SymbolId>,
        ty: TypeId,
        regime: Regime,
        mutable: bool,
        span: Span,
    ) -> LocalId {
        let id = LocalId::new(self.body.locals.len() as u32);
        let mut local = MirLocal::new(id, ty, regime, LocalKind::Var, span);
        local.name = name;
        local.mutable = mutable;
        self.body.locals.push(local);
        id
    }

    /// Create a new temporary.
    pub fn new_temp(&mut self, ty: TypeId, regime: Regime, span: Span) -> LocalId {
        self.body.new_temp(ty, regime, span)
    }

    /// Create a new basic block.
    pub fn new_block(&mut self) -> BasicBlockId {
        self.body.new_block()
    }

    /// Number of blocks allocated so far.
    pub fn block_count(&self) -> usize {
        self.body.basic_blocks.len()
    }

    /// Number of locals allocated so far.
    pub fn local_count(&self) -> usize {
        self.body.locals.len()
    }

    /// The block statements are currently appended to.
    pub fn current_block(&self) -> BasicBlockId {
        self.current_block
    }

    /// Switch to a different block.
    pub fn switch_to(&mut self, block: BasicBlockId) {
        self.current_block = block;
    }

    /// Push a statement to the current block.
    pub fn push_stmt(&mut self, stmt: Statement) {
        self.body.push_statement(self.current_block, stmt);
    }

    /// Terminate the current block.
    pub fn terminate(&mut self, term: Terminator) {
        self.body.set_terminator(self.current_block, term);
    }

    /// Whether the current block already has its terminator.
    pub fn is_current_terminated(&self) -> bool {
        self.body
            .get_block(self.current_block)
            .map(|b| b.is_terminated())
            .unwrap_or(false)
    }

    /// Read access to the body under construction.
    pub fn body(&self) -> &MirBody {
        &self.body
    }

    /// Finish building and return the body.
    pub fn finish(self) -> MirBody {
        self.body
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mir::types::{Operand, Constant, TerminatorKind};

    fn term(kind: TerminatorKind) -> Terminator {
        Terminator::new(kind, Span::dummy())
    }

    #[test]
    fn test_body_new_local() {
        let mut body = MirBody::new(FnId::new(0), Span::dummy());
        let id = body.new_local(TypeId::new(1), Regime::Value, LocalKind::Temp, Span::dummy());
        assert_eq!(id.index, 0);
        assert_eq!(body.locals.len(), 1);
    }

    #[test]
    fn test_body_new_block() {
        let mut body = MirBody::new(FnId::new(0), Span::dummy());
        let bb0 = body.new_block();
        let bb1 = body.new_block();
        assert_eq!(bb0.0, 0);
        assert_eq!(bb1.0, 1);
        assert_eq!(body.basic_blocks.len(), 2);
    }

    #[test]
    fn test_body_is_complete() {
        let mut body = MirBody::new(FnId::new(0), Span::dummy());
        body.new_block();
        assert!(!body.is_complete());

        body.set_terminator(BasicBlockId::ENTRY, term(TerminatorKind::Return));
        assert!(body.is_complete());
    }

    #[test]
    fn test_body_predecessors() {
        let mut body = MirBody::new(FnId::new(0), Span::dummy());
        let bb0 = body.new_block();
        let bb1 = body.new_block();
        let bb2 = body.new_block();

        // bb0 -> bb1, bb0 -> bb2, bb1 -> bb2
        body.set_terminator(
            bb0,
            term(TerminatorKind::Branch {
                cond: Operand::Constant(Constant::bool(TypeId::new(0), true)),
                then_block: bb1,
                else_block: bb2,
            }),
        );
        body.set_terminator(bb1, term(TerminatorKind::Goto { target: bb2 }));
        body.set_terminator(bb2, term(TerminatorKind::Return));

        let preds = body.predecessors();
        assert!(preds[&bb0].is_empty());
        assert_eq!(preds[&bb1], vec![bb0]);
        assert!(preds[&bb2].contains(&bb0));
        assert!(preds[&bb2].contains(&bb1));
    }

    #[test]
    fn test_body_reachability() {
        let mut body = MirBody::new(FnId::new(0), Span::dummy());
        let bb0 = body.new_block();
        let bb1 = body.new_block();
        let bb2 = body.new_block(); // no incoming edges

        body.set_terminator(bb0, term(TerminatorKind::Goto { target: bb1 }));
        body.set_terminator(bb1, term(TerminatorKind::Return));
        body.set_terminator(bb2, term(TerminatorKind::Return));

        assert!(body.is_reachable(bb0));
        assert!(body.is_reachable(bb1));
        assert!(!body.is_reachable(bb2));
        assert_eq!(body.reachable_blocks(), vec![true, true, false]);
    }

    #[test]
    fn test_reverse_postorder() {
        let mut body = MirBody::new(FnId::new(0), Span::dummy());
        let bb0 = body.new_block();
        let bb1 = body.new_block();
        let bb2 = body.new_block();

        body.set_terminator(bb0, term(TerminatorKind::Goto { target: bb1 }));
        body.set_terminator(bb1, term(TerminatorKind::Goto { target: bb2 }));
        body.set_terminator(bb2, term(TerminatorKind::Return));

        assert_eq!(body.reverse_postorder(), vec![bb0, bb1, bb2]);
    }

    #[test]
    fn test_builder_params() {
        let mut builder = MirBodyBuilder::new(FnId::new(3), Span::dummy());
        builder.set_return_type(TypeId::new(0), Regime::Value);
        let p1 = builder.add_param(None, TypeId::new(1), Regime::Value, Span::dummy());

        assert_eq!(p1.index, 1);

        let body = builder.finish();
        assert_eq!(body.param_count, 1);
        assert_eq!(body.locals.len(), 2);
        assert_eq!(body.basic_blocks.len(), 1);
        assert!(body.locals[0].is_return_place());
        assert!(body.locals[1].is_param());
    }

    #[test]
    fn test_builder_switch_and_terminate() {
        let mut builder = MirBodyBuilder::new(FnId::new(0), Span::dummy());
        let next = builder.new_block();
        assert!(!builder.is_current_terminated());

        builder.terminate(term(TerminatorKind::Goto { target: next }));
        assert!(builder.is_current_terminated());

        builder.switch_to(next);
        assert!(!builder.is_current_terminated());
        builder.terminate(term(TerminatorKind::Return));

        assert!(builder.finish().is_complete());
    }
}
