//! MIR visitor infrastructure.
//!
//! [`Visitor`] is the immutable traversal backbone used by the analysis
//! passes (use counting in dead-temporary elimination, the verifier's
//! borrow scan). Each `visit_X` method has a matching `super_X` that does
//! the default recursive walk; override `visit_X`, call `super_X` to keep
//! descending.
//!
//! Transformation passes that need to rewrite every local reference use
//! [`remap_locals`] instead of a full mutable visitor; renumbering is the
//! only mutation they share.

use crate::hir::LocalId;
use super::body::MirBody;
use super::types::{
    BasicBlockData, BasicBlockId, BinOp, CheckKind, Constant, Operand, Place, PlaceElem, Rvalue,
    Statement, StatementKind, Terminator, TerminatorKind, UnOp,
};

// ============================================================================
// Location
// ============================================================================

/// A position in a MIR body: a block plus a statement index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    /// The basic block.
    pub block: BasicBlockId,
    /// Index within the block, or [`Location::TERMINATOR`].
    pub statement_index: usize,
}

impl Location {
    /// Sentinel index for the terminator position.
    pub const TERMINATOR: usize = usize::MAX;

    /// A statement location.
    pub fn statement(block: BasicBlockId, index: usize) -> Self {
        Self {
            block,
            statement_index: index,
        }
    }

    /// A terminator location.
    pub fn terminator(block: BasicBlockId) -> Self {
        Self {
            block,
            statement_index: Self::TERMINATOR,
        }
    }

    /// Whether this location points at a terminator.
    pub fn is_terminator(&self) -> bool {
        self.statement_index == Self::TERMINATOR
    }
}

// ============================================================================
// Place Context
// ============================================================================

/// The context in which a place is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceContext {
    /// Place is read without an operand wrapper (check operands, indices).
    Read,
    /// Place is copied.
    Copy,
    /// Place is moved from.
    Move,
    /// Place is stored to.
    Store,
    /// Place is borrowed by a `Ref` rvalue.
    Borrow,
}

impl PlaceContext {
    /// Whether this context mutates the place.
    pub fn is_mutating(&self) -> bool {
        matches!(self, PlaceContext::Store)
    }

    /// Whether this context reads the place's value.
    pub fn is_use(&self) -> bool {
        matches!(
            self,
            PlaceContext::Read | PlaceContext::Copy | PlaceContext::Move | PlaceContext::Borrow
        )
    }
}

// ============================================================================
// Visitor Trait (Immutable)
// ============================================================================

/// Visitor trait for immutable MIR traversal.
pub trait Visitor: Sized {
    /// Visit the entire MIR body.
    fn visit_body(&mut self, body: &MirBody) {
        self.super_body(body);
    }

    fn super_body(&mut self, body: &MirBody) {
        for (bb_id, block) in body.blocks() {
            self.visit_basic_block(bb_id, block);
        }
    }

    fn visit_basic_block(&mut self, bb_id: BasicBlockId, block: &BasicBlockData) {
        self.super_basic_block(bb_id, block);
    }

    fn super_basic_block(&mut self, bb_id: BasicBlockId, block: &BasicBlockData) {
        for (idx, stmt) in block.statements.iter().enumerate() {
            self.visit_statement(stmt, Location::statement(bb_id, idx));
        }
        if let Some(ref term) = block.terminator {
            self.visit_terminator(term, Location::terminator(bb_id));
        }
    }

    fn visit_statement(&mut self, stmt: &Statement, location: Location) {
        self.super_statement(stmt, location);
    }

    fn super_statement(&mut self, stmt: &Statement, location: Location) {
        match &stmt.kind {
            StatementKind::Assign(place, rvalue) => {
                self.visit_place(place, PlaceContext::Store, location);
                self.visit_rvalue(rvalue, location);
            }
            StatementKind::Check(check) => match check {
                CheckKind::Null { handle } => {
                    self.visit_operand(handle, location);
                }
                CheckKind::Bounds { array, index } => {
                    self.visit_place(array, PlaceContext::Read, location);
                    self.visit_operand(index, location);
                }
            },
            StatementKind::Release(operand) => {
                self.visit_operand(operand, location);
            }
            StatementKind::Nop => {}
        }
    }

    fn visit_terminator(&mut self, term: &Terminator, location: Location) {
        self.super_terminator(term, location);
    }

    fn super_terminator(&mut self, term: &Terminator, location: Location) {
        match &term.kind {
            TerminatorKind::Goto { .. } => {}
            TerminatorKind::Branch { cond, .. } => {
                self.visit_operand(cond, location);
            }
            TerminatorKind::Switch { discr, .. } => {
                self.visit_operand(discr, location);
            }
            TerminatorKind::Return | TerminatorKind::Trap { .. } => {}
        }
    }

    fn visit_rvalue(&mut self, rvalue: &Rvalue, location: Location) {
        self.super_rvalue(rvalue, location);
    }

    fn super_rvalue(&mut self, rvalue: &Rvalue, location: Location) {
        match rvalue {
            Rvalue::Use(operand) => {
                self.visit_operand(operand, location);
            }
            Rvalue::UnaryOp { op, operand } => {
                self.visit_unop(*op, location);
                self.visit_operand(operand, location);
            }
            Rvalue::BinaryOp { op, left, right } => {
                self.visit_binop(*op, location);
                self.visit_operand(left, location);
                self.visit_operand(right, location);
            }
            Rvalue::Call { func: _, args } => {
                for arg in args {
                    self.visit_operand(arg, location);
                }
            }
            Rvalue::Aggregate { operands } => {
                for operand in operands {
                    self.visit_operand(operand, location);
                }
            }
            Rvalue::Ref { place } => {
                self.visit_place(place, PlaceContext::Borrow, location);
            }
        }
    }

    fn visit_operand(&mut self, operand: &Operand, location: Location) {
        self.super_operand(operand, location);
    }

    fn super_operand(&mut self, operand: &Operand, location: Location) {
        match operand {
            Operand::Copy(place) => {
                self.visit_place(place, PlaceContext::Copy, location);
            }
            Operand::Move(place) => {
                self.visit_place(place, PlaceContext::Move, location);
            }
            Operand::Constant(constant) => {
                self.visit_constant(constant, location);
            }
        }
    }

    fn visit_place(&mut self, place: &Place, context: PlaceContext, location: Location) {
        self.super_place(place, context, location);
    }

    fn super_place(&mut self, place: &Place, context: PlaceContext, location: Location) {
        // A store through a projection reads the base to find the target
        // (writing `*_2` or `_2.0` needs `_2`), so only a bare-local store
        // is a pure write of the base.
        let base_context = if context.is_mutating() && !place.projection.is_empty() {
            PlaceContext::Read
        } else {
            context
        };
        self.visit_local(place.local, base_context, location);
        for elem in &place.projection {
            self.visit_projection_elem(elem, location);
        }
    }

    /// Leaf: a local reference in the given context.
    fn visit_local(&mut self, _local: LocalId, _context: PlaceContext, _location: Location) {}

    fn visit_projection_elem(&mut self, elem: &PlaceElem, location: Location) {
        self.super_projection_elem(elem, location);
    }

    fn super_projection_elem(&mut self, elem: &PlaceElem, location: Location) {
        match elem {
            PlaceElem::Deref | PlaceElem::Field(_) => {}
            PlaceElem::Index(local) => {
                self.visit_local(*local, PlaceContext::Read, location);
            }
        }
    }

    /// Leaf: a constant.
    fn visit_constant(&mut self, _constant: &Constant, _location: Location) {}

    /// Leaf: a binary operator.
    fn visit_binop(&mut self, _op: BinOp, _location: Location) {}

    /// Leaf: a unary operator.
    fn visit_unop(&mut self, _op: UnOp, _location: Location) {}
}

/// Walk a MIR body with a visitor.
pub fn walk_body<V: Visitor>(visitor: &mut V, body: &MirBody) {
    visitor.visit_body(body);
}

// ============================================================================
// Local renumbering
// ============================================================================

/// Rewrite every local reference in the body's blocks through `f`.
///
/// Used by dead-temporary elimination after dropping locals from the table;
/// the local table itself is the caller's to fix up.
pub fn remap_locals(body: &mut MirBody, f: &impl Fn(LocalId) -> LocalId) {
    for block in &mut body.basic_blocks {
        for stmt in &mut block.statements {
            remap_statement(stmt, f);
        }
        if let Some(term) = &mut block.terminator {
            remap_terminator(term, f);
        }
    }
}

fn remap_statement(stmt: &mut Statement, f: &impl Fn(LocalId) -> LocalId) {
    match &mut stmt.kind {
        StatementKind::Assign(place, rvalue) => {
            remap_place(place, f);
            remap_rvalue(rvalue, f);
        }
        StatementKind::Check(check) => match check {
            CheckKind::Null { handle } => remap_operand(handle, f),
            CheckKind::Bounds { array, index } => {
                remap_place(array, f);
                remap_operand(index, f);
            }
        },
        StatementKind::Release(operand) => remap_operand(operand, f),
        StatementKind::Nop => {}
    }
}

fn remap_terminator(term: &mut Terminator, f: &impl Fn(LocalId) -> LocalId) {
    match &mut term.kind {
        TerminatorKind::Branch { cond, .. } => remap_operand(cond, f),
        TerminatorKind::Switch { discr, .. } => remap_operand(discr, f),
        TerminatorKind::Goto { .. } | TerminatorKind::Return | TerminatorKind::Trap { .. } => {}
    }
}

fn remap_rvalue(rvalue: &mut Rvalue, f: &impl Fn(LocalId) -> LocalId) {
    match rvalue {
        Rvalue::Use(operand) => remap_operand(operand, f),
        Rvalue::UnaryOp { operand, .. } => remap_operand(operand, f),
        Rvalue::BinaryOp { left, right, .. } => {
            remap_operand(left, f);
            remap_operand(right, f);
        }
        Rvalue::Call { args, .. } => {
            for arg in args {
                remap_operand(arg, f);
            }
        }
        Rvalue::Aggregate { operands } => {
            for operand in operands {
                remap_operand(operand, f);
            }
        }
        Rvalue::Ref { place } => remap_place(place, f),
    }
}

fn remap_operand(operand: &mut Operand, f: &impl Fn(LocalId) -> LocalId) {
    match operand {
        Operand::Copy(place) | Operand::Move(place) => remap_place(place, f),
        Operand::Constant(_) => {}
    }
}

fn remap_place(place: &mut Place, f: &impl Fn(LocalId) -> LocalId) {
    place.local = f(place.local);
    for elem in &mut place.projection {
        if let PlaceElem::Index(local) = elem {
            *local = f(*local);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::{FnId, Regime, TypeId};
    use crate::mir::body::LocalKind;
    use crate::span::Span;

    fn test_body() -> MirBody {
        let mut body = MirBody::new(FnId::new(0), Span::dummy());
        body.new_local(TypeId::new(0), Regime::Value, LocalKind::ReturnPlace, Span::dummy());
        let dest = body.new_local(TypeId::new(1), Regime::Value, LocalKind::Temp, Span::dummy());
        let src = body.new_local(TypeId::new(1), Regime::Value, LocalKind::Temp, Span::dummy());
        let bb = body.new_block();
        body.push_statement(
            bb,
            Statement::new(
                StatementKind::Assign(
                    Place::local(dest),
                    Rvalue::Use(Operand::Copy(Place::local(src))),
                ),
                Span::dummy(),
            ),
        );
        body.set_terminator(bb, Terminator::new(TerminatorKind::Return, Span::dummy()));
        body
    }

    #[test]
    fn test_location() {
        let stmt_loc = Location::statement(BasicBlockId::new(5), 3);
        assert_eq!(stmt_loc.block.index(), 5);
        assert!(!stmt_loc.is_terminator());
        assert!(Location::terminator(BasicBlockId::new(2)).is_terminator());
    }

    #[test]
    fn test_place_context() {
        assert!(PlaceContext::Store.is_mutating());
        assert!(!PlaceContext::Read.is_mutating());
        assert!(PlaceContext::Copy.is_use());
        assert!(PlaceContext::Move.is_use());
        assert!(PlaceContext::Borrow.is_use());
        assert!(!PlaceContext::Store.is_use());
    }

    #[test]
    fn test_context_tracking() {
        struct ContextTracker {
            stores: Vec<LocalId>,
            reads: Vec<LocalId>,
        }

        impl Visitor for ContextTracker {
            fn visit_local(&mut self, local: LocalId, context: PlaceContext, _location: Location) {
                if context.is_mutating() {
                    self.stores.push(local);
                } else if context.is_use() {
                    self.reads.push(local);
                }
            }
        }

        let body = test_body();
        let mut tracker = ContextTracker {
            stores: Vec::new(),
            reads: Vec::new(),
        };
        walk_body(&mut tracker, &body);

        assert_eq!(tracker.stores, vec![LocalId::new(1)]);
        assert_eq!(tracker.reads, vec![LocalId::new(2)]);
    }

    #[test]
    fn test_projected_store_reads_base() {
        struct UseCollector(Vec<LocalId>);
        impl Visitor for UseCollector {
            fn visit_local(&mut self, local: LocalId, context: PlaceContext, _location: Location) {
                if context.is_use() {
                    self.0.push(local);
                }
            }
        }

        let mut body = MirBody::new(FnId::new(0), Span::dummy());
        body.new_local(TypeId::new(0), Regime::Value, LocalKind::ReturnPlace, Span::dummy());
        let handle = body.new_local(TypeId::new(1), Regime::ManualHandle, LocalKind::Var, Span::dummy());
        let bb = body.new_block();
        // *_1 = const 7: writes through the handle, so _1 is used
        body.push_statement(
            bb,
            Statement::new(
                StatementKind::Assign(
                    Place::local(handle).deref(),
                    Rvalue::Use(Operand::Constant(Constant::int(TypeId::new(2), 7))),
                ),
                Span::dummy(),
            ),
        );

        let mut uses = UseCollector(Vec::new());
        walk_body(&mut uses, &body);
        assert_eq!(uses.0, vec![handle]);
    }

    #[test]
    fn test_remap_locals() {
        let mut body = test_body();
        remap_locals(&mut body, &|l| LocalId::new(l.index + 10));

        match &body.basic_blocks[0].statements[0].kind {
            StatementKind::Assign(place, Rvalue::Use(Operand::Copy(src))) => {
                assert_eq!(place.local, LocalId::new(11));
                assert_eq!(src.local, LocalId::new(12));
            }
            other => panic!("unexpected statement: {:?}", other),
        }
    }
}
