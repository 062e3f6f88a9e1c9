//! MIR verification.
//!
//! The verifier is a pure checker: it never mutates a body, it only
//! aggregates reports. It runs after optimization and rejects anything a
//! backend could not trust:
//!
//! - structural defects: missing terminators, out-of-range targets, an
//!   entry block with predecessors, references to undeclared locals,
//!   projections that do not fit the projected type
//! - ownership defects: a borrow that escapes its synthesis window or is
//!   stored anywhere durable, a release of a non-manual handle, and (in
//!   strict mode) block-local reads of moved-from manual handles
//!
//! Every report carries a [`MirLocator`] naming the function, block, and
//! instruction, so failures in a many-function module stay attributable.

use std::collections::{HashMap, HashSet};

use crate::diagnostics::{Diagnostic, ErrorCode, MirLocator, Stage};
use crate::hir::{FnId, LocalId, Regime, TypeId, TypeKind};
use crate::session::{Session, Strictness};
use crate::span::Span;

use super::body::MirBody;
use super::types::{
    BasicBlockId, CheckKind, Operand, Place, PlaceElem, Rvalue, StatementKind, TerminatorKind,
};

/// Everything one verification run reported.
#[derive(Debug, Default)]
pub struct ValidationResults {
    /// Rejections; the module must not proceed to a backend.
    pub errors: Vec<Diagnostic>,
    /// Non-fatal observations.
    pub warnings: Vec<Diagnostic>,
}

impl ValidationResults {
    /// Whether the verified MIR is acceptable.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Fold another run's reports into this one.
    pub fn merge(&mut self, other: ValidationResults) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

/// Verify every body of a module, in function order.
pub fn validate_module(
    session: &Session,
    bodies: &HashMap<FnId, MirBody>,
) -> ValidationResults {
    let mut results = ValidationResults::default();
    let mut ids: Vec<FnId> = bodies.keys().copied().collect();
    ids.sort_by_key(|id| id.index);

    for id in ids {
        if let Some(body) = bodies.get(&id) {
            results.merge(validate_body(session, body));
        }
    }
    results
}

/// Verify a single body.
pub fn validate_body(session: &Session, body: &MirBody) -> ValidationResults {
    let mut validator = Validator {
        session,
        body,
        results: ValidationResults::default(),
    };
    validator.check_structure();
    validator.check_terminators();
    validator.check_entry();
    validator.check_places();
    validator.check_borrows();
    validator.check_releases();
    if session.strictness == Strictness::Strict {
        validator.check_move_reuse();
    }
    validator.check_reachability();
    validator.results
}

struct Validator<'a> {
    session: &'a Session,
    body: &'a MirBody,
    results: ValidationResults,
}

impl Validator<'_> {
    fn fn_index(&self) -> u32 {
        self.body.fn_id.index
    }

    fn error_at(
        &mut self,
        code: ErrorCode,
        span: Span,
        locator: MirLocator,
        message: impl Into<String>,
    ) {
        self.results.errors.push(
            Diagnostic::error(message, span)
                .with_error_code(code)
                .with_locator(locator),
        );
    }

    fn block_locator(&self, block: BasicBlockId) -> MirLocator {
        MirLocator::block(Stage::Verify, self.fn_index(), block.0)
    }

    fn stmt_locator(&self, block: BasicBlockId, index: usize) -> MirLocator {
        MirLocator::instruction(Stage::Verify, self.fn_index(), block.0, index)
    }

    // ------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------

    fn check_structure(&mut self) {
        if self.body.basic_blocks.is_empty() {
            self.error_at(
                ErrorCode::MissingTerminator,
                self.body.span,
                MirLocator::function(Stage::Verify, self.fn_index()),
                "body has no basic blocks",
            );
        }
        let ok_return_place = self
            .body
            .locals
            .first()
            .map(|local| local.is_return_place())
            .unwrap_or(false);
        if !ok_return_place {
            self.error_at(
                ErrorCode::UndeclaredLocal,
                self.body.span,
                MirLocator::function(Stage::Verify, self.fn_index()),
                "local table is missing the return place",
            );
        }
    }

    fn check_terminators(&mut self) {
        let count = self.body.basic_blocks.len();
        for (id, block) in self.body.blocks() {
            match &block.terminator {
                None => {
                    let locator = self.block_locator(id);
                    self.error_at(
                        ErrorCode::MissingTerminator,
                        self.body.span,
                        locator,
                        format!("{} has no terminator", id),
                    );
                }
                Some(term) => {
                    for succ in term.kind.successors() {
                        if succ.index() >= count {
                            let locator = self.block_locator(id);
                            self.error_at(
                                ErrorCode::InvalidBlockTarget,
                                term.span,
                                locator,
                                format!("{} targets nonexistent {}", id, succ),
                            );
                        }
                    }
                }
            }
        }
    }

    fn check_entry(&mut self) {
        let preds = self.body.predecessors();
        if let Some(list) = preds.get(&BasicBlockId::ENTRY) {
            if !list.is_empty() {
                let locator = self.block_locator(BasicBlockId::ENTRY);
                self.error_at(
                    ErrorCode::EntryHasPredecessors,
                    self.body.span,
                    locator,
                    format!("entry block has {} predecessor(s)", list.len()),
                );
            }
        }
    }

    fn check_reachability(&mut self) {
        let reachable = self.body.reachable_blocks();
        for (index, &live) in reachable.iter().enumerate() {
            if !live {
                let block = BasicBlockId::new(index as u32);
                self.results.warnings.push(
                    Diagnostic::warning(format!("{} is unreachable", block), self.body.span)
                        .with_locator(self.block_locator(block)),
                );
            }
        }
    }

    // ------------------------------------------------------------------
    // Places and projections
    // ------------------------------------------------------------------

    fn check_places(&mut self) {
        for (id, block) in self.body.blocks() {
            for (idx, stmt) in block.statements.iter().enumerate() {
                let locator = self.stmt_locator(id, idx);
                match &stmt.kind {
                    StatementKind::Assign(place, rvalue) => {
                        self.check_place(place, stmt.span, locator);
                        for operand in rvalue_operands(rvalue) {
                            self.check_operand(operand, stmt.span, locator);
                        }
                        if let Rvalue::Ref { place } = rvalue {
                            self.check_place(place, stmt.span, locator);
                        }
                    }
                    StatementKind::Check(CheckKind::Null { handle }) => {
                        self.check_operand(handle, stmt.span, locator);
                    }
                    StatementKind::Check(CheckKind::Bounds { array, index }) => {
                        self.check_place(array, stmt.span, locator);
                        self.check_operand(index, stmt.span, locator);
                    }
                    StatementKind::Release(operand) => {
                        self.check_operand(operand, stmt.span, locator);
                    }
                    StatementKind::Nop => {}
                }
            }
            if let Some(term) = &block.terminator {
                let locator = self.stmt_locator(id, block.statements.len());
                match &term.kind {
                    TerminatorKind::Branch { cond, .. } => {
                        self.check_operand(cond, term.span, locator);
                    }
                    TerminatorKind::Switch { discr, .. } => {
                        self.check_operand(discr, term.span, locator);
                    }
                    _ => {}
                }
            }
        }
    }

    fn check_operand(&mut self, operand: &Operand, span: Span, locator: MirLocator) {
        if let Some(place) = operand.place() {
            self.check_place(place, span, locator);
        }
    }

    fn check_place(&mut self, place: &Place, span: Span, locator: MirLocator) {
        if let Err((code, message)) = self.place_type(place) {
            self.error_at(code, span, locator, message);
        }
    }

    /// Walk a place's projections through the type table, yielding the
    /// final type or the first mismatch.
    fn place_type(&self, place: &Place) -> Result<TypeId, (ErrorCode, String)> {
        let types = &self.session.types;
        let local = self.body.get_local(place.local).ok_or_else(|| {
            (
                ErrorCode::UndeclaredLocal,
                format!("place references undeclared local {}", place.local),
            )
        })?;

        let mut ty = local.ty;
        for elem in &place.projection {
            match elem {
                PlaceElem::Field(index) => match types.field_type(ty, *index) {
                    Some(field_ty) => ty = field_ty,
                    None => {
                        return Err((
                            ErrorCode::InvalidProjection,
                            format!("field {} does not exist on the projected type", index),
                        ));
                    }
                },
                PlaceElem::Deref => match types.pointee(ty) {
                    Some(inner) => ty = inner,
                    None => {
                        return Err((
                            ErrorCode::InvalidProjection,
                            "deref of a type that is not a handle or borrow".to_string(),
                        ));
                    }
                },
                PlaceElem::Index(index_local) => {
                    let index = self.body.get_local(*index_local).ok_or_else(|| {
                        (
                            ErrorCode::UndeclaredLocal,
                            format!("index references undeclared local {}", index_local),
                        )
                    })?;
                    if !self.session.types.is_integer(index.ty) {
                        return Err((
                            ErrorCode::InvalidProjection,
                            format!("index local {} is not an integer", index_local),
                        ));
                    }
                    match types.kind(ty) {
                        Some(TypeKind::Array { element, .. }) => ty = *element,
                        _ => {
                            return Err((
                                ErrorCode::InvalidProjection,
                                "index projection on a non-array type".to_string(),
                            ));
                        }
                    }
                }
            }
        }
        Ok(ty)
    }

    // ------------------------------------------------------------------
    // Borrow discipline
    // ------------------------------------------------------------------

    /// Borrow temporaries obey a two-statement window: one `Ref` write,
    /// consumed by the call in the very next statement, nowhere else.
    /// Borrow parameters may be read through a deref anywhere and passed
    /// along to calls, but never stored or returned.
    fn check_borrows(&mut self) {
        if self
            .body
            .locals
            .first()
            .map(|local| local.regime == Regime::Borrow)
            .unwrap_or(false)
        {
            self.error_at(
                ErrorCode::BorrowEscape,
                self.body.span,
                MirLocator::function(Stage::Verify, self.fn_index()),
                "the return place has borrow regime",
            );
        }

        let mut writes: HashMap<LocalId, Vec<(BasicBlockId, usize, bool)>> = HashMap::new();
        let mut call_reads: HashMap<LocalId, Vec<(BasicBlockId, usize)>> = HashMap::new();

        for (id, block) in self.body.blocks() {
            for (idx, stmt) in block.statements.iter().enumerate() {
                let locator = self.stmt_locator(id, idx);
                match &stmt.kind {
                    StatementKind::Assign(place, rvalue) => {
                        self.record_borrow_write(place, rvalue, id, idx, stmt.span, &mut writes);
                        match rvalue {
                            Rvalue::Call { args, .. } => {
                                for arg in args {
                                    self.record_borrow_call_arg(
                                        arg,
                                        id,
                                        idx,
                                        stmt.span,
                                        &mut call_reads,
                                    );
                                }
                            }
                            Rvalue::Ref { place } => {
                                if self.is_borrow_local(place.local)
                                    && place.projection.is_empty()
                                {
                                    self.error_at(
                                        ErrorCode::BorrowEscape,
                                        stmt.span,
                                        locator,
                                        "borrow of a borrow local",
                                    );
                                }
                            }
                            other => {
                                for operand in rvalue_operands(other) {
                                    self.check_borrow_escape(operand, stmt.span, locator);
                                }
                            }
                        }
                    }
                    StatementKind::Check(CheckKind::Null { handle }) => {
                        self.check_borrow_escape(handle, stmt.span, locator);
                    }
                    StatementKind::Check(CheckKind::Bounds { array, index }) => {
                        if self.is_borrow_local(array.local) && array.projection.is_empty() {
                            self.error_at(
                                ErrorCode::BorrowEscape,
                                stmt.span,
                                locator,
                                "borrow local used as a checked array",
                            );
                        }
                        self.check_borrow_escape(index, stmt.span, locator);
                    }
                    // Release of a borrow is a regime mismatch, reported
                    // by the release check.
                    StatementKind::Release(_) | StatementKind::Nop => {}
                }
            }
            if let Some(term) = &block.terminator {
                let locator = self.stmt_locator(id, block.statements.len());
                let cond = match &term.kind {
                    TerminatorKind::Branch { cond, .. } => Some(cond),
                    TerminatorKind::Switch { discr, .. } => Some(discr),
                    _ => None,
                };
                if let Some(cond) = cond {
                    self.check_borrow_escape(cond, term.span, locator);
                }
            }
        }

        for (local, write_sites) in writes {
            let reads = call_reads.remove(&local).unwrap_or_default();
            let locator = MirLocator::function(Stage::Verify, self.fn_index());
            let span = self
                .body
                .get_local(local)
                .map(|l| l.span)
                .unwrap_or(self.body.span);

            if write_sites.len() != 1 {
                self.error_at(
                    ErrorCode::BorrowOutsideWindow,
                    span,
                    locator,
                    format!("borrow local {} is written {} times", local, write_sites.len()),
                );
                continue;
            }
            let (write_block, write_idx, is_ref) = write_sites[0];
            if !is_ref {
                self.error_at(
                    ErrorCode::BorrowOutsideWindow,
                    span,
                    locator,
                    format!("borrow local {} is written by a non-borrow rvalue", local),
                );
                continue;
            }
            if reads.len() != 1 {
                self.error_at(
                    ErrorCode::BorrowOutsideWindow,
                    span,
                    locator,
                    format!(
                        "borrow local {} must be consumed exactly once, found {} reads",
                        local,
                        reads.len()
                    ),
                );
                continue;
            }
            let (read_block, read_idx) = reads[0];
            if read_block != write_block || read_idx != write_idx + 1 {
                self.error_at(
                    ErrorCode::BorrowOutsideWindow,
                    span,
                    self.stmt_locator(read_block, read_idx),
                    format!(
                        "borrow local {} is not consumed by the statement after its write",
                        local
                    ),
                );
            }
        }

        // Call-arg reads of borrow temps that were never written.
        for (local, reads) in call_reads {
            if let Some((block, idx)) = reads.first() {
                let locator = self.stmt_locator(*block, *idx);
                self.error_at(
                    ErrorCode::BorrowOutsideWindow,
                    self.body.span,
                    locator,
                    format!("borrow local {} is read but never written", local),
                );
            }
        }
    }

    fn is_borrow_local(&self, local: LocalId) -> bool {
        self.body
            .get_local(local)
            .map(|l| l.regime == Regime::Borrow)
            .unwrap_or(false)
    }

    fn is_borrow_param(&self, local: LocalId) -> bool {
        self.body
            .get_local(local)
            .map(|l| l.regime == Regime::Borrow && l.is_param())
            .unwrap_or(false)
    }

    fn record_borrow_write(
        &mut self,
        place: &Place,
        rvalue: &Rvalue,
        block: BasicBlockId,
        idx: usize,
        span: Span,
        writes: &mut HashMap<LocalId, Vec<(BasicBlockId, usize, bool)>>,
    ) {
        if !self.is_borrow_local(place.local) {
            return;
        }
        let locator = self.stmt_locator(block, idx);
        match place.as_local() {
            Some(dest) => {
                if self.is_borrow_param(dest) {
                    self.error_at(
                        ErrorCode::BorrowOutsideWindow,
                        span,
                        locator,
                        format!("borrow parameter {} is written", dest),
                    );
                } else {
                    writes
                        .entry(dest)
                        .or_default()
                        .push((block, idx, matches!(rvalue, Rvalue::Ref { .. })));
                }
            }
            None => {
                // A store through a borrow is only legal on parameters,
                // and only through the leading deref.
                let through_deref = matches!(place.projection.first(), Some(PlaceElem::Deref));
                if !(self.is_borrow_param(place.local) && through_deref) {
                    self.error_at(
                        ErrorCode::BorrowOutsideWindow,
                        span,
                        locator,
                        format!("store through borrow local {}", place.local),
                    );
                }
            }
        }
    }

    fn record_borrow_call_arg(
        &mut self,
        arg: &Operand,
        block: BasicBlockId,
        idx: usize,
        span: Span,
        call_reads: &mut HashMap<LocalId, Vec<(BasicBlockId, usize)>>,
    ) {
        let Some(place) = arg.place() else { return };
        if !self.is_borrow_local(place.local) {
            return;
        }
        if place.projection.is_empty() {
            // Parameters may be forwarded; temps enter the window ledger.
            if !self.is_borrow_param(place.local) {
                call_reads
                    .entry(place.local)
                    .or_default()
                    .push((block, idx));
            }
        } else if !matches!(place.projection.first(), Some(PlaceElem::Deref)) {
            let locator = self.stmt_locator(block, idx);
            self.error_at(
                ErrorCode::BorrowOutsideWindow,
                span,
                locator,
                format!("unexpected projection on borrow local {}", place.local),
            );
        }
    }

    /// A bare borrow local anywhere outside call arguments is an escape.
    fn check_borrow_escape(&mut self, operand: &Operand, span: Span, locator: MirLocator) {
        let Some(place) = operand.place() else { return };
        if !self.is_borrow_local(place.local) {
            return;
        }
        if place.projection.is_empty() {
            self.error_at(
                ErrorCode::BorrowEscape,
                span,
                locator,
                format!("borrow local {} escapes into a durable location", place.local),
            );
        } else if !(self.is_borrow_param(place.local)
            && matches!(place.projection.first(), Some(PlaceElem::Deref)))
        {
            self.error_at(
                ErrorCode::BorrowOutsideWindow,
                span,
                locator,
                format!("borrow local {} read outside its window", place.local),
            );
        }
    }

    // ------------------------------------------------------------------
    // Releases
    // ------------------------------------------------------------------

    fn check_releases(&mut self) {
        for (id, block) in self.body.blocks() {
            for (idx, stmt) in block.statements.iter().enumerate() {
                let StatementKind::Release(operand) = &stmt.kind else {
                    continue;
                };
                let regime = operand
                    .place()
                    .and_then(|place| self.place_type(place).ok())
                    .and_then(|ty| self.session.types.regime(ty));
                if regime != Some(Regime::ManualHandle) {
                    let locator = self.stmt_locator(id, idx);
                    let descr = regime.map(|r| r.descr()).unwrap_or("constant");
                    self.error_at(
                        ErrorCode::ReleaseRegimeMismatch,
                        stmt.span,
                        locator,
                        format!("release of a {} operand", descr),
                    );
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Strict move tracking
    // ------------------------------------------------------------------

    /// Block-local check: after a `Move` out of a bare manual-handle local
    /// (or its release), reading it again in the same block is rejected.
    fn check_move_reuse(&mut self) {
        for (id, block) in self.body.blocks() {
            let mut moved: HashSet<LocalId> = HashSet::new();

            for (idx, stmt) in block.statements.iter().enumerate() {
                let locator = self.stmt_locator(id, idx);
                let operands: Vec<&Operand> = match &stmt.kind {
                    StatementKind::Assign(_, rvalue) => rvalue_operands(rvalue),
                    StatementKind::Check(CheckKind::Null { handle }) => vec![handle],
                    StatementKind::Check(CheckKind::Bounds { index, .. }) => vec![index],
                    StatementKind::Release(operand) => vec![operand],
                    StatementKind::Nop => Vec::new(),
                };

                for operand in &operands {
                    if let Some(place) = operand.place() {
                        if moved.contains(&place.local) {
                            self.error_at(
                                ErrorCode::MoveReuse,
                                stmt.span,
                                locator,
                                format!("use of moved local {}", place.local),
                            );
                        }
                    }
                }
                for operand in &operands {
                    if let Operand::Move(place) = operand {
                        if let Some(local) = place.as_local() {
                            if self.is_manual_local(local) {
                                moved.insert(local);
                            }
                        }
                    }
                }
                if let StatementKind::Assign(place, _) = &stmt.kind {
                    if let Some(dest) = place.as_local() {
                        moved.remove(&dest);
                    }
                }
            }

            if let Some(term) = &block.terminator {
                let cond = match &term.kind {
                    TerminatorKind::Branch { cond, .. } => Some(cond),
                    TerminatorKind::Switch { discr, .. } => Some(discr),
                    _ => None,
                };
                if let Some(place) = cond.and_then(|c| c.place()) {
                    if moved.contains(&place.local) {
                        let locator = self.stmt_locator(id, block.statements.len());
                        self.error_at(
                            ErrorCode::MoveReuse,
                            term.span,
                            locator,
                            format!("use of moved local {}", place.local),
                        );
                    }
                }
            }
        }
    }

    fn is_manual_local(&self, local: LocalId) -> bool {
        self.body
            .get_local(local)
            .map(|l| l.regime == Regime::ManualHandle)
            .unwrap_or(false)
    }
}

/// The operands a non-`Ref` rvalue reads.
fn rvalue_operands(rvalue: &Rvalue) -> Vec<&Operand> {
    match rvalue {
        Rvalue::Use(operand) | Rvalue::UnaryOp { operand, .. } => vec![operand],
        Rvalue::BinaryOp { left, right, .. } => vec![left, right],
        Rvalue::Call { args, .. } => args.iter().collect(),
        Rvalue::Aggregate { operands } => operands.iter().collect(),
        Rvalue::Ref { .. } => Vec::new(),
    }
}

// ============================================================================
// Tests
// ============================================================================
