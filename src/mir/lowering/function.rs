//! Per-function CFG construction.
//!
//! [`FunctionLowering`] walks one desugared body and emits its MIR. The
//! local table carries over with identical ids (return place, params,
//! declared variables), so upstream spans and names survive; temporaries
//! are appended after them.
//!
//! Construction is deliberately naive: every nested expression gets a
//! temporary, every `if` gets all four blocks even when the `else` arm is
//! empty, dead statements after `return`/`break` land in fresh blocks that
//! are sealed with an unreachable trap. The cleanup pass canonicalizes the
//! result; the shapes emitted here only have to be correct, not minimal.

use crate::diagnostics::{Diagnostic, ErrorCode, LimitError, MirLocator, Stage};
use crate::hir::{self, Expr, ExprKind, FnId, LocalId, Stmt, StmtKind, TypeId, TypeKind};
use crate::session::Session;
use crate::span::Span;

use super::super::body::{MirBody, MirBodyBuilder};
use super::super::types::{
    BasicBlockId, CheckKind, Constant, Operand, Place, Rvalue, Statement, StatementKind,
    Terminator, TerminatorKind, TrapReason,
};
use super::util::{convert_binop, convert_unop, lower_literal_to_constant};
use super::LoopContext;

/// An argument waiting to be attached to a call.
///
/// Borrow arguments must be written by the statement immediately before
/// the call that reads them, so their `Ref` assignment is deferred until
/// every other argument has been computed.
enum ArgSlot {
    /// Already evaluated.
    Ready(Operand),
    /// A borrow of this place, to be materialized just before the call.
    Borrow(Place, TypeId),
}

/// Lowers a single function body to MIR.
pub struct FunctionLowering<'a> {
    session: &'a Session,
    fn_id: FnId,
    hir_body: &'a hir::Body,
    builder: MirBodyBuilder,
    loop_stack: Vec<LoopContext>,
}

impl<'a> FunctionLowering<'a> {
    /// Create a lowering for one function.
    pub fn new(session: &'a Session, function: &'a hir::Function) -> Self {
        Self {
            session,
            fn_id: function.id,
            hir_body: &function.body,
            builder: MirBodyBuilder::new(function.id, function.span),
            loop_stack: Vec::new(),
        }
    }

    /// Lower the body to a complete MIR body.
    pub fn lower(mut self) -> Result<MirBody, Vec<Diagnostic>> {
        let body = self.hir_body;
        self.copy_locals();

        if self.builder.local_count() > self.session.limits.max_locals {
            return Err(vec![self.limit(LimitError::LocalLimit {
                limit: self.session.limits.max_locals,
                span: body.span,
            })]);
        }

        for stmt in &body.stmts {
            self.lower_stmt(stmt).map_err(|d| vec![d])?;
        }

        // Implicit `return` at the end of a unit function. A non-unit
        // function only reaches here through the dead join after its last
        // `return`; sealing handles that below.
        if !self.builder.is_current_terminated() {
            let ret_ty = body.return_type();
            if matches!(self.session.types.kind(ret_ty), Some(TypeKind::Unit)) {
                self.assign(
                    Place::return_place(),
                    Rvalue::Use(Operand::Constant(Constant::unit(ret_ty))),
                    body.span,
                );
                self.builder
                    .terminate(Terminator::new(TerminatorKind::Return, body.span));
            }
        }

        let mut mir = self.builder.finish();
        let span = mir.span;
        for block in &mut mir.basic_blocks {
            if block.terminator.is_none() {
                block.terminator = Some(Terminator::new(
                    TerminatorKind::Trap {
                        reason: TrapReason::Unreachable,
                    },
                    span,
                ));
            }
        }
        Ok(mir)
    }

    /// Copy the upstream local table, preserving ids.
    fn copy_locals(&mut self) {
        let body = self.hir_body;
        let ret_ty = body.return_type();
        let ret_regime = self.regime_of(ret_ty);
        self.builder.set_return_type(ret_ty, ret_regime);

        for local in body.locals.iter().skip(1) {
            let regime = self.regime_of(local.ty);
            if (local.id.index as usize) <= body.param_count {
                self.builder.add_param(local.name, local.ty, regime, local.span);
            } else {
                self.builder
                    .add_var(local.name, local.ty, regime, local.mutable, local.span);
            }
        }
    }

    // ------------------------------------------------------------------
    // Builder plumbing
    // ------------------------------------------------------------------

    fn regime_of(&self, ty: TypeId) -> hir::Regime {
        self.session.types.regime(ty).unwrap_or(hir::Regime::Value)
    }

    fn locator(&self) -> MirLocator {
        MirLocator::block(
            Stage::Lowering,
            self.fn_id.index,
            self.builder.current_block().0,
        )
    }

    fn defect(&self, code: ErrorCode, span: Span, message: impl Into<String>) -> Diagnostic {
        Diagnostic::error(message, span)
            .with_error_code(code)
            .with_locator(self.locator())
    }

    fn limit(&self, error: LimitError) -> Diagnostic {
        Diagnostic::from(error).with_locator(MirLocator::function(Stage::Lowering, self.fn_id.index))
    }

    fn fresh_block(&mut self, span: Span) -> Result<BasicBlockId, Diagnostic> {
        if self.builder.block_count() >= self.session.limits.max_blocks {
            return Err(self.limit(LimitError::BlockLimit {
                limit: self.session.limits.max_blocks,
                span,
            }));
        }
        Ok(self.builder.new_block())
    }

    fn fresh_temp(&mut self, ty: TypeId, span: Span) -> Result<LocalId, Diagnostic> {
        if self.builder.local_count() >= self.session.limits.max_locals {
            return Err(self.limit(LimitError::LocalLimit {
                limit: self.session.limits.max_locals,
                span,
            }));
        }
        let regime = self.regime_of(ty);
        Ok(self.builder.new_temp(ty, regime, span))
    }

    fn assign(&mut self, place: Place, rvalue: Rvalue, span: Span) {
        self.builder
            .push_stmt(Statement::new(StatementKind::Assign(place, rvalue), span));
    }

    fn goto(&mut self, target: BasicBlockId, span: Span) {
        self.builder
            .terminate(Terminator::new(TerminatorKind::Goto { target }, span));
    }

    /// Make sure statements can still be appended.
    ///
    /// After `return`, `break`, or `continue` the source may carry dead
    /// statements; they go into a fresh block that ends up sealed with an
    /// unreachable trap and swept by cleanup.
    fn ensure_open(&mut self, span: Span) -> Result<(), Diagnostic> {
        if self.builder.is_current_terminated() {
            let block = self.fresh_block(span)?;
            self.builder.switch_to(block);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn lower_block(&mut self, block: &hir::Block) -> Result<(), Diagnostic> {
        for stmt in &block.stmts {
            self.lower_stmt(stmt)?;
        }
        Ok(())
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> Result<(), Diagnostic> {
        self.ensure_open(stmt.span)?;
        match &stmt.kind {
            StmtKind::Let { local, init } => {
                if let Some(init) = init {
                    self.expr_into_place(init, Place::local(*local))?;
                }
                Ok(())
            }

            StmtKind::Assign { target, value } => {
                let place = self.lower_place(target)?;
                self.expr_into_place(value, place)
            }

            StmtKind::Expr(expr) => {
                // Only calls are observable; everything else still gets
                // evaluated so its checks fire, and the dead result falls
                // to the eliminator.
                let temp = self.fresh_temp(expr.ty, expr.span)?;
                self.expr_into_place(expr, Place::local(temp))
            }

            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => self.lower_if(cond, then_branch, else_branch.as_ref(), stmt.span),

            StmtKind::While { cond, body } => self.lower_while(cond, body, stmt.span),

            StmtKind::Break => match self.loop_stack.last().copied() {
                Some(ctx) => {
                    self.goto(ctx.break_block, stmt.span);
                    Ok(())
                }
                None => Err(self.defect(
                    ErrorCode::ErrorNode,
                    stmt.span,
                    "`break` outside a loop reached the middle end",
                )),
            },

            StmtKind::Continue => match self.loop_stack.last().copied() {
                Some(ctx) => {
                    self.goto(ctx.continue_block, stmt.span);
                    Ok(())
                }
                None => Err(self.defect(
                    ErrorCode::ErrorNode,
                    stmt.span,
                    "`continue` outside a loop reached the middle end",
                )),
            },

            StmtKind::Return { value } => {
                match value {
                    Some(expr) => self.expr_into_place(expr, Place::return_place())?,
                    None => {
                        let ret_ty = self.hir_body.return_type();
                        self.assign(
                            Place::return_place(),
                            Rvalue::Use(Operand::Constant(Constant::unit(ret_ty))),
                            stmt.span,
                        );
                    }
                }
                self.builder
                    .terminate(Terminator::new(TerminatorKind::Return, stmt.span));
                Ok(())
            }

            StmtKind::Free { handle } => {
                let operand = self.lower_operand(handle)?;
                // A release transfers the handle; the source is dead after.
                let operand = match operand {
                    Operand::Copy(place) => Operand::Move(place),
                    other => other,
                };
                self.builder
                    .push_stmt(Statement::new(StatementKind::Release(operand), stmt.span));
                Ok(())
            }

            StmtKind::Block(block) => self.lower_block(block),

            StmtKind::CompoundAssign { .. } | StmtKind::For { .. } => Err(self.defect(
                ErrorCode::ResidualSugar,
                stmt.span,
                "sugar statement survived desugaring",
            )),
        }
    }

    /// `if`: condition in the current block, then four-way shape.
    fn lower_if(
        &mut self,
        cond: &Expr,
        then_branch: &hir::Block,
        else_branch: Option<&hir::Block>,
        span: Span,
    ) -> Result<(), Diagnostic> {
        let cond_op = self.lower_operand(cond)?;
        let then_block = self.fresh_block(span)?;
        let else_block = self.fresh_block(span)?;
        let join_block = self.fresh_block(span)?;
        self.builder.terminate(Terminator::new(
            TerminatorKind::Branch {
                cond: cond_op,
                then_block,
                else_block,
            },
            cond.span,
        ));

        self.builder.switch_to(then_block);
        self.lower_block(then_branch)?;
        if !self.builder.is_current_terminated() {
            self.goto(join_block, span);
        }

        // The else block exists even for a one-armed `if`; cleanup threads
        // the empty goto away.
        self.builder.switch_to(else_block);
        if let Some(else_branch) = else_branch {
            self.lower_block(else_branch)?;
        }
        if !self.builder.is_current_terminated() {
            self.goto(join_block, span);
        }

        self.builder.switch_to(join_block);
        Ok(())
    }

    /// `while`: dedicated header block so the back-edge re-evaluates the
    /// condition.
    fn lower_while(
        &mut self,
        cond: &Expr,
        body: &hir::Block,
        span: Span,
    ) -> Result<(), Diagnostic> {
        let header = self.fresh_block(span)?;
        self.goto(header, span);
        self.builder.switch_to(header);

        let cond_op = self.lower_operand(cond)?;
        let body_block = self.fresh_block(span)?;
        let exit_block = self.fresh_block(span)?;
        self.builder.terminate(Terminator::new(
            TerminatorKind::Branch {
                cond: cond_op,
                then_block: body_block,
                else_block: exit_block,
            },
            cond.span,
        ));

        self.loop_stack.push(LoopContext {
            break_block: exit_block,
            continue_block: header,
        });
        self.builder.switch_to(body_block);
        let result = self.lower_block(body);
        self.loop_stack.pop();
        result?;

        if !self.builder.is_current_terminated() {
            self.goto(header, span);
        }
        self.builder.switch_to(exit_block);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// Evaluate an expression into a destination place.
    fn expr_into_place(&mut self, expr: &Expr, dest: Place) -> Result<(), Diagnostic> {
        match &expr.kind {
            ExprKind::Binary { op, left, right } if op.is_lazy() => {
                match dest.as_local() {
                    Some(local) => self.lower_lazy(*op, left, right, local, expr.ty, expr.span),
                    None => {
                        // Short-circuit shapes write their result several
                        // times; route through a temporary when the
                        // destination is projected.
                        let temp = self.fresh_temp(expr.ty, expr.span)?;
                        self.lower_lazy(*op, left, right, temp, expr.ty, expr.span)?;
                        self.assign(
                            dest,
                            Rvalue::Use(Operand::Copy(Place::local(temp))),
                            expr.span,
                        );
                        Ok(())
                    }
                }
            }
            _ => {
                let rvalue = self.lower_rvalue(expr)?;
                self.assign(dest, rvalue, expr.span);
                Ok(())
            }
        }
    }

    /// Evaluate an expression to an operand, spilling to a temporary when
    /// it is not already a constant or a place.
    fn lower_operand(&mut self, expr: &Expr) -> Result<Operand, Diagnostic> {
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(Operand::Constant(lower_literal_to_constant(
                lit, expr.ty,
            ))),
            ExprKind::Local(id) => Ok(Operand::Copy(Place::local(*id))),
            ExprKind::Field { .. } | ExprKind::Index { .. } | ExprKind::Deref { .. } => {
                let place = self.lower_place(expr)?;
                Ok(Operand::Copy(place))
            }
            ExprKind::Borrow { place } => {
                // A borrow outside a call argument list; materialize it
                // right here so the consuming statement follows directly.
                let inner = self.lower_place_or_spill(place)?;
                let temp = self.fresh_temp(expr.ty, expr.span)?;
                self.assign(Place::local(temp), Rvalue::Ref { place: inner }, expr.span);
                Ok(Operand::Move(Place::local(temp)))
            }
            _ => {
                let temp = self.fresh_temp(expr.ty, expr.span)?;
                self.expr_into_place(expr, Place::local(temp))?;
                Ok(Operand::Copy(Place::local(temp)))
            }
        }
    }

    /// Evaluate an expression to an rvalue.
    ///
    /// A `Call` rvalue comes back with its borrow arguments already
    /// written, so the caller must emit the assignment as the very next
    /// statement.
    fn lower_rvalue(&mut self, expr: &Expr) -> Result<Rvalue, Diagnostic> {
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(Rvalue::Use(Operand::Constant(
                lower_literal_to_constant(lit, expr.ty),
            ))),

            ExprKind::Local(id) => Ok(Rvalue::Use(Operand::Copy(Place::local(*id)))),

            ExprKind::Binary { op, left, right } => {
                debug_assert!(!op.is_lazy(), "lazy operators handled in expr_into_place");
                let left = self.lower_operand(left)?;
                let right = self.lower_operand(right)?;
                Ok(Rvalue::BinaryOp {
                    op: convert_binop(*op),
                    left,
                    right,
                })
            }

            ExprKind::Unary { op, operand } => {
                let operand = self.lower_operand(operand)?;
                Ok(Rvalue::UnaryOp {
                    op: convert_unop(*op),
                    operand,
                })
            }

            ExprKind::Call { func, args } => self.lower_call(*func, args, expr.span),

            ExprKind::Field { .. } | ExprKind::Index { .. } | ExprKind::Deref { .. } => {
                let place = self.lower_place(expr)?;
                Ok(Rvalue::Use(Operand::Copy(place)))
            }

            ExprKind::StructLiteral { fields } => {
                let mut operands = Vec::with_capacity(fields.len());
                for field in fields {
                    operands.push(self.lower_operand(field)?);
                }
                Ok(Rvalue::Aggregate { operands })
            }

            ExprKind::Borrow { place } => {
                let inner = self.lower_place_or_spill(place)?;
                Ok(Rvalue::Ref { place: inner })
            }

            ExprKind::MethodCall { .. } | ExprKind::StringInterp { .. } => Err(self.defect(
                ErrorCode::ResidualSugar,
                expr.span,
                "sugar expression survived desugaring",
            )),

            ExprKind::Error => Err(self.defect(
                ErrorCode::ErrorNode,
                expr.span,
                "error placeholder reached CFG construction",
            )),
        }
    }

    /// Lower a call's arguments and produce the `Call` rvalue.
    ///
    /// Non-borrow arguments are computed first; the `Ref` writes for
    /// borrow arguments come last so each borrow temporary is consumed by
    /// the statement right after its write.
    fn lower_call(
        &mut self,
        func: FnId,
        args: &[Expr],
        span: Span,
    ) -> Result<Rvalue, Diagnostic> {
        if self.session.fns.get(func).is_none() {
            return Err(self.defect(
                ErrorCode::UnknownFunction,
                span,
                format!("call to unknown function {}", func),
            ));
        }

        let mut slots = Vec::with_capacity(args.len());
        for arg in args {
            match &arg.kind {
                ExprKind::Borrow { place } => {
                    let place = self.lower_place_or_spill(place)?;
                    slots.push(ArgSlot::Borrow(place, arg.ty));
                }
                _ => slots.push(ArgSlot::Ready(self.lower_operand(arg)?)),
            }
        }

        let mut operands = Vec::with_capacity(slots.len());
        for slot in slots {
            match slot {
                ArgSlot::Ready(operand) => operands.push(operand),
                ArgSlot::Borrow(place, ty) => {
                    let temp = self.fresh_temp(ty, span)?;
                    self.assign(Place::local(temp), Rvalue::Ref { place }, span);
                    operands.push(Operand::Move(Place::local(temp)));
                }
            }
        }

        Ok(Rvalue::Call {
            func,
            args: operands,
        })
    }

    /// Short-circuit `&&` / `||` into the branch shape, writing `dest`.
    fn lower_lazy(
        &mut self,
        op: hir::BinOp,
        left: &Expr,
        right: &Expr,
        dest: LocalId,
        ty: TypeId,
        span: Span,
    ) -> Result<(), Diagnostic> {
        let lhs = self.lower_operand(left)?;
        // The short-circuit result is in place before the branch; the
        // right-hand block overwrites it when taken.
        let short_circuit = matches!(op, hir::BinOp::Or);
        self.assign(
            Place::local(dest),
            Rvalue::Use(Operand::Constant(Constant::bool(ty, short_circuit))),
            span,
        );

        let rhs_block = self.fresh_block(span)?;
        let join_block = self.fresh_block(span)?;
        let (then_block, else_block) = match op {
            hir::BinOp::And => (rhs_block, join_block),
            hir::BinOp::Or => (join_block, rhs_block),
            _ => panic!("ICE: lower_lazy on a strict operator"),
        };
        self.builder.terminate(Terminator::new(
            TerminatorKind::Branch {
                cond: lhs,
                then_block,
                else_block,
            },
            left.span,
        ));

        self.builder.switch_to(rhs_block);
        self.expr_into_place(right, Place::local(dest))?;
        if !self.builder.is_current_terminated() {
            self.goto(join_block, span);
        }
        self.builder.switch_to(join_block);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Places
    // ------------------------------------------------------------------

    /// Lower a place expression, emitting its runtime checks.
    fn lower_place(&mut self, expr: &Expr) -> Result<Place, Diagnostic> {
        match &expr.kind {
            ExprKind::Local(id) => Ok(Place::local(*id)),

            ExprKind::Field { base, field } => {
                let base = self.lower_place_or_spill(base)?;
                Ok(base.field(field.index))
            }

            ExprKind::Index { base, index } => {
                let base = self.lower_place_or_spill(base)?;
                // The index projection carries a bare local, so constants
                // and compound indices spill first.
                let index_op = self.lower_operand(index)?;
                let index_local = match index_op {
                    Operand::Copy(place) if place.projection.is_empty() => place.local,
                    other => {
                        let temp = self.fresh_temp(index.ty, index.span)?;
                        self.assign(Place::local(temp), Rvalue::Use(other), index.span);
                        temp
                    }
                };
                self.builder.push_stmt(Statement::new(
                    StatementKind::Check(CheckKind::Bounds {
                        array: base.clone(),
                        index: Operand::Copy(Place::local(index_local)),
                    }),
                    expr.span,
                ));
                Ok(base.index(index_local))
            }

            ExprKind::Deref { handle } => {
                let place = self.lower_place_or_spill(handle)?;
                // Borrows are non-null by construction; handles are not.
                if self.regime_of(handle.ty).is_handle() {
                    self.builder.push_stmt(Statement::new(
                        StatementKind::Check(CheckKind::Null {
                            handle: Operand::Copy(place.clone()),
                        }),
                        expr.span,
                    ));
                }
                Ok(place.deref())
            }

            ExprKind::Error => Err(self.defect(
                ErrorCode::ErrorNode,
                expr.span,
                "error placeholder reached CFG construction",
            )),

            _ => self.lower_place_or_spill(expr),
        }
    }

    /// Like [`lower_place`], but spills value-producing expressions into a
    /// temporary so they can be projected (e.g. `f().x`).
    fn lower_place_or_spill(&mut self, expr: &Expr) -> Result<Place, Diagnostic> {
        match &expr.kind {
            ExprKind::Local(_)
            | ExprKind::Field { .. }
            | ExprKind::Index { .. }
            | ExprKind::Deref { .. } => self.lower_place(expr),
            _ => {
                let temp = self.fresh_temp(expr.ty, expr.span)?;
                self.expr_into_place(expr, Place::local(temp))?;
                Ok(Place::local(temp))
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
