//! Desugaring and borrow lowering.
//!
//! Rewrites the typed tree so that only primitive forms remain before CFG
//! construction:
//!
//! - method calls become plain calls with a synthesized borrow of the
//!   receiver prepended to the arguments
//! - compound assignment `x op= e` becomes `x = x op e`
//! - `for i in a..b { .. }` becomes a `let` plus `while` with an explicit
//!   increment
//! - string interpolation becomes a left-to-right fold over the session's
//!   `str_concat` / `to_str` builtins
//!
//! Every rewrite keeps the span of the surface syntax it replaces, so
//! later diagnostics still point at source. Rewrites act on disjoint
//! syntax; order between them does not matter.
//!
//! # Borrow synthesis
//!
//! The borrow's type is the resolved method's first parameter type, so the
//! receiver rewrite never invents a type the checker did not already
//! intern:
//!
//! - value receiver `v.m(args)` → `m(&v, args)`
//! - manual-handle receiver `p.m(args)` → `m(&*p, args)`
//! - gc-handle receiver `r.m(args)` → `m(&*r, args)`
//! - borrow receiver (inside a method body) is passed through unchanged
//!
//! Any other receiver regime is a compiler defect; upstream checking is
//! supposed to make it impossible.

use crate::diagnostics::{Diagnostic, ErrorCode, MirLocator, Stage};
use crate::session::Session;
use crate::span::Span;

use super::def::{FnId, Regime, TypeId};
use super::expr::{BinOp, Block, Expr, ExprKind, InterpPart, LiteralValue, Stmt, StmtKind};
use super::{Function, Module};

/// Desugar every function of a module in place.
///
/// Functions are processed independently; a defect in one function does
/// not stop the others from being rewritten. All diagnostics are returned
/// together.
pub fn desugar_module(session: &Session, module: &mut Module) -> Result<(), Vec<Diagnostic>> {
    let mut diagnostics = Vec::new();
    for function in &mut module.functions {
        if let Err(errors) = desugar_function(session, function) {
            diagnostics.extend(errors);
        }
    }
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Desugar one function body in place.
pub fn desugar_function(session: &Session, function: &mut Function) -> Result<(), Vec<Diagnostic>> {
    let mut desugarer = Desugarer::new(session, function.id);
    for stmt in &mut function.body.stmts {
        desugarer.desugar_stmt(stmt);
    }
    if desugarer.diagnostics.is_empty() {
        Ok(())
    } else {
        Err(desugarer.diagnostics)
    }
}

/// Tree rewriter for one function.
struct Desugarer<'a> {
    session: &'a Session,
    fn_id: FnId,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Desugarer<'a> {
    fn new(session: &'a Session, fn_id: FnId) -> Self {
        Self {
            session,
            fn_id,
            diagnostics: Vec::new(),
        }
    }

    fn defect(&mut self, code: ErrorCode, message: impl Into<String>, span: Span) {
        self.diagnostics.push(
            Diagnostic::error(message, span)
                .with_error_code(code)
                .with_locator(MirLocator::function(Stage::Desugar, self.fn_id.index)),
        );
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn desugar_block(&mut self, block: &mut Block) {
        for stmt in &mut block.stmts {
            self.desugar_stmt(stmt);
        }
    }

    fn desugar_stmt(&mut self, stmt: &mut Stmt) {
        match &mut stmt.kind {
            StmtKind::Let { init, .. } => {
                if let Some(init) = init {
                    self.desugar_expr(init);
                }
            }
            StmtKind::Assign { target, value } => {
                self.desugar_expr(target);
                self.desugar_expr(value);
            }
            StmtKind::CompoundAssign { .. } => {
                let span = stmt.span;
                let kind = std::mem::replace(&mut stmt.kind, StmtKind::Break);
                let StmtKind::CompoundAssign {
                    op,
                    mut target,
                    mut value,
                } = kind
                else {
                    unreachable!()
                };
                self.desugar_expr(&mut target);
                self.desugar_expr(&mut value);
                // x op= e  ->  x = x op e; the duplicated target is a place
                // read, not a re-evaluation for effect.
                let result_ty = target.ty;
                let combined = Expr::new(
                    ExprKind::Binary {
                        op,
                        left: Box::new(target.clone()),
                        right: Box::new(value),
                    },
                    result_ty,
                    span,
                );
                stmt.kind = StmtKind::Assign {
                    target,
                    value: combined,
                };
            }
            StmtKind::Expr(expr) => self.desugar_expr(expr),
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.desugar_expr(cond);
                self.desugar_block(then_branch);
                if let Some(else_branch) = else_branch {
                    self.desugar_block(else_branch);
                }
            }
            StmtKind::While { cond, body } => {
                self.desugar_expr(cond);
                self.desugar_block(body);
            }
            StmtKind::For { .. } => {
                let span = stmt.span;
                let kind = std::mem::replace(&mut stmt.kind, StmtKind::Break);
                let StmtKind::For {
                    var,
                    mut start,
                    mut end,
                    mut body,
                } = kind
                else {
                    unreachable!()
                };
                self.desugar_expr(&mut start);
                self.desugar_expr(&mut end);
                self.desugar_block(&mut body);

                let var_ty = start.ty;
                let Some(bool_ty) = self.bool_type(span) else {
                    return;
                };

                // for i in a..b { body }  ->
                // { let i = a; while i < b { body; i = i + 1; } }
                let var_expr = |s| Expr::new(ExprKind::Local(var), var_ty, s);
                let cond = Expr::new(
                    ExprKind::Binary {
                        op: BinOp::Lt,
                        left: Box::new(var_expr(start.span)),
                        right: Box::new(end),
                    },
                    bool_ty,
                    span,
                );
                let one = Expr::new(ExprKind::Literal(LiteralValue::Int(1)), var_ty, span);
                let increment = Stmt::new(
                    StmtKind::Assign {
                        target: var_expr(span),
                        value: Expr::new(
                            ExprKind::Binary {
                                op: BinOp::Add,
                                left: Box::new(var_expr(span)),
                                right: Box::new(one),
                            },
                            var_ty,
                            span,
                        ),
                    },
                    span,
                );
                body.stmts.push(increment);

                let init = Stmt::new(
                    StmtKind::Let {
                        local: var,
                        init: Some(start),
                    },
                    span,
                );
                let while_stmt = Stmt::new(StmtKind::While { cond, body }, span);
                stmt.kind = StmtKind::Block(Block::new(vec![init, while_stmt], span));
            }
            StmtKind::Break | StmtKind::Continue => {}
            StmtKind::Return { value } => {
                if let Some(value) = value {
                    self.desugar_expr(value);
                }
            }
            StmtKind::Free { handle } => self.desugar_expr(handle),
            StmtKind::Block(block) => self.desugar_block(block),
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn desugar_expr(&mut self, expr: &mut Expr) {
        // Children first, so nested sugar inside a receiver or argument is
        // already primitive when the enclosing node is rewritten.
        match &mut expr.kind {
            ExprKind::Literal(_) | ExprKind::Local(_) | ExprKind::Error => {}
            ExprKind::Binary { left, right, .. } => {
                self.desugar_expr(left);
                self.desugar_expr(right);
            }
            ExprKind::Unary { operand, .. } => self.desugar_expr(operand),
            ExprKind::Call { args, .. } => {
                for arg in args {
                    self.desugar_expr(arg);
                }
            }
            ExprKind::MethodCall { receiver, args, .. } => {
                self.desugar_expr(receiver);
                for arg in args {
                    self.desugar_expr(arg);
                }
            }
            ExprKind::Field { base, .. } => self.desugar_expr(base),
            ExprKind::Index { base, index } => {
                self.desugar_expr(base);
                self.desugar_expr(index);
            }
            ExprKind::StructLiteral { fields } => {
                for field in fields {
                    self.desugar_expr(field);
                }
            }
            ExprKind::StringInterp { parts } => {
                for part in parts {
                    if let InterpPart::Expr(inner) = part {
                        self.desugar_expr(inner);
                    }
                }
            }
            ExprKind::Borrow { place } => self.desugar_expr(place),
            ExprKind::Deref { handle } => self.desugar_expr(handle),
        }

        if expr.is_sugar() {
            self.rewrite_sugar(expr);
        }
    }

    fn rewrite_sugar(&mut self, expr: &mut Expr) {
        let kind = std::mem::replace(&mut expr.kind, ExprKind::Error);
        match kind {
            ExprKind::MethodCall {
                receiver,
                method,
                args,
            } => {
                match self.synthesize_receiver_borrow(*receiver, method, expr.span) {
                    Some(borrow) => {
                        let mut call_args = Vec::with_capacity(args.len() + 1);
                        call_args.push(borrow);
                        call_args.extend(args);
                        expr.kind = ExprKind::Call {
                            func: method,
                            args: call_args,
                        };
                    }
                    None => {
                        // Defect already reported; leave the error node.
                    }
                }
            }
            ExprKind::StringInterp { parts } => {
                if let Some(folded) = self.fold_interpolation(parts, expr.span) {
                    *expr = folded;
                }
            }
            other => expr.kind = other,
        }
    }

    /// Build the borrow operand for a method receiver.
    ///
    /// The borrow's type comes from the resolved method's first parameter,
    /// so it is consistent with what the callee expects by construction.
    fn synthesize_receiver_borrow(
        &mut self,
        receiver: Expr,
        method: FnId,
        span: Span,
    ) -> Option<Expr> {
        let Some(sig) = self.session.fns.get(method) else {
            self.defect(
                ErrorCode::UnknownFunction,
                format!("method call resolves to unregistered function {}", method),
                span,
            );
            return None;
        };
        let Some(&borrow_ty) = sig.params.first() else {
            self.defect(
                ErrorCode::UnknownFunction,
                format!(
                    "method `{}` takes no parameters and cannot receive a borrow",
                    self.session.fn_name(method)
                ),
                span,
            );
            return None;
        };

        let regime = self.session.types.regime(receiver.ty);
        let place = match regime {
            Some(Regime::Value) => receiver,
            Some(Regime::GcHandle) | Some(Regime::ManualHandle) => {
                let Some(pointee) = self.session.types.pointee(receiver.ty) else {
                    self.defect(
                        ErrorCode::UnsupportedReceiverRegime,
                        "handle-regime receiver has no pointee type",
                        receiver.span,
                    );
                    return None;
                };
                let receiver_span = receiver.span;
                Expr::new(
                    ExprKind::Deref {
                        handle: Box::new(receiver),
                    },
                    pointee,
                    receiver_span,
                )
            }
            // Re-borrowing a borrow is a no-op: inside a method body the
            // receiver is already the shape the callee wants.
            Some(Regime::Borrow) => return Some(receiver),
            None => {
                self.defect(
                    ErrorCode::UnsupportedReceiverRegime,
                    format!("receiver type {} is not in the type table", receiver.ty),
                    receiver.span,
                );
                return None;
            }
        };

        let place_span = place.span;
        Some(Expr::new(
            ExprKind::Borrow {
                place: Box::new(place),
            },
            borrow_ty,
            place_span,
        ))
    }

    /// Fold interpolation parts into concat/convert builtin calls.
    fn fold_interpolation(&mut self, parts: Vec<InterpPart>, span: Span) -> Option<Expr> {
        let Some(concat) = self.session.builtins.str_concat else {
            self.defect(
                ErrorCode::MissingInterpolationBuiltin,
                "string interpolation used but no `str_concat` builtin is registered",
                span,
            );
            return None;
        };
        let str_ty = self
            .session
            .fns
            .get(concat)
            .map(|sig| sig.ret)
            .unwrap_or_else(|| {
                self.defect(
                    ErrorCode::UnknownFunction,
                    "`str_concat` builtin is not in the signature table",
                    span,
                );
                TypeId::new(0)
            });

        let mut acc: Option<Expr> = None;
        for part in parts {
            let piece = match part {
                InterpPart::Lit(lit) => Expr::new(
                    ExprKind::Literal(LiteralValue::Str(lit.node.clone())),
                    str_ty,
                    lit.span,
                ),
                InterpPart::Expr(inner) => {
                    if inner.ty == str_ty {
                        inner
                    } else {
                        let Some(to_str) = self.session.builtins.to_str_for(inner.ty) else {
                            self.defect(
                                ErrorCode::MissingInterpolationBuiltin,
                                format!("no `to_str` builtin registered for type {}", inner.ty),
                                inner.span,
                            );
                            return None;
                        };
                        let inner_span = inner.span;
                        Expr::new(
                            ExprKind::Call {
                                func: to_str,
                                args: vec![inner],
                            },
                            str_ty,
                            inner_span,
                        )
                    }
                }
            };
            acc = Some(match acc {
                None => piece,
                Some(left) => {
                    let merged = left.span.merge(piece.span);
                    Expr::new(
                        ExprKind::Call {
                            func: concat,
                            args: vec![left, piece],
                        },
                        str_ty,
                        merged,
                    )
                }
            });
        }

        acc.or_else(|| {
            Some(Expr::new(
                ExprKind::Literal(LiteralValue::Str(String::new())),
                str_ty,
                span,
            ))
        })
    }

    /// The interned bool type, needed for synthesized loop conditions.
    fn bool_type(&mut self, span: Span) -> Option<TypeId> {
        match self.session.types.bool_id() {
            Some(id) => Some(id),
            None => {
                self.defect(
                    ErrorCode::MissingPrimitiveType,
                    "type table has no bool entry for a synthesized loop condition",
                    span,
                );
                None
            }
        }
    }
}
