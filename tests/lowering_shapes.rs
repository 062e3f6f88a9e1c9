//! End-to-end CFG construction tests: desugared trees in, canonical MIR
//! shapes out, through the public API.

use marrow_mir::hir::{
    BinOp, Block, Body, Expr, ExprKind, FnId, FnSig, FnTable, Function, IntTy, LiteralValue,
    Local, LocalId, Module, Regime, Stmt, StmtKind, SymbolId, TypeId, TypeKind, TypeTable,
};
use marrow_mir::mir::{
    BasicBlockId, LocalKind, MirBody, MirLowering, Operand, Rvalue, StatementKind, TerminatorKind,
};
use marrow_mir::{desugar_module, BuiltinFns, Session, Span};

struct Fixture {
    session: Session,
    unit: TypeId,
    bool_ty: TypeId,
    i64_ty: TypeId,
    borrow_ty: TypeId,
    method: FnId,
}

impl Fixture {
    fn new() -> Self {
        let mut types = TypeTable::new();
        let unit = types.push(TypeKind::Unit, Regime::Value);
        let bool_ty = types.push(TypeKind::Bool, Regime::Value);
        let i64_ty = types.push(TypeKind::Int(IntTy::I64), Regime::Value);
        let borrow_ty = types.push(TypeKind::Borrow { inner: i64_ty }, Regime::Borrow);

        let mut fns = FnTable::new();
        let method = fns.push(FnSig {
            name: SymbolId::new(0),
            params: vec![borrow_ty],
            ret: unit,
            span: Span::dummy(),
        });

        let session = Session::new(
            types,
            fns,
            string_interner::DefaultStringInterner::new(),
            BuiltinFns::new(),
        );
        Self {
            session,
            unit,
            bool_ty,
            i64_ty,
            borrow_ty,
            method,
        }
    }

    fn lower_one(&self, function: Function) -> MirBody {
        let mut module = Module {
            functions: vec![function],
        };
        desugar_module(&self.session, &mut module).expect("desugaring failed");
        let bodies = MirLowering::new(&self.session)
            .lower_module(&module)
            .expect("lowering failed");
        bodies.into_values().next().expect("one body")
    }
}

fn local(id: u32, ty: TypeId) -> Local {
    Local {
        id: LocalId::new(id),
        ty,
        mutable: true,
        name: None,
        span: Span::dummy(),
    }
}

fn function(locals: Vec<Local>, param_count: usize, stmts: Vec<Stmt>) -> Function {
    Function {
        id: FnId::new(0),
        body: Body {
            locals,
            param_count,
            stmts,
            span: Span::dummy(),
        },
        span: Span::dummy(),
    }
}

fn local_expr(id: u32, ty: TypeId) -> Expr {
    Expr::new(ExprKind::Local(LocalId::new(id)), ty, Span::dummy())
}

fn int(value: i128, ty: TypeId) -> Expr {
    Expr::new(ExprKind::Literal(LiteralValue::Int(value)), ty, Span::dummy())
}

fn assign(target: Expr, value: Expr) -> Stmt {
    Stmt::new(StmtKind::Assign { target, value }, Span::dummy())
}

#[test]
fn test_if_produces_branch_arms_and_join() {
    let fx = Fixture::new();
    let cond = Expr::new(
        ExprKind::Binary {
            op: BinOp::Gt,
            left: Box::new(local_expr(1, fx.i64_ty)),
            right: Box::new(int(0, fx.i64_ty)),
        },
        fx.bool_ty,
        Span::dummy(),
    );
    let body = fx.lower_one(function(
        vec![local(0, fx.unit), local(1, fx.i64_ty)],
        0,
        vec![Stmt::new(
            StmtKind::If {
                cond,
                then_branch: Block::new(
                    vec![assign(local_expr(1, fx.i64_ty), int(1, fx.i64_ty))],
                    Span::dummy(),
                ),
                else_branch: Some(Block::new(
                    vec![assign(local_expr(1, fx.i64_ty), int(2, fx.i64_ty))],
                    Span::dummy(),
                )),
            },
            Span::dummy(),
        )],
    ));

    assert_eq!(body.basic_blocks.len(), 4);
    let (then_block, else_block) = match body.basic_blocks[0].terminator.as_ref().map(|t| &t.kind)
    {
        Some(TerminatorKind::Branch {
            then_block,
            else_block,
            ..
        }) => (*then_block, *else_block),
        other => panic!("entry must branch, got {:?}", other),
    };
    for arm in [then_block, else_block] {
        match body.basic_blocks[arm.index()].terminator.as_ref().map(|t| &t.kind) {
            Some(TerminatorKind::Goto { target }) => assert_eq!(*target, BasicBlockId::new(3)),
            other => panic!("arm must rejoin, got {:?}", other),
        }
    }
}

#[test]
fn test_while_condition_reevaluates_through_header() {
    let fx = Fixture::new();
    let cond = Expr::new(
        ExprKind::Binary {
            op: BinOp::Lt,
            left: Box::new(local_expr(1, fx.i64_ty)),
            right: Box::new(int(10, fx.i64_ty)),
        },
        fx.bool_ty,
        Span::dummy(),
    );
    let body = fx.lower_one(function(
        vec![local(0, fx.unit), local(1, fx.i64_ty)],
        0,
        vec![Stmt::new(
            StmtKind::While {
                cond,
                body: Block::new(
                    vec![assign(
                        local_expr(1, fx.i64_ty),
                        Expr::new(
                            ExprKind::Binary {
                                op: BinOp::Add,
                                left: Box::new(local_expr(1, fx.i64_ty)),
                                right: Box::new(int(1, fx.i64_ty)),
                            },
                            fx.i64_ty,
                            Span::dummy(),
                        ),
                    )],
                    Span::dummy(),
                ),
            },
            Span::dummy(),
        )],
    ));

    // entry -> header; header branches; body jumps back to the header.
    let header = match body.basic_blocks[0].terminator.as_ref().map(|t| &t.kind) {
        Some(TerminatorKind::Goto { target }) => *target,
        other => panic!("entry must jump to the loop header, got {:?}", other),
    };
    let loop_body = match body.basic_blocks[header.index()]
        .terminator
        .as_ref()
        .map(|t| &t.kind)
    {
        Some(TerminatorKind::Branch { then_block, .. }) => *then_block,
        other => panic!("header must branch, got {:?}", other),
    };
    match body.basic_blocks[loop_body.index()]
        .terminator
        .as_ref()
        .map(|t| &t.kind)
    {
        Some(TerminatorKind::Goto { target }) => assert_eq!(*target, header),
        other => panic!("loop body must close the back-edge, got {:?}", other),
    }
}

#[test]
fn test_method_call_borrow_feeds_the_call_directly() {
    let fx = Fixture::new();
    let call = Expr::new(
        ExprKind::MethodCall {
            receiver: Box::new(local_expr(1, fx.i64_ty)),
            method: fx.method,
            args: vec![],
        },
        fx.unit,
        Span::dummy(),
    );
    let body = fx.lower_one(function(
        vec![local(0, fx.unit), local(1, fx.i64_ty)],
        0,
        vec![Stmt::new(StmtKind::Expr(call), Span::dummy())],
    ));

    let stmts = &body.basic_blocks[0].statements;
    let call_idx = stmts
        .iter()
        .position(|s| matches!(&s.kind, StatementKind::Assign(_, Rvalue::Call { .. })))
        .expect("call statement");
    assert!(call_idx > 0, "a borrow write must precede the call");

    let borrow_local = match &stmts[call_idx - 1].kind {
        StatementKind::Assign(place, Rvalue::Ref { .. }) => {
            let id = place.as_local().expect("borrow destination is bare");
            assert_eq!(body.locals[id.index as usize].ty, fx.borrow_ty);
            id
        }
        other => panic!("statement before the call must write the borrow, got {:?}", other),
    };
    match &stmts[call_idx].kind {
        StatementKind::Assign(_, Rvalue::Call { args, .. }) => {
            assert!(matches!(
                &args[0],
                Operand::Move(p) if p.as_local() == Some(borrow_local)
            ));
        }
        _ => unreachable!(),
    }
}

#[test]
fn test_local_ids_carry_over_from_upstream() {
    let fx = Fixture::new();
    let body = fx.lower_one(function(
        vec![
            local(0, fx.i64_ty),
            local(1, fx.i64_ty),
            local(2, fx.i64_ty),
        ],
        1,
        vec![Stmt::new(
            StmtKind::Return {
                value: Some(local_expr(1, fx.i64_ty)),
            },
            Span::dummy(),
        )],
    ));

    assert_eq!(body.param_count, 1);
    assert_eq!(body.locals[0].kind, LocalKind::ReturnPlace);
    assert_eq!(body.locals[1].kind, LocalKind::Arg);
    assert_eq!(body.locals[2].kind, LocalKind::Var);
    for (index, mir_local) in body.locals.iter().enumerate().take(3) {
        assert_eq!(mir_local.id.index as usize, index);
    }
}

#[test]
fn test_nested_expressions_spill_to_temporaries() {
    let fx = Fixture::new();
    // _1 = (_2 + 3) * (_2 + 4)
    let sum = |v: i128| {
        Expr::new(
            ExprKind::Binary {
                op: BinOp::Add,
                left: Box::new(local_expr(2, fx.i64_ty)),
                right: Box::new(int(v, fx.i64_ty)),
            },
            fx.i64_ty,
            Span::dummy(),
        )
    };
    let product = Expr::new(
        ExprKind::Binary {
            op: BinOp::Mul,
            left: Box::new(sum(3)),
            right: Box::new(sum(4)),
        },
        fx.i64_ty,
        Span::dummy(),
    );
    let body = fx.lower_one(function(
        vec![
            local(0, fx.unit),
            local(1, fx.i64_ty),
            local(2, fx.i64_ty),
        ],
        0,
        vec![assign(local_expr(1, fx.i64_ty), product)],
    ));

    // Both operand sums spill; the table grows past the upstream three.
    assert!(body.locals.len() > 3, "expected spilled temporaries");
    assert!(body
        .locals
        .iter()
        .skip(3)
        .all(|l| l.kind == LocalKind::Temp));
}
