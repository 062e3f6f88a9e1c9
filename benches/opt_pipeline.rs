//! Optimization pipeline benchmarks using criterion.
//!
//! Measures CFG construction and the full optimization pipeline over
//! synthetic bodies of increasing size.
//!
//! Run with: cargo bench --bench opt_pipeline

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use marrow_mir::hir::{
    BinOp, Block, Body, Expr, ExprKind, FnId, FnTable, Function, IntTy, LiteralValue, Local,
    LocalId, Module, Regime, Stmt, StmtKind, TypeId, TypeKind, TypeTable,
};
use marrow_mir::mir::{optimize_body, MirBody, MirLowering};
use marrow_mir::{BuiltinFns, Session, Span};

struct Workload {
    session: Session,
    module: Module,
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

fn local_expr(id: u32, ty: TypeId) -> Expr {
    Expr::new(ExprKind::Local(LocalId::new(id)), ty, Span::dummy())
}

fn int(value: i128, ty: TypeId) -> Expr {
    Expr::new(ExprKind::Literal(LiteralValue::Int(value)), ty, Span::dummy())
}

fn binary(op: BinOp, left: Expr, right: Expr, ty: TypeId) -> Expr {
    Expr::new(
        ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        ty,
        Span::dummy(),
    )
}

/// A function with `chain` foldable assignments feeding one live variable
/// through an if-ladder, so every pass has work to do.
fn workload(chain: usize) -> Workload {
    let mut types = TypeTable::new();
    let _unit = types.push(TypeKind::Unit, Regime::Value);
    let bool_ty = types.push(TypeKind::Bool, Regime::Value);
    let i64_ty = types.push(TypeKind::Int(IntTy::I64), Regime::Value);
    let session = Session::new(
        types,
        FnTable::new(),
        string_interner::DefaultStringInterner::new(),
        BuiltinFns::new(),
    );

    // _0: return slot, _1: accumulator, _2..: one variable per chain link.
    let mut locals = vec![local(0, i64_ty), local(1, i64_ty)];
    let mut stmts = Vec::with_capacity(chain * 2);
    stmts.push(Stmt::new(
        StmtKind::Assign {
            target: local_expr(1, i64_ty),
            value: int(0, i64_ty),
        },
        Span::dummy(),
    ));

    for i in 0..chain {
        let var = 2 + i as u32;
        locals.push(local(var, i64_ty));
        // let v_i = i * 3 + 1  (entirely foldable)
        stmts.push(Stmt::new(
            StmtKind::Assign {
                target: local_expr(var, i64_ty),
                value: binary(
                    BinOp::Add,
                    binary(BinOp::Mul, int(i as i128, i64_ty), int(3, i64_ty), i64_ty),
                    int(1, i64_ty),
                    i64_ty,
                ),
            },
            Span::dummy(),
        ));
        // if v_i > acc { acc = v_i; }
        stmts.push(Stmt::new(
            StmtKind::If {
                cond: binary(
                    BinOp::Gt,
                    local_expr(var, i64_ty),
                    local_expr(1, i64_ty),
                    bool_ty,
                ),
                then_branch: Block::new(
                    vec![Stmt::new(
                        StmtKind::Assign {
                            target: local_expr(1, i64_ty),
                            value: local_expr(var, i64_ty),
                        },
                        Span::dummy(),
                    )],
                    Span::dummy(),
                ),
                else_branch: None,
            },
            Span::dummy(),
        ));
    }
    stmts.push(Stmt::new(
        StmtKind::Return {
            value: Some(local_expr(1, i64_ty)),
        },
        Span::dummy(),
    ));

    let module = Module {
        functions: vec![Function {
            id: FnId::new(0),
            body: Body {
                locals,
                param_count: 0,
                stmts,
                span: Span::dummy(),
            },
            span: Span::dummy(),
        }],
    };
    Workload { session, module }
}

fn lower(workload: &Workload) -> MirBody {
    MirLowering::new(&workload.session)
        .lower_module(&workload.module)
        .expect("lowering failed")
        .into_values()
        .next()
        .expect("one body")
}

fn bench_lowering(c: &mut Criterion) {
    let mut group = c.benchmark_group("lowering");
    for chain in [16usize, 64, 256] {
        let w = workload(chain);
        group.bench_with_input(BenchmarkId::from_parameter(chain), &w, |b, w| {
            b.iter(|| black_box(lower(w)));
        });
    }
    group.finish();
}

fn bench_optimize(c: &mut Criterion) {
    let mut group = c.benchmark_group("optimize");
    for chain in [16usize, 64, 256] {
        let w = workload(chain);
        let body = lower(&w);
        group.bench_with_input(BenchmarkId::from_parameter(chain), &body, |b, body| {
            b.iter(|| {
                let mut body = body.clone();
                optimize_body(&w.session.types, &mut body, &w.session.limits)
                    .expect("pipeline failed");
                black_box(body)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_lowering, bench_optimize);
criterion_main!(benches);
