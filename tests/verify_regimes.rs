//! Verifier tests over the ownership regimes: release discipline, borrow
//! windows, and strict move tracking.

use marrow_mir::hir::{
    FnId, FnSig, FnTable, IntTy, LocalId, Regime, SymbolId, TypeId, TypeKind, TypeTable,
};
use marrow_mir::mir::{
    validate_body, validate_module, BasicBlockId, Constant, LocalKind, MirBody, Operand, Place,
    Rvalue, Statement, StatementKind, Terminator, TerminatorKind,
};
use marrow_mir::{BuiltinFns, Session, Span, Strictness};

struct Fixture {
    session: Session,
    unit: TypeId,
    i64_ty: TypeId,
    gc_handle: TypeId,
    manual_handle: TypeId,
    borrow_ty: TypeId,
    callee: FnId,
}

impl Fixture {
    fn new() -> Self {
        let mut types = TypeTable::new();
        let unit = types.push(TypeKind::Unit, Regime::Value);
        let _bool = types.push(TypeKind::Bool, Regime::Value);
        let i64_ty = types.push(TypeKind::Int(IntTy::I64), Regime::Value);
        let gc_handle = types.push(TypeKind::Handle { inner: i64_ty }, Regime::GcHandle);
        let manual_handle = types.push(TypeKind::Handle { inner: i64_ty }, Regime::ManualHandle);
        let borrow_ty = types.push(TypeKind::Borrow { inner: i64_ty }, Regime::Borrow);

        let mut fns = FnTable::new();
        let callee = fns.push(FnSig {
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
            i64_ty,
            gc_handle,
            manual_handle,
            borrow_ty,
            callee,
        }
    }

    fn strict(&self) -> Session {
        Session::new(
            self.session.types.clone(),
            self.session.fns.clone(),
            string_interner::DefaultStringInterner::new(),
            BuiltinFns::new(),
        )
        .with_strictness(Strictness::Strict)
    }
}

fn empty_body(fx: &Fixture) -> MirBody {
    let mut body = MirBody::new(FnId::new(0), Span::dummy());
    body.new_local(fx.unit, Regime::Value, LocalKind::ReturnPlace, Span::dummy());
    let bb = body.new_block();
    body.set_terminator(bb, Terminator::new(TerminatorKind::Return, Span::dummy()));
    body
}

fn assign(dest: Place, rvalue: Rvalue) -> Statement {
    Statement::new(StatementKind::Assign(dest, rvalue), Span::dummy())
}

fn release(operand: Operand) -> Statement {
    Statement::new(StatementKind::Release(operand), Span::dummy())
}

fn error_codes(session: &Session, body: &MirBody) -> Vec<String> {
    validate_body(session, body)
        .errors
        .into_iter()
        .filter_map(|e| e.code)
        .collect()
}

#[test]
fn test_release_of_manual_handle_passes() {
    let fx = Fixture::new();
    let mut body = empty_body(&fx);
    let handle = body.new_local(fx.manual_handle, Regime::ManualHandle, LocalKind::Var, Span::dummy());
    body.push_statement(
        BasicBlockId::ENTRY,
        release(Operand::Move(Place::local(handle))),
    );
    assert!(validate_body(&fx.session, &body).is_valid());
}

#[test]
fn test_release_of_gc_handle_is_rejected() {
    let fx = Fixture::new();
    let mut body = empty_body(&fx);
    let handle = body.new_local(fx.gc_handle, Regime::GcHandle, LocalKind::Var, Span::dummy());
    body.push_statement(
        BasicBlockId::ENTRY,
        release(Operand::Move(Place::local(handle))),
    );
    assert!(error_codes(&fx.session, &body).contains(&"E0806".to_string()));
}

#[test]
fn test_release_of_borrow_is_rejected() {
    let fx = Fixture::new();
    let mut body = empty_body(&fx);
    let var = body.new_local(fx.i64_ty, Regime::Value, LocalKind::Var, Span::dummy());
    let borrow = body.new_local(fx.borrow_ty, Regime::Borrow, LocalKind::Temp, Span::dummy());
    body.push_statement(
        BasicBlockId::ENTRY,
        assign(Place::local(borrow), Rvalue::Ref { place: Place::local(var) }),
    );
    body.push_statement(
        BasicBlockId::ENTRY,
        release(Operand::Move(Place::local(borrow))),
    );
    assert!(error_codes(&fx.session, &body).contains(&"E0806".to_string()));
}

#[test]
fn test_borrow_consumed_by_next_call_passes() {
    let fx = Fixture::new();
    let mut body = empty_body(&fx);
    let var = body.new_local(fx.i64_ty, Regime::Value, LocalKind::Var, Span::dummy());
    let borrow = body.new_local(fx.borrow_ty, Regime::Borrow, LocalKind::Temp, Span::dummy());
    let dest = body.new_local(fx.unit, Regime::Value, LocalKind::Temp, Span::dummy());
    body.push_statement(
        BasicBlockId::ENTRY,
        assign(Place::local(borrow), Rvalue::Ref { place: Place::local(var) }),
    );
    body.push_statement(
        BasicBlockId::ENTRY,
        assign(
            Place::local(dest),
            Rvalue::Call {
                func: fx.callee,
                args: vec![Operand::Move(Place::local(borrow))],
            },
        ),
    );
    assert!(validate_body(&fx.session, &body).is_valid());
}

#[test]
fn test_borrow_with_a_gap_before_the_call_is_rejected() {
    let fx = Fixture::new();
    let mut body = empty_body(&fx);
    let var = body.new_local(fx.i64_ty, Regime::Value, LocalKind::Var, Span::dummy());
    let borrow = body.new_local(fx.borrow_ty, Regime::Borrow, LocalKind::Temp, Span::dummy());
    let dest = body.new_local(fx.unit, Regime::Value, LocalKind::Temp, Span::dummy());
    body.push_statement(
        BasicBlockId::ENTRY,
        assign(Place::local(borrow), Rvalue::Ref { place: Place::local(var) }),
    );
    body.push_statement(
        BasicBlockId::ENTRY,
        assign(
            Place::local(var),
            Rvalue::Use(Operand::Constant(Constant::int(fx.i64_ty, 7))),
        ),
    );
    body.push_statement(
        BasicBlockId::ENTRY,
        assign(
            Place::local(dest),
            Rvalue::Call {
                func: fx.callee,
                args: vec![Operand::Move(Place::local(borrow))],
            },
        ),
    );
    assert!(error_codes(&fx.session, &body).contains(&"E0805".to_string()));
}

#[test]
fn test_borrow_stored_into_a_local_is_an_escape() {
    let fx = Fixture::new();
    let mut body = empty_body(&fx);
    let var = body.new_local(fx.i64_ty, Regime::Value, LocalKind::Var, Span::dummy());
    let borrow = body.new_local(fx.borrow_ty, Regime::Borrow, LocalKind::Temp, Span::dummy());
    let other = body.new_local(fx.borrow_ty, Regime::Borrow, LocalKind::Var, Span::dummy());
    body.push_statement(
        BasicBlockId::ENTRY,
        assign(Place::local(borrow), Rvalue::Ref { place: Place::local(var) }),
    );
    body.push_statement(
        BasicBlockId::ENTRY,
        assign(
            Place::local(other),
            Rvalue::Use(Operand::Copy(Place::local(borrow))),
        ),
    );
    assert!(error_codes(&fx.session, &body).contains(&"E0804".to_string()));
}

#[test]
fn test_strict_mode_rejects_read_after_release() {
    let fx = Fixture::new();
    let build = || {
        let mut body = empty_body(&fx);
        let handle = body.new_local(
            fx.manual_handle,
            Regime::ManualHandle,
            LocalKind::Var,
            Span::dummy(),
        );
        let copy = body.new_local(
            fx.manual_handle,
            Regime::ManualHandle,
            LocalKind::Temp,
            Span::dummy(),
        );
        body.push_statement(
            BasicBlockId::ENTRY,
            release(Operand::Move(Place::local(handle))),
        );
        body.push_statement(
            BasicBlockId::ENTRY,
            assign(
                Place::local(copy),
                Rvalue::Use(Operand::Copy(Place::local(handle))),
            ),
        );
        body
    };

    assert!(validate_body(&fx.session, &build()).is_valid());
    assert!(error_codes(&fx.strict(), &build()).contains(&"E0808".to_string()));
}

#[test]
fn test_module_validation_aggregates_across_functions() {
    let fx = Fixture::new();
    let good = empty_body(&fx);

    let mut bad = empty_body(&fx);
    bad.fn_id = FnId::new(1);
    let gc = bad.new_local(fx.gc_handle, Regime::GcHandle, LocalKind::Var, Span::dummy());
    bad.push_statement(BasicBlockId::ENTRY, release(Operand::Move(Place::local(gc))));

    let bodies = [(FnId::new(0), good), (FnId::new(1), bad)]
        .into_iter()
        .collect();
    let results = validate_module(&fx.session, &bodies);
    assert!(!results.is_valid());
    assert_eq!(results.errors.len(), 1);
}
