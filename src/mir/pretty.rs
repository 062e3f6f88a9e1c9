//! Human-readable MIR dumps.
//!
//! The format is deterministic: two dumps of the same body are
//! byte-identical, so tests can compare pipeline output textually and
//! idempotence checks reduce to a string comparison.

use std::fmt::Write;

use crate::session::Session;

use super::body::{LocalKind, MirBody};

/// Render one body.
///
/// Locals are listed first with their kind and regime, then every block
/// with its statements and terminator, in arena order.
pub fn dump_body(session: &Session, body: &MirBody) -> String {
    let mut out = String::new();
    let name = session.fn_name(body.fn_id);

    let params: Vec<String> = body.params().map(|p| p.id.to_string()).collect();
    let _ = writeln!(out, "fn {}({}) {{", name, params.join(", "));

    for local in &body.locals {
        let kind = match local.kind {
            LocalKind::ReturnPlace => "ret",
            LocalKind::Arg => "arg",
            LocalKind::Var => "var",
            LocalKind::Temp => "tmp",
        };
        let named = local
            .name
            .and_then(|sym| session.symbol_name(sym))
            .map(|n| format!(" // {}", n))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "    {} {}: {} [{}];{}",
            kind,
            local.id,
            local.ty,
            local.regime.descr(),
            named
        );
    }

    for (id, block) in body.blocks() {
        let _ = writeln!(out);
        let _ = writeln!(out, "    {}: {{", id);
        for stmt in &block.statements {
            let _ = writeln!(out, "        {};", stmt.kind);
        }
        match &block.terminator {
            Some(term) => {
                let _ = writeln!(out, "        {};", term.kind);
            }
            None => {
                let _ = writeln!(out, "        <no terminator>;");
            }
        }
        let _ = writeln!(out, "    }}");
    }

    let _ = writeln!(out, "}}");
    out
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::{FnId, FnTable, Regime, TypeId, TypeKind, TypeTable};
    use crate::mir::types::{
        Constant, Operand, Place, Rvalue, Statement, StatementKind, Terminator, TerminatorKind,
    };
    use crate::session::BuiltinFns;
    use crate::span::Span;
    use string_interner::DefaultStringInterner;

    fn session() -> Session {
        let mut types = TypeTable::new();
        types.push(TypeKind::Unit, Regime::Value);
        Session::new(
            types,
            FnTable::new(),
            DefaultStringInterner::new(),
            BuiltinFns::new(),
        )
    }

    fn sample_body() -> MirBody {
        let mut body = MirBody::new(FnId::new(0), Span::dummy());
        body.new_local(
            TypeId::new(0),
            Regime::Value,
            LocalKind::ReturnPlace,
            Span::dummy(),
        );
        let bb = body.new_block();
        body.push_statement(
            bb,
            Statement::new(
                StatementKind::Assign(
                    Place::return_place(),
                    Rvalue::Use(Operand::Constant(Constant::unit(TypeId::new(0)))),
                ),
                Span::dummy(),
            ),
        );
        body.set_terminator(bb, Terminator::new(TerminatorKind::Return, Span::dummy()));
        body
    }

    #[test]
    fn test_dump_is_deterministic() {
        let session = session();
        let body = sample_body();
        assert_eq!(dump_body(&session, &body), dump_body(&session, &body));
    }

    #[test]
    fn test_dump_shows_blocks_and_locals() {
        let session = session();
        let body = sample_body();
        let text = dump_body(&session, &body);
        assert!(text.contains("bb0:"), "missing block header: {}", text);
        assert!(text.contains("ret _0:"), "missing return place: {}", text);
        assert!(text.contains("return;"), "missing terminator: {}", text);
    }
}
