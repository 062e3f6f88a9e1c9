//! Compilation session: the immutable upstream snapshot plus shared
//! reporting.
//!
//! The front end finalizes its interned tables (types, function
//! signatures, symbol names, well-known builtins) and hands them over in a
//! [`Session`]. Nothing in this crate mutates them; per-function work takes
//! `&Session` and owns its outputs exclusively, so a driver is free to fan
//! functions out across worker threads. The one write path is the
//! diagnostic sink, a mutex-guarded list so parallel workers can report
//! without interleaving.

use std::collections::HashMap;

use parking_lot::Mutex;
use string_interner::{DefaultStringInterner, DefaultSymbol, Symbol};

use crate::diagnostics::Diagnostic;
use crate::hir::{FnId, FnTable, SymbolId, TypeId, TypeTable};

/// Resource bounds for a single function.
///
/// Pathological inputs (machine-generated functions, very deep nesting)
/// are rejected with a recoverable "too large" diagnostic instead of
/// consuming unbounded memory or time.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Maximum basic blocks per function.
    pub max_blocks: usize,
    /// Maximum local slots per function.
    pub max_locals: usize,
    /// Maximum outer iterations for any fixed-point pass.
    pub max_pass_iterations: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_blocks: 65_536,
            max_locals: 65_536,
            max_pass_iterations: 100,
        }
    }
}

/// How strictly the verifier polices manual-handle moves.
///
/// `Move` operands transfer a handle; reading the source afterwards is a
/// defect only under [`Strictness::Strict`]. The default accepts re-reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strictness {
    /// Moves invalidate the source conceptually, but re-reads pass.
    #[default]
    Lenient,
    /// Re-reading a moved-from local is a verifier rejection.
    Strict,
}

/// Well-known functions the desugarer calls into.
///
/// String interpolation rewrites to concatenation and per-type conversion
/// calls; the front end registers the ids of those builtins here.
#[derive(Debug, Clone, Default)]
pub struct BuiltinFns {
    /// `str_concat(a: str, b: str) -> str`
    pub str_concat: Option<FnId>,
    /// `to_str` conversion per source type.
    pub to_str: HashMap<TypeId, FnId>,
}

impl BuiltinFns {
    pub fn new() -> Self {
        Self::default()
    }

    /// The conversion builtin for `ty`, if one was registered.
    pub fn to_str_for(&self, ty: TypeId) -> Option<FnId> {
        self.to_str.get(&ty).copied()
    }
}

/// The per-compilation-unit session.
pub struct Session {
    /// Frozen type table.
    pub types: TypeTable,
    /// Frozen function signature table.
    pub fns: FnTable,
    /// Frozen symbol names.
    symbols: DefaultStringInterner,
    /// Well-known builtin functions.
    pub builtins: BuiltinFns,
    /// Per-function resource bounds.
    pub limits: Limits,
    /// Move-tracking strictness for the verifier.
    pub strictness: Strictness,
    /// Aggregated reports from all functions.
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl Session {
    /// Take ownership of the front end's finalized tables.
    pub fn new(
        types: TypeTable,
        fns: FnTable,
        symbols: DefaultStringInterner,
        builtins: BuiltinFns,
    ) -> Self {
        Self {
            types,
            fns,
            symbols,
            builtins,
            limits: Limits::default(),
            strictness: Strictness::default(),
            diagnostics: Mutex::new(Vec::new()),
        }
    }

    /// Override the default limits.
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Select the verifier's move-tracking strictness.
    pub fn with_strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = strictness;
        self
    }

    /// Resolve a symbol to its name.
    pub fn symbol_name(&self, sym: SymbolId) -> Option<&str> {
        let raw = DefaultSymbol::try_from_usize(sym.index as usize)?;
        self.symbols.resolve(raw)
    }

    /// The name of a function, for diagnostics. Falls back to the raw id.
    pub fn fn_name(&self, id: FnId) -> String {
        self.fns
            .get(id)
            .and_then(|sig| self.symbol_name(sig.name))
            .map(str::to_owned)
            .unwrap_or_else(|| id.to_string())
    }

    /// Record one report.
    pub fn report(&self, diagnostic: Diagnostic) {
        self.diagnostics.lock().push(diagnostic);
    }

    /// Record a batch of reports in order.
    pub fn report_all(&self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.lock().extend(diagnostics);
    }

    /// Drain everything reported so far.
    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.diagnostics.lock())
    }

    /// Whether any error-severity report has been recorded.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.lock().iter().any(|d| d.is_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Span;

    fn empty_session() -> Session {
        Session::new(
            TypeTable::new(),
            FnTable::new(),
            DefaultStringInterner::new(),
            BuiltinFns::new(),
        )
    }

    #[test]
    fn test_sink_aggregates() {
        let session = empty_session();
        session.report(Diagnostic::warning("first", Span::dummy()));
        session.report(Diagnostic::error("second", Span::dummy()));
        assert!(session.has_errors());

        let drained = session.take_diagnostics();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].message, "first");
        assert!(!session.has_errors());
    }

    #[test]
    fn test_symbol_resolution() {
        let mut interner = DefaultStringInterner::new();
        let sym: DefaultSymbol = interner.get_or_intern("translate");
        let raw = sym.to_usize() as u32;
        let session = Session::new(
            TypeTable::new(),
            FnTable::new(),
            interner,
            BuiltinFns::new(),
        );
        assert_eq!(session.symbol_name(SymbolId::new(raw)), Some("translate"));
    }

    #[test]
    fn test_default_limits() {
        let limits = Limits::default();
        assert!(limits.max_blocks > 0);
        assert!(limits.max_pass_iterations > 0);
    }
}
