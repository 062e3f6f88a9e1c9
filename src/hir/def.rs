//! Identifiers and definition-level data for the typed tree.
//!
//! The front end assigns every name a dense integer handle and hands the
//! handles over unchanged:
//! - [`TypeId`] - index into the type table
//! - [`SymbolId`] - index into the interned symbol table
//! - [`FieldId`] - field position within a struct
//! - [`FnId`] - index into the function signature table
//! - [`LocalId`] - variable slot within one body
//!
//! Equality is always by value; this crate never compares the underlying
//! declarations structurally.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::span::Span;

/// An index into the session's type table.
///
/// TypeIds are assigned during type checking and remain stable
/// throughout compilation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeId {
    /// Table index for this type.
    pub index: u32,
}

impl TypeId {
    /// Create a new TypeId with the given index.
    pub const fn new(index: u32) -> Self {
        Self { index }
    }

    /// The index of this type.
    pub const fn index(self) -> u32 {
        self.index
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({})", self.index)
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ty{}", self.index)
    }
}

/// An index into the session's interned symbol table.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolId {
    /// Interner index for this symbol.
    pub index: u32,
}

impl SymbolId {
    /// Create a new SymbolId with the given index.
    pub const fn new(index: u32) -> Self {
        Self { index }
    }

    /// The index of this symbol.
    pub const fn index(self) -> u32 {
        self.index
    }
}

impl fmt::Debug for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymbolId({})", self.index)
    }
}

/// A field position within a struct declaration.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldId {
    /// Declaration-order index of this field.
    pub index: u32,
}

impl FieldId {
    /// Create a new FieldId with the given index.
    pub const fn new(index: u32) -> Self {
        Self { index }
    }

    /// The index of this field.
    pub const fn index(self) -> u32 {
        self.index
    }
}

impl fmt::Debug for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldId({})", self.index)
    }
}

/// A globally unique identifier for a function.
///
/// FnIds are assigned during name resolution and remain stable
/// throughout compilation. Method resolution happens upstream, so by the
/// time a tree reaches this crate every call site already carries one.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FnId {
    /// Crate-local index for this function.
    pub index: u32,
}

impl FnId {
    /// Create a new FnId with the given index.
    pub const fn new(index: u32) -> Self {
        Self { index }
    }

    /// The index of this function.
    pub const fn index(self) -> u32 {
        self.index
    }
}

impl fmt::Debug for FnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FnId({})", self.index)
    }
}

impl fmt::Display for FnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn{}", self.index)
    }
}

/// A local variable identifier within a function body.
///
/// LocalIds are unique within a single body. Slot 0 is the return place,
/// slots 1..=param_count are the parameters in declaration order, and
/// every later slot is a declared variable or synthesized temporary.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocalId {
    /// Body-local index for this variable.
    pub index: u32,
}

impl LocalId {
    /// Create a new LocalId with the given index.
    pub const fn new(index: u32) -> Self {
        Self { index }
    }

    /// The index of this local.
    pub const fn index(self) -> u32 {
        self.index
    }

    /// The special "return place" local (always index 0).
    pub const RETURN_PLACE: LocalId = LocalId { index: 0 };
}

impl fmt::Debug for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LocalId({})", self.index)
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_{}", self.index)
    }
}

/// The storage/ownership regime of a type.
///
/// Every type in the table carries exactly one regime. Regimes are never
/// implicitly converted into one another; a conversion is always an
/// explicit operation in the tree (a builtin call).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Regime {
    /// Inline stack storage, copied by full duplication.
    Value,
    /// Heap storage traced by the collector, copied by handle duplication.
    GcHandle,
    /// Heap storage outside the collector, copied by handle duplication,
    /// released only by an explicit `free`.
    ManualHandle,
    /// Internal non-escaping reference. Never stored, never returned,
    /// never read past the statement that consumes it.
    Borrow,
}

impl Regime {
    /// Returns the name of this regime for diagnostics.
    pub fn descr(&self) -> &'static str {
        match self {
            Regime::Value => "value",
            Regime::GcHandle => "gc handle",
            Regime::ManualHandle => "manual handle",
            Regime::Borrow => "borrow",
        }
    }

    /// Whether this regime lives on the heap behind a handle.
    pub fn is_handle(&self) -> bool {
        matches!(self, Regime::GcHandle | Regime::ManualHandle)
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.descr())
    }
}

/// Signed integer widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntTy {
    I8,
    I16,
    I32,
    I64,
}

impl IntTy {
    /// Bit width of this type.
    pub fn bit_width(&self) -> u32 {
        match self {
            IntTy::I8 => 8,
            IntTy::I16 => 16,
            IntTy::I32 => 32,
            IntTy::I64 => 64,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            IntTy::I8 => "i8",
            IntTy::I16 => "i16",
            IntTy::I32 => "i32",
            IntTy::I64 => "i64",
        }
    }
}

/// Unsigned integer widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UintTy {
    U8,
    U16,
    U32,
    U64,
}

impl UintTy {
    /// Bit width of this type.
    pub fn bit_width(&self) -> u32 {
        match self {
            UintTy::U8 => 8,
            UintTy::U16 => 16,
            UintTy::U32 => 32,
            UintTy::U64 => 64,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            UintTy::U8 => "u8",
            UintTy::U16 => "u16",
            UintTy::U32 => "u32",
            UintTy::U64 => "u64",
        }
    }
}

/// Floating-point widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FloatTy {
    F32,
    F64,
}

impl FloatTy {
    pub fn name(&self) -> &'static str {
        match self {
            FloatTy::F32 => "f32",
            FloatTy::F64 => "f64",
        }
    }
}

/// The signature of a function, as recorded in the session's table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FnSig {
    /// The function's name.
    pub name: SymbolId,
    /// Parameter types in declaration order. Regimes come with the types.
    pub params: Vec<TypeId>,
    /// Return type.
    pub ret: TypeId,
    /// Where the function was declared.
    pub span: Span,
}

/// The session's frozen function signature table, indexed by [`FnId`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FnTable {
    sigs: Vec<FnSig>,
}

impl FnTable {
    pub fn new() -> Self {
        Self { sigs: Vec::new() }
    }

    /// Register a signature, returning its id. Called by the front end (or
    /// tests) while assembling the snapshot; the table is read-only after.
    pub fn push(&mut self, sig: FnSig) -> FnId {
        let id = FnId::new(self.sigs.len() as u32);
        self.sigs.push(sig);
        id
    }

    /// Look up a signature.
    pub fn get(&self, id: FnId) -> Option<&FnSig> {
        self.sigs.get(id.index as usize)
    }

    /// Number of registered functions.
    pub fn len(&self) -> usize {
        self.sigs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sigs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_id_display() {
        assert_eq!(LocalId::RETURN_PLACE.to_string(), "_0");
        assert_eq!(LocalId::new(3).to_string(), "_3");
    }

    #[test]
    fn test_regime_descr() {
        assert_eq!(Regime::ManualHandle.descr(), "manual handle");
        assert!(Regime::GcHandle.is_handle());
        assert!(!Regime::Borrow.is_handle());
        assert!(!Regime::Value.is_handle());
    }

    #[test]
    fn test_fn_table() {
        let mut table = FnTable::new();
        let id = table.push(FnSig {
            name: SymbolId::new(0),
            params: vec![TypeId::new(1)],
            ret: TypeId::new(0),
            span: Span::dummy(),
        });
        assert_eq!(id, FnId::new(0));
        assert_eq!(table.get(id).map(|s| s.params.len()), Some(1));
        assert!(table.get(FnId::new(9)).is_none());
    }
}
