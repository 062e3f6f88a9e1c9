//! Type table for the typed tree.
//!
//! Unlike the front end's syntactic types, everything here is fully
//! resolved: the type checker interns each distinct type once, attaches its
//! ownership regime, and hands this crate the finished table. The table is
//! an immutable snapshot from then on; every `TypeId` in a tree or a MIR
//! body indexes into it.
//!
//! # Regime attachment
//!
//! The regime lives on the table entry, not on uses. The same struct shape
//! appears under several ids when it is used under several regimes: the
//! inline value form, the gc handle form, and the manual handle form are
//! three entries, the handle forms wrapping the value form's id.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::def::{FloatTy, IntTy, Regime, SymbolId, UintTy};
use super::TypeId;

/// A field of a struct type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// The field's name.
    pub name: SymbolId,
    /// The field's type.
    pub ty: TypeId,
}

/// The shape of a type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    /// The unit type.
    Unit,
    /// Booleans.
    Bool,
    /// Signed integers.
    Int(IntTy),
    /// Unsigned integers.
    Uint(UintTy),
    /// IEEE floating point.
    Float(FloatTy),
    /// Immutable string.
    Str,
    /// A struct declaration. Field order is declaration order; `FieldId`
    /// indexes into `fields`.
    Struct {
        name: SymbolId,
        fields: Vec<FieldDef>,
    },
    /// Fixed-length array.
    Array { element: TypeId, len: u64 },
    /// A heap handle around an inner value type. Whether the handle is
    /// collector-traced or manually released is the entry's regime.
    Handle { inner: TypeId },
    /// A non-escaping borrow of an inner type. Always `Regime::Borrow`.
    Borrow { inner: TypeId },
    /// Error placeholder from upstream recovery. Reaching this crate is a
    /// front-end defect.
    Error,
}

impl TypeKind {
    /// Coarse name for diagnostics.
    pub fn descr(&self) -> &'static str {
        match self {
            TypeKind::Unit => "unit",
            TypeKind::Bool => "bool",
            TypeKind::Int(ty) => ty.name(),
            TypeKind::Uint(ty) => ty.name(),
            TypeKind::Float(ty) => ty.name(),
            TypeKind::Str => "str",
            TypeKind::Struct { .. } => "struct",
            TypeKind::Array { .. } => "array",
            TypeKind::Handle { .. } => "handle",
            TypeKind::Borrow { .. } => "borrow",
            TypeKind::Error => "{type error}",
        }
    }

    /// Whether arithmetic folding applies to this type.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            TypeKind::Int(_) | TypeKind::Uint(_) | TypeKind::Float(_)
        )
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, TypeKind::Bool)
    }

    /// The inner type behind a handle or borrow.
    pub fn pointee(&self) -> Option<TypeId> {
        match self {
            TypeKind::Handle { inner } | TypeKind::Borrow { inner } => Some(*inner),
            _ => None,
        }
    }
}

/// One entry of the type table: a shape plus its ownership regime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDef {
    pub kind: TypeKind,
    pub regime: Regime,
}

/// The session's frozen type table, indexed by [`TypeId`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeTable {
    entries: Vec<TypeDef>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a type, returning its id. Called while the front end (or a
    /// test) assembles the snapshot; the table is read-only afterwards.
    pub fn push(&mut self, kind: TypeKind, regime: Regime) -> TypeId {
        let id = TypeId::new(self.entries.len() as u32);
        self.entries.push(TypeDef { kind, regime });
        id
    }

    /// Look up an entry.
    pub fn get(&self, id: TypeId) -> Option<&TypeDef> {
        self.entries.get(id.index as usize)
    }

    /// The shape of a type, if the id is in range.
    pub fn kind(&self, id: TypeId) -> Option<&TypeKind> {
        self.get(id).map(|def| &def.kind)
    }

    /// The regime of a type, if the id is in range.
    pub fn regime(&self, id: TypeId) -> Option<Regime> {
        self.get(id).map(|def| def.regime)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Struct field count, for projection checking.
    pub fn field_count(&self, id: TypeId) -> Option<usize> {
        match self.kind(id)? {
            TypeKind::Struct { fields, .. } => Some(fields.len()),
            _ => None,
        }
    }

    /// The type of field `index` of struct `id`.
    pub fn field_type(&self, id: TypeId, index: u32) -> Option<TypeId> {
        match self.kind(id)? {
            TypeKind::Struct { fields, .. } => fields.get(index as usize).map(|f| f.ty),
            _ => None,
        }
    }

    /// The inner type behind a handle or borrow.
    pub fn pointee(&self, id: TypeId) -> Option<TypeId> {
        self.kind(id)?.pointee()
    }

    /// The interned bool type, if the front end registered one.
    ///
    /// Desugaring needs it to type the conditions it synthesizes for `for`
    /// loops.
    pub fn bool_id(&self) -> Option<TypeId> {
        self.entries
            .iter()
            .position(|def| matches!(def.kind, TypeKind::Bool))
            .map(|i| TypeId::new(i as u32))
    }

    /// Whether `id` is an integer type (signed or unsigned).
    pub fn is_integer(&self, id: TypeId) -> bool {
        matches!(
            self.kind(id),
            Some(TypeKind::Int(_)) | Some(TypeKind::Uint(_))
        )
    }
}

impl fmt::Display for TypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.regime {
            Regime::Value => f.write_str(self.kind.descr()),
            regime => write!(f, "{} {}", regime, self.kind.descr()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_lookup() {
        let mut table = TypeTable::new();
        let unit = table.push(TypeKind::Unit, Regime::Value);
        let i64_ty = table.push(TypeKind::Int(IntTy::I64), Regime::Value);
        assert_eq!(table.regime(unit), Some(Regime::Value));
        assert!(table.is_integer(i64_ty));
        assert!(!table.is_integer(unit));
        assert!(table.get(TypeId::new(99)).is_none());
    }

    #[test]
    fn test_struct_fields() {
        let mut table = TypeTable::new();
        let i64_ty = table.push(TypeKind::Int(IntTy::I64), Regime::Value);
        let point = table.push(
            TypeKind::Struct {
                name: SymbolId::new(0),
                fields: vec![
                    FieldDef {
                        name: SymbolId::new(1),
                        ty: i64_ty,
                    },
                    FieldDef {
                        name: SymbolId::new(2),
                        ty: i64_ty,
                    },
                ],
            },
            Regime::Value,
        );
        assert_eq!(table.field_count(point), Some(2));
        assert_eq!(table.field_type(point, 1), Some(i64_ty));
        assert_eq!(table.field_type(point, 2), None);
        assert_eq!(table.field_count(i64_ty), None);
    }

    #[test]
    fn test_handle_pointee() {
        let mut table = TypeTable::new();
        let i64_ty = table.push(TypeKind::Int(IntTy::I64), Regime::Value);
        let handle = table.push(TypeKind::Handle { inner: i64_ty }, Regime::ManualHandle);
        let borrow = table.push(TypeKind::Borrow { inner: i64_ty }, Regime::Borrow);
        assert_eq!(table.pointee(handle), Some(i64_ty));
        assert_eq!(table.pointee(borrow), Some(i64_ty));
        assert_eq!(table.pointee(i64_ty), None);
    }
}
