//! Variable types.
//!
//! A `VariableType` is a scalar kind plus an array bit. Not every kind can
//! be an array element: tables, schemas and the sentinels cannot.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum TypeKind {
    /// Not yet typed. Never survives type checking.
    Uninitialized,
    /// Result type of a macro (a function without a return value).
    NoReturn,
    /// Decided at runtime.
    Variant,
    Integer,
    Integer64,
    Money,
    Float,
    Boolean,
    String,
    DateTime,
    Blob,
    Record,
    Table,
    Schema,
    FunctionPtr,
    Object,
    WeakObject,
}

impl TypeKind {
    fn name(self) -> &'static str {
        match self {
            TypeKind::Uninitialized => "UNINITIALIZED",
            TypeKind::NoReturn => "MACRO",
            TypeKind::Variant => "VARIANT",
            TypeKind::Integer => "INTEGER",
            TypeKind::Integer64 => "INTEGER64",
            TypeKind::Money => "MONEY",
            TypeKind::Float => "FLOAT",
            TypeKind::Boolean => "BOOLEAN",
            TypeKind::String => "STRING",
            TypeKind::DateTime => "DATETIME",
            TypeKind::Blob => "BLOB",
            TypeKind::Record => "RECORD",
            TypeKind::Table => "TABLE",
            TypeKind::Schema => "SCHEMA",
            TypeKind::FunctionPtr => "FUNCTION PTR",
            TypeKind::Object => "OBJECT",
            TypeKind::WeakObject => "WEAKOBJECT",
        }
    }

    fn can_be_element(self) -> bool {
        !matches!(
            self,
            TypeKind::Uninitialized | TypeKind::NoReturn | TypeKind::Table | TypeKind::Schema
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VariableType {
    kind: TypeKind,
    array: bool,
}

impl VariableType {
    pub const UNINITIALIZED: Self = Self::scalar(TypeKind::Uninitialized);
    pub const NO_RETURN: Self = Self::scalar(TypeKind::NoReturn);
    pub const VARIANT: Self = Self::scalar(TypeKind::Variant);
    pub const INTEGER: Self = Self::scalar(TypeKind::Integer);
    pub const INTEGER64: Self = Self::scalar(TypeKind::Integer64);
    pub const MONEY: Self = Self::scalar(TypeKind::Money);
    pub const FLOAT: Self = Self::scalar(TypeKind::Float);
    pub const BOOLEAN: Self = Self::scalar(TypeKind::Boolean);
    pub const STRING: Self = Self::scalar(TypeKind::String);
    pub const DATETIME: Self = Self::scalar(TypeKind::DateTime);
    pub const BLOB: Self = Self::scalar(TypeKind::Blob);
    pub const RECORD: Self = Self::scalar(TypeKind::Record);
    pub const TABLE: Self = Self::scalar(TypeKind::Table);
    pub const SCHEMA: Self = Self::scalar(TypeKind::Schema);
    pub const FUNCTION_PTR: Self = Self::scalar(TypeKind::FunctionPtr);
    pub const OBJECT: Self = Self::scalar(TypeKind::Object);
    pub const WEAK_OBJECT: Self = Self::scalar(TypeKind::WeakObject);

    pub const VARIANT_ARRAY: Self = Self::array_of(TypeKind::Variant);
    pub const INTEGER_ARRAY: Self = Self::array_of(TypeKind::Integer);
    pub const STRING_ARRAY: Self = Self::array_of(TypeKind::String);
    pub const RECORD_ARRAY: Self = Self::array_of(TypeKind::Record);

    pub const fn scalar(kind: TypeKind) -> Self {
        Self { kind, array: false }
    }

    pub const fn array_of(kind: TypeKind) -> Self {
        Self { kind, array: true }
    }

    pub fn kind(self) -> TypeKind {
        self.kind
    }

    pub fn is_array(self) -> bool {
        self.array
    }

    /// The element type of an array type; scalars are their own element.
    pub fn element(self) -> Self {
        Self::scalar(self.kind)
    }

    /// The array type with this element type, if such an array exists.
    pub fn to_array(self) -> Option<Self> {
        if self.array || !self.kind.can_be_element() {
            None
        } else {
            Some(Self::array_of(self.kind))
        }
    }

    /// The plain `VARIANT` type (not `VARIANT ARRAY`).
    pub fn is_variant(self) -> bool {
        !self.array && self.kind == TypeKind::Variant
    }

    pub fn is_numeric(self) -> bool {
        !self.array
            && matches!(
                self.kind,
                TypeKind::Integer | TypeKind::Integer64 | TypeKind::Money | TypeKind::Float
            )
    }

    pub fn is_integral(self) -> bool {
        !self.array && matches!(self.kind, TypeKind::Integer | TypeKind::Integer64)
    }

    pub fn is_object(self) -> bool {
        !self.array && matches!(self.kind, TypeKind::Object | TypeKind::WeakObject)
    }

    /// Whether a value of this type can be stored in a variable.
    pub fn is_value_type(self) -> bool {
        !matches!(self.kind, TypeKind::Uninitialized | TypeKind::NoReturn)
    }

    /// Stable numeric id, as returned by TYPEID.
    pub fn type_id(self) -> i32 {
        let base = match self.kind {
            TypeKind::Uninitialized => 0,
            TypeKind::NoReturn => 1,
            TypeKind::Variant => 2,
            TypeKind::Integer => 16,
            TypeKind::Integer64 => 17,
            TypeKind::Money => 18,
            TypeKind::Float => 19,
            TypeKind::Boolean => 20,
            TypeKind::String => 21,
            TypeKind::DateTime => 22,
            TypeKind::Blob => 23,
            TypeKind::Record => 24,
            TypeKind::Table => 25,
            TypeKind::Schema => 26,
            TypeKind::FunctionPtr => 27,
            TypeKind::Object => 28,
            TypeKind::WeakObject => 29,
        };
        if self.array {
            base | 0x80
        } else {
            base
        }
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.array {
            write!(f, "{} ARRAY", self.kind.name())
        } else {
            f.write_str(self.kind.name())
        }
    }
}
