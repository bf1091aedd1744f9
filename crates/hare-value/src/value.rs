//! Runtime-shaped values.

use std::fmt;

use indexmap::IndexMap;

use crate::ty::{TypeKind, VariableType};

/// MONEY is a fixed-point number with five decimals stored as a scaled
/// 64-bit integer.
pub const MONEY_SCALE: i64 = 100_000;

/// A point in time: days since the epoch of the calendar and milliseconds
/// within that day. The default (0, 0) is the "no date" value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DateTime {
    pub days: i32,
    pub msecs: i32,
}

/// An opaque handle to a runtime-managed entity (object, function pointer,
/// table binding). The compiler only ever materializes default handles;
/// non-default ones exist when values are produced by an executing program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(pub u32);

/// A record: either non-existing (the default) or an ordered set of cells.
///
/// Cell names are stored upper-cased; lookups are case-insensitive.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    cells: Option<IndexMap<String, Value>>,
}

impl Record {
    /// An existing record without cells.
    pub fn empty() -> Self {
        Self {
            cells: Some(IndexMap::new()),
        }
    }

    pub fn non_existing() -> Self {
        Self { cells: None }
    }

    pub fn exists(&self) -> bool {
        self.cells.is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.cells.as_ref()?.get(&name.to_ascii_uppercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Create or overwrite a cell. Makes a non-existing record exist.
    pub fn set(&mut self, name: &str, value: Value) {
        self.cells
            .get_or_insert_with(IndexMap::new)
            .insert(name.to_ascii_uppercase(), value);
    }

    /// Remove a cell, returning whether it was present.
    pub fn remove(&mut self, name: &str) -> bool {
        match &mut self.cells {
            Some(cells) => cells.shift_remove(&name.to_ascii_uppercase()).is_some(),
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.cells
            .iter()
            .flat_map(|cells| cells.iter().map(|(k, v)| (k.as_str(), v)))
    }

    pub fn len(&self) -> usize {
        self.cells.as_ref().map_or(0, IndexMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An array with a fixed element type.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    pub element: VariableType,
    pub items: Vec<Value>,
}

impl Array {
    pub fn new(element: VariableType) -> Self {
        Self {
            element,
            items: Vec::new(),
        }
    }

    pub fn with_items(element: VariableType, items: Vec<Value>) -> Self {
        Self { element, items }
    }

    pub fn array_type(&self) -> VariableType {
        self.element.to_array().unwrap_or(VariableType::VARIANT_ARRAY)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i32),
    Integer64(i64),
    /// Scaled by [`MONEY_SCALE`].
    Money(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    DateTime(DateTime),
    Blob(Vec<u8>),
    Record(Record),
    Array(Array),
    Table(Option<Handle>),
    Schema(Option<Handle>),
    FunctionPtr(Option<Handle>),
    Object(Option<Handle>),
    WeakObject(Option<Handle>),
}

impl Value {
    /// The default value of a type, as produced by variable initialization.
    ///
    /// `VARIANT` has no value of its own; `None` is returned for it and
    /// for the sentinels.
    pub fn default_for(ty: VariableType) -> Option<Value> {
        if ty.is_array() {
            return Some(Value::Array(Array::new(ty.element())));
        }
        Some(match ty.kind() {
            TypeKind::Uninitialized | TypeKind::NoReturn | TypeKind::Variant => return None,
            TypeKind::Integer => Value::Integer(0),
            TypeKind::Integer64 => Value::Integer64(0),
            TypeKind::Money => Value::Money(0),
            TypeKind::Float => Value::Float(0.0),
            TypeKind::Boolean => Value::Boolean(false),
            TypeKind::String => Value::String(String::new()),
            TypeKind::DateTime => Value::DateTime(DateTime::default()),
            TypeKind::Blob => Value::Blob(Vec::new()),
            TypeKind::Record => Value::Record(Record::non_existing()),
            TypeKind::Table => Value::Table(None),
            TypeKind::Schema => Value::Schema(None),
            TypeKind::FunctionPtr => Value::FunctionPtr(None),
            TypeKind::Object => Value::Object(None),
            TypeKind::WeakObject => Value::WeakObject(None),
        })
    }

    pub fn value_type(&self) -> VariableType {
        match self {
            Value::Integer(_) => VariableType::INTEGER,
            Value::Integer64(_) => VariableType::INTEGER64,
            Value::Money(_) => VariableType::MONEY,
            Value::Float(_) => VariableType::FLOAT,
            Value::Boolean(_) => VariableType::BOOLEAN,
            Value::String(_) => VariableType::STRING,
            Value::DateTime(_) => VariableType::DATETIME,
            Value::Blob(_) => VariableType::BLOB,
            Value::Record(_) => VariableType::RECORD,
            Value::Array(arr) => arr.array_type(),
            Value::Table(_) => VariableType::TABLE,
            Value::Schema(_) => VariableType::SCHEMA,
            Value::FunctionPtr(_) => VariableType::FUNCTION_PTR,
            Value::Object(_) => VariableType::OBJECT,
            Value::WeakObject(_) => VariableType::WEAK_OBJECT,
        }
    }

    /// Whether this value equals the default value of its own type.
    pub fn is_default(&self) -> bool {
        match self {
            Value::Integer(v) => *v == 0,
            Value::Integer64(v) | Value::Money(v) => *v == 0,
            Value::Float(v) => *v == 0.0,
            Value::Boolean(v) => !*v,
            Value::String(s) => s.is_empty(),
            Value::DateTime(dt) => *dt == DateTime::default(),
            Value::Blob(b) => b.is_empty(),
            Value::Record(rec) => !rec.exists(),
            Value::Array(arr) => arr.items.is_empty(),
            Value::Table(h)
            | Value::Schema(h)
            | Value::FunctionPtr(h)
            | Value::Object(h)
            | Value::WeakObject(h) => h.is_none(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn string(s: impl Into<String>) -> Value {
        Value::String(s.into())
    }

    /// Money from a whole number of units.
    pub fn money_units(units: i64) -> Value {
        Value::Money(units * MONEY_SCALE)
    }
}

pub(crate) fn format_money(scaled: i64) -> String {
    let sign = if scaled < 0 { "-" } else { "" };
    let abs = scaled.unsigned_abs();
    let whole = abs / MONEY_SCALE as u64;
    let frac = abs % MONEY_SCALE as u64;
    let mut frac_str = format!("{:05}", frac);
    while frac_str.len() > 1 && frac_str.ends_with('0') {
        frac_str.pop();
    }
    format!("{sign}{whole}.{frac_str}")
}

fn write_handle(f: &mut fmt::Formatter<'_>, ty: &str, h: &Option<Handle>) -> fmt::Result {
    match h {
        Some(Handle(id)) => write!(f, "{ty}#{id}"),
        None => write!(f, "DEFAULT {ty}"),
    }
}

/// Literal-like rendering, used by the tree printer and in diagnostics.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{v}"),
            Value::Integer64(v) => write!(f, "{v}I64"),
            Value::Money(v) => f.write_str(&format_money(*v)),
            Value::Float(v) => write!(f, "{v:?}F"),
            Value::Boolean(true) => f.write_str("TRUE"),
            Value::Boolean(false) => f.write_str("FALSE"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::DateTime(dt) => write!(f, "MAKEDATETIME({}, {})", dt.days, dt.msecs),
            Value::Blob(b) if b.is_empty() => f.write_str("DEFAULT BLOB"),
            Value::Blob(b) => write!(f, "BLOB({} bytes)", b.len()),
            Value::Record(rec) if !rec.exists() => f.write_str("DEFAULT RECORD"),
            Value::Record(rec) => {
                f.write_str("[")?;
                for (i, (name, value)) in rec.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} := {}", name.to_ascii_lowercase(), value)?;
                }
                f.write_str("]")
            }
            Value::Array(arr) if arr.items.is_empty() => {
                write!(f, "DEFAULT {}", arr.array_type())
            }
            Value::Array(arr) => {
                f.write_str("[")?;
                for (i, value) in arr.items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str("]")
            }
            Value::Table(h) => write_handle(f, "TABLE", h),
            Value::Schema(h) => write_handle(f, "SCHEMA", h),
            Value::FunctionPtr(h) => write_handle(f, "FUNCTION PTR", h),
            Value::Object(h) => write_handle(f, "OBJECT", h),
            Value::WeakObject(h) => write_handle(f, "WEAKOBJECT", h),
        }
    }
}
