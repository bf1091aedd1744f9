//! Value conversions.
//!
//! Implicit conversions only ever widen: INTEGER to INTEGER64, MONEY or
//! FLOAT; INTEGER64 and MONEY to FLOAT; any array to VARIANT ARRAY; a
//! RECORD ARRAY to its first RECORD. Explicit casts additionally narrow
//! between numeric types (range checked) and convert a VARIANT ARRAY to a
//! typed array element by element.

use crate::error::{Result, ValueError};
use crate::ty::{TypeKind, VariableType};
use crate::value::{Array, Record, Value, MONEY_SCALE};

/// Whether a conversion between two static types is possible.
///
/// A `VARIANT` source is always accepted: the check moves to runtime.
pub fn can_cast(from: VariableType, to: VariableType, explicit: bool) -> bool {
    if from == to || to.is_variant() || from.is_variant() {
        return true;
    }
    if is_implicit(from, to) {
        return true;
    }
    explicit && is_explicit(from, to)
}

fn is_implicit(from: VariableType, to: VariableType) -> bool {
    use TypeKind::*;
    if from.is_array() {
        return to == VariableType::VARIANT_ARRAY || (from == VariableType::RECORD_ARRAY && to == VariableType::RECORD);
    }
    if to.is_array() {
        return false;
    }
    matches!(
        (from.kind(), to.kind()),
        (Integer, Integer64) | (Integer, Money) | (Integer, Float) | (Integer64, Float) | (Money, Float)
    )
}

fn is_explicit(from: VariableType, to: VariableType) -> bool {
    if from == VariableType::VARIANT_ARRAY && to.is_array() {
        return true;
    }
    if from.is_numeric() && to.is_numeric() {
        return true;
    }
    matches!(
        (from.kind(), to.kind(), from.is_array() || to.is_array()),
        (TypeKind::Object, TypeKind::WeakObject, false) | (TypeKind::WeakObject, TypeKind::Object, false)
    )
}

fn cannot(from: VariableType, to: VariableType) -> ValueError {
    ValueError::CannotConvert { from, to }
}

fn float_to_i64(v: f64, to: VariableType) -> Result<i64> {
    if v.is_nan() || v < i64::MIN as f64 || v >= i64::MAX as f64 {
        return Err(ValueError::Overflow { ty: to });
    }
    Ok(v.trunc() as i64)
}

fn narrow_i32(v: i64) -> Result<i32> {
    i32::try_from(v).map_err(|_| ValueError::Overflow {
        ty: VariableType::INTEGER,
    })
}

fn to_money(v: i64) -> Result<i64> {
    v.checked_mul(MONEY_SCALE).ok_or(ValueError::Overflow {
        ty: VariableType::MONEY,
    })
}

/// Convert a value to `to`. The value's own type is what is checked, so
/// this performs the runtime half of a cast from VARIANT as well.
pub fn cast(value: Value, to: VariableType, explicit: bool) -> Result<Value> {
    let from = value.value_type();
    if from == to || to.is_variant() {
        return Ok(value);
    }
    if !is_implicit(from, to) && !(explicit && is_explicit(from, to)) {
        return Err(cannot(from, to));
    }
    if to.is_array() {
        let Value::Array(arr) = value else {
            return Err(cannot(from, to));
        };
        let element = to.element();
        let items = arr
            .items
            .into_iter()
            .map(|item| cast(item, element, explicit))
            .collect::<Result<Vec<_>>>()?;
        return Ok(Value::Array(Array::with_items(element, items)));
    }
    if to == VariableType::RECORD {
        // RECORD ARRAY to RECORD takes the first row.
        let Value::Array(arr) = value else {
            return Err(cannot(from, to));
        };
        return Ok(arr
            .items
            .into_iter()
            .next()
            .unwrap_or(Value::Record(Record::non_existing())));
    }
    let converted = match (value, to.kind()) {
        (Value::Integer(v), TypeKind::Integer64) => Value::Integer64(v as i64),
        (Value::Integer(v), TypeKind::Money) => Value::Money(to_money(v as i64)?),
        (Value::Integer(v), TypeKind::Float) => Value::Float(v as f64),
        (Value::Integer64(v), TypeKind::Integer) => Value::Integer(narrow_i32(v)?),
        (Value::Integer64(v), TypeKind::Money) => Value::Money(to_money(v)?),
        (Value::Integer64(v), TypeKind::Float) => Value::Float(v as f64),
        (Value::Money(v), TypeKind::Integer) => Value::Integer(narrow_i32(v / MONEY_SCALE)?),
        (Value::Money(v), TypeKind::Integer64) => Value::Integer64(v / MONEY_SCALE),
        (Value::Money(v), TypeKind::Float) => Value::Float(v as f64 / MONEY_SCALE as f64),
        (Value::Float(v), TypeKind::Integer) => Value::Integer(narrow_i32(float_to_i64(v, to)?)?),
        (Value::Float(v), TypeKind::Integer64) => Value::Integer64(float_to_i64(v, to)?),
        (Value::Float(v), TypeKind::Money) => {
            Value::Money(float_to_i64((v * MONEY_SCALE as f64).round(), to)?)
        }
        (Value::Object(h), TypeKind::WeakObject) => Value::WeakObject(h),
        (Value::WeakObject(h), TypeKind::Object) => Value::Object(h),
        (_, _) => return Err(cannot(from, to)),
    };
    Ok(converted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn implicit_widening() {
        assert!(can_cast(VariableType::INTEGER, VariableType::FLOAT, false));
        assert!(can_cast(VariableType::INTEGER_ARRAY, VariableType::VARIANT_ARRAY, false));
        assert!(can_cast(VariableType::RECORD_ARRAY, VariableType::RECORD, false));
        assert!(!can_cast(VariableType::FLOAT, VariableType::INTEGER, false));
        assert!(!can_cast(VariableType::STRING, VariableType::INTEGER, true));
    }

    #[test]
    fn explicit_narrowing_is_range_checked() {
        assert_eq!(
            cast(Value::Integer64(5), VariableType::INTEGER, true),
            Ok(Value::Integer(5))
        );
        assert_eq!(
            cast(Value::Integer64(1 << 40), VariableType::INTEGER, true),
            Err(ValueError::Overflow {
                ty: VariableType::INTEGER
            })
        );
        assert!(cast(Value::Integer64(5), VariableType::INTEGER, false).is_err());
    }

    #[test]
    fn float_to_money_rounds() {
        assert_eq!(
            cast(Value::Float(1.234567), VariableType::MONEY, true),
            Ok(Value::Money(123_457))
        );
    }

    #[test]
    fn record_array_to_record_takes_first_row() {
        let mut row = Record::empty();
        row.set("a", Value::Integer(1));
        let rows = Value::Array(Array::with_items(VariableType::RECORD, vec![Value::Record(row.clone())]));
        assert_eq!(cast(rows, VariableType::RECORD, false), Ok(Value::Record(row)));
        let empty = Value::Array(Array::new(VariableType::RECORD));
        assert_eq!(
            cast(empty, VariableType::RECORD, false),
            Ok(Value::Record(Record::non_existing()))
        );
    }

    #[test]
    fn variant_array_narrows_elementwise() {
        let mixed = Value::Array(Array::with_items(
            VariableType::VARIANT,
            vec![Value::Integer(1), Value::string("x")],
        ));
        assert!(cast(mixed, VariableType::INTEGER_ARRAY, true).is_err());
        let ints = Value::Array(Array::with_items(VariableType::VARIANT, vec![Value::Integer(1)]));
        assert_eq!(
            cast(ints, VariableType::INTEGER_ARRAY, true).unwrap().value_type(),
            VariableType::INTEGER_ARRAY
        );
    }
}
