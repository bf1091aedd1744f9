//! Operators over values.
//!
//! These are the exact operations the runtime performs, so a value folded
//! at compile time is identical to the one execution would produce.
//! Operands of different numeric types are promoted first, following the
//! same lattice the type checker enforces statically: INTEGER widens to
//! INTEGER64 or MONEY, everything widens to FLOAT, and MONEY never mixes
//! with INTEGER64.

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;

use crate::error::{Result, ValueError};
use crate::ty::{TypeKind, VariableType};
use crate::value::{Array, Value, MONEY_SCALE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    /// String merge `||`.
    Merge,
    /// Array concatenation.
    Concat,
    And,
    Or,
    Xor,
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
    Less,
    LessEqual,
    Equal,
    Unequal,
    Greater,
    GreaterEqual,
    Like,
    In,
    /// `a ?? b`
    NullCoalesce,
}

impl BinaryOp {
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Less
                | BinaryOp::LessEqual
                | BinaryOp::Equal
                | BinaryOp::Unequal
                | BinaryOp::Greater
                | BinaryOp::GreaterEqual
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or | BinaryOp::Xor)
    }

    pub fn is_bitwise(self) -> bool {
        matches!(
            self,
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor | BinaryOp::ShiftLeft | BinaryOp::ShiftRight
        )
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Merge => "||",
            BinaryOp::Concat => "CONCAT",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Xor => "XOR",
            BinaryOp::BitAnd => "BITAND",
            BinaryOp::BitOr => "BITOR",
            BinaryOp::BitXor => "BITXOR",
            BinaryOp::ShiftLeft => "BITLSHIFT",
            BinaryOp::ShiftRight => "BITRSHIFT",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Equal => "=",
            BinaryOp::Unequal => "!=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::Like => "LIKE",
            BinaryOp::In => "IN",
            BinaryOp::NullCoalesce => "??",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum UnaryOp {
    Negate,
    Plus,
    Not,
    BitNeg,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Negate => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Not => "NOT",
            UnaryOp::BitNeg => "BITNEG",
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// The common numeric type two operand types promote to, if any.
///
/// `Err(())` marks the one explicitly illegal combination, MONEY with
/// INTEGER64; `Ok(None)` means the pair is not numeric at all.
pub fn numeric_promotion(
    left: VariableType,
    right: VariableType,
) -> std::result::Result<Option<VariableType>, ()> {
    if !left.is_numeric() || !right.is_numeric() {
        return Ok(None);
    }
    use TypeKind::*;
    let promoted = match (left.kind(), right.kind()) {
        (a, b) if a == b => left,
        (Float, _) | (_, Float) => VariableType::FLOAT,
        (Money, Integer64) | (Integer64, Money) => return Err(()),
        (Integer, Integer64) | (Integer64, Integer) => VariableType::INTEGER64,
        (Integer, Money) | (Money, Integer) => VariableType::MONEY,
        _ => return Ok(None),
    };
    Ok(Some(promoted))
}

fn incompatible(op: BinaryOp, left: &Value, right: &Value) -> ValueError {
    ValueError::IncompatibleTypes {
        op: op.symbol(),
        left: left.value_type(),
        right: right.value_type(),
    }
}

fn promote(op: BinaryOp, left: Value, right: Value) -> Result<(Value, Value)> {
    match numeric_promotion(left.value_type(), right.value_type()) {
        Ok(Some(target)) => Ok((
            crate::cast::cast(left, target, false)?,
            crate::cast::cast(right, target, false)?,
        )),
        _ => Err(incompatible(op, &left, &right)),
    }
}

fn overflow(ty: VariableType) -> ValueError {
    ValueError::Overflow { ty }
}

fn money_mul(a: i64, b: i64) -> Result<i64> {
    let product = (a as i128 * b as i128) / MONEY_SCALE as i128;
    i64::try_from(product).map_err(|_| overflow(VariableType::MONEY))
}

fn money_div(a: i64, b: i64) -> Result<i64> {
    if b == 0 {
        return Err(ValueError::DivisionByZero);
    }
    let quotient = (a as i128 * MONEY_SCALE as i128) / b as i128;
    i64::try_from(quotient).map_err(|_| overflow(VariableType::MONEY))
}

fn arithmetic(op: BinaryOp, left: Value, right: Value) -> Result<Value> {
    let (left, right) = promote(op, left, right)?;
    let ty = left.value_type();
    let value = match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Value::Integer(
            match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Subtract => a.checked_sub(b),
                BinaryOp::Multiply => a.checked_mul(b),
                BinaryOp::Divide | BinaryOp::Modulo if b == 0 => {
                    return Err(ValueError::DivisionByZero)
                }
                BinaryOp::Divide => a.checked_div(b),
                _ => a.checked_rem(b),
            }
            .ok_or_else(|| overflow(ty))?,
        ),
        (Value::Integer64(a), Value::Integer64(b)) => Value::Integer64(
            match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Subtract => a.checked_sub(b),
                BinaryOp::Multiply => a.checked_mul(b),
                BinaryOp::Divide | BinaryOp::Modulo if b == 0 => {
                    return Err(ValueError::DivisionByZero)
                }
                BinaryOp::Divide => a.checked_div(b),
                _ => a.checked_rem(b),
            }
            .ok_or_else(|| overflow(ty))?,
        ),
        (Value::Money(a), Value::Money(b)) => Value::Money(match op {
            BinaryOp::Add => a.checked_add(b).ok_or_else(|| overflow(ty))?,
            BinaryOp::Subtract => a.checked_sub(b).ok_or_else(|| overflow(ty))?,
            BinaryOp::Multiply => money_mul(a, b)?,
            BinaryOp::Divide => money_div(a, b)?,
            _ if b == 0 => return Err(ValueError::DivisionByZero),
            _ => a.checked_rem(b).ok_or_else(|| overflow(ty))?,
        }),
        (Value::Float(a), Value::Float(b)) => Value::Float(match op {
            BinaryOp::Add => a + b,
            BinaryOp::Subtract => a - b,
            BinaryOp::Multiply => a * b,
            _ if b == 0.0 => return Err(ValueError::DivisionByZero),
            BinaryOp::Divide => a / b,
            _ => a % b,
        }),
        (left, right) => return Err(incompatible(op, &left, &right)),
    };
    Ok(value)
}

/// Three-way comparison with the runtime's ordering rules.
pub fn compare(left: &Value, right: &Value) -> Result<Ordering> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Ok(a.as_bytes().cmp(b.as_bytes())),
        (Value::Boolean(a), Value::Boolean(b)) => Ok(a.cmp(b)),
        (Value::DateTime(a), Value::DateTime(b)) => Ok(a.cmp(b)),
        _ => {
            let (a, b) = promote(BinaryOp::Less, left.clone(), right.clone())?;
            Ok(match (a, b) {
                (Value::Integer(a), Value::Integer(b)) => a.cmp(&b),
                (Value::Integer64(a), Value::Integer64(b)) | (Value::Money(a), Value::Money(b)) => {
                    a.cmp(&b)
                }
                (Value::Float(a), Value::Float(b)) => a.total_cmp(&b),
                (a, b) => return Err(incompatible(BinaryOp::Less, &a, &b)),
            })
        }
    }
}

fn merge_text(op: BinaryOp, value: &Value, other: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Integer(v) => Ok(v.to_string()),
        Value::Integer64(v) => Ok(v.to_string()),
        _ => Err(incompatible(op, value, other)),
    }
}

/// Array concatenation. Arrays with different element types only combine
/// when one of them is a VARIANT ARRAY.
pub fn concat(left: Value, right: Value) -> Result<Value> {
    match (left, right) {
        (Value::Array(mut a), Value::Array(b)) => {
            if a.element == b.element {
                a.items.extend(b.items);
                Ok(Value::Array(a))
            } else if a.element.is_variant() || b.element.is_variant() {
                let mut items = a.items;
                items.extend(b.items);
                Ok(Value::Array(Array::with_items(VariableType::VARIANT, items)))
            } else {
                Err(ValueError::IncompatibleTypes {
                    op: BinaryOp::Concat.symbol(),
                    left: a.array_type(),
                    right: b.array_type(),
                })
            }
        }
        (left, right) => Err(incompatible(BinaryOp::Concat, &left, &right)),
    }
}

/// Wildcard match: `*` matches any run of characters, `?` exactly one.
pub fn like(text: &str, mask: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let mask: Vec<char> = mask.chars().collect();
    let (mut t, mut m) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        if m < mask.len() && (mask[m] == '?' || mask[m] == text[t]) {
            t += 1;
            m += 1;
        } else if m < mask.len() && mask[m] == '*' {
            star = Some((m, t));
            m += 1;
        } else if let Some((star_m, star_t)) = star {
            m = star_m + 1;
            t = star_t + 1;
            star = Some((star_m, star_t + 1));
        } else {
            return false;
        }
    }
    mask[m..].iter().all(|&c| c == '*')
}

fn bitwise(op: BinaryOp, left: Value, right: Value) -> Result<Value> {
    if matches!(op, BinaryOp::ShiftLeft | BinaryOp::ShiftRight) {
        let amount = match right {
            Value::Integer(v) => v,
            ref other => return Err(incompatible(op, &left, other)),
        };
        let shift = |bits: u32| -> Option<u32> { u32::try_from(amount).ok().filter(|&s| s < bits) };
        return match left {
            Value::Integer(v) => Ok(Value::Integer(match (op, shift(32)) {
                (BinaryOp::ShiftLeft, Some(s)) => v << s,
                (_, Some(s)) => v >> s,
                (BinaryOp::ShiftLeft, None) => 0,
                (_, None) => v >> 31,
            })),
            Value::Integer64(v) => Ok(Value::Integer64(match (op, shift(64)) {
                (BinaryOp::ShiftLeft, Some(s)) => v << s,
                (_, Some(s)) => v >> s,
                (BinaryOp::ShiftLeft, None) => 0,
                (_, None) => v >> 63,
            })),
            other => Err(incompatible(op, &other, &Value::Integer(amount))),
        };
    }
    let (left, right) = promote(op, left, right)?;
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(match op {
            BinaryOp::BitAnd => a & b,
            BinaryOp::BitOr => a | b,
            _ => a ^ b,
        })),
        (Value::Integer64(a), Value::Integer64(b)) => Ok(Value::Integer64(match op {
            BinaryOp::BitAnd => a & b,
            BinaryOp::BitOr => a | b,
            _ => a ^ b,
        })),
        (left, right) => Err(incompatible(op, &left, &right)),
    }
}

/// Apply a binary operator. Both operands are always evaluated by the
/// caller; AND and OR do not short-circuit here.
pub fn binary(op: BinaryOp, left: Value, right: Value) -> Result<Value> {
    match op {
        BinaryOp::Add
        | BinaryOp::Subtract
        | BinaryOp::Multiply
        | BinaryOp::Divide
        | BinaryOp::Modulo => arithmetic(op, left, right),
        BinaryOp::Merge => {
            let mut text = merge_text(op, &left, &right)?;
            text.push_str(&merge_text(op, &right, &left)?);
            Ok(Value::String(text))
        }
        BinaryOp::Concat => concat(left, right),
        BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => match (&left, &right) {
            (Value::Boolean(a), Value::Boolean(b)) => Ok(Value::Boolean(match op {
                BinaryOp::And => *a && *b,
                BinaryOp::Or => *a || *b,
                _ => a != b,
            })),
            _ => Err(incompatible(op, &left, &right)),
        },
        BinaryOp::BitAnd
        | BinaryOp::BitOr
        | BinaryOp::BitXor
        | BinaryOp::ShiftLeft
        | BinaryOp::ShiftRight => bitwise(op, left, right),
        BinaryOp::Less
        | BinaryOp::LessEqual
        | BinaryOp::Equal
        | BinaryOp::Unequal
        | BinaryOp::Greater
        | BinaryOp::GreaterEqual => {
            let ordering = compare(&left, &right).map_err(|_| incompatible(op, &left, &right))?;
            Ok(Value::Boolean(match op {
                BinaryOp::Less => ordering == Ordering::Less,
                BinaryOp::LessEqual => ordering != Ordering::Greater,
                BinaryOp::Equal => ordering == Ordering::Equal,
                BinaryOp::Unequal => ordering != Ordering::Equal,
                BinaryOp::Greater => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        BinaryOp::Like => match (&left, &right) {
            (Value::String(text), Value::String(mask)) => Ok(Value::Boolean(like(text, mask))),
            _ => Err(incompatible(op, &left, &right)),
        },
        BinaryOp::In => match &right {
            Value::Array(arr) => {
                for item in &arr.items {
                    if compare(&left, item)? == Ordering::Equal {
                        return Ok(Value::Boolean(true));
                    }
                }
                Ok(Value::Boolean(false))
            }
            _ => Err(incompatible(op, &left, &right)),
        },
        BinaryOp::NullCoalesce => Ok(if left.is_default() { right } else { left }),
    }
}

pub fn unary(op: UnaryOp, operand: Value) -> Result<Value> {
    let ty = operand.value_type();
    let mismatch = |v: &Value| ValueError::IncompatibleTypes {
        op: op.symbol(),
        left: v.value_type(),
        right: v.value_type(),
    };
    match (op, operand) {
        (UnaryOp::Negate, Value::Integer(v)) => v.checked_neg().map(Value::Integer).ok_or_else(|| overflow(ty)),
        (UnaryOp::Negate, Value::Integer64(v)) => {
            v.checked_neg().map(Value::Integer64).ok_or_else(|| overflow(ty))
        }
        (UnaryOp::Negate, Value::Money(v)) => v.checked_neg().map(Value::Money).ok_or_else(|| overflow(ty)),
        (UnaryOp::Negate, Value::Float(v)) => Ok(Value::Float(-v)),
        (UnaryOp::Plus, v) if v.value_type().is_numeric() => Ok(v),
        (UnaryOp::Not, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
        (UnaryOp::BitNeg, Value::Integer(v)) => Ok(Value::Integer(!v)),
        (UnaryOp::BitNeg, Value::Integer64(v)) => Ok(Value::Integer64(!v)),
        (_, v) => Err(mismatch(&v)),
    }
}
