//! Builtin functions that operate on values alone.
//!
//! The public ones (LENGTH, SEARCHELEMENT, ...) can be folded at compile
//! time when their arguments are constant. The `:`-prefixed ones are the
//! helpers desugared code calls to update records, arrays and objects;
//! their names cannot be written in user source.

use std::cmp::Ordering;

use crate::error::{Result, ValueError};
use crate::ops::compare;
use crate::value::{Array, Record, Value};

pub const LENGTH: &str = "LENGTH";
pub const ISDEFAULTVALUE: &str = "ISDEFAULTVALUE";
pub const SEARCHELEMENT: &str = "SEARCHELEMENT";
pub const TOUPPERCASE: &str = "TOUPPERCASE";
pub const TOLOWERCASE: &str = "TOLOWERCASE";
pub const ABS: &str = "ABS";

pub const ARRAY_INSERT: &str = ":ARRAYINSERT";
pub const ARRAY_DELETE: &str = ":ARRAYDELETE";
pub const ARRAY_APPEND: &str = ":ARRAYAPPEND";
pub const CELL_SET: &str = ":RECORDCELLSET";
pub const CELL_INSERT: &str = ":RECORDCELLINSERT";
pub const CELL_UPDATE: &str = ":RECORDCELLUPDATE";
pub const CELL_DELETE: &str = ":RECORDCELLDELETE";
pub const RECORD_MERGE: &str = ":RECORDMERGE";
pub const OBJECT_MEMBER_SET: &str = ":OBJECTMEMBERSET";
pub const YIELD: &str = ":YIELD";

fn expect_args(function: &str, args: &[Value], expected: usize) -> Result<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(ValueError::BadArguments {
            function: function.to_string(),
            expected,
        })
    }
}

fn bad(function: &str, expected: usize) -> ValueError {
    ValueError::BadArguments {
        function: function.to_string(),
        expected,
    }
}

fn index_arg(value: &Value, len: usize, allow_end: bool) -> Result<usize> {
    let index = match value {
        Value::Integer(v) => *v as i64,
        Value::Integer64(v) => *v,
        _ => return Err(ValueError::IndexOutOfRange { index: -1, len }),
    };
    let limit = if allow_end { len } else { len.saturating_sub(1) };
    if index < 0 || index as usize > limit || (!allow_end && len == 0) {
        return Err(ValueError::IndexOutOfRange { index, len });
    }
    Ok(index as usize)
}

fn take_array(function: &str, value: Value, expected: usize) -> Result<Array> {
    match value {
        Value::Array(arr) => Ok(arr),
        _ => Err(bad(function, expected)),
    }
}

fn take_record(function: &str, value: Value, expected: usize) -> Result<Record> {
    match value {
        Value::Record(rec) => Ok(rec),
        _ => Err(bad(function, expected)),
    }
}

fn take_name(function: &str, value: &Value, expected: usize) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        _ => Err(bad(function, expected)),
    }
}

/// Read element `index` of an array, range checked.
pub fn array_element(arr: &Array, index: &Value) -> Result<Value> {
    let index = index_arg(index, arr.items.len(), false)?;
    Ok(arr.items[index].clone())
}

/// Read a cell of a record.
pub fn record_cell(rec: &Record, name: &str) -> Result<Value> {
    if !rec.exists() {
        return Err(ValueError::NonExistingRecord {
            name: name.to_ascii_uppercase(),
        });
    }
    rec.get(name).cloned().ok_or_else(|| ValueError::CellNotFound {
        name: name.to_ascii_uppercase(),
    })
}

/// Call a builtin by name. Returns `None` for names that are not value
/// builtins (user functions, object helpers that need a heap).
pub fn call(name: &str, args: Vec<Value>) -> Option<Result<Value>> {
    let result = match name {
        LENGTH => length(args),
        ISDEFAULTVALUE => expect_args(name, &args, 1).map(|_| Value::Boolean(args[0].is_default())),
        SEARCHELEMENT => search_element(args),
        TOUPPERCASE | TOLOWERCASE => change_case(name, args),
        ABS => abs(args),
        ARRAY_INSERT => array_insert(args),
        ARRAY_DELETE => array_delete(args),
        ARRAY_APPEND => array_append(args),
        CELL_SET | CELL_INSERT | CELL_UPDATE => cell_write(name, args),
        CELL_DELETE => cell_delete(args),
        RECORD_MERGE => record_merge(args),
        _ => return None,
    };
    Some(result)
}

fn length(args: Vec<Value>) -> Result<Value> {
    expect_args(LENGTH, &args, 1)?;
    let len = match &args[0] {
        Value::String(s) => s.len(),
        Value::Array(arr) => arr.items.len(),
        Value::Blob(b) => b.len(),
        Value::Record(rec) => rec.len(),
        _ => return Err(bad(LENGTH, 1)),
    };
    i32::try_from(len)
        .map(Value::Integer)
        .map_err(|_| ValueError::Overflow {
            ty: crate::VariableType::INTEGER,
        })
}

/// 0-based position of the first equal element, -1 when absent.
fn search_element(args: Vec<Value>) -> Result<Value> {
    expect_args(SEARCHELEMENT, &args, 2)?;
    let Value::Array(arr) = &args[0] else {
        return Err(bad(SEARCHELEMENT, 2));
    };
    for (i, item) in arr.items.iter().enumerate() {
        if compare(item, &args[1])? == Ordering::Equal {
            return Ok(Value::Integer(i as i32));
        }
    }
    Ok(Value::Integer(-1))
}

fn change_case(name: &str, args: Vec<Value>) -> Result<Value> {
    expect_args(name, &args, 1)?;
    let text = take_name(name, &args[0], 1)?;
    Ok(Value::String(if name == TOUPPERCASE {
        text.to_uppercase()
    } else {
        text.to_lowercase()
    }))
}

fn abs(args: Vec<Value>) -> Result<Value> {
    expect_args(ABS, &args, 1)?;
    let ty = args[0].value_type();
    let overflow = || ValueError::Overflow { ty };
    match &args[0] {
        Value::Integer(v) => v.checked_abs().map(Value::Integer).ok_or_else(overflow),
        Value::Integer64(v) => v.checked_abs().map(Value::Integer64).ok_or_else(overflow),
        Value::Money(v) => v.checked_abs().map(Value::Money).ok_or_else(overflow),
        Value::Float(v) => Ok(Value::Float(v.abs())),
        _ => Err(bad(ABS, 1)),
    }
}

/// `:ARRAYINSERT(array, index, value)`; index may equal the length.
fn array_insert(args: Vec<Value>) -> Result<Value> {
    expect_args(ARRAY_INSERT, &args, 3)?;
    let mut args = args.into_iter();
    let (arr, index, value) = (args.next(), args.next(), args.next());
    let (Some(arr), Some(index), Some(value)) = (arr, index, value) else {
        return Err(bad(ARRAY_INSERT, 3));
    };
    let mut arr = take_array(ARRAY_INSERT, arr, 3)?;
    let at = index_arg(&index, arr.items.len(), true)?;
    let value = crate::cast::cast(value, arr.element, false)?;
    arr.items.insert(at, value);
    Ok(Value::Array(arr))
}

fn array_delete(args: Vec<Value>) -> Result<Value> {
    expect_args(ARRAY_DELETE, &args, 2)?;
    let mut args = args.into_iter();
    let (Some(arr), Some(index)) = (args.next(), args.next()) else {
        return Err(bad(ARRAY_DELETE, 2));
    };
    let mut arr = take_array(ARRAY_DELETE, arr, 2)?;
    let at = index_arg(&index, arr.items.len(), false)?;
    arr.items.remove(at);
    Ok(Value::Array(arr))
}

fn array_append(args: Vec<Value>) -> Result<Value> {
    expect_args(ARRAY_APPEND, &args, 2)?;
    let mut args = args.into_iter();
    let (Some(arr), Some(value)) = (args.next(), args.next()) else {
        return Err(bad(ARRAY_APPEND, 2));
    };
    let mut arr = take_array(ARRAY_APPEND, arr, 2)?;
    let value = crate::cast::cast(value, arr.element, false)?;
    arr.items.push(value);
    Ok(Value::Array(arr))
}

/// `:RECORDCELLSET` creates or overwrites, `:RECORDCELLINSERT` requires
/// the cell to be new, `:RECORDCELLUPDATE` requires it to exist.
fn cell_write(name: &str, args: Vec<Value>) -> Result<Value> {
    expect_args(name, &args, 3)?;
    let mut args = args.into_iter();
    let (Some(rec), Some(cell), Some(value)) = (args.next(), args.next(), args.next()) else {
        return Err(bad(name, 3));
    };
    let mut rec = take_record(name, rec, 3)?;
    let cell = take_name(name, &cell, 3)?;
    match name {
        CELL_INSERT if rec.contains(&cell) => {
            return Err(ValueError::CellExists {
                name: cell.to_ascii_uppercase(),
            })
        }
        CELL_UPDATE if !rec.exists() => {
            return Err(ValueError::NonExistingRecord {
                name: cell.to_ascii_uppercase(),
            })
        }
        CELL_UPDATE if !rec.contains(&cell) => {
            return Err(ValueError::CellNotFound {
                name: cell.to_ascii_uppercase(),
            })
        }
        _ => {}
    }
    rec.set(&cell, value);
    Ok(Value::Record(rec))
}

fn cell_delete(args: Vec<Value>) -> Result<Value> {
    expect_args(CELL_DELETE, &args, 2)?;
    let mut args = args.into_iter();
    let (Some(rec), Some(cell)) = (args.next(), args.next()) else {
        return Err(bad(CELL_DELETE, 2));
    };
    let mut rec = take_record(CELL_DELETE, rec, 2)?;
    let cell = take_name(CELL_DELETE, &cell, 2)?;
    if !rec.remove(&cell) {
        return Err(ValueError::CellNotFound {
            name: cell.to_ascii_uppercase(),
        });
    }
    Ok(Value::Record(rec))
}

/// `:RECORDMERGE(target, source)` copies every cell of `source` into
/// `target`, overwriting cells with the same name.
fn record_merge(args: Vec<Value>) -> Result<Value> {
    expect_args(RECORD_MERGE, &args, 2)?;
    let mut args = args.into_iter();
    let (Some(target), Some(source)) = (args.next(), args.next()) else {
        return Err(bad(RECORD_MERGE, 2));
    };
    let mut target = take_record(RECORD_MERGE, target, 2)?;
    let source = take_record(RECORD_MERGE, source, 2)?;
    if !target.exists() {
        target = Record::empty();
    }
    for (name, value) in source.iter() {
        target.set(name, value.clone());
    }
    Ok(Value::Record(target))
}
