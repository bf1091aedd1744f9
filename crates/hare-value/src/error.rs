use thiserror::Error;

use crate::ty::VariableType;

/// Runtime errors raised by value operations.
///
/// The constant folder turns these into diagnostics at the position of the
/// expression it was folding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("{ty} overflow")]
    Overflow { ty: VariableType },
    #[error("division by zero")]
    DivisionByZero,
    #[error("cannot convert {from} to {to}")]
    CannotConvert { from: VariableType, to: VariableType },
    #[error("operator {op} cannot combine {left} and {right}")]
    IncompatibleTypes {
        op: &'static str,
        left: VariableType,
        right: VariableType,
    },
    #[error("array index {index} out of range (length {len})")]
    IndexOutOfRange { index: i64, len: usize },
    #[error("record has no cell {name}")]
    CellNotFound { name: String },
    #[error("record already has a cell {name}")]
    CellExists { name: String },
    #[error("cannot access cell {name} of a non-existing record")]
    NonExistingRecord { name: String },
    #[error("{function} expects {expected} arguments")]
    BadArguments { function: String, expected: usize },
}

pub type Result<T> = std::result::Result<T, ValueError>;
