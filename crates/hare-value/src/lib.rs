//! HareScript values and the operations the runtime performs on them.
//!
//! The constant folder evaluates through exactly these functions, so a
//! folded literal is identical to what executing the expression produces.
//!
//! - [`ty`]: variable types (type kinds plus the array bit)
//! - [`value`]: values, records, arrays
//! - [`ops`]: binary and unary operators, numeric promotion
//! - [`cast`]: implicit and explicit conversions
//! - [`builtins`]: pure builtin functions and the desugaring helpers
//! - [`error`]: runtime errors

pub mod builtins;
pub mod cast;
pub mod error;
pub mod ops;
pub mod ty;
pub mod value;

pub use error::ValueError;
pub use ops::{BinaryOp, UnaryOp};
pub use ty::{TypeKind, VariableType};
pub use value::{Array, DateTime, Handle, Record, Value, MONEY_SCALE};
