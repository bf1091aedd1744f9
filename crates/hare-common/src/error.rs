//! User diagnostics.
//!
//! Every problem the semantic passes find in user source is an
//! [`ErrorKind`] recorded at a [`Position`] in a [`Diagnostics`] collector.
//! Recording a diagnostic never aborts a pass; the offending node falls
//! back to `VARIANT` and checking continues, so one run reports as many
//! problems as possible.

use serde::Serialize;
use thiserror::Error;

use crate::position::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Error,
    Warning,
}

/// The specific problem found in user source.
///
/// Type names are carried pre-rendered so this crate does not depend on
/// the value model.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum ErrorKind {
    #[error("cannot convert {from} to {to}")]
    CannotConvertType { from: String, to: String },
    #[error("cannot combine MONEY and INTEGER64 without an explicit cast")]
    MoneyInteger64Mix,
    #[error("operator {op} cannot be applied to {ty}")]
    InvalidOperandType { op: String, ty: String },
    #[error("operator {op} cannot combine {left} and {right}")]
    IncompatibleOperands { op: String, left: String, right: String },
    #[error("cannot concatenate {left} and {right}")]
    IncompatibleArrays { left: String, right: String },
    #[error("{ty} is not an array")]
    NotAnArray { ty: String },
    #[error("{ty} is not a record")]
    NotARecord { ty: String },
    #[error("{ty} is not an object")]
    NotAnObject { ty: String },
    #[error("use the arrow operator `->` to access members of an object")]
    ColumnOfObject,
    #[error("use the dot operator `.` to access cells of a record")]
    MemberOfRecord,
    #[error("object type {object_type} has no member {member}")]
    UnknownMember { object_type: String, member: String },
    #[error("expected `(` after method {member}")]
    MethodWithoutCall { member: String },
    #[error("{name} is not a function")]
    NotAFunction { name: String },
    #[error("{name} is not a variable")]
    NotAVariable { name: String },
    #[error("too many parameters for {function} (at most {max})")]
    TooManyParameters { function: String, max: usize },
    #[error("parameter {param} of {function} has no default value")]
    TooFewParameters { function: String, param: String },
    #[error("{function} does not return a value")]
    MacroHasNoValue { function: String },
    #[error("a macro cannot return a value")]
    ReturnValueInMacro,
    #[error("this function must return a value")]
    MissingReturnValue,
    #[error("cannot assign to constant {name}")]
    CannotAssignConstant { name: String },
    #[error("BREAK is only allowed inside a loop")]
    BreakOutsideLoop,
    #[error("CONTINUE is only allowed inside a loop")]
    ContinueOutsideLoop,
    #[error("END is only allowed inside an array index")]
    EndOutsideArrayIndex,
    #[error("YIELD is only allowed inside a generator function")]
    YieldOutsideGenerator,
    #[error("AWAIT is only allowed inside an async function")]
    AwaitOutsideAsync,
    #[error("YIELD and AWAIT are not allowed inside SQL expressions")]
    YieldInSql,
    #[error("duplicate case label {label}")]
    DuplicateCaseLabel { label: String },
    #[error("expected a constant expression")]
    ExpectedConstantExpression,
    #[error("aggregate function {function} can only be used inside a SELECT")]
    AggregateOutsideSelect { function: String },
    #[error("aggregate functions cannot be nested")]
    NestedAggregate,
    #[error("column {column} must appear in GROUP BY or be used within an aggregate")]
    ColumnNotGrouped { column: String },
    #[error("an aggregate in an inner SELECT cannot refer to the outer SELECT")]
    AggregateInnerSelect,
    #[error("temporary {name} cannot be used inside an aggregate")]
    TemporaryInAggregate { name: String },
    #[error("function pointer rebinding is not legal here")]
    RebindNotAllowed,
    #[error("passthrough parameter #{index} is out of range (1 to {max})")]
    InvalidPassthrough { index: i32, max: usize },
    #[error("duplicate cell {name}")]
    DuplicateCell { name: String },
    #[error("cannot delete cell {name}, it was never set")]
    DeleteUnknownCell { name: String },
    #[error("THROW requires an object, found {ty}")]
    ThrowNonObject { ty: String },
    #[error("{reason}")]
    ConstantFoldFailed { reason: String },
    #[error("statement has no effect")]
    NoEffect,
}

impl ErrorKind {
    /// Stable code for this kind. Codes are never reused.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::CannotConvertType { .. } => "E0001",
            ErrorKind::MoneyInteger64Mix => "E0002",
            ErrorKind::InvalidOperandType { .. } => "E0003",
            ErrorKind::IncompatibleOperands { .. } => "E0004",
            ErrorKind::IncompatibleArrays { .. } => "E0005",
            ErrorKind::NotAnArray { .. } => "E0006",
            ErrorKind::NotARecord { .. } => "E0007",
            ErrorKind::NotAnObject { .. } => "E0008",
            ErrorKind::ColumnOfObject => "E0009",
            ErrorKind::MemberOfRecord => "E0010",
            ErrorKind::UnknownMember { .. } => "E0011",
            ErrorKind::MethodWithoutCall { .. } => "E0012",
            ErrorKind::NotAFunction { .. } => "E0013",
            ErrorKind::NotAVariable { .. } => "E0014",
            ErrorKind::TooManyParameters { .. } => "E0015",
            ErrorKind::TooFewParameters { .. } => "E0016",
            ErrorKind::MacroHasNoValue { .. } => "E0017",
            ErrorKind::ReturnValueInMacro => "E0018",
            ErrorKind::MissingReturnValue => "E0019",
            ErrorKind::CannotAssignConstant { .. } => "E0020",
            ErrorKind::BreakOutsideLoop => "E0021",
            ErrorKind::ContinueOutsideLoop => "E0022",
            ErrorKind::EndOutsideArrayIndex => "E0023",
            ErrorKind::YieldOutsideGenerator => "E0024",
            ErrorKind::AwaitOutsideAsync => "E0025",
            ErrorKind::YieldInSql => "E0026",
            ErrorKind::DuplicateCaseLabel { .. } => "E0027",
            ErrorKind::ExpectedConstantExpression => "E0028",
            ErrorKind::AggregateOutsideSelect { .. } => "E0029",
            ErrorKind::NestedAggregate => "E0030",
            ErrorKind::ColumnNotGrouped { .. } => "E0031",
            ErrorKind::AggregateInnerSelect => "E0032",
            ErrorKind::TemporaryInAggregate { .. } => "E0033",
            ErrorKind::RebindNotAllowed => "E0034",
            ErrorKind::InvalidPassthrough { .. } => "E0035",
            ErrorKind::DuplicateCell { .. } => "E0036",
            ErrorKind::DeleteUnknownCell { .. } => "E0037",
            ErrorKind::ThrowNonObject { .. } => "E0038",
            ErrorKind::ConstantFoldFailed { .. } => "E0039",
            ErrorKind::NoEffect => "W0001",
        }
    }

    pub fn default_severity(&self) -> Severity {
        if self.code().starts_with('W') {
            Severity::Warning
        } else {
            Severity::Error
        }
    }
}

/// One recorded problem.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub severity: Severity,
    pub position: Position,
}

impl Diagnostic {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Accumulates diagnostics for one compilation unit.
///
/// With a limit set, diagnostics past the limit are counted but not
/// stored.
#[derive(Debug, Default)]
pub struct Diagnostics {
    list: Vec<Diagnostic>,
    limit: Option<usize>,
    dropped: usize,
    warnings_as_errors: bool,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: Option<usize>, warnings_as_errors: bool) -> Self {
        Self {
            limit,
            warnings_as_errors,
            ..Self::default()
        }
    }

    pub fn report(&mut self, position: Position, kind: ErrorKind) {
        let mut severity = kind.default_severity();
        if self.warnings_as_errors {
            severity = Severity::Error;
        }
        if self.limit.is_some_and(|limit| self.list.len() >= limit) {
            self.dropped += 1;
            return;
        }
        self.list.push(Diagnostic {
            kind,
            severity,
            position,
        });
    }

    pub fn has_errors(&self) -> bool {
        self.dropped > 0 || self.list.iter().any(Diagnostic::is_error)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.list.iter()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Number of diagnostics not stored because the limit was reached.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.list
    }
}
