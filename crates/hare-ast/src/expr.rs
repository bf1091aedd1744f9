//! Rvalue kinds.

use hare_common::Position;
use hare_value::{BinaryOp, UnaryOp, Value, VariableType};

use crate::{BlockId, ExprId, SymbolId};

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Constant(Value),
    Variable(SymbolId),
    BinaryOperator {
        op: BinaryOp,
        lhs: ExprId,
        rhs: ExprId,
    },
    UnaryOperator {
        op: UnaryOp,
        operand: ExprId,
    },
    /// `allow_param_cast` marks the implicit conversion of a call argument
    /// to its parameter type.
    Cast {
        expr: ExprId,
        to: VariableType,
        explicit: bool,
        allow_param_cast: bool,
    },
    ConditionalOperator {
        condition: ExprId,
        then: ExprId,
        otherwise: ExprId,
    },
    ArrayElementConst {
        array: ExprId,
        index: ExprId,
    },
    /// A copy of `array` with element `index` replaced by `value`.
    ArrayElementModify {
        array: ExprId,
        index: ExprId,
        value: ExprId,
    },
    RecordColumnConst {
        record: ExprId,
        name: String,
    },
    ObjectMemberConst {
        object: ExprId,
        name: String,
        via_this: bool,
    },
    ObjectMethodCall {
        object: ExprId,
        name: String,
        args: Vec<ExprId>,
        via_this: bool,
    },
    ObjectNew {
        object_type: SymbolId,
        args: Vec<ExprId>,
    },
    FunctionCall {
        function: SymbolId,
        args: Vec<ExprId>,
    },
    /// `PTR f` or `PTR f(#1, 3)`. Without bindings the pointer takes the
    /// function's own parameter list.
    FunctionPtr {
        function: SymbolId,
        bindings: Option<Vec<PtrBinding>>,
    },
    FunctionPtrCall {
        ptr: ExprId,
        args: Vec<ExprId>,
    },
    FunctionPtrRebind {
        ptr: ExprId,
        bindings: Vec<PtrBinding>,
    },
    Yield {
        value: ExprId,
        star: bool,
    },
    Await {
        value: ExprId,
    },
    ConstantRecord {
        entries: Vec<RecordEntry>,
    },
    /// `element` is the declared element type; `None` infers it from the
    /// entries.
    ConstantArray {
        element: Option<VariableType>,
        entries: Vec<ArrayEntry>,
    },
    /// Runs `block`, then evaluates to the value of `result`.
    ExpressionBlock {
        block: BlockId,
        result: SymbolId,
    },
    TypeInfo {
        ty: VariableType,
    },
    /// `END` inside an array index: the length of the indexed array.
    End,
    SqlSelect(Box<SqlSelect>),
}

/// One parameter slot of a function pointer binding.
///
/// A positive `passthrough` forwards caller argument `#n`; zero binds the
/// slot to `bound`.
#[derive(Debug, Clone, PartialEq)]
pub struct PtrBinding {
    pub passthrough: i32,
    pub bound: Option<ExprId>,
}

impl PtrBinding {
    pub fn pass(index: i32) -> Self {
        Self {
            passthrough: index,
            bound: None,
        }
    }

    pub fn bind(value: ExprId) -> Self {
        Self {
            passthrough: 0,
            bound: Some(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordEntry {
    Set { name: String, value: ExprId },
    Spread(ExprId),
    Delete { name: String, pos: Position },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayEntry {
    pub value: ExprId,
    pub spread: bool,
}

/// A row source of a SELECT, UPDATE or DELETE: `row` is the variable the
/// clauses see each row through.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlSource {
    pub row: SymbolId,
    pub source: ExprId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectColumn {
    pub name: String,
    pub value: ExprId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub expr: ExprId,
    pub ascending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlSelect {
    pub sources: Vec<SqlSource>,
    /// `SELECT TEMPORARY x := ...` definitions, visible to the later
    /// clauses.
    pub temporaries: Vec<(SymbolId, ExprId)>,
    pub columns: Vec<SelectColumn>,
    pub condition: Option<ExprId>,
    pub group_by: Vec<ExprId>,
    pub having: Option<ExprId>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<ExprId>,
    /// `SELECT AS type`: a single-column select producing an array of that
    /// column instead of a RECORD ARRAY.
    pub single_column: bool,
}

impl ExprKind {
    pub fn constant(&self) -> Option<&Value> {
        match self {
            ExprKind::Constant(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, ExprKind::Constant(_))
    }

    /// Short name of the node kind, for logs and internal fault messages.
    pub fn name(&self) -> &'static str {
        match self {
            ExprKind::Constant(_) => "Constant",
            ExprKind::Variable(_) => "Variable",
            ExprKind::BinaryOperator { .. } => "BinaryOperator",
            ExprKind::UnaryOperator { .. } => "UnaryOperator",
            ExprKind::Cast { .. } => "Cast",
            ExprKind::ConditionalOperator { .. } => "ConditionalOperator",
            ExprKind::ArrayElementConst { .. } => "ArrayElementConst",
            ExprKind::ArrayElementModify { .. } => "ArrayElementModify",
            ExprKind::RecordColumnConst { .. } => "RecordColumnConst",
            ExprKind::ObjectMemberConst { .. } => "ObjectMemberConst",
            ExprKind::ObjectMethodCall { .. } => "ObjectMethodCall",
            ExprKind::ObjectNew { .. } => "ObjectNew",
            ExprKind::FunctionCall { .. } => "FunctionCall",
            ExprKind::FunctionPtr { .. } => "FunctionPtr",
            ExprKind::FunctionPtrCall { .. } => "FunctionPtrCall",
            ExprKind::FunctionPtrRebind { .. } => "FunctionPtrRebind",
            ExprKind::Yield { .. } => "Yield",
            ExprKind::Await { .. } => "Await",
            ExprKind::ConstantRecord { .. } => "ConstantRecord",
            ExprKind::ConstantArray { .. } => "ConstantArray",
            ExprKind::ExpressionBlock { .. } => "ExpressionBlock",
            ExprKind::TypeInfo { .. } => "TypeInfo",
            ExprKind::End => "End",
            ExprKind::SqlSelect(_) => "SqlSelect",
        }
    }
}
