//! Statement kinds.

use hare_value::BinaryOp;

use crate::expr::SqlSource;
use crate::lvalue::ConvertedLvalue;
use crate::{BlockId, ExprId, StmtId, SymbolId};

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Block(BlockId),
    If {
        condition: ExprId,
        then: StmtId,
        otherwise: Option<StmtId>,
    },
    For {
        init: Option<StmtId>,
        condition: Option<ExprId>,
        step: Option<StmtId>,
        body: StmtId,
    },
    /// `FOREVERY (variable FROM source)`; `position` is the optional
    /// `#variable` counter.
    ForEvery {
        variable: SymbolId,
        source: ExprId,
        position: Option<SymbolId>,
        body: StmtId,
        is_rewritten: bool,
    },
    Break,
    Continue,
    Return {
        value: Option<ExprId>,
    },
    Switch(Box<SwitchStatement>),
    TryCatch {
        try_block: BlockId,
        exception: Option<SymbolId>,
        catch_block: BlockId,
    },
    TryFinally {
        try_block: BlockId,
        finally_block: BlockId,
    },
    Throw {
        value: ExprId,
    },
    SingleExpression {
        expr: ExprId,
    },
    Assign {
        target: SymbolId,
        value: ExprId,
    },
    /// Sets a variable to the default value of its type.
    Initialize {
        variable: SymbolId,
    },
    DeepOperation(Box<DeepOperation>),
    /// `INSERT INTO target VALUES row`: target is a TABLE or a RECORD
    /// ARRAY variable.
    SqlInsert {
        target: ExprId,
        row: ExprId,
    },
    SqlUpdate {
        source: SqlSource,
        set: Vec<(String, ExprId)>,
        condition: Option<ExprId>,
    },
    SqlDelete {
        source: SqlSource,
        condition: Option<ExprId>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub labels: Vec<ExprId>,
    pub block: BlockId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchStatement {
    pub value: ExprId,
    pub cases: Vec<SwitchCase>,
    pub default: Option<BlockId>,
    pub is_rewritten: bool,
}

/// A store through an lvalue chain, such as `a[i].cell->member := v` or
/// `INSERT v INTO a.list AT END`.
#[derive(Debug, Clone, PartialEq)]
pub struct DeepOperation {
    pub lvalue: ConvertedLvalue,
    pub op: DeepOp,
    pub is_rewritten: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeepOp {
    Set(ExprId),
    /// `target op= value`.
    Compound { op: BinaryOp, value: ExprId },
    ArrayInsert { index: ExprId, value: ExprId },
    ArrayDelete { index: ExprId },
    CellInsert { name: String, value: ExprId },
    CellDelete { name: String },
}

impl DeepOp {
    /// Whether the operation reads the current value of the target.
    pub fn needs_old_value(&self) -> bool {
        !matches!(self, DeepOp::Set(_))
    }
}

impl StmtKind {
    pub fn name(&self) -> &'static str {
        match self {
            StmtKind::Block(_) => "Block",
            StmtKind::If { .. } => "If",
            StmtKind::For { .. } => "For",
            StmtKind::ForEvery { .. } => "ForEvery",
            StmtKind::Break => "Break",
            StmtKind::Continue => "Continue",
            StmtKind::Return { .. } => "Return",
            StmtKind::Switch(_) => "Switch",
            StmtKind::TryCatch { .. } => "TryCatch",
            StmtKind::TryFinally { .. } => "TryFinally",
            StmtKind::Throw { .. } => "Throw",
            StmtKind::SingleExpression { .. } => "SingleExpression",
            StmtKind::Assign { .. } => "Assign",
            StmtKind::Initialize { .. } => "Initialize",
            StmtKind::DeepOperation(_) => "DeepOperation",
            StmtKind::SqlInsert { .. } => "SqlInsert",
            StmtKind::SqlUpdate { .. } => "SqlUpdate",
            StmtKind::SqlDelete { .. } => "SqlDelete",
        }
    }
}
