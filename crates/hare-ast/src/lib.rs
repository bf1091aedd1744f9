//! The HareScript syntax tree shared by the semantic passes.
//!
//! Nodes live in arenas owned by [`Ast`] and refer to each other through
//! typed indices ([`ExprId`], [`StmtId`], [`BlockId`], [`SymbolId`]). A
//! pass that rewrites a node replaces the node's content in place, so every
//! parent keeps pointing at the same index and no back-patching is needed.
//! Nodes are never freed while the tree is alive.
//!
//! - [`expr`]: rvalue kinds
//! - [`stmt`]: statement kinds
//! - [`lvalue`]: the flattened assignment target
//! - [`symbols`]: variables, functions, object types and scopes
//! - [`types`]: the per-expression type table
//! - [`builder`]: the tree builder used by the passes to synthesize code
//! - [`walk`], [`copy`], [`dump`]: traversal, deep copy and printing

pub mod builder;
pub mod copy;
pub mod dump;
pub mod expr;
pub mod lvalue;
pub mod stmt;
pub mod symbols;
pub mod types;
pub mod walk;

use hare_common::Position;
use la_arena::{Arena, Idx};

pub use builder::{MaterializedLvalue, TreeBuilder};
pub use expr::{ArrayEntry, ExprKind, OrderBy, PtrBinding, RecordEntry, SelectColumn, SqlSelect, SqlSource};
pub use lvalue::{ConvertedLvalue, LayerKind, LvalueLayer};
pub use stmt::{DeepOp, DeepOperation, StmtKind, SwitchCase, SwitchStatement};
pub use symbols::{
    FieldKind, FunctionDef, FunctionFlags, FunctionKind, ObjectDef, ObjectField, Parameter, Symbol,
    SymbolKind, SymbolTable, VariableDef, GENERATOR_TYPE,
};
pub use types::TypeTable;

pub type ExprId = Idx<Expr>;
pub type StmtId = Idx<Stmt>;
pub type BlockId = Idx<Block>;
pub type SymbolId = Idx<Symbol>;

/// An rvalue node.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub pos: Position,
    pub kind: ExprKind,
}

/// A statement node.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub pos: Position,
    pub kind: StmtKind,
}

/// An ordered statement list. Blocks are separate from statements so that
/// expression blocks and function bodies can own one directly.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub pos: Position,
    pub statements: Vec<StmtId>,
}

/// Storage for every node of one compilation unit.
#[derive(Debug, Default)]
pub struct Ast {
    exprs: Arena<Expr>,
    stmts: Arena<Stmt>,
    blocks: Arena<Block>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_expr(&mut self, pos: Position, kind: ExprKind) -> ExprId {
        self.exprs.alloc(Expr { pos, kind })
    }

    pub fn alloc_stmt(&mut self, pos: Position, kind: StmtKind) -> StmtId {
        self.stmts.alloc(Stmt { pos, kind })
    }

    pub fn alloc_block(&mut self, pos: Position) -> BlockId {
        self.blocks.alloc(Block {
            pos,
            statements: Vec::new(),
        })
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id]
    }

    pub fn expr_mut(&mut self, id: ExprId) -> &mut Expr {
        &mut self.exprs[id]
    }

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id]
    }

    pub fn stmt_mut(&mut self, id: StmtId) -> &mut Stmt {
        &mut self.stmts[id]
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id]
    }

    /// Replace the content of an expression, keeping its index and
    /// position.
    pub fn replace_expr(&mut self, id: ExprId, kind: ExprKind) {
        self.exprs[id].kind = kind;
    }

    pub fn replace_stmt(&mut self, id: StmtId, kind: StmtKind) {
        self.stmts[id].kind = kind;
    }

    /// Wrap an expression in a new parent without touching the old
    /// parent.
    ///
    /// The current content moves to a fresh index which is handed to
    /// `wrap`; what `wrap` returns becomes the content at `id`. Returns the
    /// index the old content now lives at.
    pub fn wrap_expr(&mut self, id: ExprId, wrap: impl FnOnce(ExprId) -> ExprKind) -> ExprId {
        let moved = self.exprs[id].clone();
        let inner = self.exprs.alloc(moved);
        self.exprs[id].kind = wrap(inner);
        inner
    }

    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hare_value::{BinaryOp, Value};

    #[test]
    fn wrap_keeps_parent_index() {
        let mut ast = Ast::new();
        let pos = Position::new(1, 1);
        let lhs = ast.alloc_expr(pos, ExprKind::Constant(Value::Integer(1)));
        let rhs = ast.alloc_expr(pos, ExprKind::Constant(Value::Integer(2)));
        let sum = ast.alloc_expr(pos, ExprKind::BinaryOperator { op: BinaryOp::Add, lhs, rhs });

        let inner = ast.wrap_expr(lhs, |inner| ExprKind::Cast {
            expr: inner,
            to: hare_value::VariableType::FLOAT,
            explicit: false,
            allow_param_cast: false,
        });

        assert_eq!(ast.expr(inner).kind, ExprKind::Constant(Value::Integer(1)));
        assert!(matches!(ast.expr(lhs).kind, ExprKind::Cast { expr, .. } if expr == inner));
        assert!(matches!(ast.expr(sum).kind, ExprKind::BinaryOperator { lhs: l, .. } if l == lhs));
    }
}
