//! Tree construction for synthesized code.
//!
//! The desugarer and the checker never allocate nodes by hand; they go
//! through [`TreeBuilder`], which owns the tree and the symbol table and
//! keeps a cursor stack of open blocks. Statements built with the `emit_*`
//! helpers are appended to the innermost open block.

use hare_common::{ice, Position};
use hare_value::{BinaryOp, UnaryOp, Value, VariableType};
use tracing::trace;

use crate::expr::ExprKind;
use crate::lvalue::{ConvertedLvalue, LayerKind};
use crate::stmt::StmtKind;
use crate::symbols::SymbolTable;
use crate::{Ast, BlockId, ExprId, StmtId, SymbolId};

/// Where a materialized lvalue chain can be read and written.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterializedLvalue {
    /// Variable holding the base of the chain: the original base variable
    /// or a temporary holding the evaluated base expression.
    pub base: SymbolId,
    /// Expression block evaluating to the current value at the end of the
    /// chain, when the old value was requested.
    pub current: Option<ExprId>,
    /// Block the caller appends the computation of the new value to.
    pub work_block: BlockId,
}

#[derive(Debug)]
pub struct TreeBuilder {
    pub ast: Ast,
    pub symbols: SymbolTable,
    open_blocks: Vec<BlockId>,
    functions: Vec<SymbolId>,
}

impl TreeBuilder {
    pub fn new(ast: Ast, symbols: SymbolTable) -> Self {
        Self {
            ast,
            symbols,
            open_blocks: Vec::new(),
            functions: Vec::new(),
        }
    }

    pub fn into_parts(self) -> (Ast, SymbolTable) {
        (self.ast, self.symbols)
    }

    // ── Block cursor ────────────────────────────────────────────────────

    pub fn open_block(&mut self, block: BlockId) {
        self.open_blocks.push(block);
    }

    pub fn close_block(&mut self) -> BlockId {
        match self.open_blocks.pop() {
            Some(block) => block,
            None => ice!("close_block without an open block"),
        }
    }

    pub fn current_block(&self) -> Option<BlockId> {
        self.open_blocks.last().copied()
    }

    /// Run `f` with `block` as the emit target.
    pub fn scoped<R>(&mut self, block: BlockId, f: impl FnOnce(&mut Self) -> R) -> R {
        let depth = self.open_blocks.len();
        self.open_block(block);
        let result = f(self);
        if self.open_blocks.len() != depth + 1 {
            ice!("unbalanced block cursor: {} open, expected {}", self.open_blocks.len(), depth + 1);
        }
        self.open_blocks.truncate(depth);
        result
    }

    /// Append a statement to the innermost open block.
    pub fn emit(&mut self, stmt: StmtId) {
        let Some(block) = self.current_block() else {
            ice!("emit of {} with no open block", self.ast.stmt(stmt).kind.name());
        };
        trace!(kind = self.ast.stmt(stmt).kind.name(), "emit");
        self.ast.block_mut(block).statements.push(stmt);
    }

    pub fn new_block(&mut self, pos: Position) -> BlockId {
        self.ast.alloc_block(pos)
    }

    // ── Function context ────────────────────────────────────────────────

    /// Enter `function`: its body becomes the emit target and the current
    /// function for generator rewrites.
    pub fn open_function(&mut self, function: SymbolId, body: BlockId) {
        self.functions.push(function);
        self.open_block(body);
    }

    pub fn close_function(&mut self) {
        self.close_block();
        if self.functions.pop().is_none() {
            ice!("close_function without a function");
        }
    }

    pub fn current_function(&self) -> Option<SymbolId> {
        self.functions.last().copied()
    }

    pub fn temporary(&mut self, pos: Position, ty: VariableType) -> SymbolId {
        self.symbols.temporary(pos, ty)
    }

    // ── Expressions ─────────────────────────────────────────────────────

    pub fn expr(&mut self, pos: Position, kind: ExprKind) -> ExprId {
        self.ast.alloc_expr(pos, kind)
    }

    pub fn constant(&mut self, pos: Position, value: Value) -> ExprId {
        self.expr(pos, ExprKind::Constant(value))
    }

    pub fn integer(&mut self, pos: Position, value: i32) -> ExprId {
        self.constant(pos, Value::Integer(value))
    }

    pub fn string(&mut self, pos: Position, value: &str) -> ExprId {
        self.constant(pos, Value::string(value))
    }

    pub fn boolean(&mut self, pos: Position, value: bool) -> ExprId {
        self.constant(pos, Value::Boolean(value))
    }

    pub fn variable(&mut self, pos: Position, symbol: SymbolId) -> ExprId {
        self.expr(pos, ExprKind::Variable(symbol))
    }

    pub fn binary(&mut self, pos: Position, op: BinaryOp, lhs: ExprId, rhs: ExprId) -> ExprId {
        self.expr(pos, ExprKind::BinaryOperator { op, lhs, rhs })
    }

    pub fn unary(&mut self, pos: Position, op: UnaryOp, operand: ExprId) -> ExprId {
        self.expr(pos, ExprKind::UnaryOperator { op, operand })
    }

    pub fn cast(&mut self, pos: Position, expr: ExprId, to: VariableType, explicit: bool) -> ExprId {
        self.expr(
            pos,
            ExprKind::Cast {
                expr,
                to,
                explicit,
                allow_param_cast: false,
            },
        )
    }

    pub fn array_element(&mut self, pos: Position, array: ExprId, index: ExprId) -> ExprId {
        self.expr(pos, ExprKind::ArrayElementConst { array, index })
    }

    pub fn record_column(&mut self, pos: Position, record: ExprId, name: &str) -> ExprId {
        self.expr(
            pos,
            ExprKind::RecordColumnConst {
                record,
                name: name.to_string(),
            },
        )
    }

    pub fn object_member(&mut self, pos: Position, object: ExprId, name: &str, via_this: bool) -> ExprId {
        self.expr(
            pos,
            ExprKind::ObjectMemberConst {
                object,
                name: name.to_string(),
                via_this,
            },
        )
    }

    pub fn method_call(&mut self, pos: Position, object: ExprId, name: &str, args: Vec<ExprId>) -> ExprId {
        self.expr(
            pos,
            ExprKind::ObjectMethodCall {
                object,
                name: name.to_string(),
                args,
                via_this: false,
            },
        )
    }

    pub fn call(&mut self, pos: Position, function: SymbolId, args: Vec<ExprId>) -> ExprId {
        self.expr(pos, ExprKind::FunctionCall { function, args })
    }

    /// Call a function registered in the global scope. A missing builtin
    /// means the symbol table was not created with builtins.
    pub fn call_builtin(&mut self, pos: Position, name: &str, args: Vec<ExprId>) -> ExprId {
        let function = self.builtin(name);
        self.call(pos, function, args)
    }

    pub fn builtin(&self, name: &str) -> SymbolId {
        match self.symbols.builtin(name) {
            Some(symbol) => symbol,
            None => ice!("builtin {name} is not registered"),
        }
    }

    /// An expression block whose value is the variable `result`.
    pub fn expression_block(&mut self, pos: Position, block: BlockId, result: SymbolId) -> ExprId {
        self.expr(pos, ExprKind::ExpressionBlock { block, result })
    }

    // ── Statements ──────────────────────────────────────────────────────

    pub fn stmt(&mut self, pos: Position, kind: StmtKind) -> StmtId {
        self.ast.alloc_stmt(pos, kind)
    }

    pub fn assign(&mut self, pos: Position, target: SymbolId, value: ExprId) -> StmtId {
        self.stmt(pos, StmtKind::Assign { target, value })
    }

    pub fn block_stmt(&mut self, pos: Position, block: BlockId) -> StmtId {
        self.stmt(pos, StmtKind::Block(block))
    }

    pub fn emit_stmt(&mut self, pos: Position, kind: StmtKind) -> StmtId {
        let stmt = self.stmt(pos, kind);
        self.emit(stmt);
        stmt
    }

    pub fn emit_assign(&mut self, pos: Position, target: SymbolId, value: ExprId) -> StmtId {
        self.emit_stmt(pos, StmtKind::Assign { target, value })
    }

    pub fn emit_expr(&mut self, pos: Position, expr: ExprId) -> StmtId {
        self.emit_stmt(pos, StmtKind::SingleExpression { expr })
    }

    /// Evaluate `value` into a fresh temporary of type `ty`.
    pub fn emit_temporary(&mut self, pos: Position, ty: VariableType, value: ExprId) -> SymbolId {
        let tmp = self.temporary(pos, ty);
        self.emit_assign(pos, tmp, value);
        tmp
    }

    /// `IF (condition) { then }`, the branch filled by a closure running
    /// inside its own block.
    pub fn emit_if(&mut self, pos: Position, condition: ExprId, then: impl FnOnce(&mut Self)) -> StmtId {
        let then = self.branch(pos, then);
        self.emit_stmt(
            pos,
            StmtKind::If {
                condition,
                then,
                otherwise: None,
            },
        )
    }

    pub fn emit_if_else(
        &mut self,
        pos: Position,
        condition: ExprId,
        then: impl FnOnce(&mut Self),
        otherwise: impl FnOnce(&mut Self),
    ) -> StmtId {
        let then = self.branch(pos, then);
        let otherwise = Some(self.branch(pos, otherwise));
        self.emit_stmt(
            pos,
            StmtKind::If {
                condition,
                then,
                otherwise,
            },
        )
    }

    fn branch(&mut self, pos: Position, fill: impl FnOnce(&mut Self)) -> StmtId {
        let block = self.new_block(pos);
        self.scoped(block, fill);
        self.block_stmt(pos, block)
    }

    // ── Lvalues ─────────────────────────────────────────────────────────

    /// Prepare an lvalue chain for a read-modify-write.
    ///
    /// The base expression, if any, is evaluated exactly once into a
    /// temporary emitted into `calc_block`. With `need_old_value`, the
    /// returned `current` is an expression block reading the full chain
    /// from that base; its statements are placed in `work_block`.
    pub fn materialize_lvalue(
        &mut self,
        lvalue: &ConvertedLvalue,
        calc_block: BlockId,
        need_old_value: bool,
    ) -> MaterializedLvalue {
        let pos = lvalue.pos;
        let base = match (lvalue.base_var, lvalue.base_expr) {
            (Some(var), _) => var,
            (None, Some(expr)) => {
                let tmp = self.temporary(pos, VariableType::OBJECT);
                let assign = self.assign(pos, tmp, expr);
                self.ast.block_mut(calc_block).statements.push(assign);
                tmp
            }
            (None, None) => ice!("lvalue at {pos} has neither base variable nor base expression"),
        };
        let work_block = self.new_block(pos);
        let current = need_old_value.then(|| {
            let mut read = self.variable(pos, base);
            for layer in &lvalue.layers {
                read = match &layer.kind {
                    LayerKind::Array { index } => self.array_element(layer.pos, read, *index),
                    LayerKind::Record { name } => self.record_column(layer.pos, read, name),
                    LayerKind::Object { name, via_this, .. } => self.object_member(layer.pos, read, name, *via_this),
                };
            }
            let old = self.temporary(pos, VariableType::VARIANT);
            let assign = self.assign(pos, old, read);
            self.ast.block_mut(work_block).statements.push(assign);
            self.expression_block(pos, work_block, old)
        });
        MaterializedLvalue {
            base,
            current,
            work_block,
        }
    }
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new(Ast::new(), SymbolTable::with_builtins())
    }
}
