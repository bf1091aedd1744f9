//! Desugarer.
//!
//! Rewrites constructs the code generator has no instructions for into
//! primitive statements. Every rewrite replaces the node in place (a
//! statement becomes a `Block`, an rvalue becomes an `ExpressionBlock`)
//! and the caller hands the result back to the type checker. Subtrees the
//! checker already typed are reused as they are, so nothing is visited
//! twice.
//!
//! Rewrites run only on input the checker accepted. Input that violates
//! their preconditions is an internal fault.

mod generator;
mod lvalue;
mod switch;

use hare_ast::{walk, ExprId, ExprKind, StmtId, StmtKind, SymbolId};
use hare_value::{builtins, BinaryOp, VariableType};
use tracing::debug;

use crate::Sema;

/// Desugarer context.
#[derive(Debug, Default)]
pub(crate) struct DesugarState {
    /// Generator object of the generator or async function being checked.
    pub generator: Option<SymbolId>,
}

impl Sema {
    pub(crate) fn sugar_generator(&self) -> Option<SymbolId> {
        self.sugar.generator
    }

    pub(crate) fn set_sugar_generator(&mut self, generator: Option<SymbolId>) {
        self.sugar.generator = generator;
    }

    /// `a ?? b`: evaluate `a` once into a temporary and evaluate `b` only
    /// when that temporary holds its type's default value.
    pub(crate) fn desugar_coalesce(&mut self, expr: ExprId, ty: VariableType, lhs: ExprId, rhs: ExprId) {
        let pos = self.pos(expr);
        debug!(%pos, "rewriting ??");
        let block = self.coder.new_block(pos);
        let result = self.coder.scoped(block, |c| {
            let tmp = c.emit_temporary(pos, ty, lhs);
            let read = c.variable(pos, tmp);
            let is_default = c.call_builtin(pos, builtins::ISDEFAULTVALUE, vec![read]);
            c.emit_if(pos, is_default, |c| {
                c.emit_assign(pos, tmp, rhs);
            });
            tmp
        });
        self.coder
            .ast
            .replace_expr(expr, ExprKind::ExpressionBlock { block, result });
    }

    /// `FOREVERY (var FROM src) body` iterates over a copy of `src` taken
    /// before the first iteration:
    ///
    /// ```text
    /// pos := 0; list := src; len := LENGTH(list);
    /// FOR (; pos < len; pos := pos + 1) { var := list[pos]; body }
    /// ```
    pub(crate) fn desugar_forevery(
        &mut self,
        stmt: StmtId,
        variable: SymbolId,
        source: ExprId,
        source_ty: VariableType,
        position: Option<SymbolId>,
        body: StmtId,
    ) {
        let pos = self.coder.ast.stmt(stmt).pos;
        debug!(%pos, "rewriting FOREVERY");
        let list_ty = if source_ty.is_array() { source_ty } else { VariableType::VARIANT };
        let block = self.coder.new_block(pos);
        self.coder.scoped(block, |c| {
            let counter = c.temporary(pos, VariableType::INTEGER);
            let zero = c.integer(pos, 0);
            c.emit_assign(pos, counter, zero);
            let list = c.emit_temporary(pos, list_ty, source);
            let list_read = c.variable(pos, list);
            let length = c.call_builtin(pos, builtins::LENGTH, vec![list_read]);
            let len = c.emit_temporary(pos, VariableType::INTEGER, length);

            let counter_read = c.variable(pos, counter);
            let len_read = c.variable(pos, len);
            let condition = c.binary(pos, BinaryOp::Less, counter_read, len_read);

            let counter_read = c.variable(pos, counter);
            let one = c.integer(pos, 1);
            let next = c.binary(pos, BinaryOp::Add, counter_read, one);
            let step = c.assign(pos, counter, next);

            let loop_block = c.new_block(pos);
            c.scoped(loop_block, |c| {
                let list_read = c.variable(pos, list);
                let counter_read = c.variable(pos, counter);
                let element = c.array_element(pos, list_read, counter_read);
                c.emit_assign(pos, variable, element);
                if let Some(position) = position {
                    let counter_read = c.variable(pos, counter);
                    c.emit_assign(pos, position, counter_read);
                }
                c.emit(body);
            });
            let loop_body = c.block_stmt(pos, loop_block);
            c.emit_stmt(
                pos,
                StmtKind::For {
                    init: None,
                    condition: Some(condition),
                    step: Some(step),
                    body: loop_body,
                },
            );
        });
        self.coder.ast.replace_stmt(stmt, StmtKind::Block(block));
    }

    /// `arr[index]` where `index` mentions END: evaluate the array once,
    /// take its length once and substitute it for every END that belongs
    /// to this subscript. With `modify` set the subscript is a store of
    /// that value and the result is the updated array.
    pub(crate) fn desugar_end_index(
        &mut self,
        expr: ExprId,
        array: ExprId,
        index: ExprId,
        modify: Option<ExprId>,
        array_ty: VariableType,
    ) {
        let pos = self.pos(expr);
        debug!(%pos, "resolving END");
        let result_ty = match modify {
            Some(_) => array_ty,
            None if array_ty.is_array() => array_ty.element(),
            None => VariableType::VARIANT,
        };
        let sites = self.end_sites(index);
        let block = self.coder.new_block(pos);
        let result = self.coder.scoped(block, |c| {
            let list = c.emit_temporary(pos, array_ty, array);
            let list_read = c.variable(pos, list);
            let length = c.call_builtin(pos, builtins::LENGTH, vec![list_read]);
            let len = c.emit_temporary(pos, VariableType::INTEGER, length);
            for site in &sites {
                c.ast.replace_expr(*site, ExprKind::Variable(len));
            }
            let list_read = c.variable(pos, list);
            let result = match modify {
                Some(value) => c.expr(
                    pos,
                    ExprKind::ArrayElementModify {
                        array: list_read,
                        index,
                        value,
                    },
                ),
                None => c.array_element(pos, list_read, index),
            };
            c.emit_temporary(pos, result_ty, result)
        });
        self.coder
            .ast
            .replace_expr(expr, ExprKind::ExpressionBlock { block, result });
    }

    /// The END nodes of an index expression that refer to the array being
    /// subscripted. An END inside a nested subscript belongs to the nested
    /// array and is not included; neither is anything inside an
    /// expression block or a SELECT.
    pub(crate) fn end_sites(&self, index: ExprId) -> Vec<ExprId> {
        let mut sites = Vec::new();
        let mut pending = vec![index];
        while let Some(expr) = pending.pop() {
            let kind = &self.coder.ast.expr(expr).kind;
            match kind {
                ExprKind::End => sites.push(expr),
                ExprKind::ArrayElementConst { array, .. } => pending.push(*array),
                ExprKind::ArrayElementModify { array, value, .. } => pending.extend([*array, *value]),
                ExprKind::ExpressionBlock { .. } | ExprKind::SqlSelect(_) => {}
                _ => pending.extend(walk::expr_operands(kind)),
            }
        }
        sites
    }
}
