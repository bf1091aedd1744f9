//! Deep copies of subtrees.
//!
//! Default parameter values and named constants are spliced into every
//! place they are used; each use gets its own copy so later rewrites of
//! one use cannot leak into another. Symbols are shared, not copied.

use crate::expr::{ArrayEntry, ExprKind, OrderBy, PtrBinding, RecordEntry, SelectColumn, SqlSelect, SqlSource};
use crate::lvalue::{ConvertedLvalue, LayerKind, LvalueLayer};
use crate::stmt::{DeepOp, DeepOperation, StmtKind, SwitchCase, SwitchStatement};
use crate::{Ast, BlockId, ExprId, StmtId};

impl Ast {
    pub fn copy_expr(&mut self, id: ExprId) -> ExprId {
        let expr = self.expr(id).clone();
        let kind = match expr.kind {
            kind @ (ExprKind::Constant(_) | ExprKind::Variable(_) | ExprKind::TypeInfo { .. } | ExprKind::End) => kind,
            ExprKind::BinaryOperator { op, lhs, rhs } => ExprKind::BinaryOperator {
                op,
                lhs: self.copy_expr(lhs),
                rhs: self.copy_expr(rhs),
            },
            ExprKind::UnaryOperator { op, operand } => ExprKind::UnaryOperator {
                op,
                operand: self.copy_expr(operand),
            },
            ExprKind::Cast {
                expr,
                to,
                explicit,
                allow_param_cast,
            } => ExprKind::Cast {
                expr: self.copy_expr(expr),
                to,
                explicit,
                allow_param_cast,
            },
            ExprKind::ConditionalOperator {
                condition,
                then,
                otherwise,
            } => ExprKind::ConditionalOperator {
                condition: self.copy_expr(condition),
                then: self.copy_expr(then),
                otherwise: self.copy_expr(otherwise),
            },
            ExprKind::ArrayElementConst { array, index } => ExprKind::ArrayElementConst {
                array: self.copy_expr(array),
                index: self.copy_expr(index),
            },
            ExprKind::ArrayElementModify { array, index, value } => ExprKind::ArrayElementModify {
                array: self.copy_expr(array),
                index: self.copy_expr(index),
                value: self.copy_expr(value),
            },
            ExprKind::RecordColumnConst { record, name } => ExprKind::RecordColumnConst {
                record: self.copy_expr(record),
                name,
            },
            ExprKind::ObjectMemberConst { object, name, via_this } => ExprKind::ObjectMemberConst {
                object: self.copy_expr(object),
                name,
                via_this,
            },
            ExprKind::ObjectMethodCall {
                object,
                name,
                args,
                via_this,
            } => ExprKind::ObjectMethodCall {
                object: self.copy_expr(object),
                name,
                args: self.copy_exprs(&args),
                via_this,
            },
            ExprKind::ObjectNew { object_type, args } => ExprKind::ObjectNew {
                object_type,
                args: self.copy_exprs(&args),
            },
            ExprKind::FunctionCall { function, args } => ExprKind::FunctionCall {
                function,
                args: self.copy_exprs(&args),
            },
            ExprKind::FunctionPtr { function, bindings } => ExprKind::FunctionPtr {
                function,
                bindings: bindings.map(|b| self.copy_bindings(&b)),
            },
            ExprKind::FunctionPtrCall { ptr, args } => ExprKind::FunctionPtrCall {
                ptr: self.copy_expr(ptr),
                args: self.copy_exprs(&args),
            },
            ExprKind::FunctionPtrRebind { ptr, bindings } => ExprKind::FunctionPtrRebind {
                ptr: self.copy_expr(ptr),
                bindings: self.copy_bindings(&bindings),
            },
            ExprKind::Yield { value, star } => ExprKind::Yield {
                value: self.copy_expr(value),
                star,
            },
            ExprKind::Await { value } => ExprKind::Await {
                value: self.copy_expr(value),
            },
            ExprKind::ConstantRecord { entries } => ExprKind::ConstantRecord {
                entries: entries
                    .into_iter()
                    .map(|entry| match entry {
                        RecordEntry::Set { name, value } => RecordEntry::Set {
                            name,
                            value: self.copy_expr(value),
                        },
                        RecordEntry::Spread(value) => RecordEntry::Spread(self.copy_expr(value)),
                        delete @ RecordEntry::Delete { .. } => delete,
                    })
                    .collect(),
            },
            ExprKind::ConstantArray { element, entries } => ExprKind::ConstantArray {
                element,
                entries: entries
                    .into_iter()
                    .map(|entry| ArrayEntry {
                        value: self.copy_expr(entry.value),
                        spread: entry.spread,
                    })
                    .collect(),
            },
            ExprKind::ExpressionBlock { block, result } => ExprKind::ExpressionBlock {
                block: self.copy_block(block),
                result,
            },
            ExprKind::SqlSelect(select) => ExprKind::SqlSelect(Box::new(self.copy_select(*select))),
        };
        self.alloc_expr(expr.pos, kind)
    }

    fn copy_exprs(&mut self, ids: &[ExprId]) -> Vec<ExprId> {
        ids.iter().map(|id| self.copy_expr(*id)).collect()
    }

    fn copy_opt(&mut self, id: Option<ExprId>) -> Option<ExprId> {
        id.map(|id| self.copy_expr(id))
    }

    fn copy_bindings(&mut self, bindings: &[PtrBinding]) -> Vec<PtrBinding> {
        bindings
            .iter()
            .map(|b| PtrBinding {
                passthrough: b.passthrough,
                bound: self.copy_opt(b.bound),
            })
            .collect()
    }

    fn copy_source(&mut self, source: SqlSource) -> SqlSource {
        SqlSource {
            row: source.row,
            source: self.copy_expr(source.source),
        }
    }

    fn copy_select(&mut self, select: SqlSelect) -> SqlSelect {
        SqlSelect {
            sources: select.sources.into_iter().map(|s| self.copy_source(s)).collect(),
            temporaries: select
                .temporaries
                .into_iter()
                .map(|(sym, value)| (sym, self.copy_expr(value)))
                .collect(),
            columns: select
                .columns
                .into_iter()
                .map(|c| SelectColumn {
                    name: c.name,
                    value: self.copy_expr(c.value),
                })
                .collect(),
            condition: self.copy_opt(select.condition),
            group_by: self.copy_exprs(&select.group_by),
            having: self.copy_opt(select.having),
            order_by: select
                .order_by
                .into_iter()
                .map(|o| OrderBy {
                    expr: self.copy_expr(o.expr),
                    ascending: o.ascending,
                })
                .collect(),
            limit: self.copy_opt(select.limit),
            single_column: select.single_column,
        }
    }

    pub fn copy_block(&mut self, id: BlockId) -> BlockId {
        let block = self.block(id).clone();
        let copy = self.alloc_block(block.pos);
        let statements = block.statements.iter().map(|s| self.copy_stmt(*s)).collect();
        self.block_mut(copy).statements = statements;
        copy
    }

    pub fn copy_stmt(&mut self, id: StmtId) -> StmtId {
        let stmt = self.stmt(id).clone();
        let kind = match stmt.kind {
            kind @ (StmtKind::Break | StmtKind::Continue | StmtKind::Initialize { .. }) => kind,
            StmtKind::Block(block) => StmtKind::Block(self.copy_block(block)),
            StmtKind::If {
                condition,
                then,
                otherwise,
            } => StmtKind::If {
                condition: self.copy_expr(condition),
                then: self.copy_stmt(then),
                otherwise: otherwise.map(|s| self.copy_stmt(s)),
            },
            StmtKind::For {
                init,
                condition,
                step,
                body,
            } => StmtKind::For {
                init: init.map(|s| self.copy_stmt(s)),
                condition: self.copy_opt(condition),
                step: step.map(|s| self.copy_stmt(s)),
                body: self.copy_stmt(body),
            },
            StmtKind::ForEvery {
                variable,
                source,
                position,
                body,
                is_rewritten,
            } => StmtKind::ForEvery {
                variable,
                source: self.copy_expr(source),
                position,
                body: self.copy_stmt(body),
                is_rewritten,
            },
            StmtKind::Return { value } => StmtKind::Return {
                value: self.copy_opt(value),
            },
            StmtKind::Switch(switch) => StmtKind::Switch(Box::new(SwitchStatement {
                value: self.copy_expr(switch.value),
                cases: switch
                    .cases
                    .iter()
                    .map(|case| SwitchCase {
                        labels: self.copy_exprs(&case.labels),
                        block: self.copy_block(case.block),
                    })
                    .collect(),
                default: switch.default.map(|b| self.copy_block(b)),
                is_rewritten: switch.is_rewritten,
            })),
            StmtKind::TryCatch {
                try_block,
                exception,
                catch_block,
            } => StmtKind::TryCatch {
                try_block: self.copy_block(try_block),
                exception,
                catch_block: self.copy_block(catch_block),
            },
            StmtKind::TryFinally {
                try_block,
                finally_block,
            } => StmtKind::TryFinally {
                try_block: self.copy_block(try_block),
                finally_block: self.copy_block(finally_block),
            },
            StmtKind::Throw { value } => StmtKind::Throw {
                value: self.copy_expr(value),
            },
            StmtKind::SingleExpression { expr } => StmtKind::SingleExpression {
                expr: self.copy_expr(expr),
            },
            StmtKind::Assign { target, value } => StmtKind::Assign {
                target,
                value: self.copy_expr(value),
            },
            StmtKind::DeepOperation(deep) => StmtKind::DeepOperation(Box::new(self.copy_deep(*deep))),
            StmtKind::SqlInsert { target, row } => StmtKind::SqlInsert {
                target: self.copy_expr(target),
                row: self.copy_expr(row),
            },
            StmtKind::SqlUpdate {
                source,
                set,
                condition,
            } => StmtKind::SqlUpdate {
                source: self.copy_source(source),
                set: set.into_iter().map(|(name, value)| (name, self.copy_expr(value))).collect(),
                condition: self.copy_opt(condition),
            },
            StmtKind::SqlDelete { source, condition } => StmtKind::SqlDelete {
                source: self.copy_source(source),
                condition: self.copy_opt(condition),
            },
        };
        self.alloc_stmt(stmt.pos, kind)
    }

    fn copy_deep(&mut self, deep: DeepOperation) -> DeepOperation {
        let layers = deep
            .lvalue
            .layers
            .into_iter()
            .map(|layer| LvalueLayer {
                pos: layer.pos,
                kind: match layer.kind {
                    LayerKind::Array { index } => LayerKind::Array {
                        index: self.copy_expr(index),
                    },
                    other => other,
                },
            })
            .collect();
        let lvalue = ConvertedLvalue {
            base_expr: self.copy_opt(deep.lvalue.base_expr),
            layers,
            ..deep.lvalue
        };
        let op = match deep.op {
            DeepOp::Set(value) => DeepOp::Set(self.copy_expr(value)),
            DeepOp::Compound { op, value } => DeepOp::Compound {
                op,
                value: self.copy_expr(value),
            },
            DeepOp::ArrayInsert { index, value } => DeepOp::ArrayInsert {
                index: self.copy_expr(index),
                value: self.copy_expr(value),
            },
            DeepOp::ArrayDelete { index } => DeepOp::ArrayDelete {
                index: self.copy_expr(index),
            },
            DeepOp::CellInsert { name, value } => DeepOp::CellInsert {
                name,
                value: self.copy_expr(value),
            },
            delete @ DeepOp::CellDelete { .. } => delete,
        };
        DeepOperation {
            lvalue,
            op,
            is_rewritten: deep.is_rewritten,
        }
    }
}
