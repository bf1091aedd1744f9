//! Child enumeration for generic traversals.

use crate::expr::{ExprKind, RecordEntry, SqlSelect};
use crate::lvalue::LayerKind;
use crate::stmt::{DeepOp, StmtKind};
use crate::{Ast, BlockId, ExprId, StmtId};

fn select_operands(select: &SqlSelect, out: &mut Vec<ExprId>) {
    out.extend(select.sources.iter().map(|s| s.source));
    out.extend(select.temporaries.iter().map(|(_, value)| *value));
    out.extend(select.condition);
    out.extend(select.group_by.iter().copied());
    out.extend(select.columns.iter().map(|c| c.value));
    out.extend(select.having);
    out.extend(select.order_by.iter().map(|o| o.expr));
    out.extend(select.limit);
}

/// Direct expression operands of an expression in evaluation order. The
/// statements of an expression block are not included; see
/// [`expr_block`].
pub fn expr_operands(kind: &ExprKind) -> Vec<ExprId> {
    let mut out = Vec::new();
    match kind {
        ExprKind::Constant(_)
        | ExprKind::Variable(_)
        | ExprKind::TypeInfo { .. }
        | ExprKind::End
        | ExprKind::ExpressionBlock { .. } => {}
        ExprKind::BinaryOperator { lhs, rhs, .. } => out.extend([*lhs, *rhs]),
        ExprKind::UnaryOperator { operand, .. } => out.push(*operand),
        ExprKind::Cast { expr, .. } => out.push(*expr),
        ExprKind::ConditionalOperator {
            condition,
            then,
            otherwise,
        } => out.extend([*condition, *then, *otherwise]),
        ExprKind::ArrayElementConst { array, index } => out.extend([*array, *index]),
        ExprKind::ArrayElementModify { array, index, value } => out.extend([*array, *index, *value]),
        ExprKind::RecordColumnConst { record, .. } => out.push(*record),
        ExprKind::ObjectMemberConst { object, .. } => out.push(*object),
        ExprKind::ObjectMethodCall { object, args, .. } => {
            out.push(*object);
            out.extend(args.iter().copied());
        }
        ExprKind::ObjectNew { args, .. } | ExprKind::FunctionCall { args, .. } => {
            out.extend(args.iter().copied());
        }
        ExprKind::FunctionPtr { bindings, .. } => {
            out.extend(bindings.iter().flatten().filter_map(|b| b.bound));
        }
        ExprKind::FunctionPtrCall { ptr, args } => {
            out.push(*ptr);
            out.extend(args.iter().copied());
        }
        ExprKind::FunctionPtrRebind { ptr, bindings } => {
            out.push(*ptr);
            out.extend(bindings.iter().filter_map(|b| b.bound));
        }
        ExprKind::Yield { value, .. } | ExprKind::Await { value } => out.push(*value),
        ExprKind::ConstantRecord { entries } => {
            for entry in entries {
                match entry {
                    RecordEntry::Set { value, .. } | RecordEntry::Spread(value) => out.push(*value),
                    RecordEntry::Delete { .. } => {}
                }
            }
        }
        ExprKind::ConstantArray { entries, .. } => out.extend(entries.iter().map(|e| e.value)),
        ExprKind::SqlSelect(select) => select_operands(select, &mut out),
    }
    out
}

pub fn expr_block(kind: &ExprKind) -> Option<BlockId> {
    match kind {
        ExprKind::ExpressionBlock { block, .. } => Some(*block),
        _ => None,
    }
}

/// Expressions a statement evaluates directly, including lvalue indices
/// and switch labels.
pub fn stmt_exprs(kind: &StmtKind) -> Vec<ExprId> {
    let mut out = Vec::new();
    match kind {
        StmtKind::Block(_)
        | StmtKind::Break
        | StmtKind::Continue
        | StmtKind::Initialize { .. }
        | StmtKind::TryCatch { .. }
        | StmtKind::TryFinally { .. } => {}
        StmtKind::If { condition, .. } => out.push(*condition),
        StmtKind::For { condition, .. } => out.extend(*condition),
        StmtKind::ForEvery { source, .. } => out.push(*source),
        StmtKind::Return { value } => out.extend(*value),
        StmtKind::Switch(switch) => {
            out.push(switch.value);
            for case in &switch.cases {
                out.extend(case.labels.iter().copied());
            }
        }
        StmtKind::Throw { value } => out.push(*value),
        StmtKind::SingleExpression { expr } => out.push(*expr),
        StmtKind::Assign { value, .. } => out.push(*value),
        StmtKind::DeepOperation(deep) => {
            out.extend(deep.lvalue.base_expr);
            for layer in &deep.lvalue.layers {
                if let LayerKind::Array { index } = layer.kind {
                    out.push(index);
                }
            }
            match &deep.op {
                DeepOp::Set(value)
                | DeepOp::Compound { value, .. }
                | DeepOp::CellInsert { value, .. } => out.push(*value),
                DeepOp::ArrayInsert { index, value } => out.extend([*index, *value]),
                DeepOp::ArrayDelete { index } => out.push(*index),
                DeepOp::CellDelete { .. } => {}
            }
        }
        StmtKind::SqlInsert { target, row } => out.extend([*target, *row]),
        StmtKind::SqlUpdate {
            source,
            set,
            condition,
        } => {
            out.push(source.source);
            out.extend(*condition);
            out.extend(set.iter().map(|(_, value)| *value));
        }
        StmtKind::SqlDelete { source, condition } => {
            out.push(source.source);
            out.extend(*condition);
        }
    }
    out
}

/// Nested statements and blocks of a statement.
pub fn stmt_children(kind: &StmtKind) -> (Vec<StmtId>, Vec<BlockId>) {
    match kind {
        StmtKind::Block(block) => (Vec::new(), vec![*block]),
        StmtKind::If { then, otherwise, .. } => {
            let mut stmts = vec![*then];
            stmts.extend(*otherwise);
            (stmts, Vec::new())
        }
        StmtKind::For { init, step, body, .. } => {
            let mut stmts: Vec<StmtId> = init.iter().copied().collect();
            stmts.extend(*step);
            stmts.push(*body);
            (stmts, Vec::new())
        }
        StmtKind::ForEvery { body, .. } => (vec![*body], Vec::new()),
        StmtKind::Switch(switch) => {
            let mut blocks: Vec<BlockId> = switch.cases.iter().map(|c| c.block).collect();
            blocks.extend(switch.default);
            (Vec::new(), blocks)
        }
        StmtKind::TryCatch {
            try_block,
            catch_block,
            ..
        } => (Vec::new(), vec![*try_block, *catch_block]),
        StmtKind::TryFinally {
            try_block,
            finally_block,
        } => (Vec::new(), vec![*try_block, *finally_block]),
        _ => (Vec::new(), Vec::new()),
    }
}

/// Every expression reachable from a block, parents before children.
pub fn block_rvalues(ast: &Ast, block: BlockId) -> Vec<ExprId> {
    let mut out = Vec::new();
    let mut blocks = vec![block];
    while let Some(block) = blocks.pop() {
        let mut stmts: Vec<StmtId> = ast.block(block).statements.clone();
        while let Some(stmt) = stmts.pop() {
            let kind = &ast.stmt(stmt).kind;
            let mut exprs = stmt_exprs(kind);
            while let Some(expr) = exprs.pop() {
                out.push(expr);
                let kind = &ast.expr(expr).kind;
                exprs.extend(expr_operands(kind));
                blocks.extend(expr_block(kind));
            }
            let (nested, nested_blocks) = stmt_children(kind);
            stmts.extend(nested);
            blocks.extend(nested_blocks);
        }
    }
    out
}
