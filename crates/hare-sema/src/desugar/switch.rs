//! SWITCH as a binary search over case indices.
//!
//! ```text
//! value := <switch value>
//! idx := SEARCHELEMENT([labels...], value) + 1
//! IF (idx = 0) { default } ELSE { <decision tree over idx> }
//! ```
//!
//! The labels of case `k` occupy a contiguous run of positions in the
//! label array, so `idx` falls into exactly one case range and the tree
//! needs at most `ceil(log2(cases))` comparisons to find it.

use hare_ast::{BlockId, StmtId, StmtKind, SwitchStatement, TreeBuilder};
use hare_common::{ice, Position};
use hare_value::{builtins, Array, BinaryOp, Value, VariableType};
use tracing::debug;

use crate::Sema;

/// One case of the decision tree: its block and the 1-based position of
/// its first label.
#[derive(Debug, Clone, Copy)]
struct CaseRange {
    first_index: i32,
    block: BlockId,
}

impl Sema {
    pub(crate) fn desugar_switch(&mut self, stmt: StmtId, switch: &SwitchStatement, value_ty: VariableType) {
        let pos = self.coder.ast.stmt(stmt).pos;
        let mut labels = Vec::new();
        let mut ranges = Vec::with_capacity(switch.cases.len());
        for case in &switch.cases {
            if case.labels.is_empty() {
                continue;
            }
            ranges.push(CaseRange {
                first_index: labels.len() as i32 + 1,
                block: case.block,
            });
            for label in &case.labels {
                match self.coder.ast.expr(*label).kind.constant() {
                    Some(value) => labels.push(value.clone()),
                    None => ice!("switch label at {} is not a constant", self.pos(*label)),
                }
            }
        }
        debug!(%pos, cases = ranges.len(), labels = labels.len(), "rewriting SWITCH");

        let element = if value_ty.to_array().is_some() {
            value_ty
        } else {
            VariableType::VARIANT
        };
        let label_array = Value::Array(Array::with_items(element, labels));
        let default = switch.default;
        let value = switch.value;

        let block = self.coder.new_block(pos);
        self.coder.scoped(block, |c| {
            let subject = c.emit_temporary(pos, value_ty, value);
            if ranges.is_empty() {
                if let Some(default) = default {
                    c.emit_stmt(pos, StmtKind::Block(default));
                }
                return;
            }
            let list = c.constant(pos, label_array);
            let subject_read = c.variable(pos, subject);
            let found = c.call_builtin(pos, builtins::SEARCHELEMENT, vec![list, subject_read]);
            let one = c.integer(pos, 1);
            let position = c.binary(pos, BinaryOp::Add, found, one);
            let index = c.emit_temporary(pos, VariableType::INTEGER, position);

            let index_read = c.variable(pos, index);
            let zero = c.integer(pos, 0);
            match default {
                Some(default) => {
                    let no_match = c.binary(pos, BinaryOp::Equal, index_read, zero);
                    c.emit_if_else(
                        pos,
                        no_match,
                        |c| {
                            c.emit_stmt(pos, StmtKind::Block(default));
                        },
                        |c| emit_decision(c, pos, index, &ranges),
                    );
                }
                None => {
                    let matched = c.binary(pos, BinaryOp::Greater, index_read, zero);
                    c.emit_if(pos, matched, |c| emit_decision(c, pos, index, &ranges));
                }
            }
        });
        self.coder.ast.replace_stmt(stmt, StmtKind::Block(block));
    }
}

/// Emit the decision tree selecting among `ranges` by the matched label
/// position in `index`. Splits at the middle case: positions at or after
/// its first label go right.
fn emit_decision(c: &mut TreeBuilder, pos: Position, index: hare_ast::SymbolId, ranges: &[CaseRange]) {
    match ranges {
        [] => {}
        [single] => {
            c.emit_stmt(pos, StmtKind::Block(single.block));
        }
        _ => {
            let mid = ranges.len() / 2;
            let (low, high) = ranges.split_at(mid);
            let index_read = c.variable(pos, index);
            let bound = c.integer(pos, high[0].first_index);
            let in_high = c.binary(pos, BinaryOp::GreaterEqual, index_read, bound);
            c.emit_if_else(
                pos,
                in_high,
                |c| emit_decision(c, pos, index, high),
                |c| emit_decision(c, pos, index, low),
            );
        }
    }
}
