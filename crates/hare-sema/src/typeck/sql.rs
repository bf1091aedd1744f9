//! SELECT, INSERT, UPDATE and DELETE, and the grouping rules for row
//! access.

use hare_ast::{walk, ExprId, ExprKind, FunctionFlags, SqlSelect, SqlSource, SymbolId};
use hare_common::{ErrorKind, Position};
use hare_value::VariableType;

use super::SelectFrame;
use crate::Sema;

impl Sema {
    pub(super) fn check_select(&mut self, select: SqlSelect) -> VariableType {
        for source in &select.sources {
            self.check_sql_source(source);
        }

        self.checker.yield_forbid_counter += 1;
        self.checker.selects.push(SelectFrame {
            rows: select.sources.iter().map(|s| s.row).collect(),
            ..SelectFrame::default()
        });

        for (temporary, value) in &select.temporaries {
            let ty = self.coder.symbols.variable(*temporary).map_or(VariableType::VARIANT, |def| def.ty);
            self.coerce(*value, ty);
            if let Some(frame) = self.checker.selects.last_mut() {
                frame.temporaries.push(*temporary);
            }
        }
        if let Some(condition) = select.condition {
            self.coerce(condition, VariableType::BOOLEAN);
        }
        let mut group_keys = Vec::new();
        for key in &select.group_by {
            self.check_value(*key);
            if let ExprKind::RecordColumnConst { record, name } = &self.coder.ast.expr(*key).kind {
                if let ExprKind::Variable(row) = self.coder.ast.expr(*record).kind {
                    group_keys.push((row, name.to_ascii_uppercase()));
                }
            }
        }

        let grouped = !select.group_by.is_empty() || self.select_has_aggregate(&select);
        let saved_inaccessible = self.checker.inaccessible_outside_aggregate.clone();
        if let Some(frame) = self.checker.selects.last_mut() {
            frame.group_keys = group_keys;
            frame.aggregates_allowed = true;
            if grouped {
                self.checker.inaccessible_outside_aggregate.extend(frame.rows.iter().copied());
            }
        }

        let mut column_types = Vec::with_capacity(select.columns.len());
        for column in &select.columns {
            column_types.push(self.check_value(column.value));
        }
        if let Some(having) = select.having {
            self.coerce(having, VariableType::BOOLEAN);
        }
        for order in &select.order_by {
            self.check_value(order.expr);
        }

        self.checker.inaccessible_outside_aggregate = saved_inaccessible;
        if let Some(frame) = self.checker.selects.last_mut() {
            frame.aggregates_allowed = false;
        }
        if let Some(limit) = select.limit {
            self.coerce(limit, VariableType::INTEGER);
        }
        self.checker.selects.pop();
        self.checker.yield_forbid_counter -= 1;

        if select.single_column {
            column_types
                .first()
                .and_then(|ty| ty.to_array())
                .unwrap_or(VariableType::VARIANT_ARRAY)
        } else {
            VariableType::RECORD_ARRAY
        }
    }

    fn check_sql_source(&mut self, source: &SqlSource) {
        let ty = self.check_value(source.source);
        let is_source = ty == VariableType::RECORD_ARRAY || ty == VariableType::TABLE || ty.is_variant();
        if !is_source {
            let pos = self.pos(source.source);
            self.report(pos, ErrorKind::NotAnArray { ty: ty.to_string() });
        }
    }

    /// Whether any result column calls an aggregate directly (not inside a
    /// nested SELECT).
    fn select_has_aggregate(&self, select: &SqlSelect) -> bool {
        let mut pending: Vec<ExprId> = select.columns.iter().map(|c| c.value).collect();
        pending.extend(select.having);
        while let Some(expr) = pending.pop() {
            let kind = &self.coder.ast.expr(expr).kind;
            match kind {
                ExprKind::SqlSelect(_) => continue,
                ExprKind::FunctionCall { function, .. } => {
                    let is_aggregate = self
                        .coder
                        .symbols
                        .function(*function)
                        .is_some_and(|def| def.flags.contains(FunctionFlags::AGGREGATE));
                    if is_aggregate {
                        return true;
                    }
                }
                _ => {}
            }
            pending.extend(walk::expr_operands(kind));
        }
        false
    }

    pub(crate) fn is_select_row(&self, symbol: SymbolId) -> bool {
        self.checker.selects.iter().any(|frame| frame.rows.contains(&symbol))
    }

    /// Grouping and aggregate rules for a variable use. `column` is the
    /// cell read through the variable, if any.
    pub(crate) fn check_row_access(&mut self, pos: Position, symbol: SymbolId, column: Option<&str>) {
        if self.checker.aggregate_of.is_some() {
            if self.checker.forbidden_in_inner_select.contains(&symbol) {
                self.report(pos, ErrorKind::AggregateInnerSelect);
            } else if self.checker.temporaries_in_aggregate.contains(&symbol) {
                let name = self.symbol_name(symbol);
                self.report(pos, ErrorKind::TemporaryInAggregate { name });
            }
            return;
        }
        if !self.checker.inaccessible_outside_aggregate.contains(&symbol) {
            return;
        }
        let is_key = column.is_some_and(|column| {
            let column = column.to_ascii_uppercase();
            self.checker
                .selects
                .iter()
                .any(|frame| frame.group_keys.iter().any(|(row, key)| *row == symbol && *key == column))
        });
        if !is_key {
            let row = self.symbol_name(symbol);
            let column = match column {
                Some(column) => format!("{row}.{}", column.to_ascii_uppercase()),
                None => row,
            };
            self.report(pos, ErrorKind::ColumnNotGrouped { column });
        }
    }

    pub(super) fn check_sql_insert(&mut self, target: ExprId, row: ExprId) {
        let ty = self.check_value(target);
        if ty != VariableType::TABLE && ty != VariableType::RECORD_ARRAY && !ty.is_variant() {
            let pos = self.pos(target);
            self.report(pos, ErrorKind::NotAnArray { ty: ty.to_string() });
        }
        self.checker.yield_forbid_counter += 1;
        self.coerce(row, VariableType::RECORD);
        self.checker.yield_forbid_counter -= 1;
    }

    /// UPDATE and DELETE: the row variable is in scope for the condition
    /// and the new cell values, aggregates are not.
    pub(super) fn check_sql_modify(
        &mut self,
        source: &SqlSource,
        set: &[(String, ExprId)],
        condition: Option<ExprId>,
    ) {
        self.check_sql_source(source);
        self.checker.yield_forbid_counter += 1;
        self.checker.selects.push(SelectFrame {
            rows: vec![source.row],
            ..SelectFrame::default()
        });
        if let Some(condition) = condition {
            self.coerce(condition, VariableType::BOOLEAN);
        }
        for (_, value) in set {
            self.check_value(*value);
        }
        self.checker.selects.pop();
        self.checker.yield_forbid_counter -= 1;
    }
}
