//! Constant folder.
//!
//! A small stack machine over the checked tree. Evaluating a foldable
//! rvalue pushes its value, computed with the same operations the runtime
//! uses, so a folded literal is exactly what execution would have
//! produced. Only side-effect free nodes fold: literals, named constants,
//! operators, casts, element and cell reads, literal records and arrays,
//! and calls to builtins flagged `CONSTANT`.
//!
//! A runtime error while folding (overflow, failed cast, bad index) is
//! reported once at the node that raised it and leaves that node as it
//! was.

use hare_ast::{ArrayEntry, ExprId, ExprKind, FunctionFlags, RecordEntry, StmtId, StmtKind};
use hare_common::ErrorKind;
use hare_value::{builtins, cast, ops, Array, BinaryOp, Record, Value, ValueError, VariableType};
use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use crate::Sema;

/// Outcome of [`Sema::optimize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Optimizable {
    /// Not foldable. The evaluation stack is unchanged.
    None,
    /// Already a literal. Its value is on top of the stack; replacing the
    /// node gains nothing.
    Single,
    /// Folded. The computed value is on top of the stack and the caller
    /// either consumes it or splices it in as a literal.
    Multiple,
}

#[derive(Debug, Default)]
pub(crate) struct FolderState {
    stack: Vec<Value>,
    /// Nodes whose evaluation raised an error that was already reported.
    failed: FxHashSet<ExprId>,
}

impl Sema {
    /// Evaluate `expr` if it is constant, leaving its value on the
    /// evaluation stack.
    pub fn optimize(&mut self, expr: ExprId) -> Optimizable {
        if let ExprKind::Constant(value) = &self.coder.ast.expr(expr).kind {
            self.folder.stack.push(value.clone());
            return Optimizable::Single;
        }
        if self.push_value(expr) {
            Optimizable::Multiple
        } else {
            Optimizable::None
        }
    }

    /// Pop the value [`Sema::optimize`] left on the stack.
    pub fn take_folded(&mut self) -> Option<Value> {
        self.folder.stack.pop()
    }

    /// Fold a checked rvalue where that is profitable: whole constant
    /// subtrees become literals, a conditional with a constant condition
    /// becomes the selected branch, and literal records and arrays with a
    /// constant prefix are built from that prefix.
    pub(crate) fn fold_in_place(&mut self, expr: ExprId) {
        match self.coder.ast.expr(expr).kind.clone() {
            ExprKind::Constant(_) => return,
            ExprKind::ConditionalOperator {
                condition,
                then,
                otherwise,
            } => {
                if let Some(selected) = self.constant_bool(condition) {
                    self.select_branch(expr, if selected { then } else { otherwise });
                    return;
                }
            }
            _ => {}
        }
        let height = self.folder.stack.len();
        match self.optimize(expr) {
            Optimizable::Multiple => {
                if let Some(value) = self.folder.stack.pop() {
                    self.splice(expr, value);
                }
            }
            Optimizable::Single => {}
            Optimizable::None => match self.coder.ast.expr(expr).kind.clone() {
                ExprKind::ConstantRecord { entries } => self.fold_record_prefix(expr, &entries),
                ExprKind::ConstantArray {
                    element: Some(element),
                    entries,
                } => self.fold_array_prefix(expr, element, &entries),
                _ => {}
            },
        }
        self.folder.stack.truncate(height);
    }

    /// Fold regardless of [`crate::CompileOptions::fold_constants`]; used
    /// for default arguments filled in at a call site.
    pub(crate) fn optimize_in_place(&mut self, expr: ExprId) {
        self.fold_in_place(expr);
    }

    /// `expr` must become a literal. Reports `ExpectedConstantExpression`
    /// unless something was already reported since `mark`.
    pub(crate) fn force_optimize(&mut self, expr: ExprId, mark: usize) -> bool {
        let height = self.folder.stack.len();
        let folded = match self.optimize(expr) {
            Optimizable::Single => true,
            Optimizable::Multiple => match self.folder.stack.pop() {
                Some(value) => self.splice(expr, value),
                None => false,
            },
            Optimizable::None => false,
        };
        self.folder.stack.truncate(height);
        if !folded && self.error_mark() == mark {
            let pos = self.pos(expr);
            self.report(pos, ErrorKind::ExpectedConstantExpression);
        }
        folded
    }

    /// `IF` with a constant condition becomes the branch it takes.
    pub(crate) fn fold_if(&mut self, stmt: StmtId) {
        let StmtKind::If {
            condition,
            then,
            otherwise,
        } = self.coder.ast.stmt(stmt).kind.clone()
        else {
            return;
        };
        let Some(taken) = self.constant_bool(condition) else {
            return;
        };
        let pos = self.coder.ast.stmt(stmt).pos;
        trace!(%pos, taken, "folding IF");
        let kind = match (taken, otherwise) {
            (true, _) => self.coder.ast.stmt(then).kind.clone(),
            (false, Some(otherwise)) => self.coder.ast.stmt(otherwise).kind.clone(),
            (false, None) => StmtKind::Block(self.coder.new_block(pos)),
        };
        self.coder.ast.replace_stmt(stmt, kind);
    }

    fn constant_bool(&self, expr: ExprId) -> Option<bool> {
        self.coder.ast.expr(expr).kind.constant().and_then(Value::as_bool)
    }

    /// Replace a conditional by the branch it selects. Both branches were
    /// already checked and folded.
    fn select_branch(&mut self, expr: ExprId, branch: ExprId) {
        trace!(pos = %self.pos(expr), "folding ?:");
        let kind = self.coder.ast.expr(branch).kind.clone();
        let ty = self.types.get(branch);
        self.coder.ast.replace_expr(expr, kind);
        if let Some(ty) = ty.filter(|ty| !ty.is_variant()) {
            self.types.set(expr, ty);
        }
    }

    /// Turn `expr` into a literal holding `value`. A VARIANT node takes
    /// the literal's own type; a node with a different static type is left
    /// alone.
    fn splice(&mut self, expr: ExprId, value: Value) -> bool {
        let value_ty = value.value_type();
        let node_ty = self.types.get(expr).unwrap_or(VariableType::VARIANT);
        if node_ty != value_ty && !node_ty.is_variant() {
            trace!(pos = %self.pos(expr), %node_ty, %value_ty, "folded value does not match node type");
            return false;
        }
        trace!(pos = %self.pos(expr), %value, "folded");
        self.coder.ast.replace_expr(expr, ExprKind::Constant(value));
        self.types.set(expr, value_ty);
        true
    }

    fn fold_failed(&mut self, expr: ExprId, error: ValueError) {
        if !self.folder.failed.insert(expr) {
            return;
        }
        let pos = self.pos(expr);
        debug!(%pos, %error, "constant folding failed");
        self.report(
            pos,
            ErrorKind::ConstantFoldFailed {
                reason: error.to_string(),
            },
        );
    }

    /// Push the value of `expr`, or leave the stack as it was and return
    /// false.
    fn push_value(&mut self, expr: ExprId) -> bool {
        let height = self.folder.stack.len();
        let pushed = self.evaluate(expr);
        if !pushed {
            self.folder.stack.truncate(height);
        }
        pushed
    }

    fn pop_value(&mut self) -> Value {
        // Every caller pushed successfully before popping.
        self.folder.stack.pop().unwrap_or(Value::Boolean(false))
    }

    fn push_result(&mut self, expr: ExprId, result: hare_value::error::Result<Value>) -> bool {
        match result {
            Ok(value) => {
                self.folder.stack.push(value);
                true
            }
            Err(error) => {
                self.fold_failed(expr, error);
                false
            }
        }
    }

    fn evaluate(&mut self, expr: ExprId) -> bool {
        match self.coder.ast.expr(expr).kind.clone() {
            ExprKind::Constant(value) => {
                self.folder.stack.push(value);
                true
            }
            ExprKind::Variable(symbol) => {
                let Some(def) = self.coder.symbols.variable(symbol) else {
                    return false;
                };
                if !def.is_constant {
                    return false;
                }
                let Some(value) = def
                    .constant_value
                    .and_then(|init| self.coder.ast.expr(init).kind.constant().cloned())
                else {
                    return false;
                };
                self.folder.stack.push(value);
                true
            }
            ExprKind::BinaryOperator { op, lhs, rhs } => {
                if op == BinaryOp::NullCoalesce || !self.push_value(lhs) || !self.push_value(rhs) {
                    return false;
                }
                let right = self.pop_value();
                let left = self.pop_value();
                self.push_result(expr, ops::binary(op, left, right))
            }
            ExprKind::UnaryOperator { op, operand } => {
                if !self.push_value(operand) {
                    return false;
                }
                let value = self.pop_value();
                self.push_result(expr, ops::unary(op, value))
            }
            ExprKind::Cast { expr: inner, to, explicit, .. } => {
                if !self.push_value(inner) {
                    return false;
                }
                let value = self.pop_value();
                self.push_result(expr, cast::cast(value, to, explicit))
            }
            ExprKind::ConditionalOperator {
                condition,
                then,
                otherwise,
            } => {
                if !self.push_value(condition) {
                    return false;
                }
                match self.pop_value().as_bool() {
                    Some(true) => self.push_value(then),
                    Some(false) => self.push_value(otherwise),
                    None => false,
                }
            }
            ExprKind::ArrayElementConst { array, index } => {
                if !self.push_value(array) || !self.push_value(index) {
                    return false;
                }
                let index = self.pop_value();
                match self.pop_value() {
                    Value::Array(array) => self.push_result(expr, builtins::array_element(&array, &index)),
                    _ => false,
                }
            }
            ExprKind::RecordColumnConst { record, name } => {
                if !self.push_value(record) {
                    return false;
                }
                match self.pop_value() {
                    Value::Record(record) => self.push_result(expr, builtins::record_cell(&record, &name)),
                    _ => false,
                }
            }
            ExprKind::FunctionCall { function, args } => {
                let is_pure = self
                    .coder
                    .symbols
                    .function(function)
                    .is_some_and(|def| def.flags.contains(FunctionFlags::CONSTANT));
                if !is_pure {
                    return false;
                }
                for arg in &args {
                    if !self.push_value(*arg) {
                        return false;
                    }
                }
                let values = self.folder.stack.split_off(self.folder.stack.len() - args.len());
                let name = self.symbol_name(function);
                match builtins::call(&name, values) {
                    Some(result) => self.push_result(expr, result),
                    None => false,
                }
            }
            ExprKind::ConstantRecord { entries } => {
                let (record, consumed) = self.fold_record_entries(&entries);
                if consumed < entries.len() {
                    return false;
                }
                self.folder.stack.push(Value::Record(record));
                true
            }
            ExprKind::ConstantArray {
                element: Some(element),
                entries,
            } => {
                let (items, consumed) = self.fold_array_entries(element, &entries);
                if consumed < entries.len() {
                    return false;
                }
                self.folder.stack.push(Value::Array(Array::with_items(element, items)));
                true
            }
            ExprKind::TypeInfo { ty } => {
                self.folder.stack.push(Value::Integer(ty.type_id()));
                true
            }
            _ => false,
        }
    }

    // ── Literal records and arrays ──────────────────────────────────────

    /// Build the record of the longest constant prefix of `entries`.
    /// Returns the record and the number of entries it covers.
    fn fold_record_entries(&mut self, entries: &[RecordEntry]) -> (Record, usize) {
        let mut record = Record::empty();
        for (consumed, entry) in entries.iter().enumerate() {
            match entry {
                RecordEntry::Set { name, value } => {
                    if !self.push_value(*value) {
                        return (record, consumed);
                    }
                    let value = self.pop_value();
                    record.set(name, value);
                }
                RecordEntry::Spread(value) => {
                    if !self.push_value(*value) {
                        return (record, consumed);
                    }
                    match self.pop_value() {
                        Value::Record(source) => {
                            for (name, value) in source.iter() {
                                record.set(name, value.clone());
                            }
                        }
                        _ => return (record, consumed),
                    }
                }
                RecordEntry::Delete { name, .. } => {
                    if !record.remove(name) {
                        return (record, consumed);
                    }
                }
            }
        }
        (record, entries.len())
    }

    fn fold_array_entries(&mut self, element: VariableType, entries: &[ArrayEntry]) -> (Vec<Value>, usize) {
        let mut items = Vec::new();
        for (consumed, entry) in entries.iter().enumerate() {
            if !self.push_value(entry.value) {
                return (items, consumed);
            }
            match (entry.spread, self.pop_value()) {
                (false, value) => items.push(value),
                (true, Value::Array(source)) if source.element == element || element.is_variant() => {
                    items.extend(source.items);
                }
                (true, _) => return (items, consumed),
            }
        }
        (items, entries.len())
    }

    /// `[a: 1, b: 2, c: f()]` becomes
    /// `tmp := [a: 1, b: 2]; tmp := :RECORDCELLSET(tmp, "c", f())`.
    fn fold_record_prefix(&mut self, expr: ExprId, entries: &[RecordEntry]) {
        let (record, consumed) = self.fold_record_entries(entries);
        if consumed < 2 || consumed == entries.len() {
            return;
        }
        let pos = self.pos(expr);
        trace!(%pos, consumed, "folding record prefix");
        let rest = &entries[consumed..];
        let block = self.coder.new_block(pos);
        let result = self.coder.scoped(block, |c| {
            let prefix = c.constant(pos, Value::Record(record));
            let tmp = c.emit_temporary(pos, VariableType::RECORD, prefix);
            for entry in rest {
                let current = c.variable(pos, tmp);
                let updated = match entry {
                    RecordEntry::Set { name, value } => {
                        let name = c.string(pos, name);
                        c.call_builtin(pos, builtins::CELL_SET, vec![current, name, *value])
                    }
                    RecordEntry::Spread(value) => c.call_builtin(pos, builtins::RECORD_MERGE, vec![current, *value]),
                    RecordEntry::Delete { name, pos } => {
                        let name = c.string(*pos, name);
                        c.call_builtin(*pos, builtins::CELL_DELETE, vec![current, name])
                    }
                };
                c.emit_assign(pos, tmp, updated);
            }
            tmp
        });
        self.coder
            .ast
            .replace_expr(expr, ExprKind::ExpressionBlock { block, result });
        self.check_block(block);
    }

    /// `[1, 2, ...xs]` becomes `tmp := [1, 2]; tmp := tmp CONCAT xs`.
    fn fold_array_prefix(&mut self, expr: ExprId, element: VariableType, entries: &[ArrayEntry]) {
        let (items, consumed) = self.fold_array_entries(element, entries);
        if consumed < 2 || consumed == entries.len() {
            return;
        }
        let Some(array_ty) = element.to_array() else {
            return;
        };
        let pos = self.pos(expr);
        trace!(%pos, consumed, "folding array prefix");
        let rest = &entries[consumed..];
        let block = self.coder.new_block(pos);
        let result = self.coder.scoped(block, |c| {
            let prefix = c.constant(pos, Value::Array(Array::with_items(element, items)));
            let tmp = c.emit_temporary(pos, array_ty, prefix);
            for entry in rest {
                let current = c.variable(pos, tmp);
                let updated = if entry.spread {
                    c.binary(pos, BinaryOp::Concat, current, entry.value)
                } else {
                    c.call_builtin(pos, builtins::ARRAY_APPEND, vec![current, entry.value])
                };
                c.emit_assign(pos, tmp, updated);
            }
            tmp
        });
        self.coder
            .ast
            .replace_expr(expr, ExprKind::ExpressionBlock { block, result });
        self.check_block(block);
    }
}
