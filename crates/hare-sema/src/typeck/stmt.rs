//! Statement checking. Statements that need desugaring are checked first
//! and then replaced by their expansion, which is checked in turn.

use hare_ast::{
    BlockId, DeepOp, DeepOperation, ExprId, ExprKind, FieldKind, FunctionKind, LayerKind, StmtId, StmtKind,
    SwitchStatement, SymbolId,
};
use hare_common::{ice, ErrorKind, Position};
use hare_value::cast::can_cast;
use hare_value::{Record, Value, VariableType};

use crate::Sema;

impl Sema {
    pub fn check_block(&mut self, block: BlockId) {
        let statements = self.coder.ast.block(block).statements.clone();
        for stmt in statements {
            self.check_stmt(stmt);
        }
    }

    pub fn check_stmt(&mut self, stmt: StmtId) {
        let pos = self.coder.ast.stmt(stmt).pos;
        match self.coder.ast.stmt(stmt).kind.clone() {
            StmtKind::Block(block) => self.check_block(block),
            StmtKind::If {
                condition,
                then,
                otherwise,
            } => {
                self.coerce(condition, VariableType::BOOLEAN);
                self.check_stmt(then);
                if let Some(otherwise) = otherwise {
                    self.check_stmt(otherwise);
                }
                if self.options.fold_constants {
                    self.fold_if(stmt);
                }
            }
            StmtKind::For {
                init,
                condition,
                step,
                body,
            } => {
                if let Some(init) = init {
                    self.check_stmt(init);
                }
                if let Some(condition) = condition {
                    self.coerce(condition, VariableType::BOOLEAN);
                }
                self.checker.loop_depth += 1;
                self.check_stmt(body);
                self.checker.loop_depth -= 1;
                if let Some(step) = step {
                    self.check_stmt(step);
                }
            }
            StmtKind::ForEvery {
                variable,
                source,
                position,
                body,
                is_rewritten,
            } => {
                if is_rewritten {
                    ice!("FOREVERY at {pos} visited after rewriting");
                }
                self.mark_rewritten(stmt);
                self.check_forevery(stmt, variable, source, position, body);
            }
            StmtKind::Break => {
                if self.checker.loop_depth == 0 {
                    self.report(pos, ErrorKind::BreakOutsideLoop);
                }
            }
            StmtKind::Continue => {
                if self.checker.loop_depth == 0 {
                    self.report(pos, ErrorKind::ContinueOutsideLoop);
                }
            }
            StmtKind::Return { value } => self.check_return(stmt, pos, value),
            StmtKind::Switch(switch) => self.check_switch(stmt, *switch),
            StmtKind::TryCatch {
                try_block,
                exception,
                catch_block,
            } => {
                self.check_block(try_block);
                if let Some(exception) = exception {
                    if self.coder.symbols.variable(exception).is_none() {
                        let name = self.symbol_name(exception);
                        self.report(pos, ErrorKind::NotAVariable { name });
                    }
                }
                self.check_block(catch_block);
            }
            StmtKind::TryFinally {
                try_block,
                finally_block,
            } => {
                self.check_block(try_block);
                self.check_block(finally_block);
            }
            StmtKind::Throw { value } => {
                let ty = self.check_value(value);
                if !ty.is_object() && !ty.is_variant() {
                    self.report(pos, ErrorKind::ThrowNonObject { ty: ty.to_string() });
                }
            }
            StmtKind::SingleExpression { expr } => {
                self.check_expr(expr);
                if is_pure(&self.coder.ast.expr(expr).kind) {
                    self.report(pos, ErrorKind::NoEffect);
                }
            }
            StmtKind::Assign { target, value } => self.check_assign(pos, target, value),
            StmtKind::Initialize { variable } => {
                if self.coder.symbols.variable(variable).is_none() {
                    let name = self.symbol_name(variable);
                    self.report(pos, ErrorKind::NotAVariable { name });
                }
            }
            StmtKind::DeepOperation(deep) => self.check_deep_operation(stmt, *deep),
            StmtKind::SqlInsert { target, row } => self.check_sql_insert(target, row),
            StmtKind::SqlUpdate {
                source,
                set,
                condition,
            } => self.check_sql_modify(&source, &set, condition),
            StmtKind::SqlDelete { source, condition } => self.check_sql_modify(&source, &[], condition),
        }
    }

    /// Check a value stored into `target`. A function pointer rebind is
    /// legal only here and in RETURN.
    fn check_assign(&mut self, pos: Position, target: SymbolId, value: ExprId) {
        let Some(def) = self.coder.symbols.variable(target).cloned() else {
            let name = self.symbol_name(target);
            self.report(pos, ErrorKind::NotAVariable { name });
            self.check_value(value);
            return;
        };
        if (def.is_constant || def.is_constref) && !def.is_temporary {
            let name = self.symbol_name(target);
            self.report(pos, ErrorKind::CannotAssignConstant { name });
        }
        self.checker.rebind_target = Some(value);
        self.coerce(value, def.ty);
        self.checker.rebind_target = None;
    }

    fn check_forevery(
        &mut self,
        stmt: StmtId,
        variable: SymbolId,
        source: ExprId,
        position: Option<SymbolId>,
        body: StmtId,
    ) {
        let pos = self.coder.ast.stmt(stmt).pos;
        let source_ty = self.check_value(source);
        let mut valid = true;
        if !source_ty.is_array() && !source_ty.is_variant() {
            self.report(pos, ErrorKind::NotAnArray { ty: source_ty.to_string() });
            valid = false;
        }
        for symbol in std::iter::once(variable).chain(position) {
            if self.coder.symbols.variable(symbol).is_none() {
                let name = self.symbol_name(symbol);
                self.report(pos, ErrorKind::NotAVariable { name });
                valid = false;
            }
        }
        if !valid {
            self.checker.loop_depth += 1;
            self.check_stmt(body);
            self.checker.loop_depth -= 1;
            return;
        }
        self.desugar_forevery(stmt, variable, source, source_ty, position, body);
        self.check_stmt(stmt);
    }

    fn check_return(&mut self, stmt: StmtId, pos: Position, value: Option<ExprId>) {
        if self.current_function_kind() != FunctionKind::Normal {
            self.check_generator_return(stmt, pos, value);
            return;
        }
        let returns = self.current_return_type();
        match value {
            Some(value) if returns == VariableType::NO_RETURN => {
                self.report(pos, ErrorKind::ReturnValueInMacro);
                self.check_value(value);
            }
            Some(value) => {
                self.checker.rebind_target = Some(value);
                self.coerce(value, returns);
                self.checker.rebind_target = None;
            }
            None if returns != VariableType::NO_RETURN => {
                self.report(pos, ErrorKind::MissingReturnValue);
            }
            None => {}
        }
    }

    /// In generator and async bodies RETURN hands its value to the
    /// generator object, which reports it as the final result.
    fn check_generator_return(&mut self, stmt: StmtId, pos: Position, value: Option<ExprId>) {
        let Some(generator) = self.sugar_generator() else {
            ice!("RETURN at {pos} in a generator body without generator variable");
        };
        if let Some(value) = value {
            if self.is_generator_return(value, generator) {
                self.check_expr(value);
                return;
            }
        }
        let value = match value {
            Some(value) => value,
            None => self.coder.constant(pos, Value::Record(Record::non_existing())),
        };
        self.checker.rebind_target = Some(value);
        self.check_value(value);
        self.checker.rebind_target = None;

        let object = self.coder.variable(pos, generator);
        let wrapped = self.coder.method_call(pos, object, "RETURNVALUE", vec![value]);
        self.coder.ast.replace_stmt(stmt, StmtKind::Return { value: Some(wrapped) });
        self.check_expr(wrapped);
    }

    fn is_generator_return(&self, value: ExprId, generator: SymbolId) -> bool {
        match &self.coder.ast.expr(value).kind {
            ExprKind::ObjectMethodCall { object, name, .. } => {
                name.eq_ignore_ascii_case("RETURNVALUE")
                    && matches!(self.coder.ast.expr(*object).kind, ExprKind::Variable(g) if g == generator)
            }
            _ => false,
        }
    }

    fn check_switch(&mut self, stmt: StmtId, switch: SwitchStatement) {
        let pos = self.coder.ast.stmt(stmt).pos;
        if switch.is_rewritten {
            ice!("SWITCH at {pos} visited after rewriting");
        }
        self.mark_rewritten(stmt);
        let value_ty = self.check_value(switch.value);
        let mark = self.error_mark();
        let mut seen: Vec<Value> = Vec::new();
        for case in &switch.cases {
            for label in &case.labels {
                self.check_constant(*label, value_ty);
                let Some(value) = self.coder.ast.expr(*label).kind.constant().cloned() else {
                    continue;
                };
                if seen.contains(&value) {
                    let pos = self.pos(*label);
                    self.report(pos, ErrorKind::DuplicateCaseLabel { label: value.to_string() });
                } else {
                    seen.push(value);
                }
            }
        }
        if self.error_mark() != mark {
            for case in &switch.cases {
                self.check_block(case.block);
            }
            if let Some(default) = switch.default {
                self.check_block(default);
            }
            return;
        }
        self.desugar_switch(stmt, &switch, value_ty);
        self.check_stmt(stmt);
    }

    /// Validate every layer of an lvalue chain and the operation applied
    /// at its end, then expand it into plain reads, helper calls and
    /// assignments.
    fn check_deep_operation(&mut self, stmt: StmtId, mut deep: DeepOperation) {
        let pos = self.coder.ast.stmt(stmt).pos;
        if deep.is_rewritten {
            ice!("deep lvalue operation at {pos} visited after rewriting");
        }
        deep.is_rewritten = true;
        let mark = self.error_mark();
        let lvalue = &mut deep.lvalue;

        let mut object_type = None;
        let mut current = match (lvalue.base_var, lvalue.base_expr) {
            (Some(var), _) => match self.coder.symbols.variable(var).cloned() {
                Some(def) => {
                    if (def.is_constant || def.is_constref) && !def.is_temporary {
                        let name = self.symbol_name(var);
                        self.report(pos, ErrorKind::CannotAssignConstant { name });
                    }
                    object_type = def.object_type;
                    def.ty
                }
                None => {
                    let name = self.symbol_name(var);
                    self.report(pos, ErrorKind::NotAVariable { name });
                    VariableType::VARIANT
                }
            },
            (None, Some(expr)) => {
                let ty = self.check_value(expr);
                object_type = self.static_object_type(expr);
                ty
            }
            (None, None) => ice!("lvalue at {pos} has neither base variable nor base expression"),
        };

        let mut layer_types = Vec::with_capacity(lvalue.layers.len());
        for layer in &mut lvalue.layers {
            let layer_pos = layer.pos;
            current = match &mut layer.kind {
                LayerKind::Array { index } => {
                    if !current.is_array() && !current.is_variant() {
                        self.report(layer_pos, ErrorKind::NotAnArray { ty: current.to_string() });
                    }
                    self.check_index(*index);
                    object_type = None;
                    if current.is_array() {
                        current.element()
                    } else {
                        VariableType::VARIANT
                    }
                }
                LayerKind::Record { .. } => {
                    if current.is_object() {
                        self.report(layer_pos, ErrorKind::ColumnOfObject);
                    } else if current != VariableType::RECORD && !current.is_variant() {
                        self.report(layer_pos, ErrorKind::NotARecord { ty: current.to_string() });
                    }
                    object_type = None;
                    VariableType::VARIANT
                }
                LayerKind::Object { name, is_property, .. } => {
                    let mut ty = VariableType::VARIANT;
                    if self.is_object_like(layer_pos, current) {
                        if let Some(static_type) = object_type {
                            match self.coder.symbols.lookup_field(static_type, name).cloned() {
                                Some(field) if field.kind == FieldKind::Method => {
                                    self.report(
                                        layer_pos,
                                        ErrorKind::MethodWithoutCall {
                                            member: name.to_ascii_uppercase(),
                                        },
                                    );
                                }
                                Some(field) => {
                                    *is_property = field.kind == FieldKind::Property;
                                    ty = field.ty;
                                }
                                None => self.unknown_member(layer_pos, static_type, name),
                            }
                        }
                    }
                    object_type = None;
                    ty
                }
            };
            layer_types.push(current);
        }

        match &deep.op {
            DeepOp::Set(value) => {
                self.checker.rebind_target = Some(*value);
                self.coerce(*value, current);
                self.checker.rebind_target = None;
            }
            DeepOp::Compound { op, value } => {
                let right = self.check_value(*value);
                if let Some(result) = self.compound_result(pos, *op, current, right) {
                    if !can_cast(result, current, false) {
                        self.report(
                            pos,
                            ErrorKind::CannotConvertType {
                                from: result.to_string(),
                                to: current.to_string(),
                            },
                        );
                    }
                }
            }
            DeepOp::ArrayInsert { index, value } => {
                self.expect_array(pos, current);
                self.check_index(*index);
                if current.is_array() {
                    self.coerce(*value, current.element());
                } else {
                    self.check_value(*value);
                }
            }
            DeepOp::ArrayDelete { index } => {
                self.expect_array(pos, current);
                self.check_index(*index);
            }
            DeepOp::CellInsert { value, .. } => {
                self.expect_record(pos, current);
                self.check_value(*value);
            }
            DeepOp::CellDelete { .. } => self.expect_record(pos, current),
        }

        self.coder
            .ast
            .replace_stmt(stmt, StmtKind::DeepOperation(Box::new(deep.clone())));
        if self.error_mark() != mark {
            return;
        }
        self.desugar_deep_operation(stmt, &deep, &layer_types);
        self.check_stmt(stmt);
    }

    /// Flag a statement that is expanded by the checker. The expansion
    /// replaces it; when errors stop the expansion the flagged node stays
    /// and must not be visited again.
    fn mark_rewritten(&mut self, stmt: StmtId) {
        match &mut self.coder.ast.stmt_mut(stmt).kind {
            StmtKind::ForEvery { is_rewritten, .. } => *is_rewritten = true,
            StmtKind::Switch(switch) => switch.is_rewritten = true,
            StmtKind::DeepOperation(deep) => deep.is_rewritten = true,
            _ => {}
        }
    }

    fn expect_array(&mut self, pos: Position, ty: VariableType) {
        if !ty.is_array() && !ty.is_variant() {
            self.report(pos, ErrorKind::NotAnArray { ty: ty.to_string() });
        }
    }

    fn expect_record(&mut self, pos: Position, ty: VariableType) {
        if ty.is_object() {
            self.report(pos, ErrorKind::ColumnOfObject);
        } else if ty != VariableType::RECORD && !ty.is_variant() {
            self.report(pos, ErrorKind::NotARecord { ty: ty.to_string() });
        }
    }
}

/// Expressions whose evaluation cannot have side effects.
fn is_pure(kind: &ExprKind) -> bool {
    matches!(
        kind,
        ExprKind::Constant(_)
            | ExprKind::Variable(_)
            | ExprKind::BinaryOperator { .. }
            | ExprKind::UnaryOperator { .. }
            | ExprKind::Cast { .. }
            | ExprKind::ConditionalOperator { .. }
            | ExprKind::RecordColumnConst { .. }
            | ExprKind::ConstantRecord { .. }
            | ExprKind::ConstantArray { .. }
            | ExprKind::TypeInfo { .. }
    )
}
