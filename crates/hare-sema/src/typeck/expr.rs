//! Rvalue typing.

use hare_ast::{ArrayEntry, ExprId, ExprKind, FieldKind, PtrBinding, RecordEntry, SymbolId};
use hare_common::{ErrorKind, Position};
use hare_value::cast::can_cast;
use hare_value::ops::numeric_promotion;
use hare_value::{BinaryOp, TypeKind, UnaryOp, VariableType};
use rustc_hash::FxHashSet;

use crate::Sema;

impl Sema {
    /// Compute the type of an unchecked rvalue. May rewrite the node in
    /// place (desugaring, END resolution) before typing it.
    pub(super) fn infer_expr(&mut self, expr: ExprId, rebind_allowed: bool) -> VariableType {
        let pos = self.pos(expr);
        match self.coder.ast.expr(expr).kind.clone() {
            ExprKind::Constant(value) => value.value_type(),
            ExprKind::Variable(symbol) => self.check_variable(pos, symbol),
            ExprKind::BinaryOperator { op, lhs, rhs } => self.check_binary(expr, op, lhs, rhs),
            ExprKind::UnaryOperator { op, operand } => self.check_unary(pos, op, operand),
            ExprKind::Cast {
                expr: inner,
                to,
                explicit,
                ..
            } => {
                let from = self.check_expr(inner);
                if from == VariableType::NO_RETURN {
                    self.coerce(inner, to);
                } else if !can_cast(from, to, explicit) {
                    self.report(
                        pos,
                        ErrorKind::CannotConvertType {
                            from: from.to_string(),
                            to: to.to_string(),
                        },
                    );
                }
                to
            }
            ExprKind::ConditionalOperator {
                condition,
                then,
                otherwise,
            } => {
                self.coerce(condition, VariableType::BOOLEAN);
                self.unify_branches(then, otherwise)
            }
            ExprKind::ArrayElementConst { array, index } => self.check_array_element(expr, array, index),
            ExprKind::ArrayElementModify { array, index, value } => {
                let array_ty = self.check_expr(array);
                if (array_ty.is_array() || array_ty.is_variant()) && !self.end_sites(index).is_empty() {
                    self.desugar_end_index(expr, array, index, Some(value), array_ty);
                    return self.infer_expr(expr, false);
                }
                self.check_index(index);
                if array_ty.is_array() {
                    self.coerce(value, array_ty.element());
                    array_ty
                } else {
                    if !array_ty.is_variant() {
                        self.report(pos, ErrorKind::NotAnArray { ty: array_ty.to_string() });
                    }
                    self.check_expr(value);
                    VariableType::VARIANT
                }
            }
            ExprKind::RecordColumnConst { record, name } => self.check_record_column(pos, record, &name),
            ExprKind::ObjectMemberConst { object, name, .. } => self.check_member(pos, object, &name),
            ExprKind::ObjectMethodCall { object, name, args, .. } => {
                self.check_method_call(expr, object, &name, args)
            }
            ExprKind::ObjectNew { object_type, args } => self.check_object_new(expr, object_type, args),
            ExprKind::FunctionCall { function, args } => self.check_function_call(expr, function, args),
            ExprKind::FunctionPtr { function, bindings } => {
                self.check_function_ptr(pos, function, bindings.as_deref());
                VariableType::FUNCTION_PTR
            }
            ExprKind::FunctionPtrCall { ptr, args } => {
                self.coerce(ptr, VariableType::FUNCTION_PTR);
                for arg in args {
                    self.check_value(arg);
                }
                VariableType::VARIANT
            }
            ExprKind::FunctionPtrRebind { ptr, bindings } => {
                if !rebind_allowed {
                    self.report(pos, ErrorKind::RebindNotAllowed);
                }
                self.coerce(ptr, VariableType::FUNCTION_PTR);
                self.check_bindings(pos, &bindings, None);
                VariableType::FUNCTION_PTR
            }
            ExprKind::Yield { value, star } => self.check_yield(expr, value, star),
            ExprKind::Await { value } => self.check_await(expr, value),
            ExprKind::ConstantRecord { entries } => {
                self.check_record_literal(&entries);
                VariableType::RECORD
            }
            ExprKind::ConstantArray { element, entries } => self.check_array_literal(expr, element, &entries),
            ExprKind::ExpressionBlock { block, result } => {
                self.check_block(block);
                self.coder
                    .symbols
                    .variable(result)
                    .map_or(VariableType::VARIANT, |def| def.ty)
            }
            ExprKind::TypeInfo { .. } => VariableType::INTEGER,
            ExprKind::End => {
                if self.checker.array_index_depth == 0 {
                    self.report(pos, ErrorKind::EndOutsideArrayIndex);
                    VariableType::VARIANT
                } else {
                    VariableType::INTEGER
                }
            }
            ExprKind::SqlSelect(select) => self.check_select(*select),
        }
    }

    /// Check an rvalue whose value is used, rejecting macro calls.
    pub(crate) fn check_value(&mut self, expr: ExprId) -> VariableType {
        self.coerce(expr, VariableType::VARIANT)
    }

    fn check_variable(&mut self, pos: Position, symbol: SymbolId) -> VariableType {
        let Some(ty) = self.coder.symbols.variable(symbol).map(|def| def.ty) else {
            let name = self.symbol_name(symbol);
            self.report(pos, ErrorKind::NotAVariable { name });
            return VariableType::VARIANT;
        };
        self.check_row_access(pos, symbol, None);
        ty
    }

    // ── Operators ───────────────────────────────────────────────────────

    fn check_binary(&mut self, expr: ExprId, op: BinaryOp, lhs: ExprId, rhs: ExprId) -> VariableType {
        let pos = self.pos(expr);
        match op {
            BinaryOp::NullCoalesce => {
                let ty = self.unify_branches(lhs, rhs);
                self.desugar_coalesce(expr, ty, lhs, rhs);
                self.infer_expr(expr, false)
            }
            BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => {
                self.coerce(lhs, VariableType::BOOLEAN);
                self.coerce(rhs, VariableType::BOOLEAN);
                VariableType::BOOLEAN
            }
            BinaryOp::Like => {
                self.coerce(lhs, VariableType::STRING);
                self.coerce(rhs, VariableType::STRING);
                VariableType::BOOLEAN
            }
            BinaryOp::In => {
                let left = self.check_value(lhs);
                let right = self.check_value(rhs);
                if right.is_array() {
                    let element = right.element();
                    if !element.is_variant() && !left.is_variant() {
                        self.coerce(lhs, element);
                    }
                } else if !right.is_variant() {
                    self.report(pos, ErrorKind::NotAnArray { ty: right.to_string() });
                }
                VariableType::BOOLEAN
            }
            BinaryOp::Merge => {
                for operand in [lhs, rhs] {
                    let ty = self.check_value(operand);
                    let mergeable = ty.is_variant()
                        || matches!(ty, VariableType::STRING | VariableType::INTEGER | VariableType::INTEGER64);
                    if !mergeable {
                        let pos = self.pos(operand);
                        self.report(
                            pos,
                            ErrorKind::InvalidOperandType {
                                op: op.symbol().to_string(),
                                ty: ty.to_string(),
                            },
                        );
                    }
                }
                VariableType::STRING
            }
            BinaryOp::Concat => self.check_concat(pos, lhs, rhs),
            _ if op.is_arithmetic() => self.check_arithmetic(pos, op, lhs, rhs),
            _ if op.is_bitwise() => self.check_bitwise(pos, op, lhs, rhs),
            _ => self.check_comparison(pos, op, lhs, rhs),
        }
    }

    fn check_arithmetic(&mut self, pos: Position, op: BinaryOp, lhs: ExprId, rhs: ExprId) -> VariableType {
        let left = self.check_value(lhs);
        let right = self.check_value(rhs);
        if left.is_variant() || right.is_variant() {
            for (ty, operand) in [(left, lhs), (right, rhs)] {
                if !ty.is_variant() && !ty.is_numeric() {
                    self.invalid_operand(operand, op, ty);
                }
            }
            return VariableType::VARIANT;
        }
        self.promote_operands(pos, op, lhs, left, rhs, right)
    }

    /// Cast both operands to their common numeric type.
    fn promote_operands(
        &mut self,
        pos: Position,
        op: BinaryOp,
        lhs: ExprId,
        left: VariableType,
        rhs: ExprId,
        right: VariableType,
    ) -> VariableType {
        match numeric_promotion(left, right) {
            Ok(Some(ty)) => {
                self.coerce(lhs, ty);
                self.coerce(rhs, ty);
                ty
            }
            Err(()) => {
                self.report(pos, ErrorKind::MoneyInteger64Mix);
                VariableType::VARIANT
            }
            Ok(None) => {
                self.report(
                    pos,
                    ErrorKind::IncompatibleOperands {
                        op: op.symbol().to_string(),
                        left: left.to_string(),
                        right: right.to_string(),
                    },
                );
                VariableType::VARIANT
            }
        }
    }

    /// Result type of `target op= value` for a target of static type
    /// `target`, or `None` after reporting why the operator does not
    /// apply. Follows the same rules as the binary operator itself.
    pub(super) fn compound_result(
        &mut self,
        pos: Position,
        op: BinaryOp,
        target: VariableType,
        value: VariableType,
    ) -> Option<VariableType> {
        let invalid = |sema: &mut Self, ty: VariableType| {
            sema.report(
                pos,
                ErrorKind::InvalidOperandType {
                    op: op.symbol().to_string(),
                    ty: ty.to_string(),
                },
            );
        };
        let allowed: fn(VariableType) -> bool = match op {
            BinaryOp::Merge => {
                |ty| matches!(ty, VariableType::STRING | VariableType::INTEGER | VariableType::INTEGER64)
            }
            BinaryOp::Concat => VariableType::is_array,
            _ if op.is_arithmetic() => VariableType::is_numeric,
            _ if op.is_bitwise() => VariableType::is_integral,
            _ => {
                invalid(self, target);
                return None;
            }
        };
        for ty in [target, value] {
            if !ty.is_variant() && !allowed(ty) {
                invalid(self, ty);
                return None;
            }
        }
        match op {
            BinaryOp::Merge => return Some(VariableType::STRING),
            BinaryOp::Concat if target == value => return Some(target),
            BinaryOp::Concat => return Some(VariableType::VARIANT_ARRAY),
            BinaryOp::ShiftLeft | BinaryOp::ShiftRight => return Some(target),
            _ => {}
        }
        if target.is_variant() || value.is_variant() {
            return Some(VariableType::VARIANT);
        }
        match numeric_promotion(target, value) {
            Ok(Some(ty)) => Some(ty),
            Err(()) => {
                self.report(pos, ErrorKind::MoneyInteger64Mix);
                None
            }
            Ok(None) => {
                self.report(
                    pos,
                    ErrorKind::IncompatibleOperands {
                        op: op.symbol().to_string(),
                        left: target.to_string(),
                        right: value.to_string(),
                    },
                );
                None
            }
        }
    }

    fn check_bitwise(&mut self, pos: Position, op: BinaryOp, lhs: ExprId, rhs: ExprId) -> VariableType {
        let left = self.check_value(lhs);
        let right = self.check_value(rhs);
        for (ty, operand) in [(left, lhs), (right, rhs)] {
            if !ty.is_variant() && !ty.is_integral() {
                self.invalid_operand(operand, op, ty);
                return VariableType::VARIANT;
            }
        }
        if left.is_variant() {
            return VariableType::VARIANT;
        }
        if matches!(op, BinaryOp::ShiftLeft | BinaryOp::ShiftRight) {
            if !right.is_variant() {
                self.coerce(rhs, VariableType::INTEGER);
            }
            return left;
        }
        if right.is_variant() {
            return VariableType::VARIANT;
        }
        self.promote_operands(pos, op, lhs, left, rhs, right)
    }

    fn check_comparison(&mut self, pos: Position, op: BinaryOp, lhs: ExprId, rhs: ExprId) -> VariableType {
        let left = self.check_value(lhs);
        let right = self.check_value(rhs);
        if left.is_variant() || right.is_variant() {
            return VariableType::BOOLEAN;
        }
        if left.is_numeric() && right.is_numeric() {
            self.promote_operands(pos, op, lhs, left, rhs, right);
            return VariableType::BOOLEAN;
        }
        let comparable = left == right
            && !left.is_array()
            && matches!(
                left.kind(),
                TypeKind::String | TypeKind::DateTime | TypeKind::Boolean
            );
        if !comparable {
            self.report(
                pos,
                ErrorKind::IncompatibleOperands {
                    op: op.symbol().to_string(),
                    left: left.to_string(),
                    right: right.to_string(),
                },
            );
        }
        VariableType::BOOLEAN
    }

    fn check_concat(&mut self, pos: Position, lhs: ExprId, rhs: ExprId) -> VariableType {
        let left = self.check_value(lhs);
        let right = self.check_value(rhs);
        for (ty, operand) in [(left, lhs), (right, rhs)] {
            if !ty.is_array() && !ty.is_variant() {
                self.invalid_operand(operand, BinaryOp::Concat, ty);
                return VariableType::VARIANT;
            }
        }
        match (left.is_variant(), right.is_variant()) {
            (true, true) => return VariableType::VARIANT,
            (true, false) => return right,
            (false, true) => return left,
            (false, false) => {}
        }
        if left == right {
            return left;
        }
        let compatible =
            can_cast(right.element(), left.element(), false) || can_cast(left.element(), right.element(), false);
        if compatible {
            self.coerce(lhs, VariableType::VARIANT_ARRAY);
            self.coerce(rhs, VariableType::VARIANT_ARRAY);
            return VariableType::VARIANT_ARRAY;
        }
        self.report(
            pos,
            ErrorKind::IncompatibleArrays {
                left: left.to_string(),
                right: right.to_string(),
            },
        );
        VariableType::VARIANT
    }

    fn check_unary(&mut self, pos: Position, op: UnaryOp, operand: ExprId) -> VariableType {
        match op {
            UnaryOp::Not => {
                self.coerce(operand, VariableType::BOOLEAN);
                VariableType::BOOLEAN
            }
            UnaryOp::Negate | UnaryOp::Plus => {
                let ty = self.check_value(operand);
                if ty.is_numeric() || ty.is_variant() {
                    ty
                } else {
                    self.report(
                        pos,
                        ErrorKind::InvalidOperandType {
                            op: op.symbol().to_string(),
                            ty: ty.to_string(),
                        },
                    );
                    VariableType::VARIANT
                }
            }
            UnaryOp::BitNeg => {
                let ty = self.check_value(operand);
                if ty.is_integral() || ty.is_variant() {
                    ty
                } else {
                    self.report(
                        pos,
                        ErrorKind::InvalidOperandType {
                            op: op.symbol().to_string(),
                            ty: ty.to_string(),
                        },
                    );
                    VariableType::VARIANT
                }
            }
        }
    }

    fn invalid_operand(&mut self, operand: ExprId, op: BinaryOp, ty: VariableType) {
        let pos = self.pos(operand);
        self.report(
            pos,
            ErrorKind::InvalidOperandType {
                op: op.symbol().to_string(),
                ty: ty.to_string(),
            },
        );
    }

    // ── Arrays and END ──────────────────────────────────────────────────

    fn check_array_element(&mut self, expr: ExprId, array: ExprId, index: ExprId) -> VariableType {
        let pos = self.pos(expr);
        let array_ty = self.check_value(array);
        let is_indexable = array_ty.is_array() || array_ty.is_variant();
        if !is_indexable {
            self.report(pos, ErrorKind::NotAnArray { ty: array_ty.to_string() });
        }
        if is_indexable && !self.end_sites(index).is_empty() {
            self.desugar_end_index(expr, array, index, None, array_ty);
            return self.infer_expr(expr, false);
        }
        self.check_index(index);
        if array_ty.is_array() {
            array_ty.element()
        } else {
            VariableType::VARIANT
        }
    }

    /// Check an array subscript; END is legal inside it.
    pub(crate) fn check_index(&mut self, index: ExprId) {
        self.checker.array_index_depth += 1;
        self.coerce(index, VariableType::INTEGER);
        self.checker.array_index_depth -= 1;
    }

    fn check_array_literal(
        &mut self,
        expr: ExprId,
        element: Option<VariableType>,
        entries: &[ArrayEntry],
    ) -> VariableType {
        let mut element = element;
        for entry in entries {
            let ty = self.check_value(entry.value);
            if entry.spread {
                if !ty.is_array() && !ty.is_variant() {
                    let pos = self.pos(entry.value);
                    self.report(pos, ErrorKind::NotAnArray { ty: ty.to_string() });
                    continue;
                }
                if element.is_none() && ty.is_array() {
                    element = Some(ty.element());
                }
            } else if element.is_none() {
                element = Some(ty);
            }
        }
        let element = element.unwrap_or(VariableType::VARIANT);
        let Some(array_ty) = element.to_array() else {
            let pos = self.pos(expr);
            self.report(
                pos,
                ErrorKind::CannotConvertType {
                    from: element.to_string(),
                    to: "ARRAY".to_string(),
                },
            );
            return VariableType::VARIANT;
        };
        for entry in entries {
            if entry.spread {
                self.coerce(entry.value, array_ty);
            } else {
                self.coerce(entry.value, element);
            }
        }
        if let ExprKind::ConstantArray { element: slot, .. } = &mut self.coder.ast.expr_mut(expr).kind {
            *slot = Some(element);
        }
        array_ty
    }

    fn check_record_literal(&mut self, entries: &[RecordEntry]) {
        let mut cells: FxHashSet<String> = FxHashSet::default();
        let mut after_spread = false;
        for entry in entries {
            match entry {
                RecordEntry::Set { name, value } => {
                    self.check_value(*value);
                    let name = name.to_ascii_uppercase();
                    if !cells.insert(name.clone()) {
                        let pos = self.pos(*value);
                        self.report(pos, ErrorKind::DuplicateCell { name });
                    }
                }
                RecordEntry::Spread(value) => {
                    let ty = self.check_value(*value);
                    if ty != VariableType::RECORD && !ty.is_variant() {
                        let pos = self.pos(*value);
                        self.report(pos, ErrorKind::NotARecord { ty: ty.to_string() });
                    }
                    after_spread = true;
                }
                RecordEntry::Delete { name, pos } => {
                    let name = name.to_ascii_uppercase();
                    if !cells.remove(&name) && !after_spread {
                        self.report(*pos, ErrorKind::DeleteUnknownCell { name });
                    }
                }
            }
        }
    }

    // ── Records and objects ─────────────────────────────────────────────

    fn check_record_column(&mut self, pos: Position, record: ExprId, name: &str) -> VariableType {
        if let ExprKind::Variable(row) = self.coder.ast.expr(record).kind {
            if self.is_select_row(row) {
                self.check_row_access(pos, row, Some(name));
                self.types.set(record, VariableType::RECORD);
                return VariableType::VARIANT;
            }
        }
        let ty = self.check_value(record);
        if ty.is_object() {
            self.report(pos, ErrorKind::ColumnOfObject);
        } else if ty == VariableType::RECORD_ARRAY {
            self.coerce(record, VariableType::RECORD);
        } else if ty != VariableType::RECORD && !ty.is_variant() {
            self.report(pos, ErrorKind::NotARecord { ty: ty.to_string() });
        }
        VariableType::VARIANT
    }

    fn check_member(&mut self, pos: Position, object: ExprId, name: &str) -> VariableType {
        let ty = self.check_value(object);
        if !self.is_object_like(pos, ty) {
            return VariableType::VARIANT;
        }
        let Some(object_type) = self.static_object_type(object) else {
            return VariableType::VARIANT;
        };
        match self.coder.symbols.lookup_field(object_type, name).cloned() {
            Some(field) if field.kind == FieldKind::Method => {
                self.report(
                    pos,
                    ErrorKind::MethodWithoutCall {
                        member: name.to_ascii_uppercase(),
                    },
                );
                VariableType::VARIANT
            }
            Some(field) => field.ty,
            None => {
                self.unknown_member(pos, object_type, name);
                VariableType::VARIANT
            }
        }
    }

    /// Whether `ty` may have members, reporting the record/object mixup
    /// when it cannot.
    pub(crate) fn is_object_like(&mut self, pos: Position, ty: VariableType) -> bool {
        if ty.is_object() || ty.is_variant() {
            return true;
        }
        if ty == VariableType::RECORD {
            self.report(pos, ErrorKind::MemberOfRecord);
        } else {
            self.report(pos, ErrorKind::NotAnObject { ty: ty.to_string() });
        }
        false
    }

    /// Dynamic object types defer unknown members to runtime.
    pub(crate) fn unknown_member(&mut self, pos: Position, object_type: SymbolId, name: &str) {
        if self.object_is_static(object_type) {
            let object_type = self.symbol_name(object_type);
            self.report(
                pos,
                ErrorKind::UnknownMember {
                    object_type,
                    member: name.to_ascii_uppercase(),
                },
            );
        }
    }

    // ── Function pointers ───────────────────────────────────────────────

    fn check_function_ptr(&mut self, pos: Position, function: SymbolId, bindings: Option<&[PtrBinding]>) {
        let Some(def) = self.coder.symbols.function(function).cloned() else {
            let name = self.symbol_name(function);
            self.report(pos, ErrorKind::NotAFunction { name });
            return;
        };
        let Some(bindings) = bindings else {
            return;
        };
        if bindings.len() > def.params.len() && !def.flags.contains(hare_ast::FunctionFlags::VARARG) {
            let name = self.symbol_name(function);
            self.report(
                pos,
                ErrorKind::TooManyParameters {
                    function: name,
                    max: def.params.len(),
                },
            );
        }
        let param_types: Vec<VariableType> = def.params.iter().map(|p| p.ty).collect();
        self.check_bindings(pos, bindings, Some(&param_types));
    }

    /// Validate passthrough indices and type bound values. A positive
    /// index forwards a call argument, a negative one forwards it with the
    /// bound value as default, zero binds the value outright.
    fn check_bindings(&mut self, pos: Position, bindings: &[PtrBinding], params: Option<&[VariableType]>) {
        let max = bindings.len();
        for (i, binding) in bindings.iter().enumerate() {
            let index = binding.passthrough;
            let valid = match (index, binding.bound) {
                (0, None) => false,
                (0, Some(_)) => true,
                (index, _) if index < 0 && binding.bound.is_none() => false,
                (index, _) => index.unsigned_abs() as usize <= max,
            };
            if !valid {
                self.report(pos, ErrorKind::InvalidPassthrough { index, max });
            }
            if let Some(bound) = binding.bound {
                match params.and_then(|p| p.get(i)) {
                    Some(ty) => {
                        self.coerce_param(bound, *ty);
                    }
                    None => {
                        self.check_value(bound);
                    }
                }
            }
        }
    }

    // ── Generators ──────────────────────────────────────────────────────

    fn check_yield(&mut self, expr: ExprId, value: ExprId, star: bool) -> VariableType {
        let pos = self.pos(expr);
        let mark = self.error_mark();
        if self.checker.yield_forbid_counter > 0 {
            self.report(pos, ErrorKind::YieldInSql);
        } else if !self.current_function_kind().is_generator() {
            self.report(pos, ErrorKind::YieldOutsideGenerator);
        }
        self.check_value(value);
        if self.error_mark() != mark {
            return VariableType::VARIANT;
        }
        if star {
            self.desugar_yield_star(expr, value);
        } else {
            self.desugar_yield(expr, value);
        }
        self.infer_expr(expr, false)
    }

    fn check_await(&mut self, expr: ExprId, value: ExprId) -> VariableType {
        let pos = self.pos(expr);
        let mark = self.error_mark();
        if self.checker.yield_forbid_counter > 0 {
            self.report(pos, ErrorKind::YieldInSql);
        } else if !self.current_function_kind().is_async() {
            self.report(pos, ErrorKind::AwaitOutsideAsync);
        }
        self.check_value(value);
        if self.error_mark() != mark {
            return VariableType::VARIANT;
        }
        self.desugar_await(expr, value);
        self.infer_expr(expr, false)
    }
}
