//! Function, method and constructor calls, including aggregates.

use hare_ast::{ExprId, ExprKind, FieldKind, FunctionFlags, SymbolId};
use hare_common::{ErrorKind, Position};
use hare_value::VariableType;
use tracing::trace;

use crate::Sema;

impl Sema {
    pub(super) fn check_function_call(&mut self, expr: ExprId, function: SymbolId, args: Vec<ExprId>) -> VariableType {
        let pos = self.pos(expr);
        let Some(def) = self.coder.symbols.function(function).cloned() else {
            let name = self.symbol_name(function);
            self.report(pos, ErrorKind::NotAFunction { name });
            for arg in args {
                self.check_value(arg);
            }
            return VariableType::VARIANT;
        };
        if def.flags.contains(FunctionFlags::AGGREGATE) {
            let args = self.check_aggregate_call(pos, function, args);
            self.set_call_args(expr, args);
            return def.returns;
        }
        let args = self.check_call_args(pos, function, args);
        self.set_call_args(expr, args);
        def.returns
    }

    pub(super) fn check_method_call(
        &mut self,
        expr: ExprId,
        object: ExprId,
        name: &str,
        args: Vec<ExprId>,
    ) -> VariableType {
        let pos = self.pos(expr);
        let ty = self.check_value(object);
        let field = if self.is_object_like(pos, ty) {
            self.static_object_type(object)
                .map(|object_type| (object_type, self.coder.symbols.lookup_field(object_type, name).cloned()))
        } else {
            None
        };
        match field {
            Some((_, Some(field))) if field.kind == FieldKind::Method => {
                let Some(method) = field.method else {
                    return self.check_untyped_args(args);
                };
                let returns = self.coder.symbols.function(method).map_or(VariableType::VARIANT, |def| def.returns);
                let args = self.check_call_args(pos, method, args);
                self.set_call_args(expr, args);
                returns
            }
            Some((object_type, None)) => {
                self.unknown_member(pos, object_type, name);
                self.check_untyped_args(args)
            }
            _ => self.check_untyped_args(args),
        }
    }

    pub(super) fn check_object_new(&mut self, expr: ExprId, object_type: SymbolId, args: Vec<ExprId>) -> VariableType {
        let pos = self.pos(expr);
        if self.coder.symbols.object_type(object_type).is_none() {
            let name = self.symbol_name(object_type);
            self.report(
                pos,
                ErrorKind::NotAnObject { ty: name },
            );
            self.check_untyped_args(args);
            return VariableType::VARIANT;
        }
        let constructor = self
            .coder
            .symbols
            .lookup_field(object_type, "NEW")
            .and_then(|field| field.method);
        match constructor {
            Some(method) => {
                let args = self.check_call_args(pos, method, args);
                self.set_call_args(expr, args);
            }
            None => {
                self.check_untyped_args(args);
            }
        }
        VariableType::OBJECT
    }

    fn check_untyped_args(&mut self, args: Vec<ExprId>) -> VariableType {
        for arg in args {
            self.check_value(arg);
        }
        VariableType::VARIANT
    }

    /// Validate arity, coerce every argument to its parameter type and
    /// fill omitted trailing arguments from the parameter defaults.
    /// Returns the complete argument list.
    pub(crate) fn check_call_args(&mut self, pos: Position, function: SymbolId, mut args: Vec<ExprId>) -> Vec<ExprId> {
        let Some(def) = self.coder.symbols.function(function).cloned() else {
            self.check_untyped_args(args.clone());
            return args;
        };
        let vararg = def.flags.contains(FunctionFlags::VARARG);
        if args.len() > def.params.len() && !vararg {
            let name = self.symbol_name(function);
            self.report(
                pos,
                ErrorKind::TooManyParameters {
                    function: name,
                    max: def.params.len(),
                },
            );
        }
        for (i, arg) in args.iter().enumerate() {
            match def.params.get(i) {
                Some(param) => {
                    self.coerce_param(*arg, param.ty);
                }
                None => {
                    self.check_value(*arg);
                }
            }
        }
        for param in def.params.iter().skip(args.len()) {
            if vararg && param.default.is_none() {
                break;
            }
            let Some(default) = param.default else {
                let name = self.symbol_name(function);
                self.report(
                    pos,
                    ErrorKind::TooFewParameters {
                        function: name,
                        param: param.name.clone(),
                    },
                );
                break;
            };
            let arg = self.coder.ast.copy_expr(default);
            self.coder.ast.expr_mut(arg).pos = pos;
            trace!(param = %param.name, "filling default argument");
            self.coerce_param(arg, param.ty);
            self.optimize_in_place(arg);
            args.push(arg);
        }
        args
    }

    fn set_call_args(&mut self, expr: ExprId, new_args: Vec<ExprId>) {
        match &mut self.coder.ast.expr_mut(expr).kind {
            ExprKind::FunctionCall { args, .. }
            | ExprKind::ObjectMethodCall { args, .. }
            | ExprKind::ObjectNew { args, .. } => *args = new_args,
            other => hare_common::ice!("set_call_args on {}", other.name()),
        }
    }

    /// Aggregate calls belong to the innermost SELECT. Inside their
    /// arguments the rows of that select become accessible again, rows of
    /// enclosing selects are forbidden and SELECT temporaries are hidden.
    fn check_aggregate_call(&mut self, pos: Position, function: SymbolId, args: Vec<ExprId>) -> Vec<ExprId> {
        let name = self.symbol_name(function);
        let allowed = self.checker.selects.last().is_some_and(|frame| frame.aggregates_allowed);
        if !allowed {
            self.report(pos, ErrorKind::AggregateOutsideSelect { function: name });
            return self.check_call_args(pos, function, args);
        }
        if self.checker.aggregate_of.is_some() {
            self.report(pos, ErrorKind::NestedAggregate);
            return self.check_call_args(pos, function, args);
        }
        let is_count = self
            .coder
            .symbols
            .function(function)
            .is_some_and(|def| def.flags.contains(FunctionFlags::IS_COUNT));

        let owner = self.checker.selects.len() - 1;
        let saved_inaccessible = self.checker.inaccessible_outside_aggregate.clone();
        let saved_forbidden = std::mem::take(&mut self.checker.forbidden_in_inner_select);
        let saved_temporaries = std::mem::take(&mut self.checker.temporaries_in_aggregate);

        self.checker.aggregate_of = Some(owner);
        for (depth, frame) in self.checker.selects.iter().enumerate() {
            self.checker.temporaries_in_aggregate.extend(frame.temporaries.iter().copied());
            if depth == owner {
                for row in &frame.rows {
                    self.checker.inaccessible_outside_aggregate.remove(row);
                }
            } else {
                self.checker.forbidden_in_inner_select.extend(frame.rows.iter().copied());
            }
        }

        let args = if is_count && args.is_empty() {
            args
        } else {
            self.check_call_args(pos, function, args)
        };

        self.checker.temporaries_in_aggregate = saved_temporaries;
        self.checker.forbidden_in_inner_select = saved_forbidden;
        self.checker.inaccessible_outside_aggregate = saved_inaccessible;
        self.checker.aggregate_of = None;
        args
    }
}
