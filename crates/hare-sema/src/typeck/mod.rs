//! Type checker.
//!
//! A single forward traversal that assigns a [`VariableType`] to every
//! rvalue. Visiting an rvalue that already has a type is a no-op, so the
//! desugarer can hand its output (which reuses checked subtrees) back to
//! the checker without anything being visited twice.
//!
//! Implicit conversions are made explicit: when a value of one type is
//! used where another is expected, the node is wrapped in a `Cast` in
//! place. A user error marks the node `VARIANT` and checking continues.

mod call;
mod expr;
mod sql;
mod stmt;

use hare_ast::{ExprKind, FunctionKind, SymbolId, SymbolKind};
use hare_common::{ice, ErrorKind};
use hare_value::cast::can_cast;
use hare_value::VariableType;
use rustc_hash::FxHashSet;
use tracing::{debug, instrument};

use crate::Sema;
use hare_ast::ExprId;

/// One SELECT being checked.
#[derive(Debug, Default)]
pub(crate) struct SelectFrame {
    pub rows: Vec<SymbolId>,
    pub temporaries: Vec<SymbolId>,
    /// `(row, COLUMN)` pairs listed in GROUP BY.
    pub group_keys: Vec<(SymbolId, String)>,
    /// Aggregate calls are legal in the clause being checked.
    pub aggregates_allowed: bool,
}

/// Mutable checker context. Saved and restored around functions, loops,
/// array indices, SQL expressions and aggregate calls.
#[derive(Debug, Default)]
pub(crate) struct CheckerState {
    pub loop_depth: u32,
    pub array_index_depth: u32,
    /// Non-zero inside SQL expressions, where YIELD and AWAIT are illegal.
    pub yield_forbid_counter: u32,
    pub selects: Vec<SelectFrame>,
    /// Index into `selects` of the select whose aggregate arguments are
    /// being checked.
    pub aggregate_of: Option<usize>,
    /// Row variables of grouped selects, usable outside an aggregate only
    /// through a grouping key.
    pub inaccessible_outside_aggregate: FxHashSet<SymbolId>,
    /// Row variables of the selects enclosing the one an aggregate belongs
    /// to.
    pub forbidden_in_inner_select: FxHashSet<SymbolId>,
    /// SELECT temporaries, which aggregate arguments may not use.
    pub temporaries_in_aggregate: FxHashSet<SymbolId>,
    /// The one expression allowed to be a function pointer rebind.
    pub rebind_target: Option<ExprId>,
}

impl Sema {
    /// Check an rvalue and return its type.
    pub fn check_expr(&mut self, expr: ExprId) -> VariableType {
        if let Some(ty) = self.types.get(expr) {
            return ty;
        }
        let rebind_allowed = self.checker.rebind_target.take() == Some(expr);
        let ty = self.infer_expr(expr, rebind_allowed);
        self.types.set(expr, ty);
        if self.options.fold_constants {
            self.fold_in_place(expr);
        }
        // Folding may refine a VARIANT result to the literal's own type.
        self.types.get(expr).unwrap_or(ty)
    }

    /// Check an rvalue that must have type `to`, inserting an implicit
    /// cast when needed. Returns the type the expression ends up with.
    pub fn coerce(&mut self, expr: ExprId, to: VariableType) -> VariableType {
        self.convert(expr, to, false)
    }

    /// As [`Sema::coerce`], for a call argument.
    pub(crate) fn coerce_param(&mut self, expr: ExprId, to: VariableType) -> VariableType {
        self.convert(expr, to, true)
    }

    fn convert(&mut self, expr: ExprId, to: VariableType, is_param: bool) -> VariableType {
        let from = self.check_expr(expr);
        if from == to || to.is_variant() {
            if from == VariableType::NO_RETURN {
                self.report_no_value(expr);
                return VariableType::VARIANT;
            }
            return from;
        }
        if from == VariableType::NO_RETURN {
            self.report_no_value(expr);
            return to;
        }
        if !can_cast(from, to, false) {
            let pos = self.pos(expr);
            self.report(
                pos,
                ErrorKind::CannotConvertType {
                    from: from.to_string(),
                    to: to.to_string(),
                },
            );
            return to;
        }
        self.insert_cast(expr, from, to, is_param);
        to
    }

    /// Wrap `expr` in an implicit cast. The original content keeps its
    /// type at its new index.
    fn insert_cast(&mut self, expr: ExprId, from: VariableType, to: VariableType, is_param: bool) {
        let inner = self.coder.ast.wrap_expr(expr, |inner| ExprKind::Cast {
            expr: inner,
            to,
            explicit: false,
            allow_param_cast: is_param,
        });
        self.types.set(inner, from);
        self.types.set(expr, to);
    }

    fn report_no_value(&mut self, expr: ExprId) {
        let function = match &self.coder.ast.expr(expr).kind {
            ExprKind::FunctionCall { function, .. } => self.symbol_name(*function),
            ExprKind::ObjectMethodCall { name, .. } => name.clone(),
            _ => "expression".to_string(),
        };
        let pos = self.pos(expr);
        self.report(pos, ErrorKind::MacroHasNoValue { function });
    }

    /// The common type two branches of `?:` or `??` unify to; casts are
    /// inserted so both end up with it.
    pub(crate) fn unify_branches(&mut self, left: ExprId, right: ExprId) -> VariableType {
        let l = self.check_expr(left);
        let r = self.check_expr(right);
        if l == r {
            return l;
        }
        if l.is_variant() || r.is_variant() {
            return VariableType::VARIANT;
        }
        match hare_value::ops::numeric_promotion(l, r) {
            Ok(Some(ty)) => {
                self.coerce(left, ty);
                self.coerce(right, ty);
                return ty;
            }
            Err(()) => {
                let pos = self.pos(right);
                self.report(pos, ErrorKind::MoneyInteger64Mix);
                return VariableType::VARIANT;
            }
            Ok(None) => {}
        }
        if can_cast(r, l, false) {
            self.coerce(right, l)
        } else if can_cast(l, r, false) {
            self.coerce(left, r)
        } else {
            let pos = self.pos(right);
            self.report(
                pos,
                ErrorKind::CannotConvertType {
                    from: r.to_string(),
                    to: l.to_string(),
                },
            );
            VariableType::VARIANT
        }
    }

    /// Check a symbol declared by the parser: constant initializers,
    /// member defaults and function bodies.
    pub fn check_declaration(&mut self, symbol: SymbolId) {
        match self.coder.symbols.get(symbol).kind.clone() {
            SymbolKind::Variable(def) => {
                if let Some(value) = def.constant_value {
                    self.check_constant(value, def.ty);
                }
            }
            SymbolKind::Function(_) => self.check_function(symbol),
            SymbolKind::ObjectType(def) => {
                let mut fields: Vec<_> = def.fields.into_values().collect();
                fields.sort_by(|a, b| a.name.cmp(&b.name));
                for field in fields {
                    if let Some(default) = field.default {
                        self.check_constant(default, field.ty);
                    }
                    if let Some(method) = field.method {
                        self.check_function(method);
                    }
                }
            }
        }
    }

    /// An expression that must fold to a literal of type `ty`.
    pub(crate) fn check_constant(&mut self, expr: ExprId, ty: VariableType) {
        let mark = self.error_mark();
        self.coerce(expr, ty);
        self.force_optimize(expr, mark);
    }

    /// Check a function body. External functions have none.
    #[instrument(level = "debug", skip(self), fields(name = %self.coder.symbols.name(function)))]
    pub fn check_function(&mut self, function: SymbolId) {
        let Some(def) = self.coder.symbols.function(function).cloned() else {
            ice!("check_function on non-function {}", self.symbol_name(function));
        };
        for param in &def.params {
            if let Some(default) = param.default {
                self.check_constant(default, param.ty);
            }
        }
        let Some(body) = def.body else {
            return;
        };
        debug!(kind = ?def.kind, "checking function body");

        self.coder.open_function(function, body);
        let saved_loop = std::mem::take(&mut self.checker.loop_depth);
        let saved_generator = self.sugar_generator();
        if def.kind != FunctionKind::Normal {
            self.prepare_generator_body(function, body);
        } else {
            self.set_sugar_generator(None);
        }

        self.check_block(body);

        self.set_sugar_generator(saved_generator);
        self.checker.loop_depth = saved_loop;
        self.coder.close_function();
    }

    /// Kind of the function being checked; the module body counts as a
    /// normal macro.
    pub(crate) fn current_function_kind(&self) -> FunctionKind {
        self.coder
            .current_function()
            .and_then(|f| self.coder.symbols.function(f))
            .map_or(FunctionKind::Normal, |def| def.kind)
    }

    pub(crate) fn current_return_type(&self) -> VariableType {
        self.coder
            .current_function()
            .and_then(|f| self.coder.symbols.function(f))
            .map_or(VariableType::NO_RETURN, |def| def.returns)
    }

    /// Static object type of an expression, when it is known at compile
    /// time.
    pub(crate) fn static_object_type(&self, expr: ExprId) -> Option<SymbolId> {
        match &self.coder.ast.expr(expr).kind {
            ExprKind::Variable(symbol) => self.coder.symbols.variable(*symbol)?.object_type,
            ExprKind::ObjectNew { object_type, .. } => Some(*object_type),
            ExprKind::Cast { expr, .. } => self.static_object_type(*expr),
            _ => None,
        }
    }

    pub(crate) fn object_is_static(&self, object_type: SymbolId) -> bool {
        self.coder.symbols.object_type(object_type).is_some_and(|def| def.is_static)
    }
}
