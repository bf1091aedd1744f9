//! Types assigned to expressions by the type checker.

use hare_value::VariableType;
use la_arena::ArenaMap;

use crate::ExprId;

/// Map from expression to its checked type. An expression that has an
/// entry has been checked; the checker never visits it again.
#[derive(Debug, Default)]
pub struct TypeTable {
    types: ArenaMap<ExprId, VariableType>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, expr: ExprId) -> Option<VariableType> {
        self.types.get(expr).copied()
    }

    pub fn set(&mut self, expr: ExprId, ty: VariableType) {
        self.types.insert(expr, ty);
    }

    pub fn contains(&self, expr: ExprId) -> bool {
        self.types.get(expr).is_some()
    }

    /// Type of an expression the checker has already visited.
    pub fn expect(&self, expr: ExprId) -> VariableType {
        match self.get(expr) {
            Some(ty) => ty,
            None => hare_common::ice!("expression {expr:?} has no type"),
        }
    }
}
