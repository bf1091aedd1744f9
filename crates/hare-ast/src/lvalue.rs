//! Flattened assignment targets.
//!
//! The parser turns a nested target such as `f()->list[i].name` into a base
//! plus an ordered list of layers, outermost first. The base is either a
//! variable or, when the chain starts at an arbitrary expression, that
//! expression; the latter is only legal when the first layer accesses an
//! object member, since assigning into a temporary record or array would
//! have no effect.

use hare_common::Position;

use crate::{ExprId, SymbolId};

#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedLvalue {
    pub pos: Position,
    pub base_var: Option<SymbolId>,
    pub base_expr: Option<ExprId>,
    pub first_layer_is_objectref: bool,
    pub layers: Vec<LvalueLayer>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LvalueLayer {
    pub pos: Position,
    pub kind: LayerKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayerKind {
    Array { index: ExprId },
    Record { name: String },
    /// `is_property` is settled by the type checker once the object type
    /// is known; properties are only reachable through their setter.
    Object {
        name: String,
        via_this: bool,
        is_property: bool,
    },
}

impl ConvertedLvalue {
    pub fn variable(pos: Position, base: SymbolId, layers: Vec<LvalueLayer>) -> Self {
        let first_layer_is_objectref = matches!(layers.first(), Some(LvalueLayer { kind: LayerKind::Object { .. }, .. }));
        Self {
            pos,
            base_var: Some(base),
            base_expr: None,
            first_layer_is_objectref,
            layers,
        }
    }

    /// A chain rooted at an expression. Returns `None` unless the first
    /// layer is an object member access.
    pub fn expression(pos: Position, base: ExprId, layers: Vec<LvalueLayer>) -> Option<Self> {
        match layers.first() {
            Some(LvalueLayer {
                kind: LayerKind::Object { .. },
                ..
            }) => Some(Self {
                pos,
                base_var: None,
                base_expr: Some(base),
                first_layer_is_objectref: true,
                layers,
            }),
            _ => None,
        }
    }

    /// Index of the innermost object member layer.
    pub fn last_object_layer(&self) -> Option<usize> {
        self.layers.iter().rposition(|layer| matches!(layer.kind, LayerKind::Object { .. }))
    }
}

impl LvalueLayer {
    pub fn array(pos: Position, index: ExprId) -> Self {
        Self {
            pos,
            kind: LayerKind::Array { index },
        }
    }

    pub fn record(pos: Position, name: impl Into<String>) -> Self {
        Self {
            pos,
            kind: LayerKind::Record { name: name.into() },
        }
    }

    pub fn member(pos: Position, name: impl Into<String>) -> Self {
        Self {
            pos,
            kind: LayerKind::Object {
                name: name.into(),
                via_this: false,
                is_property: false,
            },
        }
    }
}
