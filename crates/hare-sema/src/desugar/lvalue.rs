//! Deep lvalue stores.
//!
//! `a.b[i] := v` has no instruction of its own. Without object layers the
//! chain is rebuilt from the inside out: each layer reads its element into
//! a temporary, the operation is applied to the innermost one, and every
//! layer writes its updated element back with a modify or cell-update.
//!
//! An object layer ends the value semantics: the object reference up to
//! the last object layer is evaluated once, its member is read once (it
//! may be a property with a getter), the rest of the chain is rebuilt on
//! that value, and the result is stored with `:OBJECTMEMBERSET`.

use hare_ast::{
    ConvertedLvalue, DeepOp, DeepOperation, ExprId, ExprKind, LayerKind, LvalueLayer, StmtId, StmtKind, SymbolId,
    TreeBuilder,
};
use hare_common::{ice, Position};
use hare_value::{builtins, VariableType};
use tracing::debug;

use crate::Sema;

impl Sema {
    /// `layer_types[i]` is the static type of the value `layers[i]`
    /// selects, VARIANT where it is only known at runtime.
    pub(crate) fn desugar_deep_operation(&mut self, stmt: StmtId, deep: &DeepOperation, layer_types: &[VariableType]) {
        let pos = self.coder.ast.stmt(stmt).pos;
        let lvalue = &deep.lvalue;
        debug!(%pos, layers = lvalue.layers.len(), "rewriting deep lvalue operation");

        let end_sites: Vec<Vec<ExprId>> = lvalue
            .layers
            .iter()
            .map(|layer| match layer.kind {
                LayerKind::Array { index } => self.end_sites(index),
                _ => Vec::new(),
            })
            .collect();
        let op_end_sites = match &deep.op {
            DeepOp::ArrayInsert { index, .. } | DeepOp::ArrayDelete { index } => self.end_sites(*index),
            _ => Vec::new(),
        };
        let chain = Chain {
            types: layer_types,
            end_sites: &end_sites,
            op: &deep.op,
            op_end_sites: &op_end_sites,
        };

        let block = self.coder.new_block(pos);
        self.coder.scoped(block, |c| match lvalue.last_object_layer() {
            None => {
                let Some(base) = lvalue.base_var else {
                    ice!("lvalue at {pos} has an expression base but no object layer");
                };
                let updated = chain.rebuild(c, pos, base, &lvalue.layers, 0);
                c.emit_assign(pos, base, updated);
            }
            Some(object_layer) => extract_object_layer(c, pos, lvalue, object_layer, &chain),
        });
        self.coder.ast.replace_stmt(stmt, StmtKind::Block(block));
    }
}

/// Store through the object member at `layers[object_layer]`.
fn extract_object_layer(
    c: &mut TreeBuilder,
    pos: Position,
    lvalue: &ConvertedLvalue,
    object_layer: usize,
    chain: &Chain<'_>,
) {
    let calc_block = match c.current_block() {
        Some(block) => block,
        None => ice!("deep lvalue rewrite at {pos} without an open block"),
    };
    // Evaluates the base expression, if any, exactly once.
    let prefix = ConvertedLvalue {
        layers: lvalue.layers[..=object_layer].to_vec(),
        ..lvalue.clone()
    };
    let base = c.materialize_lvalue(&prefix, calc_block, false).base;

    let object = if object_layer == 0 {
        base
    } else {
        let read = read_chain(c, base, &lvalue.layers[..object_layer]);
        c.emit_temporary(pos, VariableType::OBJECT, read)
    };

    let member = &lvalue.layers[object_layer];
    let LayerKind::Object { name, .. } = &member.kind else {
        ice!("layer {object_layer} of lvalue at {pos} is not an object layer");
    };
    let suffix = &lvalue.layers[object_layer + 1..];

    let value = match (suffix.is_empty(), chain.op) {
        (true, DeepOp::Set(value)) => *value,
        _ => {
            let member_lvalue = ConvertedLvalue::variable(pos, object, vec![member.clone()]);
            let read = c.materialize_lvalue(&member_lvalue, calc_block, true);
            let Some(current) = read.current else {
                ice!("member read of lvalue at {pos} was not materialized");
            };
            let old = c.emit_temporary(pos, chain.layer_type(object_layer), current);
            chain.rebuild(c, pos, old, suffix, object_layer + 1)
        }
    };
    let object_read = c.variable(pos, object);
    let member_name = c.string(member.pos, name);
    let store = c.call_builtin(pos, builtins::OBJECT_MEMBER_SET, vec![object_read, member_name, value]);
    c.emit_expr(pos, store);
}

/// Read a layer chain starting at variable `base`.
fn read_chain(c: &mut TreeBuilder, base: SymbolId, layers: &[LvalueLayer]) -> ExprId {
    let mut read = c.variable(layers.first().map_or_else(Position::default, |l| l.pos), base);
    for layer in layers {
        read = match &layer.kind {
            LayerKind::Array { index } => c.array_element(layer.pos, read, *index),
            LayerKind::Record { name } => c.record_column(layer.pos, read, name),
            LayerKind::Object { name, via_this, .. } => c.object_member(layer.pos, read, name, *via_this),
        };
    }
    read
}

/// The parts of a deep operation the rebuild needs: the static type and
/// END occurrences per layer, and the operation itself.
struct Chain<'a> {
    types: &'a [VariableType],
    end_sites: &'a [Vec<ExprId>],
    op: &'a DeepOp,
    op_end_sites: &'a [ExprId],
}

impl Chain<'_> {
    fn layer_type(&self, depth: usize) -> VariableType {
        self.types.get(depth).copied().unwrap_or(VariableType::VARIANT)
    }

    /// Build the new value of the variable `current` after applying the
    /// operation at the end of `layers`. `depth` is the position of
    /// `layers[0]` in the full chain. Element reads go into temporaries
    /// emitted in order, so every index is evaluated once, left to right.
    fn rebuild(&self, c: &mut TreeBuilder, pos: Position, current: SymbolId, layers: &[LvalueLayer], depth: usize) -> ExprId {
        let Some((layer, rest)) = layers.split_first() else {
            return self.apply(c, pos, current);
        };
        let skip_read = rest.is_empty() && matches!(self.op, DeepOp::Set(_));
        match &layer.kind {
            LayerKind::Array { index } => {
                substitute_end(c, layer.pos, current, &self.end_sites[depth]);
                let index = c.emit_temporary(layer.pos, VariableType::INTEGER, *index);
                let element = if skip_read {
                    None
                } else {
                    let list = c.variable(layer.pos, current);
                    let at = c.variable(layer.pos, index);
                    let read = c.array_element(layer.pos, list, at);
                    Some(c.emit_temporary(layer.pos, self.layer_type(depth), read))
                };
                let value = match element {
                    Some(element) => self.rebuild(c, pos, element, rest, depth + 1),
                    None => self.apply_set(),
                };
                let list = c.variable(layer.pos, current);
                let at = c.variable(layer.pos, index);
                c.expr(
                    layer.pos,
                    ExprKind::ArrayElementModify {
                        array: list,
                        index: at,
                        value,
                    },
                )
            }
            LayerKind::Record { name } => {
                let value = if skip_read {
                    self.apply_set()
                } else {
                    let record = c.variable(layer.pos, current);
                    let read = c.record_column(layer.pos, record, name);
                    let cell = c.emit_temporary(layer.pos, self.layer_type(depth), read);
                    self.rebuild(c, pos, cell, rest, depth + 1)
                };
                let record = c.variable(layer.pos, current);
                let cell_name = c.string(layer.pos, name);
                c.call_builtin(layer.pos, builtins::CELL_UPDATE, vec![record, cell_name, value])
            }
            LayerKind::Object { .. } => {
                ice!("object layer at {} inside a value chain", layer.pos)
            }
        }
    }

    fn apply_set(&self) -> ExprId {
        match self.op {
            DeepOp::Set(value) => *value,
            other => ice!("expected a plain store, found {other:?}"),
        }
    }

    /// The new value of `current` after the operation itself.
    fn apply(&self, c: &mut TreeBuilder, pos: Position, current: SymbolId) -> ExprId {
        let read = c.variable(pos, current);
        match self.op {
            DeepOp::Set(value) => *value,
            DeepOp::Compound { op, value } => c.binary(pos, *op, read, *value),
            DeepOp::ArrayInsert { index, value } => {
                substitute_end(c, pos, current, self.op_end_sites);
                c.call_builtin(pos, builtins::ARRAY_INSERT, vec![read, *index, *value])
            }
            DeepOp::ArrayDelete { index } => {
                substitute_end(c, pos, current, self.op_end_sites);
                c.call_builtin(pos, builtins::ARRAY_DELETE, vec![read, *index])
            }
            DeepOp::CellInsert { name, value } => {
                let cell_name = c.string(pos, name);
                c.call_builtin(pos, builtins::CELL_INSERT, vec![read, cell_name, *value])
            }
            DeepOp::CellDelete { name } => {
                let cell_name = c.string(pos, name);
                c.call_builtin(pos, builtins::CELL_DELETE, vec![read, cell_name])
            }
        }
    }
}

/// Replace END in an index by the length of the array in `list`,
/// computed once into a temporary.
fn substitute_end(c: &mut TreeBuilder, pos: Position, list: SymbolId, sites: &[ExprId]) {
    if sites.is_empty() {
        return;
    }
    let read = c.variable(pos, list);
    let length = c.call_builtin(pos, builtins::LENGTH, vec![read]);
    let len = c.emit_temporary(pos, VariableType::INTEGER, length);
    for site in sites {
        c.ast.replace_expr(*site, ExprKind::Variable(len));
    }
}
