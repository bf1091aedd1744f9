//! Generator and async function bodies.
//!
//! Such a body runs against a hidden generator object created on entry.
//! YIELD hands a value to it through `:YIELD` and gets back a
//! `[type, value]` record saying how the consumer resumed: `0` with a
//! value to continue, `1` with an exception to throw, `2` with a value to
//! return. AWAIT goes through `SENDAWAIT`, whose record only asks for an
//! early exit when `yieldvalue` is set.

use hare_ast::{BlockId, ExprId, ExprKind, StmtKind, SymbolId, SymbolKind, TreeBuilder, VariableDef, GENERATOR_TYPE};
use hare_common::{ice, Position};
use hare_value::{builtins, BinaryOp, Record, Value, VariableType};
use tracing::debug;

use crate::Sema;

/// How the consumer resumed a generator.
const RESUME_THROW: i32 = 1;
const RESUME_RETURN: i32 = 2;

impl Sema {
    /// Allocate the generator variable of `function` and create the
    /// generator object as the first statement of `body`.
    pub(crate) fn prepare_generator_body(&mut self, function: SymbolId, body: BlockId) {
        let pos = self.coder.symbols.get(function).pos;
        let Some(generator_type) = self.coder.symbols.builtin(GENERATOR_TYPE) else {
            ice!("symbol table has no {GENERATOR_TYPE} type");
        };
        let def = VariableDef {
            object_type: Some(generator_type),
            is_temporary: true,
            ..VariableDef::new(VariableType::OBJECT)
        };
        let generator = self.coder.symbols.alloc(":generator", pos, SymbolKind::Variable(def));
        debug!(function = %self.coder.symbols.name(function), "generator body");

        let create = self.coder.expr(
            pos,
            ExprKind::ObjectNew {
                object_type: generator_type,
                args: Vec::new(),
            },
        );
        let init = self.coder.assign(pos, generator, create);
        self.coder.ast.block_mut(body).statements.insert(0, init);
        self.set_sugar_generator(Some(generator));
    }

    fn generator_or_ice(&self, pos: Position) -> SymbolId {
        match self.sugar_generator() {
            Some(generator) => generator,
            None => ice!("generator operation at {pos} outside a generator body"),
        }
    }

    /// ```text
    /// res := :YIELD(G, value)
    /// IF (res.type != 0) { IF (res.type = 1) THROW res.value; ELSE RETURN G->RETURNVALUE(res.value); }
    /// => res.value
    /// ```
    pub(crate) fn desugar_yield(&mut self, expr: ExprId, value: ExprId) {
        let pos = self.pos(expr);
        let generator = self.generator_or_ice(pos);
        debug!(%pos, "rewriting YIELD");
        let block = self.coder.new_block(pos);
        let result = self.coder.scoped(block, |c| {
            let object = c.variable(pos, generator);
            let resumed = c.call_builtin(pos, builtins::YIELD, vec![object, value]);
            let response = c.emit_temporary(pos, VariableType::RECORD, resumed);

            let kind = cell(c, pos, response, "TYPE");
            let zero = c.integer(pos, 0);
            let interrupted = c.binary(pos, BinaryOp::Unequal, kind, zero);
            c.emit_if(pos, interrupted, |c| emit_resume_exit(c, pos, generator, response));

            let sent = cell(c, pos, response, "VALUE");
            c.emit_temporary(pos, VariableType::VARIANT, sent)
        });
        self.coder
            .ast
            .replace_expr(expr, ExprKind::ExpressionBlock { block, result });
    }

    /// ```text
    /// res := G->SENDAWAIT(value)
    /// IF (res.yieldvalue) { <exit as for YIELD> }
    /// => res.value
    /// ```
    pub(crate) fn desugar_await(&mut self, expr: ExprId, value: ExprId) {
        let pos = self.pos(expr);
        let generator = self.generator_or_ice(pos);
        debug!(%pos, "rewriting AWAIT");
        let block = self.coder.new_block(pos);
        let result = self.coder.scoped(block, |c| {
            let object = c.variable(pos, generator);
            let resumed = c.method_call(pos, object, "SENDAWAIT", vec![value]);
            let response = c.emit_temporary(pos, VariableType::RECORD, resumed);

            let exit = cell(c, pos, response, "YIELDVALUE");
            c.emit_if(pos, exit, |c| emit_resume_exit(c, pos, generator, response));

            let sent = cell(c, pos, response, "VALUE");
            c.emit_temporary(pos, VariableType::VARIANT, sent)
        });
        self.coder
            .ast
            .replace_expr(expr, ExprKind::ExpressionBlock { block, result });
    }

    /// `YIELD * it` forwards every step of the inner generator to the
    /// consumer, and every resume of the consumer back to the inner
    /// generator, until the inner one is done. Its final value is the
    /// value of the expression.
    ///
    /// ```text
    /// it := value; mode := 0; input := DEFAULT RECORD;
    /// FOR (;;) {
    ///   step := mode = 1 ? it->SENDTHROW(input) : mode = 2 ? it->SENDRETURN(input) : it->NEXT(input);
    ///   IF (step.done) BREAK;
    ///   res := :YIELD(G, step.value); mode := res.type; input := res.value;
    /// }
    /// IF (mode = 2) RETURN G->RETURNVALUE(step.value);
    /// => step.value
    /// ```
    pub(crate) fn desugar_yield_star(&mut self, expr: ExprId, value: ExprId) {
        let pos = self.pos(expr);
        let generator = self.generator_or_ice(pos);
        debug!(%pos, "rewriting YIELD *");
        let block = self.coder.new_block(pos);
        let result = self.coder.scoped(block, |c| {
            let inner = c.emit_temporary(pos, VariableType::OBJECT, value);
            let zero = c.integer(pos, 0);
            let mode = c.emit_temporary(pos, VariableType::INTEGER, zero);
            let nothing = c.constant(pos, Value::Record(Record::non_existing()));
            let input = c.emit_temporary(pos, VariableType::VARIANT, nothing);
            let step = c.temporary(pos, VariableType::RECORD);

            let loop_block = c.new_block(pos);
            c.scoped(loop_block, |c| {
                let throw = mode_is(c, pos, mode, RESUME_THROW);
                c.emit_if_else(
                    pos,
                    throw,
                    |c| emit_step(c, pos, inner, "SENDTHROW", input, step),
                    |c| {
                        let ret = mode_is(c, pos, mode, RESUME_RETURN);
                        c.emit_if_else(
                            pos,
                            ret,
                            |c| emit_step(c, pos, inner, "SENDRETURN", input, step),
                            |c| emit_step(c, pos, inner, "NEXT", input, step),
                        );
                    },
                );
                let done = cell(c, pos, step, "DONE");
                c.emit_if(pos, done, |c| {
                    c.emit_stmt(pos, StmtKind::Break);
                });

                let object = c.variable(pos, generator);
                let produced = cell(c, pos, step, "VALUE");
                let resumed = c.call_builtin(pos, builtins::YIELD, vec![object, produced]);
                let response = c.emit_temporary(pos, VariableType::RECORD, resumed);
                let kind = cell(c, pos, response, "TYPE");
                c.emit_assign(pos, mode, kind);
                let sent = cell(c, pos, response, "VALUE");
                c.emit_assign(pos, input, sent);
            });
            let body = c.block_stmt(pos, loop_block);
            c.emit_stmt(
                pos,
                StmtKind::For {
                    init: None,
                    condition: None,
                    step: None,
                    body,
                },
            );

            let ret = mode_is(c, pos, mode, RESUME_RETURN);
            c.emit_if(pos, ret, |c| {
                let last = cell(c, pos, step, "VALUE");
                emit_generator_return(c, pos, generator, last);
            });
            let last = cell(c, pos, step, "VALUE");
            c.emit_temporary(pos, VariableType::VARIANT, last)
        });
        self.coder
            .ast
            .replace_expr(expr, ExprKind::ExpressionBlock { block, result });
    }
}

fn cell(c: &mut TreeBuilder, pos: Position, record: SymbolId, name: &str) -> ExprId {
    let read = c.variable(pos, record);
    c.record_column(pos, read, name)
}

fn mode_is(c: &mut TreeBuilder, pos: Position, mode: SymbolId, value: i32) -> ExprId {
    let read = c.variable(pos, mode);
    let expected = c.integer(pos, value);
    c.binary(pos, BinaryOp::Equal, read, expected)
}

/// `step := inner->method(input)`
fn emit_step(c: &mut TreeBuilder, pos: Position, inner: SymbolId, method: &str, input: SymbolId, step: SymbolId) {
    let object = c.variable(pos, inner);
    let arg = c.variable(pos, input);
    let call = c.method_call(pos, object, method, vec![arg]);
    c.emit_assign(pos, step, call);
}

/// Leave the body the way the consumer asked: throw the exception it
/// sent, or return the value it sent.
fn emit_resume_exit(c: &mut TreeBuilder, pos: Position, generator: SymbolId, response: SymbolId) {
    let kind = cell(c, pos, response, "TYPE");
    let throw = c.integer(pos, RESUME_THROW);
    let is_throw = c.binary(pos, BinaryOp::Equal, kind, throw);
    c.emit_if_else(
        pos,
        is_throw,
        |c| {
            let exception = cell(c, pos, response, "VALUE");
            c.emit_stmt(pos, StmtKind::Throw { value: exception });
        },
        |c| {
            let value = cell(c, pos, response, "VALUE");
            emit_generator_return(c, pos, generator, value);
        },
    );
}

fn emit_generator_return(c: &mut TreeBuilder, pos: Position, generator: SymbolId, value: ExprId) {
    let object = c.variable(pos, generator);
    let wrapped = c.method_call(pos, object, "RETURNVALUE", vec![value]);
    c.emit_stmt(pos, StmtKind::Return { value: Some(wrapped) });
}
