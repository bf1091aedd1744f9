//! Render a tree as HareScript-like text, for tests and debug logs.
//!
//! The output is not meant to be parsed back. Generated variables appear
//! under their internal `:t<n>` names; implicit casts are shown as
//! `CAST(x AS T)` and explicit ones as `(x AS T)`.

use std::fmt::Write;

use crate::expr::{ExprKind, RecordEntry};
use crate::lvalue::LayerKind;
use crate::stmt::{DeepOp, StmtKind};
use crate::symbols::SymbolTable;
use crate::{Ast, BlockId, ExprId, StmtId};

pub fn block(ast: &Ast, symbols: &SymbolTable, id: BlockId) -> String {
    let mut printer = Printer::new(ast, symbols);
    for stmt in &ast.block(id).statements {
        printer.stmt(*stmt);
    }
    printer.out
}

pub fn stmt(ast: &Ast, symbols: &SymbolTable, id: StmtId) -> String {
    let mut printer = Printer::new(ast, symbols);
    printer.stmt(id);
    printer.out
}

pub fn expr(ast: &Ast, symbols: &SymbolTable, id: ExprId) -> String {
    Printer::new(ast, symbols).expr(id)
}

struct Printer<'a> {
    ast: &'a Ast,
    symbols: &'a SymbolTable,
    out: String,
    indent: usize,
}

impl<'a> Printer<'a> {
    fn new(ast: &'a Ast, symbols: &'a SymbolTable) -> Self {
        Self {
            ast,
            symbols,
            out: String::new(),
            indent: 0,
        }
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn open(&mut self) {
        self.line("{");
        self.indent += 1;
    }

    fn close(&mut self) {
        self.indent -= 1;
        self.line("}");
    }

    fn block_body(&mut self, id: BlockId) {
        let ast = self.ast;
        self.open();
        for stmt in &ast.block(id).statements {
            self.stmt(*stmt);
        }
        self.close();
    }

    /// A nested statement: blocks print their braces on their own lines.
    fn body(&mut self, id: StmtId) {
        let ast = self.ast;
        match &ast.stmt(id).kind {
            StmtKind::Block(block) => self.block_body(*block),
            _ => {
                self.indent += 1;
                self.stmt(id);
                self.indent -= 1;
            }
        }
    }

    fn name(&self, symbol: crate::SymbolId) -> String {
        self.symbols.name(symbol).to_string()
    }

    /// A simple statement without its trailing `;`, for FOR headers.
    fn inline_stmt(&mut self, id: StmtId) -> String {
        let ast = self.ast;
        match &ast.stmt(id).kind {
            StmtKind::Assign { target, value } => format!("{} := {}", self.name(*target), self.expr(*value)),
            StmtKind::SingleExpression { expr } => self.expr(*expr),
            other => other.name().to_string(),
        }
    }

    fn stmt(&mut self, id: StmtId) {
        let ast = self.ast;
        match &ast.stmt(id).kind {
            StmtKind::Block(block) => self.block_body(*block),
            StmtKind::If {
                condition,
                then,
                otherwise,
            } => {
                let header = format!("IF ({})", self.expr(*condition));
                self.line(&header);
                self.body(*then);
                if let Some(otherwise) = otherwise {
                    self.line("ELSE");
                    self.body(*otherwise);
                }
            }
            StmtKind::For {
                init,
                condition,
                step,
                body,
            } => {
                let init = init.map(|s| self.inline_stmt(s)).unwrap_or_default();
                let condition = condition.map(|c| self.expr(c)).unwrap_or_default();
                let step = step.map(|s| self.inline_stmt(s)).unwrap_or_default();
                self.line(&format!("FOR ({init}; {condition}; {step})"));
                self.body(*body);
            }
            StmtKind::ForEvery {
                variable,
                source,
                body,
                ..
            } => {
                let header = format!("FOREVERY ({} FROM {})", self.name(*variable), self.expr(*source));
                self.line(&header);
                self.body(*body);
            }
            StmtKind::Break => self.line("BREAK;"),
            StmtKind::Continue => self.line("CONTINUE;"),
            StmtKind::Return { value: None } => self.line("RETURN;"),
            StmtKind::Return { value: Some(value) } => {
                let text = format!("RETURN {};", self.expr(*value));
                self.line(&text);
            }
            StmtKind::Switch(switch) => {
                let header = format!("SWITCH ({})", self.expr(switch.value));
                self.line(&header);
                self.open();
                for case in &switch.cases {
                    let labels: Vec<String> = case.labels.iter().map(|l| self.expr(*l)).collect();
                    self.line(&format!("CASE {}", labels.join(", ")));
                    self.block_body(case.block);
                }
                if let Some(default) = switch.default {
                    self.line("DEFAULT");
                    self.block_body(default);
                }
                self.close();
            }
            StmtKind::TryCatch {
                try_block,
                exception,
                catch_block,
            } => {
                self.line("TRY");
                self.block_body(*try_block);
                let header = match exception {
                    Some(e) => format!("CATCH ({})", self.name(*e)),
                    None => "CATCH".to_string(),
                };
                self.line(&header);
                self.block_body(*catch_block);
            }
            StmtKind::TryFinally {
                try_block,
                finally_block,
            } => {
                self.line("TRY");
                self.block_body(*try_block);
                self.line("FINALLY");
                self.block_body(*finally_block);
            }
            StmtKind::Throw { value } => {
                let text = format!("THROW {};", self.expr(*value));
                self.line(&text);
            }
            StmtKind::SingleExpression { expr } => {
                let text = format!("{};", self.expr(*expr));
                self.line(&text);
            }
            StmtKind::Assign { target, value } => {
                let text = format!("{} := {};", self.name(*target), self.expr(*value));
                self.line(&text);
            }
            StmtKind::Initialize { variable } => {
                let text = format!("{} := DEFAULT;", self.name(*variable));
                self.line(&text);
            }
            StmtKind::DeepOperation(deep) => {
                let mut target = match (deep.lvalue.base_var, deep.lvalue.base_expr) {
                    (Some(var), _) => self.name(var),
                    (None, Some(expr)) => self.expr(expr),
                    (None, None) => "?".to_string(),
                };
                for layer in &deep.lvalue.layers {
                    match &layer.kind {
                        LayerKind::Array { index } => {
                            let index = self.expr(*index);
                            let _ = write!(target, "[{index}]");
                        }
                        LayerKind::Record { name } => {
                            let _ = write!(target, ".{}", name.to_ascii_lowercase());
                        }
                        LayerKind::Object { name, .. } => {
                            let _ = write!(target, "->{}", name.to_ascii_lowercase());
                        }
                    }
                }
                let text = match &deep.op {
                    DeepOp::Set(value) => format!("{target} := {};", self.expr(*value)),
                    DeepOp::Compound { op, value } => format!("{target} {}= {};", op.symbol(), self.expr(*value)),
                    DeepOp::ArrayInsert { index, value } => {
                        format!("INSERT {} INTO {target} AT {};", self.expr(*value), self.expr(*index))
                    }
                    DeepOp::ArrayDelete { index } => format!("DELETE FROM {target} AT {};", self.expr(*index)),
                    DeepOp::CellInsert { name, value } => {
                        format!("INSERT CELL {} := {} INTO {target};", name.to_ascii_lowercase(), self.expr(*value))
                    }
                    DeepOp::CellDelete { name } => format!("DELETE CELL {} FROM {target};", name.to_ascii_lowercase()),
                };
                self.line(&text);
            }
            StmtKind::SqlInsert { target, row } => {
                let text = format!("INSERT {} INTO {};", self.expr(*row), self.expr(*target));
                self.line(&text);
            }
            StmtKind::SqlUpdate {
                source,
                set,
                condition,
            } => {
                let sets: Vec<String> = set
                    .iter()
                    .map(|(name, value)| format!("{} := {}", name.to_ascii_lowercase(), self.expr(*value)))
                    .collect();
                let mut text = format!("UPDATE {} SET {}", self.expr(source.source), sets.join(", "));
                if let Some(condition) = condition {
                    let _ = write!(text, " WHERE {}", self.expr(*condition));
                }
                text.push(';');
                self.line(&text);
            }
            StmtKind::SqlDelete { source, condition } => {
                let mut text = format!("DELETE FROM {}", self.expr(source.source));
                if let Some(condition) = condition {
                    let _ = write!(text, " WHERE {}", self.expr(*condition));
                }
                text.push(';');
                self.line(&text);
            }
        }
    }

    fn list(&mut self, ids: &[ExprId]) -> String {
        ids.iter().map(|id| self.expr(*id)).collect::<Vec<_>>().join(", ")
    }

    /// Operands that are themselves operators get parentheses.
    fn operand(&mut self, id: ExprId) -> String {
        let text = self.expr(id);
        match self.ast.expr(id).kind {
            ExprKind::BinaryOperator { .. } | ExprKind::ConditionalOperator { .. } => format!("({text})"),
            _ => text,
        }
    }

    fn expr(&mut self, id: ExprId) -> String {
        let ast = self.ast;
        match &ast.expr(id).kind {
            ExprKind::Constant(value) => value.to_string(),
            ExprKind::Variable(symbol) => self.name(*symbol),
            ExprKind::BinaryOperator { op, lhs, rhs } => {
                format!("{} {} {}", self.operand(*lhs), op.symbol(), self.operand(*rhs))
            }
            ExprKind::UnaryOperator { op, operand } => format!("{}{}", op.symbol(), self.operand(*operand)),
            ExprKind::Cast {
                expr,
                to,
                explicit: true,
                ..
            } => format!("({} AS {to})", self.expr(*expr)),
            ExprKind::Cast { expr, to, .. } => format!("CAST({} AS {to})", self.expr(*expr)),
            ExprKind::ConditionalOperator {
                condition,
                then,
                otherwise,
            } => format!(
                "{} ? {} : {}",
                self.operand(*condition),
                self.operand(*then),
                self.operand(*otherwise)
            ),
            ExprKind::ArrayElementConst { array, index } => {
                format!("{}[{}]", self.operand(*array), self.expr(*index))
            }
            ExprKind::ArrayElementModify { array, index, value } => format!(
                "MODIFY({}[{}] := {})",
                self.expr(*array),
                self.expr(*index),
                self.expr(*value)
            ),
            ExprKind::RecordColumnConst { record, name } => {
                format!("{}.{}", self.operand(*record), name.to_ascii_lowercase())
            }
            ExprKind::ObjectMemberConst { object, name, .. } => {
                format!("{}->{}", self.operand(*object), name.to_ascii_lowercase())
            }
            ExprKind::ObjectMethodCall { object, name, args, .. } => format!(
                "{}->{}({})",
                self.operand(*object),
                name.to_ascii_lowercase(),
                self.list(args)
            ),
            ExprKind::ObjectNew { object_type, args } => {
                format!("NEW {}({})", self.name(*object_type), self.list(args))
            }
            ExprKind::FunctionCall { function, args } => format!("{}({})", self.name(*function), self.list(args)),
            ExprKind::FunctionPtr { function, bindings } => match bindings {
                None => format!("PTR {}", self.name(*function)),
                Some(bindings) => {
                    let slots: Vec<String> = bindings
                        .iter()
                        .map(|b| match b.bound {
                            Some(value) => self.expr(value),
                            None => format!("#{}", b.passthrough),
                        })
                        .collect();
                    format!("PTR {}({})", self.name(*function), slots.join(", "))
                }
            },
            ExprKind::FunctionPtrCall { ptr, args } => format!("{}({})", self.operand(*ptr), self.list(args)),
            ExprKind::FunctionPtrRebind { ptr, bindings } => {
                let slots: Vec<String> = bindings
                    .iter()
                    .map(|b| match b.bound {
                        Some(value) => self.expr(value),
                        None => format!("#{}", b.passthrough),
                    })
                    .collect();
                format!("PTR {}({})", self.operand(*ptr), slots.join(", "))
            }
            ExprKind::Yield { value, star: false } => format!("YIELD {}", self.expr(*value)),
            ExprKind::Yield { value, star: true } => format!("YIELD* {}", self.expr(*value)),
            ExprKind::Await { value } => format!("AWAIT {}", self.expr(*value)),
            ExprKind::ConstantRecord { entries } => {
                let cells: Vec<String> = entries
                    .iter()
                    .map(|entry| match entry {
                        RecordEntry::Set { name, value } => {
                            format!("{} := {}", name.to_ascii_lowercase(), self.expr(*value))
                        }
                        RecordEntry::Spread(value) => format!("...{}", self.expr(*value)),
                        RecordEntry::Delete { name, .. } => format!("DELETE {}", name.to_ascii_lowercase()),
                    })
                    .collect();
                format!("[{}]", cells.join(", "))
            }
            ExprKind::ConstantArray { element, entries } => {
                let items: Vec<String> = entries
                    .iter()
                    .map(|entry| {
                        let text = self.expr(entry.value);
                        if entry.spread {
                            format!("...{text}")
                        } else {
                            text
                        }
                    })
                    .collect();
                match element {
                    Some(element) => format!("{element} ARRAY[{}]", items.join(", ")),
                    None => format!("[{}]", items.join(", ")),
                }
            }
            ExprKind::ExpressionBlock { block, result } => {
                // Nested statements are rendered on separate lines at the
                // current depth, then the whole group is inlined.
                let mut inner = Printer::new(self.ast, self.symbols);
                inner.indent = self.indent + 1;
                for stmt in &ast.block(*block).statements {
                    inner.stmt(*stmt);
                }
                let pad = "  ".repeat(self.indent);
                format!("{{\n{}{pad}}} => {}", inner.out, self.name(*result))
            }
            ExprKind::TypeInfo { ty } => format!("TYPEID({ty})"),
            ExprKind::End => "END".to_string(),
            ExprKind::SqlSelect(select) => {
                let mut text = String::from("SELECT ");
                let columns: Vec<String> = select
                    .columns
                    .iter()
                    .map(|c| format!("{} := {}", c.name.to_ascii_lowercase(), self.expr(c.value)))
                    .collect();
                text.push_str(&columns.join(", "));
                let sources: Vec<String> = select
                    .sources
                    .iter()
                    .map(|s| format!("{} AS {}", self.expr(s.source), self.name(s.row)))
                    .collect();
                let _ = write!(text, " FROM {}", sources.join(", "));
                if let Some(condition) = select.condition {
                    let _ = write!(text, " WHERE {}", self.expr(condition));
                }
                if !select.group_by.is_empty() {
                    let _ = write!(text, " GROUP BY {}", self.list(&select.group_by));
                }
                if let Some(having) = select.having {
                    let _ = write!(text, " HAVING {}", self.expr(having));
                }
                text
            }
        }
    }
}
