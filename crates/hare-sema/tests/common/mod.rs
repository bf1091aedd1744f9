//! Shared helpers for the hare-sema integration tests: building small
//! programs, checking them, and running the result on a tiny reference
//! machine that executes the primitive statement subset.

#![allow(dead_code)]

use hare_ast::{
    dump, Ast, BlockId, ExprId, ExprKind, FunctionDef, FunctionFlags, Parameter, StmtId, StmtKind, SymbolId,
    SymbolTable, TreeBuilder,
};
use hare_common::{Diagnostic, Position};
use hare_sema::{CompileOptions, Sema};
use hare_value::{builtins, cast, ops, Array, BinaryOp, Record, Value, VariableType};
use rustc_hash::FxHashMap;

// ── Helpers ────────────────────────────────────────────────────────────

pub fn pos() -> Position {
    Position::new(1, 1)
}

pub fn at(line: u32) -> Position {
    Position::new(line, 1)
}

/// A module body under construction.
pub struct Program {
    pub coder: TreeBuilder,
    pub body: BlockId,
    pub declarations: Vec<SymbolId>,
}

impl Program {
    pub fn new() -> Self {
        let mut coder = TreeBuilder::default();
        let body = coder.new_block(pos());
        Self {
            coder,
            body,
            declarations: Vec::new(),
        }
    }

    pub fn var(&mut self, name: &str, ty: VariableType) -> SymbolId {
        self.coder.symbols.declare_variable(name, pos(), ty)
    }

    /// `CONSTANT <ty> name := value`, checked as a declaration.
    pub fn constant(&mut self, name: &str, ty: VariableType, value: Value) -> SymbolId {
        let init = self.coder.constant(pos(), value);
        let symbol = self.var(name, ty);
        if let Some(def) = self.coder.symbols.variable_mut(symbol) {
            def.is_constant = true;
            def.constant_value = Some(init);
        }
        self.declarations.push(symbol);
        symbol
    }

    /// An external function without a body; calls to it are answered by
    /// machine hooks.
    pub fn external(&mut self, name: &str, params: &[(&str, VariableType)], returns: VariableType) -> SymbolId {
        let params = params.iter().map(|(n, ty)| Parameter::new(*n, *ty)).collect();
        let def = FunctionDef::new(params, returns).with_flags(FunctionFlags::EXTERNAL);
        self.coder.symbols.declare_function(name, pos(), def)
    }

    /// Append statements to the module body.
    pub fn emit<R>(&mut self, fill: impl FnOnce(&mut TreeBuilder) -> R) -> R {
        let body = self.body;
        self.coder.scoped(body, fill)
    }

    pub fn check(self) -> Checked {
        self.check_with(CompileOptions::default())
    }

    pub fn check_with(self, options: CompileOptions) -> Checked {
        let mut sema = Sema::new(self.coder, options);
        sema.check_unit(self.body, &self.declarations);
        Checked { sema, body: self.body }
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

/// A checked program.
pub struct Checked {
    pub sema: Sema,
    pub body: BlockId,
}

impl Checked {
    pub fn diagnostics(&self) -> Vec<&Diagnostic> {
        self.sema.diagnostics.iter().collect()
    }

    pub fn codes(&self) -> Vec<&'static str> {
        self.sema.diagnostics.iter().map(|d| d.kind.code()).collect()
    }

    pub fn assert_clean(&self) {
        let codes = self.codes();
        assert!(codes.is_empty(), "unexpected diagnostics {codes:?}:\n{}", self.dump());
        let untyped = self.sema.untyped_rvalues(self.body);
        assert!(untyped.is_empty(), "untyped rvalues {untyped:?}:\n{}", self.dump());
    }

    pub fn dump(&self) -> String {
        dump::block(&self.sema.coder.ast, &self.sema.coder.symbols, self.body)
    }

    pub fn dump_expr(&self, expr: ExprId) -> String {
        dump::expr(&self.sema.coder.ast, &self.sema.coder.symbols, expr)
    }

    pub fn kind(&self, expr: ExprId) -> &ExprKind {
        &self.sema.coder.ast.expr(expr).kind
    }

    pub fn type_of(&self, expr: ExprId) -> Option<VariableType> {
        self.sema.type_of(expr)
    }

    pub fn machine(&self) -> Machine<'_> {
        Machine::new(&self.sema.coder.ast, &self.sema.coder.symbols)
    }
}

// ── Reference machine ──────────────────────────────────────────────────

pub type Hook<'a> = Box<dyn FnMut(&[Value]) -> Value + 'a>;

enum Flow {
    Normal,
    Break,
    Continue,
    Return(Option<Value>),
}

/// Executes blocks, IF, FOR, assignments and plain expressions. Builtins
/// run through the value library; other functions need a hook, and so do
/// member reads (`->NAME`). Counts calls per function and evaluated
/// comparisons.
pub struct Machine<'a> {
    ast: &'a Ast,
    symbols: &'a SymbolTable,
    pub vars: FxHashMap<SymbolId, Value>,
    pub calls: FxHashMap<String, usize>,
    pub comparisons: usize,
    hooks: FxHashMap<String, Hook<'a>>,
}

impl<'a> Machine<'a> {
    pub fn new(ast: &'a Ast, symbols: &'a SymbolTable) -> Self {
        Self {
            ast,
            symbols,
            vars: FxHashMap::default(),
            calls: FxHashMap::default(),
            comparisons: 0,
            hooks: FxHashMap::default(),
        }
    }

    pub fn hook(mut self, name: &str, hook: impl FnMut(&[Value]) -> Value + 'a) -> Self {
        self.hooks.insert(name.to_ascii_uppercase(), Box::new(hook));
        self
    }

    pub fn set(&mut self, var: SymbolId, value: Value) {
        self.vars.insert(var, value);
    }

    pub fn get(&self, var: SymbolId) -> Value {
        match self.vars.get(&var) {
            Some(value) => value.clone(),
            None => {
                let ty = self.symbols.variable(var).map(|def| def.ty);
                ty.and_then(Value::default_for)
                    .unwrap_or_else(|| panic!("read of unset variable {}", self.symbols.name(var)))
            }
        }
    }

    pub fn calls_of(&self, name: &str) -> usize {
        self.calls.get(&name.to_ascii_uppercase()).copied().unwrap_or(0)
    }

    /// Run a block; returns the RETURN value, if any.
    pub fn run(&mut self, block: BlockId) -> Option<Value> {
        match self.block(block) {
            Flow::Return(value) => value,
            Flow::Normal => None,
            Flow::Break | Flow::Continue => panic!("BREAK or CONTINUE escaped the program"),
        }
    }

    fn block(&mut self, block: BlockId) -> Flow {
        let ast = self.ast;
        for stmt in &ast.block(block).statements {
            match self.stmt(*stmt) {
                Flow::Normal => {}
                other => return other,
            }
        }
        Flow::Normal
    }

    fn stmt(&mut self, stmt: StmtId) -> Flow {
        let ast = self.ast;
        match &ast.stmt(stmt).kind {
            StmtKind::Block(block) => self.block(*block),
            StmtKind::If {
                condition,
                then,
                otherwise,
            } => {
                if self.truth(*condition) {
                    self.stmt(*then)
                } else if let Some(otherwise) = otherwise {
                    self.stmt(*otherwise)
                } else {
                    Flow::Normal
                }
            }
            StmtKind::For {
                init,
                condition,
                step,
                body,
            } => {
                if let Some(init) = init {
                    self.stmt(*init);
                }
                loop {
                    if let Some(condition) = condition {
                        if !self.truth(*condition) {
                            break;
                        }
                    }
                    match self.stmt(*body) {
                        Flow::Break => break,
                        Flow::Return(value) => return Flow::Return(value),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if let Some(step) = step {
                        self.stmt(*step);
                    }
                }
                Flow::Normal
            }
            StmtKind::Break => Flow::Break,
            StmtKind::Continue => Flow::Continue,
            StmtKind::Return { value } => Flow::Return(value.map(|v| self.eval(v))),
            StmtKind::SingleExpression { expr } => {
                self.eval(*expr);
                Flow::Normal
            }
            StmtKind::Assign { target, value } => {
                let value = self.eval(*value);
                self.vars.insert(*target, value);
                Flow::Normal
            }
            StmtKind::Initialize { variable } => {
                let ty = self.symbols.variable(*variable).map_or(VariableType::VARIANT, |def| def.ty);
                let value = Value::default_for(ty).unwrap_or(Value::Integer(0));
                self.vars.insert(*variable, value);
                Flow::Normal
            }
            other => panic!("reference machine cannot run {}", other.name()),
        }
    }

    fn truth(&mut self, expr: ExprId) -> bool {
        match self.eval(expr) {
            Value::Boolean(b) => b,
            other => panic!("condition evaluated to {other}"),
        }
    }

    pub fn eval(&mut self, expr: ExprId) -> Value {
        let ast = self.ast;
        match &ast.expr(expr).kind {
            ExprKind::Constant(value) => value.clone(),
            ExprKind::Variable(symbol) => self.get(*symbol),
            ExprKind::BinaryOperator { op, lhs, rhs } => {
                let left = self.eval(*lhs);
                let right = self.eval(*rhs);
                if op.is_comparison() {
                    self.comparisons += 1;
                }
                ops::binary(*op, left, right).unwrap_or_else(|e| panic!("runtime error: {e}"))
            }
            ExprKind::UnaryOperator { op, operand } => {
                let value = self.eval(*operand);
                ops::unary(*op, value).unwrap_or_else(|e| panic!("runtime error: {e}"))
            }
            ExprKind::Cast { expr, to, explicit, .. } => {
                let value = self.eval(*expr);
                cast::cast(value, *to, *explicit).unwrap_or_else(|e| panic!("runtime error: {e}"))
            }
            ExprKind::ConditionalOperator {
                condition,
                then,
                otherwise,
            } => {
                if self.truth(*condition) {
                    self.eval(*then)
                } else {
                    self.eval(*otherwise)
                }
            }
            ExprKind::ArrayElementConst { array, index } => {
                let array = self.eval(*array);
                let index = self.eval(*index);
                match array {
                    Value::Array(array) => {
                        builtins::array_element(&array, &index).unwrap_or_else(|e| panic!("runtime error: {e}"))
                    }
                    other => panic!("indexing {other}"),
                }
            }
            ExprKind::ArrayElementModify { array, index, value } => {
                let array = self.eval(*array);
                let index = self.eval(*index);
                let value = self.eval(*value);
                match (array, index) {
                    (Value::Array(mut array), Value::Integer(i)) => {
                        let slot = usize::try_from(i).expect("negative index");
                        array.items[slot] = value;
                        Value::Array(array)
                    }
                    (array, index) => panic!("cannot modify {array} at {index}"),
                }
            }
            ExprKind::RecordColumnConst { record, name } => match self.eval(*record) {
                Value::Record(record) => {
                    builtins::record_cell(&record, name).unwrap_or_else(|e| panic!("runtime error: {e}"))
                }
                other => panic!("cell {name} of {other}"),
            },
            ExprKind::ObjectMemberConst { object, name, .. } => {
                let object = self.eval(*object);
                let name = format!("->{}", name.to_ascii_uppercase());
                *self.calls.entry(name.clone()).or_default() += 1;
                match self.hooks.get_mut(&name) {
                    Some(hook) => hook(&[object]),
                    None => panic!("no hook for {name}"),
                }
            }
            ExprKind::FunctionCall { function, args } => {
                let values: Vec<Value> = args.iter().map(|arg| self.eval(*arg)).collect();
                let name = self.symbols.name(*function).to_ascii_uppercase();
                *self.calls.entry(name.clone()).or_default() += 1;
                if let Some(hook) = self.hooks.get_mut(&name) {
                    return hook(&values);
                }
                match builtins::call(&name, values) {
                    Some(result) => result.unwrap_or_else(|e| panic!("runtime error in {name}: {e}")),
                    None => panic!("no hook for {name}"),
                }
            }
            ExprKind::ExpressionBlock { block, result } => match self.block(*block) {
                Flow::Normal => self.get(*result),
                _ => panic!("expression block left early"),
            },
            ExprKind::ConstantRecord { entries } => {
                let mut record = Record::empty();
                for entry in entries {
                    match entry {
                        hare_ast::RecordEntry::Set { name, value } => {
                            let value = self.eval(*value);
                            record.set(name, value);
                        }
                        hare_ast::RecordEntry::Spread(value) => {
                            if let Value::Record(source) = self.eval(*value) {
                                for (name, value) in source.iter() {
                                    record.set(name, value.clone());
                                }
                            }
                        }
                        hare_ast::RecordEntry::Delete { name, .. } => {
                            record.remove(name);
                        }
                    }
                }
                Value::Record(record)
            }
            ExprKind::ConstantArray { element, entries } => {
                let element = element.unwrap_or(VariableType::VARIANT);
                let mut items = Vec::new();
                for entry in entries {
                    match (entry.spread, self.eval(entry.value)) {
                        (true, Value::Array(source)) => items.extend(source.items),
                        (_, value) => items.push(value),
                    }
                }
                Value::Array(Array::with_items(element, items))
            }
            other => panic!("reference machine cannot evaluate {}", other.name()),
        }
    }
}

pub fn ints(values: &[i32]) -> Value {
    Value::Array(Array::with_items(
        VariableType::INTEGER,
        values.iter().map(|v| Value::Integer(*v)).collect(),
    ))
}

/// `lhs op rhs` as a new node.
pub fn bin(c: &mut TreeBuilder, op: BinaryOp, lhs: ExprId, rhs: ExprId) -> ExprId {
    c.binary(pos(), op, lhs, rhs)
}
