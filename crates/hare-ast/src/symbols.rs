//! Symbols and the scope stack.
//!
//! Every variable, function and object type is a [`Symbol`] stored in the
//! table's arena. Names are case-insensitive: scopes are keyed by the
//! upper-cased name while the symbol keeps the spelling it was declared
//! with. Scopes are a stack of maps; lookups search from the innermost
//! scope outward.

use bitflags::bitflags;
use hare_common::Position;
use hare_value::{builtins, VariableType};
use la_arena::Arena;
use rustc_hash::FxHashMap;

use crate::{BlockId, ExprId, SymbolId};

/// Name of the runtime object type backing generator and async functions.
pub const GENERATOR_TYPE: &str = ":GENERATOR";

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub pos: Position,
    pub kind: SymbolKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolKind {
    Variable(VariableDef),
    Function(FunctionDef),
    ObjectType(ObjectDef),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDef {
    pub ty: VariableType,
    pub is_constant: bool,
    /// Bound at declaration for `CONSTANT` variables.
    pub constant_value: Option<ExprId>,
    /// A read-only reference to the caller's value (const parameters).
    pub is_constref: bool,
    /// Static object type for OBJECT variables, when known.
    pub object_type: Option<SymbolId>,
    pub is_temporary: bool,
}

impl VariableDef {
    pub fn new(ty: VariableType) -> Self {
        Self {
            ty,
            is_constant: false,
            constant_value: None,
            is_constref: false,
            object_type: None,
            is_temporary: false,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FunctionFlags: u32 {
        /// Implemented by the runtime.
        const EXTERNAL = 1 << 0;
        /// Only legal in the column list or HAVING clause of a SELECT.
        const AGGREGATE = 1 << 1;
        /// The last parameter collects any further arguments.
        const VARARG = 1 << 2;
        /// COUNT: its argument is not a per-row column reference.
        const IS_COUNT = 1 << 3;
        /// Pure: calls with constant arguments may be folded.
        const CONSTANT = 1 << 4;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Normal,
    Generator,
    Async,
    AsyncGenerator,
}

impl FunctionKind {
    pub fn is_generator(self) -> bool {
        matches!(self, FunctionKind::Generator | FunctionKind::AsyncGenerator)
    }

    pub fn is_async(self) -> bool {
        matches!(self, FunctionKind::Async | FunctionKind::AsyncGenerator)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub ty: VariableType,
    pub default: Option<ExprId>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: VariableType) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub params: Vec<Parameter>,
    /// `NO_RETURN` for macros.
    pub returns: VariableType,
    pub flags: FunctionFlags,
    pub kind: FunctionKind,
    /// Owning object type, for methods.
    pub object_type: Option<SymbolId>,
    /// Variables the body sees the parameters through, in order.
    pub param_symbols: Vec<SymbolId>,
    pub body: Option<BlockId>,
}

impl FunctionDef {
    pub fn new(params: Vec<Parameter>, returns: VariableType) -> Self {
        Self {
            params,
            returns,
            flags: FunctionFlags::empty(),
            kind: FunctionKind::Normal,
            object_type: None,
            param_symbols: Vec::new(),
            body: None,
        }
    }

    pub fn with_flags(mut self, flags: FunctionFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn is_macro(&self) -> bool {
        self.returns == VariableType::NO_RETURN
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Member,
    Method,
    Property,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectField {
    pub name: String,
    pub kind: FieldKind,
    pub ty: VariableType,
    /// The function implementing a method.
    pub method: Option<SymbolId>,
    pub default: Option<ExprId>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectDef {
    pub base: Option<SymbolId>,
    pub fields: FxHashMap<String, ObjectField>,
    pub is_static: bool,
    pub internal_protected: bool,
}

impl ObjectDef {
    pub fn add_field(&mut self, field: ObjectField) {
        self.fields.insert(field.name.to_ascii_uppercase(), field);
    }
}

/// All symbols of a compilation unit plus the lexical scope stack.
#[derive(Debug)]
pub struct SymbolTable {
    symbols: Arena<Symbol>,
    /// Index 0 is the global scope.
    scopes: Vec<FxHashMap<String, SymbolId>>,
    temp_counter: u32,
}

impl SymbolTable {
    /// A table with one empty global scope.
    pub fn new() -> Self {
        Self {
            symbols: Arena::default(),
            scopes: vec![FxHashMap::default()],
            temp_counter: 0,
        }
    }

    /// A table whose global scope holds the builtin functions and the
    /// internal object types generated code relies on.
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        table.register_builtins();
        table
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    /// # Panics
    ///
    /// Panics if called when only the global scope remains.
    pub fn pop_scope(&mut self) {
        assert!(self.scopes.len() > 1, "cannot pop the global scope");
        self.scopes.pop();
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Add a symbol and bind its name in the innermost scope.
    pub fn declare(&mut self, name: &str, pos: Position, kind: SymbolKind) -> SymbolId {
        let id = self.alloc(name, pos, kind);
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_ascii_uppercase(), id);
        }
        id
    }

    /// Add a symbol that no scope binds (methods, temporaries).
    pub fn alloc(&mut self, name: &str, pos: Position, kind: SymbolKind) -> SymbolId {
        self.symbols.alloc(Symbol {
            name: name.to_string(),
            pos,
            kind,
        })
    }

    pub fn declare_variable(&mut self, name: &str, pos: Position, ty: VariableType) -> SymbolId {
        self.declare(name, pos, SymbolKind::Variable(VariableDef::new(ty)))
    }

    pub fn declare_function(&mut self, name: &str, pos: Position, def: FunctionDef) -> SymbolId {
        self.declare(name, pos, SymbolKind::Function(def))
    }

    pub fn declare_object_type(&mut self, name: &str, pos: Position, def: ObjectDef) -> SymbolId {
        self.declare(name, pos, SymbolKind::ObjectType(def))
    }

    /// A fresh compiler-generated variable, named so it cannot collide
    /// with user names.
    pub fn temporary(&mut self, pos: Position, ty: VariableType) -> SymbolId {
        self.temp_counter += 1;
        let name = format!(":t{}", self.temp_counter);
        let mut def = VariableDef::new(ty);
        def.is_temporary = true;
        self.alloc(&name, pos, SymbolKind::Variable(def))
    }

    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        let key = name.to_ascii_uppercase();
        self.scopes.iter().rev().find_map(|scope| scope.get(&key).copied())
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id]
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id]
    }

    pub fn name(&self, id: SymbolId) -> &str {
        &self.symbols[id].name
    }

    pub fn variable(&self, id: SymbolId) -> Option<&VariableDef> {
        match &self.symbols[id].kind {
            SymbolKind::Variable(def) => Some(def),
            _ => None,
        }
    }

    pub fn variable_mut(&mut self, id: SymbolId) -> Option<&mut VariableDef> {
        match &mut self.symbols[id].kind {
            SymbolKind::Variable(def) => Some(def),
            _ => None,
        }
    }

    pub fn function(&self, id: SymbolId) -> Option<&FunctionDef> {
        match &self.symbols[id].kind {
            SymbolKind::Function(def) => Some(def),
            _ => None,
        }
    }

    pub fn function_mut(&mut self, id: SymbolId) -> Option<&mut FunctionDef> {
        match &mut self.symbols[id].kind {
            SymbolKind::Function(def) => Some(def),
            _ => None,
        }
    }

    pub fn object_type(&self, id: SymbolId) -> Option<&ObjectDef> {
        match &self.symbols[id].kind {
            SymbolKind::ObjectType(def) => Some(def),
            _ => None,
        }
    }

    pub fn object_type_mut(&mut self, id: SymbolId) -> Option<&mut ObjectDef> {
        match &mut self.symbols[id].kind {
            SymbolKind::ObjectType(def) => Some(def),
            _ => None,
        }
    }

    /// Find a field on an object type or its bases, nearest first.
    pub fn lookup_field(&self, object_type: SymbolId, name: &str) -> Option<&ObjectField> {
        let key = name.to_ascii_uppercase();
        let mut current = Some(object_type);
        // Bounded by the number of symbols so a cyclic base chain cannot
        // hang the lookup.
        for _ in 0..self.symbols.len() {
            let def = self.object_type(current?)?;
            if let Some(field) = def.fields.get(&key) {
                return Some(field);
            }
            current = def.base;
        }
        None
    }

    /// A builtin function or internal type registered by
    /// [`SymbolTable::with_builtins`].
    pub fn builtin(&self, name: &str) -> Option<SymbolId> {
        self.scopes
            .first()
            .and_then(|global| global.get(&name.to_ascii_uppercase()).copied())
    }

    fn register_builtins(&mut self) {
        let pos = Position::default();
        let v = VariableType::VARIANT;
        let pure = FunctionFlags::EXTERNAL | FunctionFlags::CONSTANT;
        let ext = FunctionFlags::EXTERNAL;
        let param = Parameter::new;

        let functions: Vec<(&str, Vec<Parameter>, VariableType, FunctionFlags)> = vec![
            (builtins::LENGTH, vec![param("value", v)], VariableType::INTEGER, pure),
            (builtins::ISDEFAULTVALUE, vec![param("value", v)], VariableType::BOOLEAN, pure),
            (
                builtins::SEARCHELEMENT,
                vec![param("list", VariableType::VARIANT_ARRAY), param("element", v)],
                VariableType::INTEGER,
                pure,
            ),
            (builtins::TOUPPERCASE, vec![param("text", VariableType::STRING)], VariableType::STRING, pure),
            (builtins::TOLOWERCASE, vec![param("text", VariableType::STRING)], VariableType::STRING, pure),
            (builtins::ABS, vec![param("value", v)], v, pure),
            (
                "COUNT",
                vec![param("value", v)],
                VariableType::INTEGER,
                ext | FunctionFlags::AGGREGATE | FunctionFlags::IS_COUNT,
            ),
            ("SUM", vec![param("value", v)], v, ext | FunctionFlags::AGGREGATE),
            ("MIN", vec![param("value", v)], v, ext | FunctionFlags::AGGREGATE),
            ("MAX", vec![param("value", v)], v, ext | FunctionFlags::AGGREGATE),
            (
                "PRINT",
                vec![param("text", VariableType::STRING)],
                VariableType::NO_RETURN,
                ext,
            ),
            (
                builtins::ARRAY_INSERT,
                vec![param("list", v), param("index", VariableType::INTEGER), param("value", v)],
                v,
                pure,
            ),
            (
                builtins::ARRAY_DELETE,
                vec![param("list", v), param("index", VariableType::INTEGER)],
                v,
                pure,
            ),
            (builtins::ARRAY_APPEND, vec![param("list", v), param("value", v)], v, pure),
            (
                builtins::CELL_SET,
                vec![
                    param("record", VariableType::RECORD),
                    param("name", VariableType::STRING),
                    param("value", v),
                ],
                VariableType::RECORD,
                pure,
            ),
            (
                builtins::CELL_INSERT,
                vec![
                    param("record", VariableType::RECORD),
                    param("name", VariableType::STRING),
                    param("value", v),
                ],
                VariableType::RECORD,
                pure,
            ),
            (
                builtins::CELL_UPDATE,
                vec![
                    param("record", VariableType::RECORD),
                    param("name", VariableType::STRING),
                    param("value", v),
                ],
                VariableType::RECORD,
                pure,
            ),
            (
                builtins::CELL_DELETE,
                vec![param("record", VariableType::RECORD), param("name", VariableType::STRING)],
                VariableType::RECORD,
                pure,
            ),
            (
                builtins::RECORD_MERGE,
                vec![param("left", VariableType::RECORD), param("right", VariableType::RECORD)],
                VariableType::RECORD,
                pure,
            ),
            (
                builtins::OBJECT_MEMBER_SET,
                vec![
                    param("object", VariableType::OBJECT),
                    param("name", VariableType::STRING),
                    param("value", v),
                ],
                VariableType::NO_RETURN,
                ext,
            ),
            (
                builtins::YIELD,
                vec![param("generator", VariableType::OBJECT), param("value", v)],
                VariableType::RECORD,
                ext,
            ),
        ];
        for (name, params, returns, flags) in functions {
            self.declare_function(name, pos, FunctionDef::new(params, returns).with_flags(flags));
        }

        // The generator object every generator and async function body
        // drives. Its methods return [value, done] or [type, value]
        // records.
        let generator = self.declare_object_type(GENERATOR_TYPE, pos, ObjectDef::default());
        let methods: [(&str, VariableType); 6] = [
            ("NEXT", v),
            ("SENDTHROW", VariableType::OBJECT),
            ("SENDRETURN", v),
            ("SENDAWAIT", v),
            ("RETURNVALUE", v),
            ("RETURNTHROW", VariableType::OBJECT),
        ];
        for (name, arg) in methods {
            let mut def = FunctionDef::new(vec![param("value", arg)], VariableType::RECORD).with_flags(ext);
            def.object_type = Some(generator);
            let method = self.alloc(&format!("{GENERATOR_TYPE}#{name}"), pos, SymbolKind::Function(def));
            if let Some(object) = self.object_type_mut(generator) {
                object.add_field(ObjectField {
                    name: name.to_string(),
                    kind: FieldKind::Method,
                    ty: VariableType::RECORD,
                    method: Some(method),
                    default: None,
                });
            }
        }
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
