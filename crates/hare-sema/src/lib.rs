//! HareScript semantic passes.
//!
//! Turns a freshly parsed tree into a typed, desugared and constant-folded
//! tree ready for code generation. The three passes are mutually
//! recursive, so they share one state value, [`Sema`]:
//!
//! - [`typeck`]: assigns a type to every rvalue, inserts implicit casts and
//!   validates operators, calls, member access and SQL grouping
//! - [`desugar`]: rewrites FOREVERY, SWITCH, deep lvalue stores, `??`,
//!   `END` and YIELD/AWAIT into primitive statements, then re-checks the
//!   result
//! - [`fold`]: evaluates constant subexpressions with the runtime's own
//!   value operations
//!
//! User errors are collected in [`Diagnostics`] and never stop a pass.
//! Broken contracts between passes are internal faults and panic.

pub mod desugar;
pub mod diagnostics;
pub mod fold;
pub mod options;
pub mod typeck;

use hare_ast::{walk, Ast, BlockId, ExprId, SymbolId, SymbolTable, TreeBuilder, TypeTable};
use hare_common::{Diagnostic, Diagnostics, ErrorKind, Position};
use hare_value::VariableType;
use tracing::{debug, instrument};

pub use fold::Optimizable;
pub use options::{CompileOptions, ConfigError};

/// State shared by the type checker, desugarer and constant folder for
/// one compilation unit.
#[derive(Debug)]
pub struct Sema {
    pub coder: TreeBuilder,
    pub types: TypeTable,
    pub diagnostics: Diagnostics,
    pub options: CompileOptions,
    checker: typeck::CheckerState,
    sugar: desugar::DesugarState,
    folder: fold::FolderState,
}

/// The outcome of checking a compilation unit.
#[derive(Debug)]
pub struct SemaResult {
    pub ast: Ast,
    pub symbols: SymbolTable,
    pub types: TypeTable,
    pub diagnostics: Vec<Diagnostic>,
    /// Diagnostics past `max_errors` that were counted but not kept.
    pub dropped: usize,
}

impl SemaResult {
    pub fn has_errors(&self) -> bool {
        self.dropped > 0 || self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// Render every diagnostic with ariadne.
    pub fn render_errors(&self, source: &str, filename: &str) -> Vec<String> {
        let options = diagnostics::DiagnosticOptions::default();
        self.diagnostics
            .iter()
            .map(|diag| diagnostics::render_diagnostic(diag, source, filename, &options))
            .collect()
    }
}

impl Sema {
    pub fn new(coder: TreeBuilder, options: CompileOptions) -> Self {
        Self {
            coder,
            types: TypeTable::new(),
            diagnostics: Diagnostics::with_limit(options.max_errors, options.warnings_as_errors),
            options,
            checker: typeck::CheckerState::default(),
            sugar: desugar::DesugarState::default(),
            folder: fold::FolderState::default(),
        }
    }

    pub(crate) fn report(&mut self, pos: Position, kind: ErrorKind) {
        debug!(%pos, code = kind.code(), "diagnostic");
        self.diagnostics.report(pos, kind);
    }

    /// Number of diagnostics reported so far, stored or dropped. Compare
    /// two marks to learn whether a check reported anything.
    pub(crate) fn error_mark(&self) -> usize {
        self.diagnostics.len() + self.diagnostics.dropped()
    }

    pub(crate) fn pos(&self, expr: ExprId) -> Position {
        self.coder.ast.expr(expr).pos
    }

    pub(crate) fn symbol_name(&self, symbol: SymbolId) -> String {
        self.coder.symbols.name(symbol).to_string()
    }

    /// Type of an already checked expression.
    pub fn type_of(&self, expr: ExprId) -> Option<VariableType> {
        self.types.get(expr)
    }

    /// Check a module body together with the declarations it owns.
    #[instrument(level = "debug", skip(self, declarations))]
    pub fn check_unit(&mut self, body: BlockId, declarations: &[SymbolId]) {
        for symbol in declarations {
            self.check_declaration(*symbol);
        }
        self.check_block(body);
    }

    /// Every rvalue reachable from `block` that has no type. Empty after a
    /// successful pass.
    pub fn untyped_rvalues(&self, block: BlockId) -> Vec<ExprId> {
        walk::block_rvalues(&self.coder.ast, block)
            .into_iter()
            .filter(|expr| !self.types.contains(*expr))
            .collect()
    }

    pub fn finish(self) -> SemaResult {
        let dropped = self.diagnostics.dropped();
        let (ast, symbols) = self.coder.into_parts();
        SemaResult {
            ast,
            symbols,
            types: self.types,
            diagnostics: self.diagnostics.into_vec(),
            dropped,
        }
    }
}

/// Check a whole compilation unit and hand back the finished tree.
pub fn check(coder: TreeBuilder, options: CompileOptions, body: BlockId, declarations: &[SymbolId]) -> SemaResult {
    let mut sema = Sema::new(coder, options);
    sema.check_unit(body, declarations);
    sema.finish()
}
