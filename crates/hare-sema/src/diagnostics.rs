//! Ariadne-based rendering of semantic diagnostics.
//!
//! Diagnostics carry a line/column position; ariadne wants byte ranges,
//! so positions go through a [`LineIndex`] of the source first. Output is
//! colorless unless asked otherwise, which keeps snapshots stable.

use std::ops::Range;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};
use hare_common::{Diagnostic, ErrorKind, LineIndex, Severity};

/// Rendering knobs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticOptions {
    pub color: bool,
}

// ── Fix Suggestions ────────────────────────────────────────────────────

fn help(kind: &ErrorKind) -> Option<String> {
    match kind {
        ErrorKind::CannotConvertType { to, .. } => Some(format!("add an explicit cast: `x AS {to}`")),
        ErrorKind::MoneyInteger64Mix => Some("cast one operand to FLOAT, MONEY or INTEGER64".to_string()),
        ErrorKind::ColumnOfObject => Some("write `obj->member`".to_string()),
        ErrorKind::MemberOfRecord => Some("write `rec.cell`".to_string()),
        ErrorKind::ColumnNotGrouped { column } => Some(format!("add {column} to GROUP BY")),
        ErrorKind::BreakOutsideLoop | ErrorKind::ContinueOutsideLoop => {
            Some("move the statement into a FOR, WHILE or FOREVERY body".to_string())
        }
        ErrorKind::YieldOutsideGenerator => Some("declare the function as a generator: `FUNCTION *f()`".to_string()),
        ErrorKind::AwaitOutsideAsync => Some("declare the function ASYNC".to_string()),
        ErrorKind::NoEffect => Some("remove the statement or use its value".to_string()),
        _ => None,
    }
}

fn label_message(kind: &ErrorKind) -> String {
    match kind {
        ErrorKind::CannotConvertType { from, .. } => format!("this is {from}"),
        ErrorKind::IncompatibleOperands { left, right, .. } => format!("{left} and {right}"),
        ErrorKind::DuplicateCaseLabel { .. } | ErrorKind::DuplicateCell { .. } => "repeated here".to_string(),
        ErrorKind::ConstantFoldFailed { .. } => "while evaluating this constant".to_string(),
        _ => "here".to_string(),
    }
}

// ── Main Rendering Function ────────────────────────────────────────────

/// Render one diagnostic against the source it was reported for.
pub fn render_diagnostic(diag: &Diagnostic, source: &str, filename: &str, options: &DiagnosticOptions) -> String {
    let config = Config::default().with_color(options.color);
    let source_len = source.len();

    // Clamp a range to be valid within source bounds.
    let clamp = |r: Range<usize>| -> Range<usize> {
        let s = r.start.min(source_len);
        let e = r.end.min(source_len).max(s);
        // ariadne needs at least a one-character span.
        if s == e {
            s..e.saturating_add(1).min(source_len)
        } else {
            s..e
        }
    };

    let index = LineIndex::new(source);
    let start = index.offset(diag.position) as usize;
    let span = clamp(start..start + 1);

    let kind = match diag.severity {
        Severity::Error => ReportKind::Error,
        Severity::Warning => ReportKind::Warning,
    };
    let color = match diag.severity {
        Severity::Error => Color::Red,
        Severity::Warning => Color::Yellow,
    };
    let msg = diag.kind.to_string();

    let mut builder = Report::build(kind, (filename, span.clone()))
        .with_code(diag.kind.code())
        .with_message(&msg)
        .with_config(config)
        .with_label(
            Label::new((filename, span))
                .with_message(label_message(&diag.kind))
                .with_color(color),
        );
    if let Some(help) = help(&diag.kind) {
        builder = builder.with_help(help);
    }
    let report = builder.finish();

    let mut buf = Vec::new();
    if report.write((filename, Source::from(source)), &mut buf).is_err() {
        return format!("{filename}:{}: [{}] {}", diag.position, diag.kind.code(), msg);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hare_common::Position;

    fn diagnostic(kind: ErrorKind, severity: Severity, line: u32, column: u32) -> Diagnostic {
        Diagnostic {
            kind,
            severity,
            position: Position::new(line, column),
        }
    }

    #[test]
    fn renders_code_and_message() {
        let source = "INTEGER x := \"a\";\n";
        let diag = diagnostic(
            ErrorKind::CannotConvertType {
                from: "STRING".into(),
                to: "INTEGER".into(),
            },
            Severity::Error,
            1,
            14,
        );
        let out = render_diagnostic(&diag, source, "test.whscr", &DiagnosticOptions::default());
        assert!(out.contains("E0001"), "missing code in:\n{out}");
        assert!(out.contains("cannot convert STRING to INTEGER"));
        assert!(out.contains("x AS INTEGER"));
    }

    #[test]
    fn header_names_the_source_file() {
        let source = "x := 1;\nBREAK;\n";
        let diag = diagnostic(ErrorKind::BreakOutsideLoop, Severity::Error, 2, 1);
        let out = render_diagnostic(&diag, source, "lib/util.whlib", &DiagnosticOptions::default());
        assert!(out.contains("lib/util.whlib:2:1"), "got:\n{out}");
    }

    #[test]
    fn warnings_render_as_warnings() {
        let source = "1;\n";
        let diag = diagnostic(ErrorKind::NoEffect, Severity::Warning, 1, 1);
        let out = render_diagnostic(&diag, source, "test.whscr", &DiagnosticOptions::default());
        assert!(out.contains("Warning"), "got:\n{out}");
        assert!(out.contains("W0001"));
    }

    #[test]
    fn position_past_end_is_clamped() {
        let source = "BREAK;";
        let diag = diagnostic(ErrorKind::BreakOutsideLoop, Severity::Error, 9, 40);
        let out = render_diagnostic(&diag, source, "test.whscr", &DiagnosticOptions::default());
        assert!(out.contains("BREAK is only allowed inside a loop"));
    }
}
