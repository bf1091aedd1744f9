//! Type checker behavior on small hand-built programs.

mod common;

use common::{at, bin, pos, Program};
use hare_ast::{
    ExprKind, FieldKind, ObjectDef, ObjectField, PtrBinding, RecordEntry, SelectColumn, SqlSelect, SqlSource,
    StmtKind, SwitchCase, SwitchStatement,
};
use hare_common::{ErrorKind, Severity};
use hare_sema::CompileOptions;
use hare_value::ops::numeric_promotion;
use hare_value::{builtins, BinaryOp, Value, VariableType};
use proptest::prelude::*;

const NUMERIC: [VariableType; 4] = [
    VariableType::INTEGER,
    VariableType::INTEGER64,
    VariableType::MONEY,
    VariableType::FLOAT,
];

// ── Operators ──────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn arithmetic_operands_are_cast_to_the_promoted_type(
        left in proptest::sample::select(NUMERIC.to_vec()),
        right in proptest::sample::select(NUMERIC.to_vec()),
    ) {
        let mut p = Program::new();
        let a = p.var("a", left);
        let b = p.var("b", right);
        let x = p.var("x", VariableType::VARIANT);
        let (sum, lhs, rhs) = p.emit(|c| {
            let lhs = c.variable(pos(), a);
            let rhs = c.variable(pos(), b);
            let sum = c.binary(pos(), BinaryOp::Add, lhs, rhs);
            c.emit_assign(pos(), x, sum);
            (sum, lhs, rhs)
        });
        let checked = p.check();

        match numeric_promotion(left, right) {
            Ok(Some(ty)) => {
                prop_assert!(checked.codes().is_empty());
                prop_assert_eq!(checked.type_of(sum), Some(ty));
                prop_assert_eq!(checked.type_of(lhs), Some(ty));
                prop_assert_eq!(checked.type_of(rhs), Some(ty));
            }
            Err(()) => {
                prop_assert_eq!(checked.codes(), vec!["E0002"]);
                prop_assert_eq!(checked.type_of(sum), Some(VariableType::VARIANT));
            }
            Ok(None) => prop_assert!(false, "{} and {} are both numeric", left, right),
        }
    }
}

#[test]
fn widening_inserts_an_implicit_cast() {
    let mut p = Program::new();
    let i = p.var("i", VariableType::INTEGER);
    let f = p.var("f", VariableType::FLOAT);
    let sum = p.emit(|c| {
        let lhs = c.variable(pos(), i);
        let rhs = c.variable(pos(), f);
        let sum = c.binary(pos(), BinaryOp::Add, lhs, rhs);
        c.emit_assign(pos(), f, sum);
        sum
    });
    let checked = p.check();
    checked.assert_clean();
    assert_eq!(checked.dump_expr(sum), "CAST(i AS FLOAT) + f");
}

#[test]
fn string_into_integer_is_rejected() {
    let mut p = Program::new();
    let x = p.var("x", VariableType::INTEGER);
    p.emit(|c| {
        let text = c.string(pos(), "a");
        c.emit_assign(pos(), x, text);
    });
    let checked = p.check();
    let diagnostics = checked.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(
        diagnostics[0].kind,
        ErrorKind::CannotConvertType {
            from: "STRING".into(),
            to: "INTEGER".into(),
        }
    );
}

// ── Context errors ─────────────────────────────────────────────────────

#[test]
fn break_and_continue_need_a_loop() {
    let mut p = Program::new();
    p.emit(|c| {
        c.emit_stmt(at(1), StmtKind::Break);
        c.emit_stmt(at(2), StmtKind::Continue);
    });
    let checked = p.check();
    assert_eq!(checked.codes(), vec!["E0021", "E0022"]);
    assert_eq!(checked.diagnostics()[1].position, at(2));
}

#[test]
fn break_inside_a_loop_is_accepted() {
    let mut p = Program::new();
    p.emit(|c| {
        let body = c.new_block(pos());
        c.scoped(body, |c| {
            c.emit_stmt(pos(), StmtKind::Break);
        });
        let body = c.block_stmt(pos(), body);
        c.emit_stmt(
            pos(),
            StmtKind::For {
                init: None,
                condition: None,
                step: None,
                body,
            },
        );
    });
    p.check().assert_clean();
}

#[test]
fn end_outside_a_subscript() {
    let mut p = Program::new();
    let x = p.var("x", VariableType::INTEGER);
    p.emit(|c| {
        let end = c.expr(pos(), ExprKind::End);
        c.emit_assign(pos(), x, end);
    });
    assert_eq!(p.check().codes(), vec!["E0023"]);
}

#[test]
fn macro_result_cannot_be_used() {
    let mut p = Program::new();
    let x = p.var("x", VariableType::STRING);
    p.emit(|c| {
        let text = c.string(pos(), "hello");
        let call = c.call_builtin(pos(), "PRINT", vec![text]);
        c.emit_assign(pos(), x, call);
    });
    let checked = p.check();
    assert_eq!(checked.codes(), vec!["E0017"]);
    assert_eq!(
        checked.diagnostics()[0].kind,
        ErrorKind::MacroHasNoValue {
            function: "PRINT".into()
        }
    );
}

#[test]
fn throw_needs_an_object() {
    let mut p = Program::new();
    p.emit(|c| {
        let one = c.integer(pos(), 1);
        c.emit_stmt(pos(), StmtKind::Throw { value: one });
    });
    assert_eq!(p.check().codes(), vec!["E0038"]);
}

#[test]
fn expression_without_effect_warns() {
    let mut p = Program::new();
    p.emit(|c| {
        let one = c.integer(pos(), 1);
        let two = c.integer(pos(), 2);
        let sum = bin(c, BinaryOp::Add, one, two);
        c.emit_expr(pos(), sum);
    });
    let checked = p.check();
    let diagnostics = checked.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, ErrorKind::NoEffect);
    assert_eq!(diagnostics[0].severity, Severity::Warning);
}

#[test]
fn warnings_can_be_promoted_to_errors() {
    let mut p = Program::new();
    p.emit(|c| {
        let one = c.integer(pos(), 1);
        c.emit_expr(pos(), one);
    });
    let options = CompileOptions {
        warnings_as_errors: true,
        ..CompileOptions::default()
    };
    let result = p.check_with(options).sema.finish();
    assert!(result.has_errors());
    assert_eq!(result.diagnostics[0].severity, Severity::Error);
}

#[test]
fn diagnostics_past_the_limit_are_only_counted() {
    let mut p = Program::new();
    p.emit(|c| {
        for line in 1..=3 {
            c.emit_stmt(at(line), StmtKind::Break);
        }
    });
    let options = CompileOptions {
        max_errors: Some(2),
        ..CompileOptions::default()
    };
    let result = p.check_with(options).sema.finish();
    assert_eq!(result.diagnostics.len(), 2);
    assert_eq!(result.dropped, 1);
    assert!(result.has_errors());
}

// ── Calls ──────────────────────────────────────────────────────────────

#[test]
fn too_many_arguments() {
    let mut p = Program::new();
    let f = p.external("f", &[("a", VariableType::INTEGER)], VariableType::INTEGER);
    let x = p.var("x", VariableType::INTEGER);
    p.emit(|c| {
        let one = c.integer(pos(), 1);
        let two = c.integer(pos(), 2);
        let call = c.call(pos(), f, vec![one, two]);
        c.emit_assign(pos(), x, call);
    });
    let checked = p.check();
    assert_eq!(
        checked.diagnostics()[0].kind,
        ErrorKind::TooManyParameters {
            function: "f".into(),
            max: 1,
        }
    );
}

#[test]
fn missing_argument_without_default() {
    let mut p = Program::new();
    let f = p.external(
        "f",
        &[("a", VariableType::INTEGER), ("b", VariableType::INTEGER)],
        VariableType::INTEGER,
    );
    let x = p.var("x", VariableType::INTEGER);
    p.emit(|c| {
        let one = c.integer(pos(), 1);
        let call = c.call(pos(), f, vec![one]);
        c.emit_assign(pos(), x, call);
    });
    let checked = p.check();
    assert_eq!(
        checked.diagnostics()[0].kind,
        ErrorKind::TooFewParameters {
            function: "f".into(),
            param: "b".into(),
        }
    );
}

#[test]
fn omitted_arguments_take_folded_defaults() {
    let mut p = Program::new();
    let f = p.external(
        "f",
        &[("a", VariableType::INTEGER), ("b", VariableType::FLOAT)],
        VariableType::INTEGER,
    );
    let default = {
        let two = p.coder.integer(pos(), 2);
        let three = p.coder.integer(pos(), 3);
        p.coder.binary(pos(), BinaryOp::Add, two, three)
    };
    if let Some(def) = p.coder.symbols.function_mut(f) {
        def.params[1].default = Some(default);
    }
    p.declarations.push(f);
    let x = p.var("x", VariableType::INTEGER);
    let call = p.emit(|c| {
        let one = c.integer(pos(), 1);
        let call = c.call(pos(), f, vec![one]);
        c.emit_assign(pos(), x, call);
        call
    });
    let checked = p.check();
    checked.assert_clean();

    let ExprKind::FunctionCall { args, .. } = checked.kind(call) else {
        panic!("call was rewritten: {}", checked.dump_expr(call));
    };
    assert_eq!(args.len(), 2);
    assert_eq!(checked.kind(args[1]), &ExprKind::Constant(Value::Float(5.0)));
    assert_eq!(checked.dump_expr(call), "f(1, 5.0F)");
}

#[test]
fn aggregate_outside_select() {
    let mut p = Program::new();
    let x = p.var("x", VariableType::VARIANT);
    p.emit(|c| {
        let one = c.integer(pos(), 1);
        let sum = c.call_builtin(pos(), "SUM", vec![one]);
        c.emit_assign(pos(), x, sum);
    });
    assert_eq!(p.check().codes(), vec!["E0029"]);
}

// ── Assignment ─────────────────────────────────────────────────────────

#[test]
fn constants_cannot_be_assigned() {
    let mut p = Program::new();
    let limit = p.constant("limit", VariableType::INTEGER, Value::Integer(10));
    p.emit(|c| {
        let two = c.integer(pos(), 2);
        c.emit_assign(pos(), limit, two);
    });
    let checked = p.check();
    assert_eq!(
        checked.diagnostics()[0].kind,
        ErrorKind::CannotAssignConstant { name: "limit".into() }
    );
}

#[test]
fn rebind_only_where_a_pointer_is_stored() {
    let mut p = Program::new();
    let ptr = p.var("ptr", VariableType::FUNCTION_PTR);
    p.emit(|c| {
        let read = c.variable(pos(), ptr);
        let rebind = c.expr(
            at(1),
            ExprKind::FunctionPtrRebind {
                ptr: read,
                bindings: vec![PtrBinding::pass(1)],
            },
        );
        c.emit_assign(at(1), ptr, rebind);

        let read = c.variable(pos(), ptr);
        let rebind = c.expr(
            at(2),
            ExprKind::FunctionPtrRebind {
                ptr: read,
                bindings: vec![PtrBinding::pass(1)],
            },
        );
        c.emit_expr(at(2), rebind);
    });
    let checked = p.check();
    assert_eq!(checked.codes(), vec!["E0034"]);
    assert_eq!(checked.diagnostics()[0].position, at(2));
}

// ── Literals ───────────────────────────────────────────────────────────

#[test]
fn record_literal_cells() {
    let mut p = Program::new();
    let r = p.var("r", VariableType::RECORD);
    p.emit(|c| {
        let one = c.integer(at(1), 1);
        let two = c.integer(at(1), 2);
        let duplicate = c.expr(
            at(1),
            ExprKind::ConstantRecord {
                entries: vec![
                    RecordEntry::Set {
                        name: "a".into(),
                        value: one,
                    },
                    RecordEntry::Set {
                        name: "A".into(),
                        value: two,
                    },
                ],
            },
        );
        c.emit_assign(at(1), r, duplicate);

        let one = c.integer(at(2), 1);
        let unknown = c.expr(
            at(2),
            ExprKind::ConstantRecord {
                entries: vec![
                    RecordEntry::Set {
                        name: "a".into(),
                        value: one,
                    },
                    RecordEntry::Delete {
                        name: "b".into(),
                        pos: at(2),
                    },
                ],
            },
        );
        c.emit_assign(at(2), r, unknown);
    });
    let checked = p.check();
    let kinds: Vec<ErrorKind> = checked.diagnostics().iter().map(|d| d.kind.clone()).collect();
    assert_eq!(
        kinds,
        vec![
            ErrorKind::DuplicateCell { name: "A".into() },
            ErrorKind::DeleteUnknownCell { name: "B".into() },
        ]
    );
}

// ── SWITCH ─────────────────────────────────────────────────────────────

#[test]
fn repeated_case_label() {
    let mut p = Program::new();
    let x = p.var("x", VariableType::INTEGER);
    p.emit(|c| {
        let subject = c.variable(pos(), x);
        let mut cases = Vec::new();
        for line in 1..=2 {
            let label = c.integer(at(line), 7);
            let block = c.new_block(at(line));
            cases.push(SwitchCase {
                labels: vec![label],
                block,
            });
        }
        c.emit_stmt(
            pos(),
            StmtKind::Switch(Box::new(SwitchStatement {
                value: subject,
                cases,
                default: None,
                is_rewritten: false,
            })),
        );
    });
    let checked = p.check();
    let diagnostics = checked.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, ErrorKind::DuplicateCaseLabel { label: "7".into() });
    assert_eq!(diagnostics[0].position, at(2));
}

// ── Members ────────────────────────────────────────────────────────────

fn field(name: &str, kind: FieldKind, ty: VariableType) -> ObjectField {
    ObjectField {
        name: name.into(),
        kind,
        ty,
        method: None,
        default: None,
    }
}

#[test]
fn record_and_object_access_are_not_interchangeable() {
    let mut p = Program::new();
    let mut def = ObjectDef {
        is_static: true,
        ..ObjectDef::default()
    };
    def.add_field(field("x", FieldKind::Member, VariableType::INTEGER));
    def.add_field(field("draw", FieldKind::Method, VariableType::NO_RETURN));
    let point = p.coder.symbols.declare_object_type("point", pos(), def);
    let obj = p.var("obj", VariableType::OBJECT);
    if let Some(var) = p.coder.symbols.variable_mut(obj) {
        var.object_type = Some(point);
    }
    let rec = p.var("rec", VariableType::RECORD);
    let v = p.var("v", VariableType::VARIANT);
    let n = p.var("n", VariableType::INTEGER);
    p.emit(|c| {
        let base = c.variable(at(1), rec);
        let read = c.object_member(at(1), base, "a", false);
        c.emit_assign(at(1), v, read);

        let base = c.variable(at(2), obj);
        let read = c.record_column(at(2), base, "a");
        c.emit_assign(at(2), v, read);

        let base = c.variable(at(3), obj);
        let read = c.object_member(at(3), base, "draw", false);
        c.emit_assign(at(3), v, read);

        let base = c.variable(at(4), obj);
        let read = c.object_member(at(4), base, "y", false);
        c.emit_assign(at(4), v, read);

        let base = c.variable(at(5), obj);
        let read = c.object_member(at(5), base, "x", false);
        c.emit_assign(at(5), n, read);
    });
    let checked = p.check();
    let diagnostics = checked.diagnostics();
    let kinds: Vec<_> = diagnostics.iter().map(|d| (d.position.line, d.kind.clone())).collect();
    assert_eq!(
        kinds,
        vec![
            (1, ErrorKind::MemberOfRecord),
            (2, ErrorKind::ColumnOfObject),
            (3, ErrorKind::MethodWithoutCall { member: "DRAW".into() }),
            (
                4,
                ErrorKind::UnknownMember {
                    object_type: "point".into(),
                    member: "Y".into(),
                }
            ),
        ]
    );
}

// ── SELECT ─────────────────────────────────────────────────────────────

/// `SELECT <column> := r.<cell>, total := SUM(r.amount) FROM rows AS r
/// GROUP BY r.name`
fn grouped_select(cell: &str) -> common::Checked {
    let mut p = Program::new();
    let rows = p.var("rows", VariableType::RECORD_ARRAY);
    let row = p.var("r", VariableType::RECORD);
    let result = p.var("result", VariableType::RECORD_ARRAY);
    p.emit(|c| {
        let source = c.variable(pos(), rows);
        let read = c.variable(pos(), row);
        let column = c.record_column(pos(), read, cell);
        let read = c.variable(pos(), row);
        let amount = c.record_column(pos(), read, "amount");
        let total = c.call_builtin(pos(), "SUM", vec![amount]);
        let read = c.variable(pos(), row);
        let key = c.record_column(pos(), read, "name");
        let select = c.expr(
            pos(),
            ExprKind::SqlSelect(Box::new(SqlSelect {
                sources: vec![SqlSource { row, source }],
                temporaries: Vec::new(),
                columns: vec![
                    SelectColumn {
                        name: cell.into(),
                        value: column,
                    },
                    SelectColumn {
                        name: "total".into(),
                        value: total,
                    },
                ],
                condition: None,
                group_by: vec![key],
                having: None,
                order_by: Vec::new(),
                limit: None,
                single_column: false,
            })),
        );
        c.emit_assign(pos(), result, select);
    });
    p.check()
}

#[test]
fn grouped_select_reads_keys_and_aggregates() {
    grouped_select("name").assert_clean();
}

#[test]
fn grouped_select_rejects_other_columns() {
    let checked = grouped_select("city");
    assert_eq!(
        checked.diagnostics()[0].kind,
        ErrorKind::ColumnNotGrouped {
            column: "r.CITY".into()
        }
    );
}

// ── Completeness ───────────────────────────────────────────────────────

#[test]
fn every_rvalue_gets_a_type() {
    let mut p = Program::new();
    let f = p.external("f", &[("v", VariableType::INTEGER)], VariableType::INTEGER_ARRAY);
    let x = p.var("x", VariableType::FLOAT);
    let list = p.var("list", VariableType::INTEGER_ARRAY);
    p.emit(|c| {
        let one = c.integer(pos(), 1);
        let call = c.call(pos(), f, vec![one]);
        c.emit_assign(pos(), list, call);

        let read = c.variable(pos(), list);
        let zero = c.integer(pos(), 0);
        let element = c.array_element(pos(), read, zero);
        let read = c.variable(pos(), list);
        let length = c.call_builtin(pos(), builtins::LENGTH, vec![read]);
        let ratio = c.binary(pos(), BinaryOp::Divide, element, length);
        let condition = c.boolean(pos(), true);
        let half = c.constant(pos(), Value::Float(0.5));
        let value = c.expr(
            pos(),
            ExprKind::ConditionalOperator {
                condition,
                then: ratio,
                otherwise: half,
            },
        );
        c.emit_assign(pos(), x, value);
    });
    p.check().assert_clean();
}
