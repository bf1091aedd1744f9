//! Constant folding during checking.

mod common;

use common::{at, pos, Program};
use hare_ast::{ExprKind, RecordEntry, StmtKind, SwitchCase, SwitchStatement};
use hare_common::ErrorKind;
use hare_sema::{CompileOptions, Optimizable};
use hare_value::{builtins, BinaryOp, Record, Value, VariableType};

fn no_folding() -> CompileOptions {
    CompileOptions {
        fold_constants: false,
        ..CompileOptions::default()
    }
}

// ── Operators ──────────────────────────────────────────────────────────

#[test]
fn arithmetic_folds_to_a_literal() {
    let mut p = Program::new();
    let x = p.var("x", VariableType::INTEGER);
    let sum = p.emit(|c| {
        let two = c.integer(pos(), 2);
        let three = c.integer(pos(), 3);
        let four = c.integer(pos(), 4);
        let product = c.binary(pos(), BinaryOp::Multiply, three, four);
        let sum = c.binary(pos(), BinaryOp::Add, two, product);
        c.emit_assign(pos(), x, sum);
        sum
    });
    let checked = p.check();
    checked.assert_clean();
    assert_eq!(checked.kind(sum), &ExprKind::Constant(Value::Integer(14)));
    insta::assert_snapshot!(checked.dump(), @"x := 14;");
}

#[test]
fn folding_can_be_switched_off() {
    let mut p = Program::new();
    let x = p.var("x", VariableType::INTEGER);
    let sum = p.emit(|c| {
        let two = c.integer(pos(), 2);
        let three = c.integer(pos(), 3);
        let sum = c.binary(pos(), BinaryOp::Add, two, three);
        c.emit_assign(pos(), x, sum);
        sum
    });
    let checked = p.check_with(no_folding());
    checked.assert_clean();
    assert!(matches!(checked.kind(sum), ExprKind::BinaryOperator { .. }));

    let mut machine = checked.machine();
    machine.run(checked.body);
    assert_eq!(machine.get(x), Value::Integer(5));
}

#[test]
fn overflow_is_reported_and_the_node_kept() {
    let mut p = Program::new();
    let x = p.var("x", VariableType::INTEGER);
    let sum = p.emit(|c| {
        let max = c.integer(at(3), i32::MAX);
        let one = c.integer(at(3), 1);
        let sum = c.binary(at(3), BinaryOp::Add, max, one);
        c.emit_assign(at(3), x, sum);
        sum
    });
    let checked = p.check();
    let diagnostics = checked.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(
        diagnostics[0].kind,
        ErrorKind::ConstantFoldFailed {
            reason: "INTEGER overflow".into()
        }
    );
    assert_eq!(diagnostics[0].position, at(3));
    assert!(matches!(checked.kind(sum), ExprKind::BinaryOperator { .. }));
}

#[test]
fn constant_conditional_selects_its_branch() {
    let mut p = Program::new();
    let f = p.external("f", &[], VariableType::INTEGER);
    let x = p.var("x", VariableType::INTEGER);
    let value = p.emit(|c| {
        let condition = c.boolean(pos(), true);
        let then = c.call(pos(), f, Vec::new());
        let otherwise = c.integer(pos(), 2);
        let value = c.expr(
            pos(),
            ExprKind::ConditionalOperator {
                condition,
                then,
                otherwise,
            },
        );
        c.emit_assign(pos(), x, value);
        value
    });
    let checked = p.check();
    checked.assert_clean();
    assert!(matches!(checked.kind(value), ExprKind::FunctionCall { .. }));
    assert_eq!(checked.dump_expr(value), "f()");
}

// ── IF ─────────────────────────────────────────────────────────────────

#[test]
fn constant_if_keeps_only_the_taken_branch() {
    let mut p = Program::new();
    let x = p.var("x", VariableType::INTEGER);
    let (skipped, taken) = p.emit(|c| {
        let never = c.boolean(pos(), false);
        let skipped = c.emit_if(pos(), never, |c| {
            let one = c.integer(pos(), 1);
            c.emit_assign(pos(), x, one);
        });

        let always = c.boolean(pos(), true);
        let taken = c.emit_if_else(
            pos(),
            always,
            |c| {
                let two = c.integer(pos(), 2);
                c.emit_assign(pos(), x, two);
            },
            |c| {
                let three = c.integer(pos(), 3);
                c.emit_assign(pos(), x, three);
            },
        );
        (skipped, taken)
    });
    let checked = p.check();
    checked.assert_clean();

    let ast = &checked.sema.coder.ast;
    let StmtKind::Block(empty) = ast.stmt(skipped).kind else {
        panic!("IF FALSE was not removed");
    };
    assert!(ast.block(empty).statements.is_empty());
    assert!(matches!(ast.stmt(taken).kind, StmtKind::Block(_)));

    let mut machine = checked.machine();
    machine.run(checked.body);
    assert_eq!(machine.get(x), Value::Integer(2));
}

// ── Records and arrays ─────────────────────────────────────────────────

#[test]
fn literal_record_is_built_from_its_constant_prefix() {
    let mut p = Program::new();
    let f = p.external("f", &[], VariableType::INTEGER);
    let r = p.var("r", VariableType::RECORD);
    let literal = p.emit(|c| {
        let one = c.integer(pos(), 1);
        let two = c.integer(pos(), 2);
        let call = c.call(pos(), f, Vec::new());
        let literal = c.expr(
            pos(),
            ExprKind::ConstantRecord {
                entries: vec![
                    RecordEntry::Set {
                        name: "a".into(),
                        value: one,
                    },
                    RecordEntry::Set {
                        name: "b".into(),
                        value: two,
                    },
                    RecordEntry::Set {
                        name: "c".into(),
                        value: call,
                    },
                ],
            },
        );
        c.emit_assign(pos(), r, literal);
        literal
    });
    let checked = p.check();
    checked.assert_clean();
    assert!(matches!(checked.kind(literal), ExprKind::ExpressionBlock { .. }));
    let dump = checked.dump();
    assert!(dump.contains("[a := 1, b := 2]"), "{dump}");
    assert!(dump.contains(":RECORDCELLSET("), "{dump}");

    let mut machine = checked.machine().hook("f", |_| Value::Integer(3));
    machine.run(checked.body);
    let mut expected = Record::empty();
    expected.set("a", Value::Integer(1));
    expected.set("b", Value::Integer(2));
    expected.set("c", Value::Integer(3));
    assert_eq!(machine.get(r), Value::Record(expected));
}

#[test]
fn fully_constant_record_becomes_one_literal() {
    let mut p = Program::new();
    let r = p.var("r", VariableType::RECORD);
    p.emit(|c| {
        let one = c.integer(pos(), 1);
        let text = c.string(pos(), "x");
        let literal = c.expr(
            pos(),
            ExprKind::ConstantRecord {
                entries: vec![
                    RecordEntry::Set {
                        name: "a".into(),
                        value: one,
                    },
                    RecordEntry::Set {
                        name: "b".into(),
                        value: text,
                    },
                    RecordEntry::Delete {
                        name: "a".into(),
                        pos: pos(),
                    },
                ],
            },
        );
        c.emit_assign(pos(), r, literal);
    });
    let checked = p.check();
    checked.assert_clean();
    insta::assert_snapshot!(checked.dump(), @r#"r := [b := "x"];"#);
}

#[test]
fn cell_of_a_constant_record() {
    let mut p = Program::new();
    let x = p.var("x", VariableType::INTEGER);
    let read = p.emit(|c| {
        let one = c.integer(pos(), 1);
        let literal = c.expr(
            pos(),
            ExprKind::ConstantRecord {
                entries: vec![RecordEntry::Set {
                    name: "a".into(),
                    value: one,
                }],
            },
        );
        let read = c.record_column(pos(), literal, "a");
        c.emit_assign(pos(), x, read);
        read
    });
    let checked = p.check();
    checked.assert_clean();
    assert_eq!(checked.kind(read), &ExprKind::Constant(Value::Integer(1)));
    assert_eq!(checked.type_of(read), Some(VariableType::INTEGER));
}

#[test]
fn missing_cell_of_a_constant_record() {
    let mut p = Program::new();
    let x = p.var("x", VariableType::VARIANT);
    let read = p.emit(|c| {
        let one = c.integer(pos(), 1);
        let literal = c.expr(
            pos(),
            ExprKind::ConstantRecord {
                entries: vec![RecordEntry::Set {
                    name: "a".into(),
                    value: one,
                }],
            },
        );
        let read = c.record_column(pos(), literal, "b");
        c.emit_assign(pos(), x, read);
        read
    });
    let checked = p.check();
    assert_eq!(
        checked.diagnostics()[0].kind,
        ErrorKind::ConstantFoldFailed {
            reason: "record has no cell B".into()
        }
    );
    assert!(matches!(checked.kind(read), ExprKind::RecordColumnConst { .. }));
}

// ── Names and calls ────────────────────────────────────────────────────

#[test]
fn named_constants_fold_into_their_uses() {
    let mut p = Program::new();
    let limit = p.constant("limit", VariableType::INTEGER, Value::Integer(10));
    let x = p.var("x", VariableType::INTEGER);
    let product = p.emit(|c| {
        let read = c.variable(pos(), limit);
        let two = c.integer(pos(), 2);
        let product = c.binary(pos(), BinaryOp::Multiply, read, two);
        c.emit_assign(pos(), x, product);
        product
    });
    let checked = p.check();
    checked.assert_clean();
    assert_eq!(checked.kind(product), &ExprKind::Constant(Value::Integer(20)));
}

#[test]
fn pure_builtin_with_constant_arguments() {
    let mut p = Program::new();
    let x = p.var("x", VariableType::INTEGER);
    let call = p.emit(|c| {
        let text = c.string(pos(), "abc");
        let call = c.call_builtin(pos(), builtins::LENGTH, vec![text]);
        c.emit_assign(pos(), x, call);
        call
    });
    let checked = p.check();
    checked.assert_clean();
    assert_eq!(checked.kind(call), &ExprKind::Constant(Value::Integer(3)));
}

#[test]
fn impure_calls_are_never_folded() {
    let mut p = Program::new();
    let f = p.external("f", &[("v", VariableType::INTEGER)], VariableType::INTEGER);
    let x = p.var("x", VariableType::INTEGER);
    let call = p.emit(|c| {
        let one = c.integer(pos(), 1);
        let call = c.call(pos(), f, vec![one]);
        c.emit_assign(pos(), x, call);
        call
    });
    let checked = p.check();
    checked.assert_clean();
    assert!(matches!(checked.kind(call), ExprKind::FunctionCall { .. }));
}

#[test]
fn switch_label_must_be_constant() {
    let mut p = Program::new();
    let x = p.var("x", VariableType::INTEGER);
    let y = p.var("y", VariableType::INTEGER);
    p.emit(|c| {
        let subject = c.variable(pos(), x);
        let label = c.variable(at(4), y);
        let block = c.new_block(pos());
        c.emit_stmt(
            pos(),
            StmtKind::Switch(Box::new(SwitchStatement {
                value: subject,
                cases: vec![SwitchCase {
                    labels: vec![label],
                    block,
                }],
                default: None,
                is_rewritten: false,
            })),
        );
    });
    let checked = p.check();
    let diagnostics = checked.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, ErrorKind::ExpectedConstantExpression);
    assert_eq!(diagnostics[0].position, at(4));
}

#[test]
fn failed_constant_is_not_reported_twice() {
    let mut p = Program::new();
    let overflow = {
        let max = p.coder.integer(pos(), i32::MAX);
        let one = p.coder.integer(pos(), 1);
        p.coder.binary(pos(), BinaryOp::Add, max, one)
    };
    let limit = p.var("limit", VariableType::INTEGER);
    if let Some(def) = p.coder.symbols.variable_mut(limit) {
        def.is_constant = true;
        def.constant_value = Some(overflow);
    }
    p.declarations.push(limit);
    let checked = p.check();
    assert_eq!(checked.codes(), vec!["E0039"]);
}

// ── Public optimizer ───────────────────────────────────────────────────

#[test]
fn optimize_reports_literals_and_foldable_trees() {
    let mut p = Program::new();
    let x = p.var("x", VariableType::INTEGER);
    let y = p.var("y", VariableType::INTEGER);
    let (literal, sum, read) = p.emit(|c| {
        let literal = c.integer(pos(), 9);
        c.emit_assign(pos(), x, literal);
        let two = c.integer(pos(), 2);
        let three = c.integer(pos(), 3);
        let sum = c.binary(pos(), BinaryOp::Add, two, three);
        c.emit_assign(pos(), x, sum);
        let read = c.variable(pos(), y);
        c.emit_assign(pos(), x, read);
        (literal, sum, read)
    });
    let mut checked = p.check_with(no_folding());
    let sema = &mut checked.sema;

    assert_eq!(sema.optimize(literal), Optimizable::Single);
    assert_eq!(sema.take_folded(), Some(Value::Integer(9)));

    assert_eq!(sema.optimize(sum), Optimizable::Multiple);
    assert_eq!(sema.take_folded(), Some(Value::Integer(5)));

    assert_eq!(sema.optimize(read), Optimizable::None);
    assert_eq!(sema.take_folded(), None);
}
