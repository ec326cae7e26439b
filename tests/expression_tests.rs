mod common;

use common::{int, ints, Harness};
use exprgen::catalog::ColumnInfo;
use exprgen::codegen::{InFlags, InStrategy};
use exprgen::expression::{compare, ExprMatch, Resolver, Select, SrcItem};
use exprgen::function::{FuncDef, FuncFlags};
use exprgen::vdbe::Opcode;
use exprgen::{Catalog, CompileError, CompilerConfig, Expr, ExprList, Value};
use std::sync::atomic::{AtomicUsize, Ordering};

#[test]
fn test_in_truth_table() {
    let h = Harness::new();
    assert_eq!(h.eval(&Expr::in_list(int(1), vec![int(2), Expr::null()])), Value::Null);
    assert_eq!(
        h.eval(&Expr::in_list(int(1), vec![int(1), Expr::null()])),
        Value::Integer(1)
    );
    assert_eq!(h.eval(&Expr::in_list(int(1), ints(&[2, 3]))), Value::Integer(0));
    assert_eq!(
        h.eval(&Expr::not_in_list(int(1), vec![int(2), Expr::null()])),
        Value::Null
    );
    assert_eq!(h.eval(&Expr::not_in_list(int(1), ints(&[2, 3]))), Value::Integer(1));
}

#[test]
fn test_vector_ordering() {
    let h = Harness::new();
    let lt = Expr::lt(Expr::vector(ints(&[1, 2])), Expr::vector(ints(&[1, 3])));
    assert_eq!(h.eval(&lt), Value::Integer(1));
    let unknown = Expr::lt(
        Expr::vector(ints(&[1, 2])),
        Expr::vector(vec![int(1), Expr::null()]),
    );
    assert_eq!(h.eval(&unknown), Value::Null);
}

#[test]
fn test_affinity_coercion() {
    let h = Harness::new();
    let t = h.table(
        "t",
        vec![
            ColumnInfo::new("a", Some("INT")),
            ColumnInfo::new("b", Some("TEXT")),
        ],
    );
    h.insert(&t, vec![Value::Integer(10), Value::Text("10".into())]);
    let a = Expr::column(0, 0, Some(t.clone()));
    let b = Expr::column(0, 1, Some(t.clone()));

    // Numeric column against a text literal compares numerically
    let rows = h.scan(&t, 0, &Expr::eq(a.clone(), Expr::string("10")));
    assert_eq!(rows, vec![(Value::Integer(1), Some(true))]);
    let rows = h.scan(&t, 0, &Expr::lt(a.clone(), Expr::string("9")));
    assert_eq!(rows, vec![(Value::Integer(0), Some(false))]);

    // Text column against a numeric literal compares as text
    let rows = h.scan(&t, 0, &Expr::eq(b.clone(), int(10)));
    assert_eq!(rows, vec![(Value::Integer(1), Some(true))]);
    let rows = h.scan(&t, 0, &Expr::lt(b.clone(), int(9)));
    assert_eq!(rows, vec![(Value::Integer(1), Some(true))]);

    // Numeric wins when both sides carry an affinity
    let rows = h.scan(&t, 0, &Expr::eq(a, b));
    assert_eq!(rows, vec![(Value::Integer(1), Some(true))]);
}

#[test]
fn test_planner_selection() {
    let h = Harness::new();
    h.table(
        "t",
        vec![
            ColumnInfo::new("id", Some("INTEGER")).primary_key(),
            ColumnInfo::new("b", Some("INT")),
            ColumnInfo::new("c", Some("INT")),
        ],
    );
    h.catalog.add_index("t", "t_b", &[("b", None)], false, None).unwrap();
    let t = h.reload("t");

    let plan_for = |column: i16, filtered: bool| {
        let mut cg = h.codegen();
        let cur = cg.alloc_cursor();
        let mut select = Select::new(ExprList::new().with(Expr::column(cur, column, Some(t.clone()))))
            .from_table(t.clone(), cur);
        if filtered {
            select = select.filter(Expr::gt(Expr::column(cur, 2, Some(t.clone())), int(0)));
        }
        let expr = Expr::in_select(Expr::variable(1), select);
        cg.plan_in_rhs(&expr, InFlags::NOOP_OK | InFlags::MEMBERSHIP, false)
            .unwrap()
            .strategy
    };
    assert_eq!(plan_for(0, false), InStrategy::UseRowidTable);
    assert_eq!(plan_for(1, false), InStrategy::UseExistingIndex);
    assert_eq!(plan_for(2, false), InStrategy::UseEphemeralTable);
    assert_eq!(plan_for(1, true), InStrategy::UseEphemeralTable);
}

#[test]
fn test_literal_list_switches_to_table_past_threshold() {
    let h = Harness::with_config(CompilerConfig {
        in_list_table_threshold: 49,
        ..CompilerConfig::default()
    });
    let strategy = |n: i64| {
        let mut cg = h.codegen();
        let items: Vec<i64> = (1..=n).collect();
        let expr = Expr::in_list(Expr::variable(1), ints(&items));
        cg.plan_in_rhs(&expr, InFlags::NOOP_OK | InFlags::MEMBERSHIP, true)
            .unwrap()
            .strategy
    };
    assert_eq!(strategy(3), InStrategy::NoTable);
    assert_eq!(strategy(49), InStrategy::NoTable);
    assert_eq!(strategy(50), InStrategy::UseEphemeralTable);

    // Both strategies give the same answers
    for n in [3, 50] {
        let items: Vec<i64> = (1..=n).collect();
        let expr = Expr::in_list(Expr::variable(1), ints(&items));
        let mut cg = h.codegen();
        let out = cg.alloc_reg();
        cg.code_expr(&expr, out).unwrap();
        cg.builder().emit_op2(Opcode::ResultRow, out, 1);
        let program = cg.finish().unwrap();
        for (probe, expected) in [(2, 1), (0, 0), (n, 1), (n + 1, 0)] {
            let rows = h.run(&program, vec![Value::Integer(probe)]);
            assert_eq!(rows, vec![vec![Value::Integer(expected)]], "{} of {}", probe, n);
        }
        let rows = h.run(&program, vec![Value::Null]);
        assert_eq!(rows, vec![vec![Value::Null]]);
    }
}

#[test]
fn test_in_subquery_against_table() {
    let h = Harness::new();
    let t = h.table(
        "t",
        vec![
            ColumnInfo::new("a", Some("INT")),
            ColumnInfo::new("b", Some("INT")),
        ],
    );
    let u = h.table("u", vec![ColumnInfo::new("x", Some("INT"))]);
    for (a, b) in [(1, Some(1)), (2, None), (3, Some(4))] {
        h.insert(&t, vec![Value::Integer(a), b.map_or(Value::Null, Value::Integer)]);
    }
    for x in [1, 2] {
        h.insert(&u, vec![Value::Integer(x)]);
    }
    h.catalog.add_index("t", "t_b", &[("b", None)], false, None).unwrap();
    let t = h.reload("t");

    // u.x IN (SELECT b FROM t): 1 is found; 2 is not but t.b holds a NULL
    let mut expr = Expr::in_select(
        Expr::ident("x"),
        Select::new(ExprList::new().with(Expr::ident("b"))).from_table(t.clone(), 1),
    );
    let resolver = Resolver::new(
        &h.catalog,
        vec![SrcItem {
            table: u.clone(),
            cursor: 0,
            alias: None,
        }],
    );
    resolver.resolve(&mut expr).unwrap();
    let rows = h.scan(&u, 0, &expr);
    assert_eq!(
        rows,
        vec![(Value::Integer(1), Some(true)), (Value::Null, None)]
    );
}

#[test]
fn test_correlated_subquery_runs_per_row() {
    let h = Harness::new();
    let t = h.table("t", vec![ColumnInfo::new("a", Some("INT"))]);
    let u = h.table("u", vec![ColumnInfo::new("a", Some("INT"))]);
    for a in [1, 2, 3] {
        h.insert(&t, vec![Value::Integer(a)]);
    }
    for a in [2, 3] {
        h.insert(&u, vec![Value::Integer(a)]);
    }
    // EXISTS (SELECT 1 FROM u WHERE u.a = t.a)
    let mut expr = Expr::exists(
        Select::new(ExprList::new().with(int(1)))
            .from_table(u.clone(), 1)
            .filter(Expr::eq(Expr::column(1, 0, Some(u.clone())), Expr::ident("t.a"))),
    );
    let resolver = Resolver::new(
        &h.catalog,
        vec![SrcItem {
            table: t.clone(),
            cursor: 0,
            alias: None,
        }],
    );
    resolver.resolve(&mut expr).unwrap();
    let values: Vec<Value> = h.scan(&t, 0, &expr).into_iter().map(|(v, _)| v).collect();
    assert_eq!(
        values,
        vec![Value::Integer(0), Value::Integer(1), Value::Integer(1)]
    );
}

static TICKS: AtomicUsize = AtomicUsize::new(0);

fn tick(_: &[Value], _: Option<&exprgen::catalog::CollSeq>) -> anyhow::Result<Value> {
    TICKS.fetch_add(1, Ordering::SeqCst);
    Ok(Value::Integer(7))
}

#[test]
fn test_hoisted_constant_runs_once() {
    let mut catalog = Catalog::new();
    catalog
        .functions_mut()
        .register(FuncDef::scalar("tick", 0, FuncFlags::CONSTANT, tick));
    let h = Harness {
        catalog,
        ..Harness::new()
    };
    let t = h.table("t", vec![ColumnInfo::new("a", Some("INT"))]);
    for a in [1, 2, 3, 4] {
        h.insert(&t, vec![Value::Integer(a)]);
    }

    // tick() + a, twice in the same statement
    let mut expr = Expr::add(Expr::function("tick", vec![]), Expr::ident("a"));
    let resolver = Resolver::new(
        &h.catalog,
        vec![SrcItem {
            table: t.clone(),
            cursor: 0,
            alias: None,
        }],
    );
    resolver.resolve(&mut expr).unwrap();
    let twice = Expr::add(expr.clone(), expr);

    let rows = h.scan(&t, 0, &twice);
    let values: Vec<Value> = rows.into_iter().map(|(v, _)| v).collect();
    assert_eq!(
        values,
        vec![
            Value::Integer(16),
            Value::Integer(18),
            Value::Integer(20),
            Value::Integer(22)
        ]
    );
    assert_eq!(TICKS.load(Ordering::SeqCst), 1);
}

#[test]
fn test_hoisted_constant_shares_a_register() {
    let h = Harness::new();
    let mut cg = h.codegen();
    let expr = Expr::function("abs", vec![int(-3)]);
    let first = cg.code_at_init(&expr, None);
    let second = cg.code_at_init(&expr.clone(), None);
    assert_eq!(first, second);
    // A pinned target is never shared
    let pinned = cg.alloc_reg();
    assert_eq!(cg.code_at_init(&expr, Some(pinned)), pinned);
    assert_eq!(cg.code_at_init(&expr, None), first);
}

#[test]
fn test_duplicate_compares_equal() {
    let e = Expr::case(
        Some(Expr::ident("x")),
        vec![(int(1), Expr::string("one"))],
        Some(Expr::collate(Expr::string("other"), "NOCASE")),
    );
    assert_eq!(compare(&e.clone(), &e, None), ExprMatch::Equal);
    assert_eq!(compare(&e.reduced_copy(), &e, None), ExprMatch::Equal);
}

#[test]
fn test_errors_abort_only_the_statement() {
    let h = Harness::new();
    let mut cg = h.codegen();
    let err = cg
        .code_expr(&Expr::function("no_such_fn", vec![int(1)]), 1)
        .unwrap_err();
    assert_eq!(err, CompileError::UnknownFunction("no_such_fn".to_string()));
    // The next statement compiles normally
    assert_eq!(h.eval(&Expr::add(int(1), int(2))), Value::Integer(3));
}

#[test]
fn test_explain_listing() {
    let h = Harness::new();
    let mut cg = h.codegen();
    let out = cg.alloc_reg();
    cg.code_expr(&Expr::lt(Expr::variable(1), int(5)), out).unwrap();
    let program = cg.finish().unwrap();
    let listing = program.to_string();
    assert!(listing.starts_with("addr  opcode"));
    assert!(listing.contains("Init"));
    assert!(listing.contains("Lt"));
    assert!(listing.contains("Halt"));
}
