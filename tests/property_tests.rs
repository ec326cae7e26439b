mod common;

use common::{int, Harness};
use exprgen::catalog::{ColumnInfo, TableInfo};
use exprgen::expression::{compare, ExprMatch, UnaryOperator};
use exprgen::{Expr, Value};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

const CURSOR: i32 = 0;

fn setup() -> (Harness, Arc<TableInfo>) {
    let h = Harness::new();
    let t = h.table(
        "t",
        vec![
            ColumnInfo::new("a", Some("INT")),
            ColumnInfo::new("b", Some("INT")),
            ColumnInfo::new("c", Some("TEXT")),
        ],
    );
    let values = [None, Some(0), Some(1), Some(2)];
    for a in values {
        for b in values {
            let c = match (a, b) {
                (Some(x), Some(y)) if x == y => Value::Text(x.to_string()),
                (Some(_), None) => Value::Null,
                _ => Value::Text("z".into()),
            };
            h.insert(
                &t,
                vec![
                    a.map_or(Value::Null, Value::Integer),
                    b.map_or(Value::Null, Value::Integer),
                    c,
                ],
            );
        }
    }
    (h, t)
}

struct TreeGen<'a> {
    rng: StdRng,
    table: &'a Arc<TableInfo>,
}

impl<'a> TreeGen<'a> {
    fn column(&mut self) -> Expr {
        let column = self.rng.gen_range(0..2);
        Expr::column(CURSOR, column, Some(self.table.clone()))
    }

    fn scalar(&mut self) -> Expr {
        match self.rng.gen_range(0..6) {
            0 => Expr::null(),
            1 | 2 => int(self.rng.gen_range(-1..3)),
            _ => self.column(),
        }
    }

    fn leaf(&mut self) -> Expr {
        match self.rng.gen_range(0..10) {
            0 => {
                let builders: [fn(Expr, Expr) -> Expr; 8] = [
                    Expr::eq,
                    Expr::ne,
                    Expr::lt,
                    Expr::le,
                    Expr::gt,
                    Expr::ge,
                    Expr::is,
                    Expr::is_not,
                ];
                let build = *builders.choose(&mut self.rng).unwrap_or(&builders[0]);
                let (l, r) = (self.scalar(), self.scalar());
                build(l, r)
            }
            1 => {
                let operand = self.scalar();
                if self.rng.gen_bool(0.5) {
                    Expr::is_null(operand)
                } else {
                    Expr::not_null(operand)
                }
            }
            2 => {
                let n = self.rng.gen_range(1..5);
                let items = (0..n).map(|_| self.scalar()).collect();
                let operand = self.scalar();
                if self.rng.gen_bool(0.5) {
                    Expr::in_list(operand, items)
                } else {
                    Expr::not_in_list(operand, items)
                }
            }
            3 => {
                let (x, lo, hi) = (self.scalar(), self.scalar(), self.scalar());
                if self.rng.gen_bool(0.5) {
                    Expr::between(x, lo, hi)
                } else {
                    Expr::not_between(x, lo, hi)
                }
            }
            4 => {
                let ops = [
                    UnaryOperator::IsTrue,
                    UnaryOperator::IsNotTrue,
                    UnaryOperator::IsFalse,
                    UnaryOperator::IsNotFalse,
                ];
                let op = *ops.choose(&mut self.rng).unwrap_or(&ops[0]);
                let operand = self.scalar();
                Expr::unary(op, operand)
            }
            5 => {
                let n = self.rng.gen_range(2..4);
                let left = Expr::vector((0..n).map(|_| self.scalar()).collect());
                let right = Expr::vector((0..n).map(|_| self.scalar()).collect());
                if self.rng.gen_bool(0.5) {
                    Expr::lt(left, right)
                } else {
                    Expr::eq(left, right)
                }
            }
            6 => Expr::boolean(self.rng.gen_bool(0.5)),
            7 => Expr::eq(
                Expr::column(CURSOR, 2, Some(self.table.clone())),
                int(self.rng.gen_range(0..3)),
            ),
            _ => self.scalar(),
        }
    }

    fn tree(&mut self, depth: u32) -> Expr {
        if depth == 0 || self.rng.gen_bool(0.3) {
            return self.leaf();
        }
        match self.rng.gen_range(0..4) {
            0 => Expr::and(self.tree(depth - 1), self.tree(depth - 1)),
            1 => Expr::or(self.tree(depth - 1), self.tree(depth - 1)),
            2 => Expr::not(self.tree(depth - 1)),
            _ => Expr::case(
                None,
                vec![(self.tree(depth - 1), self.tree(depth - 1))],
                Some(self.tree(depth - 1)),
            ),
        }
    }
}

#[test]
fn test_value_and_branch_code_agree() {
    let (h, t) = setup();
    let mut gen = TreeGen {
        rng: StdRng::seed_from_u64(0x5eed),
        table: &t,
    };
    for _ in 0..200 {
        let expr = gen.tree(4);
        for jump_if_null in [false, true] {
            for (value, branch) in h.scan_with(&t, CURSOR, &expr, jump_if_null) {
                assert_eq!(
                    value.to_bool(),
                    branch,
                    "{} gave {:?} (jump_if_null={})",
                    expr,
                    value,
                    jump_if_null
                );
            }
        }
    }
}

#[test]
fn test_copies_compare_equal() {
    let (_h, t) = setup();
    let mut gen = TreeGen {
        rng: StdRng::seed_from_u64(17),
        table: &t,
    };
    for _ in 0..200 {
        let expr = gen.tree(5);
        assert_eq!(compare(&expr.clone(), &expr, None), ExprMatch::Equal, "{}", expr);
    }
}

#[test]
fn test_in_matches_disjunction() {
    let (h, t) = setup();
    let mut gen = TreeGen {
        rng: StdRng::seed_from_u64(99),
        table: &t,
    };
    for _ in 0..100 {
        let operand = gen.column();
        let n = gen.rng.gen_range(1..6);
        let items: Vec<Expr> = (0..n).map(|_| gen.scalar()).collect();
        let in_expr = Expr::in_list(operand.clone(), items.clone());
        let disjunction = items
            .into_iter()
            .map(|item| Expr::eq(operand.clone(), item))
            .reduce(Expr::or)
            .unwrap_or_else(|| Expr::boolean(false));
        let got = h.scan(&t, CURSOR, &in_expr);
        let expected = h.scan(&t, CURSOR, &disjunction);
        for ((v1, _), (v2, _)) in got.iter().zip(&expected) {
            assert_eq!(v1.to_bool(), v2.to_bool(), "{} vs {}", in_expr, disjunction);
        }
    }
}
