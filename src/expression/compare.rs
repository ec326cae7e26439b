//! Structural tree equality and implication.

use crate::expression::{
    BinaryOperator, ColumnRef, Expr, ExprFlags, ExprKind, ExprList, InRhs, IntLiteral,
    UnaryOperator, WindowDef,
};
use std::sync::Arc;

/// Outcome of a structural comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExprMatch {
    Equal,
    /// Equal once a COLLATE wrapper at the top of one side is removed
    EqualModuloTopCollate,
    Different,
}

impl ExprMatch {
    pub fn is_equal(self) -> bool {
        self == ExprMatch::Equal
    }
}

/// Compare two trees.
///
/// When `tab` is given, a column on cursor `tab` in `a` also matches the
/// same column on a negative (self-row) cursor in `b`.
pub fn compare(a: &Expr, b: &Expr, tab: Option<i32>) -> ExprMatch {
    use ExprKind as K;

    let (ka, kb) = (a.kind(), b.kind());
    if let (K::Integer(IntLiteral::Inline(x)), K::Integer(IntLiteral::Inline(y))) = (ka, kb) {
        return if x == y {
            ExprMatch::Equal
        } else {
            ExprMatch::Different
        };
    }
    if std::mem::discriminant(ka) != std::mem::discriminant(kb) || matches!(ka, K::Raise { .. }) {
        if let K::Collate { operand, .. } = ka {
            if compare(operand, b, tab) != ExprMatch::Different {
                return ExprMatch::EqualModuloTopCollate;
            }
        }
        if let K::Collate { operand, .. } = kb {
            if compare(a, operand, tab) != ExprMatch::Different {
                return ExprMatch::EqualModuloTopCollate;
            }
        }
        return ExprMatch::Different;
    }
    if a.flags() & ExprFlags::DISTINCT != b.flags() & ExprFlags::DISTINCT {
        return ExprMatch::Different;
    }

    let same = match (ka, kb) {
        (K::Null, K::Null) => return ExprMatch::Equal,
        (K::Integer(x), K::Integer(y)) => x == y,
        (K::Float(x), K::Float(y))
        | (K::String(x), K::String(y))
        | (K::Blob(x), K::Blob(y))
        | (K::Id(x), K::Id(y)) => x == y,
        (K::Boolean(x), K::Boolean(y)) => x == y,
        (K::Variable { index: x, name: nx }, K::Variable { index: y, name: ny }) => {
            x == y && nx == ny
        }
        (K::Column(x), K::Column(y)) => columns_match(x, y, tab),
        (
            K::AggColumn {
                index: ix,
                column: x,
            },
            K::AggColumn {
                index: iy,
                column: y,
            },
        ) => ix == iy && columns_match(x, y, tab),
        (K::AggFunction { index: ix, call: x }, K::AggFunction { index: iy, call: y }) => {
            ix == iy
                && x.name.eq_ignore_ascii_case(&y.name)
                && compare_list(&x.args, &y.args, tab).is_equal()
        }
        (K::Function(x), K::Function(y)) => {
            x.name.eq_ignore_ascii_case(&y.name)
                && windows_match(x.window.as_ref(), y.window.as_ref())
                && compare_list(&x.args, &y.args, tab).is_equal()
        }
        (
            K::Register {
                reg: rx,
                original: ox,
            },
            K::Register {
                reg: ry,
                original: oy,
            },
        ) => rx == ry && compare(ox, oy, tab).is_equal(),
        (K::Unary { op: ox, operand: x }, K::Unary { op: oy, operand: y }) => {
            ox == oy && compare(x, y, tab).is_equal()
        }
        (
            K::Binary {
                op: ox,
                left: lx,
                right: rx,
            },
            K::Binary {
                op: oy,
                left: ly,
                right: ry,
            },
        ) => ox == oy && compare(lx, ly, tab).is_equal() && compare(rx, ry, tab).is_equal(),
        (
            K::Collate {
                operand: x,
                collation: cx,
            },
            K::Collate {
                operand: y,
                collation: cy,
            },
        ) => cx.eq_ignore_ascii_case(cy) && compare(x, y, tab).is_equal(),
        (
            K::Cast {
                operand: x,
                type_name: tx,
            },
            K::Cast {
                operand: y,
                type_name: ty,
            },
        ) => tx == ty && compare(x, y, tab).is_equal(),
        (
            K::Case {
                base: bx,
                arms: ax,
                otherwise: ex,
            },
            K::Case {
                base: by,
                arms: ay,
                otherwise: ey,
            },
        ) => {
            optional_match(bx.as_deref(), by.as_deref(), tab)
                && ax.len() == ay.len()
                && ax.iter().zip(ay).all(|((wx, tx), (wy, ty))| {
                    compare(wx, wy, tab).is_equal() && compare(tx, ty, tab).is_equal()
                })
                && optional_match(ex.as_deref(), ey.as_deref(), tab)
        }
        (
            K::Between {
                operand: x,
                low: lx,
                high: hx,
            },
            K::Between {
                operand: y,
                low: ly,
                high: hy,
            },
        ) => {
            compare(x, y, tab).is_equal()
                && compare(lx, ly, tab).is_equal()
                && compare(hx, hy, tab).is_equal()
        }
        (K::In { operand: x, rhs: rx }, K::In { operand: y, rhs: ry }) => {
            compare(x, y, tab).is_equal()
                && match (rx, ry) {
                    (InRhs::List(lx), InRhs::List(ly)) => compare_list(lx, ly, tab).is_equal(),
                    (InRhs::Select(sx), InRhs::Select(sy)) => sx.id() == sy.id(),
                    _ => false,
                }
        }
        (K::Exists(x), K::Exists(y)) | (K::Subquery(x), K::Subquery(y)) => x.id() == y.id(),
        (
            K::SelectColumn {
                subquery: sx,
                column: cx,
                ..
            },
            K::SelectColumn {
                subquery: sy,
                column: cy,
                ..
            },
        ) => cx == cy && (Arc::ptr_eq(sx, sy) || compare(sx, sy, tab).is_equal()),
        (K::Vector(x), K::Vector(y)) => compare_list(x, y, tab).is_equal(),
        (
            K::IfNullRow {
                cursor: cx,
                operand: x,
            },
            K::IfNullRow {
                cursor: cy,
                operand: y,
            },
        ) => cx == cy && compare(x, y, tab).is_equal(),
        _ => false,
    };
    if same {
        ExprMatch::Equal
    } else {
        ExprMatch::Different
    }
}

fn columns_match(x: &ColumnRef, y: &ColumnRef, tab: Option<i32>) -> bool {
    // A fixed column matches on identity alone; its proof expression is
    // not compared.
    x.column == y.column && (x.cursor == y.cursor || (Some(x.cursor) == tab && y.cursor < 0))
}

fn optional_match(x: Option<&Expr>, y: Option<&Expr>, tab: Option<i32>) -> bool {
    match (x, y) {
        (None, None) => true,
        (Some(x), Some(y)) => compare(x, y, tab).is_equal(),
        _ => false,
    }
}

fn windows_match(x: Option<&Arc<WindowDef>>, y: Option<&Arc<WindowDef>>) -> bool {
    match (x, y) {
        (None, None) => true,
        (Some(x), Some(y)) => {
            Arc::ptr_eq(x, y)
                || (x.name == y.name
                    && compare_list(&x.partition_by, &y.partition_by, None).is_equal()
                    && compare_list(&x.order_by, &y.order_by, None).is_equal())
        }
        _ => false,
    }
}

/// Compare two lists item by item, including sort order. Returns
/// `Equal` or `Different`.
pub fn compare_list(a: &ExprList, b: &ExprList, tab: Option<i32>) -> ExprMatch {
    if a.len() != b.len() {
        return ExprMatch::Different;
    }
    let all = a.items().iter().zip(b.items()).all(|(x, y)| {
        x.sort_order == y.sort_order && compare(&x.expr, &y.expr, tab).is_equal()
    });
    if all {
        ExprMatch::Equal
    } else {
        ExprMatch::Different
    }
}

/// True if `a` being true guarantees `b` is true. False negatives are
/// allowed.
pub fn implies(a: &Expr, b: &Expr, tab: Option<i32>) -> bool {
    if compare(a, b, tab).is_equal() {
        return true;
    }
    match b.kind() {
        ExprKind::Binary {
            op: BinaryOperator::Or,
            left,
            right,
        } => implies(a, left, tab) || implies(a, right, tab),
        ExprKind::Unary {
            op: UnaryOperator::NotNull,
            operand,
        } => implies_not_null(a, operand, tab, false),
        _ => false,
    }
}

/// True if `p` can only be true when `x` is not NULL.
fn implies_not_null(p: &Expr, x: &Expr, tab: Option<i32>, seen_not: bool) -> bool {
    if compare(p, x, tab).is_equal() {
        return !matches!(x.kind(), ExprKind::Null);
    }
    match p.kind() {
        ExprKind::In { operand, rhs } => {
            if seen_not && matches!(rhs, InRhs::Select(_)) {
                return false;
            }
            implies_not_null(operand, x, tab, true)
        }
        ExprKind::Between {
            operand,
            low,
            high,
        } => {
            !seen_not
                && (implies_not_null(low, x, tab, true)
                    || implies_not_null(high, x, tab, true)
                    || implies_not_null(operand, x, tab, true))
        }
        ExprKind::Binary { op, left, right } => {
            use BinaryOperator as B;
            let seen_not = match op {
                B::Eq
                | B::Ne
                | B::Lt
                | B::Le
                | B::Gt
                | B::Ge
                | B::Add
                | B::Sub
                | B::BitOr
                | B::ShiftLeft
                | B::ShiftRight
                | B::Concat => true,
                B::Mul | B::Rem | B::BitAnd | B::Div => seen_not,
                B::And | B::Or | B::Is | B::IsNot => return false,
            };
            implies_not_null(right, x, tab, seen_not) || implies_not_null(left, x, tab, seen_not)
        }
        ExprKind::Collate { operand, .. } => implies_not_null(operand, x, tab, seen_not),
        ExprKind::Unary { op, operand } => match op {
            UnaryOperator::Positive | UnaryOperator::Negate => {
                implies_not_null(operand, x, tab, seen_not)
            }
            UnaryOperator::IsTrue | UnaryOperator::IsFalse => {
                !seen_not && implies_not_null(operand, x, tab, true)
            }
            UnaryOperator::BitNot | UnaryOperator::Not => implies_not_null(operand, x, tab, true),
            _ => false,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{ExprList, Select};

    fn col(cursor: i32, column: i16) -> Expr {
        Expr::column(cursor, column, None)
    }

    #[test]
    fn test_compare_equal() {
        let e = Expr::and(
            Expr::eq(col(0, 1), Expr::integer(5)),
            Expr::function("lower", vec![Expr::string("X")]),
        );
        assert_eq!(compare(&e.clone(), &e, None), ExprMatch::Equal);

        assert_eq!(
            compare(&Expr::function("LOWER", vec![]), &Expr::function("lower", vec![]), None),
            ExprMatch::Equal
        );
        assert_eq!(compare(&Expr::null(), &Expr::null(), None), ExprMatch::Equal);
    }

    #[test]
    fn test_compare_different() {
        assert_eq!(
            compare(&Expr::integer(1), &Expr::integer(2), None),
            ExprMatch::Different
        );
        assert_eq!(
            compare(&Expr::integer(1), &Expr::string("1"), None),
            ExprMatch::Different
        );
        assert_eq!(
            compare(&Expr::lt(col(0, 0), col(0, 1)), &Expr::le(col(0, 0), col(0, 1)), None),
            ExprMatch::Different
        );
        assert_eq!(compare(&col(0, 0), &col(1, 0), None), ExprMatch::Different);
        assert_eq!(
            compare(&Expr::string("a"), &Expr::string("A"), None),
            ExprMatch::Different
        );
        let distinct = Expr::function("count", vec![col(0, 0)]).with_flags(ExprFlags::DISTINCT);
        assert_eq!(
            compare(&distinct, &Expr::function("count", vec![col(0, 0)]), None),
            ExprMatch::Different
        );
        let raise = Expr::raise(crate::expression::RaiseAction::Ignore, None);
        assert_eq!(compare(&raise, &raise.clone(), None), ExprMatch::Different);
    }

    #[test]
    fn test_compare_modulo_collate() {
        let a = Expr::collate(col(0, 0), "NOCASE");
        assert_eq!(compare(&a, &col(0, 0), None), ExprMatch::EqualModuloTopCollate);
        assert_eq!(compare(&col(0, 0), &a, None), ExprMatch::EqualModuloTopCollate);
        assert_eq!(
            compare(&a, &Expr::collate(col(0, 0), "nocase"), None),
            ExprMatch::Equal
        );
        assert_eq!(
            compare(&a, &Expr::collate(col(0, 0), "RTRIM"), None),
            ExprMatch::Different
        );
    }

    #[test]
    fn test_compare_self_row_cursor() {
        assert_eq!(compare(&col(3, 1), &col(-1, 1), Some(3)), ExprMatch::Equal);
        assert_eq!(compare(&col(3, 1), &col(-1, 1), None), ExprMatch::Different);
    }

    #[test]
    fn test_compare_subselects_by_identity() {
        let select = Select::new(ExprList::from(vec![Expr::integer(1)]));
        let e = Expr::exists(select);
        assert_eq!(compare(&e.clone(), &e, None), ExprMatch::Equal);
        let other = Expr::exists(Select::new(ExprList::from(vec![Expr::integer(1)])));
        assert_eq!(compare(&e, &other, None), ExprMatch::Different);
    }

    #[test]
    fn test_implies() {
        let a = Expr::eq(col(0, 0), Expr::integer(1));
        let b = Expr::eq(col(0, 1), Expr::integer(2));
        assert!(implies(&a, &a.clone(), None));
        assert!(implies(&a, &Expr::or(b.clone(), a.clone()), None));
        assert!(!implies(&a, &b, None));

        // x = 1 implies x IS NOT NULL
        assert!(implies(&a, &Expr::not_null(col(0, 0)), None));
        // x + 1 > 5 implies x IS NOT NULL
        let sum = Expr::gt(Expr::add(col(0, 0), Expr::integer(1)), Expr::integer(5));
        assert!(implies(&sum, &Expr::not_null(col(0, 0)), None));
        // Nothing is inferred through NOT BETWEEN
        let nb = Expr::not_between(col(0, 0), Expr::integer(1), Expr::integer(2));
        assert!(!implies(&nb, &Expr::not_null(col(0, 0)), None));
        let bt = Expr::between(col(0, 0), Expr::integer(1), Expr::integer(2));
        assert!(implies(&bt, &Expr::not_null(col(0, 0)), None));
        // x IS NULL does not
        assert!(!implies(&Expr::is_null(col(0, 0)), &Expr::not_null(col(0, 0)), None));
        // x IS NOT TRUE does not
        let t = Expr::unary(UnaryOperator::IsNotTrue, col(0, 0));
        assert!(!implies(&t, &Expr::not_null(col(0, 0)), None));
    }
}
