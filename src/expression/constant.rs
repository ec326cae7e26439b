//! Constant analysis: whether a subtree can be evaluated once, before any
//! row is visited.

use crate::catalog::Catalog;
use crate::error::Result;
use crate::expression::compare::compare;
use crate::expression::typing::collation_of;
use crate::expression::{Expr, ExprFlags, ExprKind, ExprList, ExprMatch, InRhs};

/// Definition of "constant" applied by the walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstMode {
    /// No column, no non-deterministic function, no sub-select
    Plain,
    /// Plain, and no node from the ON or USING clause of an outer join
    NotJoin,
    /// Columns of the table on this cursor are allowed
    TableConstant(i32),
    /// Schema expressions: every function is allowed. Bound parameters
    /// read back from stored schema text count as NULL, fresh ones
    /// disqualify.
    ConstantOrFunction { reparse: bool },
}

/// If `expr` is an unquoted identifier spelled TRUE or FALSE, the boolean
/// it stands for.
pub fn true_false_id(expr: &Expr) -> Option<bool> {
    match expr.kind() {
        ExprKind::Id(name) if !expr.has_flag(ExprFlags::QUOTED) => {
            if name.eq_ignore_ascii_case("true") {
                Some(true)
            } else if name.eq_ignore_ascii_case("false") {
                Some(false)
            } else {
                None
            }
        }
        _ => None,
    }
}

pub fn is_constant(expr: &Expr, mode: ConstMode) -> bool {
    if mode == ConstMode::NotJoin && expr.has_flag(ExprFlags::FROM_JOIN) {
        return false;
    }
    match expr.kind() {
        ExprKind::Function(call) => {
            let allowed = matches!(mode, ConstMode::ConstantOrFunction { .. })
                || expr.has_flag(ExprFlags::CONST_FUNC);
            allowed && call.window.is_none() && children_constant(expr, mode)
        }
        ExprKind::Id(_) => true_false_id(expr).is_some(),
        ExprKind::Column(col) | ExprKind::AggColumn { column: col, .. } => {
            if col.fixed.is_some() && mode != ConstMode::NotJoin {
                children_constant(expr, mode)
            } else {
                mode == ConstMode::TableConstant(col.cursor)
            }
        }
        ExprKind::AggFunction { .. }
        | ExprKind::IfNullRow { .. }
        | ExprKind::Register { .. }
        | ExprKind::Raise { .. }
        | ExprKind::Exists(_)
        | ExprKind::Subquery(_)
        | ExprKind::In {
            rhs: InRhs::Select(_),
            ..
        } => false,
        ExprKind::Variable { .. } => mode != ConstMode::ConstantOrFunction { reparse: false },
        _ => children_constant(expr, mode),
    }
}

fn children_constant(expr: &Expr, mode: ConstMode) -> bool {
    let mut constant = true;
    expr.for_each_child(|child| {
        constant = constant && is_constant(child, mode);
    });
    constant
}

impl Expr {
    pub fn is_constant(&self) -> bool {
        is_constant(self, ConstMode::Plain)
    }

    pub fn is_constant_not_join(&self) -> bool {
        is_constant(self, ConstMode::NotJoin)
    }

    pub fn is_table_constant(&self, cursor: i32) -> bool {
        is_constant(self, ConstMode::TableConstant(cursor))
    }

    pub fn is_constant_or_function(&self, reparse: bool) -> bool {
        is_constant(self, ConstMode::ConstantOrFunction { reparse })
    }
}

/// Literal rewriting that accompanies constant analysis: TRUE and FALSE
/// identifiers become boolean literals and, when reading stored schema
/// text, bound parameters become NULL.
pub fn rewrite_literals(expr: &mut Expr, mode: ConstMode) {
    if let Some(value) = true_false_id(expr) {
        *expr.kind_mut() = ExprKind::Boolean(value);
        return;
    }
    if mode == (ConstMode::ConstantOrFunction { reparse: true })
        && matches!(expr.kind(), ExprKind::Variable { .. })
    {
        *expr.kind_mut() = ExprKind::Null;
        return;
    }
    expr.for_each_child_mut(|child| rewrite_literals(child, mode));
}

/// True if `expr` is constant once every term of `group_by` is treated as
/// a constant. A term only counts when its collating sequence is BINARY.
pub fn is_constant_or_group_by(
    expr: &Expr,
    group_by: &ExprList,
    catalog: &Catalog,
) -> Result<bool> {
    for term in group_by.iter() {
        if compare(expr, term, None) != ExprMatch::Different {
            let binary = match collation_of(term, catalog)? {
                Some(coll) => coll.is_binary(),
                None => true,
            };
            if binary {
                return Ok(true);
            }
        }
    }
    if !expr.selects().is_empty() {
        return Ok(false);
    }
    match expr.kind() {
        // Leaves and nodes that cannot reach a GROUP BY term through a child
        ExprKind::Column(_)
        | ExprKind::AggColumn { .. }
        | ExprKind::AggFunction { .. }
        | ExprKind::IfNullRow { .. }
        | ExprKind::Register { .. }
        | ExprKind::Id(_)
        | ExprKind::Variable { .. }
        | ExprKind::Raise { .. } => Ok(is_constant(expr, ConstMode::Plain)),
        ExprKind::Function(call)
            if call.window.is_some() || !expr.has_flag(ExprFlags::CONST_FUNC) =>
        {
            Ok(false)
        }
        _ => {
            let mut result = Ok(true);
            expr.for_each_child(|child| {
                if let Ok(true) = result {
                    result = is_constant_or_group_by(child, group_by, catalog);
                }
            });
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ColumnInfo;
    use crate::expression::{ExprList, Select};

    fn col(cursor: i32, column: i16) -> Expr {
        Expr::column(cursor, column, None)
    }

    #[test]
    fn test_is_constant() {
        assert!(Expr::integer(1).is_constant());
        assert!(Expr::add(Expr::integer(1), Expr::float("2.5")).is_constant());
        assert!(Expr::variable(1).is_constant());
        assert!(Expr::ident("TRUE").is_constant());
        assert!(!Expr::ident("x").is_constant());
        assert!(!Expr::ident("true").with_flags(ExprFlags::QUOTED).is_constant());
        assert!(!col(0, 0).is_constant());
        assert!(!Expr::exists(Select::new(ExprList::from(vec![Expr::integer(1)]))).is_constant());
        assert!(!Expr::register(3, Expr::integer(1)).is_constant());
        assert!(!Expr::if_null_row(1, Expr::integer(1)).is_constant());
    }

    #[test]
    fn test_functions() {
        let pure = Expr::function("abs", vec![Expr::integer(-1)]).with_flags(ExprFlags::CONST_FUNC);
        let volatile = Expr::function("random", vec![]);
        assert!(pure.is_constant());
        assert!(!volatile.is_constant());
        assert!(volatile.is_constant_or_function(false));
        let windowed = Expr::window_function("abs", vec![Expr::integer(1)], Default::default())
            .with_flags(ExprFlags::CONST_FUNC);
        assert!(!windowed.is_constant());
    }

    #[test]
    fn test_join_and_table_modes() {
        let e = Expr::eq(Expr::integer(1), Expr::integer(1).with_flags(ExprFlags::FROM_JOIN));
        assert!(e.is_constant());
        assert!(!e.is_constant_not_join());

        let e = Expr::add(col(2, 0), Expr::integer(1));
        assert!(e.is_table_constant(2));
        assert!(!e.is_table_constant(3));

        let fixed = Expr::fixed_column(0, 1, None, Expr::integer(5));
        assert!(fixed.is_constant());
        assert!(!fixed.is_constant_not_join());
    }

    #[test]
    fn test_schema_parameters() {
        assert!(!Expr::variable(1).is_constant_or_function(false));
        assert!(Expr::variable(1).is_constant_or_function(true));

        let mut e = Expr::and(Expr::ident("false"), Expr::eq(Expr::variable(1), Expr::integer(2)));
        rewrite_literals(&mut e, ConstMode::ConstantOrFunction { reparse: true });
        assert_eq!(e.to_string(), "(FALSE AND (NULL = 2))");

        let mut e = Expr::eq(Expr::variable(1), Expr::ident("True"));
        rewrite_literals(&mut e, ConstMode::Plain);
        assert_eq!(e.to_string(), "(?1 = TRUE)");
    }

    #[test]
    fn test_constant_or_group_by() -> Result<()> {
        let catalog = Catalog::new();
        let t = catalog
            .add_table(
                "t",
                vec![
                    ColumnInfo::new("a", Some("INTEGER")),
                    ColumnInfo::new("b", Some("TEXT")).collate("NOCASE"),
                ],
            )
            .unwrap();
        let a = Expr::column(0, 0, Some(t.clone()));
        let b = Expr::column(0, 1, Some(t.clone()));
        let group_by = ExprList::from(vec![a.clone(), b.clone()]);

        assert!(is_constant_or_group_by(&Expr::gt(a.clone(), Expr::integer(3)), &group_by, &catalog)?);
        // NOCASE grouping term does not qualify
        assert!(!is_constant_or_group_by(&Expr::eq(b, Expr::string("x")), &group_by, &catalog)?);
        let other = Expr::column(0, 2, Some(t));
        assert!(!is_constant_or_group_by(&Expr::eq(a, other), &group_by, &catalog)?);
        Ok(())
    }
}
