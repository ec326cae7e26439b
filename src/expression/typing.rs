//! Affinity and collating-sequence inference for expressions.

use crate::catalog::{Catalog, CollSeq};
use crate::error::{CompileError, Result};
use crate::expression::{Expr, ExprFlags, ExprKind, InRhs};
use crate::types::Affinity;
use std::sync::Arc;

impl Expr {
    /// Affinity of the value this expression produces, `Affinity::None` if
    /// it has none.
    pub fn affinity(&self) -> Affinity {
        let e = self.skip_collate_and_likely();
        match e.kind() {
            ExprKind::Register { original, .. } => original.affinity(),
            ExprKind::Subquery(select) => match select.columns.iter().next() {
                Some(first) => first.affinity(),
                None => Affinity::None,
            },
            ExprKind::Cast { type_name, .. } => Affinity::from_type_name(Some(type_name)),
            ExprKind::Column(col) | ExprKind::AggColumn { column: col, .. } => match &col.table {
                Some(table) => table.column_affinity(col.column),
                None => Affinity::None,
            },
            ExprKind::SelectColumn {
                subquery, column, ..
            } => match subquery.kind() {
                ExprKind::Subquery(select) if *column < select.columns.len() => {
                    select.columns[*column].affinity()
                }
                _ => Affinity::None,
            },
            ExprKind::Vector(list) => match list.iter().next() {
                Some(first) => first.affinity(),
                None => Affinity::None,
            },
            _ => Affinity::None,
        }
    }

    /// Affinity to apply when comparing this expression with a value of
    /// affinity `other`.
    pub fn compare_affinity(&self, other: Affinity) -> Affinity {
        self.affinity().compare_with(other)
    }
}

/// Affinity string for the left operand of an IN operator, one code per
/// vector field.
pub fn in_affinity(in_expr: &Expr) -> String {
    let ExprKind::In { operand, rhs } = in_expr.kind() else {
        return String::new();
    };
    (0..operand.vector_size())
        .map(|i| {
            let lhs_aff = operand.vector_field(i).affinity();
            let aff = match rhs {
                InRhs::Select(select) if i < select.columns.len() => {
                    select.columns[i].compare_affinity(lhs_aff)
                }
                _ => lhs_aff,
            };
            aff.code()
        })
        .collect()
}

/// Collating sequence of an expression. A column always has one: its
/// declared collation or BINARY. Literals and computed values have none.
pub fn collation_of(expr: &Expr, catalog: &Catalog) -> Result<Option<Arc<CollSeq>>> {
    let mut p = expr;
    loop {
        match p.kind() {
            ExprKind::Register { original, .. } => p = original,
            ExprKind::Column(col) | ExprKind::AggColumn { column: col, .. } => {
                let Some(table) = &col.table else {
                    return Ok(None);
                };
                if col.column < 0 {
                    return Ok(None);
                }
                let name = table
                    .column(col.column)
                    .and_then(|c| c.collation.clone())
                    .unwrap_or_else(|| "BINARY".to_string());
                return resolve_collation(catalog, &name).map(Some);
            }
            ExprKind::Cast { operand, .. } => p = operand,
            ExprKind::Unary {
                op: crate::expression::UnaryOperator::Positive,
                operand,
            } => p = operand,
            ExprKind::Collate { collation, .. } => {
                return resolve_collation(catalog, collation).map(Some);
            }
            _ if p.has_flag(ExprFlags::COLLATE) => match next_collated_child(p) {
                Some(child) => p = child,
                None => return Ok(None),
            },
            _ => return Ok(None),
        }
    }
}

/// Child through which an explicit COLLATE reaches `p`: the left operand if
/// it carries one, else the right operand or the first collated list item.
fn next_collated_child(p: &Expr) -> Option<&Expr> {
    let mut first = None;
    let mut collated = None;
    p.for_each_child(|child| {
        if first.is_none() {
            first = Some(child);
        }
        if collated.is_none() && child.has_flag(ExprFlags::COLLATE) {
            collated = Some(child);
        }
    });
    match p.kind() {
        ExprKind::Binary { left, right, .. } => {
            if left.has_flag(ExprFlags::COLLATE) {
                Some(left)
            } else {
                Some(right)
            }
        }
        _ => collated.or(first),
    }
}

pub fn resolve_collation(catalog: &Catalog, name: &str) -> Result<Arc<CollSeq>> {
    catalog
        .collations()
        .resolve(name, catalog.encoding())
        .ok_or_else(|| CompileError::NoSuchCollation(name.to_string()))
}

/// Collating sequence for a binary comparison. An explicit COLLATE on the
/// left wins, then one on the right, then the inferred sequence of the left
/// operand and finally that of the right.
pub fn binary_compare_collation(
    left: &Expr,
    right: &Expr,
    catalog: &Catalog,
) -> Result<Option<Arc<CollSeq>>> {
    if left.has_flag(ExprFlags::COLLATE) {
        collation_of(left, catalog)
    } else if right.has_flag(ExprFlags::COLLATE) {
        collation_of(right, catalog)
    } else {
        match collation_of(left, catalog)? {
            Some(coll) => Ok(Some(coll)),
            None => collation_of(right, catalog),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ColumnInfo;
    use crate::expression::{ExprList, Select};

    fn catalog() -> (Catalog, Arc<crate::catalog::TableInfo>) {
        let catalog = Catalog::new();
        let table = catalog
            .add_table(
                "t",
                vec![
                    ColumnInfo::new("a", Some("INTEGER")),
                    ColumnInfo::new("b", Some("TEXT")).collate("NOCASE"),
                    ColumnInfo::new("c", None),
                ],
            )
            .unwrap();
        (catalog, table)
    }

    #[test]
    fn test_affinity() {
        let (_catalog, t) = catalog();
        assert_eq!(Expr::column(0, 0, Some(t.clone())).affinity(), Affinity::Integer);
        assert_eq!(Expr::column(0, 1, Some(t.clone())).affinity(), Affinity::Text);
        assert_eq!(Expr::column(0, 2, Some(t.clone())).affinity(), Affinity::Blob);
        assert_eq!(Expr::rowid(0, Some(t.clone())).affinity(), Affinity::Integer);
        assert_eq!(Expr::integer(1).affinity(), Affinity::None);
        assert_eq!(Expr::cast(Expr::string("1"), "REAL").affinity(), Affinity::Real);
        assert_eq!(
            Expr::collate(Expr::column(0, 1, Some(t.clone())), "BINARY").affinity(),
            Affinity::Text
        );
        let v = Expr::vector(vec![Expr::column(0, 1, Some(t.clone())), Expr::integer(1)]);
        assert_eq!(v.affinity(), Affinity::Text);
        let sub = Expr::subquery(Select::new(ExprList::from(vec![Expr::column(
            1,
            0,
            Some(t.clone()),
        )])));
        assert_eq!(sub.affinity(), Affinity::Integer);
        let reg = Expr::register(5, Expr::column(0, 0, Some(t)));
        assert_eq!(reg.affinity(), Affinity::Integer);
    }

    #[test]
    fn test_in_affinity() {
        let (_catalog, t) = catalog();
        let e = Expr::in_list(
            Expr::column(0, 1, Some(t.clone())),
            vec![Expr::integer(1), Expr::integer(2)],
        );
        assert_eq!(in_affinity(&e), "B");

        let sel = Select::new(ExprList::from(vec![Expr::column(1, 0, Some(t.clone()))]));
        let e = Expr::in_select(Expr::column(0, 1, Some(t)), sel);
        assert_eq!(in_affinity(&e), "C");
    }

    #[test]
    fn test_collation_of() -> Result<()> {
        let (catalog, t) = catalog();
        let a = Expr::column(0, 0, Some(t.clone()));
        let b = Expr::column(0, 1, Some(t.clone()));
        assert_eq!(collation_of(&a, &catalog)?.unwrap().name, "BINARY");
        assert_eq!(collation_of(&b, &catalog)?.unwrap().name, "NOCASE");
        assert!(collation_of(&Expr::string("x"), &catalog)?.is_none());
        assert!(collation_of(&Expr::rowid(0, Some(t)), &catalog)?.is_none());

        let e = Expr::collate(Expr::string("x"), "rtrim");
        assert_eq!(collation_of(&e, &catalog)?.unwrap().name, "RTRIM");

        let concat = Expr::concat(Expr::string("a"), Expr::collate(Expr::string("b"), "NOCASE"));
        assert_eq!(collation_of(&concat, &catalog)?.unwrap().name, "NOCASE");

        let bad = Expr::collate(Expr::string("x"), "klingon");
        assert_eq!(
            collation_of(&bad, &catalog),
            Err(CompileError::NoSuchCollation("klingon".to_string()))
        );
        Ok(())
    }

    #[test]
    fn test_binary_compare_collation() -> Result<()> {
        let (catalog, t) = catalog();
        let a = Expr::column(0, 0, Some(t.clone()));
        let b = Expr::column(0, 1, Some(t.clone()));
        let lit = Expr::string("x");

        // Inferred: left column first
        let coll = binary_compare_collation(&a, &b, &catalog)?.unwrap();
        assert_eq!(coll.name, "BINARY");
        let coll = binary_compare_collation(&lit, &b, &catalog)?.unwrap();
        assert_eq!(coll.name, "NOCASE");

        // Explicit on the right beats inferred on the left
        let rhs = Expr::collate(lit.clone(), "RTRIM");
        let coll = binary_compare_collation(&b, &rhs, &catalog)?.unwrap();
        assert_eq!(coll.name, "RTRIM");

        assert!(binary_compare_collation(&lit, &Expr::integer(1), &catalog)?.is_none());
        Ok(())
    }
}
