//! Name resolution: binds identifiers to table columns and function calls
//! to their definitions.

use crate::catalog::{Catalog, ROWID_COLUMN};
use crate::error::{CompileError, Result};
use crate::expression::constant::true_false_id;
use crate::expression::{Expr, ExprFlags, ExprKind, InRhs, Select, SrcItem};
use crate::function::FuncFlags;

/// Resolves the identifiers of an expression against a FROM clause. Sub-
/// selects are resolved against their own FROM clause first and then the
/// enclosing ones; a sub-select that reaches outward is flagged as
/// correlated.
pub struct Resolver<'a> {
    catalog: &'a Catalog,
    sources: Vec<SrcItem>,
}

/// Depth of the outermost scope an expression refers to.
type ScopeDepth = usize;

const NO_REFERENCE: ScopeDepth = usize::MAX;

impl<'a> Resolver<'a> {
    pub fn new(catalog: &'a Catalog, sources: Vec<SrcItem>) -> Self {
        Self { catalog, sources }
    }

    pub fn resolve(&self, expr: &mut Expr) -> Result<()> {
        let mut scopes = vec![self.sources.clone()];
        self.resolve_expr(expr, &mut scopes).map(|_| ())
    }

    /// Resolve the expressions of a top-level select.
    pub fn resolve_select(&self, select: &mut Select) -> Result<()> {
        let mut scopes = vec![self.sources.clone()];
        self.resolve_in_select(select, &mut scopes).map(|_| ())
    }

    fn resolve_expr(&self, expr: &mut Expr, scopes: &mut Vec<Vec<SrcItem>>) -> Result<ScopeDepth> {
        if let Some(value) = true_false_id(expr) {
            *expr.kind_mut() = ExprKind::Boolean(value);
            return Ok(NO_REFERENCE);
        }
        if let ExprKind::Id(name) = expr.kind() {
            let (depth, resolved) = self.lookup_name(name, scopes)?;
            *expr = resolved.with_flags(expr.flags());
            return Ok(depth);
        }
        if let ExprKind::Function(call) = expr.kind() {
            let functions = self.catalog.functions();
            let def = functions.find(&call.name, call.args.len()).ok_or_else(|| {
                if functions.contains(&call.name) {
                    CompileError::WrongArgumentCount(call.name.clone())
                } else {
                    CompileError::UnknownFunction(call.name.clone())
                }
            })?;
            let mut flags = ExprFlags::empty();
            if def.is_constant() && !def.is_aggregate() {
                flags |= ExprFlags::CONST_FUNC;
            }
            if def.flags.contains(FuncFlags::UNLIKELY) {
                flags |= ExprFlags::UNLIKELY;
            }
            expr.set_flags(flags);
        }

        let mut depth = NO_REFERENCE;
        let mut failure = None;
        expr.for_each_child_mut(|child| {
            if failure.is_none() {
                match self.resolve_expr(child, scopes) {
                    Ok(d) => depth = depth.min(d),
                    Err(e) => failure = Some(e),
                }
            }
        });
        if let Some(e) = failure {
            return Err(e);
        }

        let select_depth = scopes.len();
        let mut correlated = false;
        match expr.kind_mut() {
            ExprKind::Exists(select)
            | ExprKind::Subquery(select)
            | ExprKind::In {
                rhs: InRhs::Select(select),
                ..
            } => {
                let d = self.resolve_in_select(select, scopes)?;
                correlated = d < select_depth;
                depth = depth.min(d);
            }
            _ => {}
        }
        if correlated {
            expr.set_flags(ExprFlags::VAR_SELECT);
        }
        Ok(depth)
    }

    fn resolve_in_select(
        &self,
        select: &mut Select,
        scopes: &mut Vec<Vec<SrcItem>>,
    ) -> Result<ScopeDepth> {
        scopes.push(select.from.clone());
        let result = self.resolve_select_body(select, scopes);
        scopes.pop();
        result
    }

    fn resolve_select_body(
        &self,
        select: &mut Select,
        scopes: &mut Vec<Vec<SrcItem>>,
    ) -> Result<ScopeDepth> {
        let mut depth = NO_REFERENCE;
        for e in select.columns.iter_mut() {
            depth = depth.min(self.resolve_expr(e, scopes)?);
        }
        for e in [
            select.where_clause.as_deref_mut(),
            select.having.as_deref_mut(),
            select.limit.as_deref_mut(),
        ]
        .into_iter()
        .flatten()
        {
            depth = depth.min(self.resolve_expr(e, scopes)?);
        }
        for list in [select.group_by.as_mut(), select.order_by.as_mut()]
            .into_iter()
            .flatten()
        {
            for e in list.iter_mut() {
                depth = depth.min(self.resolve_expr(e, scopes)?);
            }
        }
        if let Some(prior) = select.prior.as_deref_mut() {
            depth = depth.min(self.resolve_in_select(prior, scopes)?);
        }
        Ok(depth)
    }

    /// Find `name` (optionally `table.column`) in the innermost scope that
    /// has it.
    fn lookup_name(&self, name: &str, scopes: &[Vec<SrcItem>]) -> Result<(ScopeDepth, Expr)> {
        let (qualifier, column) = match name.split_once('.') {
            Some((q, c)) => (Some(q), c),
            None => (None, name),
        };
        for (depth, scope) in scopes.iter().enumerate().rev() {
            let mut found = None;
            for src in scope {
                if let Some(q) = qualifier {
                    let src_name = src.alias.as_deref().unwrap_or(&src.table.table_name);
                    if !src_name.eq_ignore_ascii_case(q) {
                        continue;
                    }
                }
                let index = match src.table.column_index(column) {
                    Some(i) if src.table.rowid_alias == Some(i) => Some(ROWID_COLUMN),
                    Some(i) => Some(i as i16),
                    None if is_rowid_name(column) => Some(ROWID_COLUMN),
                    None => None,
                };
                if let Some(index) = index {
                    if found.is_some() {
                        return Err(CompileError::AmbiguousColumn(name.to_string()));
                    }
                    found = Some(Expr::column(src.cursor, index, Some(src.table.clone())));
                }
            }
            if let Some(expr) = found {
                return Ok((depth, expr));
            }
        }
        Err(CompileError::UnresolvedIdentifier(name.to_string()))
    }
}

fn is_rowid_name(name: &str) -> bool {
    ["rowid", "oid", "_rowid_"]
        .iter()
        .any(|r| r.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ColumnInfo;
    use crate::expression::ExprList;
    use std::sync::Arc;

    fn setup() -> (Catalog, Vec<SrcItem>) {
        let catalog = Catalog::new();
        let t = catalog
            .add_table(
                "t",
                vec![
                    ColumnInfo::new("id", Some("INTEGER")).primary_key(),
                    ColumnInfo::new("a", Some("TEXT")),
                ],
            )
            .unwrap();
        let sources = vec![SrcItem {
            table: t,
            cursor: 0,
            alias: None,
        }];
        (catalog, sources)
    }

    #[test]
    fn test_resolve_columns() -> Result<()> {
        let (catalog, sources) = setup();
        let resolver = Resolver::new(&catalog, sources);
        let mut e = Expr::and(
            Expr::eq(Expr::ident("a"), Expr::string("x")),
            Expr::gt(Expr::ident("t.id"), Expr::ident("true")),
        );
        resolver.resolve(&mut e)?;
        let ExprKind::Binary { left, right, .. } = e.kind() else {
            panic!("expected AND");
        };
        let ExprKind::Binary { left: a, .. } = left.kind() else {
            panic!("expected =");
        };
        assert!(matches!(a.kind(), ExprKind::Column(c) if c.column == 1 && c.cursor == 0));
        let ExprKind::Binary { left: id, right: t, .. } = right.kind() else {
            panic!("expected >");
        };
        // INTEGER PRIMARY KEY resolves to the rowid
        assert!(matches!(id.kind(), ExprKind::Column(c) if c.column == ROWID_COLUMN));
        assert!(matches!(t.kind(), ExprKind::Boolean(true)));
        Ok(())
    }

    #[test]
    fn test_unresolved() {
        let (catalog, sources) = setup();
        let resolver = Resolver::new(&catalog, sources);
        let mut e = Expr::ident("nope");
        assert_eq!(
            resolver.resolve(&mut e),
            Err(CompileError::UnresolvedIdentifier("nope".to_string()))
        );
        let mut f = Expr::function("nosuch", vec![]);
        assert_eq!(
            resolver.resolve(&mut f),
            Err(CompileError::UnknownFunction("nosuch".to_string()))
        );
        let mut g = Expr::function("abs", vec![]);
        assert_eq!(
            resolver.resolve(&mut g),
            Err(CompileError::WrongArgumentCount("abs".to_string()))
        );
    }

    #[test]
    fn test_function_flags() -> Result<()> {
        let (catalog, sources) = setup();
        let resolver = Resolver::new(&catalog, sources);
        let mut e = Expr::function("abs", vec![Expr::integer(-1)]);
        resolver.resolve(&mut e)?;
        assert!(e.has_flag(ExprFlags::CONST_FUNC));
        let mut r = Expr::function("random", vec![]);
        resolver.resolve(&mut r)?;
        assert!(!r.has_flag(ExprFlags::CONST_FUNC));
        let mut u = Expr::function("unlikely", vec![Expr::ident("a")]);
        resolver.resolve(&mut u)?;
        assert!(u.has_flag(ExprFlags::UNLIKELY));
        assert!(matches!(u.skip_collate_and_likely().kind(), ExprKind::Column(_)));
        Ok(())
    }

    #[test]
    fn test_correlated_subquery() -> Result<()> {
        let (catalog, sources) = setup();
        let inner = catalog
            .add_table("u", vec![ColumnInfo::new("b", Some("TEXT"))])
            .unwrap();
        let resolver = Resolver::new(&catalog, sources);

        let correlated = Select::new(ExprList::from(vec![Expr::ident("b")]))
            .from_table(Arc::clone(&inner), 1)
            .filter(Expr::eq(Expr::ident("b"), Expr::ident("a")));
        let mut e = Expr::exists(correlated);
        resolver.resolve(&mut e)?;
        assert!(e.has_flag(ExprFlags::VAR_SELECT));

        let plain = Select::new(ExprList::from(vec![Expr::ident("b")])).from_table(inner, 1);
        let mut e = Expr::in_select(Expr::ident("a"), plain);
        resolver.resolve(&mut e)?;
        assert!(!e.has_flag(ExprFlags::VAR_SELECT));
        Ok(())
    }
}
