//! The parts of a SELECT statement that expression code generation looks
//! into: result columns, sources and the clauses that disqualify a
//! sub-select from being used as an IN lookup table.

use crate::catalog::TableInfo;
use crate::expression::{Expr, ExprList, NodeId};
use bitflags::bitflags;
use std::sync::Arc;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SelectFlags: u16 {
        const DISTINCT = 0x0001;
        const AGGREGATE = 0x0002;
    }
}

/// A table in the FROM clause, read through `cursor`.
#[derive(Debug, Clone)]
pub struct SrcItem {
    pub table: Arc<TableInfo>,
    pub cursor: i32,
    pub alias: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Select {
    id: NodeId,
    pub columns: ExprList,
    pub from: Vec<SrcItem>,
    pub where_clause: Option<Box<Expr>>,
    pub group_by: Option<ExprList>,
    pub having: Option<Box<Expr>>,
    pub order_by: Option<ExprList>,
    pub limit: Option<Box<Expr>>,
    pub flags: SelectFlags,
    /// Left operand of a compound select
    pub prior: Option<Box<Select>>,
}

impl Select {
    pub fn new(columns: ExprList) -> Self {
        Self {
            id: NodeId::next(),
            columns,
            from: Vec::new(),
            where_clause: None,
            group_by: None,
            having: None,
            order_by: None,
            limit: None,
            flags: SelectFlags::empty(),
            prior: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn from_table(mut self, table: Arc<TableInfo>, cursor: i32) -> Self {
        self.from.push(SrcItem {
            table,
            cursor,
            alias: None,
        });
        self
    }

    pub fn filter(mut self, predicate: Expr) -> Self {
        self.where_clause = Some(Box::new(predicate));
        self
    }

    pub fn with_limit(mut self, limit: Expr) -> Self {
        self.limit = Some(Box::new(limit));
        self
    }

    pub fn with_flags(mut self, flags: SelectFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Every expression directly owned by this select and its compound
    /// predecessors.
    pub fn expressions(&self) -> Vec<&Expr> {
        let mut out: Vec<&Expr> = self.columns.iter().collect();
        out.extend(self.where_clause.as_deref());
        if let Some(group_by) = &self.group_by {
            out.extend(group_by.iter());
        }
        out.extend(self.having.as_deref());
        if let Some(order_by) = &self.order_by {
            out.extend(order_by.iter());
        }
        out.extend(self.limit.as_deref());
        if let Some(prior) = &self.prior {
            out.extend(prior.expressions());
        }
        out
    }

    pub fn height(&self) -> u32 {
        self.expressions()
            .into_iter()
            .map(Expr::height)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_height() {
        let select = Select::new(ExprList::from(vec![Expr::integer(1)]))
            .filter(Expr::eq(Expr::ident("a"), Expr::add(Expr::integer(1), Expr::integer(2))));
        assert_eq!(select.height(), 3);

        let e = Expr::exists(select);
        assert_eq!(e.height(), 4);
    }

    #[test]
    fn test_select_ids_are_distinct() {
        let a = Select::new(ExprList::new());
        let b = Select::new(ExprList::new());
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }
}
