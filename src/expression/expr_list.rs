//! Ordered lists of expressions with per-item metadata.

use crate::expression::Expr;
use std::fmt;
use std::ops::{Index, IndexMut};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub struct ExprListItem {
    pub expr: Expr,
    /// AS name of a result column
    pub name: Option<String>,
    /// Original text of the item
    pub span: Option<String>,
    pub sort_order: SortOrder,
    /// Set once the item has been coded by a consumer
    pub done: bool,
    /// 1-based column of the result set this ORDER BY or GROUP BY term
    /// refers to, 0 if none
    pub order_by_col: u16,
}

impl ExprListItem {
    pub fn new(expr: Expr) -> Self {
        Self {
            expr,
            name: None,
            span: None,
            sort_order: SortOrder::Asc,
            done: false,
            order_by_col: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExprList {
    items: Vec<ExprListItem>,
}

impl ExprList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, expr: Expr) -> &mut ExprListItem {
        self.items.push(ExprListItem::new(expr));
        let last = self.items.len() - 1;
        &mut self.items[last]
    }

    /// Builder form of [`ExprList::append`].
    pub fn with(mut self, expr: Expr) -> Self {
        self.append(expr);
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[ExprListItem] {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut [ExprListItem] {
        &mut self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &Expr> {
        self.items.iter().map(|item| &item.expr)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Expr> {
        self.items.iter_mut().map(|item| &mut item.expr)
    }

    pub fn max_height(&self) -> u32 {
        self.iter().map(Expr::height).max().unwrap_or(0)
    }
}

impl From<Vec<Expr>> for ExprList {
    fn from(exprs: Vec<Expr>) -> Self {
        Self {
            items: exprs.into_iter().map(ExprListItem::new).collect(),
        }
    }
}

impl Index<usize> for ExprList {
    type Output = Expr;

    fn index(&self, index: usize) -> &Expr {
        &self.items[index].expr
    }
}

impl IndexMut<usize> for ExprList {
    fn index_mut(&mut self, index: usize) -> &mut Expr {
        &mut self.items[index].expr
    }
}

impl fmt::Display for ExprList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, expr) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", expr)?;
        }
        Ok(())
    }
}
