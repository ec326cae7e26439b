//! Table information and metadata structures.

use crate::catalog::{ColumnInfo, IndexInfo};
use crate::types::Affinity;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub u32);

/// Column number used for the rowid in column references and index keys.
pub const ROWID_COLUMN: i16 = -1;

#[derive(Debug, Clone)]
pub struct TableInfo {
    pub table_id: TableId,
    pub table_name: String,
    pub columns: Vec<ColumnInfo>,
    /// Position of the INTEGER PRIMARY KEY column, if the table has one
    pub rowid_alias: Option<usize>,
    /// Indexes in declaration order
    pub indexes: Vec<Arc<IndexInfo>>,
}

impl TableInfo {
    /// Case-insensitive lookup of a column position.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.column_name.eq_ignore_ascii_case(name))
    }

    /// Column by position; the rowid has no `ColumnInfo`.
    pub fn column(&self, column: i16) -> Option<&ColumnInfo> {
        if column < 0 {
            return None;
        }
        self.columns.get(column as usize)
    }

    /// Declared affinity of a column. The rowid is always INTEGER.
    pub fn column_affinity(&self, column: i16) -> Affinity {
        match self.column(column) {
            Some(info) => info.affinity,
            None => Affinity::Integer,
        }
    }

    /// True when `column` reads the rowid, either directly or through the
    /// INTEGER PRIMARY KEY alias.
    pub fn is_rowid(&self, column: i16) -> bool {
        column < 0 || self.rowid_alias == Some(column as usize)
    }

    /// True if the column can never hold NULL.
    pub fn column_not_null(&self, column: i16) -> bool {
        self.is_rowid(column) || self.column(column).is_some_and(|c| c.not_null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> TableInfo {
        TableInfo {
            table_id: TableId(1),
            table_name: "t".to_string(),
            columns: vec![
                ColumnInfo::new("id", Some("INTEGER")).primary_key(),
                ColumnInfo::new("name", Some("TEXT")).not_null(),
                ColumnInfo::new("score", Some("REAL")),
            ],
            rowid_alias: Some(0),
            indexes: Vec::new(),
        }
    }

    #[test]
    fn test_column_lookup() {
        let table = sample_table();
        assert_eq!(table.column_index("NAME"), Some(1));
        assert_eq!(table.column_index("missing"), None);
        assert!(table.column(ROWID_COLUMN).is_none());
        assert_eq!(table.column(2).unwrap().column_name, "score");
    }

    #[test]
    fn test_rowid_and_nullability() {
        let table = sample_table();
        assert!(table.is_rowid(ROWID_COLUMN));
        assert!(table.is_rowid(0));
        assert!(!table.is_rowid(1));
        assert!(table.column_not_null(0));
        assert!(table.column_not_null(1));
        assert!(!table.column_not_null(2));
        assert_eq!(table.column_affinity(ROWID_COLUMN), Affinity::Integer);
        assert_eq!(table.column_affinity(2), Affinity::Real);
    }
}
