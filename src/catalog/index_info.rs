use crate::catalog::TableId;
use crate::expression::Expr;
use crate::types::Affinity;

/// Unique identifier for an index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexId(pub u32);

/// One key column of an index
#[derive(Debug, Clone, PartialEq)]
pub struct IndexColumn {
    /// Table column number, or `ROWID_COLUMN`
    pub column: i16,
    /// Collation used for this key column
    pub collation: String,
    pub affinity: Affinity,
    pub not_null: bool,
}

/// Information about an index
#[derive(Debug, Clone)]
pub struct IndexInfo {
    /// Unique identifier for the index
    pub index_id: IndexId,
    /// Name of the index
    pub index_name: String,
    /// Table that this index belongs to
    pub table_id: TableId,
    /// Columns that make up the index key, in key order
    pub key_columns: Vec<IndexColumn>,
    /// Whether this is a unique index
    pub is_unique: bool,
    /// WHERE clause of a partial index
    pub partial: Option<Expr>,
}

impl IndexInfo {
    /// Position of a table column within the key, if present.
    pub fn key_position(&self, column: i16) -> Option<usize> {
        self.key_columns.iter().position(|k| k.column == column)
    }

    /// Affinity string for a record built from the first `n` key columns.
    pub fn affinity_string(&self, n: usize) -> String {
        self.key_columns
            .iter()
            .take(n)
            .map(|k| k.affinity.code())
            .collect()
    }

    /// True if every one of the first `n` key columns is NOT NULL.
    pub fn prefix_not_null(&self, n: usize) -> bool {
        self.key_columns.iter().take(n).all(|k| k.not_null)
    }
}
