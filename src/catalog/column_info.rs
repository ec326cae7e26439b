//! Column information and metadata structures.

use crate::types::{Affinity, Value};

/// A table column as seen by the expression compiler.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub column_name: String,
    /// Declared type text, `None` for an untyped column
    pub declared_type: Option<String>,
    pub affinity: Affinity,
    /// Declared collation, `None` means the connection default
    pub collation: Option<String>,
    pub not_null: bool,
    pub primary_key: bool,
    pub default: Option<Value>,
}

impl ColumnInfo {
    pub fn new(column_name: &str, declared_type: Option<&str>) -> Self {
        Self {
            column_name: column_name.to_string(),
            declared_type: declared_type.map(str::to_string),
            affinity: Affinity::from_type_name(declared_type),
            collation: None,
            not_null: false,
            primary_key: false,
            default: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn collate(mut self, collation: &str) -> Self {
        self.collation = Some(collation.to_string());
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// An `INTEGER PRIMARY KEY` column is an alias for the rowid. The type
    /// must be spelled exactly `INTEGER`.
    pub fn is_rowid_alias(&self) -> bool {
        self.primary_key
            && self
                .declared_type
                .as_deref()
                .is_some_and(|t| t.eq_ignore_ascii_case("INTEGER"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_affinity_from_declared_type() {
        assert_eq!(ColumnInfo::new("a", Some("VARCHAR(20)")).affinity, Affinity::Text);
        assert_eq!(ColumnInfo::new("b", None).affinity, Affinity::Blob);
        assert_eq!(ColumnInfo::new("c", Some("float")).affinity, Affinity::Real);
    }

    #[test]
    fn test_rowid_alias() {
        assert!(ColumnInfo::new("id", Some("integer")).primary_key().is_rowid_alias());
        assert!(!ColumnInfo::new("id", Some("INT")).primary_key().is_rowid_alias());
        assert!(!ColumnInfo::new("id", Some("INTEGER")).is_rowid_alias());
    }
}
