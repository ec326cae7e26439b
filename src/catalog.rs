//! In-memory schema consulted by the expression compiler: tables, columns,
//! indexes, collating sequences and SQL functions.

pub mod collation;
pub mod column_info;
pub mod index_info;
pub mod table_info;

pub use collation::{CollSeq, CollationFactory, CollationRegistry, CompareFn, TextEncoding};
pub use column_info::ColumnInfo;
pub use index_info::{IndexColumn, IndexId, IndexInfo};
pub use table_info::{TableId, TableInfo, ROWID_COLUMN};

use crate::expression::Expr;
use crate::function::FunctionRegistry;
use anyhow::{bail, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

pub struct Catalog {
    table_cache: RwLock<HashMap<String, Arc<TableInfo>>>,
    next_table_id: RwLock<u32>,
    next_index_id: RwLock<u32>,
    collations: CollationRegistry,
    functions: FunctionRegistry,
    encoding: TextEncoding,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            table_cache: RwLock::new(HashMap::new()),
            next_table_id: RwLock::new(1),
            next_index_id: RwLock::new(1),
            collations: CollationRegistry::new(),
            functions: FunctionRegistry::with_builtins(),
            encoding: TextEncoding::Utf8,
        }
    }

    /// Create a new table
    pub fn add_table(&self, name: &str, columns: Vec<ColumnInfo>) -> Result<Arc<TableInfo>> {
        let key = name.to_ascii_lowercase();
        if self.table_cache.read().contains_key(&key) {
            bail!("Table '{}' already exists", name);
        }
        if columns.is_empty() {
            bail!("Table '{}' must have at least one column", name);
        }
        if columns.iter().filter(|c| c.primary_key).count() > 1 {
            bail!("Table '{}' has more than one primary key", name);
        }
        for (i, column) in columns.iter().enumerate() {
            if columns[..i]
                .iter()
                .any(|c| c.column_name.eq_ignore_ascii_case(&column.column_name))
            {
                bail!("duplicate column name: {}", column.column_name);
            }
            if let Some(coll) = &column.collation {
                if self.collation(coll).is_none() {
                    bail!("no such collation sequence: {}", coll);
                }
            }
        }

        let table_id = {
            let mut next_id = self.next_table_id.write();
            let id = *next_id;
            *next_id += 1;
            TableId(id)
        };

        let rowid_alias = columns.iter().position(|c| c.is_rowid_alias());
        let table = Arc::new(TableInfo {
            table_id,
            table_name: name.to_string(),
            columns,
            rowid_alias,
            indexes: Vec::new(),
        });

        self.table_cache.write().insert(key, table.clone());
        Ok(table)
    }

    /// Create an index over `columns`, each optionally carrying an explicit
    /// collation. Without one, a key column uses its declared collation.
    pub fn add_index(
        &self,
        table_name: &str,
        index_name: &str,
        columns: &[(&str, Option<&str>)],
        is_unique: bool,
        partial: Option<Expr>,
    ) -> Result<Arc<IndexInfo>> {
        let key = table_name.to_ascii_lowercase();
        let mut cache = self.table_cache.write();
        let Some(table) = cache.get(&key) else {
            bail!("no such table: {}", table_name);
        };
        if table
            .indexes
            .iter()
            .any(|i| i.index_name.eq_ignore_ascii_case(index_name))
        {
            bail!("index {} already exists", index_name);
        }
        if columns.is_empty() {
            bail!("index {} has no key columns", index_name);
        }

        let mut key_columns = Vec::with_capacity(columns.len());
        for (column_name, collation) in columns {
            let column = if column_name.eq_ignore_ascii_case("rowid") {
                ROWID_COLUMN
            } else {
                match table.column_index(column_name) {
                    Some(i) => i as i16,
                    None => bail!("no such column: {}", column_name),
                }
            };
            let collation = collation
                .map(str::to_string)
                .or_else(|| table.column(column).and_then(|c| c.collation.clone()))
                .unwrap_or_else(|| "BINARY".to_string());
            if self.collation(&collation).is_none() {
                bail!("no such collation sequence: {}", collation);
            }
            key_columns.push(IndexColumn {
                column,
                collation,
                affinity: table.column_affinity(column),
                not_null: table.column_not_null(column),
            });
        }

        let index_id = {
            let mut next_id = self.next_index_id.write();
            let id = *next_id;
            *next_id += 1;
            IndexId(id)
        };
        let index = Arc::new(IndexInfo {
            index_id,
            index_name: index_name.to_string(),
            table_id: table.table_id,
            key_columns,
            is_unique,
            partial,
        });

        let mut updated = TableInfo::clone(table);
        updated.indexes.push(index.clone());
        cache.insert(key, Arc::new(updated));
        Ok(index)
    }

    /// Get table information by name
    pub fn get_table(&self, name: &str) -> Option<Arc<TableInfo>> {
        self.table_cache.read().get(&name.to_ascii_lowercase()).cloned()
    }

    pub fn get_table_by_id(&self, table_id: TableId) -> Option<Arc<TableInfo>> {
        self.table_cache
            .read()
            .values()
            .find(|t| t.table_id == table_id)
            .cloned()
    }

    /// List all tables
    pub fn list_tables(&self) -> Vec<Arc<TableInfo>> {
        let mut tables: Vec<_> = self.table_cache.read().values().cloned().collect();
        tables.sort_by_key(|t| t.table_id);
        tables
    }

    /// Resolve a collating sequence for the connection encoding, invoking the
    /// factory callback once if it is not registered.
    pub fn collation(&self, name: &str) -> Option<Arc<CollSeq>> {
        self.collations.resolve(name, self.encoding)
    }

    pub fn collations(&self) -> &CollationRegistry {
        &self.collations
    }

    pub fn set_collation_factory(&self, factory: CollationFactory) {
        self.collations.set_factory(factory);
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    pub fn functions_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.functions
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}
