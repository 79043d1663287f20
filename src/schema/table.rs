use indexmap::IndexMap;

use crate::error::{Result, RowsmithError};
use crate::schema::column::Column;

/// A reflected table. Column lookups are by name rather than a mutable
/// seek index on the container — iteration is a fresh borrow of
/// `columns` every time.
#[derive(Debug, Clone)]
pub struct Table {
    pub database_name: String,
    pub name: String,
    pub columns: Vec<Column>,
    /// Named composite unique indexes, declared-column order preserved.
    /// The PRIMARY index is tracked separately (`primary_key`) and is not
    /// considered a unique index for synthesis purposes.
    pub unique_indexes: IndexMap<String, Vec<usize>>,
    pub primary_key: Vec<usize>,
}

impl Table {
    pub fn new(database_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            database_name: database_name.into(),
            name: name.into(),
            columns: Vec::new(),
            unique_indexes: IndexMap::new(),
            primary_key: Vec::new(),
        }
    }

    pub fn canonical_name(&self) -> String {
        format!("`{}`.`{}`", self.database_name, self.name)
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| RowsmithError::ColumnNotFound {
                table: self.name.clone(),
                column: name.to_string(),
            })
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn fields(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn fillable_columns(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.fillable()).collect()
    }

    pub fn fillable_fields(&self) -> Vec<&str> {
        self.fillable_columns()
            .into_iter()
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Outbound FK edges grouped by the referenced table name, used to walk
    /// a table's direct parents during dependency-ordered generation.
    pub fn references_group_by_table(&self) -> IndexMap<String, Vec<&Column>> {
        let mut grouped: IndexMap<String, Vec<&Column>> = IndexMap::new();
        for column in &self.columns {
            if let Some((ref_table, _)) = &column.referenced_to {
                grouped.entry(ref_table.clone()).or_default().push(column);
            }
        }
        grouped
    }

    /// True iff `column_name` participates in any composite unique index
    /// on this table.
    pub fn column_in_unique_index(&self, column_index: usize) -> bool {
        self.unique_indexes
            .values()
            .any(|cols| cols.contains(&column_index))
    }
}
