//! ConstraintSet: a read-only view over a table's composite unique
//! indexes, backing uniqueness testing and the FK-aware "available
//! foreign tuples" query.

use std::collections::HashMap;

use crate::db::{DatabaseDriver, Value};
use crate::error::Result;
use crate::schema::column::Column;
use crate::schema::table::Table;

pub struct ConstraintSet<'a> {
    driver: &'a dyn DatabaseDriver,
    table: &'a Table,
}

impl<'a> ConstraintSet<'a> {
    pub fn new(driver: &'a dyn DatabaseDriver, table: &'a Table) -> Self {
        Self { driver, table }
    }

    /// True iff `row` collides with no existing tuple on any composite
    /// unique index. An index is skipped if `row` doesn't carry a value
    /// for every one of its columns yet.
    pub async fn test(&self, row: &HashMap<String, Value>) -> Result<bool> {
        for column_indexes in self.table.unique_indexes.values() {
            let columns: Vec<&Column> = column_indexes.iter().map(|&i| &self.table.columns[i]).collect();
            if !columns.iter().all(|c| row.contains_key(&c.name)) {
                continue;
            }

            let mut clauses = Vec::with_capacity(columns.len());
            let mut params: Vec<(String, Value)> = Vec::with_capacity(columns.len());
            for (i, column) in columns.iter().enumerate() {
                let param_name = format!("v{i}");
                clauses.push(format!("`{}` = :{param_name}", column.name));
                params.push((param_name, row[&column.name].clone()));
            }

            let sql = format!(
                "SELECT COUNT(*) FROM {} WHERE {}",
                self.table.canonical_name(),
                clauses.join(" AND ")
            );
            let bound: Vec<(&str, Value)> = params.iter().map(|(n, v)| (n.as_str(), v.clone())).collect();
            let result = self.driver.query(&sql, &bound).await?;
            let count = result.fetchone().and_then(|r| r.get(0)).and_then(Value::as_i64).unwrap_or(0);
            if count != 0 {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// `SELECT DISTINCT c1,…,cN FROM <table>` — tuples already present in
    /// the child table on `cols`, keyed back by column name.
    pub async fn unique_rows(&self, cols: &[&Column]) -> Result<Vec<HashMap<String, Value>>> {
        if cols.is_empty() {
            return Ok(Vec::new());
        }
        let column_list = cols.iter().map(|c| format!("`{}`", c.name)).collect::<Vec<_>>().join(", ");
        let sql = format!("SELECT DISTINCT {column_list} FROM {}", self.table.canonical_name());
        let result = self.driver.query(&sql, &[]).await?;
        Ok(result
            .fetchall()
            .iter()
            .map(|row| {
                let mut tuple = HashMap::new();
                for (i, column) in cols.iter().enumerate() {
                    if let Some(value) = row.get(i) {
                        tuple.insert(column.name.clone(), value.clone());
                    }
                }
                tuple
            })
            .collect())
    }

    /// The key primitive for FK-bearing composite unique indexes.
    /// Each FK column in `cols` gets its own aliased source in the FROM
    /// list (`parent AS sI`) so two FK columns
    /// referencing the same parent table don't collide on table name;
    /// `cols` without a `referenced_to` are ignored.
    ///
    /// The WHERE exclusion is deliberately over-tight: one
    /// `(s0.c0<>:v AND s1.c1<>:v …)` conjunct per existing child tuple,
    /// ANDed together across tuples rather than built as a single
    /// `NOT EXISTS`. This excludes more than strictly necessary (a
    /// candidate sharing one coordinate with *any* existing tuple can be
    /// dropped even though the full tuple differs) but never admits a
    /// genuine collision.
    pub async fn available_foreign_tuples(&self, cols: &[&Column]) -> Result<Vec<HashMap<String, Value>>> {
        let fk_cols: Vec<&Column> = cols.iter().filter(|c| c.referenced_to.is_some()).copied().collect();
        if fk_cols.is_empty() {
            return Ok(Vec::new());
        }

        let mut select_exprs = Vec::with_capacity(fk_cols.len());
        let mut from_exprs = Vec::with_capacity(fk_cols.len());
        let mut source_exprs = Vec::with_capacity(fk_cols.len());
        let mut out_aliases = Vec::with_capacity(fk_cols.len());

        for (i, column) in fk_cols.iter().enumerate() {
            let (parent_table, parent_column) = column
                .referenced_to
                .as_ref()
                .expect("fk_cols filtered to Some(referenced_to)");
            let src_alias = format!("s{i}");
            let out_alias = format!("p{i}");
            from_exprs.push(format!("`{parent_table}` AS `{src_alias}`"));
            let source_expr = format!("`{src_alias}`.`{parent_column}`");
            select_exprs.push(format!("{source_expr} AS `{out_alias}`"));
            source_exprs.push(source_expr);
            out_aliases.push(out_alias);
        }

        let existing = self.unique_rows(&fk_cols).await?;

        let mut where_clauses = Vec::new();
        let mut params: Vec<(String, Value)> = Vec::new();
        for (row_index, existing_row) in existing.iter().enumerate() {
            let mut parts = Vec::with_capacity(fk_cols.len());
            for (i, column) in fk_cols.iter().enumerate() {
                let param_name = format!("v{row_index}_{i}");
                let value = existing_row.get(&column.name).cloned().unwrap_or(Value::Null);
                parts.push(format!("{} <> :{param_name}", source_exprs[i]));
                params.push((param_name, value));
            }
            where_clauses.push(format!("({})", parts.join(" AND ")));
        }

        let mut sql = format!(
            "SELECT DISTINCT {} FROM {}",
            select_exprs.join(", "),
            from_exprs.join(", ")
        );
        if !where_clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_clauses.join(" AND "));
        }
        sql.push_str(" GROUP BY ");
        sql.push_str(
            &out_aliases
                .iter()
                .map(|a| format!("`{a}`"))
                .collect::<Vec<_>>()
                .join(", "),
        );

        let bound: Vec<(&str, Value)> = params.iter().map(|(n, v)| (n.as_str(), v.clone())).collect();
        let result = self.driver.query(&sql, &bound).await?;

        Ok(result
            .fetchall()
            .iter()
            .map(|row| {
                let mut tuple = HashMap::new();
                for (i, column) in fk_cols.iter().enumerate() {
                    if let Some(value) = row.get(i) {
                        tuple.insert(column.name.clone(), value.clone());
                    }
                }
                tuple
            })
            .collect())
    }
}
