//! RowSynthesizer: for one table, resolve a value per fillable column,
//! validate against unique constraints, retry on collision, emit the
//! INSERT.

use std::collections::HashMap;

use tracing::{instrument, warn};

use crate::constraint::ConstraintSet;
use crate::db::{DatabaseDriver, QueryRow, Value};
use crate::error::{Result, RowsmithError};
use crate::foreign_scope::ForeignScope;
use crate::schema::column::{Column, ColumnSize};
use crate::schema::database::Database;
use crate::schema::table::Table;
use crate::value_factory::{FakePolicy, ValueFactory};

/// Per-column override, modeled as an explicit variant rather than
/// dynamically-typed values.
#[derive(Clone)]
pub enum FakeColumnOverride {
    Constant(Value),
    Factory(std::sync::Arc<dyn Fn(&Column) -> Value + Send + Sync>),
    /// Attribute overrides applied to a transient copy of the column
    /// before falling through to `ValueFactory` — the Rust analogue of
    /// the original's keyword-args factory call.
    Keyword(HashMap<String, Value>),
}

pub struct RowSynthesizer<'a> {
    driver: &'a dyn DatabaseDriver,
    database: &'a Database,
    table: &'a Table,
    policy: &'a FakePolicy,
    overrides: &'a HashMap<String, FakeColumnOverride>,
    retry_budget: u32,
}

impl<'a> RowSynthesizer<'a> {
    pub fn new(
        driver: &'a dyn DatabaseDriver,
        database: &'a Database,
        table: &'a Table,
        policy: &'a FakePolicy,
        overrides: &'a HashMap<String, FakeColumnOverride>,
        retry_budget: u32,
    ) -> Self {
        Self {
            driver,
            database,
            table,
            policy,
            overrides,
            retry_budget,
        }
    }

    /// Runs up to `retry_budget` attempts, returning the inserted row on
    /// success or `None` once the budget is exhausted. Partial failure is
    /// tolerated, never surfaced as an `Err`.
    #[instrument(skip(self), fields(table = %self.table.name))]
    pub async fn synthesize_one(&self) -> Result<Option<HashMap<String, Value>>> {
        let constraints = ConstraintSet::new(self.driver, self.table);

        for attempt in 0..self.retry_budget.max(1) {
            let mut scope = ForeignScope::new();
            for (index_name, column_indexes) in &self.table.unique_indexes {
                let columns: Vec<&Column> = column_indexes.iter().map(|&i| &self.table.columns[i]).collect();
                let tuples = constraints.available_foreign_tuples(&columns).await?;
                scope.seed(index_name.clone(), tuples);
            }

            let mut row = HashMap::new();
            let mut parent_row_cache: HashMap<String, Option<QueryRow>> = HashMap::new();

            for column in self.table.fillable_columns() {
                let value = self.resolve_column(column, &mut scope, &mut parent_row_cache).await?;
                row.insert(column.name.clone(), value);
            }

            if constraints.test(&row).await? {
                self.insert_row(&row).await?;
                return Ok(Some(row));
            }

            warn!(attempt, "unique collision, retrying");
        }

        warn!("failed: exhausted retry limit");
        Ok(None)
    }

    async fn resolve_column(
        &self,
        column: &Column,
        scope: &mut ForeignScope,
        parent_row_cache: &mut HashMap<String, Option<QueryRow>>,
    ) -> Result<Value> {
        if column.nullable && self.policy.fake.ratio() < self.policy.nullable_ratio {
            return Ok(Value::Null);
        }

        if let Some((parent_table, parent_column)) = &column.referenced_to {
            let participates_in_unique_index = self
                .table
                .column_index(&column.name)
                .map(|idx| self.table.column_in_unique_index(idx))
                .unwrap_or(false);

            if participates_in_unique_index {
                if let Some(value) = scope.random_scope(self.policy.fake.as_ref(), &column.name) {
                    return Ok(value);
                }
                // ForeignScope exhausted for this column: fall through to an
                // unconstrained parent pick. ConstraintSet.test still guards
                // the final row, so this can only cost extra retries, never
                // a silently-wrong tuple.
            }
            return self.random_parent_value(parent_table, parent_column, parent_row_cache).await;
        }

        if let Some(column_override) = self.overrides.get(&column.name) {
            return self.apply_override(column_override, column);
        }

        ValueFactory::new(self.policy).generate(&self.table.name, column)
    }

    /// `SELECT * FROM parent ORDER BY RAND(:seed) LIMIT 1`, cached per
    /// parent table for the lifetime of one synthesis attempt so that
    /// multiple FK columns referencing the same parent see the same
    /// parent row.
    async fn random_parent_value(
        &self,
        parent_table: &str,
        parent_column: &str,
        parent_row_cache: &mut HashMap<String, Option<QueryRow>>,
    ) -> Result<Value> {
        if !parent_row_cache.contains_key(parent_table) {
            let parent = self.database.table(parent_table)?;
            let seed = self.policy.fake.random_int(0, i64::MAX);
            let sql = format!("SELECT * FROM {} ORDER BY RAND(:seed) LIMIT 1", parent.canonical_name());
            let result = self.driver.query(&sql, &[("seed", Value::Int(seed))]).await?;
            parent_row_cache.insert(parent_table.to_string(), result.fetchone().cloned());
        }

        let parent = self.database.table(parent_table)?;
        let column_index = parent.column_index(parent_column).ok_or_else(|| RowsmithError::ColumnNotFound {
            table: parent_table.to_string(),
            column: parent_column.to_string(),
        })?;

        Ok(parent_row_cache
            .get(parent_table)
            .and_then(|row| row.as_ref())
            .and_then(|row| row.get(column_index))
            .cloned()
            .unwrap_or(Value::Null))
    }

    fn apply_override(&self, column_override: &FakeColumnOverride, column: &Column) -> Result<Value> {
        match column_override {
            FakeColumnOverride::Constant(value) => Ok(value.clone()),
            FakeColumnOverride::Factory(generator) => Ok(generator(column)),
            FakeColumnOverride::Keyword(keywords) => {
                let mut overridden = column.clone();
                if let Some(Value::Int(length)) = keywords.get("length") {
                    overridden.size = ColumnSize::Length(*length as u32);
                }
                if let (Some(Value::Int(precision)), Some(Value::Int(scale))) =
                    (keywords.get("precision"), keywords.get("scale"))
                {
                    overridden.size = ColumnSize::Precision {
                        precision: *precision as u32,
                        scale: *scale as u32,
                    };
                }
                ValueFactory::new(self.policy).generate(&self.table.name, &overridden)
            }
        }
    }

    async fn insert_row(&self, row: &HashMap<String, Value>) -> Result<()> {
        let fillable = self.table.fillable_columns();
        let columns = fillable
            .iter()
            .map(|c| format!("`{}`", c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = fillable.iter().map(|c| format!(":{}", c.name)).collect::<Vec<_>>().join(", ");
        let sql = format!(
            "INSERT INTO {} ({columns}) VALUES ({placeholders})",
            self.table.canonical_name()
        );
        let params: Vec<(&str, Value)> = fillable.iter().map(|c| (c.name.as_str(), row[&c.name].clone())).collect();
        self.driver.query(&sql, &params).await?;
        Ok(())
    }
}
