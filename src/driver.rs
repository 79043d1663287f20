//! GenerationDriver: walks tables in FK-dependency order, memoizing
//! already-filled parents, and drives `RowSynthesizer` N times per table.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::instrument;

use crate::db::DatabaseDriver;
use crate::error::{Result, RowsmithError};
use crate::progress::ProgressSink;
use crate::row_synthesizer::{FakeColumnOverride, RowSynthesizer};
use crate::schema::column::Column;
use crate::schema::database::Database;
use crate::value_factory::FakePolicy;

/// Per-table generation config.
#[derive(Clone)]
pub struct FakeTable {
    pub num_of_rows: u32,
    pub retry_budget: u32,
    pub columns: HashMap<String, FakeColumnOverride>,
}

impl Default for FakeTable {
    fn default() -> Self {
        Self {
            num_of_rows: 1,
            retry_budget: 100,
            columns: HashMap::new(),
        }
    }
}

impl FakeTable {
    pub fn with_num_of_rows(mut self, n: u32) -> Self {
        self.num_of_rows = n;
        self
    }

    pub fn with_retry_budget(mut self, n: u32) -> Self {
        self.retry_budget = n;
        self
    }

    pub fn with_column(mut self, name: impl Into<String>, column_override: FakeColumnOverride) -> Self {
        self.columns.insert(name.into(), column_override);
        self
    }
}

/// Per-run outcome. Partial generation is an acceptable outcome, and this
/// gives callers a non-panicking way to observe it, rather than only a
/// log line.
#[derive(Debug, Default, Clone)]
pub struct GenerationReport {
    pub rows_inserted: HashMap<String, u32>,
    pub rows_failed: HashMap<String, u32>,
}

pub struct FakeFactory {
    database: Database,
    table_definitions: HashMap<String, FakeTable>,
    policy: FakePolicy,
    progress: Arc<dyn ProgressSink>,
}

impl FakeFactory {
    /// Fails fast with `RowsmithError::CyclicForeignKeys` if the schema
    /// graph has a cycle among two or more distinct tables. Self-references
    /// are permitted and skipped during generation.
    pub fn new(
        database: Database,
        table_definitions: HashMap<String, FakeTable>,
        policy: FakePolicy,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<Self> {
        detect_cycles(&database)?;
        Ok(Self {
            database,
            table_definitions,
            policy,
            progress,
        })
    }

    #[instrument(skip(self, driver))]
    pub async fn generate(&mut self, driver: &dyn DatabaseDriver) -> Result<GenerationReport> {
        let mut memo: HashSet<String> = HashSet::new();
        let mut report = GenerationReport::default();

        self.progress.start();

        let table_names: Vec<String> = self.database.tables.iter().map(|t| t.name.clone()).collect();
        for table_name in table_names {
            generate_table(
                &table_name,
                &self.database,
                &self.table_definitions,
                &self.policy,
                driver,
                &mut memo,
                &mut report,
                self.progress.as_ref(),
            )
            .await?;
        }

        self.progress.finish();
        Ok(report)
    }
}

type BoxedFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Recursive parent-first walk over `table.references_group_by_table()`.
/// Boxed/pinned because `async fn` cannot be directly recursive.
#[allow(clippy::too_many_arguments)]
fn generate_table<'a>(
    table_name: &'a str,
    database: &'a Database,
    table_definitions: &'a HashMap<String, FakeTable>,
    policy: &'a FakePolicy,
    driver: &'a dyn DatabaseDriver,
    memo: &'a mut HashSet<String>,
    report: &'a mut GenerationReport,
    progress: &'a dyn ProgressSink,
) -> BoxedFuture<'a> {
    Box::pin(async move {
        if memo.contains(table_name) {
            return Ok(());
        }

        let table = database.table(table_name)?;

        let parent_names: Vec<String> = table
            .references_group_by_table()
            .keys()
            .filter(|name| name.as_str() != table_name)
            .cloned()
            .collect();

        for parent_name in parent_names {
            generate_table(&parent_name, database, table_definitions, policy, driver, memo, report, progress).await?;
        }

        memo.insert(table_name.to_string());

        let default_definition = FakeTable::default();
        let definition = table_definitions.get(table_name).unwrap_or(&default_definition);

        let synthesizer = RowSynthesizer::new(
            driver,
            database,
            table,
            policy,
            &definition.columns,
            definition.retry_budget.max(1),
        );

        let task_id = progress.add_task(table_name, definition.num_of_rows as u64);
        let mut inserted = 0u32;
        let mut failed = 0u32;

        for _ in 0..definition.num_of_rows {
            match synthesizer.synthesize_one().await? {
                Some(_) => inserted += 1,
                None => failed += 1,
            }
            progress.advance(task_id, 1);
        }

        report.rows_inserted.insert(table_name.to_string(), inserted);
        report.rows_failed.insert(table_name.to_string(), failed);

        Ok(())
    })
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Visiting,
    Done,
}

fn detect_cycles(database: &Database) -> Result<()> {
    let mut state: HashMap<String, VisitState> = HashMap::new();
    for table in &database.tables {
        visit(&table.name, database, &mut state)?;
    }
    Ok(())
}

fn visit(table_name: &str, database: &Database, state: &mut HashMap<String, VisitState>) -> Result<()> {
    match state.get(table_name) {
        Some(VisitState::Done) => return Ok(()),
        Some(VisitState::Visiting) => {
            return Err(RowsmithError::CyclicForeignKeys {
                table: table_name.to_string(),
            })
        }
        None => {}
    }

    state.insert(table_name.to_string(), VisitState::Visiting);
    let table = database.table(table_name)?;
    for parent_name in table.references_group_by_table().keys() {
        if parent_name != table_name {
            visit(parent_name, database, state)?;
        }
    }
    state.insert(table_name.to_string(), VisitState::Done);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::column::{ColumnSize, ColumnType};
    use crate::schema::table::Table;

    fn int_column(name: &str) -> Column {
        Column {
            name: name.to_string(),
            column_type: ColumnType::Int,
            size: ColumnSize::None,
            unsigned: false,
            nullable: false,
            default: None,
            on_update: None,
            auto_increment: false,
            references_from: Vec::new(),
            referenced_to: None,
        }
    }

    #[test]
    fn detects_cycle_between_distinct_tables() {
        let mut db = Database::new("shop");

        let mut a = Table::new("shop", "a");
        let mut a_ref = int_column("b_id");
        a_ref.referenced_to = Some(("b".to_string(), "id".to_string()));
        a.columns.push(a_ref);

        let mut b = Table::new("shop", "b");
        let mut b_ref = int_column("a_id");
        b_ref.referenced_to = Some(("a".to_string(), "id".to_string()));
        b.columns.push(b_ref);

        db.tables.push(a);
        db.tables.push(b);

        assert!(matches!(detect_cycles(&db), Err(RowsmithError::CyclicForeignKeys { .. })));
    }

    #[test]
    fn self_reference_is_not_a_cycle() {
        let mut db = Database::new("shop");
        let mut t = Table::new("shop", "category");
        let mut parent_id = int_column("parent_id");
        parent_id.referenced_to = Some(("category".to_string(), "id".to_string()));
        t.columns.push(parent_id);
        db.tables.push(t);

        assert!(detect_cycles(&db).is_ok());
    }
}
