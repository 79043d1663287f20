//! In-memory `DatabaseDriver` test double good enough to drive every
//! generation scenario and invariant without a live MySQL server.
//!
//! `MockDriver` is not a general SQL engine: it only recognizes the
//! finite set of query shapes this crate's own modules emit (`reflect`,
//! `constraint`, `row_synthesizer`) and dispatches on them structurally.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::db::{DatabaseDriver, QueryResult, QueryRow, Value};
use crate::error::{Result, RowsmithError};

#[derive(Debug, Clone)]
pub struct MockColumn {
    pub name: String,
    pub sql_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    pub extra: String,
}

impl MockColumn {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            nullable: false,
            default: None,
            extra: String::new(),
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.extra = "auto_increment".to_string();
        self
    }

    pub fn on_update_current_timestamp(mut self) -> Self {
        self.extra = "on update CURRENT_TIMESTAMP".to_string();
        self
    }
}

#[derive(Debug, Clone)]
struct MockIndex {
    key_name: String,
    non_unique: bool,
    column_name: String,
}

#[derive(Debug, Clone)]
struct MockForeignKey {
    column_name: String,
    referenced_table: String,
    referenced_column: String,
}

#[derive(Debug, Clone, Default)]
pub struct MockTableSchema {
    name: String,
    columns: Vec<MockColumn>,
    indexes: Vec<MockIndex>,
    foreign_keys: Vec<MockForeignKey>,
}

impl MockTableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn column(mut self, column: MockColumn) -> Self {
        self.columns.push(column);
        self
    }

    pub fn primary_key(mut self, column_name: impl Into<String>) -> Self {
        self.indexes.push(MockIndex {
            key_name: "PRIMARY".to_string(),
            non_unique: false,
            column_name: column_name.into(),
        });
        self
    }

    pub fn unique_index(mut self, key_name: impl Into<String>, column_name: impl Into<String>) -> Self {
        self.indexes.push(MockIndex {
            key_name: key_name.into(),
            non_unique: false,
            column_name: column_name.into(),
        });
        self
    }

    pub fn foreign_key(
        mut self,
        column_name: impl Into<String>,
        referenced_table: impl Into<String>,
        referenced_column: impl Into<String>,
    ) -> Self {
        self.foreign_keys.push(MockForeignKey {
            column_name: column_name.into(),
            referenced_table: referenced_table.into(),
            referenced_column: referenced_column.into(),
        });
        self
    }
}

pub struct MockDriver {
    schemas: Mutex<IndexMap<String, MockTableSchema>>,
    rows: Mutex<IndexMap<String, Vec<HashMap<String, Value>>>>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    pub fn new() -> Self {
        Self {
            schemas: Mutex::new(IndexMap::new()),
            rows: Mutex::new(IndexMap::new()),
        }
    }

    pub fn define_table(&self, schema: MockTableSchema) {
        let name = schema.name.clone();
        self.schemas.lock().unwrap().insert(name.clone(), schema);
        self.rows.lock().unwrap().entry(name).or_default();
    }

    pub fn seed_rows(&self, table: &str, rows: Vec<HashMap<String, Value>>) {
        self.rows.lock().unwrap().insert(table.to_string(), rows);
    }

    pub fn rows(&self, table: &str) -> Vec<HashMap<String, Value>> {
        self.rows.lock().unwrap().get(table).cloned().unwrap_or_default()
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.rows.lock().unwrap().get(table).map(Vec::len).unwrap_or(0)
    }

    fn schema(&self, table: &str) -> Option<MockTableSchema> {
        self.schemas.lock().unwrap().get(table).cloned()
    }

    fn show_tables(&self, params: &[(&str, Value)]) -> QueryResult {
        let pattern = param(params, "pattern").and_then(Value::as_str);
        let names: Vec<String> = self
            .schemas
            .lock()
            .unwrap()
            .keys()
            .filter(|name| pattern.map(|p| like_match(p, name)).unwrap_or(true))
            .cloned()
            .collect();
        QueryResult(names.into_iter().map(|n| QueryRow(vec![Value::Str(n)])).collect())
    }

    fn show_full_columns(&self, table: &str) -> Result<QueryResult> {
        let schema = self
            .schema(table)
            .ok_or_else(|| RowsmithError::TableNotFound { table: table.to_string() })?;
        Ok(QueryResult(
            schema
                .columns
                .iter()
                .map(|c| {
                    QueryRow(vec![
                        Value::Str(c.name.clone()),
                        Value::Str(c.sql_type.clone()),
                        Value::Null,
                        Value::Str(if c.nullable { "YES" } else { "NO" }.to_string()),
                        Value::Str(String::new()),
                        c.default.clone().map(Value::Str).unwrap_or(Value::Null),
                        Value::Str(c.extra.clone()),
                        Value::Str(String::new()),
                        Value::Str(String::new()),
                    ])
                })
                .collect(),
        ))
    }

    fn show_index(&self, table: &str, column: &str) -> Result<QueryResult> {
        let schema = self
            .schema(table)
            .ok_or_else(|| RowsmithError::TableNotFound { table: table.to_string() })?;
        let rows = schema
            .indexes
            .iter()
            .filter(|i| i.column_name == column)
            .map(|i| {
                QueryRow(vec![
                    Value::Str(table.to_string()),
                    Value::Int(if i.non_unique { 1 } else { 0 }),
                    Value::Str(i.key_name.clone()),
                    Value::Int(1),
                    Value::Str(i.column_name.clone()),
                ])
            })
            .collect();
        Ok(QueryResult(rows))
    }

    fn outbound_fk(&self, table: &str, column: &str) -> Result<QueryResult> {
        let schema = self
            .schema(table)
            .ok_or_else(|| RowsmithError::TableNotFound { table: table.to_string() })?;
        let rows = schema
            .foreign_keys
            .iter()
            .filter(|fk| fk.column_name == column)
            .map(|fk| {
                QueryRow(vec![
                    Value::Str(fk.referenced_table.clone()),
                    Value::Str(fk.referenced_column.clone()),
                ])
            })
            .collect();
        Ok(QueryResult(rows))
    }

    fn inbound_fk(&self, table: &str, column: &str) -> QueryResult {
        let schemas = self.schemas.lock().unwrap();
        let mut rows = Vec::new();
        for schema in schemas.values() {
            for fk in &schema.foreign_keys {
                if fk.referenced_table == table && fk.referenced_column == column {
                    rows.push(QueryRow(vec![
                        Value::Str(schema.name.clone()),
                        Value::Str(fk.column_name.clone()),
                    ]));
                }
            }
        }
        QueryResult(rows)
    }

    fn unique_rows_query(&self, sql: &str) -> QueryResult {
        let tokens = backticked(sql);
        let table = tokens[tokens.len() - 1].clone();
        let columns = &tokens[..tokens.len() - 2];
        let rows = self.rows.lock().unwrap();
        let stored = rows.get(&table).cloned().unwrap_or_default();

        let mut seen: Vec<Vec<Value>> = Vec::new();
        for stored_row in &stored {
            let tuple: Vec<Value> = columns
                .iter()
                .map(|c| stored_row.get(c).cloned().unwrap_or(Value::Null))
                .collect();
            if !seen.contains(&tuple) {
                seen.push(tuple);
            }
        }

        QueryResult(seen.into_iter().map(QueryRow).collect())
    }

    fn random_row(&self, table: &str) -> QueryResult {
        let rows = self.rows.lock().unwrap();
        let stored = rows.get(table).cloned().unwrap_or_default();
        let schema = self.schema(table);
        match (stored.first(), schema) {
            (Some(row), Some(schema)) => {
                let values = schema
                    .columns
                    .iter()
                    .map(|c| row.get(&c.name).cloned().unwrap_or(Value::Null))
                    .collect();
                QueryResult(vec![QueryRow(values)])
            }
            _ => QueryResult(Vec::new()),
        }
    }

    fn available_foreign_tuples_query(&self, sql: &str, params: &[(&str, Value)]) -> QueryResult {
        let select_segment = segment(sql, "DISTINCT", &[" FROM "]);
        let from_segment = segment(sql, " FROM ", &[" WHERE ", " GROUP BY "]);

        // (src_alias, parent_column) per selected position, in order.
        let select_items: Vec<(String, String)> = select_segment
            .split(',')
            .map(|item| {
                let tokens = backticked(item);
                (tokens[0].clone(), tokens[1].clone())
            })
            .collect();

        // alias -> parent table.
        let mut alias_tables: HashMap<String, String> = HashMap::new();
        for item in from_segment.split(',') {
            let tokens = backticked(item);
            if tokens.len() >= 2 {
                alias_tables.insert(tokens[1].clone(), tokens[0].clone());
            }
        }

        let rows = self.rows.lock().unwrap();
        let candidate_values: Vec<Vec<Value>> = select_items
            .iter()
            .map(|(alias, column)| {
                let table = alias_tables.get(alias).cloned().unwrap_or_default();
                let stored = rows.get(&table).cloned().unwrap_or_default();
                let mut values = Vec::new();
                for row in &stored {
                    if let Some(v) = row.get(column) {
                        if !values.contains(v) {
                            values.push(v.clone());
                        }
                    }
                }
                values
            })
            .collect();
        drop(rows);

        let candidates = cartesian_product(&candidate_values);
        let existing = existing_tuples_from_params(params);

        let filtered: Vec<Vec<Value>> = candidates
            .into_iter()
            .filter(|candidate| {
                existing
                    .iter()
                    .all(|existing_tuple| candidate.iter().zip(existing_tuple.iter()).all(|(c, e)| c != e))
            })
            .collect();

        QueryResult(filtered.into_iter().map(QueryRow).collect())
    }

    fn insert(&self, table: &str, sql: &str, params: &[(&str, Value)]) -> QueryResult {
        let tokens = backticked(sql);
        let columns = &tokens[2..];
        let mut new_row = HashMap::new();
        for column in columns {
            if let Some(value) = param(params, column) {
                new_row.insert(column.clone(), value.clone());
            }
        }
        self.rows.lock().unwrap().entry(table.to_string()).or_default().push(new_row);
        QueryResult(Vec::new())
    }
}

#[async_trait]
impl DatabaseDriver for MockDriver {
    async fn query(&self, sql: &str, params: &[(&str, Value)]) -> Result<QueryResult> {
        let trimmed = sql.trim_start();

        if trimmed.starts_with("SHOW TABLES FROM") {
            return Ok(self.show_tables(params));
        }
        if trimmed.starts_with("SHOW FULL COLUMNS FROM") {
            let tokens = backticked(sql);
            return self.show_full_columns(&tokens[1]);
        }
        if trimmed.starts_with("SHOW INDEX FROM") {
            let tokens = backticked(sql);
            let column = param(params, "column").and_then(Value::as_str).unwrap_or_default();
            return self.show_index(&tokens[1], column);
        }
        if trimmed.starts_with("SELECT REFERENCED_TABLE_NAME") {
            let table = param(params, "table").and_then(Value::as_str).unwrap_or_default();
            let column = param(params, "column").and_then(Value::as_str).unwrap_or_default();
            return self.outbound_fk(table, column);
        }
        if trimmed.starts_with("SELECT TABLE_NAME, COLUMN_NAME") {
            let table = param(params, "table").and_then(Value::as_str).unwrap_or_default();
            let column = param(params, "column").and_then(Value::as_str).unwrap_or_default();
            return Ok(self.inbound_fk(table, column));
        }
        if trimmed.starts_with("SELECT COUNT(*)") {
            let tokens = backticked(sql);
            let table = tokens[1].clone();
            let columns = &tokens[2..];
            let stored = self.rows.lock().unwrap().get(&table).cloned().unwrap_or_default();
            let count = stored
                .iter()
                .filter(|row| {
                    columns.iter().enumerate().all(|(i, col)| {
                        let expected = param(params, &format!("v{i}"));
                        row.get(col) == expected
                    })
                })
                .count();
            return Ok(QueryResult(vec![QueryRow(vec![Value::Int(count as i64)])]));
        }
        if trimmed.contains("ORDER BY RAND") {
            let tokens = backticked(sql);
            return Ok(self.random_row(&tokens[1]));
        }
        if trimmed.starts_with("SELECT DISTINCT") && trimmed.contains("GROUP BY") {
            return Ok(self.available_foreign_tuples_query(sql, params));
        }
        if trimmed.starts_with("SELECT DISTINCT") {
            return Ok(self.unique_rows_query(sql));
        }
        if trimmed.starts_with("INSERT INTO") {
            let tokens = backticked(sql);
            return Ok(self.insert(&tokens[1], sql, params));
        }

        Err(RowsmithError::Driver(format!("MockDriver: unrecognized query shape: {sql}")))
    }
}

fn param<'p>(params: &'p [(&str, Value)], name: &str) -> Option<&'p Value> {
    params.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
}

/// Every substring enclosed in a pair of backticks, in order of
/// appearance.
fn backticked(text: &str) -> Vec<String> {
    text.split('`')
        .enumerate()
        .filter_map(|(i, part)| if i % 2 == 1 { Some(part.to_string()) } else { None })
        .collect()
}

fn segment<'s>(sql: &'s str, start_marker: &str, end_markers: &[&str]) -> &'s str {
    let after_start = sql.find(start_marker).map(|p| &sql[p + start_marker.len()..]).unwrap_or(sql);
    let mut end = after_start.len();
    for marker in end_markers {
        if let Some(pos) = after_start.find(marker) {
            end = end.min(pos);
        }
    }
    &after_start[..end]
}

fn like_match(pattern: &str, value: &str) -> bool {
    fn helper(pattern: &[char], value: &[char]) -> bool {
        match pattern.first() {
            None => value.is_empty(),
            Some('%') => helper(&pattern[1..], value) || (!value.is_empty() && helper(pattern, &value[1..])),
            Some('_') => !value.is_empty() && helper(&pattern[1..], &value[1..]),
            Some(c) => value.first() == Some(c) && helper(&pattern[1..], &value[1..]),
        }
    }
    let pattern_chars: Vec<char> = pattern.chars().collect();
    let value_chars: Vec<char> = value.chars().collect();
    helper(&pattern_chars, &value_chars)
}

fn cartesian_product(lists: &[Vec<Value>]) -> Vec<Vec<Value>> {
    lists.iter().fold(vec![Vec::new()], |acc, list| {
        acc.into_iter()
            .flat_map(|prefix| {
                list.iter().map(move |value| {
                    let mut next = prefix.clone();
                    next.push(value.clone());
                    next
                })
            })
            .collect()
    })
}

/// Recovers the existing-tuple exclusion list from `v{row}_{position}`
/// named parameters built by `ConstraintSet::available_foreign_tuples`.
fn existing_tuples_from_params(params: &[(&str, Value)]) -> Vec<Vec<Value>> {
    let mut grouped: HashMap<usize, Vec<(usize, Value)>> = HashMap::new();
    for (name, value) in params {
        if let Some(rest) = name.strip_prefix('v') {
            if let Some((row_str, pos_str)) = rest.split_once('_') {
                if let (Ok(row), Ok(pos)) = (row_str.parse::<usize>(), pos_str.parse::<usize>()) {
                    grouped.entry(row).or_default().push((pos, value.clone()));
                }
            }
        }
    }
    let mut rows: Vec<(usize, Vec<(usize, Value)>)> = grouped.into_iter().collect();
    rows.sort_by_key(|(row, _)| *row);
    rows.into_iter()
        .map(|(_, mut positions)| {
            positions.sort_by_key(|(pos, _)| *pos);
            positions.into_iter().map(|(_, v)| v).collect()
        })
        .collect()
}
