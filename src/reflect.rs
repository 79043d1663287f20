//! Schema reflection: materializes the in-memory [`Database`] graph from
//! MySQL's information schema. All catalog queries are bound parameters;
//! failure here is always fatal (`RowsmithError::Reflection`).

use tracing::{debug, info, instrument};

use crate::db::{DatabaseDriver, Value};
use crate::error::{Result, RowsmithError};
use crate::schema::column::{Column, ColumnSize, ColumnType};
use crate::schema::database::Database;
use crate::schema::table::Table;

/// Builds the schema graph for `db_name`, optionally restricted to tables
/// matching `table_like` (a `SHOW TABLES ... LIKE` pattern). Eager and
/// idempotent: calling it twice against an unchanged schema yields
/// structurally equal graphs.
#[instrument(skip(driver))]
pub async fn reflect_database(
    driver: &dyn DatabaseDriver,
    db_name: &str,
    table_like: Option<&str>,
) -> Result<Database> {
    let mut database = Database::new(db_name);

    let table_names = fetch_table_names(driver, db_name, table_like).await?;
    info!(tables = table_names.len(), "reflecting database");

    for table_name in table_names {
        let table = reflect_table(driver, db_name, &table_name).await?;
        database.tables.push(table);
    }

    Ok(database)
}

fn reflection_failure(db_name: &str, err: RowsmithError) -> RowsmithError {
    RowsmithError::Reflection {
        database: db_name.to_string(),
        source: Box::new(err),
    }
}

async fn fetch_table_names(
    driver: &dyn DatabaseDriver,
    db_name: &str,
    table_like: Option<&str>,
) -> Result<Vec<String>> {
    let result = match table_like {
        Some(pattern) => {
            let sql = format!("SHOW TABLES FROM `{db_name}` LIKE :pattern");
            driver
                .query(&sql, &[("pattern", Value::Str(pattern.to_string()))])
                .await
        }
        None => {
            let sql = format!("SHOW TABLES FROM `{db_name}`");
            driver.query(&sql, &[]).await
        }
    }
    .map_err(|e| reflection_failure(db_name, e))?;

    Ok(result
        .fetchall()
        .iter()
        .filter_map(|row| row.get(0).and_then(Value::as_str))
        .map(str::to_string)
        .collect())
}

async fn reflect_table(driver: &dyn DatabaseDriver, db_name: &str, table_name: &str) -> Result<Table> {
    debug!(table = table_name, "reflecting table");
    let mut table = Table::new(db_name, table_name);

    let sql = format!("SHOW FULL COLUMNS FROM `{db_name}`.`{table_name}`");
    let column_rows = driver
        .query(&sql, &[])
        .await
        .map_err(|e| reflection_failure(db_name, e))?;

    for row in column_rows.fetchall() {
        let field = row
            .get(0)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let raw_type = row.get(1).and_then(Value::as_str).unwrap_or_default();
        let null = row.get(3).and_then(Value::as_str).unwrap_or_default();
        let default = row.get(5).and_then(|v| v.as_str().map(str::to_string));
        let extra = row.get(6).and_then(Value::as_str).unwrap_or_default();

        let (column_type, size, unsigned) = parse_type(raw_type);

        table.columns.push(Column {
            name: field,
            column_type,
            size,
            unsigned,
            nullable: null.eq_ignore_ascii_case("YES"),
            default,
            on_update: if extra.is_empty() {
                None
            } else {
                Some(extra.replace("on update ", ""))
            },
            auto_increment: extra.contains("auto_increment"),
            references_from: Vec::new(),
            referenced_to: None,
        });
    }

    for index in 0..table.columns.len() {
        let column_name = table.columns[index].name.clone();
        if let Some((key_name, non_unique)) =
            fetch_first_index(driver, db_name, table_name, &column_name).await?
        {
            if key_name == "PRIMARY" {
                table.primary_key.push(index);
            } else if !non_unique {
                table
                    .unique_indexes
                    .entry(key_name)
                    .or_default()
                    .push(index);
            }
        }
    }

    for index in 0..table.columns.len() {
        let column_name = table.columns[index].name.clone();
        table.columns[index].referenced_to =
            fetch_outbound_fk(driver, db_name, table_name, &column_name).await?;
        table.columns[index].references_from =
            fetch_inbound_fk(driver, db_name, table_name, &column_name).await?;
    }

    Ok(table)
}

/// `SHOW INDEX FROM <db>.<table> WHERE Column_name = :column`, first row
/// only. Returns `(Key_name, Non_unique)`.
async fn fetch_first_index(
    driver: &dyn DatabaseDriver,
    db_name: &str,
    table_name: &str,
    column_name: &str,
) -> Result<Option<(String, bool)>> {
    let sql = format!("SHOW INDEX FROM `{db_name}`.`{table_name}` WHERE `Column_name` = :column");
    let result = driver
        .query(&sql, &[("column", Value::Str(column_name.to_string()))])
        .await
        .map_err(|e| reflection_failure(db_name, e))?;

    // Classic SHOW INDEX column order: Table, Non_unique, Key_name,
    // Seq_in_index, Column_name, Collation, Cardinality, Sub_part,
    // Packed, Null, Index_type, Comment, Index_comment.
    Ok(result.fetchone().map(|row| {
        let non_unique = row.get(1).and_then(Value::as_i64).unwrap_or(1) != 0;
        let key_name = row.get(2).and_then(Value::as_str).unwrap_or_default().to_string();
        (key_name, non_unique)
    }))
}

/// Single row from `information_schema.key_column_usage` where this
/// column is the referencing side.
async fn fetch_outbound_fk(
    driver: &dyn DatabaseDriver,
    db_name: &str,
    table_name: &str,
    column_name: &str,
) -> Result<Option<(String, String)>> {
    let sql = r#"
        SELECT REFERENCED_TABLE_NAME, REFERENCED_COLUMN_NAME
        FROM information_schema.key_column_usage
        WHERE TABLE_SCHEMA = :database AND TABLE_NAME = :table
          AND COLUMN_NAME = :column
          AND REFERENCED_TABLE_NAME IS NOT NULL
          AND REFERENCED_COLUMN_NAME IS NOT NULL
    "#;
    let result = driver
        .query(
            sql,
            &[
                ("database", Value::Str(db_name.to_string())),
                ("table", Value::Str(table_name.to_string())),
                ("column", Value::Str(column_name.to_string())),
            ],
        )
        .await
        .map_err(|e| reflection_failure(db_name, e))?;

    Ok(result.fetchone().and_then(|row| {
        let ref_table = row.get(0).and_then(Value::as_str)?.to_string();
        let ref_column = row.get(1).and_then(Value::as_str)?.to_string();
        Some((ref_table, ref_column))
    }))
}

/// All rows from `information_schema.key_column_usage` where this column
/// is the *referenced* target.
async fn fetch_inbound_fk(
    driver: &dyn DatabaseDriver,
    db_name: &str,
    table_name: &str,
    column_name: &str,
) -> Result<Vec<(String, String)>> {
    let sql = r#"
        SELECT TABLE_NAME, COLUMN_NAME
        FROM information_schema.key_column_usage
        WHERE REFERENCED_TABLE_SCHEMA = :database
          AND REFERENCED_TABLE_NAME = :table
          AND REFERENCED_COLUMN_NAME = :column
    "#;
    let result = driver
        .query(
            sql,
            &[
                ("database", Value::Str(db_name.to_string())),
                ("table", Value::Str(table_name.to_string())),
                ("column", Value::Str(column_name.to_string())),
            ],
        )
        .await
        .map_err(|e| reflection_failure(db_name, e))?;

    Ok(result
        .fetchall()
        .iter()
        .filter_map(|row| {
            let table = row.get(0).and_then(Value::as_str)?.to_string();
            let column = row.get(1).and_then(Value::as_str)?.to_string();
            Some((table, column))
        })
        .collect())
}

/// Parses a catalog `Type` string like `int(11) unsigned`,
/// `varchar(255)`, `decimal(6,2)`, or `enum('a','b','c')` into a
/// `(ColumnType, ColumnSize, unsigned)` triple.
fn parse_type(raw: &str) -> (ColumnType, ColumnSize, bool) {
    let mut remainder = raw.trim();
    let mut unsigned = false;

    if let Some(stripped) = remainder.strip_suffix("unsigned") {
        remainder = stripped.trim_end();
        unsigned = true;
    }

    if let Some(close) = remainder.strip_suffix(')') {
        if let Some(open) = close.rfind('(') {
            let base = remainder[..open].trim().to_lowercase();
            let args = &close[open + 1..];
            let column_type = ColumnType::parse(&base);

            let size = match column_type {
                ColumnType::Enum | ColumnType::Set => ColumnSize::Literals(parse_literal_list(args)),
                ColumnType::Char | ColumnType::VarChar => args
                    .trim()
                    .parse::<u32>()
                    .map(ColumnSize::Length)
                    .unwrap_or(ColumnSize::None),
                ColumnType::Float | ColumnType::Decimal => parse_precision(args),
                _ => args
                    .trim()
                    .parse::<u32>()
                    .map(ColumnSize::Length)
                    .unwrap_or(ColumnSize::None),
            };

            return (column_type, size, unsigned);
        }
    }

    (ColumnType::parse(&remainder.to_lowercase()), ColumnSize::None, unsigned)
}

fn parse_precision(args: &str) -> ColumnSize {
    let parts: Vec<&str> = args.splitn(2, ',').map(str::trim).collect();
    let precision = parts.first().and_then(|p| p.parse::<u32>().ok()).unwrap_or(0);
    let scale = parts.get(1).and_then(|p| p.parse::<u32>().ok()).unwrap_or(0);
    ColumnSize::Precision { precision, scale }
}

/// Splits a MySQL quoted literal list (`'a','b','c'`) respecting `''`
/// escaped quotes inside a literal.
fn parse_literal_list(args: &str) -> Vec<String> {
    let mut literals = Vec::new();
    let mut chars = args.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\'' {
            let mut literal = String::new();
            while let Some(&next) = chars.peek() {
                if next == '\'' {
                    chars.next();
                    if chars.peek() == Some(&'\'') {
                        literal.push('\'');
                        chars.next();
                        continue;
                    }
                    break;
                }
                literal.push(next);
                chars.next();
            }
            literals.push(literal);
        }
    }

    literals
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_unsigned_integer_with_display_width() {
        let (column_type, size, unsigned) = parse_type("int(11) unsigned");
        assert_eq!(column_type, ColumnType::Int);
        assert_eq!(size, ColumnSize::Length(11));
        assert!(unsigned);
    }

    #[test]
    fn parses_varchar_length() {
        let (column_type, size, unsigned) = parse_type("varchar(255)");
        assert_eq!(column_type, ColumnType::VarChar);
        assert_eq!(size, ColumnSize::Length(255));
        assert!(!unsigned);
    }

    #[test]
    fn parses_decimal_precision_and_scale() {
        let (column_type, size, _) = parse_type("decimal(6,2)");
        assert_eq!(column_type, ColumnType::Decimal);
        assert_eq!(
            size,
            ColumnSize::Precision {
                precision: 6,
                scale: 2
            }
        );
    }

    #[test]
    fn parses_enum_literals_in_declared_order() {
        let (column_type, size, _) = parse_type("enum('a','b','c')");
        assert_eq!(column_type, ColumnType::Enum);
        assert_eq!(
            size,
            ColumnSize::Literals(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
    }

    #[test]
    fn parses_enum_literal_with_escaped_quote() {
        let values = parse_literal_list("'it''s',''");
        assert_eq!(values, vec!["it's".to_string(), "".to_string()]);
    }

    #[test]
    fn parses_type_without_size() {
        let (column_type, size, _) = parse_type("text");
        assert_eq!(column_type, ColumnType::Text);
        assert_eq!(size, ColumnSize::None);
    }

    #[test]
    fn parses_unknown_type_as_other() {
        let (column_type, _, _) = parse_type("geometry");
        assert_eq!(column_type, ColumnType::Other("geometry".to_string()));
    }
}
