use std::collections::HashMap;

use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::{Opts, OptsBuilder, Pool, PoolConstraints, PoolOpts};

use crate::db::{DatabaseDriver, QueryResult, QueryRow, Value};
use crate::error::{Result, RowsmithError};

/// Connection pool configuration for a MySQL TCP endpoint.
#[derive(Debug, Clone)]
pub struct MySqlConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Schema to connect to by default; individual queries still qualify
    /// table names with the target database explicitly.
    pub database: Option<String>,
    pub min_connections: usize,
    pub max_connections: usize,
}

impl MySqlConfig {
    pub fn new<H: Into<String>, U: Into<String>, P: Into<String>>(
        host: H,
        port: u16,
        user: U,
        password: P,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            user: user.into(),
            password: password.into(),
            database: None,
            min_connections: 1,
            max_connections: 10,
        }
    }

    pub fn with_database<D: Into<String>>(mut self, database: D) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_pool_size(mut self, min: usize, max: usize) -> Self {
        self.min_connections = min;
        self.max_connections = max;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(RowsmithError::Driver(
                "max_connections must be greater than 0".to_string(),
            ));
        }
        if self.min_connections > self.max_connections {
            return Err(RowsmithError::Driver(
                "min_connections cannot exceed max_connections".to_string(),
            ));
        }
        Ok(())
    }

    fn to_opts(&self) -> Opts {
        let mut builder = OptsBuilder::default()
            .ip_or_hostname(self.host.clone())
            .tcp_port(self.port)
            .user(Some(self.user.clone()))
            .pass(Some(self.password.clone()))
            .pool_opts(
                PoolOpts::default().with_constraints(
                    PoolConstraints::new(self.min_connections, self.max_connections)
                        .unwrap_or_default(),
                ),
            );
        if let Some(db) = &self.database {
            builder = builder.db_name(Some(db.clone()));
        }
        Opts::from(builder)
    }
}

/// Production [`DatabaseDriver`] backed by a `mysql_async` connection pool.
pub struct MySqlDriver {
    pool: Pool,
}

impl MySqlDriver {
    pub fn connect(config: &MySqlConfig) -> Result<Self> {
        config.validate()?;
        let pool = Pool::new(config.to_opts());
        Ok(Self { pool })
    }

    pub async fn close(self) -> Result<()> {
        self.pool
            .disconnect()
            .await
            .map_err(|e| RowsmithError::Driver(e.to_string()))
    }
}

#[async_trait]
impl DatabaseDriver for MySqlDriver {
    async fn query(&self, sql: &str, params: &[(&str, Value)]) -> Result<QueryResult> {
        let mut conn = self
            .pool
            .get_conn()
            .await
            .map_err(|e| RowsmithError::Driver(e.to_string()))?;

        let named: HashMap<String, mysql_async::Value> = params
            .iter()
            .map(|(name, value)| (name.to_string(), to_mysql_value(value)))
            .collect();
        let bound = mysql_async::Params::from(named);

        let rows: Vec<mysql_async::Row> = conn
            .exec(sql, bound)
            .await
            .map_err(|e| RowsmithError::Driver(e.to_string()))?;

        Ok(QueryResult(rows.iter().map(from_mysql_row).collect()))
    }
}

fn to_mysql_value(value: &Value) -> mysql_async::Value {
    match value {
        Value::Int(v) => mysql_async::Value::Int(*v),
        Value::UInt(v) => mysql_async::Value::UInt(*v),
        Value::Float(v) => mysql_async::Value::Double(*v),
        Value::Str(v) => mysql_async::Value::Bytes(v.clone().into_bytes()),
        Value::Bytes(v) => mysql_async::Value::Bytes(v.clone()),
        Value::Null => mysql_async::Value::NULL,
    }
}

fn from_mysql_row(row: &mysql_async::Row) -> QueryRow {
    let mut values = Vec::with_capacity(row.len());
    for index in 0..row.len() {
        let value = row.as_ref(index).cloned().unwrap_or(mysql_async::Value::NULL);
        values.push(from_mysql_value(value));
    }
    QueryRow(values)
}

fn from_mysql_value(value: mysql_async::Value) -> Value {
    match value {
        mysql_async::Value::NULL => Value::Null,
        mysql_async::Value::Int(v) => Value::Int(v),
        mysql_async::Value::UInt(v) => Value::UInt(v),
        mysql_async::Value::Float(v) => Value::Float(v as f64),
        mysql_async::Value::Double(v) => Value::Float(v),
        mysql_async::Value::Bytes(bytes) => match String::from_utf8(bytes.clone()) {
            Ok(s) => Value::Str(s),
            Err(_) => Value::Bytes(bytes),
        },
        // Date/Time values only ever flow through catalog metadata
        // (timestamps on `information_schema` rows), never through
        // synthesized row values, so a lossy textual fallback is fine.
        other => Value::Str(other.as_sql(true)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_validates_pool_bounds() {
        let bad = MySqlConfig::new("localhost", 3306, "root", "").with_pool_size(5, 1);
        assert!(bad.validate().is_err());

        let good = MySqlConfig::new("localhost", 3306, "root", "").with_pool_size(1, 5);
        assert!(good.validate().is_ok());
    }

    #[test]
    fn config_rejects_zero_max_connections() {
        let bad = MySqlConfig::new("localhost", 3306, "root", "").with_pool_size(0, 0);
        assert!(bad.validate().is_err());
    }
}
