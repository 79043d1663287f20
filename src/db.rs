use async_trait::async_trait;

use crate::error::Result;

/// A value flowing between the synthesis engine and a [`DatabaseDriver`].
///
/// Kept deliberately small and owned so the core never leaks a concrete
/// driver's wire type (`mysql_async::Value`, or a mock's own
/// representation) into schema reflection or row synthesis.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Null,
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::UInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

/// One row of a [`QueryResult`], indexable by position like the Python
/// collaborator's row objects.
#[derive(Debug, Clone, Default)]
pub struct QueryRow(pub Vec<Value>);

impl QueryRow {
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The result of one [`DatabaseDriver::query`] call.
#[derive(Debug, Clone, Default)]
pub struct QueryResult(pub Vec<QueryRow>);

impl QueryResult {
    pub fn fetchone(&self) -> Option<&QueryRow> {
        self.0.first()
    }

    pub fn fetchall(&self) -> &[QueryRow] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Minimal database driver collaborator: "query with named parameters,
/// return rows". Implementations bind `:name` placeholders appearing in
/// `sql` against `params`.
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    async fn query(&self, sql: &str, params: &[(&str, Value)]) -> Result<QueryResult>;
}
