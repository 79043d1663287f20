//! rowsmith — a constraint-aware synthetic row generator for MySQL
//! schemas.
//!
//! Given a live connection, a target database name, and an optional
//! per-table/per-column override map, [`driver::FakeFactory`] walks
//! every table in foreign-key dependency order and inserts
//! caller-specified counts of synthetic rows, respecting nullability,
//! foreign-key references, and composite unique indexes.

pub mod connection;
pub mod constraint;
pub mod db;
pub mod driver;
pub mod error;
pub mod faker;
pub mod foreign_scope;
pub mod progress;
pub mod reflect;
pub mod row_synthesizer;
pub mod schema;
pub mod testing;
pub mod value_factory;

pub use connection::{MySqlConfig, MySqlDriver};
pub use db::{DatabaseDriver, QueryResult, QueryRow, Value};
pub use driver::{FakeFactory, FakeTable, GenerationReport};
pub use error::{Result, RowsmithError};
pub use faker::{Faker, RandFaker};
pub use progress::{ConsoleProgressSink, NullProgressSink, ProgressSink};
pub use reflect::reflect_database;
pub use row_synthesizer::FakeColumnOverride;
pub use schema::{Column, ColumnSize, ColumnType, Database, Table};
pub use value_factory::FakePolicy;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
