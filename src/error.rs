use thiserror::Error;

/// Errors surfaced by the row synthesis engine.
///
/// `UniqueCollision` deliberately has no variant here: it is recovered
/// locally by [`crate::row_synthesizer::RowSynthesizer`] via retry and
/// never escapes as an `Err`.
#[derive(Debug, Error)]
pub enum RowsmithError {
    #[error("failed to reflect schema for database `{database}`: {source}")]
    Reflection {
        database: String,
        #[source]
        source: Box<RowsmithError>,
    },

    #[error("column `{table}`.`{column}` not found")]
    ColumnNotFound { table: String, column: String },

    #[error("table `{table}` not found")]
    TableNotFound { table: String },

    #[error("column `{table}`.`{column}` has unsynthesizable type `{raw_type}`")]
    UnknownColumnType {
        table: String,
        column: String,
        raw_type: String,
    },

    #[error(
        "foreign-key graph has a cycle through distinct tables involving `{table}`; \
         only self-references are supported"
    )]
    CyclicForeignKeys { table: String },

    #[error("database driver error: {0}")]
    Driver(String),
}

pub type Result<T> = std::result::Result<T, RowsmithError>;
