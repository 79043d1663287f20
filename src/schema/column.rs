/// Base SQL type of a reflected column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnType {
    TinyInt,
    SmallInt,
    MediumInt,
    Int,
    BigInt,
    Char,
    VarChar,
    Text,
    LongText,
    Float,
    Decimal,
    Enum,
    Set,
    Date,
    DateTime,
    Timestamp,
    /// Escape hatch for a base type this engine cannot synthesize
    /// without a user-supplied override.
    Other(String),
}

impl ColumnType {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "tinyint" => ColumnType::TinyInt,
            "smallint" => ColumnType::SmallInt,
            "mediumint" => ColumnType::MediumInt,
            "int" => ColumnType::Int,
            "bigint" => ColumnType::BigInt,
            "char" => ColumnType::Char,
            "varchar" => ColumnType::VarChar,
            "text" => ColumnType::Text,
            "longtext" => ColumnType::LongText,
            "float" => ColumnType::Float,
            "decimal" => ColumnType::Decimal,
            "enum" => ColumnType::Enum,
            "set" => ColumnType::Set,
            "date" => ColumnType::Date,
            "datetime" => ColumnType::DateTime,
            "timestamp" => ColumnType::Timestamp,
            other => ColumnType::Other(other.to_string()),
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ColumnType::TinyInt
                | ColumnType::SmallInt
                | ColumnType::MediumInt
                | ColumnType::Int
                | ColumnType::BigInt
        )
    }
}

/// The `Type(...)` argument list reflected off a column's catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnSize {
    None,
    /// `char(n)` / `varchar(n)` length, or an integer display width.
    Length(u32),
    /// `float(p, s)` / `decimal(p, s)`.
    Precision { precision: u32, scale: u32 },
    /// `enum(...)` / `set(...)` literal list, in declared order.
    Literals(Vec<String>),
}

/// A single reflected column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    pub size: ColumnSize,
    pub unsigned: bool,
    pub nullable: bool,
    pub default: Option<String>,
    pub on_update: Option<String>,
    pub auto_increment: bool,
    /// (table_name, column_name) pairs of columns referencing this one.
    pub references_from: Vec<(String, String)>,
    /// (table_name, column_name) this column references, if any.
    pub referenced_to: Option<(String, String)>,
}

impl Column {
    /// A column is fillable iff it is not auto-increment and neither its
    /// DEFAULT nor ON UPDATE expression is `CURRENT_TIMESTAMP`.
    pub fn fillable(&self) -> bool {
        if self.auto_increment {
            return false;
        }
        let is_current_timestamp = |raw: &Option<String>| {
            raw.as_deref()
                .map(|v| v.eq_ignore_ascii_case("CURRENT_TIMESTAMP"))
                .unwrap_or(false)
        };
        !is_current_timestamp(&self.default) && !is_current_timestamp(&self.on_update)
    }
}
