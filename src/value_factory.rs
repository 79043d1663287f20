//! ValueFactory: maps a reflected column's type/width/signedness to one
//! random value, delegating strings/dates to the [`Faker`] collaborator.

use std::sync::Arc;

use crate::db::Value;
use crate::error::{Result, RowsmithError};
use crate::faker::Faker;
use crate::schema::column::{Column, ColumnSize, ColumnType};

/// Propagated to every subordinate generation call.
#[derive(Clone)]
pub struct FakePolicy {
    pub fake: Arc<dyn Faker>,
    pub empty_ratio: f64,
    pub nullable_ratio: f64,
    pub prevent_negative: Option<bool>,
}

impl FakePolicy {
    pub fn new(fake: Arc<dyn Faker>) -> Self {
        Self {
            fake,
            empty_ratio: 0.01,
            nullable_ratio: 0.01,
            prevent_negative: None,
        }
    }

    pub fn with_empty_ratio(mut self, ratio: f64) -> Self {
        self.empty_ratio = ratio;
        self
    }

    pub fn with_nullable_ratio(mut self, ratio: f64) -> Self {
        self.nullable_ratio = ratio;
        self
    }

    pub fn with_prevent_negative(mut self, prevent_negative: bool) -> Self {
        self.prevent_negative = Some(prevent_negative);
        self
    }
}

pub struct ValueFactory<'a> {
    policy: &'a FakePolicy,
}

impl<'a> ValueFactory<'a> {
    pub fn new(policy: &'a FakePolicy) -> Self {
        Self { policy }
    }

    pub fn generate(&self, table_name: &str, column: &Column) -> Result<Value> {
        let prevent_negative = self.policy.prevent_negative.unwrap_or(false);
        match &column.column_type {
            ColumnType::TinyInt
            | ColumnType::SmallInt
            | ColumnType::MediumInt
            | ColumnType::Int
            | ColumnType::BigInt => Ok(self.integer_value(&column.column_type, column.unsigned, prevent_negative)),
            ColumnType::Char => Ok(self.char_value(&column.size)),
            ColumnType::VarChar => Ok(self.varchar_value(&column.size)),
            ColumnType::Text | ColumnType::LongText => Ok(self.text_value()),
            ColumnType::Float | ColumnType::Decimal => Ok(self.decimal_like_value(&column.size)),
            ColumnType::Enum => self.enum_value(table_name, column),
            ColumnType::Set => self.set_value(table_name, column),
            ColumnType::Date => Ok(Value::Str(self.policy.fake.date().format("%Y-%m-%d").to_string())),
            ColumnType::DateTime | ColumnType::Timestamp => Ok(Value::Str(
                self.policy.fake.date_time().format("%Y-%m-%d %H:%M:%S").to_string(),
            )),
            ColumnType::Other(raw_type) => Err(RowsmithError::UnknownColumnType {
                table: table_name.to_string(),
                column: column.name.clone(),
                raw_type: raw_type.clone(),
            }),
        }
    }

    fn integer_value(&self, column_type: &ColumnType, unsigned: bool, prevent_negative: bool) -> Value {
        match column_type {
            ColumnType::BigInt if unsigned => Value::UInt(self.policy.fake.random_uint(0, u64::MAX)),
            _ => {
                let (mut min, max): (i64, i64) = match (column_type, unsigned) {
                    (ColumnType::TinyInt, false) => (-128, 127),
                    (ColumnType::TinyInt, true) => (0, 255),
                    (ColumnType::SmallInt, false) => (-32_768, 32_767),
                    (ColumnType::SmallInt, true) => (0, 65_535),
                    (ColumnType::MediumInt, false) => (-8_388_608, 8_388_607),
                    (ColumnType::MediumInt, true) => (0, 16_777_215),
                    (ColumnType::Int, false) => (i32::MIN as i64, i32::MAX as i64),
                    (ColumnType::Int, true) => (0, u32::MAX as i64),
                    (ColumnType::BigInt, false) => (i64::MIN, i64::MAX),
                    _ => (0, 0),
                };
                if !unsigned && prevent_negative {
                    min = 0;
                }
                let value = self.policy.fake.random_int(min, max);
                if unsigned {
                    Value::UInt(value as u64)
                } else {
                    Value::Int(value)
                }
            }
        }
    }

    fn char_value(&self, size: &ColumnSize) -> Value {
        let length = match size {
            ColumnSize::Length(n) => *n,
            _ => 1,
        };
        Value::Str(self.policy.fake.random_letters(length))
    }

    fn varchar_value(&self, size: &ColumnSize) -> Value {
        let length = match size {
            ColumnSize::Length(n) => *n,
            _ => 1,
        };
        if self.policy.fake.ratio() < self.policy.empty_ratio {
            return Value::Str(String::new());
        }
        if length < 5 {
            let run = self.policy.fake.random_int(1, length.max(1) as i64) as u32;
            Value::Str(self.policy.fake.random_letters(run))
        } else {
            Value::Str(self.policy.fake.text(length as usize))
        }
    }

    fn text_value(&self) -> Value {
        if self.policy.fake.ratio() < self.policy.empty_ratio {
            Value::Str(String::new())
        } else {
            Value::Str(self.policy.fake.sentence())
        }
    }

    /// Shared by `float`/`decimal`. Builds a `#…#[.#…#]` bothify pattern
    /// from `(precision, scale)`; sizeless `float` columns fall back to
    /// `random() * randint(1, 12)`.
    fn decimal_like_value(&self, size: &ColumnSize) -> Value {
        match size {
            ColumnSize::Precision { precision, scale } => {
                let integer_digits = precision.saturating_sub(*scale).max(1);
                let mut pattern = "#".repeat(integer_digits as usize);
                if *scale > 0 {
                    pattern.push('.');
                    pattern.push_str(&"#".repeat(*scale as usize));
                }
                Value::Str(self.policy.fake.bothify(&pattern))
            }
            _ => {
                let magnitude = self.policy.fake.random_int(1, 12) as f64;
                Value::Float(self.policy.fake.ratio() * magnitude)
            }
        }
    }

    fn enum_value(&self, table_name: &str, column: &Column) -> Result<Value> {
        match &column.size {
            ColumnSize::Literals(literals) => Ok(Value::Str(self.policy.fake.random_element(literals))),
            _ => Err(RowsmithError::UnknownColumnType {
                table: table_name.to_string(),
                column: column.name.clone(),
                raw_type: "enum".to_string(),
            }),
        }
    }

    fn set_value(&self, table_name: &str, column: &Column) -> Result<Value> {
        match &column.size {
            ColumnSize::Literals(literals) => {
                Ok(Value::Str(self.policy.fake.random_elements(literals).join(",")))
            }
            _ => Err(RowsmithError::UnknownColumnType {
                table: table_name.to_string(),
                column: column.name.clone(),
                raw_type: "set".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::faker::RandFaker;

    fn column(column_type: ColumnType, size: ColumnSize, unsigned: bool) -> Column {
        Column {
            name: "col".to_string(),
            column_type,
            size,
            unsigned,
            nullable: false,
            default: None,
            on_update: None,
            auto_increment: false,
            references_from: Vec::new(),
            referenced_to: None,
        }
    }

    #[test]
    fn unsigned_tinyint_stays_in_range() {
        let policy = FakePolicy::new(Arc::new(RandFaker::new(1)));
        let factory = ValueFactory::new(&policy);
        let col = column(ColumnType::TinyInt, ColumnSize::None, true);
        for _ in 0..50 {
            let v = factory.generate("t", &col).unwrap();
            let n = v.as_i64().unwrap();
            assert!((0..=255).contains(&n));
        }
    }

    #[test]
    fn prevent_negative_keeps_signed_int_non_negative() {
        let policy = FakePolicy::new(Arc::new(RandFaker::new(2))).with_prevent_negative(true);
        let factory = ValueFactory::new(&policy);
        let col = column(ColumnType::Int, ColumnSize::None, false);
        for _ in 0..50 {
            let v = factory.generate("t", &col).unwrap();
            assert!(v.as_i64().unwrap() >= 0);
        }
    }

    #[test]
    fn decimal_formats_precision_and_scale() {
        let policy = FakePolicy::new(Arc::new(RandFaker::new(3)));
        let factory = ValueFactory::new(&policy);
        let col = column(
            ColumnType::Decimal,
            ColumnSize::Precision { precision: 6, scale: 2 },
            false,
        );
        let v = factory.generate("t", &col).unwrap();
        let text = v.as_str().unwrap();
        let (int_part, frac_part) = text.split_once('.').unwrap();
        assert_eq!(int_part.len(), 4);
        assert_eq!(frac_part.len(), 2);
    }

    #[test]
    fn enum_picks_declared_literal() {
        let policy = FakePolicy::new(Arc::new(RandFaker::new(4)));
        let factory = ValueFactory::new(&policy);
        let literals = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let col = column(ColumnType::Enum, ColumnSize::Literals(literals.clone()), false);
        for _ in 0..20 {
            let v = factory.generate("t", &col).unwrap();
            assert!(literals.contains(&v.as_str().unwrap().to_string()));
        }
    }

    #[test]
    fn unknown_base_type_is_an_error() {
        let policy = FakePolicy::new(Arc::new(RandFaker::new(5)));
        let factory = ValueFactory::new(&policy);
        let col = column(ColumnType::Other("geometry".to_string()), ColumnSize::None, false);
        assert!(factory.generate("t", &col).is_err());
    }
}
