use crate::error::DbError;
use crate::variables::DatabaseVariable;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use sqlx::Arguments;
use sqlx::postgres::PgArguments;
use uuid::Uuid;

/// A literal that is sent to the database as a bind parameter.
///
/// SQL `NULL` is not a literal here; use [`DatabaseVariable::Null`], which is written
/// into the statement and therefore needs no parameter type.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Decimal(Decimal),
    Json(JsonValue),
}

/// The right-hand side of a condition or assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// Bound through a `$n` placeholder.
    Literal(SqlValue),
    /// Inserted into the statement text.
    Variable(DatabaseVariable),
}

/// Returns `true` only for values built from [`DatabaseVariable`].
pub fn is_database_variable(value: &FilterValue) -> bool {
    matches!(value, FilterValue::Variable(_))
}

impl SqlValue {
    fn add_to(self, args: &mut PgArguments) -> Result<(), DbError> {
        let result = match self {
            SqlValue::Bool(v) => args.add(v),
            SqlValue::Int(v) => args.add(v),
            SqlValue::Float(v) => args.add(v),
            SqlValue::Text(v) => args.add(v),
            SqlValue::Uuid(v) => args.add(v),
            SqlValue::Timestamp(v) => args.add(v),
            SqlValue::Decimal(v) => args.add(v),
            SqlValue::Json(v) => args.add(v),
        };
        result.map_err(|e| DbError::BindError(e.to_string()))
    }
}

/// Encodes `values` in order as `$1..$n` arguments.
pub fn into_arguments(values: Vec<SqlValue>) -> Result<PgArguments, DbError> {
    let mut args = PgArguments::default();
    for value in values {
        value.add_to(&mut args)?;
    }
    Ok(args)
}

macro_rules! impl_literal_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for SqlValue {
                fn from(value: $ty) -> Self {
                    SqlValue::$variant(value.into())
                }
            }

            impl From<$ty> for FilterValue {
                fn from(value: $ty) -> Self {
                    FilterValue::Literal(SqlValue::from(value))
                }
            }
        )*
    };
}

impl_literal_from! {
    bool => Bool,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    f32 => Float,
    f64 => Float,
    String => Text,
    &str => Text,
    Uuid => Uuid,
    DateTime<Utc> => Timestamp,
    Decimal => Decimal,
    JsonValue => Json,
}

impl From<SqlValue> for FilterValue {
    fn from(value: SqlValue) -> Self {
        FilterValue::Literal(value)
    }
}

impl From<DatabaseVariable> for FilterValue {
    fn from(value: DatabaseVariable) -> Self {
        FilterValue::Variable(value)
    }
}
