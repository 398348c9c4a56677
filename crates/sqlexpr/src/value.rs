//! Scalar bind values.
//!
//! Every binding that leaves this crate is a [`Value`]. Expressions never appear in the
//! flattened bindings list, only the scalars they carry.

use bytes::BytesMut;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::fmt;
use tokio_postgres::types::{IsNull, ToSql, Type, WrongType, to_sql_checked};

/// A scalar value bound to a `?` placeholder.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
    Date(NaiveDate),
}

impl Value {
    /// Check if this value is SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrow the text payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get the integer payload, if any.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(v) => f.write_str(v),
            Value::Timestamp(v) => write!(f, "{v}"),
            Value::Date(v) => write!(f, "{v}"),
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Int(i64::from(v))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

type ToSqlResult = Result<IsNull, Box<dyn std::error::Error + Sync + Send>>;

/// Encode with `T`'s wire format, failing for column types `T` cannot encode.
fn encode<T: ToSql>(v: &T, ty: &Type, out: &mut BytesMut) -> ToSqlResult {
    if !T::accepts(ty) {
        return Err(Box::new(WrongType::new::<T>(ty.clone())));
    }
    v.to_sql(ty, out)
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> ToSqlResult {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => encode(v, ty, out),
            // Postgres is strict about integer widths; narrow to the column type.
            Value::Int(v) => {
                if *ty == Type::INT2 {
                    encode(&i16::try_from(*v)?, ty, out)
                } else if *ty == Type::INT4 {
                    encode(&i32::try_from(*v)?, ty, out)
                } else if *ty == Type::FLOAT4 {
                    encode(&(*v as f32), ty, out)
                } else if *ty == Type::FLOAT8 {
                    encode(&(*v as f64), ty, out)
                } else if *ty == Type::TEXT || *ty == Type::VARCHAR {
                    encode(&v.to_string(), ty, out)
                } else {
                    encode(v, ty, out)
                }
            }
            Value::Float(v) => {
                if *ty == Type::FLOAT4 {
                    encode(&(*v as f32), ty, out)
                } else {
                    encode(v, ty, out)
                }
            }
            Value::Text(v) => encode(v, ty, out),
            Value::Timestamp(v) => encode(v, ty, out),
            Value::Date(v) => encode(v, ty, out),
        }
    }

    /// Column types at least one variant can be written to.
    fn accepts(ty: &Type) -> bool {
        <bool as ToSql>::accepts(ty)
            || <i16 as ToSql>::accepts(ty)
            || <i32 as ToSql>::accepts(ty)
            || <i64 as ToSql>::accepts(ty)
            || <f32 as ToSql>::accepts(ty)
            || <f64 as ToSql>::accepts(ty)
            || <String as ToSql>::accepts(ty)
            || <NaiveDateTime as ToSql>::accepts(ty)
            || <NaiveDate as ToSql>::accepts(ty)
    }

    to_sql_checked!();
}
