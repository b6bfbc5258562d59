//! Conversion between [`RowValues`] and the Rust types a mapped record can hold.
//!
//! Every property type implements [`SqlField`]. Plain types read strictly: the raw value
//! has to belong to the same family (an integer column for an integer property). The
//! nullable wrapper `Option<T>` reads leniently, converting the raw value to `T` the way a
//! runtime type converter would, so `Option<i32>` accepts `"42"` or `42.0`.

use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::types::{DbType, RowValues};

/// A raw value could not be turned into the requested Rust type.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("expected {expected}, found {found}{}", .detail.as_ref().map(|d| format!(" ({d})")).unwrap_or_default())]
pub struct ConversionError {
    pub expected: &'static str,
    pub found: &'static str,
    pub detail: Option<String>,
}

impl ConversionError {
    fn new(expected: &'static str, value: &RowValues) -> Self {
        Self {
            expected,
            found: value.kind(),
            detail: None,
        }
    }

    fn with_detail(expected: &'static str, value: &RowValues, detail: impl ToString) -> Self {
        Self {
            expected,
            found: value.kind(),
            detail: Some(detail.to_string()),
        }
    }
}

/// A scalar type that can be read from a result column and bound as a parameter value.
pub trait SqlField: Sized {
    /// Declared database type; nullable wrappers report their underlying type.
    const DB_TYPE: DbType;
    const NULLABLE: bool = false;

    /// Strict read of a non-null value.
    ///
    /// # Errors
    /// Returns `ConversionError` when the value belongs to an incompatible family.
    fn from_row_value(value: &RowValues) -> Result<Self, ConversionError>;

    /// Lenient conversion used when `Self` sits inside a nullable wrapper.
    ///
    /// # Errors
    /// Returns `ConversionError` when no sensible conversion exists.
    fn coerce(value: &RowValues) -> Result<Self, ConversionError> {
        Self::from_row_value(value)
    }

    fn to_row_value(&self) -> RowValues;

    /// Read a column for assignment to a record property.
    ///
    /// `Ok(None)` means "leave the property at its default": that is what a database null
    /// does to a non-nullable property.
    ///
    /// # Errors
    /// Propagates the conversion failure of the underlying read.
    fn from_column(value: &RowValues) -> Result<Option<Self>, ConversionError> {
        if value.is_null() {
            Ok(None)
        } else {
            Self::from_row_value(value).map(Some)
        }
    }
}

fn integer(value: &RowValues, expected: &'static str) -> Result<i64, ConversionError> {
    match value {
        RowValues::Int(v) => Ok(*v),
        RowValues::Bool(b) => Ok(i64::from(*b)),
        RowValues::Float(f) if f.fract() == 0.0 && f.is_finite() => {
            #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
            let in_range = *f >= i64::MIN as f64 && *f <= i64::MAX as f64;
            if in_range {
                #[allow(clippy::cast_possible_truncation)]
                let wide = *f as i64;
                Ok(wide)
            } else {
                Err(ConversionError::with_detail(expected, value, "out of range"))
            }
        }
        RowValues::Text(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|e| ConversionError::with_detail(expected, value, e)),
        _ => Err(ConversionError::new(expected, value)),
    }
}

macro_rules! narrow_int_field {
    ($($ty:ty => $db:ident),* $(,)?) => {
        $(
            impl SqlField for $ty {
                const DB_TYPE: DbType = DbType::$db;

                fn from_row_value(value: &RowValues) -> Result<Self, ConversionError> {
                    match value {
                        RowValues::Int(v) => <$ty>::try_from(*v).map_err(|e| {
                            ConversionError::with_detail(stringify!($ty), value, e)
                        }),
                        _ => Err(ConversionError::new(stringify!($ty), value)),
                    }
                }

                fn coerce(value: &RowValues) -> Result<Self, ConversionError> {
                    let wide = integer(value, stringify!($ty))?;
                    <$ty>::try_from(wide)
                        .map_err(|e| ConversionError::with_detail(stringify!($ty), value, e))
                }

                fn to_row_value(&self) -> RowValues {
                    RowValues::Int(i64::from(*self))
                }
            }
        )*
    };
}

narrow_int_field! {
    i16 => Int16,
    i32 => Int32,
}

impl SqlField for i64 {
    const DB_TYPE: DbType = DbType::Int64;

    fn from_row_value(value: &RowValues) -> Result<Self, ConversionError> {
        match value {
            RowValues::Int(v) => Ok(*v),
            _ => Err(ConversionError::new("i64", value)),
        }
    }

    fn coerce(value: &RowValues) -> Result<Self, ConversionError> {
        integer(value, "i64")
    }

    fn to_row_value(&self) -> RowValues {
        RowValues::Int(*self)
    }
}

impl SqlField for f64 {
    const DB_TYPE: DbType = DbType::Double;

    fn from_row_value(value: &RowValues) -> Result<Self, ConversionError> {
        match value {
            RowValues::Float(f) => Ok(*f),
            #[allow(clippy::cast_precision_loss)]
            RowValues::Int(i) => Ok(*i as f64),
            _ => Err(ConversionError::new("f64", value)),
        }
    }

    fn coerce(value: &RowValues) -> Result<Self, ConversionError> {
        match value {
            RowValues::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|e| ConversionError::with_detail("f64", value, e)),
            RowValues::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            _ => Self::from_row_value(value),
        }
    }

    fn to_row_value(&self) -> RowValues {
        RowValues::Float(*self)
    }
}

impl SqlField for f32 {
    const DB_TYPE: DbType = DbType::Single;

    #[allow(clippy::cast_possible_truncation)]
    fn from_row_value(value: &RowValues) -> Result<Self, ConversionError> {
        f64::from_row_value(value)
            .map(|f| f as f32)
            .map_err(|_| ConversionError::new("f32", value))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn coerce(value: &RowValues) -> Result<Self, ConversionError> {
        f64::coerce(value)
            .map(|f| f as f32)
            .map_err(|_| ConversionError::new("f32", value))
    }

    fn to_row_value(&self) -> RowValues {
        RowValues::Float(f64::from(*self))
    }
}

impl SqlField for bool {
    const DB_TYPE: DbType = DbType::Boolean;

    fn from_row_value(value: &RowValues) -> Result<Self, ConversionError> {
        value
            .as_bool()
            .copied()
            .ok_or_else(|| ConversionError::new("bool", value))
    }

    fn coerce(value: &RowValues) -> Result<Self, ConversionError> {
        match value {
            RowValues::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                _ => Err(ConversionError::new("bool", value)),
            },
            RowValues::Int(i) => Ok(*i != 0),
            _ => Self::from_row_value(value),
        }
    }

    fn to_row_value(&self) -> RowValues {
        RowValues::Bool(*self)
    }
}

impl SqlField for String {
    const DB_TYPE: DbType = DbType::String;

    fn from_row_value(value: &RowValues) -> Result<Self, ConversionError> {
        value
            .as_text()
            .map(str::to_string)
            .ok_or_else(|| ConversionError::new("string", value))
    }

    fn coerce(value: &RowValues) -> Result<Self, ConversionError> {
        match value {
            RowValues::Text(s) => Ok(s.clone()),
            RowValues::Int(i) => Ok(i.to_string()),
            RowValues::Float(f) => Ok(f.to_string()),
            RowValues::Bool(b) => Ok(b.to_string()),
            RowValues::Timestamp(dt) => Ok(dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
            RowValues::JSON(js) => Ok(js.to_string()),
            RowValues::Blob(_) | RowValues::Null => Err(ConversionError::new("string", value)),
        }
    }

    fn to_row_value(&self) -> RowValues {
        RowValues::Text(self.clone())
    }
}

impl SqlField for NaiveDateTime {
    const DB_TYPE: DbType = DbType::DateTime;

    fn from_row_value(value: &RowValues) -> Result<Self, ConversionError> {
        match value {
            RowValues::Timestamp(dt) => Ok(*dt),
            _ => Err(ConversionError::new("timestamp", value)),
        }
    }

    fn coerce(value: &RowValues) -> Result<Self, ConversionError> {
        value
            .as_timestamp()
            .ok_or_else(|| ConversionError::new("timestamp", value))
    }

    fn to_row_value(&self) -> RowValues {
        RowValues::Timestamp(*self)
    }
}

impl SqlField for Vec<u8> {
    const DB_TYPE: DbType = DbType::Binary;

    fn from_row_value(value: &RowValues) -> Result<Self, ConversionError> {
        value
            .as_blob()
            .map(<[u8]>::to_vec)
            .ok_or_else(|| ConversionError::new("blob", value))
    }

    fn coerce(value: &RowValues) -> Result<Self, ConversionError> {
        match value {
            RowValues::Text(s) => Ok(s.as_bytes().to_vec()),
            _ => Self::from_row_value(value),
        }
    }

    fn to_row_value(&self) -> RowValues {
        RowValues::Blob(self.clone())
    }
}

impl SqlField for JsonValue {
    const DB_TYPE: DbType = DbType::Json;

    fn from_row_value(value: &RowValues) -> Result<Self, ConversionError> {
        match value {
            RowValues::JSON(js) => Ok(js.clone()),
            _ => Err(ConversionError::new("json", value)),
        }
    }

    fn coerce(value: &RowValues) -> Result<Self, ConversionError> {
        match value {
            RowValues::JSON(js) => Ok(js.clone()),
            RowValues::Text(s) => serde_json::from_str(s)
                .map_err(|e| ConversionError::with_detail("json", value, e)),
            RowValues::Int(i) => Ok(JsonValue::from(*i)),
            RowValues::Float(f) => Ok(JsonValue::from(*f)),
            RowValues::Bool(b) => Ok(JsonValue::Bool(*b)),
            _ => Err(ConversionError::new("json", value)),
        }
    }

    fn to_row_value(&self) -> RowValues {
        RowValues::JSON(self.clone())
    }
}

impl<T: SqlField> SqlField for Option<T> {
    const DB_TYPE: DbType = T::DB_TYPE;
    const NULLABLE: bool = true;

    fn from_row_value(value: &RowValues) -> Result<Self, ConversionError> {
        if value.is_null() {
            Ok(None)
        } else {
            T::coerce(value).map(Some)
        }
    }

    fn to_row_value(&self) -> RowValues {
        self.as_ref().map_or(RowValues::Null, SqlField::to_row_value)
    }

    fn from_column(value: &RowValues) -> Result<Option<Self>, ConversionError> {
        Self::from_row_value(value).map(Some)
    }
}

/// A value accepted as a scalar parameter, together with the type it declares.
///
/// Every [`SqlField`] declares its own `DB_TYPE`, so `7_i32` binds as `Int32` and
/// `None::<i32>` as a typed null. String slices declare `String`; a raw [`RowValues`]
/// falls back to the type implied by its variant.
pub trait ParamValue {
    fn declared_type(&self) -> Option<DbType>;

    fn into_row_value(self) -> RowValues;
}

impl<T: SqlField> ParamValue for T {
    fn declared_type(&self) -> Option<DbType> {
        Some(T::DB_TYPE)
    }

    fn into_row_value(self) -> RowValues {
        self.to_row_value()
    }
}

impl ParamValue for &str {
    fn declared_type(&self) -> Option<DbType> {
        Some(DbType::String)
    }

    fn into_row_value(self) -> RowValues {
        RowValues::Text(self.to_string())
    }
}

impl ParamValue for Option<&str> {
    fn declared_type(&self) -> Option<DbType> {
        Some(DbType::String)
    }

    fn into_row_value(self) -> RowValues {
        self.map_or(RowValues::Null, |s| RowValues::Text(s.to_string()))
    }
}

impl ParamValue for RowValues {
    fn declared_type(&self) -> Option<DbType> {
        self.inferred_db_type()
    }

    fn into_row_value(self) -> RowValues {
        self
    }
}
