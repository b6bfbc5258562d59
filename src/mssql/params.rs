use chrono::NaiveDateTime;
use tiberius::Query;

use crate::error::SprocDbError;
use crate::types::{DbType, RowValues};

const MAX_NVARCHAR: usize = 4000;
const MAX_VARBINARY: usize = 8000;

/// T-SQL type used to declare a variable of `db_type`.
///
/// # Errors
/// `ParameterError` for `Structured`, whose type name comes from the table value.
pub fn sql_type_name(db_type: DbType, size: Option<usize>) -> Result<String, SprocDbError> {
    let name = match db_type {
        DbType::Int16 => "smallint".to_string(),
        DbType::Int32 => "int".to_string(),
        DbType::Int64 => "bigint".to_string(),
        DbType::Single => "real".to_string(),
        DbType::Double => "float".to_string(),
        DbType::Boolean => "bit".to_string(),
        DbType::DateTime => "datetime2".to_string(),
        DbType::String => match size {
            Some(n) if n > 0 && n <= MAX_NVARCHAR => format!("nvarchar({n})"),
            _ => "nvarchar(max)".to_string(),
        },
        DbType::Binary => match size {
            Some(n) if n > 0 && n <= MAX_VARBINARY => format!("varbinary({n})"),
            _ => "varbinary(max)".to_string(),
        },
        DbType::Json => "nvarchar(max)".to_string(),
        DbType::Structured => {
            return Err(SprocDbError::ParameterError(
                "structured values are declared with their table type name".to_string(),
            ));
        }
    };
    Ok(name)
}

fn is_plain_identifier(part: &str) -> bool {
    !part.is_empty()
        && part
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '@' | '#' | '$'))
}

/// Bracket-quote a one- to three-part object name such as `dbo.spGetEmployees`.
///
/// Parts already in brackets are kept as written.
///
/// # Errors
/// `ArgumentError` when a part is empty or holds characters outside an identifier.
pub fn quote_object_name(name: &str) -> Result<String, SprocDbError> {
    let parts: Vec<&str> = name.split('.').map(str::trim).collect();
    if parts.len() > 3 {
        return Err(SprocDbError::ArgumentError(format!(
            "`{name}` has too many name parts"
        )));
    }
    let mut quoted = Vec::with_capacity(parts.len());
    for part in parts {
        let bracketed = part.len() > 2 && part.starts_with('[') && part.ends_with(']');
        if bracketed && !part[1..part.len() - 1].replace("]]", "").contains(']') {
            quoted.push(part.to_string());
        } else if is_plain_identifier(part) {
            quoted.push(format!("[{part}]"));
        } else {
            return Err(SprocDbError::ArgumentError(format!(
                "`{name}` is not a valid object name"
            )));
        }
    }
    Ok(quoted.join("."))
}

/// Validate a parameter name for use as `@name` in the batch.
///
/// # Errors
/// `ParameterError` when the name holds characters outside an identifier.
pub fn checked_param_name(name: &str) -> Result<&str, SprocDbError> {
    let bare = crate::parameter::bare_name(name);
    if is_plain_identifier(bare) && !bare.starts_with('@') {
        Ok(bare)
    } else {
        Err(SprocDbError::ParameterError(format!(
            "`{name}` is not a valid parameter name"
        )))
    }
}

/// Column alias with `]` escaped.
pub fn quote_alias(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// Bind one value to the next `@Pn` placeholder, honouring the declared type for
/// integers, floats, and nulls.
pub fn bind_value(query: &mut Query<'_>, value: &RowValues, db_type: Option<DbType>) {
    match (value, db_type) {
        (RowValues::Int(i), Some(DbType::Int16)) => match i16::try_from(*i) {
            Ok(v) => query.bind(v),
            Err(_) => query.bind(*i),
        },
        (RowValues::Int(i), Some(DbType::Int32)) => match i32::try_from(*i) {
            Ok(v) => query.bind(v),
            Err(_) => query.bind(*i),
        },
        #[allow(clippy::cast_precision_loss)]
        (RowValues::Int(i), Some(DbType::Double | DbType::Single)) => query.bind(*i as f64),
        (RowValues::Int(i), _) => query.bind(*i),
        #[allow(clippy::cast_possible_truncation)]
        (RowValues::Float(f), Some(DbType::Single)) => query.bind(*f as f32),
        (RowValues::Float(f), _) => query.bind(*f),
        (RowValues::Text(s), _) => query.bind(s.clone()),
        (RowValues::Bool(b), _) => query.bind(*b),
        (RowValues::Timestamp(dt), _) => query.bind(*dt),
        (RowValues::JSON(jsval), _) => query.bind(jsval.to_string()),
        (RowValues::Blob(bytes), _) => query.bind(bytes.clone()),
        (RowValues::Null, ty) => bind_null(query, ty),
    }
}

fn bind_null(query: &mut Query<'_>, db_type: Option<DbType>) {
    match db_type {
        Some(DbType::Int16) => query.bind(Option::<i16>::None),
        Some(DbType::Int32) => query.bind(Option::<i32>::None),
        Some(DbType::Int64) => query.bind(Option::<i64>::None),
        Some(DbType::Single) => query.bind(Option::<f32>::None),
        Some(DbType::Double) => query.bind(Option::<f64>::None),
        Some(DbType::Boolean) => query.bind(Option::<bool>::None),
        Some(DbType::DateTime) => query.bind(Option::<NaiveDateTime>::None),
        Some(DbType::Binary) => query.bind(Option::<Vec<u8>>::None),
        Some(DbType::String | DbType::Json | DbType::Structured) | None => {
            query.bind(Option::<String>::None);
        }
    }
}
