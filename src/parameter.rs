//! Procedure parameters: direction, declared type, and the ordered set a command carries.

use crate::conversion::ParamValue;
use crate::table::TableValue;
use crate::types::{DbType, RowValues};

/// Direction of a procedure parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterDirection {
    #[default]
    Input,
    Output,
    InputOutput,
    /// The procedure's integer return code.
    ReturnValue,
}

impl ParameterDirection {
    /// Whether the driver writes a value back after execution.
    #[must_use]
    pub fn is_output(self) -> bool {
        !matches!(self, ParameterDirection::Input)
    }
}

/// Value carried by a parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    /// No value was supplied; used by purely output parameters.
    Unset,
    Scalar(RowValues),
    Table(TableValue),
}

impl ParameterValue {
    #[must_use]
    pub fn as_scalar(&self) -> Option<&RowValues> {
        if let ParameterValue::Scalar(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_table(&self) -> Option<&TableValue> {
        if let ParameterValue::Table(table) = self {
            Some(table)
        } else {
            None
        }
    }
}

/// Direction, size, and declared type for one parameter.
///
/// ```rust
/// use sproc_middleware::prelude::*;
///
/// let param = ParamConfig::output(DbType::String)
///     .size(2047)
///     .bind("ErrorDescription", RowValues::Text(String::new()));
/// assert!(param.direction.is_output());
/// assert_eq!(param.size, Some(2047));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamConfig {
    pub direction: ParameterDirection,
    pub size: Option<usize>,
    pub db_type: Option<DbType>,
}

impl ParamConfig {
    #[must_use]
    pub fn input() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn output(db_type: DbType) -> Self {
        Self {
            direction: ParameterDirection::Output,
            size: None,
            db_type: Some(db_type),
        }
    }

    #[must_use]
    pub fn direction(mut self, direction: ParameterDirection) -> Self {
        self.direction = direction;
        self
    }

    #[must_use]
    pub fn size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    #[must_use]
    pub fn db_type(mut self, db_type: DbType) -> Self {
        self.db_type = Some(db_type);
        self
    }

    /// Build a parameter carrying `value`; the declared type falls back to the one implied
    /// by the value.
    #[must_use]
    pub fn bind(self, name: &str, value: RowValues) -> SqlParameter {
        let db_type = self.db_type.or_else(|| value.inferred_db_type());
        SqlParameter {
            name: name.to_string(),
            direction: self.direction,
            db_type,
            size: self.size,
            value: ParameterValue::Scalar(value),
        }
    }

    /// Build a parameter with no initial value.
    #[must_use]
    pub fn bind_unset(self, name: &str) -> SqlParameter {
        SqlParameter {
            name: name.to_string(),
            direction: self.direction,
            db_type: self.db_type,
            size: self.size,
            value: ParameterValue::Unset,
        }
    }
}

/// A fully described procedure parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlParameter {
    pub name: String,
    pub direction: ParameterDirection,
    pub db_type: Option<DbType>,
    pub size: Option<usize>,
    pub value: ParameterValue,
}

impl SqlParameter {
    /// Input parameter with a scalar value.
    #[must_use]
    pub fn input(name: &str, value: impl ParamValue) -> Self {
        let mut config = ParamConfig::input();
        config.db_type = value.declared_type();
        config.bind(name, value.into_row_value())
    }

    /// Input parameter carrying a whole table.
    #[must_use]
    pub fn table(name: &str, table: TableValue) -> Self {
        SqlParameter {
            name: name.to_string(),
            direction: ParameterDirection::Input,
            db_type: Some(DbType::Structured),
            size: None,
            value: ParameterValue::Table(table),
        }
    }

    /// Name without a leading `@`.
    #[must_use]
    pub fn bare_name(&self) -> &str {
        bare_name(&self.name)
    }
}

pub(crate) fn bare_name(name: &str) -> &str {
    name.strip_prefix('@').unwrap_or(name)
}

pub(crate) fn same_name(a: &str, b: &str) -> bool {
    bare_name(a).eq_ignore_ascii_case(bare_name(b))
}

/// Output values written back by a driver, keyed by parameter name.
pub type OutputValues = Vec<(String, RowValues)>;

/// Ordered parameters of one command. Insertion order is kept; lookups go by name,
/// ignoring ASCII case and a leading `@`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    params: Vec<SqlParameter>,
}

impl ParameterSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, param: SqlParameter) {
        self.params.push(param);
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SqlParameter> {
        self.params.iter().find(|p| same_name(&p.name, name))
    }

    /// Scalar value of a parameter, typically read back from an output parameter.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&RowValues> {
        self.get(name).and_then(|p| p.value.as_scalar())
    }

    /// Read the error-output pair attached by
    /// [`with_error_params`](crate::command::SprocCommand::with_error_params).
    ///
    /// Returns `None` unless both outputs hold non-null values.
    #[must_use]
    pub fn error_outputs(&self, code_name: &str, message_name: &str) -> Option<(i32, String)> {
        let code = self.value(code_name)?.as_int()?;
        let message = self.value(message_name)?.as_text()?;
        Some((i32::try_from(*code).ok()?, message.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &SqlParameter> {
        self.params.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Store values reported by the driver into the matching output parameters.
    ///
    /// Values for unknown names or input-only parameters are ignored.
    pub(crate) fn apply_outputs(&mut self, outputs: OutputValues) {
        for (name, value) in outputs {
            if let Some(param) = self
                .params
                .iter_mut()
                .find(|p| p.direction.is_output() && same_name(&p.name, &name))
            {
                param.value = ParameterValue::Scalar(value);
            } else {
                tracing::trace!(parameter = %name, "ignoring output value for unknown parameter");
            }
        }
    }
}

impl<'a> IntoIterator for &'a ParameterSet {
    type Item = &'a SqlParameter;
    type IntoIter = std::slice::Iter<'a, SqlParameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.iter()
    }
}
