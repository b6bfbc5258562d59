use crate::conversion::{ParamValue, SqlField};
use crate::error::SprocDbError;
use crate::parameter::{ParamConfig, SqlParameter, same_name};
use crate::table::{TableRecord, TableValue};
use crate::types::DbType;

use super::SprocCommand;

/// Default column name of a single-column table-valued parameter.
pub const DEFAULT_TABLE_COLUMN: &str = "Id";
pub const DEFAULT_ERROR_CODE_PARAM: &str = "ErrorCode";
pub const DEFAULT_ERROR_DESCRIPTION_PARAM: &str = "ErrorDescription";
/// Size of the error description output parameter.
pub const ERROR_DESCRIPTION_SIZE: usize = 2047;

impl<C: ?Sized> SprocCommand<'_, C> {
    fn attach(&mut self, param: SqlParameter) -> Result<&mut Self, SprocDbError> {
        self.ensure_bound()?;
        if param.bare_name().is_empty() {
            return Err(SprocDbError::ArgumentError(
                "parameter name must not be empty".to_string(),
            ));
        }
        if self.call.parameters.contains(&param.name) {
            return Err(SprocDbError::ArgumentError(format!(
                "parameter `{}` is already bound",
                param.name
            )));
        }
        tracing::debug!(
            procedure = %self.call.command_text,
            parameter = %param.name,
            direction = ?param.direction,
            "bound parameter"
        );
        self.call.parameters.push(param);
        Ok(self)
    }

    /// Bind an input parameter declared with the value's Rust type (`i32` binds as
    /// `Int32`). `None` values are sent as a database null of the wrapped type.
    ///
    /// # Errors
    /// `InvalidState` before the command is bound to a procedure; `ArgumentError` for an
    /// empty or duplicate name.
    pub fn with_param(
        &mut self,
        name: &str,
        value: impl ParamValue,
    ) -> Result<&mut Self, SprocDbError> {
        self.with_param_config(name, value, ParamConfig::input())
    }

    /// Bind a parameter with explicit direction, size, or declared type. Without a type in
    /// `config` the value's own type is declared.
    ///
    /// # Errors
    /// Same as [`with_param`](Self::with_param).
    pub fn with_param_config(
        &mut self,
        name: &str,
        value: impl ParamValue,
        mut config: ParamConfig,
    ) -> Result<&mut Self, SprocDbError> {
        if config.db_type.is_none() {
            config.db_type = value.declared_type();
        }
        self.attach(config.bind(name, value.into_row_value()))
    }

    /// Bind a parameter without an initial value, typically a pure output parameter.
    ///
    /// # Errors
    /// Same as [`with_param`](Self::with_param).
    pub fn with_unset_param(
        &mut self,
        name: &str,
        config: ParamConfig,
    ) -> Result<&mut Self, SprocDbError> {
        self.attach(config.bind_unset(name))
    }

    /// Bind a fully built parameter; `name` replaces the parameter's own name.
    ///
    /// # Errors
    /// Same as [`with_param`](Self::with_param).
    pub fn with_sql_param(
        &mut self,
        name: &str,
        mut parameter: SqlParameter,
    ) -> Result<&mut Self, SprocDbError> {
        parameter.name = name.to_string();
        self.attach(parameter)
    }

    /// Bind a single-column table-valued parameter whose column is named `Id`.
    ///
    /// # Errors
    /// Same as [`with_param`](Self::with_param).
    pub fn with_table_param<T: SqlField>(
        &mut self,
        name: &str,
        values: impl IntoIterator<Item = T>,
    ) -> Result<&mut Self, SprocDbError> {
        self.with_table_param_column(name, values, DEFAULT_TABLE_COLUMN)
    }

    /// Bind a single-column table-valued parameter with a custom column name.
    ///
    /// # Errors
    /// Same as [`with_param`](Self::with_param).
    pub fn with_table_param_column<T: SqlField>(
        &mut self,
        name: &str,
        values: impl IntoIterator<Item = T>,
        column_name: &str,
    ) -> Result<&mut Self, SprocDbError> {
        self.ensure_bound()?;
        let table = TableValue::single_column(column_name, values);
        self.attach(SqlParameter::table(name, table))
    }

    /// Bind a multi-column table-valued parameter built from records.
    ///
    /// # Errors
    /// Same as [`with_param`](Self::with_param).
    pub fn with_multi_column_table_param<'r, T: TableRecord + 'r>(
        &mut self,
        name: &str,
        records: impl IntoIterator<Item = &'r T>,
    ) -> Result<&mut Self, SprocDbError> {
        self.ensure_bound()?;
        let table = TableValue::from_records(records);
        self.attach(SqlParameter::table(name, table))
    }

    /// Attach the `ErrorCode` / `ErrorDescription` output pair used by procedures that
    /// report failures through output parameters.
    ///
    /// # Errors
    /// Same as [`with_param`](Self::with_param).
    pub fn with_error_params(&mut self) -> Result<&mut Self, SprocDbError> {
        self.with_error_params_named(DEFAULT_ERROR_CODE_PARAM, DEFAULT_ERROR_DESCRIPTION_PARAM)
    }

    /// Attach the error output pair under custom names: an int code and a string of up
    /// to 2047 characters.
    ///
    /// # Errors
    /// Same as [`with_param`](Self::with_param).
    pub fn with_error_params_named(
        &mut self,
        code_name: &str,
        description_name: &str,
    ) -> Result<&mut Self, SprocDbError> {
        self.ensure_bound()?;
        if same_name(code_name, description_name) {
            return Err(SprocDbError::ArgumentError(format!(
                "error code and description parameters share the name `{code_name}`"
            )));
        }
        if self.call.parameters.contains(code_name) || self.call.parameters.contains(description_name) {
            return Err(SprocDbError::ArgumentError(format!(
                "parameter `{code_name}` or `{description_name}` is already bound"
            )));
        }
        self.with_param_config(code_name, 0_i32, ParamConfig::output(DbType::Int32))?
            .with_param_config(
                description_name,
                String::new(),
                ParamConfig::output(DbType::String).size(ERROR_DESCRIPTION_SIZE),
            )
    }
}
