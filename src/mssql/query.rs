//! Renders a stored-procedure call as one parameterised T-SQL batch and reads the
//! response back into buffered result sets.
//!
//! Output and return-value parameters become local variables selected after the `EXEC`;
//! that trailing row is stripped from the result sets and reported as output values.
//! Table-valued parameters are declared with their table type and filled by `INSERT`
//! before the call.

use std::fmt::Write as _;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use futures_util::TryStreamExt;
use tiberius::{Column, ColumnData, ColumnType, FromSql, Query, QueryItem, QueryStream};

use super::params::{bind_value, checked_param_name, quote_alias, quote_object_name, sql_type_name};
use crate::command::ProcedureCall;
use crate::error::SprocDbError;
use crate::parameter::{OutputValues, ParameterDirection, ParameterValue};
use crate::results::{ColumnSchema, ResultSet};
use crate::table::TableValue;
use crate::types::{DbType, RowValues};

/// Most parameters SQL Server accepts in one request.
const MAX_BIND_PARAMS: usize = 2100;
/// Most row constructors in one `INSERT ... VALUES`.
const MAX_ROWS_PER_INSERT: usize = 1000;

/// A rendered batch plus the values bound to its `@Pn` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecBatch {
    pub sql: String,
    pub binds: Vec<(RowValues, Option<DbType>)>,
    /// Names of the parameters selected, in order, by the trailing output row.
    pub outputs: Vec<String>,
}

impl ExecBatch {
    #[must_use]
    pub fn has_outputs(&self) -> bool {
        !self.outputs.is_empty()
    }

    /// Build a tiberius query with every value bound.
    #[must_use]
    pub fn query(&self) -> Query<'_> {
        let mut query = Query::new(self.sql.as_str());
        for (value, db_type) in &self.binds {
            bind_value(&mut query, value, *db_type);
        }
        query
    }

    fn bind(&mut self, value: &RowValues, db_type: Option<DbType>) -> String {
        self.binds.push((value.clone(), db_type));
        format!("@P{}", self.binds.len())
    }
}

/// Render `call` as `DECLARE`/`INSERT` setup, the `EXEC`, and an output `SELECT`.
///
/// # Errors
/// `InvalidState` for an unbound call, `ArgumentError` for an unusable procedure name,
/// `ParameterError` for unusable parameters (bad names, output parameters without a
/// type, table values without a type name, too many bound values).
pub fn render_exec_batch(call: &ProcedureCall) -> Result<ExecBatch, SprocDbError> {
    if !call.is_bound() {
        return Err(SprocDbError::InvalidState(
            "only stored procedure commands can be sent to SQL Server".to_string(),
        ));
    }
    let proc_name = quote_object_name(&call.command_text)?;

    let mut batch = ExecBatch {
        sql: String::new(),
        binds: Vec::new(),
        outputs: Vec::new(),
    };
    let mut declares = String::new();
    let mut inserts = String::new();
    let mut args = Vec::with_capacity(call.parameters.len());
    let mut selects = Vec::new();
    let mut return_var = None;

    for (i, param) in call.parameters.iter().enumerate() {
        match param.direction {
            ParameterDirection::ReturnValue => {
                if return_var.is_some() {
                    return Err(SprocDbError::ParameterError(
                        "only one return value parameter is allowed".to_string(),
                    ));
                }
                let var = "@__rv".to_string();
                let _ = writeln!(declares, "DECLARE {var} int;");
                selects.push(format!("{var} AS {}", quote_alias(param.bare_name())));
                batch.outputs.push(param.name.clone());
                return_var = Some(var);
            }
            ParameterDirection::Input => {
                let name = checked_param_name(&param.name)?;
                let arg = match &param.value {
                    ParameterValue::Unset => "DEFAULT".to_string(),
                    ParameterValue::Scalar(value) => batch.bind(value, param.db_type),
                    ParameterValue::Table(table) => {
                        let var = format!("@__t{i}");
                        render_table(&mut batch, &mut declares, &mut inserts, &var, name, table)?;
                        var
                    }
                };
                args.push(format!("@{name} = {arg}"));
            }
            ParameterDirection::Output | ParameterDirection::InputOutput => {
                let name = checked_param_name(&param.name)?;
                if matches!(param.value, ParameterValue::Table(_)) {
                    return Err(SprocDbError::ParameterError(format!(
                        "table-valued parameter `{name}` must be input-only"
                    )));
                }
                let db_type = param.db_type.ok_or_else(|| {
                    SprocDbError::ParameterError(format!(
                        "output parameter `{name}` needs a declared type"
                    ))
                })?;
                let var = format!("@__o{i}");
                let _ = writeln!(declares, "DECLARE {var} {};", sql_type_name(db_type, param.size)?);
                if param.direction == ParameterDirection::InputOutput {
                    if let ParameterValue::Scalar(value) = &param.value {
                        let placeholder = batch.bind(value, Some(db_type));
                        let _ = writeln!(declares, "SET {var} = {placeholder};");
                    }
                }
                args.push(format!("@{name} = {var} OUTPUT"));
                selects.push(format!("{var} AS {}", quote_alias(name)));
                batch.outputs.push(param.name.clone());
            }
        }
    }

    if batch.binds.len() > MAX_BIND_PARAMS {
        return Err(SprocDbError::ParameterError(format!(
            "{} bound values exceed the SQL Server limit of {MAX_BIND_PARAMS}",
            batch.binds.len()
        )));
    }

    let mut sql = declares;
    if !inserts.is_empty() {
        // keep TVP inserts out of the affected-row count
        sql.push_str("SET NOCOUNT ON;\n");
        sql.push_str(&inserts);
        sql.push_str("SET NOCOUNT OFF;\n");
    }
    sql.push_str("EXEC ");
    if let Some(var) = &return_var {
        let _ = write!(sql, "{var} = ");
    }
    sql.push_str(&proc_name);
    if !args.is_empty() {
        sql.push(' ');
        sql.push_str(&args.join(", "));
    }
    sql.push_str(";\n");
    if !selects.is_empty() {
        let _ = writeln!(sql, "SELECT {};", selects.join(", "));
    }
    batch.sql = sql;
    Ok(batch)
}

fn render_table(
    batch: &mut ExecBatch,
    declares: &mut String,
    inserts: &mut String,
    var: &str,
    param_name: &str,
    table: &TableValue,
) -> Result<(), SprocDbError> {
    let type_name = table.type_name().ok_or_else(|| {
        SprocDbError::ParameterError(format!(
            "table-valued parameter `{param_name}` needs a table type name"
        ))
    })?;
    let _ = writeln!(declares, "DECLARE {var} AS {};", quote_object_name(type_name)?);

    let column_list = table
        .columns()
        .iter()
        .map(|c| quote_alias(&c.name))
        .collect::<Vec<_>>()
        .join(", ");
    for chunk in table.rows().chunks(MAX_ROWS_PER_INSERT) {
        let tuples = chunk
            .iter()
            .map(|row| {
                let placeholders = row
                    .iter()
                    .zip(table.columns())
                    .map(|(value, column)| batch.bind(value, Some(column.db_type)))
                    .collect::<Vec<_>>();
                format!("({})", placeholders.join(", "))
            })
            .collect::<Vec<_>>();
        let _ = writeln!(
            inserts,
            "INSERT INTO {var} ({column_list}) VALUES {};",
            tuples.join(", ")
        );
    }
    Ok(())
}

/// Read every result set of `stream` into memory.
///
/// # Errors
/// Server errors raised while the batch runs, or conversion failures.
pub async fn collect_result_sets(mut stream: QueryStream<'_>) -> Result<Vec<ResultSet>, SprocDbError> {
    let mut sets: Vec<ResultSet> = Vec::new();
    while let Some(item) = stream.try_next().await? {
        match item {
            QueryItem::Metadata(meta) => sets.push(ResultSet::new(column_schema(meta.columns()))),
            QueryItem::Row(row) => {
                let set = sets.last_mut().ok_or_else(|| {
                    SprocDbError::ExecutionError("row received before column metadata".to_string())
                })?;
                let values = row
                    .into_iter()
                    .map(column_data_to_value)
                    .collect::<Result<Vec<_>, _>>()?;
                set.add_row_values(values)?;
            }
        }
    }
    Ok(sets)
}

/// Remove the trailing output row from `sets` and pair it with the parameter names.
///
/// # Errors
/// `ExecutionError` if the response ended without the output row.
pub fn split_outputs(
    sets: &mut Vec<ResultSet>,
    batch: &ExecBatch,
) -> Result<OutputValues, SprocDbError> {
    if !batch.has_outputs() {
        return Ok(Vec::new());
    }
    let missing = || SprocDbError::ExecutionError("output parameter values were not returned".to_string());
    let set = sets.pop().ok_or_else(missing)?;
    let row = set.results.into_iter().next().ok_or_else(missing)?;
    Ok(batch.outputs.iter().cloned().zip(row).collect())
}

fn column_schema(columns: &[Column]) -> Vec<ColumnSchema> {
    columns
        .iter()
        .enumerate()
        .map(|(ordinal, col)| ColumnSchema {
            name: col.name().to_string(),
            ordinal,
            db_type: db_type_of(col.column_type()),
        })
        .collect()
}

fn db_type_of(column_type: ColumnType) -> Option<DbType> {
    match column_type {
        ColumnType::Int2 => Some(DbType::Int16),
        ColumnType::Int4 => Some(DbType::Int32),
        ColumnType::Int8 => Some(DbType::Int64),
        ColumnType::Float4 => Some(DbType::Single),
        ColumnType::Float8 => Some(DbType::Double),
        ColumnType::Bit | ColumnType::Bitn => Some(DbType::Boolean),
        ColumnType::Datetime | ColumnType::Datetimen | ColumnType::Datetime2 | ColumnType::Daten => {
            Some(DbType::DateTime)
        }
        ColumnType::NVarchar
        | ColumnType::NChar
        | ColumnType::BigVarChar
        | ColumnType::BigChar
        | ColumnType::Text
        | ColumnType::NText
        | ColumnType::Xml => Some(DbType::String),
        ColumnType::BigVarBin | ColumnType::BigBinary | ColumnType::Image => Some(DbType::Binary),
        _ => None,
    }
}

/// Convert one SQL Server cell into a [`RowValues`].
///
/// # Errors
/// Date and time values the driver cannot decode.
pub fn column_data_to_value(data: ColumnData<'static>) -> Result<RowValues, SprocDbError> {
    let value = match data {
        ColumnData::U8(Some(v)) => RowValues::Int(i64::from(v)),
        ColumnData::I16(Some(v)) => RowValues::Int(i64::from(v)),
        ColumnData::I32(Some(v)) => RowValues::Int(i64::from(v)),
        ColumnData::I64(Some(v)) => RowValues::Int(v),
        ColumnData::F32(Some(v)) => RowValues::Float(f64::from(v)),
        ColumnData::F64(Some(v)) => RowValues::Float(v),
        ColumnData::Numeric(Some(n)) => RowValues::Float(f64::from(n)),
        ColumnData::Bit(Some(b)) => RowValues::Bool(b),
        ColumnData::String(Some(s)) => RowValues::Text(s.into_owned()),
        ColumnData::Guid(Some(g)) => RowValues::Text(g.to_string()),
        ColumnData::Xml(Some(x)) => RowValues::Text(x.into_owned().into_string()),
        ColumnData::Binary(Some(b)) => RowValues::Blob(b.into_owned()),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            NaiveDateTime::from_sql(&data)?.map_or(RowValues::Null, RowValues::Timestamp)
        }
        ColumnData::Date(_) => NaiveDate::from_sql(&data)?
            .map_or(RowValues::Null, |d| RowValues::Timestamp(d.and_time(NaiveTime::MIN))),
        ColumnData::Time(_) => NaiveTime::from_sql(&data)?.map_or(RowValues::Null, |t| {
            RowValues::Text(t.format("%H:%M:%S%.f").to_string())
        }),
        ColumnData::DateTimeOffset(_) => chrono::DateTime::<chrono::Utc>::from_sql(&data)?
            .map_or(RowValues::Null, |dt| RowValues::Timestamp(dt.naive_utc())),
        _ => RowValues::Null,
    };
    Ok(value)
}
