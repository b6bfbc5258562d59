#![cfg(feature = "test-utils")]

use chrono::NaiveDate;
use sproc_middleware::prelude::*;
use sproc_middleware::test_utils::{MemoryConnection, ProcedureScript};

#[test]
fn scalar_parameters_keep_order_and_types() -> Result<(), SprocDbError> {
    let hired = NaiveDate::from_ymd_opt(2024, 3, 1)
        .and_then(|d| d.and_hms_opt(9, 30, 0))
        .unwrap();
    let mut conn = MemoryConnection::new();
    let mut cmd = conn.load_stored_proc("spSave")?;
    cmd.with_param("Id", 7)?
        .with_param("@Name", "Ada")?
        .with_param("Salary", 1250.5)?
        .with_param("Active", true)?
        .with_param("Hired", hired)?
        .with_param("Manager", None::<i32>)?;

    let names: Vec<&str> = cmd.parameters().iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["Id", "@Name", "Salary", "Active", "Hired", "Manager"]);

    let id = cmd.parameters().get("id").unwrap();
    assert_eq!(id.db_type, Some(DbType::Int32));
    assert_eq!(id.direction, ParameterDirection::Input);
    assert_eq!(cmd.parameters().value("name"), Some(&RowValues::Text("Ada".into())));
    assert_eq!(cmd.parameters().get("Salary").unwrap().db_type, Some(DbType::Double));
    assert_eq!(cmd.parameters().get("Hired").unwrap().db_type, Some(DbType::DateTime));
    assert_eq!(cmd.parameters().get("Manager").unwrap().db_type, Some(DbType::Int32));
    assert_eq!(cmd.parameters().value("Manager"), Some(&RowValues::Null));
    Ok(())
}

#[test]
fn failed_bind_leaves_parameters_unchanged() -> Result<(), SprocDbError> {
    let mut conn = MemoryConnection::new();
    let mut cmd = conn.load_stored_proc("spSave")?;
    cmd.with_param("Id", 1)?;
    assert!(matches!(
        cmd.with_param("ID", 2),
        Err(SprocDbError::ArgumentError(_))
    ));
    assert!(matches!(cmd.with_error_params_named("Id", "Msg"), Err(SprocDbError::ArgumentError(_))));
    assert_eq!(cmd.parameters().len(), 1);
    assert_eq!(cmd.parameters().value("Id"), Some(&RowValues::Int(1)));
    Ok(())
}

#[test]
fn error_pair_with_one_name_twice_leaves_parameters_unchanged() -> Result<(), SprocDbError> {
    let mut conn = MemoryConnection::new();
    let mut cmd = conn.load_stored_proc("spSave")?;
    cmd.with_param("Id", 1)?;
    assert!(matches!(
        cmd.with_error_params_named("Err", "err"),
        Err(SprocDbError::ArgumentError(_))
    ));
    assert_eq!(cmd.parameters().len(), 1);
    assert!(!cmd.parameters().contains("Err"));
    Ok(())
}

#[test]
fn output_values_reach_the_output_handler() -> Result<(), SprocDbError> {
    let mut conn = MemoryConnection::new().with_procedure(
        "spTransfer",
        ProcedureScript::new()
            .output("ErrorCode", 51)
            .output("ErrorDescription", "insufficient funds")
            .output("Balance", 10.25)
            .output("ReturnValue", 2)
            .output("Amount", 999)
            .rows_affected(0),
    );

    let mut seen = None;
    let mut cmd = conn.load_stored_proc("spTransfer")?;
    cmd.with_param("Amount", 100)?
        .with_error_params()?
        .with_unset_param("Balance", ParamConfig::output(DbType::Double))?
        .with_unset_param(
            "ReturnValue",
            ParamConfig::input().direction(ParameterDirection::ReturnValue),
        )?;
    cmd.execute_stored_non_query_with_output(ExecOptions::default(), |outputs| {
        seen = Some((
            outputs.error_outputs("ErrorCode", "ErrorDescription"),
            outputs.value("Balance").cloned(),
            outputs.value("ReturnValue").cloned(),
            outputs.value("Amount").cloned(),
        ));
        Ok(())
    })?;

    let (error, balance, rv, amount) = seen.unwrap();
    assert_eq!(error, Some((51, "insufficient funds".to_string())));
    assert_eq!(balance, Some(RowValues::Float(10.25)));
    assert_eq!(rv, Some(RowValues::Int(2)));
    // input-only parameters are never overwritten by the driver
    assert_eq!(amount, Some(RowValues::Int(100)));
    Ok(())
}

#[test]
fn custom_error_pair_names_are_sent() -> Result<(), SprocDbError> {
    let mut conn = MemoryConnection::new()
        .with_procedure("spX", ProcedureScript::new().output("Code", 0).output("Why", ""));
    let mut cmd = conn.load_stored_proc("spX")?;
    cmd.with_error_params_named("Code", "Why")?;
    cmd.execute_stored_non_query(ExecOptions::default())?;

    let call = conn.last_call().unwrap();
    let why = call.parameters.get("Why").unwrap();
    assert_eq!(why.direction, ParameterDirection::Output);
    assert_eq!(why.size, Some(2047));
    assert!(!call.parameters.contains("ErrorCode"));
    Ok(())
}

#[test]
fn prebuilt_parameter_takes_the_given_name() -> Result<(), SprocDbError> {
    let mut conn = MemoryConnection::new();
    let mut cmd = conn.load_stored_proc("spX")?;
    let param = ParamConfig::input()
        .direction(ParameterDirection::InputOutput)
        .db_type(DbType::Int64)
        .bind("ignored", RowValues::Int(5));
    cmd.with_sql_param("Counter", param)?;
    let counter = cmd.parameters().get("Counter").unwrap();
    assert_eq!(counter.direction, ParameterDirection::InputOutput);
    assert_eq!(counter.db_type, Some(DbType::Int64));
    assert!(!cmd.parameters().contains("ignored"));
    Ok(())
}
