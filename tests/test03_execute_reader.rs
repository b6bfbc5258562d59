#![cfg(feature = "test-utils")]

use std::cell::RefCell;

use sproc_middleware::prelude::*;
use sproc_middleware::test_utils::{MemoryConnection, ProcedureScript};

#[derive(Debug, Default, PartialEq)]
struct Department {
    id: i32,
    name: String,
}

impl_mappable!(Department { id: i32, name: String });

#[derive(Debug, Default, PartialEq)]
struct Headcount {
    department_id: i64,
    total: i32,
}

impl_mappable!(Headcount {
    department_id as "DepartmentId": i64,
    total: i32,
});

fn two_result_sets() -> MemoryConnection {
    let departments = ResultSet::with_column_names(&["Id", "Name"])
        .row(vec![RowValues::Int(1), RowValues::Text("Sales".into())])
        .and_then(|rs| rs.row(vec![RowValues::Int(2), RowValues::Text("Support".into())]))
        .unwrap();
    let counts = ResultSet::with_column_names(&["DepartmentId", "Total"])
        .row(vec![RowValues::Int(1), RowValues::Int(12)])
        .unwrap();
    MemoryConnection::new().with_default_schema("dbo").with_procedure(
        "dbo.spDepartmentSummary",
        ProcedureScript::new()
            .result_set(departments)
            .result_set(counts)
            .output("ErrorCode", 0),
    )
}

#[test]
fn reads_every_result_set_and_closes() -> Result<(), SprocDbError> {
    let mut conn = two_result_sets();
    let (departments, counts) = conn
        .load_stored_proc("spDepartmentSummary")?
        .execute_stored_proc(ExecOptions::default(), |reader| {
            let departments = reader.read_to_list::<Department>()?;
            assert!(reader.next_result()?);
            let counts = reader.read_to_list::<Headcount>()?;
            assert!(!reader.next_result()?);
            Ok((departments, counts))
        })?;

    assert_eq!(departments.len(), 2);
    assert_eq!(departments[1].name, "Support");
    assert_eq!(
        counts,
        vec![Headcount {
            department_id: 1,
            total: 12
        }]
    );
    assert_eq!(conn.state(), ConnectionState::Closed);
    assert_eq!((conn.open_count(), conn.close_count()), (1, 1));
    Ok(())
}

#[test]
fn reading_past_the_last_result_set_is_invalid() {
    let mut conn = two_result_sets();
    let res = conn
        .load_stored_proc("spDepartmentSummary")
        .and_then(|cmd| {
            cmd.execute_stored_proc(ExecOptions::default(), |reader| {
                reader.next_result()?;
                reader.next_result()?;
                reader.read_to_list::<Department>()
            })
        });
    assert!(matches!(res, Err(SprocDbError::InvalidState(_))));
    assert_eq!(conn.state(), ConnectionState::Closed);
}

#[test]
fn handler_error_is_returned_and_connection_closed() {
    let mut conn = two_result_sets();
    let res: Result<(), _> = conn
        .load_stored_proc("spDepartmentSummary")
        .and_then(|cmd| {
            cmd.execute_stored_proc(ExecOptions::default(), |_| {
                Err(SprocDbError::ExecutionError("handler gave up".into()))
            })
        });
    assert!(matches!(res, Err(SprocDbError::ExecutionError(ref m)) if m == "handler gave up"));
    assert_eq!(conn.state(), ConnectionState::Closed);
    assert_eq!(conn.close_count(), 1);
}

#[test]
fn driver_error_passes_through_unchanged() {
    let mut conn = MemoryConnection::new().with_procedure(
        "spBoom",
        ProcedureScript::new().fails_with("Could not find stored procedure 'spBoom'"),
    );
    let mut handler_ran = false;
    let res = conn.load_stored_proc("spBoom").and_then(|cmd| {
        cmd.execute_stored_proc(ExecOptions::default(), |_| {
            handler_ran = true;
            Ok(())
        })
    });
    let err = res.unwrap_err();
    assert!(matches!(err, SprocDbError::Driver(_)));
    assert_eq!(err.to_string(), "Could not find stored procedure 'spBoom'");
    assert!(!handler_ran);
    assert_eq!(conn.state(), ConnectionState::Closed);
}

#[test]
fn output_handler_runs_before_result_handler() -> Result<(), SprocDbError> {
    let mut conn = two_result_sets();
    let order = RefCell::new(Vec::new());
    let mut cmd = conn.load_stored_proc("spDepartmentSummary")?;
    cmd.with_error_params()?;
    cmd.execute_stored_proc_with_output(
        ExecOptions::default(),
        |outputs| {
            order.borrow_mut().push("outputs");
            assert_eq!(outputs.value("ErrorCode"), Some(&RowValues::Int(0)));
            Ok(())
        },
        |reader| {
            order.borrow_mut().push("results");
            reader.read_to_entity::<Department>().map(|_| ())
        },
    )?;
    assert_eq!(order.into_inner(), ["outputs", "results"]);
    Ok(())
}

#[test]
fn unmanaged_connection_is_left_as_found() -> Result<(), SprocDbError> {
    let mut conn = two_result_sets();
    conn.open()?;
    let first = conn
        .load_stored_proc("spDepartmentSummary")?
        .execute_stored_proc(ExecOptions::default().manage_connection(false), |reader| {
            reader.read_to_entity::<Department>()
        })?;
    assert_eq!(first.map(|d| d.id), Some(1));
    assert_eq!(conn.state(), ConnectionState::Open);

    // close-connection behavior still closes an unmanaged connection
    conn.load_stored_proc("spDepartmentSummary")?.execute_stored_proc(
        ExecOptions::default()
            .manage_connection(false)
            .behavior(CommandBehavior::CLOSE_CONNECTION),
        |_| Ok(()),
    )?;
    assert_eq!(conn.state(), ConnectionState::Closed);

    // a closed, unmanaged connection is not opened for a reader
    let res = conn
        .load_stored_proc("spDepartmentSummary")?
        .execute_stored_proc(ExecOptions::default().manage_connection(false), |_| Ok(()));
    assert!(matches!(res, Err(SprocDbError::InvalidState(_))));
    assert_eq!(conn.open_count(), 1);
    Ok(())
}

#[test]
fn behavior_limits_rows_and_result_sets() -> Result<(), SprocDbError> {
    let mut conn = two_result_sets();
    let (rows, more) = conn.load_stored_proc("spDepartmentSummary")?.execute_stored_proc(
        ExecOptions::default().behavior(CommandBehavior::SINGLE_ROW | CommandBehavior::SINGLE_RESULT),
        |reader| {
            let rows = reader.read_to_list::<Department>()?;
            Ok((rows, reader.next_result()?))
        },
    )?;
    assert_eq!(rows.len(), 1);
    assert!(!more);

    let columns = conn.load_stored_proc("spDepartmentSummary")?.execute_stored_proc(
        ExecOptions::default().behavior(CommandBehavior::SCHEMA_ONLY),
        |reader| {
            let names: Vec<String> = reader.columns()?.iter().map(|c| c.name.clone()).collect();
            assert!(reader.read_to_list::<Department>()?.is_empty());
            Ok(names)
        },
    )?;
    assert_eq!(columns, ["Id", "Name"]);
    Ok(())
}

#[test]
fn close_failure_after_success_is_reported() {
    let mut conn = two_result_sets().fail_on_close();
    let res = conn
        .load_stored_proc("spDepartmentSummary")
        .and_then(|cmd| cmd.execute_stored_proc(ExecOptions::default(), |_| Ok(())));
    assert!(matches!(res, Err(SprocDbError::Driver(_))));
    assert_eq!(conn.state(), ConnectionState::Closed);
}

#[test]
fn procedure_without_select_yields_empty_set() -> Result<(), SprocDbError> {
    let mut conn = MemoryConnection::new().with_procedure("spNothing", ProcedureScript::new());
    let (rows, value) = conn
        .load_stored_proc("spNothing")?
        .execute_stored_proc(ExecOptions::default(), |reader| {
            let rows = reader.read_to_list::<Department>()?;
            Ok((rows, reader.read_to_value::<i32>()?))
        })?;
    assert!(rows.is_empty());
    assert_eq!(value, None);
    Ok(())
}
