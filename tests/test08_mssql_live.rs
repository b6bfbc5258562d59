#![cfg(all(feature = "test-utils", feature = "mssql"))]

//! Runs against a real server only when `SPROC_MSSQL_*` variables are set.

use sproc_middleware::prelude::*;
use sproc_middleware::test_utils::block_on;

fn live_options() -> Option<MssqlOptions> {
    match MssqlOptions::from_env() {
        Ok(opts) => Some(opts),
        Err(e) => {
            eprintln!("skipping live SQL Server test: {e}");
            None
        }
    }
}

#[derive(Debug, Default)]
struct ServerAttribute {
    attribute_id: i32,
    attribute_name: String,
}

impl_mappable!(ServerAttribute {
    attribute_id: i32,
    attribute_name: String,
});

fn system_proc() -> LoadOptions {
    LoadOptions::default().prepend_default_schema(false)
}

#[test]
fn system_procedure_round_trip() -> Result<(), SprocDbError> {
    let Some(opts) = live_options() else {
        return Ok(());
    };
    let mut conn = MssqlConnection::new(opts);
    let ct = CancellationToken::new();

    block_on(async {
        let mut cmd = conn.load_stored_proc_with("sys.sp_server_info", system_proc())?;
        cmd.with_param("attribute_id", 1)?;
        let attrs = cmd
            .execute_stored_proc_async(ExecOptions::default(), &ct, |r| {
                r.read_to_list::<ServerAttribute>()
            })
            .await?;
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].attribute_id, 1);
        assert!(!attrs[0].attribute_name.is_empty());
        assert_eq!(conn.state(), ConnectionState::Closed);
        Ok::<(), SprocDbError>(())
    })
}

#[test]
fn sync_calls_are_rejected() {
    let Some(opts) = live_options() else {
        return;
    };
    let mut conn = MssqlConnection::new(opts);
    let res = conn
        .load_stored_proc_with("sys.sp_who", system_proc())
        .and_then(|cmd| cmd.execute_stored_non_query(ExecOptions::default()));
    assert!(matches!(res, Err(SprocDbError::Unimplemented(_))));
}
