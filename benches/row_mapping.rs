//! Criterion measurements of row mapping cost: the bare mapper over a buffered cursor,
//! and a full stored-procedure round trip through the in-memory driver (sync and async).

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use sproc_middleware::command::CommandBehavior;
use sproc_middleware::mapper::map_rows;
use sproc_middleware::prelude::*;
use sproc_middleware::results::BufferedCursor;
use sproc_middleware::test_utils::{MemoryConnection, ProcedureScript};
use std::hint::black_box;
use std::sync::LazyLock;
use tokio::runtime::Runtime;

#[derive(Debug, Default)]
struct Employee {
    id: i64,
    name: String,
    salary: Option<f64>,
    active: bool,
}

impl_mappable!(Employee {
    id as "EmployeeId": i64,
    name: String,
    salary: Option<f64>,
    active: bool,
});

static TOKIO_RUNTIME: LazyLock<Runtime> =
    LazyLock::new(|| Runtime::new().expect("create tokio runtime"));

/// Row counts to sweep; override with `BENCH_ROWS=100,10000`.
fn row_counts() -> Vec<usize> {
    std::env::var("BENCH_ROWS")
        .ok()
        .map(|raw| raw.split(',').filter_map(|n| n.trim().parse().ok()).collect())
        .filter(|counts: &Vec<usize>| !counts.is_empty())
        .unwrap_or_else(|| vec![10, 1_000, 10_000])
}

fn employees(rows: usize) -> ResultSet {
    let mut rs = ResultSet::with_column_names(&["EmployeeId", "Name", "Salary", "Active", "Unused"])
        .with_capacity(rows);
    for i in 0..rows {
        let id = i64::try_from(i).expect("row index fits i64");
        rs.add_row_values(vec![
            RowValues::Int(id),
            RowValues::Text(format!("employee {i}")),
            if i % 7 == 0 {
                RowValues::Null
            } else {
                RowValues::Int(50_000 + id)
            },
            RowValues::Bool(i % 2 == 0),
            RowValues::Null,
        ])
        .expect("row width matches columns");
    }
    rs
}

fn bench_mapper(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_rows");
    for rows in row_counts() {
        let data = employees(rows);
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &data, |b, data| {
            b.iter(|| {
                let mut cursor = BufferedCursor::new(vec![data.clone()], CommandBehavior::DEFAULT);
                let mapped: Vec<Employee> = map_rows(&mut cursor).expect("rows map");
                black_box(mapped)
            });
        });
    }
    group.finish();
}

fn bench_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("execute_stored_proc");
    for rows in row_counts() {
        let script = ProcedureScript::new().result_set(employees(rows));
        group.throughput(Throughput::Elements(rows as u64));

        let mut conn = MemoryConnection::new().with_procedure("spEmployees", script.clone());
        group.bench_function(BenchmarkId::new("sync", rows), |b| {
            b.iter(|| {
                let list = conn
                    .load_stored_proc("spEmployees")
                    .and_then(|mut cmd| {
                        cmd.with_param("DepartmentId", 4)?;
                        cmd.execute_stored_proc(ExecOptions::default(), |r| {
                            r.read_to_list::<Employee>()
                        })
                    })
                    .expect("procedure runs");
                black_box(list)
            });
        });

        let mut conn = MemoryConnection::new().with_procedure("spEmployees", script);
        let ct = CancellationToken::new();
        group.bench_function(BenchmarkId::new("async", rows), |b| {
            b.iter(|| {
                let list = TOKIO_RUNTIME
                    .block_on(async {
                        conn.load_stored_proc("spEmployees")?
                            .execute_stored_proc_async(ExecOptions::default(), &ct, |r| {
                                r.read_to_list::<Employee>()
                            })
                            .await
                    })
                    .expect("procedure runs");
                black_box(list)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_mapper, bench_round_trip);
criterion_main!(benches);
