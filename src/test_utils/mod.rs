use std::future::Future;
use std::sync::LazyLock;
use tokio::runtime::Runtime;

/// Shared tokio runtime for test utilities and benchmarks to avoid creating multiple runtimes
pub(crate) static SHARED_RUNTIME: LazyLock<Runtime> =
    LazyLock::new(|| Runtime::new().expect("Failed to create tokio runtime for test utilities"));

/// In-memory scripted driver
pub mod memory;

pub use memory::{MemoryConnection, MemoryDriverError, ProcedureScript};

/// Drive `fut` to completion on the shared test runtime.
pub fn block_on<F: Future>(fut: F) -> F::Output {
    SHARED_RUNTIME.block_on(fut)
}
