//! Tokio runtime owned by the binary.
//!
//! Samples abandoned after their timeout keep a blocking-pool thread busy
//! until the OS call returns. Dropping a runtime waits for those threads, so
//! exit goes through a bounded shutdown instead.

use anyhow::Result;
use std::future::Future;
use std::time::Duration;

/// Run `future` to completion, then give in-flight blocking work at most
/// `grace` before the runtime is torn down.
pub fn block_on_bounded<F: Future>(future: F, grace: Duration) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("perch-worker")
        .build()?;

    let output = runtime.block_on(future);
    runtime.shutdown_timeout(grace);
    Ok(output)
}
