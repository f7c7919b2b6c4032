use std::future::Future;

use tokio::runtime::{Handle, RuntimeFlavor};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("AWS SDK calls cannot block inside a current-thread Tokio runtime")]
pub struct BlockingUnsupported;

/// Drives an SDK future to completion from synchronous code.
///
/// Handlers run on Tokio workers (Lambda), on rayon workers (transfer jobs)
/// and on blocking threads (SWF worker), so the runtime is captured up front
/// instead of looked up from the calling thread.
pub(crate) fn block_on_sdk<F: Future>(
    runtime: &Handle,
    future: F,
) -> Result<F::Output, BlockingUnsupported> {
    match Handle::try_current().map(|current| current.runtime_flavor()) {
        Err(_) => Ok(runtime.block_on(future)),
        Ok(RuntimeFlavor::CurrentThread) => Err(BlockingUnsupported),
        Ok(_) => Ok(tokio::task::block_in_place(|| runtime.block_on(future))),
    }
}
