//! Synchronous entry points over the async core.
//!
//! All blocking calls share one process-wide Tokio runtime, so HTTP
//! connections pooled by a client stay usable across calls. Like
//! `reqwest::blocking`, these functions must not be called from within an
//! async runtime; doing so panics.

use std::future::Future;
use std::sync::OnceLock;

use futures::StreamExt;
use tokio::runtime::{Builder, Runtime};

use crate::error::{ChofeshError, Result};
use crate::types::{ChunkStream, StreamChunk};

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// The shared runtime, built on first use.
pub(crate) fn runtime() -> Result<&'static Runtime> {
    if let Some(rt) = RUNTIME.get() {
        return Ok(rt);
    }
    let built = Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("chofesh-blocking")
        .enable_all()
        .build()
        .map_err(|e| ChofeshError::Configuration(format!("failed to start blocking runtime: {e}")))?;
    // A racing thread may have installed its own; either one is fine.
    Ok(RUNTIME.get_or_init(|| built))
}

/// Drive `future` to completion on the shared runtime.
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    Ok(runtime()?.block_on(future))
}

/// Iterator over a streamed completion, pulling one chunk per `next()`.
///
/// Dropping it releases the underlying HTTP response.
pub struct BlockingStream {
    inner: ChunkStream,
    runtime: &'static Runtime,
}

impl BlockingStream {
    /// Open a stream by running `open` to completion on the shared runtime.
    pub(crate) fn open<F>(open: F) -> Result<Self>
    where
        F: Future<Output = Result<ChunkStream>>,
    {
        let runtime = runtime()?;
        let inner = runtime.block_on(open)?;
        Ok(Self { inner, runtime })
    }

    /// Wrap an already-open stream.
    pub fn from_stream(inner: ChunkStream) -> Result<Self> {
        Ok(Self {
            inner,
            runtime: runtime()?,
        })
    }
}

impl Iterator for BlockingStream {
    type Item = Result<StreamChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        self.runtime.block_on(self.inner.next())
    }
}

impl std::fmt::Debug for BlockingStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingStream").finish_non_exhaustive()
    }
}
