use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use lambda_http::tracing;
use tokio::sync::Mutex;

use crate::error::Result;

/// Builds the handle that serves invocations.
pub trait Factory: Send + Sync {
    type Handle: Send + Sync;

    fn build(&self) -> impl Future<Output = Result<Self::Handle>> + Send;
}

/// Owns the cached handle for one execution environment.
///
/// The lock is held across the check and the build, so two invocations that
/// both find the slot empty still build only once. A failed build leaves the
/// slot empty and the next invocation retries.
pub struct Bootstrap<F: Factory> {
    factory: F,
    handle: Mutex<Option<Arc<F::Handle>>>,
}

impl<F: Factory> Bootstrap<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            handle: Mutex::new(None),
        }
    }

    /// Returns the cached handle, building it first if there is none.
    pub async fn get_or_create(&self) -> Result<Arc<F::Handle>> {
        let mut slot = self.handle.lock().await;
        if let Some(handle) = slot.as_ref() {
            tracing::debug!("warm invocation, reusing handle");
            return Ok(Arc::clone(handle));
        }

        tracing::info!("cold start, constructing handle");
        let started = Instant::now();
        let handle = match self.factory.build().await {
            Ok(handle) => Arc::new(handle),
            Err(err) => {
                tracing::error!(error = %err, "bootstrap failed, handle not cached");
                return Err(err);
            }
        };

        *slot = Some(Arc::clone(&handle));
        tracing::info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "handle ready"
        );
        Ok(handle)
    }

    /// Drops the cached handle, along with the credentials resolved for it.
    ///
    /// This is the rotation signal: the next invocation rebuilds from scratch.
    /// Returns whether a handle was cached.
    pub async fn reset(&self) -> bool {
        let dropped = self.handle.lock().await.take().is_some();
        if dropped {
            tracing::info!("cached handle dropped");
        }
        dropped
    }

    pub async fn is_warm(&self) -> bool {
        self.handle.lock().await.is_some()
    }
}
