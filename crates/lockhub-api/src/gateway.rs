// Gateway serialization lock
//
// The physical gateway relays one radio command at a time, so every
// gateway-routed request in the process holds this lock for exactly one
// upstream HTTP exchange. Clones share the same lock.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::trace;

#[derive(Debug, Clone, Default)]
pub struct GatewayLock {
    inner: Arc<Mutex<()>>,
}

impl GatewayLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `fut` while holding the lock.
    ///
    /// The guard is dropped when `fut` completes, fails, or the returned
    /// future is itself dropped mid-flight.
    pub async fn run<F, T>(&self, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        let _guard = self.inner.lock().await;
        trace!("gateway lock acquired");
        fut.await
    }

    /// `true` while some task holds the lock.
    pub fn is_busy(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}
