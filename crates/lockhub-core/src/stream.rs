// ── Reactive lock state streams ──
//
// Subscription type for consuming one coordinator's snapshots.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::LockState;

type Snapshot = Option<Arc<LockState>>;

/// A subscription to one lock's state.
///
/// Provides point-in-time access and change notification via
/// [`changed()`](Self::changed) or by converting to a `Stream`.
pub struct LockStateStream {
    current: Snapshot,
    receiver: watch::Receiver<Snapshot>,
}

impl LockStateStream {
    pub(crate) fn new(receiver: watch::Receiver<Snapshot>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// Snapshot captured at creation time (or at the last `changed()`).
    pub fn current(&self) -> Option<&Arc<LockState>> {
        self.current.as_ref()
    }

    /// Wait for the next commit. `None` once the coordinator is gone.
    pub async fn changed(&mut self) -> Option<Arc<LockState>> {
        loop {
            self.receiver.changed().await.ok()?;
            let snap = self.receiver.borrow_and_update().clone();
            self.current.clone_from(&snap);
            if snap.is_some() {
                return snap;
            }
        }
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> LockWatchStream {
        LockWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
///
/// Yields the current snapshot first, then one item per commit.
pub struct LockWatchStream {
    inner: WatchStream<Snapshot>,
}

impl Stream for LockWatchStream {
    type Item = Snapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
