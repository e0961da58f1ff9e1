//! WebSocket state management

use crate::{ServerConfig, SignalHub};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Shared state behind every route
pub struct ShareState {
    pub hub: Arc<SignalHub>,
    /// Number of open realtime connections
    pub connection_count: AtomicUsize,
    pub max_connections: usize,
    pub ping_interval: Duration,
}

impl ShareState {
    pub fn new(hub: Arc<SignalHub>, config: &ServerConfig) -> Self {
        Self {
            hub,
            connection_count: AtomicUsize::new(0),
            max_connections: config.max_connections,
            ping_interval: config.ping_interval(),
        }
    }

    /// Try to take one of the `max_connections` slots. The slot is given
    /// back when the returned guard drops.
    pub fn try_acquire_slot(self: &Arc<Self>) -> Option<ConnectionSlot> {
        self.connection_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                if current < self.max_connections {
                    Some(current + 1)
                } else {
                    None
                }
            })
            .ok()
            .map(|_| ConnectionSlot {
                state: self.clone(),
            })
    }
}

/// Guard for one counted connection
pub struct ConnectionSlot {
    state: Arc<ShareState>,
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.state.connection_count.fetch_sub(1, Ordering::SeqCst);
    }
}
