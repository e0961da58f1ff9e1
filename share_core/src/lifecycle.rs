//! Connection lifecycle: `Connected` on attach, `Disconnected` (terminal) on
//! close. Only this type creates and destroys peer directory entries.

use crate::error::SignalResult;
use crate::negotiation::NegotiationTable;
use crate::otp::{OtpRecord, OtpRegistry};
use crate::peers::PeerDirectory;
use crate::protocol::ServerMessage;
use crate::relay::SignalRelay;
use crate::{ConnectionId, OwnerRef};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Default depth of each connection's outbound queue
pub const OUTBOUND_QUEUE_CAPACITY: usize = 64;

pub struct ConnectionLifecycle {
    otp: Arc<OtpRegistry>,
    peers: Arc<PeerDirectory>,
    relay: Arc<SignalRelay>,
    negotiations: Arc<NegotiationTable>,
    queue_capacity: usize,
}

impl ConnectionLifecycle {
    pub fn new(
        otp: Arc<OtpRegistry>,
        peers: Arc<PeerDirectory>,
        relay: Arc<SignalRelay>,
        negotiations: Arc<NegotiationTable>,
        queue_capacity: usize,
    ) -> Self {
        Self {
            otp,
            peers,
            relay,
            negotiations,
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Register a new connection. The returned receiver is the connection's
    /// ordered outbound queue; its first message is `Connected`.
    pub async fn connect(&self) -> (ConnectionId, mpsc::Receiver<ServerMessage>) {
        let connection_id = ConnectionId::generate();
        let (tx, rx) = mpsc::channel(self.queue_capacity);

        // Fresh queue, cannot be full
        let _ = tx.try_send(ServerMessage::Connected {
            connection_ref: connection_id.clone(),
        });

        self.peers.register(&connection_id).await;
        self.relay.attach(&connection_id, tx).await;

        tracing::info!("Peer connected: {}", connection_id);
        (connection_id, rx)
    }

    /// HTTP-announce-then-socket-attach: point the record at the live
    /// connection presenting the provisional owner token.
    pub async fn attach_owner(
        &self,
        connection_id: &ConnectionId,
        code: &str,
        presented_owner: &str,
    ) -> SignalResult<OtpRecord> {
        let claimed = self.otp.claim(code, presented_owner, connection_id).await?;
        if !claimed.merged.is_empty() {
            self.negotiations.drop_codes(&claimed.merged).await;
        }
        tracing::info!("File owner registered: {} for code {}", connection_id, code);
        Ok(claimed.record)
    }

    /// Move the connection to `Disconnected` and cascade the cleanup.
    /// Returns false if it was already disconnected.
    pub async fn disconnect(&self, connection_id: &ConnectionId) -> bool {
        // Detach first so a racing relay attempt fails as offline instead of
        // queueing into a dead connection
        if !self.relay.detach(connection_id).await {
            return false;
        }

        let peer = self.peers.remove(connection_id).await;
        let expired = self
            .otp
            .expire_owner(&OwnerRef::Live(connection_id.clone()))
            .await;
        let dropped = self.negotiations.drop_connection(connection_id).await;
        self.negotiations.drop_codes(&expired).await;

        for code in &expired {
            tracing::info!(
                "Removed announcement {} of disconnected peer {}",
                code,
                connection_id
            );
        }

        // Best effort: requesters still waiting on this owner learn it is gone
        for pending in dropped.iter().filter(|p| &p.owner == connection_id) {
            let notice = ServerMessage::OwnerOffline {
                code: pending.code.clone(),
            };
            if let Err(e) = self.relay.forward(&pending.requester, notice).await {
                tracing::debug!("Could not notify {}: {}", pending.requester, e);
            }
        }

        if peer.as_ref().is_some_and(|p| p.is_authenticated()) {
            let peers = self.peers.authenticated_summaries().await;
            self.relay
                .broadcast(&ServerMessage::PeersUpdated { peers }, None)
                .await;
        }

        tracing::info!("Peer disconnected: {}", connection_id);
        true
    }
}
