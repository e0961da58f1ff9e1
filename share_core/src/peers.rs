//! Directory of currently connected peers.
//!
//! Entries are created and destroyed only by the connection lifecycle; this
//! type stores them and answers lookups.

use crate::error::{SignalError, SignalResult};
use crate::{ConnectionId, now_timestamp};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Optional named identity a peer can register for discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerIdentity {
    pub peer_id: String,
    pub username: String,
    pub authenticated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub connection_id: ConnectionId,
    pub identity: Option<PeerIdentity>,
    /// Unix timestamp of connection establishment
    pub connected_at: u64,
}

impl Peer {
    pub fn is_authenticated(&self) -> bool {
        self.identity.as_ref().is_some_and(|i| i.authenticated)
    }

    /// Public view for discovery lists; `None` for anonymous peers
    pub fn summary(&self) -> Option<PeerSummary> {
        self.identity.as_ref().map(|identity| PeerSummary {
            id: identity.peer_id.clone(),
            username: identity.username.clone(),
            connected_at: self.connected_at,
        })
    }
}

/// What other peers get to see about a registered peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerSummary {
    pub id: String,
    pub username: String,
    pub connected_at: u64,
}

#[derive(Default)]
pub struct PeerDirectory {
    peers: RwLock<HashMap<ConnectionId, Peer>>,
}

impl PeerDirectory {
    /// Store a fresh entry. Registering a known connection overwrites it.
    pub async fn register(&self, connection_id: &ConnectionId) -> Peer {
        let peer = Peer {
            connection_id: connection_id.clone(),
            identity: None,
            connected_at: now_timestamp(),
        };
        let mut peers = self.peers.write().await;
        if peers.insert(connection_id.clone(), peer.clone()).is_some() {
            tracing::warn!("Connection {} registered twice, overwriting", connection_id);
        }
        peer
    }

    pub async fn get(&self, connection_id: &ConnectionId) -> SignalResult<Peer> {
        self.peers
            .read()
            .await
            .get(connection_id)
            .cloned()
            .ok_or_else(|| SignalError::not_found(format!("connection {}", connection_id)))
    }

    /// Delete the entry, returning it if it existed
    pub async fn remove(&self, connection_id: &ConnectionId) -> Option<Peer> {
        self.peers.write().await.remove(connection_id)
    }

    pub async fn list<P>(&self, predicate: P) -> Vec<Peer>
    where
        P: Fn(&Peer) -> bool,
    {
        self.peers
            .read()
            .await
            .values()
            .filter(|p| predicate(*p))
            .cloned()
            .collect()
    }

    /// Summaries of authenticated peers, oldest connection first
    pub async fn authenticated_summaries(&self) -> Vec<PeerSummary> {
        let mut peers: Vec<PeerSummary> = self
            .list(Peer::is_authenticated)
            .await
            .iter()
            .filter_map(Peer::summary)
            .collect();
        peers.sort_by(|a, b| a.connected_at.cmp(&b.connected_at).then(a.id.cmp(&b.id)));
        peers
    }

    /// Give the connection a generated peer id and a display name.
    /// Registering again replaces the identity and drops authentication.
    pub async fn set_identity(
        &self,
        connection_id: &ConnectionId,
        username: &str,
    ) -> SignalResult<PeerIdentity> {
        let mut peers = self.peers.write().await;
        let peer = peers
            .get_mut(connection_id)
            .ok_or_else(|| SignalError::not_found(format!("connection {}", connection_id)))?;
        let identity = PeerIdentity {
            peer_id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            authenticated: false,
        };
        peer.identity = Some(identity.clone());
        Ok(identity)
    }

    /// Mark the connection's identity authenticated if `peer_id` is its own
    pub async fn authenticate(
        &self,
        connection_id: &ConnectionId,
        peer_id: &str,
    ) -> SignalResult<PeerIdentity> {
        let mut peers = self.peers.write().await;
        let identity = peers
            .get_mut(connection_id)
            .and_then(|p| p.identity.as_mut())
            .filter(|i| i.peer_id == peer_id)
            .ok_or_else(|| SignalError::not_found("invalid peer id"))?;
        identity.authenticated = true;
        Ok(identity.clone())
    }

    pub async fn find_by_peer_id(&self, peer_id: &str) -> Option<Peer> {
        self.peers
            .read()
            .await
            .values()
            .find(|p| p.identity.as_ref().is_some_and(|i| i.peer_id == peer_id))
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.peers.read().await.len()
    }
}
