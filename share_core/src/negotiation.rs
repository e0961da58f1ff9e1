//! Pending transfer negotiations
//!
//! Correlates a downloader's request with the owner's approve/reject answer.
//! Entries have no clock of their own: they go away when answered (reject),
//! when either side disconnects, or when their code is purged.

use crate::ConnectionId;
use crate::error::{SignalError, SignalResult};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Requested,
    Approved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransfer {
    pub code: String,
    pub requester: ConnectionId,
    pub owner: ConnectionId,
    pub state: NegotiationState,
}

type NegotiationKey = (String, ConnectionId);

#[derive(Default)]
pub struct NegotiationTable {
    pending: RwLock<HashMap<NegotiationKey, PendingTransfer>>,
}

impl NegotiationTable {
    /// Record a new request; a repeated request restarts the negotiation
    pub async fn open(&self, code: &str, requester: &ConnectionId, owner: &ConnectionId) {
        let mut pending = self.pending.write().await;
        pending.insert(
            (code.to_string(), requester.clone()),
            PendingTransfer {
                code: code.to_string(),
                requester: requester.clone(),
                owner: owner.clone(),
                state: NegotiationState::Requested,
            },
        );
    }

    /// Owner approved. Only the owner recorded for the request may do this.
    pub async fn approve(
        &self,
        code: &str,
        requester: &ConnectionId,
        owner: &ConnectionId,
    ) -> SignalResult<PendingTransfer> {
        let mut pending = self.pending.write().await;
        let entry = pending
            .get_mut(&(code.to_string(), requester.clone()))
            .filter(|p| &p.owner == owner)
            .ok_or_else(|| SignalError::not_found("no pending request from this peer"))?;
        entry.state = NegotiationState::Approved;
        Ok(entry.clone())
    }

    /// Owner rejected; the negotiation ends here
    pub async fn reject(
        &self,
        code: &str,
        requester: &ConnectionId,
        owner: &ConnectionId,
    ) -> SignalResult<PendingTransfer> {
        let mut pending = self.pending.write().await;
        let key = (code.to_string(), requester.clone());
        if pending.get(&key).is_some_and(|p| &p.owner == owner) {
            if let Some(entry) = pending.remove(&key) {
                return Ok(entry);
            }
        }
        Err(SignalError::not_found("no pending request from this peer"))
    }

    /// Forget every negotiation `connection` takes part in
    pub async fn drop_connection(&self, connection: &ConnectionId) -> Vec<PendingTransfer> {
        let mut pending = self.pending.write().await;
        let mut dropped = Vec::new();
        pending.retain(|_, p| {
            if &p.owner == connection || &p.requester == connection {
                dropped.push(p.clone());
                false
            } else {
                true
            }
        });
        dropped
    }

    /// Forget negotiations for purged codes, returning how many went away
    pub async fn drop_codes(&self, codes: &[String]) -> usize {
        let mut pending = self.pending.write().await;
        let before = pending.len();
        pending.retain(|(code, _), _| !codes.contains(code));
        before - pending.len()
    }

    pub async fn get(&self, code: &str, requester: &ConnectionId) -> Option<PendingTransfer> {
        self.pending
            .read()
            .await
            .get(&(code.to_string(), requester.clone()))
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.pending.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (ConnectionId, ConnectionId, ConnectionId) {
        (
            ConnectionId::from("owner"),
            ConnectionId::from("requester"),
            ConnectionId::from("stranger"),
        )
    }

    #[tokio::test]
    async fn test_only_owner_can_approve() {
        let table = NegotiationTable::default();
        let (owner, requester, stranger) = ids();
        table.open("111111", &requester, &owner).await;

        let err = table.approve("111111", &requester, &stranger).await;
        assert!(matches!(err, Err(SignalError::NotFound(_))));

        let approved = table.approve("111111", &requester, &owner).await.unwrap();
        assert_eq!(approved.state, NegotiationState::Approved);
        // Approval keeps the context for the handshake that follows
        assert_eq!(table.len().await, 1);
    }

    #[tokio::test]
    async fn test_reject_removes_context() {
        let table = NegotiationTable::default();
        let (owner, requester, stranger) = ids();
        table.open("111111", &requester, &owner).await;

        assert!(table.reject("111111", &requester, &stranger).await.is_err());
        assert_eq!(table.len().await, 1);

        table.reject("111111", &requester, &owner).await.unwrap();
        assert_eq!(table.len().await, 0);
        assert!(table.reject("111111", &requester, &owner).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_request_not_found() {
        let table = NegotiationTable::default();
        let (owner, requester, _) = ids();
        assert!(table.approve("222222", &requester, &owner).await.is_err());
    }

    #[tokio::test]
    async fn test_drop_connection_either_side() {
        let table = NegotiationTable::default();
        let (owner, requester, stranger) = ids();
        table.open("111111", &requester, &owner).await;
        table.open("222222", &stranger, &owner).await;
        table.open("333333", &owner, &stranger).await;

        let dropped = table.drop_connection(&requester).await;
        assert_eq!(dropped.len(), 1);
        assert_eq!(table.len().await, 2);

        let dropped = table.drop_connection(&owner).await;
        assert_eq!(dropped.len(), 2);
        assert_eq!(table.len().await, 0);
    }

    #[tokio::test]
    async fn test_drop_codes() {
        let table = NegotiationTable::default();
        let (owner, requester, stranger) = ids();
        table.open("111111", &requester, &owner).await;
        table.open("111111", &stranger, &owner).await;
        table.open("222222", &requester, &owner).await;

        let dropped = table.drop_codes(&["111111".to_string()]).await;
        assert_eq!(dropped, 2);
        assert!(table.get("222222", &requester).await.is_some());
    }
}
