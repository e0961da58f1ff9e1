//! Point-to-point signaling relay.
//!
//! Maps each connection id to the sending half of that connection's ordered
//! outbound queue. Forwarding never waits: a target that is unknown, closed
//! or not draining its queue is reported as offline, and nothing is retried.

use crate::ConnectionId;
use crate::error::{SignalError, SignalResult};
use crate::protocol::ServerMessage;
use std::collections::HashMap;
use tokio::sync::{RwLock, mpsc};
use tokio::sync::mpsc::error::TrySendError;

#[derive(Default)]
pub struct SignalRelay {
    outboxes: RwLock<HashMap<ConnectionId, mpsc::Sender<ServerMessage>>>,
}

impl SignalRelay {
    pub async fn attach(&self, connection_id: &ConnectionId, outbox: mpsc::Sender<ServerMessage>) {
        self.outboxes
            .write()
            .await
            .insert(connection_id.clone(), outbox);
    }

    /// Drop the connection's send capability; returns whether it was attached
    pub async fn detach(&self, connection_id: &ConnectionId) -> bool {
        self.outboxes.write().await.remove(connection_id).is_some()
    }

    pub async fn is_attached(&self, connection_id: &ConnectionId) -> bool {
        self.outboxes.read().await.contains_key(connection_id)
    }

    /// Queue `message` for `target`. Messages forwarded to the same target
    /// are delivered in call order.
    pub async fn forward(&self, target: &ConnectionId, message: ServerMessage) -> SignalResult<()> {
        let outboxes = self.outboxes.read().await;
        let outbox = outboxes
            .get(target)
            .ok_or_else(|| SignalError::offline(format!("peer {} is not connected", target)))?;

        match outbox.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                tracing::warn!("Outbound queue of {} is full, dropping message", target);
                Err(SignalError::offline(format!("peer {} is not responding", target)))
            }
            Err(TrySendError::Closed(_)) => Err(SignalError::offline(format!(
                "peer {} is not connected",
                target
            ))),
        }
    }

    /// Queue `message` for every attached connection except `except`.
    /// Returns how many queues accepted it.
    pub async fn broadcast(&self, message: &ServerMessage, except: Option<&ConnectionId>) -> usize {
        let outboxes = self.outboxes.read().await;
        outboxes
            .iter()
            .filter(|(id, _)| Some(*id) != except)
            .filter(|(_, outbox)| outbox.try_send(message.clone()).is_ok())
            .count()
    }

    pub async fn len(&self) -> usize {
        self.outboxes.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_forward_preserves_order() {
        let relay = SignalRelay::default();
        let target = ConnectionId::from("owner");
        let sender = ConnectionId::from("requester");
        let (tx, mut rx) = mpsc::channel(16);
        relay.attach(&target, tx).await;

        relay
            .forward(
                &target,
                ServerMessage::WebrtcOffer {
                    offer: json!({"sdp": "offer"}),
                    sender_ref: sender.clone(),
                    code: None,
                },
            )
            .await
            .unwrap();
        for i in 0..3 {
            relay
                .forward(
                    &target,
                    ServerMessage::WebrtcIceCandidate {
                        candidate: json!({"candidate": i}),
                        sender_ref: sender.clone(),
                    },
                )
                .await
                .unwrap();
        }

        assert!(matches!(
            rx.recv().await,
            Some(ServerMessage::WebrtcOffer { .. })
        ));
        for i in 0..3 {
            match rx.recv().await {
                Some(ServerMessage::WebrtcIceCandidate { candidate, sender_ref }) => {
                    assert_eq!(candidate["candidate"], i);
                    assert_eq!(sender_ref, sender);
                }
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_unknown_target_offline() {
        let relay = SignalRelay::default();
        let err = relay
            .forward(
                &ConnectionId::from("ghost"),
                ServerMessage::OwnerOffline {
                    code: "123456".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SignalError::TargetOffline(_)));
    }

    #[tokio::test]
    async fn test_closed_or_full_queue_offline() {
        let relay = SignalRelay::default();
        let closed = ConnectionId::from("closed");
        let (tx, rx) = mpsc::channel(1);
        relay.attach(&closed, tx).await;
        drop(rx);
        let msg = ServerMessage::OwnerOffline {
            code: "123456".to_string(),
        };
        assert!(relay.forward(&closed, msg.clone()).await.is_err());

        let slow = ConnectionId::from("slow");
        let (tx, _rx) = mpsc::channel(1);
        relay.attach(&slow, tx).await;
        assert!(relay.forward(&slow, msg.clone()).await.is_ok());
        assert!(matches!(
            relay.forward(&slow, msg).await,
            Err(SignalError::TargetOffline(_))
        ));
    }

    #[tokio::test]
    async fn test_detach_and_broadcast() {
        let relay = SignalRelay::default();
        let a = ConnectionId::from("a");
        let b = ConnectionId::from("b");
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        relay.attach(&a, tx_a).await;
        relay.attach(&b, tx_b).await;

        let msg = ServerMessage::PeersUpdated { peers: vec![] };
        assert_eq!(relay.broadcast(&msg, Some(&a)).await, 1);
        assert_eq!(rx_b.recv().await, Some(msg.clone()));
        assert!(rx_a.try_recv().is_err());

        assert!(relay.detach(&b).await);
        assert!(!relay.detach(&b).await);
        assert!(!relay.is_attached(&b).await);
        assert_eq!(relay.broadcast(&msg, None).await, 1);
        assert_eq!(relay.len().await, 1);
    }
}
