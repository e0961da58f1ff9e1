//! Transport-agnostic dispatcher for realtime events and HTTP operations.
//!
//! One `SignalHub` is built at startup and shared by every handler through an
//! `Arc`; it owns the registries and answers each event by updating them and
//! queueing messages on the relay.

use crate::config::ServerConfig;
use crate::error::{SignalError, SignalResult};
use crate::lifecycle::ConnectionLifecycle;
use crate::negotiation::NegotiationTable;
use crate::otp::OtpRegistry;
use crate::peers::PeerDirectory;
use crate::protocol::{ClientMessage, DEFAULT_REJECT_REASON, ServerMessage};
use crate::relay::SignalRelay;
use crate::{ConnectionId, FileDescriptor, OwnerRef, now_timestamp};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

/// Body of `GET /api/health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub status: &'static str,
    pub timestamp: u64,
    pub uptime_secs: u64,
    pub active_files: usize,
    pub connected_peers: usize,
}

pub struct SignalHub {
    pub otp: Arc<OtpRegistry>,
    pub peers: Arc<PeerDirectory>,
    pub relay: Arc<SignalRelay>,
    pub negotiations: Arc<NegotiationTable>,
    lifecycle: ConnectionLifecycle,
    started_at: Instant,
}

impl SignalHub {
    pub fn new(config: &ServerConfig) -> Self {
        Self::with_registry(OtpRegistry::new(config.otp_ttl()), config.outbound_queue)
    }

    /// Build around a prepared registry (custom TTL or code generator)
    pub fn with_registry(otp: OtpRegistry, outbound_queue: usize) -> Self {
        let otp = Arc::new(otp);
        let peers = Arc::new(PeerDirectory::default());
        let relay = Arc::new(SignalRelay::default());
        let negotiations = Arc::new(NegotiationTable::default());
        let lifecycle = ConnectionLifecycle::new(
            otp.clone(),
            peers.clone(),
            relay.clone(),
            negotiations.clone(),
            outbound_queue,
        );
        Self {
            otp,
            peers,
            relay,
            negotiations,
            lifecycle,
            started_at: Instant::now(),
        }
    }

    pub async fn connect(&self) -> (ConnectionId, mpsc::Receiver<ServerMessage>) {
        self.lifecycle.connect().await
    }

    pub async fn disconnect(&self, connection_id: &ConnectionId) -> bool {
        self.lifecycle.disconnect(connection_id).await
    }

    /// Queue a message on the caller's own connection
    async fn reply(&self, to: &ConnectionId, message: ServerMessage) {
        if let Err(e) = self.relay.forward(to, message).await {
            tracing::debug!("Reply to {} dropped: {}", to, e);
        }
    }

    /// Parse and handle one text frame. Failures are logged and reported to
    /// the sender as an `error` event; they never end the connection.
    pub async fn dispatch_text(&self, from: &ConnectionId, text: &str) {
        let result = match ClientMessage::parse(text) {
            Ok(message) => {
                let event = message.event_name();
                self.handle(from, message).await.inspect_err(|e| {
                    tracing::warn!("{} from {} failed: {}", event, from, e);
                })
            }
            Err(e) => {
                tracing::warn!("Malformed event from {}: {}", from, e);
                Err(e)
            }
        };

        if let Err(e) = result {
            self.reply(from, ServerMessage::from(&e)).await;
        }
    }

    pub async fn handle(&self, from: &ConnectionId, message: ClientMessage) -> SignalResult<()> {
        match message {
            ClientMessage::RegisterOwner { code, owner_ref } => {
                self.lifecycle.attach_owner(from, &code, &owner_ref).await?;
                self.reply(from, ServerMessage::RegistrationSuccess { code }).await;
            }

            ClientMessage::AnnounceFile {
                file_name,
                file_size,
                file_type,
            } => {
                let file = FileDescriptor::new(file_name, file_size, file_type);
                let code = self
                    .otp
                    .announce(file.clone(), OwnerRef::Live(from.clone()))
                    .await?;
                self.reply(from, ServerMessage::FileAnnounced { code, file }).await;
            }

            ClientMessage::RequestFile { code } => self.request_file(from, code).await?,

            ClientMessage::WebrtcOffer {
                target_ref,
                offer,
                code,
            } => {
                tracing::debug!("Relaying offer {} -> {}", from, target_ref);
                self.relay
                    .forward(
                        &target_ref,
                        ServerMessage::WebrtcOffer {
                            offer,
                            sender_ref: from.clone(),
                            code,
                        },
                    )
                    .await?;
            }

            ClientMessage::WebrtcAnswer { target_ref, answer } => {
                tracing::debug!("Relaying answer {} -> {}", from, target_ref);
                self.relay
                    .forward(
                        &target_ref,
                        ServerMessage::WebrtcAnswer {
                            answer,
                            sender_ref: from.clone(),
                        },
                    )
                    .await?;
            }

            ClientMessage::WebrtcIceCandidate {
                target_ref,
                candidate,
            } => {
                tracing::debug!("Relaying ICE candidate {} -> {}", from, target_ref);
                self.relay
                    .forward(
                        &target_ref,
                        ServerMessage::WebrtcIceCandidate {
                            candidate,
                            sender_ref: from.clone(),
                        },
                    )
                    .await?;
            }

            ClientMessage::ApproveTransfer {
                code,
                requester_ref,
            } => {
                self.negotiations
                    .approve(&code, &requester_ref, from)
                    .await?;
                tracing::info!("Transfer of {} approved for {}", code, requester_ref);
                self.relay
                    .forward(
                        &requester_ref,
                        ServerMessage::TransferApproved {
                            code,
                            owner_ref: from.clone(),
                        },
                    )
                    .await?;
            }

            ClientMessage::RejectTransfer {
                code,
                requester_ref,
                reason,
            } => {
                self.negotiations
                    .reject(&code, &requester_ref, from)
                    .await?;
                tracing::info!("Transfer of {} rejected for {}", code, requester_ref);
                let reason = reason.unwrap_or_else(|| DEFAULT_REJECT_REASON.to_string());
                self.relay
                    .forward(&requester_ref, ServerMessage::TransferRejected { code, reason })
                    .await?;
            }

            ClientMessage::RegisterPeer { username } => {
                let identity = self.peers.set_identity(from, username.trim()).await?;
                tracing::info!("Peer registered: {} ({})", identity.username, identity.peer_id);
                self.reply(
                    from,
                    ServerMessage::PeerRegistered {
                        peer_id: identity.peer_id,
                    },
                )
                .await;
            }

            ClientMessage::AuthenticatePeer { peer_id, code } => {
                self.otp.resolve(&code).await?;
                let identity = self.peers.authenticate(from, &peer_id).await?;
                tracing::info!("Peer authenticated: {}", identity.peer_id);
                self.reply(
                    from,
                    ServerMessage::AuthSuccess {
                        peer_id: identity.peer_id,
                    },
                )
                .await;
                self.broadcast_peers().await;
            }

            ClientMessage::DiscoverPeers => {
                let peers = self.peers.authenticated_summaries().await;
                self.reply(from, ServerMessage::PeersList { peers }).await;
            }

            ClientMessage::ShareFile {
                code,
                target_peer_id,
            } => self.share_file(from, code, target_peer_id).await?,
        }
        Ok(())
    }

    async fn request_file(&self, from: &ConnectionId, code: String) -> SignalResult<()> {
        let record = self.otp.resolve(&code).await?;
        let owner = record
            .owner
            .live_connection()
            .cloned()
            .ok_or_else(|| SignalError::offline("file owner has not connected yet"))?;

        self.negotiations.open(&code, from, &owner).await;
        let notice = ServerMessage::FileRequestReceived {
            code: code.clone(),
            requester_ref: from.clone(),
            file: record.file.clone(),
        };
        if let Err(e) = self.relay.forward(&owner, notice).await {
            // Owner vanished between resolve and forward
            let _ = self.negotiations.reject(&code, from, &owner).await;
            return Err(e);
        }

        tracing::info!("File request for {} from {} sent to {}", code, from, owner);
        self.reply(
            from,
            ServerMessage::FileRequestPending {
                code,
                file: record.file,
            },
        )
        .await;
        Ok(())
    }

    async fn share_file(
        &self,
        from: &ConnectionId,
        code: String,
        target_peer_id: String,
    ) -> SignalResult<()> {
        let sender = self.peers.get(from).await?;
        let from_peer = sender
            .summary()
            .filter(|_| sender.is_authenticated())
            .ok_or_else(|| SignalError::not_found("invalid peer or not authenticated"))?;

        let target = self
            .peers
            .find_by_peer_id(&target_peer_id)
            .await
            .filter(|p| p.is_authenticated())
            .ok_or_else(|| SignalError::not_found("invalid peer or not authenticated"))?;

        let record = self.otp.resolve(&code).await?;
        if record.owner.live_connection() != Some(from) {
            return Err(SignalError::not_found("invalid or expired code"));
        }

        self.relay
            .forward(
                &target.connection_id,
                ServerMessage::FileIncoming {
                    code,
                    file: record.file,
                    from_peer,
                },
            )
            .await?;
        self.reply(from, ServerMessage::ShareInitiated { target_peer_id })
            .await;
        Ok(())
    }

    async fn broadcast_peers(&self) {
        let peers = self.peers.authenticated_summaries().await;
        self.relay
            .broadcast(&ServerMessage::PeersUpdated { peers }, None)
            .await;
    }

    /// Announce over HTTP. The record gets a fresh provisional owner, which
    /// the announcing peer presents with `register-owner` to go live. A
    /// connection ref is never accepted here since other peers learn it.
    pub async fn announce_http(&self, file: FileDescriptor) -> SignalResult<(String, OwnerRef)> {
        let owner = OwnerRef::provisional();
        let code = self.otp.announce(file, owner.clone()).await?;
        Ok((code, owner))
    }

    /// Look up what a code refers to without touching the record
    pub async fn request_http(&self, code: &str) -> SignalResult<FileDescriptor> {
        Ok(self.otp.resolve(code).await?.file)
    }

    /// `active_files` counts only codes that still resolve
    pub async fn health(&self) -> HealthSnapshot {
        HealthSnapshot {
            status: "ok",
            timestamp: now_timestamp(),
            uptime_secs: self.started_at.elapsed().as_secs(),
            active_files: self.otp.active_len().await,
            connected_peers: self.peers.len().await,
        }
    }
}
