//! Realtime message types exchanged over the WebSocket channel.
//!
//! Every frame is a JSON object whose `type` field names the event, e.g.
//! `{"type": "request-file", "code": "482913"}`. Handshake payloads (SDP,
//! ICE candidates) are opaque JSON and relayed verbatim.

use crate::error::{SignalError, SignalResult};
use crate::peers::PeerSummary;
use crate::{ConnectionId, FileDescriptor};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reason sent when an owner rejects without giving one
pub const DEFAULT_REJECT_REASON: &str = "Transfer rejected by owner";

/// Messages from peer to server
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Confirm ownership of an HTTP-announced code from this connection
    RegisterOwner { code: String, owner_ref: String },
    /// Announce a file directly over the realtime channel
    AnnounceFile {
        file_name: String,
        file_size: u64,
        #[serde(default)]
        file_type: Option<String>,
    },
    RequestFile { code: String },
    WebrtcOffer {
        target_ref: ConnectionId,
        offer: Value,
        #[serde(default)]
        code: Option<String>,
    },
    WebrtcAnswer { target_ref: ConnectionId, answer: Value },
    WebrtcIceCandidate { target_ref: ConnectionId, candidate: Value },
    ApproveTransfer { code: String, requester_ref: ConnectionId },
    RejectTransfer {
        code: String,
        requester_ref: ConnectionId,
        #[serde(default)]
        reason: Option<String>,
    },
    RegisterPeer { username: String },
    AuthenticatePeer { peer_id: String, code: String },
    DiscoverPeers,
    ShareFile { code: String, target_peer_id: String },
}

impl ClientMessage {
    /// Parse one text frame. Unknown events and missing fields are malformed.
    pub fn parse(text: &str) -> SignalResult<Self> {
        let msg: ClientMessage =
            serde_json::from_str(text).map_err(|e| SignalError::malformed(e.to_string()))?;
        msg.validate()?;
        Ok(msg)
    }

    /// Reject present-but-empty required fields
    pub fn validate(&self) -> SignalResult<()> {
        match self {
            ClientMessage::RegisterOwner { code, owner_ref } => {
                require("code", code)?;
                require("ownerRef", owner_ref)
            }
            ClientMessage::AnnounceFile { file_name, .. } => require("fileName", file_name),
            ClientMessage::RequestFile { code } => require("code", code),
            ClientMessage::WebrtcOffer { target_ref, .. }
            | ClientMessage::WebrtcAnswer { target_ref, .. }
            | ClientMessage::WebrtcIceCandidate { target_ref, .. } => {
                require("targetRef", target_ref.as_str())
            }
            ClientMessage::ApproveTransfer {
                code,
                requester_ref,
            }
            | ClientMessage::RejectTransfer {
                code,
                requester_ref,
                ..
            } => {
                require("code", code)?;
                require("requesterRef", requester_ref.as_str())
            }
            ClientMessage::RegisterPeer { username } => require("username", username),
            ClientMessage::AuthenticatePeer { peer_id, code } => {
                require("peerId", peer_id)?;
                require("code", code)
            }
            ClientMessage::DiscoverPeers => Ok(()),
            ClientMessage::ShareFile {
                code,
                target_peer_id,
            } => {
                require("code", code)?;
                require("targetPeerId", target_peer_id)
            }
        }
    }

    /// Event name as it appears on the wire, for logging
    pub fn event_name(&self) -> &'static str {
        match self {
            ClientMessage::RegisterOwner { .. } => "register-owner",
            ClientMessage::AnnounceFile { .. } => "announce-file",
            ClientMessage::RequestFile { .. } => "request-file",
            ClientMessage::WebrtcOffer { .. } => "webrtc-offer",
            ClientMessage::WebrtcAnswer { .. } => "webrtc-answer",
            ClientMessage::WebrtcIceCandidate { .. } => "webrtc-ice-candidate",
            ClientMessage::ApproveTransfer { .. } => "approve-transfer",
            ClientMessage::RejectTransfer { .. } => "reject-transfer",
            ClientMessage::RegisterPeer { .. } => "register-peer",
            ClientMessage::AuthenticatePeer { .. } => "authenticate-peer",
            ClientMessage::DiscoverPeers => "discover-peers",
            ClientMessage::ShareFile { .. } => "share-file",
        }
    }
}

fn require(field: &str, value: &str) -> SignalResult<()> {
    if value.trim().is_empty() {
        return Err(SignalError::malformed(format!("missing field `{}`", field)));
    }
    Ok(())
}

/// Messages from server to peer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// First frame on every connection: the peer's own reference
    Connected { connection_ref: ConnectionId },
    RegistrationSuccess { code: String },
    FileAnnounced { code: String, file: FileDescriptor },
    /// Sent to the owner when someone presents its code
    FileRequestReceived {
        code: String,
        requester_ref: ConnectionId,
        file: FileDescriptor,
    },
    /// Sent to the requester once the owner has been notified
    FileRequestPending { code: String, file: FileDescriptor },
    WebrtcOffer {
        offer: Value,
        sender_ref: ConnectionId,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
    WebrtcAnswer { answer: Value, sender_ref: ConnectionId },
    WebrtcIceCandidate { candidate: Value, sender_ref: ConnectionId },
    TransferApproved { code: String, owner_ref: ConnectionId },
    TransferRejected { code: String, reason: String },
    /// The owner of a code this peer was negotiating for went away
    OwnerOffline { code: String },
    PeerRegistered { peer_id: String },
    AuthSuccess { peer_id: String },
    PeersList { peers: Vec<PeerSummary> },
    PeersUpdated { peers: Vec<PeerSummary> },
    FileIncoming {
        code: String,
        file: FileDescriptor,
        from_peer: PeerSummary,
    },
    ShareInitiated { target_peer_id: String },
    Error { kind: String, message: String },
}

impl From<&SignalError> for ServerMessage {
    fn from(err: &SignalError) -> Self {
        ServerMessage::Error {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}
