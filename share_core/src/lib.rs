use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

pub mod config;
pub mod error;
pub mod http_share;
pub mod hub;
pub mod lifecycle;
pub mod negotiation;
pub mod otp;
pub mod peers;
pub mod protocol;
pub mod relay;

pub use config::ServerConfig;
pub use error::{SignalError, SignalResult};
pub use hub::{HealthSnapshot, SignalHub};

/// MIME type used when an announcement does not carry one
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Metadata of a file announced by its owner. The bytes never reach the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    #[serde(rename = "fileName")]
    pub name: String,
    #[serde(rename = "fileSize")]
    pub size: u64,
    #[serde(rename = "fileType")]
    pub mime_type: String,
}

impl FileDescriptor {
    pub fn new(name: impl Into<String>, size: u64, mime_type: Option<String>) -> Self {
        let mime_type = mime_type
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());
        Self {
            name: name.into(),
            size,
            mime_type,
        }
    }
}

/// Opaque handle of one live realtime connection
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConnectionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ConnectionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who currently answers for an OTP record.
///
/// An HTTP announcement only knows a provisional token; once the announcing
/// peer's realtime channel presents that token the record is rebound to the
/// live connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OwnerRef {
    Provisional(String),
    Live(ConnectionId),
}

impl OwnerRef {
    /// Generate a fresh provisional token (full UUID entropy)
    pub fn provisional() -> Self {
        OwnerRef::Provisional(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        match self {
            OwnerRef::Provisional(token) => token,
            OwnerRef::Live(id) => id.as_str(),
        }
    }

    pub fn live_connection(&self) -> Option<&ConnectionId> {
        match self {
            OwnerRef::Live(id) => Some(id),
            OwnerRef::Provisional(_) => None,
        }
    }
}

impl From<ConnectionId> for OwnerRef {
    fn from(value: ConnectionId) -> Self {
        OwnerRef::Live(value)
    }
}

pub(crate) fn now_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_descriptor_defaults_mime_type() {
        let file = FileDescriptor::new("notes.txt", 12, None);
        assert_eq!(file.mime_type, DEFAULT_MIME_TYPE);

        let file = FileDescriptor::new("notes.txt", 12, Some("  ".to_string()));
        assert_eq!(file.mime_type, DEFAULT_MIME_TYPE);

        let file = FileDescriptor::new("movie.mp4", 1, Some("video/mp4".to_string()));
        assert_eq!(file.mime_type, "video/mp4");
    }

    #[test]
    fn test_file_descriptor_wire_names() {
        let file = FileDescriptor::new("movie.mp4", 104857600, Some("video/mp4".to_string()));
        let json = serde_json::to_value(&file).unwrap();
        assert_eq!(json["fileName"], "movie.mp4");
        assert_eq!(json["fileSize"], 104857600u64);
        assert_eq!(json["fileType"], "video/mp4");
    }

    #[test]
    fn test_owner_ref_views() {
        let id = ConnectionId::from("conn-1");
        let owner = OwnerRef::from(id.clone());
        assert_eq!(owner.as_str(), "conn-1");
        assert_eq!(owner.live_connection(), Some(&id));

        let provisional = OwnerRef::provisional();
        assert_eq!(provisional.as_str().len(), 32);
        assert!(provisional.live_connection().is_none());
    }
}
