//! One-time share codes
//!
//! Each code binds one announced file to the peer that will serve it. Codes
//! stay resolvable (by any number of downloaders) until the fixed TTL runs
//! out, the owner disconnects, or the owner re-announces the same file.

mod code;
mod sweeper;

pub use code::{CODE_MAX, CODE_MIN, CodeGenerator, RandomCodeGenerator, is_well_formed};
pub use sweeper::spawn_sweeper;

use crate::error::{SignalError, SignalResult};
use crate::{ConnectionId, FileDescriptor, OwnerRef};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Default lifetime of a code (5 minutes)
pub const OTP_TTL: Duration = Duration::from_secs(5 * 60);

/// Upper bound on collision retries for a single announcement
pub const MAX_CODE_ATTEMPTS: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpRecord {
    pub code: String,
    pub owner: OwnerRef,
    pub file: FileDescriptor,
    pub announced_at: Instant,
}

impl OtpRecord {
    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.announced_at) > ttl
    }
}

/// A record after a successful `claim`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedRecord {
    pub record: OtpRecord,
    /// Codes of the connection's older records for the same file, now removed
    pub merged: Vec<String>,
}

pub struct OtpRegistry {
    records: RwLock<HashMap<String, OtpRecord>>,
    ttl: Duration,
    generator: Box<dyn CodeGenerator>,
}

impl Default for OtpRegistry {
    fn default() -> Self {
        Self::new(OTP_TTL)
    }
}

impl OtpRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self::with_generator(ttl, RandomCodeGenerator)
    }

    pub fn with_generator(ttl: Duration, generator: impl CodeGenerator + 'static) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            ttl,
            generator: Box::new(generator),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a code for `file` owned by `owner`.
    ///
    /// If the same owner already announced the same file, that record's code
    /// is returned and its clock restarts.
    pub async fn announce(&self, file: FileDescriptor, owner: OwnerRef) -> SignalResult<String> {
        let now = Instant::now();
        let mut records = self.records.write().await;

        if let Some(existing) = records
            .values_mut()
            .find(|r| r.owner == owner && r.file == file)
        {
            existing.announced_at = now;
            tracing::info!(
                "Re-announced {} (code {}) by {}",
                file.name,
                existing.code,
                owner.as_str()
            );
            return Ok(existing.code.clone());
        }

        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = self.generator.generate();
            if records.contains_key(&code) {
                tracing::debug!("Code collision on {}, retrying", code);
                continue;
            }

            tracing::info!(
                "Announced {} ({} bytes) with code {} by {}",
                file.name,
                file.size,
                code,
                owner.as_str()
            );
            records.insert(
                code.clone(),
                OtpRecord {
                    code: code.clone(),
                    owner,
                    file,
                    announced_at: now,
                },
            );
            return Ok(code);
        }

        tracing::warn!(
            "No free code after {} attempts ({} active)",
            MAX_CODE_ATTEMPTS,
            records.len()
        );
        Err(SignalError::CodeSpaceExhausted)
    }

    /// Replace the owner of `code`, keeping file and clock. No-op if absent.
    pub async fn rebind_owner(&self, code: &str, new_owner: OwnerRef) -> bool {
        let mut records = self.records.write().await;
        Self::rebind_locked(&mut *records, code, new_owner).is_some()
    }

    /// Rebind with the lock already held. Other records the new owner holds
    /// for the same file are removed so `code` is its only one; their codes
    /// are returned.
    fn rebind_locked(
        records: &mut HashMap<String, OtpRecord>,
        code: &str,
        new_owner: OwnerRef,
    ) -> Option<Vec<String>> {
        let file = records.get(code)?.file.clone();
        let merged: Vec<String> = records
            .values()
            .filter(|r| r.code != code && r.owner == new_owner && r.file == file)
            .map(|r| r.code.clone())
            .collect();
        for old in &merged {
            records.remove(old);
            tracing::info!("Merged duplicate announcement {} into {}", old, code);
        }

        records.get_mut(code)?.owner = new_owner;
        Some(merged)
    }

    /// Bind `code` to the live connection `connection` if the presented owner
    /// token matches the record's provisional owner (or the connection already
    /// owns it).
    pub async fn claim(
        &self,
        code: &str,
        presented: &str,
        connection: &ConnectionId,
    ) -> SignalResult<ClaimedRecord> {
        let now = Instant::now();
        let mut records = self.records.write().await;
        let record = records
            .get(code)
            .filter(|r| !r.is_expired(now, self.ttl))
            .ok_or_else(|| SignalError::not_found("invalid or expired code"))?;

        let allowed = match &record.owner {
            OwnerRef::Provisional(token) => token == presented,
            OwnerRef::Live(current) => current == connection,
        };
        if !allowed {
            return Err(SignalError::not_found("invalid code or owner"));
        }

        let owner = OwnerRef::Live(connection.clone());
        let merged = Self::rebind_locked(&mut *records, code, owner).unwrap_or_default();
        let record = records
            .get(code)
            .cloned()
            .ok_or_else(|| SignalError::not_found("invalid or expired code"))?;
        Ok(ClaimedRecord { record, merged })
    }

    /// Current binding of `code`. Does not consume the record.
    pub async fn resolve(&self, code: &str) -> SignalResult<OtpRecord> {
        if !is_well_formed(code) {
            return Err(SignalError::not_found("invalid or expired code"));
        }
        let now = Instant::now();
        let records = self.records.read().await;
        records
            .get(code)
            // Expired but not yet swept counts as gone
            .filter(|r| !r.is_expired(now, self.ttl))
            .cloned()
            .ok_or_else(|| SignalError::not_found("invalid or expired code"))
    }

    /// Remove every record owned by `owner`, returning their codes
    pub async fn expire_owner(&self, owner: &OwnerRef) -> Vec<String> {
        let mut records = self.records.write().await;
        let mut removed = Vec::new();
        records.retain(|code, record| {
            if &record.owner == owner {
                removed.push(code.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Remove every record older than the TTL at `now`, returning their codes
    pub async fn sweep(&self, now: Instant) -> Vec<String> {
        let mut records = self.records.write().await;
        let mut removed = Vec::new();
        records.retain(|code, record| {
            if record.is_expired(now, self.ttl) {
                removed.push(code.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Number of stored records, including expired ones not yet swept
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Number of records that still resolve
    pub async fn active_len(&self) -> usize {
        let now = Instant::now();
        self.records
            .read()
            .await
            .values()
            .filter(|r| !r.is_expired(now, self.ttl))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}
