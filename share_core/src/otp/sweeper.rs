//! Periodic purge of expired codes

use super::OtpRegistry;
use crate::negotiation::NegotiationTable;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Spawn the background sweeper. It takes the registry lock once per pass,
/// exactly like request handlers, and stops when `cancel_token` fires.
pub fn spawn_sweeper(
    registry: Arc<OtpRegistry>,
    negotiations: Arc<NegotiationTable>,
    period: Duration,
    cancel_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await; // Skip first immediate tick

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    tracing::info!("OTP sweeper stopped");
                    break;
                }
                _ = interval.tick() => {
                    let expired = registry.sweep(Instant::now()).await;
                    if expired.is_empty() {
                        continue;
                    }
                    let dropped = negotiations.drop_codes(&expired).await;
                    for code in &expired {
                        tracing::info!("Cleaned up expired code {}", code);
                    }
                    if dropped > 0 {
                        tracing::debug!(
                            "Dropped {} pending negotiations with expired codes",
                            dropped
                        );
                    }
                }
            }
        }
    })
}
