//! Best-effort delivery to a list of registered users.
//!
//! A broadcast never stops at the first unreachable peer. Each target is
//! looked up and written to in turn; whatever goes wrong for one target is
//! recorded in the [`DeliveryReport`] and the loop moves on. Nothing is
//! queued or retried: delivery is at-most-once.

use murmur_protocol::{Codec, Packet, ProtocolError};
use murmur_transport::{FrameSink, TransportError};

use crate::Registry;

/// Why a single target did not get the frame.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The user left between the snapshot and the send.
    #[error("not registered")]
    NotRegistered,

    /// Writing to the user's connection failed.
    #[error(transparent)]
    Send(#[from] TransportError),
}

/// One target that did not receive a broadcast.
#[derive(Debug)]
pub struct DeliveryFailure {
    pub username: String,
    pub reason: DeliveryError,
}

/// The outcome of one broadcast, target by target.
#[derive(Debug, Default)]
pub struct DeliveryReport {
    /// Users the frame was written to, in delivery order.
    pub delivered: Vec<String>,
    /// Users it could not be written to.
    pub failed: Vec<DeliveryFailure>,
}

impl DeliveryReport {
    /// Returns `true` if every target received the frame.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Logs each failure at `warn`. Callers use this instead of retrying.
    pub fn log_failures(&self, context: &str) {
        for failure in &self.failed {
            tracing::warn!(
                username = %failure.username,
                error = %failure.reason,
                context,
                "delivery failed"
            );
        }
    }
}

impl<P: FrameSink> Registry<P> {
    /// Encodes `packet` once and writes it to each of `targets`, in order.
    ///
    /// # Errors
    /// Fails only if the packet can't be encoded, in which case nothing is
    /// sent. Per-target failures are in the returned report.
    pub async fn broadcast<C: Codec>(
        &self,
        codec: &C,
        packet: &Packet,
        targets: &[String],
    ) -> Result<DeliveryReport, ProtocolError> {
        let frame = codec.encode(packet)?;
        Ok(self.multicast(&frame, targets).await)
    }

    /// Writes an already-encoded frame to each of `targets`, in order.
    ///
    /// Each target is looked up individually, so a user who left after the
    /// caller built `targets` shows up as [`DeliveryError::NotRegistered`]
    /// rather than being written to a dead socket.
    pub async fn multicast(
        &self,
        frame: &[u8],
        targets: &[String],
    ) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        for username in targets {
            // Lock released before the write.
            let Some(sink) = self.lookup(username).await else {
                report.failed.push(DeliveryFailure {
                    username: username.clone(),
                    reason: DeliveryError::NotRegistered,
                });
                continue;
            };

            match sink.send(frame).await {
                Ok(()) => report.delivered.push(username.clone()),
                Err(e) => report.failed.push(DeliveryFailure {
                    username: username.clone(),
                    reason: DeliveryError::Send(e),
                }),
            }
        }

        tracing::debug!(
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            bytes = frame.len(),
            "multicast complete"
        );
        report
    }
}
