use crate::session::FrameWriter;
use fcmcore::mcs::McsTag;
use fcmcore::proto::mcs::HeartbeatPing;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Sends a HeartbeatPing every `interval` until `shutdown` fires or a write
/// fails. A failed write is left for the read loop to notice.
pub(crate) async fn heartbeat_loop(
    writer: Arc<FrameWriter>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    debug!(target: "Mcs/Heartbeat", "Heartbeat every {}s", interval.as_secs());
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                if let Err(e) = writer.send(McsTag::HeartbeatPing, &HeartbeatPing::default()).await {
                    warn!(target: "Mcs/Heartbeat", "Failed to send heartbeat ping: {e}");
                    return;
                }
                debug!(target: "Mcs/Heartbeat", "Heartbeat ping sent");
            },
            _ = shutdown.cancelled() => {
                debug!(target: "Mcs/Heartbeat", "Shutdown signaled, exiting heartbeat loop.");
                return;
            }
        }
    }
}
