/// Stories/broadcasts tray prefetch running beside a feed fetch
use crate::endpoint::{paths, ApiRequest};
use crate::error::{FeedError, Result};
use crate::model::Tray;
use crate::session::{generate_uuid, Session};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, warn};

const SUPPORTED_CAPABILITIES: &str = r#"[{"name":"SUPPORTED_SDK_VERSIONS","value":"100.0,101.0,102.0,103.0,104.0,105.0,106.0,107.0,108.0,109.0,110.0,111.0,112.0,113.0,114.0,115.0,116.0,117.0"},{"name":"FACE_TRACKER_VERSION","value":"14"},{"name":"segmentation","value":"segmentation_enabled"},{"name":"COMPRESSION","value":"ETC2_COMPRESSION"},{"name":"world_tracker","value":"world_tracker_enabled"},{"name":"gyroscope","value":"gyroscope_enabled"}]"#;

/// Outcome of waiting on a prefetch
#[derive(Debug)]
pub enum TrayOutcome {
    Ready(Result<Tray>),
    /// Still running after the wait; the handle is handed back
    Pending(TrayPrefetch),
}

/// Handle to one in-flight tray fetch.
///
/// Each triggering feed fetch owns its own handle, so a result can never be
/// picked up by a different call. Dropping the handle discards the result.
#[derive(Debug)]
pub struct TrayPrefetch {
    reason: &'static str,
    rx: oneshot::Receiver<Result<Tray>>,
}

impl TrayPrefetch {
    /// Start fetching the tray in the background
    pub fn spawn(session: &Session, reason: &'static str) -> Self {
        let (tx, rx) = oneshot::channel();
        let session = session.clone();
        tokio::spawn(async move {
            let result = fetch_tray(&session, reason).await;
            if let Err(e) = &result {
                warn!("Tray prefetch ({}) failed: {}", reason, e);
            }
            // Receiver gone means nobody cares any more
            let _ = tx.send(result);
        });
        debug!("Tray prefetch started ({})", reason);
        Self { reason, rx }
    }

    pub fn reason(&self) -> &'static str {
        self.reason
    }

    /// Wait up to `limit` for the outcome
    pub async fn wait(mut self, limit: Duration) -> TrayOutcome {
        match timeout(limit, &mut self.rx).await {
            Ok(Ok(result)) => TrayOutcome::Ready(result),
            Ok(Err(_)) => TrayOutcome::Ready(Err(FeedError::Transport(format!(
                "tray prefetch ({}) task ended without a result",
                self.reason
            )))),
            Err(_) => TrayOutcome::Pending(self),
        }
    }

    /// Take the outcome if it is already there, without waiting
    pub fn try_take(mut self) -> TrayOutcome {
        match self.rx.try_recv() {
            Ok(result) => TrayOutcome::Ready(result),
            Err(oneshot::error::TryRecvError::Empty) => TrayOutcome::Pending(self),
            Err(oneshot::error::TryRecvError::Closed) => TrayOutcome::Ready(Err(FeedError::Transport(format!(
                "tray prefetch ({}) task ended without a result",
                self.reason
            )))),
        }
    }
}

async fn fetch_tray(session: &Session, reason: &str) -> Result<Tray> {
    let config = session.config();
    let request = ApiRequest::post(paths::REELS_TRAY)
        .param("supported_capabilities_new", SUPPORTED_CAPABILITIES)
        .param("reason", reason)
        .param("timezone_offset", config.timezone_offset.to_string())
        .param("tray_session_id", generate_uuid())
        .param("request_id", generate_uuid())
        .param("_uuid", config.uuid.clone());
    session.call_json(request).await
}
