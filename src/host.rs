use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::error::QuillError;
use crate::request::{LocationIntent, SelectionSnapshot};

/// How long a failure notification stays visible.
pub const NOTICE_DURATION: Duration = Duration::from_secs(5);

/// A best-effort host capability failed. Carried back to the call site so the
/// decision to ignore it stays visible in code (`let _ = hooks.restore_focus()`).
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HostError(pub String);

/// Host capabilities the controller uses around a streaming session.
/// Every method is best-effort: the controller records failures at debug
/// level and discards them — none may affect the session outcome.
pub trait HostHooks: Send + Sync {
    /// Register the session's cancellation token with the host's global
    /// key-press contract ("Escape cancels the active session").
    fn bind_cancel(&self, token: CancellationToken) -> Result<(), HostError>;

    /// Remove the binding installed by `bind_cancel`. Runs during cleanup.
    fn release_cancel(&self) -> Result<(), HostError>;

    /// Return input focus to the editing surface after a session ends.
    fn restore_focus(&self) -> Result<(), HostError>;

    /// Dismiss an on-screen virtual keyboard if the host has one.
    fn dismiss_virtual_keyboard(&self) -> Result<(), HostError>;
}

/// Transient user-facing notifications. Backend failures surface here with
/// `NOTICE_DURATION`; concurrency violations never do.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, duration: Duration);
}

/// The document-mutation contract: write `text` at the location described by
/// `intent`, resolved against the request-time `snapshot` (not the live
/// cursor). Called at most once per accepted result.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    async fn apply(
        &self,
        intent: &LocationIntent,
        text: &str,
        snapshot: &SelectionSnapshot,
    ) -> Result<(), QuillError>;
}
