use tokio_util::sync::CancellationToken;

use crate::error::QuillError;

/// Controller occupancy. `Active` is the only state from which `cancel()`
/// has an effect; re-entry into `Active` requires cleanup to have run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Active,
}

/// Run-time state of one in-flight (or just-finished) streaming operation.
/// Owned exclusively by the controller; external callers read it through the
/// public accessors only.
pub struct StreamSession {
    pub phase: Phase,
    pub cancelled: bool,
    /// Append-only while the session runs. Cleared on cancellation, and
    /// otherwise only by an explicit `clear_results()`.
    pub accumulated: String,
    /// Monotonic session counter. Callbacks from an abandoned backend task
    /// carry the generation they were spawned under; a mismatch means the
    /// callback is orphaned and must be discarded.
    pub generation: u64,
    pub cancel_token: CancellationToken,
}

impl StreamSession {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            cancelled: false,
            accumulated: String::new(),
            generation: 0,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Reset for a new run. The caller has already verified the phase.
    pub fn activate(&mut self) -> (u64, CancellationToken) {
        self.phase = Phase::Active;
        self.cancelled = false;
        self.accumulated.clear();
        self.generation += 1;
        self.cancel_token = CancellationToken::new();
        (self.generation, self.cancel_token.clone())
    }
}

impl Default for StreamSession {
    fn default() -> Self {
        Self::new()
    }
}

/// The final, single-fire result of one streaming session. Produced exactly
/// once; consumed once by the result router.
#[derive(Debug)]
pub enum TerminalOutcome {
    Completed(String),
    Failed(QuillError),
    Cancelled,
}

impl TerminalOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}
