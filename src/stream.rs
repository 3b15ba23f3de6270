use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::backend::{ModelBackend, TokenFn};
use crate::display;
use crate::error::QuillError;
use crate::host::{HostHooks, NOTICE_DURATION, Notifier};
use crate::request::EditRequest;
use crate::session::{Phase, StreamSession, TerminalOutcome};

/// Delay before probing the host for a virtual-keyboard dismissal.
pub const KEYBOARD_DISMISS_DELAY: Duration = Duration::from_millis(150);

pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// Caller-supplied callbacks for one streaming session, plus the numeric
/// document offset the live typing affordance is anchored at.
///
/// `on_token` is best-effort: an error is logged and the stream continues.
/// `on_complete` is not: its error terminates the session as Failed.
pub trait StreamSinks: Send + Sync {
    /// Document offset for the live-display affordance.
    fn anchor(&self) -> usize;
    /// One raw backend fragment, in production order.
    fn on_token(&self, fragment: &str) -> Result<(), SinkError>;
    /// Display-formatted view of the full accumulated text.
    fn on_update(&self, display: &str);
    /// Full accumulated text, fired exactly once on completion.
    fn on_complete(&self, full: &str) -> Result<(), SinkError>;
    fn on_error(&self, error: &QuillError);
    fn on_cancel(&self);
}

/// Single-flight streaming state machine: `Idle -> Active -> {Completed,
/// Failed, Cancelled} -> Idle`. Exactly one session may be active at a time;
/// conflicting `start` calls are rejected, never queued.
pub struct StreamController {
    session: Arc<Mutex<StreamSession>>,
    hooks: Arc<dyn HostHooks>,
    notifier: Arc<dyn Notifier>,
}

impl StreamController {
    pub fn new(hooks: Arc<dyn HostHooks>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            session: Arc::new(Mutex::new(StreamSession::new())),
            hooks,
            notifier,
        }
    }

    /// Run one request to a terminal outcome.
    ///
    /// Rejects with `StreamBusy` when a session is already active, without
    /// touching any state or sink. Otherwise the backend call runs in a
    /// spawned task; cancellation abandons the task rather than aborting it,
    /// and anything the orphan produces afterwards is discarded.
    pub async fn start(
        &self,
        backend: Arc<dyn ModelBackend>,
        request: &EditRequest,
        sinks: Arc<dyn StreamSinks>,
    ) -> Result<TerminalOutcome, QuillError> {
        let (generation, token) = {
            let mut s = lock_session(&self.session);
            if s.phase == Phase::Active {
                return Err(QuillError::StreamBusy);
            }
            s.activate()
        };

        // Cleanup runs exactly once on every exit path below: release the
        // cancel binding, mark the session inactive, restore focus.
        let _cleanup = CleanupGuard {
            session: self.session.as_ref(),
            hooks: self.hooks.as_ref(),
            generation,
        };

        if let Err(e) = self.hooks.bind_cancel(token.clone()) {
            tracing::debug!("cancel binding unavailable: {e}");
        }
        self.spawn_keyboard_dismiss();

        let mut handle = {
            let session = Arc::clone(&self.session);
            let sinks_for_task = Arc::clone(&sinks);
            let backend_req = request.to_generate();
            let streaming = request.stream;
            tokio::spawn(async move {
                let push = move |fragment: &str| {
                    push_token(&session, generation, sinks_for_task.as_ref(), fragment);
                };
                let on_token: Option<&TokenFn> = if streaming { Some(&push) } else { None };
                backend.generate(&backend_req, on_token).await
            })
        };

        let joined = tokio::select! {
            biased;
            _ = token.cancelled() => {
                // `cancel()` flipped the state already, or the host's key
                // binding fired the token directly; converge either way.
                // The backend task keeps running in the background and the
                // generation guard discards whatever it still produces.
                self.mark_cancelled(generation);
                sinks.on_cancel();
                return Ok(TerminalOutcome::Cancelled);
            }
            joined = &mut handle => joined,
        };

        let outcome = match joined {
            Ok(Ok(returned)) => {
                if self.take_cancelled(generation) {
                    // Cancellation won the race against backend completion:
                    // the Completed outcome is suppressed.
                    sinks.on_cancel();
                    TerminalOutcome::Cancelled
                } else {
                    let full = {
                        let mut s = lock_session(&self.session);
                        if let Some(text) = returned {
                            // Non-streaming mode delivers the result here.
                            s.accumulated = text;
                        }
                        s.phase = Phase::Idle;
                        s.accumulated.clone()
                    };

                    sinks.on_update(&display::final_preview(&full));

                    match sinks.on_complete(&full) {
                        Ok(()) => TerminalOutcome::Completed(full),
                        Err(e) => {
                            let err = QuillError::Sink(e.to_string());
                            self.fail(&sinks, err)
                        }
                    }
                }
            }
            Ok(Err(e)) => {
                if self.take_cancelled(generation) {
                    sinks.on_cancel();
                    TerminalOutcome::Cancelled
                } else {
                    lock_session(&self.session).phase = Phase::Idle;
                    self.fail(&sinks, e)
                }
            }
            Err(join_err) => {
                lock_session(&self.session).phase = Phase::Idle;
                self.fail(
                    &sinks,
                    QuillError::Other(format!("backend task failed: {join_err}")),
                )
            }
        };

        Ok(outcome)
    }

    /// Cancel the active session. Idempotent; a no-op when idle.
    ///
    /// State flips synchronously: any racing token callback observes the
    /// cancelled flag and an empty accumulator before this returns.
    pub fn cancel(&self) {
        let token = {
            let mut s = lock_session(&self.session);
            if s.phase != Phase::Active {
                return;
            }
            s.cancelled = true;
            s.accumulated.clear();
            s.phase = Phase::Idle;
            s.cancel_token.clone()
        };
        token.cancel();
    }

    pub fn is_streaming(&self) -> bool {
        lock_session(&self.session).phase == Phase::Active
    }

    pub fn current_result(&self) -> String {
        lock_session(&self.session).accumulated.clone()
    }

    /// Explicit reset of the accumulated text, independent of cancellation.
    /// Lets callers separate "stop showing a spinner" from "erase the
    /// pending answer".
    pub fn clear_results(&self) {
        lock_session(&self.session).accumulated.clear();
    }

    /// Cancellation token of the current (or most recent) session, for hosts
    /// that wire their own triggers beyond the `bind_cancel` contract.
    pub fn cancel_handle(&self) -> CancellationToken {
        lock_session(&self.session).cancel_token.clone()
    }

    fn mark_cancelled(&self, generation: u64) {
        let mut s = lock_session(&self.session);
        if s.generation == generation {
            s.cancelled = true;
            s.accumulated.clear();
            s.phase = Phase::Idle;
        }
    }

    /// True when this session was cancelled; also converges the state so the
    /// accumulator is empty afterwards.
    fn take_cancelled(&self, generation: u64) -> bool {
        let mut s = lock_session(&self.session);
        if s.generation == generation && s.cancelled {
            s.accumulated.clear();
            s.phase = Phase::Idle;
            true
        } else {
            false
        }
    }

    fn fail(&self, sinks: &Arc<dyn StreamSinks>, err: QuillError) -> TerminalOutcome {
        self.notifier.notify(&err.user_message(), NOTICE_DURATION);
        sinks.on_error(&err);
        TerminalOutcome::Failed(err)
    }

    /// After starting a stream, try to dismiss any on-screen virtual
    /// keyboard on a short delay. Never blocks the streaming path.
    fn spawn_keyboard_dismiss(&self) {
        let hooks = Arc::clone(&self.hooks);
        tokio::spawn(async move {
            tokio::time::sleep(KEYBOARD_DISMISS_DELAY).await;
            if let Err(e) = hooks.dismiss_virtual_keyboard() {
                tracing::debug!("keyboard dismissal skipped: {e}");
            }
        });
    }
}

/// Append one fragment and forward it to the sinks. Runs inside the backend
/// task; the generation and cancelled checks make orphaned calls a no-op.
fn push_token(
    session: &Mutex<StreamSession>,
    generation: u64,
    sinks: &dyn StreamSinks,
    fragment: &str,
) {
    let display = {
        let mut s = lock_session(session);
        if s.generation != generation || s.cancelled || s.phase != Phase::Active {
            tracing::debug!("discarding orphaned token");
            return;
        }
        s.accumulated.push_str(fragment);
        display::live_preview(&s.accumulated)
    };

    if let Err(e) = sinks.on_token(fragment) {
        tracing::warn!("token sink failed, continuing stream: {e}");
    }
    sinks.on_update(&display);
}

fn lock_session(session: &Mutex<StreamSession>) -> MutexGuard<'_, StreamSession> {
    session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct CleanupGuard<'a> {
    session: &'a Mutex<StreamSession>,
    hooks: &'a dyn HostHooks,
    generation: u64,
}

impl Drop for CleanupGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.hooks.release_cancel() {
            tracing::debug!("cancel binding release failed: {e}");
        }

        {
            let mut s = lock_session(self.session);
            if s.generation == self.generation && s.phase == Phase::Active {
                s.phase = Phase::Idle;
            }
        }

        // Focus restoration is best-effort and must never mask the outcome.
        if let Err(e) = self.hooks.restore_focus() {
            tracing::debug!("focus restore failed: {e}");
        }
    }
}
