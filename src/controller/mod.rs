//! The power-lifecycle controller.
//!
//! Owns the collaborators around one managed server: token manager,
//! admission guard, session log, and optional notifier. Every action runs
//! the same sequence — admit, ensure token, fresh pre-dispatch read,
//! dispatch with a single refresh-on-401 retry, then reconcile by polling
//! until the provider-side task settles or a deadline passes.
//!
//! Per action: Idle → Dispatching → Reconciling → Idle. The guard permit is
//! held for the whole sequence and released on every exit path by Drop.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::api::{classify_action_response, ComputeProvider, ProviderError, TokenManager};
use crate::config::Config;
use crate::guard::{ActionGuard, GuardRejection};
use crate::history::{ActionLog, LogEntry};
use crate::models::{ActionKind, ActionOutcome, ServerDetail};
use crate::notify::{DiscordNotifier, NotifyEvent};

/// Timing knobs for dispatch and reconciliation.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Pause between status polls while reconciling.
    pub poll_interval: Duration,
    /// How long to watch a transition before reporting it pending.
    pub reconcile_timeout: Duration,
    /// When false, return right after dispatch instead of reconciling.
    pub wait_for_settle: bool,
}

impl ControllerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            reconcile_timeout: config.reconcile_timeout(),
            wait_for_settle: true,
        }
    }
}

/// Caller-visible result of one action request. Every variant is
/// distinguishable: success, no-op success, pending, rejected, transient,
/// auth failure, and local refusal must never collapse into each other.
#[derive(Debug)]
pub enum ExecuteResult {
    /// The guard refused locally (busy, cooldown, or mid-transition).
    Refused(GuardRejection),
    /// The identity exchange failed, or the token stayed invalid after one
    /// refresh-and-retry cycle.
    AuthFailed { status: u16 },
    /// Network failure talking to the provider. Retryable by the caller.
    Transient { detail: String },
    /// The provider refused the command. Raw status kept for diagnostics.
    Rejected { status: u16, detail: String },
    /// Command acknowledged and the server settled while we watched.
    /// `no_op` means the provider reported it was already in the requested
    /// state.
    Completed { no_op: bool, server: ServerDetail },
    /// Command acknowledged but the server had not settled by the deadline.
    /// Not a failure — the action may still be completing provider-side.
    Pending {
        no_op: bool,
        last_seen: Option<ServerDetail>,
    },
}

enum ReconcileEnd {
    Quiescent(ServerDetail),
    TimedOut(Option<ServerDetail>),
    AuthFailed(u16),
}

/// Controller for one remote server resource.
pub struct Controller<P: ComputeProvider> {
    provider: P,
    tokens: TokenManager,
    guard: ActionGuard,
    settings: ControllerSettings,
    log: ActionLog,
    notifier: Option<DiscordNotifier>,
    last_outcome: Mutex<Option<ActionOutcome>>,
}

impl<P: ComputeProvider> Controller<P> {
    pub fn new(
        provider: P,
        guard: ActionGuard,
        settings: ControllerSettings,
        notifier: Option<DiscordNotifier>,
    ) -> Self {
        Self {
            provider,
            tokens: TokenManager::new(),
            guard,
            settings,
            log: ActionLog::new(),
            notifier,
            last_outcome: Mutex::new(None),
        }
    }

    /// The shared admission guard.
    #[allow(dead_code)]
    pub fn guard(&self) -> &ActionGuard {
        &self.guard
    }

    /// Whether `kind` would currently be admitted (for UI enablement).
    pub fn action_permitted(&self, kind: ActionKind) -> Result<(), GuardRejection> {
        self.guard.check(kind)
    }

    /// The most recent dispatch outcome, if any action ran this session.
    #[allow(dead_code)]
    pub fn last_outcome(&self) -> Option<ActionOutcome> {
        self.last_outcome
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Session log snapshot, oldest first.
    #[allow(dead_code)]
    pub fn history(&self) -> Vec<LogEntry> {
        self.log.snapshot()
    }

    /// Log an operation and mirror it to Discord, fire-and-forget.
    fn note(&self, event: NotifyEvent, message: &str) {
        self.log.record(message);
        if let Some(notifier) = &self.notifier {
            notifier.fire(event, message);
        }
    }

    fn record_outcome(&self, outcome: ActionOutcome) {
        *self
            .last_outcome
            .lock()
            .unwrap_or_else(|p| p.into_inner()) = Some(outcome);
    }

    /// Feed an observed snapshot back into the guard: while a task state is
    /// present, all admissions are refused.
    fn observe(&self, detail: &ServerDetail) {
        self.guard.note_task_state(!detail.is_quiescent());
    }

    /// Read the current server snapshot.
    ///
    /// A stale token is recovered exactly once: invalidate, re-acquire,
    /// retry. A second 401 propagates as a hard failure.
    pub async fn status(&self) -> Result<ServerDetail, ProviderError> {
        let detail = self.read_with_refresh().await?;
        self.observe(&detail);
        Ok(detail)
    }

    /// Discard the session token and authenticate again.
    pub async fn refresh_auth(&self) -> Result<(), ProviderError> {
        match self.tokens.refresh(&self.provider).await {
            Ok(_) => {
                self.note(NotifyEvent::Success, "authentication refreshed");
                Ok(())
            }
            Err(e) => {
                self.note(NotifyEvent::Error, &format!("authentication failed: {}", e));
                Err(e)
            }
        }
    }

    async fn read_with_refresh(&self) -> Result<ServerDetail, ProviderError> {
        let token = self.tokens.ensure(&self.provider).await?;
        match self.provider.read_status(&token).await {
            Err(ProviderError::Unauthorized) => {
                self.tokens.invalidate().await;
                let token = self.tokens.ensure(&self.provider).await?;
                self.provider.read_status(&token).await
            }
            other => other,
        }
    }

    async fn dispatch_once(&self, kind: ActionKind) -> Result<ActionOutcome, ProviderError> {
        let token = self.tokens.ensure(&self.provider).await?;
        match self.provider.send_action(kind, &token).await {
            Ok(resp) => Ok(classify_action_response(resp.status, &resp.body)),
            Err(ProviderError::Transport(e)) => Ok(ActionOutcome::TransientFailure(e)),
            Err(ProviderError::Unauthorized) => Ok(ActionOutcome::Unauthorized),
            Err(ProviderError::Unexpected { status, detail }) => {
                Ok(classify_action_response(status, &detail))
            }
            Err(e @ ProviderError::Auth(_)) => Err(e),
        }
    }

    /// Dispatch with the bounded retry: one invalidate + acquire + resend on
    /// a stale token. An `Unauthorized` in the return value means the retry
    /// also failed.
    async fn dispatch_with_refresh(&self, kind: ActionKind) -> Result<ActionOutcome, ProviderError> {
        match self.dispatch_once(kind).await? {
            ActionOutcome::Unauthorized => {
                self.tokens.invalidate().await;
                self.dispatch_once(kind).await
            }
            outcome => Ok(outcome),
        }
    }

    /// Poll until the server's task state clears or the deadline passes.
    /// Transient read failures don't abort the watch; only a hard auth
    /// failure does.
    async fn reconcile(&self) -> ReconcileEnd {
        let deadline = Instant::now() + self.settings.reconcile_timeout;
        let mut last_seen: Option<ServerDetail> = None;
        loop {
            tokio::time::sleep(self.settings.poll_interval).await;
            match self.read_with_refresh().await {
                Ok(detail) => {
                    self.observe(&detail);
                    if detail.is_quiescent() {
                        return ReconcileEnd::Quiescent(detail);
                    }
                    last_seen = Some(detail);
                }
                Err(ProviderError::Auth(status)) => return ReconcileEnd::AuthFailed(status),
                Err(ProviderError::Unauthorized) => return ReconcileEnd::AuthFailed(401),
                Err(_) => {}
            }
            if Instant::now() >= deadline {
                return ReconcileEnd::TimedOut(last_seen);
            }
        }
    }

    /// Run one power action end to end.
    pub async fn execute(&self, kind: ActionKind) -> ExecuteResult {
        let _permit = match self.guard.admit(kind) {
            Ok(permit) => permit,
            Err(rejection) => {
                self.log
                    .record(format!("{} refused: {}", kind, rejection));
                return ExecuteResult::Refused(rejection);
            }
        };

        // Fresh pre-dispatch read: a server mid-transition must not accept
        // a second command, whatever the cooldown clocks say.
        match self.read_with_refresh().await {
            Ok(detail) => {
                self.observe(&detail);
                if !detail.is_quiescent() {
                    self.log.record(format!(
                        "{} refused: task {} in progress",
                        kind,
                        detail.task_state.as_deref().unwrap_or("?")
                    ));
                    return ExecuteResult::Refused(GuardRejection::Transitioning);
                }
            }
            Err(ProviderError::Auth(status)) => return ExecuteResult::AuthFailed { status },
            Err(ProviderError::Unauthorized) => return ExecuteResult::AuthFailed { status: 401 },
            Err(ProviderError::Transport(detail)) => return ExecuteResult::Transient { detail },
            Err(ProviderError::Unexpected { status, detail }) => {
                return ExecuteResult::Rejected { status, detail }
            }
        }

        let outcome = match self.dispatch_with_refresh(kind).await {
            Ok(outcome) => outcome,
            Err(ProviderError::Auth(status)) => return ExecuteResult::AuthFailed { status },
            Err(ProviderError::Unauthorized) => return ExecuteResult::AuthFailed { status: 401 },
            Err(ProviderError::Transport(detail)) => return ExecuteResult::Transient { detail },
            Err(ProviderError::Unexpected { status, detail }) => {
                return ExecuteResult::Rejected { status, detail }
            }
        };
        self.record_outcome(outcome.clone());

        let no_op = match outcome {
            ActionOutcome::Accepted => {
                self.note(dispatch_event(kind), &format!("{} command sent", kind));
                false
            }
            ActionOutcome::AlreadyInTargetState => {
                self.note(
                    NotifyEvent::Info,
                    &format!("{} was a no-op: server already in the requested state", kind),
                );
                true
            }
            ActionOutcome::Unauthorized => {
                self.note(
                    NotifyEvent::Error,
                    &format!("{} failed: token rejected twice", kind),
                );
                return ExecuteResult::AuthFailed { status: 401 };
            }
            ActionOutcome::TransientFailure(detail) => {
                self.note(NotifyEvent::Error, &format!("{} failed: {}", kind, detail));
                return ExecuteResult::Transient { detail };
            }
            ActionOutcome::Rejected { status, detail } => {
                self.note(
                    NotifyEvent::Error,
                    &format!("{} rejected by provider (status {})", kind, status),
                );
                return ExecuteResult::Rejected { status, detail };
            }
        };

        if !self.settings.wait_for_settle {
            return ExecuteResult::Pending {
                no_op,
                last_seen: None,
            };
        }

        match self.reconcile().await {
            ReconcileEnd::Quiescent(server) => {
                self.note(
                    NotifyEvent::Success,
                    &format!("{} settled: server is {}", kind, server.status),
                );
                ExecuteResult::Completed { no_op, server }
            }
            ReconcileEnd::TimedOut(last_seen) => {
                self.note(
                    NotifyEvent::Warning,
                    &format!("{} still settling at deadline; check again later", kind),
                );
                ExecuteResult::Pending { no_op, last_seen }
            }
            ReconcileEnd::AuthFailed(status) => {
                self.note(
                    NotifyEvent::Error,
                    &format!("{} watch aborted: token rejected twice", kind),
                );
                ExecuteResult::AuthFailed { status }
            }
        }
    }
}

fn dispatch_event(kind: ActionKind) -> NotifyEvent {
    match kind {
        ActionKind::Start => NotifyEvent::Start,
        ActionKind::Stop => NotifyEvent::Stop,
        ActionKind::Reboot => NotifyEvent::Restart,
    }
}
