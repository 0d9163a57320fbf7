//! Provider API boundary.
//!
//! Everything that talks to the remote provider lives behind the
//! [`ComputeProvider`] trait so the controller can be exercised against a
//! scripted fake. All remote-call failures are converted to typed values at
//! this boundary — nothing propagates past it as an unhandled fault.

pub mod conoha;
pub mod token;

pub use conoha::ConohaClient;
pub use token::TokenManager;

use thiserror::Error;

use crate::constants::REJECTION_DETAIL_LEN;
use crate::models::{ActionKind, ActionOutcome, ServerDetail};
use crate::utils::truncate_str;

/// Errors from the provider boundary.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The identity exchange itself failed. Fatal to the current attempt.
    #[error("identity service rejected the login (status {0})")]
    Auth(u16),
    /// The provider rejected the session token. Recovered by one
    /// invalidate + acquire + retry cycle at the controller.
    #[error("session token rejected by the provider")]
    Unauthorized,
    /// Any other non-success response.
    #[error("provider returned status {status}")]
    Unexpected { status: u16, detail: String },
    /// Network-level failure (connect, timeout, body read).
    #[error("network error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::Transport(e.to_string())
    }
}

/// Raw response from an action submission, before classification.
#[derive(Debug, Clone)]
pub struct ActionResponse {
    pub status: u16,
    pub body: String,
}

/// The remote compute provider, as seen by the controller.
///
/// Implementations never retry: the refresh-on-401 policy lives in the
/// controller so each call here stays side-effect-free and testable.
#[allow(async_fn_in_trait)]
pub trait ComputeProvider {
    /// Perform the password-grant identity exchange. Returns a fresh token.
    async fn authenticate(&self) -> Result<String, ProviderError>;

    /// Fetch the current server snapshot. Maps 401/403 to
    /// [`ProviderError::Unauthorized`]; never retries.
    async fn read_status(&self, token: &str) -> Result<ServerDetail, ProviderError>;

    /// Submit a power action. Returns the raw status and body for
    /// classification, or a transport error.
    async fn send_action(
        &self,
        kind: ActionKind,
        token: &str,
    ) -> Result<ActionResponse, ProviderError>;
}

/// Body keywords that mark an error response as "the server is already
/// where you asked it to be". The provider is inconsistent about using 409
/// for no-op actions, so this shim keeps redundant commands from surfacing
/// as user-facing failures. Matched case-insensitively.
const REDUNDANT_HINTS: &[&str] = &["already", "conflict", "running", "stopped", "shutoff"];

/// Classify a provider response to an action submission.
///
/// This is the single place the provider's quirks are interpreted:
/// - any 2xx is `Accepted`
/// - 409 means "no-op, already in/entering the requested state"
/// - 401 means the token went stale
/// - anything else is sniffed for redundancy hints in the body before being
///   treated as a hard rejection
pub fn classify_action_response(status: u16, body: &str) -> ActionOutcome {
    if (200..300).contains(&status) {
        return ActionOutcome::Accepted;
    }
    match status {
        409 => ActionOutcome::AlreadyInTargetState,
        401 => ActionOutcome::Unauthorized,
        _ => {
            let lower = body.to_lowercase();
            if REDUNDANT_HINTS.iter().any(|hint| lower.contains(hint)) {
                ActionOutcome::AlreadyInTargetState
            } else {
                ActionOutcome::Rejected {
                    status,
                    detail: truncate_str(body, REJECTION_DETAIL_LEN),
                }
            }
        }
    }
}
