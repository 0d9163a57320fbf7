//! Cooldown / single-flight guard.
//!
//! The provider produces duplicate-submission artifacts when repeated
//! start/stop calls race, so admission control here is a correctness
//! mechanism, not UX polish. At most one action may be in flight for the
//! resource at a time, regardless of kind; each kind additionally carries a
//! cooldown window between admitted attempts; and while the server is
//! observed mid-transition, every action is refused.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::constants::DEFAULT_COOLDOWN_SECS;
use crate::models::ActionKind;
use crate::utils::format_duration;

/// Why the guard refused an action. A local policy refusal, not a system
/// error — callers surface the wait, they don't retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardRejection {
    /// Another action is currently dispatched or reconciling.
    Busy,
    /// The server was last observed with a task state present.
    Transitioning,
    /// The per-kind cooldown window has not elapsed.
    Cooldown { remaining: Duration },
}

impl fmt::Display for GuardRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardRejection::Busy => write!(f, "another action is already in flight"),
            GuardRejection::Transitioning => {
                write!(f, "the server is mid-transition; wait for it to settle")
            }
            GuardRejection::Cooldown { remaining } => {
                write!(f, "cooldown active, retry in {}", format_duration(*remaining))
            }
        }
    }
}

#[derive(Default)]
struct GuardState {
    in_flight: bool,
    transitioning: bool,
    last_attempt: HashMap<ActionKind, Instant>,
}

/// Admission guard shared by all callers targeting the resource.
pub struct ActionGuard {
    state: Arc<Mutex<GuardState>>,
    cooldowns: HashMap<ActionKind, Duration>,
}

impl ActionGuard {
    /// Build a guard with per-kind cooldown windows. Kinds missing from the
    /// map fall back to the default window.
    pub fn new(cooldowns: HashMap<ActionKind, Duration>) -> Self {
        Self {
            state: Arc::new(Mutex::new(GuardState::default())),
            cooldowns,
        }
    }

    fn cooldown_for(&self, kind: ActionKind) -> Duration {
        self.cooldowns
            .get(&kind)
            .copied()
            .unwrap_or(Duration::from_secs(DEFAULT_COOLDOWN_SECS))
    }

    fn lock(&self) -> MutexGuard<'_, GuardState> {
        // A panic while holding the lock poisons it; the state itself is
        // still coherent, so keep going with it.
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn rejection(&self, state: &GuardState, kind: ActionKind) -> Option<GuardRejection> {
        if state.in_flight {
            return Some(GuardRejection::Busy);
        }
        if state.transitioning {
            return Some(GuardRejection::Transitioning);
        }
        if let Some(last) = state.last_attempt.get(&kind) {
            let window = self.cooldown_for(kind);
            let elapsed = last.elapsed();
            if elapsed < window {
                return Some(GuardRejection::Cooldown {
                    remaining: window - elapsed,
                });
            }
        }
        None
    }

    /// Whether `kind` would currently be admitted. Never changes state —
    /// used for the "action currently permitted" signal.
    pub fn check(&self, kind: ActionKind) -> Result<(), GuardRejection> {
        let state = self.lock();
        match self.rejection(&state, kind) {
            Some(r) => Err(r),
            None => Ok(()),
        }
    }

    /// Admit an action: flips the global flag to busy and records the
    /// attempt time against `kind`. The returned permit releases the flag
    /// when dropped, on every exit path.
    pub fn admit(&self, kind: ActionKind) -> Result<DispatchPermit, GuardRejection> {
        let mut state = self.lock();
        if let Some(r) = self.rejection(&state, kind) {
            return Err(r);
        }
        state.in_flight = true;
        state.last_attempt.insert(kind, Instant::now());
        Ok(DispatchPermit {
            state: Arc::clone(&self.state),
        })
    }

    /// Record whether the latest status read saw a task state. While one is
    /// present, every admission is refused regardless of cooldowns.
    pub fn note_task_state(&self, present: bool) {
        self.lock().transitioning = present;
    }
}

/// Proof of admission. Dropping it returns the guard to free.
pub struct DispatchPermit {
    state: Arc<Mutex<GuardState>>,
}

impl Drop for DispatchPermit {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        state.in_flight = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard_with(cooldown: Duration) -> ActionGuard {
        let mut cooldowns = HashMap::new();
        for kind in ActionKind::ALL {
            cooldowns.insert(kind, cooldown);
        }
        ActionGuard::new(cooldowns)
    }

    #[test]
    fn second_admission_is_busy_until_release() {
        let guard = guard_with(Duration::ZERO);
        let permit = guard.admit(ActionKind::Start).expect("first admitted");
        // Any kind is refused while one is in flight, not just the same one.
        match guard.admit(ActionKind::Stop) {
            Err(GuardRejection::Busy) => {}
            other => panic!("expected Busy, got {:?}", other.map(|_| ())),
        }
        drop(permit);
        assert!(guard.admit(ActionKind::Stop).is_ok());
    }

    #[test]
    fn cooldown_refuses_with_remaining_wait() {
        let guard = guard_with(Duration::from_secs(10));
        drop(guard.admit(ActionKind::Stop).expect("admitted"));
        match guard.admit(ActionKind::Stop) {
            Err(GuardRejection::Cooldown { remaining }) => {
                assert!(remaining <= Duration::from_secs(10));
                assert!(remaining > Duration::from_secs(8));
            }
            other => panic!("expected Cooldown, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn cooldowns_are_tracked_per_kind() {
        let guard = guard_with(Duration::from_secs(10));
        drop(guard.admit(ActionKind::Stop).expect("admitted"));
        // A different kind has its own record and is still admissible.
        assert!(guard.admit(ActionKind::Start).is_ok());
    }

    #[test]
    fn elapsed_cooldown_admits_again() {
        let guard = guard_with(Duration::from_millis(20));
        drop(guard.admit(ActionKind::Reboot).expect("admitted"));
        std::thread::sleep(Duration::from_millis(30));
        assert!(guard.admit(ActionKind::Reboot).is_ok());
    }

    #[test]
    fn transitioning_refuses_everything() {
        let guard = guard_with(Duration::ZERO);
        guard.note_task_state(true);
        for kind in ActionKind::ALL {
            assert_eq!(guard.check(kind), Err(GuardRejection::Transitioning));
        }
        guard.note_task_state(false);
        assert!(guard.check(ActionKind::Start).is_ok());
    }

    #[test]
    fn check_does_not_consume_admission() {
        let guard = guard_with(Duration::from_secs(10));
        assert!(guard.check(ActionKind::Start).is_ok());
        // check() must not record an attempt time.
        assert!(guard.admit(ActionKind::Start).is_ok());
    }

    #[test]
    fn permit_releases_on_panic() {
        let guard = guard_with(Duration::ZERO);
        let state = Arc::clone(&guard.state);
        let result = std::panic::catch_unwind(move || {
            let _permit = DispatchPermit { state };
            panic!("boom");
        });
        assert!(result.is_err());
        assert!(guard.admit(ActionKind::Start).is_ok());
    }

    #[test]
    fn rejection_messages_are_caller_visible() {
        assert_eq!(
            GuardRejection::Busy.to_string(),
            "another action is already in flight"
        );
        let msg = GuardRejection::Cooldown {
            remaining: Duration::from_secs(8),
        }
        .to_string();
        assert!(msg.contains("8s"));
    }
}
