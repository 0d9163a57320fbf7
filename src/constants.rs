//! Application-wide constants.
//!
//! Centralizes endpoints, timing windows, and configuration defaults.

use std::path::PathBuf;

// ── Provider endpoints ────────────────────────────────────────────
/// Default ConoHa region.
pub const DEFAULT_REGION: &str = "c3j1";

/// Keystone v3 identity endpoint for a region.
pub fn identity_endpoint(region: &str) -> String {
    format!("https://identity.{}.conoha.io/v3/auth/tokens", region)
}

/// Nova compute endpoint base for a region and tenant.
pub fn compute_endpoint(region: &str, tenant_id: &str) -> String {
    format!("https://compute.{}.conoha.io/v2.1/{}", region, tenant_id)
}

// ── Timing ────────────────────────────────────────────────────────
/// HTTP request timeout for auth and status reads (seconds).
pub const HTTP_TIMEOUT_SECS: u64 = 10;
/// Default cooldown between admitted attempts of the same action (seconds).
pub const DEFAULT_COOLDOWN_SECS: u64 = 10;
/// Pause between status polls while reconciling (seconds).
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
/// Deadline for a reconciliation loop (seconds). The VPS plus the game
/// server it hosts take 5-7 minutes to come up after a power-on.
pub const DEFAULT_RECONCILE_TIMEOUT_SECS: u64 = 360;
/// Floor for configured poll intervals (seconds).
pub const MIN_POLL_INTERVAL_SECS: u64 = 1;
/// How long to wait for in-flight webhook posts before exiting (seconds).
pub const NOTIFY_FLUSH_TIMEOUT_SECS: u64 = 3;

// ── Capacities ────────────────────────────────────────────────────
/// Maximum session log entries to retain.
pub const MAX_LOG_ENTRIES: usize = 20;
/// Maximum response-body characters kept in a rejection detail.
pub const REJECTION_DETAIL_LEN: usize = 300;

// ── Paths ─────────────────────────────────────────────────────────

/// Returns the user's home directory, falling back to /tmp.
pub fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string()))
}

/// Returns `~/.config/vpsctl/`.
pub fn config_dir() -> PathBuf {
    home_dir().join(".config").join("vpsctl")
}

/// Returns `~/.config/vpsctl/config.toml`.
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Returns `~/.config/vpsctl/.env` (API credentials, never committed).
pub fn env_file_path() -> PathBuf {
    config_dir().join(".env")
}
