//! Discord webhook notifications.
//!
//! Sends are spawned and their results ignored, so the controller never
//! depends on delivery. The spawned posts are tracked and flushed before
//! the process exits; a missing webhook URL disables notifications
//! entirely.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use tokio::task::JoinHandle;

/// Notification categories, each with its own emoji and embed color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyEvent {
    Success,
    Error,
    Warning,
    Info,
    /// Server start command.
    Start,
    /// Server stop command.
    Stop,
    /// Server reboot command.
    Restart,
}

impl NotifyEvent {
    fn emoji(&self) -> &'static str {
        match self {
            NotifyEvent::Success => "✅",
            NotifyEvent::Error => "❌",
            NotifyEvent::Warning => "⚠️",
            NotifyEvent::Info => "ℹ️",
            NotifyEvent::Start => "🟢",
            NotifyEvent::Stop => "🔴",
            NotifyEvent::Restart => "🔄",
        }
    }

    fn color(&self) -> u32 {
        match self {
            NotifyEvent::Success | NotifyEvent::Start => 0x00ff00,
            NotifyEvent::Error | NotifyEvent::Stop => 0xff0000,
            NotifyEvent::Warning => 0xffff00,
            NotifyEvent::Info => 0x0099ff,
            NotifyEvent::Restart => 0xffa500,
        }
    }
}

/// Build the Discord embed payload for an event.
pub fn build_embed(event: NotifyEvent, message: &str) -> Value {
    json!({
        "embeds": [{
            "title": format!("{} ARK server notice", event.emoji()),
            "description": message,
            "color": event.color(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "footer": { "text": "vpsctl" }
        }]
    })
}

/// Posts embeds to a Discord webhook.
#[derive(Clone)]
pub struct DiscordNotifier {
    webhook_url: String,
    client: Client,
    /// Spawned sends not yet known to have finished. Shared across clones
    /// so [`DiscordNotifier::flush`] sees every post, wherever it was fired.
    in_flight: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl DiscordNotifier {
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            client: Client::new(),
            in_flight: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Build a notifier from `DISCORD_WEBHOOK_URL`. Returns None when the
    /// variable is missing or empty (notifications disabled).
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("DISCORD_WEBHOOK_URL").ok()?;
        if url.is_empty() {
            return None;
        }
        Some(Self::new(url))
    }

    /// Spawn a send and move on; notification failures never affect the
    /// controller. The handle is retained so the post can be flushed
    /// before shutdown.
    pub fn fire(&self, event: NotifyEvent, message: &str) {
        let this = self.clone();
        let message = message.to_string();
        let handle = tokio::spawn(async move {
            let _ = this.send(event, &message).await;
        });
        self.in_flight
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(handle);
    }

    /// Wait for every spawned send to finish, up to `limit`. The runtime
    /// aborts outstanding tasks when `main` returns, which would drop the
    /// final notification of a short-lived invocation mid-flight.
    pub async fn flush(&self, limit: Duration) {
        let handles: Vec<JoinHandle<()>> = self
            .in_flight
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .drain(..)
            .collect();
        let _ = tokio::time::timeout(limit, async {
            for handle in handles {
                let _ = handle.await;
            }
        })
        .await;
    }

    /// Send one embed. Discord acknowledges webhook posts with 204.
    pub async fn send(&self, event: NotifyEvent, message: &str) -> Result<(), String> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&build_embed(event, message))
            .send()
            .await
            .map_err(|e| format!("webhook send failed: {}", e))?;

        if response.status().as_u16() == 204 {
            Ok(())
        } else {
            Err(format!("webhook returned status {}", response.status()))
        }
    }
}
