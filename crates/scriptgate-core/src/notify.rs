//! Best-effort push notifications through an ntfy room.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyEvent {
    AuthFailure { attempts: u64, peer: Option<String> },
    ScriptFailed { script: String, exit_code: Option<i32> },
}

impl NotifyEvent {
    pub fn title(&self) -> &'static str {
        match self {
            Self::AuthFailure { .. } => "scriptgate: authentication failure",
            Self::ScriptFailed { .. } => "scriptgate: script failed",
        }
    }

    fn tags(&self) -> &'static str {
        match self {
            Self::AuthFailure { .. } => "warning,lock",
            Self::ScriptFailed { .. } => "x",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::AuthFailure { attempts, peer } => match peer {
                Some(peer) => format!("Rejected credential from {} (attempt {})", peer, attempts),
                None => format!("Rejected credential (attempt {})", attempts),
            },
            Self::ScriptFailed { script, exit_code } => match exit_code {
                Some(code) => format!("{} exited with return code {}", script, code),
                None => format!("{} was terminated by a signal", script),
            },
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &NotifyEvent) -> Result<()>;
}

/// Publishes events to `https://ntfy.sh/<room>`, or to the target itself
/// when it is already a full URL.
#[derive(Debug, Clone)]
pub struct NtfyNotifier {
    client: reqwest::Client,
    url: String,
}

impl NtfyNotifier {
    pub const DEFAULT_SERVER: &'static str = "https://ntfy.sh";

    pub fn new(target: &str) -> Result<Self> {
        let url = topic_url(target)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build ntfy HTTP client")?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Notifier for NtfyNotifier {
    async fn notify(&self, event: &NotifyEvent) -> Result<()> {
        self.client
            .post(&self.url)
            .header("Title", event.title())
            .header("Tags", event.tags())
            .body(event.message())
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.url))?
            .error_for_status()
            .with_context(|| format!("ntfy rejected notification at {}", self.url))?;
        debug!(url = %self.url, "Notification delivered");
        Ok(())
    }
}

fn topic_url(target: &str) -> Result<String> {
    let target = target.trim().trim_end_matches('/');
    if target.is_empty() {
        return Err(anyhow!("ntfy room must not be empty"));
    }
    if target.starts_with("http://") || target.starts_with("https://") {
        return Ok(target.to_string());
    }
    if target.contains('/') {
        return Err(anyhow!("Invalid ntfy room: {}", target));
    }
    Ok(format!("{}/{}", NtfyNotifier::DEFAULT_SERVER, target))
}

/// Sends `event` on a background task; delivery failures are only logged.
pub fn spawn_notification(notifier: Option<&Arc<dyn Notifier>>, event: NotifyEvent) {
    let Some(notifier) = notifier.cloned() else {
        return;
    };
    tokio::spawn(async move {
        if let Err(err) = notifier.notify(&event).await {
            warn!(error = %err, "Failed to deliver notification");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_room_name_expands_to_public_server() {
        assert_eq!(topic_url("ops-alerts").unwrap(), "https://ntfy.sh/ops-alerts");
        assert_eq!(topic_url(" ops-alerts ").unwrap(), "https://ntfy.sh/ops-alerts");
    }

    #[test]
    fn test_full_url_is_kept() {
        assert_eq!(
            topic_url("https://ntfy.example.com/room/").unwrap(),
            "https://ntfy.example.com/room"
        );
    }

    #[test]
    fn test_invalid_rooms() {
        assert!(topic_url("").is_err());
        assert!(topic_url("a/b").is_err());
    }

    #[test]
    fn test_messages_carry_details() {
        let failed = NotifyEvent::ScriptFailed {
            script: "deploy.sh".to_string(),
            exit_code: Some(7),
        };
        assert!(failed.message().contains("deploy.sh"));
        assert!(failed.message().contains('7'));

        let auth = NotifyEvent::AuthFailure {
            attempts: 2,
            peer: Some("10.0.0.9:5123".to_string()),
        };
        assert!(auth.message().contains("10.0.0.9"));
    }

    #[derive(Default)]
    struct Collect(Mutex<Vec<NotifyEvent>>);

    #[async_trait]
    impl Notifier for Collect {
        async fn notify(&self, event: &NotifyEvent) -> Result<()> {
            self.0.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_spawned_notification_is_delivered() {
        let collect = Arc::new(Collect::default());
        let notifier: Arc<dyn Notifier> = collect.clone();
        let event = NotifyEvent::AuthFailure {
            attempts: 1,
            peer: None,
        };

        spawn_notification(Some(&notifier), event.clone());
        for _ in 0..50 {
            if !collect.0.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(*collect.0.lock().unwrap(), vec![event]);
    }
}
