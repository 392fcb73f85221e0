use crate::config::ServerConfig;
use scriptgate_core::{
    AuthGate, CredentialGuard, ExecutionLimiter, Notifier, NtfyNotifier, ProcessStreamer,
    ScriptResolver,
};
use std::sync::Arc;
use tracing::info;

/// Everything a request handler needs, built once at startup.
pub struct Gateway {
    pub auth: AuthGate,
    pub resolver: ScriptResolver,
    pub streamer: ProcessStreamer,
    pub limiter: ExecutionLimiter,
    pub notifier: Option<Arc<dyn Notifier>>,
}

impl Gateway {
    pub fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        let guard = Arc::new(CredentialGuard::new(config.lockout));
        let notifier = match config.ntfy.as_deref() {
            Some(target) => {
                let ntfy = NtfyNotifier::new(target)?;
                info!(url = ntfy.url(), "ntfy notifications enabled");
                Some(Arc::new(ntfy) as Arc<dyn Notifier>)
            }
            None => None,
        };
        Ok(Self::with_guard(config, guard, notifier))
    }

    pub fn with_guard(
        config: &ServerConfig,
        guard: Arc<CredentialGuard>,
        notifier: Option<Arc<dyn Notifier>>,
    ) -> Self {
        Self {
            auth: AuthGate::new(config.auth_password.as_deref(), guard),
            resolver: ScriptResolver::new(&config.scripts_folder),
            streamer: ProcessStreamer::new(&config.shell),
            limiter: ExecutionLimiter::new(config.max_concurrent),
            notifier,
        }
    }
}

/// Application state shared across all API handlers
pub type AppState = Arc<Gateway>;
