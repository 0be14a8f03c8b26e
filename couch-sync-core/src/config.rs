use std::time::Duration;

use tracing::{debug, info};

use crate::export::DEFAULT_PARALLELISM;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8091/pools";
pub const DEFAULT_VIEWS_PORT: u16 = 8092;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything needed to reach the cluster, resolved from flags, environment and profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub server_url: String,
    pub views_port: u16,
    pub timeout: Duration,
    pub parallelism: usize,
    pub admin: Option<Credentials>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            views_port: DEFAULT_VIEWS_PORT,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            parallelism: DEFAULT_PARALLELISM,
            admin: None,
        }
    }
}

impl ConnectionSettings {
    pub fn trace_loaded(&self) {
        info!(
            server_url = %self.server_url,
            views_port = self.views_port,
            timeout_secs = self.timeout.as_secs(),
            parallelism = self.parallelism,
            admin = self.admin.as_ref().map(|c| c.username.as_str()).unwrap_or("<none>"),
            "Loaded connection settings"
        );
        debug!(?self, "Connection settings (full debug)");
    }
}
