/// `load_config` module: loads the optional YAML connection profile and merges it with
/// command-line flags and environment variables into [`ConnectionSettings`].
///
/// The profile holds non-secret settings only. Credentials come from flags or the
/// environment (`COUCH_SYNC_USERNAME`, `COUCH_SYNC_PASSWORD`), never from the file.
///
/// Precedence, highest first: flag or environment variable, profile, built-in default.
///
/// # Errors
/// All errors use `anyhow::Error` and surface at the CLI boundary.
use anyhow::Result;
use couch_sync_core::config::{ConnectionSettings, Credentials};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info};

/// On-disk profile. Every key is optional; unknown keys are rejected.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionProfile {
    #[serde(default)]
    pub server_url: Option<String>,
    #[serde(default)]
    pub views_port: Option<u16>,
    #[serde(default)]
    pub parallelism: Option<usize>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Connection values given on the command line (or via their env vars).
#[derive(Debug, Default, Clone)]
pub struct ConnectionOverrides {
    pub server_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub parallelism: Option<usize>,
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ConnectionProfile> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading connection profile from file");

    let content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read connection profile");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    // An empty file is a valid, empty profile.
    if content.trim().is_empty() {
        return Ok(ConnectionProfile::default());
    }

    match serde_yaml::from_str::<ConnectionProfile>(&content) {
        Ok(profile) => {
            info!(config_path = ?path_ref, ?profile, "Parsed connection profile YAML successfully");
            Ok(profile)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse connection profile YAML");
            Err(anyhow::anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}

/// Merges overrides and profile over the defaults.
pub fn resolve_settings(
    profile: Option<&ConnectionProfile>,
    overrides: ConnectionOverrides,
) -> Result<ConnectionSettings> {
    let defaults = ConnectionSettings::default();
    let profile = profile.cloned().unwrap_or_default();

    let parallelism = overrides
        .parallelism
        .or(profile.parallelism)
        .unwrap_or(defaults.parallelism);
    if parallelism == 0 {
        anyhow::bail!("parallelism must be at least 1");
    }

    let admin = match (overrides.username, overrides.password) {
        (Some(username), Some(password)) => Some(Credentials { username, password }),
        (None, None) => None,
        (Some(_), None) => anyhow::bail!("a username was given without a password"),
        (None, Some(_)) => anyhow::bail!("a password was given without a username"),
    };

    Ok(ConnectionSettings {
        server_url: overrides
            .server_url
            .or(profile.server_url)
            .unwrap_or(defaults.server_url),
        views_port: profile.views_port.unwrap_or(defaults.views_port),
        timeout: profile
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout),
        parallelism,
        admin,
    })
}
