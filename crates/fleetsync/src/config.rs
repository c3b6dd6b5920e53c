//! Merge the config file, the selected profile and command-line flags
//! into ready-to-use client and engine settings.

use secrecy::SecretString;
use url::Url;

use fleetsync_api::TransportConfig;
use fleetsync_config::{Config, Profile};
use fleetsync_core::EngineConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Everything a command needs to talk to a server.
#[derive(Debug)]
pub struct Settings {
    pub profile_name: String,
    pub base_url: Url,
    pub transport: TransportConfig,
    pub engine: EngineConfig,
}

/// Resolve the active profile name: `--profile`, then `default_profile`.
pub fn active_profile_name(global: &GlobalOpts, cfg: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| cfg.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

pub fn resolve_settings(global: &GlobalOpts) -> Result<Settings, CliError> {
    let cfg = fleetsync_config::load_config()?;
    resolve_with(global, &cfg)
}

fn resolve_with(global: &GlobalOpts, cfg: &Config) -> Result<Settings, CliError> {
    let profile_name = active_profile_name(global, cfg);

    let mut profile = match cfg.profiles.get(&profile_name) {
        Some(profile) => profile.clone(),
        // Naming a profile that doesn't exist is an error; the implicit
        // default may be absent when everything comes from flags.
        None if global.profile.is_some() => {
            let mut available: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
            available.sort_unstable();
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
                path: fleetsync_config::config_path().display().to_string(),
            });
        }
        None => Profile::default(),
    };

    // ── Flag overrides ──
    if let Some(ref server) = global.server {
        profile.server.clone_from(server);
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }

    if profile.server.trim().is_empty() {
        return Err(CliError::NoConfig {
            path: fleetsync_config::config_path().display().to_string(),
        });
    }

    let base_url = fleetsync_config::profile_server_url(&profile)?;
    let token = match global.token {
        Some(ref token) => Some(SecretString::from(token.clone())),
        None => fleetsync_config::resolve_token(&profile, &profile_name)?,
    };
    let transport = fleetsync_config::profile_to_transport_config(&profile, &cfg.defaults, token);
    let engine = fleetsync_config::profile_to_engine_config(&profile, &cfg.defaults);

    tracing::debug!(profile = %profile_name, server = %base_url, "settings resolved");
    Ok(Settings {
        profile_name,
        base_url,
        transport,
        engine,
    })
}
