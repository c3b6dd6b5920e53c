//! Shared configuration for fleetsync tools.
//!
//! TOML profiles, token resolution (env + keyring + plaintext), and
//! translation into the REST transport settings and the sync engine's
//! `EngineConfig`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use fleetsync_api::{TlsMode, TransportConfig};
use fleetsync_core::{AlertPreferences, EngineConfig};

/// Keyring service name; entries are keyed `{profile}/token`.
pub const KEYRING_SERVICE: &str = "fleetsync";

/// Prefix of environment overrides (`FLEETSYNC_DEFAULTS_TIMEOUT=10`).
pub const ENV_PREFIX: &str = "FLEETSYNC_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    UnknownProfile { name: String },

    #[error("no token configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named server profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up a profile by name, falling back to `default_profile`.
    pub fn profile(&self, name: Option<&str>) -> Result<(String, &Profile), ConfigError> {
        let name = name
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into());
        self.profiles
            .get(&name)
            .map(|p| (name.clone(), p))
            .ok_or(ConfigError::UnknownProfile { name })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default)]
    pub insecure: bool,

    /// HTTP timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Fallback-poll interval in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            insecure: false,
            timeout: default_timeout(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_poll_interval() -> u64 {
    fleetsync_core::config::DEFAULT_POLL_INTERVAL.as_secs()
}

/// A named server profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Server base URL (e.g. "https://fleet.example.com").
    pub server: String,

    /// API token (plaintext, prefer keyring or env var).
    pub token: Option<String>,

    /// Environment variable holding the token.
    pub token_env: Option<String>,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override the default TLS setting.
    pub insecure: Option<bool>,

    /// Override the default timeout.
    pub timeout: Option<u64>,

    /// Override the default poll interval.
    pub poll_interval_secs: Option<u64>,

    /// Event types that play the alarm sound.
    #[serde(default)]
    pub sound_events: Vec<String>,

    /// Alarm subtypes that play the alarm sound.
    #[serde(default)]
    pub sound_alarms: Vec<String>,

    /// Ignore server events entirely.
    #[serde(default)]
    pub disable_events: bool,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "fleetsync", "fleetsync").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("fleetsync");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file. A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("_"));

    let config: Config = figment.extract()?;
    tracing::debug!(path = %path.display(), profiles = config.profiles.len(), "config loaded");
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the profile's token: env var, then keyring, then plaintext.
///
/// `Ok(None)` means the profile is configured for anonymous or
/// cookie-based access.
pub fn resolve_token(
    profile: &Profile,
    profile_name: &str,
) -> Result<Option<SecretString>, ConfigError> {
    // 1. Profile's token_env → env var lookup
    if let Some(ref env_name) = profile.token_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(Some(SecretString::from(val)));
        }
        // Naming a variable that is unset is a misconfiguration.
        if profile.token.is_none() {
            return Err(ConfigError::NoCredentials {
                profile: profile_name.into(),
            });
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/token")) {
        if let Ok(secret) = entry.get_password() {
            return Ok(Some(SecretString::from(secret)));
        }
    }

    // 3. Plaintext in config
    Ok(profile.token.clone().map(SecretString::from))
}

// ── Translation ─────────────────────────────────────────────────────

/// Parse and check the profile's server URL.
pub fn profile_server_url(profile: &Profile) -> Result<Url, ConfigError> {
    let url: Url = profile.server.parse().map_err(|_| ConfigError::Validation {
        field: "server".into(),
        reason: format!("invalid URL: {}", profile.server),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation {
            field: "server".into(),
            reason: format!("expected http or https, got '{}'", url.scheme()),
        });
    }
    Ok(url)
}

/// Build REST/socket transport settings for a profile.
///
/// `token` is resolved by the caller (see [`resolve_token`]) so that a
/// command-line token can take precedence without touching the keyring.
pub fn profile_to_transport_config(
    profile: &Profile,
    defaults: &Defaults,
    token: Option<SecretString>,
) -> TransportConfig {
    let tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsMode::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsMode::CustomCa(ca_path.clone())
    } else {
        TlsMode::System
    };

    let transport = TransportConfig {
        tls,
        timeout: Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)),
        ..TransportConfig::default()
    }
    .with_cookie_jar();
    match token {
        Some(token) => transport.with_token(token),
        None => transport,
    }
}

/// Build the sync engine's settings for a profile.
pub fn profile_to_engine_config(profile: &Profile, defaults: &Defaults) -> EngineConfig {
    let poll_secs = profile
        .poll_interval_secs
        .unwrap_or(defaults.poll_interval_secs)
        .max(1);

    EngineConfig {
        poll_interval: Duration::from_secs(poll_secs),
        alerts: AlertPreferences {
            sound_events: profile.sound_events.clone(),
            sound_alarms: profile.sound_alarms.clone(),
            events_disabled: profile.disable_events,
        },
        ..EngineConfig::default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    const SAMPLE: &str = r#"
default_profile = "depot"

[defaults]
timeout = 15

[profiles.depot]
server = "https://fleet.example.com"
token = "plain-token"
poll_interval_secs = 20
sound_alarms = ["sos"]

[profiles.lab]
server = "http://10.0.0.5:8082"
insecure = true
disable_events = true
"#;

    #[test]
    fn loads_profiles_from_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("config.toml", SAMPLE)?;
            let config = load_config_from(Path::new("config.toml")).unwrap();

            assert_eq!(config.default_profile.as_deref(), Some("depot"));
            assert_eq!(config.defaults.timeout, 15);
            assert_eq!(config.defaults.output, "table");
            assert_eq!(config.profiles.len(), 2);

            let (name, profile) = config.profile(None).unwrap();
            assert_eq!(name, "depot");
            assert_eq!(profile.sound_alarms, vec!["sos"]);
            Ok(())
        });
    }

    #[test]
    fn env_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("FLEETSYNC_DEFAULTS_TIMEOUT", "5");
            let config = load_config_from(Path::new("missing.toml")).unwrap();
            assert_eq!(config.defaults.timeout, 5);
            assert!(config.profiles.is_empty());
            Ok(())
        });
    }

    #[test]
    fn unknown_profile_is_an_error() {
        let config = Config::default();
        assert!(matches!(
            config.profile(Some("nope")),
            Err(ConfigError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.profiles.insert(
            "default".into(),
            Profile {
                server: "https://fleet.example.com".into(),
                sound_events: vec!["geofenceEnter".into()],
                ..Profile::default()
            },
        );

        save_config_to(&config, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();

        let (_, profile) = loaded.profile(None).unwrap();
        assert_eq!(profile.server, "https://fleet.example.com");
        assert_eq!(profile.sound_events, vec!["geofenceEnter"]);
    }

    #[test]
    fn token_env_wins_over_plaintext() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("FLEETSYNC_TEST_TOKEN_ENV", "from-env");
            let profile = Profile {
                token: Some("plain".into()),
                token_env: Some("FLEETSYNC_TEST_TOKEN_ENV".into()),
                ..Profile::default()
            };
            let token = resolve_token(&profile, "jail-test").unwrap().unwrap();
            assert_eq!(token.expose_secret(), "from-env");
            Ok(())
        });
    }

    #[test]
    fn unset_token_env_without_fallback_fails() {
        let profile = Profile {
            token_env: Some("FLEETSYNC_TEST_DEFINITELY_UNSET".into()),
            ..Profile::default()
        };
        assert!(matches!(
            resolve_token(&profile, "unset-test"),
            Err(ConfigError::NoCredentials { .. })
        ));
    }

    #[test]
    fn server_url_must_be_http() {
        let profile = Profile {
            server: "ftp://fleet.example.com".into(),
            ..Profile::default()
        };
        assert!(matches!(
            profile_server_url(&profile),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn engine_config_from_profile() {
        let profile = Profile {
            poll_interval_secs: Some(20),
            sound_events: vec!["alarm".into()],
            disable_events: true,
            ..Profile::default()
        };
        let engine = profile_to_engine_config(&profile, &Defaults::default());

        assert_eq!(engine.poll_interval, Duration::from_secs(20));
        assert_eq!(engine.alerts.sound_events, vec!["alarm"]);
        assert!(engine.alerts.events_disabled);
        assert_eq!(engine.logout_close_code, 4000);
    }

    #[test]
    fn transport_config_from_profile() {
        let profile = Profile {
            insecure: Some(true),
            timeout: Some(7),
            ..Profile::default()
        };
        let transport = profile_to_transport_config(
            &profile,
            &Defaults::default(),
            Some(SecretString::from("t0k".to_owned())),
        );

        assert!(matches!(transport.tls, TlsMode::DangerAcceptInvalid));
        assert_eq!(transport.timeout, Duration::from_secs(7));
        assert!(transport.cookie_jar.is_some());
        assert_eq!(transport.authorization_header().as_deref(), Some("Bearer t0k"));
    }

    #[test]
    fn engine_config_uses_default_poll_interval() {
        let engine = profile_to_engine_config(&Profile::default(), &Defaults::default());
        assert_eq!(engine.poll_interval, Duration::from_secs(30));
    }
}
