//! Profile configuration for the ehmi panel.
//!
//! TOML profiles, client key resolution (env + keyring + plaintext), and
//! translation to `ehmi_core::SessionConfig`. The panel layers its CLI
//! flags on top of what this crate resolves.

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

use ehmi_core::{SessionConfig, StateTransport, TlsVerification};

/// Keyring service name; entries are keyed `{profile}/client-key`.
pub const KEYRING_SERVICE: &str = "ehmi";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no client key configured for profile '{profile}'")]
    NoClientKey { profile: String },

    #[error("profile '{profile}' not found in {}", .path.display())]
    UnknownProfile { profile: String, path: PathBuf },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named HMI service profiles.
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

/// State notification transport as written in the config file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Websocket,
    Poll,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default)]
    pub insecure: bool,

    /// Request timeout (seconds).
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// How long action calls wait for completion (seconds).
    #[serde(default = "default_action_wait")]
    pub action_wait: u64,

    #[serde(default)]
    pub transport: TransportKind,

    /// Poll interval for `transport = "poll"` (seconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            insecure: false,
            timeout: default_timeout(),
            action_wait: default_action_wait(),
            transport: TransportKind::default(),
            poll_interval: default_poll_interval(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}
fn default_action_wait() -> u64 {
    30
}
fn default_poll_interval() -> u64 {
    2
}

/// Panel color overrides: any name or `#rrggbb` the terminal theme accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Colors {
    pub bg: Option<String>,
    pub fg: Option<String>,
}

/// A named HMI service profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// HMI service base URL (e.g., "https://plant.local:7727").
    pub url: String,

    /// Client key (plaintext -- prefer keyring or env var).
    pub client_key: Option<String>,

    /// Environment variable name containing the client key.
    pub client_key_env: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout.
    pub timeout: Option<u64>,

    /// Override transport.
    pub transport: Option<TransportKind>,

    /// Override poll interval.
    pub poll_interval: Option<u64>,

    #[serde(default)]
    pub colors: Colors,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "ehmi", "ehmi").map_or_else(
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
    p.push("ehmi");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the Config from `path` + environment. A missing file is not an
/// error; defaults apply.
///
/// Environment keys use `__` as the nesting separator, e.g.
/// `EHMI_DEFAULTS__TIMEOUT=10` or `EHMI_PROFILES__PLANT__URL=...`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("EHMI_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

impl Config {
    /// Pick `name`, else `default_profile`, else `"default"`.
    pub fn profile(&self, name: Option<&str>) -> Result<(String, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get(name)
            .map(|p| (name.to_owned(), p))
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.to_owned(),
                path: config_path(),
            })
    }
}

// ── Client key resolution ───────────────────────────────────────────

/// Resolve the client key from the credential chain (no CLI flag step).
pub fn resolve_client_key(
    profile: &Profile,
    profile_name: &str,
) -> Result<SecretString, ConfigError> {
    // 1. Profile's client_key_env → env var lookup
    if let Some(ref env_name) = profile.client_key_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/client-key"))
    {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(ref key) = profile.client_key {
        return Ok(SecretString::from(key.clone()));
    }

    Err(ConfigError::NoClientKey {
        profile: profile_name.into(),
    })
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `SessionConfig` from a profile plus global defaults.
pub fn profile_to_session_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
    client_key: SecretString,
) -> Result<SessionConfig, ConfigError> {
    let url: url::Url = profile.url.parse().map_err(|_| ConfigError::Validation {
        field: "url".into(),
        reason: format!("invalid URL: {}", profile.url),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation {
            field: "url".into(),
            reason: format!("expected http or https, got '{}'", url.scheme()),
        });
    }

    let tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    let poll_secs = profile.poll_interval.unwrap_or(defaults.poll_interval);
    let transport = match profile.transport.unwrap_or(defaults.transport) {
        TransportKind::Websocket => StateTransport::WebSocket,
        TransportKind::Poll if poll_secs == 0 => {
            return Err(ConfigError::Validation {
                field: "poll_interval".into(),
                reason: format!("must be at least 1 second (profile '{profile_name}')"),
            });
        }
        TransportKind::Poll => StateTransport::Poll {
            interval: Duration::from_secs(poll_secs),
        },
    };

    let mut config = SessionConfig::new(url, client_key);
    config.tls = tls;
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.action_wait = Duration::from_secs(defaults.action_wait);
    config.transport = transport;
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        std::fs::write(file.path(), contents).unwrap();
        file
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("default"));
        assert_eq!(cfg.defaults.timeout, 30);
        assert_eq!(cfg.defaults.transport, TransportKind::Websocket);
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn profiles_load_from_toml() {
        let file = write_config(
            r##"
default_profile = "plant"

[defaults]
transport = "poll"
poll_interval = 5

[profiles.plant]
url = "https://plant.local:7727"
client_key = "panel-7"
colors = { bg = "black", fg = "#00ff00" }
"##,
        );
        let cfg = load_config_from(file.path()).unwrap();
        let (name, profile) = cfg.profile(None).unwrap();
        assert_eq!(name, "plant");
        assert_eq!(profile.colors.fg.as_deref(), Some("#00ff00"));

        let key = resolve_client_key(profile, &name).unwrap();
        let session = profile_to_session_config(profile, &name, &cfg.defaults, key).unwrap();
        assert_eq!(session.url.as_str(), "https://plant.local:7727/");
        assert_eq!(session.client_key.expose_secret(), "panel-7");
        assert_eq!(
            session.transport,
            StateTransport::Poll {
                interval: Duration::from_secs(5)
            }
        );
        assert_eq!(session.tls, TlsVerification::SystemDefaults);
    }

    #[test]
    fn serialized_config_round_trips_through_the_loader() {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "default".into(),
            Profile {
                url: "http://10.0.0.5:7727".into(),
                insecure: Some(true),
                ..Profile::default()
            },
        );
        let file = write_config(&toml::to_string_pretty(&cfg).unwrap());
        let loaded = load_config_from(file.path()).unwrap();
        let (_, profile) = loaded.profile(Some("default")).unwrap();
        assert_eq!(profile.url, "http://10.0.0.5:7727");
        assert_eq!(profile.insecure, Some(true));
    }

    #[test]
    fn unknown_profile_is_an_error() {
        let cfg = Config::default();
        assert!(matches!(
            cfg.profile(Some("missing")),
            Err(ConfigError::UnknownProfile { ref profile, .. }) if profile == "missing"
        ));
    }

    #[test]
    fn no_client_key_anywhere() {
        let profile = Profile {
            url: "https://plant.local".into(),
            client_key_env: Some("EHMI_TEST_KEY_THAT_IS_NEVER_SET".into()),
            ..Profile::default()
        };
        assert!(matches!(
            resolve_client_key(&profile, "ehmi-test-no-key"),
            Err(ConfigError::NoClientKey { .. })
        ));
    }

    #[test]
    fn insecure_and_ca_cert_select_tls_mode() {
        let defaults = Defaults::default();
        let mut profile = Profile {
            url: "https://plant.local".into(),
            ca_cert: Some(PathBuf::from("/etc/ehmi/ca.pem")),
            ..Profile::default()
        };
        let key = || SecretString::from("k".to_string());

        let cfg = profile_to_session_config(&profile, "p", &defaults, key()).unwrap();
        assert_eq!(cfg.tls, TlsVerification::CustomCa(PathBuf::from("/etc/ehmi/ca.pem")));

        profile.insecure = Some(true);
        let cfg = profile_to_session_config(&profile, "p", &defaults, key()).unwrap();
        assert_eq!(cfg.tls, TlsVerification::DangerAcceptInvalid);
    }

    #[test]
    fn bad_url_and_zero_poll_interval_are_rejected() {
        let defaults = Defaults::default();
        let key = || SecretString::from("k".to_string());

        let profile = Profile {
            url: "ftp://plant.local".into(),
            ..Profile::default()
        };
        assert!(profile_to_session_config(&profile, "p", &defaults, key()).is_err());

        let profile = Profile {
            url: "https://plant.local".into(),
            transport: Some(TransportKind::Poll),
            poll_interval: Some(0),
            ..Profile::default()
        };
        assert!(matches!(
            profile_to_session_config(&profile, "p", &defaults, key()),
            Err(ConfigError::Validation { ref field, .. }) if field == "poll_interval"
        ));
    }
}
