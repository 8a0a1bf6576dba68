//! Shared configuration for Opsview clients.
//!
//! TOML profiles, password resolution (env + keyring + plaintext),
//! and translation to `opsview_api::ClientConfig`.

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
use tracing::debug;

use opsview_api::{ClientConfig, TlsMode, TransportConfig};

/// Service name under which passwords are stored in the system keyring.
pub const KEYRING_SERVICE: &str = "opsview";

const ENV_PREFIX: &str = "OPSVIEW_";
const USERNAME_ENV: &str = "OPSVIEW_USERNAME";
const PASSWORD_ENV: &str = "OPSVIEW_PASSWORD";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no profile named '{name}'")]
    UnknownProfile { name: String },

    #[error("no credentials configured for profile '{profile}'")]
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
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named.
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

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default)]
    pub insecure: bool,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            insecure: false,
            timeout: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

/// A named Opsview server profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    /// Server root (e.g., "https://opsview.example.com/").
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Plaintext password, prefer `password_env` or the keyring.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Environment variable holding the password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,

    /// Path to a custom CA certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl Config {
    /// Look up a profile by name, or the default profile when `name` is `None`.
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get_key_value(name)
            .map(|(key, profile)| (key.as_str(), profile))
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }

    /// Build a `ClientConfig` for a profile, applying global defaults.
    pub fn client_config(&self, name: Option<&str>) -> Result<ClientConfig, ConfigError> {
        let (name, profile) = self.profile(name)?;
        profile_to_client_config(profile, name, &self.defaults)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "opsview", "opsview").map_or_else(
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
    p.push("opsview");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config from `path` + environment. A missing file yields defaults.
///
/// Environment keys nest on `__`, e.g. `OPSVIEW_DEFAULTS__TIMEOUT=60`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if it cannot be read.
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

/// Resolve the login username: the profile's, else `OPSVIEW_USERNAME`.
pub fn resolve_username(profile: &Profile, profile_name: &str) -> Result<String, ConfigError> {
    resolve_username_with(profile, profile_name, |var| std::env::var(var).ok())
}

fn resolve_username_with(
    profile: &Profile,
    profile_name: &str,
    env: impl Fn(&str) -> Option<String>,
) -> Result<String, ConfigError> {
    profile
        .username
        .clone()
        .or_else(|| env(USERNAME_ENV))
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })
}

/// Resolve the password from the credential chain.
///
/// Order: the profile's `password_env`, `OPSVIEW_PASSWORD`, the system
/// keyring (`opsview` / `{profile}/password`), then plaintext.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    resolve_password_with(
        profile,
        profile_name,
        |var| std::env::var(var).ok(),
        keyring_password,
    )
}

fn keyring_password(profile_name: &str) -> Option<String> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password"))
        .and_then(|entry| entry.get_password())
        .ok()
}

fn resolve_password_with(
    profile: &Profile,
    profile_name: &str,
    env: impl Fn(&str) -> Option<String>,
    keyring: impl Fn(&str) -> Option<String>,
) -> Result<SecretString, ConfigError> {
    // 1. Profile's password_env → env var lookup
    if let Some(pw) = profile.password_env.as_deref().and_then(&env) {
        return Ok(SecretString::from(pw));
    }

    // 2. Global env var
    if let Some(pw) = env(PASSWORD_ENV) {
        return Ok(SecretString::from(pw));
    }

    // 3. System keyring
    if let Some(pw) = keyring(profile_name) {
        debug!(profile = profile_name, "password from keyring");
        return Ok(SecretString::from(pw));
    }

    // 4. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store a password in the system keyring for `profile_name`.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password"))
        .and_then(|entry| entry.set_password(password))
        .map_err(|e| ConfigError::Validation {
            field: "keyring".into(),
            reason: e.to_string(),
        })
}

/// Build a `ClientConfig` from a profile and the global defaults.
pub fn profile_to_client_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<ClientConfig, ConfigError> {
    let username = resolve_username(profile, profile_name)?;
    let password = resolve_password(profile, profile_name)?;
    build_client_config(profile, defaults, username, password)
}

fn build_client_config(
    profile: &Profile,
    defaults: &Defaults,
    username: String,
    password: SecretString,
) -> Result<ClientConfig, ConfigError> {
    let base_url: url::Url = profile.url.parse().map_err(|_| ConfigError::Validation {
        field: "url".into(),
        reason: format!("invalid URL: {}", profile.url),
    })?;

    let tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsMode::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsMode::CustomCa(ca_path.clone())
    } else {
        TlsMode::System
    };

    let timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));

    Ok(ClientConfig {
        base_url,
        username,
        password,
        transport: TransportConfig {
            tls,
            timeout,
            cookie_jar: None,
        },
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn profile() -> Profile {
        Profile {
            url: "https://opsview.example.com".into(),
            username: Some("admin".into()),
            password: Some("plain".into()),
            ..Profile::default()
        }
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn loads_profiles_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_profile = "prod"

[defaults]
timeout = 10

[profiles.prod]
url = "https://opsview.example.com/"
username = "admin"
password_env = "PROD_OPSVIEW_PW"
insecure = true
"#,
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.default_profile.as_deref(), Some("prod"));
        assert_eq!(config.defaults.timeout, 10);
        assert!(!config.defaults.insecure);

        let (name, prod) = config.profile(None).unwrap();
        assert_eq!(name, "prod");
        assert_eq!(prod.password_env.as_deref(), Some("PROD_OPSVIEW_PW"));
        assert_eq!(prod.insecure, Some(true));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.default_profile.as_deref(), Some("default"));
        assert_eq!(config.defaults, Defaults::default());
        assert!(config.profiles.is_empty());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.profiles.insert("default".into(), profile());
        save_config_to(&config, &path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(!written.contains("password_env"), "{written}");
        assert_eq!(load_config_from(&path).unwrap(), config);
    }

    #[test]
    fn unknown_profile_is_reported() {
        let config = Config::default();
        match config.profile(Some("staging")) {
            Err(ConfigError::UnknownProfile { name }) => assert_eq!(name, "staging"),
            other => panic!("expected UnknownProfile, got {other:?}"),
        }
    }

    #[test]
    fn password_chain_order() {
        let mut p = profile();
        p.password_env = Some("MY_PW".into());

        let env = |var: &str| match var {
            "MY_PW" => Some("from-profile-env".to_owned()),
            PASSWORD_ENV => Some("from-global-env".to_owned()),
            _ => None,
        };
        let keyring = |_: &str| Some("from-keyring".to_owned());

        let pw = resolve_password_with(&p, "default", env, keyring).unwrap();
        assert_eq!(pw.expose_secret(), "from-profile-env");

        p.password_env = None;
        let pw = resolve_password_with(&p, "default", env, keyring).unwrap();
        assert_eq!(pw.expose_secret(), "from-global-env");

        let pw = resolve_password_with(&p, "default", no_env, keyring).unwrap();
        assert_eq!(pw.expose_secret(), "from-keyring");

        let pw = resolve_password_with(&p, "default", no_env, no_env).unwrap();
        assert_eq!(pw.expose_secret(), "plain");

        p.password = None;
        let err = resolve_password_with(&p, "default", no_env, no_env).unwrap_err();
        assert!(matches!(err, ConfigError::NoCredentials { .. }));
    }

    #[test]
    fn username_falls_back_to_env() {
        let mut p = profile();
        p.username = None;
        let env = |var: &str| (var == USERNAME_ENV).then(|| "ops".to_owned());
        assert_eq!(resolve_username_with(&p, "default", env).unwrap(), "ops");
        assert!(resolve_username_with(&p, "default", no_env).is_err());
    }

    #[test]
    fn client_config_applies_defaults_and_tls() {
        let defaults = Defaults {
            insecure: false,
            timeout: 12,
        };
        let mut p = profile();

        let config = build_client_config(&p, &defaults, "admin".into(), "pw".to_string().into())
            .unwrap();
        assert_eq!(config.base_url.as_str(), "https://opsview.example.com/");
        assert_eq!(config.transport.timeout, Duration::from_secs(12));
        assert!(matches!(config.transport.tls, TlsMode::System));

        p.ca_cert = Some(PathBuf::from("/etc/ssl/opsview.pem"));
        p.timeout = Some(5);
        let config = build_client_config(&p, &defaults, "admin".into(), "pw".to_string().into())
            .unwrap();
        assert!(matches!(config.transport.tls, TlsMode::CustomCa(_)));
        assert_eq!(config.transport.timeout, Duration::from_secs(5));

        let insecure = Defaults {
            insecure: true,
            ..defaults
        };
        let config = build_client_config(&p, &insecure, "admin".into(), "pw".to_string().into())
            .unwrap();
        assert!(matches!(config.transport.tls, TlsMode::DangerAcceptInvalid));
    }

    #[test]
    fn client_config_rejects_bad_url() {
        let mut p = profile();
        p.url = "not a url".into();
        let err = build_client_config(&p, &Defaults::default(), "a".into(), "b".to_string().into())
            .unwrap_err();
        match err {
            ConfigError::Validation { field, .. } => assert_eq!(field, "url"),
            other => panic!("expected Validation, got {other:?}"),
        }
    }
}
