//! Runtime settings loaded via OrthoConfig.
//!
//! Values come from CLI flags, `MO_INIT_*` environment variables or a
//! configuration file. [`InitialiserSettings::resolve`] turns the raw layer
//! into validated [`RunSettings`].

use std::path::PathBuf;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;
use url::Url;
use zeroize::Zeroizing;

const DEFAULT_CLIENT_ID: &str = "dipex";
const DEFAULT_AUTH_REALM: &str = "mo";
const DEFAULT_GRAPHQL_PATH: &str = "graphql/v22";
const DEFAULT_CONFIG_FILE: &str = "/config/config.yml";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Raw settings as layered by OrthoConfig.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "MO_INIT")]
pub struct InitialiserSettings {
    /// Keycloak base URL.
    pub auth_server: Option<String>,
    /// OS2mo base URL.
    pub mo_url: Option<String>,
    /// OAuth2 client identifier.
    pub client_id: Option<String>,
    /// OAuth2 client secret.
    pub client_secret: Option<String>,
    /// Keycloak realm.
    pub auth_realm: Option<String>,
    /// GraphQL endpoint path relative to `mo_url`.
    pub graphql_path: Option<String>,
    /// Path to the desired-state YAML document.
    pub config_file: Option<PathBuf>,
    /// Per-request timeout in seconds.
    #[ortho_config(default = 30)]
    pub request_timeout_seconds: u64,
    /// Tracing filter directive.
    pub log_level: Option<String>,
}

/// Problems found while resolving [`InitialiserSettings`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    /// A required setting has no value.
    #[error("missing required setting `{name}`")]
    Missing {
        /// Setting name.
        name: &'static str,
    },
    /// A URL setting does not parse as an absolute URL.
    #[error("setting `{name}` is not a valid URL: {message}")]
    InvalidUrl {
        /// Setting name.
        name: &'static str,
        /// Parser message.
        message: String,
    },
    /// The request timeout is zero.
    #[error("setting `request_timeout_seconds` must be greater than zero")]
    ZeroTimeout,
}

/// Validated settings for one run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Keycloak base URL.
    pub auth_server: Url,
    /// Full GraphQL endpoint URL.
    pub graphql_url: Url,
    /// OAuth2 client identifier.
    pub client_id: String,
    /// OAuth2 client secret.
    pub client_secret: Zeroizing<String>,
    /// Keycloak realm.
    pub auth_realm: String,
    /// Desired-state document path.
    pub config_file: PathBuf,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Tracing filter directive.
    pub log_level: String,
}

impl InitialiserSettings {
    /// Return the configured client identifier, falling back to the default.
    pub fn client_id(&self) -> &str {
        self.client_id.as_deref().unwrap_or(DEFAULT_CLIENT_ID)
    }

    /// Return the configured realm, falling back to the default.
    pub fn auth_realm(&self) -> &str {
        self.auth_realm.as_deref().unwrap_or(DEFAULT_AUTH_REALM)
    }

    /// Return the configured GraphQL path, falling back to the default.
    pub fn graphql_path(&self) -> &str {
        self.graphql_path.as_deref().unwrap_or(DEFAULT_GRAPHQL_PATH)
    }

    /// Return the configured document path, falling back to the default.
    pub fn config_file(&self) -> PathBuf {
        self.config_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Return the configured log level, falling back to `info`.
    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    /// Validate the settings and fill in defaults.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] when a required value is missing, a URL is
    /// malformed or the timeout is zero.
    pub fn resolve(&self) -> Result<RunSettings, SettingsError> {
        let auth_server = parse_url("auth_server", self.auth_server.as_deref())?;
        let mo_url = parse_url("mo_url", self.mo_url.as_deref())?;
        let client_secret = self
            .client_secret
            .as_deref()
            .filter(|secret| !secret.is_empty())
            .ok_or(SettingsError::Missing {
                name: "client_secret",
            })?;
        let timeout_seconds = self.request_timeout_seconds;
        if timeout_seconds == 0 {
            return Err(SettingsError::ZeroTimeout);
        }

        Ok(RunSettings {
            auth_server,
            graphql_url: join_path(&mo_url, self.graphql_path())?,
            client_id: self.client_id().to_owned(),
            client_secret: Zeroizing::new(client_secret.to_owned()),
            auth_realm: self.auth_realm().to_owned(),
            config_file: self.config_file(),
            request_timeout: Duration::from_secs(timeout_seconds),
            log_level: self.log_level().to_owned(),
        })
    }
}

fn parse_url(name: &'static str, raw: Option<&str>) -> Result<Url, SettingsError> {
    let raw = raw
        .filter(|value| !value.is_empty())
        .ok_or(SettingsError::Missing { name })?;
    Url::parse(raw).map_err(|error| SettingsError::InvalidUrl {
        name,
        message: error.to_string(),
    })
}

/// Append `path` to `base` regardless of whether `base` ends in a slash.
fn join_path(base: &Url, path: &str) -> Result<Url, SettingsError> {
    let mut root = base.clone();
    if !root.path().ends_with('/') {
        let with_slash = format!("{}/", root.path());
        root.set_path(&with_slash);
    }
    root.join(path.trim_start_matches('/'))
        .map_err(|error| SettingsError::InvalidUrl {
            name: "graphql_path",
            message: error.to_string(),
        })
}
