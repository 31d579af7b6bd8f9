//! Client configuration.
//!
//! Configuration is read from an optional TOML file and then overridden by
//! environment variables:
//!
//! - `WORKFLOW_DISPATCH_TOKEN`: API token (required if not in the file)
//! - `WORKFLOW_DISPATCH_HOST_PORT`: service address (default: `localhost:7070`)
//! - `WORKFLOW_DISPATCH_NAMESPACE`: namespace prepended to workflow names
//! - `WORKFLOW_DISPATCH_TLS`: `true` to connect over TLS

use std::path::Path;

use secrecy::SecretString;
use serde::Deserialize;

use crate::error::DispatchError;
use crate::retries::RetryConfig;

pub const ENV_TOKEN: &str = "WORKFLOW_DISPATCH_TOKEN";
pub const ENV_HOST_PORT: &str = "WORKFLOW_DISPATCH_HOST_PORT";
pub const ENV_NAMESPACE: &str = "WORKFLOW_DISPATCH_NAMESPACE";
pub const ENV_TLS: &str = "WORKFLOW_DISPATCH_TLS";

pub const DEFAULT_HOST_PORT: &str = "localhost:7070";
const DEFAULT_LISTENER_CAPACITY: usize = 64;

/// Resolved configuration of a dispatch client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host_port: String,
    pub token: SecretString,
    /// Normalized namespace: lowercase with a trailing `_`, or empty.
    pub namespace: String,
    pub tls: bool,
    pub retry: RetryConfig,
    /// Buffered events per observed run in the pooled listener.
    pub listener_capacity: usize,
}

/// On-disk form of [`ClientConfig`]. Every field is optional so that the
/// environment can fill in the rest.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ClientConfigFile {
    host_port: Option<String>,
    token: Option<SecretString>,
    namespace: Option<String>,
    tls: Option<bool>,
    #[serde(default)]
    retry: RetryConfig,
    listener_capacity: Option<usize>,
}

impl ClientConfig {
    /// Creates a configuration with defaults for everything but the token.
    pub fn new(token: impl Into<SecretString>) -> Self {
        Self {
            host_port: DEFAULT_HOST_PORT.to_string(),
            token: token.into(),
            namespace: String::new(),
            tls: false,
            retry: RetryConfig::default(),
            listener_capacity: DEFAULT_LISTENER_CAPACITY,
        }
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = normalize_namespace(namespace);
        self
    }

    pub fn with_host_port(mut self, host_port: impl Into<String>) -> Self {
        self.host_port = host_port.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Loads configuration from the process environment only.
    pub fn from_env() -> Result<Self, DispatchError> {
        Self::resolve(ClientConfigFile::default(), |key| std::env::var(key).ok())
    }

    /// Loads configuration from a TOML file, with environment overrides.
    pub fn from_toml_file(path: &Path) -> Result<Self, DispatchError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            DispatchError::Config(format!("Failed to read `{}`: {e}", path.display()))
        })?;
        Self::from_toml_str(&contents, |key| std::env::var(key).ok())
    }

    /// Parses TOML `contents`, looking up overrides with `env`.
    pub fn from_toml_str(
        contents: &str,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, DispatchError> {
        let file: ClientConfigFile = toml::from_str(contents)
            .map_err(|e| DispatchError::Config(format!("Invalid configuration: {e}")))?;
        Self::resolve(file, env)
    }

    fn resolve(
        file: ClientConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, DispatchError> {
        let token = match env(ENV_TOKEN) {
            Some(token) => SecretString::from(token),
            None => file.token.ok_or_else(|| {
                DispatchError::Config(format!("Missing API token: set `token` or `{ENV_TOKEN}`"))
            })?,
        };
        let tls = match env(ENV_TLS) {
            Some(value) => parse_bool(ENV_TLS, &value)?,
            None => file.tls.unwrap_or(false),
        };
        let namespace = env(ENV_NAMESPACE).or(file.namespace).unwrap_or_default();

        Ok(Self {
            host_port: env(ENV_HOST_PORT)
                .or(file.host_port)
                .unwrap_or_else(|| DEFAULT_HOST_PORT.to_string()),
            token,
            namespace: normalize_namespace(&namespace),
            tls,
            retry: file.retry,
            listener_capacity: file.listener_capacity.unwrap_or(DEFAULT_LISTENER_CAPACITY),
        })
    }
}

/// Lowercases a non-empty namespace and makes sure it ends with `_`.
pub fn normalize_namespace(namespace: &str) -> String {
    let namespace = namespace.trim();
    if namespace.is_empty() {
        return String::new();
    }
    let mut namespace = namespace.to_lowercase();
    if !namespace.ends_with('_') {
        namespace.push('_');
    }
    namespace
}

fn parse_bool(key: &str, value: &str) -> Result<bool, DispatchError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" | "" => Ok(false),
        other => Err(DispatchError::Config(format!(
            "Invalid boolean for `{key}`: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_namespace_normalization() {
        assert_eq!(normalize_namespace(""), "");
        assert_eq!(normalize_namespace("  "), "");
        assert_eq!(normalize_namespace("Staging"), "staging_");
        assert_eq!(normalize_namespace("prod_"), "prod_");
    }

    #[test]
    fn test_file_values_and_defaults() {
        let config = ClientConfig::from_toml_str(
            r#"
            token = "file-token"
            namespace = "Team"

            [retry]
            num_retries = 2
            "#,
            no_env,
        )
        .expect("valid config");

        assert_eq!(config.token.expose_secret(), "file-token");
        assert_eq!(config.namespace, "team_");
        assert_eq!(config.host_port, DEFAULT_HOST_PORT);
        assert!(!config.tls);
        assert_eq!(config.retry.num_retries, 2);
        assert_eq!(config.retry.min_delay_ms, 100);
        assert_eq!(config.listener_capacity, DEFAULT_LISTENER_CAPACITY);
    }

    #[test]
    fn test_environment_overrides_file() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_TOKEN, "env-token"),
            (ENV_HOST_PORT, "engine.internal:443"),
            (ENV_TLS, "true"),
        ]);
        let config = ClientConfig::from_toml_str(
            r#"
            token = "file-token"
            host_port = "localhost:1234"
            "#,
            |key| env.get(key).map(|v| (*v).to_string()),
        )
        .expect("valid config");

        assert_eq!(config.token.expose_secret(), "env-token");
        assert_eq!(config.host_port, "engine.internal:443");
        assert!(config.tls);
    }

    #[test]
    fn test_missing_token_is_an_error() {
        let err = ClientConfig::from_toml_str("namespace = \"x\"", no_env)
            .expect_err("token is required");
        assert!(matches!(err, DispatchError::Config(_)), "{err:?}");
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let err = ClientConfig::from_toml_str("token = \"t\"\nhostport = \"x\"", no_env)
            .expect_err("typo must be caught");
        assert!(matches!(err, DispatchError::Config(_)), "{err:?}");
    }

    #[test]
    fn test_invalid_tls_flag() {
        let err = ClientConfig::from_toml_str("token = \"t\"", |key| {
            (key == ENV_TLS).then(|| "sometimes".to_string())
        })
        .expect_err("invalid bool");
        assert!(err.to_string().contains(ENV_TLS));
    }
}
