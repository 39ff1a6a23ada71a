//! Configuration for the Crosswire API client.
//!
//! Values resolve with the precedence: explicit setting > `CROSSWIRE_API_*`
//! environment variable > built-in default. The API token has no default.

use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Serialized};
use policy_sdk::CrosswireError;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Default API endpoint.
pub const DEFAULT_HOST: &str = "https://webhook.crosswire.io";

/// Default request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Prefix of the environment variables read during resolution
/// (`CROSSWIRE_API_HOST`, `CROSSWIRE_API_TOKEN`, `CROSSWIRE_API_TIMEOUT_SECS`).
pub const ENV_PREFIX: &str = "CROSSWIRE_API_";

/// Explicitly configured provider settings.
///
/// Unset fields fall back to the environment, then to the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderSettings {
    /// API endpoint, e.g. `https://webhook.crosswire.io`.
    pub host: Option<String>,

    /// API token for the Crosswire organization.
    pub api_token: Option<SecretString>,

    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
}

/// Resolved client configuration.
#[derive(Debug, Clone)]
pub struct CrosswireConfig {
    /// API endpoint without a trailing slash.
    pub host: String,

    /// API token sent in the `Token` header.
    pub api_token: SecretString,

    /// Timeout applied to every request.
    pub timeout: Duration,
}

impl CrosswireConfig {
    #[must_use]
    pub fn new(host: impl Into<String>, api_token: impl Into<SecretString>) -> Self {
        Self {
            host: normalize_host(&host.into()),
            api_token: api_token.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve explicit settings against the process environment.
    ///
    /// # Errors
    ///
    /// - `MissingToken` when no non-empty token is configured anywhere
    /// - `Config` when an environment value cannot be parsed
    pub fn resolve(settings: &ProviderSettings) -> Result<Self, CrosswireError> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Layer::from_env()))
            .merge(Env::prefixed(ENV_PREFIX).ignore(&["host", "token"]))
            .merge(Serialized::defaults(Layer::from(settings)));

        let layer: Layer = figment
            .extract()
            .map_err(|e| CrosswireError::Config(e.to_string()))?;

        let host = layer
            .host
            .filter(|host| !host.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_HOST.to_owned());

        let api_token = layer
            .token
            .filter(|token| !token.is_empty())
            .ok_or(CrosswireError::MissingToken)?;

        let timeout_secs = layer.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(CrosswireError::Config(
                "timeout_secs must be greater than zero".to_owned(),
            ));
        }

        tracing::debug!(host = %host, timeout_secs, "Resolved Crosswire configuration");

        Ok(Self {
            host: normalize_host(&host),
            api_token: SecretString::from(api_token),
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// One configuration layer as seen by figment. Never logged.
#[derive(Default, Serialize, Deserialize)]
#[serde(default)]
struct Layer {
    #[serde(skip_serializing_if = "Option::is_none")]
    host: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    timeout_secs: Option<u64>,
}

impl Layer {
    /// Host and token taken verbatim from the environment. `Env::prefixed`
    /// would parse them as typed values (`0123` becomes a number).
    fn from_env() -> Self {
        Self {
            host: Env::var(&format!("{ENV_PREFIX}HOST")),
            token: Env::var(&format!("{ENV_PREFIX}TOKEN")),
            timeout_secs: None,
        }
    }
}

impl From<&ProviderSettings> for Layer {
    fn from(settings: &ProviderSettings) -> Self {
        Self {
            host: settings.host.clone(),
            token: settings
                .api_token
                .as_ref()
                .map(|token| token.expose_secret().to_owned()),
            timeout_secs: settings.timeout_secs,
        }
    }
}

fn normalize_host(host: &str) -> String {
    host.trim().trim_end_matches('/').to_owned()
}
