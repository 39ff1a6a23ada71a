//! Crosswire provider: resolves configuration and wires the policy resource.

use std::sync::Arc;

use policy_sdk::{CrosswireError, Diagnostic, Diagnostics};
use tracing::info;

use crate::client::HttpPolicyClient;
use crate::config::{CrosswireConfig, ProviderSettings};
use crate::domain::{PolicyResource, RESOURCE_TYPE, Service};

pub const PROVIDER_NAME: &str = "crosswire";

const MISSING_TOKEN_DETAIL: &str = "The provider cannot create the Crosswire API client as there is a missing or empty value for the Crosswire API token. Set the token value in the configuration or use the CROSSWIRE_API_TOKEN environment variable. If one is already set, ensure the value is not empty.";

/// Entry point used by front-ends.
///
/// `configure` resolves settings, checks credentials with the service and
/// hands out the resources backed by the resulting client.
#[derive(Debug, Clone)]
pub struct CrosswireProvider {
    version: String,
}

impl CrosswireProvider {
    /// Resource types served by this provider.
    pub const RESOURCE_TYPES: &'static [&'static str] = &[RESOURCE_TYPE];

    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Resolve settings, validate credentials and build the policy resource.
    ///
    /// # Errors
    ///
    /// - an attribute-scoped finding on `api_token` when no token is set
    /// - a single finding wrapping any configuration or client error
    #[tracing::instrument(skip_all, fields(version = %self.version))]
    pub fn configure(&self, settings: &ProviderSettings) -> Result<PolicyResource, Diagnostics> {
        info!("Initializing {PROVIDER_NAME} provider");

        let config = CrosswireConfig::resolve(settings).map_err(|err| match err {
            CrosswireError::MissingToken => Diagnostics::from(
                Diagnostic::error("Missing Crosswire API Secret Token", MISSING_TOKEN_DETAIL)
                    .at("api_token"),
            ),
            other => Diagnostics::from(Diagnostic::error(
                "Invalid Crosswire provider configuration",
                other.to_string(),
            )),
        })?;

        let client = HttpPolicyClient::connect(&config).map_err(|err| {
            tracing::error!(host = %config.host, error = %err, "Failed to create Crosswire client");
            Diagnostics::from(Diagnostic::error(
                "Unable to create Crosswire API Client",
                format!(
                    "An unexpected error occurred when creating the Crosswire API client. \
                     If the error is not clear, please contact the provider developers.\n\n\
                     Crosswire client error: {err}"
                ),
            ))
        })?;

        info!(host = %config.host, "Configured Crosswire client");
        Ok(PolicyResource::new(Arc::new(Service::new(Arc::new(client)))))
    }
}
