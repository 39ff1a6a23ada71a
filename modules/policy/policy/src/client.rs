//! Blocking HTTP client for the Crosswire policy API.

use policy_sdk::{CrosswireError, Policy, PolicyApiClient, TraceId, wire};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};

use crate::config::CrosswireConfig;

/// Credential check endpoint.
pub const VALIDATE_PATH: &str = "/integrations/crosswire_terraform/validate";

/// Policy create and lookup endpoint.
pub const POLICY_PATH: &str = "/integrations/crosswire_terraform/policy";

const TOKEN_HEADER: &str = "Token";
const REQUEST_ID_HEADER: &str = "X-Request-Id";
const TRACE_ID_KEY: &str = "traceId";
const SUCCESS_KEY: &str = "success";
const LABEL_PARAM: &str = "label";

/// [`PolicyApiClient`] talking to the Crosswire service over HTTP.
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct HttpPolicyClient {
    agent: ureq::Agent,
    host: String,
    token: SecretString,
}

/// Successful response whose body is a JSON object.
struct JsonResponse {
    trace_id: TraceId,
    raw: String,
    body: Value,
}

impl JsonResponse {
    fn decode<T>(
        self,
        decode: impl FnOnce(&Value) -> Result<T, wire::DecodeError>,
    ) -> Result<T, CrosswireError> {
        decode(&self.body).map_err(|source| CrosswireError::Decode {
            source,
            trace_id: self.trace_id,
            body: self.raw,
        })
    }
}

impl HttpPolicyClient {
    /// Build a client without contacting the service.
    #[must_use]
    pub fn new(config: &CrosswireConfig) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        Self {
            agent,
            host: config.host.clone(),
            token: config.api_token.clone(),
        }
    }

    /// Build a client and check its credentials against the service.
    ///
    /// # Errors
    ///
    /// - `CredentialsRejected` when the service answers `success: false`
    /// - any error from [`PolicyApiClient::validate_credentials`]
    pub fn connect(config: &CrosswireConfig) -> Result<Self, CrosswireError> {
        let client = Self::new(config);
        if client.validate_credentials()? {
            tracing::info!(host = %client.host, "Crosswire credentials accepted");
            Ok(client)
        } else {
            tracing::warn!(host = %client.host, "Crosswire credentials rejected");
            Err(CrosswireError::CredentialsRejected)
        }
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }

    /// Same as [`PolicyApiClient::validate_credentials`], optionally with a
    /// token other than the configured one.
    ///
    /// # Errors
    ///
    /// See [`PolicyApiClient::validate_credentials`].
    #[tracing::instrument(skip_all, fields(operation = "validate_credentials", host = %self.host))]
    pub fn validate_credentials_with_token(
        &self,
        token: Option<&SecretString>,
    ) -> Result<bool, CrosswireError> {
        let request = self.agent.get(&self.endpoint(VALIDATE_PATH));
        let response = self.execute(request, None, token)?;

        match response.body.get(SUCCESS_KEY) {
            Some(Value::Bool(success)) => Ok(*success),
            Some(other) => {
                tracing::warn!(
                    value = %other,
                    "Credential check returned a non-boolean success flag"
                );
                Ok(false)
            }
            None => {
                let trace_id = response
                    .body
                    .get(TRACE_ID_KEY)
                    .and_then(Value::as_str)
                    .map(str::to_owned);
                Err(CrosswireError::MalformedResponse {
                    body: response.raw,
                    trace_id: TraceId(trace_id),
                })
            }
        }
    }

    /// Same as [`PolicyApiClient::create_policy`], optionally with a token
    /// other than the configured one.
    ///
    /// # Errors
    ///
    /// See [`PolicyApiClient::create_policy`].
    #[tracing::instrument(
        skip_all,
        fields(operation = "create_policy", host = %self.host, policy = %policy.name)
    )]
    pub fn create_policy_with_token(
        &self,
        policy: &Policy,
        token: Option<&SecretString>,
    ) -> Result<Policy, CrosswireError> {
        let body = serde_json::to_string(&wire::encode_policy(policy)?)?;
        let request = self.agent.post(&self.endpoint(POLICY_PATH));
        let response = self.execute(request, Some(&body), token)?;
        let created = response.decode(wire::decode_policy)?;

        tracing::info!(
            id = created.id.as_deref().unwrap_or_default(),
            state = created.state.as_deref().unwrap_or_default(),
            "Policy created"
        );
        Ok(created)
    }

    /// Same as [`PolicyApiClient::get_policy_by_name`], optionally with a
    /// token other than the configured one.
    ///
    /// # Errors
    ///
    /// See [`PolicyApiClient::get_policy_by_name`].
    #[tracing::instrument(
        skip_all,
        fields(operation = "get_policy_by_name", host = %self.host, label = %name)
    )]
    pub fn get_policy_by_name_with_token(
        &self,
        name: &str,
        token: Option<&SecretString>,
    ) -> Result<Option<Policy>, CrosswireError> {
        let request = self
            .agent
            .get(&self.endpoint(POLICY_PATH))
            .query(LABEL_PARAM, name);
        let response = self.execute(request, None, token)?;
        let found = response.decode(wire::decode_policy_lookup)?;

        tracing::debug!(found = found.is_some(), "Policy lookup finished");
        Ok(found)
    }

    /// Send one request and return its JSON object body.
    ///
    /// The token is checked before anything goes on the wire. A singular
    /// `X-Request-Id` is injected into successful bodies as `traceId`.
    fn execute(
        &self,
        request: ureq::Request,
        body: Option<&str>,
        token: Option<&SecretString>,
    ) -> Result<JsonResponse, CrosswireError> {
        let token = token.unwrap_or(&self.token);
        if token.expose_secret().is_empty() {
            return Err(CrosswireError::MissingToken);
        }

        let url = request.url().to_owned();
        let request = request.set(TOKEN_HEADER, token.expose_secret());
        let result = match body {
            Some(body) => request
                .set("Content-Type", "application/json")
                .send_string(body),
            None => request.call(),
        };

        let response = match result {
            Ok(response) | Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(transport)) => {
                tracing::error!(url = %url, error = %transport, "Crosswire request failed");
                return Err(CrosswireError::Transport {
                    url,
                    message: transport.to_string(),
                });
            }
        };

        let status = response.status();
        let trace_id = TraceId(single_request_id(&response));
        let raw = response
            .into_string()
            .map_err(|e| CrosswireError::Transport {
                url: url.clone(),
                message: e.to_string(),
            })?;

        if !(200..300).contains(&status) {
            tracing::error!(
                url = %url,
                status,
                trace_id = trace_id.as_deref().unwrap_or_default(),
                "Crosswire returned an error status"
            );
            return Err(CrosswireError::Http {
                status,
                trace_id,
                body: raw,
            });
        }

        let mut object: Map<String, Value> =
            serde_json::from_str(&raw).map_err(|source| CrosswireError::InvalidJson {
                status,
                trace_id: trace_id.clone(),
                body: raw.clone(),
                source,
            })?;

        if let Some(id) = trace_id.as_deref() {
            object.insert(TRACE_ID_KEY.to_owned(), Value::String(id.to_owned()));
        }

        tracing::debug!(url = %url, status, "Crosswire request succeeded");
        Ok(JsonResponse {
            trace_id,
            raw,
            body: Value::Object(object),
        })
    }
}

/// The request id, only when the service sent exactly one.
fn single_request_id(response: &ureq::Response) -> Option<String> {
    match response.all(REQUEST_ID_HEADER).as_slice() {
        [id] => Some((*id).to_owned()),
        _ => None,
    }
}

impl PolicyApiClient for HttpPolicyClient {
    fn validate_credentials(&self) -> Result<bool, CrosswireError> {
        self.validate_credentials_with_token(None)
    }

    fn create_policy(&self, policy: &Policy) -> Result<Policy, CrosswireError> {
        self.create_policy_with_token(policy, None)
    }

    fn get_policy_by_name(&self, name: &str) -> Result<Option<Policy>, CrosswireError> {
        self.get_policy_by_name_with_token(name, None)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn client(host: &str) -> HttpPolicyClient {
        HttpPolicyClient::new(&CrosswireConfig::new(host, "token"))
    }

    #[test]
    fn endpoint_appends_path_to_host() {
        let client = client("https://webhook.crosswire.io/");
        assert_eq!(client.host(), "https://webhook.crosswire.io");
        assert_eq!(
            client.endpoint(VALIDATE_PATH),
            "https://webhook.crosswire.io/integrations/crosswire_terraform/validate"
        );
        assert_eq!(
            client.endpoint(POLICY_PATH),
            "https://webhook.crosswire.io/integrations/crosswire_terraform/policy"
        );
    }

    #[test]
    fn empty_token_fails_before_sending() {
        // Port 9 is discard; nothing should be contacted anyway.
        let client = HttpPolicyClient::new(&CrosswireConfig::new("http://127.0.0.1:9", ""));
        let err = client.validate_credentials().unwrap_err();
        assert!(matches!(err, CrosswireError::MissingToken));

        let err = client
            .get_policy_by_name_with_token("admins", Some(&SecretString::from(String::new())))
            .unwrap_err();
        assert!(matches!(err, CrosswireError::MissingToken));
    }
}
