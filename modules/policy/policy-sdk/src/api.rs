//! Public API traits for Crosswire policies.

use crate::diagnostics::Diagnostics;
use crate::error::CrosswireError;
use crate::models::Policy;

/// Remote operations offered by the Crosswire service.
///
/// Every call is a single blocking request/response exchange. Nothing is
/// retried: a failed `create_policy` may still have created the policy.
pub trait PolicyApiClient: Send + Sync {
    /// Check that the configured token is accepted.
    ///
    /// # Errors
    ///
    /// - `MissingToken` before any request when no token is configured
    /// - `MalformedResponse` when the answer has no `success` flag
    /// - transport and HTTP errors
    fn validate_credentials(&self) -> Result<bool, CrosswireError>;

    /// Create a policy and return the canonical object, including its
    /// server-assigned `id` and `state`.
    ///
    /// # Errors
    ///
    /// Transport, HTTP and decode errors.
    fn create_policy(&self, policy: &Policy) -> Result<Policy, CrosswireError>;

    /// Look a policy up by label; `Ok(None)` when nothing matches.
    ///
    /// # Errors
    ///
    /// - `Decode` with `MultipleResults` when the label is ambiguous
    /// - transport, HTTP and decode errors
    fn get_policy_by_name(&self, name: &str) -> Result<Option<Policy>, CrosswireError>;
}

/// Lifecycle operations any front-end can drive for a policy resource.
///
/// ```ignore
/// let diags = lifecycle.validate(&policy);
/// if !diags.has_error() {
///     let created = lifecycle.create(&policy)?;
///     let refreshed = lifecycle.read(created.id.as_deref().unwrap_or_default())?;
/// }
/// ```
pub trait PolicyLifecycle: Send + Sync {
    /// Check the policy without contacting the service. All findings are
    /// returned together.
    fn validate(&self, policy: &Policy) -> Diagnostics;

    /// Validate and create the policy.
    ///
    /// # Errors
    ///
    /// - `Validation` when any error finding exists; nothing is sent
    /// - errors from [`PolicyApiClient::create_policy`]
    fn create(&self, policy: &Policy) -> Result<Policy, CrosswireError>;

    /// Re-fetch a policy by id; `Ok(None)` when it no longer exists.
    ///
    /// # Errors
    ///
    /// Errors from [`PolicyApiClient::get_policy_by_name`], and `Decode` when
    /// the service omits the approver settings.
    fn read(&self, id: &str) -> Result<Option<Policy>, CrosswireError>;

    /// In-place updates are not offered; always reports a blocking error.
    fn update(&self, policy: &Policy) -> Diagnostics;

    /// Deletion is not offered; always reports a non-blocking warning.
    fn delete(&self, policy: &Policy) -> Diagnostics;
}
