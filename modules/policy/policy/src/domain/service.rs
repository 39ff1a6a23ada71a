//! Domain service implementing the policy lifecycle.

use std::sync::Arc;

use policy_sdk::{
    CrosswireError, DecodeError, Diagnostics, Policy, PolicyApiClient, PolicyLifecycle, TraceId,
};
use tracing::info;

use super::validation::validate_policy;

pub const UPDATE_UNSUPPORTED_SUMMARY: &str = "Update is not yet supported";
pub const DELETE_UNSUPPORTED_SUMMARY: &str = "Delete is not yet supported";
pub const CONTACT_SUPPORT_DETAIL: &str =
    "Please contact customer support for additional information.";

/// Policy lifecycle service over any [`PolicyApiClient`].
#[derive(Clone)]
pub struct Service {
    client: Arc<dyn PolicyApiClient>,
}

impl Service {
    #[must_use]
    pub fn new(client: Arc<dyn PolicyApiClient>) -> Self {
        Self { client }
    }
}

impl PolicyLifecycle for Service {
    fn validate(&self, policy: &Policy) -> Diagnostics {
        validate_policy(policy)
    }

    #[tracing::instrument(skip_all, fields(policy = %policy.name))]
    fn create(&self, policy: &Policy) -> Result<Policy, CrosswireError> {
        let diags = self.validate(policy);
        if diags.has_error() {
            info!(findings = diags.len(), "Policy rejected by validation");
            return Err(CrosswireError::Validation(diags));
        }

        self.client.create_policy(policy).map_err(|e| {
            tracing::error!(operation = "create", error = %e, "Failed to create policy");
            e
        })
    }

    /// A found policy without approver settings is a `Decode` error. The
    /// policy was already decoded by the client, so that error carries no
    /// response body.
    #[tracing::instrument(skip_all, fields(id = %id))]
    fn read(&self, id: &str) -> Result<Option<Policy>, CrosswireError> {
        let Some(policy) = self.client.get_policy_by_name(id)? else {
            info!("Policy not found");
            return Ok(None);
        };

        let missing = if policy.special_approver.is_none() {
            Some("SpecialApprover")
        } else if policy.approval_behavior.is_none() {
            Some("ApprovalBehavior")
        } else {
            None
        };

        if let Some(field) = missing {
            tracing::error!(operation = "read", field, "Policy is missing approver settings");
            return Err(CrosswireError::Decode {
                source: DecodeError::MissingField {
                    path: field.to_owned(),
                },
                trace_id: TraceId::default(),
                body: String::new(),
            });
        }

        Ok(Some(policy))
    }

    fn update(&self, _policy: &Policy) -> Diagnostics {
        let mut diags = Diagnostics::new();
        diags.add_error(UPDATE_UNSUPPORTED_SUMMARY, CONTACT_SUPPORT_DETAIL);
        diags
    }

    fn delete(&self, _policy: &Policy) -> Diagnostics {
        let mut diags = Diagnostics::new();
        diags.add_warning(DELETE_UNSUPPORTED_SUMMARY, CONTACT_SUPPORT_DETAIL);
        diags
    }
}
