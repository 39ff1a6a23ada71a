//! Callbacks of the `crosswire_policy` declarative resource.

use std::sync::Arc;

use policy_sdk::{CrosswireError, Diagnostic, Diagnostics, Policy, PolicyLifecycle};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::model::PolicyResourceModel;
use super::validation::validate_policy;

/// Resource type name as seen by configuration files.
pub const RESOURCE_TYPE: &str = "crosswire_policy";

/// Check a resource configuration without contacting the service.
///
/// Reports schema findings and policy rule findings together.
#[must_use]
pub fn validate_config(config: &PolicyResourceModel) -> Diagnostics {
    check_config(config, validate_policy)
}

/// Schema findings on the defaulted config, followed by `rules` run on its
/// lenient conversion.
fn check_config(
    config: &PolicyResourceModel,
    rules: impl FnOnce(&Policy) -> Diagnostics,
) -> Diagnostics {
    let planned = config.clone().with_defaults();
    let mut diags = planned.check_schema();
    diags.append(rules(&planned.to_policy_lenient()));
    diags
}

/// The `crosswire_policy` resource, driving a [`PolicyLifecycle`].
#[derive(Clone)]
pub struct PolicyResource {
    lifecycle: Arc<dyn PolicyLifecycle>,
}

impl PolicyResource {
    #[must_use]
    pub fn new(lifecycle: Arc<dyn PolicyLifecycle>) -> Self {
        Self { lifecycle }
    }

    /// Schema findings plus the lifecycle's own validation.
    #[must_use]
    pub fn validate_config(&self, config: &PolicyResourceModel) -> Diagnostics {
        check_config(config, |policy| self.lifecycle.validate(policy))
    }

    /// Create the planned policy and return its state.
    ///
    /// # Errors
    ///
    /// Schema and validation findings, or a single error finding describing
    /// the failed request.
    #[tracing::instrument(skip_all, fields(resource = RESOURCE_TYPE, name = %plan.name))]
    pub fn create(&self, plan: &PolicyResourceModel) -> Result<PolicyResourceModel, Diagnostics> {
        let plan = plan.clone().with_defaults();
        let policy = plan.to_policy()?;

        let created = self.lifecycle.create(&policy).map_err(|err| match err {
            CrosswireError::Validation(diags) => diags,
            other => Diagnostic::error(
                "Error creating policy",
                format!("Could not create policy, unexpected error: {other}"),
            )
            .into(),
        })?;

        let mut state = PolicyResourceModel::from_policy(&created);
        if state.ttl.is_none() {
            state.ttl = plan.ttl;
        }
        state.last_updated = now_rfc3339();

        tracing::info!(
            id = state.id.as_deref().unwrap_or_default(),
            "Created crosswire_policy resource"
        );
        Ok(state)
    }

    /// Refresh state from the service; `Ok(None)` when the policy is gone.
    ///
    /// # Errors
    ///
    /// A single error finding when the state has no id or the lookup fails.
    #[tracing::instrument(
        skip_all,
        fields(resource = RESOURCE_TYPE, id = state.id.as_deref().unwrap_or_default())
    )]
    pub fn read(
        &self,
        state: &PolicyResourceModel,
    ) -> Result<Option<PolicyResourceModel>, Diagnostics> {
        let Some(id) = state.id.as_deref().filter(|id| !id.is_empty()) else {
            return Err(Diagnostic::error(
                "Error Reading Policies",
                "The resource state has no policy id",
            )
            .at("id")
            .into());
        };

        let found = self.lifecycle.read(id).map_err(|err| {
            Diagnostics::from(Diagnostic::error(
                "Error Reading Policies",
                format!("Could not read policies, unexpected error: {err}"),
            ))
        })?;

        let Some(policy) = found else {
            tracing::warn!("Policy no longer exists");
            return Ok(None);
        };

        let mut refreshed = PolicyResourceModel::from_policy(&policy);
        if refreshed.ttl.is_none() {
            refreshed.ttl = state.ttl;
        }
        refreshed.last_updated.clone_from(&state.last_updated);
        Ok(Some(refreshed))
    }

    /// Updates are not offered by the service.
    #[must_use]
    pub fn update(&self, plan: &PolicyResourceModel) -> Diagnostics {
        self.lifecycle.update(&plan.to_policy_lenient())
    }

    /// Deletion is not offered by the service; the finding is a warning.
    #[must_use]
    pub fn delete(&self, state: &PolicyResourceModel) -> Diagnostics {
        self.lifecycle.delete(&state.to_policy_lenient())
    }

    /// Import an existing policy by id.
    ///
    /// # Errors
    ///
    /// See [`PolicyResource::read`].
    pub fn import_state(&self, id: &str) -> Result<Option<PolicyResourceModel>, Diagnostics> {
        let state = PolicyResourceModel {
            id: Some(id.to_owned()),
            ..PolicyResourceModel::default()
        };
        self.read(&state)
    }
}

fn now_rfc3339() -> Option<String> {
    OffsetDateTime::now_utc().format(&Rfc3339).ok()
}
