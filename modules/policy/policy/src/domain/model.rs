//! Declarative model of the `crosswire_policy` resource.
//!
//! Attribute names are snake_case. The model is what configuration files and
//! resource state contain; it converts to and from [`Policy`] and carries the
//! schema checks that the service expects to have been applied.

use std::str::FromStr;
use std::sync::LazyLock;

use policy_sdk::{
    ApprovalBehavior, Condition, Diagnostics, Entitlement, ParseEnumError, Policy, Quantifier,
    SpecialApprover,
};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Maximum number of condition levels, the root included.
pub const MAX_CONDITION_DEPTH: usize = 3;

pub const INVALID_VALUE_SUMMARY: &str = "Invalid attribute value";
pub const TOO_DEEP_SUMMARY: &str = "Too many levels of subconditions";
pub const TOO_DEEP_DETAIL: &str = "If you need more than 3 levels of subconditions, please contact someone at Crosswire for assistance.";

#[allow(clippy::expect_used)]
static EMAIL_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("email address pattern is valid")
});

/// A Crosswire user, identified by email address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserModel {
    pub email_address: String,
}

impl UserModel {
    #[must_use]
    pub fn new(email_address: impl Into<String>) -> Self {
        Self {
            email_address: email_address.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntitlementModel {
    pub provider: String,
    pub subject: String,
    pub object: String,
}

impl From<&Entitlement> for EntitlementModel {
    fn from(entitlement: &Entitlement) -> Self {
        Self {
            provider: entitlement.provider.clone(),
            subject: entitlement.subject.clone(),
            object: entitlement.object.clone(),
        }
    }
}

impl From<&EntitlementModel> for Entitlement {
    fn from(model: &EntitlementModel) -> Self {
        Entitlement::new(&model.provider, &model.subject, &model.object)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionModel {
    /// `ANY` or `ALL`, any case.
    pub quantifier: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entitlements: Vec<EntitlementModel>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subconditions: Vec<ConditionModel>,
}

impl From<&Condition> for ConditionModel {
    fn from(condition: &Condition) -> Self {
        Self {
            quantifier: condition
                .quantifier
                .map(|q| q.as_str().to_owned())
                .unwrap_or_default(),
            entitlements: condition.entitlements.iter().map(Into::into).collect(),
            subconditions: condition.subconditions.iter().map(Into::into).collect(),
        }
    }
}

impl From<&ConditionModel> for Condition {
    fn from(model: &ConditionModel) -> Self {
        Condition {
            quantifier: model.quantifier.parse().ok(),
            entitlements: model.entitlements.iter().map(Into::into).collect(),
            subconditions: model.subconditions.iter().map(Into::into).collect(),
        }
    }
}

/// Configuration and state of one `crosswire_policy` resource.
///
/// `id`, `state` and `last_updated` are computed and only present in state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyResourceModel {
    /// User creating the policy; must exist within Crosswire.
    pub owner: UserModel,
    /// What users see when requesting access.
    pub name: String,
    /// Access granted to holders of the policy.
    pub entitlements: Vec<EntitlementModel>,
    /// Eligibility condition.
    pub condition: ConditionModel,
    /// `NONE`, `AUTO`, `SELF` or `MANAGER`; planned as `NONE` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_approver: Option<String>,
    /// `ANY` or `ALL`; planned as `ANY` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_behavior: Option<String>,
    #[serde(default)]
    pub user_approvers: Vec<UserModel>,
    #[serde(default)]
    pub entitlement_approvers: Vec<EntitlementModel>,
    /// Maximum number of seconds a user can hold the policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// RFC 3339 timestamp of the last create or update seen by this client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

impl PolicyResourceModel {
    /// Fill unset approval settings with their planned defaults.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.special_approver
            .get_or_insert_with(|| SpecialApprover::default().as_str().to_owned());
        self.approval_behavior
            .get_or_insert_with(|| ApprovalBehavior::default().as_str().to_owned());
        self
    }

    /// Attribute-level checks. Every finding is reported.
    #[must_use]
    pub fn check_schema(&self) -> Diagnostics {
        let mut diags = Diagnostics::new();

        check_email(&mut diags, "owner.email_address", &self.owner.email_address);
        if self.name.trim().is_empty() {
            diags.add_attribute_error("name", INVALID_VALUE_SUMMARY, "name must not be empty");
        }
        check_entitlements(&mut diags, "entitlements", &self.entitlements);
        check_condition(&mut diags, "condition", &self.condition, 0);

        if let Some(value) = &self.special_approver {
            check_enum::<SpecialApprover>(&mut diags, "special_approver", value);
        }
        if let Some(value) = &self.approval_behavior {
            check_enum::<ApprovalBehavior>(&mut diags, "approval_behavior", value);
        }

        for (i, user) in self.user_approvers.iter().enumerate() {
            check_email(
                &mut diags,
                &format!("user_approvers[{i}].email_address"),
                &user.email_address,
            );
        }
        check_entitlements(&mut diags, "entitlement_approvers", &self.entitlement_approvers);

        if let Some(ttl) = self.ttl
            && ttl < 0
        {
            diags.add_attribute_error(
                "ttl",
                INVALID_VALUE_SUMMARY,
                format!("ttl must not be negative, got {ttl}"),
            );
        }

        diags
    }

    /// Convert to a [`Policy`] after the schema checks pass.
    ///
    /// # Errors
    ///
    /// Returns the schema findings when any of them is an error.
    pub fn to_policy(&self) -> Result<Policy, Diagnostics> {
        let diags = self.check_schema();
        if diags.has_error() {
            return Err(diags);
        }
        Ok(self.to_policy_lenient())
    }

    /// Convert without schema checks; values that do not parse are left unset.
    #[must_use]
    pub fn to_policy_lenient(&self) -> Policy {
        Policy {
            owner: self.owner.email_address.clone(),
            name: self.name.clone(),
            entitlements: self.entitlements.iter().map(Into::into).collect(),
            condition: (&self.condition).into(),
            special_approver: self.special_approver.as_deref().and_then(|v| v.parse().ok()),
            approval_behavior: self
                .approval_behavior
                .as_deref()
                .and_then(|v| v.parse().ok()),
            user_approvers: self
                .user_approvers
                .iter()
                .map(|user| user.email_address.clone())
                .collect(),
            entitlement_approvers: self.entitlement_approvers.iter().map(Into::into).collect(),
            ttl: self
                .ttl
                .and_then(|ttl| u64::try_from(ttl).ok())
                .filter(|ttl| *ttl > 0),
            id: self.id.clone(),
            state: self.state.clone(),
        }
    }

    /// State model for a policy returned by the service.
    #[must_use]
    pub fn from_policy(policy: &Policy) -> Self {
        Self {
            owner: UserModel::new(&policy.owner),
            name: policy.name.clone(),
            entitlements: policy.entitlements.iter().map(Into::into).collect(),
            condition: (&policy.condition).into(),
            special_approver: policy.special_approver.map(|v| v.as_str().to_owned()),
            approval_behavior: policy.approval_behavior.map(|v| v.as_str().to_owned()),
            user_approvers: policy.user_approvers.iter().map(UserModel::new).collect(),
            entitlement_approvers: policy.entitlement_approvers.iter().map(Into::into).collect(),
            ttl: policy.ttl.and_then(|ttl| i64::try_from(ttl).ok()),
            id: policy.id.clone(),
            state: policy.state.clone(),
            last_updated: None,
        }
    }
}

fn check_email(diags: &mut Diagnostics, attribute: &str, value: &str) {
    if !EMAIL_ADDRESS.is_match(value) {
        diags.add_attribute_error(
            attribute,
            INVALID_VALUE_SUMMARY,
            format!("must be a valid email address, got '{value}'"),
        );
    }
}

fn check_enum<T>(diags: &mut Diagnostics, attribute: &str, value: &str)
where
    T: FromStr<Err = ParseEnumError>,
{
    if let Err(err) = value.parse::<T>() {
        diags.add_attribute_error(attribute, INVALID_VALUE_SUMMARY, err.to_string());
    }
}

fn check_entitlements(diags: &mut Diagnostics, attribute: &str, entitlements: &[EntitlementModel]) {
    for (i, entitlement) in entitlements.iter().enumerate() {
        for (field, value) in [
            ("provider", &entitlement.provider),
            ("subject", &entitlement.subject),
            ("object", &entitlement.object),
        ] {
            if value.is_empty() {
                diags.add_attribute_error(
                    format!("{attribute}[{i}].{field}"),
                    INVALID_VALUE_SUMMARY,
                    format!("{field} must not be empty"),
                );
            }
        }
    }
}

fn check_condition(diags: &mut Diagnostics, path: &str, condition: &ConditionModel, level: usize) {
    check_enum::<Quantifier>(diags, &format!("{path}.quantifier"), &condition.quantifier);
    check_entitlements(diags, &format!("{path}.entitlements"), &condition.entitlements);

    if condition.subconditions.is_empty() {
        return;
    }
    if level + 1 >= MAX_CONDITION_DEPTH {
        diags.add_attribute_error(format!("{path}.subconditions"), TOO_DEEP_SUMMARY, TOO_DEEP_DETAIL);
        return;
    }
    for (i, subcondition) in condition.subconditions.iter().enumerate() {
        check_condition(diags, &format!("{path}.subconditions[{i}]"), subcondition, level + 1);
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn entitlement(provider: &str, subject: &str, object: &str) -> EntitlementModel {
        EntitlementModel {
            provider: provider.to_owned(),
            subject: subject.to_owned(),
            object: object.to_owned(),
        }
    }

    fn condition(quantifier: &str) -> ConditionModel {
        ConditionModel {
            quantifier: quantifier.to_owned(),
            entitlements: vec![entitlement("CROSSWIRE", "GROUP", "ENGINEERING")],
            subconditions: Vec::new(),
        }
    }

    fn model() -> PolicyResourceModel {
        PolicyResourceModel {
            owner: UserModel::new("user@company.com"),
            name: "crosswire admins".to_owned(),
            entitlements: vec![entitlement("CROSSWIRE", "CREATE", "ENTITLEMENT")],
            condition: condition("ANY"),
            user_approvers: vec![UserModel::new("approver@company.com")],
            ..PolicyResourceModel::default()
        }
    }

    fn attributes(diags: &Diagnostics) -> Vec<String> {
        diags
            .iter()
            .filter_map(|d| d.attribute.clone())
            .collect()
    }

    #[test]
    fn valid_model_passes_schema() {
        assert!(model().check_schema().is_empty());
        assert!(model().with_defaults().check_schema().is_empty());
    }

    #[test]
    fn defaults_fill_only_unset_values() {
        let planned = PolicyResourceModel {
            special_approver: Some("manager".to_owned()),
            ..model()
        }
        .with_defaults();
        assert_eq!(planned.special_approver.as_deref(), Some("manager"));
        assert_eq!(planned.approval_behavior.as_deref(), Some("ANY"));

        let planned = model().with_defaults();
        assert_eq!(planned.special_approver.as_deref(), Some("NONE"));
    }

    #[test]
    fn bad_emails_are_reported_per_attribute() {
        let model = PolicyResourceModel {
            owner: UserModel::new("not-an-email"),
            user_approvers: vec![
                UserModel::new("ok@company.com"),
                UserModel::new("bad@@company.com"),
            ],
            ..model()
        };
        assert_eq!(
            attributes(&model.check_schema()),
            ["owner.email_address", "user_approvers[1].email_address"]
        );
    }

    #[test]
    fn enum_values_are_case_insensitive() {
        let mut model = PolicyResourceModel {
            special_approver: Some("self".to_owned()),
            approval_behavior: Some("All".to_owned()),
            condition: condition("any"),
            ..model()
        };
        assert!(model.check_schema().is_empty());

        model.special_approver = Some("ROBOT".to_owned());
        model.condition.quantifier = "SOME".to_owned();
        assert_eq!(
            attributes(&model.check_schema()),
            ["condition.quantifier", "special_approver"]
        );
    }

    #[test]
    fn three_levels_are_allowed_four_are_not() {
        let mut model = model();
        let level2 = condition("ALL");
        let level1 = ConditionModel {
            subconditions: vec![level2.clone()],
            ..condition("ANY")
        };
        model.condition.subconditions = vec![level1.clone()];
        assert!(model.check_schema().is_empty());

        let deep_level1 = ConditionModel {
            subconditions: vec![ConditionModel {
                subconditions: vec![condition("ANY")],
                ..level2
            }],
            ..condition("ANY")
        };
        model.condition.subconditions = vec![level1, deep_level1];
        let diags = model.check_schema();
        assert_eq!(
            attributes(&diags),
            ["condition.subconditions[1].subconditions[0].subconditions"]
        );
        assert_eq!(diags.iter().next().unwrap().detail, TOO_DEEP_DETAIL);
    }

    #[test]
    fn empty_fields_and_negative_ttl_are_rejected() {
        let model = PolicyResourceModel {
            name: " ".to_owned(),
            entitlements: vec![entitlement("CROSSWIRE", "", "ENTITLEMENT")],
            ttl: Some(-5),
            ..model()
        };
        let diags = model.check_schema();
        assert_eq!(attributes(&diags), ["name", "entitlements[0].subject", "ttl"]);
        assert!(model.to_policy().is_err());
    }

    #[test]
    fn converts_to_policy_and_back() {
        let model = PolicyResourceModel {
            special_approver: Some("manager".to_owned()),
            ttl: Some(3600),
            ..model()
        }
        .with_defaults();
        let policy = model.to_policy().unwrap();

        assert_eq!(policy.owner, "user@company.com");
        assert_eq!(policy.special_approver, Some(SpecialApprover::Manager));
        assert_eq!(policy.approval_behavior, Some(ApprovalBehavior::Any));
        assert_eq!(policy.condition.quantifier, Some(Quantifier::Any));
        assert_eq!(policy.user_approvers, ["approver@company.com"]);
        assert_eq!(policy.ttl, Some(3600));

        let state = PolicyResourceModel::from_policy(&policy);
        assert_eq!(state.special_approver.as_deref(), Some("MANAGER"));
        assert_eq!(state.condition, model.condition);
        assert_eq!(state.user_approvers, model.user_approvers);
        assert_eq!(state.ttl, Some(3600));
    }

    #[test]
    fn zero_ttl_means_no_expiry() {
        let model = PolicyResourceModel {
            ttl: Some(0),
            ..model()
        };
        assert_eq!(model.to_policy().unwrap().ttl, None);
    }

    #[test]
    fn resource_files_use_snake_case() {
        let model: PolicyResourceModel = serde_json::from_value(serde_json::json!({
            "owner": {"email_address": "user@company.com"},
            "name": "crosswire admins",
            "entitlements": [{"provider": "CROSSWIRE", "subject": "CREATE", "object": "ENTITLEMENT"}],
            "condition": {"quantifier": "ANY"},
            "special_approver": "AUTO",
            "ttl": 60
        }))
        .unwrap();
        assert_eq!(model.special_approver.as_deref(), Some("AUTO"));
        assert!(model.condition.entitlements.is_empty());
        assert!(model.user_approvers.is_empty());

        let err = serde_json::from_value::<PolicyResourceModel>(serde_json::json!({
            "owner": {"email_address": "user@company.com"},
            "name": "x",
            "entitlements": [],
            "condition": {"quantifier": "ANY"},
            "approvers": []
        }));
        assert!(err.is_err());
    }
}
