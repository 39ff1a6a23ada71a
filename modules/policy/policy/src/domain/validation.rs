//! Cross-field rules a policy must satisfy before it is submitted.

use policy_sdk::{Diagnostics, Policy, SpecialApprover};

pub const AUTO_WITH_TTL_SUMMARY: &str = "Auto policies cannot have a TTL";
pub const AUTO_WITH_TTL_DETAIL: &str = "Because users are granted access automatically, TTL is redundant as it would continue to be regranted until the user no longer qualifies, at which time, the user would lose access immediately regardless of time remaining.";

pub const NO_APPROVERS_SUMMARY: &str = "No approvers selected";
pub const NO_APPROVERS_DETAIL: &str =
    "At least one approver needs to be set to approve policy requests";

pub const NO_ENTITLEMENTS_SUMMARY: &str = "No entitlements selected";
pub const NO_ENTITLEMENTS_DETAIL: &str =
    "At least one entitlement needs to be set for the policy to function";

/// Evaluate every rule and return all findings.
///
/// An empty result means the policy may be submitted.
#[must_use]
pub fn validate_policy(policy: &Policy) -> Diagnostics {
    let mut diags = Diagnostics::new();
    let special_approver = policy.effective_special_approver();

    if policy.expiring_ttl().is_some() && special_approver == SpecialApprover::Auto {
        diags.add_error(AUTO_WITH_TTL_SUMMARY, AUTO_WITH_TTL_DETAIL);
    }

    if special_approver == SpecialApprover::None && !policy.has_explicit_approvers() {
        diags.add_error(NO_APPROVERS_SUMMARY, NO_APPROVERS_DETAIL);
    }

    if policy.entitlements.is_empty() {
        diags.add_attribute_error("entitlements", NO_ENTITLEMENTS_SUMMARY, NO_ENTITLEMENTS_DETAIL);
    }

    diags
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use policy_sdk::{Condition, Entitlement};

    fn valid_policy() -> Policy {
        Policy {
            owner: "user@company.com".to_owned(),
            name: "crosswire admins".to_owned(),
            entitlements: vec![Entitlement::new("CROSSWIRE", "CREATE", "ENTITLEMENT")],
            condition: Condition::any([Entitlement::new("CROSSWIRE", "GROUP", "ENGINEERING")]),
            special_approver: Some(SpecialApprover::None),
            user_approvers: vec!["approver@company.com".to_owned()],
            ..Policy::default()
        }
    }

    fn summaries(diags: &Diagnostics) -> Vec<&str> {
        diags.iter().map(|d| d.summary.as_str()).collect()
    }

    #[test]
    fn valid_policy_has_no_findings() {
        assert!(validate_policy(&valid_policy()).is_empty());
    }

    #[test]
    fn auto_with_ttl_is_rejected() {
        let policy = Policy {
            special_approver: Some(SpecialApprover::Auto),
            ttl: Some(3600),
            ..valid_policy()
        };
        assert_eq!(summaries(&validate_policy(&policy)), [AUTO_WITH_TTL_SUMMARY]);
    }

    #[test]
    fn auto_with_zero_ttl_is_accepted() {
        let policy = Policy {
            special_approver: Some(SpecialApprover::Auto),
            ttl: Some(0),
            ..valid_policy()
        };
        assert!(validate_policy(&policy).is_empty());
    }

    #[test]
    fn missing_approvers_only_matter_without_special_approver() {
        let mut policy = Policy {
            user_approvers: Vec::new(),
            special_approver: None,
            ..valid_policy()
        };
        assert_eq!(summaries(&validate_policy(&policy)), [NO_APPROVERS_SUMMARY]);

        policy.entitlement_approvers = vec![Entitlement::new("OKTA", "GROUP", "LEADS")];
        assert!(validate_policy(&policy).is_empty());

        policy.entitlement_approvers.clear();
        for special in [
            SpecialApprover::Auto,
            SpecialApprover::SelfApproval,
            SpecialApprover::Manager,
        ] {
            policy.special_approver = Some(special);
            assert!(validate_policy(&policy).is_empty(), "{special}");
        }
    }

    #[test]
    fn missing_entitlements_is_attribute_scoped() {
        let policy = Policy {
            entitlements: Vec::new(),
            ..valid_policy()
        };
        let diags = validate_policy(&policy);
        assert_eq!(diags.len(), 1);
        let finding = diags.iter().next().unwrap();
        assert_eq!(finding.summary, NO_ENTITLEMENTS_SUMMARY);
        assert_eq!(finding.attribute.as_deref(), Some("entitlements"));
    }

    #[test]
    fn rules_are_not_short_circuited() {
        let policy = Policy {
            special_approver: Some(SpecialApprover::Auto),
            ttl: Some(3600),
            entitlements: Vec::new(),
            user_approvers: Vec::new(),
            ..valid_policy()
        };
        let diags = validate_policy(&policy);
        assert_eq!(diags.errors().count(), 2);
        assert_eq!(
            summaries(&diags),
            [AUTO_WITH_TTL_SUMMARY, NO_ENTITLEMENTS_SUMMARY]
        );
    }
}
