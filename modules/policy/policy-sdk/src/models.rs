//! Domain models for Crosswire policies.
//!
//! The `Serialize` implementations produce the service's wire shape
//! (PascalCase keys, upper-case enum values). Decoding goes through the
//! explicit functions in [`crate::wire`].

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

/// Error returned when parsing one of the policy enums from a string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{value}' is not one of {expected}")]
pub struct ParseEnumError {
    /// The rejected input.
    pub value: String,
    /// Human-readable list of accepted values.
    pub expected: &'static str,
}

macro_rules! policy_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $expected:literal {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            /// Accepted values, upper-case.
            pub const VALUES: &'static str = $expected;

            /// Canonical wire representation.
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(
                    if s.eq_ignore_ascii_case($text) {
                        return Ok(Self::$variant);
                    }
                )+
                Err(ParseEnumError {
                    value: s.to_owned(),
                    expected: $expected,
                })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

policy_enum! {
    /// How a condition combines its entitlements and subconditions.
    Quantifier, "ANY, ALL" {
        /// At least one entitlement or subcondition must hold.
        #[default]
        Any => "ANY",
        /// Every entitlement and subcondition must hold.
        All => "ALL",
    }
}

policy_enum! {
    /// Approver that replaces explicit user/entitlement approvers.
    SpecialApprover, "NONE, AUTO, SELF, MANAGER" {
        /// Approval comes from the explicit approver lists.
        #[default]
        None => "NONE",
        /// Granted automatically while the requester is eligible.
        Auto => "AUTO",
        /// Granted as soon as it is requested.
        SelfApproval => "SELF",
        /// The requester's manager approves.
        Manager => "MANAGER",
    }
}

policy_enum! {
    /// Whether one or all approvers must sign off.
    ApprovalBehavior, "ANY, ALL" {
        #[default]
        Any => "ANY",
        All => "ALL",
    }
}

/// An atomic grant: a `(provider, subject, object)` triple.
///
/// All three parts are opaque identifiers owned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Entitlement {
    pub provider: String,
    pub subject: String,
    pub object: String,
}

impl Entitlement {
    #[must_use]
    pub fn new(
        provider: impl Into<String>,
        subject: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            subject: subject.into(),
            object: object.into(),
        }
    }
}

impl fmt::Display for Entitlement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.provider, self.subject, self.object)
    }
}

/// A node of the eligibility tree.
///
/// Satisfaction is evaluated by the service. The quantifier is only unset
/// when a condition was decoded from a response that omitted it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Condition {
    pub quantifier: Option<Quantifier>,
    pub entitlements: Vec<Entitlement>,
    pub subconditions: Vec<Condition>,
}

impl Condition {
    /// Empty condition with the given quantifier.
    #[must_use]
    pub fn new(quantifier: Quantifier) -> Self {
        Self {
            quantifier: Some(quantifier),
            entitlements: Vec::new(),
            subconditions: Vec::new(),
        }
    }

    /// `ANY` condition over the given entitlements.
    #[must_use]
    pub fn any(entitlements: impl IntoIterator<Item = Entitlement>) -> Self {
        Self::new(Quantifier::Any).with_entitlements(entitlements)
    }

    /// `ALL` condition over the given entitlements.
    #[must_use]
    pub fn all(entitlements: impl IntoIterator<Item = Entitlement>) -> Self {
        Self::new(Quantifier::All).with_entitlements(entitlements)
    }

    #[must_use]
    pub fn with_entitlements(mut self, entitlements: impl IntoIterator<Item = Entitlement>) -> Self {
        self.entitlements.extend(entitlements);
        self
    }

    #[must_use]
    pub fn with_subcondition(mut self, subcondition: Condition) -> Self {
        self.subconditions.push(subcondition);
        self
    }

    /// Number of levels in this tree; a condition without subconditions has depth 1.
    #[must_use]
    pub fn depth(&self) -> usize {
        1 + self
            .subconditions
            .iter()
            .map(Condition::depth)
            .max()
            .unwrap_or(0)
    }

    /// Total number of entitlements referenced anywhere in the tree.
    #[must_use]
    pub fn entitlement_count(&self) -> usize {
        self.entitlements.len()
            + self
                .subconditions
                .iter()
                .map(Condition::entitlement_count)
                .sum::<usize>()
    }
}

/// A Crosswire access policy.
///
/// `id` and `state` are assigned by the service and are `None` until the
/// policy has been created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Policy {
    /// Email address of the owning user.
    pub owner: String,
    /// Display and lookup name.
    pub name: String,
    /// What a holder of the policy is granted.
    pub entitlements: Vec<Entitlement>,
    /// Who is eligible to request the policy.
    pub condition: Condition,
    pub special_approver: Option<SpecialApprover>,
    pub approval_behavior: Option<ApprovalBehavior>,
    /// Email addresses of approving users.
    pub user_approvers: Vec<String>,
    /// Approvers identified by group membership.
    pub entitlement_approvers: Vec<Entitlement>,
    /// Maximum number of seconds a grant is held. Zero encodes as `null`.
    #[serde(serialize_with = "serialize_ttl")]
    pub ttl: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

#[allow(clippy::ref_option, clippy::trivially_copy_pass_by_ref)]
fn serialize_ttl<S: Serializer>(ttl: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error> {
    ttl.filter(|ttl| *ttl > 0).serialize(serializer)
}

impl Policy {
    /// Special approver, treating unset as [`SpecialApprover::None`].
    #[must_use]
    pub fn effective_special_approver(&self) -> SpecialApprover {
        self.special_approver.unwrap_or_default()
    }

    /// Approval behavior, treating unset as [`ApprovalBehavior::Any`].
    #[must_use]
    pub fn effective_approval_behavior(&self) -> ApprovalBehavior {
        self.approval_behavior.unwrap_or_default()
    }

    /// TTL in seconds when the policy actually expires; zero means no expiry.
    #[must_use]
    pub fn expiring_ttl(&self) -> Option<u64> {
        self.ttl.filter(|ttl| *ttl > 0)
    }

    /// Whether any user or entitlement approver is listed.
    #[must_use]
    pub fn has_explicit_approvers(&self) -> bool {
        !self.user_approvers.is_empty() || !self.entitlement_approvers.is_empty()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn enums_parse_case_insensitively() {
        assert_eq!("any".parse::<Quantifier>(), Ok(Quantifier::Any));
        assert_eq!("All".parse::<ApprovalBehavior>(), Ok(ApprovalBehavior::All));
        assert_eq!(
            "self".parse::<SpecialApprover>(),
            Ok(SpecialApprover::SelfApproval)
        );
        assert_eq!("MANAGER".parse::<SpecialApprover>(), Ok(SpecialApprover::Manager));

        let err = "SOME".parse::<Quantifier>().unwrap_err();
        assert_eq!(err.value, "SOME");
        assert_eq!(err.expected, "ANY, ALL");
    }

    #[test]
    fn enums_serialize_upper_case() {
        assert_eq!(
            serde_json::to_value(SpecialApprover::SelfApproval).unwrap(),
            serde_json::json!("SELF")
        );
        assert_eq!(SpecialApprover::SelfApproval.to_string(), "SELF");
        assert_eq!(Quantifier::All.as_str(), "ALL");
    }

    #[test]
    fn condition_depth_counts_levels() {
        let leaf = Condition::all([Entitlement::new("P", "S", "O")]);
        assert_eq!(leaf.depth(), 1);

        let tree = Condition::any([])
            .with_subcondition(Condition::any([]).with_subcondition(leaf.clone()))
            .with_subcondition(leaf);
        assert_eq!(tree.depth(), 3);
        assert_eq!(tree.entitlement_count(), 2);
    }

    #[test]
    fn unset_optionals_fall_back_to_defaults() {
        let policy = Policy {
            ttl: Some(0),
            ..Policy::default()
        };
        assert_eq!(policy.effective_special_approver(), SpecialApprover::None);
        assert_eq!(policy.effective_approval_behavior(), ApprovalBehavior::Any);
        assert_eq!(policy.expiring_ttl(), None);
        assert!(!policy.has_explicit_approvers());
    }
}
