#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Decoding documents shaped like real service responses.

use policy_sdk::wire::{decode_policy, decode_policy_lookup, encode_policy};
use policy_sdk::{ApprovalBehavior, DecodeError, Entitlement, Quantifier, SpecialApprover};
use serde_json::json;

fn lookup_document() -> serde_json::Value {
    json!({
        "traceId": "6f1c2d",
        "policies": {
            "pol_01": {
                "Id": "pol_01",
                "State": "ACTIVE",
                "Owner": "user@company.com",
                "Name": "release managers",
                "Entitlements": [
                    {"Provider": "CROSSWIRE", "Subject": "CREATE", "Object": "ENTITLEMENT"},
                    {"Provider": "CROSSWIRE", "Subject": "CREATE", "Object": "PROPOSAL"}
                ],
                "Condition": {
                    "Quantifier": "any",
                    "Entitlements": [{"Provider": "CROSSWIRE", "Subject": "ROLE", "Object": "ADMIN"}],
                    "Subconditions": [{
                        "Quantifier": "ALL",
                        "Entitlements": [
                            {"Provider": "CROSSWIRE", "Subject": "READ", "Object": "POLICY"},
                            {"Provider": "CROSSWIRE", "Subject": "CREATE", "Object": "POLICY"},
                            {"Provider": "CROSSWIRE", "Subject": "READ", "Object": "ENTITLEMENT"}
                        ],
                        "Subconditions": null
                    }]
                },
                "SpecialApprover": "NONE",
                "ApprovalBehavior": "all",
                "UserApprovers": ["approver@company.com"],
                "EntitlementApprovers": [{"Provider": "CROSSWIRE", "Subject": "APPROVE", "Object": "PROPOSAL"}],
                "Ttl": 86400,
                "CreatedAt": "2026-03-01T10:00:00Z"
            }
        }
    })
}

#[test]
fn lookup_document_decodes_to_full_policy() {
    let policy = decode_policy_lookup(&lookup_document()).unwrap().unwrap();

    assert_eq!(policy.id.as_deref(), Some("pol_01"));
    assert_eq!(policy.state.as_deref(), Some("ACTIVE"));
    assert_eq!(policy.entitlements.len(), 2);
    assert_eq!(policy.condition.quantifier, Some(Quantifier::Any));
    assert_eq!(policy.condition.depth(), 2);
    assert_eq!(policy.condition.entitlement_count(), 4);
    assert_eq!(
        policy.condition.subconditions[0].entitlements[2],
        Entitlement::new("CROSSWIRE", "READ", "ENTITLEMENT")
    );
    assert_eq!(policy.special_approver, Some(SpecialApprover::None));
    assert_eq!(policy.approval_behavior, Some(ApprovalBehavior::All));
    assert_eq!(policy.ttl, Some(86400));
}

#[test]
fn decoded_policy_encodes_with_canonical_values() {
    let policy = decode_policy_lookup(&lookup_document()).unwrap().unwrap();
    let encoded = encode_policy(&policy).unwrap();

    assert_eq!(encoded["Condition"]["Quantifier"], "ANY");
    assert_eq!(encoded["ApprovalBehavior"], "ALL");
    assert_eq!(encoded["Condition"]["Subconditions"][0]["Subconditions"], json!([]));
    assert_eq!(decode_policy(&encoded).unwrap(), policy);
}

#[test]
fn unknown_enum_value_is_reported_with_path() {
    let mut document = lookup_document();
    document["policies"]["pol_01"]["Condition"]["Subconditions"][0]["Quantifier"] = json!("MOST");

    let err = decode_policy_lookup(&document).unwrap_err();
    let DecodeError::InvalidValue { path, reason } = err else {
        panic!("expected InvalidValue");
    };
    assert_eq!(path, "policies.pol_01.Condition.Subconditions[0].Quantifier");
    assert!(reason.contains("MOST"));
}
