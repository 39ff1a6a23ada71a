//! Wire codec between the domain models and the service's JSON documents.
//!
//! Encoding is plain serde serialization of the models. Decoding walks an
//! untyped [`Value`] with one function per type, checking the shape of every
//! field and reporting the JSON path of the first offending value.

use std::str::FromStr;

use serde_json::{Map, Value};

use crate::models::{Condition, Entitlement, ParseEnumError, Policy};

/// Key of the lookup response wrapping policies by id.
pub const POLICIES_KEY: &str = "policies";

/// Errors produced while decoding service documents.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("missing field `{path}`")]
    MissingField { path: String },

    #[error("field `{path}` has the wrong type: expected {expected}, found {found}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("field `{path}` has an invalid value: {reason}")]
    InvalidValue { path: String, reason: String },

    #[error("found {count} policies, expected at most 1")]
    MultipleResults { count: usize },

    #[error("policy listed under key '{key}' has id '{id}'")]
    KeyMismatch { key: String, id: String },
}

impl DecodeError {
    fn type_mismatch(path: &str, expected: &'static str, found: &Value) -> Self {
        Self::TypeMismatch {
            path: display_path(path),
            expected,
            found: kind(found),
        }
    }

    fn missing(path: &str) -> Self {
        Self::MissingField {
            path: display_path(path),
        }
    }
}

/// Serialize a policy into the request body document.
///
/// # Errors
///
/// Returns the serializer error; the models contain no values that fail to
/// serialize, so this only surfaces serde internals.
pub fn encode_policy(policy: &Policy) -> Result<Value, serde_json::Error> {
    serde_json::to_value(policy)
}

/// Decode a single entitlement mapping.
///
/// # Errors
///
/// Fails when the value is not a mapping or any of its three string fields
/// is missing or not a string.
pub fn decode_entitlement(value: &Value) -> Result<Entitlement, DecodeError> {
    entitlement_at(value, "")
}

/// Decode a condition tree of any depth.
///
/// Missing `Quantifier`, `Entitlements` or `Subconditions` keys are
/// tolerated at every level; present values must have the right shape.
///
/// # Errors
///
/// Fails on the first value with an unexpected shape.
pub fn decode_condition(value: &Value) -> Result<Condition, DecodeError> {
    condition_at(value, "")
}

/// Decode a full policy document.
///
/// # Errors
///
/// Fails when `Owner`, `Name` or `Condition` is missing, or when any field
/// has an unexpected shape.
pub fn decode_policy(value: &Value) -> Result<Policy, DecodeError> {
    policy_at(value, "")
}

/// Decode a lookup response of the form `{"policies": {<id>: <policy>}}`.
///
/// Returns `Ok(None)` when the wrapper is absent, `null` or empty.
///
/// # Errors
///
/// - [`DecodeError::MultipleResults`] when more than one policy is listed
/// - [`DecodeError::KeyMismatch`] when the key differs from the policy's `Id`
/// - any policy decode error
pub fn decode_policy_lookup(body: &Value) -> Result<Option<Policy>, DecodeError> {
    let root = as_object(body, "")?;
    let policies = match root.get(POLICIES_KEY) {
        None | Some(Value::Null) => return Ok(None),
        Some(value) => as_object(value, POLICIES_KEY)?,
    };

    if policies.len() > 1 {
        return Err(DecodeError::MultipleResults {
            count: policies.len(),
        });
    }

    let Some((key, value)) = policies.iter().next() else {
        return Ok(None);
    };

    let path = join(POLICIES_KEY, key);
    let policy = policy_at(value, &path)?;
    match policy.id.as_deref() {
        Some(id) if id == key => Ok(Some(policy)),
        Some(id) => Err(DecodeError::KeyMismatch {
            key: key.clone(),
            id: id.to_owned(),
        }),
        None => Err(DecodeError::missing(&join(&path, "Id"))),
    }
}

fn policy_at(value: &Value, path: &str) -> Result<Policy, DecodeError> {
    let obj = as_object(value, path)?;

    let condition = match obj.get("Condition") {
        None | Some(Value::Null) => return Err(DecodeError::missing(&join(path, "Condition"))),
        Some(value) => condition_at(value, &join(path, "Condition"))?,
    };

    Ok(Policy {
        owner: required_str(obj, "Owner", path)?,
        name: required_str(obj, "Name", path)?,
        entitlements: entitlements_at(obj, "Entitlements", path)?,
        condition,
        special_approver: optional_enum(obj, "SpecialApprover", path)?,
        approval_behavior: optional_enum(obj, "ApprovalBehavior", path)?,
        user_approvers: strings_at(obj, "UserApprovers", path)?,
        entitlement_approvers: entitlements_at(obj, "EntitlementApprovers", path)?,
        ttl: ttl_at(obj, path)?,
        id: optional_str(obj, "Id", path)?,
        state: optional_str(obj, "State", path)?,
    })
}

fn condition_at(value: &Value, path: &str) -> Result<Condition, DecodeError> {
    let obj = as_object(value, path)?;

    let quantifier = optional_enum(obj, "Quantifier", path)?;
    let entitlements = entitlements_at(obj, "Entitlements", path)?;

    let subconditions_path = join(path, "Subconditions");
    let subconditions = optional_array(obj, "Subconditions", path)?
        .iter()
        .enumerate()
        .map(|(i, item)| condition_at(item, &index(&subconditions_path, i)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Condition {
        quantifier,
        entitlements,
        subconditions,
    })
}

fn entitlement_at(value: &Value, path: &str) -> Result<Entitlement, DecodeError> {
    let obj = as_object(value, path)?;
    Ok(Entitlement {
        provider: required_str(obj, "Provider", path)?,
        subject: required_str(obj, "Subject", path)?,
        object: required_str(obj, "Object", path)?,
    })
}

fn entitlements_at(
    obj: &Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<Vec<Entitlement>, DecodeError> {
    let list_path = join(path, key);
    optional_array(obj, key, path)?
        .iter()
        .enumerate()
        .map(|(i, item)| entitlement_at(item, &index(&list_path, i)))
        .collect()
}

fn strings_at(obj: &Map<String, Value>, key: &str, path: &str) -> Result<Vec<String>, DecodeError> {
    let list_path = join(path, key);
    optional_array(obj, key, path)?
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::String(s) => Ok(s.clone()),
            other => Err(DecodeError::type_mismatch(
                &index(&list_path, i),
                "string",
                other,
            )),
        })
        .collect()
}

/// `Ttl`: absent, `null`, zero and negative values all mean "no TTL".
fn ttl_at(obj: &Map<String, Value>, path: &str) -> Result<Option<u64>, DecodeError> {
    match obj.get("Ttl") {
        None | Some(Value::Null) => Ok(None),
        Some(value @ Value::Number(n)) => {
            if let Some(ttl) = n.as_u64() {
                Ok((ttl > 0).then_some(ttl))
            } else if n.is_i64() {
                tracing::debug!(ttl = %n, "ignoring negative TTL");
                Ok(None)
            } else {
                Err(DecodeError::type_mismatch(&join(path, "Ttl"), "integer", value))
            }
        }
        Some(other) => Err(DecodeError::type_mismatch(
            &join(path, "Ttl"),
            "integer",
            other,
        )),
    }
}

fn required_str(obj: &Map<String, Value>, key: &str, path: &str) -> Result<String, DecodeError> {
    match obj.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        None | Some(Value::Null) => Err(DecodeError::missing(&join(path, key))),
        Some(other) => Err(DecodeError::type_mismatch(&join(path, key), "string", other)),
    }
}

fn optional_str(
    obj: &Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<Option<String>, DecodeError> {
    match obj.get(key) {
        Some(Value::String(s)) => Ok(Some(s.clone())),
        None | Some(Value::Null) => Ok(None),
        Some(other) => Err(DecodeError::type_mismatch(&join(path, key), "string", other)),
    }
}

/// Absent, `null` and empty strings decode to `None`.
fn optional_enum<T>(obj: &Map<String, Value>, key: &str, path: &str) -> Result<Option<T>, DecodeError>
where
    T: FromStr<Err = ParseEnumError>,
{
    match optional_str(obj, key, path)? {
        None => Ok(None),
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|e: ParseEnumError| DecodeError::InvalidValue {
                path: display_path(&join(path, key)),
                reason: e.to_string(),
            }),
    }
}

/// Absent and `null` sequences decode as empty.
fn optional_array<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<&'a [Value], DecodeError> {
    match obj.get(key) {
        Some(Value::Array(items)) => Ok(items),
        None | Some(Value::Null) => Ok(&[]),
        Some(other) => Err(DecodeError::type_mismatch(&join(path, key), "array", other)),
    }
}

fn as_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, DecodeError> {
    value
        .as_object()
        .ok_or_else(|| DecodeError::type_mismatch(path, "object", value))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_owned()
    } else {
        format!("{path}.{key}")
    }
}

fn index(path: &str, i: usize) -> String {
    format!("{path}[{i}]")
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        "<root>".to_owned()
    } else {
        path.to_owned()
    }
}
