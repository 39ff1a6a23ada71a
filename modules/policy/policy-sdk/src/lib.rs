#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Crosswire Policy SDK
//!
//! This crate provides the public API for Crosswire policies:
//!
//! - [`Policy`], [`Condition`], [`Entitlement`] - Domain models
//! - [`wire`] - Codec between the models and the service's JSON documents
//! - [`Diagnostics`] - Severity-tagged findings
//! - [`PolicyApiClient`] - Remote operations of the service
//! - [`PolicyLifecycle`] - Create/read/update/delete/validate contract
//! - [`CrosswireError`] - Error types
//!
//! ## Usage
//!
//! ```ignore
//! use policy_sdk::{Condition, Entitlement, Policy, wire};
//!
//! let policy = Policy {
//!     owner: "owner@company.com".to_owned(),
//!     name: "admins".to_owned(),
//!     entitlements: vec![Entitlement::new("CROSSWIRE", "ROLE", "ADMIN")],
//!     condition: Condition::any([Entitlement::new("CROSSWIRE", "GROUP", "ENG")]),
//!     ..Policy::default()
//! };
//!
//! let body = wire::encode_policy(&policy)?;
//! let echoed = wire::decode_policy(&body)?;
//! ```

pub mod api;
pub mod diagnostics;
pub mod error;
pub mod models;
pub mod wire;

// Re-export main types at crate root
pub use api::{PolicyApiClient, PolicyLifecycle};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::{CrosswireError, TraceId};
pub use models::{
    ApprovalBehavior, Condition, Entitlement, ParseEnumError, Policy, Quantifier, SpecialApprover,
};
pub use wire::DecodeError;
