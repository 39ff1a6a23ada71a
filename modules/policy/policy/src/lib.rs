//! Crosswire Policy Module
//!
//! Manages Crosswire access policies from declarative configuration: an HTTP
//! client for the Crosswire service, the policy validation rules, the
//! lifecycle service and the `crosswire_policy` resource callbacks.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod client;
pub mod config;
pub mod domain;
pub mod provider;

pub use client::HttpPolicyClient;
pub use config::{CrosswireConfig, ProviderSettings};
pub use domain::{PolicyResource, PolicyResourceModel, Service};
pub use provider::CrosswireProvider;
