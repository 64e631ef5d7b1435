//! Capability seam to a remote runner registry.
//!
//! The reconciler only sees [`RegistryClient`]; the GitLab implementation
//! lives in [`crate::io::gitlab`] and tests script
//! `test_support::FakeRegistry`.

use serde::Deserialize;

use crate::error::RegistryError;

pub type RunnerId = u64;

/// Registry listing row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunnerSummary {
    pub id: RunnerId,
    pub description: String,
    #[serde(default)]
    pub tag_list: Vec<String>,
}

/// Full registry record, token included.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunnerDetail {
    pub id: RunnerId,
    pub description: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub tag_list: Vec<String>,
}

/// Runner registry operations the reconciler depends on.
///
/// Each call is one bounded request/response; timeout policy belongs to the
/// transport. Registry records are never mutated in place, only created and
/// deleted.
pub trait RegistryClient {
    /// Runners tagged with all of `tag_filter`.
    fn list(&self, tag_filter: &[String]) -> Result<Vec<RunnerSummary>, RegistryError>;

    fn get(&self, id: RunnerId) -> Result<RunnerDetail, RegistryError>;

    /// Register a runner; returns the per-runner token issued by the
    /// registry.
    fn create(
        &self,
        description: &str,
        tag_list: &[String],
        registration_secret: &str,
    ) -> Result<String, RegistryError>;

    fn delete(&self, id: RunnerId) -> Result<(), RegistryError>;

    /// Whether the registry still accepts `token`. A `false` answer is an
    /// expected condition, not a failure.
    fn verify(&self, token: &str) -> Result<bool, RegistryError>;
}

/// Builds a client for a registry url.
///
/// The seam `sync` uses so tests can hand out scripted registries.
pub trait ClientFactory {
    fn client(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<Box<dyn RegistryClient>, RegistryError>;
}
