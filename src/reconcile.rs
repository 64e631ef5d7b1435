//! Desired-vs-actual convergence against one or more runner registries.
//!
//! Phases are explicit and ordered: discovery must precede registration,
//! otherwise an executor whose token was merely lost locally (e.g. after a
//! config wipe) would be registered a second time. An unchanged rerun
//! performs zero creates and deletes.

use tracing::{debug, info, instrument};

use crate::core::executors::{ExecutorSet, TokenUpdate};
use crate::core::tags::HostIdentity;
use crate::error::{RegistryError, SyncError};
use crate::io::registry::{RegistryClient, RunnerId, RunnerSummary};

/// One remote registry plus the credentials scoped to it.
pub struct Registry<'a> {
    pub url: &'a str,
    pub registration_secret: &'a str,
    pub client: &'a dyn RegistryClient,
}

/// What the restore phase did with the discovered runners.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    /// Descriptions whose token was reused from the registry.
    pub restored: Vec<String>,
    /// Runner ids deleted because their token no longer verifies.
    pub stale: Vec<RunnerId>,
    /// Runner ids deleted because no declared executor matches them.
    pub pruned: Vec<RunnerId>,
}

/// Descriptions registered during the registration phase.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RegisterReport {
    pub registered: Vec<String>,
}

/// Aggregate of one registry's convergence pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryReport {
    pub url: String,
    pub restore: RestoreReport,
    pub register: RegisterReport,
}

/// Discovery: runners on the registry owned by this host and instance.
pub fn discover(
    client: &dyn RegistryClient,
    identity: &HostIdentity,
) -> Result<Vec<RunnerSummary>, RegistryError> {
    client.list(&identity.tags())
}

/// Restore tokens from discovered runners; prune rows with no local owner.
///
/// A row whose token fails verification is deleted so the registration
/// phase replaces it in the same run — the registry has no token refresh.
pub fn restore_tokens(
    set: &mut ExecutorSet,
    client: &dyn RegistryClient,
    discovered: &[RunnerSummary],
) -> Result<RestoreReport, RegistryError> {
    let mut report = RestoreReport::default();
    for runner in discovered {
        let detail = client.get(runner.id)?;
        if !client.verify(&detail.token)? {
            client.delete(detail.id)?;
            info!(id = detail.id, description = %detail.description, "deleted stale registration");
            report.stale.push(detail.id);
            continue;
        }
        match set.add_token(&detail.description, &detail.token) {
            TokenUpdate::Applied => {
                debug!(description = %detail.description, "token restored");
                report.restored.push(detail.description);
            }
            TokenUpdate::UnknownDescription => {
                client.delete(detail.id)?;
                info!(id = detail.id, description = %detail.description, "pruned orphaned registration");
                report.pruned.push(detail.id);
            }
        }
    }
    Ok(report)
}

/// Register every declared executor for `url` still lacking a token.
///
/// Tokens are stored as returned, empty included; the completeness gate
/// after all registries decides whether the run may persist anything.
pub fn register_missing(
    set: &mut ExecutorSet,
    client: &dyn RegistryClient,
    url: &str,
    registration_secret: &str,
) -> Result<RegisterReport, RegistryError> {
    let mut report = RegisterReport::default();
    let worklist: Vec<(String, Vec<String>)> = set
        .missing_token(url)
        .iter()
        .map(|config| (config.description.clone(), config.unique_tags()))
        .collect();
    for (description, tags) in worklist {
        let token = client.create(&description, &tags, registration_secret)?;
        info!(description = %description, "registered runner");
        if set.add_token(&description, &token) == TokenUpdate::Applied {
            report.registered.push(description);
        }
    }
    Ok(report)
}

/// Converge every registry, strictly sequentially.
///
/// The first registry failure aborts the whole run; partial token progress
/// is discarded by the caller along with the set.
pub fn sync_runner_state(
    set: &mut ExecutorSet,
    identity: &HostIdentity,
    registries: &[Registry],
) -> Result<Vec<RegistryReport>, SyncError> {
    let mut reports = Vec::with_capacity(registries.len());
    for registry in registries {
        reports.push(sync_one(set, identity, registry)?);
    }
    Ok(reports)
}

#[instrument(skip_all, fields(url = registry.url))]
fn sync_one(
    set: &mut ExecutorSet,
    identity: &HostIdentity,
    registry: &Registry,
) -> Result<RegistryReport, SyncError> {
    let discovered = discover(registry.client, identity)
        .map_err(|source| registry_error(registry.url, "discovery", source))?;
    debug!(count = discovered.len(), "discovered runners");

    let restore = restore_tokens(set, registry.client, &discovered)
        .map_err(|source| registry_error(registry.url, "restore", source))?;

    let register = register_missing(set, registry.client, registry.url, registry.registration_secret)
        .map_err(|source| registry_error(registry.url, "registration", source))?;

    Ok(RegistryReport {
        url: registry.url.to_string(),
        restore,
        register,
    })
}

pub(crate) fn registry_error(url: &str, phase: &'static str, source: RegistryError) -> SyncError {
    SyncError::Registry {
        url: url.to_string(),
        phase,
        source,
    }
}
