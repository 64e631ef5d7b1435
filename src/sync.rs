//! One full synchronization run for an instance.

use std::fs;
use std::path::Path;

use tracing::{debug, info, instrument};

use crate::core::executors::ExecutorSet;
use crate::core::schema::TagSchema;
use crate::core::tags::{ArchInfo, HostIdentity, LauncherProbe, TagGenerator};
use crate::error::{ConfigError, SyncError};
use crate::io::agent_config::write_agent_config;
use crate::io::permissions::ensure_owner_only;
use crate::io::registry::{ClientFactory, RegistryClient};
use crate::io::templates::load_templates;
use crate::reconcile::{Registry, RegistryReport, registry_error, sync_runner_state};

/// Optional file under the prefix overriding the bundled tag schema.
pub const TAG_SCHEMA_FILE: &str = "tag-schema.json";

/// Host signals injected by `main` and scripted by tests.
pub struct HostContext<'a> {
    pub hostname: String,
    pub arch: &'a dyn ArchInfo,
    pub probe: &'a dyn LauncherProbe,
}

/// Outcome of a successful run, for operator logging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSummary {
    pub executors: usize,
    pub reports: Vec<RegistryReport>,
}

/// Run the full pipeline for `<prefix>/<instance>`.
///
/// Ordering is load-bearing: the permission gate runs before any
/// substantive file read, every local validation runs before the first
/// network call, and nothing is persisted unless the whole run succeeds.
#[instrument(skip_all, fields(prefix = %prefix.display(), instance = %instance))]
pub fn run_sync(
    prefix: &Path,
    instance: &str,
    host: &HostContext,
    factory: &dyn ClientFactory,
) -> Result<SyncSummary, SyncError> {
    let instance_dir = prefix.join(instance);
    ensure_owner_only(prefix)?;
    ensure_owner_only(&instance_dir)?;

    let schema = load_tag_schema(prefix)?;
    let identity = HostIdentity::new(&host.hostname, instance)?;

    let templates = load_templates(&instance_dir)
        .map_err(|err| SyncError::Templates(format!("{err:#}")))?;
    let mut set = ExecutorSet::new(templates.declarations.clone());
    let generator = TagGenerator::new(&schema, &identity, host.arch, host.probe);
    set.normalize(&generator)?;

    let urls: Vec<String> = set.urls().into_iter().map(str::to_string).collect();
    let mut clients: Vec<(String, String, Box<dyn RegistryClient>)> =
        Vec::with_capacity(urls.len());
    for url in &urls {
        let credentials = templates
            .credentials_for(url)
            .ok_or_else(|| SyncError::Templates(format!("no credentials declared for {url}")))?;
        let client = factory
            .client(url, &credentials.personal_access_token)
            .map_err(|source| registry_error(url, "client setup", source))?;
        clients.push((url.clone(), credentials.registration_token.clone(), client));
    }
    let registries: Vec<Registry> = clients
        .iter()
        .map(|(url, secret, client)| Registry {
            url: url.as_str(),
            registration_secret: secret.as_str(),
            client: client.as_ref(),
        })
        .collect();

    let reports = sync_runner_state(&mut set, &identity, &registries)?;

    let incomplete = set.missing_required();
    if !incomplete.is_empty() {
        return Err(SyncError::Incomplete {
            descriptions: incomplete
                .iter()
                .map(|config| config.description.clone())
                .collect(),
        });
    }

    write_agent_config(prefix, &identity, &set)
        .map_err(|err| SyncError::WriteConfig(format!("{err:#}")))?;

    info!(
        executors = set.executors().len(),
        registries = urls.len(),
        "converged runner registrations"
    );
    Ok(SyncSummary {
        executors: set.executors().len(),
        reports,
    })
}

/// Load the operator's tag schema document, falling back to the bundled one.
fn load_tag_schema(prefix: &Path) -> Result<TagSchema, ConfigError> {
    let path = prefix.join(TAG_SCHEMA_FILE);
    if !path.exists() {
        debug!("using bundled tag schema document");
        return Ok(TagSchema::bundled_default());
    }
    let raw = fs::read_to_string(&path)
        .map_err(|err| ConfigError::InvalidSchema(format!("read {}: {err}", path.display())))?;
    TagSchema::from_json(&raw)
}
