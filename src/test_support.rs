//! Test-only fakes and fixtures.

use std::collections::HashSet;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};

use crate::core::executors::ExecutorDecl;
use crate::core::tags::{ArchInfo, LauncherProbe};
use crate::error::RegistryError;
use crate::io::agent_config::{CONFIG_FILE, CONFIG_TEMPLATE_FILE};
use crate::io::registry::{
    ClientFactory, RegistryClient, RunnerDetail, RunnerId, RunnerSummary,
};

/// Build a raw executor declaration.
pub fn decl(url: &str, executor: &str, env_tags: &[&str]) -> ExecutorDecl {
    ExecutorDecl {
        url: url.to_string(),
        executor: executor.to_string(),
        env_tags: env_tags.iter().map(|tag| (*tag).to_string()).collect(),
    }
}

/// Architecture provider with a fixed name and ancestry.
pub struct StaticArch {
    name: String,
    ancestors: Vec<String>,
}

impl StaticArch {
    pub fn new(name: &str, ancestors: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            ancestors: ancestors.iter().map(|a| (*a).to_string()).collect(),
        }
    }
}

impl ArchInfo for StaticArch {
    fn name(&self) -> &str {
        &self.name
    }

    fn ancestor_names(&self) -> &[String] {
        &self.ancestors
    }
}

/// Probe reporting exactly the configured binaries as present.
pub struct ScriptedProbe {
    present: HashSet<String>,
}

impl ScriptedProbe {
    pub fn new(present: &[&str]) -> Self {
        Self {
            present: present.iter().map(|binary| (*binary).to_string()).collect(),
        }
    }
}

impl LauncherProbe for ScriptedProbe {
    fn exists(&self, binary: &str) -> bool {
        self.present.contains(binary)
    }
}

/// In-memory registry row.
#[derive(Debug, Clone)]
pub struct FakeRow {
    pub id: RunnerId,
    pub description: String,
    pub token: String,
    pub tag_list: Vec<String>,
}

#[derive(Debug, Default)]
struct RegistryState {
    rows: Vec<FakeRow>,
    next_id: RunnerId,
    stale_tokens: HashSet<String>,
    created: Vec<String>,
    deleted: Vec<RunnerId>,
    registration_secrets: Vec<String>,
    lists: usize,
    fail_with: Option<RegistryError>,
    issue_empty_tokens: bool,
}

/// Scripted in-memory registry. Clones share state, so a test can keep one
/// handle for assertions while the run owns another.
#[derive(Debug, Clone, Default)]
pub struct FakeRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pre-existing registration row; returns its id.
    pub fn seed(&self, description: &str, token: &str, tag_list: &[&str]) -> RunnerId {
        let mut state = self.lock();
        state.next_id += 1;
        let id = state.next_id;
        state.rows.push(FakeRow {
            id,
            description: description.to_string(),
            token: token.to_string(),
            tag_list: tag_list.iter().map(|tag| (*tag).to_string()).collect(),
        });
        id
    }

    /// Make `token` fail verification from now on.
    pub fn mark_stale(&self, token: &str) {
        self.lock().stale_tokens.insert(token.to_string());
    }

    /// Fail every subsequent call with a clone of `err`.
    pub fn fail_with(&self, err: RegistryError) {
        self.lock().fail_with = Some(err);
    }

    /// Make registration return an empty token.
    pub fn issue_empty_tokens(&self) {
        self.lock().issue_empty_tokens = true;
    }

    pub fn rows(&self) -> Vec<FakeRow> {
        self.lock().rows.clone()
    }

    pub fn token_for(&self, description: &str) -> Option<String> {
        self.lock()
            .rows
            .iter()
            .find(|row| row.description == description)
            .map(|row| row.token.clone())
    }

    pub fn created(&self) -> Vec<String> {
        self.lock().created.clone()
    }

    pub fn deleted(&self) -> Vec<RunnerId> {
        self.lock().deleted.clone()
    }

    pub fn registration_secrets(&self) -> Vec<String> {
        self.lock().registration_secrets.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.lock().lists
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().expect("registry state lock")
    }

    fn check_fail(state: &RegistryState) -> Result<(), RegistryError> {
        match &state.fail_with {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl RegistryClient for FakeRegistry {
    fn list(&self, tag_filter: &[String]) -> Result<Vec<RunnerSummary>, RegistryError> {
        let mut state = self.lock();
        Self::check_fail(&state)?;
        state.lists += 1;
        Ok(state
            .rows
            .iter()
            .filter(|row| tag_filter.iter().all(|tag| row.tag_list.contains(tag)))
            .map(|row| RunnerSummary {
                id: row.id,
                description: row.description.clone(),
                tag_list: row.tag_list.clone(),
            })
            .collect())
    }

    fn get(&self, id: RunnerId) -> Result<RunnerDetail, RegistryError> {
        let state = self.lock();
        Self::check_fail(&state)?;
        state
            .rows
            .iter()
            .find(|row| row.id == id)
            .map(|row| RunnerDetail {
                id: row.id,
                description: row.description.clone(),
                token: row.token.clone(),
                tag_list: row.tag_list.clone(),
            })
            .ok_or_else(|| RegistryError::Protocol(format!("no runner {id}")))
    }

    fn create(
        &self,
        description: &str,
        tag_list: &[String],
        registration_secret: &str,
    ) -> Result<String, RegistryError> {
        let mut state = self.lock();
        Self::check_fail(&state)?;
        state.next_id += 1;
        let id = state.next_id;
        let token = if state.issue_empty_tokens {
            String::new()
        } else {
            format!("token-{id}")
        };
        state.rows.push(FakeRow {
            id,
            description: description.to_string(),
            token: token.clone(),
            tag_list: tag_list.to_vec(),
        });
        state.created.push(description.to_string());
        state.registration_secrets.push(registration_secret.to_string());
        Ok(token)
    }

    fn delete(&self, id: RunnerId) -> Result<(), RegistryError> {
        let mut state = self.lock();
        Self::check_fail(&state)?;
        state.rows.retain(|row| row.id != id);
        state.deleted.push(id);
        Ok(())
    }

    fn verify(&self, token: &str) -> Result<bool, RegistryError> {
        let state = self.lock();
        Self::check_fail(&state)?;
        Ok(!state.stale_tokens.contains(token) && state.rows.iter().any(|row| row.token == token))
    }
}

/// Client factory handing out shared [`FakeRegistry`] handles by url.
#[derive(Default)]
pub struct FakeFactory {
    registries: Vec<(String, FakeRegistry)>,
}

impl FakeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, url: &str, registry: FakeRegistry) {
        self.registries.push((url.to_string(), registry));
    }
}

impl ClientFactory for FakeFactory {
    fn client(
        &self,
        url: &str,
        _access_token: &str,
    ) -> Result<Box<dyn RegistryClient>, RegistryError> {
        self.registries
            .iter()
            .find(|(candidate, _)| candidate == url)
            .map(|(_, registry)| Box::new(registry.clone()) as Box<dyn RegistryClient>)
            .ok_or_else(|| RegistryError::Connection(format!("no registry at {url}")))
    }
}

/// Passthrough agent config template for end-to-end runs.
pub const DEFAULT_CONFIG_TEMPLATE: &str = "concurrent = 4
{% for executor in executors %}
[[runners]]
  name = \"{{ executor.description }}\"
  url = \"{{ executor.url }}\"
  token = \"{{ executor.token }}\"
  executor = \"{{ executor.executor }}\"
{% endfor %}
";

/// Temporary `<prefix>/<instance>` layout with owner-only permissions.
pub struct TestPrefix {
    temp: tempfile::TempDir,
    instance: String,
}

impl TestPrefix {
    pub fn new(instance: &str) -> Result<Self> {
        let temp = tempfile::tempdir().context("create tempdir")?;
        set_mode(temp.path(), 0o700)?;
        let instance_dir = temp.path().join(instance);
        fs::create_dir(&instance_dir).context("create instance dir")?;
        set_mode(&instance_dir, 0o700)?;
        fs::write(temp.path().join(CONFIG_TEMPLATE_FILE), DEFAULT_CONFIG_TEMPLATE)
            .context("write config template")?;
        Ok(Self {
            temp,
            instance: instance.to_string(),
        })
    }

    pub fn prefix(&self) -> &Path {
        self.temp.path()
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn instance_dir(&self) -> PathBuf {
        self.temp.path().join(&self.instance)
    }

    /// Write an executor template file under the instance directory.
    pub fn write_template(&self, name: &str, contents: &str) -> Result<()> {
        fs::write(self.instance_dir().join(name), contents).context("write template")
    }

    pub fn chmod_instance(&self, mode: u32) -> Result<()> {
        set_mode(&self.instance_dir(), mode)
    }

    pub fn config_path(&self) -> PathBuf {
        self.temp.path().join(CONFIG_FILE)
    }

    pub fn read_config(&self) -> Result<String> {
        fs::read_to_string(self.config_path()).context("read rendered config")
    }
}

fn set_mode(path: &Path, mode: u32) -> Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .with_context(|| format!("chmod {}", path.display()))
}
