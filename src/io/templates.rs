//! Executor template directory: one TOML file per registry.
//!
//! Templates are strongly typed and validated once at load time; unknown
//! fields are rejected rather than looked up ad hoc.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use tracing::debug;

use crate::core::executors::ExecutorDecl;

/// Instance-level template file: registry coordinates plus executor slots.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunnerTemplate {
    pub url: String,
    /// Shared secret used only to create new registrations.
    pub registration_token: String,
    /// API token used to list, inspect, and delete registrations.
    pub personal_access_token: String,
    #[serde(default)]
    pub executors: BTreeMap<String, ExecutorTemplate>,
}

/// Per-executor declaration within a template file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ExecutorTemplate {
    pub env_tags: Vec<String>,
}

impl RunnerTemplate {
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(anyhow!("url must be set"));
        }
        if self.registration_token.trim().is_empty() {
            return Err(anyhow!("registration_token must be set"));
        }
        if self.personal_access_token.trim().is_empty() {
            return Err(anyhow!("personal_access_token must be set"));
        }
        Ok(())
    }
}

/// Credentials for one registry url.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryCredentials {
    pub registration_token: String,
    pub personal_access_token: String,
}

/// Everything declared for one instance.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    pub declarations: Vec<ExecutorDecl>,
    /// url -> credentials; the first template file naming a url wins.
    credentials: Vec<(String, RegistryCredentials)>,
}

impl TemplateSet {
    pub fn credentials_for(&self, url: &str) -> Option<&RegistryCredentials> {
        self.credentials
            .iter()
            .find(|(candidate, _)| candidate == url)
            .map(|(_, credentials)| credentials)
    }
}

/// Load every `*.toml` template under `dir`.
///
/// Files are processed sorted by name so declaration order, and with it the
/// registry processing order, is deterministic.
pub fn load_templates(dir: &Path) -> Result<TemplateSet> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("read template directory {}", dir.display()))?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry =
            entry.with_context(|| format!("read template directory {}", dir.display()))?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "toml") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut set = TemplateSet::default();
    for path in paths {
        let contents =
            fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        let template: RunnerTemplate =
            toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
        template
            .validate()
            .with_context(|| format!("validate {}", path.display()))?;
        debug!(
            path = %path.display(),
            url = %template.url,
            executors = template.executors.len(),
            "loaded template"
        );

        if set.credentials_for(&template.url).is_none() {
            set.credentials.push((
                template.url.clone(),
                RegistryCredentials {
                    registration_token: template.registration_token.clone(),
                    personal_access_token: template.personal_access_token.clone(),
                },
            ));
        }
        for (kind, executor) in &template.executors {
            set.declarations.push(ExecutorDecl {
                url: template.url.clone(),
                executor: kind.clone(),
                env_tags: executor.env_tags.clone(),
            });
        }
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = r#"
url = "https://gitlab.example.com/api/v4"
registration_token = "reg-secret"
personal_access_token = "api-token"

[executors.batch]
env_tags = ["toss"]

[executors.container]
"#;

    #[test]
    fn loads_declarations_and_credentials() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("gitlab.toml"), TEMPLATE).expect("write");

        let set = load_templates(temp.path()).expect("load");
        assert_eq!(set.declarations.len(), 2);
        // BTreeMap keys: batch sorts before container
        assert_eq!(set.declarations[0].executor, "batch");
        assert_eq!(set.declarations[0].env_tags, ["toss"]);
        assert_eq!(set.declarations[1].executor, "container");

        let credentials = set
            .credentials_for("https://gitlab.example.com/api/v4")
            .expect("credentials");
        assert_eq!(credentials.registration_token, "reg-secret");
        assert_eq!(credentials.personal_access_token, "api-token");
    }

    #[test]
    fn non_toml_files_are_ignored() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("README.md"), "not a template").expect("write");

        let set = load_templates(temp.path()).expect("load");
        assert!(set.declarations.is_empty());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let contents = r#"
url = "https://gitlab.example.com/api/v4"
registration_token = "reg"
personal_access_token = "api"
admin_token = "legacy"
"#;
        fs::write(temp.path().join("gitlab.toml"), contents).expect("write");

        let err = load_templates(temp.path()).expect_err("unknown field");
        assert!(format!("{err:#}").contains("gitlab.toml"));
    }

    #[test]
    fn missing_secret_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let contents = r#"
url = "https://gitlab.example.com/api/v4"
registration_token = ""
personal_access_token = "api"
"#;
        fs::write(temp.path().join("gitlab.toml"), contents).expect("write");

        let err = load_templates(temp.path()).expect_err("empty secret");
        assert!(format!("{err:#}").contains("registration_token"));
    }

    #[test]
    fn first_template_wins_for_shared_url() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("a.toml"), TEMPLATE).expect("write");
        let second = TEMPLATE.replace("reg-secret", "other-secret");
        let second = second.replace("[executors.batch]", "[executors.shell]");
        fs::write(temp.path().join("b.toml"), second).expect("write");

        let set = load_templates(temp.path()).expect("load");
        let credentials = set
            .credentials_for("https://gitlab.example.com/api/v4")
            .expect("credentials");
        assert_eq!(credentials.registration_token, "reg-secret");
    }
}
