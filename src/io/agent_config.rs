//! Writes the runner agent's `config.toml` from the operator's template.
//!
//! The template uses named fields only; the writer refuses nothing — callers
//! gate on completeness before anything reaches this module.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;
use tracing::info;

use crate::core::executors::ExecutorSet;
use crate::core::tags::HostIdentity;

/// Operator-supplied template under the prefix.
pub const CONFIG_TEMPLATE_FILE: &str = "config.template";
/// Rendered agent configuration under the prefix.
pub const CONFIG_FILE: &str = "config.toml";

/// Per-executor fields exposed to the template.
#[derive(Debug, Serialize)]
struct ExecutorContext {
    description: String,
    executor: String,
    url: String,
    token: String,
    tags: Vec<String>,
}

/// Render `<prefix>/config.template` and atomically replace
/// `<prefix>/config.toml`.
pub fn write_agent_config(prefix: &Path, identity: &HostIdentity, set: &ExecutorSet) -> Result<()> {
    let template_path = prefix.join(CONFIG_TEMPLATE_FILE);
    let raw = fs::read_to_string(&template_path)
        .with_context(|| format!("read {}", template_path.display()))?;

    let mut env = Environment::new();
    env.add_template("agent-config", &raw)
        .with_context(|| format!("parse {}", template_path.display()))?;
    let template = env
        .get_template("agent-config")
        .context("lookup agent config template")?;

    let executors: Vec<ExecutorContext> = set
        .executors()
        .iter()
        .map(|config| ExecutorContext {
            description: config.description.clone(),
            executor: config.executor.clone(),
            url: config.url.clone(),
            token: config.token.clone(),
            tags: config.unique_tags(),
        })
        .collect();
    let count = executors.len();

    let rendered = template
        .render(context! {
            hostname => identity.hostname(),
            instance => identity.instance(),
            executors => executors,
        })
        .with_context(|| format!("render {}", template_path.display()))?;

    let config_path = prefix.join(CONFIG_FILE);
    write_atomic(&config_path, &rendered)?;
    info!(path = %config_path.display(), executors = count, "wrote agent configuration");
    Ok(())
}

/// Whole-file replace via temp file + rename; no partial writes.
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::executors::ExecutorSet;
    use crate::core::schema::TagSchema;
    use crate::core::tags::{HostIdentity, TagGenerator};
    use crate::test_support::{ScriptedProbe, StaticArch, decl};

    const URL: &str = "https://gitlab.example.com/api/v4";

    fn completed_set(identity: &HostIdentity) -> ExecutorSet {
        let schema = TagSchema::bundled_default();
        let arch = StaticArch::new("x86_64", &["x86"]);
        let probe = ScriptedProbe::new(&[]);
        let generator = TagGenerator::new(&schema, identity, &arch, &probe);
        let mut set = ExecutorSet::new(vec![decl(URL, "shell", &[])]);
        set.normalize(&generator).expect("normalize");
        let _ = set.add_token("node03 main shell Runner", "tok-1");
        set
    }

    #[test]
    fn renders_tokens_into_config() {
        let temp = tempfile::tempdir().expect("tempdir");
        let identity = HostIdentity::new("node03", "main").expect("identity");
        let set = completed_set(&identity);

        let template = "hostname = \"{{ hostname }}\"\n\
            {% for executor in executors %}[[runners]]\n\
            name = \"{{ executor.description }}\"\n\
            token = \"{{ executor.token }}\"\n\
            {% endfor %}";
        fs::write(temp.path().join(CONFIG_TEMPLATE_FILE), template).expect("write template");

        write_agent_config(temp.path(), &identity, &set).expect("write config");
        let rendered = fs::read_to_string(temp.path().join(CONFIG_FILE)).expect("read config");
        assert!(rendered.contains("hostname = \"node03\""));
        assert!(rendered.contains("name = \"node03 main shell Runner\""));
        assert!(rendered.contains("token = \"tok-1\""));
    }

    #[test]
    fn missing_template_fails_without_writing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let identity = HostIdentity::new("node03", "main").expect("identity");
        let set = completed_set(&identity);

        let err = write_agent_config(temp.path(), &identity, &set).expect_err("no template");
        assert!(format!("{err:#}").contains(CONFIG_TEMPLATE_FILE));
        assert!(!temp.path().join(CONFIG_FILE).exists());
    }

    #[test]
    fn invalid_template_leaves_no_config_behind() {
        let temp = tempfile::tempdir().expect("tempdir");
        let identity = HostIdentity::new("node03", "main").expect("identity");
        let set = completed_set(&identity);

        fs::write(temp.path().join(CONFIG_TEMPLATE_FILE), "{% for %}").expect("write template");

        assert!(write_agent_config(temp.path(), &identity, &set).is_err());
        assert!(!temp.path().join(CONFIG_FILE).exists());
    }
}
