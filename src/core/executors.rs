//! Desired state: the executor configurations declared for one instance.

use std::collections::{HashMap, HashSet};

use crate::core::tags::TagGenerator;
use crate::error::ConfigError;

/// Raw executor declaration as read from a template file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorDecl {
    pub url: String,
    pub executor: String,
    pub env_tags: Vec<String>,
}

/// One runner slot: a declared executor annotated with generated state.
///
/// `tags` and `description` are computed by [`ExecutorSet::normalize`];
/// `token` stays empty until restored from or issued by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    pub url: String,
    pub executor: String,
    pub env_tags: Vec<String>,
    pub tags: Vec<String>,
    pub description: String,
    pub token: String,
}

impl ExecutorConfig {
    /// A config may be persisted only when every field below is present.
    pub fn is_complete(&self) -> bool {
        !self.url.is_empty()
            && !self.executor.is_empty()
            && !self.description.is_empty()
            && !self.token.is_empty()
            && !self.tags.is_empty()
    }

    /// Tags with duplicates removed, first occurrence wins.
    ///
    /// The generated list may repeat tags; only the serialized form needs
    /// them unique.
    pub fn unique_tags(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.tags
            .iter()
            .filter(|tag| seen.insert(tag.as_str()))
            .cloned()
            .collect()
    }
}

/// Outcome of applying a registry token to the set by identity key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum TokenUpdate {
    /// A declared executor matched and now holds the token.
    Applied,
    /// No declared executor has this description (orphaned remote state).
    UnknownDescription,
}

/// The executor configurations declared locally for one instance.
///
/// Built fresh on every run; the only durable state is the token, which
/// round-trips through the registry and the written agent configuration.
#[derive(Debug, Clone, Default)]
pub struct ExecutorSet {
    executors: Vec<ExecutorConfig>,
    index: HashMap<String, usize>,
}

impl ExecutorSet {
    /// Collect raw declarations; annotation happens in [`Self::normalize`].
    pub fn new(declared: Vec<ExecutorDecl>) -> Self {
        let executors = declared
            .into_iter()
            .map(|decl| ExecutorConfig {
                url: decl.url,
                executor: decl.executor,
                env_tags: decl.env_tags,
                tags: Vec::new(),
                description: String::new(),
                token: String::new(),
            })
            .collect();
        Self {
            executors,
            index: HashMap::new(),
        }
    }

    /// Compute tags and descriptions, then build the description index.
    ///
    /// The description is the join key between local and remote state, so
    /// two declarations normalizing to the same description are a
    /// configuration error, detected here at index build.
    pub fn normalize(&mut self, generator: &TagGenerator) -> Result<(), ConfigError> {
        for config in &mut self.executors {
            config.tags = generator.generate(&config.executor, &config.env_tags)?;
            config.description = generator.identity().description(&config.executor);
        }
        let mut index = HashMap::with_capacity(self.executors.len());
        for (position, config) in self.executors.iter().enumerate() {
            if index.insert(config.description.clone(), position).is_some() {
                return Err(ConfigError::DuplicateDescription(config.description.clone()));
            }
        }
        self.index = index;
        Ok(())
    }

    /// Registration worklist: configs for `url` still lacking a token.
    pub fn missing_token(&self, url: &str) -> Vec<&ExecutorConfig> {
        self.executors
            .iter()
            .filter(|config| config.url == url && config.token.is_empty())
            .collect()
    }

    /// Apply a token to the config with this identity key.
    pub fn add_token(&mut self, description: &str, token: &str) -> TokenUpdate {
        match self.index.get(description) {
            Some(&position) => {
                self.executors[position].token = token.to_string();
                TokenUpdate::Applied
            }
            None => TokenUpdate::UnknownDescription,
        }
    }

    /// Configs failing the completeness requirement; must be empty before
    /// anything is persisted.
    pub fn missing_required(&self) -> Vec<&ExecutorConfig> {
        self.executors
            .iter()
            .filter(|config| !config.is_complete())
            .collect()
    }

    pub fn executors(&self) -> &[ExecutorConfig] {
        &self.executors
    }

    /// Distinct registry urls in declaration order.
    pub fn urls(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.executors
            .iter()
            .map(|config| config.url.as_str())
            .filter(|url| seen.insert(*url))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::TagSchema;
    use crate::core::tags::{HostIdentity, TagGenerator};
    use crate::test_support::{ScriptedProbe, StaticArch, decl};

    const URL: &str = "https://gitlab.example.com/api/v4";

    fn normalized(declared: Vec<ExecutorDecl>) -> Result<ExecutorSet, ConfigError> {
        let schema = TagSchema::bundled_default();
        let identity = HostIdentity::new("node03", "main").expect("identity");
        let arch = StaticArch::new("x86_64", &["x86"]);
        let probe = ScriptedProbe::new(&[]);
        let generator = TagGenerator::new(&schema, &identity, &arch, &probe);
        let mut set = ExecutorSet::new(declared);
        set.normalize(&generator)?;
        Ok(set)
    }

    #[test]
    fn normalize_fills_tags_and_description() {
        let set = normalized(vec![decl(URL, "batch", &["toss"])]).expect("normalize");
        let config = &set.executors()[0];
        assert_eq!(config.description, "node03 main batch Runner");
        assert!(config.tags.contains(&"toss".to_string()));
        assert!(config.token.is_empty());
    }

    #[test]
    fn duplicate_descriptions_are_rejected() {
        let err = normalized(vec![decl(URL, "batch", &[]), decl(URL, "batch", &[])])
            .expect_err("duplicate");
        assert!(matches!(err, ConfigError::DuplicateDescription(_)));
    }

    #[test]
    fn missing_token_filters_by_url() {
        let other = "https://other.example.com/api/v4";
        let mut set =
            normalized(vec![decl(URL, "batch", &[]), decl(other, "shell", &[])]).expect("set");

        assert_eq!(set.missing_token(URL).len(), 1);
        let applied = set.add_token("node03 main batch Runner", "secret-token");
        assert_eq!(applied, TokenUpdate::Applied);
        assert!(set.missing_token(URL).is_empty());
        assert_eq!(set.missing_token(other).len(), 1);
    }

    #[test]
    fn add_token_reports_unknown_descriptions() {
        let mut set = normalized(vec![decl(URL, "batch", &[])]).expect("set");
        let outcome = set.add_token("node03 main container Runner", "tok");
        assert_eq!(outcome, TokenUpdate::UnknownDescription);
    }

    #[test]
    fn missing_required_reports_tokenless_configs() {
        let mut set = normalized(vec![decl(URL, "batch", &[])]).expect("set");
        assert_eq!(set.missing_required().len(), 1);

        let applied = set.add_token("node03 main batch Runner", "tok");
        assert_eq!(applied, TokenUpdate::Applied);
        assert!(set.missing_required().is_empty());
    }

    #[test]
    fn empty_token_does_not_satisfy_completeness() {
        let mut set = normalized(vec![decl(URL, "batch", &[])]).expect("set");
        let applied = set.add_token("node03 main batch Runner", "");
        assert_eq!(applied, TokenUpdate::Applied);
        assert_eq!(set.missing_required().len(), 1);
    }

    #[test]
    fn unique_tags_preserve_first_occurrence_order() {
        let config = ExecutorConfig {
            url: URL.to_string(),
            executor: "shell".to_string(),
            env_tags: Vec::new(),
            tags: ["a", "b", "a", "c", "b"].map(str::to_string).to_vec(),
            description: "d".to_string(),
            token: "t".to_string(),
        };
        assert_eq!(config.unique_tags(), ["a", "b", "c"]);
    }

    #[test]
    fn urls_are_distinct_in_declaration_order() {
        let other = "https://other.example.com/api/v4";
        let set =
            normalized(vec![decl(URL, "batch", &[]), decl(other, "shell", &[])]).expect("set");
        assert_eq!(set.urls(), vec![URL, other]);
    }
}
