//! Host identity and capability tag generation.
//!
//! Tags are opaque case-sensitive strings. Generation order is preserved for
//! readable output; all matching downstream is set-based, so the generated
//! list may legally repeat a tag.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::schema::TagSchema;
use crate::error::ConfigError;

/// Tag applied to every registration this tool manages.
pub const MANAGED_TAG: &str = "managed";

/// Executor kind that triggers the scheduler launcher probe.
pub const BATCH_EXECUTOR: &str = "batch";

/// Launcher binary -> scheduler tag, probed in this order; first hit wins
/// and at most one scheduler tag is appended.
pub const SCHEDULER_LAUNCHERS: [(&str, &str); 3] =
    [("bsub", "lsf"), ("salloc", "slurm"), ("cqsub", "cobalt")];

static TRAILING_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+$").expect("trailing digit pattern should compile"));

/// Host CPU architecture: its name plus broader family names.
pub trait ArchInfo {
    fn name(&self) -> &str;
    /// Ancestor names in the provider's reported order; must be stable
    /// across calls so generated tag lists stay deterministic.
    fn ancestor_names(&self) -> &[String];
}

/// Locates launcher binaries on the executable search path.
pub trait LauncherProbe {
    fn exists(&self, binary: &str) -> bool;
}

/// Fixed identifiers scoping registry discovery to this host and instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    hostname: String,
    cluster: String,
    instance: String,
}

impl HostIdentity {
    /// Build the identity for a host/instance pair.
    ///
    /// An instance name equal to any computed identifier is rejected: the
    /// identity tags double as the discovery filter, and a collision would
    /// make the local-vs-remote join ambiguous.
    pub fn new(hostname: &str, instance: &str) -> Result<Self, ConfigError> {
        let cluster = TRAILING_DIGITS.replace(hostname, "").into_owned();
        for tag in [hostname, cluster.as_str(), MANAGED_TAG] {
            if instance == tag {
                return Err(ConfigError::IdentityCollision {
                    instance: instance.to_string(),
                    tag: tag.to_string(),
                });
            }
        }
        Ok(Self {
            hostname: hostname.to_string(),
            cluster,
            instance: instance.to_string(),
        })
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Identity tag set, in generation order.
    pub fn tags(&self) -> Vec<String> {
        vec![
            self.hostname.clone(),
            self.cluster.clone(),
            MANAGED_TAG.to_string(),
            self.instance.clone(),
        ]
    }

    /// Stable identity key for one executor slot.
    pub fn description(&self, executor: &str) -> String {
        format!("{} {} {} Runner", self.hostname, self.instance, executor)
    }
}

/// Derives the capability tag list for one executor slot.
///
/// Deterministic given its collaborators: the same schema, identity,
/// architecture, and probe results always yield the same list.
pub struct TagGenerator<'a> {
    schema: &'a TagSchema,
    identity: &'a HostIdentity,
    arch: &'a dyn ArchInfo,
    probe: &'a dyn LauncherProbe,
}

impl<'a> TagGenerator<'a> {
    pub fn new(
        schema: &'a TagSchema,
        identity: &'a HostIdentity,
        arch: &'a dyn ArchInfo,
        probe: &'a dyn LauncherProbe,
    ) -> Self {
        Self {
            schema,
            identity,
            arch,
            probe,
        }
    }

    pub fn identity(&self) -> &HostIdentity {
        self.identity
    }

    /// Generate tags for an executor kind plus its requested environment
    /// markers.
    ///
    /// Markers are classified in priority order: schema `os` enum, schema
    /// `executor` enum, the architecture ancestor set (absorbed, since the
    /// architecture tags appended at the end already imply them), schema
    /// `architecture` enum. Anything else becomes a namespaced custom tag.
    pub fn generate(
        &self,
        executor: &str,
        env_markers: &[String],
    ) -> Result<Vec<String>, ConfigError> {
        let mut tags = self.identity.tags();

        if !self.schema.is_executor(executor) {
            return Err(ConfigError::UnknownExecutor(executor.to_string()));
        }
        tags.push(executor.to_string());

        for marker in env_markers {
            if self.schema.is_os(marker) || self.schema.is_executor(marker) {
                tags.push(marker.clone());
            } else if self.is_arch_ancestor(marker) {
                // implied by the architecture tags appended below
            } else if self.schema.is_architecture(marker) {
                tags.push(marker.clone());
            } else {
                tags.push(self.schema.custom_tag(marker));
            }
        }

        if executor == BATCH_EXECUTOR {
            if let Some(scheduler) = self.scheduler_tag() {
                tags.push(scheduler.to_string());
            }
        }

        tags.push(self.arch.name().to_string());
        tags.extend(self.arch.ancestor_names().iter().cloned());
        Ok(tags)
    }

    fn is_arch_ancestor(&self, marker: &str) -> bool {
        self.arch.ancestor_names().iter().any(|name| name == marker)
    }

    /// First scheduler whose launcher binary is present.
    fn scheduler_tag(&self) -> Option<&'static str> {
        SCHEDULER_LAUNCHERS
            .iter()
            .find(|(binary, _)| self.probe.exists(binary))
            .map(|(_, tag)| *tag)
    }
}
