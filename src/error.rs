//! Failure taxonomy for a sync run.
//!
//! Local declaration problems ([`ConfigError`]) and permission problems
//! ([`PermissionError`]) surface before the first network call. Registry
//! transport failures ([`RegistryError`]) are produced by clients only and
//! wrapped into the run-level [`SyncError`] with the url and phase attached.

use std::path::PathBuf;

use thiserror::Error;

/// Malformed or ambiguous local declarations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("instance name '{instance}' collides with identity tag '{tag}'")]
    IdentityCollision { instance: String, tag: String },

    #[error("unknown executor kind '{0}' (not in the tag schema executor enum)")]
    UnknownExecutor(String),

    #[error("duplicate executor description '{0}'")]
    DuplicateDescription(String),

    #[error("invalid tag schema document: {0}")]
    InvalidSchema(String),

    #[error("host reports an empty hostname")]
    EmptyHostname,
}

/// Template or configuration directories readable beyond their owner.
///
/// Registration secrets live under these directories, so the run refuses to
/// proceed until access is restricted.
#[derive(Debug, Error)]
pub enum PermissionError {
    #[error("cannot stat {}: {source}", .path.display())]
    Inaccessible {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is accessible by group or other; restrict to owner only", .path.display())]
    TooPermissive { path: PathBuf },
}

/// Transport-level failure from a runner registry.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Run-level failure. Any variant aborts the run and nothing is persisted.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Permission(#[from] PermissionError),

    #[error("registry {url} failed during {phase}: {source}")]
    Registry {
        url: String,
        phase: &'static str,
        #[source]
        source: RegistryError,
    },

    #[error("executors left incomplete after sync: {}", .descriptions.join(", "))]
    Incomplete { descriptions: Vec<String> },

    #[error("load executor templates: {0}")]
    Templates(String),

    #[error("write runner agent configuration: {0}")]
    WriteConfig(String),
}
