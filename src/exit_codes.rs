//! Stable exit codes for the sync CLI.

use crate::error::SyncError;

/// Every declared executor converged and configuration was written.
pub const OK: i32 = 0;
/// Malformed or ambiguous local declarations.
pub const CONFIG: i32 = 1;
/// Template or configuration directories accessible beyond their owner.
pub const PERMISSIONS: i32 = 2;
/// A registry call failed with an auth, connection, or protocol error.
pub const SYNC: i32 = 3;
/// An executor was still missing a required field after a full pass.
pub const INCOMPLETE: i32 = 4;

/// Map a run failure to its exit code.
pub fn for_error(err: &SyncError) -> i32 {
    match err {
        SyncError::Config(_) | SyncError::Templates(_) | SyncError::WriteConfig(_) => CONFIG,
        SyncError::Permission(_) => PERMISSIONS,
        SyncError::Registry { .. } => SYNC,
        SyncError::Incomplete { .. } => INCOMPLETE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, RegistryError};

    #[test]
    fn registry_failures_map_to_sync_code() {
        let err = SyncError::Registry {
            url: "https://gitlab.example.com".to_string(),
            phase: "discovery",
            source: RegistryError::Connection("refused".to_string()),
        };
        assert_eq!(for_error(&err), SYNC);
    }

    #[test]
    fn config_failures_map_to_config_code() {
        let err = SyncError::Config(ConfigError::UnknownExecutor("warp".to_string()));
        assert_eq!(for_error(&err), CONFIG);
    }
}
