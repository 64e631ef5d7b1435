//! Owner-only permission gate for configuration directories.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::error::PermissionError;

/// Mode bits granting group or other any access.
const GROUP_OTHER_MASK: u32 = 0o077;

/// Reject `path` unless only its owner can access it.
///
/// Registration secrets and API tokens live under the gated directories,
/// so the run aborts here before any template read or network call.
pub fn ensure_owner_only(path: &Path) -> Result<(), PermissionError> {
    let metadata = fs::metadata(path).map_err(|source| PermissionError::Inaccessible {
        path: path.to_path_buf(),
        source,
    })?;
    if metadata.permissions().mode() & GROUP_OTHER_MASK != 0 {
        return Err(PermissionError::TooPermissive {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_mode(path: &Path, mode: u32) {
        fs::set_permissions(path, fs::Permissions::from_mode(mode)).expect("set mode");
    }

    #[test]
    fn owner_only_directory_passes() {
        let temp = tempfile::tempdir().expect("tempdir");
        set_mode(temp.path(), 0o700);
        ensure_owner_only(temp.path()).expect("owner only");
    }

    #[test]
    fn group_readable_directory_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        set_mode(temp.path(), 0o750);
        let err = ensure_owner_only(temp.path()).expect_err("too permissive");
        assert!(matches!(err, PermissionError::TooPermissive { .. }));
    }

    #[test]
    fn other_readable_directory_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        set_mode(temp.path(), 0o704);
        assert!(ensure_owner_only(temp.path()).is_err());
    }

    #[test]
    fn missing_path_is_inaccessible() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = ensure_owner_only(&temp.path().join("missing")).expect_err("missing");
        assert!(matches!(err, PermissionError::Inaccessible { .. }));
    }
}
