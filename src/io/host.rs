//! Host-derived signals: hostname, architecture info, launcher lookup.

use std::env;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::core::tags::{ArchInfo, LauncherProbe};
use crate::error::ConfigError;

/// Host name as reported by the kernel.
pub fn hostname() -> Result<String, ConfigError> {
    let name = gethostname::gethostname().to_string_lossy().into_owned();
    if name.is_empty() {
        return Err(ConfigError::EmptyHostname);
    }
    Ok(name)
}

/// Broader family names per architecture, narrow to broad.
const ARCH_ANCESTRY: &[(&str, &[&str])] = &[
    ("x86_64", &["x86"]),
    ("aarch64", &["arm"]),
    ("powerpc64", &["ppc64le"]),
];

/// Architecture info provider backed by a static ancestry table.
#[derive(Debug, Clone)]
pub struct HostArch {
    name: String,
    ancestors: Vec<String>,
}

impl HostArch {
    /// Detect from the compiled target architecture.
    pub fn detect() -> Self {
        Self::from_name(env::consts::ARCH)
    }

    pub fn from_name(name: &str) -> Self {
        let ancestors = ARCH_ANCESTRY
            .iter()
            .find(|(arch, _)| *arch == name)
            .map(|(_, ancestors)| ancestors.iter().map(|a| (*a).to_string()).collect())
            .unwrap_or_default();
        Self {
            name: name.to_string(),
            ancestors,
        }
    }
}

impl ArchInfo for HostArch {
    fn name(&self) -> &str {
        &self.name
    }

    fn ancestor_names(&self) -> &[String] {
        &self.ancestors
    }
}

/// Looks for executable launcher binaries on `$PATH`.
pub struct PathProbe;

impl LauncherProbe for PathProbe {
    fn exists(&self, binary: &str) -> bool {
        let Some(path_var) = env::var_os("PATH") else {
            return false;
        };
        env::split_paths(&path_var).any(|dir| is_executable(&dir.join(binary)))
    }
}

fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_architecture_reports_ancestors() {
        let arch = HostArch::from_name("x86_64");
        assert_eq!(arch.name(), "x86_64");
        assert_eq!(arch.ancestor_names(), ["x86"]);
    }

    #[test]
    fn unknown_architecture_has_no_ancestors() {
        let arch = HostArch::from_name("riscv64");
        assert!(arch.ancestor_names().is_empty());
    }

    #[test]
    fn executable_file_is_detected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("bsub");
        fs::write(&path, "#!/bin/sh\n").expect("write");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod");
        assert!(is_executable(&path));
    }

    #[test]
    fn plain_file_is_not_executable() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("notes");
        fs::write(&path, "data").expect("write");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).expect("chmod");
        assert!(!is_executable(&path));
    }

    #[test]
    fn missing_file_is_not_executable() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(!is_executable(&temp.path().join("missing")));
    }
}
