//! Package manager backends.
//!
//! The SDK adapters only talk to [`PackageManager`]. How a backend resolves
//! dependencies or lays out its database is its own business; the concrete
//! backends here drive the host tools of each packaging technology:
//!
//! - [`rpm::RpmPm`] - `createrepo_c` + `dnf --installroot`
//! - [`opkg::OpkgPm`] - `opkg-make-index` + `opkg -o`
//! - [`dpkg::DpkgPm`] - `apt-ftparchive` + `apt-get`
//!
//! Every backend instance is bound to exactly one sysroot.

pub mod dpkg;
pub mod opkg;
pub mod rpm;

use std::fmt;
use std::path::{Path, PathBuf};

use crate::arch::ArchPreferences;
use crate::error::{SdkError, SdkResult};
use crate::process::{Cmd, CmdError};

/// Which sysroot a backend instance serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SysrootRole {
    Target,
    Host,
}

impl fmt::Display for SysrootRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SysrootRole::Target => write!(f, "target"),
            SysrootRole::Host => write!(f, "host"),
        }
    }
}

/// Contract every package manager backend fulfils.
///
/// Install failures are always returned; deciding whether a failure is
/// fatal (mandatory category) or tolerated (attempt-only) happens at the
/// call site.
pub trait PackageManager {
    /// Root directory this instance installs into.
    fn root(&self) -> &Path;

    /// Write the backend's configuration for this sysroot.
    fn create_configs(&mut self) -> SdkResult<()>;

    /// Regenerate the local package index from the deploy directory.
    fn write_index(&mut self) -> SdkResult<()>;

    /// Record the list of installable packages.
    fn dump_all_available_pkgs(&mut self) -> SdkResult<()>;

    /// Refresh the package database from the prepared index.
    fn update(&mut self) -> SdkResult<()>;

    /// Install `packages` in one transaction.
    fn install(&mut self, packages: &[String], attempt_only: bool) -> SdkResult<()>;

    /// Install packages implied by feature globs such as `*-dev`.
    fn install_complementary(&mut self, globs: Option<&str>) -> SdkResult<()>;

    /// Strip the backend's own bookkeeping from the sysroot.
    fn remove_packaging_data(&mut self) -> SdkResult<()>;
}

/// Connection parameters shared by the command-driven backends.
#[derive(Debug, Clone)]
pub struct PmSettings {
    pub role: SysrootRole,
    /// Sysroot the backend installs into.
    pub root: PathBuf,
    /// Architecture preferences, best match first.
    pub archs: ArchPreferences,
    /// Vendor id, e.g. `-poky`.
    pub vendor: String,
    /// Names assumed present without being installed.
    pub provides: Vec<String>,
    /// Local package feed, one subdirectory per architecture.
    pub deploy_dir: PathBuf,
    /// Scratch space for generated configs and dumps.
    pub work_dir: PathBuf,
}

impl PmSettings {
    /// Architecture subdirectories of the deploy dir that exist, best first.
    pub fn feed_dirs(&self) -> Vec<(String, PathBuf)> {
        self.archs
            .all_archs()
            .into_iter()
            .map(|arch| {
                let dir = self.deploy_dir.join(&arch);
                (arch, dir)
            })
            .filter(|(_, dir)| dir.is_dir())
            .collect()
    }

    /// File under the work dir, prefixed with the role.
    pub fn work_file(&self, name: &str) -> PathBuf {
        self.work_dir.join(format!("{}_{}", self.role, name))
    }
}

/// Expand complementary globs against the installed package list.
///
/// A glob with one `*` is substituted with every installed name (`*-dev`
/// on `zlib` gives `zlib-dev`); a name without `*` is taken literally.
/// Already-installed names and repeats are dropped.
pub fn complementary_candidates(installed: &[String], globs: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for pattern in globs.split_whitespace() {
        if pattern.matches('*').count() == 1 {
            let Ok(matcher) = glob::Pattern::new(pattern) else {
                continue;
            };
            for pkg in installed {
                if matcher.matches(pkg) {
                    continue;
                }
                let candidate = pattern.replacen('*', pkg, 1);
                if !installed.contains(&candidate) && !out.contains(&candidate) {
                    out.push(candidate);
                }
            }
        } else if !pattern.contains('*')
            && !installed.iter().any(|p| p == pattern)
            && !out.iter().any(|p| p == pattern)
        {
            out.push(pattern.to_string());
        }
    }
    out
}

/// Run a backend command, mapping failure to a transaction error.
pub(crate) fn run_transaction(operation: &'static str, cmd: Cmd) -> SdkResult<String> {
    cmd.run()
        .map(|r| r.stdout)
        .map_err(|e| SdkError::backend(operation, e))
}

/// Run an install command, mapping failure to an install error.
pub(crate) fn run_install(packages: &[String], cmd: Cmd) -> SdkResult<()> {
    cmd.run().map(|_| ()).map_err(|e: CmdError| SdkError::Install {
        packages: packages.join(" "),
        detail: e.to_string(),
    })
}

#[cfg(test)]
pub(crate) mod stub {
    use super::*;

    /// Backend that does nothing but remember which operations ran.
    #[derive(Debug, Default)]
    pub(crate) struct StubPm {
        pub root: PathBuf,
        pub calls: Vec<&'static str>,
    }

    impl StubPm {
        pub fn at(root: impl Into<PathBuf>) -> Self {
            Self {
                root: root.into(),
                calls: Vec::new(),
            }
        }
    }

    impl PackageManager for StubPm {
        fn root(&self) -> &Path {
            &self.root
        }
        fn create_configs(&mut self) -> SdkResult<()> {
            self.calls.push("create_configs");
            Ok(())
        }
        fn write_index(&mut self) -> SdkResult<()> {
            self.calls.push("write_index");
            Ok(())
        }
        fn dump_all_available_pkgs(&mut self) -> SdkResult<()> {
            self.calls.push("dump_all_available_pkgs");
            Ok(())
        }
        fn update(&mut self) -> SdkResult<()> {
            self.calls.push("update");
            Ok(())
        }
        fn install(&mut self, _packages: &[String], _attempt_only: bool) -> SdkResult<()> {
            self.calls.push("install");
            Ok(())
        }
        fn install_complementary(&mut self, _globs: Option<&str>) -> SdkResult<()> {
            self.calls.push("install_complementary");
            Ok(())
        }
        fn remove_packaging_data(&mut self) -> SdkResult<()> {
            self.calls.push("remove_packaging_data");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_complementary_candidates() {
        let installed = names(&["zlib", "busybox", "zlib-dev"]);
        let got = complementary_candidates(&installed, "*-dev *-dbg");
        assert_eq!(
            got,
            names(&["busybox-dev", "zlib-dbg", "busybox-dbg", "zlib-dev-dbg"])
        );
    }

    #[test]
    fn test_complementary_literal_names() {
        let installed = names(&["busybox"]);
        let got = complementary_candidates(&installed, "busybox gdb gdb");
        assert_eq!(got, names(&["gdb"]));
    }

    #[test]
    fn test_feed_dirs_only_existing_best_first() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("deploy/all")).unwrap();
        fs::create_dir_all(temp.path().join("deploy/core2-64")).unwrap();
        let settings = PmSettings {
            role: SysrootRole::Target,
            root: temp.path().join("root"),
            archs: ArchPreferences::from_declared(["all", "x86_64", "core2-64"], "linux"),
            vendor: "-oe".into(),
            provides: Vec::new(),
            deploy_dir: temp.path().join("deploy"),
            work_dir: temp.path().join("work"),
        };
        let dirs: Vec<String> = settings.feed_dirs().into_iter().map(|(a, _)| a).collect();
        assert_eq!(dirs, names(&["core2-64", "all"]));
        assert_eq!(
            settings.work_file("available_pkgs"),
            temp.path().join("work/target_available_pkgs")
        );
    }
}
