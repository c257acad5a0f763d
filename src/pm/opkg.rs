//! opkg/ipk backend.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{complementary_candidates, run_install, run_transaction, PackageManager, PmSettings};
use crate::error::{SdkError, SdkResult};
use crate::fsops;
use crate::process::Cmd;

/// State directory opkg keeps inside its root.
pub const OPKG_STATE_DIR: &str = "var/lib/opkg";

/// Priority step between consecutive architectures in the opkg config.
const ARCH_PRIORITY_STEP: usize = 5;

/// opkg bound to one sysroot and one config file.
#[derive(Debug, Clone)]
pub struct OpkgPm {
    settings: PmSettings,
    config_file: PathBuf,
    feed_uris: Vec<String>,
}

impl OpkgPm {
    /// `config_file` is where the generated opkg config is written; the SDK
    /// later ships a copy of it.
    pub fn new(settings: PmSettings, config_file: impl Into<PathBuf>) -> Self {
        Self {
            settings,
            config_file: config_file.into(),
            feed_uris: Vec::new(),
        }
    }

    /// Consume published feeds instead of the local deploy dir.
    pub fn with_feed_uris(mut self, uris: Vec<String>) -> Self {
        self.feed_uris = uris;
        self
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    fn opkg(&self) -> Cmd {
        Cmd::new("opkg")
            .arg("-f")
            .arg_path(&self.config_file)
            .arg("-o")
            .arg_path(&self.settings.root)
            .arg("--force_postinstall")
            .arg("--prefer-arch-to-version")
    }

    /// opkg config text: arch priorities, then package sources.
    ///
    /// The best architecture gets the highest priority.
    pub fn render_config(&self) -> String {
        let mut out = String::new();
        let archs = self.settings.archs.all_archs();
        let count = archs.len();
        for (idx, arch) in archs.iter().enumerate() {
            let priority = 1 + ARCH_PRIORITY_STEP * (count - 1 - idx);
            let _ = writeln!(out, "arch {} {}", arch, priority);
        }

        if self.feed_uris.is_empty() {
            let _ = writeln!(out, "src oe file:{}", self.settings.deploy_dir.display());
            for (arch, dir) in self.settings.feed_dirs() {
                let _ = writeln!(out, "src oe-{} file:{}", arch, dir.display());
            }
        } else {
            for (n, uri) in self.feed_uris.iter().enumerate() {
                for arch in &archs {
                    let _ = writeln!(
                        out,
                        "src/gz uri-{}-{} {}/{}",
                        arch,
                        n,
                        uri.trim_end_matches('/'),
                        arch
                    );
                }
            }
        }
        out
    }

    fn list_installed(&self) -> SdkResult<Vec<String>> {
        let stdout = run_transaction("opkg list-installed", self.opkg().arg("list-installed"))?;
        Ok(stdout
            .lines()
            .filter_map(|line| line.split(" - ").next())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect())
    }
}

impl PackageManager for OpkgPm {
    fn root(&self) -> &Path {
        &self.settings.root
    }

    fn create_configs(&mut self) -> SdkResult<()> {
        fsops::ensure_dir(&self.settings.root)?;
        fsops::write_file(&self.config_file, &self.render_config())?;
        debug!(config = %self.config_file.display(), "wrote opkg config");
        Ok(())
    }

    fn write_index(&mut self) -> SdkResult<()> {
        for (arch, dir) in self.settings.feed_dirs() {
            let packages = dir.join("Packages");
            info!(arch, "indexing opkg feed");
            run_transaction(
                "opkg-make-index",
                Cmd::new("opkg-make-index")
                    .arg("-r")
                    .arg_path(&packages)
                    .arg("-p")
                    .arg_path(&packages)
                    .arg("-m")
                    .arg_path(&dir),
            )?;
        }
        Ok(())
    }

    fn dump_all_available_pkgs(&mut self) -> SdkResult<()> {
        let stdout = run_transaction("opkg list", self.opkg().arg("list"))?;
        fsops::write_file(&self.settings.work_file("available_pkgs"), &stdout)
    }

    fn update(&mut self) -> SdkResult<()> {
        run_transaction("opkg update", self.opkg().arg("update")).map(|_| ())
    }

    fn install(&mut self, packages: &[String], _attempt_only: bool) -> SdkResult<()> {
        if packages.is_empty() {
            return Ok(());
        }
        run_install(packages, self.opkg().arg("install").args(packages))
    }

    fn install_complementary(&mut self, globs: Option<&str>) -> SdkResult<()> {
        let Some(globs) = globs.filter(|g| !g.trim().is_empty()) else {
            return Ok(());
        };
        let installed = self.list_installed()?;
        let candidates = complementary_candidates(&installed, globs);
        if candidates.is_empty() {
            return Ok(());
        }
        info!(count = candidates.len(), "installing complementary packages");
        self.install(&candidates, true)
    }

    fn remove_packaging_data(&mut self) -> SdkResult<()> {
        fsops::remove_path(&self.settings.root.join(OPKG_STATE_DIR))
            .map_err(|e| SdkError::backend("removing opkg data", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::ArchPreferences;
    use crate::pm::SysrootRole;
    use std::fs;
    use tempfile::TempDir;

    fn pm(temp: &TempDir) -> OpkgPm {
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
        OpkgPm::new(settings, temp.path().join("opkg.conf"))
    }

    #[test]
    fn test_config_gives_best_arch_highest_priority() {
        let temp = TempDir::new().unwrap();
        let text = pm(&temp).render_config();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "arch core2-64 11");
        assert_eq!(lines[1], "arch x86_64 6");
        assert_eq!(lines[2], "arch all 1");
        assert!(text.contains("src oe-core2-64 file:"));
        assert!(!text.contains("src oe-x86_64"));
    }

    #[test]
    fn test_feed_uris_replace_local_sources() {
        let temp = TempDir::new().unwrap();
        let text = pm(&temp)
            .with_feed_uris(vec!["http://feeds.example/ipk/".into()])
            .render_config();
        assert!(text.contains("src/gz uri-core2-64-0 http://feeds.example/ipk/core2-64"));
        assert!(!text.contains("file:"));
    }

    #[test]
    fn test_create_configs_writes_file() {
        let temp = TempDir::new().unwrap();
        let mut opkg = pm(&temp);
        opkg.create_configs().unwrap();
        assert!(opkg.config_file().exists());
        assert!(temp.path().join("root").is_dir());
    }

    #[test]
    fn test_remove_packaging_data() {
        let temp = TempDir::new().unwrap();
        let mut opkg = pm(&temp);
        fs::create_dir_all(temp.path().join("root/var/lib/opkg/info")).unwrap();
        opkg.remove_packaging_data().unwrap();
        assert!(!temp.path().join("root/var/lib/opkg").exists());
        assert!(temp.path().join("root/var/lib").exists());
    }

    #[test]
    fn test_empty_install_is_noop() {
        let temp = TempDir::new().unwrap();
        pm(&temp).install(&[], false).unwrap();
    }
}
