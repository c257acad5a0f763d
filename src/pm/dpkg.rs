//! Debian/dpkg backend driven through apt.
//!
//! apt reads its configuration from `APT_CONFIG`; that variable is set on
//! each apt child process, not on this process.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{complementary_candidates, run_install, run_transaction, PackageManager, PmSettings};
use crate::error::{SdkError, SdkResult};
use crate::fsops;
use crate::process::Cmd;

/// dpkg database directory inside its root.
pub const DPKG_STATE_DIR: &str = "var/lib/dpkg";

/// apt pin priority of the best architecture; each next one gets 5 less.
const BEST_PIN_PRIORITY: usize = 801;

/// apt/dpkg bound to one sysroot and one apt configuration directory.
#[derive(Debug, Clone)]
pub struct DpkgPm {
    settings: PmSettings,
    /// dpkg architecture name, e.g. `amd64`.
    dpkg_arch: String,
    apt_conf_dir: PathBuf,
}

impl DpkgPm {
    pub fn new(settings: PmSettings, dpkg_arch: impl Into<String>, apt_conf_dir: impl Into<PathBuf>) -> Self {
        Self {
            settings,
            dpkg_arch: dpkg_arch.into(),
            apt_conf_dir: apt_conf_dir.into(),
        }
    }

    fn apt_conf_file(&self) -> PathBuf {
        self.apt_conf_dir.join("apt.conf")
    }

    fn apt_get(&self) -> Cmd {
        Cmd::new("apt-get").env("APT_CONFIG", self.apt_conf_file())
    }

    fn render_apt_conf(&self) -> String {
        let root = self.settings.root.display();
        let mut out = String::new();
        let _ = writeln!(out, "Dir \"{}/\";", root);
        let _ = writeln!(out, "Dir::Etc \"{}/\";", self.apt_conf_dir.display());
        let _ = writeln!(out, "Dir::State::status \"{}/{}/status\";", root, DPKG_STATE_DIR);
        let _ = writeln!(out, "APT::Architecture \"{}\";", self.dpkg_arch);
        let _ = writeln!(out, "APT::Get::AllowUnauthenticated \"true\";");
        let _ = writeln!(out, "DPkg::Options {{\"--root={}\";\"--admindir={}/{}\";\"--force-all\";\"--no-debsig\"}};", root, root, DPKG_STATE_DIR);
        out
    }

    /// `sources.list` with one local repository per existing feed dir.
    pub fn render_sources_list(&self) -> String {
        let mut out = String::new();
        for (_, dir) in self.settings.feed_dirs() {
            let _ = writeln!(out, "deb [trusted=yes] file:{} ./", dir.display());
        }
        out
    }

    /// apt preferences pinning architectures, best first.
    pub fn render_preferences(&self) -> String {
        let mut out = String::new();
        for (idx, arch) in self.settings.archs.all_archs().iter().enumerate() {
            let priority = BEST_PIN_PRIORITY.saturating_sub(5 * idx);
            let _ = writeln!(out, "Package: *\nPin: release l={}\nPin-Priority: {}\n", arch, priority);
        }
        out
    }

    fn list_installed(&self) -> SdkResult<Vec<String>> {
        let admindir = self.settings.root.join(DPKG_STATE_DIR);
        let stdout = run_transaction(
            "dpkg-query",
            Cmd::new("dpkg-query")
                .arg(format!("--admindir={}", admindir.display()))
                .args(["-W", "-f=${Package}\\n"]),
        )?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }
}

impl PackageManager for DpkgPm {
    fn root(&self) -> &Path {
        &self.settings.root
    }

    fn create_configs(&mut self) -> SdkResult<()> {
        let state = self.settings.root.join(DPKG_STATE_DIR);
        fsops::ensure_dir(&state.join("info"))?;
        fsops::ensure_dir(&state.join("updates"))?;
        let status = state.join("status");
        if !status.exists() {
            fsops::write_file(&status, "")?;
        }

        fsops::write_file(&self.apt_conf_file(), &self.render_apt_conf())?;
        fsops::write_file(
            &self.apt_conf_dir.join("sources.list"),
            &self.render_sources_list(),
        )?;
        fsops::write_file(
            &self.apt_conf_dir.join("preferences"),
            &self.render_preferences(),
        )?;
        debug!(dir = %self.apt_conf_dir.display(), "wrote apt config");
        Ok(())
    }

    fn write_index(&mut self) -> SdkResult<()> {
        for (arch, dir) in self.settings.feed_dirs() {
            info!(arch, "indexing deb feed");
            let packages = run_transaction(
                "apt-ftparchive",
                Cmd::new("apt-ftparchive").args(["packages", "."]).dir(&dir),
            )?;
            fsops::write_file(&dir.join("Packages"), &packages)?;
        }
        Ok(())
    }

    fn dump_all_available_pkgs(&mut self) -> SdkResult<()> {
        let stdout = run_transaction(
            "apt-cache dumpavail",
            Cmd::new("apt-cache")
                .env("APT_CONFIG", self.apt_conf_file())
                .arg("dumpavail"),
        )?;
        fsops::write_file(&self.settings.work_file("available_pkgs"), &stdout)
    }

    fn update(&mut self) -> SdkResult<()> {
        run_transaction("apt-get update", self.apt_get().arg("update")).map(|_| ())
    }

    fn install(&mut self, packages: &[String], _attempt_only: bool) -> SdkResult<()> {
        if packages.is_empty() {
            return Ok(());
        }
        run_install(
            packages,
            self.apt_get()
                .args(["install", "-y", "--allow-unauthenticated", "--no-install-recommends"])
                .args(packages),
        )
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
        for rel in ["var/lib/apt", "var/cache/apt"] {
            fsops::remove_path(&self.settings.root.join(rel))
                .map_err(|e| SdkError::backend("removing apt data", e))?;
        }
        Ok(())
    }
}
