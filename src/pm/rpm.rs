//! RPM backend: `createrepo_c` for indexes, `dnf --installroot` for transactions.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{complementary_candidates, run_install, run_transaction, PackageManager, PmSettings};
use crate::arch::DEFAULT_VARIANT;
use crate::error::{SdkError, SdkResult};
use crate::fsops;
use crate::process::Cmd;

/// rpm database directory inside its root.
pub const RPM_STATE_DIR: &str = "var/lib/rpm";

/// dnf's own bookkeeping; stripped by `remove_packaging_data`.
const DNF_BOOKKEEPING: &[&str] = &["var/lib/dnf", "var/cache/dnf", "var/log/dnf.log"];

/// rpm/dnf bound to one sysroot.
#[derive(Debug, Clone)]
pub struct RpmPm {
    settings: PmSettings,
}

impl RpmPm {
    pub fn new(settings: PmSettings) -> Self {
        Self { settings }
    }

    fn repos_dir(&self) -> PathBuf {
        self.settings.work_file("repos.d")
    }

    fn dnf(&self) -> Cmd {
        Cmd::new("dnf")
            .arg("-y")
            .arg("--nogpgcheck")
            .arg("--installroot")
            .arg_path(&self.settings.root)
            .arg(format!("--setopt=reposdir={}", self.repos_dir().display()))
            .arg("--setopt=install_weak_deps=False")
            .arg("--releasever=sdk")
            .arg(format!("--forcearch={}", self.force_arch()))
    }

    /// Best default-variant architecture, spelled the way rpm expects.
    fn force_arch(&self) -> String {
        self.settings
            .archs
            .default_archs()
            .first()
            .map(|arch| rpm_arch(arch))
            .unwrap_or_else(|| "noarch".to_string())
    }

    fn vendor(&self) -> String {
        let vendor = self.settings.vendor.trim();
        if vendor.is_empty() || vendor.starts_with('-') {
            vendor.to_string()
        } else {
            format!("-{}", vendor)
        }
    }

    /// `etc/rpm/platform`: one `<arch><vendor>-<os>` line per architecture,
    /// default variant first.
    pub fn render_platform(&self) -> String {
        let vendor = self.vendor();
        let archs = &self.settings.archs;
        let mut out = String::new();
        let variants = std::iter::once(DEFAULT_VARIANT)
            .chain(archs.variants().filter(|v| *v != DEFAULT_VARIANT));
        for variant in variants {
            let os = archs.os(variant).unwrap_or("");
            for arch in archs.archs(variant).unwrap_or(&[]) {
                let line = format!("{}{}-{}", rpm_arch(arch), vendor, os);
                if !out.lines().any(|l| l == line) {
                    let _ = writeln!(out, "{}", line);
                }
            }
        }
        out
    }

    /// `etc/rpm/sysinfo/Providename`: capabilities assumed present.
    pub fn render_providename(&self) -> String {
        let mut out = String::new();
        for name in &self.settings.provides {
            let _ = writeln!(out, "{}", name);
        }
        out
    }

    fn render_repo(arch: &str, dir: &Path, priority: usize) -> String {
        format!(
            "[oe-{arch}]\nname=OE {arch}\nbaseurl=file://{}\nenabled=1\ngpgcheck=0\npriority={priority}\n",
            dir.display()
        )
    }

    fn list_installed(&self) -> SdkResult<Vec<String>> {
        let stdout = run_transaction(
            "rpm -qa",
            Cmd::new("rpm")
                .arg("--root")
                .arg_path(&self.settings.root)
                .args(["-qa", "--qf", "%{NAME}\\n"]),
        )?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }
}

impl PackageManager for RpmPm {
    fn root(&self) -> &Path {
        &self.settings.root
    }

    fn create_configs(&mut self) -> SdkResult<()> {
        let rpm_etc = self.settings.root.join("etc/rpm");
        fsops::write_file(&rpm_etc.join("platform"), &self.render_platform())?;
        fsops::write_file(
            &rpm_etc.join("sysinfo/Providename"),
            &self.render_providename(),
        )?;
        fsops::ensure_dir(&self.settings.root.join(RPM_STATE_DIR))?;

        let repos = self.repos_dir();
        fsops::recreate_dir(&repos)?;
        for (idx, (arch, dir)) in self.settings.feed_dirs().into_iter().enumerate() {
            fsops::write_file(
                &repos.join(format!("oe-{}.repo", arch)),
                &Self::render_repo(&arch, &dir, idx + 1),
            )?;
        }
        debug!(root = %self.settings.root.display(), "wrote rpm configs");
        Ok(())
    }

    fn write_index(&mut self) -> SdkResult<()> {
        for (arch, dir) in self.settings.feed_dirs() {
            info!(arch, "indexing rpm feed");
            run_transaction(
                "createrepo_c",
                Cmd::new("createrepo_c")
                    .args(["--update", "-q"])
                    .arg_path(&dir),
            )?;
        }
        Ok(())
    }

    fn dump_all_available_pkgs(&mut self) -> SdkResult<()> {
        let stdout = run_transaction(
            "dnf repoquery",
            self.dnf()
                .args(["repoquery", "--qf", "%{name} %{arch} %{version}-%{release}"]),
        )?;
        fsops::write_file(&self.settings.work_file("available_pkgs"), &stdout)
    }

    fn update(&mut self) -> SdkResult<()> {
        run_transaction("dnf makecache", self.dnf().arg("makecache")).map(|_| ())
    }

    fn install(&mut self, packages: &[String], attempt_only: bool) -> SdkResult<()> {
        if packages.is_empty() {
            return Ok(());
        }
        let mut cmd = self.dnf().arg("install");
        if attempt_only {
            cmd = cmd.arg("--skip-broken");
        }
        run_install(packages, cmd.args(packages))
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
        for rel in DNF_BOOKKEEPING {
            fsops::remove_path(&self.settings.root.join(rel))
                .map_err(|e| SdkError::backend("removing dnf data", e))?;
        }
        Ok(())
    }
}

/// Package architectures use `-`; rpm arch names cannot.
fn rpm_arch(arch: &str) -> String {
    arch.replace('-', "_")
}
