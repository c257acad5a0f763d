//! Debian-family finalization.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::adapter::Finalizer;
use super::PackageType;
use crate::error::SdkResult;
use crate::fsops;
use crate::layout::SdkLayout;
use crate::pm::dpkg::DPKG_STATE_DIR;
use crate::pm::{PackageManager, SysrootRole};

/// Ships the staged apt config into both sysroots and moves host dpkg state
/// under the native prefix.
#[derive(Debug, Clone)]
pub struct DpkgFinalizer {
    staging_etcdir_native: PathBuf,
}

impl DpkgFinalizer {
    pub fn new(staging_etcdir_native: impl Into<PathBuf>) -> Self {
        Self {
            staging_etcdir_native: staging_etcdir_native.into(),
        }
    }

    /// Replace `dst` with the staged apt tree; never a merge.
    fn copy_apt_dir_to(&self, dst: &Path) -> SdkResult<()> {
        let src = self.staging_etcdir_native.join("apt");
        fsops::replace_tree(&src, dst)?;
        debug!(from = %src.display(), to = %dst.display(), "copied apt config");
        Ok(())
    }
}

impl Finalizer for DpkgFinalizer {
    fn technology(&self) -> PackageType {
        PackageType::Deb
    }

    fn prepare(&self, _role: SysrootRole, pm: &mut dyn PackageManager) -> SdkResult<()> {
        pm.create_configs()?;
        pm.write_index()
    }

    fn after_target(&self, layout: &SdkLayout, _target: &mut dyn PackageManager) -> SdkResult<()> {
        self.copy_apt_dir_to(&layout.target_sysroot().join("etc").join("apt"))
    }

    fn after_host(&self, layout: &SdkLayout, _host: &mut dyn PackageManager) -> SdkResult<()> {
        let native = layout.native_root();
        self.copy_apt_dir_to(&native.join("etc").join("apt"))?;

        let moved = fsops::move_dir_contents(
            &layout.output.join(DPKG_STATE_DIR),
            &native.join(DPKG_STATE_DIR),
        )?;
        fsops::remove_path(&layout.output.join("var"))?;
        debug!(entries = moved, "relocated dpkg state");
        Ok(())
    }
}
