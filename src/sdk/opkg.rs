//! Opkg-family finalization.

use std::path::PathBuf;

use tracing::{debug, info};

use super::adapter::Finalizer;
use super::PackageType;
use crate::error::SdkResult;
use crate::fsops;
use crate::layout::SdkLayout;
use crate::pm::opkg::OPKG_STATE_DIR;
use crate::pm::{PackageManager, SysrootRole};

/// Mode of the opkg config files shipped in the SDK.
pub const OPKG_CONF_MODE: u32 = 0o644;

/// Ships the opkg configs and moves host opkg state under the native prefix.
#[derive(Debug, Clone)]
pub struct OpkgFinalizer {
    target_conf: PathBuf,
    host_conf: PathBuf,
    build_images_from_feeds: bool,
}

impl OpkgFinalizer {
    pub fn new(target_conf: impl Into<PathBuf>, host_conf: impl Into<PathBuf>) -> Self {
        Self {
            target_conf: target_conf.into(),
            host_conf: host_conf.into(),
            build_images_from_feeds: false,
        }
    }

    /// Skip local index generation; packages come from published feeds.
    pub fn from_feeds(mut self, enabled: bool) -> Self {
        self.build_images_from_feeds = enabled;
        self
    }
}

impl Finalizer for OpkgFinalizer {
    fn technology(&self) -> PackageType {
        PackageType::Ipk
    }

    fn prepare(&self, role: SysrootRole, pm: &mut dyn PackageManager) -> SdkResult<()> {
        pm.create_configs()?;
        if self.build_images_from_feeds {
            info!(sysroot = %role, "installing from feeds, not indexing");
            return Ok(());
        }
        pm.write_index()
    }

    fn after_target(&self, _layout: &SdkLayout, _target: &mut dyn PackageManager) -> SdkResult<()> {
        Ok(())
    }

    fn after_host(&self, layout: &SdkLayout, _host: &mut dyn PackageManager) -> SdkResult<()> {
        fsops::install_file(&self.target_conf, &layout.target_sysconfdir(), OPKG_CONF_MODE)?;
        fsops::install_file(&self.host_conf, &layout.host_sysconfdir(), OPKG_CONF_MODE)?;

        let moved = fsops::move_dir_contents(
            &layout.output.join(OPKG_STATE_DIR),
            &layout.native_state_dir("opkg"),
        )?;
        fsops::remove_path(&layout.output.join("var"))?;
        debug!(entries = moved, "relocated opkg state");
        Ok(())
    }
}
