//! RPM-family finalization.

use tracing::debug;

use super::adapter::{strip_packaging_data, Finalizer};
use super::PackageType;
use crate::error::SdkResult;
use crate::fsops;
use crate::layout::SdkLayout;
use crate::pm::{PackageManager, SysrootRole};

/// Keeps host-side rpm state and config under the native prefix.
#[derive(Debug, Clone, Default)]
pub struct RpmFinalizer;

impl RpmFinalizer {
    pub fn new() -> Self {
        Self
    }
}

impl Finalizer for RpmFinalizer {
    fn technology(&self) -> PackageType {
        PackageType::Rpm
    }

    fn prepare(&self, _role: SysrootRole, pm: &mut dyn PackageManager) -> SdkResult<()> {
        pm.create_configs()?;
        pm.write_index()?;
        pm.dump_all_available_pkgs()
    }

    fn after_target(&self, _layout: &SdkLayout, target: &mut dyn PackageManager) -> SdkResult<()> {
        strip_packaging_data(target);
        Ok(())
    }

    fn after_host(&self, layout: &SdkLayout, host: &mut dyn PackageManager) -> SdkResult<()> {
        strip_packaging_data(host);

        let moved = fsops::move_dir_contents(
            &layout.host_state_dir("rpm"),
            &layout.native_state_dir("rpm"),
        )?;
        fsops::remove_path(&layout.output.join("var"))?;
        debug!(entries = moved, "relocated rpm database");

        let moved = fsops::move_dir_contents(&layout.host_sysconfdir(), &layout.native_sysconfdir())?;
        fsops::remove_path(&layout.host_sysconfdir())?;
        debug!(entries = moved, "relocated host sysconfdir");
        Ok(())
    }
}
