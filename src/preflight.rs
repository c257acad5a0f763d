//! Preflight checks for SDK population.
//!
//! Validates that the host has the tools a packaging technology drives.
//! `populate_sdk` runs this before the output root is wiped.

use crate::error::{SdkError, SdkResult};
use crate::sdk::PackageType;

/// Check if a command exists on the host system.
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Host tools driven by each backend.
///
/// Each tuple is (command_name, package_name).
pub fn required_tools(pkgtype: PackageType) -> &'static [(&'static str, &'static str)] {
    match pkgtype {
        PackageType::Rpm => &[
            ("rpm", "rpm"),
            ("dnf", "dnf"),
            ("createrepo_c", "createrepo-c"),
        ],
        PackageType::Ipk => &[("opkg", "opkg"), ("opkg-make-index", "opkg-utils")],
        PackageType::Deb => &[
            ("apt-get", "apt"),
            ("apt-cache", "apt"),
            ("apt-ftparchive", "apt-utils"),
            ("dpkg-query", "dpkg"),
        ],
    }
}

/// Check that specific tools are available.
///
/// Returns a configuration error listing every missing tool and the package
/// that provides it.
pub fn check_required_tools(tools: &[(&str, &str)]) -> SdkResult<()> {
    let missing: Vec<_> = tools
        .iter()
        .filter(|(tool, _)| !command_exists(tool))
        .collect();

    if !missing.is_empty() {
        let msg = missing
            .iter()
            .map(|(t, p)| format!("  {} (install: {})", t, p))
            .collect::<Vec<_>>()
            .join("\n");
        return Err(SdkError::config(format!(
            "missing required host tools:\n{}",
            msg
        )));
    }

    Ok(())
}

/// Check every tool the backend for `pkgtype` runs.
pub fn check_backend_tools(pkgtype: PackageType) -> SdkResult<()> {
    check_required_tools(required_tools(pkgtype))
}
