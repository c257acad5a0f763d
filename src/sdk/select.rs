//! Picks the adapter for the configured packaging technology and builds its
//! two backend instances.

use std::env;
use std::path::{Path, PathBuf};

use tracing::info;

use super::adapter::{Adapter, Finalizer};
use super::dpkg::DpkgFinalizer;
use super::opkg::OpkgFinalizer;
use super::rpm::RpmFinalizer;
use super::{PackageType, PopulateReport, Sdk};
use crate::arch::ArchPreferences;
use crate::config::{SdkConfig, SysrootConfig};
use crate::env::with_restored_env;
use crate::error::{Phase, PhaseExt, PopulateError, SdkError, SdkResult};
use crate::hooks::HookRunner;
use crate::manifest::{InitialManifestFile, ManifestType};
use crate::pm::dpkg::DpkgPm;
use crate::pm::opkg::OpkgPm;
use crate::pm::rpm::RpmPm;
use crate::pm::{PackageManager, PmSettings, SysrootRole};
use crate::preflight::check_backend_tools;

/// Backend settings for one sysroot of `config`.
///
/// The target backend is rooted at the target sysroot, the host backend at
/// the output root.
pub fn pm_settings(config: &SdkConfig, role: SysrootRole, deploy_dir: &Path) -> PmSettings {
    let sysroot = sysroot_config(config, role);
    PmSettings {
        role,
        root: sysroot_root(config, role),
        archs: sysroot.arch_preferences(),
        vendor: sysroot.vendor.clone(),
        provides: sysroot.provides.clone(),
        deploy_dir: deploy_dir.to_path_buf(),
        work_dir: config.work_dir.clone(),
    }
}

fn sysroot_config(config: &SdkConfig, role: SysrootRole) -> &SysrootConfig {
    match role {
        SysrootRole::Target => &config.target,
        SysrootRole::Host => &config.host,
    }
}

fn sysroot_root(config: &SdkConfig, role: SysrootRole) -> PathBuf {
    match role {
        SysrootRole::Target => config.layout.target_sysroot(),
        SysrootRole::Host => config.layout.host_sysroot().to_path_buf(),
    }
}

fn missing_section(pkgtype: PackageType, section: &str) -> SdkError {
    SdkError::config(format!(
        "image_pkgtype is '{}' but the [{}] section is missing",
        pkgtype, section
    ))
}

type Backends = (
    Box<dyn Finalizer>,
    Box<dyn PackageManager>,
    Box<dyn PackageManager>,
);

fn rpm_backends(config: &SdkConfig) -> SdkResult<Backends> {
    let rpm = config
        .rpm
        .as_ref()
        .ok_or_else(|| missing_section(PackageType::Rpm, "rpm"))?;
    let target = RpmPm::new(pm_settings(config, SysrootRole::Target, &rpm.deploy_dir));
    let host = RpmPm::new(pm_settings(config, SysrootRole::Host, &rpm.deploy_dir));
    Ok((Box::new(RpmFinalizer::new()), Box::new(target), Box::new(host)))
}

fn opkg_backends(config: &SdkConfig) -> SdkResult<Backends> {
    let opkg = config
        .opkg
        .as_ref()
        .ok_or_else(|| missing_section(PackageType::Ipk, "opkg"))?;

    let mut target_settings = pm_settings(config, SysrootRole::Target, &opkg.deploy_dir);
    if let Some(all) = &opkg.all_multilib_package_archs {
        target_settings.archs = ArchPreferences::from_declared(all.iter().cloned(), &config.target.os);
    }
    let host_settings = pm_settings(config, SysrootRole::Host, &opkg.deploy_dir);

    let target = OpkgPm::new(target_settings, &opkg.target_conf).with_feed_uris(opkg.feed_uris.clone());
    let host = OpkgPm::new(host_settings, &opkg.host_conf).with_feed_uris(opkg.feed_uris.clone());
    let finalizer = OpkgFinalizer::new(&opkg.target_conf, &opkg.host_conf)
        .from_feeds(config.build_images_from_feeds);
    Ok((Box::new(finalizer), Box::new(target), Box::new(host)))
}

fn dpkg_backends(config: &SdkConfig) -> SdkResult<Backends> {
    let dpkg = config
        .dpkg
        .as_ref()
        .ok_or_else(|| missing_section(PackageType::Deb, "dpkg"))?;
    let target = DpkgPm::new(
        pm_settings(config, SysrootRole::Target, &dpkg.deploy_dir),
        &dpkg.dpkg_arch,
        dpkg.aptconf_dir.join("apt"),
    );
    let host = DpkgPm::new(
        pm_settings(config, SysrootRole::Host, &dpkg.deploy_dir),
        &dpkg.sdk_arch,
        dpkg.aptconf_dir.join("apt-sdk"),
    );
    let finalizer = DpkgFinalizer::new(&dpkg.staging_etcdir_native);
    Ok((Box::new(finalizer), Box::new(target), Box::new(host)))
}

/// Build the adapter for `config.image_pkgtype`.
///
/// An unrecognized technology is a configuration error.
pub fn select_adapter(config: &SdkConfig) -> SdkResult<Adapter> {
    let pkgtype: PackageType = config.image_pkgtype.parse()?;
    let (finalizer, target_pm, host_pm) = match pkgtype {
        PackageType::Rpm => rpm_backends(config)?,
        PackageType::Ipk => opkg_backends(config)?,
        PackageType::Deb => dpkg_backends(config)?,
    };
    info!(technology = %pkgtype, "selected backend");

    let target_manifest = InitialManifestFile::new(&config.manifest_dir, ManifestType::SdkTarget);
    let host_manifest = InitialManifestFile::new(&config.manifest_dir, ManifestType::SdkHost);

    Ok(Adapter::new(
        finalizer,
        target_pm,
        host_pm,
        Box::new(target_manifest),
        Box::new(host_manifest),
    )
    .with_complementary(config.install_complementary.clone()))
}

/// Populate the SDK described by `config`.
///
/// The backend's host tools are checked before the output root is touched.
/// The process environment is restored afterwards on every exit path.
pub fn populate_sdk(config: &SdkConfig) -> Result<PopulateReport, PopulateError> {
    with_restored_env(|| {
        let tech = config.image_pkgtype.parse::<PackageType>().ok();
        let adapter = select_adapter(config).in_phase(Phase::Prepare, tech)?;
        check_backend_tools(adapter.technology()).in_phase(Phase::Prepare, tech)?;
        let workdir = env::current_dir()
            .map_err(SdkError::io("resolving working directory", "."))
            .in_phase(Phase::Prepare, tech)?;
        let hooks = HookRunner::new(config.hooks.clone(), &workdir, &config.layout);
        Sdk::new(config.layout.clone(), hooks, adapter).populate()
    })
}
