//! SDK population configuration, loaded from TOML.
//!
//! Relative paths in the file are resolved against the directory holding
//! the file. Paths that describe locations *inside* the SDK
//! (`sdk_path_native`, `sdk_target_sysroot`, `sysconfdir`, ...) are kept
//! relative to the output root regardless of a leading `/`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::arch::{ArchPreferences, VariantOverride};
use crate::error::{SdkError, SdkResult};
use crate::hooks::Hooks;
use crate::layout::SdkLayout;

/// Fully resolved configuration for one SDK population.
#[derive(Debug, Clone)]
pub struct SdkConfig {
    /// Packaging technology token (`rpm`, `ipk` or `deb`).
    pub image_pkgtype: String,
    pub layout: SdkLayout,
    /// Directory holding `sdk_target_initial_manifest` and `sdk_host_initial_manifest`.
    pub manifest_dir: PathBuf,
    /// Scratch directory for generated backend configs.
    pub work_dir: PathBuf,
    /// Whitespace-separated complementary globs, e.g. `*-dev *-dbg`.
    pub install_complementary: Option<String>,
    /// Install from published feeds instead of rebuilding local indexes.
    pub build_images_from_feeds: bool,
    pub hooks: Hooks,
    pub target: SysrootConfig,
    pub host: SysrootConfig,
    pub rpm: Option<RpmConfig>,
    pub opkg: Option<OpkgConfig>,
    pub dpkg: Option<DpkgConfig>,
}

/// Per-sysroot backend identity.
#[derive(Debug, Clone)]
pub struct SysrootConfig {
    /// Declared architecture list, least specific first, as written.
    pub package_archs: Vec<String>,
    pub os: String,
    pub vendor: String,
    pub provides: Vec<String>,
    /// Multilib tokens, e.g. `multilib:lib32`.
    pub multilibs: Vec<String>,
    pub multilib_overrides: BTreeMap<String, VariantOverride>,
}

impl SysrootConfig {
    /// Architecture preferences with multilib variants merged, best first.
    pub fn arch_preferences(&self) -> ArchPreferences {
        ArchPreferences::from_declared(self.package_archs.iter().cloned(), &self.os)
            .with_multilibs(&self.multilibs, &self.multilib_overrides)
    }
}

#[derive(Debug, Clone)]
pub struct RpmConfig {
    pub deploy_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct OpkgConfig {
    pub deploy_dir: PathBuf,
    /// opkg config file generated for the target sysroot.
    pub target_conf: PathBuf,
    /// opkg config file generated for the host sysroot.
    pub host_conf: PathBuf,
    /// Target architecture list including multilib archs; replaces the
    /// target `package_archs` for opkg when set.
    pub all_multilib_package_archs: Option<Vec<String>>,
    pub feed_uris: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DpkgConfig {
    pub deploy_dir: PathBuf,
    /// Parent of the generated `apt` (target) and `apt-sdk` (host) dirs.
    pub aptconf_dir: PathBuf,
    /// Native staging etc dir; its `apt` subtree is shipped in the SDK.
    pub staging_etcdir_native: PathBuf,
    pub dpkg_arch: String,
    pub sdk_arch: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SdkToml {
    image_pkgtype: String,
    output: String,
    manifest_dir: String,
    work_dir: Option<String>,
    sdk_path_native: String,
    sdk_target_sysroot: String,
    sysconfdir: Option<String>,
    libdir_nativesdk: Option<String>,
    localstatedir_nativesdk: Option<String>,
    install_complementary: Option<String>,
    build_images_from_feeds: Option<bool>,
    multilibs: Option<Vec<String>>,
    hooks: Option<HooksToml>,
    target: SysrootToml,
    host: SysrootToml,
    rpm: Option<RpmToml>,
    opkg: Option<OpkgToml>,
    dpkg: Option<DpkgToml>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct HooksToml {
    preprocess: Option<String>,
    post_target: Option<String>,
    post_host: Option<String>,
    postprocess: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SysrootToml {
    package_archs: Vec<String>,
    os: String,
    vendor: Option<String>,
    provides: Option<Vec<String>>,
    multilib: Option<BTreeMap<String, VariantToml>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct VariantToml {
    package_archs: Vec<String>,
    os: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RpmToml {
    deploy_dir: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct OpkgToml {
    deploy_dir: String,
    target_conf: String,
    host_conf: String,
    all_multilib_package_archs: Option<Vec<String>>,
    feed_uris: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DpkgToml {
    deploy_dir: String,
    aptconf_dir: String,
    staging_etcdir_native: String,
    dpkg_arch: String,
    sdk_arch: String,
}

pub(crate) fn resolve_path(base: &Path, path: &str) -> PathBuf {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base.join(candidate)
    }
}

/// Load and validate a configuration file.
pub fn load_config(path: &Path) -> SdkResult<SdkConfig> {
    let text = fs::read_to_string(path).map_err(SdkError::io("reading config", path))?;
    let base = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    parse_config(&text, base)
        .map_err(|e| SdkError::config(format!("'{}': {}", path.display(), e)))
}

/// Parse configuration text; relative paths are resolved against `base`.
pub fn parse_config(text: &str, base: &Path) -> Result<SdkConfig, String> {
    let parsed: SdkToml = toml::from_str(text).map_err(|e| e.to_string())?;

    let image_pkgtype = parsed.image_pkgtype.trim().to_ascii_lowercase();
    if image_pkgtype.is_empty() {
        return Err("image_pkgtype must not be empty".into());
    }
    if parsed.target.package_archs.is_empty() {
        return Err("target.package_archs must list at least one architecture".into());
    }
    if parsed.host.package_archs.is_empty() {
        return Err("host.package_archs must list at least one architecture".into());
    }
    if parsed.sdk_target_sysroot.trim_matches('/').is_empty() {
        return Err("sdk_target_sysroot must not be the output root".into());
    }

    let output = resolve_path(base, &parsed.output);
    let layout = SdkLayout::new(
        &output,
        &parsed.sdk_path_native,
        &parsed.sdk_target_sysroot,
        parsed.sysconfdir.as_deref().unwrap_or("/etc"),
        parsed.libdir_nativesdk.as_deref().unwrap_or("/usr/lib"),
        parsed.localstatedir_nativesdk.as_deref().unwrap_or("/var"),
    );

    let work_dir = match parsed.work_dir.as_deref() {
        Some(dir) => resolve_path(base, dir),
        None => default_work_dir(&output),
    };

    let multilibs = parsed.multilibs.unwrap_or_default();
    let hooks = parsed
        .hooks
        .map(|h| Hooks {
            preprocess: h.preprocess,
            post_target: h.post_target,
            post_host: h.post_host,
            postprocess: h.postprocess,
        })
        .unwrap_or_default();

    Ok(SdkConfig {
        image_pkgtype,
        layout,
        manifest_dir: resolve_path(base, &parsed.manifest_dir),
        work_dir,
        install_complementary: parsed
            .install_complementary
            .filter(|s| !s.trim().is_empty()),
        build_images_from_feeds: parsed.build_images_from_feeds.unwrap_or(false),
        hooks,
        target: sysroot_config(parsed.target, &multilibs),
        // multilib variants only apply to the target sysroot
        host: sysroot_config(parsed.host, &[]),
        rpm: parsed.rpm.map(|r| RpmConfig {
            deploy_dir: resolve_path(base, &r.deploy_dir),
        }),
        opkg: parsed.opkg.map(|o| OpkgConfig {
            deploy_dir: resolve_path(base, &o.deploy_dir),
            target_conf: resolve_path(base, &o.target_conf),
            host_conf: resolve_path(base, &o.host_conf),
            all_multilib_package_archs: o.all_multilib_package_archs,
            feed_uris: o.feed_uris.unwrap_or_default(),
        }),
        dpkg: parsed.dpkg.map(|d| DpkgConfig {
            deploy_dir: resolve_path(base, &d.deploy_dir),
            aptconf_dir: resolve_path(base, &d.aptconf_dir),
            staging_etcdir_native: resolve_path(base, &d.staging_etcdir_native),
            dpkg_arch: d.dpkg_arch,
            sdk_arch: d.sdk_arch,
        }),
    })
}

/// Work dir next to the output root, so wiping the output never touches it.
fn default_work_dir(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "sdk".to_string());
    output
        .parent()
        .unwrap_or(output)
        .join(format!("{}-work", name))
}

fn sysroot_config(raw: SysrootToml, multilibs: &[String]) -> SysrootConfig {
    SysrootConfig {
        package_archs: raw.package_archs,
        os: raw.os.trim().to_string(),
        vendor: raw.vendor.unwrap_or_default(),
        provides: raw.provides.unwrap_or_default(),
        multilibs: multilibs.to_vec(),
        multilib_overrides: raw
            .multilib
            .unwrap_or_default()
            .into_iter()
            .map(|(variant, v)| {
                (
                    variant,
                    VariantOverride {
                        package_archs: v.package_archs,
                        os: v.os,
                    },
                )
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
image_pkgtype = "IPK"
output = "out/sdk"
manifest_dir = "manifests"
sdk_path_native = "/opt/sdk/sysroots/x86_64-sdk-linux"
sdk_target_sysroot = "/opt/sdk/sysroots/core2-64-linux"
install_complementary = "*-dev"
multilibs = ["multilib:lib32"]

[hooks]
postprocess = "true"

[target]
package_archs = ["all", "core2-64"]
os = "linux"
vendor = "-oe"
provides = ["/bin/sh"]

[target.multilib.lib32]
package_archs = ["all", "x86"]

[host]
package_archs = ["all", "x86_64-nativesdk"]
os = "linux"

[opkg]
deploy_dir = "/deploy/ipk"
target_conf = "conf/opkg.conf"
host_conf = "conf/opkg-sdk.conf"
"#;

    #[test]
    fn test_parse_sample() {
        let cfg = parse_config(SAMPLE, Path::new("/base")).unwrap();
        assert_eq!(cfg.image_pkgtype, "ipk");
        assert_eq!(cfg.layout.output, PathBuf::from("/base/out/sdk"));
        assert_eq!(cfg.layout.sysconfdir, PathBuf::from("etc"));
        assert_eq!(cfg.manifest_dir, PathBuf::from("/base/manifests"));
        assert_eq!(cfg.work_dir, PathBuf::from("/base/out/sdk-work"));
        assert_eq!(cfg.hooks.postprocess.as_deref(), Some("true"));
        assert!(!cfg.build_images_from_feeds);

        let opkg = cfg.opkg.unwrap();
        assert_eq!(opkg.deploy_dir, PathBuf::from("/deploy/ipk"));
        assert_eq!(opkg.target_conf, PathBuf::from("/base/conf/opkg.conf"));

        let target = cfg.target.arch_preferences();
        assert_eq!(target.default_archs(), ["core2-64", "all"]);
        assert_eq!(target.archs("lib32").unwrap(), ["x86", "all"]);
        assert!(cfg.host.arch_preferences().archs("lib32").is_none());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let text = format!("{}\nbogus = 1\n", SAMPLE.replace("[hooks]", "bogus_top = 2\n[hooks]"));
        assert!(parse_config(&text, Path::new("/")).is_err());
    }

    #[test]
    fn test_target_sysroot_must_not_be_root() {
        let text = SAMPLE.replace(
            "sdk_target_sysroot = \"/opt/sdk/sysroots/core2-64-linux\"",
            "sdk_target_sysroot = \"/\"",
        );
        let err = parse_config(&text, Path::new("/")).unwrap_err();
        assert!(err.contains("sdk_target_sysroot"));
    }

    #[test]
    fn test_load_config_reports_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("sdk.toml");
        fs::write(&path, "image_pkgtype = 1\n").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, SdkError::Config(_)));
        assert!(err.to_string().contains("sdk.toml"));
    }
}
