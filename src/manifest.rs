//! Initial manifests: which packages go into a sysroot, grouped by category.
//!
//! An initial manifest is a plain text file, one `category,package` pair per
//! line. `#` starts a comment line. The category tokens are the ones the
//! image build writes: `lgp`, `mip`, `aop` and `mlp`.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{SdkError, SdkResult};

/// Package category of a manifest entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PackageCategory {
    /// Locale/language packages (`lgp`).
    Language,
    /// Packages that must install (`mip`).
    MustInstall,
    /// Packages whose install failures are tolerated (`aop`).
    AttemptOnly,
    /// Multilib variant packages (`mlp`).
    Multilib,
    /// Any token outside the known set. Never installed.
    Other(String),
}

impl PackageCategory {
    pub fn from_token(token: &str) -> Self {
        match token {
            "lgp" => Self::Language,
            "mip" => Self::MustInstall,
            "aop" => Self::AttemptOnly,
            "mlp" => Self::Multilib,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn token(&self) -> &str {
        match self {
            Self::Language => "lgp",
            Self::MustInstall => "mip",
            Self::AttemptOnly => "aop",
            Self::Multilib => "mlp",
            Self::Other(token) => token,
        }
    }

    /// Whether install failures in this category are tolerated.
    pub fn is_attempt_only(&self) -> bool {
        *self == PACKAGE_CATEGORY_ATTEMPT_ONLY
    }
}

impl fmt::Display for PackageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// The one category whose failures are swallowed.
pub const PACKAGE_CATEGORY_ATTEMPT_ONLY: PackageCategory = PackageCategory::AttemptOnly;

/// Global install sequence. Categories outside it are skipped.
pub static INSTALL_ORDER: [PackageCategory; 4] = [
    PackageCategory::Language,
    PackageCategory::MustInstall,
    PackageCategory::AttemptOnly,
    PackageCategory::Multilib,
];

/// Category to packages mapping parsed from one manifest.
///
/// Package lists keep first-seen order and never contain duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: BTreeMap<PackageCategory, Vec<String>>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a package to a category, ignoring repeats.
    pub fn add(&mut self, category: PackageCategory, package: impl Into<String>) {
        let package = package.into();
        let list = self.entries.entry(category).or_default();
        if !list.contains(&package) {
            list.push(package);
        }
    }

    /// Builder form of [`Manifest::add`] for a whole category.
    pub fn with<I, S>(mut self, category: PackageCategory, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries.entry(category.clone()).or_default();
        for package in packages {
            self.add(category.clone(), package);
        }
        self
    }

    pub fn get(&self, category: &PackageCategory) -> Option<&[String]> {
        self.entries.get(category).map(Vec::as_slice)
    }

    /// Categories in [`INSTALL_ORDER`] that are present, with their packages.
    pub fn in_install_order(&self) -> impl Iterator<Item = (&PackageCategory, &[String])> {
        INSTALL_ORDER
            .iter()
            .filter_map(move |cat| self.get(cat).map(|pkgs| (cat, pkgs)))
    }
}

/// Which sysroot a manifest describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestType {
    SdkTarget,
    SdkHost,
}

impl ManifestType {
    pub fn prefix(self) -> &'static str {
        match self {
            ManifestType::SdkTarget => "sdk_target",
            ManifestType::SdkHost => "sdk_host",
        }
    }
}

/// Anything that can produce the initial manifest of a sysroot.
pub trait ManifestSource {
    fn parse_initial_manifest(&self) -> SdkResult<Manifest>;
}

/// Initial manifest stored as `<dir>/<type>_initial_manifest`.
#[derive(Debug, Clone)]
pub struct InitialManifestFile {
    path: PathBuf,
}

impl InitialManifestFile {
    pub fn new(manifest_dir: &Path, kind: ManifestType) -> Self {
        Self {
            path: manifest_dir.join(format!("{}_initial_manifest", kind.prefix())),
        }
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ManifestSource for InitialManifestFile {
    fn parse_initial_manifest(&self) -> SdkResult<Manifest> {
        let content = fs::read_to_string(&self.path).map_err(|e| SdkError::ManifestParse {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        parse_manifest_text(&content).map_err(|reason| SdkError::ManifestParse {
            path: self.path.clone(),
            reason,
        })
    }
}

fn parse_manifest_text(content: &str) -> Result<Manifest, String> {
    let mut manifest = Manifest::new();

    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((category, package)) = line.split_once(',') else {
            return Err(format!(
                "line {}: expected 'category,package', got '{}'",
                idx + 1,
                line
            ));
        };
        let (category, package) = (category.trim(), package.trim());
        if category.is_empty() || package.is_empty() {
            return Err(format!("line {}: empty category or package", idx + 1));
        }
        manifest.add(PackageCategory::from_token(category), package);
    }

    Ok(manifest)
}

/// Manifest already held in memory.
impl ManifestSource for Manifest {
    fn parse_initial_manifest(&self) -> SdkResult<Manifest> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_install_order_puts_mandatory_before_attempt_only() {
        let m = Manifest::new()
            .with(PackageCategory::AttemptOnly, ["docs"])
            .with(PackageCategory::MustInstall, ["busybox"]);
        let order: Vec<_> = m.in_install_order().map(|(c, _)| c.clone()).collect();
        assert_eq!(
            order,
            vec![PackageCategory::MustInstall, PackageCategory::AttemptOnly]
        );
    }

    #[test]
    fn test_unknown_category_is_skipped() {
        let m = Manifest::new()
            .with(PackageCategory::Other("xyz".into()), ["foo"])
            .with(PackageCategory::Language, ["locale-base-en-us"]);
        let order: Vec<_> = m.in_install_order().map(|(c, _)| c.clone()).collect();
        assert_eq!(order, vec![PackageCategory::Language]);
    }

    #[test]
    fn test_parse_file_dedups_and_keeps_order() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("sdk_target_initial_manifest"),
            "# generated\n\nmip,zlib\nmip,busybox\nmip,zlib\naop,docs\n",
        )
        .unwrap();

        let src = InitialManifestFile::new(temp.path(), ManifestType::SdkTarget);
        let m = src.parse_initial_manifest().unwrap();
        assert_eq!(
            m.get(&PackageCategory::MustInstall).unwrap(),
            ["zlib".to_string(), "busybox".to_string()]
        );
        assert_eq!(
            m.get(&PackageCategory::AttemptOnly).unwrap(),
            ["docs".to_string()]
        );
    }

    #[test]
    fn test_parse_rejects_malformed_line() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("sdk_host_initial_manifest");
        fs::write(&path, "mip,ok\nnot-a-pair\n").unwrap();

        let err = InitialManifestFile::at(&path)
            .parse_initial_manifest()
            .unwrap_err();
        assert!(matches!(err, SdkError::ManifestParse { .. }));
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_missing_manifest_is_parse_error() {
        let temp = TempDir::new().unwrap();
        let err = InitialManifestFile::new(temp.path(), ManifestType::SdkHost)
            .parse_initial_manifest()
            .unwrap_err();
        assert!(matches!(err, SdkError::ManifestParse { .. }));
    }

    #[test]
    fn test_attempt_only_flag() {
        assert!(PackageCategory::AttemptOnly.is_attempt_only());
        assert!(!PackageCategory::MustInstall.is_attempt_only());
        assert_eq!(PackageCategory::from_token("mlp"), PackageCategory::Multilib);
        assert_eq!(PackageCategory::Language.to_string(), "lgp");
    }
}
