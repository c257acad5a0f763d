//! SDK orchestration.
//!
//! [`Sdk`] owns the output root for one population: it wipes it, hands it to
//! the [`Adapter`] for the two sysroot installs, applies the fixups every SDK
//! needs whatever the packaging technology, and runs the hooks.
//!
//! ```text
//! select_adapter ─▶ Adapter { target pm, host pm, finalizer }
//!                      │
//! Sdk::populate ─ wipe ─ preprocess ─ Adapter::populate ─ fixups ─ postprocess
//! ```

pub mod adapter;
pub mod dpkg;
pub mod opkg;
pub mod rpm;
pub mod select;

use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use fs2::FileExt;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Phase, PhaseExt, PopulateError, SdkError, SdkResult};
use crate::fsops;
use crate::hooks::{HookPoint, HookRunner};
use crate::layout::{tree_digest, SdkLayout};

pub use adapter::{Adapter, AdapterState, Finalizer, SkippedInstall};
pub use select::{populate_sdk, select_adapter};

/// Host file the native `ld.so.cache` link points at.
pub const HOST_LD_SO_CACHE: &str = "/etc/ld.so.cache";

/// Packaging technology of the image and SDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageType {
    Rpm,
    Ipk,
    Deb,
}

impl PackageType {
    pub fn token(self) -> &'static str {
        match self {
            PackageType::Rpm => "rpm",
            PackageType::Ipk => "ipk",
            PackageType::Deb => "deb",
        }
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for PackageType {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "rpm" => Ok(PackageType::Rpm),
            "ipk" => Ok(PackageType::Ipk),
            "deb" => Ok(PackageType::Deb),
            other => Err(SdkError::config(format!(
                "unsupported image package type '{}' (expected rpm, ipk or deb)",
                other
            ))),
        }
    }
}

/// Outcome of a successful population.
#[derive(Debug, Clone, Serialize)]
pub struct PopulateReport {
    pub technology: PackageType,
    pub output: PathBuf,
    pub target_sysroot: PathBuf,
    pub native_sysroot: PathBuf,
    /// sha256 over the finished output tree.
    pub digest: String,
    /// Attempt-only installs that failed and were skipped.
    pub skipped: Vec<SkippedInstall>,
}

/// Exclusive claim on an output root, held through `<output>.lock`.
///
/// The lock file is left in place on release; only the flock matters.
#[derive(Debug)]
pub struct OutputLock {
    _file: File,
}

impl OutputLock {
    pub fn acquire(output: &Path) -> SdkResult<Self> {
        let path = lock_path(output);
        if let Some(parent) = path.parent() {
            fsops::ensure_dir(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(SdkError::io("opening lock file", &path))?;

        if file.try_lock_exclusive().is_err() {
            return Err(SdkError::config(format!(
                "output '{}' is being populated by another process (lock: {})",
                output.display(),
                path.display()
            )));
        }
        debug!(lock = %path.display(), "acquired output lock");
        Ok(Self { _file: file })
    }
}

fn lock_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "sdk".into());
    name.push(".lock");
    output.with_file_name(name)
}

/// Technology-agnostic supervisor of one SDK population.
pub struct Sdk {
    layout: SdkLayout,
    hooks: HookRunner,
    adapter: Adapter,
}

impl Sdk {
    pub fn new(layout: SdkLayout, hooks: HookRunner, adapter: Adapter) -> Self {
        Self {
            layout,
            hooks,
            adapter,
        }
    }

    pub fn technology(&self) -> PackageType {
        self.adapter.technology()
    }

    /// Build the SDK tree from scratch.
    ///
    /// Whatever was at the output root before is gone once this returns,
    /// successfully or not. On error the tree may be partially populated.
    pub fn populate(mut self) -> Result<PopulateReport, PopulateError> {
        let tech = Some(self.technology());
        let output = self.layout.output.clone();
        info!(technology = %self.technology(), output = %output.display(), "populating SDK");

        let _lock = OutputLock::acquire(&output).in_phase(Phase::Prepare, tech)?;
        fsops::recreate_dir(&output).in_phase(Phase::Prepare, tech)?;

        self.hooks
            .run(HookPoint::Preprocess)
            .in_phase(Phase::Hook, tech)?;

        self.adapter.populate(&self.layout, &self.hooks)?;

        self.apply_fixups().in_phase(Phase::Finalize, tech)?;

        self.hooks
            .run(HookPoint::Postprocess)
            .in_phase(Phase::Hook, tech)?;

        let digest = tree_digest(&output).in_phase(Phase::Finalize, tech)?;
        info!(digest = %digest, "SDK populated");

        Ok(PopulateReport {
            technology: self.technology(),
            target_sysroot: self.layout.target_sysroot(),
            native_sysroot: self.layout.native_root(),
            output,
            digest,
            skipped: self.adapter.take_skipped(),
        })
    }

    /// Fixups every SDK gets. Missing targets are not errors.
    fn apply_fixups(&self) -> SdkResult<()> {
        let libdir = self.layout.native_libdir();

        // A shipped GL implementation would shadow the host's.
        fsops::remove_matching(&libdir, "libGL*")?;
        // libtool archives embed build-host paths.
        fsops::remove_matching(&libdir, "*.la")?;

        fsops::force_symlink(Path::new(HOST_LD_SO_CACHE), &self.layout.native_ld_so_cache())
    }
}

impl fmt::Debug for Sdk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sdk")
            .field("layout", &self.layout)
            .field("technology", &self.technology())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_package_type_tokens() {
        assert_eq!("rpm".parse::<PackageType>().unwrap(), PackageType::Rpm);
        assert_eq!(" ipk ".parse::<PackageType>().unwrap(), PackageType::Ipk);
        assert_eq!("deb".parse::<PackageType>().unwrap(), PackageType::Deb);
        assert_eq!(PackageType::Ipk.to_string(), "ipk");
    }

    #[test]
    fn test_unknown_package_type_is_config_error() {
        let err = "tar".parse::<PackageType>().unwrap_err();
        assert!(matches!(err, SdkError::Config(_)));
        assert!(err.to_string().contains("tar"));
    }

    #[test]
    fn test_lock_path_is_sibling() {
        assert_eq!(
            lock_path(Path::new("/tmp/out/sdk")),
            PathBuf::from("/tmp/out/sdk.lock")
        );
    }

    #[test]
    fn test_second_lock_fails_fast() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("sdk");
        let first = OutputLock::acquire(&output).unwrap();
        let second = OutputLock::acquire(&output);
        assert!(matches!(second, Err(SdkError::Config(_))));
        drop(first);
        assert!(OutputLock::acquire(&output).is_ok());
    }
}
