//! Path definitions for the SDK output tree.
//!
//! This module only defines WHERE things go inside the output root; the
//! adapters decide WHAT lands there.

use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::error::{SdkError, SdkResult};

/// Derived paths for one SDK output root.
///
/// All relative components are stored without a leading `/` so they can be
/// joined onto the output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdkLayout {
    /// Output root; also the host sysroot.
    pub output: PathBuf,
    /// Native-tooling prefix relative to the output root.
    pub native_path: PathBuf,
    /// Target sysroot relative to the output root.
    pub target_path: PathBuf,
    /// System configuration directory, e.g. `etc`.
    pub sysconfdir: PathBuf,
    /// Native library directory, e.g. `usr/lib`.
    pub libdir_nativesdk: PathBuf,
    /// Native local state directory, e.g. `var`.
    pub localstatedir_nativesdk: PathBuf,
}

/// Strip leading and trailing slashes so a configured absolute path can be
/// joined onto the output root.
pub fn strip_root(path: &str) -> PathBuf {
    PathBuf::from(path.trim_matches('/'))
}

impl SdkLayout {
    pub fn new(
        output: impl Into<PathBuf>,
        native_path: &str,
        target_path: &str,
        sysconfdir: &str,
        libdir_nativesdk: &str,
        localstatedir_nativesdk: &str,
    ) -> Self {
        Self {
            output: output.into(),
            native_path: strip_root(native_path),
            target_path: strip_root(target_path),
            sysconfdir: strip_root(sysconfdir),
            libdir_nativesdk: strip_root(libdir_nativesdk),
            localstatedir_nativesdk: strip_root(localstatedir_nativesdk),
        }
    }

    /// Target sysroot: `<output>/<target_path>`.
    pub fn target_sysroot(&self) -> PathBuf {
        self.output.join(&self.target_path)
    }

    /// Host sysroot: the output root itself.
    pub fn host_sysroot(&self) -> &Path {
        &self.output
    }

    /// Native-tooling prefix: `<output>/<native_path>`.
    pub fn native_root(&self) -> PathBuf {
        self.output.join(&self.native_path)
    }

    /// Native library directory where stray `libGL*` and `*.la` are removed.
    pub fn native_libdir(&self) -> PathBuf {
        self.native_root().join(&self.libdir_nativesdk)
    }

    /// Native sysconfdir.
    pub fn native_sysconfdir(&self) -> PathBuf {
        self.native_root().join(&self.sysconfdir)
    }

    /// `ld.so.cache` link location inside the native prefix.
    pub fn native_ld_so_cache(&self) -> PathBuf {
        self.native_sysconfdir().join("ld.so.cache")
    }

    /// Relocated state directory for a packaging tool, e.g.
    /// `<native>/var/lib/opkg`.
    pub fn native_state_dir(&self, tool: &str) -> PathBuf {
        self.native_root()
            .join(&self.localstatedir_nativesdk)
            .join("lib")
            .join(tool)
    }

    /// Tool state directory as written by a host install, e.g.
    /// `<output>/var/lib/rpm`.
    pub fn host_state_dir(&self, tool: &str) -> PathBuf {
        self.output.join("var").join("lib").join(tool)
    }

    /// Sysconfdir of the target sysroot.
    pub fn target_sysconfdir(&self) -> PathBuf {
        self.target_sysroot().join(&self.sysconfdir)
    }

    /// Sysconfdir of the host sysroot (before relocation).
    pub fn host_sysconfdir(&self) -> PathBuf {
        self.output.join(&self.sysconfdir)
    }
}

/// Deterministic sha256 over a directory tree.
///
/// Covers relative paths, entry types, permission bits, symlink targets and
/// file contents. Timestamps and ownership are ignored.
pub fn tree_digest(root: &Path) -> SdkResult<String> {
    let mut hasher = Sha256::new();

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| SdkError::Io {
            action: "walking",
            path: e.path().unwrap_or(root).to_path_buf(),
            source: e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("filesystem loop")),
        })?;
        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let meta = entry
            .path()
            .symlink_metadata()
            .map_err(SdkError::io("reading metadata", entry.path()))?;

        hasher.update(rel.as_os_str().as_encoded_bytes());
        hasher.update([0]);

        let file_type = meta.file_type();
        if file_type.is_symlink() {
            let target = fs::read_link(entry.path())
                .map_err(SdkError::io("reading link", entry.path()))?;
            hasher.update(b"L");
            hasher.update(target.as_os_str().as_encoded_bytes());
        } else if file_type.is_dir() {
            hasher.update(b"D");
            hasher.update((meta.permissions().mode() & 0o7777).to_le_bytes());
        } else {
            hasher.update(b"F");
            hasher.update((meta.permissions().mode() & 0o7777).to_le_bytes());
            hash_file(&mut hasher, entry.path())?;
        }
        hasher.update([0]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

fn hash_file(hasher: &mut Sha256, path: &Path) -> SdkResult<()> {
    let f = File::open(path).map_err(SdkError::io("opening", path))?;
    let mut r = BufReader::new(f);
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = r.read(&mut buf).map_err(SdkError::io("reading", path))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(())
}
