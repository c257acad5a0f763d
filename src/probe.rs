//! Runtime package presence probe over a deployed image manifest.
//!
//! Independent of SDK population: it only reads the `<image>.manifest` file
//! an image build leaves next to the image.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::{SdkError, SdkResult};

/// One `name arch version` line of an image manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub name: String,
    pub arch: String,
    pub version: String,
}

/// Contents of a deployed image manifest.
#[derive(Debug, Clone)]
pub struct ImageManifest {
    path: PathBuf,
    text: String,
}

impl ImageManifest {
    /// Path of the manifest for `link_name` in an image deploy dir.
    pub fn locate(deploy_dir: &Path, link_name: &str) -> PathBuf {
        deploy_dir.join(format!("{}.manifest", link_name))
    }

    pub fn load(path: &Path) -> SdkResult<Self> {
        let text = fs::read_to_string(path).map_err(SdkError::io("reading", path))?;
        Ok(Self::from_text(path, text))
    }

    pub fn from_text(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether `pattern` matches anywhere in the manifest text.
    ///
    /// The search is unanchored, so `busybox` also matches `busybox-udhcpc`;
    /// anchor with `^`/`$` (multi-line) to match a whole name.
    pub fn has_package(&self, pattern: &str) -> SdkResult<bool> {
        let re = Regex::new(&format!("(?m){}", pattern))
            .map_err(|e| SdkError::config(format!("invalid package pattern '{}': {}", pattern, e)))?;
        Ok(re.is_match(&self.text))
    }

    /// Parsed entries; lines with fewer than three fields are skipped.
    pub fn entries(&self) -> Vec<ManifestEntry> {
        self.text
            .lines()
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                match (fields.next(), fields.next(), fields.next()) {
                    (Some(name), Some(arch), Some(version)) => Some(ManifestEntry {
                        name: name.to_string(),
                        arch: arch.to_string(),
                        version: version.to_string(),
                    }),
                    _ => None,
                }
            })
            .collect()
    }
}
