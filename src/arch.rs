//! Architecture preference lists, keyed by multilib variant.
//!
//! Architectures are declared least-specific first (the way the build
//! configuration lists them). Backends want the best match first, so every
//! list is reversed on construction.

use std::collections::BTreeMap;

/// Variant id of the non-multilib preference list.
pub const DEFAULT_VARIANT: &str = "default";

/// Per-variant override declared for a multilib.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantOverride {
    pub package_archs: Vec<String>,
    pub os: Option<String>,
}

/// Ordered architecture preferences and OS ids, one entry per variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchPreferences {
    archs: BTreeMap<String, Vec<String>>,
    os: BTreeMap<String, String>,
}

impl ArchPreferences {
    /// Preferences with only the default variant.
    pub fn from_declared<I, S>(declared: I, os: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut archs = BTreeMap::new();
        archs.insert(DEFAULT_VARIANT.to_string(), reversed(declared));
        let mut os_map = BTreeMap::new();
        os_map.insert(DEFAULT_VARIANT.to_string(), os.trim().to_string());
        Self { archs, os: os_map }
    }

    /// Merge multilib variants.
    ///
    /// `multilibs` holds tokens such as `multilib:lib32`. A variant is added
    /// only when `overrides` declares something for it; other tokens are
    /// ignored. A variant without its own OS id inherits the default one.
    pub fn with_multilibs(
        mut self,
        multilibs: &[String],
        overrides: &BTreeMap<String, VariantOverride>,
    ) -> Self {
        for token in multilibs {
            let mut parts = token.split(':');
            let (Some("multilib"), Some(variant)) = (parts.next(), parts.next()) else {
                continue;
            };
            let Some(over) = overrides.get(variant) else {
                continue;
            };
            if over.package_archs.is_empty() {
                continue;
            }
            self.archs
                .insert(variant.to_string(), reversed(over.package_archs.iter().cloned()));
            let os = over
                .os
                .as_deref()
                .map(str::trim)
                .map(str::to_string)
                .unwrap_or_else(|| self.default_os().to_string());
            self.os.insert(variant.to_string(), os);
        }
        self
    }

    /// Default-variant preference list, best match first.
    pub fn default_archs(&self) -> &[String] {
        self.archs
            .get(DEFAULT_VARIANT)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn default_os(&self) -> &str {
        self.os.get(DEFAULT_VARIANT).map(String::as_str).unwrap_or("")
    }

    pub fn archs(&self, variant: &str) -> Option<&[String]> {
        self.archs.get(variant).map(Vec::as_slice)
    }

    pub fn os(&self, variant: &str) -> Option<&str> {
        self.os.get(variant).map(String::as_str)
    }

    /// Variant ids, `default` included.
    pub fn variants(&self) -> impl Iterator<Item = &str> {
        self.archs.keys().map(String::as_str)
    }

    /// Every architecture across all variants, best first, without repeats.
    pub fn all_archs(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let ordered = std::iter::once(DEFAULT_VARIANT)
            .chain(self.variants().filter(|v| *v != DEFAULT_VARIANT));
        for variant in ordered {
            for arch in self.archs(variant).unwrap_or(&[]) {
                if !out.contains(arch) {
                    out.push(arch.clone());
                }
            }
        }
        out
    }
}

fn reversed<I, S>(declared: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut list: Vec<String> = declared.into_iter().map(Into::into).collect();
    list.reverse();
    list
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_order_is_reversed() {
        let prefs = ArchPreferences::from_declared(["A", "B", "C"], "linux");
        assert_eq!(prefs.default_archs(), ["C", "B", "A"]);
        assert_eq!(prefs.default_os(), "linux");
    }

    #[test]
    fn test_multilib_requires_override() {
        let mut overrides = BTreeMap::new();
        overrides.insert(
            "lib32".to_string(),
            VariantOverride {
                package_archs: vec!["all".into(), "x86".into()],
                os: Some("linux ".into()),
            },
        );
        let prefs = ArchPreferences::from_declared(["all", "core2-64"], "linux").with_multilibs(
            &[
                "multilib:lib32".to_string(),
                "multilib:libx32".to_string(),
                "garbage".to_string(),
            ],
            &overrides,
        );

        assert_eq!(prefs.archs("lib32").unwrap(), ["x86", "all"]);
        assert_eq!(prefs.os("lib32"), Some("linux"));
        assert!(prefs.archs("libx32").is_none());
        assert_eq!(prefs.variants().count(), 2);
    }

    #[test]
    fn test_variant_inherits_default_os() {
        let mut overrides = BTreeMap::new();
        overrides.insert(
            "lib32".to_string(),
            VariantOverride {
                package_archs: vec!["x86".into()],
                os: None,
            },
        );
        let prefs = ArchPreferences::from_declared(["core2-64"], "linux-gnux32")
            .with_multilibs(&["multilib:lib32".to_string()], &overrides);
        assert_eq!(prefs.os("lib32"), Some("linux-gnux32"));
    }

    #[test]
    fn test_all_archs_default_first_without_repeats() {
        let mut overrides = BTreeMap::new();
        overrides.insert(
            "lib32".to_string(),
            VariantOverride {
                package_archs: vec!["all".into(), "x86".into()],
                os: None,
            },
        );
        let prefs = ArchPreferences::from_declared(["all", "core2-64"], "linux")
            .with_multilibs(&["multilib:lib32".to_string()], &overrides);
        assert_eq!(prefs.all_archs(), vec!["core2-64", "all", "x86"]);
    }
}
