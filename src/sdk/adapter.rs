//! Backend adapter: drives the target and host sysroot installs.
//!
//! The install sequence is the same for every packaging technology; what
//! differs is how each sysroot's index is prepared and what has to be moved
//! around afterwards. That part lives behind [`Finalizer`].

use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

use super::PackageType;
use crate::error::{Phase, PhaseExt, PopulateError, SdkError, SdkResult};
use crate::hooks::{HookPoint, HookRunner};
use crate::layout::SdkLayout;
use crate::manifest::ManifestSource;
use crate::pm::{PackageManager, SysrootRole};

/// Technology-specific steps around the shared install sequence.
pub trait Finalizer {
    fn technology(&self) -> PackageType;

    /// Prepare the package index and configuration of one sysroot before
    /// its database is refreshed.
    fn prepare(&self, role: SysrootRole, pm: &mut dyn PackageManager) -> SdkResult<()>;

    /// Runs once the target sysroot, its complementary packages and the
    /// post-target hook are done.
    fn after_target(&self, layout: &SdkLayout, target: &mut dyn PackageManager) -> SdkResult<()>;

    /// Runs once the host sysroot and the post-host hook are done.
    fn after_host(&self, layout: &SdkLayout, host: &mut dyn PackageManager) -> SdkResult<()>;
}

/// Adapter lifecycle. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AdapterState {
    Constructed,
    TargetInstalling,
    TargetFinalizing,
    HostInstalling,
    HostFinalizing,
    Done,
}

/// An attempt-only install that failed and was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedInstall {
    pub sysroot: String,
    pub packages: Vec<String>,
    pub reason: String,
}

/// One packaging technology wired to its target and host backends.
pub struct Adapter {
    finalizer: Box<dyn Finalizer>,
    target_pm: Box<dyn PackageManager>,
    host_pm: Box<dyn PackageManager>,
    target_manifest: Box<dyn ManifestSource>,
    host_manifest: Box<dyn ManifestSource>,
    complementary: Option<String>,
    state: AdapterState,
    skipped: Vec<SkippedInstall>,
}

impl Adapter {
    pub fn new(
        finalizer: Box<dyn Finalizer>,
        target_pm: Box<dyn PackageManager>,
        host_pm: Box<dyn PackageManager>,
        target_manifest: Box<dyn ManifestSource>,
        host_manifest: Box<dyn ManifestSource>,
    ) -> Self {
        Self {
            finalizer,
            target_pm,
            host_pm,
            target_manifest,
            host_manifest,
            complementary: None,
            state: AdapterState::Constructed,
            skipped: Vec::new(),
        }
    }

    /// Feature globs for complementary target packages, e.g. `*-dev *-dbg`.
    pub fn with_complementary(mut self, globs: Option<String>) -> Self {
        self.complementary = globs.filter(|g| !g.trim().is_empty());
        self
    }

    pub fn technology(&self) -> PackageType {
        self.finalizer.technology()
    }

    pub fn state(&self) -> AdapterState {
        self.state
    }

    pub fn skipped(&self) -> &[SkippedInstall] {
        &self.skipped
    }

    pub(crate) fn take_skipped(&mut self) -> Vec<SkippedInstall> {
        std::mem::take(&mut self.skipped)
    }

    fn advance(&mut self, next: AdapterState) -> SdkResult<()> {
        if next <= self.state {
            return Err(SdkError::config(format!(
                "adapter cannot move from {:?} to {:?}",
                self.state, next
            )));
        }
        self.state = next;
        Ok(())
    }

    /// Populate target then host sysroot. Each adapter runs this once.
    pub fn populate(&mut self, layout: &SdkLayout, hooks: &HookRunner) -> Result<(), PopulateError> {
        let tech = Some(self.technology());

        self.advance(AdapterState::TargetInstalling)
            .in_phase(Phase::Prepare, tech)?;
        info!("installing target packages");
        self.populate_sysroot(SysrootRole::Target)
            .in_phase(Phase::TargetInstall, tech)?;

        if let Err(e) = self
            .target_pm
            .install_complementary(self.complementary.as_deref())
        {
            warn!(error = %e, "complementary packages not installed");
        }

        hooks
            .run(HookPoint::PostTarget)
            .in_phase(Phase::Hook, tech)?;

        self.advance(AdapterState::TargetFinalizing)
            .in_phase(Phase::Finalize, tech)?;
        self.finalizer
            .after_target(layout, self.target_pm.as_mut())
            .in_phase(Phase::Finalize, tech)?;

        self.advance(AdapterState::HostInstalling)
            .in_phase(Phase::HostInstall, tech)?;
        info!("installing nativesdk packages");
        self.populate_sysroot(SysrootRole::Host)
            .in_phase(Phase::HostInstall, tech)?;

        hooks
            .run(HookPoint::PostHost)
            .in_phase(Phase::Hook, tech)?;

        self.advance(AdapterState::HostFinalizing)
            .in_phase(Phase::Finalize, tech)?;
        self.finalizer
            .after_host(layout, self.host_pm.as_mut())
            .in_phase(Phase::Finalize, tech)?;

        self.advance(AdapterState::Done)
            .in_phase(Phase::Finalize, tech)
    }

    /// Shared per-sysroot sequence: parse, prepare, update, install in order.
    fn populate_sysroot(&mut self, role: SysrootRole) -> SdkResult<()> {
        let (pm, manifest) = match role {
            SysrootRole::Target => (self.target_pm.as_mut(), self.target_manifest.as_ref()),
            SysrootRole::Host => (self.host_pm.as_mut(), self.host_manifest.as_ref()),
        };

        let packages = manifest.parse_initial_manifest()?;

        self.finalizer.prepare(role, pm)?;
        pm.update()?;

        for (category, names) in packages.in_install_order() {
            if names.is_empty() {
                continue;
            }
            let attempt_only = category.is_attempt_only();
            info!(sysroot = %role, category = %category, count = names.len(), "installing");
            match pm.install(names, attempt_only) {
                Ok(()) => {}
                Err(e) if attempt_only => {
                    warn!(sysroot = %role, error = %e, "attempt-only install failed, skipping");
                    self.skipped.push(SkippedInstall {
                        sysroot: role.to_string(),
                        packages: names.to_vec(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Adapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adapter")
            .field("technology", &self.technology())
            .field("state", &self.state)
            .field("complementary", &self.complementary)
            .field("skipped", &self.skipped)
            .finish_non_exhaustive()
    }
}

/// Remove a backend's bookkeeping; failures are only logged.
pub(crate) fn strip_packaging_data(pm: &mut dyn PackageManager) {
    if let Err(e) = pm.remove_packaging_data() {
        warn!(root = %pm.root().display(), error = %e, "packaging data not removed");
    }
}
