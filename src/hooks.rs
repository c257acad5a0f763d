//! Pre/post-process hook commands.
//!
//! A hook is a shell command string run with `sh -c` in the current working
//! directory. The SDK paths are handed to it as environment variables on the
//! child process only.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{SdkError, SdkResult};
use crate::layout::SdkLayout;
use crate::process::{shell_in, CmdError};

/// Named hook points in a population run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPoint {
    /// After the output root is recreated, before any install.
    Preprocess,
    /// After the target sysroot and complementary packages are in.
    PostTarget,
    /// After the host sysroot is in.
    PostHost,
    /// After all fixups.
    Postprocess,
}

impl HookPoint {
    pub fn name(self) -> &'static str {
        match self {
            HookPoint::Preprocess => "preprocess",
            HookPoint::PostTarget => "post-target",
            HookPoint::PostHost => "post-host",
            HookPoint::Postprocess => "postprocess",
        }
    }
}

/// Configured hook commands; `None` or blank means nothing to run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hooks {
    pub preprocess: Option<String>,
    pub post_target: Option<String>,
    pub post_host: Option<String>,
    pub postprocess: Option<String>,
}

impl Hooks {
    pub fn command(&self, point: HookPoint) -> Option<&str> {
        let cmd = match point {
            HookPoint::Preprocess => &self.preprocess,
            HookPoint::PostTarget => &self.post_target,
            HookPoint::PostHost => &self.post_host,
            HookPoint::Postprocess => &self.postprocess,
        };
        cmd.as_deref().filter(|c| !c.trim().is_empty())
    }
}

/// Executes hook commands for one SDK layout.
#[derive(Debug, Clone)]
pub struct HookRunner {
    hooks: Hooks,
    workdir: PathBuf,
    env: Vec<(String, OsString)>,
}

impl HookRunner {
    pub fn new(hooks: Hooks, workdir: &Path, layout: &SdkLayout) -> Self {
        let env = vec![
            ("SDK_OUTPUT".to_string(), layout.output.clone().into_os_string()),
            (
                "SDK_TARGET_SYSROOT".to_string(),
                layout.target_sysroot().into_os_string(),
            ),
            (
                "SDK_NATIVE_SYSROOT".to_string(),
                layout.native_root().into_os_string(),
            ),
        ];
        Self {
            hooks,
            workdir: workdir.to_path_buf(),
            env,
        }
    }

    /// Run the hook for `point`, if one is configured.
    pub fn run(&self, point: HookPoint) -> SdkResult<()> {
        let Some(command) = self.hooks.command(point) else {
            return Ok(());
        };
        info!(hook = point.name(), command, "running hook");
        run_hook(command, &self.workdir, self.env.iter().cloned())
    }
}

/// Run one hook command; non-zero exit is a [`SdkError::HookExecution`].
pub fn run_hook<I>(command: &str, workdir: &Path, env: I) -> SdkResult<()>
where
    I: IntoIterator<Item = (String, OsString)>,
{
    shell_in(command, workdir)
        .envs(env)
        .error_msg(format!("hook `{}`", command))
        .run()
        .map(|_| ())
        .map_err(|e| {
            let detail = match &e {
                CmdError::Failed { stderr, .. } if stderr.is_empty() => "no stderr".to_string(),
                CmdError::Failed { stderr, .. } => stderr.clone(),
                CmdError::Spawn { source, .. } => source.to_string(),
            };
            SdkError::HookExecution {
                command: command.to_string(),
                code: e.code(),
                detail,
            }
        })
}
