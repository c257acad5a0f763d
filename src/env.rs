//! Scoped process-environment snapshot.
//!
//! Backends receive their configuration through per-command environment
//! (see [`crate::process::Cmd::env`]). Tool wrappers outside this crate may
//! still export variables into the process, so a full population runs under
//! an [`EnvGuard`] which puts the environment back on every exit path,
//! unwinding included.

use std::collections::HashMap;
use std::env;
use std::ffi::OsString;

/// Restores the process environment to its state at construction when dropped.
#[derive(Debug)]
pub struct EnvGuard {
    saved: HashMap<OsString, OsString>,
}

impl EnvGuard {
    pub fn capture() -> Self {
        Self {
            saved: env::vars_os().collect(),
        }
    }

    fn restore(&self) {
        let current: Vec<OsString> = env::vars_os().map(|(k, _)| k).collect();
        for key in current {
            if !self.saved.contains_key(&key) {
                env::remove_var(&key);
            }
        }
        for (key, value) in &self.saved {
            if env::var_os(key).as_ref() != Some(value) {
                env::set_var(key, value);
            }
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        self.restore();
    }
}

/// Run `f` with the environment restored afterwards.
pub fn with_restored_env<T>(f: impl FnOnce() -> T) -> T {
    let _guard = EnvGuard::capture();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_added_variable_is_removed() {
        env::remove_var("SDK_BUILDER_ENV_ADDED");
        with_restored_env(|| env::set_var("SDK_BUILDER_ENV_ADDED", "1"));
        assert!(env::var_os("SDK_BUILDER_ENV_ADDED").is_none());
    }

    #[test]
    #[serial]
    fn test_changed_and_removed_variables_come_back() {
        env::set_var("SDK_BUILDER_ENV_KEEP", "original");
        env::set_var("SDK_BUILDER_ENV_GONE", "present");
        with_restored_env(|| {
            env::set_var("SDK_BUILDER_ENV_KEEP", "mutated");
            env::remove_var("SDK_BUILDER_ENV_GONE");
        });
        assert_eq!(env::var("SDK_BUILDER_ENV_KEEP").unwrap(), "original");
        assert_eq!(env::var("SDK_BUILDER_ENV_GONE").unwrap(), "present");
        env::remove_var("SDK_BUILDER_ENV_KEEP");
        env::remove_var("SDK_BUILDER_ENV_GONE");
    }

    #[test]
    #[serial]
    fn test_restored_on_error_path() {
        let result: Result<(), &str> = with_restored_env(|| {
            env::set_var("SDK_BUILDER_ENV_ERR", "leak");
            Err("boom")
        });
        assert!(result.is_err());
        assert!(env::var_os("SDK_BUILDER_ENV_ERR").is_none());
    }
}
