//! Process environment as an explicit dependency.
//!
//! The executor never reads `std::env` directly. It asks an
//! [`EnvironmentProvider`] for the variables, working directory and PATH
//! lookup, so tests can run programs against a fixed, hermetic environment.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Source of the environment handed to child processes.
pub trait EnvironmentProvider: fmt::Debug + Send + Sync {
    /// Variables inherited by children.
    fn vars(&self) -> Vec<(String, String)>;

    /// Working directory of children.
    fn current_dir(&self) -> PathBuf;

    /// A single variable.
    fn var(&self, key: &str) -> Option<String> {
        self.vars()
            .into_iter()
            .find_map(|(k, v)| (k == key).then_some(v))
    }

    /// Resolve an executable name against this environment's `PATH`.
    fn find_executable(&self, name: &str) -> Option<PathBuf> {
        which::which_in(name, self.var("PATH"), self.current_dir()).ok()
    }
}

/// The environment of the running process.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnvironment;

impl EnvironmentProvider for SystemEnvironment {
    fn vars(&self) -> Vec<(String, String)> {
        std::env::vars().collect()
    }

    fn current_dir(&self) -> PathBuf {
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    }

    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// An explicit set of variables and a working directory.
#[derive(Debug, Clone, Default)]
pub struct FixedEnvironment {
    vars: BTreeMap<String, String>,
    cwd: PathBuf,
}

impl FixedEnvironment {
    /// Empty environment rooted at `cwd`.
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        Self {
            vars: BTreeMap::new(),
            cwd: cwd.as_ref().to_path_buf(),
        }
    }

    /// Set a variable.
    pub fn var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Copy `PATH` from the running process, if set.
    pub fn inherit_path(self) -> Self {
        match std::env::var("PATH") {
            Ok(path) => self.var("PATH", path),
            Err(_) => self,
        }
    }
}

impl EnvironmentProvider for FixedEnvironment {
    fn vars(&self) -> Vec<(String, String)> {
        self.vars
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn current_dir(&self) -> PathBuf {
        self.cwd.clone()
    }

    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_environment() {
        let env = FixedEnvironment::new("/work").var("A", "1").var("B", "2");
        assert_eq!(EnvironmentProvider::var(&env, "A").as_deref(), Some("1"));
        assert_eq!(EnvironmentProvider::var(&env, "C"), None);
        assert_eq!(env.current_dir(), PathBuf::from("/work"));
        assert_eq!(env.vars().len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_find_executable_uses_provider_path() {
        let env = FixedEnvironment::new("/").var("PATH", "/bin:/usr/bin");
        let sh = env.find_executable("sh").expect("sh should be on PATH");
        assert!(sh.ends_with("sh"));

        let empty = FixedEnvironment::new("/");
        assert!(empty.find_executable("sh").is_none());
    }

    #[test]
    fn test_missing_executable() {
        let env = FixedEnvironment::new("/").inherit_path();
        assert!(env
            .find_executable("cliodoc-definitely-not-installed")
            .is_none());
    }
}
