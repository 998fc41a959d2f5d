//! Configuration file loading and parsing.

use crate::types::CliodocConfig;
use regex::{Captures, Regex};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Directory holding project configuration.
pub const CONFIG_DIR: &str = ".cliodoc";
/// Configuration file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "config.yaml";

const ENV_REFERENCE: &str = r"\$\{([^}:]+)(?::-([^}]*))?\}";

/// Config loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read config {}: {source}", path.display())]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML at line {}: {message}", line.map(|l| l.to_string()).unwrap_or_else(|| "unknown".to_string()))]
    ParseError { line: Option<usize>, message: String },

    #[error("validation error: {message}")]
    ValidationError { message: String },

    #[error("environment variable not found: {var}")]
    EnvVarNotFound { var: String },
}

/// Configuration loader.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    base_path: PathBuf,
}

impl ConfigLoader {
    /// Create a loader for the given project directory.
    pub fn new(project_dir: impl AsRef<Path>) -> Self {
        Self {
            base_path: project_dir.as_ref().to_path_buf(),
        }
    }

    /// `.cliodoc/config.yaml` under the project directory.
    pub fn config_path(&self) -> PathBuf {
        self.base_path.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Load the project configuration, or defaults when there is none.
    pub fn load(&self) -> Result<CliodocConfig, ConfigError> {
        let path = self.config_path();
        if !path.exists() {
            return Ok(CliodocConfig::default());
        }
        Self::load_file(&path)
    }

    /// Load an explicitly named file, which must exist.
    pub fn load_file(path: &Path) -> Result<CliodocConfig, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents, |var| std::env::var(var).ok())
    }

    /// Expand, decode and validate configuration text.
    pub fn parse(
        contents: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<CliodocConfig, ConfigError> {
        let expanded = expand_env_vars(contents, lookup)?;

        // An empty or comment-only file means defaults.
        if expanded.lines().all(|l| {
            let l = l.trim();
            l.is_empty() || l.starts_with('#')
        }) {
            return Ok(CliodocConfig::default());
        }

        let config: CliodocConfig =
            serde_yaml::from_str(&expanded).map_err(|e| ConfigError::ParseError {
                line: e.location().map(|l| l.line()),
                message: e.to_string(),
            })?;

        validate(&config)?;
        Ok(config)
    }
}

/// Expand `${VAR}` and `${VAR:-default}` references.
pub fn expand_env_vars(
    content: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String, ConfigError> {
    let re = Regex::new(ENV_REFERENCE).map_err(|e| ConfigError::ParseError {
        line: None,
        message: e.to_string(),
    })?;

    let mut missing = None;
    let expanded = re.replace_all(content, |caps: &Captures| {
        match lookup(&caps[1]).or_else(|| caps.get(2).map(|m| m.as_str().to_string())) {
            Some(value) => value,
            None => {
                missing.get_or_insert_with(|| caps[1].to_string());
                String::new()
            }
        }
    });
    let expanded = expanded.into_owned();

    match missing {
        Some(var) => Err(ConfigError::EnvVarNotFound { var }),
        None => Ok(expanded),
    }
}

/// Validate configuration values.
pub fn validate(config: &CliodocConfig) -> Result<(), ConfigError> {
    let render = &config.render;

    if render.delimiters.len() != 2 || render.delimiters.iter().any(String::is_empty) {
        return Err(ConfigError::ValidationError {
            message: "render.delimiters must be two non-empty strings".to_string(),
        });
    }

    if render.jobs == 0 {
        return Err(ConfigError::ValidationError {
            message: "render.jobs must be greater than 0".to_string(),
        });
    }

    for mask in &render.globs {
        glob::Pattern::new(mask).map_err(|e| ConfigError::ValidationError {
            message: format!("render.globs entry {mask:?} is invalid: {e}"),
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::tempdir;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_load_defaults_when_no_file() {
        let dir = tempdir().unwrap();
        let config = ConfigLoader::new(dir.path()).load().unwrap();
        assert_eq!(config, CliodocConfig::default());
    }

    #[test]
    fn test_load_config_from_yaml_file() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(CONFIG_DIR)).unwrap();
        fs::write(
            dir.path().join(".cliodoc/config.yaml"),
            r#"
repositories:
  - programs
render:
  output_directory: site
  delimiters: ["<<", ">>"]
  allow_program_creation: true
exec:
  kill_grace_ms: 250
"#,
        )
        .unwrap();

        let config = ConfigLoader::new(dir.path()).load().unwrap();
        assert_eq!(config.repositories, vec![PathBuf::from("programs")]);
        assert_eq!(config.render.output_directory, PathBuf::from("site"));
        assert_eq!(config.render.delimiters, vec!["<<", ">>"]);
        assert!(config.render.allow_program_creation);
        assert_eq!(config.exec.kill_grace_ms, 250);
        assert!(config.render.with_template);
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");
        assert!(matches!(
            ConfigLoader::load_file(&missing),
            Err(ConfigError::NotFound { .. })
        ));
    }

    #[test]
    fn test_env_var_expansion() {
        let lookup = vars(&[("OUT", "public"), ("PREFIX", "a"), ("SUFFIX", "b")]);
        assert_eq!(
            expand_env_vars("dir: ${OUT}/${PREFIX}-${SUFFIX}", &lookup).unwrap(),
            "dir: public/a-b"
        );
        assert_eq!(
            expand_env_vars("jobs: ${JOBS:-3}", &lookup).unwrap(),
            "jobs: 3"
        );
    }

    #[test]
    fn test_env_var_missing_error() {
        match expand_env_vars("key: ${MISSING_VAR}", vars(&[])) {
            Err(ConfigError::EnvVarNotFound { var }) => assert_eq!(var, "MISSING_VAR"),
            other => panic!("expected EnvVarNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_env_var_expansion_in_config() {
        let yaml = "render:\n  jobs: ${JOBS}\n  quiet: ${QUIET:-true}\n";
        let config = ConfigLoader::parse(yaml, vars(&[("JOBS", "8")])).unwrap();
        assert_eq!(config.render.jobs, 8);
        assert!(config.render.quiet);
    }

    #[test]
    fn test_validation_errors() {
        let cases = [
            ("render:\n  delimiters: [\"<<\"]\n", "delimiters"),
            ("render:\n  delimiters: [\"\", \">>\"]\n", "delimiters"),
            ("render:\n  jobs: 0\n", "jobs"),
            ("render:\n  globs: [\"[oops\"]\n", "globs"),
        ];
        for (yaml, field) in cases {
            match ConfigLoader::parse(yaml, vars(&[])) {
                Err(ConfigError::ValidationError { message }) => {
                    assert!(message.contains(field), "{message}")
                }
                other => panic!("expected a validation error for {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_parse_error_with_line_number() {
        let bad = "render:\n  globs: [unclosed\n";
        match ConfigLoader::parse(bad, vars(&[])) {
            Err(ConfigError::ParseError { line, .. }) => assert!(line.is_some()),
            other => panic!("expected ParseError, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_file_is_defaults() {
        let config = ConfigLoader::parse("# nothing yet\n", vars(&[])).unwrap();
        assert_eq!(config, CliodocConfig::default());
    }
}
