//! Configuration model for lathe.
//!
//! Represents `lathe.yaml`. Parsing is forward-compatible (unknown fields
//! are ignored), every field has a default, and validation happens after
//! parse so a config error names the offending value.

use crate::error::{LatheError, Result};
use crate::tools::exec::{DEFAULT_ALLOWED, DEFAULT_DENY_PATTERNS};
use crate::tools::env::DEFAULT_TOOL_PRIORITY;
use crate::tools::vcs::VcsIdentity;
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_templates_root() -> String {
    "templates".to_string()
}

fn default_command_timeout_secs() -> u64 {
    120
}

fn default_env_tools() -> Vec<String> {
    DEFAULT_TOOL_PRIORITY.iter().map(|s| s.to_string()).collect()
}

fn default_allowed_commands() -> Vec<String> {
    DEFAULT_ALLOWED.iter().map(|s| s.to_string()).collect()
}

fn default_deny_patterns() -> Vec<String> {
    DEFAULT_DENY_PATTERNS.iter().map(|s| s.to_string()).collect()
}

/// Configuration for lathe.
///
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding templates, one subdirectory per template id.
    pub templates_root: String,

    /// Default commit identity for `--vcs` (both must be set to apply).
    pub vcs_name: Option<String>,
    /// See `vcs_name`.
    pub vcs_email: Option<String>,

    /// Environment tool priority, first available wins.
    pub env_tools: Vec<String>,

    /// Executables post-generation commands may invoke.
    pub allowed_commands: Vec<String>,

    /// Regexes that reject a post-command argument.
    pub deny_patterns: Vec<String>,

    /// Hard timeout for a single post-generation command, in seconds.
    pub command_timeout_secs: u64,

    /// Worker pool size; unset means a hardware-derived default.
    pub workers: Option<usize>,

    /// NDJSON event log path; unset disables event logging.
    pub event_log: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            templates_root: default_templates_root(),
            vcs_name: None,
            vcs_email: None,
            env_tools: default_env_tools(),
            allowed_commands: default_allowed_commands(),
            deny_patterns: default_deny_patterns(),
            command_timeout_secs: default_command_timeout_secs(),
            workers: None,
            event_log: None,
        }
    }
}

impl Config {
    /// Load and validate a config file.
    ///
    /// # Errors
    ///
    /// `UserError` when the file is missing, unparseable, or fails
    /// validation.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            LatheError::UserError(format!(
                "failed to read config '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: Config = serde_yaml::from_str(&raw).map_err(|e| {
            LatheError::UserError(format!(
                "invalid config '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config if the file exists, defaults otherwise. A file that
    /// exists but is invalid is still an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().is_file() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate config values.
    pub fn validate(&self) -> Result<()> {
        if self.templates_root.trim().is_empty() {
            return Err(LatheError::UserError(
                "templates_root must not be empty".to_string(),
            ));
        }
        if self.command_timeout_secs == 0 {
            return Err(LatheError::UserError(
                "command_timeout_secs must be positive".to_string(),
            ));
        }
        if self.env_tools.is_empty() {
            return Err(LatheError::UserError(
                "env_tools must list at least one tool".to_string(),
            ));
        }
        if let Some(workers) = self.workers
            && workers == 0
        {
            return Err(LatheError::UserError(
                "workers must be at least 1".to_string(),
            ));
        }
        if self.vcs_name.is_some() != self.vcs_email.is_some() {
            return Err(LatheError::UserError(
                "vcs_name and vcs_email must be set together".to_string(),
            ));
        }
        Ok(())
    }

    /// The configured commit identity, when complete.
    pub fn vcs_identity(&self) -> Option<VcsIdentity> {
        match (&self.vcs_name, &self.vcs_email) {
            (Some(name), Some(email)) => Some(VcsIdentity {
                name: name.clone(),
                email: email.clone(),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.templates_root, "templates");
        assert_eq!(config.command_timeout_secs, 120);
        assert_eq!(config.env_tools, default_env_tools());
        assert!(config.workers.is_none());
        assert!(config.vcs_identity().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_document_round_trips_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.templates_root, "templates");
        assert_eq!(config.allowed_commands, default_allowed_commands());
    }

    #[test]
    fn test_load_partial_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("lathe.yaml");
        std::fs::write(
            &path,
            "templates_root: /srv/templates\ncommand_timeout_secs: 30\nworkers: 4\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.templates_root, "/srv/templates");
        assert_eq!(config.command_timeout_secs, 30);
        assert_eq!(config.workers, Some(4));
        // Untouched fields keep their defaults.
        assert_eq!(config.env_tools, default_env_tools());
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let config: Config =
            serde_yaml::from_str("templates_root: t\nsome_future_flag: true\n").unwrap();
        assert_eq!(config.templates_root, "t");
    }

    #[test]
    fn test_load_missing_file_is_user_error() {
        let err = Config::load("/definitely/not/here/lathe.yaml").unwrap_err();
        assert!(matches!(err, LatheError::UserError(_)));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default("/definitely/not/here/lathe.yaml").unwrap();
        assert_eq!(config.templates_root, "templates");
    }

    #[test]
    fn test_load_or_default_invalid_file_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("lathe.yaml");
        std::fs::write(&path, "command_timeout_secs: 0\n").unwrap();
        assert!(Config::load_or_default(&path).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config {
            command_timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config = Config {
            env_tools: Vec::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config = Config {
            workers: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config = Config {
            vcs_name: Some("Alice".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_vcs_identity_requires_both_fields() {
        let config = Config {
            vcs_name: Some("Alice".to_string()),
            vcs_email: Some("alice@example.com".to_string()),
            ..Default::default()
        };
        let identity = config.vcs_identity().unwrap();
        assert_eq!(identity.name, "Alice");
        assert_eq!(identity.email, "alice@example.com");
    }
}
