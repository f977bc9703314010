//! # Configuration
//!
//! Loads `stagegate.toml`. Every section is optional; missing values fall back
//! to the defaults below, and CLI flags override what the file says.
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//!
//! [storage]
//! backend = "redb"          # or "memory"
//! database = "stagegate.db"
//!
//! [[mapping.rules]]
//! workflow_stage = "production"
//! roles = ["manager", "assistant"]
//! read = ["proof", "production_ready"]
//! modify = ["proof", "production_ready"]
//! ```
//!
//! Without a `[mapping]` section the standard editorial table is used.

use serde::{Deserialize, Serialize};
use stagegate_core::{HistoryStore, MappingTable, StageGateError};
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "stagegate.toml";

/// Maximum config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

// =============================================================================
// SECTIONS
// =============================================================================

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Volatile in-memory history.
    Memory,
    /// Disk-backed redb history.
    Redb,
}

/// `[server]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// `[storage]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub backend: BackendKind,
    pub database: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Redb,
            database: PathBuf::from("stagegate.db"),
        }
    }
}

// =============================================================================
// CONFIG
// =============================================================================

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub mapping: Option<MappingTable>,
}

impl Config {
    /// Parse and validate configuration text.
    pub fn from_toml_str(text: &str) -> Result<Self, StageGateError> {
        let config: Config =
            toml::from_str(text).map_err(|e| StageGateError::ConfigError(e.to_string()))?;
        if let Some(mapping) = &config.mapping {
            mapping.validate()?;
        }
        Ok(config)
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, [`DEFAULT_CONFIG_FILE`] is read
    /// if present, otherwise defaults are returned.
    pub fn load(path: Option<&Path>) -> Result<Self, StageGateError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.is_file() {
                    tracing::debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                    return Ok(Self::default());
                }
                default
            }
        };

        let metadata = std::fs::metadata(&path).map_err(|e| {
            StageGateError::ConfigError(format!("Cannot read '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(StageGateError::ConfigError(format!(
                "Config file {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }

        let text = std::fs::read_to_string(&path).map_err(|e| {
            StageGateError::ConfigError(format!("Cannot read '{}': {}", path.display(), e))
        })?;
        tracing::info!("Loaded configuration from {}", path.display());
        Self::from_toml_str(&text)
    }

    /// The mapping table in force.
    #[must_use]
    pub fn mapping_table(&self) -> MappingTable {
        self.mapping.clone().unwrap_or_default()
    }

    /// Open the configured history store.
    pub fn open_store(&self) -> Result<HistoryStore, StageGateError> {
        match self.storage.backend {
            BackendKind::Memory => Ok(HistoryStore::new()),
            BackendKind::Redb => HistoryStore::open_redb(&self.storage.database),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use stagegate_core::{FileAction, FileStage, FileStageMapping, RoleId, StageAssignments, WorkflowStage};

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::from_toml_str("").expect("parse");
        assert_eq!(config, Config::default());
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.backend, BackendKind::Redb);
        assert_eq!(config.mapping_table(), MappingTable::default());
    }

    #[test]
    fn sections_override_defaults() {
        let config = Config::from_toml_str(
            r#"
            [server]
            port = 9090

            [storage]
            backend = "memory"
            "#,
        )
        .expect("parse");
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.storage.backend, BackendKind::Memory);
        assert!(!config.open_store().expect("store").is_persistent());
    }

    #[test]
    fn mapping_rules_replace_default_table() {
        let config = Config::from_toml_str(
            r#"
            [[mapping.rules]]
            workflow_stage = "production"
            roles = ["author"]
            read = ["proof"]
            modify = ["proof"]
            "#,
        )
        .expect("parse");
        let table = config.mapping_table();
        assert_eq!(table.rules().len(), 1);

        let assignments = StageAssignments::new().with(WorkflowStage::Production, RoleId::Author);
        assert!(
            table
                .assigned_file_stages(&assignments, FileAction::Modify)
                .contains(&FileStage::Proof)
        );
    }

    #[test]
    fn invalid_mapping_rejected() {
        let result = Config::from_toml_str(
            r#"
            [[mapping.rules]]
            workflow_stage = "editing"
            roles = []
            "#,
        );
        assert!(matches!(result, Err(StageGateError::InvalidMapping(_))));
    }

    #[test]
    fn unknown_names_rejected() {
        assert!(Config::from_toml_str("[server]\nhots = \"x\"").is_err());
        assert!(
            Config::from_toml_str(
                "[[mapping.rules]]\nworkflow_stage = \"review\"\nroles = [\"author\"]"
            )
            .is_err()
        );
    }

    #[test]
    fn mistyped_mapping_keys_rejected() {
        let rule_typo = Config::from_toml_str(
            "[[mapping.rule]]\nworkflow_stage = \"editing\"\nroles = [\"author\"]",
        );
        assert!(matches!(rule_typo, Err(StageGateError::ConfigError(_))));

        let field_typo = Config::from_toml_str(
            r#"
            [[mapping.rules]]
            workflow_stage = "editing"
            roles = ["author"]
            modfy = ["copyedit"]
            "#,
        );
        assert!(matches!(field_typo, Err(StageGateError::ConfigError(_))));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let result = Config::load(Some(Path::new("/nonexistent/stagegate.toml")));
        assert!(matches!(result, Err(StageGateError::ConfigError(_))));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("stagegate.toml");
        std::fs::write(&path, "[server]\nhost = \"0.0.0.0\"\n").expect("write");
        let config = Config::load(Some(&path)).expect("load");
        assert_eq!(config.server.host, "0.0.0.0");
    }
}
