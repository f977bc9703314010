//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api::{self, DecisionRequest, EvaluateRequest, EvaluateResponse, RoundRequest};
use crate::config::{BackendKind, Config};
use serde::Serialize;
use stagegate_core::{
    EvaluationContext, Evaluator, HistoryStore, MappingTable, StageGateError,
};
use std::path::{Path, PathBuf};

// =============================================================================
// FILE LIMITS
// =============================================================================

/// Maximum size of a request or mapping file (1 MB).
pub const MAX_REQUEST_FILE_SIZE: u64 = 1024 * 1024;

/// Resolve an input path and check it is a regular file within the size limit.
fn validate_input_file(path: &Path) -> Result<PathBuf, StageGateError> {
    let canonical = path.canonicalize().map_err(|e| {
        StageGateError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(StageGateError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    let metadata = std::fs::metadata(&canonical)
        .map_err(|e| StageGateError::IoError(format!("Cannot read file metadata: {}", e)))?;
    if metadata.len() > MAX_REQUEST_FILE_SIZE {
        return Err(StageGateError::LimitExceeded(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_REQUEST_FILE_SIZE
        )));
    }

    Ok(canonical)
}

fn read_input_file(path: &Path) -> Result<String, StageGateError> {
    let path = validate_input_file(path)?;
    std::fs::read_to_string(&path)
        .map_err(|e| StageGateError::IoError(format!("Cannot read '{}': {}", path.display(), e)))
}

fn print_json(value: &impl Serialize) -> Result<(), StageGateError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| StageGateError::SerializationError(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

fn open_store(config: &Config) -> Result<HistoryStore, StageGateError> {
    let store = config.open_store()?;
    if !store.is_persistent() {
        tracing::warn!("Using the memory backend: recorded history is lost on exit");
    }
    Ok(store)
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(config: &Config) -> Result<(), StageGateError> {
    let store = open_store(config)?;
    let mapping = config.mapping_table();

    println!("Stagegate Policy Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", config.server.host);
    println!("  Port:     {}", config.server.port);
    println!("  Backend:  {}", store.backend_name());
    println!("  Database: {}", config.storage.database.display());
    println!("  Rules:    {}", mapping.rules().len());
    println!();
    println!("Endpoints:");
    println!("  POST /access/evaluate - Evaluate a file access request");
    println!("  POST /access/stages   - Assignable file stages");
    println!("  POST /rounds          - Record a review round");
    println!("  POST /rounds/latest   - Latest review round");
    println!("  POST /decisions       - Record an editorial decision");
    println!("  GET  /mapping         - Active mapping table");
    println!("  GET  /status          - History store status");
    println!("  GET  /health          - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{}:{}", config.server.host, config.server.port);
    api::run_server(&addr, store, mapping).await
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show history store status.
pub fn cmd_status(config: &Config, json_mode: bool) -> Result<(), StageGateError> {
    let store = open_store(config)?;
    let counts = store.counts()?;
    let rules = config.mapping_table().rules().len();

    if json_mode {
        return print_json(&serde_json::json!({
            "database": config.storage.database.to_string_lossy(),
            "backend": store.backend_name(),
            "rounds": counts.rounds,
            "decisions": counts.decisions,
            "mapping_rules": rules,
        }));
    }

    println!("Stagegate Status");
    println!("================");
    println!("Database:  {}", config.storage.database.display());
    println!("Backend:   {}", store.backend_name());
    println!();
    println!("Rounds:    {}", counts.rounds);
    println!("Decisions: {}", counts.decisions);
    println!("Rules:     {}", rules);

    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new empty history database.
pub fn cmd_init(config: &Config, force: bool) -> Result<(), StageGateError> {
    if config.storage.backend == BackendKind::Memory {
        return Err(StageGateError::ConfigError(
            "init requires the redb backend".to_string(),
        ));
    }

    let db_path = &config.storage.database;
    if db_path.exists() {
        if !force {
            return Err(StageGateError::IoError(format!(
                "Database {} already exists. Use --force to overwrite.",
                db_path.display()
            )));
        }
        std::fs::remove_file(db_path)
            .map_err(|e| StageGateError::IoError(format!("Cannot remove database: {}", e)))?;
    }

    HistoryStore::open_redb(db_path)?;
    println!("Initialized empty history database at {}", db_path.display());
    Ok(())
}

// =============================================================================
// EVALUATE COMMAND
// =============================================================================

/// Evaluate one access request read from a JSON file.
pub fn cmd_evaluate(config: &Config, json_mode: bool, file: &Path) -> Result<(), StageGateError> {
    let text = read_input_file(file)?;
    let request: EvaluateRequest = serde_json::from_str(&text)
        .map_err(|e| StageGateError::SerializationError(format!("Invalid request: {}", e)))?;
    let (access, subject, submission) = request.to_parts()?;

    let store = open_store(config)?;
    let mapping = config.mapping_table();
    let evaluator = Evaluator::with_history(&mapping, &store);
    let mut ctx = EvaluationContext::new();
    let decision = evaluator.evaluate(&access, &subject, &submission, &mut ctx)?;

    tracing::info!(
        event = "access_decision",
        submission = %submission.id,
        file_stage = ?access.file_stage,
        action = %access.action,
        permitted = decision.permitted,
        grant = ?decision.grant,
        denial = ?decision.denial,
        "Access evaluated"
    );

    if json_mode {
        return print_json(&EvaluateResponse::from_decision(&decision));
    }

    let stage = access
        .file_stage
        .map_or_else(|| "(none)".to_string(), |stage| stage.to_string());
    println!("Submission: {}", submission.id);
    println!("File stage: {}", stage);
    println!("Action:     {}", access.action);
    println!();
    match (decision.grant, decision.denial) {
        (Some(grant), _) => println!("PERMIT ({:?})", grant),
        (None, Some(reason)) => {
            println!("DENY ({:?})", reason);
            println!("Message:    {}", reason.message_code());
        }
        (None, None) => println!("DENY"),
    }
    if let Some(stages) = ctx.accessible_file_stages() {
        let names: Vec<&str> = stages.iter().map(|stage| stage.as_str()).collect();
        println!("Accessible: {}", names.join(", "));
    }
    Ok(())
}

// =============================================================================
// HISTORY COMMANDS
// =============================================================================

/// Record a review round.
pub fn cmd_round(
    config: &Config,
    json_mode: bool,
    submission: u64,
    stage: &str,
    round: u32,
) -> Result<(), StageGateError> {
    let round = RoundRequest {
        submission_id: submission,
        stage: stage.to_string(),
        round,
    }
    .to_round()?;

    let mut store = open_store(config)?;
    store.record_round(round)?;

    if json_mode {
        return print_json(&api::RoundResponse::with_round(round));
    }
    println!(
        "Recorded round {} for submission {} at {}",
        round.round, round.submission_id, round.stage
    );
    Ok(())
}

/// Record an editorial decision against an existing round.
pub fn cmd_decide(
    config: &Config,
    json_mode: bool,
    submission: u64,
    stage: &str,
    round: u32,
    decision: &str,
) -> Result<(), StageGateError> {
    let (round, decision) = DecisionRequest {
        submission_id: submission,
        stage: stage.to_string(),
        round,
        decision: decision.to_string(),
    }
    .to_parts()?;

    let mut store = open_store(config)?;
    store.record_decision(round, decision)?;

    if json_mode {
        return print_json(&api::DecisionResponse::success());
    }
    println!(
        "Recorded decision {} for submission {} at {} round {}",
        decision.decision, round.submission_id, round.stage, round.round
    );
    Ok(())
}

// =============================================================================
// MAPPING COMMAND
// =============================================================================

/// Show the active mapping table, or validate a mapping file.
///
/// A mapping file holds `[[rules]]` entries, the same shape as the
/// `[mapping]` section of the configuration file.
pub fn cmd_mapping(
    config: &Config,
    json_mode: bool,
    check: Option<&Path>,
) -> Result<(), StageGateError> {
    let (table, source) = match check {
        Some(path) => {
            let text = read_input_file(path)?;
            let table: MappingTable =
                toml::from_str(&text).map_err(|e| StageGateError::InvalidMapping(e.to_string()))?;
            table.validate()?;
            (table, path.display().to_string())
        }
        None => (config.mapping_table(), "active configuration".to_string()),
    };

    if json_mode {
        return print_json(&table);
    }

    if check.is_some() {
        println!("OK: {} rules in {}", table.rules().len(), source);
        return Ok(());
    }

    println!("Mapping table ({})", source);
    println!("=============");
    for rule in table.rules() {
        let roles: Vec<&str> = rule.roles.iter().map(|role| role.as_str()).collect();
        let read: Vec<&str> = rule.read.iter().map(|stage| stage.as_str()).collect();
        let modify: Vec<&str> = rule.modify.iter().map(|stage| stage.as_str()).collect();
        println!("{} [{}]", rule.workflow_stage, roles.join(", "));
        println!("  read:   {}", read.join(", "));
        println!("  modify: {}", modify.join(", "));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use stagegate_core::{ReviewRoundReader, SubmissionId, WorkflowStage};
    use tempfile::TempDir;

    fn redb_config(dir: &TempDir) -> Config {
        Config {
            storage: StorageConfig {
                backend: BackendKind::Redb,
                database: dir.path().join("history.redb"),
            },
            ..Config::default()
        }
    }

    #[test]
    fn init_refuses_existing_database() {
        let dir = TempDir::new().expect("tempdir");
        let config = redb_config(&dir);
        cmd_init(&config, false).expect("first init");
        assert!(cmd_init(&config, false).is_err());
        cmd_init(&config, true).expect("forced init");
    }

    #[test]
    fn init_rejects_memory_backend() {
        let config = Config {
            storage: StorageConfig {
                backend: BackendKind::Memory,
                ..StorageConfig::default()
            },
            ..Config::default()
        };
        assert!(matches!(
            cmd_init(&config, false),
            Err(StageGateError::ConfigError(_))
        ));
    }

    #[test]
    fn recorded_history_persists_between_commands() {
        let dir = TempDir::new().expect("tempdir");
        let config = redb_config(&dir);
        cmd_round(&config, true, 9, "external_review", 1).expect("round");
        cmd_decide(&config, true, 9, "external_review", 1, "accept").expect("decide");

        let store = config.open_store().expect("reopen");
        let latest = store
            .latest_review_round(SubmissionId(9), WorkflowStage::ExternalReview)
            .expect("lookup");
        assert_eq!(latest.map(|round| round.round), Some(1));
        assert_eq!(store.counts().expect("counts").decisions, 1);
    }

    #[test]
    fn decide_without_round_fails() {
        let dir = TempDir::new().expect("tempdir");
        let config = redb_config(&dir);
        let result = cmd_decide(&config, true, 9, "internal_review", 1, "accept");
        assert!(matches!(result, Err(StageGateError::RoundNotFound { .. })));
    }

    #[test]
    fn evaluate_reads_request_file() {
        let dir = TempDir::new().expect("tempdir");
        let config = redb_config(&dir);
        let path = dir.path().join("request.json");
        std::fs::write(
            &path,
            r#"{"submission_id": 1, "file_stage": "submission", "action": "read", "roles": ["manager"]}"#,
        )
        .expect("write");
        cmd_evaluate(&config, true, &path).expect("evaluate");
    }

    #[test]
    fn evaluate_rejects_unknown_role() {
        let dir = TempDir::new().expect("tempdir");
        let config = redb_config(&dir);
        let path = dir.path().join("request.json");
        std::fs::write(
            &path,
            r#"{"submission_id": 1, "action": "read", "roles": ["editor_in_chief"]}"#,
        )
        .expect("write");
        assert!(matches!(
            cmd_evaluate(&config, true, &path),
            Err(StageGateError::UnknownIdentifier { .. })
        ));
    }

    #[test]
    fn mapping_check_validates_file() {
        let dir = TempDir::new().expect("tempdir");
        let config = Config::default();

        let good = dir.path().join("good.toml");
        std::fs::write(
            &good,
            "[[rules]]\nworkflow_stage = \"editing\"\nroles = [\"assistant\"]\nread = [\"copyedit\"]\n",
        )
        .expect("write");
        cmd_mapping(&config, true, Some(&good)).expect("valid mapping");

        let duplicate = dir.path().join("duplicate.toml");
        std::fs::write(
            &duplicate,
            "[[rules]]\nworkflow_stage = \"editing\"\nroles = [\"assistant\"]\n\n\
             [[rules]]\nworkflow_stage = \"editing\"\nroles = [\"assistant\"]\n",
        )
        .expect("write");
        assert!(matches!(
            cmd_mapping(&config, true, Some(&duplicate)),
            Err(StageGateError::InvalidMapping(_))
        ));
    }

    #[test]
    fn missing_input_file_is_io_error() {
        let result = read_input_file(Path::new("/nonexistent/request.json"));
        assert!(matches!(result, Err(StageGateError::IoError(_))));
    }
}
