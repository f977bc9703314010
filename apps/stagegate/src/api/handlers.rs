//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.

use super::{
    AppState,
    types::{
        DecisionRequest, DecisionResponse, EvaluateRequest, EvaluateResponse, HealthResponse,
        LatestRoundRequest, RoundRequest, RoundResponse, StagesRequest, StagesResponse,
        StatusResponse,
    },
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use stagegate_core::{
    EvaluationContext, Evaluator, FileStageMapping, ReviewRoundReader, StageGateError,
};

/// HTTP status for a failed store operation.
fn error_status(error: &StageGateError) -> StatusCode {
    match error {
        StageGateError::UnknownIdentifier { .. }
        | StageGateError::InvalidRound(_)
        | StageGateError::LimitExceeded(_) => StatusCode::BAD_REQUEST,
        StageGateError::RoundNotFound { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// STATUS HANDLER
// =============================================================================

/// Get history store status.
pub async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let history = state.history.read().await;
    match history.counts() {
        Ok(counts) => (
            StatusCode::OK,
            Json(StatusResponse::new(
                history.backend_name(),
                counts,
                state.mapping.rules().len(),
            )),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(StatusResponse::error(
                history.backend_name(),
                format!("Status failed: {}", e),
            )),
        ),
    }
}

// =============================================================================
// MAPPING HANDLER
// =============================================================================

/// Get the active mapping table.
pub async fn mapping_handler(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.mapping.as_ref().clone()))
}

// =============================================================================
// EVALUATE HANDLER
// =============================================================================

/// Evaluate one access request.
///
/// Both permits and denials are 200; only malformed input (400) and store
/// faults (500) are errors.
pub async fn evaluate_handler(
    State(state): State<AppState>,
    Json(request): Json<EvaluateRequest>,
) -> impl IntoResponse {
    let (access, subject, submission) = match request.to_parts() {
        Ok(parts) => parts,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(EvaluateResponse::error(format!("Invalid request: {}", e))),
            );
        }
    };

    let history = state.history.read().await;
    let evaluator = Evaluator::with_history(state.mapping.as_ref(), &*history);
    let mut ctx = EvaluationContext::new();

    match evaluator.evaluate(&access, &subject, &submission, &mut ctx) {
        Ok(decision) => {
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
            (
                StatusCode::OK,
                Json(EvaluateResponse::from_decision(&decision)),
            )
        }
        Err(e) => {
            tracing::error!(
                event = "access_decision_failed",
                submission = %submission.id,
                error = %e,
                "Evaluation failed"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(EvaluateResponse::error(format!("Evaluation failed: {}", e))),
            )
        }
    }
}

// =============================================================================
// STAGES HANDLER
// =============================================================================

/// Assignable file stages for the given assignments and action.
pub async fn stages_handler(
    State(state): State<AppState>,
    Json(request): Json<StagesRequest>,
) -> impl IntoResponse {
    match request.to_parts() {
        Ok((assignments, action)) => {
            let stages = state.mapping.assigned_file_stages(&assignments, action);
            (StatusCode::OK, Json(StagesResponse::success(&stages)))
        }
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(StagesResponse::error(format!("Invalid request: {}", e))),
        ),
    }
}

// =============================================================================
// ROUND HANDLERS
// =============================================================================

/// Record a review round.
pub async fn record_round_handler(
    State(state): State<AppState>,
    Json(request): Json<RoundRequest>,
) -> impl IntoResponse {
    let round = match request.to_round() {
        Ok(round) => round,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(RoundResponse::error(format!("Invalid round: {}", e))),
            );
        }
    };

    let mut history = state.history.write().await;
    match history.record_round(round) {
        Ok(()) => {
            tracing::info!(
                event = "round_recorded",
                submission = %round.submission_id,
                stage = %round.stage,
                round = round.round,
                "Review round recorded"
            );
            (StatusCode::OK, Json(RoundResponse::with_round(round)))
        }
        Err(e) => (
            error_status(&e),
            Json(RoundResponse::error(format!("Record failed: {}", e))),
        ),
    }
}

/// Look up the latest review round.
pub async fn latest_round_handler(
    State(state): State<AppState>,
    Json(request): Json<LatestRoundRequest>,
) -> impl IntoResponse {
    let (submission, stage) = match request.to_parts() {
        Ok(parts) => parts,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(RoundResponse::error(format!("Invalid request: {}", e))),
            );
        }
    };

    let history = state.history.read().await;
    match history.latest_review_round(submission, stage) {
        Ok(Some(round)) => (StatusCode::OK, Json(RoundResponse::with_round(round))),
        Ok(None) => (StatusCode::OK, Json(RoundResponse::not_found())),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(RoundResponse::error(format!("Lookup failed: {}", e))),
        ),
    }
}

// =============================================================================
// DECISION HANDLER
// =============================================================================

/// Record an editorial decision against an existing round.
pub async fn record_decision_handler(
    State(state): State<AppState>,
    Json(request): Json<DecisionRequest>,
) -> impl IntoResponse {
    let (round, decision) = match request.to_parts() {
        Ok(parts) => parts,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(DecisionResponse::error(format!("Invalid decision: {}", e))),
            );
        }
    };

    let mut history = state.history.write().await;
    match history.record_decision(round, decision) {
        Ok(()) => {
            tracing::info!(
                event = "decision_recorded",
                submission = %round.submission_id,
                stage = %round.stage,
                round = round.round,
                decision = %decision.decision,
                "Editorial decision recorded"
            );
            (StatusCode::OK, Json(DecisionResponse::success()))
        }
        Err(e) => (
            error_status(&e),
            Json(DecisionResponse::error(format!("Record failed: {}", e))),
        ),
    }
}
