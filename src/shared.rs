use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::broadcast::BroadcastHub;
use crate::cards::CardService;
use crate::clues::ClueService;
use crate::game::GameService;

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub game_service: Arc<GameService>,
    pub card_service: Arc<CardService>,
    pub clue_service: Arc<ClueService>,
    pub hub: Arc<BroadcastHub>,
}

impl AppState {
    pub fn new(
        game_service: Arc<GameService>,
        card_service: Arc<CardService>,
        clue_service: Arc<ClueService>,
    ) -> Self {
        let hub = game_service.hub();
        Self {
            game_service,
            card_service,
            clue_service,
            hub,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Exhausted: {0}")]
    Exhausted(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Clue generation failed: {0}")]
    ClueGeneration(String),

    #[error("Internal server error")]
    Internal,
}

impl AppError {
    /// Stable machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::InvalidTransition(_) => "invalid_transition",
            AppError::PreconditionFailed(_) => "precondition_failed",
            AppError::Exhausted(_) => "exhausted",
            AppError::BadRequest(_) => "bad_request",
            AppError::ClueGeneration(_) => "clue_generation_failed",
            AppError::Internal => "internal",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidTransition(_) => StatusCode::CONFLICT,
            AppError::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            AppError::Exhausted(_) => StatusCode::GONE,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::ClueGeneration(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.kind(),
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AppError::NotFound("x".into()), "not_found", StatusCode::NOT_FOUND)]
    #[case(AppError::InvalidTransition("x".into()), "invalid_transition", StatusCode::CONFLICT)]
    #[case(AppError::PreconditionFailed("x".into()), "precondition_failed", StatusCode::PRECONDITION_FAILED)]
    #[case(AppError::Exhausted("x".into()), "exhausted", StatusCode::GONE)]
    #[case(AppError::ClueGeneration("x".into()), "clue_generation_failed", StatusCode::BAD_GATEWAY)]
    fn test_error_kind_and_status(
        #[case] error: AppError,
        #[case] kind: &str,
        #[case] status: StatusCode,
    ) {
        assert_eq!(error.kind(), kind);
        assert_eq!(error.into_response().status(), status);
    }
}
