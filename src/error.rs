// src/error.rs

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Every failure a pipeline command can produce.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Unknown stage: {0}")]
    InvalidStage(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Lead {lead_id} is closed in stage {stage}")]
    StageLocked { lead_id: String, stage: String },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        PipelineError::NotFound { entity, id: id.into() }
    }
}

impl From<mongodb::error::Error> for PipelineError {
    fn from(e: mongodb::error::Error) -> Self {
        PipelineError::Storage(e.to_string())
    }
}

impl ResponseError for PipelineError {
    fn status_code(&self) -> StatusCode {
        match self {
            PipelineError::NotFound { .. } => StatusCode::NOT_FOUND,
            PipelineError::InvalidStage(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PipelineError::Validation(_) => StatusCode::BAD_REQUEST,
            PipelineError::Forbidden(_) => StatusCode::FORBIDDEN,
            PipelineError::StageLocked { .. } => StatusCode::CONFLICT,
            PipelineError::Unauthorized => StatusCode::UNAUTHORIZED,
            PipelineError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

/// Startup configuration problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Could not read directory file {path}: {reason}")]
    Directory { path: String, reason: String },
}
