use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Richiesta non valida: {0}")]
    BadRequest(String),

    #[error("Job non trovato: {0}")]
    JobNotFound(String),

    #[error("Job non annullabile: {0}")]
    NotCancellable(String),

    #[error("Job non completato")]
    JobNotCompleted,

    #[error("Errore interno: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::JobNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::NotCancellable(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::JobNotCompleted => (StatusCode::ACCEPTED, self.to_string()),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
