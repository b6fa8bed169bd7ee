use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{JobState, JobStatus, RenderError};

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Stato dell'API
    pub status: String,
    /// Versione dell'API
    pub version: String,
    /// CLI di rendering disponibile
    pub renderer_available: bool,
    /// Invio Telegram configurato
    pub telegram_enabled: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobCreatedResponse {
    pub job_id: String,
}

/// Proiezione dello stato di un job, senza payload di input né video.
///
/// I campi assenti per lo stato corrente vengono omessi dal JSON, così due
/// letture dello stesso job terminale producono byte identici.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RenderError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram_sent: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram_error: Option<String>,
}

impl JobStatusResponse {
    pub fn from_state(state: &JobState) -> Self {
        let mut response = Self {
            status: state.status(),
            progress: None,
            error: None,
            telegram_sent: None,
            telegram_error: None,
        };

        match state {
            JobState::Queued { .. } => {}
            JobState::InProgress { progress, .. } => {
                response.progress = Some(*progress);
            }
            JobState::Completed {
                telegram_sent,
                telegram_error,
                ..
            } => {
                response.telegram_sent = *telegram_sent;
                response.telegram_error = telegram_error.clone();
            }
            JobState::Failed { error, .. } => {
                response.error = Some(error.clone());
            }
        }

        response
    }
}

/// Voce della lista job
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub id: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RenderError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram_sent: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram_error: Option<String>,
}

impl JobSummary {
    pub fn from_state(id: Uuid, state: &JobState) -> Self {
        let status = JobStatusResponse::from_state(state);
        Self {
            id: id.to_string(),
            status: status.status,
            progress: status.progress,
            error: status.error,
            telegram_sent: status.telegram_sent,
            telegram_error: status.telegram_error,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct JobsListResponse {
    pub jobs: Vec<JobSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub status: u16,
}
