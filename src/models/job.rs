use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::services::renderer::CancelHandle;

/// Identificativo della chat di destinazione Telegram.
///
/// L'API accetta sia stringhe che numeri, la forma originale viene
/// preservata nella risposta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum ChatId {
    Number(i64),
    Text(String),
}

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatId::Number(n) => write!(f, "{}", n),
            ChatId::Text(s) => write!(f, "{}", s),
        }
    }
}

impl ChatId {
    pub fn is_empty(&self) -> bool {
        matches!(self, ChatId::Text(s) if s.trim().is_empty())
    }
}

/// Singola domanda del quiz
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer_index: u32,
}

/// Contenuto del quiz da renderizzare
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QuizData {
    pub questions: Vec<Question>,
}

/// Payload immutabile di un job: parametri di rendering e destinazione.
/// Non viene mai modificato dopo la creazione.
#[derive(Debug, Clone, PartialEq)]
pub struct JobData {
    pub quiz_data: QuizData,
    pub chat_id: ChatId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum JobStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::InProgress => write!(f, "in-progress"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Classificazione dell'errore di un tentativo di rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RenderErrorKind {
    Engine,
    OutputMissing,
    Cancelled,
}

/// Errore registrato su un job fallito
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RenderError {
    pub kind: RenderErrorKind,
    pub message: String,
}

impl RenderError {
    pub fn new(kind: RenderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Stato di un job di rendering.
///
/// Un record avanza solo in avanti: `Queued -> InProgress -> {Completed,
/// Failed}`. Ogni transizione sostituisce il record per intero, mai campi
/// singoli. L'handle di cancellazione esiste solo negli stati non terminali.
#[derive(Debug, Clone)]
pub enum JobState {
    Queued {
        data: JobData,
        cancel: CancelHandle,
    },
    InProgress {
        data: JobData,
        progress: f64,
        cancel: CancelHandle,
    },
    Completed {
        data: JobData,
        video: Bytes,
        telegram_sent: Option<bool>,
        telegram_error: Option<String>,
    },
    Failed {
        data: JobData,
        error: RenderError,
    },
}

impl JobState {
    pub fn status(&self) -> JobStatus {
        match self {
            JobState::Queued { .. } => JobStatus::Queued,
            JobState::InProgress { .. } => JobStatus::InProgress,
            JobState::Completed { .. } => JobStatus::Completed,
            JobState::Failed { .. } => JobStatus::Failed,
        }
    }

    pub fn data(&self) -> &JobData {
        match self {
            JobState::Queued { data, .. }
            | JobState::InProgress { data, .. }
            | JobState::Completed { data, .. }
            | JobState::Failed { data, .. } => data,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed { .. } | JobState::Failed { .. })
    }

    /// Crea un ProgressUpdate dallo stato corrente
    pub fn to_progress_update(&self, job_id: Uuid) -> ProgressUpdate {
        match self {
            JobState::Queued { .. } => ProgressUpdate::new(job_id, JobStatus::Queued, 0.0, None),
            JobState::InProgress { progress, .. } => {
                ProgressUpdate::new(job_id, JobStatus::InProgress, *progress, None)
            }
            JobState::Completed { .. } => ProgressUpdate::new(
                job_id,
                JobStatus::Completed,
                1.0,
                Some("Rendering completato!".to_string()),
            ),
            JobState::Failed { error, .. } => ProgressUpdate::new(
                job_id,
                JobStatus::Failed,
                0.0,
                Some(format!("Errore: {}", error.message)),
            ),
        }
    }
}

/// Aggiornamento progress per SSE streaming
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProgressUpdate {
    #[schema(value_type = String)]
    pub job_id: Uuid,
    pub status: JobStatus,
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[schema(value_type = String)]
    pub timestamp: DateTime<Utc>,
}

impl ProgressUpdate {
    pub fn new(job_id: Uuid, status: JobStatus, progress: f64, message: Option<String>) -> Self {
        Self {
            job_id,
            status,
            progress,
            message,
            timestamp: Utc::now(),
        }
    }
}
