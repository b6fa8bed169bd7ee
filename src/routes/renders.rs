//! Endpoints per i job di rendering
//!
//! Strato di trasporto sottile sopra la coda: validazione dell'input,
//! proiezione degli stati in JSON e streaming SSE del progress.

use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    http::header,
    response::sse::{Event, KeepAlive, Sse},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{
    ChatId, CreateRenderRequest, JobCreatedResponse, JobData, JobState, JobStatus,
    JobStatusResponse, JobSummary, JobsListResponse, MessageResponse, ProgressUpdate, QuizData,
};
use crate::services::queue::{ProgressSender, RenderQueue};

/// Shared state per le route dei render
#[derive(Clone)]
pub struct RendersState {
    pub queue: RenderQueue,
    pub progress_tx: ProgressSender,
}

pub fn router(queue: RenderQueue, progress_tx: ProgressSender) -> Router {
    let state = RendersState { queue, progress_tx };

    Router::new()
        .route("/renders", post(create_render))
        .route("/renders", get(list_renders))
        .route("/renders/:job_id", get(get_render_status))
        .route("/renders/:job_id", delete(cancel_render))
        .route("/renders/:job_id/download", get(download_render))
        .route("/renders/:job_id/progress", get(render_progress_stream))
        .with_state(state)
}

fn parse_job_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).map_err(|_| AppError::JobNotFound(id.to_string()))
}

/// Crea un nuovo job di rendering
#[utoipa::path(
    post,
    path = "/renders",
    tag = "Renders",
    request_body = CreateRenderRequest,
    responses(
        (status = 200, description = "Job accodato", body = JobCreatedResponse),
        (status = 400, description = "quizData non valido o chatId mancante"),
    )
)]
pub async fn create_render(
    State(state): State<RendersState>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<JobCreatedResponse>> {
    let quiz_value = body
        .get("quizData")
        .cloned()
        .ok_or_else(|| AppError::BadRequest("quizData è obbligatorio".to_string()))?;
    if !quiz_value
        .get("questions")
        .map(serde_json::Value::is_array)
        .unwrap_or(false)
    {
        return Err(AppError::BadRequest(
            "quizData non valido: è richiesto un array di domande".to_string(),
        ));
    }
    let quiz_data: QuizData = serde_json::from_value(quiz_value)
        .map_err(|e| AppError::BadRequest(format!("quizData non valido: {}", e)))?;

    let chat_value = body
        .get("chatId")
        .cloned()
        .ok_or_else(|| AppError::BadRequest("chatId è obbligatorio".to_string()))?;
    let chat_id: ChatId = serde_json::from_value(chat_value)
        .map_err(|e| AppError::BadRequest(format!("chatId non valido: {}", e)))?;
    if chat_id.is_empty() {
        return Err(AppError::BadRequest("chatId è obbligatorio".to_string()));
    }

    let job_id = state.queue.create_job(JobData { quiz_data, chat_id }).await;

    Ok(Json(JobCreatedResponse {
        job_id: job_id.to_string(),
    }))
}

/// Ottiene lo stato di un job
#[utoipa::path(
    get,
    path = "/renders/{job_id}",
    tag = "Renders",
    params(
        ("job_id" = String, Path, description = "ID del job")
    ),
    responses(
        (status = 200, description = "Stato del job", body = JobStatusResponse),
        (status = 404, description = "Job non trovato"),
    )
)]
pub async fn get_render_status(
    State(state): State<RendersState>,
    Path(id): Path<String>,
) -> Result<Json<JobStatusResponse>> {
    let job_id = parse_job_id(&id)?;

    let job = state
        .queue
        .get_job(&job_id)
        .await
        .ok_or_else(|| AppError::JobNotFound(id))?;

    Ok(Json(JobStatusResponse::from_state(&job)))
}

/// Lista tutti i job con il loro stato
#[utoipa::path(
    get,
    path = "/renders",
    tag = "Renders",
    responses(
        (status = 200, description = "Lista job", body = JobsListResponse),
    )
)]
pub async fn list_renders(State(state): State<RendersState>) -> Json<JobsListResponse> {
    let jobs = state
        .queue
        .list_jobs()
        .await
        .into_iter()
        .map(|(id, job)| JobSummary::from_state(id, &job))
        .collect();

    Json(JobsListResponse { jobs })
}

/// Annulla un job in coda o in lavorazione
#[utoipa::path(
    delete,
    path = "/renders/{job_id}",
    tag = "Renders",
    params(
        ("job_id" = String, Path, description = "ID del job")
    ),
    responses(
        (status = 200, description = "Job annullato", body = MessageResponse),
        (status = 400, description = "Il job non può essere annullato"),
        (status = 404, description = "Job non trovato"),
    )
)]
pub async fn cancel_render(
    State(state): State<RendersState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let job_id = parse_job_id(&id)?;

    state.queue.cancel_job(&job_id).await?;

    Ok(Json(MessageResponse {
        message: "Job annullato".to_string(),
    }))
}

/// Scarica il video di un job completato
#[utoipa::path(
    get,
    path = "/renders/{job_id}/download",
    tag = "Renders",
    params(
        ("job_id" = String, Path, description = "ID del job")
    ),
    responses(
        (status = 200, description = "Video renderizzato"),
        (status = 202, description = "Job non ancora completato"),
        (status = 404, description = "Job non trovato"),
    )
)]
pub async fn download_render(
    State(state): State<RendersState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let job_id = parse_job_id(&id)?;

    let job = state
        .queue
        .get_job(&job_id)
        .await
        .ok_or_else(|| AppError::JobNotFound(id))?;

    match job {
        JobState::Completed { video, .. } => Ok((
            [
                (header::CONTENT_TYPE, "video/mp4".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}.mp4\"", job_id),
                ),
            ],
            video,
        )),
        _ => Err(AppError::JobNotCompleted),
    }
}

/// Stream SSE con gli aggiornamenti di progress di un job
#[utoipa::path(
    get,
    path = "/renders/{job_id}/progress",
    tag = "Renders",
    params(
        ("job_id" = String, Path, description = "ID del job")
    ),
    responses(
        (status = 200, description = "Stream SSE con aggiornamenti progress", body = ProgressUpdate),
        (status = 404, description = "Job non trovato"),
    )
)]
pub async fn render_progress_stream(
    State(state): State<RendersState>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let job_id = parse_job_id(&id)?;

    let initial = state
        .queue
        .get_job(&job_id)
        .await
        .ok_or_else(|| AppError::JobNotFound(id))?
        .to_progress_update(job_id);

    let mut rx = BroadcastStream::new(state.progress_tx.subscribe());

    let stream = async_stream::stream! {
        let terminal = matches!(initial.status, JobStatus::Completed | JobStatus::Failed);
        yield Ok::<_, Infallible>(
            Event::default().data(serde_json::to_string(&initial).unwrap_or_default()),
        );

        if !terminal {
            while let Some(item) = rx.next().await {
                // Receiver in ritardo sul broadcast: si prosegue
                let Ok(update) = item else { continue };
                if update.job_id != job_id {
                    continue;
                }
                let terminal =
                    matches!(update.status, JobStatus::Completed | JobStatus::Failed);
                yield Ok(Event::default().data(
                    serde_json::to_string(&update).unwrap_or_default(),
                ));
                if terminal {
                    break;
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
