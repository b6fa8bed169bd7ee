//! Orchestrazione di un singolo tentativo di rendering
//!
//! `process_render` porta un job da Queued a uno stato terminale. Ogni
//! transizione scrive un record completo e viene applicata solo se il job è
//! ancora presente nel registro: un annullamento in coda lo rimuove e il
//! turno del job diventa un no-op.

use bytes::Bytes;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::worker::WorkerContext;
use crate::models::{JobData, JobState, JobStatus, ProgressUpdate, RenderError, RenderErrorKind};
use crate::services::renderer::{
    make_cancel_signal, CancelHandle, CancelSignal, RenderMediaOptions,
};

pub(crate) async fn process_render(ctx: &WorkerContext, job_id: Uuid) {
    let Some(current) = ctx.store.get(&job_id).await else {
        tracing::debug!("Job {} annullato prima dell'avvio, salto", job_id);
        return;
    };
    let data = current.data().clone();

    // Capacità di annullamento nuova per questo tentativo
    let (cancel, cancel_signal) = make_cancel_signal();

    let started = ctx
        .store
        .replace(
            &job_id,
            JobState::InProgress {
                data: data.clone(),
                progress: 0.0,
                cancel: cancel.clone(),
            },
        )
        .await;
    if !started {
        tracing::debug!("Job {} rimosso durante l'avvio, salto", job_id);
        return;
    }
    ctx.send_progress(ProgressUpdate::new(job_id, JobStatus::InProgress, 0.0, None));

    match run_render(ctx, job_id, &data, &cancel, cancel_signal).await {
        Ok(buffer) => {
            tracing::info!(
                "Job {} renderizzato con successo, buffer di {} byte",
                job_id,
                buffer.len()
            );

            let _ = ctx
                .store
                .replace(
                    &job_id,
                    JobState::Completed {
                        data: data.clone(),
                        video: buffer.clone(),
                        telegram_sent: None,
                        telegram_error: None,
                    },
                )
                .await;

            // Consegna sincrona: il job successivo parte solo a esito noto.
            // L'esito non cambia mai la classificazione del job.
            let outcome = ctx.notifier.deliver(&buffer, &data.chat_id, &job_id).await;

            let _ = ctx
                .store
                .replace(
                    &job_id,
                    JobState::Completed {
                        data: data.clone(),
                        video: buffer,
                        telegram_sent: Some(outcome.sent),
                        telegram_error: outcome.error,
                    },
                )
                .await;

            ctx.send_progress(ProgressUpdate::new(
                job_id,
                JobStatus::Completed,
                1.0,
                Some("Rendering completato!".to_string()),
            ));
        }
        Err(error) => {
            tracing::warn!("Job {} fallito: {}", job_id, error.message);

            let _ = ctx
                .store
                .replace(
                    &job_id,
                    JobState::Failed {
                        data: data.clone(),
                        error: error.clone(),
                    },
                )
                .await;

            ctx.send_progress(ProgressUpdate::new(
                job_id,
                JobStatus::Failed,
                0.0,
                Some(format!("Errore: {}", error.message)),
            ));
        }
    }
}

async fn run_render(
    ctx: &WorkerContext,
    job_id: Uuid,
    data: &JobData,
    cancel: &CancelHandle,
    cancel_signal: CancelSignal,
) -> Result<Bytes, RenderError> {
    let input_props = serde_json::json!({ "quizData": data.quiz_data });

    let composition = ctx
        .engine
        .select_composition(
            &ctx.options.serve_url,
            &ctx.options.composition_id,
            &input_props,
        )
        .await?;

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    let render = ctx.engine.render_media(RenderMediaOptions {
        cancel_signal,
        serve_url: ctx.options.serve_url.clone(),
        composition,
        codec: ctx.options.codec.clone(),
        progress: progress_tx,
    });
    tokio::pin!(render);

    // Rilancia i progress senza bloccare il rendering; un report arrivato
    // in ritardo non fa mai regredire il valore registrato.
    let mut last_progress = 0.0_f64;
    let output = loop {
        tokio::select! {
            output = &mut render => break output,
            Some(progress) = progress_rx.recv() => {
                if progress > last_progress {
                    last_progress = progress;
                    let _ = ctx
                        .store
                        .replace(
                            &job_id,
                            JobState::InProgress {
                                data: data.clone(),
                                progress,
                                cancel: cancel.clone(),
                            },
                        )
                        .await;
                    ctx.send_progress(ProgressUpdate::new(
                        job_id,
                        JobStatus::InProgress,
                        progress,
                        None,
                    ));
                }
            }
        }
    };

    let output = output?;
    if output.buffer.is_empty() {
        return Err(RenderError::new(
            RenderErrorKind::OutputMissing,
            "l'engine non ha prodotto alcun output",
        ));
    }

    Ok(output.buffer)
}
