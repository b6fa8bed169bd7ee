//! Serializzatore di esecuzione
//!
//! Un singolo task consuma la coda FIFO dei job: al massimo un rendering in
//! volo, in rigoroso ordine di arrivo. L'esito di un job non interrompe mai
//! la catena per i successivi.

use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use super::processor;
use super::store::JobStore;
use super::telegram::TelegramNotifier;
use super::ProgressSender;
use crate::models::ProgressUpdate;
use crate::services::renderer::RenderEngine;

/// Parametri di rendering condivisi da tutti i job
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub serve_url: String,
    pub composition_id: String,
    pub codec: String,
}

pub(crate) struct WorkerContext {
    pub store: JobStore,
    pub engine: Arc<dyn RenderEngine>,
    pub notifier: Arc<TelegramNotifier>,
    pub progress_tx: ProgressSender,
    pub options: RenderOptions,
}

impl WorkerContext {
    /// Invia un progress update via broadcast; nessun receiver non è un errore
    pub fn send_progress(&self, update: ProgressUpdate) {
        let _ = self.progress_tx.send(update);
    }
}

/// Avvia il worker e restituisce il lato di invio della coda.
///
/// La coda è illimitata: qualsiasi numero di job può restare in attesa.
pub(crate) fn spawn_worker(ctx: WorkerContext) -> mpsc::UnboundedSender<Uuid> {
    let (tx, mut rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Some(job_id) = rx.recv().await {
            processor::process_render(&ctx, job_id).await;
        }
    });

    tx
}
