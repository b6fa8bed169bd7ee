//! Render job queue
//!
//! Punto di ingresso pubblico della coda: creazione, consultazione e
//! annullamento dei job. L'esecuzione è serializzata da un worker dedicato
//! che consuma una coda FIFO, un solo rendering alla volta.

mod processor;
mod store;
mod telegram;
mod worker;

pub use store::{Cancellation, JobStore};
pub use telegram::{DeliveryOutcome, TelegramNotifier};
pub use worker::RenderOptions;

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{JobData, JobState, JobStatus, ProgressUpdate};
use crate::services::renderer::{make_cancel_signal, RenderEngine};
use worker::WorkerContext;

/// Capacità del broadcast channel per progress updates
const PROGRESS_CHANNEL_CAPACITY: usize = 100;

pub type RenderQueue = Arc<RenderQueueInner>;

/// Sender globale per progress updates
pub type ProgressSender = broadcast::Sender<ProgressUpdate>;

pub fn create_render_queue(
    engine: Arc<dyn RenderEngine>,
    notifier: Arc<TelegramNotifier>,
    options: RenderOptions,
) -> (RenderQueue, ProgressSender) {
    let (progress_tx, _) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);
    let store = JobStore::new();

    let queue_tx = worker::spawn_worker(WorkerContext {
        store: store.clone(),
        engine,
        notifier,
        progress_tx: progress_tx.clone(),
        options,
    });

    let queue = Arc::new(RenderQueueInner {
        store,
        queue_tx,
        progress_tx: progress_tx.clone(),
    });

    (queue, progress_tx)
}

pub struct RenderQueueInner {
    store: JobStore,
    queue_tx: mpsc::UnboundedSender<Uuid>,
    progress_tx: ProgressSender,
}

impl std::fmt::Debug for RenderQueueInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderQueueInner").finish()
    }
}

impl RenderQueueInner {
    /// Accetta un nuovo job e lo accoda.
    ///
    /// Ritorna subito con l'identificativo: la creazione non attende mai il
    /// rendering.
    pub async fn create_job(&self, data: JobData) -> Uuid {
        let job_id = Uuid::new_v4();
        let (cancel, _signal) = make_cancel_signal();

        self.store
            .insert(job_id, JobState::Queued { data, cancel })
            .await;
        self.send_progress(ProgressUpdate::new(job_id, JobStatus::Queued, 0.0, None));

        if self.queue_tx.send(job_id).is_err() {
            tracing::error!(
                "Worker di rendering terminato: il job {} non verrà processato",
                job_id
            );
        }

        job_id
    }

    pub async fn get_job(&self, id: &Uuid) -> Option<JobState> {
        self.store.get(id).await
    }

    /// Snapshot dei job in ordine di creazione
    pub async fn list_jobs(&self) -> Vec<(Uuid, JobState)> {
        self.store.list().await
    }

    /// Annulla un job in coda o in lavorazione.
    ///
    /// Un job in coda viene rimosso e non entrerà mai in lavorazione; un job
    /// in lavorazione viene interrotto e chiuso come fallito. Gli stati
    /// terminali producono un errore `NotCancellable`.
    pub async fn cancel_job(&self, id: &Uuid) -> Result<Cancellation> {
        self.store.cancel(id).await
    }

    /// Ottieni un receiver per i progress updates
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressUpdate> {
        self.progress_tx.subscribe()
    }

    fn send_progress(&self, update: ProgressUpdate) {
        // Ignora errore se nessun receiver
        let _ = self.progress_tx.send(update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{ChatId, Question, QuizData, RenderErrorKind};
    use crate::services::renderer::mock::{MockBehavior, MockEngine};
    use std::time::Duration;
    use tokio::sync::Semaphore;

    fn job_data(marker: &str) -> JobData {
        JobData {
            quiz_data: QuizData {
                questions: vec![Question {
                    question: marker.to_string(),
                    options: vec!["a".to_string(), "b".to_string()],
                    correct_answer_index: 0,
                }],
            },
            chat_id: ChatId::Number(99),
        }
    }

    fn disabled_notifier() -> Arc<TelegramNotifier> {
        Arc::new(TelegramNotifier::new(None, "http://127.0.0.1:1"))
    }

    fn test_options() -> RenderOptions {
        RenderOptions {
            serve_url: "remotion/index.ts".to_string(),
            composition_id: "QuizVideo".to_string(),
            codec: "h264".to_string(),
        }
    }

    fn test_queue(engine: Arc<MockEngine>) -> RenderQueue {
        let (queue, _) = create_render_queue(engine, disabled_notifier(), test_options());
        queue
    }

    async fn wait_terminal(queue: &RenderQueue, id: Uuid) -> JobState {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(state) = queue.get_job(&id).await {
                    if state.is_terminal() {
                        return state;
                    }
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("il job deve raggiungere uno stato terminale")
    }

    async fn wait_in_progress(queue: &RenderQueue, id: Uuid) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(JobState::InProgress { .. }) = queue.get_job(&id).await {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("il job deve entrare in lavorazione");
    }

    #[tokio::test]
    async fn test_jobs_run_serially_in_creation_order() {
        let engine = MockEngine::new();
        let queue = test_queue(engine.clone());

        let mut ids = Vec::new();
        for i in 0..5 {
            ids.push(queue.create_job(job_data(&format!("job-{}", i))).await);
        }
        for id in &ids {
            let state = wait_terminal(&queue, *id).await;
            assert!(matches!(state, JobState::Completed { .. }));
        }

        assert_eq!(engine.max_in_flight(), 1);
        assert_eq!(
            engine.started_order(),
            vec!["job-0", "job-1", "job-2", "job-3", "job-4"]
        );
    }

    #[tokio::test]
    async fn test_completed_job_records_delivery_outcome() {
        let engine = MockEngine::new();
        let queue = test_queue(engine.clone());

        let id = queue.create_job(job_data("solo")).await;
        let state = wait_terminal(&queue, id).await;

        // Invio disabilitato: il job resta completato con l'esito registrato
        match state {
            JobState::Completed {
                video,
                telegram_sent,
                telegram_error,
                ..
            } => {
                assert!(!video.is_empty());
                assert_eq!(telegram_sent, Some(false));
                assert!(telegram_error.unwrap().contains("disabilitato"));
            }
            other => panic!("stato inatteso: {:?}", other.status()),
        }
    }

    #[tokio::test]
    async fn test_failed_job_does_not_break_the_chain() {
        let engine = MockEngine::new();
        engine.set("job-1", MockBehavior::Fail("esplosione".to_string()));
        let queue = test_queue(engine.clone());

        let first = queue.create_job(job_data("job-0")).await;
        let second = queue.create_job(job_data("job-1")).await;
        let third = queue.create_job(job_data("job-2")).await;

        assert!(matches!(
            wait_terminal(&queue, first).await,
            JobState::Completed { .. }
        ));
        match wait_terminal(&queue, second).await {
            JobState::Failed { error, .. } => {
                assert_eq!(error.kind, RenderErrorKind::Engine);
                assert!(error.message.contains("esplosione"));
            }
            other => panic!("stato inatteso: {:?}", other.status()),
        }
        assert!(matches!(
            wait_terminal(&queue, third).await,
            JobState::Completed { .. }
        ));
    }

    #[tokio::test]
    async fn test_cancel_queued_job_never_starts() {
        let engine = MockEngine::new();
        let gate = Arc::new(Semaphore::new(0));
        engine.set(
            "job-0",
            MockBehavior::Gated {
                gate: gate.clone(),
                bytes: b"video".to_vec(),
            },
        );
        let queue = test_queue(engine.clone());

        let first = queue.create_job(job_data("job-0")).await;
        let second = queue.create_job(job_data("job-1")).await;
        wait_in_progress(&queue, first).await;

        // job-1 è ancora in coda: l'annullamento lo rimuove del tutto
        let outcome = queue.cancel_job(&second).await.unwrap();
        assert_eq!(outcome, Cancellation::RemovedWhileQueued);
        assert!(queue.get_job(&second).await.is_none());

        gate.add_permits(1);
        wait_terminal(&queue, first).await;

        // Il turno di job-1 è un no-op: il rendering non è mai partito
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(queue.get_job(&second).await.is_none());
        assert_eq!(engine.started_order(), vec!["job-0"]);
    }

    #[tokio::test]
    async fn test_cancel_in_progress_job_fails_it() {
        let engine = MockEngine::new();
        let gate = Arc::new(Semaphore::new(0));
        engine.set(
            "job-0",
            MockBehavior::Gated {
                gate,
                bytes: b"video".to_vec(),
            },
        );
        let queue = test_queue(engine.clone());

        let id = queue.create_job(job_data("job-0")).await;
        wait_in_progress(&queue, id).await;

        let outcome = queue.cancel_job(&id).await.unwrap();
        assert_eq!(outcome, Cancellation::SignalledInProgress);

        match wait_terminal(&queue, id).await {
            JobState::Failed { error, .. } => {
                assert_eq!(error.kind, RenderErrorKind::Cancelled);
            }
            other => panic!("stato inatteso: {:?}", other.status()),
        }

        // Il job è ormai terminale: un secondo annullamento viene rifiutato
        assert!(matches!(
            queue.cancel_job(&id).await,
            Err(AppError::NotCancellable(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_output_is_a_failure() {
        let engine = MockEngine::new();
        engine.set("job-0", MockBehavior::EmptyOutput);
        let queue = test_queue(engine);

        let id = queue.create_job(job_data("job-0")).await;
        match wait_terminal(&queue, id).await {
            JobState::Failed { error, .. } => {
                assert_eq!(error.kind, RenderErrorKind::OutputMissing);
            }
            other => panic!("stato inatteso: {:?}", other.status()),
        }
    }

    #[tokio::test]
    async fn test_stale_progress_never_regresses() {
        let engine = MockEngine::new();
        let gate = Arc::new(Semaphore::new(0));
        engine.set(
            "job-0",
            MockBehavior::Progress {
                steps: vec![0.3, 0.6, 0.2],
                gate: gate.clone(),
            },
        );
        let queue = test_queue(engine);

        let id = queue.create_job(job_data("job-0")).await;

        // Attendi che il report 0.6 sia stato applicato
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(JobState::InProgress { progress, .. }) = queue.get_job(&id).await {
                    if (progress - 0.6).abs() < f64::EPSILON {
                        return;
                    }
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("il progress deve raggiungere 0.6");

        // Il report 0.2, arrivato dopo, non deve far regredire il valore
        tokio::time::sleep(Duration::from_millis(50)).await;
        match queue.get_job(&id).await {
            Some(JobState::InProgress { progress, .. }) => assert_eq!(progress, 0.6),
            other => panic!("stato inatteso: {:?}", other.map(|s| s.status())),
        }

        gate.add_permits(1);
        assert!(matches!(
            wait_terminal(&queue, id).await,
            JobState::Completed { .. }
        ));
    }

    #[tokio::test]
    async fn test_list_jobs_in_creation_order() {
        let engine = MockEngine::new();
        let queue = test_queue(engine);

        let mut ids = Vec::new();
        for i in 0..3 {
            ids.push(queue.create_job(job_data(&format!("job-{}", i))).await);
        }
        for id in &ids {
            wait_terminal(&queue, *id).await;
        }

        let listed: Vec<Uuid> = queue.list_jobs().await.into_iter().map(|(id, _)| id).collect();
        assert_eq!(listed, ids);
    }

    /// Finto endpoint Telegram per i test end-to-end della consegna
    async fn spawn_telegram_api(body: serde_json::Value) -> String {
        use axum::{routing::post, Json, Router};

        let app = Router::new().route(
            "/botTEST/sendVideo",
            post(move || {
                let body = body.clone();
                async move { Json(body) }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_delivery_success_marks_sent() {
        let base = spawn_telegram_api(serde_json::json!({ "ok": true })).await;
        let notifier = Arc::new(TelegramNotifier::new(Some("TEST".to_string()), base));
        let (queue, _) = create_render_queue(MockEngine::new(), notifier, test_options());

        let id = queue.create_job(job_data("job-0")).await;
        match wait_terminal(&queue, id).await {
            JobState::Completed {
                telegram_sent,
                telegram_error,
                ..
            } => {
                assert_eq!(telegram_sent, Some(true));
                assert_eq!(telegram_error, None);
            }
            other => panic!("stato inatteso: {:?}", other.status()),
        }
    }

    #[tokio::test]
    async fn test_delivery_failure_keeps_job_completed() {
        let base =
            spawn_telegram_api(serde_json::json!({ "ok": false, "description": "flood wait" }))
                .await;
        let notifier = Arc::new(TelegramNotifier::new(Some("TEST".to_string()), base));
        let (queue, _) = create_render_queue(MockEngine::new(), notifier, test_options());

        let id = queue.create_job(job_data("job-0")).await;
        match wait_terminal(&queue, id).await {
            JobState::Completed {
                telegram_sent,
                telegram_error,
                ..
            } => {
                assert_eq!(telegram_sent, Some(false));
                assert_eq!(telegram_error.as_deref(), Some("flood wait"));
            }
            other => panic!("la consegna fallita non degrada il job: {:?}", other.status()),
        }
    }

    #[tokio::test]
    async fn test_cancel_unknown_job() {
        let queue = test_queue(MockEngine::new());
        assert!(matches!(
            queue.cancel_job(&Uuid::new_v4()).await,
            Err(AppError::JobNotFound(_))
        ));
    }
}
