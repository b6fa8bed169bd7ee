//! Engine finto per i test della coda di rendering

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Semaphore;

use super::{Composition, RenderEngine, RenderEngineError, RenderMediaOptions, RenderOutput};

/// Comportamento del mock per un singolo job, identificato dal testo della
/// prima domanda del quiz.
#[derive(Clone)]
pub(crate) enum MockBehavior {
    /// Rendering immediato con il buffer indicato
    Succeed(Vec<u8>),
    /// L'engine solleva un errore
    Fail(String),
    /// Rendering "riuscito" ma senza alcun output
    EmptyOutput,
    /// Attende un permesso sul semaforo prima di completare; onora la
    /// cancellazione durante l'attesa
    Gated { gate: Arc<Semaphore>, bytes: Vec<u8> },
    /// Invia i progress indicati, poi attende il semaforo e completa
    Progress { steps: Vec<f64>, gate: Arc<Semaphore> },
}

#[derive(Default)]
pub(crate) struct MockEngine {
    behaviors: Mutex<HashMap<String, MockBehavior>>,
    /// Marker dei job nell'ordine in cui il rendering è partito
    pub started: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, marker: &str, behavior: MockBehavior) {
        self.behaviors
            .lock()
            .unwrap()
            .insert(marker.to_string(), behavior);
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn started_order(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    fn marker_of(input_props: &serde_json::Value) -> String {
        input_props["quizData"]["questions"][0]["question"]
            .as_str()
            .unwrap_or_default()
            .to_string()
    }
}

#[async_trait]
impl RenderEngine for MockEngine {
    async fn select_composition(
        &self,
        _serve_url: &str,
        composition_id: &str,
        input_props: &serde_json::Value,
    ) -> std::result::Result<Composition, RenderEngineError> {
        Ok(Composition {
            id: composition_id.to_string(),
            input_props: input_props.clone(),
            width: Some(1080),
            height: Some(1920),
        })
    }

    async fn render_media(
        &self,
        mut options: RenderMediaOptions,
    ) -> std::result::Result<RenderOutput, RenderEngineError> {
        let marker = Self::marker_of(&options.composition.input_props);
        self.started.lock().unwrap().push(marker.clone());

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .get(&marker)
            .cloned()
            .unwrap_or_else(|| MockBehavior::Succeed(b"video".to_vec()));

        let result = match behavior {
            MockBehavior::Succeed(bytes) => Ok(RenderOutput {
                buffer: Bytes::from(bytes),
            }),
            MockBehavior::Fail(message) => Err(RenderEngineError::Engine(message)),
            MockBehavior::EmptyOutput => Ok(RenderOutput {
                buffer: Bytes::new(),
            }),
            MockBehavior::Gated { gate, bytes } => {
                tokio::select! {
                    permit = gate.acquire() => {
                        permit.expect("semaforo chiuso").forget();
                        Ok(RenderOutput { buffer: Bytes::from(bytes) })
                    }
                    _ = options.cancel_signal.cancelled() => Err(RenderEngineError::Cancelled),
                }
            }
            MockBehavior::Progress { steps, gate } => {
                for step in steps {
                    let _ = options.progress.send(step);
                }
                tokio::select! {
                    permit = gate.acquire() => {
                        permit.expect("semaforo chiuso").forget();
                        Ok(RenderOutput { buffer: Bytes::from_static(b"video") })
                    }
                    _ = options.cancel_signal.cancelled() => Err(RenderEngineError::Cancelled),
                }
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
