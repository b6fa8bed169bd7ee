//! Interfaccia verso l'engine di rendering esterno
//!
//! Il core della coda non conosce i dettagli del rendering: parla con un
//! [`RenderEngine`] che risolve una composizione dai parametri di input e
//! produce il video come buffer binario, riportando il progress e onorando
//! il segnale di cancellazione.

mod cancel;
#[cfg(test)]
pub(crate) mod mock;
mod remotion;

pub use cancel::{make_cancel_signal, CancelHandle, CancelSignal};
pub use remotion::RemotionCliEngine;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::models::{RenderError, RenderErrorKind};

/// Composizione risolta dall'engine a partire dai parametri del job
#[derive(Debug, Clone)]
pub struct Composition {
    pub id: String,
    pub input_props: serde_json::Value,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Parametri per un singolo tentativo di rendering
pub struct RenderMediaOptions {
    pub cancel_signal: CancelSignal,
    pub serve_url: String,
    pub composition: Composition,
    pub codec: String,
    /// Canale non bloccante per il progress in [0,1]
    pub progress: mpsc::UnboundedSender<f64>,
}

/// Risultato del rendering
#[derive(Debug)]
pub struct RenderOutput {
    pub buffer: Bytes,
}

#[derive(Error, Debug)]
pub enum RenderEngineError {
    #[error("rendering annullato")]
    Cancelled,

    #[error("composizione non trovata: {0}")]
    CompositionNotFound(String),

    #[error("errore dell'engine di rendering: {0}")]
    Engine(String),

    #[error("errore di I/O: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RenderEngineError> for RenderError {
    fn from(err: RenderEngineError) -> Self {
        let kind = match err {
            RenderEngineError::Cancelled => RenderErrorKind::Cancelled,
            _ => RenderErrorKind::Engine,
        };
        RenderError::new(kind, err.to_string())
    }
}

/// Engine di rendering esterno.
///
/// `select_composition` incorpora i parametri di input nella composizione
/// restituita; `render_media` non riceve input separati.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    async fn select_composition(
        &self,
        serve_url: &str,
        composition_id: &str,
        input_props: &serde_json::Value,
    ) -> std::result::Result<Composition, RenderEngineError>;

    async fn render_media(
        &self,
        options: RenderMediaOptions,
    ) -> std::result::Result<RenderOutput, RenderEngineError>;
}
