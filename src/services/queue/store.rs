//! Registro in-memory dei job di rendering
//!
//! Ogni scrittura sostituisce il record per intero sotto un'unica lock, i
//! lettori non osservano mai stati parziali. Nessuna persistenza: al
//! riavvio del processo la storia dei job è persa.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{JobState, JobStatus};

struct JobEntry {
    /// Progressivo di inserimento, usato per ordinare le snapshot di `list`
    seq: u64,
    state: JobState,
}

#[derive(Default)]
struct StoreInner {
    jobs: HashMap<Uuid, JobEntry>,
    next_seq: u64,
}

/// Esito di una richiesta di annullamento andata a buon fine
#[derive(Debug, PartialEq, Eq)]
pub enum Cancellation {
    /// Il job era in coda: il record è stato rimosso e il worker lo salterà
    RemovedWhileQueued,
    /// Il job era in lavorazione: l'engine è stato segnalato
    SignalledInProgress,
}

#[derive(Clone, Default)]
pub struct JobStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, id: Uuid, state: JobState) {
        let mut inner = self.inner.write().await;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.jobs.insert(id, JobEntry { seq, state });
    }

    pub async fn get(&self, id: &Uuid) -> Option<JobState> {
        self.inner
            .read()
            .await
            .jobs
            .get(id)
            .map(|entry| entry.state.clone())
    }

    /// Sostituisce il record solo se il job esiste ancora.
    ///
    /// Un job in coda può essere rimosso da un annullamento concorrente: in
    /// quel caso la transizione non viene scritta e il chiamante riceve
    /// `false`.
    pub async fn replace(&self, id: &Uuid, state: JobState) -> bool {
        let mut inner = self.inner.write().await;
        match inner.jobs.get_mut(id) {
            Some(entry) => {
                entry.state = state;
                true
            }
            None => false,
        }
    }

    pub async fn remove(&self, id: &Uuid) -> Option<JobState> {
        self.inner
            .write()
            .await
            .jobs
            .remove(id)
            .map(|entry| entry.state)
    }

    /// Snapshot di tutti i job in ordine di inserimento
    pub async fn list(&self) -> Vec<(Uuid, JobState)> {
        let inner = self.inner.read().await;
        let mut entries: Vec<_> = inner
            .jobs
            .iter()
            .map(|(id, entry)| (entry.seq, *id, entry.state.clone()))
            .collect();
        entries.sort_by_key(|(seq, _, _)| *seq);
        entries.into_iter().map(|(_, id, state)| (id, state)).collect()
    }

    /// Annulla un job in modo atomico rispetto alle altre scritture.
    ///
    /// Un job in coda viene rimosso dal registro; un job in lavorazione
    /// riceve il segnale di annullamento e verrà chiuso come fallito dal
    /// worker. Gli stati terminali non sono annullabili.
    pub async fn cancel(&self, id: &Uuid) -> Result<Cancellation, AppError> {
        let mut inner = self.inner.write().await;
        let Some(entry) = inner.jobs.get(id) else {
            return Err(AppError::JobNotFound(id.to_string()));
        };

        let status = entry.state.status();
        let handle = match &entry.state {
            JobState::Queued { cancel, .. } | JobState::InProgress { cancel, .. } => {
                Some(cancel.clone())
            }
            _ => None,
        };

        match (status, handle) {
            (JobStatus::Queued, Some(cancel)) => {
                cancel.cancel();
                inner.jobs.remove(id);
                Ok(Cancellation::RemovedWhileQueued)
            }
            (JobStatus::InProgress, Some(cancel)) => {
                cancel.cancel();
                Ok(Cancellation::SignalledInProgress)
            }
            _ => Err(AppError::NotCancellable(format!(
                "il job con stato '{}' non può essere annullato",
                status
            ))),
        }
    }
}
