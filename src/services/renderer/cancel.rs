//! Segnale di cancellazione per un tentativo di rendering

use tokio::sync::watch;

/// Crea una coppia handle/segnale per annullare un rendering.
///
/// L'handle può essere clonato e invocato più volte: solo la prima
/// invocazione ha effetto, le successive sono no-op.
pub fn make_cancel_signal() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

/// Capacità di richiedere l'annullamento di un rendering
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Lato osservatore del segnale, consumato dall'engine di rendering
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// Si risolve quando l'annullamento viene richiesto. Se tutti gli handle
    /// vengono rilasciati senza annullare, resta in attesa per sempre.
    pub async fn cancelled(&mut self) {
        if *self.rx.borrow() {
            return;
        }
        while self.rx.changed().await.is_ok() {
            if *self.rx.borrow() {
                return;
            }
        }
        // Handle rilasciato senza annullamento: il rendering non verrà
        // mai interrotto da questo segnale.
        std::future::pending::<()>().await;
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }
}
