//! Invio best-effort del video completato via Telegram Bot API
//!
//! L'esito dell'invio viene registrato sul record Completed e non influenza
//! mai la classificazione del job: un rendering riuscito resta "completed"
//! anche se Telegram rifiuta il video.

use bytes::Bytes;
use serde::Deserialize;
use uuid::Uuid;

use crate::models::ChatId;

/// Esito di un tentativo di consegna
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub sent: bool,
    pub error: Option<String>,
}

impl DeliveryOutcome {
    fn sent() -> Self {
        Self {
            sent: true,
            error: None,
        }
    }

    fn not_sent(error: impl Into<String>) -> Self {
        Self {
            sent: false,
            error: Some(error.into()),
        }
    }
}

/// Busta di risposta dell'API Telegram
#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    description: Option<String>,
}

pub struct TelegramNotifier {
    client: reqwest::Client,
    bot_token: Option<String>,
    api_base: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: Option<String>, api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            bot_token,
            api_base: api_base.into(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.bot_token.is_some()
    }

    /// Carica il video sulla chat di destinazione.
    ///
    /// Non solleva mai errori: ogni fallimento di trasporto o dell'API
    /// remota viene catturato nell'esito.
    pub async fn deliver(&self, video: &Bytes, chat_id: &ChatId, job_id: &Uuid) -> DeliveryOutcome {
        let Some(token) = &self.bot_token else {
            return DeliveryOutcome::not_sent(
                "bot Telegram non configurato: invio disabilitato",
            );
        };

        if chat_id.is_empty() {
            return DeliveryOutcome::not_sent("chat id di destinazione mancante");
        }

        let part = match reqwest::multipart::Part::bytes(video.to_vec())
            .file_name(format!("{}.mp4", job_id))
            .mime_str("video/mp4")
        {
            Ok(part) => part,
            Err(e) => return DeliveryOutcome::not_sent(e.to_string()),
        };

        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .part("video", part)
            .text("caption", format!("Il tuo video quiz ({}) è pronto!", job_id));

        let url = format!("{}/bot{}/sendVideo", self.api_base, token);

        match self.client.post(&url).multipart(form).send().await {
            Ok(response) => {
                let status = response.status();
                match response.json::<TelegramResponse>().await {
                    Ok(envelope) if status.is_success() && envelope.ok => {
                        tracing::info!("Video del job {} inviato alla chat {}", job_id, chat_id);
                        DeliveryOutcome::sent()
                    }
                    Ok(envelope) => {
                        let error = envelope
                            .description
                            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
                        tracing::warn!("Invio Telegram fallito per il job {}: {}", job_id, error);
                        DeliveryOutcome::not_sent(error)
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Risposta Telegram non valida per il job {}: {}",
                            job_id,
                            e
                        );
                        DeliveryOutcome::not_sent(format!("risposta non valida: {}", e))
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Errore invio Telegram per il job {}: {}", job_id, e);
                DeliveryOutcome::not_sent(e.to_string())
            }
        }
    }
}
