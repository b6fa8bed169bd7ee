use serde::Deserialize;
use utoipa::ToSchema;

use super::{ChatId, QuizData};

/// Richiesta di creazione di un job di rendering
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateRenderRequest {
    pub quiz_data: QuizData,
    pub chat_id: ChatId,
}
