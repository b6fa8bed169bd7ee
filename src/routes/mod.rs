pub mod health;
pub mod renders;

use axum::Router;

use crate::services::queue::{ProgressSender, RenderQueue};

pub fn create_router(
    queue: RenderQueue,
    progress_tx: ProgressSender,
    renderer_available: bool,
    telegram_enabled: bool,
) -> Router {
    Router::new()
        .merge(health::router(renderer_available, telegram_enabled))
        .merge(renders::router(queue, progress_tx))
}
