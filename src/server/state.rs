use std::sync::Arc;
use std::time::{Duration, Instant};

use sqlx::PgPool;

use crate::config::Settings;
use crate::dispatch::DeliveryBackend;
use crate::runs::RunManager;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub runs: Arc<RunManager>,
    pub postgres_pool: Option<PgPool>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        settings: Settings,
        backends: Vec<Arc<dyn DeliveryBackend>>,
        postgres_pool: Option<PgPool>,
    ) -> Self {
        let max_settle_delay = Duration::from_millis(settings.dispatch.max_settle_delay_ms);

        Self {
            runs: Arc::new(RunManager::new(backends, max_settle_delay)),
            settings: Arc::new(settings),
            postgres_pool,
            start_time: Instant::now(),
        }
    }
}
