use sfu_config::Settings;
use sfu_core::{Dispatcher, RoomRegistry, WorkerPool};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    pub async fn new(settings: Settings) -> anyhow::Result<Self> {
        let worker_pool = Arc::new(WorkerPool::new(&settings.sfu).await?);
        let registry = Arc::new(RoomRegistry::new(worker_pool));
        let dispatcher = Arc::new(Dispatcher::new(registry, &settings.sfu));

        Ok(Self {
            settings,
            dispatcher,
        })
    }
}
