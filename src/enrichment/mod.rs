mod enricher;
mod images;
mod queue;
mod seed;
mod task;

pub use enricher::Enricher;
pub use images::ImageLibrary;
pub use queue::{
    EnrichmentQueue, QueueSettings, QueueStatus, TaskExecutor, MAX_BATCH_SIZE, MIN_BATCH_PAUSE,
};
pub use seed::{artist_card_tasks, initial_tasks};
pub use task::EnrichmentTask;
