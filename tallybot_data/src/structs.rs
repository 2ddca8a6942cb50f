use parking_lot::RwLock;

use std::sync::{atomic::AtomicBool, Arc};

use tallybot_config::TallyConfig;

use crate::counting::Counting;
use crate::store::{CountingStore, JsonStore};

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
pub type Command = poise::Command<Data, Error>;

pub struct Data {
    pub has_started: AtomicBool,
    pub time_started: std::time::Instant,
    pub config: RwLock<TallyConfig>,
    pub counting: Counting,
}

impl Data {
    #[must_use]
    pub fn new(config: TallyConfig) -> Self {
        let store = Arc::new(JsonStore::new(config.store_path.clone()));
        Self::with_store(config, store)
    }

    /// Same as [`Data::new`] with a store chosen by the caller.
    #[must_use]
    pub fn with_store(config: TallyConfig, store: Arc<dyn CountingStore>) -> Self {
        let counting = Counting::new(store, config.default_start_number);

        Data {
            has_started: AtomicBool::new(false),
            time_started: std::time::Instant::now(),
            config: RwLock::new(config),
            counting,
        }
    }
}
