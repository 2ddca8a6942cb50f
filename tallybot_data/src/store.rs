use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::{Map, Value};
use serenity::all::GuildId;
use thiserror::Error;

use crate::migrate;
use crate::models::{GlobalRules, GuildCountingConfig};

const GLOBAL_KEY: &str = "global";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write counting store: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize counting store: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Whole-document persistence of counting state.
///
/// Loading never fails: a missing or unreadable document is the same as a fresh install.
#[async_trait]
pub trait CountingStore: Send + Sync {
    async fn load(&self, guild_id: GuildId) -> GuildCountingConfig;

    async fn save(&self, guild_id: GuildId, config: &GuildCountingConfig)
        -> Result<(), StoreError>;

    async fn load_global(&self) -> GlobalRules;

    async fn save_global(&self, rules: &GlobalRules) -> Result<(), StoreError>;
}

enum Document {
    Read(Map<String, Value>),
    Missing,
    Unreadable,
}

impl Document {
    fn into_map(self) -> Map<String, Value> {
        match self {
            Document::Read(document) => document,
            Document::Missing | Document::Unreadable => Map::new(),
        }
    }
}

/// Every guild in one JSON file, keyed by guild id, with the shared rules under `global`.
pub struct JsonStore {
    path: PathBuf,
    // whole-file read-modify-write has to be exclusive, guilds share the file.
    file_lock: tokio::sync::Mutex<()>,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonStore {
            path: path.into(),
            file_lock: tokio::sync::Mutex::new(()),
        }
    }

    async fn read_document(&self) -> Document {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Document::Missing,
            Err(err) => {
                tracing::warn!(
                    "Failed to read {}, treating it as empty: {err}",
                    self.path.display()
                );
                return Document::Unreadable;
            }
        };

        match serde_json::from_str::<Value>(&contents) {
            Ok(Value::Object(document)) => Document::Read(document),
            Ok(_) => {
                tracing::warn!(
                    "{} is not a JSON object, treating it as empty",
                    self.path.display()
                );
                Document::Unreadable
            }
            Err(err) => {
                tracing::warn!(
                    "Failed to parse {}, treating it as empty: {err}",
                    self.path.display()
                );
                Document::Unreadable
            }
        }
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut path = self.path.clone().into_os_string();
        path.push(suffix);
        PathBuf::from(path)
    }

    /// Keeps a copy of a document that is about to be replaced without having been read.
    async fn back_up(&self) {
        let backup = self.sibling(".bak");
        match tokio::fs::copy(&self.path, &backup).await {
            Ok(_) => tracing::warn!(
                "Overwriting unreadable {}, the old contents are in {}",
                self.path.display(),
                backup.display()
            ),
            Err(err) => tracing::warn!(
                "Overwriting unreadable {} without a backup: {err}",
                self.path.display()
            ),
        }
    }

    /// Writes next to the target and renames over it, so a crash mid-write leaves the old
    /// document intact.
    async fn write_document(&self, document: Map<String, Value>) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(&Value::Object(document))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.sibling(".tmp");

        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn update(&self, key: String, value: Value) -> Result<(), StoreError> {
        let _guard = self.file_lock.lock().await;

        let mut document = match self.read_document().await {
            Document::Read(document) => document,
            Document::Missing => Map::new(),
            Document::Unreadable => {
                self.back_up().await;
                Map::new()
            }
        };
        document.insert(key, value);
        self.write_document(document).await
    }
}

#[async_trait]
impl CountingStore for JsonStore {
    async fn load(&self, guild_id: GuildId) -> GuildCountingConfig {
        let mut document = {
            let _guard = self.file_lock.lock().await;
            self.read_document().await.into_map()
        };

        migrate::guild_config(document.remove(&guild_id.to_string()))
    }

    async fn save(
        &self,
        guild_id: GuildId,
        config: &GuildCountingConfig,
    ) -> Result<(), StoreError> {
        self.update(guild_id.to_string(), serde_json::to_value(config)?)
            .await
    }

    async fn load_global(&self) -> GlobalRules {
        let mut document = {
            let _guard = self.file_lock.lock().await;
            self.read_document().await.into_map()
        };

        match document.remove(GLOBAL_KEY) {
            Some(value) => serde_json::from_value(value).unwrap_or_else(|err| {
                tracing::warn!("Unreadable global counting rules, using defaults: {err}");
                GlobalRules::default()
            }),
            None => GlobalRules::default(),
        }
    }

    async fn save_global(&self, rules: &GlobalRules) -> Result<(), StoreError> {
        self.update(GLOBAL_KEY.to_owned(), serde_json::to_value(rules)?)
            .await
    }
}

/// Keeps everything in memory, for tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    guilds: parking_lot::Mutex<HashMap<GuildId, GuildCountingConfig>>,
    global: parking_lot::Mutex<GlobalRules>,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following save fail, to exercise the paths that swallow store errors.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    fn check_fail(&self) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("saves disabled")));
        }
        Ok(())
    }
}

#[async_trait]
impl CountingStore for MemoryStore {
    async fn load(&self, guild_id: GuildId) -> GuildCountingConfig {
        self.guilds
            .lock()
            .get(&guild_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn save(
        &self,
        guild_id: GuildId,
        config: &GuildCountingConfig,
    ) -> Result<(), StoreError> {
        self.check_fail()?;
        self.guilds.lock().insert(guild_id, config.clone());
        Ok(())
    }

    async fn load_global(&self) -> GlobalRules {
        *self.global.lock()
    }

    async fn save_global(&self, rules: &GlobalRules) -> Result<(), StoreError> {
        self.check_fail()?;
        *self.global.lock() = *rules;
        Ok(())
    }
}
