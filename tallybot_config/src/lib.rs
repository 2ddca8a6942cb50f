use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use serenity::all::UserId;

pub const CONFIG_PATH: &str = "config/config.json";

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct TallyConfig {
    pub prefix: String,
    pub store_path: String, // counting data for every guild lives in this one file.
    pub default_start_number: u64,
    pub notice_delete_after: u64, // seconds before rejection notices are cleaned up.
    pub emojis: Emojis,
    pub owners: HashSet<UserId>,
}

impl TallyConfig {
    pub fn new() -> Self {
        TallyConfig {
            prefix: String::from("-"),
            store_path: String::from("data/counting.json"),
            default_start_number: 1,
            notice_delete_after: 5,
            emojis: Emojis::default(),
            owners: HashSet::new(),
        }
    }

    pub fn write_to(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::error!("Unable to create {}: {e}", parent.display());
                return;
            }
        }

        let writer = std::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(true)
            .open(path);

        match writer {
            Ok(writer) => match serde_json::to_writer_pretty(writer, &self) {
                Ok(()) => tracing::info!("Successfully saved config to {}", path.display()),
                Err(e) => tracing::error!("Failed to save config: {e}"),
            },
            Err(e) => tracing::error!("Unable to write config: {e}"),
        };
    }

    pub fn load_config() -> Self {
        Self::load_from(CONFIG_PATH)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        let config_file = match std::fs::read_to_string(path) {
            Ok(config_file) => config_file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    "{} does not exist. Writing the default configuration there.",
                    path.display()
                );
                let config = TallyConfig::new();
                config.write_to(path);
                return config;
            }
            Err(err) => {
                tracing::warn!(
                    "Failed to read {}. Using default configuration. ({err})",
                    path.display()
                );
                return TallyConfig::new();
            }
        };

        match serde_json::from_str::<TallyConfig>(&config_file) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(
                    "Failed to parse {}. Using default configuration. ({err})",
                    path.display()
                );
                TallyConfig::new()
            }
        }
    }
}

impl Default for TallyConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Emojis {
    pub accept: String,
    pub reject: String,
    pub milestone: String,
    pub record: String,
}

impl Default for Emojis {
    fn default() -> Self {
        Emojis {
            accept: String::from("✅"),
            reject: String::from("❌"),
            milestone: String::from("🎉"),
            record: String::from("🏆"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_uses_defaults_and_writes_them_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("config.json");

        let config = TallyConfig::load_from(&path);
        assert_eq!(config.store_path, "data/counting.json");
        assert_eq!(config.default_start_number, 1);

        let written: TallyConfig =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written.prefix, "-");
        assert_eq!(written.notice_delete_after, 5);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"default_start_number": 0, "emojis": {"accept": "👍"}, "owners": ["42"]}"#,
        )
        .unwrap();

        let config = TallyConfig::load_from(&path);
        assert_eq!(config.default_start_number, 0);
        assert_eq!(config.emojis.accept, "👍");
        assert_eq!(config.emojis.reject, "❌");
        assert!(config.owners.contains(&UserId::new(42)));
        assert_eq!(config.prefix, "-");
    }

    #[test]
    fn garbage_uses_defaults_and_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let config = TallyConfig::load_from(&path);
        assert_eq!(config.notice_delete_after, 5);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[test]
    fn written_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = TallyConfig::new();
        config.store_path = String::from("elsewhere.json");
        config.write_to(&path);

        assert_eq!(TallyConfig::load_from(&path).store_path, "elsewhere.json");
    }
}
