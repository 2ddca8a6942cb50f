//! Normalises older shapes of the counting document before it is deserialised.
//!
//! Earlier versions of the bot stored a single channel directly on the guild and used a
//! handful of different field names. Everything is rewritten to the current layout here so
//! the rest of the crate only ever sees [`GuildCountingConfig`].

use serde_json::{Map, Value};
use tallybot_counting::ChannelCountingState;

use crate::models::GuildCountingConfig;

/// (canonical, legacy aliases)
const CHANNEL_FIELDS: &[(&str, &[&str])] = &[
    ("channelId", &["channel", "channelID", "channel_id"]),
    ("currentNumber", &["current", "count", "current_number", "number"]),
    ("lastUserId", &["lastUser", "lastUserID", "last_user_id", "lastCounter"]),
    ("lastMessageId", &["lastMessage", "last_message_id"]),
    ("lastTimestamp", &["lastTime", "last_timestamp"]),
    ("record", &["highScore", "highscore", "best"]),
    ("recordUserId", &["recordUser", "highScoreUser", "record_user_id"]),
    ("recordDate", &["highScoreDate", "record_date"]),
    ("totalCounts", &["total", "totalCount", "total_counts"]),
];

/// Channel settings that never had another name but still belong to the channel.
const CHANNEL_ONLY_FIELDS: &[&str] = &[
    "enabled",
    "startNumber",
    "lastResetReason",
    "lastResetDate",
];

const GUILD_FIELDS: &[(&str, &[&str])] = &[
    ("mathEnabled", &["math", "allowMath", "math_enabled"]),
    ("reactionsEnabled", &["reactions", "reactions_enabled"]),
];

/// Turns whatever is stored for a guild into a [`GuildCountingConfig`].
///
/// Anything that still can't be read falls back to defaults; channels that are broken
/// beyond repair are dropped individually instead of taking the whole guild with them.
#[must_use]
pub fn guild_config(value: Option<Value>) -> GuildCountingConfig {
    let Some(Value::Object(mut guild)) = value else {
        return GuildCountingConfig::default();
    };

    rename_fields(&mut guild, GUILD_FIELDS);

    // Single channel stored directly on the guild.
    if !guild.contains_key("channels") && has_any(&guild, CHANNEL_FIELDS[0]) {
        let mut channel = Map::new();
        for (canonical, aliases) in CHANNEL_FIELDS {
            for key in std::iter::once(canonical).chain(aliases.iter()) {
                if let Some(v) = guild.remove(*key) {
                    channel.insert((*key).to_owned(), v);
                }
            }
        }
        for key in CHANNEL_ONLY_FIELDS {
            if let Some(v) = guild.remove(*key) {
                channel.insert((*key).to_owned(), v);
            }
        }
        guild.insert(String::from("channels"), Value::Array(vec![Value::Object(channel)]));
    }

    let channels = match guild.remove("channels") {
        Some(Value::Array(channels)) => channels
            .into_iter()
            .filter_map(|channel| match channel_state(channel) {
                Some(state) => Some(state),
                None => {
                    tracing::warn!("Dropping unreadable counting channel entry");
                    None
                }
            })
            .collect(),
        _ => Vec::new(),
    };

    let mut config = match serde_json::from_value::<GuildCountingConfig>(Value::Object(guild)) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Unreadable guild counting settings, using defaults: {err}");
            GuildCountingConfig::default()
        }
    };
    config.channels = channels;
    config
}

fn channel_state(value: Value) -> Option<ChannelCountingState> {
    let Value::Object(mut channel) = value else {
        return None;
    };

    rename_fields(&mut channel, CHANNEL_FIELDS);

    if let Ok(state) = serde_json::from_value(Value::Object(channel.clone())) {
        return Some(state);
    }

    // Old timestamps were not always ISO-8601; they are bookkeeping only.
    for key in BOOKKEEPING_FIELDS {
        channel.remove(*key);
    }
    serde_json::from_value(Value::Object(channel)).ok()
}

const BOOKKEEPING_FIELDS: &[&str] = &[
    "lastMessageId",
    "lastTimestamp",
    "recordDate",
    "lastResetDate",
    "lastResetReason",
];

fn has_any(map: &Map<String, Value>, (canonical, aliases): (&str, &[&str])) -> bool {
    map.contains_key(canonical) || aliases.iter().any(|alias| map.contains_key(*alias))
}

/// Moves legacy keys to their canonical name and deletes them. A canonical key that is
/// already present always wins.
fn rename_fields(map: &mut Map<String, Value>, fields: &[(&str, &[&str])]) {
    for (canonical, aliases) in fields {
        for alias in *aliases {
            let Some(value) = map.remove(*alias) else {
                continue;
            };
            if !map.contains_key(*canonical) {
                map.insert((*canonical).to_owned(), value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serenity::all::{ChannelId, UserId};

    #[test]
    fn missing_or_wrong_type_is_default() {
        assert_eq!(guild_config(None), GuildCountingConfig::default());
        assert_eq!(
            guild_config(Some(json!("hello"))),
            GuildCountingConfig::default()
        );
        assert_eq!(
            guild_config(Some(json!({}))),
            GuildCountingConfig::default()
        );
    }

    #[test]
    fn canonical_document_passes_through() {
        let config = guild_config(Some(json!({
            "channels": [{
                "channelId": "10",
                "currentNumber": 7,
                "lastUserId": "3",
                "enabled": false,
                "record": 12,
                "totalCounts": 40
            }],
            "mathEnabled": false,
            "reactionsEnabled": true
        })));

        assert!(!config.math_enabled);
        let channel = &config.channels[0];
        assert_eq!(channel.channel_id, ChannelId::new(10));
        assert_eq!(channel.current_number, 7);
        assert_eq!(channel.last_user_id, Some(UserId::new(3)));
        assert!(!channel.enabled);
        assert_eq!(channel.record, 12);
        assert_eq!(channel.total_counts, 40);
    }

    #[test]
    fn legacy_field_names_are_renamed() {
        let config = guild_config(Some(json!({
            "channels": [{
                "channelId": "10",
                "current": 15,
                "lastUser": "4",
                "highScore": 30
            }],
            "math": false
        })));

        assert!(!config.math_enabled);
        let channel = &config.channels[0];
        assert_eq!(channel.current_number, 15);
        assert_eq!(channel.last_user_id, Some(UserId::new(4)));
        assert_eq!(channel.record, 30);
    }

    #[test]
    fn canonical_field_wins_over_legacy() {
        let config = guild_config(Some(json!({
            "channels": [{"channelId": "10", "current": 1, "currentNumber": 9}]
        })));
        assert_eq!(config.channels[0].current_number, 9);
    }

    #[test]
    fn single_channel_layout_is_wrapped() {
        let config = guild_config(Some(json!({
            "channel": "55",
            "current": 3,
            "lastUser": "8",
            "reactionsEnabled": false
        })));

        assert!(!config.reactions_enabled);
        assert_eq!(config.channels.len(), 1);
        assert_eq!(config.channels[0].channel_id, ChannelId::new(55));
        assert_eq!(config.channels[0].current_number, 3);
        assert_eq!(config.channels[0].last_user_id, Some(UserId::new(8)));
    }

    #[test]
    fn single_channel_layout_keeps_its_settings() {
        let config = guild_config(Some(json!({
            "channel": "55",
            "current": 7,
            "enabled": false,
            "startNumber": 5,
            "lastResetReason": "wrong number",
            "lastResetDate": "2024-01-02T03:04:05Z"
        })));

        let channel = &config.channels[0];
        assert!(!channel.enabled);
        assert_eq!(channel.start_number, Some(5));
        assert_eq!(channel.current_number, 7);
        assert_eq!(channel.last_reset_reason.as_deref(), Some("wrong number"));
        assert!(channel.last_reset_date.is_some());
    }

    #[test]
    fn guild_id_is_not_a_channel() {
        let config = guild_config(Some(json!({
            "id": "5",
            "mathEnabled": false
        })));

        assert!(config.channels.is_empty());
        assert!(!config.math_enabled);
    }

    #[test]
    fn odd_timestamps_do_not_lose_the_channel() {
        let config = guild_config(Some(json!({
            "channels": [{"channelId": "10", "currentNumber": 6, "lastTimestamp": 1700000000000u64}]
        })));

        assert_eq!(config.channels[0].current_number, 6);
        assert_eq!(config.channels[0].last_timestamp, None);
    }

    #[test]
    fn broken_channels_are_dropped() {
        let config = guild_config(Some(json!({
            "channels": [
                {"currentNumber": 4},
                "nonsense",
                {"channelId": "11", "currentNumber": 2}
            ]
        })));

        assert_eq!(config.channels.len(), 1);
        assert_eq!(config.channels[0].channel_id, ChannelId::new(11));
    }
}
