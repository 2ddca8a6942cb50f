use std::collections::HashSet;

use chrono::{DateTime, Utc};
use poise::serenity_prelude::{ChannelId, GuildId};

use crate::{Context, Error};

/// Framework owners and the extra owners from the config file.
pub async fn owner(ctx: Context<'_>) -> Result<bool, Error> {
    let author = ctx.author().id;

    if ctx.framework().options.owners.contains(&author) {
        return Ok(true);
    }

    Ok(ctx.data().config.read().owners.contains(&author))
}

/// Accepts a bare id or a channel mention.
#[must_use]
pub fn parse_channel_id(input: &str) -> Option<ChannelId> {
    let input = input.trim();
    let id = input
        .strip_prefix("<#")
        .and_then(|rest| rest.strip_suffix('>'))
        .unwrap_or(input);

    id.parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .map(ChannelId::new)
}

/// Channels (threads included) that still exist in the guild, from the cache if it has
/// the guild and from the API otherwise.
pub async fn existing_channels(
    ctx: Context<'_>,
    guild_id: GuildId,
) -> Result<HashSet<ChannelId>, Error> {
    let cached = ctx.guild().map(|guild| {
        guild
            .channels
            .keys()
            .copied()
            .chain(guild.threads.iter().map(|thread| thread.id))
            .collect::<HashSet<_>>()
    });

    if let Some(cached) = cached {
        return Ok(cached);
    }

    let channels = guild_id.channels(ctx.http()).await?;
    Ok(channels.into_keys().collect())
}

#[must_use]
pub fn relative_time(time: Option<DateTime<Utc>>) -> String {
    time.map_or_else(
        || String::from("never"),
        |time| format!("<t:{}:R>", time.timestamp()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_ids_and_mentions() {
        assert_eq!(parse_channel_id("123"), Some(ChannelId::new(123)));
        assert_eq!(parse_channel_id(" <#456> "), Some(ChannelId::new(456)));
        assert_eq!(parse_channel_id("0"), None);
        assert_eq!(parse_channel_id("<#abc>"), None);
        assert_eq!(parse_channel_id("general"), None);
    }

    #[test]
    fn relative_times() {
        assert_eq!(relative_time(None), "never");
        let time = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(relative_time(Some(time)), "<t:1700000000:R>");
    }
}
