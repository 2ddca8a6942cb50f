use std::fmt::Write;

use chrono::Utc;
use poise::serenity_prelude::{self as serenity, ChannelId, GuildChannel, GuildId, Mentionable};

use tallybot_counting::{ChannelCountingState, CountEvent};
use tallybot_data::counting::AdminError;
use tallybot_data::models::{GlobalRule, GlobalRules};

use crate::utils::{existing_channels, parse_channel_id, relative_time};
use crate::{Context, Error};

/// Manage the counting game.
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    category = "Counting",
    required_permissions = "MANAGE_CHANNELS",
    subcommands(
        "add",
        "remove",
        "enable",
        "disable",
        "reset_record",
        "reset_count",
        "start_number",
        "status",
        "list",
        "math",
        "reactions",
        "rule",
        "rules"
    ),
    subcommand_required
)]
pub async fn counting(_: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Errors the admin should just be told about; store failures go to the error handler.
fn admin_reply<T>(
    result: Result<T, AdminError>,
    on_ok: impl FnOnce(T) -> String,
) -> Result<String, Error> {
    match result {
        Ok(value) => Ok(on_ok(value)),
        Err(err @ (AdminError::ChannelNotFound(_) | AdminError::AlreadyExists(_))) => {
            Ok(err.to_string())
        }
        Err(AdminError::Rule(err)) => Ok(err.to_string()),
        Err(AdminError::Store(err)) => Err(err.into()),
    }
}

fn guild_id(ctx: Context<'_>) -> Result<GuildId, Error> {
    ctx.guild_id()
        .ok_or_else(|| "This command can only be used in a server.".into())
}

/// Start counting in a channel.
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn add(
    ctx: Context<'_>,
    #[description = "Channel to count in"]
    #[channel_types("Text")]
    channel: GuildChannel,
) -> Result<(), Error> {
    let result = ctx.data().counting.add_channel(guild_id(ctx)?, channel.id).await;

    let msg = admin_reply(result, |state| {
        format!(
            "{} is now a counting channel! The first number is **{}**.",
            channel.mention(),
            state.current_number
        )
    })?;

    ctx.say(msg).await?;
    Ok(())
}

/// Stop counting in a channel. Takes an id so channels that no longer exist can be removed.
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn remove(
    ctx: Context<'_>,
    #[description = "Channel mention or id"] channel: String,
) -> Result<(), Error> {
    let Some(channel_id) = parse_channel_id(&channel) else {
        ctx.say("That isn't a channel mention or id.").await?;
        return Ok(());
    };

    let result = ctx
        .data()
        .counting
        .remove_channel(guild_id(ctx)?, channel_id)
        .await;

    let msg = admin_reply(result, |state| {
        format!(
            "{} is no longer a counting channel. It made it to a record of **{}**.",
            channel_id.mention(),
            state.record
        )
    })?;

    ctx.say(msg).await?;
    Ok(())
}

/// Resume counting in a channel.
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn enable(ctx: Context<'_>, channel: GuildChannel) -> Result<(), Error> {
    set_enabled(ctx, channel.id, true).await
}

/// Pause counting in a channel without losing its progress.
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn disable(ctx: Context<'_>, channel: GuildChannel) -> Result<(), Error> {
    set_enabled(ctx, channel.id, false).await
}

async fn set_enabled(ctx: Context<'_>, channel_id: ChannelId, enabled: bool) -> Result<(), Error> {
    let result = ctx
        .data()
        .counting
        .set_enabled(guild_id(ctx)?, channel_id, enabled)
        .await;

    let msg = admin_reply(result, |()| {
        let state = if enabled { "enabled" } else { "disabled" };
        format!("Counting in {} is now {state}.", channel_id.mention())
    })?;

    ctx.say(msg).await?;
    Ok(())
}

/// Forget a channel's record.
#[poise::command(slash_command, prefix_command, guild_only, rename = "reset-record")]
pub async fn reset_record(ctx: Context<'_>, channel: GuildChannel) -> Result<(), Error> {
    let result = ctx
        .data()
        .counting
        .reset_record(guild_id(ctx)?, channel.id)
        .await;

    let msg = admin_reply(result, |()| {
        format!("The record of {} has been cleared.", channel.mention())
    })?;

    ctx.say(msg).await?;
    Ok(())
}

/// Break the current chain and start over.
#[poise::command(slash_command, prefix_command, guild_only, rename = "reset-count")]
pub async fn reset_count(ctx: Context<'_>, channel: GuildChannel) -> Result<(), Error> {
    let result = ctx
        .data()
        .counting
        .reset_count(guild_id(ctx)?, channel.id, Utc::now())
        .await;

    let msg = admin_reply(result, |event| {
        let mut msg = format!("The count in {} has been reset.", channel.mention());
        if let CountEvent::Reset { next, record, .. } = event {
            if let Some(record) = record {
                write!(msg, " The chain set a new record of **{record}**!").unwrap();
            }
            write!(msg, " The next number is **{next}**.").unwrap();
        }
        msg
    })?;

    ctx.say(msg).await?;
    Ok(())
}

/// Set the number a channel starts from after a reset. Leave empty to use the default.
#[poise::command(slash_command, prefix_command, guild_only, rename = "start-number")]
pub async fn start_number(
    ctx: Context<'_>,
    channel: GuildChannel,
    #[description = "First number of every chain"] number: Option<u64>,
) -> Result<(), Error> {
    let result = ctx
        .data()
        .counting
        .set_start_number(guild_id(ctx)?, channel.id, number)
        .await;

    let default_start = ctx.data().counting.default_start();
    let msg = admin_reply(result, |()| {
        format!(
            "Chains in {} now start at **{}**.",
            channel.mention(),
            number.unwrap_or(default_start)
        )
    })?;

    ctx.say(msg).await?;
    Ok(())
}

/// Show the progress of a counting channel.
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn status(ctx: Context<'_>, channel: GuildChannel) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let existing = existing_channels(ctx, guild_id).await?;
    let (config, _) = ctx
        .data()
        .counting
        .prune_channels(guild_id, |id| existing.contains(&id))
        .await;

    let Some(state) = config.channel(channel.id) else {
        ctx.say(AdminError::ChannelNotFound(channel.id).to_string())
            .await?;
        return Ok(());
    };

    ctx.send(poise::CreateReply::default().embed(status_embed(state, &channel.name)))
        .await?;
    Ok(())
}

fn status_embed(state: &ChannelCountingState, name: &str) -> serenity::CreateEmbed {
    let holder = state
        .record_user_id
        .map_or_else(|| String::from("nobody"), |user| user.mention().to_string());

    let last_reset = state.last_reset_reason.as_deref().map_or_else(
        || String::from("never"),
        |reason| format!("{reason} ({})", relative_time(state.last_reset_date)),
    );

    serenity::CreateEmbed::new()
        .title(format!("#{name}"))
        .field("Next number", state.current_number.to_string(), true)
        .field(
            "Enabled",
            if state.enabled { "yes" } else { "no" },
            true,
        )
        .field("Total counts", state.total_counts.to_string(), true)
        .field(
            "Record",
            format!(
                "**{}** by {holder} ({})",
                state.record,
                relative_time(state.record_date)
            ),
            false,
        )
        .field("Last count", relative_time(state.last_timestamp), true)
        .field("Last reset", last_reset, true)
}

/// List the counting channels of this server.
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn list(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let existing = existing_channels(ctx, guild_id).await?;
    let (config, removed) = ctx
        .data()
        .counting
        .prune_channels(guild_id, |id| existing.contains(&id))
        .await;

    if config.channels.is_empty() {
        ctx.say("There are no counting channels here. Add one with `/counting add`.")
            .await?;
        return Ok(());
    }

    let mut description = String::new();
    for channel in &config.channels {
        writeln!(
            description,
            "{}: next **{}**, record **{}**{}",
            channel.channel_id.mention(),
            channel.current_number,
            channel.record,
            if channel.enabled { "" } else { " (disabled)" }
        )
        .unwrap();
    }

    let mut embed = serenity::CreateEmbed::new()
        .title("Counting channels")
        .description(description)
        .field("Math", on_off(config.math_enabled), true)
        .field("Reactions", on_off(config.reactions_enabled), true);

    if !removed.is_empty() {
        embed = embed.footer(serenity::CreateEmbedFooter::new(format!(
            "Removed {} deleted channel(s).",
            removed.len()
        )));
    }

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

/// Allow arithmetic like `5+5` as counts in this server.
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn math(ctx: Context<'_>, enabled: bool) -> Result<(), Error> {
    let result = ctx
        .data()
        .counting
        .set_math_enabled(guild_id(ctx)?, enabled)
        .await;

    let msg = admin_reply(result, |()| format!("Math is now {}.", on_off(enabled)))?;
    ctx.say(msg).await?;
    Ok(())
}

/// React to every count in this server.
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn reactions(ctx: Context<'_>, enabled: bool) -> Result<(), Error> {
    let result = ctx
        .data()
        .counting
        .set_reactions_enabled(guild_id(ctx)?, enabled)
        .await;

    let msg = admin_reply(result, |()| {
        format!("Reactions are now {}.", on_off(enabled))
    })?;
    ctx.say(msg).await?;
    Ok(())
}

#[derive(Clone, Copy, Debug, poise::ChoiceParameter)]
pub enum RuleName {
    #[name = "autoReset"]
    AutoReset,
    #[name = "allowCalculations"]
    AllowCalculations,
    #[name = "maxNumber"]
    MaxNumber,
    #[name = "resetOnError"]
    ResetOnError,
}

impl RuleName {
    fn key(self) -> &'static str {
        match self {
            RuleName::AutoReset => GlobalRule::NAMES[0],
            RuleName::AllowCalculations => GlobalRule::NAMES[1],
            RuleName::MaxNumber => GlobalRule::NAMES[2],
            RuleName::ResetOnError => GlobalRule::NAMES[3],
        }
    }
}

/// Change a rule shared by every server (bot owners only).
#[poise::command(
    slash_command,
    prefix_command,
    check = "crate::utils::owner",
    category = "Owner - Counting"
)]
pub async fn rule(
    ctx: Context<'_>,
    #[description = "Rule to change"] name: RuleName,
    #[description = "true/false, or a number for maxNumber (0 = no cap)"] value: String,
) -> Result<(), Error> {
    let result = match GlobalRule::parse(name.key(), &value) {
        Ok(rule) => ctx.data().counting.set_global_rule(rule).await,
        Err(err) => Err(err.into()),
    };

    let msg = admin_reply(result, |rules| {
        format!("Updated `{}`.\n{}", name.key(), rules_text(&rules))
    })?;
    ctx.say(msg).await?;
    Ok(())
}

/// Show the rules shared by every server.
#[poise::command(slash_command, prefix_command)]
pub async fn rules(ctx: Context<'_>) -> Result<(), Error> {
    let rules = ctx.data().counting.global_rules().await;
    ctx.say(rules_text(&rules)).await?;
    Ok(())
}

fn rules_text(rules: &GlobalRules) -> String {
    let max = if rules.max_number == 0 {
        String::from("none")
    } else {
        rules.max_number.to_string()
    };

    format!(
        "autoReset: **{}**\nallowCalculations: **{}**\nmaxNumber: **{max}**\nresetOnError: **{}**",
        rules.auto_reset, rules.allow_calculations, rules.reset_on_error
    )
}

#[must_use]
pub fn commands() -> [crate::Command; 1] {
    [counting()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tallybot_data::store::StoreError;

    #[test]
    fn admin_errors_become_replies() {
        let channel = ChannelId::new(5);

        let msg = admin_reply::<()>(Err(AdminError::ChannelNotFound(channel)), |()| {
            unreachable!()
        })
        .unwrap();
        assert_eq!(msg, "<#5> is not a counting channel");

        let msg = admin_reply::<()>(Err(AdminError::AlreadyExists(channel)), |()| {
            unreachable!()
        })
        .unwrap();
        assert_eq!(msg, "<#5> is already a counting channel");

        let store = StoreError::Io(std::io::Error::other("disk full"));
        assert!(admin_reply::<()>(Err(AdminError::Store(store)), |()| String::new()).is_err());

        assert_eq!(
            admin_reply(Ok(3), |n| format!("got {n}")).unwrap(),
            "got 3"
        );
    }

    #[test]
    fn rule_names_match_the_store() {
        for name in [
            RuleName::AutoReset,
            RuleName::AllowCalculations,
            RuleName::MaxNumber,
            RuleName::ResetOnError,
        ] {
            assert!(GlobalRule::parse(name.key(), "1").is_ok());
        }
    }

    #[test]
    fn rules_are_listed() {
        let text = rules_text(&GlobalRules::default());
        assert!(text.contains("maxNumber: **none**"));
        assert!(text.contains("resetOnError: **true**"));
    }
}
