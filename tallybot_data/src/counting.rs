use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serenity::all::{ChannelId, GuildId, MessageId, UserId};
use thiserror::Error;
use tokio::sync::Mutex;

use tallybot_counting::{
    parse_count, ChannelCountingState, CountEvent, Outcome, ResetReason, Submission, Transition,
};

use crate::models::{GlobalRule, GlobalRules, GuildCountingConfig, RuleError};
use crate::store::{CountingStore, StoreError};

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("<#{0}> is not a counting channel")]
    ChannelNotFound(ChannelId),
    #[error("<#{0}> is already a counting channel")]
    AlreadyExists(ChannelId),
    #[error(transparent)]
    Rule(#[from] RuleError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// An inbound message, stripped down to what counting cares about.
#[derive(Clone, Copy, Debug)]
pub struct CountingMessage<'a> {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub author: UserId,
    pub message_id: MessageId,
    pub content: &'a str,
    pub is_bot: bool,
    pub at: DateTime<Utc>,
}

/// Result of a message that was a counting attempt.
#[derive(Clone, Debug)]
pub struct Counted {
    pub transition: Transition,
    pub channel: ChannelCountingState,
    pub reactions_enabled: bool,
    /// `false` when the store refused the write; the transition still happened in memory.
    pub persisted: bool,
}

/// Counting engine bound to a store.
///
/// Every load-modify-save cycle on a guild runs under that guild's lock, so two messages
/// racing in the same guild can't overwrite each other's progress.
pub struct Counting {
    store: Arc<dyn CountingStore>,
    guild_locks: DashMap<GuildId, Arc<Mutex<()>>>,
    global_lock: Mutex<()>,
    default_start: u64,
}

impl Counting {
    pub fn new(store: Arc<dyn CountingStore>, default_start: u64) -> Self {
        Counting {
            store,
            guild_locks: DashMap::new(),
            global_lock: Mutex::new(()),
            default_start,
        }
    }

    #[must_use]
    pub fn default_start(&self) -> u64 {
        self.default_start
    }

    fn guild_lock(&self, guild_id: GuildId) -> Arc<Mutex<()>> {
        self.guild_locks.entry(guild_id).or_default().clone()
    }

    /// Runs a message through the counting rules of its channel.
    ///
    /// Returns `None` when the message isn't a counting attempt: bots, channels that
    /// aren't (or no longer are) counting, and content that doesn't evaluate to a number.
    pub async fn submit(&self, message: CountingMessage<'_>) -> Option<Counted> {
        if message.is_bot {
            return None;
        }

        let lock = self.guild_lock(message.guild_id);
        let _guard = lock.lock().await;

        let mut config = self.store.load(message.guild_id).await;
        if !config
            .channel(message.channel_id)
            .is_some_and(|channel| channel.enabled)
        {
            return None;
        }

        let global = self.store.load_global().await;
        let allow_math = config.math_enabled && global.allow_calculations;

        let value = match parse_count(message.content, allow_math) {
            Ok(value) => value,
            Err(err) => {
                tracing::trace!(channel = %message.channel_id, "not a counting attempt: {err}");
                return None;
            }
        };

        let rules = global.rules(self.default_start);
        let channel = config.channel_mut(message.channel_id)?;
        let transition = channel.apply(
            &rules,
            &Submission {
                author: message.author,
                message_id: Some(message.message_id),
                value,
                at: message.at,
            },
        );
        let channel = channel.clone();

        tracing::debug!(
            guild = %message.guild_id,
            channel = %message.channel_id,
            user = %message.author,
            value,
            outcome = ?transition.outcome,
            "counting transition"
        );

        let persisted = if matches!(transition.outcome, Outcome::Rejected(_)) {
            true
        } else {
            match self.store.save(message.guild_id, &config).await {
                Ok(()) => true,
                Err(err) => {
                    tracing::error!(
                        guild = %message.guild_id,
                        "Failed to save counting progress: {err}"
                    );
                    false
                }
            }
        };

        Some(Counted {
            transition,
            channel,
            reactions_enabled: config.reactions_enabled,
            persisted,
        })
    }

    pub async fn guild_config(&self, guild_id: GuildId) -> GuildCountingConfig {
        self.store.load(guild_id).await
    }

    pub async fn global_rules(&self) -> GlobalRules {
        self.store.load_global().await
    }

    pub async fn channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<ChannelCountingState, AdminError> {
        self.store
            .load(guild_id)
            .await
            .channel(channel_id)
            .cloned()
            .ok_or(AdminError::ChannelNotFound(channel_id))
    }

    pub async fn add_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<ChannelCountingState, AdminError> {
        let lock = self.guild_lock(guild_id);
        let _guard = lock.lock().await;

        let mut config = self.store.load(guild_id).await;
        if config.channel(channel_id).is_some() {
            return Err(AdminError::AlreadyExists(channel_id));
        }

        let state = ChannelCountingState::new(channel_id, self.default_start);
        config.channels.push(state.clone());
        self.store.save(guild_id, &config).await?;

        tracing::info!(guild = %guild_id, channel = %channel_id, "Added counting channel");
        Ok(state)
    }

    pub async fn remove_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<ChannelCountingState, AdminError> {
        let lock = self.guild_lock(guild_id);
        let _guard = lock.lock().await;

        let mut config = self.store.load(guild_id).await;
        let Some(index) = config
            .channels
            .iter()
            .position(|c| c.channel_id == channel_id)
        else {
            return Err(AdminError::ChannelNotFound(channel_id));
        };

        let removed = config.channels.remove(index);
        self.store.save(guild_id, &config).await?;

        tracing::info!(guild = %guild_id, channel = %channel_id, "Removed counting channel");
        Ok(removed)
    }

    pub async fn set_enabled(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        enabled: bool,
    ) -> Result<(), AdminError> {
        self.modify_channel(guild_id, channel_id, |channel| {
            channel.enabled = enabled;
        })
        .await
    }

    pub async fn reset_record(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<(), AdminError> {
        self.modify_channel(guild_id, channel_id, ChannelCountingState::reset_record)
            .await
    }

    /// Breaks the running chain by hand. The record is promoted like on any other reset.
    pub async fn reset_count(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        at: DateTime<Utc>,
    ) -> Result<CountEvent, AdminError> {
        let default_start = self.default_start;
        self.modify_channel(guild_id, channel_id, |channel| {
            let start = channel.start_number.unwrap_or(default_start);
            channel.reset(start, ResetReason::Manual, at)
        })
        .await
    }

    /// Sets (or with `None`, clears) the channel's own start value. A chain nobody has
    /// counted in yet is moved to the new start right away.
    pub async fn set_start_number(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        start: Option<u64>,
    ) -> Result<(), AdminError> {
        let default_start = self.default_start;
        self.modify_channel(guild_id, channel_id, |channel| {
            channel.start_number = start;
            if channel.last_user_id.is_none() {
                channel.current_number = start.unwrap_or(default_start);
            }
        })
        .await
    }

    pub async fn set_math_enabled(
        &self,
        guild_id: GuildId,
        enabled: bool,
    ) -> Result<(), AdminError> {
        self.modify_guild(guild_id, |config| config.math_enabled = enabled)
            .await
    }

    pub async fn set_reactions_enabled(
        &self,
        guild_id: GuildId,
        enabled: bool,
    ) -> Result<(), AdminError> {
        self.modify_guild(guild_id, |config| config.reactions_enabled = enabled)
            .await
    }

    /// Changes a rule shared by every guild in the store.
    pub async fn set_global_rule(&self, rule: GlobalRule) -> Result<GlobalRules, AdminError> {
        let _guard = self.global_lock.lock().await;

        let mut global = self.store.load_global().await;
        global.set(rule);
        self.store.save_global(&global).await?;

        tracing::info!(rule = rule.name(), "Updated global counting rule: {rule:?}");
        Ok(global)
    }

    /// Drops every channel `exists` doesn't recognise any more and persists the result
    /// if anything changed. Returns the cleaned config and the ids that were removed.
    pub async fn prune_channels(
        &self,
        guild_id: GuildId,
        exists: impl Fn(ChannelId) -> bool,
    ) -> (GuildCountingConfig, Vec<ChannelId>) {
        let lock = self.guild_lock(guild_id);
        let _guard = lock.lock().await;

        let mut config = self.store.load(guild_id).await;
        let mut removed = Vec::new();
        config.channels.retain(|channel| {
            let keep = exists(channel.channel_id);
            if !keep {
                removed.push(channel.channel_id);
            }
            keep
        });

        if !removed.is_empty() {
            tracing::info!(guild = %guild_id, ?removed, "Removed deleted counting channels");
            if let Err(err) = self.store.save(guild_id, &config).await {
                tracing::error!(guild = %guild_id, "Failed to save pruned channels: {err}");
            }
        }

        (config, removed)
    }

    async fn modify_guild(
        &self,
        guild_id: GuildId,
        f: impl FnOnce(&mut GuildCountingConfig),
    ) -> Result<(), AdminError> {
        let lock = self.guild_lock(guild_id);
        let _guard = lock.lock().await;

        let mut config = self.store.load(guild_id).await;
        f(&mut config);
        self.store.save(guild_id, &config).await?;
        Ok(())
    }

    async fn modify_channel<T>(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        f: impl FnOnce(&mut ChannelCountingState) -> T,
    ) -> Result<T, AdminError> {
        let lock = self.guild_lock(guild_id);
        let _guard = lock.lock().await;

        let mut config = self.store.load(guild_id).await;
        let channel = config
            .channel_mut(channel_id)
            .ok_or(AdminError::ChannelNotFound(channel_id))?;
        let result = f(channel);
        self.store.save(guild_id, &config).await?;
        Ok(result)
    }
}
