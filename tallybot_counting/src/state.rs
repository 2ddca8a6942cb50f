use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serenity::all::{ChannelId, MessageId, UserId};

/// Values that get an extra announcement when they are counted.
pub const MILESTONES: [u64; 7] = [10, 25, 50, 100, 250, 500, 1000];

pub const DEFAULT_START: u64 = 1;

/// Persisted counting progress of a single channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelCountingState {
    pub channel_id: ChannelId,
    /// The next value somebody has to post.
    #[serde(default)]
    pub current_number: u64,
    #[serde(default)]
    pub last_user_id: Option<UserId>,
    #[serde(default)]
    pub last_message_id: Option<MessageId>,
    #[serde(default)]
    pub last_timestamp: Option<DateTime<Utc>>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Highest value a chain reached before it was broken.
    #[serde(default)]
    pub record: u64,
    #[serde(default)]
    pub record_user_id: Option<UserId>,
    #[serde(default)]
    pub record_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_counts: u64,
    #[serde(default)]
    pub last_reset_reason: Option<String>,
    #[serde(default)]
    pub last_reset_date: Option<DateTime<Utc>>,
    /// Overrides the guild-wide start value for this channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_number: Option<u64>,
}

fn enabled_by_default() -> bool {
    true
}

/// Rules a transition is evaluated under, resolved from the bot and global configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rules {
    pub start_number: u64,
    /// `None` means there is no cap.
    pub max_number: Option<u64>,
    pub auto_reset: bool,
    pub reset_on_error: bool,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            start_number: DEFAULT_START,
            max_number: None,
            auto_reset: false,
            reset_on_error: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Submission {
    pub author: UserId,
    pub message_id: Option<MessageId>,
    pub value: u64,
    pub at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResetReason {
    WrongNumber,
    SameUser,
    MaxReached,
    LimitReached,
    Manual,
}

impl ResetReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ResetReason::WrongNumber => "wrong number",
            ResetReason::SameUser => "same user twice",
            ResetReason::MaxReached => "max number reached",
            ResetReason::LimitReached => "limit reached",
            ResetReason::Manual => "manual reset",
        }
    }
}

impl fmt::Display for ResetReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Accepted,
    /// The chain was broken and the channel starts over.
    Reset(ResetReason),
    /// The submission did not count but the chain was left alone.
    Rejected(ResetReason),
}

/// Something the platform layer may want to tell the channel about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountEvent {
    Accepted(u64),
    Milestone(u64),
    /// The running chain is past the stored record. Reported for every such count,
    /// `first` marks the one that went past it.
    NewRecord { value: u64, first: bool },
    Reset {
        reason: ResetReason,
        expected: u64,
        next: u64,
        /// Set when the broken chain was promoted to the record.
        record: Option<u64>,
    },
    Rejected {
        reason: ResetReason,
        expected: u64,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub outcome: Outcome,
    pub events: Vec<CountEvent>,
}

impl ChannelCountingState {
    #[must_use]
    pub fn new(channel_id: ChannelId, start: u64) -> Self {
        Self {
            channel_id,
            current_number: start,
            last_user_id: None,
            last_message_id: None,
            last_timestamp: None,
            enabled: true,
            record: 0,
            record_user_id: None,
            record_date: None,
            total_counts: 0,
            last_reset_reason: None,
            last_reset_date: None,
            start_number: None,
        }
    }

    #[must_use]
    pub fn start(&self, rules: &Rules) -> u64 {
        self.start_number.unwrap_or(rules.start_number)
    }

    /// Highest value reached by the running chain, 0 if nothing has been counted since
    /// the last reset. Independent of later changes to the start value.
    #[must_use]
    pub fn chain_peak(&self, start: u64) -> u64 {
        if self.last_user_id.is_some() || self.current_number > start {
            self.current_number.saturating_sub(1)
        } else {
            0
        }
    }

    /// Runs a counting attempt against this channel, mutating it in place.
    pub fn apply(&mut self, rules: &Rules, submission: &Submission) -> Transition {
        let start = self.start(rules);
        let expected = self.current_number;

        if rules.max_number.is_some_and(|max| expected > max) {
            return Transition {
                outcome: Outcome::Rejected(ResetReason::LimitReached),
                events: vec![CountEvent::Rejected {
                    reason: ResetReason::LimitReached,
                    expected,
                }],
            };
        }

        let violation = if submission.value != expected {
            Some(ResetReason::WrongNumber)
        } else if self.last_user_id == Some(submission.author) {
            Some(ResetReason::SameUser)
        } else {
            None
        };

        match violation {
            Some(reason) if rules.reset_on_error => {
                let event = self.reset(start, reason, submission.at);
                Transition {
                    outcome: Outcome::Reset(reason),
                    events: vec![event],
                }
            }
            Some(reason) => Transition {
                outcome: Outcome::Rejected(reason),
                events: vec![CountEvent::Rejected { reason, expected }],
            },
            None => self.accept(rules, start, submission),
        }
    }

    fn accept(&mut self, rules: &Rules, start: u64, submission: &Submission) -> Transition {
        let value = submission.value;
        let peak_before = self.chain_peak(start);

        self.current_number = value.saturating_add(1);
        self.last_user_id = Some(submission.author);
        self.last_message_id = submission.message_id;
        self.last_timestamp = Some(submission.at);
        self.total_counts += 1;

        let mut events = vec![CountEvent::Accepted(value)];

        if MILESTONES.contains(&value) {
            events.push(CountEvent::Milestone(value));
        }

        if value > self.record {
            events.push(CountEvent::NewRecord {
                value,
                first: peak_before <= self.record,
            });
        }

        if rules.auto_reset && rules.max_number.is_some_and(|max| value >= max) {
            events.push(self.reset(start, ResetReason::MaxReached, submission.at));
        }

        Transition {
            outcome: Outcome::Accepted,
            events,
        }
    }

    /// Breaks the running chain, promoting its peak to the record when it beats it.
    pub fn reset(&mut self, start: u64, reason: ResetReason, at: DateTime<Utc>) -> CountEvent {
        let expected = self.current_number;
        let peak = self.chain_peak(start);

        let record = if peak > self.record {
            self.record = peak;
            self.record_user_id = self.last_user_id;
            self.record_date = Some(at);
            Some(peak)
        } else {
            None
        };

        self.current_number = start;
        self.last_user_id = None;
        self.last_reset_reason = Some(reason.to_string());
        self.last_reset_date = Some(at);

        CountEvent::Reset {
            reason,
            expected,
            next: start,
            record,
        }
    }

    pub fn reset_record(&mut self) {
        self.record = 0;
        self.record_user_id = None;
        self.record_date = None;
    }
}
