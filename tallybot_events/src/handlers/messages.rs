use std::time::Duration;

use chrono::Utc;
use poise::serenity_prelude::{self as serenity, Mentionable, Message, ReactionType, UserId};

use tallybot_config::Emojis;
use tallybot_counting::{CountEvent, ResetReason};
use tallybot_data::counting::{Counted, CountingMessage};
use tallybot_data::structs::{Data, Error};

pub async fn message(ctx: &serenity::Context, msg: &Message, data: &Data) -> Result<(), Error> {
    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };

    let Some(counted) = data
        .counting
        .submit(CountingMessage {
            guild_id,
            channel_id: msg.channel_id,
            author: msg.author.id,
            message_id: msg.id,
            content: &msg.content,
            is_bot: msg.author.bot,
            at: Utc::now(),
        })
        .await
    else {
        return Ok(());
    };

    let (emojis, delete_after) = {
        let config = data.config.read();
        (
            config.emojis.clone(),
            Duration::from_secs(config.notice_delete_after),
        )
    };

    announce(ctx, msg, &counted, &emojis, delete_after).await;

    Ok(())
}

/// What the channel is told about a single engine event.
#[derive(Debug, PartialEq, Eq)]
pub struct Announcement<'a> {
    pub reaction: Option<&'a str>,
    pub notice: Option<String>,
    /// Deleted again after the configured delay.
    pub temporary: bool,
}

/// Decides the reactions and notices for a counting attempt.
///
/// A record is celebrated once per chain, on the count that passed it. When the store
/// refused the write the chain didn't really move, so only the error marker is shown.
#[must_use]
pub fn announcements<'a>(
    counted: &Counted,
    author: UserId,
    emojis: &'a Emojis,
) -> Vec<Announcement<'a>> {
    if !counted.persisted {
        return counted
            .reactions_enabled
            .then(|| Announcement {
                reaction: Some(emojis.reject.as_str()),
                notice: None,
                temporary: false,
            })
            .into_iter()
            .collect();
    }

    counted
        .transition
        .events
        .iter()
        .filter(|event| !matches!(event, CountEvent::NewRecord { first: false, .. }))
        .map(|event| Announcement {
            reaction: if counted.reactions_enabled {
                reaction_for(event, emojis)
            } else {
                None
            },
            notice: notice(event, author, emojis),
            temporary: matches!(event, CountEvent::Rejected { .. }),
        })
        .collect()
}

/// Nothing here is allowed to fail the handler.
async fn announce(
    ctx: &serenity::Context,
    msg: &Message,
    counted: &Counted,
    emojis: &Emojis,
    delete_after: Duration,
) {
    if !counted.persisted {
        tracing::warn!(
            "Counting progress in {} was not saved, skipping announcements",
            msg.channel_id
        );
    }

    for announcement in announcements(counted, msg.author.id, emojis) {
        if let Some(emoji) = announcement.reaction {
            let _ = msg
                .react(ctx, ReactionType::Unicode(emoji.to_owned()))
                .await;
        }

        let Some(text) = announcement.notice else {
            continue;
        };

        let sent = match msg.channel_id.say(&ctx.http, text).await {
            Ok(sent) => sent,
            Err(err) => {
                tracing::warn!("Could not send counting notice in {}: {err}", msg.channel_id);
                continue;
            }
        };

        // Rejections don't change anything, so their explanation doesn't need to stay.
        if announcement.temporary {
            let http = ctx.http.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delete_after).await;
                let _ = sent.delete(&*http).await;
            });
        }
    }
}

fn reaction_for<'a>(event: &CountEvent, emojis: &'a Emojis) -> Option<&'a str> {
    match event {
        CountEvent::Accepted(_) => Some(emojis.accept.as_str()),
        CountEvent::Milestone(_) => Some(emojis.milestone.as_str()),
        CountEvent::NewRecord { .. } => Some(emojis.record.as_str()),
        CountEvent::Reset {
            reason: ResetReason::MaxReached,
            ..
        } => None,
        CountEvent::Reset { .. } | CountEvent::Rejected { .. } => Some(emojis.reject.as_str()),
    }
}

#[must_use]
pub fn notice(event: &CountEvent, author: UserId, emojis: &Emojis) -> Option<String> {
    let mention = author.mention();

    let text = match *event {
        CountEvent::Accepted(_) => return None,
        CountEvent::Milestone(value) => {
            format!("{} **{value}**! Keep it going!", emojis.milestone)
        }
        CountEvent::NewRecord { value, .. } => format!(
            "{} New record! The chain just reached **{value}**.",
            emojis.record
        ),
        CountEvent::Reset {
            reason,
            expected,
            next,
            record,
        } => {
            let mut text = match reason {
                ResetReason::WrongNumber => format!(
                    "{mention} ruined it! Wrong number, the next number was **{expected}**."
                ),
                ResetReason::SameUser => {
                    format!("{mention} ruined it! You can't count twice in a row.")
                }
                ResetReason::MaxReached => String::from("The chain reached the maximum number!"),
                ResetReason::LimitReached | ResetReason::Manual => {
                    String::from("The count has been reset.")
                }
            };
            if let Some(record) = record {
                text.push_str(&format!(" New record: **{record}**!"));
            }
            text.push_str(&format!(" Start again from **{next}**."));
            text
        }
        CountEvent::Rejected { reason, expected } => match reason {
            ResetReason::WrongNumber => {
                format!("{mention} wrong number, the next number is **{expected}**.")
            }
            ResetReason::SameUser => format!("{mention} you can't count twice in a row."),
            ResetReason::LimitReached => String::from(
                "The maximum number has been reached, an admin has to reset the count.",
            ),
            ResetReason::MaxReached | ResetReason::Manual => return None,
        },
    };

    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use poise::serenity_prelude::ChannelId;
    use tallybot_counting::{ChannelCountingState, Outcome, Transition};

    const AUTHOR: UserId = UserId::new(7);

    fn counted(events: Vec<CountEvent>, persisted: bool) -> Counted {
        Counted {
            transition: Transition {
                outcome: Outcome::Accepted,
                events,
            },
            channel: ChannelCountingState::new(ChannelId::new(1), 1),
            reactions_enabled: true,
            persisted,
        }
    }

    #[test]
    fn accepted_counts_are_silent() {
        assert_eq!(notice(&CountEvent::Accepted(3), AUTHOR, &Emojis::default()), None);
    }

    #[test]
    fn reset_reasons_are_told_apart() {
        let emojis = Emojis::default();

        let wrong = notice(
            &CountEvent::Reset {
                reason: ResetReason::WrongNumber,
                expected: 42,
                next: 1,
                record: Some(41),
            },
            AUTHOR,
            &emojis,
        )
        .unwrap();
        assert!(wrong.contains("<@7>"));
        assert!(wrong.contains("Wrong number"));
        assert!(wrong.contains("**42**"));
        assert!(wrong.contains("New record: **41**"));
        assert!(wrong.ends_with("Start again from **1**."));

        let twice = notice(
            &CountEvent::Reset {
                reason: ResetReason::SameUser,
                expected: 3,
                next: 1,
                record: None,
            },
            AUTHOR,
            &emojis,
        )
        .unwrap();
        assert!(twice.contains("twice in a row"));
        assert!(!twice.contains("record"));
    }

    #[test]
    fn milestones_and_records() {
        let emojis = Emojis::default();
        assert!(notice(&CountEvent::Milestone(100), AUTHOR, &emojis)
            .unwrap()
            .contains("**100**"));
        assert!(notice(
            &CountEvent::NewRecord {
                value: 12,
                first: true
            },
            AUTHOR,
            &emojis
        )
            .unwrap()
            .contains("New record"));
    }

    #[test]
    fn reactions() {
        let emojis = Emojis::default();
        assert_eq!(reaction_for(&CountEvent::Accepted(1), &emojis), Some("✅"));
        assert_eq!(
            reaction_for(
                &CountEvent::Rejected {
                    reason: ResetReason::SameUser,
                    expected: 2
                },
                &emojis
            ),
            Some("❌")
        );
    }

    #[test]
    fn record_is_celebrated_once_per_chain() {
        let emojis = Emojis::default();

        let crossing = counted(
            vec![
                CountEvent::Accepted(3),
                CountEvent::NewRecord {
                    value: 3,
                    first: true,
                },
            ],
            true,
        );
        let plan = announcements(&crossing, AUTHOR, &emojis);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[1].reaction, Some("🏆"));
        assert!(plan[1].notice.as_deref().unwrap().contains("**3**"));

        let after = counted(
            vec![
                CountEvent::Accepted(4),
                CountEvent::NewRecord {
                    value: 4,
                    first: false,
                },
            ],
            true,
        );
        let plan = announcements(&after, AUTHOR, &emojis);
        assert_eq!(
            plan,
            vec![Announcement {
                reaction: Some("✅"),
                notice: None,
                temporary: false,
            }]
        );
    }

    #[test]
    fn unsaved_counts_only_get_the_error_marker() {
        let emojis = Emojis::default();
        let unsaved = counted(
            vec![CountEvent::Accepted(10), CountEvent::Milestone(10)],
            false,
        );

        assert_eq!(
            announcements(&unsaved, AUTHOR, &emojis),
            vec![Announcement {
                reaction: Some("❌"),
                notice: None,
                temporary: false,
            }]
        );
    }

    #[test]
    fn rejections_are_temporary_and_reactions_can_be_off() {
        let emojis = Emojis::default();
        let mut rejected = counted(
            vec![CountEvent::Rejected {
                reason: ResetReason::WrongNumber,
                expected: 5,
            }],
            true,
        );
        rejected.reactions_enabled = false;

        let plan = announcements(&rejected, AUTHOR, &emojis);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].reaction, None);
        assert!(plan[0].temporary);
        assert!(plan[0].notice.as_deref().unwrap().contains("**5**"));
    }
}
