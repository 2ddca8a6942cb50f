use tallybot_data::structs::{Data, Error};
use poise::serenity_prelude::{self as serenity, FullEvent};

pub mod handlers;
use handlers::*;

pub async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        FullEvent::Message { new_message } => {
            messages::message(ctx, new_message, data).await?;
        }
        FullEvent::Ready { data_about_bot } => {
            misc::ready(ctx, data_about_bot, data).await?;
        }

        _ => {}
    }
    Ok(())
}
