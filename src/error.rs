use tallybot_data::structs::{Data, Error};

pub async fn handler(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Setup { error, .. } => {
            tracing::error!("Failed to start bot: {error:?}");
        }
        poise::FrameworkError::Command { error, ctx, .. } => {
            tracing::error!("Error in command `{}`: {error:?}", ctx.command().name);
            let _ = ctx
                .say("Something went wrong while running that command, try again later.")
                .await;
        }
        poise::FrameworkError::EventHandler { error, event, .. } => {
            tracing::error!(
                "Error in event handler for {}: {error}",
                event.snake_case_name()
            );
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                tracing::error!("Error while handling error: {e}");
            }
        }
    }
}
