mod error;

use poise::serenity_prelude as serenity;
use std::{env::var, time::Duration};
use tracing_subscriber::EnvFilter;

use tallybot_config::TallyConfig;
use tallybot_data::structs::Data;

const DEFAULT_FILTER: &str =
    "tallybot=info,tallybot_data=info,tallybot_events=info,poise=warn,serenity=warn";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        )
        .with_target(true)
        .init();

    let config = TallyConfig::load_config();
    let prefix = config.prefix.clone();
    let owners = config.owners.clone();

    let options = poise::FrameworkOptions {
        commands: tallybot_commands::commands(),
        prefix_options: poise::PrefixFrameworkOptions {
            prefix: Some(prefix),
            edit_tracker: Some(poise::EditTracker::for_timespan(Duration::from_secs(600)).into()),
            ..Default::default()
        },

        on_error: |error| Box::pin(error::handler(error)),

        pre_command: |ctx| {
            Box::pin(async move {
                tracing::info!("Executing command {}...", ctx.command().qualified_name);
            })
        },

        post_command: |ctx| {
            Box::pin(async move {
                tracing::info!("Executed command {}!", ctx.command().qualified_name);
            })
        },

        owners,
        skip_checks_for_owners: false,
        event_handler: |ctx, event, framework, data| {
            Box::pin(tallybot_events::event_handler(ctx, event, framework, data))
        },
        ..Default::default()
    };

    let framework = poise::Framework::builder()
        .setup(move |_ctx, _ready, _framework| Box::pin(async move { Ok(Data::new(config)) }))
        .options(options)
        .build();

    let token = var("DISCORD_TOKEN").expect("DISCORD_TOKEN is not set. aborting...");
    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT;

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await
        .expect("Failed to create the client");

    if let Err(why) = client.start_autosharded().await {
        tracing::error!("Client error: {why:?}");
    }
}
