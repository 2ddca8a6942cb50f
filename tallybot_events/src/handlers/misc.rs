use tallybot_data::structs::{Data, Error};
use poise::serenity_prelude::{self as serenity, Ready};

use std::sync::atomic::Ordering;

pub async fn ready(ctx: &serenity::Context, ready: &Ready, data: &Data) -> Result<(), Error> {
    let shard_count = ctx.cache.shard_count();
    let is_last_shard = (ctx.shard_id.0 + 1) == shard_count;

    if is_last_shard && !data.has_started.swap(true, Ordering::SeqCst) {
        let store_path = data.config.read().store_path.clone();
        tracing::info!(
            guilds = ready.guilds.len(),
            store = %store_path,
            "Logged in as {}",
            ready.user.tag()
        );
    }

    Ok(())
}
