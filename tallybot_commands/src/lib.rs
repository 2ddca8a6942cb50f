use tallybot_data::structs::{Command, Context, Error};

pub mod counting;
pub mod meta;

pub mod utils;

pub fn commands() -> Vec<Command> {
    meta::commands()
        .into_iter()
        .chain(counting::commands())
        .collect()
}
