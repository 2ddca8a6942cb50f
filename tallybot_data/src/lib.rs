#![warn(clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

pub mod counting;
pub mod migrate;
pub mod models;
pub mod store;
pub mod structs;
