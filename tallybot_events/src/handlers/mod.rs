pub mod messages;
pub mod misc;
