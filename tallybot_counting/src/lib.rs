#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

pub mod evaluate;
pub mod state;

pub use evaluate::{evaluate, parse_count, EvalError};
pub use state::{
    ChannelCountingState, CountEvent, Outcome, ResetReason, Rules, Submission, Transition,
    DEFAULT_START, MILESTONES,
};
