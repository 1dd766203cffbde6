pub mod feedback;
pub mod hotkey;
pub mod machine;

pub use feedback::{channel, log_feedback, Direction, FeedbackEvent, FeedbackSender};
pub use hotkey::Hotkey;
pub use machine::{TriggerStateMachine, DEFAULT_DOUBLE_CLICK};

#[cfg(test)]
mod tests;
