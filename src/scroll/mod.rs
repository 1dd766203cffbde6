pub mod engine;
pub mod state;

pub use engine::{ScrollEngine, ScrollSnapshot};
pub use state::{
    accumulate, axis_speed, drag_velocity, ScrollSession, ScrollState, TickOutput,
    DEFAULT_READING_SPEED, MAX_READING_SPEED,
};
