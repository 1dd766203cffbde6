//! Outbound visual-feedback signals for the anchor overlay.

use bitflags::bitflags;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::models::Point;

const CHANNEL_CAPACITY: usize = 64;

bitflags! {
    /// Arrows to show around the anchor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Direction: u8 {
        const UP = 1 << 0;
        const DOWN = 1 << 1;
        const LEFT = 1 << 2;
        const RIGHT = 1 << 3;
    }
}

impl Direction {
    /// Axes whose displacement is past the deadzone.
    pub fn from_offset(anchor: Point, pointer: Point, deadzone: u32) -> Self {
        let deadzone = i64::from(deadzone);
        let dx = i64::from(pointer.x) - i64::from(anchor.x);
        let dy = i64::from(pointer.y) - i64::from(anchor.y);

        let mut direction = Direction::empty();
        direction.set(Direction::UP, dy < -deadzone);
        direction.set(Direction::DOWN, dy > deadzone);
        direction.set(Direction::LEFT, dx < -deadzone);
        direction.set(Direction::RIGHT, dx > deadzone);
        direction
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedbackEvent {
    SessionStart { anchor: Point },
    /// `distance` is the Euclidean pointer distance from the anchor; the
    /// overlay maps it to opacity.
    PositionUpdate { direction: Direction, distance: f64 },
    ReadingModeChanged(bool),
    SessionEnd,
}

/// Non-blocking sender; when the consumer falls behind, events are dropped.
#[derive(Debug, Clone)]
pub struct FeedbackSender {
    tx: mpsc::Sender<FeedbackEvent>,
}

impl FeedbackSender {
    pub fn send(&self, event: FeedbackEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => log::trace!("Feedback queue full; dropped {:?}", event),
            Err(TrySendError::Closed(_)) => {}
        }
    }
}

pub fn channel() -> (FeedbackSender, mpsc::Receiver<FeedbackEvent>) {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    (FeedbackSender { tx }, rx)
}

/// Drains feedback into the log. Stands in for the overlay when none is attached.
pub async fn log_feedback(mut rx: mpsc::Receiver<FeedbackEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            FeedbackEvent::PositionUpdate { .. } => log::trace!("feedback: {:?}", event),
            _ => log::debug!("feedback: {:?}", event),
        }
    }
}
