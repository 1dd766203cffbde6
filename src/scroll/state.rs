use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tokio::time::Instant;
use uuid::Uuid;

use crate::{models::Point, sync_scroll::MirrorTarget};

/// Upper bound for drag speed, in wheel units per second.
pub const MAX_DRAG_SPEED: f64 = 5000.0;
/// A release faster than this on either axis throws into inertia.
pub const INERTIA_THRESHOLD: f64 = 100.0;
/// Inertia ends once both axes decay below this speed.
pub const INERTIA_STOP_SPEED: f64 = 10.0;
/// No pointer motion for this long before release means no throw.
pub const STATIONARY_BEFORE_RELEASE: Duration = Duration::from_millis(100);
pub const DEFAULT_READING_SPEED: f64 = 30.0;
pub const MAX_READING_SPEED: f64 = 1000.0;
/// Wheel messages carry a signed 16-bit delta.
pub const MAX_WHEEL_STEP: i32 = i16::MAX as i32;
/// Below this an axis counts as stopped and its remainder is discarded.
const SPEED_EPSILON: f64 = 0.1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum ScrollState {
    #[default]
    Idle,
    Dragging,
    InertialScrolling,
    ReadingMode,
}

/// Speed for one axis: zero inside the deadzone, then linear in the excess
/// displacement, capped at `MAX_DRAG_SPEED`. Sign follows `displacement`.
pub fn axis_speed(displacement: i32, deadzone: u32, sensitivity: f64) -> f64 {
    let distance = displacement.unsigned_abs();
    if distance < deadzone {
        return 0.0;
    }

    let raw = f64::from(distance - deadzone) * sensitivity.max(0.0);
    raw.min(MAX_DRAG_SPEED).copysign(f64::from(displacement.signum()))
}

/// `(vertical, horizontal)` speeds for a pointer relative to its anchor.
/// Pointer below the anchor scrolls down (negative wheel delta); pointer
/// right of the anchor scrolls right (positive).
pub fn drag_velocity(anchor: Point, pointer: Point, deadzone: u32, sensitivity: f64) -> (f64, f64) {
    let dy = pointer.y.saturating_sub(anchor.y);
    let dx = pointer.x.saturating_sub(anchor.x);
    (
        -axis_speed(dy, deadzone, sensitivity),
        axis_speed(dx, deadzone, sensitivity),
    )
}

/// Adds `speed * dt` to `remainder` and takes out whole steps once the
/// magnitude reaches `min_step`. The fractional part carries to the next tick;
/// anything past `MAX_WHEEL_STEP` is dropped.
pub fn accumulate(remainder: &mut f64, speed: f64, dt: f64, min_step: u32) -> i32 {
    if speed.abs() <= SPEED_EPSILON {
        *remainder = 0.0;
        return 0;
    }

    *remainder += speed * dt;
    if remainder.abs() < f64::from(min_step.max(1)) {
        return 0;
    }

    let steps = remainder.trunc();
    *remainder -= steps;
    steps.clamp(-f64::from(MAX_WHEEL_STEP), f64::from(MAX_WHEEL_STEP)) as i32
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutput {
    pub vertical: i32,
    pub horizontal: i32,
    /// The session returned to `Idle` during this tick.
    pub finished: bool,
}

/// Live simulation state. One per engine, guarded by the engine's mutex.
#[derive(Debug, Clone, Default)]
pub struct ScrollSession {
    pub id: Option<Uuid>,
    pub state: ScrollState,
    pub anchor: Point,
    pub pointer: Point,
    /// Wheel units per second; during inertia these hold the decaying throw speed.
    pub vertical_speed: f64,
    pub horizontal_speed: f64,
    pub vertical_remainder: f64,
    pub horizontal_remainder: f64,
    pub reading_speed: f64,
    pub(crate) last_motion_at: Option<Instant>,
    /// Bumped on every session start so a tick loop from an older session
    /// can tell it has been superseded.
    pub(crate) generation: u64,
    pub(crate) mirrors: Arc<[MirrorTarget]>,
}

impl ScrollSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.state != ScrollState::Idle
    }

    fn begin(&mut self, state: ScrollState, anchor: Point, now: Instant, mirrors: Vec<MirrorTarget>) -> u64 {
        let generation = self.generation.wrapping_add(1);
        *self = Self {
            id: Some(Uuid::new_v4()),
            state,
            anchor,
            pointer: anchor,
            last_motion_at: Some(now),
            generation,
            mirrors: mirrors.into(),
            ..Self::default()
        };
        generation
    }

    pub fn begin_drag(&mut self, anchor: Point, now: Instant, mirrors: Vec<MirrorTarget>) -> u64 {
        self.begin(ScrollState::Dragging, anchor, now, mirrors)
    }

    pub fn begin_reading(
        &mut self,
        anchor: Point,
        speed: f64,
        now: Instant,
        mirrors: Vec<MirrorTarget>,
    ) -> u64 {
        let generation = self.begin(ScrollState::ReadingMode, anchor, now, mirrors);
        self.reading_speed = clamp_reading_speed(speed);
        generation
    }

    /// Records a pointer position while dragging and recomputes target speeds.
    pub fn update_pointer(&mut self, point: Point, now: Instant, deadzone: u32, sensitivity: f64) {
        if self.state != ScrollState::Dragging {
            return;
        }

        if point != self.pointer {
            self.last_motion_at = Some(now);
        }
        self.pointer = point;
        let (vertical, horizontal) = drag_velocity(self.anchor, point, deadzone, sensitivity);
        self.vertical_speed = vertical;
        self.horizontal_speed = horizontal;
    }

    /// Ends a drag, throwing into inertia if the pointer was moving and fast enough.
    pub fn release(&mut self, now: Instant) -> ScrollState {
        if self.state != ScrollState::Dragging {
            return self.state;
        }

        let stationary = self
            .last_motion_at
            .map_or(true, |at| now.duration_since(at) >= STATIONARY_BEFORE_RELEASE);
        let fast = self.vertical_speed.abs() > INERTIA_THRESHOLD
            || self.horizontal_speed.abs() > INERTIA_THRESHOLD;

        if !stationary && fast {
            self.state = ScrollState::InertialScrolling;
        } else {
            self.stop();
        }
        self.state
    }

    /// Returns the new reading speed, or `None` outside reading mode.
    pub fn adjust_reading_speed(&mut self, delta: f64) -> Option<f64> {
        if self.state != ScrollState::ReadingMode {
            return None;
        }
        self.reading_speed = clamp_reading_speed(self.reading_speed + delta);
        Some(self.reading_speed)
    }

    pub fn stop(&mut self) {
        *self = Self {
            generation: self.generation,
            ..Self::default()
        };
    }

    /// Advances the simulation by `dt` seconds.
    pub fn advance(&mut self, dt: f64, friction: f64, min_step: u32) -> TickOutput {
        let mut finished = false;
        let (vertical, horizontal) = match self.state {
            ScrollState::Idle => {
                return TickOutput {
                    finished: true,
                    ..TickOutput::default()
                }
            }
            ScrollState::Dragging => (self.vertical_speed, self.horizontal_speed),
            ScrollState::InertialScrolling => {
                let decay = (-friction.max(0.0) * dt).exp();
                self.vertical_speed *= decay;
                self.horizontal_speed *= decay;
                finished = self.vertical_speed.abs() < INERTIA_STOP_SPEED
                    && self.horizontal_speed.abs() < INERTIA_STOP_SPEED;
                (self.vertical_speed, self.horizontal_speed)
            }
            // Reading always scrolls the content downward.
            ScrollState::ReadingMode => (-self.reading_speed, 0.0),
        };

        let output = TickOutput {
            vertical: accumulate(&mut self.vertical_remainder, vertical, dt, min_step),
            horizontal: accumulate(&mut self.horizontal_remainder, horizontal, dt, min_step),
            finished,
        };
        if finished {
            self.stop();
        }
        output
    }
}

fn clamp_reading_speed(speed: f64) -> f64 {
    if speed.is_nan() {
        return 0.0;
    }
    speed.clamp(0.0, MAX_READING_SPEED)
}
