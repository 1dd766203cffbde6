use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use serde::Serialize;
use tokio::{
    runtime::Handle,
    time::{self, Instant, MissedTickBehavior},
};

use crate::{
    models::{Point, WheelAxis},
    platform::{DesktopProbe, MirrorOutput, WheelOutput},
    settings::{SettingsStore, MAX_TICK_RATE},
    sync_scroll::{fan_out, MirrorScanner, MirrorTarget},
};

use super::{ScrollSession, ScrollState, TickOutput, MAX_READING_SPEED};

/// Longest gap, in tick periods, one tick may integrate after a stall.
const MAX_TICK_GAP: u32 = 4;

const ENABLE_LOGS: bool = true;
use crate::{log_debug, log_info};

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScrollSnapshot {
    pub state: ScrollState,
    pub anchor: Point,
    pub pointer: Point,
    pub vertical_speed: f64,
    pub horizontal_speed: f64,
    pub reading_speed: f64,
    pub mirror_count: usize,
}

/// Owns the scroll session and the tick loop that turns it into wheel events.
///
/// Operations are synchronous and may be called from the OS input thread;
/// the tick loop runs as a task on `runtime`.
pub struct ScrollEngine {
    session: Arc<Mutex<ScrollSession>>,
    settings: Arc<SettingsStore>,
    output: Arc<dyn WheelOutput>,
    mirror_output: Arc<dyn MirrorOutput>,
    scanner: MirrorScanner,
    runtime: Handle,
}

impl ScrollEngine {
    pub fn new(
        settings: Arc<SettingsStore>,
        desktop: Arc<dyn DesktopProbe>,
        output: Arc<dyn WheelOutput>,
        mirror_output: Arc<dyn MirrorOutput>,
        runtime: Handle,
    ) -> Self {
        Self {
            session: Arc::new(Mutex::new(ScrollSession::new())),
            settings,
            output,
            mirror_output,
            scanner: MirrorScanner::new(desktop),
            runtime,
        }
    }

    pub fn current_state(&self) -> ScrollState {
        lock_session(&self.session).state
    }

    pub fn snapshot(&self) -> ScrollSnapshot {
        let session = lock_session(&self.session);
        ScrollSnapshot {
            state: session.state,
            anchor: session.anchor,
            pointer: session.pointer,
            vertical_speed: session.vertical_speed,
            horizontal_speed: session.horizontal_speed,
            reading_speed: session.reading_speed,
            mirror_count: session.mirrors.len(),
        }
    }

    /// Starts a drag session anchored at `anchor`. No-op unless idle.
    pub fn start_drag(&self, anchor: Point) -> bool {
        self.begin(anchor, |session, mirrors| {
            session.begin_drag(anchor, Instant::now(), mirrors)
        })
    }

    /// Starts reading mode at `speed` wheel units per second. No-op unless idle.
    pub fn start_reading_mode(&self, anchor: Point, speed: f64) -> bool {
        self.begin(anchor, |session, mirrors| {
            session.begin_reading(anchor, speed, Instant::now(), mirrors)
        })
    }

    fn begin(
        &self,
        anchor: Point,
        start: impl FnOnce(&mut ScrollSession, Vec<MirrorTarget>) -> u64,
    ) -> bool {
        if self.current_state() != ScrollState::Idle {
            return false;
        }

        let settings = self.settings.snapshot();
        // Window enumeration stays outside the session lock.
        let mirrors = if settings.sync_scroll_enabled {
            self.scanner.scan(anchor)
        } else {
            Vec::new()
        };

        let (generation, session_id, state) = {
            let mut session = lock_session(&self.session);
            if session.is_active() {
                return false;
            }
            let generation = start(&mut session, mirrors);
            (generation, session.id, session.state)
        };

        if let Some(id) = session_id {
            log_info!(
                "Scroll session {} started in {:?} at ({}, {})",
                id,
                state,
                anchor.x,
                anchor.y
            );
        }
        self.spawn_ticker(generation, settings.tick_rate);
        true
    }

    /// Feeds the latest pointer position into an active drag.
    pub fn update_drag_position(&self, point: Point) {
        let settings = self.settings.snapshot();
        let mut session = lock_session(&self.session);
        session.update_pointer(
            point,
            Instant::now(),
            settings.deadzone,
            f64::from(settings.sensitivity),
        );
    }

    /// Ends a drag. Returns the resulting state: `InertialScrolling` for a
    /// throw, otherwise `Idle`. Outside a drag the state is returned unchanged.
    pub fn release_drag(&self) -> ScrollState {
        let mut session = lock_session(&self.session);
        let id = session.id;
        let state = session.release(Instant::now());
        match (state, id) {
            (ScrollState::InertialScrolling, Some(id)) => log_debug!(
                "Scroll session {} released into inertia at {:.0}/{:.0}",
                id,
                session.vertical_speed,
                session.horizontal_speed
            ),
            (ScrollState::Idle, Some(id)) => log_info!("Scroll session {} ended on release", id),
            _ => {}
        }
        state
    }

    /// Returns the new speed, or `None` outside reading mode.
    pub fn adjust_reading_speed(&self, delta: f64) -> Option<f64> {
        let speed = lock_session(&self.session).adjust_reading_speed(delta)?;
        log_debug!("Reading speed set to {:.0} (max {})", speed, MAX_READING_SPEED);
        Some(speed)
    }

    /// Returns to `Idle` from any state. Idempotent.
    pub fn stop(&self) {
        let mut session = lock_session(&self.session);
        if let Some(id) = session.id {
            log_info!("Scroll session {} stopped from {:?}", id, session.state);
        }
        session.stop();
    }

    fn spawn_ticker(&self, generation: u64, tick_rate: u32) {
        let session = self.session.clone();
        let settings = self.settings.clone();
        let output = self.output.clone();
        let mirror_output = self.mirror_output.clone();
        let period = Duration::from_secs_f64(1.0 / f64::from(tick_rate.clamp(1, MAX_TICK_RATE)));

        self.runtime.spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last_tick = Instant::now();

            loop {
                interval.tick().await;
                let now = Instant::now();
                let dt = now
                    .duration_since(last_tick)
                    .min(period * MAX_TICK_GAP)
                    .as_secs_f64();
                last_tick = now;

                let config = settings.snapshot();
                let (tick, mirrors, id) = {
                    let mut guard = lock_session(&session);
                    if guard.generation != generation || !guard.is_active() {
                        break;
                    }
                    let id = guard.id;
                    let tick = guard.advance(dt, config.friction, config.min_step);
                    (tick, guard.mirrors.clone(), id)
                };

                emit(output.as_ref(), mirror_output.as_ref(), &mirrors, &tick);

                if tick.finished {
                    if let Some(id) = id {
                        log_info!("Scroll session {} coasted to a stop", id);
                    }
                    break;
                }
            }
        });
    }
}

fn emit(output: &dyn WheelOutput, mirror_output: &dyn MirrorOutput, mirrors: &[MirrorTarget], tick: &TickOutput) {
    for (axis, delta) in [
        (WheelAxis::Vertical, tick.vertical),
        (WheelAxis::Horizontal, tick.horizontal),
    ] {
        if delta == 0 {
            continue;
        }
        log::trace!("wheel {:?} {}", axis, delta);
        output.inject(axis, delta);
        fan_out(mirror_output, mirrors, axis, delta);
    }
}

fn lock_session(session: &Mutex<ScrollSession>) -> MutexGuard<'_, ScrollSession> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}
