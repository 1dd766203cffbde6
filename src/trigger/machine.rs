use std::{sync::Arc, time::Duration};

use tokio::time::Instant;

use crate::{
    models::{InputEvent, InputKind, KeyCode, Modifiers, MouseButton, Point},
    platform::InputHandler,
    process::{ProcessClassifier, Verdict},
    scroll::{ScrollEngine, ScrollState, DEFAULT_READING_SPEED},
    settings::{ScrollSettings, SettingsStore, TriggerKey, TriggerMode},
};

use super::{
    feedback::{Direction, FeedbackEvent, FeedbackSender},
    hotkey::Hotkey,
};

const ENABLE_LOGS: bool = true;
use crate::{log_debug, log_info};

/// Overlay position updates are sent at most this often.
const FEEDBACK_INTERVAL: Duration = Duration::from_millis(16);
/// One wheel notch.
const WHEEL_NOTCH: f64 = 120.0;
/// Reading speed change per wheel notch, in wheel units per second.
const READING_SPEED_PER_NOTCH: f64 = 20.0;

pub const DEFAULT_DOUBLE_CLICK: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy)]
struct TriggerPress {
    at: Instant,
    state_before: ScrollState,
}

/// Maps normalized input events onto engine operations.
///
/// Runs synchronously on the input thread. Everything it does is bounded:
/// classification hits a short-lived cache, engine calls take one
/// short lock, and feedback is fire-and-forget.
pub struct TriggerStateMachine {
    settings: Arc<SettingsStore>,
    engine: Arc<ScrollEngine>,
    classifier: ProcessClassifier,
    feedback: FeedbackSender,
    double_click: Duration,
    pointer: Point,
    anchor: Point,
    anchor_visible: bool,
    held: Modifiers,
    /// Buttons whose press was consumed; their release is consumed too.
    swallowed: u8,
    /// Modifier trigger whose press was consumed and is still held.
    trigger_key_down: Option<Modifiers>,
    hotkey_down: bool,
    hotkey: (String, Option<Hotkey>),
    last_trigger_press: Option<TriggerPress>,
    last_feedback_at: Option<Instant>,
}

impl TriggerStateMachine {
    pub fn new(
        settings: Arc<SettingsStore>,
        engine: Arc<ScrollEngine>,
        classifier: ProcessClassifier,
        feedback: FeedbackSender,
        double_click: Duration,
    ) -> Self {
        Self {
            settings,
            engine,
            classifier,
            feedback,
            double_click,
            pointer: Point::default(),
            anchor: Point::default(),
            anchor_visible: false,
            held: Modifiers::empty(),
            swallowed: 0,
            trigger_key_down: None,
            hotkey_down: false,
            hotkey: (String::new(), None),
            last_trigger_press: None,
            last_feedback_at: None,
        }
    }

    pub fn engine(&self) -> &Arc<ScrollEngine> {
        &self.engine
    }

    fn on_pointer_move(&mut self, point: Point, settings: &ScrollSettings) {
        if self.engine.current_state() != ScrollState::Dragging {
            return;
        }
        self.engine.update_drag_position(point);

        let now = Instant::now();
        let due = self
            .last_feedback_at
            .map_or(true, |at| now.duration_since(at) >= FEEDBACK_INTERVAL);
        if !due {
            return;
        }
        self.last_feedback_at = Some(now);
        self.feedback.send(FeedbackEvent::PositionUpdate {
            direction: Direction::from_offset(self.anchor, point, settings.deadzone),
            distance: self.anchor.distance_to(point),
        });
    }

    fn on_button_down(&mut self, button: MouseButton, event: &mut InputEvent, settings: &ScrollSettings) {
        if trigger_button(settings) == Some(button) {
            if self.on_trigger_press(event.point, settings, button == MouseButton::Middle) {
                event.consume();
                self.swallowed |= button.bit();
            }
            return;
        }

        if self.engine.current_state() != ScrollState::Idle {
            log_debug!("{:?} press interrupted the scroll session", button);
            self.stop_session();
            event.consume();
            self.swallowed |= button.bit();
        }
    }

    fn on_button_up(&mut self, button: MouseButton, event: &mut InputEvent, settings: &ScrollSettings) {
        if self.swallowed & button.bit() != 0 {
            self.swallowed &= !button.bit();
            event.consume();
        }

        if trigger_button(settings) == Some(button) && settings.trigger_mode == TriggerMode::Hold {
            self.release();
        }
    }

    fn on_wheel(&mut self, delta: i32, event: &mut InputEvent) {
        if self.engine.current_state() != ScrollState::ReadingMode {
            return;
        }
        let change = f64::from(delta) / WHEEL_NOTCH * READING_SPEED_PER_NOTCH;
        self.engine.adjust_reading_speed(change);
        event.consume();
    }

    fn on_key_down(&mut self, key: KeyCode, event: &mut InputEvent, settings: &ScrollSettings) {
        if let Some(modifier) = key.modifier() {
            self.held |= modifier;
            if trigger_modifier(settings) == Some(modifier) {
                if self.trigger_key_down == Some(modifier) {
                    // Auto-repeat of the held trigger.
                    event.consume();
                    return;
                }
                if self.on_trigger_press(self.pointer, settings, false) {
                    self.trigger_key_down = Some(modifier);
                    event.consume();
                }
            }
            return;
        }

        if settings.trigger_key != TriggerKey::Custom {
            return;
        }
        let Some(hotkey) = self.hotkey(&settings.custom_hotkey) else {
            return;
        };
        if self.hotkey_down && key == hotkey.key {
            event.consume();
            return;
        }
        if hotkey.matches(self.held, key) && self.on_hotkey_press() {
            self.hotkey_down = true;
            event.consume();
        }
    }

    fn on_key_up(&mut self, key: KeyCode, event: &mut InputEvent, settings: &ScrollSettings) {
        if let Some(modifier) = key.modifier() {
            self.held.remove(modifier);
            if self.trigger_key_down == Some(modifier) {
                self.trigger_key_down = None;
                event.consume();
                if settings.trigger_mode == TriggerMode::Hold {
                    self.release();
                }
            }
            return;
        }

        if self.hotkey_down && self.hotkey.1.map(|hotkey| hotkey.key) == Some(key) {
            self.hotkey_down = false;
            event.consume();
        }
    }

    /// Handles a trigger going down. Returns whether the event is consumed.
    fn on_trigger_press(&mut self, point: Point, settings: &ScrollSettings, reading_gesture: bool) -> bool {
        let now = Instant::now();
        let state = self.engine.current_state();

        if reading_gesture && settings.reading_mode_enabled {
            let previous = self.last_trigger_press.take();
            let double = previous.filter(|press| now.duration_since(press.at) <= self.double_click);
            if let Some(previous) = double {
                if previous.state_before == ScrollState::ReadingMode {
                    // The first press of the pair already stopped reading mode.
                    self.stop_session();
                } else {
                    self.enter_reading_mode(point);
                }
                return true;
            }
        }

        let consumed = match (state, settings.trigger_mode) {
            (ScrollState::Idle, _) => self.try_start(point),
            (ScrollState::ReadingMode, _) => {
                self.stop_session();
                true
            }
            (ScrollState::Dragging, TriggerMode::Toggle) => {
                self.release();
                true
            }
            (ScrollState::InertialScrolling, TriggerMode::Toggle) => {
                self.stop_session();
                true
            }
            (ScrollState::Dragging | ScrollState::InertialScrolling, TriggerMode::Hold) => {
                self.stop_session();
                self.try_start(point)
            }
        };

        if consumed && reading_gesture && settings.reading_mode_enabled {
            self.last_trigger_press = Some(TriggerPress {
                at: now,
                state_before: state,
            });
        }
        consumed
    }

    /// The custom hotkey always toggles, whatever the trigger mode.
    fn on_hotkey_press(&mut self) -> bool {
        match self.engine.current_state() {
            ScrollState::Idle => self.try_start(self.pointer),
            ScrollState::Dragging => {
                self.release();
                true
            }
            ScrollState::InertialScrolling | ScrollState::ReadingMode => {
                self.stop_session();
                true
            }
        }
    }

    /// Starts a drag unless the window under `point` is blocked.
    fn try_start(&mut self, point: Point) -> bool {
        if self.classifier.classify(point) == Verdict::Blocked {
            log_debug!("Trigger at ({}, {}) passed through to a blocked process", point.x, point.y);
            return false;
        }
        if self.engine.start_drag(point) {
            self.anchor = point;
            self.anchor_visible = true;
            self.last_feedback_at = None;
            self.feedback.send(FeedbackEvent::SessionStart { anchor: point });
        }
        true
    }

    fn enter_reading_mode(&mut self, point: Point) {
        let anchor = if self.anchor_visible { self.anchor } else { point };
        self.engine.stop();
        if !self.engine.start_reading_mode(anchor, DEFAULT_READING_SPEED) {
            return;
        }
        log_info!("Reading mode on at {} units/s", DEFAULT_READING_SPEED);
        if !self.anchor_visible {
            self.anchor = anchor;
            self.anchor_visible = true;
            self.feedback.send(FeedbackEvent::SessionStart { anchor });
        }
        self.feedback.send(FeedbackEvent::ReadingModeChanged(true));
    }

    fn release(&mut self) {
        if self.engine.current_state() != ScrollState::Dragging {
            return;
        }
        self.engine.release_drag();
        self.hide_anchor();
    }

    fn stop_session(&mut self) {
        let state = self.engine.current_state();
        self.engine.stop();
        if state == ScrollState::ReadingMode {
            self.feedback.send(FeedbackEvent::ReadingModeChanged(false));
        }
        self.hide_anchor();
    }

    fn hide_anchor(&mut self) {
        if self.anchor_visible {
            self.anchor_visible = false;
            self.feedback.send(FeedbackEvent::SessionEnd);
        }
    }

    fn hotkey(&mut self, combo: &str) -> Option<Hotkey> {
        if self.hotkey.0 != combo {
            let parsed = Hotkey::parse(combo);
            if parsed.is_none() && !combo.is_empty() {
                log::warn!("Custom hotkey '{}' is not a valid combo; it will never match", combo);
            }
            self.hotkey = (combo.to_string(), parsed);
        }
        self.hotkey.1
    }

    /// Keeps modifier and release bookkeeping current while disabled.
    fn track_only(&mut self, event: &mut InputEvent) {
        match event.kind {
            InputKind::KeyDown(key) => {
                if let Some(modifier) = key.modifier() {
                    self.held |= modifier;
                }
            }
            InputKind::KeyUp(key) => {
                if let Some(modifier) = key.modifier() {
                    self.held.remove(modifier);
                    if self.trigger_key_down == Some(modifier) {
                        self.trigger_key_down = None;
                        event.consume();
                    }
                } else if self.hotkey_down && self.hotkey.1.map(|hotkey| hotkey.key) == Some(key) {
                    self.hotkey_down = false;
                    event.consume();
                }
            }
            InputKind::ButtonUp(button) if self.swallowed & button.bit() != 0 => {
                self.swallowed &= !button.bit();
                event.consume();
            }
            _ => {}
        }
    }
}

impl InputHandler for TriggerStateMachine {
    fn handle(&mut self, event: &mut InputEvent) {
        if event.is_pointer_event() {
            self.pointer = event.point;
        }

        let settings = self.settings.snapshot();
        if !settings.enabled {
            if self.engine.current_state() != ScrollState::Idle {
                self.stop_session();
            }
            self.track_only(event);
            return;
        }

        match event.kind {
            InputKind::PointerMove => self.on_pointer_move(event.point, &settings),
            InputKind::ButtonDown(button) => self.on_button_down(button, event, &settings),
            InputKind::ButtonUp(button) => self.on_button_up(button, event, &settings),
            InputKind::WheelDelta(delta) => self.on_wheel(delta, event),
            InputKind::KeyDown(key) => self.on_key_down(key, event, &settings),
            InputKind::KeyUp(key) => self.on_key_up(key, event, &settings),
        }
    }
}

fn trigger_button(settings: &ScrollSettings) -> Option<MouseButton> {
    match settings.trigger_key {
        TriggerKey::MiddleMouse => Some(MouseButton::Middle),
        TriggerKey::XButton1 => Some(MouseButton::X1),
        TriggerKey::XButton2 => Some(MouseButton::X2),
        _ => None,
    }
}

fn trigger_modifier(settings: &ScrollSettings) -> Option<Modifiers> {
    match settings.trigger_key {
        TriggerKey::Ctrl => Some(Modifiers::CTRL),
        TriggerKey::Alt => Some(Modifiers::ALT),
        TriggerKey::Shift => Some(Modifiers::SHIFT),
        _ => None,
    }
}
