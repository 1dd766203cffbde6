use std::{collections::HashMap, sync::Arc, time::Duration};

use pretty_assertions::assert_eq;
use tokio::{runtime::Handle, sync::mpsc, time};

use super::*;
use crate::{
    models::{InputEvent, KeyCode, MouseButton, Point, Rect, WheelAxis},
    platform::{
        fakes::{FakeDesktop, RecordingOutput},
        InputHandler,
    },
    process::{ProcessClassifier, ProcessLookup},
    scroll::{ScrollEngine, ScrollState},
    settings::{ProcessProfile, ScrollSettings, SettingsStore, TriggerKey, TriggerMode},
};

const EDITOR: Point = Point { x: 500, y: 500 };
const GAME: Point = Point { x: 2500, y: 500 };

struct StaticLookup(HashMap<u32, &'static str>);

impl ProcessLookup for StaticLookup {
    fn process_name(&mut self, pid: u32) -> Option<String> {
        self.0.get(&pid).map(|name| name.to_string())
    }
}

struct Harness {
    machine: TriggerStateMachine,
    settings: Arc<SettingsStore>,
    output: Arc<RecordingOutput>,
    feedback: mpsc::Receiver<FeedbackEvent>,
}

impl Harness {
    fn new(settings: ScrollSettings) -> Self {
        // Left monitor runs an editor, right monitor a blocked game.
        let desktop = Arc::new(
            FakeDesktop::default()
                .with_window(1, Rect::new(0, 0, 1920, 1080), 10)
                .with_window(2, Rect::new(1920, 0, 3840, 1080), 20),
        );
        let lookup = StaticLookup([(10, "notepad.exe"), (20, "valorant.exe")].into_iter().collect());
        let settings = Arc::new(SettingsStore::in_memory(settings));
        let output = Arc::new(RecordingOutput::default());
        let engine = Arc::new(ScrollEngine::new(
            settings.clone(),
            desktop.clone(),
            output.clone(),
            output.clone(),
            Handle::current(),
        ));
        let classifier = ProcessClassifier::new(desktop, Box::new(lookup), settings.clone());
        let (tx, rx) = channel();
        let machine = TriggerStateMachine::new(
            settings.clone(),
            engine,
            classifier,
            tx,
            DEFAULT_DOUBLE_CLICK,
        );

        Self {
            machine,
            settings,
            output,
            feedback: rx,
        }
    }

    fn send(&mut self, mut event: InputEvent) -> bool {
        self.machine.handle(&mut event);
        event.consumed
    }

    fn press(&mut self, button: MouseButton, point: Point) -> bool {
        self.send(InputEvent::button_down(button, point))
    }

    fn release(&mut self, button: MouseButton, point: Point) -> bool {
        self.send(InputEvent::button_up(button, point))
    }

    /// Press and release; returns whether the press was consumed.
    fn click(&mut self, button: MouseButton, point: Point) -> bool {
        let consumed = self.press(button, point);
        self.release(button, point);
        consumed
    }

    fn move_to(&mut self, point: Point) -> bool {
        self.send(InputEvent::pointer_move(point))
    }

    fn wheel(&mut self, delta: i32) -> bool {
        self.send(InputEvent::wheel(delta, EDITOR))
    }

    fn key_down(&mut self, key: KeyCode) -> bool {
        self.send(InputEvent::key_down(key))
    }

    fn key_up(&mut self, key: KeyCode) -> bool {
        self.send(InputEvent::key_up(key))
    }

    fn state(&self) -> ScrollState {
        self.machine.engine().current_state()
    }

    fn drain_feedback(&mut self) -> Vec<FeedbackEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.feedback.try_recv() {
            events.push(event);
        }
        events
    }
}

fn with(f: impl FnOnce(&mut ScrollSettings)) -> ScrollSettings {
    let mut settings = ScrollSettings::default();
    f(&mut settings);
    settings
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn toggle_press_scrolls_until_pressed_again() {
    let mut h = Harness::new(ScrollSettings::default());

    assert!(h.press(MouseButton::Middle, EDITOR));
    assert!(h.release(MouseButton::Middle, EDITOR));
    assert_eq!(h.state(), ScrollState::Dragging);

    h.move_to(Point::new(500, 560));
    time::sleep(Duration::from_secs(1)).await;
    let total = h.output.total(WheelAxis::Vertical);
    assert!((-21..=-19).contains(&total), "total {total}");

    assert!(h.click(MouseButton::Middle, Point::new(500, 560)));
    assert_eq!(h.state(), ScrollState::Idle);

    let emitted = h.output.injected_count();
    time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.output.injected_count(), emitted);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn hold_release_throws_into_inertia() {
    let mut h = Harness::new(with(|s| s.trigger_mode = TriggerMode::Hold));

    assert!(h.press(MouseButton::Middle, EDITOR));
    assert_eq!(h.state(), ScrollState::Dragging);
    h.move_to(Point::new(500, 820));
    assert_eq!(h.machine.engine().snapshot().vertical_speed, -150.0);

    assert!(h.release(MouseButton::Middle, Point::new(500, 820)));
    assert_eq!(h.state(), ScrollState::InertialScrolling);

    time::sleep(Duration::from_millis(500)).await;
    assert_eq!(h.state(), ScrollState::InertialScrolling);
    time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.state(), ScrollState::Idle);

    let feedback = h.drain_feedback();
    assert_eq!(feedback.first(), Some(&FeedbackEvent::SessionStart { anchor: EDITOR }));
    assert_eq!(feedback.last(), Some(&FeedbackEvent::SessionEnd));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn double_click_enters_reading_mode() {
    let mut h = Harness::new(with(|s| s.reading_mode_enabled = true));

    assert!(h.click(MouseButton::Middle, EDITOR));
    time::sleep(Duration::from_millis(100)).await;
    assert!(h.click(MouseButton::Middle, EDITOR));
    assert_eq!(h.state(), ScrollState::ReadingMode);
    assert_eq!(h.machine.engine().snapshot().reading_speed, 30.0);

    assert!(h.wheel(120));
    assert_eq!(h.machine.engine().snapshot().reading_speed, 50.0);

    time::sleep(Duration::from_secs(2)).await;
    assert!(h.output.total(WheelAxis::Vertical) < 0);

    assert!(h.click(MouseButton::Middle, EDITOR));
    assert_eq!(h.state(), ScrollState::Idle);

    assert_eq!(
        h.drain_feedback(),
        vec![
            FeedbackEvent::SessionStart { anchor: EDITOR },
            FeedbackEvent::ReadingModeChanged(true),
            FeedbackEvent::ReadingModeChanged(false),
            FeedbackEvent::SessionEnd,
        ]
    );
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn double_click_while_reading_stops_everything() {
    let mut h = Harness::new(with(|s| s.reading_mode_enabled = true));
    h.click(MouseButton::Middle, EDITOR);
    time::sleep(Duration::from_millis(100)).await;
    h.click(MouseButton::Middle, EDITOR);
    assert_eq!(h.state(), ScrollState::ReadingMode);
    time::sleep(Duration::from_secs(2)).await;

    assert!(h.click(MouseButton::Middle, EDITOR));
    time::sleep(Duration::from_millis(100)).await;
    assert!(h.click(MouseButton::Middle, EDITOR));
    assert_eq!(h.state(), ScrollState::Idle);

    // A later single press starts an ordinary drag.
    time::sleep(Duration::from_secs(2)).await;
    assert!(h.click(MouseButton::Middle, EDITOR));
    assert_eq!(h.state(), ScrollState::Dragging);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn double_click_is_plain_toggle_without_reading_mode() {
    let mut h = Harness::new(ScrollSettings::default());
    h.click(MouseButton::Middle, EDITOR);
    time::sleep(Duration::from_millis(100)).await;
    h.click(MouseButton::Middle, EDITOR);
    assert_eq!(h.state(), ScrollState::Idle);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn blocked_process_gets_the_click() {
    let mut h = Harness::new(ScrollSettings::default());
    assert!(!h.press(MouseButton::Middle, GAME));
    assert!(!h.release(MouseButton::Middle, GAME));
    assert_eq!(h.state(), ScrollState::Idle);
    assert!(h.drain_feedback().is_empty());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn whitelist_only_scrolls_listed_processes() {
    let mut h = Harness::new(with(|s| {
        s.whitelist_mode = true;
        s.app_profiles = vec![ProcessProfile::new("Notepad")];
    }));
    assert!(!h.click(MouseButton::Middle, GAME));
    assert!(h.click(MouseButton::Middle, EDITOR));
    assert_eq!(h.state(), ScrollState::Dragging);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn stray_click_stops_and_is_swallowed() {
    let mut h = Harness::new(ScrollSettings::default());
    h.click(MouseButton::Middle, EDITOR);

    assert!(h.press(MouseButton::Left, EDITOR));
    assert_eq!(h.state(), ScrollState::Idle);
    assert!(h.release(MouseButton::Left, EDITOR));

    // Once idle, clicks reach applications again.
    assert!(!h.press(MouseButton::Left, EDITOR));
    assert!(!h.release(MouseButton::Left, EDITOR));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn stray_click_stops_inertia() {
    let mut h = Harness::new(ScrollSettings::default());
    h.click(MouseButton::Middle, EDITOR);
    h.move_to(Point::new(500, 820));
    h.click(MouseButton::Middle, Point::new(500, 820));
    assert_eq!(h.state(), ScrollState::InertialScrolling);

    assert!(h.click(MouseButton::Right, Point::new(500, 820)));
    assert_eq!(h.state(), ScrollState::Idle);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn hold_press_during_inertia_starts_fresh_drag() {
    let mut h = Harness::new(with(|s| s.trigger_mode = TriggerMode::Hold));
    h.press(MouseButton::Middle, EDITOR);
    h.move_to(Point::new(500, 820));
    h.release(MouseButton::Middle, Point::new(500, 820));
    assert_eq!(h.state(), ScrollState::InertialScrolling);

    assert!(h.press(MouseButton::Middle, Point::new(300, 300)));
    assert_eq!(h.state(), ScrollState::Dragging);
    assert_eq!(h.machine.engine().snapshot().anchor, Point::new(300, 300));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn hold_press_during_inertia_over_blocked_app_passes_through() {
    let mut h = Harness::new(with(|s| s.trigger_mode = TriggerMode::Hold));
    h.press(MouseButton::Middle, EDITOR);
    h.move_to(Point::new(500, 820));
    h.release(MouseButton::Middle, Point::new(500, 820));
    assert_eq!(h.state(), ScrollState::InertialScrolling);

    assert!(!h.press(MouseButton::Middle, GAME));
    assert_eq!(h.state(), ScrollState::Idle);
    assert!(!h.release(MouseButton::Middle, GAME));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn disabled_passes_everything_through() {
    let mut h = Harness::new(ScrollSettings::default());
    h.settings.update(|s| s.enabled = false).unwrap();
    assert!(!h.press(MouseButton::Middle, EDITOR));
    assert!(!h.release(MouseButton::Middle, EDITOR));
    assert_eq!(h.state(), ScrollState::Idle);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn disabling_mid_session_stops_it() {
    let mut h = Harness::new(with(|s| s.trigger_mode = TriggerMode::Hold));
    assert!(h.press(MouseButton::Middle, EDITOR));
    h.settings.update(|s| s.enabled = false).unwrap();

    h.move_to(Point::new(500, 700));
    assert_eq!(h.state(), ScrollState::Idle);
    // The release of the consumed press is still swallowed.
    assert!(h.release(MouseButton::Middle, Point::new(500, 700)));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn trigger_changes_apply_immediately() {
    let mut h = Harness::new(ScrollSettings::default());
    h.settings.update(|s| s.trigger_key = TriggerKey::XButton1).unwrap();

    assert!(!h.click(MouseButton::Middle, EDITOR));
    assert!(h.click(MouseButton::X1, EDITOR));
    assert_eq!(h.state(), ScrollState::Dragging);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn modifier_trigger_ignores_auto_repeat() {
    let mut h = Harness::new(with(|s| s.trigger_key = TriggerKey::Ctrl));
    h.move_to(EDITOR);

    assert!(h.key_down(KeyCode::LEFT_CONTROL));
    assert_eq!(h.state(), ScrollState::Dragging);
    assert_eq!(h.machine.engine().snapshot().anchor, EDITOR);

    assert!(h.key_down(KeyCode::LEFT_CONTROL));
    assert!(h.key_down(KeyCode::LEFT_CONTROL));
    assert_eq!(h.state(), ScrollState::Dragging);
    assert!(h.key_up(KeyCode::LEFT_CONTROL));

    assert!(h.key_down(KeyCode::RIGHT_CONTROL));
    assert_eq!(h.state(), ScrollState::Idle);
    assert!(h.key_up(KeyCode::RIGHT_CONTROL));

    // Other modifiers are untouched.
    assert!(!h.key_down(KeyCode::LEFT_SHIFT));
    assert!(!h.key_up(KeyCode::LEFT_SHIFT));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn modifier_trigger_in_hold_mode() {
    let mut h = Harness::new(with(|s| {
        s.trigger_key = TriggerKey::Alt;
        s.trigger_mode = TriggerMode::Hold;
    }));
    h.move_to(EDITOR);

    assert!(h.key_down(KeyCode::ALT));
    h.move_to(Point::new(500, 820));
    assert!(h.key_up(KeyCode::ALT));
    assert_eq!(h.state(), ScrollState::InertialScrolling);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn custom_hotkey_toggles() {
    let mut h = Harness::new(with(|s| {
        s.trigger_key = TriggerKey::Custom;
        s.custom_hotkey = "Ctrl+Shift+S".into();
        s.trigger_mode = TriggerMode::Hold;
    }));
    let s = KeyCode(0x53);
    h.move_to(EDITOR);

    assert!(!h.key_down(KeyCode::LEFT_CONTROL));
    assert!(!h.key_down(KeyCode::LEFT_SHIFT));
    assert!(h.key_down(s));
    assert_eq!(h.state(), ScrollState::Dragging);
    assert!(h.key_down(s));
    assert!(h.key_up(s));
    // Releasing the key does not end the session, even in hold mode.
    assert_eq!(h.state(), ScrollState::Dragging);

    assert!(h.key_down(s));
    assert_eq!(h.state(), ScrollState::Idle);
    assert!(h.key_up(s));

    // Without the full modifier set the key is ordinary typing.
    assert!(!h.key_up(KeyCode::LEFT_SHIFT));
    assert!(!h.key_down(s));
    assert_eq!(h.state(), ScrollState::Idle);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn malformed_hotkey_never_matches() {
    let mut h = Harness::new(with(|s| {
        s.trigger_key = TriggerKey::Custom;
        s.custom_hotkey = "Ctrl+".into();
    }));
    h.key_down(KeyCode::LEFT_CONTROL);
    assert!(!h.key_down(KeyCode(0x53)));
    assert_eq!(h.state(), ScrollState::Idle);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn position_feedback_is_rate_limited() {
    let mut h = Harness::new(ScrollSettings::default());
    h.click(MouseButton::Middle, EDITOR);
    h.drain_feedback();

    for y in 0..10 {
        assert!(!h.move_to(Point::new(500, 600 + y)));
    }
    assert_eq!(
        h.drain_feedback(),
        vec![FeedbackEvent::PositionUpdate {
            direction: Direction::DOWN,
            distance: 100.0,
        }]
    );

    time::advance(Duration::from_millis(16)).await;
    h.move_to(Point::new(400, 500));
    assert_eq!(
        h.drain_feedback(),
        vec![FeedbackEvent::PositionUpdate {
            direction: Direction::LEFT,
            distance: 100.0,
        }]
    );
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn wheel_passes_through_outside_reading_mode() {
    let mut h = Harness::new(ScrollSettings::default());
    assert!(!h.wheel(120));
    h.click(MouseButton::Middle, EDITOR);
    assert!(!h.wheel(-120));
}
