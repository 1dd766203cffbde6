//! Seams between the scroll core and the operating system.
//!
//! The Win32 implementations live in `windows_bridge`; tests drive the core
//! through recording fakes.

use crate::models::{InputEvent, MonitorId, Point, Rect, WheelAxis, WindowHandle};
use crate::sync_scroll::MirrorTarget;

/// Read-only queries against the desktop's window and monitor layout.
/// Every lookup is best-effort: `None` means "unknown", never an error.
pub trait DesktopProbe: Send + Sync {
    fn window_at(&self, point: Point) -> Option<WindowHandle>;
    fn window_process_id(&self, window: WindowHandle) -> Option<u32>;
    fn window_rect(&self, window: WindowHandle) -> Option<Rect>;
    fn monitor_at(&self, point: Point) -> Option<MonitorId>;
    fn monitors(&self) -> Vec<(MonitorId, Rect)>;
}

/// Injects a signed wheel delta into the active input queue, marked as
/// self-generated so the input source can skip it.
pub trait WheelOutput: Send + Sync {
    fn inject(&self, axis: WheelAxis, delta: i32);
}

/// Posts a wheel delta straight to a mirror target's window. Fire-and-forget:
/// a window that has gone away is silently skipped.
pub trait MirrorOutput: Send + Sync {
    fn post(&self, target: &MirrorTarget, axis: WheelAxis, delta: i32);
}

/// Synchronous consumer of normalized input events, called on the OS hook
/// thread in delivery order.
pub trait InputHandler: Send {
    fn handle(&mut self, event: &mut InputEvent);
}
