//! Win32 side of the scroll core: low-level input hooks, synthetic wheel
//! injection, posted wheel messages for mirror targets, and window and
//! monitor queries.

use std::{
    mem,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU32, Ordering},
        Mutex, OnceLock, PoisonError,
    },
    time::Duration,
};

use anyhow::{anyhow, bail, Result};
use windows::Win32::{
    Foundation::{BOOL, HWND, LPARAM, LRESULT, POINT, RECT, WPARAM},
    Graphics::Gdi::{
        EnumDisplayMonitors, GetMonitorInfoW, MonitorFromPoint, HDC, HMONITOR, MONITORINFO,
        MONITOR_DEFAULTTONULL,
    },
    System::Threading::GetCurrentThreadId,
    UI::{
        Input::KeyboardAndMouse::{
            GetDoubleClickTime, SendInput, INPUT, INPUT_0, INPUT_MOUSE, MOUSEEVENTF_HWHEEL,
            MOUSEEVENTF_WHEEL, MOUSEINPUT,
        },
        WindowsAndMessaging::{
            CallNextHookEx, DispatchMessageW, GetMessageW, GetWindowRect, GetWindowThreadProcessId,
            PostMessageW, PostThreadMessageW, SetWindowsHookExW, TranslateMessage,
            UnhookWindowsHookEx, WindowFromPoint, HC_ACTION, KBDLLHOOKSTRUCT, MSG, MSLLHOOKSTRUCT,
            WH_KEYBOARD_LL, WH_MOUSE_LL, WM_KEYDOWN, WM_KEYUP, WM_LBUTTONDOWN, WM_LBUTTONUP,
            WM_MBUTTONDOWN, WM_MBUTTONUP, WM_MOUSEHWHEEL, WM_MOUSEMOVE, WM_MOUSEWHEEL, WM_QUIT,
            WM_RBUTTONDOWN, WM_RBUTTONUP, WM_SYSKEYDOWN, WM_SYSKEYUP, WM_XBUTTONDOWN,
            WM_XBUTTONUP,
        },
    },
};

use crate::{
    models::{InputEvent, InputKind, KeyCode, MonitorId, MouseButton, Point, Rect, WheelAxis, WindowHandle},
    platform::{DesktopProbe, InputHandler, MirrorOutput, WheelOutput},
    sync_scroll::MirrorTarget,
};

const ENABLE_LOGS: bool = true;
use crate::{log_error, log_info, log_warn};

const XBUTTON1: u32 = 0x0001;
const XBUTTON2: u32 = 0x0002;

static HANDLER: OnceLock<Mutex<Box<dyn InputHandler>>> = OnceLock::new();
static HOOK_THREAD: AtomicU32 = AtomicU32::new(0);
static INJECTION_TAG: OnceLock<usize> = OnceLock::new();

/// Per-process marker stored in `dwExtraInfo` of every synthesized event.
fn injection_tag() -> usize {
    *INJECTION_TAG.get_or_init(|| {
        let bits = uuid::Uuid::new_v4().as_u128();
        // Zero is what every other input source sends.
        (bits as usize) | 1
    })
}

/// The user's double-click interval.
pub fn double_click_time() -> Duration {
    match unsafe { GetDoubleClickTime() } {
        0 => crate::trigger::DEFAULT_DOUBLE_CLICK,
        ms => Duration::from_millis(u64::from(ms)),
    }
}

fn to_hwnd(window: WindowHandle) -> HWND {
    HWND(window.0 as *mut _)
}

fn to_point(point: Point) -> POINT {
    POINT {
        x: point.x,
        y: point.y,
    }
}

/// Wheel deltas travel as a signed 16-bit value.
fn wheel_delta(delta: i32) -> i16 {
    delta.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}

fn hiword(value: u32) -> u32 {
    (value >> 16) & 0xFFFF
}

/// Window and monitor queries, `SendInput` injection and posted mirror messages.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsDesktop;

impl DesktopProbe for WindowsDesktop {
    fn window_at(&self, point: Point) -> Option<WindowHandle> {
        let hwnd = unsafe { WindowFromPoint(to_point(point)) };
        if hwnd.0.is_null() {
            return None;
        }
        Some(WindowHandle(hwnd.0 as isize))
    }

    fn window_process_id(&self, window: WindowHandle) -> Option<u32> {
        let mut pid = 0u32;
        unsafe {
            GetWindowThreadProcessId(to_hwnd(window), Some(&mut pid));
        }
        (pid != 0).then_some(pid)
    }

    fn window_rect(&self, window: WindowHandle) -> Option<Rect> {
        let mut rc = RECT::default();
        unsafe { GetWindowRect(to_hwnd(window), &mut rc) }.ok()?;
        Some(Rect::new(rc.left, rc.top, rc.right, rc.bottom))
    }

    fn monitor_at(&self, point: Point) -> Option<MonitorId> {
        let monitor = unsafe { MonitorFromPoint(to_point(point), MONITOR_DEFAULTTONULL) };
        if monitor.0.is_null() {
            return None;
        }
        Some(MonitorId(monitor.0 as isize))
    }

    fn monitors(&self) -> Vec<(MonitorId, Rect)> {
        unsafe extern "system" fn enum_proc(
            monitor: HMONITOR,
            _hdc: HDC,
            _rect: *mut RECT,
            data: LPARAM,
        ) -> BOOL {
            let monitors = unsafe { &mut *(data.0 as *mut Vec<(MonitorId, Rect)>) };
            let mut info = MONITORINFO {
                cbSize: mem::size_of::<MONITORINFO>() as u32,
                ..Default::default()
            };
            if unsafe { GetMonitorInfoW(monitor, &mut info) }.as_bool() {
                let rc = info.rcMonitor;
                monitors.push((
                    MonitorId(monitor.0 as isize),
                    Rect::new(rc.left, rc.top, rc.right, rc.bottom),
                ));
            }
            BOOL(1)
        }

        let mut monitors: Vec<(MonitorId, Rect)> = Vec::new();
        unsafe {
            let _ = EnumDisplayMonitors(
                HDC::default(),
                None,
                Some(enum_proc),
                LPARAM(&mut monitors as *mut Vec<(MonitorId, Rect)> as isize),
            );
        }
        monitors
    }
}

impl WheelOutput for WindowsDesktop {
    fn inject(&self, axis: WheelAxis, delta: i32) {
        let flags = match axis {
            WheelAxis::Vertical => MOUSEEVENTF_WHEEL,
            WheelAxis::Horizontal => MOUSEEVENTF_HWHEEL,
        };
        let input = [INPUT {
            r#type: INPUT_MOUSE,
            Anonymous: INPUT_0 {
                mi: MOUSEINPUT {
                    dx: 0,
                    dy: 0,
                    mouseData: i32::from(wheel_delta(delta)) as u32,
                    dwFlags: flags,
                    time: 0,
                    dwExtraInfo: injection_tag(),
                },
            },
        }];
        let sent = unsafe { SendInput(&input, mem::size_of::<INPUT>() as i32) };
        if sent == 0 {
            log::trace!("SendInput rejected a wheel event");
        }
    }
}

impl MirrorOutput for WindowsDesktop {
    fn post(&self, target: &MirrorTarget, axis: WheelAxis, delta: i32) {
        let message = match axis {
            WheelAxis::Vertical => WM_MOUSEWHEEL,
            WheelAxis::Horizontal => WM_MOUSEHWHEEL,
        };
        // High word carries the signed delta; the low word (key state) stays empty.
        let delta = wheel_delta(delta);
        let wparam = WPARAM((delta as u16 as usize) << 16);
        let x = target.probe.x as i16 as u16 as u32;
        let y = target.probe.y as i16 as u16 as u32;
        let lparam = LPARAM(((y << 16) | x) as i32 as isize);

        // A window that closed mid-session just drops the message.
        let _ = unsafe { PostMessageW(to_hwnd(target.window), message, wparam, lparam) };
    }
}

fn mouse_kind(message: u32, mouse_data: u32) -> Option<InputKind> {
    let kind = match message {
        WM_MOUSEMOVE => InputKind::PointerMove,
        WM_LBUTTONDOWN => InputKind::ButtonDown(MouseButton::Left),
        WM_LBUTTONUP => InputKind::ButtonUp(MouseButton::Left),
        WM_RBUTTONDOWN => InputKind::ButtonDown(MouseButton::Right),
        WM_RBUTTONUP => InputKind::ButtonUp(MouseButton::Right),
        WM_MBUTTONDOWN => InputKind::ButtonDown(MouseButton::Middle),
        WM_MBUTTONUP => InputKind::ButtonUp(MouseButton::Middle),
        WM_XBUTTONDOWN | WM_XBUTTONUP => {
            let button = match hiword(mouse_data) {
                XBUTTON1 => MouseButton::X1,
                XBUTTON2 => MouseButton::X2,
                _ => return None,
            };
            if message == WM_XBUTTONDOWN {
                InputKind::ButtonDown(button)
            } else {
                InputKind::ButtonUp(button)
            }
        }
        WM_MOUSEWHEEL => InputKind::WheelDelta(i32::from(hiword(mouse_data) as u16 as i16)),
        _ => return None,
    };
    Some(kind)
}

fn key_kind(message: u32, vk_code: u32) -> Option<InputKind> {
    match message {
        WM_KEYDOWN | WM_SYSKEYDOWN => Some(InputKind::KeyDown(KeyCode(vk_code))),
        WM_KEYUP | WM_SYSKEYUP => Some(InputKind::KeyUp(KeyCode(vk_code))),
        _ => None,
    }
}

/// Runs the handler for one event. Returns whether it was consumed.
fn dispatch(mut event: InputEvent) -> bool {
    let Some(handler) = HANDLER.get() else {
        return false;
    };
    let mut handler = handler.lock().unwrap_or_else(PoisonError::into_inner);
    handler.handle(&mut event);
    event.consumed
}

fn finish_hook(result: std::thread::Result<bool>, source: &str) -> bool {
    match result {
        Ok(consumed) => consumed,
        Err(error) => {
            let message = if let Some(message) = error.downcast_ref::<&str>() {
                (*message).to_string()
            } else if let Some(message) = error.downcast_ref::<String>() {
                message.clone()
            } else {
                "unknown panic".to_string()
            };
            log_error!("{} hook handler panicked: {}", source, message);
            false
        }
    }
}

unsafe extern "system" fn mouse_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code != HC_ACTION as i32 {
        return CallNextHookEx(None, code, wparam, lparam);
    }

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let data = &*(lparam.0 as *const MSLLHOOKSTRUCT);
        if data.dwExtraInfo == injection_tag() {
            return false;
        }
        let Some(kind) = mouse_kind(wparam.0 as u32, data.mouseData) else {
            return false;
        };
        dispatch(InputEvent::new(kind, Point::new(data.pt.x, data.pt.y)))
    }));

    if finish_hook(result, "Mouse") {
        return LRESULT(1);
    }
    CallNextHookEx(None, code, wparam, lparam)
}

unsafe extern "system" fn keyboard_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code != HC_ACTION as i32 {
        return CallNextHookEx(None, code, wparam, lparam);
    }

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let data = &*(lparam.0 as *const KBDLLHOOKSTRUCT);
        if data.dwExtraInfo == injection_tag() {
            return false;
        }
        let Some(kind) = key_kind(wparam.0 as u32, data.vkCode) else {
            return false;
        };
        dispatch(InputEvent::new(kind, Point::default()))
    }));

    if finish_hook(result, "Keyboard") {
        return LRESULT(1);
    }
    CallNextHookEx(None, code, wparam, lparam)
}

/// Installs the global mouse and keyboard hooks and pumps messages on the
/// calling thread until `stop_input_hooks` is called.
///
/// One hook failing is logged and tolerated; both failing is an error.
pub fn run_input_hooks(handler: Box<dyn InputHandler>) -> Result<()> {
    HANDLER
        .set(Mutex::new(handler))
        .map_err(|_| anyhow!("input hooks are already running"))?;
    HOOK_THREAD.store(unsafe { GetCurrentThreadId() }, Ordering::SeqCst);

    let mouse = unsafe { SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_proc), None, 0) };
    let keyboard = unsafe { SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_proc), None, 0) };
    match (&mouse, &keyboard) {
        (Err(mouse_err), Err(keyboard_err)) => {
            bail!("failed to install input hooks (mouse: {mouse_err}, keyboard: {keyboard_err})")
        }
        (Err(err), Ok(_)) => log_warn!("Mouse hook unavailable ({}); only key triggers will work", err),
        (Ok(_), Err(err)) => log_warn!("Keyboard hook unavailable ({}); only button triggers will work", err),
        (Ok(_), Ok(_)) => log_info!("Input hooks installed"),
    }

    let mut msg = MSG::default();
    loop {
        let result = unsafe { GetMessageW(&mut msg, HWND(std::ptr::null_mut()), 0, 0) };
        if result.0 <= 0 || msg.message == WM_QUIT {
            break;
        }
        unsafe {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }

    for hook in [mouse.ok(), keyboard.ok()].into_iter().flatten() {
        unsafe {
            let _ = UnhookWindowsHookEx(hook);
        }
    }
    log_info!("Input hooks removed");
    Ok(())
}

/// Ends the message loop started by `run_input_hooks`. Safe from any thread.
pub fn stop_input_hooks() {
    let thread = HOOK_THREAD.load(Ordering::SeqCst);
    if thread == 0 {
        return;
    }
    unsafe {
        let _ = PostThreadMessageW(thread, WM_QUIT, WPARAM(0), LPARAM(0));
    }
}
