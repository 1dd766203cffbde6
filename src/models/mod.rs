pub mod geometry;
pub mod input;

pub use geometry::{MonitorId, Point, Rect, WindowHandle};
pub use input::{InputEvent, InputKind, KeyCode, Modifiers, MouseButton, WheelAxis};
