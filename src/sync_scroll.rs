//! Sync-scroll: finds secondary windows that mirror every wheel step.

use std::sync::Arc;

use crate::{
    models::{Point, WheelAxis, WindowHandle},
    platform::{DesktopProbe, MirrorOutput},
};

/// How far outside the active window's edges to look for a neighbour.
const SIDE_PROBE_OFFSET: i32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirrorTarget {
    pub window: WindowHandle,
    /// Screen point the target was found at; posted wheel messages carry it
    /// as their cursor position.
    pub probe: Point,
}

pub struct MirrorScanner {
    desktop: Arc<dyn DesktopProbe>,
}

impl MirrorScanner {
    pub fn new(desktop: Arc<dyn DesktopProbe>) -> Self {
        Self { desktop }
    }

    /// Collects mirror targets for a session anchored at `anchor`: the window
    /// at the center of every other monitor, plus the windows immediately
    /// left and right of the active window on the anchor's monitor.
    pub fn scan(&self, anchor: Point) -> Vec<MirrorTarget> {
        let mut targets: Vec<MirrorTarget> = Vec::new();
        let active = self.desktop.window_at(anchor);
        let anchor_monitor = self.desktop.monitor_at(anchor);

        let push = |targets: &mut Vec<MirrorTarget>, window: WindowHandle, probe: Point| {
            if Some(window) == active || targets.iter().any(|t| t.window == window) {
                return;
            }
            targets.push(MirrorTarget { window, probe });
        };

        for (monitor, bounds) in self.desktop.monitors() {
            if Some(monitor) == anchor_monitor {
                continue;
            }
            let center = bounds.center();
            if let Some(window) = self.desktop.window_at(center) {
                push(&mut targets, window, center);
            }
        }

        let Some(active) = active else {
            return targets;
        };
        let Some(rect) = self.desktop.window_rect(active) else {
            return targets;
        };

        let center_y = rect.top + rect.height() / 2;
        let probes = [
            Point::new(rect.left - SIDE_PROBE_OFFSET, center_y),
            Point::new(rect.right + SIDE_PROBE_OFFSET, center_y),
        ];
        for probe in probes {
            let probe_monitor = self.desktop.monitor_at(probe);
            if anchor_monitor.is_some() && probe_monitor != anchor_monitor {
                continue;
            }
            if let Some(window) = self.desktop.window_at(probe) {
                push(&mut targets, window, probe);
            }
        }

        targets
    }
}

/// Posts one wheel step to every mirror target.
pub fn fan_out(output: &dyn MirrorOutput, targets: &[MirrorTarget], axis: WheelAxis, delta: i32) {
    for target in targets {
        output.post(target, axis, delta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Rect;
    use crate::platform::fakes::{FakeDesktop, RecordingOutput};
    use pretty_assertions::assert_eq;

    fn dual_monitor_desktop() -> FakeDesktop {
        FakeDesktop::default()
            // Primary monitor: editor in the middle, docs to the left, terminal to the right.
            .with_window(1, Rect::new(600, 0, 1300, 1080), 100)
            .with_window(2, Rect::new(0, 0, 600, 1080), 200)
            .with_window(3, Rect::new(1300, 0, 1920, 1080), 300)
            // Secondary monitor, one maximized window.
            .with_window(4, Rect::new(1920, 0, 3840, 1080), 400)
            .with_monitor(10, Rect::new(0, 0, 1920, 1080))
            .with_monitor(11, Rect::new(1920, 0, 3840, 1080))
    }

    #[test]
    fn finds_other_monitors_and_side_windows() {
        let scanner = MirrorScanner::new(Arc::new(dual_monitor_desktop()));
        let targets = scanner.scan(Point::new(900, 500));

        assert_eq!(
            targets,
            vec![
                MirrorTarget {
                    window: WindowHandle(4),
                    probe: Point::new(2880, 540),
                },
                MirrorTarget {
                    window: WindowHandle(2),
                    probe: Point::new(550, 540),
                },
                MirrorTarget {
                    window: WindowHandle(3),
                    probe: Point::new(1350, 540),
                },
            ]
        );
    }

    #[test]
    fn side_probes_stay_on_the_anchor_monitor() {
        let scanner = MirrorScanner::new(Arc::new(dual_monitor_desktop()));
        // Terminal's right edge touches the secondary monitor; that probe is skipped
        // and the secondary window is only found through its monitor center.
        let targets = scanner.scan(Point::new(1500, 500));
        let windows: Vec<WindowHandle> = targets.iter().map(|t| t.window).collect();
        assert_eq!(windows, vec![WindowHandle(4), WindowHandle(1)]);
    }

    #[test]
    fn empty_desktop_has_no_targets() {
        let scanner = MirrorScanner::new(Arc::new(FakeDesktop::default()));
        assert!(scanner.scan(Point::new(10, 10)).is_empty());
    }

    #[test]
    fn fan_out_posts_to_every_target() {
        let output = RecordingOutput::default();
        let targets = [
            MirrorTarget {
                window: WindowHandle(7),
                probe: Point::new(1, 2),
            },
            MirrorTarget {
                window: WindowHandle(8),
                probe: Point::new(3, 4),
            },
        ];
        fan_out(&output, &targets, WheelAxis::Vertical, -3);
        let totals = output.posted_by_window();
        assert_eq!(totals.get(&WindowHandle(7)), Some(&-3));
        assert_eq!(totals.get(&WindowHandle(8)), Some(&-3));
    }
}
