use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::time::Instant;

use crate::{
    models::Point,
    platform::DesktopProbe,
    settings::{ScrollSettings, SettingsStore},
};

use super::{normalize_process_name, ProcessLookup, OWN_PROCESS_NAME};

/// Bounds staleness from pid reuse while sparing a lookup per event.
const CACHE_TTL: Duration = Duration::from_secs(5);
const CACHE_PRUNE_THRESHOLD: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Blocked,
}

struct CachedName {
    name: String,
    fetched_at: Instant,
}

/// Decides whether auto-scroll may start over the window under a point.
///
/// Owned by the input-callback context; the cache has a single writer and
/// needs no locking.
pub struct ProcessClassifier {
    desktop: Arc<dyn DesktopProbe>,
    lookup: Box<dyn ProcessLookup>,
    settings: Arc<SettingsStore>,
    cache: HashMap<u32, CachedName>,
    own_pid: u32,
}

impl ProcessClassifier {
    pub fn new(
        desktop: Arc<dyn DesktopProbe>,
        lookup: Box<dyn ProcessLookup>,
        settings: Arc<SettingsStore>,
    ) -> Self {
        Self {
            desktop,
            lookup,
            settings,
            cache: HashMap::new(),
            own_pid: std::process::id(),
        }
    }

    /// Unresolvable windows are `Allowed`.
    pub fn classify(&mut self, point: Point) -> Verdict {
        let Some((pid, name)) = self.resolve(point) else {
            return Verdict::Allowed;
        };

        let settings = self.settings.snapshot();
        let verdict = evaluate(&settings, &name, pid == self.own_pid);
        log::debug!("Process '{}' (pid {}) classified {:?}", name, pid, verdict);
        verdict
    }

    fn resolve(&mut self, point: Point) -> Option<(u32, String)> {
        let window = self.desktop.window_at(point)?;
        let pid = self.desktop.window_process_id(window)?;
        if pid == 0 {
            return None;
        }
        let name = self.cached_name(pid)?;
        Some((pid, name))
    }

    fn cached_name(&mut self, pid: u32) -> Option<String> {
        let now = Instant::now();
        if let Some(entry) = self.cache.get(&pid) {
            if now.duration_since(entry.fetched_at) < CACHE_TTL {
                return Some(entry.name.clone());
            }
        }

        // Exited processes and access-denied lookups land here; not cached.
        let name = self.lookup.process_name(pid)?;

        if self.cache.len() >= CACHE_PRUNE_THRESHOLD {
            self.cache
                .retain(|_, entry| now.duration_since(entry.fetched_at) < CACHE_TTL);
        }
        self.cache.insert(
            pid,
            CachedName {
                name: name.clone(),
                fetched_at: now,
            },
        );
        Some(name)
    }
}

/// Pure gate decision for a resolved process.
pub fn evaluate(settings: &ScrollSettings, process_name: &str, is_self: bool) -> Verdict {
    let normalized = normalize_process_name(process_name);
    let listed = settings
        .app_profiles
        .iter()
        .any(|profile| profile.matches(&normalized));

    if settings.whitelist_mode {
        if is_self || normalized == OWN_PROCESS_NAME || !listed {
            return Verdict::Blocked;
        }
        return Verdict::Allowed;
    }

    if listed {
        Verdict::Blocked
    } else {
        Verdict::Allowed
    }
}
