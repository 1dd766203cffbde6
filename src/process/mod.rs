pub mod classifier;
pub mod lookup;

pub use classifier::{ProcessClassifier, Verdict};
pub use lookup::{ProcessLookup, SysinfoLookup};

/// Executable name of this tool; always blocked in whitelist mode so the
/// tool never scrolls its own windows.
pub const OWN_PROCESS_NAME: &str = "flowwheel";

/// Canonical form for comparing process names: trimmed, lower-case, without
/// a trailing `.exe`.
pub fn normalize_process_name(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    match lower.strip_suffix(".exe") {
        Some(stem) => stem.to_string(),
        None => lower,
    }
}
