use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Resolves a process id to its executable name.
pub trait ProcessLookup: Send {
    fn process_name(&mut self, pid: u32) -> Option<String>;
}

/// `sysinfo`-backed lookup that refreshes only the requested pid.
pub struct SysinfoLookup {
    system: System,
}

impl SysinfoLookup {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SysinfoLookup {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessLookup for SysinfoLookup {
    fn process_name(&mut self, pid: u32) -> Option<String> {
        let pid = Pid::from_u32(pid);
        self.system
            .refresh_processes_specifics(ProcessesToUpdate::Some(&[pid]), ProcessRefreshKind::new());

        let name = self.system.process(pid)?.name().to_string_lossy().into_owned();
        (!name.is_empty()).then_some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_own_process() {
        let mut lookup = SysinfoLookup::new();
        let name = lookup.process_name(std::process::id());
        assert!(name.is_some());
    }
}
