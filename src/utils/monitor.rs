#[cfg(feature = "cli")]
use std::sync::Mutex;
use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

#[derive(Debug, Clone)]
pub struct PhaseStats {
    pub phase: String,
    pub elapsed: Duration,
    pub memory_usage_mb: Option<u64>,
}

/// Tracks elapsed time per ingestion phase, plus process memory when built with `cli`.
pub struct SystemMonitor {
    enabled: bool,
    start_time: Instant,
    phase_start: std::sync::Mutex<Instant>,
    #[cfg(feature = "cli")]
    system: Mutex<System>,
    #[cfg(feature = "cli")]
    pid: Option<Pid>,
    #[cfg(feature = "cli")]
    peak_memory_mb: Mutex<u64>,
}

impl SystemMonitor {
    pub fn new(enabled: bool) -> Self {
        let now = Instant::now();
        Self {
            enabled,
            start_time: now,
            phase_start: std::sync::Mutex::new(now),
            #[cfg(feature = "cli")]
            system: Mutex::new(System::new()),
            #[cfg(feature = "cli")]
            pid: sysinfo::get_current_pid().ok(),
            #[cfg(feature = "cli")]
            peak_memory_mb: Mutex::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Closes the current phase and returns its stats; the next phase starts now.
    pub fn finish_phase(&self, phase: &str) -> Option<PhaseStats> {
        if !self.enabled {
            return None;
        }

        let now = Instant::now();
        let elapsed = {
            let mut start = self.phase_start.lock().ok()?;
            let elapsed = now.duration_since(*start);
            *start = now;
            elapsed
        };

        Some(PhaseStats {
            phase: phase.to_string(),
            elapsed,
            memory_usage_mb: self.memory_usage_mb(),
        })
    }

    pub fn log_stats(&self, phase: &str) {
        if let Some(stats) = self.finish_phase(phase) {
            match stats.memory_usage_mb {
                Some(memory) => tracing::info!(
                    "📊 {} - Time: {:?}, Memory: {}MB",
                    stats.phase,
                    stats.elapsed,
                    memory
                ),
                None => tracing::info!("📊 {} - Time: {:?}", stats.phase, stats.elapsed),
            }
        }
    }

    pub fn log_final_stats(&self) {
        if !self.enabled {
            return;
        }
        match self.peak_memory_mb() {
            Some(peak) => tracing::info!(
                "📊 Final Stats - Total Time: {:?}, Peak Memory: {}MB",
                self.start_time.elapsed(),
                peak
            ),
            None => tracing::info!("📊 Final Stats - Total Time: {:?}", self.start_time.elapsed()),
        }
    }

    #[cfg(feature = "cli")]
    fn memory_usage_mb(&self) -> Option<u64> {
        let pid = self.pid?;
        let mut system = self.system.lock().ok()?;
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        let memory_mb = system.process(pid)?.memory() / 1024 / 1024;

        let mut peak = self.peak_memory_mb.lock().ok()?;
        if memory_mb > *peak {
            *peak = memory_mb;
        }
        Some(memory_mb)
    }

    #[cfg(not(feature = "cli"))]
    fn memory_usage_mb(&self) -> Option<u64> {
        None
    }

    #[cfg(feature = "cli")]
    fn peak_memory_mb(&self) -> Option<u64> {
        self.peak_memory_mb.lock().ok().map(|peak| *peak)
    }

    #[cfg(not(feature = "cli"))]
    fn peak_memory_mb(&self) -> Option<u64> {
        None
    }
}

impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_monitor_reports_nothing() {
        let monitor = SystemMonitor::default();
        assert!(!monitor.is_enabled());
        assert!(monitor.finish_phase("convert").is_none());
    }

    #[test]
    fn test_phases_are_timed_separately() {
        let monitor = SystemMonitor::new(true);
        std::thread::sleep(Duration::from_millis(5));
        let first = monitor.finish_phase("convert").unwrap();
        let second = monitor.finish_phase("assemble").unwrap();

        assert_eq!(first.phase, "convert");
        assert!(first.elapsed >= Duration::from_millis(5));
        assert!(second.elapsed <= first.elapsed + Duration::from_secs(1));
    }
}
