//! Resident memory monitoring.
//!
//! Resident set size is read from `/proc/self/statm`; on platforms without
//! procfs the ceiling check is skipped and only scheduled collections run.

use std::fs;

const PAGE_SIZE: f64 = 4096.0;

/// Resident memory of this process in MiB, if the platform reports it.
pub fn resident_memory_mb() -> Option<f64> {
    let statm = fs::read_to_string("/proc/self/statm").ok()?;
    parse_statm_mb(&statm)
}

fn parse_statm_mb(statm: &str) -> Option<f64> {
    let pages: f64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some(pages * PAGE_SIZE / (1024.0 * 1024.0))
}

/// Why a collection is due.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CollectTrigger {
    /// The periodic schedule.
    Scheduled,
    /// Resident memory above the ceiling.
    OverLimit {
        /// Resident memory in MiB.
        resident_mb: f64,
    },
}

/// Decides when forced collections run.
#[derive(Debug, Clone, Copy)]
pub struct MemoryMonitor {
    gc_every: usize,
    limit_mb: Option<f64>,
}

impl MemoryMonitor {
    /// Collect every `gc_every` generations (0 disables) and whenever resident
    /// memory exceeds `limit_mb`.
    pub const fn new(gc_every: usize, limit_mb: Option<f64>) -> Self {
        Self { gc_every, limit_mb }
    }

    /// Whether generation `generation` should end with a collection.
    ///
    /// The memory ceiling takes precedence over the schedule.
    pub fn check(&self, generation: usize) -> Option<CollectTrigger> {
        self.check_with(generation, resident_memory_mb())
    }

    fn check_with(&self, generation: usize, resident: Option<f64>) -> Option<CollectTrigger> {
        if let (Some(limit), Some(resident_mb)) = (self.limit_mb, resident)
            && resident_mb > limit
        {
            return Some(CollectTrigger::OverLimit { resident_mb });
        }
        (self.gc_every > 0 && generation > 0 && generation % self.gc_every == 0)
            .then_some(CollectTrigger::Scheduled)
    }

    /// Whether resident memory is still above the ceiling.
    pub fn over_limit(&self) -> bool {
        match (self.limit_mb, resident_memory_mb()) {
            (Some(limit), Some(resident)) => resident > limit,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_statm() {
        let mb = parse_statm_mb("10000 2560 300 1 0 500 0\n").unwrap();
        assert_eq!(mb, 10.0);
        assert!(parse_statm_mb("garbage").is_none());
    }

    #[test]
    fn test_schedule() {
        let monitor = MemoryMonitor::new(5, None);
        assert_eq!(monitor.check_with(0, Some(1.0)), None);
        assert_eq!(monitor.check_with(5, Some(1.0)), Some(CollectTrigger::Scheduled));
        assert_eq!(monitor.check_with(6, Some(1.0)), None);
        assert_eq!(MemoryMonitor::new(0, None).check_with(10, None), None);
    }

    #[test]
    fn test_ceiling() {
        let monitor = MemoryMonitor::new(0, Some(100.0));
        assert_eq!(
            monitor.check_with(3, Some(150.0)),
            Some(CollectTrigger::OverLimit { resident_mb: 150.0 })
        );
        assert_eq!(monitor.check_with(3, Some(50.0)), None);
        assert_eq!(monitor.check_with(3, None), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_resident_memory_is_reported() {
        assert!(resident_memory_mb().unwrap() > 0.0);
    }
}
