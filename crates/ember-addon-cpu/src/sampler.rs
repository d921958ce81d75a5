//! CPU usage sampling
//!
//! Usage is derived from two snapshots of cumulative CPU time: the share of
//! non-idle time in the interval between them.

/// Cumulative CPU time counters, in clock ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuTimes {
    /// Idle time, including time waiting for I/O
    pub idle: u64,
    /// Total time across all states
    pub total: u64,
}

impl CpuTimes {
    /// Read the system-wide counters; `None` where unsupported.
    pub fn read() -> Option<Self> {
        #[cfg(target_os = "linux")]
        {
            let stat = std::fs::read_to_string("/proc/stat").ok()?;
            Self::parse_proc_stat(&stat)
        }
        #[cfg(not(target_os = "linux"))]
        {
            None
        }
    }

    /// Parse the aggregate `cpu` line of `/proc/stat`.
    ///
    /// Fields: user nice system idle iowait irq softirq steal [guest ...].
    /// Guest time is already counted in user time and is skipped.
    pub fn parse_proc_stat(stat: &str) -> Option<Self> {
        let line = stat.lines().find(|l| l.starts_with("cpu "))?;
        let fields: Vec<u64> = line
            .split_whitespace()
            .skip(1)
            .take(8)
            .map(str::parse)
            .collect::<Result<_, _>>()
            .ok()?;
        if fields.len() < 4 {
            return None;
        }
        let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
        Some(Self {
            idle,
            total: fields.iter().sum(),
        })
    }
}

/// Percentage of busy time between two snapshots, in `0.0..=100.0`
pub fn usage_between(prev: CpuTimes, next: CpuTimes) -> f64 {
    let total = next.total.saturating_sub(prev.total);
    if total == 0 {
        return 0.0;
    }
    let idle = next.idle.saturating_sub(prev.idle).min(total);
    (total - idle) as f64 * 100.0 / total as f64
}

/// Keeps the previous snapshot so each sample covers one interval.
#[derive(Debug, Default)]
pub struct CpuSampler {
    prev: Option<CpuTimes>,
}

impl CpuSampler {
    /// Take the baseline snapshot
    pub fn new() -> Self {
        Self {
            prev: CpuTimes::read(),
        }
    }

    /// Usage since the previous call (or since `new`). Reads `0.0` when
    /// counters are unavailable.
    pub fn sample(&mut self) -> f64 {
        let Some(next) = CpuTimes::read() else {
            return 0.0;
        };
        let usage = self.prev.map_or(0.0, |prev| usage_between(prev, next));
        self.prev = Some(next);
        usage
    }
}
