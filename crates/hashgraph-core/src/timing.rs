//! Opt-in latency sampling for the graph's hot phases.
//!
//! Disabled by default; the check on the fast path is a single relaxed
//! atomic load. Enable with [`set_enabled`] or `HASHGRAPH_TIMING=1`.
//! Samples are kept per thread, so a report only covers work done on the
//! calling thread.

use std::cell::RefCell;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde_json::json;

/// Environment variable that turns sampling on.
pub const TIMING_ENV: &str = "HASHGRAPH_TIMING";

/// An instrumented phase of graph maintenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    AddVertex,
    TopoSort,
    BitsetBuild,
    Lca,
    Linearize,
}

impl Phase {
    const COUNT: usize = 5;

    const ALL: [Self; Self::COUNT] = [
        Self::AddVertex,
        Self::TopoSort,
        Self::BitsetBuild,
        Self::Lca,
        Self::Linearize,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AddVertex => "add_vertex",
            Self::TopoSort => "topo_sort",
            Self::BitsetBuild => "bitset_build",
            Self::Lca => "lca",
            Self::Linearize => "linearize",
        }
    }

    const fn slot(self) -> usize {
        self as usize
    }
}

/// Summary statistics for one phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTiming {
    pub phase: Phase,
    pub count: usize,
    pub total: Duration,
    pub max: Duration,
    pub p50: Duration,
    pub p95: Duration,
}

/// Snapshot of every phase that recorded at least one sample.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TimingReport {
    pub phases: Vec<PhaseTiming>,
}

static ENABLED: AtomicBool = AtomicBool::new(false);

thread_local! {
    static SAMPLES: RefCell<[Vec<Duration>; Phase::COUNT]> =
        const { RefCell::new([Vec::new(), Vec::new(), Vec::new(), Vec::new(), Vec::new()]) };
}

/// Turn sampling on or off. Turning it off discards this thread's samples.
pub fn set_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
    if !enabled {
        reset();
    }
}

/// Enable sampling when `HASHGRAPH_TIMING` is set to a truthy value.
/// Returns the resulting state.
pub fn init_from_env() -> bool {
    let enabled = std::env::var(TIMING_ENV)
        .ok()
        .is_some_and(|raw| parse_flag(&raw));
    if enabled {
        set_enabled(true);
    }
    enabled
}

#[must_use]
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Drop this thread's samples.
pub fn reset() {
    SAMPLES.with(|s| s.borrow_mut().iter_mut().for_each(Vec::clear));
}

/// Run `f`, recording its wall time under `phase` when sampling is enabled.
pub fn measure<R>(phase: Phase, f: impl FnOnce() -> R) -> R {
    if !is_enabled() {
        return f();
    }
    let start = Instant::now();
    let out = f();
    push(phase, start.elapsed());
    out
}

/// Drain this thread's samples into a report.
#[must_use]
pub fn take_report() -> TimingReport {
    let drained = SAMPLES.with(|s| std::mem::take(&mut *s.borrow_mut()));
    let phases = Phase::ALL
        .into_iter()
        .zip(drained)
        .filter(|(_, samples)| !samples.is_empty())
        .map(|(phase, mut samples)| {
            samples.sort_unstable();
            PhaseTiming {
                phase,
                count: samples.len(),
                total: samples.iter().sum(),
                max: samples.last().copied().unwrap_or_default(),
                p50: nearest_rank(&samples, 50),
                p95: nearest_rank(&samples, 95),
            }
        })
        .collect();
    TimingReport { phases }
}

impl TimingReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    #[must_use]
    pub fn get(&self, phase: Phase) -> Option<&PhaseTiming> {
        self.phases.iter().find(|p| p.phase == phase)
    }

    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let phases: Vec<_> = self
            .phases
            .iter()
            .map(|p| {
                json!({
                    "phase": p.phase.as_str(),
                    "count": p.count,
                    "total_us": p.total.as_micros(),
                    "max_us": p.max.as_micros(),
                    "p50_us": p.p50.as_micros(),
                    "p95_us": p.p95.as_micros(),
                })
            })
            .collect();
        json!({ "phases": phases })
    }

    /// Fixed-width table for terminal output.
    #[must_use]
    pub fn render(&self) -> String {
        if self.is_empty() {
            return "no timing samples\n".to_string();
        }
        let mut out = format!(
            "{:<14} {:>7} {:>10} {:>10} {:>10}\n",
            "phase", "count", "p50", "p95", "max"
        );
        for p in &self.phases {
            let _ = writeln!(
                out,
                "{:<14} {:>7} {:>10} {:>10} {:>10}",
                p.phase.as_str(),
                p.count,
                fmt_micros(p.p50),
                fmt_micros(p.p95),
                fmt_micros(p.max),
            );
        }
        out
    }
}

fn push(phase: Phase, elapsed: Duration) {
    SAMPLES.with(|s| s.borrow_mut()[phase.slot()].push(elapsed));
}

fn nearest_rank(sorted: &[Duration], pct: usize) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let rank = (pct.min(100) * sorted.len()).div_ceil(100);
    sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
}

fn fmt_micros(d: Duration) -> String {
    let us = d.as_micros();
    if us >= 1_000 {
        format!("{}.{:03}ms", us / 1_000, us % 1_000)
    } else {
        format!("{us}us")
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
