//! Opt-in timing hooks for the analysis pipeline.
//!
//! Timing is collected only when the `metrics` feature is enabled. Otherwise
//! every call compiles down to running the wrapped closure.
//!
//! ```ignore
//! use filament_jackknife::{AnalysisMetrics, TimingBucket};
//!
//! let mut metrics = AnalysisMetrics::default();
//! metrics.begin();
//! let records = metrics.time(TimingBucket::Projection, || index.compute_all(&tracers))?;
//! if let Some(report) = metrics.end() {
//!     eprintln!("projection: {} ns", report.projection_ns);
//! }
//! ```

use serde::Serialize;

/// Phases of an analysis run that accumulate time separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimingBucket {
    /// Segment box collection and hierarchy construction.
    IndexBuild,
    /// Per-tracer nearest-filament queries.
    Projection,
    /// Jackknife region labelling.
    RegionAssignment,
    /// Full statistic plus leave-one-region-out replicates.
    Jackknife,
}

/// Cumulative nanoseconds per [`TimingBucket`].
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct TimingReport {
    pub index_build_ns: u64,
    pub projection_ns: u64,
    pub region_assignment_ns: u64,
    pub jackknife_ns: u64,
}

impl TimingReport {
    #[must_use]
    pub fn total_ns(&self) -> u64 {
        self.index_build_ns
            .saturating_add(self.projection_ns)
            .saturating_add(self.region_assignment_ns)
            .saturating_add(self.jackknife_ns)
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn total_ms(&self) -> f64 {
        self.total_ns() as f64 / 1_000_000.0
    }

    #[cfg(feature = "metrics")]
    fn add(&mut self, bucket: TimingBucket, nanos: u64) {
        let slot = match bucket {
            TimingBucket::IndexBuild => &mut self.index_build_ns,
            TimingBucket::Projection => &mut self.projection_ns,
            TimingBucket::RegionAssignment => &mut self.region_assignment_ns,
            TimingBucket::Jackknife => &mut self.jackknife_ns,
        };
        *slot = slot.saturating_add(nanos);
    }
}

/// Accumulator for timing analysis phases.
///
/// When the `metrics` feature is disabled all methods are no-ops and
/// [`end`](Self::end) returns `None`.
#[derive(Debug, Default)]
pub struct AnalysisMetrics {
    #[cfg(feature = "metrics")]
    report: TimingReport,
}

impl AnalysisMetrics {
    /// Resets all counters.
    pub fn begin(&mut self) {
        #[cfg(feature = "metrics")]
        {
            self.report = TimingReport::default();
        }
    }

    #[must_use]
    pub fn end(&self) -> Option<TimingReport> {
        #[cfg(feature = "metrics")]
        {
            Some(self.report.clone())
        }
        #[cfg(not(feature = "metrics"))]
        {
            None
        }
    }

    /// Runs `f`, adding its wall time to `bucket`.
    pub fn time<R>(&mut self, bucket: TimingBucket, f: impl FnOnce() -> R) -> R {
        #[cfg(feature = "metrics")]
        {
            let start = std::time::Instant::now();
            let result = f();
            let nanos = u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX);
            self.report.add(bucket, nanos);
            result
        }

        #[cfg(not(feature = "metrics"))]
        {
            let _ = bucket;
            f()
        }
    }
}
