#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Tracer-to-filament distances and jackknife error bars for cosmic-web
//! filament statistics.
//!
//! Tracers are mapped onto the nearest of a set of filament spines
//! ([`DistanceIndex`]); statistics over the resulting [`TracerRecord`]s get a
//! delete-one-region jackknife standard error ([`jackknife::estimate`]).

pub mod geom;
pub mod index;
pub mod jackknife;
pub mod metrics;
pub mod parse;

use serde::{Deserialize, Serialize};

pub use geom::{FilamentSpine, GeometryError, Point3, SpineProjection};
pub use index::{
    DistanceIndex, DistanceOptions, FilamentId, IndexDiagnostics, IndexError, TracerRecord,
};
pub use jackknife::{
    JackknifeError, JackknifeOptions, JackknifeResult, RecordStatistic, RegionAssignment,
};
pub use metrics::{AnalysisMetrics, TimingBucket, TimingReport};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Jackknife(#[from] JackknifeError),
}

/// Configuration for a full mapping plus jackknife run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    pub distance: DistanceOptions,
    pub jackknife: JackknifeOptions,
}

/// One statistic with its jackknife error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticReport {
    pub name: String,
    #[serde(flatten)]
    pub result: JackknifeResult,
}

/// Everything a run produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub records: Vec<TracerRecord>,
    pub region_count: usize,
    pub statistics: Vec<StatisticReport>,
    pub diagnostics: IndexDiagnostics,
}

/// A reusable index plus run configuration.
#[derive(Debug, Clone)]
pub struct FilamentAnalysis {
    index: DistanceIndex,
    options: AnalysisOptions,
}

impl FilamentAnalysis {
    /// # Errors
    /// [`IndexError::NoFilaments`] or an invalid search radius.
    pub fn new(
        spines: Vec<FilamentSpine>,
        options: AnalysisOptions,
    ) -> Result<Self, AnalysisError> {
        Ok(Self {
            index: DistanceIndex::build(spines, options.distance)?,
            options,
        })
    }

    #[must_use]
    pub const fn index(&self) -> &DistanceIndex {
        &self.index
    }

    #[must_use]
    pub const fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    /// Maps `tracers`, labels them by the configured region policy and
    /// estimates every requested statistic.
    ///
    /// # Errors
    /// Any [`IndexError`] from mapping or [`JackknifeError`] from region
    /// assignment and estimation. Nothing is returned on partial failure.
    pub fn run(
        &self,
        tracers: &[Point3],
        statistics: &[RecordStatistic],
    ) -> Result<AnalysisReport, AnalysisError> {
        let (mut records, mut diagnostics) = self.index.compute_all_with_diagnostics(tracers)?;

        let mut metrics = AnalysisMetrics::default();
        metrics.begin();
        let regions = metrics.time(TimingBucket::RegionAssignment, || {
            self.options.jackknife.assign(tracers)
        })?;
        for (record, &label) in records.iter_mut().zip(regions.labels()) {
            record.region = Some(label);
        }

        let statistics = metrics.time(TimingBucket::Jackknife, || {
            statistics
                .iter()
                .map(|stat| {
                    jackknife::estimate_with(&records, &regions, stat).map(|result| {
                        StatisticReport {
                            name: stat.name(),
                            result,
                        }
                    })
                })
                .collect::<Result<Vec<_>, _>>()
        })?;

        if let Some(timing) = metrics.end() {
            let report = diagnostics.timing.get_or_insert_with(TimingReport::default);
            report.region_assignment_ns = timing.region_assignment_ns;
            report.jackknife_ns = timing.jackknife_ns;
        }

        log::debug!(
            "analysis finished: {} statistics over {} regions",
            statistics.len(),
            regions.region_count()
        );
        Ok(AnalysisReport {
            records,
            region_count: regions.region_count(),
            statistics,
            diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jackknife::{GridAxes, RegionPolicy};

    #[test]
    fn run_labels_records_and_reports_each_statistic() {
        let spine =
            FilamentSpine::from_coords(&[[0.0, 0.0, 0.0], [10.0, 0.0, 0.0]]).expect("spine");
        let options = AnalysisOptions {
            jackknife: JackknifeOptions {
                region_count: 2,
                policy: RegionPolicy::Grid { axes: GridAxes::Xy },
            },
            ..AnalysisOptions::default()
        };
        let analysis = FilamentAnalysis::new(vec![spine], options).expect("analysis");

        // K = 2 is a 1 x 2 grid, split along y.
        let tracers = [
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(3.0, 1.0, 0.0),
            Point3::new(5.0, 3.0, 0.0),
            Point3::new(7.0, 3.0, 0.0),
        ];
        let report = analysis
            .run(&tracers, &[RecordStatistic::MeanDistance, RecordStatistic::MeanArcLength])
            .expect("report");

        assert_eq!(report.region_count, 2);
        let labels: Vec<_> = report.records.iter().map(|r| r.region).collect();
        assert_eq!(labels, vec![Some(0), Some(0), Some(1), Some(1)]);

        assert_eq!(report.statistics[0].name, "mean-distance");
        assert_eq!(report.statistics[0].result.full_statistic, 2.0);
        assert_eq!(report.statistics[0].result.replicates, vec![3.0, 1.0]);
        assert_eq!(report.statistics[1].result.full_statistic, 4.0);
    }
}
