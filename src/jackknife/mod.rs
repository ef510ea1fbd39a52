//! Delete-one-region jackknife standard errors.

mod estimator;
mod regions;
mod statistic;

pub use estimator::{JackknifeResult, estimate, estimate_with};
pub use regions::{GridAxes, JackknifeOptions, RegionAssignment, RegionPolicy};
pub use statistic::{RecordStatistic, Statistic, mean, median};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JackknifeError {
    #[error("jackknife needs at least 2 regions, got {count}")]
    InsufficientRegions { count: usize },
    #[error("record {index} has region label {label}, outside 0..{region_count}")]
    RegionOutOfRange {
        index: usize,
        label: usize,
        region_count: usize,
    },
    #[error("record {index} has no region label")]
    MissingRegion { index: usize },
    #[error("sample is empty")]
    EmptySample,
    #[error("region {region} holds every record; removing it leaves nothing to evaluate")]
    EmptyRegion { region: usize },
    #[error("{records} records but {labels} region labels")]
    LengthMismatch { records: usize, labels: usize },
    #[error("statistic on the full sample is not finite ({value})")]
    NonFiniteFullStatistic { value: f64 },
    #[error("statistic with region {region} removed is not finite ({value})")]
    NonFiniteReplicate { region: usize, value: f64 },
    #[error("{policy} policy needs exactly {expected} regions, got {found}")]
    PolicyRegionCount {
        policy: &'static str,
        expected: usize,
        found: usize,
    },
}
