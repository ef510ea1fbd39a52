//! Scalar statistics over tracer records.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::index::TracerRecord;

/// A pure scalar summary of a sample, evaluated once per jackknife replicate.
pub trait Statistic<T>: Sync {
    fn evaluate(&self, sample: &[&T]) -> f64;
}

/// Ready-made summaries of distance and arc-length columns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "radius", rename_all = "kebab-case")]
pub enum RecordStatistic {
    MeanDistance,
    MedianDistance,
    #[serde(rename = "mean-position")]
    MeanArcLength,
    #[serde(rename = "median-position")]
    MedianArcLength,
    /// Share of tracers closer than the radius (Mpc).
    FractionWithin(f64),
}

impl RecordStatistic {
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::MeanDistance => "mean-distance".to_owned(),
            Self::MedianDistance => "median-distance".to_owned(),
            Self::MeanArcLength => "mean-position".to_owned(),
            Self::MedianArcLength => "median-position".to_owned(),
            Self::FractionWithin(radius) => format!("fraction-within:{radius}"),
        }
    }
}

impl Statistic<TracerRecord> for RecordStatistic {
    #[allow(clippy::cast_precision_loss)]
    fn evaluate(&self, sample: &[&TracerRecord]) -> f64 {
        match *self {
            Self::MeanDistance => mean(sample.iter().map(|r| r.distance)),
            Self::MedianDistance => median(sample.iter().map(|r| r.distance).collect()),
            Self::MeanArcLength => mean(sample.iter().map(|r| r.arc_length)),
            Self::MedianArcLength => median(sample.iter().map(|r| r.arc_length).collect()),
            Self::FractionWithin(radius) => {
                if sample.is_empty() {
                    return f64::NAN;
                }
                let inside = sample.iter().filter(|r| r.distance <= radius).count();
                inside as f64 / sample.len() as f64
            }
        }
    }
}

impl fmt::Display for RecordStatistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for RecordStatistic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(radius) = s.strip_prefix("fraction-within:") {
            let radius: f64 = radius
                .parse()
                .map_err(|e| format!("invalid radius `{radius}`: {e}"))?;
            if !radius.is_finite() || radius < 0.0 {
                return Err(format!("radius must be finite and non-negative, got {radius}"));
            }
            return Ok(Self::FractionWithin(radius));
        }
        match s {
            "mean-distance" => Ok(Self::MeanDistance),
            "median-distance" => Ok(Self::MedianDistance),
            "mean-position" => Ok(Self::MeanArcLength),
            "median-position" => Ok(Self::MedianArcLength),
            other => Err(format!(
                "unknown statistic `{other}` (expected mean-distance, median-distance, \
                 mean-position, median-position or fraction-within:<r>)"
            )),
        }
    }
}

/// Arithmetic mean; NaN for an empty input.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Median (average of the middle pair for even lengths); NaN for an empty input.
#[must_use]
pub fn median(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.sort_unstable_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) * 0.5
    } else {
        values[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Point3;
    use crate::index::FilamentId;

    fn record(distance: f64, arc_length: f64) -> TracerRecord {
        TracerRecord {
            tracer_index: 0,
            position: Point3::ORIGIN,
            filament: FilamentId(0),
            distance,
            arc_length,
            segment_index: 0,
            t: 0.0,
            closest_point: Point3::ORIGIN,
            region: None,
        }
    }

    #[test]
    fn record_statistics_summarise_columns() {
        let records = [record(1.0, 10.0), record(4.0, 2.0), record(2.0, 6.0), record(9.0, 0.0)];
        let sample: Vec<&TracerRecord> = records.iter().collect();

        assert_eq!(RecordStatistic::MeanDistance.evaluate(&sample), 4.0);
        assert_eq!(RecordStatistic::MedianDistance.evaluate(&sample), 3.0);
        assert_eq!(RecordStatistic::MeanArcLength.evaluate(&sample), 4.5);
        assert_eq!(RecordStatistic::MedianArcLength.evaluate(&sample), 4.0);
        assert_eq!(RecordStatistic::FractionWithin(2.0).evaluate(&sample), 0.5);
    }

    #[test]
    fn empty_sample_is_nan() {
        assert!(RecordStatistic::MeanDistance.evaluate(&[]).is_nan());
        assert!(RecordStatistic::FractionWithin(1.0).evaluate(&[]).is_nan());
    }

    #[test]
    fn names_round_trip_through_from_str() {
        for stat in [
            RecordStatistic::MeanDistance,
            RecordStatistic::MedianDistance,
            RecordStatistic::MeanArcLength,
            RecordStatistic::MedianArcLength,
            RecordStatistic::FractionWithin(2.5),
        ] {
            assert_eq!(stat.name().parse::<RecordStatistic>(), Ok(stat));
        }
        assert!("fraction-within:-1".parse::<RecordStatistic>().is_err());
        assert!("mode".parse::<RecordStatistic>().is_err());
    }
}
