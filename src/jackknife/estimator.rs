use std::fmt;

use serde::Serialize;

use super::statistic::Statistic;
use super::{JackknifeError, RegionAssignment};

/// Output of a delete-one-region jackknife run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JackknifeResult {
    /// Statistic over the whole sample.
    pub full_statistic: f64,
    /// `replicates[k]` is the statistic with region `k` removed.
    pub replicates: Vec<f64>,
    pub jackknife_mean: f64,
    pub variance: f64,
    pub standard_error: f64,
    pub region_sizes: Vec<usize>,
}

impl JackknifeResult {
    #[must_use]
    pub fn region_count(&self) -> usize {
        self.replicates.len()
    }

    /// `K * full - (K - 1) * mean`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn bias_corrected(&self) -> f64 {
        let k = self.region_count() as f64;
        k * self.full_statistic - (k - 1.0) * self.jackknife_mean
    }
}

impl fmt::Display for JackknifeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match f.precision() {
            Some(p) => write!(f, "{:.p$} ± {:.p$}", self.full_statistic, self.standard_error),
            None => write!(f, "{} ± {}", self.full_statistic, self.standard_error),
        }
    }
}

struct FnStatistic<F>(F);

impl<T, F> Statistic<T> for FnStatistic<F>
where
    F: Fn(&[&T]) -> f64 + Sync,
{
    fn evaluate(&self, sample: &[&T]) -> f64 {
        (self.0)(sample)
    }
}

/// Jackknife estimate of `statistic` over `records` split by `assignment`.
///
/// `statistic` must be pure: it is called once on the full sample and once
/// per region on the remainder, possibly from several threads.
///
/// # Errors
/// See [`estimate_with`].
pub fn estimate<T, F>(
    records: &[T],
    assignment: &RegionAssignment,
    statistic: F,
) -> Result<JackknifeResult, JackknifeError>
where
    T: Sync,
    F: Fn(&[&T]) -> f64 + Sync,
{
    estimate_with(records, assignment, &FnStatistic(statistic))
}

/// Jackknife estimate using a [`Statistic`] implementation.
///
/// # Errors
/// - [`JackknifeError::EmptySample`] for no records.
/// - [`JackknifeError::LengthMismatch`] if the assignment does not cover
///   exactly the records.
/// - [`JackknifeError::EmptyRegion`] if removing one region leaves nothing.
/// - [`JackknifeError::NonFiniteFullStatistic`] and
///   [`JackknifeError::NonFiniteReplicate`] if the statistic yields NaN or
///   an infinity.
pub fn estimate_with<T, S>(
    records: &[T],
    assignment: &RegionAssignment,
    statistic: &S,
) -> Result<JackknifeResult, JackknifeError>
where
    T: Sync,
    S: Statistic<T> + ?Sized,
{
    if records.is_empty() {
        return Err(JackknifeError::EmptySample);
    }
    if assignment.len() != records.len() {
        return Err(JackknifeError::LengthMismatch {
            records: records.len(),
            labels: assignment.len(),
        });
    }

    let region_sizes = assignment.region_sizes();
    if let Some(region) = region_sizes.iter().position(|&size| size == records.len()) {
        return Err(JackknifeError::EmptyRegion { region });
    }
    let empty: Vec<usize> = (0..region_sizes.len()).filter(|&k| region_sizes[k] == 0).collect();
    if !empty.is_empty() {
        log::warn!(
            "jackknife regions {empty:?} have no members; their replicates equal the full statistic"
        );
    }

    let everything: Vec<&T> = records.iter().collect();
    let full_statistic = statistic.evaluate(&everything);
    if !full_statistic.is_finite() {
        return Err(JackknifeError::NonFiniteFullStatistic {
            value: full_statistic,
        });
    }

    let replicates = replicates(records, assignment, statistic);
    if let Some((region, &value)) = replicates.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(JackknifeError::NonFiniteReplicate { region, value });
    }

    let (jackknife_mean, variance) = moments(&replicates);
    log::debug!(
        "jackknife over {} regions: full={full_statistic} mean={jackknife_mean} \
         variance={variance}",
        replicates.len()
    );

    Ok(JackknifeResult {
        full_statistic,
        replicates,
        jackknife_mean,
        variance,
        standard_error: variance.sqrt(),
        region_sizes,
    })
}

/// Mean and `(K - 1) / K` scaled sum of squared deviations.
///
/// The mean is accumulated as offsets from the first replicate so identical
/// replicates give a variance of exactly zero.
#[allow(clippy::cast_precision_loss)]
fn moments(replicates: &[f64]) -> (f64, f64) {
    let k = replicates.len() as f64;
    let anchor = replicates[0];
    let mean = anchor + replicates.iter().map(|r| r - anchor).sum::<f64>() / k;
    let spread: f64 = replicates.iter().map(|r| (r - mean) * (r - mean)).sum();
    (mean, (k - 1.0) / k * spread)
}

fn leave_out<'a, T>(records: &'a [T], labels: &[usize], region: usize) -> Vec<&'a T> {
    records
        .iter()
        .zip(labels)
        .filter(|(_, label)| **label != region)
        .map(|(record, _)| record)
        .collect()
}

cfg_if::cfg_if! {
    if #[cfg(feature = "parallel")] {
        use rayon::prelude::*;

        fn replicates<T, S>(records: &[T], assignment: &RegionAssignment, statistic: &S) -> Vec<f64>
        where
            T: Sync,
            S: Statistic<T> + ?Sized,
        {
            (0..assignment.region_count())
                .into_par_iter()
                .map(|k| statistic.evaluate(&leave_out(records, assignment.labels(), k)))
                .collect()
        }
    } else {
        fn replicates<T, S>(records: &[T], assignment: &RegionAssignment, statistic: &S) -> Vec<f64>
        where
            T: Sync,
            S: Statistic<T> + ?Sized,
        {
            (0..assignment.region_count())
                .map(|k| statistic.evaluate(&leave_out(records, assignment.labels(), k)))
                .collect()
        }
    }
}
