//! Nearest-filament queries over a whole tracer catalog.
//!
//! Every segment of every spine goes into one bounding volume hierarchy. A
//! query walks it best-first and only skips nodes whose box is strictly
//! farther away than the best hit so far, so the pruned answer is the same
//! one an exhaustive scan produces, including tie-breaks.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::record::{FilamentId, TracerRecord};
use crate::geom::{
    BBox, Bvh, FilamentSpine, GeometryError, NearestCandidate, Point3, SpineProjection,
};
use crate::jackknife::RegionAssignment;
use crate::metrics::{AnalysisMetrics, TimingBucket, TimingReport};

/// Relative padding applied to segment boxes so rounding in the projection
/// never lands a closest point outside its box.
const BBOX_PAD: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IndexError {
    #[error("tracer catalog is empty")]
    EmptyCatalog,
    #[error("no filaments supplied; distance to nothing is undefined")]
    NoFilaments,
    #[error("tracer {index} has non-finite coordinates")]
    NonFiniteTracer { index: usize },
    #[error("max_distance must be finite and non-negative, got {0}")]
    InvalidMaxDistance(f64),
    #[error("region assignment covers {labels} tracers but the catalog has {tracers}")]
    RegionCountMismatch { tracers: usize, labels: usize },
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Search configuration for [`DistanceIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceOptions {
    /// Initial search radius in Mpc; `None` searches without a bound.
    ///
    /// Tracers with no segment inside the radius are searched again without
    /// it, so this never changes results.
    pub max_distance: Option<f64>,
    /// Use the segment hierarchy; `false` scans every segment.
    pub prune: bool,
    /// Maximum segments per hierarchy leaf.
    pub leaf_size: usize,
}

impl Default for DistanceOptions {
    fn default() -> Self {
        Self {
            max_distance: None,
            prune: true,
            leaf_size: Bvh::DEFAULT_LEAF_SIZE,
        }
    }
}

/// Counters gathered while mapping a catalog.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct IndexDiagnostics {
    pub tracer_count: usize,
    pub filament_count: usize,
    pub segment_count: usize,
    pub bvh_node_count: usize,
    /// Exact segment projections performed across all tracers.
    pub segments_evaluated: usize,
    /// Tracers that found nothing inside `max_distance` and were re-searched.
    pub unbounded_fallbacks: usize,
    pub timing: Option<TimingReport>,
    pub warnings: Vec<String>,
}

impl IndexDiagnostics {
    /// Fraction of exact segment evaluations avoided relative to a full scan.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn pruned_fraction(&self) -> f64 {
        let brute = self.tracer_count.saturating_mul(self.segment_count);
        if brute == 0 {
            return 0.0;
        }
        1.0 - self.segments_evaluated as f64 / brute as f64
    }

    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "tracers={} filaments={} segments={} evaluated={} pruned={:.1}% fallbacks={}",
            self.tracer_count,
            self.filament_count,
            self.segment_count,
            self.segments_evaluated,
            self.pruned_fraction() * 100.0,
            self.unbounded_fallbacks
        )
    }
}

/// Nearest spine for one query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilamentHit {
    pub filament: FilamentId,
    pub projection: SpineProjection,
}

impl FilamentHit {
    /// Smaller squared distance first, then lower filament id, then lower segment index.
    #[must_use]
    pub fn search_order(&self, other: &Self) -> Ordering {
        self.projection
            .distance_squared
            .total_cmp(&other.projection.distance_squared)
            .then_with(|| self.filament.cmp(&other.filament))
            .then_with(|| self.projection.segment_index.cmp(&other.projection.segment_index))
    }

    #[must_use]
    pub fn nearer(self, other: Self) -> Self {
        if other.search_order(&self) == Ordering::Less {
            other
        } else {
            self
        }
    }
}

impl NearestCandidate for FilamentHit {
    fn distance_squared(&self) -> f64 {
        self.projection.distance_squared
    }

    fn precedes(&self, other: &Self) -> bool {
        self.search_order(other) == Ordering::Less
    }
}

#[derive(Debug, Clone, Copy)]
struct SegmentRef {
    filament: usize,
    segment: usize,
}

#[derive(Debug, Clone, Copy)]
struct Located {
    hit: FilamentHit,
    evaluated: usize,
    fell_back: bool,
}

/// Immutable, shareable index over a set of filament spines.
#[derive(Debug, Clone)]
pub struct DistanceIndex {
    spines: Vec<FilamentSpine>,
    segment_refs: Vec<SegmentRef>,
    bvh: Option<Bvh>,
    options: DistanceOptions,
    build_timing: Option<TimingReport>,
}

impl DistanceIndex {
    /// Builds the index; the spines' positions become their [`FilamentId`]s.
    ///
    /// # Errors
    /// [`IndexError::NoFilaments`] for an empty list and
    /// [`IndexError::InvalidMaxDistance`] for a negative or non-finite radius.
    pub fn build(spines: Vec<FilamentSpine>, options: DistanceOptions) -> Result<Self, IndexError> {
        if spines.is_empty() {
            return Err(IndexError::NoFilaments);
        }
        if let Some(radius) = options.max_distance {
            if !radius.is_finite() || radius < 0.0 {
                return Err(IndexError::InvalidMaxDistance(radius));
            }
        }

        let mut metrics = AnalysisMetrics::default();
        metrics.begin();

        let segment_refs: Vec<SegmentRef> = spines
            .iter()
            .enumerate()
            .flat_map(|(filament, spine)| {
                (0..spine.segments().len()).map(move |segment| SegmentRef { filament, segment })
            })
            .collect();

        let bvh = if options.prune {
            metrics.time(TimingBucket::IndexBuild, || {
                let bboxes: Vec<BBox> = segment_refs
                    .iter()
                    .map(|r| padded_bbox(spines[r.filament].segments()[r.segment].bbox()))
                    .collect();
                Bvh::build_with_leaf_size(&bboxes, options.leaf_size)
            })
        } else {
            None
        };

        log::debug!(
            "distance index: {} filaments, {} segments, {} bvh nodes",
            spines.len(),
            segment_refs.len(),
            bvh.as_ref().map_or(0, Bvh::node_count)
        );

        Ok(Self {
            spines,
            segment_refs,
            bvh,
            options,
            build_timing: metrics.end(),
        })
    }

    #[must_use]
    pub fn spines(&self) -> &[FilamentSpine] {
        &self.spines
    }

    #[must_use]
    pub fn spine(&self, id: FilamentId) -> Option<&FilamentSpine> {
        self.spines.get(id.index())
    }

    #[must_use]
    pub const fn options(&self) -> &DistanceOptions {
        &self.options
    }

    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segment_refs.len()
    }

    /// Nearest spine to `query`.
    #[must_use]
    pub fn nearest(&self, query: Point3) -> FilamentHit {
        self.locate(query).hit
    }

    /// Exhaustive scan over every segment of every spine.
    #[must_use]
    pub fn nearest_brute_force(&self, query: Point3) -> FilamentHit {
        let first = FilamentHit {
            filament: FilamentId(0),
            projection: self.spines[0].nearest_point(query),
        };
        self.spines
            .iter()
            .enumerate()
            .skip(1)
            .map(|(id, spine)| FilamentHit {
                filament: FilamentId(id),
                projection: spine.nearest_point(query),
            })
            .fold(first, FilamentHit::nearer)
    }

    fn locate(&self, query: Point3) -> Located {
        if let Some(bvh) = self.bvh.as_ref() {
            let seeded = self.options.max_distance.map_or(f64::INFINITY, |d| d * d);
            let mut evaluated = 0usize;
            let mut evaluate = |prim: usize| {
                evaluated += 1;
                self.evaluate_segment(prim, query)
            };

            if let Some(hit) = bvh.nearest(query, seeded, &mut evaluate) {
                return Located {
                    hit,
                    evaluated,
                    fell_back: false,
                };
            }
            if seeded.is_finite() {
                if let Some(hit) = bvh.nearest(query, f64::INFINITY, &mut evaluate) {
                    return Located {
                        hit,
                        evaluated,
                        fell_back: true,
                    };
                }
            }
        }

        Located {
            hit: self.nearest_brute_force(query),
            evaluated: self.segment_refs.len(),
            fell_back: false,
        }
    }

    fn evaluate_segment(&self, prim: usize, query: Point3) -> FilamentHit {
        let r = self.segment_refs[prim];
        FilamentHit {
            filament: FilamentId(r.filament),
            projection: self.spines[r.filament].segments()[r.segment].project(r.segment, query),
        }
    }

    /// Maps every tracer to its nearest filament.
    ///
    /// # Errors
    /// [`IndexError::EmptyCatalog`] for no tracers and
    /// [`IndexError::NonFiniteTracer`] for NaN/infinite positions.
    pub fn compute_all(&self, tracers: &[Point3]) -> Result<Vec<TracerRecord>, IndexError> {
        self.compute_all_with_diagnostics(tracers)
            .map(|(records, _)| records)
    }

    /// Like [`compute_all`](Self::compute_all) and labels each record with
    /// its jackknife region.
    ///
    /// # Errors
    /// As [`compute_all`](Self::compute_all), plus
    /// [`IndexError::RegionCountMismatch`] when the assignment length differs.
    pub fn compute_all_with_regions(
        &self,
        tracers: &[Point3],
        regions: &RegionAssignment,
    ) -> Result<Vec<TracerRecord>, IndexError> {
        if regions.len() != tracers.len() {
            return Err(IndexError::RegionCountMismatch {
                tracers: tracers.len(),
                labels: regions.len(),
            });
        }
        let mut records = self.compute_all(tracers)?;
        for (record, &label) in records.iter_mut().zip(regions.labels()) {
            record.region = Some(label);
        }
        Ok(records)
    }

    /// Maps every tracer and reports search counters.
    ///
    /// # Errors
    /// Same as [`compute_all`](Self::compute_all).
    pub fn compute_all_with_diagnostics(
        &self,
        tracers: &[Point3],
    ) -> Result<(Vec<TracerRecord>, IndexDiagnostics), IndexError> {
        if tracers.is_empty() {
            return Err(IndexError::EmptyCatalog);
        }
        if let Some(index) = tracers.iter().position(|p| !p.is_finite()) {
            return Err(IndexError::NonFiniteTracer { index });
        }

        let mut metrics = AnalysisMetrics::default();
        metrics.begin();
        let located = metrics.time(TimingBucket::Projection, || locate_all(self, tracers));

        let mut diagnostics = IndexDiagnostics {
            tracer_count: tracers.len(),
            filament_count: self.spines.len(),
            segment_count: self.segment_refs.len(),
            bvh_node_count: self.bvh.as_ref().map_or(0, Bvh::node_count),
            timing: merge_timing(self.build_timing.as_ref(), metrics.end()),
            ..IndexDiagnostics::default()
        };

        let records: Vec<TracerRecord> = located
            .iter()
            .zip(tracers)
            .enumerate()
            .map(|(index, (loc, &position))| {
                diagnostics.segments_evaluated += loc.evaluated;
                if loc.fell_back {
                    diagnostics.unbounded_fallbacks += 1;
                }
                TracerRecord::from_projection(
                    index,
                    position,
                    loc.hit.filament,
                    &loc.hit.projection,
                )
            })
            .collect();

        if diagnostics.unbounded_fallbacks > 0 {
            diagnostics.warnings.push(format!(
                "{} tracers lie beyond max_distance and were searched without a bound",
                diagnostics.unbounded_fallbacks
            ));
        }
        for (id, spine) in self.spines.iter().enumerate() {
            if spine.collapsed_vertex_count() > 0 {
                diagnostics.warnings.push(format!(
                    "filament {id}: {} coincident vertices collapsed",
                    spine.collapsed_vertex_count()
                ));
            }
        }

        log::debug!("mapped catalog: {}", diagnostics.summary());
        Ok((records, diagnostics))
    }
}

/// One-shot helper: builds an index over `filaments` and maps `tracers`.
///
/// # Errors
/// [`IndexError::EmptyCatalog`] and [`IndexError::NoFilaments`] are checked
/// before any work is done, in that order.
pub fn compute_all(
    tracers: &[Point3],
    filaments: &[FilamentSpine],
    options: &DistanceOptions,
) -> Result<Vec<TracerRecord>, IndexError> {
    if tracers.is_empty() {
        return Err(IndexError::EmptyCatalog);
    }
    DistanceIndex::build(filaments.to_vec(), *options)?.compute_all(tracers)
}

fn padded_bbox(bbox: BBox) -> BBox {
    let scale = bbox
        .min
        .to_array()
        .into_iter()
        .chain(bbox.max.to_array())
        .fold(1.0_f64, |acc, c| acc.max(c.abs()));
    bbox.expand_by(BBOX_PAD * scale)
}

fn merge_timing(build: Option<&TimingReport>, query: Option<TimingReport>) -> Option<TimingReport> {
    match (build, query) {
        (None, None) => None,
        (build, query) => {
            let mut report = query.unwrap_or_default();
            if let Some(build) = build {
                report.index_build_ns = report.index_build_ns.saturating_add(build.index_build_ns);
            }
            Some(report)
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "parallel")] {
        use rayon::prelude::*;

        fn locate_all(index: &DistanceIndex, tracers: &[Point3]) -> Vec<Located> {
            tracers.par_iter().map(|&p| index.locate(p)).collect()
        }
    } else {
        fn locate_all(index: &DistanceIndex, tracers: &[Point3]) -> Vec<Located> {
            tracers.iter().map(|&p| index.locate(p)).collect()
        }
    }
}
