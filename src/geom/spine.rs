//! Filament spines: immutable 3D polylines that answer nearest-point queries.
//!
//! A [`FilamentSpine`] precomputes, per segment, the unit direction, the length
//! and the cumulative arc length at the segment's start vertex. Queries project
//! a point onto every segment (clamped to the finite segment) and keep the
//! closest one; equal distances resolve to the lower segment index.

use std::cmp::Ordering;

use serde::Serialize;

use super::{BBox, Point3, Tolerance, Vec3};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("filament spine needs at least 2 distinct vertices, found {distinct}")]
    Degenerate { distinct: usize },
    #[error("filament spine vertex {index} has non-finite coordinates")]
    NonFinite { index: usize },
}

/// One straight piece of a spine, between vertex `i` and `i + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpineSegment {
    pub start: Point3,
    pub end: Point3,
    /// Unit vector from `start` to `end`.
    pub direction: Vec3,
    pub length: f64,
    /// Arc length from the first spine vertex to `start`.
    pub arc_start: f64,
}

impl SpineSegment {
    /// Clamped projection of `query` onto this segment, tagged with `index`.
    #[must_use]
    pub fn project(&self, index: usize, query: Point3) -> SpineProjection {
        let along = query.sub_point(self.start).dot(self.direction);
        let s = along.clamp(0.0, self.length);
        let closest_point = if s >= self.length {
            self.end
        } else {
            self.start.add_vec(self.direction.mul_scalar(s))
        };
        let distance_squared = query.distance_squared_to(closest_point);

        SpineProjection {
            distance: distance_squared.sqrt(),
            distance_squared,
            arc_length: self.arc_start + s,
            segment_index: index,
            t: s / self.length,
            closest_point,
        }
    }

    #[must_use]
    pub fn bbox(&self) -> BBox {
        BBox::from_segment(self.start, self.end)
    }
}

/// Closest point on a spine for one query point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpineProjection {
    /// Perpendicular (clamped) Euclidean distance to the spine.
    pub distance: f64,
    pub distance_squared: f64,
    /// Arc length from the first vertex to `closest_point`.
    pub arc_length: f64,
    pub segment_index: usize,
    /// Parameter in [0, 1] along the winning segment.
    pub t: f64,
    pub closest_point: Point3,
}

impl SpineProjection {
    /// Search order: smaller squared distance first, then lower segment index.
    #[must_use]
    pub fn search_order(&self, other: &Self) -> Ordering {
        self.distance_squared
            .total_cmp(&other.distance_squared)
            .then_with(|| self.segment_index.cmp(&other.segment_index))
    }

    /// Fold step keeping whichever candidate comes first in search order.
    #[must_use]
    pub fn nearer(self, other: Self) -> Self {
        if other.search_order(&self) == Ordering::Less {
            other
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilamentSpine {
    vertices: Vec<Point3>,
    arc_lengths: Vec<f64>,
    segments: Vec<SpineSegment>,
    collapsed_vertex_count: usize,
}

impl FilamentSpine {
    /// Builds a spine from ordered vertices.
    ///
    /// Consecutive vertices closer than [`Tolerance::ZERO_LENGTH`] are merged.
    ///
    /// # Errors
    /// [`GeometryError::NonFinite`] for NaN/infinite coordinates and
    /// [`GeometryError::Degenerate`] when fewer than two distinct vertices remain.
    pub fn new(points: Vec<Point3>) -> Result<Self, GeometryError> {
        if let Some(index) = points.iter().position(|p| !p.is_finite()) {
            return Err(GeometryError::NonFinite { index });
        }

        let input_count = points.len();
        let mut vertices: Vec<Point3> = Vec::with_capacity(input_count);
        for p in points {
            let duplicate = vertices
                .last()
                .is_some_and(|last| Tolerance::ZERO_LENGTH.is_zero_length(p.distance_to(*last)));
            if !duplicate {
                vertices.push(p);
            }
        }

        if vertices.len() < 2 {
            return Err(GeometryError::Degenerate {
                distinct: vertices.len(),
            });
        }

        let collapsed_vertex_count = input_count - vertices.len();
        if collapsed_vertex_count > 0 {
            log::warn!("collapsed {collapsed_vertex_count} coincident spine vertices");
        }

        let mut arc_lengths = Vec::with_capacity(vertices.len());
        let mut segments = Vec::with_capacity(vertices.len() - 1);
        let mut total = 0.0;
        arc_lengths.push(total);
        for window in vertices.windows(2) {
            let delta = window[1].sub_point(window[0]);
            let length = delta.length();
            let Some(direction) = delta.normalized() else {
                return Err(GeometryError::Degenerate {
                    distinct: vertices.len(),
                });
            };
            segments.push(SpineSegment {
                start: window[0],
                end: window[1],
                direction,
                length,
                arc_start: total,
            });
            total += length;
            arc_lengths.push(total);
        }

        Ok(Self {
            vertices,
            arc_lengths,
            segments,
            collapsed_vertex_count,
        })
    }

    /// Convenience constructor from coordinate triples.
    ///
    /// # Errors
    /// Same as [`FilamentSpine::new`].
    pub fn from_coords(coords: &[[f64; 3]]) -> Result<Self, GeometryError> {
        Self::new(coords.iter().copied().map(Point3::from).collect())
    }

    #[must_use]
    pub fn vertices(&self) -> &[Point3] {
        &self.vertices
    }

    #[must_use]
    pub fn segments(&self) -> &[SpineSegment] {
        &self.segments
    }

    /// Cumulative arc length at each vertex; the first entry is 0.
    #[must_use]
    pub fn arc_lengths(&self) -> &[f64] {
        &self.arc_lengths
    }

    /// Total spine length.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.arc_lengths.last().copied().unwrap_or(0.0)
    }

    #[must_use]
    pub const fn collapsed_vertex_count(&self) -> usize {
        self.collapsed_vertex_count
    }

    #[must_use]
    pub fn bbox(&self) -> Option<BBox> {
        BBox::from_points(&self.vertices)
    }

    /// Projection onto segment `index` only, or `None` if out of range.
    #[must_use]
    pub fn project_segment(&self, index: usize, query: Point3) -> Option<SpineProjection> {
        self.segments.get(index).map(|seg| seg.project(index, query))
    }

    /// Nearest point on the spine to `query`, scanning every segment.
    #[must_use]
    pub fn nearest_point(&self, query: Point3) -> SpineProjection {
        let first = self.segments[0].project(0, query);
        self.segments
            .iter()
            .enumerate()
            .skip(1)
            .map(|(index, seg)| seg.project(index, query))
            .fold(first, SpineProjection::nearer)
    }

    #[must_use]
    pub fn project_points(&self, points: &[Point3]) -> Vec<SpineProjection> {
        points.iter().map(|p| self.nearest_point(*p)).collect()
    }

    /// Point at arc length `s`, clamped to `[0, length]`.
    #[must_use]
    pub fn point_at_arc_length(&self, s: f64) -> Point3 {
        let last = self.vertices.len() - 1;
        if !s.is_finite() || s <= 0.0 {
            return self.vertices[0];
        }
        if s >= self.arc_lengths[last] {
            return self.vertices[last];
        }

        let idx = match self.arc_lengths.binary_search_by(|value| value.total_cmp(&s)) {
            Ok(i) => i.min(last - 1),
            Err(i) => i.max(1) - 1,
        };
        let seg = &self.segments[idx];
        seg.start.add_vec(seg.direction.mul_scalar(s - seg.arc_start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn l_shape() -> FilamentSpine {
        FilamentSpine::from_coords(&[[0.0, 0.0, 0.0], [3.0, 0.0, 0.0], [3.0, 4.0, 0.0]])
            .expect("valid spine")
    }

    #[test]
    fn arc_lengths_accumulate_segment_lengths() {
        let spine = l_shape();
        assert_eq!(spine.arc_lengths(), &[0.0, 3.0, 7.0]);
        assert_eq!(spine.length(), 7.0);
        assert_eq!(spine.segments()[1].arc_start, 3.0);
        assert_eq!(spine.segments()[1].direction, Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn rejects_too_few_points() {
        let err = FilamentSpine::from_coords(&[[1.0, 2.0, 3.0]]).unwrap_err();
        assert_eq!(err, GeometryError::Degenerate { distinct: 1 });
        let err = FilamentSpine::new(Vec::new()).unwrap_err();
        assert_eq!(err, GeometryError::Degenerate { distinct: 0 });
    }

    #[test]
    fn rejects_all_coincident_points() {
        let err = FilamentSpine::from_coords(&[[1.0, 1.0, 1.0]; 4]).unwrap_err();
        assert_eq!(err, GeometryError::Degenerate { distinct: 1 });
    }

    #[test]
    fn rejects_non_finite_vertex() {
        let err =
            FilamentSpine::from_coords(&[[0.0, 0.0, 0.0], [f64::INFINITY, 0.0, 0.0]]).unwrap_err();
        assert_eq!(err, GeometryError::NonFinite { index: 1 });
    }

    #[test]
    fn collapses_repeated_vertices() {
        let spine = FilamentSpine::from_coords(&[
            [0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0],
            [2.0, 0.0, 0.0],
            [2.0, 0.0, 0.0],
            [2.0, 2.0, 0.0],
        ])
        .expect("valid spine");
        assert_eq!(spine.vertices().len(), 3);
        assert_eq!(spine.segments().len(), 2);
        assert_eq!(spine.collapsed_vertex_count(), 2);
        assert_eq!(spine.length(), 4.0);
    }

    #[test]
    fn shared_vertex_tie_prefers_lower_segment() {
        let spine = l_shape();
        // Equidistant from both segments' shared vertex (3, 0, 0).
        let hit = spine.nearest_point(Point3::new(4.0, -1.0, 0.0));
        assert_eq!(hit.segment_index, 0);
        assert_eq!(hit.arc_length, 3.0);
        assert_eq!(hit.closest_point, Point3::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn point_at_arc_length_walks_the_spine() {
        let spine = l_shape();
        assert_eq!(spine.point_at_arc_length(-1.0), Point3::new(0.0, 0.0, 0.0));
        assert_eq!(spine.point_at_arc_length(1.5), Point3::new(1.5, 0.0, 0.0));
        assert_eq!(spine.point_at_arc_length(3.0), Point3::new(3.0, 0.0, 0.0));
        assert_eq!(spine.point_at_arc_length(5.0), Point3::new(3.0, 2.0, 0.0));
        assert_eq!(spine.point_at_arc_length(99.0), Point3::new(3.0, 4.0, 0.0));
    }

    #[test]
    fn project_segment_out_of_range_is_none() {
        assert!(l_shape().project_segment(2, Point3::ORIGIN).is_none());
    }
}
