use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geom::{Point3, SpineProjection};

/// Position of a spine in the list handed to the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilamentId(pub usize);

impl FilamentId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for FilamentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-tracer result of a distance query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TracerRecord {
    /// Index of the tracer in the input catalog.
    pub tracer_index: usize,
    pub position: Point3,
    pub filament: FilamentId,
    /// Perpendicular distance to the nearest spine (Mpc).
    pub distance: f64,
    /// Arc length of the closest point, measured from the spine's first vertex.
    pub arc_length: f64,
    pub segment_index: usize,
    pub t: f64,
    pub closest_point: Point3,
    /// Jackknife region label, when one was assigned.
    pub region: Option<usize>,
}

impl TracerRecord {
    #[must_use]
    pub fn from_projection(
        tracer_index: usize,
        position: Point3,
        filament: FilamentId,
        projection: &SpineProjection,
    ) -> Self {
        Self {
            tracer_index,
            position,
            filament,
            distance: projection.distance,
            arc_length: projection.arc_length,
            segment_index: projection.segment_index,
            t: projection.t,
            closest_point: projection.closest_point,
            region: None,
        }
    }
}
