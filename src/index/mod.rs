//! Batch nearest-filament queries over tracer catalogs.

mod distance;
mod record;

pub use distance::{
    DistanceIndex, DistanceOptions, FilamentHit, IndexDiagnostics, IndexError, compute_all,
};
pub use record::{FilamentId, TracerRecord};
