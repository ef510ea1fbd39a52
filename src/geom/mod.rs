mod bvh;
mod core;
mod spine;

pub(crate) use bvh::{Bvh, NearestCandidate};
pub use core::{BBox, Point3, Tolerance, Vec3};
pub use spine::{FilamentSpine, GeometryError, SpineProjection, SpineSegment};

#[cfg(test)]
mod tests;
