//! Region labelling policies for delete-one-region jackknife.

use std::fmt;
use std::str::FromStr;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::JackknifeError;
use crate::geom::{BBox, Point3};
use crate::index::TracerRecord;

/// Pair of coordinate axes spanned by a 2D region grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridAxes {
    #[default]
    Xy,
    Xz,
    Yz,
}

impl GridAxes {
    #[must_use]
    pub const fn axes(self) -> (u8, u8) {
        match self {
            Self::Xy => (0, 1),
            Self::Xz => (0, 2),
            Self::Yz => (1, 2),
        }
    }
}

impl FromStr for GridAxes {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xy" | "yx" => Ok(Self::Xy),
            "xz" | "zx" => Ok(Self::Xz),
            "yz" | "zy" => Ok(Self::Yz),
            other => Err(format!("unknown grid axes `{other}` (expected xy, xz or yz)")),
        }
    }
}

impl fmt::Display for GridAxes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Xy => "xy",
            Self::Xz => "xz",
            Self::Yz => "yz",
        };
        f.write_str(name)
    }
}

/// A total, disjoint partition of a sample into `region_count` labelled groups.
///
/// Deserialized values go through [`RegionAssignment::from_labels`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRegionAssignment")]
pub struct RegionAssignment {
    labels: Vec<usize>,
    region_count: usize,
}

#[derive(Deserialize)]
struct RawRegionAssignment {
    labels: Vec<usize>,
    region_count: usize,
}

impl TryFrom<RawRegionAssignment> for RegionAssignment {
    type Error = JackknifeError;

    fn try_from(raw: RawRegionAssignment) -> Result<Self, Self::Error> {
        Self::from_labels(raw.labels, raw.region_count)
    }
}

impl RegionAssignment {
    /// Wraps precomputed labels.
    ///
    /// # Errors
    /// [`JackknifeError::InsufficientRegions`] if `region_count < 2` and
    /// [`JackknifeError::RegionOutOfRange`] for any label `>= region_count`.
    pub fn from_labels(labels: Vec<usize>, region_count: usize) -> Result<Self, JackknifeError> {
        if region_count < 2 {
            return Err(JackknifeError::InsufficientRegions { count: region_count });
        }
        if let Some((index, &label)) = labels
            .iter()
            .enumerate()
            .find(|(_, l)| **l >= region_count)
        {
            return Err(JackknifeError::RegionOutOfRange {
                index,
                label,
                region_count,
            });
        }
        Ok(Self {
            labels,
            region_count,
        })
    }

    /// Reads the labels already stored on the records.
    ///
    /// # Errors
    /// [`JackknifeError::MissingRegion`] for a record without a label, plus
    /// the checks of [`from_labels`](Self::from_labels).
    pub fn from_records(
        records: &[TracerRecord],
        region_count: usize,
    ) -> Result<Self, JackknifeError> {
        let labels = records
            .iter()
            .enumerate()
            .map(|(index, r)| r.region.ok_or(JackknifeError::MissingRegion { index }))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_labels(labels, region_count)
    }

    /// Regular 2D grid over the bounding box of `points`.
    ///
    /// The grid is `nx = floor(sqrt(K))` by `ny = ceil(K / nx)` cells. Cells
    /// numbered beyond `K - 1` merge into region `K - 1`, and a zero-width
    /// extent is widened to one unit.
    ///
    /// # Errors
    /// [`JackknifeError::EmptySample`] for no points and
    /// [`JackknifeError::InsufficientRegions`] for `K < 2`.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn grid(
        points: &[Point3],
        region_count: usize,
        axes: GridAxes,
    ) -> Result<Self, JackknifeError> {
        if region_count < 2 {
            return Err(JackknifeError::InsufficientRegions { count: region_count });
        }
        let bbox = BBox::from_points(points).ok_or(JackknifeError::EmptySample)?;
        let (ax0, ax1) = axes.axes();

        let nx = ((region_count as f64).sqrt().floor() as usize).max(1);
        let ny = region_count.div_ceil(nx);

        let extent = |axis: u8| {
            let lo = bbox.min.component(axis);
            let hi = bbox.max.component(axis);
            if hi > lo { (lo, hi - lo) } else { (lo, 1.0) }
        };
        let (x0, width) = extent(ax0);
        let (y0, height) = extent(ax1);

        let cell = |value: f64, origin: f64, span: f64, cells: usize| {
            let raw = ((value - origin) / span * cells as f64).floor();
            (raw.max(0.0) as usize).min(cells - 1)
        };

        let labels = points
            .iter()
            .map(|p| {
                let ix = cell(p.component(ax0), x0, width, nx);
                let iy = cell(p.component(ax1), y0, height, ny);
                (ix + nx * iy).min(region_count - 1)
            })
            .collect();

        Self::from_labels(labels, region_count)
    }

    /// Eight octants around `centre`, labelled by the sign bits of x, y and z.
    ///
    /// # Errors
    /// [`JackknifeError::EmptySample`] for no points.
    pub fn octants(points: &[Point3], centre: Point3) -> Result<Self, JackknifeError> {
        if points.is_empty() {
            return Err(JackknifeError::EmptySample);
        }
        let labels = points
            .iter()
            .map(|p| {
                usize::from(p.x >= centre.x)
                    | (usize::from(p.y >= centre.y) << 1)
                    | (usize::from(p.z >= centre.z) << 2)
            })
            .collect();
        Self::from_labels(labels, 8)
    }

    /// Balanced random partition of `len` items, reproducible from `seed`.
    ///
    /// # Errors
    /// [`JackknifeError::EmptySample`] for `len == 0` and
    /// [`JackknifeError::InsufficientRegions`] for `region_count < 2`.
    pub fn random(len: usize, region_count: usize, seed: u64) -> Result<Self, JackknifeError> {
        if region_count < 2 {
            return Err(JackknifeError::InsufficientRegions { count: region_count });
        }
        if len == 0 {
            return Err(JackknifeError::EmptySample);
        }
        let mut labels: Vec<usize> = (0..len).map(|i| i % region_count).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        labels.shuffle(&mut rng);
        Self::from_labels(labels, region_count)
    }

    #[must_use]
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    #[must_use]
    pub const fn region_count(&self) -> usize {
        self.region_count
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of members per region, indexed by label.
    #[must_use]
    pub fn region_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.region_count];
        for &label in &self.labels {
            sizes[label] += 1;
        }
        sizes
    }
}

/// How a [`JackknifeOptions`] run labels its sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegionPolicy {
    Grid { axes: GridAxes },
    /// Octants around the sample's bounding-box centre; always 8 regions.
    Octants,
    Random { seed: u64 },
}

impl Default for RegionPolicy {
    fn default() -> Self {
        Self::Grid {
            axes: GridAxes::default(),
        }
    }
}

impl FromStr for RegionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        if let Some(axes) = lower.strip_prefix("grid-") {
            return Ok(Self::Grid { axes: axes.parse()? });
        }
        match lower.as_str() {
            "grid" => Ok(Self::default()),
            "octants" => Ok(Self::Octants),
            "random" => Ok(Self::Random { seed: 0 }),
            other => Err(format!(
                "unknown region policy `{other}` \
                 (expected grid-xy, grid-xz, grid-yz, octants or random)"
            )),
        }
    }
}

/// Jackknife configuration passed explicitly into each run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JackknifeOptions {
    pub region_count: usize,
    pub policy: RegionPolicy,
}

impl Default for JackknifeOptions {
    fn default() -> Self {
        Self {
            region_count: 8,
            policy: RegionPolicy::default(),
        }
    }
}

impl JackknifeOptions {
    /// Labels `points` according to the configured policy.
    ///
    /// # Errors
    /// [`JackknifeError::PolicyRegionCount`] when the octant policy is asked
    /// for anything but 8 regions, plus the errors of the chosen policy.
    pub fn assign(&self, points: &[Point3]) -> Result<RegionAssignment, JackknifeError> {
        match self.policy {
            RegionPolicy::Grid { axes } => RegionAssignment::grid(points, self.region_count, axes),
            RegionPolicy::Octants => {
                if self.region_count != 8 {
                    return Err(JackknifeError::PolicyRegionCount {
                        policy: "octants",
                        expected: 8,
                        found: self.region_count,
                    });
                }
                let centre = BBox::from_points(points)
                    .ok_or(JackknifeError::EmptySample)?
                    .center();
                RegionAssignment::octants(points, centre)
            }
            RegionPolicy::Random { seed } => {
                RegionAssignment::random(points.len(), self.region_count, seed)
            }
        }
    }
}
