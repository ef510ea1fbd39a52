use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::{BBox, Point3};

/// A primitive hit produced while searching the hierarchy.
pub(crate) trait NearestCandidate {
    fn distance_squared(&self) -> f64;

    /// `true` when `self` should replace `other` as the current best.
    fn precedes(&self, other: &Self) -> bool;
}

#[derive(Debug, Clone, Copy)]
struct BvhNode {
    bbox: BBox,
    left: u32,
    right: u32,
    start: u32,
    count: u32,
}

impl BvhNode {
    const fn leaf(bbox: BBox, start: u32, count: u32) -> Self {
        Self {
            bbox,
            left: u32::MAX,
            right: u32::MAX,
            start,
            count,
        }
    }

    const fn inner(bbox: BBox, left: u32, right: u32) -> Self {
        Self {
            bbox,
            left,
            right,
            start: 0,
            count: 0,
        }
    }

    const fn is_leaf(self) -> bool {
        self.count != 0
    }
}

/// Median-split bounding volume hierarchy over primitive boxes.
#[derive(Debug, Clone)]
pub(crate) struct Bvh {
    nodes: Vec<BvhNode>,
    prim_indices: Vec<u32>,
}

impl Bvh {
    pub(crate) const DEFAULT_LEAF_SIZE: usize = 8;

    #[must_use]
    pub(crate) fn build_with_leaf_size(bboxes: &[BBox], leaf_size: usize) -> Option<Self> {
        if bboxes.is_empty() {
            return None;
        }

        let leaf_size = leaf_size.clamp(1, 256);
        let prim_count = u32::try_from(bboxes.len()).ok()?;
        let prim_indices: Vec<u32> = (0..prim_count).collect();
        let nodes = Vec::with_capacity(bboxes.len().saturating_mul(2));

        let mut bvh = Self { nodes, prim_indices };
        bvh.build_node(bboxes, 0, bboxes.len(), leaf_size);
        Some(bvh)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn build_node(&mut self, bboxes: &[BBox], start: usize, end: usize, leaf_size: usize) -> u32 {
        let node_index = self.nodes.len() as u32;
        let seed_bbox = bboxes[self.prim_indices[start] as usize];
        self.nodes.push(BvhNode::leaf(seed_bbox, 0, 0));

        let bbox = self.range_bbox(bboxes, start, end);
        let count = end - start;

        if count <= leaf_size {
            self.nodes[node_index as usize] = BvhNode::leaf(bbox, start as u32, count as u32);
            return node_index;
        }

        let axis = self.choose_split_axis(bboxes, start, end);
        let mid = start + count / 2;
        self.prim_indices[start..end].select_nth_unstable_by(mid - start, |a, b| {
            let ca = bboxes[*a as usize].center().component(axis);
            let cb = bboxes[*b as usize].center().component(axis);
            ca.total_cmp(&cb)
        });

        let left = self.build_node(bboxes, start, mid, leaf_size);
        let right = self.build_node(bboxes, mid, end, leaf_size);
        self.nodes[node_index as usize] = BvhNode::inner(bbox, left, right);
        node_index
    }

    fn range_bbox(&self, bboxes: &[BBox], start: usize, end: usize) -> BBox {
        self.prim_indices[(start + 1)..end]
            .iter()
            .fold(bboxes[self.prim_indices[start] as usize], |acc, &idx| {
                acc.union(bboxes[idx as usize])
            })
    }

    fn choose_split_axis(&self, bboxes: &[BBox], start: usize, end: usize) -> u8 {
        let centers: Vec<Point3> = self.prim_indices[start..end]
            .iter()
            .map(|&idx| bboxes[idx as usize].center())
            .collect();
        let Some(spread) = BBox::from_points(&centers) else {
            return 0;
        };

        let ex = spread.max.x - spread.min.x;
        let ey = spread.max.y - spread.min.y;
        let ez = spread.max.z - spread.min.z;

        if ex >= ey && ex >= ez {
            0
        } else if ey >= ez {
            1
        } else {
            2
        }
    }

    /// Best-first search for the primitive nearest to `point`.
    ///
    /// Only candidates with squared distance `<= max_dist2` are accepted. A
    /// node is skipped only when its box lies strictly farther than the current
    /// best, so primitives tied with the best are still offered to
    /// [`NearestCandidate::precedes`].
    #[must_use]
    pub(crate) fn nearest<T, F>(&self, point: Point3, max_dist2: f64, mut evaluate: F) -> Option<T>
    where
        T: NearestCandidate,
        F: FnMut(usize) -> T,
    {
        let mut best: Option<T> = None;
        let bound = |best: &Option<T>| best.as_ref().map_or(max_dist2, T::distance_squared);

        let root_dist2 = self.nodes.first()?.bbox.distance_squared_to_point(point);
        if root_dist2 > max_dist2 {
            return None;
        }

        let mut heap = BinaryHeap::new();
        heap.push(HeapEntry {
            dist2: root_dist2,
            node: 0u32,
        });

        while let Some(entry) = heap.pop() {
            if entry.dist2 > bound(&best) {
                break;
            }

            let node = self.nodes[entry.node as usize];
            if node.is_leaf() {
                let start = node.start as usize;
                let end = start + node.count as usize;
                for &prim in &self.prim_indices[start..end] {
                    let candidate = evaluate(prim as usize);
                    let d2 = candidate.distance_squared();
                    if !d2.is_finite() || d2 > max_dist2 {
                        continue;
                    }
                    let replace = best.as_ref().is_none_or(|current| candidate.precedes(current));
                    if replace {
                        best = Some(candidate);
                    }
                }
                continue;
            }

            for child in [node.left, node.right] {
                let child_dist2 = self.nodes[child as usize].bbox.distance_squared_to_point(point);
                if child_dist2 <= bound(&best) {
                    heap.push(HeapEntry {
                        dist2: child_dist2,
                        node: child,
                    });
                }
            }
        }

        best
    }

    #[must_use]
    pub(crate) fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[derive(Debug, Clone, Copy)]
struct HeapEntry {
    dist2: f64,
    node: u32,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering so BinaryHeap acts as a min-heap on dist2.
        other
            .dist2
            .total_cmp(&self.dist2)
            .then_with(|| other.node.cmp(&self.node))
    }
}
