//! AABB tree over 2D line segments.
//!
//! Answers squared-distance nearest queries, radius queries and box
//! overlap queries over a fixed set of segments.

use smallvec::SmallVec;

use super::aabb::Aabb2;
use super::intersect_2d::{closest_point_on_segment, point_segment_distance_sq};
use super::Point2;

const MAX_LEAF_SIZE: usize = 4;

/// A 2D segment stored in the tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line2 {
    pub a: Point2,
    pub b: Point2,
}

impl Line2 {
    #[must_use]
    pub fn new(a: Point2, b: Point2) -> Self {
        Self { a, b }
    }
}

#[derive(Debug)]
enum Node {
    Leaf {
        bbox: Aabb2,
        lines: SmallVec<[u32; 4]>,
    },
    Internal {
        bbox: Aabb2,
        left: Box<Self>,
        right: Box<Self>,
    },
}

impl Node {
    fn bbox(&self) -> &Aabb2 {
        match self {
            Self::Leaf { bbox, .. } | Self::Internal { bbox, .. } => bbox,
        }
    }
}

/// Result of a nearest-segment query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestLine {
    pub line_index: usize,
    pub distance_sq: f64,
    pub point: Point2,
}

/// Bounding-box tree over a set of segments.
#[derive(Debug)]
pub struct LineTree {
    lines: Vec<Line2>,
    root: Option<Node>,
}

impl LineTree {
    #[must_use]
    pub fn new(lines: Vec<Line2>) -> Self {
        let boxes: Vec<Aabb2> = lines.iter().map(|l| Aabb2::from_segment(&l.a, &l.b)).collect();
        let root = if lines.is_empty() {
            None
        } else {
            Some(Self::build(&boxes, (0..lines.len()).collect()))
        };
        Self { lines, root }
    }

    fn build(boxes: &[Aabb2], mut order: Vec<usize>) -> Node {
        let mut bbox = Aabb2::empty();
        for &i in &order {
            bbox.expand(&boxes[i]);
        }
        if order.len() <= MAX_LEAF_SIZE {
            return Node::Leaf {
                bbox,
                lines: order.iter().map(|&i| i as u32).collect(),
            };
        }
        let axis = bbox.longest_axis();
        order.sort_by(|&a, &b| boxes[a].center()[axis].total_cmp(&boxes[b].center()[axis]));
        let right = order.split_off(order.len() / 2);
        Node::Internal {
            bbox,
            left: Box::new(Self::build(boxes, order)),
            right: Box::new(Self::build(boxes, right)),
        }
    }

    #[must_use]
    pub fn lines(&self) -> &[Line2] {
        &self.lines
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Nearest segment to `p`; ties resolve to the lower segment index.
    #[must_use]
    pub fn closest(&self, p: &Point2) -> Option<ClosestLine> {
        let root = self.root.as_ref()?;
        let mut best: Option<ClosestLine> = None;
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if let Some(b) = &best {
                if node.bbox().distance_sq(p) > b.distance_sq {
                    continue;
                }
            }
            match node {
                Node::Leaf { lines, .. } => {
                    for &li in lines {
                        let line = &self.lines[li as usize];
                        let (point, _) = closest_point_on_segment(&line.a, &line.b, p);
                        let distance_sq = (p - point).norm_squared();
                        let better = best.as_ref().is_none_or(|b| {
                            distance_sq < b.distance_sq
                                || (distance_sq == b.distance_sq && (li as usize) < b.line_index)
                        });
                        if better {
                            best = Some(ClosestLine {
                                line_index: li as usize,
                                distance_sq,
                                point,
                            });
                        }
                    }
                }
                Node::Internal { left, right, .. } => {
                    // Visit the nearer child first.
                    let dl = left.bbox().distance_sq(p);
                    let dr = right.bbox().distance_sq(p);
                    if dl <= dr {
                        stack.push(right);
                        stack.push(left);
                    } else {
                        stack.push(left);
                        stack.push(right);
                    }
                }
            }
        }
        best
    }

    /// Indices of all segments within `radius` of `p`, ascending.
    #[must_use]
    pub fn in_radius(&self, p: &Point2, radius: f64) -> Vec<usize> {
        let mut result = Vec::new();
        let Some(root) = &self.root else {
            return result;
        };
        let radius_sq = radius * radius;
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if node.bbox().distance_sq(p) > radius_sq {
                continue;
            }
            match node {
                Node::Leaf { lines, .. } => {
                    for &li in lines {
                        let line = &self.lines[li as usize];
                        if point_segment_distance_sq(&line.a, &line.b, p) <= radius_sq {
                            result.push(li as usize);
                        }
                    }
                }
                Node::Internal { left, right, .. } => {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
        result.sort_unstable();
        result
    }

    /// Indices of all segments whose box overlaps `query`, ascending.
    #[must_use]
    pub fn query(&self, query: &Aabb2, tolerance: f64) -> Vec<usize> {
        let mut result = Vec::new();
        let Some(root) = &self.root else {
            return result;
        };
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if !node.bbox().intersects(query, tolerance) {
                continue;
            }
            match node {
                Node::Leaf { lines, .. } => {
                    for &li in lines {
                        let line = &self.lines[li as usize];
                        if Aabb2::from_segment(&line.a, &line.b).intersects(query, tolerance) {
                            result.push(li as usize);
                        }
                    }
                }
                Node::Internal { left, right, .. } => {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
        result.sort_unstable();
        result
    }
}
