//! Bounding volume hierarchy over the triangles of an indexed mesh.
//!
//! Used to find candidate triangles for patch clipping and to count
//! ray crossings for inside tests.

use smallvec::SmallVec;

use super::aabb::Aabb3;
use super::intersect_3d::ray_triangle_intersect;
use super::{Point3, Vector3};

const MAX_LEAF_SIZE: usize = 8;

#[derive(Debug)]
enum BvhNode {
    Leaf {
        bbox: Aabb3,
        triangles: SmallVec<[u32; 8]>,
    },
    Internal {
        bbox: Aabb3,
        left: Box<Self>,
        right: Box<Self>,
    },
}

impl BvhNode {
    fn bbox(&self) -> &Aabb3 {
        match self {
            Self::Leaf { bbox, .. } | Self::Internal { bbox, .. } => bbox,
        }
    }
}

/// BVH over triangles given as vertex positions plus index triples.
#[derive(Debug)]
pub struct TriangleBvh {
    root: Option<BvhNode>,
    boxes: Vec<Aabb3>,
}

impl TriangleBvh {
    /// Builds the hierarchy; triangle ids are positions in `indices`.
    #[must_use]
    pub fn build(vertices: &[Point3], indices: &[[u32; 3]]) -> Self {
        if indices.is_empty() {
            return Self {
                root: None,
                boxes: Vec::new(),
            };
        }
        let boxes: Vec<(u32, Aabb3)> = indices
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let bb = Aabb3::from_triangle(
                    &vertices[t[0] as usize],
                    &vertices[t[1] as usize],
                    &vertices[t[2] as usize],
                );
                (i as u32, bb)
            })
            .collect();
        let order: Vec<usize> = (0..boxes.len()).collect();
        Self {
            root: Some(Self::build_recursive(&boxes, order)),
            boxes: boxes.into_iter().map(|(_, bb)| bb).collect(),
        }
    }

    fn build_recursive(boxes: &[(u32, Aabb3)], mut order: Vec<usize>) -> BvhNode {
        let mut bbox = Aabb3::empty();
        for &i in &order {
            bbox.expand(&boxes[i].1);
        }
        if order.len() <= MAX_LEAF_SIZE {
            return BvhNode::Leaf {
                bbox,
                triangles: order.iter().map(|&i| boxes[i].0).collect(),
            };
        }

        // Median split along the longest axis.
        let axis = bbox.longest_axis();
        order.sort_by(|&a, &b| {
            let ca = boxes[a].1.center()[axis];
            let cb = boxes[b].1.center()[axis];
            ca.total_cmp(&cb)
        });
        let right = order.split_off(order.len() / 2);
        BvhNode::Internal {
            bbox,
            left: Box::new(Self::build_recursive(boxes, order)),
            right: Box::new(Self::build_recursive(boxes, right)),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Triangles whose box overlaps `query` (tolerance inclusive).
    #[must_use]
    pub fn query(&self, query: &Aabb3, tolerance: f64) -> Vec<u32> {
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
                BvhNode::Leaf { triangles, .. } => result.extend(
                    triangles
                        .iter()
                        .filter(|&&ti| self.boxes[ti as usize].intersects(query, tolerance)),
                ),
                BvhNode::Internal { left, right, .. } => {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
        result
    }

    /// Ray parameters `t > 0` of all crossings of the ray `origin + t * dir`.
    #[must_use]
    pub fn ray_hits(
        &self,
        vertices: &[Point3],
        indices: &[[u32; 3]],
        origin: &Point3,
        dir: &Vector3,
    ) -> Vec<f64> {
        let mut hits = Vec::new();
        let Some(root) = &self.root else {
            return hits;
        };
        let inv = [1.0 / dir.x, 1.0 / dir.y, 1.0 / dir.z];
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if !node.bbox().hit_by_ray(origin, &inv) {
                continue;
            }
            match node {
                BvhNode::Leaf { triangles, .. } => {
                    for &ti in triangles {
                        let t = indices[ti as usize];
                        if let Some(param) = ray_triangle_intersect(
                            origin,
                            dir,
                            &vertices[t[0] as usize],
                            &vertices[t[1] as usize],
                            &vertices[t[2] as usize],
                        ) {
                            hits.push(param);
                        }
                    }
                }
                BvhNode::Internal { left, right, .. } => {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
        hits
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn grid(n: u32) -> (Vec<Point3>, Vec<[u32; 3]>) {
        let mut vertices = Vec::new();
        for y in 0..=n {
            for x in 0..=n {
                vertices.push(Point3::new(f64::from(x), f64::from(y), 0.0));
            }
        }
        let mut indices = Vec::new();
        let row = n + 1;
        for y in 0..n {
            for x in 0..n {
                let a = y * row + x;
                indices.push([a, a + 1, a + row + 1]);
                indices.push([a, a + row + 1, a + row]);
            }
        }
        (vertices, indices)
    }

    #[test]
    fn query_finds_local_triangles_only() {
        let (v, i) = grid(10);
        let bvh = TriangleBvh::build(&v, &i);
        let q = Aabb3::from_points(&[Point3::new(2.2, 2.2, -1.0), Point3::new(2.8, 2.8, 1.0)]);
        let found = bvh.query(&q, 0.0);
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn query_skips_far_triangles_in_a_near_leaf() {
        // One leaf holds a short strip; only its first cell is near the box.
        let (mut vertices, mut indices) = grid(1);
        for k in 1..3_u32 {
            let base = vertices.len() as u32;
            let x = f64::from(k * 3);
            vertices.extend([
                Point3::new(x, 0.0, 0.0),
                Point3::new(x + 1.0, 0.0, 0.0),
                Point3::new(x, 1.0, 0.0),
            ]);
            indices.push([base, base + 1, base + 2]);
        }
        let bvh = TriangleBvh::build(&vertices, &indices);
        let q = Aabb3::from_points(&[Point3::new(0.2, 0.2, -1.0), Point3::new(0.8, 0.8, 1.0)]);
        let mut found = bvh.query(&q, 0.0);
        found.sort_unstable();
        assert_eq!(found, vec![0, 1]);
        assert_eq!(bvh.query(&q, 2.5).len(), 3);
    }

    #[test]
    fn vertical_ray_crosses_grid_once() {
        let (v, i) = grid(6);
        let bvh = TriangleBvh::build(&v, &i);
        let hits = bvh.ray_hits(
            &v,
            &i,
            &Point3::new(3.3, 1.6, -5.0),
            &Vector3::new(0.0, 0.0, 1.0),
        );
        assert_eq!(hits.len(), 1);
        assert!((hits[0] - 5.0).abs() < 1e-9);
    }

    #[test]
    fn empty_bvh() {
        let bvh = TriangleBvh::build(&[], &[]);
        assert!(bvh.is_empty());
        assert!(bvh.query(&Aabb3::empty(), 1.0).is_empty());
    }
}
