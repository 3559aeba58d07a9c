//! Side walls of the extruded shapes.
//!
//! Every shape point `i` owns a front vertex `2i` and a back vertex `2i + 1`.
//! The wall of segment `i -> j` is split into two triangles:
//! `face_1 = (F_i, F_j, B_i)` and `face_2 = (F_j, B_j, B_i)`. The vertical
//! edge `B_i - F_i` is `edge_1` and the diagonal `F_j - B_i` is `edge_2`.

use crate::error::Result;
use crate::geometry::polygon::to_points;
use crate::geometry::{ExPolygon, ExPolygonsIndices};
use crate::math::line_tree::{Line2, LineTree};
use crate::math::{Point2, Point3};
use crate::operations::projection::{Project, ShapeFrame};
use crate::topology::TriangleMesh;

/// Part of a wall that produced an intersection, in wall order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementKind {
    /// Vertical edge at the segment start.
    Edge1,
    /// Triangle touching the front of the wall.
    Face1,
    /// Diagonal edge of the wall.
    Edge2,
    /// Triangle touching the back of the wall.
    Face2,
}

/// Wall element that created an object mesh vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntersectingElement {
    /// Flat index of the segment's first shape point.
    pub shape_point_index: u32,
    pub kind: ElementKind,
    /// The segment starts its polygon.
    pub is_first: bool,
    /// The segment closes its polygon.
    pub is_last: bool,
}

/// Extruded walls of a shape set, as seen through one projection.
#[derive(Debug, Clone)]
pub struct ShapeMesh {
    frame: ShapeFrame,
    ids: ExPolygonsIndices,
    points: Vec<Point2>,
    front_back: Vec<Point3>,
}

impl ShapeMesh {
    /// Extrudes every shape point through `projection`.
    ///
    /// # Errors
    ///
    /// Fails when the projection is not affine or is degenerate.
    pub fn new<P: Project + ?Sized>(shapes: &[ExPolygon], projection: &P) -> Result<Self> {
        let frame = ShapeFrame::from_projection(projection)?;
        let ids = ExPolygonsIndices::new(shapes);
        let shape_points = to_points(shapes);
        let mut front_back = Vec::with_capacity(shape_points.len() * 2);
        for p in &shape_points {
            let (front, back) = projection.create_front_back(p);
            front_back.push(front);
            front_back.push(back);
        }
        Ok(Self {
            frame,
            ids,
            points: shape_points.iter().map(|p| p.to_f64()).collect(),
            front_back,
        })
    }

    #[must_use]
    pub fn frame(&self) -> &ShapeFrame {
        &self.frame
    }

    #[must_use]
    pub fn indices(&self) -> &ExPolygonsIndices {
        &self.ids
    }

    /// Number of shape points, equal to the number of walls.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.ids.count()
    }

    /// Shape point in shape units.
    #[must_use]
    pub fn point(&self, index: u32) -> Point2 {
        self.points[index as usize]
    }

    #[must_use]
    pub fn front(&self, index: u32) -> Point3 {
        self.front_back[2 * index as usize]
    }

    #[must_use]
    pub fn back(&self, index: u32) -> Point3 {
        self.front_back[2 * index as usize + 1]
    }

    /// Index of the wall's second point.
    #[must_use]
    pub fn next(&self, index: u32) -> u32 {
        self.ids.next_in_polygon(index)
    }

    /// End points of wall `index` in shape units.
    #[must_use]
    pub fn wall(&self, index: u32) -> (Point2, Point2) {
        (self.point(index), self.point(self.next(index)))
    }

    /// Element `kind` of the wall starting at `index`.
    #[must_use]
    pub fn element(&self, index: u32, kind: ElementKind) -> IntersectingElement {
        let id = self.ids.to_index(index);
        IntersectingElement {
            shape_point_index: index,
            kind,
            is_first: id.point_index == 0,
            is_last: self.ids.is_last_point(&id),
        }
    }

    /// Segment tree over all walls; line `k` is wall `k`.
    #[must_use]
    pub fn wall_tree(&self) -> LineTree {
        let lines = (0..self.count())
            .map(|k| {
                let (a, b) = self.wall(k);
                Line2::new(a, b)
            })
            .collect();
        LineTree::new(lines)
    }

    /// Largest absolute shape coordinate, used to scale tolerances.
    #[must_use]
    pub fn extent(&self) -> f64 {
        self.points
            .iter()
            .fold(0.0_f64, |m, p| m.max(p.x.abs()).max(p.y.abs()))
    }

    /// Walls as an indexed triangle set, two triangles per wall.
    #[must_use]
    pub fn to_triangle_mesh(&self) -> TriangleMesh {
        let mut indices = Vec::with_capacity(self.count() as usize * 2);
        for i in 0..self.count() {
            let j = self.next(i);
            let (fi, bi, fj, bj) = (2 * i, 2 * i + 1, 2 * j, 2 * j + 1);
            indices.push([fi, fj, bi]);
            indices.push([fj, bj, bi]);
        }
        TriangleMesh::new(self.front_back.clone(), indices)
    }
}
