use std::collections::HashMap;

use crate::error::Result;
use crate::geometry::polygon::to_points;
use crate::geometry::{ExPolygon, Point};
use crate::math::{Point2, Point3};
use crate::operations::projection::Project;
use crate::topology::TriangleMesh;

use super::triangulate::triangulate_region;

/// Closed solid of `shapes` extruded between the front and back of
/// `projection`.
///
/// Points shared by several rings become one vertex. Front triangles face
/// against the projection, back triangles along it.
///
/// # Errors
///
/// Fails when the shapes can not be triangulated, e.g. for crossing rings.
#[allow(clippy::cast_possible_truncation)]
pub fn polygons_to_model<P: Project + ?Sized>(
    shapes: &[ExPolygon],
    projection: &P,
) -> Result<TriangleMesh> {
    let points = to_points(shapes);
    let mut unique: HashMap<Point, u32> = HashMap::with_capacity(points.len());
    let mut planar: Vec<Point2> = Vec::with_capacity(points.len());
    let changes: Vec<u32> = points
        .iter()
        .map(|p| {
            *unique.entry(*p).or_insert_with(|| {
                planar.push(p.to_f64());
                (planar.len() - 1) as u32
            })
        })
        .collect();

    let mut boundary = Vec::with_capacity(points.len());
    let mut offset = 0_usize;
    for polygon in shapes.iter().flat_map(ExPolygon::polygons) {
        let n = polygon.len();
        for i in 0..n {
            boundary.push((changes[offset + i], changes[offset + (i + 1) % n]));
        }
        offset += n;
    }
    let triangles = triangulate_region(&planar, &boundary, &[])?;

    let count = planar.len() as u32;
    let mut front: Vec<Point3> = Vec::with_capacity(2 * planar.len());
    let mut back: Vec<Point3> = Vec::with_capacity(planar.len());
    for p in &planar {
        let (f, b) = projection.create_front_back(&Point::from_f64(p.x, p.y));
        front.push(f);
        back.push(b);
    }
    front.extend(back);

    let mut indices = Vec::with_capacity(2 * triangles.len() + 2 * boundary.len());
    indices.extend(triangles.iter().map(|&[x, y, z]| [x, z, y]));
    indices.extend(triangles.iter().map(|t| t.map(|i| i + count)));
    for &(prev, index) in &boundary {
        if prev == index {
            continue;
        }
        indices.push([index, index + count, prev]);
        indices.push([prev + count, prev, index + count]);
    }
    Ok(TriangleMesh::new(front, indices))
}
