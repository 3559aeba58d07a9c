use crate::error::{Result, TopologyError};
use crate::math::Point3;
use crate::operations::cut::SurfaceCut;
use crate::operations::projection::Project3d;
use crate::topology::TriangleMesh;

fn check_index(index: u32, count: usize, entity: &'static str) -> Result<()> {
    if index as usize >= count {
        return Err(TopologyError::IndexOutOfRange {
            entity,
            index: index as usize,
            count,
        }
        .into());
    }
    Ok(())
}

/// Extrudes a surface cut along `projection` into a closed solid.
///
/// The front is the cut itself, the back its projected copy with reversed
/// triangles, and every contour edge gets a quad of two triangles joining
/// both. For `n` vertices, `f` triangles and contours of total length `c`
/// the solid has `2n` vertices and `2f + 2c` triangles.
///
/// # Errors
///
/// Returns [`TopologyError::IndexOutOfRange`] when a triangle or a contour
/// refers to a missing vertex.
#[allow(clippy::cast_possible_truncation)]
pub fn cut_to_solid<P: Project3d + ?Sized>(
    cut: &SurfaceCut,
    projection: &P,
) -> Result<TriangleMesh> {
    let count = cut.vertices.len();
    for &i in cut.indices.iter().flatten() {
        check_index(i, count, "triangle vertex")?;
    }
    for &i in cut.contours.iter().flatten() {
        check_index(i, count, "contour vertex")?;
    }

    let n = count as u32;
    let mut vertices: Vec<Point3> = Vec::with_capacity(2 * count);
    vertices.extend_from_slice(&cut.vertices);
    vertices.extend(cut.vertices.iter().map(|v| projection.project(v)));

    let contour_len: usize = cut.contours.iter().map(Vec::len).sum();
    let mut indices = Vec::with_capacity(2 * cut.indices.len() + 2 * contour_len);
    indices.extend_from_slice(&cut.indices);
    indices.extend(cut.indices.iter().map(|&[x, y, z]| [x + n, z + n, y + n]));

    for contour in &cut.contours {
        let Some(&last) = contour.last() else {
            continue;
        };
        let mut prev_front = last;
        for &front in contour {
            let (back, prev_back) = (front + n, prev_front + n);
            indices.push([front, prev_front, back]);
            indices.push([prev_front, prev_back, back]);
            prev_front = front;
        }
    }
    Ok(TriangleMesh::new(vertices, indices))
}
