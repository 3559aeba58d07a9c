//! Flat numbering of every point of an expolygon set.
//!
//! Points are counted per expolygon: contour first, then each hole in order.

use super::polygon::ExPolygon;

/// Structured address of one point inside an expolygon set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ExPolygonsIndex {
    pub expolygons_index: u32,
    /// 0 is the contour, `k` is hole `k - 1`.
    pub polygon_index: u32,
    pub point_index: u32,
}

/// Converts between flat point indices and [`ExPolygonsIndex`].
#[derive(Debug, Clone, Default)]
pub struct ExPolygonsIndices {
    /// Flat index of the first point of each polygon, per expolygon.
    offsets: Vec<Vec<u32>>,
    /// Number of points of each polygon, per expolygon.
    sizes: Vec<Vec<u32>>,
    /// Flat index of the first point of each expolygon plus a final total.
    starts: Vec<u32>,
    count: u32,
}

impl ExPolygonsIndices {
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(shapes: &[ExPolygon]) -> Self {
        let mut offsets = Vec::with_capacity(shapes.len());
        let mut sizes = Vec::with_capacity(shapes.len());
        let mut starts = Vec::with_capacity(shapes.len() + 1);
        let mut count = 0_u32;
        for shape in shapes {
            starts.push(count);
            let mut o = Vec::with_capacity(shape.holes.len() + 1);
            let mut s = Vec::with_capacity(shape.holes.len() + 1);
            for polygon in shape.polygons() {
                o.push(count);
                s.push(polygon.len() as u32);
                count += polygon.len() as u32;
            }
            offsets.push(o);
            sizes.push(s);
        }
        starts.push(count);
        Self {
            offsets,
            sizes,
            starts,
            count,
        }
    }

    /// Total number of points.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Number of expolygons.
    #[must_use]
    pub fn expolygons_count(&self) -> usize {
        self.offsets.len()
    }

    /// Flat index of a structured address.
    #[must_use]
    pub fn to_flat(&self, id: &ExPolygonsIndex) -> u32 {
        self.offsets[id.expolygons_index as usize][id.polygon_index as usize] + id.point_index
    }

    /// Structured address of a flat index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below [`count`](Self::count).
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_index(&self, index: u32) -> ExPolygonsIndex {
        assert!(index < self.count, "point index {index} out of range");
        // Last expolygon whose start is <= index; empty expolygons are skipped.
        let e = self.starts.partition_point(|&s| s <= index) - 1;
        let offsets = &self.offsets[e];
        let p = offsets.partition_point(|&o| o <= index) - 1;
        ExPolygonsIndex {
            expolygons_index: e as u32,
            polygon_index: p as u32,
            point_index: index - offsets[p],
        }
    }

    /// Whether the point is the last one of its polygon.
    #[must_use]
    pub fn is_last_point(&self, id: &ExPolygonsIndex) -> bool {
        id.point_index + 1 == self.sizes[id.expolygons_index as usize][id.polygon_index as usize]
    }

    /// Flat index of the first point of the polygon containing `index`.
    #[must_use]
    pub fn polygon_start(&self, index: u32) -> u32 {
        let mut id = self.to_index(index);
        id.point_index = 0;
        self.to_flat(&id)
    }

    /// Flat index of the following point in the same polygon, wrapping.
    #[must_use]
    pub fn next_in_polygon(&self, index: u32) -> u32 {
        let id = self.to_index(index);
        if self.is_last_point(&id) {
            index - id.point_index
        } else {
            index + 1
        }
    }

    /// Flat index of the preceding point in the same polygon, wrapping.
    #[must_use]
    pub fn prev_in_polygon(&self, index: u32) -> u32 {
        let id = self.to_index(index);
        if id.point_index == 0 {
            index + self.sizes[id.expolygons_index as usize][id.polygon_index as usize] - 1
        } else {
            index - 1
        }
    }

    /// Expolygon owning the flat index.
    #[must_use]
    pub fn expolygon_of(&self, index: u32) -> u32 {
        self.to_index(index).expolygons_index
    }
}
