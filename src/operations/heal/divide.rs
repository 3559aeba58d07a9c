use crate::geometry::intersections::remove_same_neighbor_ex;
use crate::geometry::polygon::to_points;
use crate::geometry::{ExPolygon, ExPolygonsIndices, Point, Points};
use crate::math::line_tree::{Line2, LineTree};

/// Splits every segment that another shape point approaches within
/// `distance`, inserting that point into the segment.
///
/// A point never divides its own two segments, and segment end points are
/// never inserted twice. Returns `true` when any segment was divided.
#[allow(clippy::cast_possible_truncation)]
pub fn divide_segments_for_close_point(expolygons: &mut Vec<ExPolygon>, distance: f64) -> bool {
    if expolygons.is_empty() || distance < 0.0 {
        return false;
    }
    remove_same_neighbor_ex(expolygons);

    let ids = ExPolygonsIndices::new(expolygons);
    let points = to_points(expolygons);
    let lines: Vec<Line2> = (0..ids.count())
        .map(|i| {
            let a = points[i as usize];
            let b = points[ids.next_in_polygon(i) as usize];
            Line2::new(a.to_f64(), b.to_f64())
        })
        .collect();
    let tree = LineTree::new(lines);

    // (point, index of divided segment)
    let mut divs: Vec<(Point, u32)> = Vec::new();
    for (point_index, &p) in points.iter().enumerate() {
        let point_index = point_index as u32;
        let prev_line = ids.prev_in_polygon(point_index);
        for line in tree.in_radius(&p.to_f64(), distance) {
            let line = line as u32;
            if line == point_index || line == prev_line {
                continue;
            }
            let a = points[line as usize];
            let b = points[ids.next_in_polygon(line) as usize];
            if p == a || p == b {
                continue;
            }
            divs.push((p, line));
        }
    }
    if divs.is_empty() {
        return false;
    }

    // Highest index first so earlier insertions keep lower indices valid.
    divs.sort_by(|d1, d2| d2.1.cmp(&d1.1));
    for group in divs.chunk_by(|d1, d2| d1.1 == d2.1) {
        let line = group[0].1;
        let id = ids.to_index(line);
        let a = points[line as usize];
        let b = points[ids.next_in_polygon(line) as usize];
        let mut inserted: Points = group.iter().map(|d| d.0).collect();
        sort_along(&mut inserted, a, b);
        inserted.dedup();

        let expolygon = &mut expolygons[id.expolygons_index as usize];
        let polygon = if id.polygon_index == 0 {
            &mut expolygon.contour
        } else {
            &mut expolygon.holes[id.polygon_index as usize - 1]
        };
        let at = id.point_index as usize + 1;
        polygon.points.splice(at..at, inserted);
    }
    true
}

/// Orders points along the dominant axis of the direction `a -> b`.
fn sort_along(points: &mut Points, a: Point, b: Point) {
    let dir = b - a;
    let key = |p: &Point| {
        if dir.x.abs() > dir.y.abs() {
            if dir.x < 0 { -p.x } else { p.x }
        } else if dir.y < 0 {
            -p.y
        } else {
            p.y
        }
    };
    points.sort_by_key(key);
}
