use super::point::{BoundingBox, Point, Points};

/// Closed ring of integer points. The closing point is not repeated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Polygon {
    pub points: Points,
}

pub type Polygons = Vec<Polygon>;

impl Polygon {
    #[must_use]
    pub fn new(points: Points) -> Self {
        Self { points }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Directed segments `(points[i], points[i + 1])`, closing segment included.
    pub fn segments(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        let n = self.points.len();
        (0..n).map(move |i| (self.points[i], self.points[(i + 1) % n]))
    }

    /// Twice the signed area; positive for counter-clockwise rings.
    #[must_use]
    pub fn area2(&self) -> i128 {
        self.segments()
            .map(|(a, b)| i128::from(a.cross(b)))
            .sum()
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn area(&self) -> f64 {
        self.area2() as f64 * 0.5
    }

    #[must_use]
    pub fn is_counter_clockwise(&self) -> bool {
        self.area2() > 0
    }

    pub fn reverse(&mut self) {
        self.points.reverse();
    }

    /// Makes the ring counter-clockwise; returns `true` if it was reversed.
    pub fn make_counter_clockwise(&mut self) -> bool {
        if self.area2() < 0 {
            self.reverse();
            return true;
        }
        false
    }

    /// Makes the ring clockwise; returns `true` if it was reversed.
    pub fn make_clockwise(&mut self) -> bool {
        if self.area2() > 0 {
            self.reverse();
            return true;
        }
        false
    }

    /// Winding number of the ring around `p`. Points on the boundary count as
    /// outside.
    #[must_use]
    pub fn winding_number(&self, p: Point) -> i32 {
        let mut winding = 0;
        for (a, b) in self.segments() {
            if a.y <= p.y {
                if b.y > p.y && (b - a).cross(p - a) > 0 {
                    winding += 1;
                }
            } else if b.y <= p.y && (b - a).cross(p - a) < 0 {
                winding -= 1;
            }
        }
        winding
    }

    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        self.winding_number(p) != 0
    }
}

/// Polygon with holes. The contour is counter-clockwise, holes clockwise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExPolygon {
    pub contour: Polygon,
    pub holes: Polygons,
}

pub type ExPolygons = Vec<ExPolygon>;

impl ExPolygon {
    #[must_use]
    pub fn new(contour: Polygon, holes: Polygons) -> Self {
        Self { contour, holes }
    }

    /// Contour followed by the holes.
    pub fn polygons(&self) -> impl Iterator<Item = &Polygon> {
        std::iter::once(&self.contour).chain(self.holes.iter())
    }

    pub fn polygons_mut(&mut self) -> impl Iterator<Item = &mut Polygon> {
        std::iter::once(&mut self.contour).chain(self.holes.iter_mut())
    }

    #[must_use]
    pub fn num_points(&self) -> usize {
        self.polygons().map(Polygon::len).sum()
    }

    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        self.contour.contains(p) && !self.holes.iter().any(|h| h.contains(p))
    }

    #[must_use]
    pub fn area(&self) -> f64 {
        self.contour.area().abs() - self.holes.iter().map(|h| h.area().abs()).sum::<f64>()
    }
}

/// Open chain of integer points.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Polyline {
    pub points: Points,
}

pub type Polylines = Vec<Polyline>;

impl Polyline {
    #[must_use]
    pub fn new(points: Points) -> Self {
        Self { points }
    }
}

/// Flattens expolygons into contours and holes, in order.
#[must_use]
pub fn to_polygons(expolygons: &[ExPolygon]) -> Polygons {
    expolygons
        .iter()
        .flat_map(|e| e.polygons().cloned())
        .collect()
}

/// Total number of points over all contours and holes.
#[must_use]
pub fn count_points(expolygons: &[ExPolygon]) -> usize {
    expolygons.iter().map(ExPolygon::num_points).sum()
}

/// All points over all contours and holes, in flattened order.
#[must_use]
pub fn to_points(expolygons: &[ExPolygon]) -> Points {
    expolygons
        .iter()
        .flat_map(|e| e.polygons().flat_map(|p| p.points.iter().copied()))
        .collect()
}

#[must_use]
pub fn bounding_box_of(expolygons: &[ExPolygon]) -> Option<BoundingBox> {
    BoundingBox::from_points(expolygons.iter().flat_map(|e| e.contour.points.iter()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn square(x: i32, y: i32, size: i32) -> Polygon {
        Polygon::new(vec![
            Point::new(x, y),
            Point::new(x + size, y),
            Point::new(x + size, y + size),
            Point::new(x, y + size),
        ])
    }

    #[test]
    fn square_area_and_orientation() {
        let mut sq = square(0, 0, 10);
        assert_eq!(sq.area2(), 200);
        assert!(sq.is_counter_clockwise());
        assert!(sq.make_clockwise());
        assert!(!sq.is_counter_clockwise());
        assert!((sq.area() + 100.0).abs() < 1e-12);
    }

    #[test]
    fn winding_inside_and_outside() {
        let sq = square(0, 0, 10);
        assert_eq!(sq.winding_number(Point::new(5, 5)), 1);
        assert_eq!(sq.winding_number(Point::new(15, 5)), 0);
        let mut cw = sq.clone();
        cw.reverse();
        assert_eq!(cw.winding_number(Point::new(5, 5)), -1);
    }

    #[test]
    fn expolygon_hole_excludes_points() {
        let mut hole = square(4, 4, 2);
        hole.make_clockwise();
        let ex = ExPolygon::new(square(0, 0, 10), vec![hole]);
        assert!(ex.contains(Point::new(2, 2)));
        assert!(!ex.contains(Point::new(5, 5)));
        assert_eq!(ex.num_points(), 8);
        assert!((ex.area() - 96.0).abs() < 1e-12);
    }

    #[test]
    fn flatten_points_in_order() {
        let ex = vec![
            ExPolygon::new(square(0, 0, 1), vec![]),
            ExPolygon::new(square(5, 5, 1), vec![]),
        ];
        let pts = to_points(&ex);
        assert_eq!(pts.len(), count_points(&ex));
        assert_eq!(pts[4], Point::new(5, 5));
        let bb = bounding_box_of(&ex).unwrap();
        assert_eq!(bb.max, Point::new(6, 6));
    }
}
