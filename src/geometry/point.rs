use std::ops::{Add, Neg, Sub};

use crate::math::Point2;

/// Scale between font design units and shape coordinates.
pub const SHAPE_SCALE: f64 = 0.001;

/// Integer 2D point of a shape outline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

pub type Points = Vec<Point>;

impl Point {
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Rounds a floating point position to the nearest integer point.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_f64(x: f64, y: f64) -> Self {
        Self {
            x: x.round() as i32,
            y: y.round() as i32,
        }
    }

    #[must_use]
    pub fn to_f64(self) -> Point2 {
        Point2::new(f64::from(self.x), f64::from(self.y))
    }

    /// Exact 2D cross product of two points taken as vectors.
    #[must_use]
    pub fn cross(self, other: Self) -> i64 {
        i64::from(self.x) * i64::from(other.y) - i64::from(self.y) * i64::from(other.x)
    }

    #[must_use]
    pub fn dot(self, other: Self) -> i64 {
        i64::from(self.x) * i64::from(other.x) + i64::from(self.y) * i64::from(other.y)
    }

    #[must_use]
    pub fn length_sq(self) -> i64 {
        self.dot(self)
    }
}

impl Add for Point {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for Point {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

/// Axis-aligned integer bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
}

impl BoundingBox {
    #[must_use]
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    /// Bounding box of a point set, `None` when empty.
    #[must_use]
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        let mut bb = Self::new(first, first);
        for p in iter {
            bb.merge_point(*p);
        }
        Some(bb)
    }

    pub fn merge_point(&mut self, p: Point) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
    }

    pub fn merge(&mut self, other: &Self) {
        self.merge_point(other.min);
        self.merge_point(other.max);
    }

    #[must_use]
    pub fn size(&self) -> Point {
        self.max - self.min
    }

    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(
            self.min.x + (self.max.x - self.min.x) / 2,
            self.min.y + (self.max.y - self.min.y) / 2,
        )
    }

    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }

    /// Corners in the order min, (min.x, max.y), max, (max.x, min.y).
    #[must_use]
    pub fn corners(&self) -> [Point; 4] {
        [
            self.min,
            Point::new(self.min.x, self.max.y),
            self.max,
            Point::new(self.max.x, self.min.y),
        ]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn cross_and_dot_are_exact() {
        let a = Point::new(i32::MAX, 1);
        let b = Point::new(1, i32::MAX);
        assert_eq!(a.cross(b), i64::from(i32::MAX) * i64::from(i32::MAX) - 1);
        assert_eq!(Point::new(3, 4).length_sq(), 25);
    }

    #[test]
    fn bounding_box_of_points() {
        let pts = [Point::new(3, -1), Point::new(-2, 5), Point::new(0, 0)];
        let bb = BoundingBox::from_points(&pts).unwrap();
        assert_eq!(bb.min, Point::new(-2, -1));
        assert_eq!(bb.max, Point::new(3, 5));
        assert_eq!(bb.size(), Point::new(5, 6));
        assert!(bb.contains(Point::new(0, 4)));
        assert!(!bb.contains(Point::new(4, 0)));
    }

    #[test]
    fn empty_points_have_no_box() {
        let pts: [Point; 0] = [];
        assert!(BoundingBox::from_points(&pts).is_none());
    }
}
