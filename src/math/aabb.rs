use super::{Point2, Point3};

/// Axis-aligned bounding box in 3D.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb3 {
    pub min: Point3,
    pub max: Point3,
}

impl Default for Aabb3 {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aabb3 {
    /// Creates an empty (inverted) bounding box.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::MAX, f64::MAX, f64::MAX),
            max: Point3::new(f64::MIN, f64::MIN, f64::MIN),
        }
    }

    /// Creates a bounding box from a triangle.
    #[must_use]
    pub fn from_triangle(v0: &Point3, v1: &Point3, v2: &Point3) -> Self {
        let mut bb = Self::empty();
        bb.expand_point(v0);
        bb.expand_point(v1);
        bb.expand_point(v2);
        bb
    }

    /// Creates the bounding box of a point set.
    #[must_use]
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3>) -> Self {
        let mut bb = Self::empty();
        for p in points {
            bb.expand_point(p);
        }
        bb
    }

    /// Expands this bounding box to include another.
    pub fn expand(&mut self, other: &Self) {
        self.min = self.min.inf(&other.min);
        self.max = self.max.sup(&other.max);
    }

    /// Expands this bounding box to include a point.
    pub fn expand_point(&mut self, point: &Point3) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }

    /// Checks if this bounding box intersects another, with tolerance.
    #[must_use]
    pub fn intersects(&self, other: &Self, tolerance: f64) -> bool {
        (0..3).all(|i| {
            self.max[i] + tolerance >= other.min[i] && other.max[i] + tolerance >= self.min[i]
        })
    }

    #[must_use]
    pub fn center(&self) -> Point3 {
        nalgebra::center(&self.min, &self.max)
    }

    /// Index of the longest axis (0=X, 1=Y, 2=Z).
    #[must_use]
    pub fn longest_axis(&self) -> usize {
        let d = self.max - self.min;
        if d.x >= d.y && d.x >= d.z {
            0
        } else if d.y >= d.z {
            1
        } else {
            2
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// Slab test of the ray `origin + t * dir`, `t >= 0`.
    #[must_use]
    pub fn hit_by_ray(&self, origin: &Point3, inv_dir: &[f64; 3]) -> bool {
        let mut t_min = 0.0_f64;
        let mut t_max = f64::INFINITY;
        for i in 0..3 {
            let t1 = (self.min[i] - origin[i]) * inv_dir[i];
            let t2 = (self.max[i] - origin[i]) * inv_dir[i];
            // NaN from 0 * inf: the ray runs inside the slab plane.
            let (lo, hi) = if t1.is_nan() || t2.is_nan() {
                (f64::NEG_INFINITY, f64::INFINITY)
            } else {
                (t1.min(t2), t1.max(t2))
            };
            t_min = t_min.max(lo);
            t_max = t_max.min(hi);
            if t_min > t_max {
                return false;
            }
        }
        true
    }
}

/// Axis-aligned bounding box in 2D.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb2 {
    pub min: Point2,
    pub max: Point2,
}

impl Default for Aabb2 {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aabb2 {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            min: Point2::new(f64::MAX, f64::MAX),
            max: Point2::new(f64::MIN, f64::MIN),
        }
    }

    /// Creates a bounding box from a segment.
    #[must_use]
    pub fn from_segment(a: &Point2, b: &Point2) -> Self {
        Self {
            min: a.inf(b),
            max: a.sup(b),
        }
    }

    pub fn expand(&mut self, other: &Self) {
        self.min = self.min.inf(&other.min);
        self.max = self.max.sup(&other.max);
    }

    pub fn expand_point(&mut self, point: &Point2) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }

    #[must_use]
    pub fn intersects(&self, other: &Self, tolerance: f64) -> bool {
        (0..2).all(|i| {
            self.max[i] + tolerance >= other.min[i] && other.max[i] + tolerance >= self.min[i]
        })
    }

    #[must_use]
    pub fn center(&self) -> Point2 {
        nalgebra::center(&self.min, &self.max)
    }

    #[must_use]
    pub fn longest_axis(&self) -> usize {
        let d = self.max - self.min;
        usize::from(d.y > d.x)
    }

    /// Squared distance from `p` to the box; zero inside.
    #[must_use]
    pub fn distance_sq(&self, p: &Point2) -> f64 {
        let dx = (self.min.x - p.x).max(0.0).max(p.x - self.max.x);
        let dy = (self.min.y - p.y).max(0.0).max(p.y - self.max.y);
        dx * dx + dy * dy
    }
}
