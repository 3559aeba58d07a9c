use super::{Point2, Point3};

/// Sign of an orientation determinant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Negative,
    Zero,
    Positive,
}

impl Orientation {
    fn of(value: f64) -> Self {
        if value > 0.0 {
            Self::Positive
        } else if value < 0.0 {
            Self::Negative
        } else {
            Self::Zero
        }
    }
}

/// Signed volume determinant `det(q - p, r - p, s - p)`.
///
/// Positive when `s` lies on the side of plane `pqr` that `(q - p) x (r - p)`
/// points to.
#[must_use]
pub fn orient3d_value(p: &Point3, q: &Point3, r: &Point3, s: &Point3) -> f64 {
    let a = q - p;
    let b = r - p;
    let c = s - p;
    a.cross(&b).dot(&c)
}

/// Orientation of `s` against the oriented plane `pqr`.
#[must_use]
pub fn orient3d(p: &Point3, q: &Point3, r: &Point3, s: &Point3) -> Orientation {
    Orientation::of(orient3d_value(p, q, r, s))
}

/// Twice the signed area of triangle `abc`. Positive for counter-clockwise.
#[must_use]
pub fn orient2d_value(a: &Point2, b: &Point2, c: &Point2) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Orientation of `c` against the directed line `ab`.
#[must_use]
pub fn orient2d(a: &Point2, b: &Point2, c: &Point2) -> Orientation {
    Orientation::of(orient2d_value(a, b, c))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    #[test]
    fn orient3d_above_ccw_triangle_is_positive() {
        let o = orient3d(
            &p(0.0, 0.0, 0.0),
            &p(1.0, 0.0, 0.0),
            &p(0.0, 1.0, 0.0),
            &p(0.2, 0.2, 1.0),
        );
        assert_eq!(o, Orientation::Positive);
    }

    #[test]
    fn orient3d_coplanar_is_zero() {
        let o = orient3d(
            &p(0.0, 0.0, 0.0),
            &p(1.0, 0.0, 0.0),
            &p(0.0, 1.0, 0.0),
            &p(3.0, -2.0, 0.0),
        );
        assert_eq!(o, Orientation::Zero);
    }

    #[test]
    fn orient2d_left_turn() {
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(1.0, 0.0);
        assert_eq!(orient2d(&a, &b, &Point2::new(0.5, 1.0)), Orientation::Positive);
        assert_eq!(orient2d(&a, &b, &Point2::new(0.5, -1.0)), Orientation::Negative);
    }
}
