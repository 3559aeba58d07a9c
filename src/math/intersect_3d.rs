use super::{Point3, Vector3, TOLERANCE};

/// Unit normal of triangle `abc` (counter-clockwise winding), or `None` when
/// the triangle is degenerate.
#[must_use]
pub fn triangle_normal(a: &Point3, b: &Point3, c: &Point3) -> Option<Vector3> {
    let n = (b - a).cross(&(c - a));
    let len = n.norm();
    if len < TOLERANCE {
        None
    } else {
        Some(n / len)
    }
}

/// Möller–Trumbore ray/triangle intersection, double sided.
///
/// Returns the ray parameter `t > 0` of the hit point `origin + t * dir`.
#[must_use]
pub fn ray_triangle_intersect(
    origin: &Point3,
    dir: &Vector3,
    a: &Point3,
    b: &Point3,
    c: &Point3,
) -> Option<f64> {
    let e1 = b - a;
    let e2 = c - a;
    let pvec = dir.cross(&e2);
    let det = e1.dot(&pvec);
    if det.abs() < TOLERANCE {
        return None;
    }
    let inv_det = 1.0 / det;
    let tvec = origin - a;
    let u = tvec.dot(&pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let qvec = tvec.cross(&e1);
    let v = dir.dot(&qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(&qvec) * inv_det;
    (t > TOLERANCE).then_some(t)
}

/// Crossing of segment `pq` with triangle `abc`.
///
/// Returns the segment parameter in `[0, 1]` and the point, or `None` when the
/// segment misses the triangle or is parallel to its plane.
#[must_use]
pub fn segment_triangle_intersect(
    p: &Point3,
    q: &Point3,
    a: &Point3,
    b: &Point3,
    c: &Point3,
) -> Option<(f64, Point3)> {
    let dir = q - p;
    let e1 = b - a;
    let e2 = c - a;
    let pvec = dir.cross(&e2);
    let det = e1.dot(&pvec);
    if det.abs() < TOLERANCE {
        return None;
    }
    let inv_det = 1.0 / det;
    let tvec = p - a;
    let u = tvec.dot(&pvec) * inv_det;
    if !(-TOLERANCE..=1.0 + TOLERANCE).contains(&u) {
        return None;
    }
    let qvec = tvec.cross(&e1);
    let v = dir.dot(&qvec) * inv_det;
    if v < -TOLERANCE || u + v > 1.0 + TOLERANCE {
        return None;
    }
    let t = e2.dot(&qvec) * inv_det;
    if !(-TOLERANCE..=1.0 + TOLERANCE).contains(&t) {
        return None;
    }
    let t = t.clamp(0.0, 1.0);
    Some((t, p + dir * t))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    #[test]
    fn normal_of_ccw_triangle() {
        let n = triangle_normal(&p(0.0, 0.0, 0.0), &p(1.0, 0.0, 0.0), &p(0.0, 1.0, 0.0)).unwrap();
        assert_relative_eq!(n, Vector3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn degenerate_triangle_has_no_normal() {
        assert!(triangle_normal(&p(0.0, 0.0, 0.0), &p(1.0, 1.0, 1.0), &p(2.0, 2.0, 2.0)).is_none());
    }

    #[test]
    fn ray_hits_from_both_sides() {
        let (a, b, c) = (p(0.0, 0.0, 1.0), p(2.0, 0.0, 1.0), p(0.0, 2.0, 1.0));
        let up = ray_triangle_intersect(&p(0.5, 0.5, 0.0), &Vector3::z(), &a, &b, &c).unwrap();
        assert_relative_eq!(up, 1.0);
        let down =
            ray_triangle_intersect(&p(0.5, 0.5, 3.0), &-Vector3::z(), &a, &b, &c).unwrap();
        assert_relative_eq!(down, 2.0);
        assert!(ray_triangle_intersect(&p(0.5, 0.5, 3.0), &Vector3::z(), &a, &b, &c).is_none());
    }

    #[test]
    fn segment_crossing_triangle() {
        let (t, pt) = segment_triangle_intersect(
            &p(0.2, 0.2, -1.0),
            &p(0.2, 0.2, 3.0),
            &p(0.0, 0.0, 0.0),
            &p(1.0, 0.0, 0.0),
            &p(0.0, 1.0, 0.0),
        )
        .unwrap();
        assert_relative_eq!(t, 0.25);
        assert_relative_eq!(pt, p(0.2, 0.2, 0.0));
    }

    #[test]
    fn segment_short_of_triangle() {
        assert!(segment_triangle_intersect(
            &p(0.2, 0.2, 1.0),
            &p(0.2, 0.2, 3.0),
            &p(0.0, 0.0, 0.0),
            &p(1.0, 0.0, 0.0),
            &p(0.0, 1.0, 0.0),
        )
        .is_none());
    }
}
