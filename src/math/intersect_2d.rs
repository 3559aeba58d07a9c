use super::{Point2, Vector2, TOLERANCE};

/// Parameters `(t, u)` of the crossing of segments `a0a1` and `b0b1`.
///
/// Both parameters are in `[-eps, 1 + eps]` when returned. Parallel segments
/// return `None`.
#[must_use]
pub fn segment_segment_params(
    a0: &Point2,
    a1: &Point2,
    b0: &Point2,
    b1: &Point2,
    eps: f64,
) -> Option<(f64, f64)> {
    let da = a1 - a0;
    let db = b1 - b0;
    let cross = da.perp(&db);
    let scale = da.norm() * db.norm();
    if scale < TOLERANCE || cross.abs() <= TOLERANCE * scale {
        return None;
    }
    let d = b0 - a0;
    let t = d.perp(&db) / cross;
    let u = d.perp(&da) / cross;
    let range = -eps..=1.0 + eps;
    (range.contains(&t) && range.contains(&u)).then_some((t, u))
}

/// Parameter of the projection of `p` onto the line through `a` and `b`.
#[must_use]
pub fn project_param(a: &Point2, b: &Point2, p: &Point2) -> f64 {
    let d = b - a;
    let len_sq = d.norm_squared();
    if len_sq < TOLERANCE * TOLERANCE {
        return 0.0;
    }
    (p - a).dot(&d) / len_sq
}

/// Closest point on segment `ab` to `p` with its clamped parameter.
#[must_use]
pub fn closest_point_on_segment(a: &Point2, b: &Point2, p: &Point2) -> (Point2, f64) {
    let t = project_param(a, b, p).clamp(0.0, 1.0);
    (a + (b - a) * t, t)
}

/// Squared distance from `p` to segment `ab`.
#[must_use]
pub fn point_segment_distance_sq(a: &Point2, b: &Point2, p: &Point2) -> f64 {
    let (c, _) = closest_point_on_segment(a, b, p);
    (p - c).norm_squared()
}

/// Distance of `p` from the infinite line `ab`, signed: positive on the left.
#[must_use]
pub fn signed_line_distance(a: &Point2, b: &Point2, p: &Point2) -> f64 {
    let d: Vector2 = b - a;
    let len = d.norm();
    if len < TOLERANCE {
        return (p - a).norm();
    }
    d.perp(&(p - a)) / len
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn p(x: f64, y: f64) -> Point2 {
        Point2::new(x, y)
    }

    // ── segment crossing ──

    #[test]
    fn crossing_segments() {
        let (t, u) =
            segment_segment_params(&p(0.0, 0.0), &p(2.0, 0.0), &p(1.0, -1.0), &p(1.0, 3.0), 0.0)
                .unwrap();
        assert_relative_eq!(t, 0.5);
        assert_relative_eq!(u, 0.25);
    }

    #[test]
    fn parallel_segments() {
        assert!(
            segment_segment_params(&p(0.0, 0.0), &p(1.0, 0.0), &p(0.0, 1.0), &p(1.0, 1.0), 0.0)
                .is_none()
        );
    }

    #[test]
    fn touching_at_endpoint_within_eps() {
        let hit =
            segment_segment_params(&p(0.0, 0.0), &p(1.0, 0.0), &p(1.0, 0.0), &p(1.0, 1.0), 1e-9);
        let (t, u) = hit.unwrap();
        assert_relative_eq!(t, 1.0);
        assert_relative_eq!(u, 0.0);
    }

    // ── distances ──

    #[test]
    fn distance_to_segment() {
        let (a, b) = (p(0.0, 0.0), p(4.0, 0.0));
        assert_relative_eq!(point_segment_distance_sq(&a, &b, &p(2.0, 3.0)), 9.0);
        assert_relative_eq!(point_segment_distance_sq(&a, &b, &p(7.0, 4.0)), 25.0);
    }

    #[test]
    fn signed_distance_sides() {
        assert_relative_eq!(signed_line_distance(&p(0.0, 0.0), &p(1.0, 0.0), &p(0.0, 2.0)), 2.0);
        assert_relative_eq!(signed_line_distance(&p(0.0, 0.0), &p(1.0, 0.0), &p(0.0, -2.0)), -2.0);
    }
}
