use crate::geometry::{BoundingBox, ExPolygon, Point, Polygon};

/// Limits of a sharp corner that healing is allowed to bevel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpikeDesc {
    /// Cosine of the widest corner still treated as a spike.
    pub cos_angle: f64,
    /// Half of the bevel width left after the tip is cut.
    pub half_bevel: f64,
}

impl SpikeDesc {
    /// `bevel_size` is the width of the corner after cutting its tip and
    /// should be greater than 2.5. A corner is a spike when at least
    /// `pixel_spike_length` units of it are narrower than one unit.
    #[must_use]
    pub fn new(bevel_size: f64, pixel_spike_length: f64) -> Self {
        Self {
            cos_angle: (2.0 * pixel_spike_length.atan2(0.5)).cos().abs(),
            half_bevel: bevel_size / 2.0,
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn along(b: Point, dir: (f64, f64), size_sq: f64, wanted: f64) -> Point {
    let len = size_sq.sqrt();
    Point::new(
        b.x + (wanted * dir.0 / len) as i32,
        b.y + (wanted * dir.1 / len) as i32,
    )
}

/// Bevels the corner at `index` when it is a spike.
///
/// Both sides shorter than the bevel: the corner point is erased. One side
/// short: the point slides along the other side. Both long: the point slides
/// along the next side and a second point is inserted on the previous side.
///
/// Returns `true` when the point was erased, which can leave fewer than three
/// points.
pub fn remove_when_spike(polygon: &mut Polygon, index: usize, desc: &SpikeDesc) -> bool {
    let pts = &mut polygon.points;
    let n = pts.len();
    if n < 3 {
        return false;
    }
    let a = pts[(index + n - 1) % n];
    let b = pts[index];
    let c = pts[(index + 1) % n];

    let ba = (f64::from(a.x - b.x), f64::from(a.y - b.y));
    let bc = (f64::from(c.x - b.x), f64::from(c.y - b.y));
    let ba_size_sq = ba.0 * ba.0 + ba.1 * ba.1;
    let bc_size_sq = bc.0 * bc.0 + bc.1 * bc.1;
    let cos_angle = (ba.0 * bc.0 + ba.1 * bc.1) / (ba_size_sq * bc_size_sq).sqrt();

    // NaN comes from a zero-length side.
    if cos_angle.is_nan() || cos_angle < desc.cos_angle {
        return false;
    }
    let angle = cos_angle.min(1.0).acos();
    let wanted_size = desc.half_bevel / (angle / 2.0).cos();
    let wanted_size_sq = wanted_size * wanted_size;

    let is_ba_short = ba_size_sq < wanted_size_sq;
    let is_bc_short = bc_size_sq < wanted_size_sq;

    if is_ba_short && is_bc_short {
        pts.remove(index);
        return true;
    }
    if is_ba_short {
        pts[index] = along(b, bc, bc_size_sq, wanted_size);
    } else if is_bc_short {
        pts[index] = along(b, ba, ba_size_sq, wanted_size);
    } else {
        let c_side = along(b, bc, bc_size_sq, wanted_size);
        let a_side = along(b, ba, ba_size_sq, wanted_size);
        if a_side == c_side {
            pts.remove(index);
            return true;
        }
        pts[index] = c_side;
        pts.insert(index, a_side);
    }
    false
}

fn remove_spikes_at(polygon: &mut Polygon, d: Point, desc: &SpikeDesc) -> bool {
    let mut exist_remove = false;
    let mut i = 0;
    while i < polygon.points.len() {
        if polygon.points[i] == d {
            exist_remove |= remove_when_spike(polygon, i, desc);
        }
        i += 1;
    }
    exist_remove && polygon.len() < 3
}

/// Bevels spikes located at duplicate points and drops rings that collapse.
pub fn remove_spikes_in_duplicates(
    expolygons: &mut Vec<ExPolygon>,
    duplicates: &[Point],
    desc: &SpikeDesc,
) {
    if duplicates.is_empty() {
        return;
    }
    let mut exist_remove = false;
    for expolygon in expolygons.iter_mut() {
        let Some(bb) = BoundingBox::from_points(&expolygon.contour.points) else {
            continue;
        };
        for &d in duplicates {
            if !bb.contains(d) {
                continue;
            }
            exist_remove |= remove_spikes_at(&mut expolygon.contour, d, desc);
            for hole in &mut expolygon.holes {
                exist_remove |= remove_spikes_at(hole, d, desc);
            }
        }
    }
    if exist_remove {
        remove_bad(expolygons);
    }
}

/// Drops contours and holes with fewer than three points.
pub fn remove_bad(expolygons: &mut Vec<ExPolygon>) {
    expolygons.retain(|e| e.contour.len() >= 3);
    for expolygon in expolygons.iter_mut() {
        expolygon.holes.retain(|h| h.len() >= 3);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pt(x: i32, y: i32) -> Point {
        Point::new(x, y)
    }

    fn desc() -> SpikeDesc {
        SpikeDesc::new(1000.0, 5.0)
    }

    #[test]
    fn desc_from_pixel_length() {
        let d = desc();
        assert_relative_eq!(d.half_bevel, 500.0);
        assert_relative_eq!(d.cos_angle, (2.0 * 5.0_f64.atan2(0.5)).cos().abs());
        assert!(d.cos_angle > 0.98 && d.cos_angle < 0.99);
    }

    #[test]
    fn square_corner_is_not_spike() {
        let mut square = Polygon::new(vec![pt(0, 0), pt(10, 0), pt(10, 10), pt(0, 10)]);
        let before = square.clone();
        assert!(!remove_when_spike(&mut square, 0, &desc()));
        assert_eq!(square, before);
    }

    #[test]
    fn short_spike_is_erased() {
        let mut thin = Polygon::new(vec![pt(0, 0), pt(100, -1), pt(100, 1)]);
        assert!(remove_when_spike(&mut thin, 0, &desc()));
        assert_eq!(thin.len(), 2);
    }

    #[test]
    fn long_spike_is_beveled() {
        let mut thin = Polygon::new(vec![pt(0, 0), pt(100_000, -1000), pt(100_000, 1000)]);
        assert!(!remove_when_spike(&mut thin, 0, &desc()));
        assert_eq!(thin.len(), 4);
        let a_side = thin.points[0];
        let c_side = thin.points[1];
        assert!((a_side.x - 500).abs() <= 1 && (a_side.y - 5).abs() <= 1);
        assert!((c_side.x - 500).abs() <= 1 && (c_side.y + 5).abs() <= 1);
    }

    #[test]
    fn one_short_side_moves_tip() {
        let mut thin = Polygon::new(vec![pt(0, 0), pt(100_000, -1000), pt(300, 3)]);
        assert!(!remove_when_spike(&mut thin, 0, &desc()));
        assert_eq!(thin.len(), 3);
        let tip = thin.points[0];
        assert!((tip.x - 500).abs() <= 1 && (tip.y + 5).abs() <= 1);
    }

    #[test]
    fn collapsed_rings_are_dropped() {
        let mut shapes = vec![ExPolygon::new(
            Polygon::new(vec![pt(0, 0), pt(100, -1), pt(100, 1)]),
            vec![],
        )];
        remove_spikes_in_duplicates(&mut shapes, &[pt(0, 0)], &desc());
        assert!(shapes.is_empty());
    }
}
