#![allow(clippy::unwrap_used)]

use surfcut::geometry::intersections::get_intersection_lines;
use surfcut::geometry::{ExPolygon, Point, Polygon, SHAPE_SCALE};
use surfcut::math::Point3;
use surfcut::operations::cut::cut_surface;
use surfcut::operations::heal::{heal_expolygons, heal_polygons};
use surfcut::operations::projection::{ProjectScale, ProjectZ};
use surfcut::shapes::{self, text_to_shapes, FontMetrics, FontProp, Glyph, GlyphSource};
use surfcut::tessellation::{cut_to_solid, polygons_to_model};
use surfcut::topology::TriangleMesh;

fn pt(x: i32, y: i32) -> Point {
    Point::new(x, y)
}

struct BlockFont;

impl GlyphSource for BlockFont {
    fn metrics(&self) -> FontMetrics {
        FontMetrics {
            ascent: 8,
            descent: -2,
            linegap: 1,
        }
    }

    fn glyph(&self, letter: char, _flatness: f64) -> Option<Glyph> {
        letter.is_ascii_alphabetic().then(|| Glyph {
            contours: vec![Polygon::new(vec![pt(0, 0), pt(2000, 0), pt(2000, 3000), pt(0, 3000)])],
            advance_width: 3,
            left_side_bearing: 0,
        })
    }
}

// ── healing ──

#[test]
fn bowtie_is_never_returned_as_is() {
    let bowtie = Polygon::new(vec![pt(0, 0), pt(10, 10), pt(10, 0), pt(0, 10)]);
    let healed = heal_polygons(std::slice::from_ref(&bowtie), true, 10);
    assert!(healed.is_healed);
    assert!(!healed.expolygons.is_empty());
    for expolygon in &healed.expolygons {
        assert_ne!(expolygon.contour, bowtie);
        assert!(expolygon.contour.len() >= 3);
    }
    assert!(get_intersection_lines(&healed.expolygons).is_empty());
}

#[test]
fn second_healing_changes_nothing() {
    let star = Polygon::new(vec![
        pt(0, 0),
        pt(1000, 3000),
        pt(2000, 0),
        pt(-500, 2000),
        pt(2500, 2000),
    ]);
    let first = heal_polygons(&[star], true, 10);
    assert!(first.is_healed);
    let mut again = first.expolygons.clone();
    assert!(heal_expolygons(&mut again, 10));
    assert_eq!(again, first.expolygons);
}

// ── text to solid ──

#[test]
fn text_is_cut_from_plane() {
    let mut letters = text_to_shapes(&BlockFont, "ab", &FontProp::default());
    shapes::center(&mut letters);
    let shape: Vec<ExPolygon> = letters.into_iter().flat_map(|s| s.shape).collect();
    assert_eq!(shape.len(), 2);

    let plane = TriangleMesh::new(
        vec![
            Point3::new(-10.0, -10.0, 2.0),
            Point3::new(10.0, -10.0, 2.0),
            Point3::new(10.0, 10.0, 2.0),
            Point3::new(-10.0, 10.0, 2.0),
        ],
        vec![[0, 1, 3], [1, 2, 3]],
    );
    // Shape points are micrometers, the model is in millimeters.
    let projection = ProjectScale::new(ProjectZ::new(5.0 / SHAPE_SCALE), SHAPE_SCALE);
    let cut = cut_surface(&shape, &[plane], &projection, 0.5);
    assert_eq!(cut.contours.len(), 2);
    let area: f64 = cut
        .indices
        .iter()
        .map(|t| {
            let [a, b, c] = t.map(|i| cut.vertices[i as usize]);
            (b - a).cross(&(c - a)).norm() / 2.0
        })
        .sum();
    approx::assert_relative_eq!(area, 12.0, epsilon = 1e-6);

    let solid = cut_to_solid(&cut, &projection).unwrap();
    assert_eq!(solid.count_open_edges(), 0);
}

#[test]
fn text_extrudes_to_closed_model() {
    let letters = text_to_shapes(&BlockFont, "a b", &FontProp::default());
    let shape: Vec<ExPolygon> = letters.into_iter().flat_map(|s| s.shape).collect();
    let model = polygons_to_model(&shape, &ProjectZ::new(1000.0)).unwrap();
    assert_eq!(model.vertices.len(), 16);
    assert_eq!(model.count_open_edges(), 0);
}
