//! Clipping of a surface patch by the surface of another model.
//!
//! The patch is refined along its intersection with the other model, then
//! every piece enclosed by that model is dropped. Pieces are told apart by
//! ray parity, so the other model only needs to be closed around the patch.

use std::collections::HashSet;

use smallvec::SmallVec;

use super::patch::{connected_components, create_surface_patch, SurfacePatch};
use crate::math::aabb::Aabb3;
use crate::math::bvh::TriangleBvh;
use crate::math::intersect_3d::{segment_triangle_intersect, triangle_normal};
use crate::math::{Point2, Point3, Vector3};
use crate::tessellation::triangulate::triangulate_region;
use crate::topology::{FaceId, HalfEdgeMesh, Handle, PropertyMap, TriangleMesh, VertexId};

/// Relative tolerance for snapping intersections.
const REL_EPS: f64 = 1e-9;

/// Flipped copy of a model used for inside tests and clipping.
#[derive(Debug)]
pub struct NegativeModel {
    mesh: TriangleMesh,
    bvh: TriangleBvh,
}

impl NegativeModel {
    #[must_use]
    pub fn new(mesh: TriangleMesh) -> Self {
        let bvh = TriangleBvh::build(&mesh.vertices, &mesh.indices);
        Self { mesh, bvh }
    }

    #[must_use]
    pub fn mesh(&self) -> &TriangleMesh {
        &self.mesh
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bvh.is_empty()
    }

    /// Number of surface crossings of the ray `origin + t * dir`, `t > 0`.
    /// Hits on a shared edge count once.
    #[must_use]
    pub fn count_hits(&self, origin: &Point3, dir: &Vector3) -> usize {
        let mut hits = self
            .bvh
            .ray_hits(&self.mesh.vertices, &self.mesh.indices, origin, dir);
        hits.sort_by(f64::total_cmp);
        hits.dedup_by(|later, kept| (*later - *kept).abs() <= REL_EPS * (1.0 + kept.abs()));
        hits.len()
    }

    /// Odd ray parity.
    #[must_use]
    pub fn is_inside(&self, origin: &Point3, dir: &Vector3) -> bool {
        self.count_hits(origin, dir) % 2 == 1
    }

    fn candidates(&self, bb: &Aabb3, eps: f64) -> Vec<u32> {
        self.bvh.query(bb, eps)
    }

    fn triangle(&self, index: u32) -> [Point3; 3] {
        self.mesh.triangle(index as usize)
    }
}

/// Crossing of a patch edge with the clipper.
#[derive(Debug, Clone)]
struct EdgeHit {
    t: f64,
    point: Point3,
    /// Clipper triangles producing this crossing.
    triangles: SmallVec<[u32; 2]>,
    id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Key {
    Vertex(u32),
    Edge(u32, usize),
    Interior(usize),
}

#[derive(Debug, Default)]
struct FaceSplit {
    interior: Vec<Point3>,
    chords: Vec<(Key, Key)>,
}

struct Clip<'a> {
    mesh: &'a HalfEdgeMesh,
    clipper: &'a NegativeModel,
    eps: f64,
}

impl Clip<'_> {
    fn edge_hits(&self) -> Vec<Vec<EdgeHit>> {
        let m = self.mesh;
        m.edges()
            .map(|e| {
                let h = m.edge_halfedge(e);
                let (a, b) = (m.point(m.source(h)), m.point(m.target(h)));
                let len = (b - a).norm();
                let mut hits: Vec<EdgeHit> = Vec::new();
                if len <= self.eps {
                    return hits;
                }
                for ti in self.clipper.candidates(&Aabb3::from_points([a, b]), self.eps) {
                    let [p, q, r] = self.clipper.triangle(ti);
                    let Some((t, point)) = segment_triangle_intersect(a, b, &p, &q, &r) else {
                        continue;
                    };
                    if t * len <= self.eps || (1.0 - t) * len <= self.eps {
                        continue;
                    }
                    hits.push(EdgeHit {
                        t,
                        point,
                        triangles: SmallVec::from_slice(&[ti]),
                        id: u32::MAX,
                    });
                }
                hits.sort_by(|x, y| x.t.total_cmp(&y.t));
                hits.dedup_by(|later, kept| {
                    if (later.t - kept.t) * len > self.eps {
                        return false;
                    }
                    kept.triangles.extend(later.triangles.iter().copied());
                    true
                });
                hits
            })
            .collect()
    }

    fn edge_key(&self, f: FaceId, i: usize, ti: u32, point: &Point3, hits: &[Vec<EdgeHit>]) -> Key {
        let m = self.mesh;
        let h = m.face_halfedges(f)[i];
        let (s, t) = (m.source(h), m.target(h));
        if (m.point(s) - point).norm() <= self.eps {
            return Key::Vertex(s.idx());
        }
        if (m.point(t) - point).norm() <= self.eps {
            return Key::Vertex(t.idx());
        }
        let e = m.edge(h);
        let on_edge = &hits[e.index()];
        let index = on_edge
            .iter()
            .position(|hit| hit.triangles.contains(&ti))
            .or_else(|| {
                on_edge
                    .iter()
                    .enumerate()
                    .min_by(|(_, x), (_, y)| {
                        (x.point - point).norm().total_cmp(&(y.point - point).norm())
                    })
                    .map(|(k, _)| k)
            });
        match index {
            Some(k) => Key::Edge(e.idx(), k),
            None => Key::Vertex(if (m.point(s) - point).norm() < (m.point(t) - point).norm() {
                s.idx()
            } else {
                t.idx()
            }),
        }
    }

    fn split_face(&self, f: FaceId, hits: &[Vec<EdgeHit>]) -> FaceSplit {
        let m = self.mesh;
        let corners = m.face_points(f);
        let [a, b, c] = corners;
        let mut split = FaceSplit::default();
        let near_border = |x: &Point3| {
            (0..3).any(|i| {
                let (p, q) = (corners[i], corners[(i + 1) % 3]);
                let d = q - p;
                let t = ((x - p).dot(&d) / d.norm_squared()).clamp(0.0, 1.0);
                (p + d * t - x).norm() <= self.eps
            })
        };
        for ti in self.clipper.candidates(&Aabb3::from_triangle(&a, &b, &c), self.eps) {
            let [p, q, r] = self.clipper.triangle(ti);
            let mut points: SmallVec<[(Key, Point3); 4]> = SmallVec::new();
            for i in 0..3 {
                let (s, t) = (corners[i], corners[(i + 1) % 3]);
                if let Some((_, x)) = segment_triangle_intersect(&s, &t, &p, &q, &r) {
                    points.push((self.edge_key(f, i, ti, &x, hits), x));
                }
            }
            for (s, t) in [(p, q), (q, r), (r, p)] {
                let Some((_, x)) = segment_triangle_intersect(&s, &t, &a, &b, &c) else {
                    continue;
                };
                if near_border(&x) || points.iter().any(|(_, y)| (y - x).norm() <= self.eps) {
                    continue;
                }
                let index = split
                    .interior
                    .iter()
                    .position(|y| (y - x).norm() <= self.eps)
                    .unwrap_or_else(|| {
                        split.interior.push(x);
                        split.interior.len() - 1
                    });
                points.push((Key::Interior(index), x));
            }
            let mut best: Option<(f64, Key, Key)> = None;
            for (i, (ki, xi)) in points.iter().enumerate() {
                for (kj, xj) in &points[i + 1..] {
                    let d = (xi - xj).norm();
                    if ki != kj && d > self.eps && best.map_or(true, |(bd, _, _)| d > bd) {
                        best = Some((d, *ki, *kj));
                    }
                }
            }
            if let Some((_, k1, k2)) = best {
                split.chords.push((k1, k2));
            }
        }
        split
    }
}

/// Face-plane coordinates keeping the face winding counter-clockwise.
fn plane_frame(corners: &[Point3; 3]) -> Option<impl Fn(&Point3) -> Point2> {
    let [a, b, c] = *corners;
    let n = triangle_normal(&a, &b, &c)?;
    let ex = (b - a).try_normalize(0.0)?;
    let ey = n.cross(&ex);
    Some(move |p: &Point3| {
        let d = p - a;
        Point2::new(d.dot(&ex), d.dot(&ey))
    })
}

/// Clips `patch` by `clipper`, dropping the parts enclosed by it.
///
/// Returns whether the patch intersects the clipper. Without an
/// intersection, or when a face can not be split, the patch is unchanged
/// and `false` is returned.
#[must_use]
#[allow(clippy::too_many_lines, clippy::cast_possible_truncation)]
pub fn clip_patch(patch: &mut SurfacePatch, clipper: &NegativeModel, direction: &Vector3) -> bool {
    if clipper.is_empty() || patch.mesh.is_empty() {
        return false;
    }
    let extent = patch.bb.max.coords.abs().max().max(patch.bb.min.coords.abs().max());
    let clip = Clip {
        mesh: &patch.mesh,
        clipper,
        eps: REL_EPS * (1.0 + extent),
    };
    let m = clip.mesh;
    let mut hits = clip.edge_hits();
    let splits: Vec<FaceSplit> = m.faces().map(|f| clip.split_face(f, &hits)).collect();
    if splits.iter().all(|s| s.chords.is_empty()) {
        return false;
    }

    let mut points = m.points().to_vec();
    for hit in hits.iter_mut().flatten() {
        hit.id = points.len() as u32;
        points.push(hit.point);
    }

    let mut triangles: Vec<[u32; 3]> = Vec::with_capacity(m.n_faces() * 2);
    let mut chords: HashSet<(u32, u32)> = HashSet::new();
    for (f, split) in m.faces().zip(&splits) {
        let offset = points.len() as u32;
        points.extend(split.interior.iter().copied());
        let global = |key: Key| match key {
            Key::Vertex(v) => v,
            Key::Edge(e, k) => hits[e as usize][k].id,
            Key::Interior(i) => offset + i as u32,
        };
        for &(k1, k2) in &split.chords {
            let (a, b) = (global(k1), global(k2));
            chords.insert((a.min(b), a.max(b)));
        }
        let halfedges = m.face_halfedges(f);
        let has_edge_hits = halfedges.iter().any(|&h| !hits[m.edge(h).index()].is_empty());
        if split.interior.is_empty() && !has_edge_hits {
            triangles.push(m.face_vertices(f).map(VertexId::idx));
            continue;
        }
        let corners = m.face_points(f);
        let Some(to_plane) = plane_frame(&corners) else {
            return false;
        };

        // Bit `i` of a mask marks a point on face edge `i`.
        let mut keys: Vec<u32> = Vec::new();
        let mut masks: Vec<u8> = Vec::new();
        for (i, &h) in halfedges.iter().enumerate() {
            keys.push(m.source(h).idx());
            masks.push((1 << i) | (1 << ((i + 2) % 3)));
            let e = m.edge(h);
            let mut ids: Vec<u32> = hits[e.index()].iter().map(|hit| hit.id).collect();
            if m.edge_halfedge(e) != h {
                ids.reverse();
            }
            masks.extend(std::iter::repeat(1 << i).take(ids.len()));
            keys.extend(ids);
        }
        let n = keys.len() as u32;
        keys.extend((0..split.interior.len()).map(|i| offset + i as u32));
        let uv: Vec<Point2> = keys.iter().map(|&k| to_plane(&points[k as usize])).collect();
        let position = |g: u32| keys.iter().position(|&k| k == g).map(|i| i as u32);
        let ring: Vec<(u32, u32)> = (0..n).map(|i| (i, (i + 1) % n)).collect();
        let local_chords: Vec<(u32, u32)> = split
            .chords
            .iter()
            .filter_map(|&(k1, k2)| Some((position(global(k1))?, position(global(k2))?)))
            .filter(|&(i, j)| {
                let mask = |k: u32| masks.get(k as usize).copied().unwrap_or(0);
                mask(i) & mask(j) == 0
            })
            .collect();
        let Ok(local) = triangulate_region(&uv, &ring, &local_chords) else {
            return false;
        };
        triangles.extend(local.into_iter().map(|t| t.map(|i| keys[i as usize])));
    }

    let refined = HalfEdgeMesh::from_triangles(points, &triangles);
    let mut source = patch.source.clone().into_vec();
    source.resize(refined.n_vertices(), None);

    let components = connected_components(&refined, |h| {
        let (a, b) = (refined.source(h).idx(), refined.target(h).idx());
        chords.contains(&(a.min(b), a.max(b)))
    });
    let mut kept: Vec<FaceId> = Vec::with_capacity(refined.n_faces());
    for faces in components {
        let largest = faces.iter().copied().max_by(|&x, &y| {
            face_area(&refined, x).total_cmp(&face_area(&refined, y))
        });
        let Some(largest) = largest else {
            continue;
        };
        let [a, b, c] = refined.face_points(largest);
        let centroid = Point3::from((a.coords + b.coords + c.coords) / 3.0);
        if !clipper.is_inside(&centroid, direction) {
            kept.extend(faces);
        }
    }

    let clipped = create_surface_patch(&kept, &refined, None);
    let chained: Vec<Option<VertexId>> = clipped
        .source
        .iter()
        .map(|(_, s)| s.and_then(|v| source[v.index()]))
        .collect();
    patch.mesh = clipped.mesh;
    patch.source = PropertyMap::from_vec(chained);
    patch.bb = clipped.bb;
    true
}

fn face_area(mesh: &HalfEdgeMesh, f: FaceId) -> f64 {
    let [a, b, c] = mesh.face_points(f);
    (b - a).cross(&(c - a)).norm()
}
