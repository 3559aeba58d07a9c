//! Splits an object mesh along the extruded shape walls.
//!
//! Only the object mesh is refined; the walls stay untouched. The work runs
//! in shape coordinates `(u, v, s)` where walls are vertical strips over the
//! shape segments and `s` is the depth ratio between the front (`0`) and
//! back (`1`) of the extrusion.
//!
//! New vertices appear where object edges cross a wall, where a shape corner
//! pierces an object face and where a chord (face ∩ wall) crosses the wall
//! diagonal. Every vertex on a wall is tagged with the wall element it lies
//! on and every chord becomes a constrained edge.

use std::collections::{HashMap, HashSet};

use rayon::prelude::*;
use thiserror::Error;

use super::shape_mesh::{ElementKind, IntersectingElement, ShapeMesh};
use crate::math::aabb::Aabb2;
use crate::math::intersect_2d::{point_segment_distance_sq, project_param, segment_segment_params};
use crate::math::line_tree::LineTree;
use crate::math::predicates::orient2d_value;
use crate::math::{Point2, Point3, Vector3};
use crate::tessellation::triangulate::triangulate_region;
use crate::topology::{EdgeId, FaceId, Handle, HalfEdgeMesh, PropertyMap, VertexId};

/// Relative tolerance on shape coordinates.
const REL_EPS: f64 = 1e-9;
/// Tolerance on the depth ratio.
const DEPTH_EPS: f64 = 1e-9;

/// Reason a corefinement result can not be trusted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CorefineAnomaly {
    #[error("intersection lies on the extrusion cap of wall {wall}")]
    CapHit { wall: u32 },
    #[error("face {face} leaves wall {wall} through the extrusion cap")]
    ChordThroughCap { face: u32, wall: u32 },
    #[error("face {face} can not be retriangulated: {reason}")]
    Retriangulation { face: u32, reason: String },
}

/// Object mesh refined along the walls.
#[derive(Debug, Clone)]
pub struct Corefined {
    pub mesh: HalfEdgeMesh,
    /// Wall element of every vertex lying on a wall.
    pub tags: PropertyMap<VertexId, Option<IntersectingElement>>,
    /// Edges created along a wall.
    pub constrained: PropertyMap<EdgeId, bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Depth {
    Front,
    Cap,
    Within,
    Behind,
}

fn depth(s: f64) -> Depth {
    if s.abs() <= DEPTH_EPS || (s - 1.0).abs() <= DEPTH_EPS {
        Depth::Cap
    } else if s < 0.0 {
        Depth::Front
    } else if s > 1.0 {
        Depth::Behind
    } else {
        Depth::Within
    }
}

/// Element of wall `k` at wall parameter `ts` and depth `s`.
fn element_on_wall(shape: &ShapeMesh, k: u32, ts: f64, s: f64, ts_eps: f64) -> IntersectingElement {
    if ts <= ts_eps {
        return shape.element(k, ElementKind::Edge1);
    }
    if ts >= 1.0 - ts_eps {
        return shape.element(shape.next(k), ElementKind::Edge1);
    }
    let diagonal = ts + s - 1.0;
    let kind = if diagonal.abs() <= DEPTH_EPS {
        ElementKind::Edge2
    } else if diagonal < 0.0 {
        ElementKind::Face1
    } else {
        ElementKind::Face2
    };
    shape.element(k, kind)
}

/// Point created on an object edge. `tag` is `None` for crossings beyond
/// the extrusion, which only take part in validity checks.
#[derive(Debug, Clone, Copy)]
struct EdgePoint {
    t: f64,
    uv: Point2,
    s: f64,
    world: Point3,
    tag: Option<IntersectingElement>,
    id: u32,
}

/// Vertex reference inside one face plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Local {
    Global(u32),
    Interior(u32),
    Beyond,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    key: Local,
    /// Lies in front of or behind the extrusion.
    beyond: bool,
    uv: Point2,
    s: f64,
    world: Point3,
    /// Bit `i` is set when the point lies on face edge `i`.
    edges: u8,
}

#[derive(Debug, Default)]
struct FacePlan {
    triangles: Option<Vec<[Local; 3]>>,
    interior: Vec<(Point3, IntersectingElement)>,
    chords: Vec<(Local, Local)>,
}

struct Context<'a> {
    model: &'a HalfEdgeMesh,
    shape: &'a ShapeMesh,
    tree: LineTree,
    local: Vec<Point3>,
    eps: f64,
}

impl Context<'_> {
    fn uv(&self, v: VertexId) -> Point2 {
        let l = self.local[v.index()];
        Point2::new(l.x, l.y)
    }

    fn s(&self, v: VertexId) -> f64 {
        self.local[v.index()].z
    }

    fn wall_eps(&self, k: u32) -> Option<f64> {
        let (a, b) = self.shape.wall(k);
        let len = (b - a).norm();
        (len > self.eps).then(|| self.eps / len)
    }

    fn tag_vertex(&self, v: VertexId) -> Result<Option<IntersectingElement>, CorefineAnomaly> {
        let uv = self.uv(v);
        let Some(&k) = self.tree.in_radius(&uv, self.eps).first() else {
            return Ok(None);
        };
        #[allow(clippy::cast_possible_truncation)]
        let k = k as u32;
        let Some(ts_eps) = self.wall_eps(k) else {
            return Ok(None);
        };
        let (a, b) = self.shape.wall(k);
        let ts = project_param(&a, &b, &uv).clamp(0.0, 1.0);
        let s = self.s(v);
        match depth(s) {
            Depth::Cap => Err(CorefineAnomaly::CapHit { wall: k }),
            Depth::Within => Ok(Some(element_on_wall(self.shape, k, ts, s, ts_eps))),
            Depth::Front | Depth::Behind => Ok(None),
        }
    }

    fn edge_point(
        &self,
        k: u32,
        ends: (VertexId, VertexId),
        t: f64,
        ts: f64,
        tag: Option<ElementKind>,
    ) -> Result<EdgePoint, CorefineAnomaly> {
        let (va, vb) = ends;
        let s = self.s(va) + t * (self.s(vb) - self.s(va));
        let uv = self.uv(va) + (self.uv(vb) - self.uv(va)) * t;
        let pa = self.model.point(va);
        let world = pa + (self.model.point(vb) - pa) * t;
        let tag = match depth(s) {
            Depth::Cap => return Err(CorefineAnomaly::CapHit { wall: k }),
            Depth::Front | Depth::Behind => None,
            Depth::Within => Some(match tag {
                Some(kind) => self.shape.element(k, kind),
                None => element_on_wall(self.shape, k, ts, s, self.wall_eps(k).unwrap_or(0.0)),
            }),
        };
        Ok(EdgePoint {
            t,
            uv,
            s,
            world,
            tag,
            id: u32::MAX,
        })
    }

    /// Crossings of edge `e` with every wall, sorted along the edge's
    /// representative half-edge.
    fn split_edge(&self, e: EdgeId) -> Result<Vec<EdgePoint>, CorefineAnomaly> {
        let h = self.model.edge_halfedge(e);
        let ends = (self.model.source(h), self.model.target(h));
        let (ua, ub) = (self.uv(ends.0), self.uv(ends.1));
        let len = (ub - ua).norm();
        let mut points = Vec::new();
        if len <= self.eps {
            return Ok(points);
        }
        let te_eps = self.eps / len;
        let inner = |t: f64| t > te_eps && t < 1.0 - te_eps;

        for k in self.tree.query(&Aabb2::from_segment(&ua, &ub), self.eps) {
            #[allow(clippy::cast_possible_truncation)]
            let k = k as u32;
            let (pa, pb) = self.shape.wall(k);
            let Some(ts_eps) = self.wall_eps(k) else {
                continue;
            };
            if let Some((te, ts)) = segment_segment_params(&ua, &ub, &pa, &pb, REL_EPS) {
                if inner(te) {
                    points.push(self.edge_point(k, ends, te, ts.clamp(0.0, 1.0), None)?);
                }
                continue;
            }
            // Edge running along the wall.
            let eps_sq = self.eps * self.eps;
            if line_distance_sq(&ua, &ub, &pa) > eps_sq
                || line_distance_sq(&ua, &ub, &pb) > eps_sq
            {
                continue;
            }
            for (q, index) in [(pa, k), (pb, self.shape.next(k))] {
                let t = project_param(&ua, &ub, &q);
                if inner(t) {
                    points.push(self.edge_point(index, ends, t, 0.0, Some(ElementKind::Edge1))?);
                }
            }
            let diagonal = |t: f64| {
                let uv = ua + (ub - ua) * t;
                let s = self.s(ends.0) + t * (self.s(ends.1) - self.s(ends.0));
                project_param(&pa, &pb, &uv) + s - 1.0
            };
            let (d0, d1) = (diagonal(0.0), diagonal(1.0));
            if (d0 < -DEPTH_EPS && d1 > DEPTH_EPS) || (d0 > DEPTH_EPS && d1 < -DEPTH_EPS) {
                let t = d0 / (d0 - d1);
                let ts = project_param(&pa, &pb, &(ua + (ub - ua) * t));
                if inner(t) && ts > ts_eps && ts < 1.0 - ts_eps {
                    points.push(self.edge_point(k, ends, t, ts, Some(ElementKind::Edge2))?);
                }
            }
        }

        points.sort_by(|a, b| a.t.total_cmp(&b.t));
        points.dedup_by(|later, kept| {
            if (later.t - kept.t) * len > self.eps {
                return false;
            }
            let prefer_later = match (kept.tag, later.tag) {
                (None, Some(_)) => true,
                (Some(k), Some(l)) => k.kind != ElementKind::Edge1 && l.kind == ElementKind::Edge1,
                _ => false,
            };
            if prefer_later {
                kept.tag = later.tag;
            }
            true
        });
        Ok(points)
    }

    #[allow(clippy::too_many_lines)]
    fn plan_face(
        &self,
        f: FaceId,
        edge_points: &[Vec<EdgePoint>],
    ) -> Result<FacePlan, CorefineAnomaly> {
        let m = self.model;
        let corners = m.face_vertices(f);
        let halfedges = m.face_halfedges(f);
        let uv = corners.map(|v| self.uv(v));
        let area = orient2d_value(&uv[0], &uv[1], &uv[2]);

        let mut candidates: Vec<Candidate> = Vec::new();
        for (i, &v) in corners.iter().enumerate() {
            let s = self.s(v);
            candidates.push(Candidate {
                key: Local::Global(v.idx()),
                beyond: depth(s) != Depth::Within,
                uv: uv[i],
                s,
                world: *m.point(v),
                edges: (1 << i) | (1 << ((i + 2) % 3)),
            });
        }
        // Boundary loop: corner i followed by the points of edge i.
        let mut boundary: Vec<Candidate> = Vec::new();
        for (i, &h) in halfedges.iter().enumerate() {
            boundary.push(candidates[i]);
            let e = m.edge(h);
            let forward = m.edge_halfedge(e) == h;
            let mut on_edge: Vec<Candidate> = edge_points[e.index()]
                .iter()
                .map(|p| Candidate {
                    key: if p.tag.is_some() { Local::Global(p.id) } else { Local::Beyond },
                    beyond: p.tag.is_none(),
                    uv: p.uv,
                    s: p.s,
                    world: p.world,
                    edges: 1 << i,
                })
                .collect();
            if !forward {
                on_edge.reverse();
            }
            boundary.extend(on_edge.iter().filter(|c| !c.beyond));
            candidates.extend(on_edge);
        }

        let mut plan = FacePlan::default();
        let mut bbox = Aabb2::empty();
        for p in &uv {
            bbox.expand_point(p);
        }
        let walls = self.tree.query(&bbox, self.eps);

        // Shape corners piercing the face.
        if area.abs() > self.eps * self.eps {
            for &k in &walls {
                #[allow(clippy::cast_possible_truncation)]
                let k = k as u32;
                let p = self.shape.point(k);
                let Some(lambda) = barycentric(&uv, area, &p, self.eps) else {
                    continue;
                };
                let s: f64 = (0..3).map(|i| lambda[i] * self.s(corners[i])).sum();
                let world = Point3::from(
                    (0..3)
                        .map(|i| m.point(corners[i]).coords * lambda[i])
                        .sum::<Vector3>(),
                );
                let key = match depth(s) {
                    Depth::Cap => return Err(CorefineAnomaly::CapHit { wall: k }),
                    Depth::Front | Depth::Behind => Local::Beyond,
                    Depth::Within => {
                        #[allow(clippy::cast_possible_truncation)]
                        let index = plan.interior.len() as u32;
                        plan.interior.push((world, self.shape.element(k, ElementKind::Edge1)));
                        Local::Interior(index)
                    }
                };
                candidates.push(Candidate {
                    key,
                    beyond: key == Local::Beyond,
                    uv: p,
                    s,
                    world,
                    edges: 0,
                });
            }
        }

        let face = f.idx();
        for &k in &walls {
            #[allow(clippy::cast_possible_truncation)]
            let k = k as u32;
            let (pa, pb) = self.shape.wall(k);
            if self.wall_eps(k).is_none() {
                continue;
            }
            let mut members: Vec<(f64, Candidate)> = candidates
                .iter()
                .filter(|c| point_segment_distance_sq(&pa, &pb, &c.uv) <= self.eps * self.eps)
                .map(|c| (project_param(&pa, &pb, &c.uv).clamp(0.0, 1.0), *c))
                .collect();
            if members.len() < 2 {
                continue;
            }
            let beyond = |d: Depth| members.iter().any(|(_, c)| c.beyond && depth(c.s) == d);
            let real = members.iter().any(|(_, c)| !c.beyond);
            let (front, behind) = (beyond(Depth::Front), beyond(Depth::Behind));
            if (real && (front || behind)) || (front && behind) {
                return Err(CorefineAnomaly::ChordThroughCap { face, wall: k });
            }
            if !real {
                continue;
            }
            members.sort_by(|a, b| a.0.total_cmp(&b.0));
            members.dedup_by(|later, kept| later.1.key == kept.1.key);
            for pair in members.windows(2) {
                let ((ts1, c1), (ts2, c2)) = (pair[0], pair[1]);
                let d1 = ts1 + c1.s - 1.0;
                let d2 = ts2 + c2.s - 1.0;
                let crosses =
                    (d1 < -DEPTH_EPS && d2 > DEPTH_EPS) || (d1 > DEPTH_EPS && d2 < -DEPTH_EPS);
                if crosses && c1.edges & c2.edges == 0 {
                    let t = d1 / (d1 - d2);
                    let world = c1.world + (c2.world - c1.world) * t;
                    #[allow(clippy::cast_possible_truncation)]
                    let index = plan.interior.len() as u32;
                    plan.interior.push((world, self.shape.element(k, ElementKind::Edge2)));
                    let mid = Candidate {
                        key: Local::Interior(index),
                        beyond: false,
                        uv: c1.uv + (c2.uv - c1.uv) * t,
                        s: c1.s + (c2.s - c1.s) * t,
                        world,
                        edges: 0,
                    };
                    candidates.push(mid);
                    plan.chords.push((c1.key, mid.key));
                    plan.chords.push((mid.key, c2.key));
                } else {
                    plan.chords.push((c1.key, c2.key));
                }
            }
        }

        if boundary.len() == 3 && plan.interior.is_empty() {
            return Ok(plan);
        }
        if area.abs() <= self.eps * self.eps {
            return Err(CorefineAnomaly::Retriangulation {
                face,
                reason: "face is flat in projection".into(),
            });
        }

        // Local numbering: boundary loop first, then interior points.
        let mut keys: Vec<Local> = boundary.iter().map(|c| c.key).collect();
        let mut points: Vec<Point2> = boundary.iter().map(|c| c.uv).collect();
        for c in candidates.iter().filter(|c| matches!(c.key, Local::Interior(_))) {
            keys.push(c.key);
            points.push(c.uv);
        }
        let position: HashMap<Local, u32> = keys
            .iter()
            .enumerate()
            .map(|(i, &key)| {
                #[allow(clippy::cast_possible_truncation)]
                (key, i as u32)
            })
            .collect();
        #[allow(clippy::cast_possible_truncation)]
        let n = boundary.len() as u32;
        let ring: Vec<(u32, u32)> = (0..n).map(|i| (i, (i + 1) % n)).collect();
        let edges_of = |key: Local| candidates.iter().find(|c| c.key == key).map_or(0, |c| c.edges);
        let chords: Vec<(u32, u32)> = plan
            .chords
            .iter()
            .filter(|(a, b)| edges_of(*a) & edges_of(*b) == 0)
            .filter_map(|(a, b)| Some((*position.get(a)?, *position.get(b)?)))
            .collect();

        let triangles = triangulate_region(&points, &ring, &chords).map_err(|e| {
            CorefineAnomaly::Retriangulation {
                face,
                reason: e.to_string(),
            }
        })?;
        plan.triangles = Some(
            triangles
                .into_iter()
                .map(|t| {
                    let mut tri = t.map(|i| keys[i as usize]);
                    if area < 0.0 {
                        tri.swap(1, 2);
                    }
                    tri
                })
                .collect(),
        );
        Ok(plan)
    }
}

fn line_distance_sq(a: &Point2, b: &Point2, p: &Point2) -> f64 {
    let d = b - a;
    let len_sq = d.norm_squared();
    if len_sq == 0.0 {
        return (p - a).norm_squared();
    }
    let cross = d.perp(&(p - a));
    cross * cross / len_sq
}

/// Barycentric coordinates of `p` when it lies inside the triangle farther
/// than `eps` from every side.
fn barycentric(uv: &[Point2; 3], area: f64, p: &Point2, eps: f64) -> Option<[f64; 3]> {
    let mut lambda = [0.0; 3];
    for i in 0..3 {
        let (b, c) = (uv[(i + 1) % 3], uv[(i + 2) % 3]);
        let l = orient2d_value(&b, &c, p) / area;
        let side = (c - b).norm();
        if l * area.abs() <= eps * side {
            return None;
        }
        lambda[i] = l;
    }
    Some(lambda)
}

/// Refines `model` along the walls of `shape`.
///
/// # Errors
///
/// Returns the anomaly that makes the refinement unusable: an intersection
/// on the extrusion caps, or a face that can not be retriangulated.
pub fn corefine(model: &HalfEdgeMesh, shape: &ShapeMesh) -> Result<Corefined, CorefineAnomaly> {
    let frame = shape.frame();
    let local: Vec<Point3> = model.points().par_iter().map(|p| frame.to_local(p)).collect();
    let extent = local
        .iter()
        .fold(shape.extent(), |m, l| m.max(l.x.abs()).max(l.y.abs()));
    let ctx = Context {
        model,
        shape,
        tree: shape.wall_tree(),
        local,
        eps: REL_EPS * (1.0 + extent),
    };

    let mut tags: Vec<Option<IntersectingElement>> = model
        .vertices()
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|v| ctx.tag_vertex(v))
        .collect::<Result<_, _>>()?;
    let mut edge_points: Vec<Vec<EdgePoint>> = model
        .edges()
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|e| ctx.split_edge(e))
        .collect::<Result<_, _>>()?;

    let mut points = model.points().to_vec();
    for p in edge_points.iter_mut().flatten().filter(|p| p.tag.is_some()) {
        #[allow(clippy::cast_possible_truncation)]
        let id = points.len() as u32;
        p.id = id;
        points.push(p.world);
        tags.push(p.tag);
    }

    let plans: Vec<FacePlan> = model
        .faces()
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|f| ctx.plan_face(f, &edge_points))
        .collect::<Result<_, _>>()?;

    let mut triangles: Vec<[u32; 3]> = Vec::with_capacity(model.n_faces());
    let mut chords: HashSet<(u32, u32)> = HashSet::new();
    for (f, plan) in model.faces().zip(plans) {
        #[allow(clippy::cast_possible_truncation)]
        let offset = points.len() as u32;
        let global = |key: Local| match key {
            Local::Global(id) => Some(id),
            Local::Interior(i) => Some(offset + i),
            Local::Beyond => None,
        };
        for &(a, b) in &plan.chords {
            if let (Some(a), Some(b)) = (global(a), global(b)) {
                chords.insert((a.min(b), a.max(b)));
            }
        }
        match &plan.triangles {
            None => triangles.push(model.face_vertices(f).map(VertexId::idx)),
            Some(tris) => {
                for t in tris {
                    if let [Some(a), Some(b), Some(c)] = t.map(global) {
                        triangles.push([a, b, c]);
                    }
                }
            }
        }
        for (world, tag) in plan.interior {
            points.push(world);
            tags.push(Some(tag));
        }
    }

    let mesh = HalfEdgeMesh::from_triangles(points, &triangles);
    let constrained: Vec<bool> = mesh
        .edges()
        .map(|e| {
            let h = mesh.edge_halfedge(e);
            let (a, b) = (mesh.source(h).idx(), mesh.target(h).idx());
            chords.contains(&(a.min(b), a.max(b)))
        })
        .collect();
    Ok(Corefined {
        mesh,
        tags: PropertyMap::from_vec(tags),
        constrained: PropertyMap::from_vec(constrained),
    })
}
