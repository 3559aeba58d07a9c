//! Mapping between 2D shape coordinates and 3D space.
//!
//! A projection turns every shape point into a front and a back 3D point.
//! The segment between them is the extrusion of that point; depth grows from
//! front to back.

use crate::error::{GeometryError, Result};
use crate::geometry::Point;
use crate::math::{Matrix3, Matrix4, Point2, Point3, Vector3};

/// Moves a 3D point along the projection direction.
pub trait Project3d: Sync {
    /// Point moved by the full projection depth.
    fn project(&self, point: &Point3) -> Point3;
}

/// Full projection between shape space and 3D space.
pub trait Project: Project3d {
    /// Front and back 3D points of a shape point.
    fn create_front_back(&self, p: &Point) -> (Point3, Point3);

    /// Shape position and depth of a 3D point, `None` when it cannot be
    /// mapped back.
    fn unproject(&self, p: &Point3) -> Option<(Point2, f64)>;
}

impl<T: Project3d + ?Sized> Project3d for &T {
    fn project(&self, point: &Point3) -> Point3 {
        (**self).project(point)
    }
}

impl<T: Project + ?Sized> Project for &T {
    fn create_front_back(&self, p: &Point) -> (Point3, Point3) {
        (**self).create_front_back(p)
    }

    fn unproject(&self, p: &Point3) -> Option<(Point2, f64)> {
        (**self).unproject(p)
    }
}

/// Projection along +Z: front at `z = 0`, back at `z = depth`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectZ {
    pub depth: f64,
}

impl ProjectZ {
    #[must_use]
    pub fn new(depth: f64) -> Self {
        Self { depth }
    }
}

impl Project3d for ProjectZ {
    fn project(&self, point: &Point3) -> Point3 {
        Point3::new(point.x, point.y, self.depth)
    }
}

impl Project for ProjectZ {
    fn create_front_back(&self, p: &Point) -> (Point3, Point3) {
        let front = Point3::new(f64::from(p.x), f64::from(p.y), 0.0);
        (front, self.project(&front))
    }

    fn unproject(&self, p: &Point3) -> Option<(Point2, f64)> {
        Some((Point2::new(p.x, p.y), p.z))
    }
}

/// Uniformly scales another projection.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectScale<P> {
    pub core: P,
    pub scale: f64,
}

impl<P: Project> ProjectScale<P> {
    #[must_use]
    pub fn new(core: P, scale: f64) -> Self {
        Self { core, scale }
    }
}

impl<P: Project> Project3d for ProjectScale<P> {
    fn project(&self, point: &Point3) -> Point3 {
        let local = Point3::from(point.coords / self.scale);
        Point3::from(self.core.project(&local).coords * self.scale)
    }
}

impl<P: Project> Project for ProjectScale<P> {
    fn create_front_back(&self, p: &Point) -> (Point3, Point3) {
        let (front, back) = self.core.create_front_back(p);
        (
            Point3::from(front.coords * self.scale),
            Point3::from(back.coords * self.scale),
        )
    }

    fn unproject(&self, p: &Point3) -> Option<(Point2, f64)> {
        let (pt, depth) = self.core.unproject(&Point3::from(p.coords / self.scale))?;
        Some((pt, depth * self.scale))
    }
}

/// Places another projection in space with an affine transformation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectTransform<P> {
    core: P,
    tr: Matrix4,
    tr_inv: Matrix4,
    z_scale: f64,
}

impl<P: Project> ProjectTransform<P> {
    /// # Errors
    ///
    /// Returns [`GeometryError::Degenerate`] when `tr` is not invertible.
    pub fn new(core: P, tr: Matrix4) -> Result<Self> {
        let tr_inv = tr
            .try_inverse()
            .ok_or_else(|| GeometryError::Degenerate("singular projection transform".into()))?;
        let z_scale = tr.fixed_view::<3, 3>(0, 0).column(2).norm();
        Ok(Self {
            core,
            tr,
            tr_inv,
            z_scale,
        })
    }

    #[must_use]
    pub fn transformation(&self) -> &Matrix4 {
        &self.tr
    }
}

impl<P: Project> Project3d for ProjectTransform<P> {
    fn project(&self, point: &Point3) -> Point3 {
        let local = self.tr_inv.transform_point(point);
        self.tr.transform_point(&self.core.project(&local))
    }
}

impl<P: Project> Project for ProjectTransform<P> {
    fn create_front_back(&self, p: &Point) -> (Point3, Point3) {
        let (front, back) = self.core.create_front_back(p);
        (self.tr.transform_point(&front), self.tr.transform_point(&back))
    }

    fn unproject(&self, p: &Point3) -> Option<(Point2, f64)> {
        let (pt, depth) = self.core.unproject(&self.tr_inv.transform_point(p))?;
        Some((pt, depth * self.z_scale))
    }
}

/// Orthogonal projection: shape plane placed by `matrix`, extruded along a
/// constant `direction`.
#[derive(Debug, Clone, PartialEq)]
pub struct OrthoProject {
    matrix: Matrix4,
    matrix_inv: Matrix4,
    direction: Vector3,
}

impl OrthoProject {
    /// # Errors
    ///
    /// Returns [`GeometryError::Degenerate`] when `matrix` is not invertible.
    pub fn new(matrix: Matrix4, direction: Vector3) -> Result<Self> {
        let matrix_inv = matrix
            .try_inverse()
            .ok_or_else(|| GeometryError::Degenerate("singular projection matrix".into()))?;
        Ok(Self {
            matrix,
            matrix_inv,
            direction,
        })
    }

    #[must_use]
    pub fn direction(&self) -> &Vector3 {
        &self.direction
    }
}

impl Project3d for OrthoProject {
    fn project(&self, point: &Point3) -> Point3 {
        point + self.direction
    }
}

impl Project for OrthoProject {
    fn create_front_back(&self, p: &Point) -> (Point3, Point3) {
        let front = self
            .matrix
            .transform_point(&Point3::new(f64::from(p.x), f64::from(p.y), 0.0));
        (front, self.project(&front))
    }

    fn unproject(&self, p: &Point3) -> Option<(Point2, f64)> {
        let pp = self.matrix_inv.transform_point(p);
        Some((Point2::new(pp.x, pp.y), pp.z))
    }
}

/// Constant offset along `direction`; used to build the back side of a cut.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrthoProject3d {
    pub direction: Vector3,
}

impl OrthoProject3d {
    #[must_use]
    pub fn new(direction: Vector3) -> Self {
        Self { direction }
    }
}

impl Project3d for OrthoProject3d {
    fn project(&self, point: &Point3) -> Point3 {
        point + self.direction
    }
}

/// Affine frame of a projection.
///
/// Shape point `(x, y)` at depth ratio `s` sits at
/// `origin + x * ex + y * ey + s * dir`; `s = 0` is the front, `s = 1` the
/// back.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeFrame {
    origin: Point3,
    ex: Vector3,
    ey: Vector3,
    dir: Vector3,
    inv: Matrix3,
}

impl ShapeFrame {
    /// Recovers the frame by sampling `create_front_back`.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::NotAffine`] when the samples do not fit one
    /// affine frame, or [`GeometryError::Degenerate`] when the frame is flat.
    pub fn from_projection<P: Project + ?Sized>(projection: &P) -> Result<Self> {
        let (f00, b00) = projection.create_front_back(&Point::new(0, 0));
        let (f10, b10) = projection.create_front_back(&Point::new(1, 0));
        let (f01, _) = projection.create_front_back(&Point::new(0, 1));
        let (f11, b11) = projection.create_front_back(&Point::new(1, 1));

        let ex = f10 - f00;
        let ey = f01 - f00;
        let dir = b00 - f00;
        let scale = 1.0 + ex.norm() + ey.norm() + dir.norm();
        let eps = 1e-9 * scale;
        let expected_f11 = f00 + ex + ey;
        if (b10 - f10 - dir).norm() > eps
            || (f11 - expected_f11).norm() > eps
            || (b11 - f11 - dir).norm() > eps
        {
            return Err(GeometryError::NotAffine.into());
        }

        let m = Matrix3::from_columns(&[ex, ey, dir]);
        let inv = m
            .try_inverse()
            .ok_or_else(|| GeometryError::Degenerate("flat projection frame".into()))?;
        Ok(Self {
            origin: f00,
            ex,
            ey,
            dir,
            inv,
        })
    }

    /// `(x, y, s)` coordinates of a 3D point.
    #[must_use]
    pub fn to_local(&self, p: &Point3) -> Point3 {
        Point3::from(self.inv * (p - self.origin))
    }

    /// 3D point of shape position `(x, y)` at depth ratio `s`.
    #[must_use]
    pub fn to_world(&self, x: f64, y: f64, s: f64) -> Point3 {
        self.origin + self.ex * x + self.ey * y + self.dir * s
    }

    /// Front to back vector.
    #[must_use]
    pub fn direction(&self) -> &Vector3 {
        &self.dir
    }
}
