//! Transform stacks and primitive face layouts.
//!
//! A [`TransformStack`] is an ordered list of CSS-style 3D operations. It
//! renders both to a transform string and to a composed 4x4 matrix, using
//! the same convention: operations compose left to right, so the rightmost
//! operation is applied to a point first. Coordinates are screen-space
//! (x right, y down, z toward the viewer).

use crate::document::PrimitiveKind;

use nalgebra::{Matrix4, Point3, Rotation3, Vector3};
use serde::{Serialize, Serializer};
use std::fmt;

/// A single transform function.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TransformOp {
    Translate { x: f64, y: f64, z: f64 },
    RotateX { deg: f64 },
    RotateY { deg: f64 },
    RotateZ { deg: f64 },
    Scale { x: f64, y: f64, z: f64 },
}

impl TransformOp {
    pub fn matrix(&self) -> Matrix4<f64> {
        match *self {
            TransformOp::Translate { x, y, z } => Matrix4::new_translation(&Vector3::new(x, y, z)),
            TransformOp::RotateX { deg } => {
                Rotation3::from_axis_angle(&Vector3::x_axis(), deg.to_radians()).to_homogeneous()
            }
            TransformOp::RotateY { deg } => {
                Rotation3::from_axis_angle(&Vector3::y_axis(), deg.to_radians()).to_homogeneous()
            }
            TransformOp::RotateZ { deg } => {
                Rotation3::from_axis_angle(&Vector3::z_axis(), deg.to_radians()).to_homogeneous()
            }
            TransformOp::Scale { x, y, z } => Matrix4::new_nonuniform_scaling(&Vector3::new(x, y, z)),
        }
    }
}

impl fmt::Display for TransformOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            TransformOp::Translate { x, y, z } => write!(
                f,
                "translate3d({}px, {}px, {}px)",
                Num(x),
                Num(y),
                Num(z)
            ),
            TransformOp::RotateX { deg } => write!(f, "rotateX({}deg)", Num(deg)),
            TransformOp::RotateY { deg } => write!(f, "rotateY({}deg)", Num(deg)),
            TransformOp::RotateZ { deg } => write!(f, "rotateZ({}deg)", Num(deg)),
            TransformOp::Scale { x, y, z } => {
                write!(f, "scale3d({}, {}, {})", Num(x), Num(y), Num(z))
            }
        }
    }
}

/// Compact number formatting: integers without a fraction, otherwise at
/// most three decimals with trailing zeros dropped.
pub(crate) struct Num(pub f64);

impl fmt::Display for Num {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = if self.0.is_finite() { self.0 } else { 0.0 };
        let text = format!("{:.3}", v);
        let text = text.trim_end_matches('0').trim_end_matches('.');
        match text {
            "-0" | "" => f.write_str("0"),
            other => f.write_str(other),
        }
    }
}

/// Ordered transform list, builder style.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformStack {
    ops: Vec<TransformOp>,
}

impl TransformStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, op: TransformOp) -> Self {
        self.ops.push(op);
        self
    }

    pub fn translate(self, x: f64, y: f64, z: f64) -> Self {
        self.then(TransformOp::Translate { x, y, z })
    }

    pub fn translate_z(self, z: f64) -> Self {
        self.translate(0.0, 0.0, z)
    }

    pub fn rotate_x(self, deg: f64) -> Self {
        self.then(TransformOp::RotateX { deg })
    }

    pub fn rotate_y(self, deg: f64) -> Self {
        self.then(TransformOp::RotateY { deg })
    }

    pub fn rotate_z(self, deg: f64) -> Self {
        self.then(TransformOp::RotateZ { deg })
    }

    pub fn scale(self, x: f64, y: f64, z: f64) -> Self {
        self.then(TransformOp::Scale { x, y, z })
    }

    pub fn ops(&self) -> &[TransformOp] {
        &self.ops
    }

    /// Composed matrix, identity for an empty stack.
    pub fn matrix(&self) -> Matrix4<f64> {
        self.ops
            .iter()
            .fold(Matrix4::identity(), |acc, op| acc * op.matrix())
    }

    pub fn apply(&self, point: Point3<f64>) -> Point3<f64> {
        self.matrix().transform_point(&point)
    }
}

impl fmt::Display for TransformStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ops.is_empty() {
            return f.write_str("none");
        }
        for (i, op) in self.ops.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", op)?;
        }
        Ok(())
    }
}

impl Serialize for TransformStack {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// =============================================================================
// FACES
// =============================================================================

/// Which shading rule a face uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceRole {
    Side,
    Top,
    Bottom,
    /// Whole-body disc of a sphere
    Disc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceShape {
    Rect,
    Round,
    /// Apex at the top edge
    Triangle,
}

/// One flat quad of a primitive, relative to the actor's placement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceGeometry {
    pub role: FaceRole,
    pub shape: FaceShape,
    pub width: f64,
    pub height: f64,
    pub transform: TransformStack,
}

impl FaceGeometry {
    fn new(role: FaceRole, shape: FaceShape, (width, height): (f64, f64), transform: TransformStack) -> Self {
        Self {
            role,
            shape,
            width,
            height,
            transform,
        }
    }
}

const CUBE_HALF: f64 = 70.0;
const CAP_OFFSET: f64 = 90.0;
const CAP_SIZE: (f64, f64) = (100.0, 100.0);

/// Element size (width, height) in pixels before scaling.
pub fn element_size(kind: PrimitiveKind) -> (f64, f64) {
    match kind {
        PrimitiveKind::Cylinder | PrimitiveKind::Cone => (100.0, 180.0),
        PrimitiveKind::TerrainModel => (280.0, 280.0),
        PrimitiveKind::Sphere | PrimitiveKind::Cube | PrimitiveKind::GlbAsset => (140.0, 140.0),
    }
}

/// Face layout of a primitive.
pub fn faces_for(kind: PrimitiveKind) -> Vec<FaceGeometry> {
    let size = element_size(kind);
    match kind {
        // Imported meshes are not loaded; they stand in as cubes.
        PrimitiveKind::Cube | PrimitiveKind::GlbAsset => {
            let mut faces: Vec<FaceGeometry> = [0.0, 180.0, 90.0, -90.0]
                .iter()
                .map(|&deg| {
                    FaceGeometry::new(
                        FaceRole::Side,
                        FaceShape::Rect,
                        size,
                        TransformStack::new().rotate_y(deg).translate_z(CUBE_HALF),
                    )
                })
                .collect();
            faces.push(FaceGeometry::new(
                FaceRole::Top,
                FaceShape::Rect,
                size,
                TransformStack::new().rotate_x(90.0).translate_z(CUBE_HALF),
            ));
            faces.push(FaceGeometry::new(
                FaceRole::Bottom,
                FaceShape::Rect,
                size,
                TransformStack::new().rotate_x(-90.0).translate_z(CUBE_HALF),
            ));
            faces
        }
        PrimitiveKind::Cylinder => {
            let mut faces = crossed_planes(FaceShape::Rect, size);
            faces.push(cap(FaceRole::Top));
            faces.push(cap(FaceRole::Bottom));
            faces
        }
        PrimitiveKind::Cone => {
            let mut faces = crossed_planes(FaceShape::Triangle, size);
            faces.push(cap(FaceRole::Bottom));
            faces
        }
        PrimitiveKind::TerrainModel => vec![FaceGeometry::new(
            FaceRole::Top,
            FaceShape::Rect,
            size,
            TransformStack::new().rotate_x(90.0),
        )],
        PrimitiveKind::Sphere => vec![FaceGeometry::new(
            FaceRole::Disc,
            FaceShape::Round,
            size,
            TransformStack::new(),
        )],
    }
}

fn crossed_planes(shape: FaceShape, size: (f64, f64)) -> Vec<FaceGeometry> {
    [0.0, 60.0, 120.0]
        .iter()
        .map(|&deg| FaceGeometry::new(FaceRole::Side, shape, size, TransformStack::new().rotate_y(deg)))
        .collect()
}

fn cap(role: FaceRole) -> FaceGeometry {
    let tilt = if role == FaceRole::Top { 90.0 } else { -90.0 };
    FaceGeometry::new(
        role,
        FaceShape::Round,
        CAP_SIZE,
        TransformStack::new().rotate_x(tilt).translate_z(CAP_OFFSET),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_css_rendering() {
        let stack = TransformStack::new()
            .translate(0.0, 0.0, -450.0)
            .rotate_x(20.0)
            .rotate_y(12.345_67)
            .scale(1.0, 1.5, 1.0);
        assert_eq!(
            stack.to_string(),
            "translate3d(0px, 0px, -450px) rotateX(20deg) rotateY(12.346deg) scale3d(1, 1.5, 1)"
        );
        assert_eq!(TransformStack::new().to_string(), "none");
        assert_eq!(Num(-0.0001).to_string(), "0");
    }

    #[test]
    fn test_matrix_composition_order() {
        // Rotate first, then translate.
        let stack = TransformStack::new().translate(10.0, 0.0, 0.0).rotate_y(90.0);
        let p = stack.apply(Point3::new(0.0, 0.0, 1.0));
        assert_relative_eq!(p.x, 11.0, epsilon = 1e-9);
        assert_relative_eq!(p.z, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_cube_faces_enclose_volume() {
        let faces = faces_for(PrimitiveKind::Cube);
        assert_eq!(faces.len(), 6);

        let top = faces.iter().find(|f| f.role == FaceRole::Top).unwrap();
        // rotateX(90) maps +z onto -y: the top face sits 70px up (screen y is down).
        let center = top.transform.apply(Point3::origin());
        assert_relative_eq!(center.y, -70.0, epsilon = 1e-9);
    }

    #[test]
    fn test_face_counts() {
        assert_eq!(faces_for(PrimitiveKind::Cylinder).len(), 5);
        assert_eq!(faces_for(PrimitiveKind::Cone).len(), 4);
        assert_eq!(faces_for(PrimitiveKind::TerrainModel).len(), 1);
        assert_eq!(faces_for(PrimitiveKind::GlbAsset).len(), 6);

        let sphere = faces_for(PrimitiveKind::Sphere);
        assert_eq!(sphere[0].role, FaceRole::Disc);
        assert_eq!(element_size(PrimitiveKind::Cylinder), (100.0, 180.0));

        let caps: Vec<_> = faces_for(PrimitiveKind::Cylinder)
            .into_iter()
            .filter(|f| f.shape == FaceShape::Round)
            .collect();
        assert_eq!(caps.len(), 2);
        assert_eq!(caps[0].width, 100.0);
    }
}
