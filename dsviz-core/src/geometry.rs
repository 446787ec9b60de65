/// Drawable geometry payloads for the scene graph
use std::path::PathBuf;

use nalgebra::{Matrix4, Point3, Vector3};

use crate::cuboid::Cuboid3d;

/// 8-bit RGBA color
pub type Rgba = [u8; 4];

pub const RED: Rgba = [255, 0, 0, 255];
pub const GREEN: Rgba = [0, 255, 0, 255];
pub const BLUE: Rgba = [0, 0, 255, 255];

/// A line segment in an object's local space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line3 {
    pub start: Point3<f32>,
    pub end: Point3<f32>,
    pub color: Option<Rgba>,
}

impl Line3 {
    pub fn new(start: Point3<f32>, end: Point3<f32>, color: Option<Rgba>) -> Self {
        Self { start, end, color }
    }
}

/// Reference to a mesh asset plus the fixed matrix that aligns it with its annotations.
///
/// Loading the file is left to the renderer (see [`crate::MeshCache`]).
#[derive(Debug, Clone, PartialEq)]
pub struct MeshRef {
    pub source: PathBuf,
    pub initial_matrix: Matrix4<f32>,
}

impl MeshRef {
    pub fn new(source: impl Into<PathBuf>, initial_matrix: Matrix4<f32>) -> Self {
        Self {
            source: source.into(),
            initial_matrix,
        }
    }
}

/// Three axis lines from the object origin, sized per axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PivotAxis {
    pub size: Vector3<f32>,
}

impl PivotAxis {
    pub fn new(size: Vector3<f32>) -> Self {
        Self { size }
    }

    pub fn origin(&self) -> Point3<f32> {
        Point3::origin()
    }

    pub fn x_axis(&self) -> Point3<f32> {
        Point3::new(self.size.x, 0.0, 0.0)
    }

    pub fn y_axis(&self) -> Point3<f32> {
        Point3::new(0.0, self.size.y, 0.0)
    }

    pub fn z_axis(&self) -> Point3<f32> {
        Point3::new(0.0, 0.0, self.size.z)
    }

    /// X red, Y green, Z blue
    pub fn lines(&self) -> [Line3; 3] {
        [
            Line3::new(self.origin(), self.x_axis(), Some(RED)),
            Line3::new(self.origin(), self.y_axis(), Some(GREEN)),
            Line3::new(self.origin(), self.z_axis(), Some(BLUE)),
        ]
    }
}

impl Default for PivotAxis {
    fn default() -> Self {
        Self::new(Vector3::new(1.0, 1.0, 1.0))
    }
}

/// Local-space geometry handed to a renderer together with a world transform
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Geometry {
    pub lines: Vec<Line3>,
    pub points: Vec<Point3<f32>>,
    pub triangles: Vec<[Point3<f32>; 3]>,
    pub mesh: Option<MeshRef>,
}

/// Payload carried by a scene node
#[derive(Debug, Clone, PartialEq)]
pub enum SceneObject {
    Mesh(MeshRef),
    Cuboid(Cuboid3d),
    PivotAxis(PivotAxis),
}

impl SceneObject {
    pub fn geometry(&self) -> Geometry {
        match self {
            SceneObject::Mesh(mesh) => Geometry {
                mesh: Some(mesh.clone()),
                ..Default::default()
            },
            SceneObject::Cuboid(cuboid) => cuboid.geometry(),
            SceneObject::PivotAxis(pivot) => Geometry {
                lines: pivot.lines().to_vec(),
                ..Default::default()
            },
        }
    }
}

/// Anything a renderer can place in the world and draw
pub trait Drawable {
    fn world_transform(&self) -> Matrix4<f32>;

    fn emit_geometry(&self) -> Geometry;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pivot_axis_lines() {
        let pivot = PivotAxis::new(Vector3::new(2.0, 3.0, 4.0));
        let lines = pivot.lines();
        assert_eq!(lines[0].end, Point3::new(2.0, 0.0, 0.0));
        assert_eq!(lines[1].end, Point3::new(0.0, 3.0, 0.0));
        assert_eq!(lines[2].end, Point3::new(0.0, 0.0, 4.0));
        assert_eq!(lines[2].color, Some(BLUE));
        assert!(lines.iter().all(|line| line.start == Point3::origin()));
    }

    #[test]
    fn test_mesh_geometry_keeps_initial_matrix() {
        let initial = Matrix4::new_scaling(0.01);
        let object = SceneObject::Mesh(MeshRef::new("models/can.obj", initial));
        let geometry = object.geometry();
        assert!(geometry.lines.is_empty());
        assert_eq!(geometry.mesh.map(|mesh| mesh.initial_matrix), Some(initial));
    }
}
