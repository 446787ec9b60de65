/// Annotation cuboids in 3D and their 2D projections
use nalgebra::{Matrix3, Matrix4, Point2, Point3, Vector3};

use crate::coords::CoordinateSystem;
use crate::geometry::{Geometry, Line3};

/// Vertices of a cuboid, named in the object's local frame.
///
/// The discriminant is the vertex's slot in [`Cuboid3d::vertices`] and
/// [`Cuboid2d::vertices`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CuboidVertex {
    FrontTopRight = 0,
    FrontTopLeft = 1,
    FrontBottomLeft = 2,
    FrontBottomRight = 3,
    RearTopRight = 4,
    RearTopLeft = 5,
    RearBottomLeft = 6,
    RearBottomRight = 7,
    Center = 8,
}

impl CuboidVertex {
    /// Corners only, the center is not counted
    pub const CORNER_COUNT: usize = 8;
    pub const COUNT: usize = 9;

    pub const ALL: [CuboidVertex; Self::COUNT] = [
        CuboidVertex::FrontTopRight,
        CuboidVertex::FrontTopLeft,
        CuboidVertex::FrontBottomLeft,
        CuboidVertex::FrontBottomRight,
        CuboidVertex::RearTopRight,
        CuboidVertex::RearTopLeft,
        CuboidVertex::RearBottomLeft,
        CuboidVertex::RearBottomRight,
        CuboidVertex::Center,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

use CuboidVertex::*;

/// Wireframe edges: front face, rear face, then the four connecting edges
pub const CUBOID_EDGES: [[CuboidVertex; 2]; 12] = [
    [FrontTopLeft, FrontTopRight],
    [FrontTopRight, FrontBottomRight],
    [FrontBottomRight, FrontBottomLeft],
    [FrontBottomLeft, FrontTopLeft],
    [RearTopLeft, RearTopRight],
    [RearTopRight, RearBottomRight],
    [RearBottomRight, RearBottomLeft],
    [RearBottomLeft, RearTopLeft],
    [FrontBottomLeft, RearBottomLeft],
    [FrontTopLeft, RearTopLeft],
    [FrontBottomRight, RearBottomRight],
    [FrontTopRight, RearTopRight],
];

/// Counter-clockwise face triangles for filled rendering
pub const CUBOID_FACE_TRIANGLES: [[CuboidVertex; 3]; 12] = [
    // Front
    [FrontBottomLeft, FrontTopLeft, FrontTopRight],
    [FrontTopRight, FrontBottomRight, FrontBottomLeft],
    // Right
    [FrontBottomRight, FrontTopRight, RearBottomRight],
    [RearTopRight, RearBottomRight, FrontTopRight],
    // Rear
    [RearBottomLeft, RearBottomRight, RearTopRight],
    [RearTopRight, RearTopLeft, RearBottomLeft],
    // Left
    [FrontTopLeft, FrontBottomLeft, RearBottomLeft],
    [RearBottomLeft, RearTopLeft, FrontTopLeft],
    // Top
    [RearTopLeft, RearTopRight, FrontTopRight],
    [FrontTopRight, FrontTopLeft, RearTopLeft],
    // Bottom
    [RearBottomLeft, FrontBottomLeft, FrontBottomRight],
    [FrontBottomRight, RearBottomRight, RearBottomLeft],
];

/// An oriented box in an object's local frame: 8 corners plus the center
#[derive(Debug, Clone, PartialEq)]
pub struct Cuboid3d {
    size: Vector3<f32>,
    center: Point3<f32>,
    coord_system: Option<CoordinateSystem>,
    vertices: [Point3<f32>; CuboidVertex::COUNT],
}

impl Cuboid3d {
    pub fn new(
        size: Vector3<f32>,
        center: Point3<f32>,
        coord_system: Option<CoordinateSystem>,
    ) -> Self {
        let mut cuboid = Self {
            size,
            center,
            coord_system,
            vertices: [center; CuboidVertex::COUNT],
        };
        cuboid.generate_vertices();
        cuboid
    }

    pub fn size(&self) -> Vector3<f32> {
        self.size
    }

    pub fn center(&self) -> Point3<f32> {
        self.center
    }

    pub fn coord_system(&self) -> Option<&CoordinateSystem> {
        self.coord_system.as_ref()
    }

    pub fn vertex(&self, vertex: CuboidVertex) -> Point3<f32> {
        self.vertices[vertex.index()]
    }

    pub fn vertices(&self) -> &[Point3<f32>; CuboidVertex::COUNT] {
        &self.vertices
    }

    fn generate_vertices(&mut self) {
        let c = self.center;

        self.vertices = match &self.coord_system {
            None => {
                let (width, height, depth) = (self.size.x, self.size.y, self.size.z);
                // OpenCV axes: X right, Y down, Z forward
                let right = c.x + width / 2.0;
                let left = c.x - width / 2.0;
                let top = c.y - height / 2.0;
                let bottom = c.y + height / 2.0;
                let front = c.z + depth / 2.0;
                let rear = c.z - depth / 2.0;

                [
                    Point3::new(right, top, front),
                    Point3::new(left, top, front),
                    Point3::new(left, bottom, front),
                    Point3::new(right, bottom, front),
                    Point3::new(right, top, rear),
                    Point3::new(left, top, rear),
                    Point3::new(left, bottom, rear),
                    Point3::new(right, bottom, rear),
                    c,
                ]
            }
            Some(coords) => {
                let forward = coords.forward * (self.size.y * 0.5);
                let up = coords.up * (self.size.z * 0.5);
                let right = coords.right * (self.size.x * 0.5);

                [
                    c + forward + up + right,
                    c + forward + up - right,
                    c + forward - up - right,
                    c + forward - up + right,
                    c - forward + up + right,
                    c - forward + up - right,
                    c - forward - up - right,
                    c - forward - up + right,
                    c,
                ]
            }
        };
    }

    /// Transform every vertex into camera space and project it with a pinhole model.
    ///
    /// No extrinsics or distortion are applied: `world_transform` must already
    /// take the cuboid into the camera frame. Vertices on the camera plane
    /// (`z == 0`) or that project to non-finite values come back absent.
    pub fn project(&self, world_transform: &Matrix4<f32>, intrinsic: &Matrix3<f32>) -> Cuboid2d {
        let mut projected = [None; CuboidVertex::COUNT];
        for (slot, vertex) in projected.iter_mut().zip(self.vertices.iter()) {
            let camera_point = world_transform.transform_point(vertex);
            *slot = project_pinhole(&camera_point, intrinsic);
        }
        Cuboid2d::new(projected)
    }

    /// Wireframe, corner points and faces in local space
    pub fn geometry(&self) -> Geometry {
        Geometry {
            lines: CUBOID_EDGES
                .iter()
                .map(|[a, b]| Line3::new(self.vertex(*a), self.vertex(*b), None))
                .collect(),
            points: self.vertices.to_vec(),
            triangles: CUBOID_FACE_TRIANGLES
                .iter()
                .map(|[a, b, c]| [self.vertex(*a), self.vertex(*b), self.vertex(*c)])
                .collect(),
            mesh: None,
        }
    }
}

impl Default for Cuboid3d {
    fn default() -> Self {
        Self::new(Vector3::new(1.0, 1.0, 1.0), Point3::origin(), None)
    }
}

/// Project a camera-space point through an intrinsic matrix
pub fn project_pinhole(point: &Point3<f32>, intrinsic: &Matrix3<f32>) -> Option<Point2<f32>> {
    if point.z == 0.0 {
        return None;
    }

    let normalized = Vector3::new(point.x / point.z, point.y / point.z, 1.0);
    let pixel = intrinsic * normalized;
    let projected = Point2::new(pixel.x, pixel.y);

    if projected.x.is_finite() && projected.y.is_finite() {
        Some(projected)
    } else {
        None
    }
}

/// Projected cuboid: one optional image point per [`CuboidVertex`]
#[derive(Debug, Clone, PartialEq)]
pub struct Cuboid2d {
    vertices: [Option<Point2<f32>>; CuboidVertex::COUNT],
}

impl Cuboid2d {
    pub fn new(vertices: [Option<Point2<f32>>; CuboidVertex::COUNT]) -> Self {
        Self { vertices }
    }

    /// Build from a list of points in vertex order.
    ///
    /// Annotations sometimes carry only the 8 corners; missing slots stay
    /// absent and anything past the ninth point is ignored.
    pub fn from_points(points: &[Point2<f32>]) -> Self {
        let mut vertices = [None; CuboidVertex::COUNT];
        for (slot, point) in vertices.iter_mut().zip(points.iter()) {
            *slot = Some(*point);
        }
        Self { vertices }
    }

    pub fn vertex(&self, vertex: CuboidVertex) -> Option<Point2<f32>> {
        self.vertices[vertex.index()]
    }

    pub fn vertices(&self) -> &[Option<Point2<f32>>; CuboidVertex::COUNT] {
        &self.vertices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn assert_point3(actual: Point3<f32>, expected: [f32; 3]) {
        assert!(
            (actual - Point3::from(expected)).norm() < 1e-6,
            "{actual:?} != {expected:?}"
        );
    }

    #[test]
    fn test_default_convention_vertices() {
        let cuboid = Cuboid3d::new(Vector3::new(2.0, 2.0, 2.0), Point3::new(0.0, 0.0, 5.0), None);
        assert_point3(cuboid.vertex(FrontTopRight), [1.0, -1.0, 6.0]);
        assert_point3(cuboid.vertex(RearBottomLeft), [-1.0, 1.0, 4.0]);
        assert_point3(cuboid.vertex(Center), [0.0, 0.0, 5.0]);
    }

    #[test]
    fn test_non_uniform_size_axes() {
        let cuboid = Cuboid3d::new(Vector3::new(4.0, 2.0, 6.0), Point3::origin(), None);
        assert_point3(cuboid.vertex(FrontBottomLeft), [-2.0, 1.0, 3.0]);
        assert_point3(cuboid.vertex(RearTopRight), [2.0, -1.0, -3.0]);
    }

    #[test]
    fn test_custom_coordinate_system() {
        let size = Vector3::new(2.0, 2.0, 2.0);
        let center = Point3::new(0.0, 0.0, 5.0);
        let default = Cuboid3d::new(size, center, None);
        let custom = Cuboid3d::new(size, center, Some(CoordinateSystem::default()));
        for vertex in CuboidVertex::ALL {
            assert!((custom.vertex(vertex) - default.vertex(vertex)).norm() < 1e-6);
        }

        // Forward along +X, extents taken from size.y
        let sideways = CoordinateSystem::new(
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, -1.0),
            Vector3::new(0.0, -1.0, 0.0),
        );
        let cuboid = Cuboid3d::new(Vector3::new(2.0, 4.0, 6.0), Point3::origin(), Some(sideways));
        assert_point3(cuboid.vertex(FrontTopRight), [2.0, -3.0, -1.0]);
    }

    #[test]
    fn test_edge_table() {
        let mut seen = HashSet::new();
        for [a, b] in CUBOID_EDGES {
            assert!(a.index() < CuboidVertex::COUNT && b.index() < CuboidVertex::COUNT);
            assert_ne!(a, Center);
            assert_ne!(b, Center);
            let key = (a.index().min(b.index()), a.index().max(b.index()));
            assert!(seen.insert(key), "duplicate edge {key:?}");
        }

        let is_front = |v: CuboidVertex| v.index() < 4;
        for [a, b] in &CUBOID_EDGES[0..4] {
            assert!(is_front(*a) && is_front(*b));
        }
        for [a, b] in &CUBOID_EDGES[4..8] {
            assert!(!is_front(*a) && !is_front(*b));
        }
        for [a, b] in &CUBOID_EDGES[8..12] {
            assert!(is_front(*a) != is_front(*b));
        }
    }

    #[test]
    fn test_vertex_index_roundtrip() {
        for (index, vertex) in CuboidVertex::ALL.iter().enumerate() {
            assert_eq!(vertex.index(), index);
            assert_eq!(CuboidVertex::from_index(index), Some(*vertex));
        }
        assert_eq!(CuboidVertex::from_index(9), None);
    }

    #[test]
    fn test_projection_matches_pinhole() {
        let (fx, fy, cx, cy) = (640.0, 480.0, 320.0, 240.0);
        let intrinsic = Matrix3::new(fx, 0.0, cx, 0.0, fy, cy, 0.0, 0.0, 1.0);
        let cuboid = Cuboid3d::new(Vector3::new(2.0, 2.0, 2.0), Point3::new(0.5, -0.5, 5.0), None);
        let projected = cuboid.project(&Matrix4::identity(), &intrinsic);

        for vertex in CuboidVertex::ALL {
            let p = cuboid.vertex(vertex);
            let q = projected.vertex(vertex).unwrap();
            assert!((q.x - (fx * p.x / p.z + cx)).abs() < 1e-3);
            assert!((q.y - (fy * p.y / p.z + cy)).abs() < 1e-3);
        }
    }

    #[test]
    fn test_projection_uses_world_transform() {
        let intrinsic = Matrix3::new(640.0, 0.0, 320.0, 0.0, 640.0, 240.0, 0.0, 0.0, 1.0);
        let cuboid = Cuboid3d::default();
        let world = Matrix4::new_translation(&Vector3::new(0.0, 0.0, 10.0));
        let center = cuboid.project(&world, &intrinsic).vertex(Center).unwrap();
        assert!((center.x - 320.0).abs() < 1e-4);
        assert!((center.y - 240.0).abs() < 1e-4);
    }

    #[test]
    fn test_point_on_camera_plane_is_absent() {
        let intrinsic = Matrix3::identity();
        let cuboid = Cuboid3d::new(Vector3::new(2.0, 2.0, 2.0), Point3::new(0.0, 0.0, 1.0), None);
        let projected = cuboid.project(&Matrix4::identity(), &intrinsic);
        assert!(projected.vertex(RearTopRight).is_none());
        assert!(projected.vertex(FrontTopRight).is_some());
    }

    #[test]
    fn test_cuboid2d_from_partial_points() {
        let points: Vec<Point2<f32>> = (0..8).map(|i| Point2::new(i as f32, 0.0)).collect();
        let cuboid = Cuboid2d::from_points(&points);
        assert_eq!(cuboid.vertex(RearBottomRight), Some(Point2::new(7.0, 0.0)));
        assert_eq!(cuboid.vertex(Center), None);
    }

    #[test]
    fn test_geometry_counts() {
        let geometry = Cuboid3d::default().geometry();
        assert_eq!(geometry.lines.len(), 12);
        assert_eq!(geometry.points.len(), 9);
        assert_eq!(geometry.triangles.len(), 12);
    }
}
