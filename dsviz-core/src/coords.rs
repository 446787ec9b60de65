/// Coordinate systems and Euler rotations
use nalgebra::{Matrix3, Quaternion, Rotation3, UnitQuaternion, Vector3};

/// A coordinate system described by three direction vectors.
///
/// Directions are expressed in the OpenCV camera convention, where X points
/// right, Y points down and Z points forward. The default system therefore has
/// `forward = +Z`, `right = +X` and `up = -Y`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateSystem {
    pub forward: Vector3<f32>,
    pub right: Vector3<f32>,
    pub up: Vector3<f32>,
}

impl CoordinateSystem {
    pub fn new(forward: Vector3<f32>, right: Vector3<f32>, up: Vector3<f32>) -> Self {
        Self { forward, right, up }
    }

    /// Matrix mapping the OpenCV axes onto this system (columns: right, down, forward).
    ///
    /// The default system maps to the identity.
    pub fn to_matrix(&self) -> Matrix3<f32> {
        Matrix3::from_columns(&[self.right, -self.up, self.forward])
    }

    /// Rotation equivalent of [`Self::to_matrix`].
    ///
    /// Only meaningful for orthonormal, right-handed systems; the basis is not
    /// re-orthogonalised.
    pub fn to_quaternion(&self) -> UnitQuaternion<f32> {
        UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(self.to_matrix()))
    }
}

impl Default for CoordinateSystem {
    fn default() -> Self {
        Self {
            forward: Vector3::new(0.0, 0.0, 1.0),
            right: Vector3::new(1.0, 0.0, 0.0),
            up: Vector3::new(0.0, -1.0, 0.0),
        }
    }
}

/// Euler rotation around the X (pitch), Y (yaw) and Z (roll) axes, in radians.
///
/// Rotations are applied yaw, pitch, roll (Y X Z).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rotator {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Rotator {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn from_yaw_pitch_roll(yaw: f32, pitch: f32, roll: f32) -> Self {
        Self::new(pitch, yaw, roll)
    }

    pub fn from_yaw_pitch_roll_degrees(yaw: f32, pitch: f32, roll: f32) -> Self {
        Self::new(pitch.to_radians(), yaw.to_radians(), roll.to_radians())
    }

    pub fn pitch(&self) -> f32 {
        self.x
    }

    pub fn yaw(&self) -> f32 {
        self.y
    }

    pub fn roll(&self) -> f32 {
        self.z
    }

    /// Component-wise sum of two rotators
    pub fn add(&self, other: &Rotator) -> Rotator {
        Rotator::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    /// Tait-Bryan rotation matrix (Z1 X2 Y3 terms)
    pub fn to_rotation_matrix(&self) -> Matrix3<f32> {
        let (s1, c1) = self.z.sin_cos();
        let (s2, c2) = self.x.sin_cos();
        let (s3, c3) = self.y.sin_cos();

        Matrix3::new(
            c1 * c3 - s1 * s2 * s3,
            -c2 * s1,
            c1 * s3 + c3 * s1 * s2,
            c3 * s1 + c1 * s2 * s3,
            c1 * c2,
            s1 * s3 - c1 * c3 * s2,
            -c2 * s3,
            s2,
            c2 * c3,
        )
    }

    /// Quaternion in the annotation convention.
    ///
    /// The vector part comes out negated, matching the flip that
    /// [`crate::Transform`] applies when building its rotation matrix, so a
    /// transform driven by this quaternion rotates like [`Self::to_rotation_matrix`].
    pub fn to_quaternion(&self) -> Quaternion<f32> {
        let (sx, cx) = (self.x * 0.5).sin_cos();
        let (sy, cy) = (self.y * 0.5).sin_cos();
        let (sz, cz) = (self.z * 0.5).sin_cos();

        Quaternion::new(
            sx * sy * sz + cx * cy * cz,
            -sx * cy * cz - cx * sy * sz,
            sx * cy * sz - cx * sy * cz,
            sx * sy * cz - cx * cy * sz,
        )
    }
}
