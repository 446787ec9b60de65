/// 3D transformation state and matrices
use std::cell::Cell;

use nalgebra::{Matrix4, Quaternion, UnitQuaternion, Vector3};

use crate::coords::Rotator;
use crate::error::{Error, Result};

/// Location, scale and rotation of an object relative to its parent.
///
/// The composed matrix is `translation * scale * rotation` and is only rebuilt
/// when it is read after a change. The initial matrix (a fixed mesh alignment)
/// is stored alongside but never folded into [`Transform::to_matrix`].
#[derive(Debug, Clone)]
pub struct Transform {
    location: Vector3<f32>,
    scale: Vector3<f32>,
    rotation: Rotator,
    quaternion: Quaternion<f32>,
    initial_matrix: Matrix4<f32>,
    matrix: Cell<Matrix4<f32>>,
    dirty: Cell<bool>,
}

impl Transform {
    pub fn new() -> Self {
        Self {
            location: Vector3::zeros(),
            scale: Vector3::new(1.0, 1.0, 1.0),
            rotation: Rotator::zero(),
            quaternion: Quaternion::identity(),
            initial_matrix: Matrix4::identity(),
            matrix: Cell::new(Matrix4::identity()),
            dirty: Cell::new(false),
        }
    }

    pub fn from_location_quaternion(location: Vector3<f32>, quaternion: Quaternion<f32>) -> Self {
        let mut transform = Self::new();
        transform.set_location(location);
        transform.set_quaternion(quaternion);
        transform
    }

    pub fn location(&self) -> Vector3<f32> {
        self.location
    }

    pub fn scale(&self) -> Vector3<f32> {
        self.scale
    }

    pub fn quaternion(&self) -> Quaternion<f32> {
        self.quaternion
    }

    pub fn rotation(&self) -> Rotator {
        self.rotation
    }

    pub fn initial_matrix(&self) -> Matrix4<f32> {
        self.initial_matrix
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    pub fn set_location(&mut self, location: Vector3<f32>) {
        self.location = location;
        self.mark_changed();
    }

    /// Move by a delta
    pub fn translate_by(&mut self, delta: Vector3<f32>) {
        self.set_location(self.location + delta);
    }

    /// Quaternion components are expected in annotation order and unit length.
    pub fn set_quaternion(&mut self, quaternion: Quaternion<f32>) {
        self.quaternion = quaternion;
        self.mark_changed();
    }

    pub fn set_euler_rotation(&mut self, rotation: Rotator) {
        self.rotation = rotation;
        self.set_quaternion(rotation.to_quaternion());
    }

    /// Add Euler angles to the current rotation
    pub fn rotate(&mut self, delta: Rotator) {
        self.set_euler_rotation(self.rotation.add(&delta));
    }

    pub fn set_scale(&mut self, scale: Vector3<f32>) {
        self.scale = scale;
        self.mark_changed();
    }

    /// Multiply the current scale by the same amount on every axis
    pub fn set_scale_uniform(&mut self, factor: f32) {
        self.set_scale(self.scale * factor);
    }

    pub fn set_initial_matrix(&mut self, initial_matrix: Matrix4<f32>) {
        self.initial_matrix = initial_matrix;
        self.mark_changed();
    }

    /// Back to the origin with no rotation. Scale is left untouched.
    pub fn reset(&mut self) {
        self.set_location(Vector3::zeros());
        self.set_quaternion(Quaternion::identity());
    }

    pub fn to_matrix(&self) -> Matrix4<f32> {
        if self.dirty.get() {
            let matrix = Self::translation_matrix(&self.location)
                * Self::scale_matrix(&self.scale)
                * Self::rotation_matrix(&self.quaternion);
            self.matrix.set(matrix);
            self.dirty.set(false);
        }
        self.matrix.get()
    }

    fn mark_changed(&mut self) {
        self.dirty.set(true);
    }

    /// Create a translation matrix
    pub fn translation_matrix(location: &Vector3<f32>) -> Matrix4<f32> {
        Matrix4::new_translation(location)
    }

    /// Create a scale matrix
    pub fn scale_matrix(scale: &Vector3<f32>) -> Matrix4<f32> {
        Matrix4::new_nonuniform_scaling(scale)
    }

    /// Rotation matrix for an annotation quaternion.
    ///
    /// The x, y and z components are negated before conversion. Nobody has
    /// pinned down why the annotation format needs this; it has to match the
    /// exporter's handedness, so leave it alone.
    pub fn rotation_matrix(quaternion: &Quaternion<f32>) -> Matrix4<f32> {
        let flipped = Quaternion::new(quaternion.w, -quaternion.i, -quaternion.j, -quaternion.k);
        UnitQuaternion::new_unchecked(flipped).to_homogeneous()
    }
}

/// Build a matrix from the row-major nested lists used in the dataset JSON files
pub fn matrix_from_rows(rows: &[Vec<f32>]) -> Result<Matrix4<f32>> {
    if rows.len() != 4 || rows.iter().any(|row| row.len() != 4) {
        return Err(Error::InvalidMatrix(rows.iter().map(Vec::len).collect()));
    }
    Ok(Matrix4::from_fn(|row, col| rows[row][col]))
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}
