/// Pinhole camera intrinsics and projection matrices
use std::cell::Cell;
use std::fs;
use std::path::Path;

use nalgebra::{Matrix3, Matrix4, Point2, Point3};
use serde::Deserialize;

use crate::cuboid::project_pinhole;
use crate::error::{Error, Result};
use crate::transform::matrix_from_rows;

pub const DEFAULT_WIDTH: f32 = 640.0;
pub const DEFAULT_HEIGHT: f32 = 480.0;
pub const DEFAULT_FOCAL_LENGTH: f32 = 640.0;
/// Near and far planes coincide: the projection only drives 2D overlays, not depth tests
pub const DEFAULT_ZNEAR: f32 = 1.0;
pub const DEFAULT_ZFAR: f32 = DEFAULT_ZNEAR;

/// Pinhole camera model: resolution, focal lengths and principal point
#[derive(Debug, Clone)]
pub struct CameraIntrinsics {
    res_width: f32,
    res_height: f32,
    fx: f32,
    fy: f32,
    cx: f32,
    cy: f32,
    znear: f32,
    zfar: f32,
    supplied_projection: Option<Matrix4<f32>>,
    projection: Cell<Option<Matrix4<f32>>>,
}

impl CameraIntrinsics {
    pub fn new(res_width: f32, res_height: f32, fx: f32, fy: f32, cx: f32, cy: f32) -> Self {
        Self {
            res_width,
            res_height,
            fx,
            fy,
            cx,
            cy,
            znear: DEFAULT_ZNEAR,
            zfar: DEFAULT_ZFAR,
            supplied_projection: None,
            projection: Cell::new(None),
        }
    }

    /// Intrinsics of a rendering camera with the given horizontal field of view (degrees).
    ///
    /// The principal point sits at the image center and pixels are square.
    pub fn from_fov(res_width: f32, res_height: f32, hfov_degrees: f32) -> Self {
        let cx = res_width / 2.0;
        let cy = res_height / 2.0;
        let fx = cx / (hfov_degrees.to_radians() / 2.0).tan();
        Self::new(res_width, res_height, fx, fx, cx, cy)
    }

    pub fn with_depth_range(mut self, znear: f32, zfar: f32) -> Self {
        self.znear = znear;
        self.zfar = zfar;
        self.projection.set(None);
        self
    }

    /// Use a projection matrix from the capture tool instead of deriving one
    pub fn with_projection_matrix(mut self, projection: Matrix4<f32>) -> Self {
        self.supplied_projection = Some(projection);
        self.projection.set(None);
        self
    }

    /// Re-derive the intrinsics for a new horizontal field of view at the same resolution
    pub fn set_hfov(&mut self, hfov_degrees: f32) {
        let fov = Self::from_fov(self.res_width, self.res_height, hfov_degrees);
        self.fx = fov.fx;
        self.fy = fov.fy;
        self.cx = fov.cx;
        self.cy = fov.cy;
        self.supplied_projection = None;
        self.projection.set(None);
    }

    pub fn res_width(&self) -> f32 {
        self.res_width
    }

    pub fn res_height(&self) -> f32 {
        self.res_height
    }

    pub fn fx(&self) -> f32 {
        self.fx
    }

    pub fn fy(&self) -> f32 {
        self.fy
    }

    pub fn cx(&self) -> f32 {
        self.cx
    }

    pub fn cy(&self) -> f32 {
        self.cy
    }

    pub fn znear(&self) -> f32 {
        self.znear
    }

    pub fn zfar(&self) -> f32 {
        self.zfar
    }

    /// The 3x3 camera matrix `[[fx, 0, cx], [0, fy, cy], [0, 0, 1]]`
    pub fn intrinsic_matrix(&self) -> Matrix3<f32> {
        Matrix3::new(self.fx, 0.0, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0)
    }

    /// Off-center OpenGL-style perspective matrix, computed once and cached
    pub fn projection_matrix(&self) -> Matrix4<f32> {
        if let Some(projection) = self.supplied_projection {
            return projection;
        }
        if let Some(projection) = self.projection.get() {
            return projection;
        }
        let projection = self.calculate_projection_matrix();
        self.projection.set(Some(projection));
        projection
    }

    fn calculate_projection_matrix(&self) -> Matrix4<f32> {
        let zdiff = self.zfar - self.znear;
        let a = 2.0 * self.fx / self.res_width;
        let b = 2.0 * self.fy / self.res_height;
        // Equal planes collapse to a fixed offset with no depth range
        let (c, d) = if zdiff > 0.0 {
            (-self.znear / zdiff, self.znear * self.zfar / zdiff)
        } else {
            (0.0, -self.znear)
        };
        let c1 = 1.0 - 2.0 * self.cx / self.res_width;
        let c2 = 2.0 * self.cy / self.res_height - 1.0;

        Matrix4::new(
            a, 0.0, 0.0, 0.0, //
            0.0, b, 0.0, 0.0, //
            c1, c2, c, d, //
            0.0, 0.0, -1.0, 0.0,
        )
    }

    /// Project a camera-space point to pixel coordinates
    pub fn project_point(&self, point: &Point3<f32>) -> Option<Point2<f32>> {
        project_pinhole(point, &self.intrinsic_matrix())
    }

    /// Load the first viewpoint of a `_camera_settings.json` file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let settings: CameraSettingsFile =
            serde_json::from_str(&text).map_err(|e| Error::json(path, e))?;
        settings
            .intrinsics()?
            .ok_or_else(|| Error::MissingCameraSettings(path.to_path_buf()))
    }
}

impl Default for CameraIntrinsics {
    fn default() -> Self {
        Self::new(
            DEFAULT_WIDTH,
            DEFAULT_HEIGHT,
            DEFAULT_FOCAL_LENGTH,
            DEFAULT_FOCAL_LENGTH,
            DEFAULT_WIDTH / 2.0,
            DEFAULT_HEIGHT / 2.0,
        )
    }
}

/// Contents of `_camera_settings.json`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CameraSettingsFile {
    #[serde(default)]
    pub camera_settings: Vec<CameraViewpoint>,
}

impl CameraSettingsFile {
    /// Intrinsics of the first viewpoint; other viewpoints are ignored
    pub fn intrinsics(&self) -> Result<Option<CameraIntrinsics>> {
        match self.camera_settings.first() {
            Some(viewpoint) => viewpoint.intrinsics(),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CameraViewpoint {
    pub intrinsic_settings: Option<IntrinsicSettings>,
    pub captured_image_size: Option<ImageSize>,
    #[serde(rename = "cameraProjectionMatrix")]
    pub camera_projection_matrix: Option<Vec<Vec<f32>>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IntrinsicSettings {
    pub fx: Option<f32>,
    pub fy: Option<f32>,
    pub cx: Option<f32>,
    pub cy: Option<f32>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ImageSize {
    pub width: Option<f32>,
    pub height: Option<f32>,
}

impl CameraViewpoint {
    /// `None` when the viewpoint has no `intrinsic_settings` block
    pub fn intrinsics(&self) -> Result<Option<CameraIntrinsics>> {
        let Some(intrinsic) = &self.intrinsic_settings else {
            return Ok(None);
        };

        let size = self.captured_image_size.unwrap_or_default();
        let (width, height) = match (size.width, size.height) {
            (Some(width), Some(height)) => (width, height),
            _ => {
                log::warn!(
                    "'captured_image_size' missing or incomplete in camera settings, using {DEFAULT_WIDTH} x {DEFAULT_HEIGHT}"
                );
                (DEFAULT_WIDTH, DEFAULT_HEIGHT)
            }
        };

        let mut camera = CameraIntrinsics::new(
            width,
            height,
            intrinsic.fx.unwrap_or(DEFAULT_FOCAL_LENGTH),
            intrinsic.fy.unwrap_or(DEFAULT_FOCAL_LENGTH),
            intrinsic.cx.unwrap_or(width / 2.0),
            intrinsic.cy.unwrap_or(height / 2.0),
        );

        if let Some(rows) = &self.camera_projection_matrix {
            let mut projection = matrix_from_rows(rows)?;
            // Capture tool writes the opposite clip-space handedness
            for (row, col) in [(2, 0), (2, 1), (2, 3), (3, 2)] {
                projection[(row, col)] = -projection[(row, col)];
            }
            camera = camera.with_projection_matrix(projection);
        }

        Ok(Some(camera))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_camera() {
        let camera = CameraIntrinsics::default();
        assert_eq!(camera.res_width(), 640.0);
        assert_eq!(camera.fx(), 640.0);
        assert_eq!(camera.cx(), 320.0);
        assert_eq!(camera.cy(), 240.0);
        assert_eq!(camera.znear(), camera.zfar());
    }

    #[test]
    fn test_from_fov() {
        let hfov = 90.0f32;
        let camera = CameraIntrinsics::from_fov(1920.0, 1080.0, hfov);
        let expected = 960.0 / (hfov.to_radians() / 2.0).tan();
        assert!((camera.fx() - expected).abs() < 1e-3);
        assert_eq!(camera.fx(), camera.fy());
        assert_eq!(camera.cx(), 960.0);
        assert_eq!(camera.cy(), 540.0);
    }

    #[test]
    fn test_set_hfov_keeps_resolution() {
        let mut camera = CameraIntrinsics::new(800.0, 600.0, 100.0, 120.0, 10.0, 20.0);
        let _ = camera.projection_matrix();
        camera.set_hfov(90.0);
        assert!((camera.fx() - 400.0).abs() < 1e-3);
        assert_eq!(camera.cy(), 300.0);
        assert!((camera.projection_matrix()[(0, 0)] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_intrinsic_matrix_layout() {
        let camera = CameraIntrinsics::new(640.0, 480.0, 600.0, 610.0, 330.0, 250.0);
        let k = camera.intrinsic_matrix();
        assert_eq!(k[(0, 0)], 600.0);
        assert_eq!(k[(1, 1)], 610.0);
        assert_eq!(k[(0, 2)], 330.0);
        assert_eq!(k[(1, 2)], 250.0);
        assert_eq!(k[(2, 2)], 1.0);
        assert_eq!(k[(1, 0)], 0.0);
    }

    #[test]
    fn test_degenerate_projection_matrix() {
        let camera = CameraIntrinsics::default();
        let m = camera.projection_matrix();
        assert_eq!(m[(2, 2)], 0.0);
        assert_eq!(m[(2, 3)], -camera.znear());
        assert!((m[(0, 0)] - 2.0).abs() < 1e-6);
        assert!((m[(1, 1)] - 640.0 * 2.0 / 480.0).abs() < 1e-6);
        assert_eq!(m[(2, 0)], 0.0);
        assert_eq!(m[(2, 1)], 0.0);
        assert_eq!(m[(3, 2)], -1.0);
        assert_eq!(m[(3, 3)], 0.0);
    }

    #[test]
    fn test_projection_with_depth_range() {
        let camera = CameraIntrinsics::new(640.0, 480.0, 640.0, 640.0, 160.0, 360.0)
            .with_depth_range(1.0, 101.0);
        let m = camera.projection_matrix();
        assert!((m[(2, 2)] + 0.01).abs() < 1e-6);
        assert!((m[(2, 3)] - 1.01).abs() < 1e-5);
        assert!((m[(2, 0)] - 0.5).abs() < 1e-6);
        assert!((m[(2, 1)] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_project_center_point() {
        let camera = CameraIntrinsics::default();
        let pixel = camera.project_point(&Point3::new(0.0, 0.0, 10.0)).unwrap();
        assert!((pixel.x - 320.0).abs() < 1e-6);
        assert!((pixel.y - 240.0).abs() < 1e-6);
    }

    #[test]
    fn test_camera_settings_json() {
        let json = r#"{
            "camera_settings": [{
                "name": "Viewpoint",
                "intrinsic_settings": { "fx": 768.16, "fy": 768.16, "cx": 480, "cy": 270 },
                "captured_image_size": { "width": 960, "height": 540 }
            }]
        }"#;
        let settings: CameraSettingsFile = serde_json::from_str(json).unwrap();
        let camera = settings.intrinsics().unwrap().unwrap();
        assert_eq!(camera.res_width(), 960.0);
        assert!((camera.fx() - 768.16).abs() < 1e-3);
        assert_eq!(camera.cy(), 270.0);
    }

    #[test]
    fn test_camera_settings_defaults() {
        let json = r#"{ "camera_settings": [{ "intrinsic_settings": {} }] }"#;
        let settings: CameraSettingsFile = serde_json::from_str(json).unwrap();
        let camera = settings.intrinsics().unwrap().unwrap();
        assert_eq!(camera.res_width(), 640.0);
        assert_eq!(camera.res_height(), 480.0);
        assert_eq!(camera.fy(), 640.0);
        assert_eq!(camera.cx(), 320.0);
    }

    #[test]
    fn test_camera_settings_partial_image_size() {
        let json = r#"{ "camera_settings": [{
            "intrinsic_settings": { "fx": 700 },
            "captured_image_size": { "width": 960 }
        }] }"#;
        let settings: CameraSettingsFile = serde_json::from_str(json).unwrap();
        let camera = settings.intrinsics().unwrap().unwrap();
        assert_eq!(camera.res_width(), 640.0);
        assert_eq!(camera.res_height(), 480.0);
        assert_eq!(camera.fx(), 700.0);
        assert_eq!(camera.cy(), 240.0);
    }

    #[test]
    fn test_camera_settings_without_intrinsics() {
        let json = r#"{ "camera_settings": [{ "captured_image_size": { "width": 1, "height": 1 } }] }"#;
        let settings: CameraSettingsFile = serde_json::from_str(json).unwrap();
        assert!(settings.intrinsics().unwrap().is_none());

        let empty: CameraSettingsFile = serde_json::from_str("{}").unwrap();
        assert!(empty.intrinsics().unwrap().is_none());
    }

    #[test]
    fn test_supplied_projection_is_sign_flipped() {
        let json = r#"{ "camera_settings": [{
            "intrinsic_settings": { "fx": 500 },
            "cameraProjectionMatrix": [[1, 2, 3, 4], [5, 6, 7, 8], [9, 10, 11, 12], [13, 14, 15, 16]]
        }] }"#;
        let settings: CameraSettingsFile = serde_json::from_str(json).unwrap();
        let m = settings.intrinsics().unwrap().unwrap().projection_matrix();
        assert_eq!(m[(0, 1)], 2.0);
        assert_eq!(m[(2, 0)], -9.0);
        assert_eq!(m[(2, 1)], -10.0);
        assert_eq!(m[(2, 2)], 11.0);
        assert_eq!(m[(2, 3)], -12.0);
        assert_eq!(m[(3, 2)], -15.0);
        assert_eq!(m[(3, 3)], 16.0);
    }

    #[test]
    fn test_bad_projection_matrix() {
        let json = r#"{ "camera_settings": [{
            "intrinsic_settings": {},
            "cameraProjectionMatrix": [[1, 0], [0, 1]]
        }] }"#;
        let settings: CameraSettingsFile = serde_json::from_str(json).unwrap();
        assert!(matches!(settings.intrinsics(), Err(Error::InvalidMatrix(_))));
    }
}
