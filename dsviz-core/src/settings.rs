/// Per-dataset catalog of exported object classes
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use nalgebra::{Matrix4, Point3, Vector3};
use serde::Deserialize;

use crate::coords::CoordinateSystem;
use crate::cuboid::Cuboid3d;
use crate::dataset::{dataset_settings_path, object_settings_path};
use crate::error::{Error, Result};
use crate::fuzzy::{FuzzyMatcher, SubsequenceMatcher};
use crate::geometry::{MeshRef, PivotAxis, Rgba};
use crate::transform::matrix_from_rows;

/// Suffix the exporter appends to class names that the mesh folders do not have
const MESH_CLASS_SUFFIX: &str = "_16k";

/// `<mesh_dir>/<class>/google_16k/textured.obj`, with the `_16k` class suffix dropped
pub fn mesh_file_path(mesh_dir: &Path, class: &str) -> PathBuf {
    let name = class.strip_suffix(MESH_CLASS_SUFFIX).unwrap_or(class);
    mesh_dir.join(name).join("google_16k").join("textured.obj")
}

/// Display color derived from the segmentation class id (3-3-2 bit split)
pub fn class_color(class_id: u32) -> Rgba {
    let r = (class_id >> 5) as f32 / 7.0 * 255.0;
    let g = ((class_id >> 2) & 7) as f32 / 7.0 * 255.0;
    let b = (class_id & 3) as f32 / 3.0 * 255.0;
    [r as u8, g as u8, b as u8, 255]
}

/// Everything known about one object class
#[derive(Debug, Clone)]
pub struct ExportedObjectSettings {
    pub name: String,
    pub mesh_file_path: PathBuf,
    /// Aligns the mesh with its annotated pose
    pub initial_matrix: Matrix4<f32>,
    pub class_id: u32,
    pub class_color: Rgba,
    pub cuboid_dimension: Vector3<f32>,
    pub cuboid_center_local: Point3<f32>,
    pub coord_system: Option<CoordinateSystem>,
    pub cuboid3d: Cuboid3d,
    pub pivot_axis: PivotAxis,
}

impl ExportedObjectSettings {
    pub fn new(
        name: impl Into<String>,
        mesh_file_path: impl Into<PathBuf>,
        initial_matrix: Matrix4<f32>,
        cuboid_dimension: Vector3<f32>,
        cuboid_center_local: Point3<f32>,
        coord_system: Option<CoordinateSystem>,
        class_id: u32,
    ) -> Self {
        Self {
            name: name.into(),
            mesh_file_path: mesh_file_path.into(),
            initial_matrix,
            class_id,
            class_color: class_color(class_id),
            cuboid_dimension,
            cuboid_center_local,
            coord_system,
            cuboid3d: Cuboid3d::new(cuboid_dimension, cuboid_center_local, coord_system),
            pivot_axis: PivotAxis::new(cuboid_dimension),
        }
    }

    pub fn mesh(&self) -> MeshRef {
        MeshRef::new(&self.mesh_file_path, self.initial_matrix)
    }
}

/// Settings written by the capture tool, `capturedImageSize` in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ExporterSettings {
    #[serde(rename = "capturedImageSize", default = "default_captured_image_size")]
    pub captured_image_size: [u32; 2],
}

fn default_captured_image_size() -> [u32; 2] {
    [1280, 720]
}

impl ExporterSettings {
    /// Parse `_settings.json`; a missing file is not an error
    pub fn from_file(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| Error::json(path, e))
    }
}

impl Default for ExporterSettings {
    fn default() -> Self {
        Self {
            captured_image_size: default_captured_image_size(),
        }
    }
}

/// Contents of `_object_settings.json`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObjectSettingsFile {
    #[serde(default)]
    pub exported_objects: Vec<ExportedObjectEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportedObjectEntry {
    pub class: String,
    pub fixed_model_transform: Option<Vec<Vec<f32>>>,
    pub cuboid_dimensions: Option<[f32; 3]>,
    pub cuboid_center_local: Option<[f32; 3]>,
    pub segmentation_class_id: Option<u32>,
}

/// Class catalog for one dataset.
///
/// Read-only once loaded; entries are handed out as shared references.
#[derive(Debug, Clone)]
pub struct DatasetSettings {
    pub mesh_dir: PathBuf,
    pub exporter_settings: ExporterSettings,
    objects: BTreeMap<String, Arc<ExportedObjectSettings>>,
    matcher: Arc<dyn FuzzyMatcher>,
}

impl DatasetSettings {
    pub fn new(mesh_dir: impl Into<PathBuf>) -> Self {
        Self {
            mesh_dir: mesh_dir.into(),
            exporter_settings: ExporterSettings::default(),
            objects: BTreeMap::new(),
            matcher: Arc::new(SubsequenceMatcher::new()),
        }
    }

    /// Replace the policy used when a class name has no exact entry
    pub fn with_matcher(mut self, matcher: Arc<dyn FuzzyMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn insert(&mut self, settings: ExportedObjectSettings) {
        self.objects.insert(settings.name.clone(), Arc::new(settings));
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(String::as_str)
    }

    pub fn from_file_data(data: &ObjectSettingsFile, mesh_dir: impl Into<PathBuf>) -> Result<Self> {
        let mut settings = Self::new(mesh_dir);
        for entry in &data.exported_objects {
            let initial_matrix = match &entry.fixed_model_transform {
                // Stored with the translation in the last row
                Some(rows) => matrix_from_rows(rows)?.transpose(),
                None => {
                    log::warn!("'{}' has no fixed_model_transform, using identity", entry.class);
                    Matrix4::identity()
                }
            };
            let object = ExportedObjectSettings::new(
                entry.class.clone(),
                mesh_file_path(&settings.mesh_dir, &entry.class),
                initial_matrix,
                entry.cuboid_dimensions.map(Vector3::from).unwrap_or_else(Vector3::zeros),
                entry.cuboid_center_local.map(Point3::from).unwrap_or_else(Point3::origin),
                None,
                entry.segmentation_class_id.unwrap_or(0),
            );
            log::debug!("Loaded object settings for '{}'", object.name);
            settings.insert(object);
        }
        Ok(settings)
    }

    /// Parse an object settings file; a missing file is not an error
    pub fn from_file(path: impl AsRef<Path>, mesh_dir: impl Into<PathBuf>) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("No object settings at {}", path.display());
            return Ok(None);
        }
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let data: ObjectSettingsFile =
            serde_json::from_str(&text).map_err(|e| Error::json(path, e))?;
        Self::from_file_data(&data, mesh_dir).map(Some)
    }

    /// Object settings of a dataset, with its exporter settings when present
    pub fn from_dataset(dataset_dir: impl AsRef<Path>, mesh_dir: impl Into<PathBuf>) -> Result<Option<Self>> {
        let dataset_dir = dataset_dir.as_ref();
        let Some(mut settings) = Self::from_file(object_settings_path(dataset_dir), mesh_dir)? else {
            return Ok(None);
        };
        if let Some(exporter) = ExporterSettings::from_file(dataset_settings_path(dataset_dir))? {
            settings.exporter_settings = exporter;
        }
        Ok(Some(settings))
    }

    /// Exact class lookup, falling back to the best fuzzy match
    pub fn get_object_settings(&self, class: &str) -> Option<Arc<ExportedObjectSettings>> {
        if let Some(settings) = self.objects.get(class) {
            return Some(Arc::clone(settings));
        }

        let names: Vec<&str> = self.class_names().collect();
        let best = self.matcher.rank(class, &names).into_iter().next()?;
        log::debug!("Resolved class '{class}' to '{best}'");
        self.objects.get(best).cloned()
    }
}
