/// Per-frame object annotations
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use nalgebra::{Matrix4, Point2, Quaternion, Vector3};
use serde::Deserialize;

use crate::cuboid::{Cuboid2d, Cuboid3d};
use crate::error::{Error, Result};
use crate::geometry::{MeshRef, PivotAxis, Rgba, SceneObject};
use crate::overlay::{Overlay2d, WHITE};
use crate::projection::CameraIntrinsics;
use crate::scene::{NodeId, SceneGraph};
use crate::settings::{DatasetSettings, ExportedObjectSettings};
use crate::transform::Transform;

/// Class assumed for objects whose annotation has no `class` field
pub const DEFAULT_CLASS: &str = "002_master_chef_can_16k";

/// One entry of a frame's `objects` list
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObjectAnnotation {
    pub class: Option<String>,
    pub instance_id: Option<serde_json::Value>,
    pub location: Option<[f32; 3]>,
    pub quaternion_xyzw: Option<[f32; 4]>,
    pub cuboid_centroid: Option<[f32; 3]>,
    pub projected_cuboid: Option<Vec<[f32; 2]>>,
}

/// Contents of a frame's `NNNNNN.json`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrameAnnotationFile {
    pub objects: Option<Vec<ObjectAnnotation>>,
}

/// An annotated object in one frame.
///
/// Geometry (cuboid, mesh, pivot axis) is only present when the class
/// resolved to an entry in the dataset settings.
#[derive(Debug, Clone)]
pub struct AnnotatedObjectInfo {
    pub name: String,
    pub class: String,
    /// Cuboid as projected by the capture tool
    pub cuboid2d: Option<Cuboid2d>,
    settings: Option<Arc<ExportedObjectSettings>>,
    location: Vector3<f32>,
    quaternion: Quaternion<f32>,
    cuboid_center: Option<Vector3<f32>>,
    cuboid3d: Option<Cuboid3d>,
    mesh: Option<MeshRef>,
    pivot_axis: Option<PivotAxis>,
    transform: Transform,
    cuboid_transform: Transform,
    is_modified: bool,
}

impl AnnotatedObjectInfo {
    pub fn new(settings: Option<&DatasetSettings>, class: impl Into<String>, name: impl Into<String>) -> Self {
        let class = class.into();
        let object_settings = settings.and_then(|s| s.get_object_settings(&class));
        if object_settings.is_none() {
            log::debug!("No object settings for class '{class}'");
        }

        let mut transform = Transform::new();
        let mut mesh = None;
        if let Some(s) = &object_settings {
            transform.set_initial_matrix(s.initial_matrix);
            mesh = Some(s.mesh());
        }

        Self {
            name: name.into(),
            class,
            cuboid2d: None,
            cuboid3d: object_settings.as_ref().map(|s| s.cuboid3d.clone()),
            pivot_axis: object_settings.as_ref().map(|s| s.pivot_axis),
            mesh,
            settings: object_settings,
            location: Vector3::zeros(),
            quaternion: Quaternion::identity(),
            cuboid_center: None,
            transform,
            cuboid_transform: Transform::new(),
            is_modified: false,
        }
    }

    pub fn from_annotation(settings: Option<&DatasetSettings>, annotation: &ObjectAnnotation) -> Self {
        let class = match &annotation.class {
            Some(class) => class.clone(),
            None => {
                log::warn!("'class' missing from annotation, using '{DEFAULT_CLASS}'");
                DEFAULT_CLASS.to_string()
            }
        };
        let name = match &annotation.instance_id {
            Some(serde_json::Value::String(id)) => id.clone(),
            Some(id) => id.to_string(),
            None => String::new(),
        };

        let mut object = Self::new(settings, class, name);
        if let Some(location) = annotation.location {
            object.location = Vector3::from(location);
        }
        if let Some([x, y, z, w]) = annotation.quaternion_xyzw {
            object.quaternion = Quaternion::new(w, x, y, z);
        }
        object.cuboid_center = annotation.cuboid_centroid.map(Vector3::from);
        object.cuboid2d = annotation.projected_cuboid.as_ref().map(|points| {
            let points: Vec<Point2<f32>> = points.iter().map(|p| Point2::from(*p)).collect();
            Cuboid2d::from_points(&points)
        });

        object.update_transform();
        object
    }

    pub fn settings(&self) -> Option<&Arc<ExportedObjectSettings>> {
        self.settings.as_ref()
    }

    pub fn location(&self) -> Vector3<f32> {
        self.location
    }

    pub fn quaternion(&self) -> Quaternion<f32> {
        self.quaternion
    }

    pub fn cuboid_center(&self) -> Option<Vector3<f32>> {
        self.cuboid_center
    }

    pub fn dimension(&self) -> Option<Vector3<f32>> {
        self.settings.as_ref().map(|s| s.cuboid_dimension)
    }

    pub fn cuboid3d(&self) -> Option<&Cuboid3d> {
        self.cuboid3d.as_ref()
    }

    pub fn mesh(&self) -> Option<&MeshRef> {
        self.mesh.as_ref()
    }

    pub fn pivot_axis(&self) -> Option<&PivotAxis> {
        self.pivot_axis.as_ref()
    }

    pub fn color(&self) -> Option<Rgba> {
        self.settings.as_ref().map(|s| s.class_color)
    }

    /// Pending changes not yet pushed into the transforms
    pub fn is_modified(&self) -> bool {
        self.is_modified
    }

    pub fn set_transform(&mut self, location: Vector3<f32>, quaternion: Quaternion<f32>) {
        self.location = location;
        self.quaternion = quaternion;
        self.is_modified = true;
    }

    pub fn set_location(&mut self, location: Vector3<f32>) {
        self.location = location;
        self.is_modified = true;
    }

    pub fn set_quaternion(&mut self, quaternion: Quaternion<f32>) {
        self.quaternion = quaternion;
        self.is_modified = true;
    }

    /// Push location and rotation into the object and cuboid transforms.
    ///
    /// The cuboid is placed at the annotated centroid when there is one.
    pub fn update_transform(&mut self) {
        self.transform.set_location(self.location);
        self.transform.set_quaternion(self.quaternion);

        let cuboid_location = self.cuboid_center.unwrap_or(self.location);
        self.cuboid_transform.set_location(cuboid_location);
        self.cuboid_transform.set_quaternion(self.quaternion);

        self.is_modified = false;
    }

    /// Transform shared by the mesh and pivot axis
    pub fn world_matrix(&self) -> Matrix4<f32> {
        self.transform.to_matrix()
    }

    pub fn cuboid_world_matrix(&self) -> Matrix4<f32> {
        self.cuboid_transform.to_matrix()
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Reproject the settings cuboid through the camera
    pub fn projected_cuboid2d(&self, camera: &CameraIntrinsics) -> Option<Cuboid2d> {
        let cuboid = self.cuboid3d.as_ref()?;
        Some(cuboid.project(&self.cuboid_world_matrix(), &camera.intrinsic_matrix()))
    }

    /// Overlay of the cuboid the capture tool projected
    pub fn annotated_overlay(&self) -> Option<Overlay2d> {
        self.cuboid2d
            .as_ref()
            .map(|cuboid| Overlay2d::from_cuboid(cuboid, None))
    }

    /// Overlay of the cuboid reprojected from the 3D pose, drawn in the class color
    pub fn reprojected_overlay(&self, camera: &CameraIntrinsics) -> Option<Overlay2d> {
        self.projected_cuboid2d(camera)
            .map(|cuboid| Overlay2d::from_cuboid(&cuboid, self.color()))
    }

    pub fn pivot_overlay(&self, camera: &CameraIntrinsics) -> Option<Overlay2d> {
        let pivot = self.pivot_axis.as_ref()?;
        Some(Overlay2d::from_lines(
            &pivot.lines(),
            &self.world_matrix(),
            &camera.intrinsic_matrix(),
            WHITE,
        ))
    }

    /// Add a group node for this object with its mesh, cuboid and pivot axis as children
    pub fn add_to_scene(&self, graph: &mut SceneGraph, parent: Option<NodeId>) -> Result<NodeId> {
        let group = graph.add_node(None);
        graph.attach_to(group, parent)?;

        if let Some(mesh) = &self.mesh {
            let id = graph.add_child(group, Some(SceneObject::Mesh(mesh.clone())))?;
            graph.node_mut(id)?.transform = self.transform.clone();
        }
        if let Some(cuboid) = &self.cuboid3d {
            let id = graph.add_child(group, Some(SceneObject::Cuboid(cuboid.clone())))?;
            graph.node_mut(id)?.transform = self.cuboid_transform.clone();
        }
        if let Some(pivot) = &self.pivot_axis {
            let id = graph.add_child(group, Some(SceneObject::PivotAxis(*pivot)))?;
            graph.node_mut(id)?.transform = self.transform.clone();
        }
        Ok(group)
    }
}

/// Which overlays to produce for each object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlaySelection {
    pub annotated: bool,
    pub reprojected: bool,
    pub pivot: bool,
}

impl Default for OverlaySelection {
    fn default() -> Self {
        Self {
            annotated: true,
            reprojected: true,
            pivot: false,
        }
    }
}

/// Overlay for one object, tagged with its class for display
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectOverlay {
    pub class: String,
    pub overlay: Overlay2d,
}

/// All annotations of one frame
#[derive(Debug, Clone, Default)]
pub struct AnnotatedSceneInfo {
    pub source_file_path: Option<PathBuf>,
    pub objects: Vec<AnnotatedObjectInfo>,
}

impl AnnotatedSceneInfo {
    pub fn from_file_data(settings: Option<&DatasetSettings>, data: &FrameAnnotationFile) -> Self {
        let objects = match &data.objects {
            Some(objects) => objects
                .iter()
                .map(|annotation| AnnotatedObjectInfo::from_annotation(settings, annotation))
                .collect(),
            None => {
                log::warn!("'objects' missing from annotation, no annotations will be displayed");
                Vec::new()
            }
        };
        Self {
            source_file_path: None,
            objects,
        }
    }

    pub fn from_file(settings: Option<&DatasetSettings>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let data: FrameAnnotationFile =
            serde_json::from_str(&text).map_err(|e| Error::json(path, e))?;
        let mut scene = Self::from_file_data(settings, &data);
        scene.source_file_path = Some(path.to_path_buf());
        Ok(scene)
    }

    pub fn objects_of_class<'a>(&'a self, class: &'a str) -> impl Iterator<Item = &'a AnnotatedObjectInfo> {
        self.objects.iter().filter(move |object| object.class == class)
    }

    /// Frame name taken from the source file
    pub fn info_str(&self) -> String {
        self.source_file_path
            .as_deref()
            .and_then(Path::file_stem)
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn build_scene_graph(&self) -> Result<SceneGraph> {
        let mut graph = SceneGraph::new();
        for object in &self.objects {
            object.add_to_scene(&mut graph, None)?;
        }
        Ok(graph)
    }

    pub fn overlays(&self, camera: &CameraIntrinsics, selection: OverlaySelection) -> Vec<ObjectOverlay> {
        self.objects
            .iter()
            .filter_map(|object| {
                let mut overlay = Overlay2d::default();
                if selection.annotated {
                    overlay.extend(object.annotated_overlay().unwrap_or_default());
                }
                if selection.reprojected {
                    overlay.extend(object.reprojected_overlay(camera).unwrap_or_default());
                }
                if selection.pivot {
                    overlay.extend(object.pivot_overlay(camera).unwrap_or_default());
                }
                (!overlay.is_empty()).then(|| ObjectOverlay {
                    class: object.class.clone(),
                    overlay,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cuboid::CuboidVertex;
    use crate::geometry::Drawable;
    use nalgebra::{Point3, Vector3};

    fn settings() -> DatasetSettings {
        let mut settings = DatasetSettings::new("/meshes");
        settings.insert(ExportedObjectSettings::new(
            "003_cracker_box_16k",
            "/meshes/003_cracker_box/google_16k/textured.obj",
            Matrix4::identity(),
            Vector3::new(2.0, 2.0, 2.0),
            Point3::origin(),
            None,
            12,
        ));
        settings
    }

    const FRAME: &str = r#"{
        "camera_data": {},
        "objects": [
            {
                "class": "003_cracker_box_16k",
                "instance_id": 15578836,
                "location": [0, 0, 10],
                "quaternion_xyzw": [0, 0, 0, 1],
                "cuboid_centroid": [0, 0, 12],
                "projected_cuboid": [[1, 2], [3, 4], [5, 6], [7, 8], [9, 10], [11, 12], [13, 14], [15, 16], [17, 18]]
            },
            {
                "location": [1, 1, 1],
                "quaternion_xyzw": [0, 0, 0, 1]
            },
            {
                "class": "unknown_mug",
                "location": [0, 0, 5]
            }
        ]
    }"#;

    fn scene() -> AnnotatedSceneInfo {
        let data: FrameAnnotationFile = serde_json::from_str(FRAME).unwrap();
        AnnotatedSceneInfo::from_file_data(Some(&settings()), &data)
    }

    #[test]
    fn test_parse_frame() {
        let scene = scene();
        assert_eq!(scene.objects.len(), 3);

        let cracker = &scene.objects[0];
        assert_eq!(cracker.name, "15578836");
        assert_eq!(cracker.location(), Vector3::new(0.0, 0.0, 10.0));
        assert_eq!(cracker.cuboid_center(), Some(Vector3::new(0.0, 0.0, 12.0)));
        assert_eq!(cracker.quaternion(), Quaternion::identity());
        assert!(!cracker.is_modified());
        let annotated = cracker.cuboid2d.as_ref().unwrap();
        assert_eq!(annotated.vertex(CuboidVertex::Center), Some(Point2::new(17.0, 18.0)));
        assert_eq!(cracker.color(), Some(crate::settings::class_color(12)));
    }

    #[test]
    fn test_missing_class_falls_back() {
        let scene = scene();
        assert_eq!(scene.objects[1].class, DEFAULT_CLASS);
    }

    #[test]
    fn test_unresolved_class_has_no_geometry() {
        let scene = scene();
        let mug = &scene.objects[2];
        assert_eq!(mug.class, "unknown_mug");
        assert!(mug.settings().is_none());
        assert!(mug.cuboid3d().is_none());
        assert!(mug.mesh().is_none());
        assert!(mug.pivot_axis().is_none());
        assert!(mug.projected_cuboid2d(&CameraIntrinsics::default()).is_none());
        assert_eq!(scene.objects_of_class("unknown_mug").count(), 1);
    }

    #[test]
    fn test_cuboid_uses_centroid() {
        let scene = scene();
        let cracker = &scene.objects[0];
        let projected = cracker
            .projected_cuboid2d(&CameraIntrinsics::default())
            .unwrap();
        let center = projected.vertex(CuboidVertex::Center).unwrap();
        assert!((center - Point2::new(320.0, 240.0)).norm() < 1e-4);

        // Front face sits at z = 13: half extent 1 * 640 / 13
        let ftr = projected.vertex(CuboidVertex::FrontTopRight).unwrap();
        assert!((ftr.x - (320.0 + 640.0 / 13.0)).abs() < 1e-3);
        assert!((ftr.y - (240.0 - 640.0 / 13.0)).abs() < 1e-3);

        assert!((cracker.world_matrix()[(2, 3)] - 10.0).abs() < 1e-6);
        assert!((cracker.cuboid_world_matrix()[(2, 3)] - 12.0).abs() < 1e-6);
    }

    #[test]
    fn test_modification_is_deferred() {
        let mut scene = scene();
        let cracker = &mut scene.objects[0];
        cracker.set_location(Vector3::new(1.0, 0.0, 10.0));
        assert!(cracker.is_modified());
        assert!(cracker.world_matrix()[(0, 3)].abs() < 1e-6);

        cracker.update_transform();
        assert!(!cracker.is_modified());
        assert!((cracker.world_matrix()[(0, 3)] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_overlays() {
        let scene = scene();
        let camera = CameraIntrinsics::default();
        let overlays = scene.overlays(&camera, OverlaySelection::default());
        // The fallback class does not resolve either, so only the cracker box draws
        assert_eq!(overlays.len(), 1);
        assert_eq!(overlays[0].overlay.lines.len(), 24);

        let pivots = scene.overlays(
            &camera,
            OverlaySelection {
                annotated: false,
                reprojected: false,
                pivot: true,
            },
        );
        assert_eq!(pivots[0].overlay.lines.len(), 3);
    }

    #[test]
    fn test_scene_graph() {
        let scene = scene();
        let graph = scene.build_scene_graph().unwrap();
        // Three groups plus mesh, cuboid and pivot for the cracker box
        assert_eq!(graph.len(), 6);
        assert_eq!(graph.roots().count(), 3);

        let cuboid = graph
            .drawables()
            .find(|d| matches!(d.object(), SceneObject::Cuboid(_)))
            .unwrap();
        assert!((cuboid.world_transform()[(2, 3)] - 12.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_objects_list() {
        let data: FrameAnnotationFile = serde_json::from_str("{}").unwrap();
        let scene = AnnotatedSceneInfo::from_file_data(None, &data);
        assert!(scene.objects.is_empty());
        assert_eq!(scene.info_str(), "");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("000042.json");
        fs::write(&path, FRAME).unwrap();
        let scene = AnnotatedSceneInfo::from_file(None, &path).unwrap();
        assert_eq!(scene.info_str(), "000042");
        assert_eq!(scene.objects.len(), 3);

        let broken = dir.path().join("000043.json");
        fs::write(&broken, "{ nope").unwrap();
        assert!(matches!(
            AnnotatedSceneInfo::from_file(None, &broken),
            Err(Error::Json { .. })
        ));
    }
}
