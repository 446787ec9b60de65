/// dsviz Core Library - Pose annotation reprojection and validation
///
/// This library provides the geometry behind the dataset viewers: transforms
/// and scene graphs, camera intrinsics, cuboid projection, validated 2D
/// overlays, and parsing of dataset settings and per-frame annotations.

pub mod annotation;
pub mod coords;
pub mod cuboid;
pub mod dataset;
pub mod error;
pub mod fuzzy;
pub mod geometry;
pub mod mesh_cache;
pub mod overlay;
pub mod projection;
pub mod scene;
pub mod settings;
pub mod transform;

// Re-export commonly used types
pub use annotation::{AnnotatedObjectInfo, AnnotatedSceneInfo, ObjectOverlay, OverlaySelection};
pub use coords::{CoordinateSystem, Rotator};
pub use cuboid::{Cuboid2d, Cuboid3d, CuboidVertex};
pub use dataset::{Dataset, DatasetOptions, FrameAspect};
pub use error::{Error, Result};
pub use fuzzy::{FuzzyMatcher, SubsequenceMatcher};
pub use geometry::{Drawable, Geometry, MeshRef, PivotAxis, Rgba, SceneObject};
pub use mesh_cache::{MeshCache, MeshLoader};
pub use overlay::{Line2, Overlay2d, OverlayPoint, PointStyle};
pub use projection::CameraIntrinsics;
pub use scene::{NodeId, SceneGraph};
pub use settings::{DatasetSettings, ExportedObjectSettings};
pub use transform::Transform;
