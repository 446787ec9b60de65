/// Error type shared by the dataset, scene and camera modules
use std::path::PathBuf;

use crate::scene::NodeId;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Scene node {0:?} does not exist")]
    UnknownNode(NodeId),

    #[error("Attaching {child:?} to {parent:?} would create a cycle")]
    SceneCycle { child: NodeId, parent: NodeId },

    #[error("No camera settings found in {0}")]
    MissingCameraSettings(PathBuf),

    #[error("Expected a 4x4 matrix, got rows of lengths {0:?}")]
    InvalidMatrix(Vec<usize>),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}
