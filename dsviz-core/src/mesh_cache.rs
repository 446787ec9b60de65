/// Path-keyed cache for mesh assets
use std::collections::HashMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Decodes a mesh file; the format is up to the renderer
pub trait MeshLoader {
    type Mesh;
    type Error: Display;

    fn load(&mut self, path: &Path) -> std::result::Result<Self::Mesh, Self::Error>;
}

/// Loads each distinct path at most once.
///
/// Failed loads are remembered as `None` and not retried until [`MeshCache::clear`].
pub struct MeshCache<L: MeshLoader> {
    loader: L,
    meshes: HashMap<PathBuf, Option<Arc<L::Mesh>>>,
}

impl<L: MeshLoader> MeshCache<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            meshes: HashMap::new(),
        }
    }

    pub fn get(&mut self, path: &Path) -> Option<Arc<L::Mesh>> {
        let loader = &mut self.loader;
        self.meshes
            .entry(path.to_path_buf())
            .or_insert_with(|| {
                log::debug!("Loading mesh {}", path.display());
                match loader.load(path) {
                    Ok(mesh) => Some(Arc::new(mesh)),
                    Err(err) => {
                        log::warn!("{}: Failed to load mesh: {err}", path.display());
                        None
                    }
                }
            })
            .clone()
    }

    /// Whether `path` has been attempted, successfully or not
    pub fn contains(&self, path: &Path) -> bool {
        self.meshes.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn clear(&mut self) {
        self.meshes.clear();
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingLoader {
        calls: Vec<PathBuf>,
    }

    impl MeshLoader for CountingLoader {
        type Mesh = String;
        type Error = String;

        fn load(&mut self, path: &Path) -> std::result::Result<String, String> {
            self.calls.push(path.to_path_buf());
            if path.extension().is_some_and(|ext| ext == "obj") {
                Ok(path.display().to_string())
            } else {
                Err("unsupported format".to_string())
            }
        }
    }

    #[test]
    fn test_loads_once_per_path() {
        let mut cache = MeshCache::new(CountingLoader::default());
        let path = Path::new("/meshes/003_cracker_box/google_16k/textured.obj");

        let first = cache.get(path).unwrap();
        let second = cache.get(path).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.loader().calls.len(), 1);
        assert!(cache.contains(path));
    }

    #[test]
    fn test_failures_are_cached() {
        let mut cache = MeshCache::new(CountingLoader::default());
        let path = Path::new("/meshes/broken.ply");

        assert!(cache.get(path).is_none());
        assert!(cache.get(path).is_none());
        assert_eq!(cache.loader().calls.len(), 1);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get(path).is_none());
        assert_eq!(cache.loader().calls.len(), 2);
    }

    #[test]
    fn test_distinct_paths() {
        let mut cache = MeshCache::new(CountingLoader::default());
        cache.get(Path::new("a.obj"));
        cache.get(Path::new("b.obj"));
        cache.get(Path::new("a.obj"));
        assert_eq!(cache.loader().calls.len(), 2);
    }
}
