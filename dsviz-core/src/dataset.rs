/// Dataset directory layout: frame discovery, naming and settings files
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till1, take_while1},
    character::complete::char,
    combinator::{all_consuming, opt, peek, value},
    sequence::{preceded, terminated},
    IResult,
};

use crate::annotation::AnnotatedSceneInfo;
use crate::error::{Error, Result};
use crate::projection::CameraIntrinsics;
use crate::settings::DatasetSettings;

pub const ANNOTATION_EXTENSION: &str = "json";
pub const DEFAULT_IMAGE_EXTENSION: &str = "png";

/// Upper bound probed when counting numbered frames
pub const MAX_NUMBERED_FRAMES: usize = 1_000_000;

pub fn object_settings_path(dataset_dir: &Path) -> PathBuf {
    dataset_dir.join("_object_settings.json")
}

pub fn camera_settings_path(dataset_dir: &Path) -> PathBuf {
    dataset_dir.join("_camera_settings.json")
}

pub fn dataset_settings_path(dataset_dir: &Path) -> PathBuf {
    dataset_dir.join("_settings.json")
}

/// Zero-padded frame name, e.g. `000042`
pub fn frame_name(index: usize) -> String {
    format!("{index:06}")
}

/// Image variants exported next to each frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameAspect {
    Main,
    Depth,
    /// Pixel level segmentation
    Pls,
    /// Pixel level segmentation without occlusion
    PlsNo,
}

impl FrameAspect {
    pub const ALL: [FrameAspect; 4] = [Self::Main, Self::Depth, Self::Pls, Self::PlsNo];

    /// Suffix inserted between the frame name and the image extension
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Main => "",
            Self::Depth => ".depth",
            Self::Pls => ".pls",
            Self::PlsNo => ".pls_no",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Main => "Main",
            Self::Depth => "Depth",
            Self::Pls => "Pixel Level Segmentation",
            Self::PlsNo => "Pixel Level Segmentation No Occlusion",
        }
    }
}

/// Parts of a file name shaped like `NNNNNN[.aspect].ext`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFileName<'a> {
    pub name: &'a str,
    pub aspect: FrameAspect,
    pub extension: &'a str,
}

fn aspect(input: &str) -> IResult<&str, FrameAspect> {
    alt((
        value(FrameAspect::PlsNo, tag("pls_no")),
        value(FrameAspect::Pls, tag("pls")),
        value(FrameAspect::Depth, tag("depth")),
    ))(input)
}

fn frame_file_name(input: &str) -> IResult<&str, FrameFileName<'_>> {
    let (input, name) = take_till1(|c: char| c == '.')(input)?;
    let (input, aspect) = opt(terminated(preceded(char('.'), aspect), peek(char('.'))))(input)?;
    let (input, extension) = preceded(char('.'), take_while1(|c: char| c != '.'))(input)?;
    Ok((
        input,
        FrameFileName {
            name,
            aspect: aspect.unwrap_or(FrameAspect::Main),
            extension,
        },
    ))
}

/// Split a frame file name into name, aspect and extension.
///
/// Returns `None` for names with extra dots that are not an aspect.
pub fn parse_frame_file_name(file_name: &str) -> Option<FrameFileName<'_>> {
    all_consuming(frame_file_name)(file_name)
        .ok()
        .map(|(_, parsed)| parsed)
}

/// Number of frames `000000.png`, `000001.png`, ... in `dir`.
///
/// Binary search on existence, so it assumes the numbering has no gaps.
pub fn count_numbered_frames(dir: &Path) -> usize {
    let exists = |index: usize| {
        dir.join(format!("{}.{DEFAULT_IMAGE_EXTENSION}", frame_name(index)))
            .is_file()
    };

    let (mut low, mut high) = (0, MAX_NUMBERED_FRAMES);
    let mut count = 0;
    while low < high {
        let mid = low + (high - low) / 2;
        if exists(mid) {
            count = mid + 1;
            low = mid + 1;
        } else {
            high = mid;
        }
    }
    count
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetOptions {
    /// Image extensions that make a file a frame candidate, without the dot
    pub image_extensions: Vec<String>,
    /// Where the `.json` annotations live; defaults to the dataset directory
    pub annotation_dir: Option<PathBuf>,
}

impl Default for DatasetOptions {
    fn default() -> Self {
        Self {
            image_extensions: vec![DEFAULT_IMAGE_EXTENSION.to_string()],
            annotation_dir: None,
        }
    }
}

/// Image and annotation file of one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePaths {
    pub image: PathBuf,
    pub annotation: PathBuf,
}

/// A dataset directory and the frames found in it by [`Dataset::scan`]
#[derive(Debug, Clone)]
pub struct Dataset {
    dataset_dir: PathBuf,
    annotation_dir: PathBuf,
    image_extensions: Vec<String>,
    frame_names: Vec<String>,
    /// Extension each frame's image was found with
    frame_extensions: BTreeMap<String, String>,
}

impl Dataset {
    pub fn new(dataset_dir: impl Into<PathBuf>, options: DatasetOptions) -> Self {
        let dataset_dir = dataset_dir.into();
        let annotation_dir = options
            .annotation_dir
            .unwrap_or_else(|| dataset_dir.clone());
        Self {
            dataset_dir,
            annotation_dir,
            image_extensions: options.image_extensions,
            frame_names: Vec::new(),
            frame_extensions: BTreeMap::new(),
        }
    }

    pub fn dataset_dir(&self) -> &Path {
        &self.dataset_dir
    }

    pub fn annotation_dir(&self) -> &Path {
        &self.annotation_dir
    }

    pub fn frame_names(&self) -> &[String] {
        &self.frame_names
    }

    pub fn frame_count(&self) -> usize {
        self.frame_names.len()
    }

    pub fn camera_settings_path(&self) -> PathBuf {
        camera_settings_path(&self.dataset_dir)
    }

    pub fn object_settings_path(&self) -> PathBuf {
        object_settings_path(&self.dataset_dir)
    }

    /// Position of `extension` in the configured image extensions
    fn extension_rank(&self, extension: &str) -> Option<usize> {
        self.image_extensions
            .iter()
            .position(|e| e.eq_ignore_ascii_case(extension))
    }

    /// Collect the frames that have both an image and an annotation.
    ///
    /// A missing dataset directory yields zero frames. Aspect images such as
    /// `000001.depth.png` are not frames of their own.
    pub fn scan(&mut self) -> Result<usize> {
        self.frame_names.clear();
        self.frame_extensions.clear();
        if !self.dataset_dir.is_dir() {
            log::warn!("Dataset directory {} does not exist", self.dataset_dir.display());
            return Ok(0);
        }

        let entries = fs::read_dir(&self.dataset_dir).map_err(|e| Error::io(&self.dataset_dir, e))?;
        for entry in entries {
            let path = entry.map_err(|e| Error::io(&self.dataset_dir, e))?.path();
            let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
                continue;
            };
            let Some(rank) = self.extension_rank(extension) else {
                continue;
            };
            if !path.is_file() {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if parse_frame_file_name(file_name).is_some_and(|f| f.aspect != FrameAspect::Main) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !self.annotation_path(stem).is_file() {
                log::debug!("Skipping {file_name}: no annotation");
                continue;
            }
            // The same frame in several formats keeps the earliest listed extension
            let keep = self
                .frame_extensions
                .get(stem)
                .and_then(|found| self.extension_rank(found))
                .map_or(true, |found_rank| rank < found_rank);
            if keep {
                self.frame_extensions.insert(stem.to_string(), extension.to_string());
            }
        }

        self.frame_names = self.frame_extensions.keys().cloned().collect();
        log::info!(
            "Found {} frames in {}",
            self.frame_names.len(),
            self.dataset_dir.display()
        );
        Ok(self.frame_names.len())
    }

    pub fn frame_name_from_index(&self, index: usize) -> Option<&str> {
        self.frame_names.get(index).map(String::as_str)
    }

    pub fn image_path(&self, name: &str) -> PathBuf {
        self.aspect_image_path(name, FrameAspect::Main)
    }

    pub fn aspect_image_path(&self, name: &str, aspect: FrameAspect) -> PathBuf {
        let extension = self
            .frame_extensions
            .get(name)
            .or_else(|| self.image_extensions.first())
            .map(String::as_str)
            .unwrap_or(DEFAULT_IMAGE_EXTENSION);
        self.dataset_dir
            .join(format!("{name}{}.{extension}", aspect.suffix()))
    }

    pub fn annotation_path(&self, name: &str) -> PathBuf {
        self.annotation_dir.join(format!("{name}.{ANNOTATION_EXTENSION}"))
    }

    /// Paths of a named frame; `None` for an empty name
    pub fn frame_paths(&self, name: &str) -> Option<FramePaths> {
        if name.is_empty() {
            return None;
        }
        Some(FramePaths {
            image: self.image_path(name),
            annotation: self.annotation_path(name),
        })
    }

    pub fn frame_paths_from_index(&self, index: usize) -> Option<FramePaths> {
        self.frame_paths(self.frame_name_from_index(index)?)
    }

    pub fn load_settings(&self, mesh_dir: impl Into<PathBuf>) -> Result<Option<DatasetSettings>> {
        DatasetSettings::from_dataset(&self.dataset_dir, mesh_dir)
    }

    pub fn load_camera(&self) -> Result<CameraIntrinsics> {
        CameraIntrinsics::from_file(self.camera_settings_path())
    }

    /// Parse the annotation of the frame at `index`
    pub fn load_frame(&self, index: usize, settings: Option<&DatasetSettings>) -> Result<Option<AnnotatedSceneInfo>> {
        match self.frame_paths_from_index(index) {
            Some(paths) => AnnotatedSceneInfo::from_file(settings, paths.annotation).map(Some),
            None => Ok(None),
        }
    }
}
