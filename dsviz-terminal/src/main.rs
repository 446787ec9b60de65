/// dsviz Terminal Viewer
///
/// Steps through a pose annotation dataset and draws the annotated and
/// reprojected cuboids of each frame in the terminal.
/// Controls:
///   - Left/Right (p/n): Previous/next frame, Up/Down: jump 100 frames
///   - F3/a: Annotated 2D cuboids, F4/r: Reprojected cuboids
///   - F5/f: Cuboid faces, F6/v: Pivot axes, F7/i: Info line
///   - Space: Toggle auto advance
///   - Q/ESC: Quit
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use dsviz_core::{
    dataset::DEFAULT_IMAGE_EXTENSION, CameraIntrinsics, Dataset, DatasetOptions, DatasetSettings,
    OverlaySelection,
};
use dsviz_terminal::{TerminalApp, ViewerOptions};

#[derive(Parser, Debug)]
#[command(name = "dsviz-terminal")]
#[command(about = "Visualize pose annotation datasets in the terminal")]
struct Args {
    /// Dataset directory with the frame images and, by default, their annotations
    #[arg(default_value = ".")]
    dataset_dir: PathBuf,

    /// Directory holding the `.json` annotations, if not the dataset directory
    #[arg(short = 'a', long)]
    annotation_dir: Option<PathBuf>,

    /// Root directory of the object meshes
    #[arg(short, long, default_value = "")]
    mesh_dir: PathBuf,

    /// Object settings file; defaults to `_object_settings.json` in the dataset
    #[arg(short, long)]
    object_settings: Option<PathBuf>,

    /// Camera settings file; defaults to `_camera_settings.json` in the dataset
    #[arg(short, long)]
    camera_settings: Option<PathBuf>,

    /// Horizontal field of view in degrees, used when no camera settings exist
    #[arg(long, default_value_t = 90.0)]
    hfov: f32,

    /// Image extensions that count as frames
    #[arg(short = 'n', long = "name-filter", default_values_t = [DEFAULT_IMAGE_EXTENSION.to_string()])]
    name_filters: Vec<String>,

    /// Frame to start from
    #[arg(long, default_value_t = 0)]
    frame: i64,

    /// Frames per second when auto advancing
    #[arg(long, default_value_t = 10.0)]
    fps: f32,

    /// Start advancing frames automatically
    #[arg(long)]
    auto_change: bool,

    /// Also shade the reprojected cuboid faces
    #[arg(long)]
    faces: bool,

    /// Also draw each object's pivot axis
    #[arg(long)]
    pivot: bool,
}

fn load_camera(args: &Args, dataset: &Dataset, settings: Option<&DatasetSettings>) -> Result<CameraIntrinsics> {
    let path = args
        .camera_settings
        .clone()
        .unwrap_or_else(|| dataset.camera_settings_path());
    if path.exists() {
        return CameraIntrinsics::from_file(&path)
            .with_context(|| format!("Failed to load camera settings from {}", path.display()));
    }

    let [width, height] = settings
        .map(|s| s.exporter_settings.captured_image_size)
        .unwrap_or_default();
    log::warn!(
        "No camera settings at {}, using a {}° field of view",
        path.display(),
        args.hfov
    );
    if width == 0 || height == 0 {
        return Ok(CameraIntrinsics::default());
    }
    Ok(CameraIntrinsics::from_fov(width as f32, height as f32, args.hfov))
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut dataset = Dataset::new(
        &args.dataset_dir,
        DatasetOptions {
            image_extensions: args
                .name_filters
                .iter()
                .map(|f| f.trim_start_matches("*.").to_string())
                .collect(),
            annotation_dir: args.annotation_dir.clone(),
        },
    );
    let frame_count = dataset.scan()?;
    log::info!("Number of frames in the dataset: {frame_count}");

    let object_settings = args
        .object_settings
        .clone()
        .unwrap_or_else(|| dataset.object_settings_path());
    let settings = DatasetSettings::from_file(&object_settings, args.mesh_dir.clone())
        .with_context(|| format!("Failed to load object settings from {}", object_settings.display()))?;
    let camera = load_camera(&args, &dataset, settings.as_ref())?;

    let options = ViewerOptions {
        overlays: OverlaySelection {
            pivot: args.pivot,
            ..Default::default()
        },
        show_faces: args.faces,
        auto_change: args.auto_change,
        auto_fps: args.fps,
        ..Default::default()
    };

    let mut app = TerminalApp::new(dataset, settings, camera, options);
    app.set_frame_index(args.frame);
    app.run()?;

    Ok(())
}
