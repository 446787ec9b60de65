/// Terminal viewer for pose annotation datasets
use anyhow::Result;
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent},
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self},
};
use dsviz_core::{
    AnnotatedSceneInfo, CameraIntrinsics, Dataset, DatasetSettings, Drawable, OverlaySelection,
};
use std::io::{stdout, Write};
use std::time::{Duration, Instant};

pub mod renderer;

pub use renderer::AsciiRenderer;

/// Frames skipped by the Up/Down keys
pub const FRAME_JUMP: i64 = 100;

/// What the viewer shows and how it advances
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewerOptions {
    pub overlays: OverlaySelection,
    /// Shade the reprojected cuboid faces under the overlays
    pub show_faces: bool,
    pub show_info: bool,
    /// Start advancing frames on its own
    pub auto_change: bool,
    /// Frames per second when auto advancing
    pub auto_fps: f32,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            overlays: OverlaySelection::default(),
            show_faces: false,
            show_info: true,
            auto_change: false,
            auto_fps: 10.0,
        }
    }
}

/// Wrap a possibly negative frame index into `0..count`
pub fn wrap_frame_index(index: i64, count: usize) -> usize {
    if count == 0 {
        return 0;
    }
    index.rem_euclid(count as i64) as usize
}

/// Main application struct for the terminal viewer
pub struct TerminalApp {
    dataset: Dataset,
    settings: Option<DatasetSettings>,
    camera: CameraIntrinsics,
    options: ViewerOptions,
    renderer: AsciiRenderer,
    frame_index: usize,
    scene: Option<AnnotatedSceneInfo>,
    status: String,
    running: bool,
    auto_advance: bool,
    last_advance: Instant,
}

impl TerminalApp {
    pub fn new(
        dataset: Dataset,
        settings: Option<DatasetSettings>,
        camera: CameraIntrinsics,
        options: ViewerOptions,
    ) -> Self {
        let renderer = AsciiRenderer::new(80, 24, camera.res_width(), camera.res_height());
        let mut app = Self {
            dataset,
            settings,
            camera,
            options,
            renderer,
            frame_index: 0,
            scene: None,
            status: String::new(),
            running: true,
            auto_advance: options.auto_change && options.auto_fps > 0.0,
            last_advance: Instant::now(),
        };
        app.load_current_frame();
        app
    }

    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    pub fn options(&self) -> &ViewerOptions {
        &self.options
    }

    pub fn scene(&self) -> Option<&AnnotatedSceneInfo> {
        self.scene.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn set_frame_index(&mut self, index: i64) {
        let index = wrap_frame_index(index, self.dataset.frame_count());
        if index != self.frame_index || self.scene.is_none() {
            self.frame_index = index;
            self.load_current_frame();
        }
    }

    pub fn step_frames(&mut self, delta: i64) {
        self.set_frame_index(self.frame_index as i64 + delta);
    }

    fn load_current_frame(&mut self) {
        match self.dataset.load_frame(self.frame_index, self.settings.as_ref()) {
            Ok(Some(scene)) => {
                log::info!("Visualizing frame {}", scene.info_str());
                self.status = format!(
                    "Frame {} ({}/{}) | {} objects",
                    scene.info_str(),
                    self.frame_index + 1,
                    self.dataset.frame_count(),
                    scene.objects.len()
                );
                self.scene = Some(scene);
            }
            Ok(None) => {
                self.status = "No frames".to_string();
                self.scene = None;
            }
            Err(err) => {
                log::error!("Failed to load frame {}: {err}", self.frame_index);
                self.status = format!("Frame {}: {err}", self.frame_index);
                self.scene = None;
            }
        }
    }

    pub fn run(&mut self) -> Result<()> {
        terminal::enable_raw_mode()?;
        execute!(stdout(), terminal::EnterAlternateScreen, cursor::Hide)?;

        let result = self.main_loop();

        // Cleanup
        terminal::disable_raw_mode()?;
        execute!(stdout(), terminal::LeaveAlternateScreen, cursor::Show)?;

        result
    }

    fn main_loop(&mut self) -> Result<()> {
        let target_frame_time = Duration::from_millis(1000 / 30);

        while self.running {
            let frame_start = Instant::now();

            if event::poll(Duration::from_millis(0))? {
                if let Event::Key(key) = event::read()? {
                    self.handle_key(key);
                }
            }

            self.update();
            self.render()?;

            let elapsed = frame_start.elapsed();
            if elapsed < target_frame_time {
                std::thread::sleep(target_frame_time - elapsed);
            }
        }

        Ok(())
    }

    pub fn handle_key(&mut self, KeyEvent { code, .. }: KeyEvent) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.running = false,
            KeyCode::Right | KeyCode::Char('n') => self.step_frames(1),
            KeyCode::Left | KeyCode::Char('p') => self.step_frames(-1),
            KeyCode::Up => self.step_frames(FRAME_JUMP),
            KeyCode::Down => self.step_frames(-FRAME_JUMP),
            KeyCode::F(3) | KeyCode::Char('a') => {
                self.options.overlays.annotated = !self.options.overlays.annotated
            }
            KeyCode::F(4) | KeyCode::Char('r') => {
                self.options.overlays.reprojected = !self.options.overlays.reprojected
            }
            KeyCode::F(5) | KeyCode::Char('f') => self.options.show_faces = !self.options.show_faces,
            KeyCode::F(6) | KeyCode::Char('v') => {
                self.options.overlays.pivot = !self.options.overlays.pivot
            }
            KeyCode::F(7) | KeyCode::Char('i') => self.options.show_info = !self.options.show_info,
            KeyCode::Char(' ') => {
                self.auto_advance = !self.auto_advance;
                self.last_advance = Instant::now();
            }
            _ => {}
        }
    }

    fn update(&mut self) {
        if !self.auto_advance || self.options.auto_fps <= 0.0 {
            return;
        }
        if self.last_advance.elapsed().as_secs_f32() >= 1.0 / self.options.auto_fps {
            self.last_advance = Instant::now();
            self.step_frames(1);
        }
    }

    /// Rasterize the current frame into the renderer's cell grid
    pub fn draw_scene(&mut self) {
        self.renderer.clear();
        let Some(scene) = &self.scene else {
            return;
        };

        if self.options.show_faces {
            match scene.build_scene_graph() {
                Ok(graph) => {
                    for drawable in graph.drawables() {
                        if drawable.emit_geometry().triangles.is_empty() {
                            continue;
                        }
                        self.renderer.render_drawable(&drawable, &self.camera);
                    }
                }
                Err(err) => log::error!("Failed to build scene graph: {err}"),
            }
        }

        for object in scene.overlays(&self.camera, self.options.overlays) {
            self.renderer.draw_overlay(&object.overlay);
        }
    }

    fn render(&mut self) -> Result<()> {
        let (width, height) = terminal::size()?;
        // Leave the top row for the status line
        let rows = height.saturating_sub(1) as usize;
        if self.renderer.width() != width as usize || self.renderer.height() != rows {
            self.renderer.resize(width as usize, rows);
        }

        self.draw_scene();

        let mut stdout = stdout();
        queue!(stdout, cursor::MoveTo(0, 1))?;
        self.renderer.draw(&mut stdout)?;

        if self.options.show_info {
            let selection = self.options.overlays;
            let flag = |on: bool| if on { "on" } else { "off" };
            queue!(
                stdout,
                cursor::MoveTo(0, 0),
                terminal::Clear(terminal::ClearType::CurrentLine),
                SetForegroundColor(Color::Yellow),
                Print(format!(
                    "{} | 2D[a]:{} 3D[r]:{} pivot[v]:{} faces[f]:{} | n/p=Frame Space=Auto Q=Quit",
                    self.status,
                    flag(selection.annotated),
                    flag(selection.reprojected),
                    flag(selection.pivot),
                    flag(self.options.show_faces),
                )),
                ResetColor
            )?;
        }

        stdout.flush()?;
        Ok(())
    }
}
