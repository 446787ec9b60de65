/// ASCII rasterizer for drawing annotation overlays in a terminal
use crossterm::{
    style::{Color, Print, ResetColor, SetForegroundColor},
    QueueableCommand,
};
use dsviz_core::{CameraIntrinsics, Drawable, Overlay2d, PointStyle, Rgba};
use nalgebra::{Point2, Point3, Vector3};
use std::io::Write;

/// Character luminosity ramp for face shading (darkest to lightest)
const LUMINOSITY_RAMP: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

const LINE_CHAR: char = '#';

/// Overlays sit in front of every shaded face
const OVERLAY_DEPTH: f32 = f32::NEG_INFINITY;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Cell {
    character: char,
    color: Option<Rgba>,
}

impl Cell {
    const EMPTY: Cell = Cell {
        character: ' ',
        color: None,
    };
}

/// Renders camera-space geometry and 2D overlays into a grid of terminal cells.
///
/// Pixel coordinates of the source image are scaled onto the grid, so the
/// whole image always fits whatever the terminal size.
pub struct AsciiRenderer {
    width: usize,
    height: usize,
    image_width: f32,
    image_height: f32,
    depth_buffer: Vec<f32>,
    cells: Vec<Cell>,
}

impl AsciiRenderer {
    pub fn new(width: usize, height: usize, image_width: f32, image_height: f32) -> Self {
        let size = width * height;
        Self {
            width,
            height,
            image_width,
            image_height,
            depth_buffer: vec![f32::INFINITY; size],
            cells: vec![Cell::EMPTY; size],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        *self = Self::new(width, height, self.image_width, self.image_height);
    }

    pub fn set_image_size(&mut self, image_width: f32, image_height: f32) {
        self.image_width = image_width;
        self.image_height = image_height;
    }

    pub fn clear(&mut self) {
        self.depth_buffer.fill(f32::INFINITY);
        self.cells.fill(Cell::EMPTY);
    }

    /// Character at a cell, for inspection
    pub fn char_at(&self, x: usize, y: usize) -> Option<char> {
        (x < self.width && y < self.height).then(|| self.cells[y * self.width + x].character)
    }

    /// Map image pixel coordinates to (fractional) cell coordinates
    fn to_cell(&self, pixel: Point2<f32>) -> (f32, f32) {
        (
            pixel.x * self.width as f32 / self.image_width.max(1.0),
            pixel.y * self.height as f32 / self.image_height.max(1.0),
        )
    }

    /// Write a cell that is on the grid and no farther than what it covers
    fn put(&mut self, x: i64, y: i64, depth: f32, cell: Cell) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let idx = y as usize * self.width + x as usize;
        if depth <= self.depth_buffer[idx] {
            self.depth_buffer[idx] = depth;
            self.cells[idx] = cell;
        }
    }

    /// Shade the triangles of a drawable, nearest surface wins
    pub fn render_drawable(&mut self, drawable: &impl Drawable, camera: &CameraIntrinsics) {
        let world = drawable.world_transform();
        for triangle in drawable.emit_geometry().triangles {
            let camera_space = triangle.map(|p| world.transform_point(&p));
            self.render_triangle(&camera_space, camera);
        }
    }

    fn render_triangle(&mut self, triangle: &[Point3<f32>; 3], camera: &CameraIntrinsics) {
        // Faces reaching behind the camera are skipped rather than clipped
        if triangle.iter().any(|p| p.z <= 0.0) {
            return;
        }

        let mut cell_vertices = [(Point2::origin(), 0.0); 3];
        for (slot, vertex) in cell_vertices.iter_mut().zip(triangle) {
            let Some(pixel) = camera.project_point(vertex) else {
                return;
            };
            let (x, y) = self.to_cell(pixel);
            *slot = (Point2::new(x, y), vertex.z);
        }

        let normal = (triangle[1] - triangle[0]).cross(&(triangle[2] - triangle[0]));
        let Some(normal) = normal.try_normalize(1e-12) else {
            return;
        };
        let brightness = normal.dot(&Vector3::new(0.0, 0.0, -1.0)).abs();

        // Keep faces in the dim half of the ramp so overlays stay readable
        let char_index = 1 + (brightness * 3.0) as usize;
        let character = LUMINOSITY_RAMP[char_index.min(LUMINOSITY_RAMP.len() - 1)];

        self.fill_triangle(cell_vertices, character);
    }

    /// Fill the cells whose centers fall inside a cell-space triangle,
    /// interpolating camera depth across it
    fn fill_triangle(&mut self, vertices: [(Point2<f32>, f32); 3], character: char) {
        let [(a, depth_a), (b, depth_b), (c, depth_c)] = vertices;
        let area = edge(&a, &b, &c);
        if area.abs() < 1e-6 {
            return;
        }

        let (min, max) = (a.inf(&b).inf(&c), a.sup(&b).sup(&c));
        let x_range = (min.x.floor() as i64).max(0)..=(max.x.ceil() as i64).min(self.width as i64 - 1);
        let y_range = (min.y.floor() as i64).max(0)..=(max.y.ceil() as i64).min(self.height as i64 - 1);
        let cell = Cell {
            character,
            color: None,
        };

        for y in y_range {
            for x in x_range.clone() {
                let center = Point2::new(x as f32 + 0.5, y as f32 + 0.5);
                let weight_a = edge(&b, &c, &center) / area;
                let weight_b = edge(&c, &a, &center) / area;
                let weight_c = 1.0 - weight_a - weight_b;
                if weight_a < 0.0 || weight_b < 0.0 || weight_c < 0.0 {
                    continue;
                }
                let depth = weight_a * depth_a + weight_b * depth_b + weight_c * depth_c;
                self.put(x, y, depth, cell);
            }
        }
    }

    /// Draw validated overlay lines and points on top of everything else
    pub fn draw_overlay(&mut self, overlay: &Overlay2d) {
        for line in &overlay.lines {
            let (x0, y0) = self.to_cell(line.start);
            let (x1, y1) = self.to_cell(line.end);
            self.draw_line(x0 as i64, y0 as i64, x1 as i64, y1 as i64, Some(line.color));
        }
        for point in &overlay.points {
            let (x, y) = self.to_cell(point.position);
            let character = match point.style {
                PointStyle::HeavyOutline => '@',
                PointStyle::ThinOutline => 'o',
                PointStyle::Plain => '+',
            };
            let cell = Cell {
                character,
                color: Some(point.color),
            };
            self.put(x as i64, y as i64, OVERLAY_DEPTH, cell);
        }
    }

    /// Bresenham line; cells outside the grid are dropped
    fn draw_line(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, color: Option<Rgba>) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        let (mut x, mut y) = (x0, y0);

        loop {
            self.put(
                x,
                y,
                OVERLAY_DEPTH,
                Cell {
                    character: LINE_CHAR,
                    color,
                },
            );
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    pub fn draw<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        let rows = self.cells.chunks(self.width.max(1));
        let last = rows.len().saturating_sub(1);
        for (index, row) in rows.enumerate() {
            for cell in row {
                let color = match cell.color {
                    Some([r, g, b, _]) => Color::Rgb { r, g, b },
                    None => Color::DarkGrey,
                };
                writer.queue(SetForegroundColor(color))?;
                writer.queue(Print(cell.character))?;
            }
            // A newline after the bottom row would scroll the screen
            if index < last {
                writer.queue(Print("\r\n"))?;
            }
        }
        writer.queue(ResetColor)?;
        Ok(())
    }
}

/// Twice the signed area of the triangle `a b p`
fn edge(a: &Point2<f32>, b: &Point2<f32>, p: &Point2<f32>) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}
