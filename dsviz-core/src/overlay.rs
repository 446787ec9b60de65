/// Validated 2D overlay primitives for drawing on top of frame images
use nalgebra::{Matrix3, Matrix4, Point2};

use crate::cuboid::{project_pinhole, Cuboid2d, CuboidVertex, CUBOID_EDGES};
use crate::geometry::{Line3, Rgba};

/// Projected coordinates at or beyond this magnitude are treated as overflow.
///
/// Empirical guard, not derived from any viewport size.
pub const MAX_PROJECTED_COORDINATE: f32 = 10_000.0;

pub const WHITE: Rgba = [255, 255, 255, 255];

/// Per-corner colors in [`CuboidVertex`] order: front top blue, front bottom
/// magenta, rear top green, rear bottom yellow
pub const VERTEX_COLORS: [Rgba; CuboidVertex::CORNER_COUNT] = [
    [0, 0, 255, 255],
    [0, 0, 255, 255],
    [255, 0, 255, 255],
    [255, 0, 255, 255],
    [0, 255, 0, 255],
    [0, 255, 0, 255],
    [255, 255, 0, 255],
    [255, 255, 0, 255],
];

pub fn vertex_color(vertex: CuboidVertex) -> Rgba {
    VERTEX_COLORS.get(vertex.index()).copied().unwrap_or(WHITE)
}

pub fn is_point_valid(point: Option<Point2<f32>>) -> bool {
    match point {
        None => false,
        Some(p) if p.x.is_nan() || p.y.is_nan() => false,
        Some(p) => p.x.abs() < MAX_PROJECTED_COORDINATE && p.y.abs() < MAX_PROJECTED_COORDINATE,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line2 {
    pub start: Point2<f32>,
    pub end: Point2<f32>,
    pub color: Rgba,
}

/// How a point marker is outlined; the two front-top corners are singled out
/// so the cuboid's orientation can be read at a glance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointStyle {
    Plain,
    HeavyOutline,
    ThinOutline,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayPoint {
    pub vertex: CuboidVertex,
    pub position: Point2<f32>,
    pub color: Rgba,
    pub style: PointStyle,
}

/// Lines and points that survived validation, ready for a renderer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overlay2d {
    pub lines: Vec<Line2>,
    pub points: Vec<OverlayPoint>,
}

impl Overlay2d {
    /// Overlay for a projected cuboid.
    ///
    /// An edge is kept only when both ends are valid and a point only when it
    /// is valid itself. `color` overrides the per-vertex colors.
    pub fn from_cuboid(cuboid: &Cuboid2d, color: Option<Rgba>) -> Self {
        let lines = CUBOID_EDGES
            .iter()
            .filter_map(|[a, b]| {
                let (start, end) = (cuboid.vertex(*a), cuboid.vertex(*b));
                if !(is_point_valid(start) && is_point_valid(end)) {
                    return None;
                }
                Some(Line2 {
                    start: start?,
                    end: end?,
                    color: color.unwrap_or_else(|| vertex_color(*a)),
                })
            })
            .collect();

        let points = CuboidVertex::ALL
            .iter()
            .filter_map(|vertex| {
                let position = cuboid.vertex(*vertex).filter(|p| is_point_valid(Some(*p)))?;
                let style = match vertex {
                    CuboidVertex::FrontTopRight => PointStyle::HeavyOutline,
                    CuboidVertex::FrontTopLeft => PointStyle::ThinOutline,
                    _ => PointStyle::Plain,
                };
                Some(OverlayPoint {
                    vertex: *vertex,
                    position,
                    color: color.unwrap_or_else(|| vertex_color(*vertex)),
                    style,
                })
            })
            .collect();

        Self { lines, points }
    }

    /// Project local-space lines (e.g. a pivot axis) and keep the valid ones
    pub fn from_lines(
        lines: &[Line3],
        world_transform: &Matrix4<f32>,
        intrinsic: &Matrix3<f32>,
        default_color: Rgba,
    ) -> Self {
        let lines = lines
            .iter()
            .filter_map(|line| {
                let start = project_pinhole(&world_transform.transform_point(&line.start), intrinsic);
                let end = project_pinhole(&world_transform.transform_point(&line.end), intrinsic);
                if !(is_point_valid(start) && is_point_valid(end)) {
                    return None;
                }
                Some(Line2 {
                    start: start?,
                    end: end?,
                    color: line.color.unwrap_or(default_color),
                })
            })
            .collect();

        Self {
            lines,
            points: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.points.is_empty()
    }

    pub fn extend(&mut self, other: Overlay2d) {
        self.lines.extend(other.lines);
        self.points.extend(other.points);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PivotAxis;
    use nalgebra::Vector3;

    fn square_cuboid() -> [Option<Point2<f32>>; 9] {
        let mut vertices = [None; 9];
        for (i, slot) in vertices.iter_mut().enumerate() {
            *slot = Some(Point2::new(10.0 * i as f32, 5.0));
        }
        vertices
    }

    #[test]
    fn test_point_validity() {
        assert!(is_point_valid(Some(Point2::new(0.0, 0.0))));
        assert!(is_point_valid(Some(Point2::new(-9_999.0, 9_999.9))));
        assert!(!is_point_valid(None));
        assert!(!is_point_valid(Some(Point2::new(f32::NAN, 1.0))));
        assert!(!is_point_valid(Some(Point2::new(1.0, f32::NAN))));
        assert!(!is_point_valid(Some(Point2::new(10_000.0, 1.0))));
        assert!(!is_point_valid(Some(Point2::new(1.0, -12_000.0))));
    }

    #[test]
    fn test_all_valid_cuboid() {
        let overlay = Overlay2d::from_cuboid(&Cuboid2d::new(square_cuboid()), None);
        assert_eq!(overlay.lines.len(), 12);
        assert_eq!(overlay.points.len(), 9);
        assert_eq!(overlay.points[0].style, PointStyle::HeavyOutline);
        assert_eq!(overlay.points[1].style, PointStyle::ThinOutline);
        assert_eq!(overlay.points[8].color, WHITE);
    }

    #[test]
    fn test_invalid_vertex_drops_its_edges() {
        let mut vertices = square_cuboid();
        vertices[CuboidVertex::FrontTopRight.index()] = Some(Point2::new(f32::NAN, 0.0));
        vertices[CuboidVertex::Center.index()] = Some(Point2::new(50_000.0, 0.0));
        let overlay = Overlay2d::from_cuboid(&Cuboid2d::new(vertices), Some([1, 2, 3, 255]));

        // FrontTopRight touches three edges
        assert_eq!(overlay.lines.len(), 9);
        assert_eq!(overlay.points.len(), 7);
        assert!(overlay
            .points
            .iter()
            .all(|p| p.vertex != CuboidVertex::FrontTopRight && p.vertex != CuboidVertex::Center));
        assert!(overlay.lines.iter().all(|l| l.color == [1, 2, 3, 255]));
    }

    #[test]
    fn test_missing_slots_keep_positions() {
        let points: Vec<Point2<f32>> = (0..4).map(|i| Point2::new(i as f32, 1.0)).collect();
        let overlay = Overlay2d::from_cuboid(&Cuboid2d::from_points(&points), None);
        // Only the front face survives
        assert_eq!(overlay.lines.len(), 4);
        assert_eq!(overlay.points.len(), 4);
        assert_eq!(overlay.points[3].vertex, CuboidVertex::FrontBottomRight);
        assert_eq!(overlay.points[3].position, Point2::new(3.0, 1.0));
    }

    #[test]
    fn test_pivot_axis_overlay() {
        let intrinsic = Matrix3::new(100.0, 0.0, 50.0, 0.0, 100.0, 50.0, 0.0, 0.0, 1.0);
        let world = Matrix4::new_translation(&Vector3::new(0.0, 0.0, 10.0));
        let pivot = PivotAxis::new(Vector3::new(1.0, 1.0, 1.0));
        let overlay = Overlay2d::from_lines(&pivot.lines(), &world, &intrinsic, WHITE);
        assert_eq!(overlay.lines.len(), 3);
        assert!((overlay.lines[0].end.x - 60.0).abs() < 1e-4);
        assert_eq!(overlay.lines[0].color, crate::geometry::RED);
    }
}
