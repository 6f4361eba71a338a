//! Planar primitives used for sensing and collision.
//!
//! All functions are pure. Degenerate inputs (parallel or collinear segments,
//! zero-length movement, polygons with fewer than two points) resolve to
//! "no intersection" rather than an error.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Point at `distance` along `heading_deg` in screen space (y grows down).
    pub fn project(self, heading_deg: f64, distance: f64) -> Point {
        let rad = heading_deg.to_radians();
        Point::new(
            self.x + rad.cos() * distance,
            self.y - rad.sin() * distance,
        )
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point> for [f64; 2] {
    fn from(point: Point) -> Self {
        [point.x, point.y]
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

fn ccw(p: Point, q: Point, r: Point) -> bool {
    (r.y - p.y) * (q.x - p.x) > (q.y - p.y) * (r.x - p.x)
}

/// Strict orientation test for segments `ab` and `cd`.
pub fn segments_cross(a: Point, b: Point, c: Point, d: Point) -> bool {
    ccw(a, c, d) != ccw(b, c, d) && ccw(a, b, c) != ccw(a, b, d)
}

/// Intersection point of segments `ab` and `cd`, or `None` when they do not
/// cross or are parallel.
pub fn segment_intersection(a: Point, b: Point, c: Point, d: Point) -> Option<Point> {
    if !segments_cross(a, b, c, d) {
        return None;
    }

    let (dx1, dy1) = (b.x - a.x, b.y - a.y);
    let (dx2, dy2) = (d.x - c.x, d.y - c.y);
    let denom = dx1 * dy2 - dy1 * dx2;
    if denom == 0.0 {
        return None;
    }

    let t = ((c.x - a.x) * dy2 - (c.y - a.y) * dx2) / denom;
    Some(Point::new(a.x + t * dx1, a.y + t * dy1))
}

/// Closed-loop edges of `polygon`, including the edge from the last vertex
/// back to the first.
pub fn edges(polygon: &[Point]) -> impl Iterator<Item = (Point, Point)> + '_ {
    let n = if polygon.len() < 2 { 0 } else { polygon.len() };
    (0..n).map(move |i| (polygon[i], polygon[(i + 1) % n]))
}

/// Distance from `origin` to the nearest edge of `polygon` along
/// `heading_deg + offset_deg`, or `f64::INFINITY` when nothing is hit within
/// `max_range`.
pub fn cast_ray(
    origin: Point,
    heading_deg: f64,
    offset_deg: f64,
    polygon: &[Point],
    max_range: f64,
) -> f64 {
    let end = origin.project(heading_deg + offset_deg, max_range);
    edges(polygon)
        .filter_map(|(p, q)| segment_intersection(origin, end, p, q))
        .map(|hit| origin.distance(hit))
        .filter(|distance| *distance > 0.0)
        .fold(f64::INFINITY, f64::min)
}

/// Even-odd containment test.
pub fn point_in_polygon(point: Point, polygon: &[Point]) -> bool {
    let mut inside = false;
    for (p, q) in edges(polygon) {
        if (p.y > point.y) != (q.y > point.y) {
            let x_at = p.x + (point.y - p.y) * (q.x - p.x) / (q.y - p.y);
            if point.x < x_at {
                inside = !inside;
            }
        }
    }
    inside
}

/// True when the movement `from -> to` crosses any edge of `polygon`.
pub fn has_crossed_polygon(from: Point, to: Point, polygon: &[Point]) -> bool {
    edges(polygon).any(|(p, q)| segment_intersection(from, to, p, q).is_some())
}

/// Longest vertex-to-vertex distance.
pub fn diameter(polygon: &[Point]) -> f64 {
    polygon
        .iter()
        .flat_map(|a| polygon.iter().map(move |b| a.distance(*b)))
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ]
    }

    #[test]
    fn crossing_segments_meet_at_the_solved_point() {
        let hit = segment_intersection(
            Point::new(0.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
            Point::new(10.0, 0.0),
        )
        .expect("diagonals cross");
        assert!((hit.x - 5.0).abs() < 1e-9);
        assert!((hit.y - 5.0).abs() < 1e-9);

        let hit = segment_intersection(
            Point::new(2.0, 5.0),
            Point::new(20.0, 5.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
        )
        .expect("horizontal crosses vertical");
        assert!((hit.x - 10.0).abs() < 1e-9);
        assert!((hit.y - 5.0).abs() < 1e-9);
    }

    #[test]
    fn parallel_and_collinear_segments_do_not_intersect() {
        let parallel = segment_intersection(
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(0.0, 1.0),
            Point::new(10.0, 1.0),
        );
        assert_eq!(parallel, None);

        let collinear = segment_intersection(
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(5.0, 0.0),
            Point::new(15.0, 0.0),
        );
        assert_eq!(collinear, None);
    }

    #[test]
    fn disjoint_segments_do_not_intersect() {
        let miss = segment_intersection(
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(5.0, -1.0),
            Point::new(5.0, 1.0),
        );
        assert_eq!(miss, None);
    }

    #[test]
    fn zero_length_movement_never_crosses() {
        let polygon = square();
        for point in [
            Point::new(5.0, 5.0),
            Point::new(0.0, 0.0),
            Point::new(10.0, 5.0),
            Point::new(-3.0, 12.0),
        ] {
            assert!(!has_crossed_polygon(point, point, &polygon), "{point:?}");
        }
    }

    #[test]
    fn movement_through_a_wall_is_detected() {
        let polygon = square();
        assert!(has_crossed_polygon(
            Point::new(9.0, 5.0),
            Point::new(11.0, 5.0),
            &polygon
        ));
        assert!(!has_crossed_polygon(
            Point::new(4.0, 5.0),
            Point::new(6.0, 5.0),
            &polygon
        ));
    }

    #[test]
    fn ray_from_inside_is_bounded_by_the_diameter() {
        let polygon = square();
        let limit = diameter(&polygon);
        for origin in [Point::new(5.0, 5.0), Point::new(1.0, 8.5), Point::new(9.9, 0.1)] {
            for heading in (0..360).step_by(15).map(|h| h as f64 + 7.0) {
                for offset in [0.0, 90.0, -90.0] {
                    let distance = cast_ray(origin, heading, offset, &polygon, 1000.0);
                    assert!(distance.is_finite(), "{origin:?} heading {heading}");
                    assert!(distance <= limit + 1e-9);
                }
            }
        }
    }

    #[test]
    fn ray_uses_screen_space_convention() {
        let polygon = square();
        let origin = Point::new(5.0, 2.0);
        let front = cast_ray(origin, 0.0, 0.0, &polygon, 1000.0);
        let left = cast_ray(origin, 0.0, 90.0, &polygon, 1000.0);
        let right = cast_ray(origin, 0.0, -90.0, &polygon, 1000.0);
        assert!((front - 5.0).abs() < 1e-9);
        assert!((left - 2.0).abs() < 1e-9, "left looks up the screen");
        assert!((right - 8.0).abs() < 1e-9);
    }

    #[test]
    fn ray_from_far_outside_pointing_away_is_infinite() {
        let polygon = square();
        let origin = Point::new(500.0, 500.0);
        assert_eq!(cast_ray(origin, 0.0, 0.0, &polygon, 1000.0), f64::INFINITY);
        assert_eq!(cast_ray(origin, 0.0, -90.0, &polygon, 1000.0), f64::INFINITY);
    }

    #[test]
    fn ray_against_empty_polygon_is_infinite() {
        assert_eq!(
            cast_ray(Point::new(0.0, 0.0), 0.0, 0.0, &[], 1000.0),
            f64::INFINITY
        );
    }

    #[test]
    fn even_odd_containment() {
        let polygon = square();
        assert!(point_in_polygon(Point::new(5.0, 5.0), &polygon));
        assert!(!point_in_polygon(Point::new(15.0, 5.0), &polygon));
        assert!(!point_in_polygon(Point::new(5.0, -0.5), &polygon));
        assert!(!point_in_polygon(Point::new(5.0, 5.0), &[]));
    }

    #[test]
    fn point_serializes_as_pair() {
        let json = serde_json::to_string(&Point::new(1.5, -2.0)).expect("serialize");
        assert_eq!(json, "[1.5,-2.0]");
        let back: Point = serde_json::from_str("[3, 4]").expect("deserialize");
        assert_eq!(back, Point::new(3.0, 4.0));
    }
}
