use serde::{Deserialize, Serialize};

use crate::constants::SENSOR_OFFSETS_DEG;
use crate::error::TrackError;
use crate::geometry::{
    cast_ray, edges, has_crossed_polygon, point_in_polygon, segment_intersection,
    segments_cross, Point,
};
use crate::vehicle::Sensors;

/// Ordered gate segment; vehicles score by crossing these in sequence.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[Point; 2]", into = "[Point; 2]")]
pub struct Checkpoint {
    pub start: Point,
    pub end: Point,
}

impl Checkpoint {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    pub fn is_crossed_by(&self, from: Point, to: Point) -> bool {
        segment_intersection(from, to, self.start, self.end).is_some()
    }
}

impl From<[Point; 2]> for Checkpoint {
    fn from([start, end]: [Point; 2]) -> Self {
        Self { start, end }
    }
}

impl From<Checkpoint> for [Point; 2] {
    fn from(checkpoint: Checkpoint) -> Self {
        [checkpoint.start, checkpoint.end]
    }
}

/// A closed corridor between an outer and an inner polygon.
///
/// Either polygon may be empty (an open field on that side). The JSON form
/// uses the `track_outer` / `track_inner` / `check_line` keys and every key
/// defaults to empty.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    #[serde(rename = "track_outer", default)]
    pub outer: Vec<Point>,
    #[serde(rename = "track_inner", default)]
    pub inner: Vec<Point>,
    #[serde(rename = "check_line", default)]
    pub checkpoints: Vec<Checkpoint>,
}

const REFERENCE_OUTER: [(f64, f64); 23] = [
    (150.0, 750.0),
    (150.0, 600.0),
    (200.0, 550.0),
    (330.0, 500.0),
    (350.0, 400.0),
    (250.0, 400.0),
    (200.0, 350.0),
    (150.0, 300.0),
    (150.0, 250.0),
    (150.0, 100.0),
    (300.0, 50.0),
    (500.0, 100.0),
    (650.0, 200.0),
    (750.0, 350.0),
    (850.0, 400.0),
    (900.0, 450.0),
    (900.0, 550.0),
    (850.0, 620.0),
    (620.0, 700.0),
    (550.0, 680.0),
    (520.0, 680.0),
    (400.0, 780.0),
    (180.0, 780.0),
];

const REFERENCE_INNER: [(f64, f64); 23] = [
    (200.0, 700.0),
    (250.0, 600.0),
    (300.0, 550.0),
    (380.0, 530.0),
    (400.0, 500.0),
    (400.0, 400.0),
    (350.0, 350.0),
    (250.0, 350.0),
    (200.0, 300.0),
    (200.0, 150.0),
    (350.0, 100.0),
    (500.0, 150.0),
    (600.0, 250.0),
    (700.0, 400.0),
    (800.0, 450.0),
    (850.0, 500.0),
    (850.0, 550.0),
    (800.0, 600.0),
    (650.0, 650.0),
    (530.0, 630.0),
    (420.0, 700.0),
    (370.0, 750.0),
    (250.0, 750.0),
];

const REFERENCE_CHECKPOINTS: [[(f64, f64); 2]; 8] = [
    [(350.0, 750.0), (350.0, 780.0)],
    [(550.0, 630.0), (550.0, 680.0)],
    [(850.0, 550.0), (900.0, 550.0)],
    [(750.0, 350.0), (750.0, 425.0)],
    [(500.0, 100.0), (500.0, 150.0)],
    [(150.0, 150.0), (200.0, 150.0)],
    [(250.0, 350.0), (250.0, 400.0)],
    [(150.0, 600.0), (250.0, 600.0)],
];

/// Start pose on the reference circuit: bottom straight, facing right.
pub const REFERENCE_START: Point = Point::new(200.0, 750.0);
pub const REFERENCE_HEADING_DEG: f64 = 0.0;

impl Track {
    pub fn new(outer: Vec<Point>, inner: Vec<Point>, checkpoints: Vec<Checkpoint>) -> Self {
        Self {
            outer,
            inner,
            checkpoints,
        }
    }

    /// Built-in training circuit: 23 + 23 vertices and 8 ordered checkpoints
    /// running clockwise on screen from the bottom straight.
    pub fn reference() -> Self {
        Self {
            outer: REFERENCE_OUTER.iter().copied().map(Point::from).collect(),
            inner: REFERENCE_INNER.iter().copied().map(Point::from).collect(),
            checkpoints: REFERENCE_CHECKPOINTS
                .iter()
                .map(|[start, end]| Checkpoint::new((*start).into(), (*end).into()))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.outer.is_empty() && self.inner.is_empty() && self.checkpoints.is_empty()
    }

    pub fn validate(&self) -> Result<(), TrackError> {
        validate_polygon("outer", &self.outer)?;
        validate_polygon("inner", &self.inner)?;
        for (index, checkpoint) in self.checkpoints.iter().enumerate() {
            if checkpoint.start == checkpoint.end {
                return Err(TrackError::DegenerateCheckpoint { index });
            }
        }
        Ok(())
    }

    /// Front/left/right wall distances: the nearer of the outer and inner hit
    /// for each sensor direction.
    pub fn sense(&self, position: Point, heading_deg: f64, max_range: f64) -> Sensors {
        let [front, left, right] = SENSOR_OFFSETS_DEG.map(|offset| {
            let outer = cast_ray(position, heading_deg, offset, &self.outer, max_range);
            let inner = cast_ray(position, heading_deg, offset, &self.inner, max_range);
            outer.min(inner)
        });
        Sensors { front, left, right }
    }

    pub fn crossed_boundary(&self, from: Point, to: Point) -> bool {
        has_crossed_polygon(from, to, &self.outer) || has_crossed_polygon(from, to, &self.inner)
    }

    /// Inside the outer polygon (when present) and outside the inner one.
    pub fn is_on_track(&self, position: Point) -> bool {
        let inside_outer = self.outer.is_empty() || point_in_polygon(position, &self.outer);
        let inside_inner = !self.inner.is_empty() && point_in_polygon(position, &self.inner);
        inside_outer && !inside_inner
    }

    pub fn checkpoint(&self, index: usize) -> Option<&Checkpoint> {
        self.checkpoints.get(index)
    }
}

fn validate_polygon(boundary: &'static str, polygon: &[Point]) -> Result<(), TrackError> {
    if polygon.is_empty() {
        return Ok(());
    }
    if polygon.len() < 3 {
        return Err(TrackError::TooFewPoints {
            boundary,
            points: polygon.len(),
        });
    }

    let sides: Vec<(Point, Point)> = edges(polygon).collect();
    let n = sides.len();
    for edge in 0..n {
        for other in (edge + 2)..n {
            // first and last edges share the closing vertex
            if edge == 0 && other == n - 1 {
                continue;
            }
            let (a, b) = sides[edge];
            let (c, d) = sides[other];
            if segments_cross(a, b, c, d) {
                return Err(TrackError::SelfIntersecting {
                    boundary,
                    edge,
                    other,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: f64) -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(size, 0.0),
            Point::new(size, size),
            Point::new(0.0, size),
        ]
    }

    #[test]
    fn reference_track_is_valid_and_starts_on_the_corridor() {
        let track = Track::reference();
        assert_eq!(track.outer.len(), 23);
        assert_eq!(track.inner.len(), 23);
        assert_eq!(track.checkpoints.len(), 8);
        track.validate().expect("reference track is simple");
        assert!(track.is_on_track(REFERENCE_START));
    }

    #[test]
    fn bow_tie_polygon_is_rejected() {
        let track = Track::new(
            vec![
                Point::new(0.0, 0.0),
                Point::new(10.0, 10.0),
                Point::new(10.0, 0.0),
                Point::new(0.0, 10.0),
            ],
            Vec::new(),
            Vec::new(),
        );
        assert!(matches!(
            track.validate(),
            Err(TrackError::SelfIntersecting {
                boundary: "outer",
                ..
            })
        ));
    }

    #[test]
    fn short_polygons_and_point_checkpoints_are_rejected() {
        let track = Track::new(
            square(10.0),
            vec![Point::new(1.0, 1.0), Point::new(2.0, 2.0)],
            Vec::new(),
        );
        assert_eq!(
            track.validate(),
            Err(TrackError::TooFewPoints {
                boundary: "inner",
                points: 2
            })
        );

        let gate = Point::new(5.0, 5.0);
        let track = Track::new(square(10.0), Vec::new(), vec![Checkpoint::new(gate, gate)]);
        assert_eq!(
            track.validate(),
            Err(TrackError::DegenerateCheckpoint { index: 0 })
        );
    }

    #[test]
    fn corridor_excludes_the_infield() {
        let inner = vec![
            Point::new(4.0, 4.0),
            Point::new(6.0, 4.0),
            Point::new(6.0, 6.0),
            Point::new(4.0, 6.0),
        ];
        let track = Track::new(square(10.0), inner, Vec::new());
        assert!(track.is_on_track(Point::new(2.0, 2.0)));
        assert!(!track.is_on_track(Point::new(5.0, 5.0)));
        assert!(!track.is_on_track(Point::new(12.0, 5.0)));
    }

    #[test]
    fn sensors_take_the_nearer_polygon() {
        let inner = vec![
            Point::new(4.0, 4.0),
            Point::new(6.0, 4.0),
            Point::new(6.0, 6.0),
            Point::new(4.0, 6.0),
        ];
        let track = Track::new(square(10.0), inner, Vec::new());
        let sensors = track.sense(Point::new(1.0, 5.0), 0.0, 1000.0);
        assert!((sensors.front - 3.0).abs() < 1e-9);
        assert!((sensors.left - 5.0).abs() < 1e-9);
        assert!((sensors.right - 5.0).abs() < 1e-9);
    }

    #[test]
    fn track_json_uses_legacy_keys() {
        let json = r#"{
            "track_outer": [[0, 0], [10, 0], [10, 10]],
            "check_line": [[[1, 1], [2, 2]]]
        }"#;
        let track: Track = serde_json::from_str(json).expect("parse");
        assert_eq!(track.outer.len(), 3);
        assert!(track.inner.is_empty());
        assert_eq!(
            track.checkpoints,
            vec![Checkpoint::new(Point::new(1.0, 1.0), Point::new(2.0, 2.0))]
        );

        let value = serde_json::to_value(&track).expect("serialize");
        assert!(value.get("track_outer").is_some());
        assert!(value.get("track_inner").is_some());
        assert!(value.get("check_line").is_some());
    }
}
