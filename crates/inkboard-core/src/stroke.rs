//! Strokes and the ordered log that holds them.

use kurbo::Point;
use serde::{Deserialize, Serialize};

/// A freehand stroke: the points of one pen-down to pen-up motion, in drawn order.
///
/// Serializes as a bare array of `{"x":..,"y":..}` objects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stroke {
    /// Points in the polyline.
    pub points: Vec<Point>,
}

impl Stroke {
    /// Create a stroke starting at `start`.
    pub fn starting_at(start: Point) -> Self {
        Self {
            points: vec![start],
        }
    }

    /// Create from existing points.
    pub fn from_points(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Add a point to the end of the polyline.
    pub fn add_point(&mut self, point: Point) {
        self.points.push(point);
    }

    /// Get the number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the stroke has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Check that every coordinate is a finite number.
    pub fn is_finite(&self) -> bool {
        self.points.iter().all(|p| p.is_finite())
    }
}

impl From<Vec<Point>> for Stroke {
    fn from(points: Vec<Point>) -> Self {
        Self::from_points(points)
    }
}

/// Append-only, ordered storage for strokes. Insertion order is z-order.
///
/// Indices handed out by [`StrokeLog::push`] stay valid until [`StrokeLog::clear`].
pub trait StrokeLog {
    /// Append a stroke, returning its index.
    fn push(&mut self, stroke: Stroke) -> usize;

    /// Get a stroke by index.
    fn get(&self, index: usize) -> Option<&Stroke>;

    /// Get a mutable stroke by index.
    fn get_mut(&mut self, index: usize) -> Option<&mut Stroke>;

    /// All strokes in insertion order.
    fn as_slice(&self) -> &[Stroke];

    /// Remove every stroke.
    fn clear(&mut self);

    /// Number of strokes held.
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Whether the log holds no strokes.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory stroke log. Grows for the lifetime of the session.
#[derive(Debug, Clone, Default)]
pub struct MemoryStrokeLog {
    strokes: Vec<Stroke>,
}

impl MemoryStrokeLog {
    /// Create a new empty log.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StrokeLog for MemoryStrokeLog {
    fn push(&mut self, stroke: Stroke) -> usize {
        self.strokes.push(stroke);
        self.strokes.len() - 1
    }

    fn get(&self, index: usize) -> Option<&Stroke> {
        self.strokes.get(index)
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut Stroke> {
        self.strokes.get_mut(index)
    }

    fn as_slice(&self) -> &[Stroke] {
        &self.strokes
    }

    fn clear(&mut self) {
        self.strokes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stroke_serializes_as_bare_array() {
        let stroke = Stroke::from_points(vec![Point::new(0.0, 0.0), Point::new(5.0, 5.0)]);
        let json = serde_json::to_value(&stroke).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{ "x": 0.0, "y": 0.0 }, { "x": 5.0, "y": 5.0 }])
        );
    }

    #[test]
    fn test_stroke_add_point_keeps_order() {
        let mut stroke = Stroke::starting_at(Point::new(1.0, 1.0));
        stroke.add_point(Point::new(2.0, 2.0));
        stroke.add_point(Point::new(0.0, 3.0));
        assert_eq!(stroke.len(), 3);
        assert_eq!(stroke.points[2], Point::new(0.0, 3.0));
    }

    #[test]
    fn test_stroke_finite() {
        assert!(Stroke::starting_at(Point::new(1.0, 2.0)).is_finite());
        assert!(!Stroke::starting_at(Point::new(f64::NAN, 2.0)).is_finite());
    }

    #[test]
    fn test_log_indices_are_insertion_order() {
        let mut log = MemoryStrokeLog::new();
        let a = log.push(Stroke::starting_at(Point::new(0.0, 0.0)));
        let b = log.push(Stroke::starting_at(Point::new(1.0, 1.0)));
        assert_eq!((a, b), (0, 1));
        assert_eq!(log.len(), 2);

        log.get_mut(a).unwrap().add_point(Point::new(9.0, 9.0));
        assert_eq!(log.get(a).unwrap().len(), 2);
        assert_eq!(log.get(b).unwrap().len(), 1);
    }

    #[test]
    fn test_log_clear() {
        let mut log = MemoryStrokeLog::new();
        log.push(Stroke::starting_at(Point::new(0.0, 0.0)));
        log.clear();
        assert!(log.is_empty());
        assert!(log.get(0).is_none());
    }
}
