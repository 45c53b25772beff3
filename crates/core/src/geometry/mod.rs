//! Planar geometry used by the scene: points, the six distance metrics, the
//! nearest-neighbour query and the convex hull that drives the adjusted dot
//! product.

mod hull;
mod metric;

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

pub use hull::{convex_hull, hull_normalization};
pub use metric::{closest_point, distance, Closest, HullFrame, Metric, TIE_EPSILON};

/// Maximum number of points a [`PointSet`] accepts.
pub const MAX_POINTS: usize = 36;

/// A position in world space. Serialised as a `[x, y]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn dot(self, other: Point) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn length_squared(self) -> f64 {
        self.dot(self)
    }

    /// Unit vector pointing in the same direction. The zero vector maps to
    /// itself.
    pub fn normalized(self) -> Point {
        let len = self.length();
        if len > 0.0 {
            Point::new(self.x / len, self.y / len)
        } else {
            Point::ORIGIN
        }
    }

    pub fn to_array(self) -> [f64; 2] {
        [self.x, self.y]
    }
}

impl From<[f64; 2]> for Point {
    fn from(value: [f64; 2]) -> Self {
        Point::new(value[0], value[1])
    }
}

impl From<Point> for [f64; 2] {
    fn from(value: Point) -> Self {
        value.to_array()
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;

    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

/// Ordered collection of user placed points, capped at [`MAX_POINTS`].
///
/// Order carries no meaning for rendering but stays stable so that points can
/// be removed by the index returned from [`closest_point`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Point>", into = "Vec<Point>")]
pub struct PointSet {
    points: Vec<Point>,
}

impl PointSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `point` unless the set is already full.
    pub fn try_push(&mut self, point: Point) -> bool {
        if self.is_full() {
            return false;
        }
        self.points.push(point);
        true
    }

    pub fn remove(&mut self, index: usize) -> Option<Point> {
        (index < self.points.len()).then(|| self.points.remove(index))
    }

    pub fn is_full(&self) -> bool {
        self.points.len() >= MAX_POINTS
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn as_slice(&self) -> &[Point] {
        &self.points
    }

    pub fn into_vec(self) -> Vec<Point> {
        self.points
    }
}

impl From<Vec<Point>> for PointSet {
    fn from(mut points: Vec<Point>) -> Self {
        points.truncate(MAX_POINTS);
        Self { points }
    }
}

impl From<PointSet> for Vec<Point> {
    fn from(value: PointSet) -> Self {
        value.points
    }
}
