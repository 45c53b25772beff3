use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::Point;
use crate::SearchspaceError;

/// Candidates closer than this to the running best replace it.
pub const TIE_EPSILON: f64 = 1e-5;

/// Scale that maps cosine and dot distances onto comparable ranges.
const DOT_RANGE: f64 = 0.4;

/// The distance functions the scene can shade with.
///
/// The discriminant order is the enum index uploaded to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    #[serde(rename = "L1")]
    L1,
    #[serde(rename = "L2")]
    L2,
    #[serde(rename = "Cos")]
    Cosine,
    #[serde(rename = "Dot")]
    Dot,
    #[serde(rename = "Unit L2")]
    UnitL2,
    #[serde(rename = "Adj. Dot")]
    AdjustedDot,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::L1,
        Metric::L2,
        Metric::Cosine,
        Metric::Dot,
        Metric::UnitL2,
        Metric::AdjustedDot,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Metric> {
        Self::ALL.get(index).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::L1 => "L1",
            Metric::L2 => "L2",
            Metric::Cosine => "Cos",
            Metric::Dot => "Dot",
            Metric::UnitL2 => "Unit L2",
            Metric::AdjustedDot => "Adj. Dot",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Metric {
    type Err = SearchspaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "l1" => Ok(Metric::L1),
            "l2" => Ok(Metric::L2),
            "cos" | "cosine" => Ok(Metric::Cosine),
            "dot" => Ok(Metric::Dot),
            "unitl2" => Ok(Metric::UnitL2),
            "adjdot" | "adjusteddot" => Ok(Metric::AdjustedDot),
            _ => Err(SearchspaceError::InvalidInput(format!(
                "unknown distance function `{s}`"
            ))),
        }
    }
}

/// Centroid and scale of the current hull, consumed by [`Metric::AdjustedDot`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HullFrame {
    pub centroid: Point,
    pub scale: f64,
}

impl Default for HullFrame {
    fn default() -> Self {
        Self {
            centroid: Point::ORIGIN,
            scale: 1.0,
        }
    }
}

/// Dissimilarity between `a` (the query) and `b` (a stored point).
pub fn distance(metric: Metric, a: Point, b: Point, frame: &HullFrame) -> f64 {
    match metric {
        Metric::L1 => {
            let d = a - b;
            d.x.abs() + d.y.abs()
        }
        Metric::L2 => (a - b).length(),
        Metric::Cosine => ((1.0 - cosine_similarity(a, b)) * 0.5) / DOT_RANGE,
        Metric::Dot => dot_distance(a, b),
        Metric::UnitL2 => (a - b.normalized()).length(),
        Metric::AdjustedDot => dot_distance(a, (b - frame.centroid) * frame.scale),
    }
}

/// Soft-sign of the negated dot product, bounded to `[0, 0.8]`.
fn dot_distance(a: Point, b: Point) -> f64 {
    let v = -a.dot(b);
    (1.0 + v / (1.0 + v.abs())) * DOT_RANGE
}

// A zero-length operand has no direction; it is treated as orthogonal.
fn cosine_similarity(a: Point, b: Point) -> f64 {
    let la = a.length();
    let lb = b.length();
    if la > 0.0 && lb > 0.0 {
        a.dot(b) / la / lb
    } else {
        0.0
    }
}

/// Result of [`closest_point`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Closest {
    pub distance: f64,
    /// `None` when the scanned set was empty.
    pub index: Option<usize>,
}

impl Closest {
    pub const NONE: Closest = Closest {
        distance: 0.0,
        index: None,
    };
}

/// Linear nearest-neighbour scan.
///
/// A candidate replaces the running best whenever it is less than
/// [`TIE_EPSILON`] worse, so among near-equal candidates the last one scanned
/// wins.
pub fn closest_point(metric: Metric, points: &[Point], query: Point, frame: &HullFrame) -> Closest {
    points
        .iter()
        .enumerate()
        .fold(Closest::NONE, |best, (index, point)| {
            let candidate = distance(metric, query, *point, frame);
            if best.index.is_none() || candidate - best.distance < TIE_EPSILON {
                Closest {
                    distance: candidate,
                    index: Some(index),
                }
            } else {
                best
            }
        })
}
