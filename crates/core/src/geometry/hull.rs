use std::{cmp::Ordering, collections::VecDeque};

use super::{HullFrame, Point};

/// Orientation of `rel` against the directed edge `from -> to`.
///
/// `Greater` means `rel` lies on the side that keeps the hull convex,
/// `Equal` means the three points are collinear.
fn orientation(from: Point, to: Point, rel: Point) -> Ordering {
    let pa = (to.x - from.x) * (from.y - rel.y);
    let pb = (rel.x - from.x) * (from.y - to.y);
    (pa - pb).partial_cmp(&0.0).unwrap_or(Ordering::Equal)
}

/// Builds the hull boundary of `points`.
///
/// Sets of at most two points are returned unchanged. Otherwise duplicates
/// are collapsed, the remaining points are sorted by polar angle around the
/// top-most (then left-most) point, and a Graham scan keeps the convex turns.
/// Points on a common ray from the reference sort nearest first, so only the
/// farthest of them can survive the scan.
/// Each accepted vertex is inserted at the front of the boundary, which fixes
/// the winding that line-loop consumers rely on.
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let mut unique: Vec<Point> = Vec::with_capacity(points.len());
    let mut reference = points[0];
    for &point in points {
        if !unique.contains(&point) {
            unique.push(point);
        }
        if point.y > reference.y || (point.y == reference.y && point.x < reference.x) {
            reference = point;
        }
    }
    if unique.len() < 2 {
        return unique;
    }

    unique.sort_by(|a, b| match (*a == reference, *b == reference) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => orientation(reference, *a, *b).reverse().then_with(|| {
            let da = (*a - reference).length_squared();
            let db = (*b - reference).length_squared();
            da.partial_cmp(&db).unwrap_or(Ordering::Equal)
        }),
    });
    graham_scan(&unique)
}

fn graham_scan(sorted: &[Point]) -> Vec<Point> {
    let mut hull: VecDeque<Point> = VecDeque::with_capacity(sorted.len());
    hull.push_back(sorted[1]);
    hull.push_back(sorted[0]);

    let mut ix = 2;
    while ix < sorted.len() {
        let candidate = sorted[ix];
        if hull.len() > 1 {
            let newest = hull[0];
            let previous = hull[1];
            if previous == newest || orientation(previous, newest, candidate) != Ordering::Greater {
                hull.pop_front();
                continue;
            }
        }
        hull.push_front(candidate);
        ix += 1;
    }
    hull.into()
}

/// Centroid of the hull vertices and the factor that scales the farthest
/// vertex onto the unit circle around it.
pub fn hull_normalization(hull: &[Point]) -> HullFrame {
    if hull.is_empty() {
        return HullFrame::default();
    }
    let sum = hull.iter().fold(Point::ORIGIN, |acc, p| acc + *p);
    let centroid = sum * (1.0 / hull.len() as f64);
    let max_sq = hull
        .iter()
        .map(|p| (*p - centroid).length_squared())
        .fold(0.0_f64, f64::max);
    let scale = if max_sq > 0.0 { 1.0 / max_sq.sqrt() } else { 1.0 };
    HullFrame { centroid, scale }
}
