//! Planar geometry helpers shared by the aggregators and the matcher.
//!
//! All positions are pixel coordinates in the video frame, stored as
//! `nalgebra::Point2<f64>`.

use nalgebra::Point2;
use ndarray::Array2;

/// Pixel position in the video frame.
pub type Point = Point2<f64>;

/// Euclidean distance between two points.
#[inline]
pub fn distance(a: &Point, b: &Point) -> f64 {
    nalgebra::distance(a, b)
}

/// Arithmetic mean of a set of points, or `None` when the set is empty.
pub fn mean_point<'a, I>(points: I) -> Option<Point>
where
    I: IntoIterator<Item = &'a Point>,
{
    weighted_mean(points.into_iter().map(|p| (p, 1.0)))
}

/// Weighted mean of a set of points.
///
/// Returns `None` when the set is empty or the weights sum to zero.
pub fn weighted_mean<'a, I>(weighted: I) -> Option<Point>
where
    I: IntoIterator<Item = (&'a Point, f64)>,
{
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut total = 0.0;
    for (p, w) in weighted {
        sum_x += p.x * w;
        sum_y += p.y * w;
        total += w;
    }
    if total > 0.0 {
        Some(Point::new(sum_x / total, sum_y / total))
    } else {
        None
    }
}

/// Calculate the Euclidean distance matrix between two point sets.
///
/// Returns a matrix of shape (M, N) where M is the length of `rows`
/// and N is the length of `cols`.
pub fn distance_matrix(rows: &[Point], cols: &[Point]) -> Array2<f64> {
    let mut dists = Array2::zeros((rows.len(), cols.len()));
    for (i, a) in rows.iter().enumerate() {
        for (j, b) in cols.iter().enumerate() {
            dists[[i, j]] = distance(a, b);
        }
    }
    dists
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert_relative_eq!(distance(&a, &b), 5.0);
    }

    #[test]
    fn test_mean_point() {
        let points = [Point::new(0.0, 0.0), Point::new(2.0, 4.0)];
        let mean = mean_point(&points).unwrap();
        assert_relative_eq!(mean.x, 1.0);
        assert_relative_eq!(mean.y, 2.0);
        assert!(mean_point(&Vec::<Point>::new()).is_none());
    }

    #[test]
    fn test_weighted_mean_pulls_toward_heavy_point() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(100.0, 0.0);
        let mean = weighted_mean([(&a, 3.0), (&b, 1.0)]).unwrap();
        assert_relative_eq!(mean.x, 25.0);
        assert!(weighted_mean([(&a, 0.0)]).is_none());
    }

    #[test]
    fn test_distance_matrix_shape() {
        let rows = [Point::new(0.0, 0.0), Point::new(100.0, 0.0)];
        let cols = [Point::new(1.0, 1.0), Point::new(99.0, 1.0), Point::new(50.0, 0.0)];
        let dists = distance_matrix(&rows, &cols);
        assert_eq!(dists.dim(), (2, 3));
        assert_relative_eq!(dists[[1, 2]], 50.0);
    }
}
