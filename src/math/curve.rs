use super::{Point2d, Vector2d};
use crate::util::Interval;

/// A parametric curve in 2D space.
pub trait ParametricCurve2d {
    /// Samples the parametric curve.
    fn sample(&self, t: f64) -> Point2d;

    /// Returns the minimum and maximum t-values that define the bounds of the curve.
    fn bounds(&self) -> Interval<f64>;

    /// Samples the derivative of the parametric curve.
    ///
    /// The default implementation approximates the derivative by sampling
    /// two very nearby points along the curve.
    fn sample_dt(&self, t: f64) -> Vector2d {
        let delta = self.bounds().length() * 0.0001;
        let p1 = self.sample(t);
        let p2 = self.sample(t + delta);
        (p2 - p1) / delta
    }
}

impl<T: ParametricCurve2d + ?Sized> ParametricCurve2d for &T {
    fn sample(&self, t: f64) -> Point2d {
        (**self).sample(t)
    }

    fn bounds(&self) -> Interval<f64> {
        (**self).bounds()
    }

    fn sample_dt(&self, t: f64) -> Vector2d {
        (**self).sample_dt(t)
    }
}

/// Samples a closed curve at `count` parameter values evenly spaced over its bounds.
/// The end of the bounds is excluded, since it coincides with the start.
pub fn sample_closed_curve(curve: &impl ParametricCurve2d, count: usize) -> Vec<Point2d> {
    let bounds = curve.bounds();
    (0..count)
        .map(|i| bounds.lerp(i as f64 / count as f64))
        .map(|t| curve.sample(t))
        .collect()
}
