use super::curve::ParametricCurve2d;
use super::{Point2d, Vector2d};
use crate::util::Interval;
use cgmath::prelude::*;

/// A closed, twice-differentiable cubic spline passing through a loop of waypoints.
///
/// The curve is parametrised over `[0, 1)` by normalised cumulative chord length,
/// with the chord from the last waypoint back to the first closing the loop.
#[derive(Clone, Debug)]
pub struct PeriodicSpline2d {
    /// The parameter value at each waypoint, plus a final knot at 1.0.
    knots: Vec<f64>,
    x: PeriodicCubic,
    y: PeriodicCubic,
}

/// One coordinate of a periodic cubic spline.
#[derive(Clone, Debug)]
struct PeriodicCubic {
    /// The value at each knot.
    values: Vec<f64>,
    /// The second derivative at each knot.
    moments: Vec<f64>,
}

impl PeriodicSpline2d {
    /// Fits a periodic spline through the given waypoints.
    ///
    /// Returns `None` if there are fewer than three waypoints,
    /// or if two consecutive waypoints coincide.
    pub fn through(waypoints: &[Point2d]) -> Option<Self> {
        let n = waypoints.len();
        if n < 3 {
            return None;
        }

        // Cumulative chord length, including the closing chord
        let mut knots = Vec::with_capacity(n + 1);
        knots.push(0.0);
        for i in 0..n {
            let chord = (waypoints[(i + 1) % n] - waypoints[i]).magnitude();
            if !(chord > 0.0) {
                return None;
            }
            knots.push(knots[i] + chord);
        }
        let total = knots[n];
        knots.iter_mut().for_each(|k| *k /= total);

        let xs = waypoints.iter().map(|p| p.x).collect::<Vec<_>>();
        let ys = waypoints.iter().map(|p| p.y).collect::<Vec<_>>();

        Some(Self {
            x: PeriodicCubic::fit(&knots, xs),
            y: PeriodicCubic::fit(&knots, ys),
            knots,
        })
    }

    /// Finds the knot interval containing `t`, after wrapping it into `[0, 1)`.
    fn locate(&self, t: f64) -> (usize, f64) {
        let t = t.rem_euclid(1.0);
        let n = self.knots.len() - 1;
        let idx = self.knots.partition_point(|k| *k <= t).saturating_sub(1);
        (usize::min(idx, n - 1), t)
    }
}

impl PeriodicCubic {
    /// Solves for the knot second derivatives of a periodic cubic spline.
    fn fit(knots: &[f64], values: Vec<f64>) -> Self {
        let n = values.len();
        let h = knots.windows(2).map(|w| w[1] - w[0]).collect::<Vec<_>>();

        let mut sub = vec![0.0; n];
        let mut diag = vec![0.0; n];
        let mut sup = vec![0.0; n];
        let mut rhs = vec![0.0; n];
        for i in 0..n {
            let prev = (i + n - 1) % n;
            let next = (i + 1) % n;
            sub[i] = h[prev];
            diag[i] = 2.0 * (h[prev] + h[i]);
            sup[i] = h[i];
            rhs[i] = 6.0 * ((values[next] - values[i]) / h[i] - (values[i] - values[prev]) / h[prev]);
        }

        let moments = solve_cyclic(&sub, &diag, &sup, &rhs);
        Self { values, moments }
    }

    /// Evaluates the value and first derivative within knot interval `i`.
    fn eval(&self, knots: &[f64], i: usize, t: f64) -> (f64, f64) {
        let n = self.values.len();
        let (t0, t1) = (knots[i], knots[i + 1]);
        let h = t1 - t0;
        let (y0, y1) = (self.values[i], self.values[(i + 1) % n]);
        let (m0, m1) = (self.moments[i], self.moments[(i + 1) % n]);
        let (a, b) = (t1 - t, t - t0);

        let c0 = y0 / h - m0 * h / 6.0;
        let c1 = y1 / h - m1 * h / 6.0;
        let y = m0 * a.powi(3) / (6.0 * h) + m1 * b.powi(3) / (6.0 * h) + c0 * a + c1 * b;
        let dy = -m0 * a.powi(2) / (2.0 * h) + m1 * b.powi(2) / (2.0 * h) - c0 + c1;
        (y, dy)
    }
}

impl ParametricCurve2d for PeriodicSpline2d {
    fn sample(&self, t: f64) -> Point2d {
        let (i, t) = self.locate(t);
        let (x, _) = self.x.eval(&self.knots, i, t);
        let (y, _) = self.y.eval(&self.knots, i, t);
        Point2d::new(x, y)
    }

    fn bounds(&self) -> Interval<f64> {
        Interval::new(0.0, 1.0)
    }

    fn sample_dt(&self, t: f64) -> Vector2d {
        let (i, t) = self.locate(t);
        let (_, dx) = self.x.eval(&self.knots, i, t);
        let (_, dy) = self.y.eval(&self.knots, i, t);
        Vector2d::new(dx, dy)
    }
}

/// Solves a tridiagonal system with the Thomas algorithm.
/// `sub[0]` and `sup[n - 1]` are ignored.
fn solve_tridiagonal(sub: &[f64], diag: &[f64], sup: &[f64], rhs: &[f64]) -> Vec<f64> {
    let n = diag.len();
    let mut c = vec![0.0; n];
    let mut d = vec![0.0; n];
    c[0] = sup[0] / diag[0];
    d[0] = rhs[0] / diag[0];
    for i in 1..n {
        let m = diag[i] - sub[i] * c[i - 1];
        c[i] = sup[i] / m;
        d[i] = (rhs[i] - sub[i] * d[i - 1]) / m;
    }
    let mut x = d;
    for i in (0..n - 1).rev() {
        x[i] -= c[i] * x[i + 1];
    }
    x
}

/// Solves a cyclic tridiagonal system using the Sherman-Morrison formula.
/// `sub[0]` is the top-right corner and `sup[n - 1]` the bottom-left corner.
fn solve_cyclic(sub: &[f64], diag: &[f64], sup: &[f64], rhs: &[f64]) -> Vec<f64> {
    let n = diag.len();
    let (beta, alpha) = (sub[0], sup[n - 1]);
    let gamma = -diag[0];

    let mut diag = diag.to_vec();
    diag[0] -= gamma;
    diag[n - 1] -= alpha * beta / gamma;

    let mut x = solve_tridiagonal(sub, &diag, sup, rhs);

    let mut u = vec![0.0; n];
    u[0] = gamma;
    u[n - 1] = alpha;
    let z = solve_tridiagonal(sub, &diag, sup, &u);

    let fact = (x[0] + beta * x[n - 1] / gamma) / (1.0 + z[0] + beta * z[n - 1] / gamma);
    for (x, z) in x.iter_mut().zip(z) {
        *x -= fact * z;
    }
    x
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::f64::consts::TAU;

    fn circle(count: usize, radius: f64) -> Vec<Point2d> {
        (0..count)
            .map(|i| TAU * i as f64 / count as f64)
            .map(|a| Point2d::new(radius * a.cos(), radius * a.sin()))
            .collect()
    }

    #[test]
    fn interpolates_waypoints() {
        let points = [
            Point2d::new(60.0, 0.0),
            Point2d::new(24.0, 24.0),
            Point2d::new(-48.0, 34.0),
            Point2d::new(-30.0, -8.0),
            Point2d::new(42.0, -28.0),
        ];
        let spline = PeriodicSpline2d::through(&points).unwrap();
        for (knot, point) in spline.knots.iter().zip(points) {
            let p = spline.sample(*knot);
            assert_approx_eq!(p.x, point.x, 1e-9);
            assert_approx_eq!(p.y, point.y, 1e-9);
        }
    }

    #[test]
    fn closes_smoothly() {
        let spline = PeriodicSpline2d::through(&circle(7, 10.0)).unwrap();
        let start = spline.sample(0.0);
        let end = spline.sample(1.0 - 1e-9);
        assert_approx_eq!(start.x, end.x, 1e-6);
        assert_approx_eq!(start.y, end.y, 1e-6);

        let d_start = spline.sample_dt(0.0);
        let d_end = spline.sample_dt(1.0 - 1e-9);
        assert_approx_eq!(d_start.x, d_end.x, 1e-4);
        assert_approx_eq!(d_start.y, d_end.y, 1e-4);
    }

    #[test]
    fn approximates_circle() {
        let spline = PeriodicSpline2d::through(&circle(24, 50.0)).unwrap();
        for i in 0..200 {
            let p = spline.sample(i as f64 / 200.0);
            assert_approx_eq!(p.to_vec().magnitude(), 50.0, 0.1);
        }
    }

    #[test]
    fn rejects_degenerate_loops() {
        assert!(PeriodicSpline2d::through(&circle(2, 1.0)).is_none());
        let mut points = circle(5, 1.0);
        points[3] = points[2];
        assert!(PeriodicSpline2d::through(&points).is_none());
    }
}
