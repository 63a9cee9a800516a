//! Geometry of the closed racing circuit.

use crate::config::TrackConfig;
use crate::error::SimError;
use crate::math::{
    normalize_or_zero, rot90, sample_closed_curve, signed_area, PeriodicSpline2d, Point2d,
    Vector2d,
};
use crate::util::Interval;
use cgmath::prelude::*;

/// Waypoints of the default circuit, as fractions of the horizontal and vertical radii.
const CIRCUIT_WAYPOINTS: [(f64, f64); 18] = [
    (1.0, 0.0),
    (0.8, 0.3),
    (0.4, 0.6),
    (0.0, 0.8),
    (-0.4, 0.9),
    (-0.8, 0.85),
    (-1.0, 0.7),
    (-0.9, 0.4),
    (-0.7, 0.2),
    (-0.5, 0.0),
    (-0.3, -0.2),
    (-0.1, -0.4),
    (0.1, -0.5),
    (0.4, -0.6),
    (0.7, -0.7),
    (0.9, -0.6),
    (1.0, -0.3),
    (1.0, -0.1),
];

/// Guards tangent normalisation against zero-length segments.
const TANGENT_EPS: f64 = 1e-6;

/// The spacing, in samples, of the coarse nearest-sample search used by [Track::project].
const COARSE_STRIDE: usize = 16;

/// A closed circuit with a sampled centreline, an arc-length table and lane curves.
#[derive(Clone, Debug)]
pub struct Track {
    /// Total track width in m.
    width: f64,
    /// The number of lanes, numbered from the inside.
    num_lanes: usize,
    /// The sampled centreline.
    centerline: Vec<Point2d>,
    /// The outward unit normal at each centreline sample.
    normals: Vec<Vector2d>,
    /// The arc-length of each centreline sample, starting at zero.
    arc_lengths: Vec<f64>,
    /// The length of the closed centreline in m.
    length: f64,
    /// The centre curve of each lane, sampled alongside the centreline.
    lanes: Vec<Vec<Point2d>>,
}

/// The inner and outer edges of a [Track].
#[derive(Clone, Debug)]
pub struct TrackBoundaries {
    pub inner: Vec<Point2d>,
    pub outer: Vec<Point2d>,
}

impl Track {
    /// Builds the default circuit scaled by the configured radii.
    pub fn new(config: &TrackConfig) -> Result<Self, SimError> {
        let waypoints = CIRCUIT_WAYPOINTS
            .iter()
            .map(|(x, y)| Point2d::new(config.radius_x * x, config.radius_y * y))
            .collect::<Vec<_>>();
        Self::from_waypoints(&waypoints, config.width, config.num_lanes, config.num_points)
    }

    /// Builds a circuit by fitting a periodic spline through the ordered waypoints
    /// and sampling it at `num_points` points.
    pub fn from_waypoints(
        waypoints: &[Point2d],
        width: f64,
        num_lanes: usize,
        num_points: usize,
    ) -> Result<Self, SimError> {
        let spline = PeriodicSpline2d::through(waypoints).ok_or(SimError::DegenerateTrack)?;
        let centerline = sample_closed_curve(&spline, num_points);
        Self::from_centerline(centerline, width, num_lanes)
    }

    /// Builds a circuit from an already sampled closed centreline.
    pub fn from_centerline(
        centerline: Vec<Point2d>,
        width: f64,
        num_lanes: usize,
    ) -> Result<Self, SimError> {
        let n = centerline.len();
        if n < 3 || num_lanes == 0 {
            return Err(SimError::DegenerateTrack);
        }

        // Cumulative arc-length; the closing segment completes the total length
        let mut arc_lengths = Vec::with_capacity(n);
        arc_lengths.push(0.0);
        for i in 1..n {
            let ds = (centerline[i] - centerline[i - 1]).magnitude();
            arc_lengths.push(arc_lengths[i - 1] + ds);
        }
        let length = arc_lengths[n - 1] + (centerline[0] - centerline[n - 1]).magnitude();
        if !(length > 0.0) || !length.is_finite() {
            return Err(SimError::DegenerateTrack);
        }

        // The left normal points inwards on an anti-clockwise loop
        let outward = if signed_area(&centerline) >= 0.0 {
            -1.0
        } else {
            1.0
        };
        let normals = (0..n)
            .map(|i| {
                let chord = centerline[(i + 1) % n] - centerline[(i + n - 1) % n];
                outward * rot90(normalize_or_zero(chord, TANGENT_EPS))
            })
            .collect::<Vec<_>>();

        let mut track = Self {
            width,
            num_lanes,
            centerline,
            normals,
            arc_lengths,
            length,
            lanes: vec![],
        };
        track.lanes = (0..num_lanes)
            .map(|lane| track.offset_curve(track.lane_offset(lane)))
            .collect();
        Ok(track)
    }

    /// The length of the centreline in m.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// The total width of the track in m.
    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn num_lanes(&self) -> usize {
        self.num_lanes
    }

    /// The width of a single lane in m.
    pub fn lane_width(&self) -> f64 {
        self.width / self.num_lanes as f64
    }

    /// The range of valid continuous lane coordinates.
    pub fn lane_bounds(&self) -> Interval<f64> {
        Interval::new(0.0, (self.num_lanes - 1) as f64)
    }

    /// The sampled centreline points.
    pub fn centerline(&self) -> &[Point2d] {
        &self.centerline
    }

    /// The sampled centre curve of a lane, if it exists.
    pub fn lane(&self, lane: usize) -> Option<&[Point2d]> {
        self.lanes.get(lane).map(Vec::as_slice)
    }

    /// The signed lateral offset of a lane's centre from the centreline, positive outwards.
    pub fn lane_offset(&self, lane: usize) -> f64 {
        let lane_width = self.lane_width();
        -0.5 * self.width + 0.5 * lane_width + lane as f64 * lane_width
    }

    /// Gets the inner and outer edges of the track.
    pub fn boundaries(&self) -> TrackBoundaries {
        TrackBoundaries {
            inner: self.offset_curve(-0.5 * self.width),
            outer: self.offset_curve(0.5 * self.width),
        }
    }

    /// Gets the point at arc-length `s` on the given lane, or on the centreline
    /// if `lane` is `None` or out of range. `s` wraps around the circuit.
    pub fn position_at(&self, s: f64, lane: Option<usize>) -> Point2d {
        let points = lane
            .and_then(|lane| self.lanes.get(lane))
            .unwrap_or(&self.centerline);
        let (idx, t) = self.locate(s);
        let next = (idx + 1) % points.len();
        points[idx] + (points[next] - points[idx]) * t
    }

    /// Gets the heading of the centreline at arc-length `s`, in radians.
    pub fn heading_at(&self, s: f64) -> f64 {
        let (idx, _) = self.locate(s);
        let n = self.centerline.len();
        let tan = self.centerline[(idx + 1) % n] - self.centerline[idx];
        tan.y.atan2(tan.x)
    }

    /// Gets the steering target `lookahead` metres ahead of `s` on the given lane.
    pub fn target_point(&self, s: f64, lookahead: f64, lane: Option<usize>) -> Point2d {
        self.position_at((s + lookahead).rem_euclid(self.length), lane)
    }

    /// Projects a point onto the centreline, returning its arc-length.
    ///
    /// A strided search over the whole centreline finds an approximate nearest sample,
    /// which is refined within a bounded window and then onto the adjacent segments.
    pub fn project(&self, point: Point2d) -> f64 {
        let n = self.centerline.len();
        let dist2 = |i: &usize| (self.centerline[*i] - point).magnitude2();

        let stride = COARSE_STRIDE.min(n);
        let coarse = (0..n)
            .step_by(stride)
            .min_by(|a, b| dist2(a).total_cmp(&dist2(b)))
            .unwrap_or(0);

        let window = 2 * stride as isize;
        let nearest = (-window..=window)
            .map(|k| (coarse as isize + k).rem_euclid(n as isize) as usize)
            .min_by(|a, b| dist2(a).total_cmp(&dist2(b)))
            .unwrap_or(coarse);

        let prev = (nearest + n - 1) % n;
        let (s, _) = [prev, nearest]
            .map(|i| self.project_onto_segment(i, point))
            .into_iter()
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap_or((self.arc_lengths[nearest], 0.0));
        let s = s.rem_euclid(self.length);
        if s < self.length {
            s
        } else {
            0.0
        }
    }

    /// Projects a point onto the segment starting at sample `idx`,
    /// returning the arc-length and squared distance of the closest point.
    fn project_onto_segment(&self, idx: usize, point: Point2d) -> (f64, f64) {
        let n = self.centerline.len();
        let a = self.centerline[idx];
        let ab = self.centerline[(idx + 1) % n] - a;
        let len2 = ab.magnitude2();
        let t = if len2 > TANGENT_EPS {
            ((point - a).dot(ab) / len2).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let closest = a + ab * t;
        let s = self.arc_lengths[idx] + t * self.segment_length(idx);
        (s, (point - closest).magnitude2())
    }

    /// Finds the segment containing arc-length `s` and the fraction along it.
    fn locate(&self, s: f64) -> (usize, f64) {
        let s = s.rem_euclid(self.length);
        let idx = self
            .arc_lengths
            .partition_point(|a| *a <= s)
            .saturating_sub(1);
        let seg = self.segment_length(idx);
        let t = if seg > TANGENT_EPS {
            ((s - self.arc_lengths[idx]) / seg).clamp(0.0, 1.0)
        } else {
            0.0
        };
        (idx, t)
    }

    /// The arc-length of the segment starting at sample `idx`.
    fn segment_length(&self, idx: usize) -> f64 {
        let end = self
            .arc_lengths
            .get(idx + 1)
            .copied()
            .unwrap_or(self.length);
        end - self.arc_lengths[idx]
    }

    /// Offsets the centreline along its outward normal.
    fn offset_curve(&self, offset: f64) -> Vec<Point2d> {
        self.centerline
            .iter()
            .zip(&self.normals)
            .map(|(c, n)| *c + *n * offset)
            .collect()
    }
}
