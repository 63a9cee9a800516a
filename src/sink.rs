//! Observers which receive the simulation state after every recorded frame.

use crate::collision::CollisionEvent;
use crate::error::SinkError;
use crate::track::Track;
use crate::vehicle::Vehicle;

/// A read-only view of the simulation at the end of a cycle.
#[derive(Clone, Copy, Debug)]
pub struct Frame<'a> {
    /// The simulation time at the start of the cycle, in s.
    pub time: f64,
    /// Every vehicle, including eliminated ones.
    pub vehicles: &'a [Vehicle],
    /// Collisions recorded since the previous frame.
    pub collisions: &'a [CollisionEvent],
    /// The number of near misses so far.
    pub near_misses: u64,
}

/// Receives frames from a running simulation, e.g. to render them.
pub trait FrameSink {
    /// Prepares the sink. A sink which fails to open is dropped for the rest of the run.
    fn open(&mut self, _track: &Track, _vehicles: &[Vehicle]) -> Result<(), SinkError> {
        Ok(())
    }

    /// Observes one frame.
    fn frame(&mut self, frame: &Frame);
}

/// Reports the progress of a run through the `log` facade.
#[derive(Clone, Debug)]
pub struct LogSink {
    /// Simulated seconds between reports.
    interval: f64,
    next_report: f64,
}

impl LogSink {
    pub fn new(interval: f64) -> Self {
        Self {
            interval,
            next_report: 0.0,
        }
    }
}

impl FrameSink for LogSink {
    fn open(&mut self, track: &Track, vehicles: &[Vehicle]) -> Result<(), SinkError> {
        if !(self.interval > 0.0) {
            return Err(SinkError(format!("invalid report interval {}", self.interval)));
        }
        log::info!(
            "{} vehicles on a {:.1} m track with {} lanes",
            vehicles.len(),
            track.length(),
            track.num_lanes()
        );
        Ok(())
    }

    fn frame(&mut self, frame: &Frame) {
        for event in frame.collisions {
            log::debug!(
                "t={:.2}s: vehicles {} and {} collided (severity {:.2})",
                event.time,
                event.vehicles.0,
                event.vehicles.1,
                event.severity
            );
        }
        if frame.time < self.next_report {
            return;
        }
        self.next_report = frame.time + self.interval;

        let active = frame.vehicles.iter().filter(|v| v.is_active());
        let (count, laps) = active.fold((0, 0), |(count, laps), v| {
            (count + 1, u32::max(laps, v.lap_count()))
        });
        log::info!(
            "t={:.1}s: {} active, leader on lap {}, {} near misses",
            frame.time,
            count,
            laps,
            frame.near_misses
        );
    }
}
