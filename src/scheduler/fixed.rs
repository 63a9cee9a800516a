use super::{tick_count, Scheduler, StopReason};
use crate::error::SimError;
use crate::simulation::Simulation;

/// Advances the simulation in uniform ticks of `dt`.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedStep;

impl Scheduler for FixedStep {
    fn run(&mut self, sim: &mut Simulation) -> Result<StopReason, SimError> {
        let run = &sim.config().simulation;
        let ticks = tick_count(run.time_limit, run.dt);
        let mut tick = 0;
        loop {
            if let Some(reason) = sim.stop_reason(tick >= ticks, sim.time()) {
                return Ok(reason);
            }
            sim.step()?;
            tick += 1;
        }
    }
}
