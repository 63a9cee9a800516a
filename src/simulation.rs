use crate::collision::{CollisionEngine, CollisionEvent};
use crate::config::{Config, SchedulerKind};
use crate::control::{ControlPolicy, VehicleSnapshot};
use crate::error::SimError;
use crate::result::{SimulationResult, VehicleReport};
use crate::scheduler::{EventDriven, FixedStep, Scheduler, StopReason};
use crate::sink::{Frame, FrameSink};
use crate::strategy::Strategy;
use crate::track::Track;
use crate::transition::{StrategyChange, StrategyTransition};
use crate::vehicle::{Vehicle, VehicleSpawn};
use crate::VehicleId;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

/// The largest random deviation of a spawned vehicle's heading from the track, in radians.
const SPAWN_YAW_JITTER: f64 = 0.1;

/// A race simulation.
pub struct Simulation {
    config: Config,
    track: Track,
    /// The vehicles being simulated, indexed by ID.
    vehicles: Vec<Vehicle>,
    collision_engine: CollisionEngine,
    transition: Option<StrategyTransition>,
    rng: Pcg64,
    /// The current simulation time in s.
    time: f64,
    /// The number of completed update cycles.
    cycle: usize,
    collisions: Vec<CollisionEvent>,
    /// The number of collisions already passed to the sinks.
    reported: usize,
    near_misses: u64,
    strategy_changes: Vec<StrategyChange>,
    sinks: Vec<Box<dyn FrameSink>>,
}

impl Simulation {
    /// Creates a simulation without any vehicles.
    ///
    /// Fails if the configuration is invalid or the track cannot be built.
    pub fn new(config: Config) -> Result<Self, SimError> {
        config.validate()?;
        let track = Track::new(&config.track)?;
        let run = &config.simulation;
        Ok(Self {
            collision_engine: CollisionEngine::new(run),
            transition: StrategyTransition::new(&run.transitions, run.elimination.enabled),
            rng: Pcg64::seed_from_u64(config.seed),
            track,
            config,
            vehicles: vec![],
            time: 0.0,
            cycle: 0,
            collisions: vec![],
            reported: 0,
            near_misses: 0,
            strategy_changes: vec![],
            sinks: vec![],
        })
    }

    /// Creates a simulation and spawns the configured vehicles.
    pub fn from_config(config: Config) -> Result<Self, SimError> {
        let mut sim = Self::new(config)?;
        sim.spawn_vehicles();
        Ok(sim)
    }

    /// Spawns the configured number of vehicles of each strategy at random
    /// positions and lanes, in a random order.
    pub fn spawn_vehicles(&mut self) -> Vec<VehicleId> {
        let mut strategies = self
            .config
            .strategy_distribution
            .iter()
            .flat_map(|(strategy, count)| std::iter::repeat(strategy).take(count))
            .collect::<Vec<_>>();
        strategies.shuffle(&mut self.rng);

        strategies
            .into_iter()
            .map(|strategy| {
                let spawn = self.random_spawn(strategy);
                self.push_vehicle(&spawn)
            })
            .collect()
    }

    fn random_spawn(&mut self, strategy: Strategy) -> VehicleSpawn {
        let s = self.rng.gen_range(0.0..self.track.length());
        let lane = self.rng.gen_range(0..self.track.num_lanes());
        let jitter = self.rng.gen_range(-SPAWN_YAW_JITTER..=SPAWN_YAW_JITTER);
        VehicleSpawn {
            position: self.track.position_at(s, Some(lane)),
            yaw: self.track.heading_at(s) + jitter,
            velocity: 0.0,
            lane,
            strategy,
            desired_speed: self.config.controller.desired_speed.get(strategy)
                * self.config.speed_multiplier,
        }
    }

    /// Adds a vehicle to the simulation.
    ///
    /// Fails if the desired speed is not positive or any attribute is not finite.
    pub fn add_vehicle(&mut self, spawn: &VehicleSpawn) -> Result<VehicleId, SimError> {
        spawn.validate()?;
        Ok(self.push_vehicle(spawn))
    }

    fn push_vehicle(&mut self, spawn: &VehicleSpawn) -> VehicleId {
        let id = VehicleId(self.vehicles.len());
        let policy = ControlPolicy::new(&self.config.controller, spawn.strategy, spawn.desired_speed);
        self.vehicles.push(Vehicle::new(id, spawn, policy, &self.track));
        id
    }

    /// Adds a sink which observes every recorded frame.
    pub fn add_sink(&mut self, sink: impl FrameSink + 'static) {
        self.sinks.push(Box::new(sink));
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn collision_engine(&self) -> &CollisionEngine {
        &self.collision_engine
    }

    /// The current simulation time in s.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// The number of completed update cycles.
    pub fn cycle(&self) -> usize {
        self.cycle
    }

    /// Returns all the vehicles, including eliminated ones.
    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    /// Gets a reference to the vehicle with the given ID.
    pub fn get_vehicle(&self, vehicle_id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(vehicle_id.0)
    }

    /// Returns an iterator over the vehicles still in the race.
    pub fn iter_active(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.iter().filter(|v| v.is_active())
    }

    /// All collisions recorded so far.
    pub fn collisions(&self) -> &[CollisionEvent] {
        &self.collisions
    }

    pub fn near_misses(&self) -> u64 {
        self.near_misses
    }

    pub fn strategy_changes(&self) -> &[StrategyChange] {
        &self.strategy_changes
    }

    /// Runs the simulation with the configured scheduler.
    pub fn run(&mut self) -> Result<SimulationResult, SimError> {
        match self.config.simulation.scheduler {
            SchedulerKind::FixedStep => self.run_with(&mut FixedStep),
            SchedulerKind::EventDriven => self.run_with(&mut EventDriven::new()),
        }
    }

    /// Runs the simulation with the given scheduler until it stops.
    pub fn run_with(&mut self, scheduler: &mut impl Scheduler) -> Result<SimulationResult, SimError> {
        self.open_sinks();
        log::info!(
            "starting run: {} vehicles, {} laps, time limit {}s, {:?}",
            self.vehicles.len(),
            self.config.simulation.laps,
            self.config.simulation.time_limit,
            self.config.simulation.scheduler
        );
        let stop_reason = scheduler.run(self)?;
        log::info!(
            "run stopped at t={:.2}s ({}): {} collisions, {} near misses",
            self.time,
            stop_reason,
            self.collisions.len(),
            self.near_misses
        );
        Ok(self.result(stop_reason))
    }

    /// Summarises the run so far.
    pub fn result(&self, stop_reason: StopReason) -> SimulationResult {
        SimulationResult {
            vehicles: self.vehicles.iter().map(VehicleReport::new).collect(),
            collisions: self.collisions.clone(),
            near_misses: self.near_misses,
            elapsed: self.time,
            stop_reason,
            strategy_changes: self.strategy_changes.clone(),
        }
    }

    /// Checks the stop conditions in priority order.
    ///
    /// # Parameters
    /// * `exhausted` - Whether the scheduler has no work left
    /// * `now` - The time the next cycle or event would run at
    pub fn stop_reason(&self, exhausted: bool, now: f64) -> Option<StopReason> {
        if exhausted {
            return Some(StopReason::Exhausted);
        }
        if now >= self.config.simulation.time_limit {
            return Some(StopReason::TimeLimit);
        }
        let mut active = self.iter_active().peekable();
        if active.peek().is_none() {
            return Some(StopReason::AllEliminated);
        }
        let laps = self.config.simulation.laps;
        if active.all(|v| v.lap_count() >= laps) {
            return Some(StopReason::TargetLapsReached);
        }
        None
    }

    /// Runs one complete update cycle and advances the time by `dt`.
    pub fn step(&mut self) -> Result<(), SimError> {
        let updated = self.update_vehicles()?;
        self.check_collisions();
        self.count_near_misses();
        self.record(&updated);
        self.update_strategies();
        self.end_cycle();
        self.time = self.cycle as f64 * self.config.simulation.dt;
        Ok(())
    }

    /// Computes a command for every active vehicle from a snapshot taken
    /// before any of them moves, then integrates and re-projects them.
    ///
    /// Returns the IDs of the vehicles updated.
    pub fn update_vehicles(&mut self) -> Result<Vec<VehicleId>, SimError> {
        let dt = self.config.simulation.dt;
        let wheel_base = self.config.controller.wheelbase;
        let snapshot = self.iter_active().map(VehicleSnapshot::of).collect::<Vec<_>>();

        let mut updated = Vec::with_capacity(snapshot.len());
        for vehicle in self.vehicles.iter_mut().filter(|v| v.is_active()) {
            vehicle.tick_cooldown(dt);
            let policy = *vehicle.policy();
            let cmd = policy.compute(vehicle, &self.track, &snapshot);
            vehicle.apply(&cmd, dt, wheel_base);
            vehicle.update_progress(&self.track, dt);
            if !vehicle.is_finite() {
                return Err(SimError::NonFinite {
                    vehicle: vehicle.id(),
                    time: self.time,
                });
            }
            updated.push(vehicle.id());
        }
        Ok(updated)
    }

    /// Runs a collision pass followed by the elimination phase,
    /// returning the collisions found.
    pub fn check_collisions(&mut self) -> &[CollisionEvent] {
        let start = self.collisions.len();
        let events = self.collision_engine.detect(&mut self.vehicles, self.time);
        self.eliminate(&events);
        self.collisions.extend(events);
        &self.collisions[start..]
    }

    /// Records a predicted contact between two vehicles if they are in fact touching.
    pub fn confirm_contact(&mut self, a: VehicleId, b: VehicleId) -> Option<&CollisionEvent> {
        let event = self
            .collision_engine
            .confirm(&mut self.vehicles, a, b, self.time)?;
        self.eliminate(std::slice::from_ref(&event));
        self.collisions.push(event);
        self.collisions.last()
    }

    fn eliminate(&mut self, events: &[CollisionEvent]) {
        self.collision_engine
            .eliminate(events, &mut self.vehicles, self.time, &mut self.rng);
        let stamped = self
            .collision_engine
            .stamp_pending(&mut self.vehicles, self.time);
        if stamped > 0 {
            log::debug!("t={:.2}s: {} eliminations timestamped", self.time, stamped);
        }
    }

    /// Runs a near miss pass, returning the number of near misses found.
    pub fn count_near_misses(&mut self) -> u64 {
        let count = self.collision_engine.count_near_misses(&self.vehicles);
        self.near_misses += count;
        count
    }

    /// Appends a trajectory sample for each updated vehicle, passes the
    /// frame to the sinks and clears the per-frame collision flags.
    pub(crate) fn record(&mut self, updated: &[VehicleId]) {
        for id in updated {
            self.vehicles[id.0].record(self.time);
        }

        let frame = Frame {
            time: self.time,
            vehicles: &self.vehicles,
            collisions: &self.collisions[self.reported..],
            near_misses: self.near_misses,
        };
        for sink in &mut self.sinks {
            sink.frame(&frame);
        }
        self.reported = self.collisions.len();

        for vehicle in &mut self.vehicles {
            vehicle.clear_collided();
        }
    }

    /// Runs the strategy transition layer if it is enabled and due this cycle.
    pub(crate) fn update_strategies(&mut self) {
        let Some(transition) = self.transition else {
            return;
        };
        if !transition.is_due(self.cycle) {
            return;
        }
        let changes = transition.apply(
            &mut self.vehicles,
            &self.config.controller,
            self.time,
            &mut self.rng,
        );
        self.strategy_changes.extend(changes);
    }

    pub(crate) fn end_cycle(&mut self) {
        self.cycle += 1;
    }

    pub(crate) fn set_time(&mut self, time: f64) {
        self.time = time;
    }

    /// Opens every sink, dropping those which fail.
    fn open_sinks(&mut self) {
        let (track, vehicles) = (&self.track, &self.vehicles);
        self.sinks.retain_mut(|sink| match sink.open(track, vehicles) {
            Ok(()) => true,
            Err(err) => {
                log::warn!("{}; continuing without it", err);
                false
            }
        });
    }
}
