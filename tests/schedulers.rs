//! Tests comparing the fixed-step and event-driven schedulers.

use race_sim::scheduler::{EventDriven, FixedStep};
use race_sim::{
    Config, DetectionSource, PerStrategy, SchedulerKind, Simulation, StopReason, Strategy,
    StrategyState, VehicleId, VehicleSpawn,
};
use std::f64::consts::PI;

fn race_config(scheduler: SchedulerKind) -> Config {
    let mut config = Config {
        seed: 1234,
        ..Default::default()
    };
    config.simulation.scheduler = scheduler;
    config.simulation.time_limit = 20.0;
    config
}

fn lone_vehicle(config: Config) -> Simulation {
    let mut sim = Simulation::new(config).unwrap();
    let track = sim.track();
    let spawn = VehicleSpawn {
        position: track.position_at(30.0, Some(0)),
        yaw: track.heading_at(30.0),
        velocity: 5.0,
        lane: 0,
        strategy: Strategy::Cautious,
        desired_speed: 20.0,
    };
    sim.add_vehicle(&spawn).unwrap();
    sim
}

/// Test that both schedulers run a full race to completion.
#[test]
fn both_schedulers_terminate() {
    for scheduler in [SchedulerKind::FixedStep, SchedulerKind::EventDriven] {
        let mut sim = Simulation::from_config(race_config(scheduler)).unwrap();
        let result = sim.run().unwrap();
        assert!(result.elapsed <= 20.0 + 1e-9);
        assert_ne!(result.stop_reason, StopReason::TargetLapsReached);
        assert!(result.collisions.iter().all(|c| c.time <= result.elapsed));
        for vehicle in &result.vehicles {
            assert_eq!(vehicle.lap_times.len() as u32, vehicle.laps);
            assert!(vehicle.trajectory.iter().all(|s| s.vel >= 0.0));
        }
    }
}

/// Test that the schedulers agree on the path of a vehicle which never meets another.
#[test]
fn lone_vehicle_paths_agree() {
    let mut config = Config {
        num_vehicles: 0,
        strategy_distribution: PerStrategy::default(),
        ..Default::default()
    };
    config.simulation.time_limit = 5.0;

    let fixed = lone_vehicle(config.clone()).run_with(&mut FixedStep).unwrap();
    let event = lone_vehicle(config).run_with(&mut EventDriven::new()).unwrap();
    assert_eq!(fixed.stop_reason, StopReason::Exhausted);
    assert_eq!(event.stop_reason, StopReason::Exhausted);

    let (a, b) = (&fixed.vehicles[0].trajectory, &event.vehicles[0].trajectory);
    assert_eq!(a.len(), 100);
    assert_eq!(b.len(), 100);
    for (a, b) in a.iter().zip(b) {
        assert!((a.time - b.time).abs() < 1e-9);
        assert!((a.position.x - b.position.x).abs() < 1e-9);
        assert!((a.position.y - b.position.y).abs() < 1e-9);
        assert_eq!(a.vel, b.vel);
    }
}

/// Test that the schedulers run the same updates when `dt` is not a whole number of microseconds.
#[test]
fn updates_match_for_uneven_dt() {
    let mut config = Config {
        num_vehicles: 0,
        strategy_distribution: PerStrategy::default(),
        ..Default::default()
    };
    config.simulation.dt = 1.0 / 30.0;
    config.simulation.time_limit = 10.0;

    let fixed = lone_vehicle(config.clone()).run_with(&mut FixedStep).unwrap();
    let event = lone_vehicle(config).run_with(&mut EventDriven::new()).unwrap();

    let (a, b) = (&fixed.vehicles[0].trajectory, &event.vehicles[0].trajectory);
    assert_eq!(a.len(), 300);
    assert_eq!(b.len(), 300);
    for (k, (a, b)) in a.iter().zip(b).enumerate() {
        let expected = k as f64 / 30.0;
        assert!((a.time - expected).abs() < 1e-9);
        assert!((b.time - expected).abs() < 1e-6);
        assert!((a.s - b.s).abs() < 1e-9);
    }
    assert!(event.elapsed < 10.0);
}

/// Test that a head-on contact is predicted by one collision check, confirmed
/// after the update that brings the vehicles together, and also found by the
/// periodic check at that instant.
#[test]
fn head_on_contact_is_predicted() {
    let mut config = Config {
        num_vehicles: 0,
        strategy_distribution: PerStrategy::default(),
        ..Default::default()
    };
    config.simulation.time_limit = 1.0;
    config.simulation.elimination.enabled = false;

    let mut sim = Simulation::new(config).unwrap();
    let track = sim.track();
    let towards = VehicleSpawn {
        position: track.position_at(30.0, Some(2)),
        yaw: track.heading_at(30.0),
        velocity: 15.0,
        lane: 2,
        strategy: Strategy::Balanced,
        desired_speed: 20.0,
    };
    let against = VehicleSpawn {
        position: track.position_at(35.5, Some(2)),
        yaw: track.heading_at(35.5) + PI,
        ..towards
    };
    sim.add_vehicle(&towards).unwrap();
    sim.add_vehicle(&against).unwrap();

    let result = sim.run_with(&mut EventDriven::new()).unwrap();
    let pair = (VehicleId(0), VehicleId(1));
    let predicted = result
        .collisions
        .iter()
        .find(|c| c.source == DetectionSource::Predictive)
        .expect("no predicted contact");
    assert_eq!(predicted.vehicles, pair);
    assert!(predicted.time > 0.0);
    assert!(result.collisions.iter().any(|c| {
        c.source == DetectionSource::Periodic
            && c.vehicles == pair
            && (c.time - predicted.time).abs() < 1e-9
    }));
}

/// Test that strategy transitions are recorded and rebuild the vehicles' policies.
#[test]
fn strategy_transitions_are_recorded() {
    let mut config = race_config(SchedulerKind::FixedStep);
    config.simulation.transitions.enabled = true;
    config.simulation.elimination.enabled = false;

    let mut sim = Simulation::from_config(config).unwrap();
    let result = sim.run().unwrap();
    assert!(!result.strategy_changes.is_empty());
    assert!(result
        .strategy_changes
        .windows(2)
        .all(|w| w[0].time <= w[1].time));
    for change in &result.strategy_changes {
        assert_ne!(change.to, StrategyState::Live(change.from));
        assert_ne!(change.to, StrategyState::Eliminated);
    }
    assert_eq!(result.eliminated().count(), 0);

    for vehicle in sim.vehicles() {
        let policy = vehicle.policy();
        assert_eq!(policy.strategy(), vehicle.strategy());
        let expected = vehicle.desired_speed() * vehicle.strategy().speed_multiplier();
        assert!((policy.desired_vel() - expected).abs() < 1e-9);
    }
}

/// Test that results are reproducible for a given seed.
#[test]
fn runs_are_deterministic() {
    let run = || {
        let mut sim = Simulation::from_config(race_config(SchedulerKind::EventDriven)).unwrap();
        sim.run().unwrap()
    };
    let (a, b) = (run(), run());
    assert_eq!(a.collisions, b.collisions);
    assert_eq!(a.near_misses, b.near_misses);
    for (a, b) in a.vehicles.iter().zip(&b.vehicles) {
        assert_eq!(a.trajectory, b.trajectory);
        assert_eq!(a.elimination, b.elimination);
    }
}
