//! Property tests of the track geometry and vehicle dynamics.

use proptest::prelude::*;
use race_sim::config::TrackConfig;
use race_sim::{Config, PerStrategy, Simulation, Strategy, Track, VehicleSpawn};

fn track() -> Track {
    Track::new(&TrackConfig::default()).unwrap()
}

fn circular_diff(a: f64, b: f64, length: f64) -> f64 {
    let d = (a - b).rem_euclid(length);
    f64::min(d, length - d)
}

proptest! {
    #[test]
    fn position_is_periodic(frac in 0.0..1.0f64, laps in -3i32..=3, lane in 0usize..5) {
        let track = track();
        let s = frac * track.length();
        let a = track.position_at(s, Some(lane));
        let b = track.position_at(s + laps as f64 * track.length(), Some(lane));
        prop_assert!((a.x - b.x).abs() < 1e-6);
        prop_assert!((a.y - b.y).abs() < 1e-6);
    }

    #[test]
    fn projection_round_trips(frac in 0.0..1.0f64) {
        let track = track();
        let s = frac * track.length();
        let projected = track.project(track.position_at(s, None));
        prop_assert!(projected >= 0.0 && projected < track.length());
        prop_assert!(circular_diff(projected, s, track.length()) < 1e-3);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn velocity_stays_within_limits(
        desired_speed in 5.0..40.0f64,
        initial in 0.0..60.0f64,
        strategy in prop::sample::select(Strategy::ALL.to_vec()),
        frac in 0.0..1.0f64,
    ) {
        let mut config = Config {
            num_vehicles: 0,
            strategy_distribution: PerStrategy::default(),
            ..Default::default()
        };
        config.track.num_points = 300;
        let mut sim = Simulation::new(config).unwrap();
        let s = frac * sim.track().length();
        let spawn = VehicleSpawn {
            position: sim.track().position_at(s, Some(1)),
            yaw: sim.track().heading_at(s),
            velocity: initial,
            lane: 1,
            strategy,
            desired_speed,
        };
        let veh = sim.add_vehicle(&spawn).unwrap();
        let max_vel = desired_speed * strategy.speed_multiplier();
        for _ in 0..200 {
            sim.step().unwrap();
            let vel = sim.get_vehicle(veh).unwrap().vel();
            prop_assert!(vel >= 0.0);
            prop_assert!(vel <= max_vel + 1e-9);
        }
    }
}
