use race_sim::{Config, LogSink, SchedulerKind, Simulation};
use std::error::Error;
use std::time::Instant;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_json(&std::fs::read_to_string(path)?)?,
        None => Config::default(),
    };

    for scheduler in [SchedulerKind::FixedStep, SchedulerKind::EventDriven] {
        let mut config = config.clone();
        config.simulation.scheduler = scheduler;

        let mut sim = Simulation::from_config(config)?;
        sim.add_sink(LogSink::new(10.0));

        println!("Simulating ({:?})...", scheduler);
        let start = Instant::now();
        let result = sim.run()?;
        let wall = start.elapsed();

        print!("{}", result);
        println!(
            "Simulated {:.1}s in {:?} --> {:.0}x speedup",
            result.elapsed,
            wall,
            result.elapsed / wall.as_secs_f64().max(1e-9)
        );
        println!();
    }
    Ok(())
}
