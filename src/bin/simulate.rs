/// Headless driver: runs a scenario for N steps and prints every frame
///
/// Usage: simulate [scenario] [--steps N] [--strategy NAME] [--seed N] [--avoid-overlapping] [--quiet]
use std::env;
use std::error::Error;
use std::process;

use crowdgrid::{simulate, Config, Scenario, StrategyKind, UpdateScheme};
use tracing_subscriber::EnvFilter;

fn usage(program: &str) -> ! {
    eprintln!(
        "Usage: {} [scenario] [--steps N] [--strategy NAME] [--seed N] [--avoid-overlapping] [--quiet]",
        program
    );
    eprintln!("Strategies: random, euclidean, dijkstra, euclidean_interactive, euclidean_obstacle_avoiding");
    process::exit(1);
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load();

    let args: Vec<String> = env::args().collect();
    let mut scenario_path = config.scenario.path.clone();
    let mut quiet = false;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--steps" => {
                i += 1;
                config.simulation.steps = args.get(i).unwrap_or_else(|| usage(&args[0])).parse()?;
            }
            "--strategy" => {
                i += 1;
                config.simulation.strategy =
                    args.get(i).unwrap_or_else(|| usage(&args[0])).parse::<StrategyKind>()?;
            }
            "--seed" => {
                i += 1;
                config.simulation.seed = Some(args.get(i).unwrap_or_else(|| usage(&args[0])).parse()?);
            }
            "--avoid-overlapping" => config.simulation.avoid_overlapping = true,
            "--quiet" => quiet = true,
            "--help" | "-h" => usage(&args[0]),
            other if other.starts_with("--") => usage(&args[0]),
            other => scenario_path = other.to_string(),
        }
        i += 1;
    }

    let scenario = Scenario::load(&scenario_path)?;
    let grid = scenario.build_grid(config.pedestrians.default_speed)?;

    let strategy = config.build_strategy()?;
    let mut scheme = match config.simulation.seed {
        Some(seed) => UpdateScheme::seeded(strategy, seed),
        None => UpdateScheme::from_entropy(strategy),
    };

    let run = simulate(
        grid,
        &mut scheme,
        config.simulation.steps,
        config.simulation.report_every,
        config.simulation.avoid_overlapping,
    )?;

    if !quiet {
        for (step, state) in run.states.iter().enumerate() {
            println!("--- step {} ---", step);
            print!("{}", state.to_ascii());
        }
        println!();
    }

    println!("=== {} ({}) ===", scenario_path, scheme.strategy().name());
    println!("{}", run.summary());
    if let Some(step) = run.settled_at() {
        println!("Settled after step {}", step);
    }

    Ok(())
}
