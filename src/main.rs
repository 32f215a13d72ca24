use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::{error, info};

use fleet_transport::costs::{PromptCostSource, RouteCosts};
use fleet_transport::models::transportation_model::{CapacityMode, LpModel, Parameters};
use fleet_transport::parse::read_instance;
use fleet_transport::report::{self, RunRecord};
use fleet_transport::{Config, Result, Runner, Termination};

#[derive(Parser)]
#[clap(author, version, about = "Routes cargo from supply ports to demand ports at minimum cost")]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Solves an instance and prints the routes in use
    Solve {
        /// Instance JSON file
        instance: PathBuf,
        /// Config JSON file; flags given here take precedence
        #[clap(long)]
        config: Option<PathBuf>,
        /// Termination criterion in reverse polish notation, e.g. "30 timeout"
        #[clap(long)]
        termination: Option<Termination>,
        /// per-route or per-ship-total
        #[clap(long)]
        capacity: Option<CapacityMode>,
        /// Flows at or below this are not reported
        #[clap(long)]
        tolerance: Option<f64>,
        /// Write a JSON record of the run here
        #[clap(long)]
        record: Option<PathBuf>,
        /// Write a Graphviz rendering of the routes here
        #[clap(long)]
        dot: Option<PathBuf>,
    },
    /// Checks that an instance is well formed and reports the model size
    Validate { instance: PathBuf },
}

#[allow(clippy::too_many_arguments)]
fn solve(
    instance: PathBuf,
    config: Option<PathBuf>,
    termination: Option<Termination>,
    capacity: Option<CapacityMode>,
    tolerance: Option<f64>,
    record: Option<PathBuf>,
    dot: Option<PathBuf>,
) -> Result<()> {
    let mut config = match config {
        Some(path) => Config::read(path)?,
        None => Config::default(),
    };
    if let Some(termination) = termination {
        config.termination = termination;
    }
    if let Some(capacity) = capacity {
        config.capacity_mode = capacity;
    }
    if let Some(tolerance) = tolerance {
        config.flow_tolerance = tolerance;
    }
    config.validate()?;

    let instance = read_instance(instance)?;
    let costs = match instance.costs {
        Some(costs) => costs,
        None => {
            let stdin = std::io::stdin();
            let stdout = std::io::stdout();
            let mut source = PromptCostSource::new(stdin.lock(), stdout.lock());
            RouteCosts::collect(&instance.problem, &mut source)?
        }
    };

    info!(
        "Solving {} with {} capacity, terminating on {}",
        instance.name, config.capacity_mode, config.termination
    );
    let allocation = Runner::new().run(Arc::new(instance.problem), Arc::new(costs), config)?;

    print!("{}", report::summary(&allocation));

    if let Some(path) = record {
        RunRecord::new(&allocation).write_json(path)?;
    }
    if let Some(path) = dot {
        std::fs::write(&path, report::to_dot(&allocation))?;
        info!("Wrote routes to {}", path.display());
    }

    Ok(())
}

fn validate(instance: PathBuf) -> Result<()> {
    let instance = read_instance(instance)?;
    let (ships, supply, demand) = instance.problem.shape();
    println!(
        "{}: {} ships, {} supply ports, {} demand ports",
        instance.name, ships, supply, demand
    );

    match &instance.costs {
        Some(costs) => {
            let parameters = Parameters::new(&instance.problem, costs)?;
            for mode in [CapacityMode::PerRoute, CapacityMode::PerShipTotal] {
                let model = LpModel::build(&parameters, mode)?;
                println!(
                    "{}: {} variables, {} equality rows, {} capacity rows",
                    mode,
                    model.dimensions.vars(),
                    model.a_eq.len(),
                    model.a_ub.len()
                );
            }
        }
        None => println!("no costs given, they will be asked for when solving"),
    }

    Ok(())
}

pub fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let outcome = match cli.command {
        Command::Solve {
            instance,
            config,
            termination,
            capacity,
            tolerance,
            record,
            dot,
        } => solve(instance, config, termination, capacity, tolerance, record, dot),
        Command::Validate { instance } => validate(instance),
    };

    if let Err(e) = outcome {
        error!("{}", e);
        std::process::exit(1);
    }
}
