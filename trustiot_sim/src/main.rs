//! TrustIoT Simulator CLI
//!
//! Compares the game-theoretic, greedy and random allocators over repeated
//! independent runs of a setup.

use clap::Parser;
use std::process::exit;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use trustiot_core::{JsonSetup, MetricKind, SetupFactory};
use trustiot_env::{EntropyContext, RunContext, SeededContext};
use trustiot_sim::{Comparison, RunAggregator, ScenarioId, SimConfig, SimError, SimExport, TerminalPlotter};

/// TrustIoT allocation strategy comparison
#[derive(Parser, Debug)]
#[command(name = "trustiot-sim")]
#[command(about = "Simulate trust-aware task allocation on IoT edge servers", long_about = None)]
struct Args {
    /// Setup file (JSON with "devices" and "servers"); overrides --scenario
    #[arg(long)]
    setup: Option<String>,
    
    /// Built-in setup (see --list-scenarios)
    #[arg(short = 'S', long, default_value = "iot_edge")]
    scenario: String,
    
    /// Independent runs per strategy
    #[arg(short = 'n', long, default_value = "5")]
    num_runs: usize,
    
    /// Iterations per run
    #[arg(short, long, default_value = "50")]
    iterations: usize,
    
    /// Best-response round cap (default: proven bound for the setup size)
    #[arg(long)]
    max_rounds: Option<usize>,
    
    /// Master seed for determinism (0 = random from OS entropy)
    #[arg(short, long, default_value = "42")]
    seed: u64,
    
    /// Only print the comparison table
    #[arg(long)]
    no_plots: bool,
    
    /// Export the aggregated series to a JSON file
    #[arg(long)]
    export: Option<String>,
    
    /// JSON output for scripting
    #[arg(long)]
    json: bool,
    
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
    
    /// List built-in scenarios and exit
    #[arg(long)]
    list_scenarios: bool,
}

fn run(args: &Args, context: &dyn RunContext) -> Result<Comparison, SimError> {
    let factory: Box<dyn SetupFactory> = match &args.setup {
        Some(path) => Box::new(JsonSetup::from_path(path)?),
        None => Box::new(args.scenario.parse::<ScenarioId>()?),
    };
    
    let mut config = SimConfig::default().with_iterations(args.iterations);
    if let Some(rounds) = args.max_rounds {
        config = config.with_max_rounds(rounds);
    }
    let aggregator = RunAggregator::new(context, factory.as_ref(), config, args.num_runs)?;
    aggregator.run_all()
}

fn main() {
    let args = Args::parse();
    
    // Initialize logging; RUST_LOG overrides the default level
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
    
    if args.list_scenarios {
        for scenario in ScenarioId::all() {
            println!("{:<16} {}", scenario.name(), scenario.description());
        }
        return;
    }
    
    let context: Box<dyn RunContext> = if args.seed == 0 {
        Box::new(EntropyContext::new())
    } else {
        Box::new(SeededContext::new(args.seed))
    };
    
    if !args.json {
        info!("TrustIoT Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!(
            "setup={} runs={} iterations={} seed={}",
            args.setup.as_deref().unwrap_or(&args.scenario),
            args.num_runs,
            args.iterations,
            context.seed()
        );
    }
    
    let comparison = match run(&args, context.as_ref()) {
        Ok(comparison) => comparison,
        Err(e) => {
            error!("✗ {}", e);
            exit(1);
        }
    };
    
    let export = SimExport::from_comparison(&comparison);
    if let Some(path) = &args.export {
        match export.write_to_file(path) {
            Ok(()) => info!("Exported {} strategies to {}", export.strategies.len(), path),
            Err(e) => {
                error!("✗ {}", e);
                exit(1);
            }
        }
    }
    
    if args.json {
        let summary = serde_json::json!({
            "setup": comparison.setup,
            "seed": comparison.seed,
            "num_runs": comparison.num_runs,
            "num_iterations": comparison.num_iterations,
            "results": comparison.results.iter().map(|r| {
                let row = r.summary();
                let mut fields = serde_json::Map::new();
                fields.insert("strategy".into(), r.strategy.name().into());
                for kind in MetricKind::all() {
                    fields.insert(kind.name().into(), row.get(kind).into());
                }
                serde_json::Value::Object(fields)
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("✗ {}", e);
                exit(1);
            }
        }
        return;
    }
    
    let plotter = if args.no_plots {
        TerminalPlotter::disabled()
    } else {
        TerminalPlotter::new()
    };
    
    plotter.log_summary(&comparison);
    match plotter.render(&comparison) {
        Ok(text) if !text.is_empty() => {
            println!();
            println!("{}", text);
        }
        Ok(_) => {}
        Err(e) => warn!("Plot rendering skipped: {}", e),
    }
    
    for result in &comparison.results {
        if result.non_converged_iterations > 0 {
            warn!(
                "{}: {} iterations ended at the round cap",
                result.strategy.label(),
                result.non_converged_iterations
            );
        }
    }
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("✅ Compared {} strategies on '{}'", comparison.results.len(), comparison.setup);
}
