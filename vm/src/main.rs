use std::process::ExitCode;

use clap::Parser as ClapParser;

use object::{Invokable, Method, Value};
use vm::programs::Program;
use vm::tiers::{TierConfig, TierMode, parse_threshold};
use vm::Universe;

#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Program to run
    #[arg(long, value_enum, default_value_t = Program::Sum)]
    program: Program,

    /// Execution tier: 1 threaded, 2 tracing, 3 hybrid (default: SOM_TIER)
    #[arg(long, help = "Tier to run in (1, 2 or 3)")]
    tier: Option<String>,

    /// Back-edge count after which hybrid mode leaves tier 1
    #[arg(long, help = "Hybrid threshold (default: SOM_HYBRID_THRESHOLD or 519)")]
    hybrid_threshold: Option<String>,

    /// Run the program this many times in the same universe
    #[arg(long, default_value_t = 1)]
    iterations: u32,

    /// Print the bytecode of the program's methods instead of running it
    #[arg(long, help = "Dump bytecode + literals of the program")]
    dump_bytecode: bool,
}

fn config(cli: &Cli) -> TierConfig {
    let env = TierConfig::from_env();
    let mode = cli
        .tier
        .as_deref()
        .map_or(env.mode, TierMode::parse_or_default);
    let threshold = match cli.hybrid_threshold.as_deref().map(parse_threshold) {
        Some(Ok(threshold)) => threshold,
        Some(Err(err)) => {
            log::warn!("{err}, keeping {}", env.hybrid_threshold());
            env.hybrid_threshold()
        }
        None => env.hybrid_threshold(),
    };
    TierConfig::new(mode).with_hybrid_threshold(threshold)
}

fn dump_method(method: &Method) {
    println!("{}", method.disassemble());
    for literal in method.literals() {
        if let Value::Method(block) = literal {
            dump_method(block);
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    let config = config(&cli);
    log::info!(
        "running {} in {} mode, hybrid threshold {}",
        cli.program,
        config.mode,
        config.hybrid_threshold()
    );
    let u = Universe::new(config);

    if cli.dump_bytecode {
        match cli.program.define(&u) {
            Ok(class) => {
                for invokable in class.local_methods() {
                    if let Invokable::Method(method) = invokable {
                        dump_method(&method);
                    }
                }
                return ExitCode::SUCCESS;
            }
            Err(err) => {
                eprintln!("Error compiling {}: {err}", cli.program);
                return ExitCode::FAILURE;
            }
        }
    }

    for iteration in 0..cli.iterations {
        match cli.program.run(&u) {
            Ok(value) if cli.program.is_expected(&value) => {
                println!("{}: {value:?}", cli.program);
            }
            Ok(value) => {
                eprintln!(
                    "{} produced an unexpected result in iteration {iteration}: {value:?}",
                    cli.program
                );
                return ExitCode::FAILURE;
            }
            Err(err) => {
                eprintln!("Error running {}: {err}", cli.program);
                return ExitCode::FAILURE;
            }
        }
    }
    let transfers = u.transfers();
    log::info!(
        "tier transfers: {} to tier 2, {} to tier 1",
        transfers.to_tier2,
        transfers.to_tier1
    );
    ExitCode::SUCCESS
}
