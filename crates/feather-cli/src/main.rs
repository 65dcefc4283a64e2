mod config;
mod scenario_cmd;
mod tables_cmd;
#[cfg(test)]
mod test_util;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use feather_core::JobError;
use feather_core::descriptor::DEFAULT_WALL_THICKNESS;
use feather_core::job::ScenarioRequest;
use feather_core::launcher::{DEFAULT_WORKER, process::executable_exists};

use config::FeatherConfig;
use scenario_cmd::{PickFiles, RunArgs};

#[derive(Parser)]
#[command(name = "feather", about = "Prepare analysis jobs and launch the solver")]
struct Cli {
    /// Worker executable (overrides FEATHER_WORKER env var)
    #[arg(long, global = true)]
    worker: Option<PathBuf>,
    /// Directory the job files are written to (overrides FEATHER_HANDOFF_DIR env var)
    #[arg(long, global = true)]
    handoff_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a feather config file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Mass lightening of jewelry under a use-case load
    Lighten {
        #[command(flatten)]
        run: RunArgs,
        /// JSON file of picked load points: [[x, y, z], ...]
        #[arg(long)]
        load_picks: PathBuf,
        /// JSON file of picked restraint points: [[x, y, z], ...]
        #[arg(long)]
        restraint_picks: PathBuf,
        /// Metal: Gold=1, Silver=2, Platinum=3, Copper=4, Other=5
        #[arg(long, default_value_t = 3)]
        material: u32,
        /// Jewelry type, see `feather tables`
        #[arg(long, default_value_t = 3)]
        use_case: u32,
        /// Precision: VeryLow=1, Low=2, Medium=3, High=4, VeryHigh=5
        #[arg(long, default_value_t = 3)]
        precision: u32,
    },
    /// Printability check of an SLA resin print
    Printable {
        #[command(flatten)]
        run: RunArgs,
        /// Resin: Very soft=1, Soft=2, Medium=3, Hard=4, Very hard=5
        #[arg(long, default_value_t = 3)]
        material: u32,
        /// Precision: VeryLow=1, Low=2, Medium=3, High=4, VeryHigh=5
        #[arg(long, default_value_t = 3)]
        precision: u32,
    },
    /// Hollow a model with a fixed wall thickness
    Hollow {
        #[command(flatten)]
        run: RunArgs,
        /// Wall thickness in model units (0 to 100)
        #[arg(long, default_value_t = DEFAULT_WALL_THICKNESS)]
        thickness: f64,
        /// Precision: Low=1, Medium=2, High=3
        #[arg(long, default_value_t = 2)]
        precision: u32,
        /// Fill the hollow with a lattice
        #[arg(long)]
        infill: bool,
    },
    /// List every selector table
    Tables,
}

/// Execute the `feather init` command: write config file.
fn cmd_init(worker: Option<PathBuf>, handoff_dir: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let worker = worker.unwrap_or_else(|| PathBuf::from(DEFAULT_WORKER));
    let handoff_dir = handoff_dir.unwrap_or_else(std::env::temp_dir);

    let cfg = config::ConfigFile {
        worker: config::WorkerSection {
            executable: Some(worker.clone()),
            with_log: false,
            timeout_secs: None,
        },
        handoff: config::HandoffSection {
            dir: Some(handoff_dir.clone()),
        },
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  worker.executable = {}", worker.display());
    println!("  handoff.dir = {}", handoff_dir.display());
    if !executable_exists(&worker) {
        println!();
        println!("Warning: {} does not exist yet.", worker.display());
    }

    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Commands::Init { force } => {
            cmd_init(cli.worker, cli.handoff_dir, force)?;
            Ok(0)
        }
        Commands::Tables => {
            tables_cmd::run_tables();
            Ok(0)
        }
        Commands::Lighten {
            run,
            load_picks,
            restraint_picks,
            material,
            use_case,
            precision,
        } => {
            let resolved = FeatherConfig::resolve(cli.worker, cli.handoff_dir)?;
            let picks = PickFiles {
                loads: load_picks,
                restraints: restraint_picks,
            };
            let scenario = ScenarioRequest::Lighten {
                material,
                use_case,
                precision,
            };
            let completion =
                scenario_cmd::run_scenario(scenario, Some(picks), &run, &resolved).await?;
            Ok(scenario_cmd::exit_code(&completion))
        }
        Commands::Printable {
            run,
            material,
            precision,
        } => {
            let resolved = FeatherConfig::resolve(cli.worker, cli.handoff_dir)?;
            let scenario = ScenarioRequest::Printable {
                material,
                precision,
            };
            let completion = scenario_cmd::run_scenario(scenario, None, &run, &resolved).await?;
            Ok(scenario_cmd::exit_code(&completion))
        }
        Commands::Hollow {
            run,
            thickness,
            precision,
            infill,
        } => {
            let resolved = FeatherConfig::resolve(cli.worker, cli.handoff_dir)?;
            let scenario = ScenarioRequest::Hollow {
                precision,
                wall_thickness: thickness,
                infill,
            };
            let completion = scenario_cmd::run_scenario(scenario, None, &run, &resolved).await?;
            Ok(scenario_cmd::exit_code(&completion))
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e:#}");
            // A wrongly-saved STL is reported apart from ordinary failures.
            let fatal = e.downcast_ref::<JobError>().is_some_and(JobError::is_fatal);
            if fatal { 2 } else { 1 }
        }
    };
    std::process::exit(code);
}
