use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tokio::task::JoinSet;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

use conductor_core::app::{SessionBlueprint, SessionBuilder};
use conductor_core::config::SessionConfig;
use conductor_core::domain::{Selection, State};

#[derive(Debug, Parser)]
#[command(name = "conductor", version, about = "Route control steps to remotely served concept policies")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate a session config and print its concept and selection tables.
    Check {
        #[arg(long)]
        config: PathBuf,
    },

    /// Replay a JSON-lines state trace through one or more sessions.
    Run {
        #[arg(long)]
        config: PathBuf,

        /// One JSON object per line; line i is the state of step i.
        #[arg(long)]
        states: PathBuf,

        /// Selection per step, cycled: `--schedule 1,1,2`.
        #[arg(long, value_delimiter = ',', required = true)]
        schedule: Vec<u32>,

        /// Number of concurrent sessions sharing one HTTP client.
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        sessions: u32,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("conductor_core=info,conductor=info"));
    // stdout carries step records only
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn load_blueprint(path: &Path) -> anyhow::Result<SessionBlueprint> {
    let config = SessionConfig::load(path)?;
    let client = Arc::new(config.client.build_client()?);
    let blueprint = SessionBuilder::from_config(&config, client)?
        .build()
        .with_context(|| format!("invalid session config {}", path.display()))?;
    Ok(blueprint)
}

async fn read_states(path: &Path) -> anyhow::Result<Vec<State>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{}: not a state object", path.display(), n + 1))
        })
        .collect()
}

fn selection_at(schedule: &[u32], step: usize) -> Selection {
    Selection(schedule[step % schedule.len()])
}

/// One episode over the whole trace; stops at the first failed step.
async fn run_session(
    blueprint: SessionBlueprint,
    states: Arc<Vec<State>>,
    schedule: Arc<Vec<u32>>,
) -> anyhow::Result<u64> {
    let mut session = blueprint.start();
    for (i, state) in states.iter().enumerate() {
        let selection = selection_at(&schedule, i);
        match session.step(selection, state).await {
            Ok(record) => println!("{}", serde_json::to_string(&record)?),
            Err(err) => {
                error!(session = %session.id(), step = i, error = %err, kind = ?err.error_kind(), "step failed, ending episode");
                return Err(err).with_context(|| format!("{} step {i}", session.id()));
            }
        }
    }
    info!(session = %session.id(), steps = session.steps_taken(), "episode finished");
    Ok(session.steps_taken())
}

async fn run(config: &Path, states: &Path, schedule: Vec<u32>, sessions: u32) -> anyhow::Result<()> {
    let blueprint = load_blueprint(config)?;
    let states = Arc::new(read_states(states).await?);
    if states.is_empty() {
        bail!("state trace is empty");
    }
    let schedule = Arc::new(schedule);

    let mut set = JoinSet::new();
    for _ in 0..sessions {
        set.spawn(run_session(blueprint.clone(), Arc::clone(&states), Arc::clone(&schedule)));
    }

    let mut failed = 0usize;
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => {
                error!("{err:#}");
                failed += 1;
            }
            Err(join_err) => {
                error!("session task aborted: {join_err}");
                failed += 1;
            }
        }
    }
    if failed > 0 {
        bail!("{failed} of {sessions} session(s) failed");
    }
    Ok(())
}

fn check(config: &Path) -> anyhow::Result<()> {
    let blueprint = load_blueprint(config)?;
    println!("iteration: {:?}", blueprint.iteration_source());
    println!("concepts:");
    for spec in blueprint.concepts() {
        println!(
            "  {:<16} {:<40} control_period={}",
            spec.key, spec.endpoint, spec.control_period
        );
    }
    println!("selection:");
    for (selection, key) in blueprint.selection_table().iter() {
        println!("  {selection:>4} -> {key}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::Check { config } => check(&config),
        Command::Run {
            config,
            states,
            schedule,
            sessions,
        } => run(&config, &states, schedule, sessions).await,
    }
}
