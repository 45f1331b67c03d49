use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{CommandFactory, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use groupflow_core::config::AppConfig;
use groupflow_core::event::{EventBus, RunnerEvent};
use groupflow_core::graph::GraphSnapshot;
use groupflow_core::lists::interleave_delays;
use groupflow_core::traits::HostClient;
use groupflow_core::types::{ExecutionEntry, ExecutionPlan, TaskStatus};
use groupflow_gateway::GatewayServer;
use groupflow_host::{EventPump, HttpHost};
use groupflow_runner::{PlanStore, TaskRunner};

#[derive(Parser)]
#[command(
    name = "groupflow",
    version,
    about = "Background group execution driver for node-graph image pipelines"
)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "groupflow.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run groups from a graph snapshot and wait for completion
    Run {
        /// Path to the serialized graph snapshot (JSON)
        snapshot: PathBuf,
        /// Group titles to execute, in order
        #[arg(short, long)]
        group: Vec<String>,
        /// Name of a saved plan to run instead of --group
        #[arg(long, conflicts_with = "group")]
        plan: Option<String>,
        /// Repetitions per group entry
        #[arg(long, default_value_t = 1)]
        repeat: u32,
        /// Delay in seconds between iterations
        #[arg(long, default_value_t = 0.0)]
        delay: f64,
        /// Repeat the whole plan this many times
        #[arg(long, default_value_t = 1)]
        cycles: u32,
        /// Delay in seconds between plan repetitions
        #[arg(long, default_value_t = 0.0)]
        cycle_delay: f64,
        /// Submitter id owning this run
        #[arg(long, default_value = "cli")]
        submitter: String,
    },
    /// Start the HTTP gateway
    Serve,
    /// Manage saved execution plans
    Plan {
        #[command(subcommand)]
        action: PlanAction,
    },
    /// Ask the host to release memory
    Free {
        /// Keep models loaded
        #[arg(long)]
        keep_models: bool,
        /// Keep the execution cache
        #[arg(long)]
        keep_cache: bool,
    },
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum PlanAction {
    /// List saved plans
    List,
    /// Print one saved plan
    Show { name: String },
    /// Save a plan from a JSON file
    Save { name: String, file: PathBuf },
    /// Delete a saved plan
    Delete { name: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("groupflow=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    // Handle completions before config loading
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "groupflow", &mut std::io::stdout());
        return Ok(());
    }

    let config = if cli.config.exists() {
        AppConfig::load(&cli.config)?
    } else {
        info!(path = %cli.config.display(), "No config file found, using defaults");
        AppConfig::default()
    };

    match cli.command {
        Commands::Run {
            snapshot,
            group,
            plan,
            repeat,
            delay,
            cycles,
            cycle_delay,
            submitter,
        } => {
            cmd_run(
                &config, &snapshot, group, plan, repeat, delay, cycles, cycle_delay, &submitter,
            )
            .await
        }
        Commands::Serve => cmd_serve(&config).await,
        Commands::Plan { action } => cmd_plan(&config, action),
        Commands::Free {
            keep_models,
            keep_cache,
        } => cmd_free(&config, !keep_models, !keep_cache).await,
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::Completions { .. } => unreachable!(),
    }
}

#[allow(clippy::too_many_arguments)]
async fn cmd_run(
    config: &AppConfig,
    snapshot_path: &std::path::Path,
    groups: Vec<String>,
    plan_name: Option<String>,
    repeat: u32,
    delay: f64,
    cycles: u32,
    cycle_delay: f64,
    submitter: &str,
) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(snapshot_path)?;
    let snapshot: GraphSnapshot = serde_json::from_str(&raw)?;

    let store = PlanStore::new(config.plans_dir());
    let mut plan = match plan_name {
        Some(name) => store.load(&name)?,
        None => {
            if groups.is_empty() {
                anyhow::bail!("provide --group at least once, or --plan <name>");
            }
            ExecutionPlan::new(
                groups
                    .into_iter()
                    .map(|g| ExecutionEntry::group(g).with_repeat(repeat).with_delay(delay))
                    .collect(),
            )
        }
    };
    if cycles > 1 {
        plan = interleave_delays(&plan, cycles, cycle_delay);
    }

    let host = Arc::new(HttpHost::new(&config.host));
    let catalog = Arc::new(host.fetch_catalog().await?);
    let events = Arc::new(EventBus::default());
    let shutdown = CancellationToken::new();

    let pump = EventPump::new(&config.host, host.client_id(), events.clone(), shutdown.clone());
    tokio::spawn(async move { pump.run().await });

    let runner = TaskRunner::new(host, catalog, events.clone(), config.runner.clone());

    let mut rx = events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match event {
                RunnerEvent::EntryStarted {
                    group, step, total, ..
                } => info!(group = %group, step, total, "Executing group"),
                RunnerEvent::EntryDelay { seconds, .. } => info!(seconds, "Waiting"),
                _ => {}
            }
        }
    });

    if !runner.start(submitter, plan, snapshot) {
        anyhow::bail!("a plan is already running for submitter '{}'", submitter);
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupt received, cancelling run");
                runner.cancel(submitter);
            }
            _ = tokio::time::sleep(Duration::from_millis(200)) => {
                let Some(status) = runner.status(submitter) else { continue };
                if !status.is_terminal() {
                    continue;
                }
                shutdown.cancel();
                if let Some(report) = runner.report(submitter) {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                match status {
                    TaskStatus::Cancelled => info!("Run cancelled"),
                    _ => info!("Run completed"),
                }
                return Ok(());
            }
        }
    }
}

async fn cmd_serve(config: &AppConfig) -> anyhow::Result<()> {
    let host = Arc::new(HttpHost::new(&config.host));
    let catalog = Arc::new(host.fetch_catalog().await?);
    let events = Arc::new(EventBus::default());
    let shutdown = CancellationToken::new();

    let pump = EventPump::new(&config.host, host.client_id(), events.clone(), shutdown.clone());
    tokio::spawn(async move { pump.run().await });

    let runner = Arc::new(TaskRunner::new(
        host,
        catalog,
        events,
        config.runner.clone(),
    ));
    let plans = Arc::new(PlanStore::new(config.plans_dir()));
    let gateway = GatewayServer::new(config.gateway.clone().unwrap_or_default(), runner, plans);

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            signal_token.cancel();
        }
    });

    gateway.run(shutdown).await
}

fn cmd_plan(config: &AppConfig, action: PlanAction) -> anyhow::Result<()> {
    let store = PlanStore::new(config.plans_dir());
    match action {
        PlanAction::List => {
            for name in store.list() {
                println!("{}", name);
            }
        }
        PlanAction::Show { name } => {
            let plan = store.load(&name)?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        PlanAction::Save { name, file } => {
            let raw = std::fs::read_to_string(&file)?;
            let plan: ExecutionPlan = serde_json::from_str(&raw)?;
            let stored = store.save(&name, &plan)?;
            println!("saved '{}' ({} entries)", stored, plan.entries.len());
        }
        PlanAction::Delete { name } => {
            if store.delete(&name)? {
                println!("deleted '{}'", name);
            } else {
                println!("no plan named '{}'", name);
            }
        }
    }
    Ok(())
}

async fn cmd_free(config: &AppConfig, unload_models: bool, free_cache: bool) -> anyhow::Result<()> {
    let host = HttpHost::new(&config.host);
    host.free_memory(unload_models, free_cache).await?;
    info!(unload_models, free_cache, "Memory cleanup requested");
    Ok(())
}
