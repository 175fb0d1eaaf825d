use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tokio::time::Duration;

use flowcue_lib::commands::{settings_command, task_command, SettingsAction, TaskAction};
use flowcue_lib::config::{CompanionConfig, DEFAULT_POLL_INTERVAL_MS, DEFAULT_STORE_FILE};
use flowcue_lib::poller::DEFAULT_JUMP_TOLERANCE_SECS;
use flowcue_lib::timer::DEFAULT_GRACE_POLLS;
use flowcue_lib::utils::logging;

#[derive(Parser)]
#[command(name = "flowcue")]
#[command(about = "Spoken countdown cues for a co-working timer page", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    paths: PathArgs,
}

#[derive(Args)]
struct PathArgs {
    /// Settings, sync and task store
    #[arg(long, global = true, env = "FLOWCUE_STORE", default_value = DEFAULT_STORE_FILE)]
    store: PathBuf,

    /// Directory containing the audio/ bundle
    #[arg(long, global = true, env = "FLOWCUE_ASSETS", default_value = ".")]
    assets: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Read page events from stdin and play cues
    Run {
        /// Poll period in milliseconds
        #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_MS)]
        poll_ms: u64,

        /// Tick period in milliseconds
        #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_MS)]
        tick_ms: u64,

        /// Polls without a timer before the session is dropped
        #[arg(long, default_value_t = DEFAULT_GRACE_POLLS)]
        grace_polls: u32,

        /// Upward change in seconds treated as a new countdown
        #[arg(long, default_value_t = DEFAULT_JUMP_TOLERANCE_SECS)]
        jump_tolerance: u32,

        /// Do not forward sync payloads to stdout
        #[arg(long)]
        no_relay: bool,
    },

    /// Inspect or change audio settings
    Settings {
        #[command(subcommand)]
        command: SettingsAction,
    },

    /// Manage task lists
    Tasks {
        #[command(subcommand)]
        command: TaskAction,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let cli = Cli::parse();

    let mut config = CompanionConfig {
        store_path: cli.paths.store,
        asset_root: cli.paths.assets,
        ..CompanionConfig::default()
    };

    match cli.command {
        Commands::Run {
            poll_ms,
            tick_ms,
            grace_polls,
            jump_tolerance,
            no_relay,
        } => {
            config.poll_interval = Duration::from_millis(poll_ms);
            config.tick_interval = Duration::from_millis(tick_ms);
            config.grace_polls = grace_polls;
            config.jump_tolerance_secs = jump_tolerance;
            config.relay = !no_relay;
            flowcue_lib::run(config).await?;
        }
        Commands::Settings { command } => {
            let (store, _host) = flowcue_lib::open_store(&config)?;
            println!("{}", settings_command(&store, command)?);
        }
        Commands::Tasks { command } => {
            let (store, _host) = flowcue_lib::open_store(&config)?;
            println!("{}", task_command(&store, command)?);
        }
    }

    Ok(())
}
