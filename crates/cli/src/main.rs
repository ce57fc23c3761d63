use clap::{Parser, Subcommand};

mod commands;

use commands::{ActiveCampaignsArgs, DaemonArgs, HistoryArgs, RunOnceArgs};

#[derive(Parser)]
#[command(name = "undercut")]
#[command(about = "Keeps TrafficJunky bids just under the best competing bid", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true, default_value = undercut_core::config_loader::DEFAULT_CONFIG_PATH)]
    config: String,

    /// Optional log file path (logs to file instead of stderr)
    #[arg(long, global = true)]
    log_file: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine once and print the bid updates
    RunOnce(RunOnceArgs),
    /// Run the engine on the schedule in the state file until Ctrl-C
    Daemon(DaemonArgs),
    /// Sign in and list the campaigns the dashboard reports as active
    ActiveCampaigns(ActiveCampaignsArgs),
    /// Show the most recent bid updates from the update log
    History(HistoryArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match &cli.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }

    match cli.command {
        Commands::RunOnce(args) => commands::run_run_once(args, &cli.config).await?,
        Commands::Daemon(args) => commands::run_daemon(args, &cli.config).await?,
        Commands::ActiveCampaigns(args) => {
            commands::run_active_campaigns(args, &cli.config).await?;
        }
        Commands::History(args) => commands::run_history(&args)?,
    }

    Ok(())
}
