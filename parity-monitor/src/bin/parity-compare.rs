use clap::Parser;
use envconfig::Envconfig;
use eyre::{bail, Result};

use parity_monitor::config::{CommaSeparated, Config};
use parity_monitor::server::build_scheduler;
use parity_monitor::targets::read_targets_file;

/// Compare message histories for the given teams and channels once, then print the results.
///
/// Endpoints, thresholds and the time window are read from the same environment as the service.
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Comma separated team ids; every configured channel prefix is compared for each
    #[arg(long)]
    team_ids: Option<CommaSeparated>,

    /// Comma separated channel ids, compared as-is
    #[arg(long)]
    channel_ids: Option<CommaSeparated>,

    /// JSON file holding a team id array or a `{teamIds, channelIds}` object
    #[arg(long, conflicts_with_all = ["team_ids", "channel_ids"])]
    file: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing::Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::init_from_env()?;

    let (team_ids, channel_ids) = match cli.file {
        Some(path) => {
            let targets = read_targets_file(&path).await?;
            (targets.team_ids, targets.channel_ids)
        }
        None => (
            cli.team_ids.map(|ids| ids.0),
            cli.channel_ids.map(|ids| ids.0),
        ),
    };

    if team_ids.is_none() && channel_ids.is_none() {
        bail!("pass --team-ids, --channel-ids or --file");
    }

    let scheduler = build_scheduler(&config).await;
    let run = scheduler
        .run_manual_comparison(team_ids.as_deref(), channel_ids.as_deref())
        .await?;

    println!("{}", serde_json::to_string_pretty(&run.results)?);

    Ok(())
}
