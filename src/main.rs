use clap::{Parser, Subcommand};
use anyhow::Result;
use dotenvy::dotenv;

mod config;
mod ingestion;
mod maintenance;
mod pipeline;
mod publish;
mod telemetry;
mod translate;
mod util;

#[derive(Parser)]
#[command(name = "wirefeed", about = "Wire stream to machine-translated RSS feed")]
struct Cli {
    /// Emit a single JSON envelope to stdout; logs go to stderr
    #[arg(global = true, long, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Subscribe to the live stream and publish stories as they arrive
    Stream(ingestion::StreamCmd),
    /// Run a captured stream file through the pipeline
    Replay(ingestion::ReplayCmd),
    /// Save the raw stream body to a file
    Capture(ingestion::CaptureCmd),
    /// Delete old files under the document root
    Purge(maintenance::purge::PurgeCmd),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    telemetry::config::set_json_mode(cli.json);

    let cfg = config::AppConfig::from_env()?;
    // stderr logging; RUST_LOG wins over FEED_VERBOSE, FEED_LOG_FORMAT=json switches format
    telemetry::config::init_tracing(cfg.verbose);

    match cli.command {
        Commands::Stream(args) => ingestion::run_stream(&cfg, args).await?,
        Commands::Replay(args) => ingestion::run_replay(&cfg, args).await?,
        Commands::Capture(args) => ingestion::run_capture(&cfg, args).await?,
        Commands::Purge(args) => maintenance::purge::run(&cfg.feed, args)?,
    }

    Ok(())
}
