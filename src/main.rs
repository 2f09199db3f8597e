use clap::Parser;
use std::path::PathBuf;

/// Session, authorization and rate-limit gates for a content site API.
#[derive(Parser)]
#[command(name = "sitegate", version)]
struct Args {
    /// Path to the TOML config file. Without it, defaults and SITEGATE_*
    /// environment variables are used.
    #[arg(short, long, env = "SITEGATE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    sitegate::lifecycle::startup::run(args.config).await?;
    Ok(())
}
