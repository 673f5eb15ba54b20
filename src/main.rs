mod appinfo;
mod cli;
mod config;
mod daemon;
mod error;
mod launcher;
mod nxm;
mod protocol;
mod steam;
mod tinker;
mod vdf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = cli::run(cli).await {
        eprintln!("{e}");
        std::process::exit(e.exit_code());
    }
}
