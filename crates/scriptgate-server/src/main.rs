#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use clap::Parser;
use scriptgate_server::{cli::Cli, config::ServerConfig, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_format, cli.verbose);

    tracing::info!("Starting scriptgate");

    let config = ServerConfig::load(&cli)?;
    scriptgate_server::run(config).await
}
