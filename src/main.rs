// src/main.rs — patentscout entry point

use clap::Parser;

use patentscout::cli::{self, Cli};
use patentscout::infra::logger;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG overrides the --debug default
    logger::init_logging(logger::default_level(cli.debug));

    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Credentials may live in a .env file next to the working directory
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!("Ignoring .env: {}", e),
    }

    let config = cli.load_config()?;

    if cli.clear_cache {
        cli::cache::clear_cache(&config)?;
    }

    if let Some(ref query) = cli.query {
        cli::search::run_search(query, &config).await?;
    }

    if cli.show_cache {
        cli::cache::show_cache(&config)?;
    }

    Ok(())
}
