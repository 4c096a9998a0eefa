// src/cli/mod.rs — CLI definition (clap derive)

pub mod cache;
pub mod progress;
pub mod search;

use clap::Parser;
use std::path::PathBuf;

use crate::infra::config::Config;

#[derive(Parser, Debug)]
#[command(
    name = "patentscout",
    about = "Patent search with LLM query refinement",
    version
)]
pub struct Cli {
    /// Search query for patents
    #[arg(short, long, required_unless_present_any = ["show_cache", "clear_cache"])]
    pub query: Option<String>,

    /// Rewrite the query between iterations until the results satisfy it
    #[arg(long)]
    pub optimize: bool,

    /// Number of results to retrieve per search [default: 100]
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
    pub results: Option<u32>,

    /// Maximum number of search iterations [default: 3]
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
    pub iterations: Option<u32>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// List cached patents (after the search, if a query is given)
    #[arg(long)]
    pub show_cache: bool,

    /// Remove all cached patents
    #[arg(long)]
    pub clear_cache: bool,

    /// Config file path
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Overlay command-line flags onto the loaded config.
    pub fn apply(&self, config: &mut Config) {
        if let Some(n) = self.results {
            config.search.max_results = n;
        }
        if let Some(n) = self.iterations {
            config.iteration.max_iterations = n;
        }
        if self.optimize {
            config.iteration.optimize = true;
        }
    }

    /// Load the config named by `--config`, or the default one.
    pub fn load_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };
        self.apply(&mut config);
        Ok(config)
    }
}
