use clap::{Parser, Subcommand};
use scrapetree::cache::Namespace;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "scrapetree")]
#[command(about = "scrapetree cache and template tooling", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to $SCRAPETREE_CONFIG or config/scrapetree.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render a cache-key template against a JSON context
    Render(RenderArgs),
    /// Inspect or invalidate cache entries
    #[command(subcommand)]
    Cache(CacheCommand),
    /// Print the effective configuration as TOML
    Config,
}

#[derive(clap::Args, Debug)]
pub struct RenderArgs {
    #[arg(long)]
    pub template: String,

    /// JSON object, e.g. '{"name": "nick"}'
    #[arg(long)]
    pub context: String,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Print a cached entry
    Get(EntryArgs),
    /// Delete a cached entry
    Invalidate(EntryArgs),
}

#[derive(clap::Args, Debug)]
pub struct EntryArgs {
    /// `raw` or `processed`
    pub namespace: Namespace,
    pub key: String,
}
