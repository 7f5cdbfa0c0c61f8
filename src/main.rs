mod cli;

use clap::Parser;
use cli::{CacheCommand, Cli, Commands, EntryArgs};
use prost::Message;
use scrapetree::cache::{CacheStore, Namespace};
use scrapetree::config::Config;
use scrapetree::proto::RawPage;
use scrapetree::{Context, template};
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render(args) => {
            let context = Context::try_from(serde_json::from_str::<serde_json::Value>(&args.context)?)
                .map_err(|other| format!("context must be a JSON object, got {other}"))?;
            println!("{}", template::render(&args.template, &context)?);
        }
        Commands::Cache(command) => {
            let config = load_config(cli.config)?;
            let cache = CacheStore::from_config(&config.cache)?;
            match command {
                CacheCommand::Get(entry) => cache_get(&cache, &entry).await?,
                CacheCommand::Invalidate(entry) => {
                    let removed = cache.invalidate(entry.namespace, &entry.key).await?;
                    if removed {
                        println!("removed {}/{}", entry.namespace, entry.key);
                    } else {
                        println!("no entry at {}/{}", entry.namespace, entry.key);
                    }
                }
            }
        }
        Commands::Config => {
            let config = load_config(cli.config)?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn load_config(path: Option<std::path::PathBuf>) -> Result<Config, BoxError> {
    let config = match path {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    Ok(config)
}

async fn cache_get(cache: &CacheStore, entry: &EntryArgs) -> Result<(), BoxError> {
    let Some(bytes) = cache.inspect(entry.namespace, &entry.key).await? else {
        return Err(format!("no entry at {}/{}", entry.namespace, entry.key).into());
    };

    match entry.namespace {
        Namespace::Processed => {
            let children: Vec<Context> = serde_json::from_slice(&bytes)?;
            println!("{}", serde_json::to_string_pretty(&children)?);
        }
        Namespace::Raw => {
            let page = RawPage::decode(bytes)?;
            println!("url: {}", page.url);
            println!("status: {}", page.status);
            println!("content-type: {}", page.content_type);
            println!("fetched-at-ms: {}", page.fetched_at_ms);
            println!();
            println!("{}", page.text());
        }
    }
    Ok(())
}
