//! Structural scraping over a tree of pages
//!
//! Handlers turn a fetched page into child contexts; the [`engine`] walks
//! the resulting tree depth-first and yields the leaves. Every expansion is
//! cached under a key rendered from the context, so an interrupted or
//! repeated scrape replays from the cache instead of the network.

pub mod cache;
pub mod config;
pub mod context;
pub mod engine;
pub mod fetcher;
pub mod handlers;
pub mod humanize;
pub mod observability;
pub mod proto;
pub mod template;

pub use context::{Context, TerminalRule};
pub use engine::{ExpansionFailure, Run, ScrapeError, Scraper, scrape};
pub use handlers::{Document, HandlerRegistry};
