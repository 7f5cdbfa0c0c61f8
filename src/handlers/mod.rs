//! Handler system
//!
//! A handler turns one fetched page into the child contexts found on it.
//!
//! ## Key Components
//!
//! - [`Processor`] - trait implemented by page-processing logic
//! - [`Handler`] - identifier, cache-key template, processor and fetch options
//! - [`HandlerRegistry`] - read-only map of identifier to handler during a run
//! - [`HandlerOutput`] - one child or many, normalized to a list
//! - [`Document`] - the parsed page handed to processors
//!
//! ## Example
//!
//! ```rust,ignore
//! use scrapetree::handlers::{HandlerRegistry, HandlerError};
//! use scrapetree::context::Context;
//!
//! let mut registry = HandlerRegistry::new();
//! registry.register_fn("people", "people/:id", |doc, _ctx| {
//!     let names = doc.select_text("h1")?;
//!     Ok::<_, HandlerError>(Context::new().with("name", names.join(" ")))
//! })?;
//! ```

mod document;
mod registry;
mod traits;
pub(crate) mod types;

pub use document::Document;
pub use registry::{Handler, HandlerRegistry, RegistryError};
pub use traits::{FnProcessor, HandlerError, Processor};
pub use types::{FetchOptions, HandlerOutput, HeadersMap};
