use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use super::document::Document;
use super::traits::{FnProcessor, HandlerError, Processor};
use super::types::{FetchOptions, HandlerOutput};
use crate::context::Context;
use crate::template::{Template, TemplateError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("handler not found: {0}")]
    NotFound(String),
    #[error("handler already registered: {0}")]
    Duplicate(String),
    #[error("handler '{id}' has an invalid cache-key template: {source}")]
    Template {
        id: String,
        #[source]
        source: TemplateError,
    },
}

/// A registered unit of work
pub struct Handler {
    id: String,
    template: Template,
    processor: Arc<dyn Processor>,
    options: FetchOptions,
}

impl Handler {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    pub fn cache_key(&self, ctx: &Context) -> Result<String, TemplateError> {
        self.template.render(ctx)
    }

    /// Runs the processor and normalizes its output to a child list
    pub fn process(&self, doc: &Document, ctx: &Context) -> Result<Vec<Context>, HandlerError> {
        self.processor.process(doc, ctx).map(HandlerOutput::into_children)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("id", &self.id)
            .field("template", &self.template.as_str())
            .field("options", &self.options)
            .finish()
    }
}

/// Registry mapping handler identifiers to handlers
///
/// Populated once at startup, then shared read-only (behind `Arc`) by every
/// worker of a run.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<String, Arc<Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        id: impl Into<String>,
        template: &str,
        processor: Arc<dyn Processor>,
        options: FetchOptions,
    ) -> Result<(), RegistryError> {
        let id = id.into();
        if self.handlers.contains_key(&id) {
            return Err(RegistryError::Duplicate(id));
        }

        let template = Template::parse(template).map_err(|source| RegistryError::Template {
            id: id.clone(),
            source,
        })?;

        let handler = Handler {
            id: id.clone(),
            template,
            processor,
            options,
        };
        self.handlers.insert(id, Arc::new(handler));
        Ok(())
    }

    /// Registers a closure with default fetch options
    pub fn register_fn<F, O>(
        &mut self,
        id: impl Into<String>,
        template: &str,
        process: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(&Document, &Context) -> Result<O, HandlerError> + Send + Sync + 'static,
        O: Into<HandlerOutput> + 'static,
    {
        self.register(id, template, Arc::new(FnProcessor(process)), FetchOptions::default())
    }

    pub fn resolve(&self, id: &str) -> Result<Arc<Handler>, RegistryError> {
        self.handlers
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.handlers.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
