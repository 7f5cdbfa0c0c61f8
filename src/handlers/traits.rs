use thiserror::Error;

use super::document::Document;
use super::types::HandlerOutput;
use crate::context::Context;

/// Handler errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    #[error("invalid selector '{selector}': {reason}")]
    Selector { selector: String, reason: String },
    #[error("unexpected document structure: {0}")]
    UnexpectedStructure(String),
    #[error("invalid handler output: {0}")]
    InvalidOutput(String),
    #[error("handler failed: {0}")]
    Failed(String),
}

/// Page processing logic behind a registered handler
///
/// Given the parsed page and the context that led to it, returns the new
/// fields of each child. Merging with the parent context is done by the
/// engine, so implementations return only what they found on the page.
///
/// Processing is synchronous: the page is already fetched and parsed.
pub trait Processor: Send + Sync {
    fn process(&self, doc: &Document, ctx: &Context) -> Result<HandlerOutput, HandlerError>;
}

/// Adapter turning a closure into a [`Processor`]
pub struct FnProcessor<F>(pub F);

impl<F, O> Processor for FnProcessor<F>
where
    F: Fn(&Document, &Context) -> Result<O, HandlerError> + Send + Sync,
    O: Into<HandlerOutput>,
{
    fn process(&self, doc: &Document, ctx: &Context) -> Result<HandlerOutput, HandlerError> {
        (self.0)(doc, ctx).map(Into::into)
    }
}
