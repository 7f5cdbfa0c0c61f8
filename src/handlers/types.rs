use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use super::traits::HandlerError;
use crate::context::Context;

pub type HeadersMap = BTreeMap<String, String>;

/// What a processor hands back: one child or an ordered sequence of them
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutput {
    One(Context),
    Many(Vec<Context>),
}

impl HandlerOutput {
    /// Ordered child contexts; a single context becomes a one-element list
    pub fn into_children(self) -> Vec<Context> {
        match self {
            HandlerOutput::One(ctx) => vec![ctx],
            HandlerOutput::Many(children) => children,
        }
    }

    /// Accepts an object or an array made only of objects.
    ///
    /// Normalization is top-level only: scalars, nested arrays and arrays
    /// mixing objects with other values are rejected.
    pub fn from_value(value: Value) -> Result<Self, HandlerError> {
        match value {
            Value::Object(map) => Ok(HandlerOutput::One(map.into())),
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(idx, item)| {
                    Context::try_from(item).map_err(|other| {
                        HandlerError::InvalidOutput(format!(
                            "element {idx} is not an object: {other}"
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(HandlerOutput::Many),
            other => Err(HandlerError::InvalidOutput(format!(
                "expected an object or an array of objects, got {other}"
            ))),
        }
    }
}

impl From<Context> for HandlerOutput {
    fn from(ctx: Context) -> Self {
        HandlerOutput::One(ctx)
    }
}

impl From<Vec<Context>> for HandlerOutput {
    fn from(children: Vec<Context>) -> Self {
        HandlerOutput::Many(children)
    }
}

impl From<Option<Context>> for HandlerOutput {
    fn from(ctx: Option<Context>) -> Self {
        HandlerOutput::Many(ctx.into_iter().collect())
    }
}

/// Per-handler overrides of the run's HTTP options
#[derive(Debug, Clone, Default, PartialEq, Eq, bon::Builder)]
pub struct FetchOptions {
    pub socket_timeout: Option<Duration>,
    pub decompress: Option<bool>,
    pub decode_charset: Option<bool>,
    #[builder(into)]
    pub user_agent: Option<String>,
    pub max_body_bytes: Option<u64>,
    /// Extra request headers, added on top of the run-wide ones
    #[builder(default)]
    pub headers: HeadersMap,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_context_is_wrapped() {
        let ctx = Context::new().with("a", 1);
        let children = HandlerOutput::from(ctx.clone()).into_children();
        assert_eq!(children, vec![ctx]);
    }

    #[test]
    fn test_from_value_object() {
        let output = HandlerOutput::from_value(json!({"a": 1})).unwrap();
        assert_eq!(output.into_children().len(), 1);
    }

    #[test]
    fn test_from_value_array_keeps_order() {
        let output = HandlerOutput::from_value(json!([{"c": 3}, {"c": 4}])).unwrap();
        let children = output.into_children();
        assert_eq!(children[0].get("c"), Some(&json!(3)));
        assert_eq!(children[1].get("c"), Some(&json!(4)));
    }

    #[test]
    fn test_from_value_rejects_ambiguous_shapes() {
        assert!(HandlerOutput::from_value(json!("x")).is_err());
        assert!(HandlerOutput::from_value(json!([[{"a": 1}]])).is_err());
        assert!(matches!(
            HandlerOutput::from_value(json!([{"a": 1}, 2])),
            Err(HandlerError::InvalidOutput(_))
        ));
    }

    #[test]
    fn test_empty_output() {
        assert!(HandlerOutput::from(None).into_children().is_empty());
        assert!(HandlerOutput::from_value(json!([])).unwrap().into_children().is_empty());
    }

    #[test]
    fn test_fetch_options_builder() {
        let options = FetchOptions::builder()
            .socket_timeout(Duration::from_millis(250))
            .user_agent("bot/1.0")
            .build();

        assert_eq!(options.socket_timeout, Some(Duration::from_millis(250)));
        assert_eq!(options.user_agent.as_deref(), Some("bot/1.0"));
        assert!(options.headers.is_empty());
        assert_eq!(options.decompress, None);
    }
}
