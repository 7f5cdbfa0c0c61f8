//! Seed parsing
//!
//! A seed is either a single JSON object or an array of objects.

use serde_json::Value;
use std::path::Path;

use super::ScrapeError;
use crate::context::Context;

pub fn from_json(input: &str) -> Result<Vec<Context>, ScrapeError> {
    let value: Value =
        serde_json::from_str(input).map_err(|e| ScrapeError::Seed(e.to_string()))?;
    from_value(value)
}

pub fn from_value(value: Value) -> Result<Vec<Context>, ScrapeError> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| {
                Context::try_from(item).map_err(|other| {
                    ScrapeError::Seed(format!("entry {idx} is not an object: {other}"))
                })
            })
            .collect(),
        other => Context::try_from(other)
            .map(|ctx| vec![ctx])
            .map_err(|other| ScrapeError::Seed(format!("expected an object or array, got {other}"))),
    }
}

pub fn from_file(path: impl AsRef<Path>) -> Result<Vec<Context>, ScrapeError> {
    let path = path.as_ref();
    let input = std::fs::read_to_string(path)
        .map_err(|e| ScrapeError::Seed(format!("{}: {}", path.display(), e)))?;
    from_json(&input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_object() {
        let seed = from_json(r#"{"url": "https://a/", "processor": "p"}"#).unwrap();
        assert_eq!(seed.len(), 1);
        assert_eq!(seed[0].processor(), Some("p"));
    }

    #[test]
    fn test_array_keeps_order() {
        let seed = from_json(r#"[{"n": 1}, {"n": 2}]"#).unwrap();
        assert_eq!(seed.len(), 2);
        assert_eq!(seed[1].get("n"), Some(&serde_json::json!(2)));
    }

    #[test]
    fn test_rejects_non_objects() {
        assert!(matches!(from_json("[1]"), Err(ScrapeError::Seed(_))));
        assert!(matches!(from_json("\"x\""), Err(ScrapeError::Seed(_))));
        assert!(matches!(from_json("{"), Err(ScrapeError::Seed(_))));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("seed.json");
        std::fs::write(&path, r#"[{"a": 1}]"#).unwrap();

        assert_eq!(from_file(&path).unwrap().len(), 1);
        assert!(from_file(dir.path().join("missing.json")).is_err());
    }
}
