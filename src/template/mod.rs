//! Cache-key templates
//!
//! A template such as `mysite/:surname/:name` is rendered against a context
//! by replacing every `:field` placeholder with that field's value. Field
//! names use lower-case letters, digits and dashes.
//!
//! Rendered keys are the only identity the cache knows about. Two contexts
//! rendering the same key are treated as the same unit of work, so a
//! template must mention every field that distinguishes one page from
//! another.

use std::fmt;
use thiserror::Error;

use crate::context::Context;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("template '{template}' references missing field '{field}'")]
    MissingField { field: String, template: String },

    #[error("malformed placeholder at byte {position} in template '{template}'")]
    Malformed { template: String, position: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

fn is_field_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            if c != ':' {
                literal.push(c);
                continue;
            }

            match chars.peek() {
                Some(&(_, next)) if is_field_char(next) => {
                    let mut field = String::new();
                    while let Some(&(_, next)) = chars.peek() {
                        if !is_field_char(next) {
                            break;
                        }
                        field.push(next);
                        chars.next();
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(field));
                }
                Some(&(_, next)) if next.is_ascii_uppercase() || next == '_' => {
                    return Err(TemplateError::Malformed {
                        template: source.to_string(),
                        position: pos,
                    });
                }
                // `http://` and friends
                _ => literal.push(c),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn render(&self, context: &Context) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(field) => {
                    let value = context.key_part(field).ok_or_else(|| {
                        TemplateError::MissingField {
                            field: field.clone(),
                            template: self.source.clone(),
                        }
                    })?;
                    out.push_str(&value);
                }
            }
        }
        Ok(out)
    }

    /// Field names referenced by the template, in order of appearance
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Field(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Parse and render in one step
pub fn render(template: &str, context: &Context) -> Result<String, TemplateError> {
    Template::parse(template)?.render(context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_example() {
        let ctx = Context::new().with("name", "John").with("surname", "Doe");
        assert_eq!(render("mysite/:surname/:name", &ctx).unwrap(), "mysite/Doe/John");
    }

    #[test]
    fn test_missing_field() {
        let ctx = Context::new().with("name", "John");
        let err = render("mysite/:surname/:name", &ctx).unwrap_err();
        assert_eq!(
            err,
            TemplateError::MissingField {
                field: "surname".to_string(),
                template: "mysite/:surname/:name".to_string(),
            }
        );
    }

    #[test]
    fn test_dashes_and_digits() {
        let ctx = Context::new().with("page-2", 7).with("id", "x");
        assert_eq!(render("p/:page-2.:id", &ctx).unwrap(), "p/7.x");
    }

    #[test]
    fn test_literal_colons() {
        let ctx = Context::new().with("host", "example.com");
        assert_eq!(render("http://:host:", &ctx).unwrap(), "http://example.com:");
    }

    #[test]
    fn test_malformed_placeholder() {
        let err = Template::parse("site/:Name").unwrap_err();
        assert!(matches!(err, TemplateError::Malformed { position: 5, .. }));

        assert!(matches!(
            Template::parse("site/:_id"),
            Err(TemplateError::Malformed { .. })
        ));
    }

    #[test]
    fn test_no_placeholders() {
        let tpl = Template::parse("static/key").unwrap();
        assert_eq!(tpl.fields().count(), 0);
        assert_eq!(tpl.render(&Context::new()).unwrap(), "static/key");
    }

    #[test]
    fn test_fields_listed_in_order() {
        let tpl = Template::parse(":b/:a/:b").unwrap();
        assert_eq!(tpl.fields().collect::<Vec<_>>(), vec!["b", "a", "b"]);
    }
}
