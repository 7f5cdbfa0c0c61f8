use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::traits::HandlerError;
use crate::proto::RawPage;

/// A fetched page parsed into a queryable HTML tree
///
/// Holds the final URL of the page so relative links can be resolved.
pub struct Document {
    url: String,
    body: String,
    html: Html,
}

impl Document {
    pub fn parse(url: impl Into<String>, body: impl Into<String>) -> Self {
        let body = body.into();
        let html = Html::parse_document(&body);
        Self {
            url: url.into(),
            body,
            html,
        }
    }

    pub fn from_page(page: &RawPage) -> Self {
        Self::parse(page.url.clone(), page.text().into_owned())
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Raw body text
    pub fn text(&self) -> &str {
        &self.body
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    pub fn select(&self, css: &str) -> Result<Vec<ElementRef<'_>>, HandlerError> {
        let selector = Selector::parse(css).map_err(|e| HandlerError::Selector {
            selector: css.to_string(),
            reason: e.to_string(),
        })?;
        Ok(self.html.select(&selector).collect())
    }

    /// Trimmed text content of every match
    pub fn select_text(&self, css: &str) -> Result<Vec<String>, HandlerError> {
        Ok(self
            .select(css)?
            .into_iter()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .collect())
    }

    /// Attribute value of every match that carries it
    pub fn select_attr(&self, css: &str, attr: &str) -> Result<Vec<String>, HandlerError> {
        Ok(self
            .select(css)?
            .into_iter()
            .filter_map(|el| el.value().attr(attr).map(str::to_string))
            .collect())
    }

    /// Resolves a possibly-relative link against the page URL
    pub fn resolve_url(&self, href: &str) -> Option<String> {
        match Url::parse(href) {
            Ok(url) => Some(url.to_string()),
            Err(_) => Url::parse(&self.url)
                .ok()?
                .join(href)
                .ok()
                .map(|url| url.to_string()),
        }
    }
}
