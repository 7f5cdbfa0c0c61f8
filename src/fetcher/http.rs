//! reqwest-backed transport

use async_trait::async_trait;
use encoding_rs::{Encoding, UTF_8};
use reqwest::{Client, Response, header};
use std::collections::HashMap;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::debug;

use super::{FetchError, HttpOptions, Result, Transport};
use crate::proto::RawPage;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_REDIRECTS: usize = 10;

/// Client-level settings; everything else is applied per request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ClientKey {
    decompress: bool,
    socket_timeout: Duration,
}

impl From<&HttpOptions> for ClientKey {
    fn from(options: &HttpOptions) -> Self {
        Self {
            decompress: options.decompress,
            socket_timeout: options.socket_timeout,
        }
    }
}

/// HTTP transport
///
/// Response decompression and the socket (read) timeout are client-level
/// settings in reqwest, so one client is built per distinct combination and
/// reused for every request asking for it.
pub struct HttpTransport {
    clients: RwLock<HashMap<ClientKey, Client>>,
}

impl HttpTransport {
    /// Builds the client for the default options up front, so a broken TLS
    /// setup surfaces at construction rather than on the first fetch
    pub fn new() -> Result<Self> {
        let key = ClientKey::from(&HttpOptions::default());
        let clients = HashMap::from([(key, build_client(key)?)]);
        Ok(Self {
            clients: RwLock::new(clients),
        })
    }

    async fn client(&self, options: &HttpOptions) -> Result<Client> {
        let key = ClientKey::from(options);
        if let Some(client) = self.clients.read().await.get(&key) {
            return Ok(client.clone());
        }

        let mut clients = self.clients.write().await;
        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }
        debug!(
            decompress = key.decompress,
            socket_timeout = ?key.socket_timeout,
            "Building HTTP client"
        );
        let client = build_client(key)?;
        clients.insert(key, client.clone());
        Ok(client)
    }
}

fn build_client(key: ClientKey) -> Result<Client> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .read_timeout(key.socket_timeout)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .gzip(key.decompress)
        .brotli(key.decompress)
        .deflate(key.decompress)
        .build()
        .map_err(|e| FetchError::RequestFailed(e.to_string()))
}

fn map_send_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if e.is_redirect() {
        FetchError::TooManyRedirects
    } else if e.is_builder() {
        FetchError::InvalidUrl(e.to_string())
    } else {
        FetchError::RequestFailed(e.to_string())
    }
}

/// Whether the body should go through charset decoding
fn is_textual(content_type: &str) -> bool {
    let Ok(media_type) = content_type.parse::<mime::Mime>() else {
        return false;
    };
    media_type.type_() == mime::TEXT
        || media_type.subtype() == mime::HTML
        || media_type.suffix() == Some(mime::XML)
        || media_type.subtype() == mime::XML
        || media_type.get_param(mime::CHARSET).is_some()
}

/// Re-encodes a body as UTF-8 from its declared charset, UTF-8 by default
fn decode_charset(body: &[u8], content_type: &str) -> Vec<u8> {
    let encoding = content_type
        .parse::<mime::Mime>()
        .ok()
        .and_then(|media_type| {
            media_type
                .get_param(mime::CHARSET)
                .and_then(|charset| Encoding::for_label(charset.as_str().as_bytes()))
        })
        .unwrap_or(UTF_8);

    let (text, _, _) = encoding.decode(body);
    text.into_owned().into_bytes()
}

fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Reads the body chunk by chunk, giving up as soon as it passes the limit
async fn read_body(mut response: Response, content_type: &str, options: &HttpOptions) -> Result<Vec<u8>> {
    let limit = options.max_body_bytes;
    let read_err = |e: reqwest::Error| {
        if e.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::RequestFailed(format!("Failed to read body: {}", e))
        }
    };

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(read_err)? {
        if (body.len() + chunk.len()) as u64 > limit {
            return Err(FetchError::TooLarge { limit });
        }
        body.extend_from_slice(&chunk);
    }

    if options.decode_charset && is_textual(content_type) {
        Ok(decode_charset(&body, content_type))
    } else {
        Ok(body)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, options: &HttpOptions) -> Result<RawPage> {
        debug!(url, "Starting fetch");

        let parsed = reqwest::Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;

        let mut request = self
            .client(options)
            .await?
            .get(parsed)
            .header(header::USER_AGENT, &options.user_agent);

        for (name, value) in &options.headers {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(map_send_error)?;

        let status = response.status();
        let final_url = response.url().to_string();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: final_url,
                status: status.as_u16(),
            });
        }

        if response
            .content_length()
            .is_some_and(|length| length > options.max_body_bytes)
        {
            return Err(FetchError::TooLarge {
                limit: options.max_body_bytes,
            });
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let body = read_body(response, &content_type, options).await?;
        debug!(url, size = body.len(), "Fetch completed");

        Ok(RawPage {
            url: final_url,
            status: u32::from(status.as_u16()),
            content_type,
            body,
            fetched_at_ms: now_ms(),
        })
    }
}
