//! Protobuf wire types for the raw-page cache
//!
//! Raw pages are stored as a single prost message so the body bytes are kept
//! verbatim next to the response metadata.
//!
//! ```rust,ignore
//! use prost::Message;
//! use scrapetree::proto::RawPage;
//!
//! let bytes = page.encode_to_vec();
//! let decoded = RawPage::decode(&bytes[..])?;
//! ```

/// A fetched page, as returned by the transport and stored in the raw cache
#[derive(Clone, PartialEq, prost::Message)]
pub struct RawPage {
    /// Final URL after redirects
    #[prost(string, tag = "1")]
    pub url: String,
    #[prost(uint32, tag = "2")]
    pub status: u32,
    #[prost(string, tag = "3")]
    pub content_type: String,
    #[prost(bytes = "vec", tag = "4")]
    pub body: Vec<u8>,
    #[prost(int64, tag = "5")]
    pub fetched_at_ms: i64,
}

impl RawPage {
    /// Body as text; invalid UTF-8 is replaced rather than rejected
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}
