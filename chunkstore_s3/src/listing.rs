//! Paginated listing of the keys in a bucket.
//!
//! A listing request returns at most `max-keys` keys.
//! A truncated page is continued with a `marker`: the `NextMarker` of the page if present,
//! otherwise the last key received so far.

use url::Url;

use crate::{
    error::S3Error,
    transport::{HttpSession, Method, Request},
};

/// The XML namespace of S3 listing documents.
pub const S3_NAMESPACE: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

/// One page of a bucket listing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListingPage {
    /// The keys, in document order.
    pub keys: Vec<String>,
    /// Whether more keys follow.
    pub is_truncated: bool,
    /// The marker of the next page, if supplied.
    pub next_marker: Option<String>,
}

impl ListingPage {
    /// Parse a `ListBucketResult` document.
    ///
    /// # Errors
    /// Returns [`S3Error::Listing`] if `xml` is not a well-formed XML document.
    pub fn parse(xml: &str) -> Result<Self, S3Error> {
        let document = roxmltree::Document::parse(xml)?;
        let root = document.root_element();
        let keys = root
            .descendants()
            .filter(|node| node.has_tag_name((S3_NAMESPACE, "Key")))
            .map(|node| node.text().unwrap_or_default().to_string())
            .collect();
        let child_text = |name: &str| {
            root.children()
                .find(|node| node.has_tag_name((S3_NAMESPACE, name)))
                .and_then(|node| node.text())
        };
        let is_truncated = child_text("IsTruncated").is_some_and(|text| text.trim() == "true");
        let next_marker = child_text("NextMarker")
            .filter(|marker| !marker.is_empty())
            .map(str::to_string);
        Ok(Self {
            keys,
            is_truncated,
            next_marker,
        })
    }
}

/// List all keys starting with `prefix` in the bucket at `bucket_url`, in the order received.
///
/// A page that is truncated but has neither keys nor a `NextMarker` cannot be continued:
/// a warning is logged and the keys received so far are returned.
///
/// # Errors
/// Returns an [`S3Error`] if a request fails or a page cannot be parsed.
pub fn list_keys<S: HttpSession + ?Sized>(
    session: &S,
    bucket_url: &Url,
    prefix: &str,
    max_keys: usize,
) -> Result<Vec<String>, S3Error> {
    let max_keys = max_keys.to_string();
    let mut keys: Vec<String> = Vec::new();
    let mut marker: Option<String> = None;
    loop {
        let mut request = Request::new(Method::Get, bucket_url.clone())
            .with_query("prefix", prefix)
            .with_query("max-keys", &max_keys);
        if let Some(marker) = &marker {
            request = request.with_query("marker", marker);
        }
        let body = session.send(&request)?.error_for_status()?.bytes()?;
        let xml = std::str::from_utf8(&body).map_err(|_| S3Error::ListingEncoding)?;
        let page = ListingPage::parse(xml)?;
        log::debug!(
            "listing {bucket_url} with prefix {prefix:?} returned {} key(s), truncated: {}",
            page.keys.len(),
            page.is_truncated
        );

        let page_is_empty = page.keys.is_empty();
        keys.extend(page.keys);
        if !page.is_truncated {
            break;
        }
        marker = match (page.next_marker, keys.last()) {
            (Some(next_marker), _) => Some(next_marker),
            (None, Some(last_key)) if !page_is_empty => Some(last_key.clone()),
            _ => {
                log::warn!(
                    "Listing of {bucket_url} with prefix {prefix:?} had no keys but was marked as truncated"
                );
                break;
            }
        };
    }
    Ok(keys)
}
