use std::io::Cursor;

use chunkstore_s3::{
    listing,
    transport::{HttpSession, Request, Response, TransportError},
};
use log::Level;
use parking_lot::Mutex;
use url::Url;

/// Responds to listing requests with `pages` in turn.
struct PagedSession {
    pages: Mutex<Vec<&'static str>>,
    markers: Mutex<Vec<Option<String>>>,
}

impl PagedSession {
    fn new(mut pages: Vec<&'static str>) -> Self {
        pages.reverse();
        Self {
            pages: Mutex::new(pages),
            markers: Mutex::default(),
        }
    }
}

impl HttpSession for PagedSession {
    fn send(&self, request: &Request) -> Result<Response, TransportError> {
        let marker = request
            .url()
            .query_pairs()
            .find(|(key, _)| key == "marker")
            .map(|(_, value)| value.into_owned());
        self.markers.lock().push(marker);
        let page = self.pages.lock().pop().unwrap_or_default();
        Ok(Response::new(
            request.method(),
            request.url().clone(),
            200,
            Cursor::new(page),
        ))
    }
}

const TRUNCATED_EMPTY: &str = r#"<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
    <IsTruncated>true</IsTruncated>
</ListBucketResult>"#;

const TRUNCATED_NEXT_MARKER: &str = r#"<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
    <IsTruncated>true</IsTruncated>
    <NextMarker>array/00001.npy</NextMarker>
    <Contents><Key>array/00000.npy</Key></Contents>
</ListBucketResult>"#;

const TRUNCATED: &str = r#"<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
    <IsTruncated>true</IsTruncated>
    <Contents><Key>array/00002.npy</Key></Contents>
    <Contents><Key>array/00003.npy</Key></Contents>
</ListBucketResult>"#;

const LAST: &str = r#"<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
    <IsTruncated>false</IsTruncated>
    <Contents><Key>array/00004.npy</Key></Contents>
</ListBucketResult>"#;

fn bucket_url() -> Url {
    Url::parse("http://s3.mock:9000/bucket").unwrap()
}

#[test]
fn list_truncated_without_keys_warns() {
    testing_logger::setup();
    let session = PagedSession::new(vec![TRUNCATED_EMPTY, LAST]);
    let keys = listing::list_keys(&session, &bucket_url(), "array/", 1000).unwrap();
    assert!(keys.is_empty());
    assert_eq!(*session.markers.lock(), vec![None]);

    testing_logger::validate(|captured_logs| {
        let warnings: Vec<_> = captured_logs
            .iter()
            .filter(|log| log.level == Level::Warn)
            .collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(
            warnings[0].body,
            "Listing of http://s3.mock:9000/bucket with prefix \"array/\" had no keys but was marked as truncated"
        );
    });
}

#[test]
fn list_truncated_markers() {
    let session = PagedSession::new(vec![TRUNCATED_NEXT_MARKER, TRUNCATED, LAST]);
    let keys = listing::list_keys(&session, &bucket_url(), "array/", 2).unwrap();
    assert_eq!(
        keys,
        vec![
            "array/00000.npy",
            "array/00002.npy",
            "array/00003.npy",
            "array/00004.npy"
        ]
    );
    // The NextMarker if present, otherwise the last key
    assert_eq!(
        *session.markers.lock(),
        vec![
            None,
            Some("array/00001.npy".to_string()),
            Some("array/00003.npy".to_string())
        ]
    );
}

#[test]
fn list_truncated_page_without_keys_after_keys() {
    testing_logger::setup();
    let session = PagedSession::new(vec![TRUNCATED, TRUNCATED_EMPTY, LAST]);
    let keys = listing::list_keys(&session, &bucket_url(), "array/", 2).unwrap();
    assert_eq!(keys, vec!["array/00002.npy", "array/00003.npy"]);
    assert_eq!(session.markers.lock().len(), 2);
    testing_logger::validate(|captured_logs| {
        assert_eq!(
            captured_logs
                .iter()
                .filter(|log| log.level == Level::Warn)
                .count(),
            1
        );
    });
}

#[test]
fn list_malformed_document() {
    let session = PagedSession::new(vec!["<ListBucketResult>"]);
    let error = listing::list_keys(&session, &bucket_url(), "array/", 2).unwrap_err();
    assert!(matches!(error, chunkstore_s3::S3Error::Listing(_)));
    let error_map = chunkstore_s3::s3_error_map();
    assert_eq!(
        error_map.translate(error, None).kind(),
        Some(chunkstore::ErrorKind::StoreUnavailable)
    );
}
