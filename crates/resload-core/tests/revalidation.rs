//! Conditional-GET behaviour of the retrieval layer against a local server.

mod common;

use common::{MockServer, Reply};
use resload_core::{
    resolve, CacheEntry, Fetcher, LoadError, LoaderConfig, ResolvedReference, RevalidationCache,
};
use std::sync::Arc;
use std::time::Duration;

const LAST_MODIFIED: &str = "Mon, 01 Jan 2024 00:00:00 GMT";
const LAST_MODIFIED_2: &str = "Tue, 02 Jan 2024 00:00:00 GMT";

fn fetcher() -> Fetcher {
    Fetcher::new(&LoaderConfig::default()).unwrap()
}

#[tokio::test]
async fn first_fetch_is_unconditional_and_populates_cache() {
    let server = MockServer::start().await;
    server.push(Reply::ok("Text").etag("1").last_modified(LAST_MODIFIED));

    let cache = RevalidationCache::new();
    let reference = resolve("./file.txt", &server.base());
    let body = fetcher().fetch(&reference, &cache).await.unwrap();

    assert_eq!(body, "Text");
    server.done();
    let seen = server.seen();
    assert_eq!(seen[0].path, "/file.txt");
    assert_eq!(seen[0].if_none_match, None);
    assert_eq!(seen[0].if_modified_since, None);

    let entry = cache.get(reference.as_remote().unwrap()).unwrap();
    assert_eq!(
        entry,
        CacheEntry {
            etag: Some("1".to_string()),
            last_modified: Some(LAST_MODIFIED.to_string()),
            body: "Text".to_string(),
        }
    );
}

#[tokio::test]
async fn not_modified_serves_cached_body() {
    let server = MockServer::start().await;
    server.push(Reply::ok("Text").etag("1").last_modified(LAST_MODIFIED));
    server.push(Reply::not_modified());

    let cache = RevalidationCache::new();
    let fetcher = fetcher();
    let reference = resolve("./file.txt", &server.base());

    let first = fetcher.fetch(&reference, &cache).await.unwrap();
    let second = fetcher.fetch(&reference, &cache).await.unwrap();

    assert_eq!(first, "Text");
    assert_eq!(second, first);
    server.done();

    let seen = server.seen();
    assert_eq!(seen[1].if_none_match.as_deref(), Some("1"));
    assert_eq!(seen[1].if_modified_since.as_deref(), Some(LAST_MODIFIED));
}

#[tokio::test]
async fn modified_body_replaces_entry_and_later_revalidates_against_it() {
    let server = MockServer::start().await;
    server.push(Reply::ok("Text").etag("1").last_modified(LAST_MODIFIED));
    server.push(Reply::ok("Text2").etag("2").last_modified(LAST_MODIFIED_2));
    server.push(Reply::not_modified());

    let cache = RevalidationCache::new();
    let fetcher = fetcher();
    let reference = resolve("./file.txt", &server.base());

    assert_eq!(fetcher.fetch(&reference, &cache).await.unwrap(), "Text");
    let changed = fetcher.fetch(&reference, &cache).await.unwrap();
    let revalidated = fetcher.fetch(&reference, &cache).await.unwrap();

    assert_eq!(changed, "Text2");
    assert_eq!(revalidated, "Text2");
    server.done();

    let seen = server.seen();
    assert_eq!(seen[1].if_none_match.as_deref(), Some("1"));
    assert_eq!(seen[1].if_modified_since.as_deref(), Some(LAST_MODIFIED));
    assert_eq!(seen[2].if_none_match.as_deref(), Some("2"));
    assert_eq!(seen[2].if_modified_since.as_deref(), Some(LAST_MODIFIED_2));
}

#[tokio::test]
async fn only_known_validators_are_sent() {
    let server = MockServer::start().await;
    server.push(Reply::ok("Text").etag("\"abc\""));
    server.push(Reply::not_modified());

    let cache = RevalidationCache::new();
    let fetcher = fetcher();
    let url = server.url("/file.txt");
    let reference = ResolvedReference::Remote(url);

    fetcher.fetch(&reference, &cache).await.unwrap();
    fetcher.fetch(&reference, &cache).await.unwrap();

    let seen = server.seen();
    assert_eq!(seen[1].if_none_match.as_deref(), Some("\"abc\""));
    assert_eq!(seen[1].if_modified_since, None);
}

#[tokio::test]
async fn entry_without_validators_refetches_unconditionally() {
    let server = MockServer::start().await;
    server.push(Reply::ok("Text"));
    server.push(Reply::ok("Text"));

    let cache = RevalidationCache::new();
    let fetcher = fetcher();
    let reference = ResolvedReference::Remote(server.url("/plain.txt"));

    fetcher.fetch(&reference, &cache).await.unwrap();
    fetcher.fetch(&reference, &cache).await.unwrap();

    let seen = server.seen();
    assert_eq!(seen[1].if_none_match, None);
    assert_eq!(seen[1].if_modified_since, None);
}

#[tokio::test]
async fn forbidden_is_a_status_error_and_leaves_cache_alone() {
    let server = MockServer::start().await;
    server.push(Reply::ok("Text").etag("1"));
    server.push(Reply::status(403));

    let cache = RevalidationCache::new();
    let fetcher = fetcher();
    let reference = resolve("./file.txt", &server.base());

    fetcher.fetch(&reference, &cache).await.unwrap();
    let err = fetcher.fetch(&reference, &cache).await.unwrap_err();

    assert!(matches!(err, LoadError::HttpStatus { status: 403, .. }));
    let entry = cache.get(reference.as_remote().unwrap()).unwrap();
    assert_eq!(entry.body, "Text");
    assert_eq!(entry.etag.as_deref(), Some("1"));
}

#[tokio::test]
async fn server_error_is_a_status_error() {
    let server = MockServer::start().await;
    server.push(Reply::status(503));

    let cache = RevalidationCache::new();
    let err = fetcher()
        .fetch(&ResolvedReference::Remote(server.url("/file.txt")), &cache)
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(503));
    assert!(cache.is_empty());
}

#[tokio::test]
async fn not_modified_without_entry_is_a_cache_error() {
    let server = MockServer::start().await;
    server.push(Reply::not_modified());

    let cache = RevalidationCache::new();
    let err = fetcher()
        .fetch(&ResolvedReference::Remote(server.url("/file.txt")), &cache)
        .await
        .unwrap_err();

    assert!(matches!(err, LoadError::Cache { .. }));
}

#[tokio::test]
async fn charset_header_overrides_utf8_default() {
    let server = MockServer::start().await;
    // "café" in ISO-8859-1
    server.push(
        Reply::ok("")
            .bytes(vec![0x63, 0x61, 0x66, 0xE9])
            .content_type("text/plain; charset=iso-8859-1"),
    );

    let cache = RevalidationCache::new();
    let body = fetcher()
        .fetch(&ResolvedReference::Remote(server.url("/latin1.txt")), &cache)
        .await
        .unwrap();

    assert_eq!(body, "café");
}

#[tokio::test]
async fn connection_refused_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let cache = RevalidationCache::new();
    let err = fetcher()
        .fetch(
            &ResolvedReference::Remote(format!("http://{addr}/file.txt")),
            &cache,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, LoadError::Transport { .. }));
}

#[tokio::test]
async fn serialized_revalidation_gives_read_your_writes() {
    let server = MockServer::start().await;
    // The first reply is slow; the concurrent second request must wait for
    // it and then revalidate against its validators.
    server.push(
        Reply::ok("Text")
            .etag("1")
            .delay(Duration::from_millis(100)),
    );
    server.push(Reply::not_modified());

    let cache = Arc::new(RevalidationCache::new());
    let fetcher = fetcher();
    let reference = ResolvedReference::Remote(server.url("/file.txt"));

    let (a, b) = tokio::join!(
        fetcher.fetch(&reference, &cache),
        fetcher.fetch(&reference, &cache)
    );

    assert_eq!(a.unwrap(), "Text");
    assert_eq!(b.unwrap(), "Text");
    server.done();
    let seen = server.seen();
    assert_eq!(seen[0].if_none_match, None);
    assert_eq!(seen[1].if_none_match.as_deref(), Some("1"));
}

#[tokio::test]
async fn unserialized_concurrent_fetches_race_and_last_write_wins() {
    let server = MockServer::start().await;
    server.push(Reply::ok("Slow").etag("1").delay(Duration::from_millis(100)));
    server.push(Reply::ok("Fast").etag("2"));

    let config = LoaderConfig::default().with_serialize_revalidation(false);
    let fetcher = Fetcher::new(&config).unwrap();
    let cache = RevalidationCache::new();
    let reference = ResolvedReference::Remote(server.url("/file.txt"));

    let (a, b) = tokio::join!(
        fetcher.fetch(&reference, &cache),
        async {
            // Let the first request reach the server first.
            tokio::time::sleep(Duration::from_millis(20)).await;
            fetcher.fetch(&reference, &cache).await
        }
    );

    assert_eq!(a.unwrap(), "Slow");
    assert_eq!(b.unwrap(), "Fast");
    let seen = server.seen();
    // Neither request saw a cache entry.
    assert!(seen.iter().all(|s| s.if_none_match.is_none()));
    // The slow response was processed last, so it owns the entry.
    let entry = cache.get(reference.as_remote().unwrap()).unwrap();
    assert_eq!(entry.etag.as_deref(), Some("1"));
}
