//! Integration tests for springer-client
//!
//! These tests drive the full HTTP path against a local mock server:
//! pagination windows, retries, error mapping and cache reuse.

use mockito::{Matcher, Server, ServerGuard};
use springer_client::client::{ApiErrorKind, Origin};
use springer_client::config::{Directories, RequestSettings};
use springer_client::models::{MetadataRecords, OpenAccessDocument, OpenAccessRecords, RecordParser};
use springer_client::{
    Config, Error, Query, RefreshPolicy, RetrievalWarning, RetrieveOptions, SpringerClient,
};
use tempfile::TempDir;

const API_KEY: &str = "integration-test-key";

fn test_config(server: &ServerGuard, cache: &TempDir) -> Config {
    Config {
        base_url: server.url(),
        directories: Directories::under(cache.path()),
        requests: RequestSettings {
            timeout_secs: 5,
            retries: 2,
            backoff_factor: 0.0,
        },
        ..Config::default()
    }
    .with_api_key(API_KEY)
}

/// JSON page holding records `start..start + size`, capped at `total`
fn json_page(total: u64, start: u64, size: u64) -> String {
    let last = (start + size).saturating_sub(1).min(total);
    let records: Vec<serde_json::Value> = (start..=last)
        .map(|i| {
            serde_json::json!({
                "identifier": format!("doi:10.1000/{}", i),
                "doi": format!("10.1000/{}", i),
                "title": format!("Record {}", i),
            })
        })
        .collect();
    serde_json::json!({
        "result": [{ "total": total.to_string(), "start": start.to_string(), "pageLength": size.to_string() }],
        "records": records,
    })
    .to_string()
}

fn window(q: &str, start: u64, size: u64) -> Matcher {
    Matcher::AllOf(vec![
        Matcher::UrlEncoded("q".into(), q.into()),
        Matcher::UrlEncoded("s".into(), start.to_string()),
        Matcher::UrlEncoded("p".into(), size.to_string()),
        Matcher::UrlEncoded("api_key".into(), API_KEY.into()),
    ])
}

#[tokio::test]
async fn test_metadata_pagination_over_http() {
    let mut server = Server::new_async().await;
    let cache = TempDir::new().unwrap();

    let mut mocks = Vec::new();
    for (start, size) in [(1, 25), (26, 25), (51, 5)] {
        mocks.push(
            server
                .mock("GET", "/metadata/json")
                .match_query(window("graph theory", start, size))
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(json_page(500, start, size))
                .expect(1)
                .create_async()
                .await,
        );
    }

    let client = SpringerClient::new(test_config(&server, &cache)).unwrap();
    let retrieval = client
        .metadata(&Query::keyword("graph theory"), RetrieveOptions::default().count(55))
        .await
        .unwrap();

    for mock in &mocks {
        mock.assert_async().await;
    }
    assert!(retrieval.warnings.is_empty());

    let records = MetadataRecords::parse(&retrieval.envelope).unwrap();
    assert_eq!(records.len(), 55);
    assert_eq!(records[0].doi.as_deref(), Some("10.1000/1"));
    assert_eq!(records[54].doi.as_deref(), Some("10.1000/55"));
}

#[tokio::test]
async fn test_too_many_results_requested_over_http() {
    let mut server = Server::new_async().await;
    let cache = TempDir::new().unwrap();

    let first = server
        .mock("GET", "/meta/v2/json")
        .match_query(window("doi:10.1000/1", 1, 25))
        .with_status(200)
        .with_body(json_page(1, 1, 25))
        .expect(1)
        .create_async()
        .await;

    let client = SpringerClient::new(test_config(&server, &cache)).unwrap();
    let retrieval = client
        .meta(&Query::doi("10.1000/1"), RetrieveOptions::default().count(40))
        .await
        .unwrap();

    first.assert_async().await;
    assert_eq!(retrieval.envelope.record_count().unwrap(), 1);
    assert_eq!(
        retrieval.warnings,
        vec![RetrievalWarning::TooManyResultsRequested {
            found: 1,
            requested: 40
        }]
    );
}

#[tokio::test]
async fn test_cache_reuse_skips_network() {
    let mut server = Server::new_async().await;
    let cache = TempDir::new().unwrap();

    let mock = server
        .mock("GET", "/metadata/json")
        .match_query(window("cached", 1, 10))
        .with_status(200)
        .with_body(json_page(100, 1, 10))
        .expect(1)
        .create_async()
        .await;

    let client = SpringerClient::new(test_config(&server, &cache)).unwrap();
    let query = Query::keyword("cached");

    let first = client
        .metadata(&query, RetrieveOptions::default())
        .await
        .unwrap();
    let second = client
        .metadata(&query, RetrieveOptions::default())
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(first.envelope.origin(), Origin::Network);
    assert_eq!(second.envelope.origin(), Origin::Cache);
    assert_eq!(first.envelope.to_text(), second.envelope.to_text());
}

#[tokio::test]
async fn test_refresh_refetches() {
    let mut server = Server::new_async().await;
    let cache = TempDir::new().unwrap();

    let mock = server
        .mock("GET", "/metadata/json")
        .match_query(window("fresh", 1, 10))
        .with_status(200)
        .with_body(json_page(100, 1, 10))
        .expect(2)
        .create_async()
        .await;

    let client = SpringerClient::new(test_config(&server, &cache)).unwrap();
    let query = Query::keyword("fresh");
    let options = RetrieveOptions::default().refresh(RefreshPolicy::AlwaysFetchIfCached);

    client.metadata(&query, options).await.unwrap();
    client.metadata(&query, options).await.unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_rate_limit_retried_then_raised() {
    let mut server = Server::new_async().await;
    let cache = TempDir::new().unwrap();

    let mock = server
        .mock("GET", "/metadata/json")
        .match_query(Matcher::Any)
        .with_status(429)
        .expect(3)
        .create_async()
        .await;

    let client = SpringerClient::new(test_config(&server, &cache)).unwrap();
    let err = client
        .metadata(&Query::keyword("busy"), RetrieveOptions::default())
        .await
        .unwrap_err();

    mock.assert_async().await;
    assert_eq!(err.api_kind(), Some(ApiErrorKind::RateLimit));
}

#[tokio::test]
async fn test_authentication_errors_not_retried() {
    for status in [401u16, 403] {
        let mut server = Server::new_async().await;
        let cache = TempDir::new().unwrap();

        let mock = server
            .mock("GET", "/openaccess/jats")
            .match_query(Matcher::Any)
            .with_status(usize::from(status))
            .expect(1)
            .create_async()
            .await;

        let client = SpringerClient::new(test_config(&server, &cache)).unwrap();
        let err = client
            .open_access(&Query::keyword("secret"), RetrieveOptions::default())
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert_eq!(err.api_kind(), Some(ApiErrorKind::Authentication));
        match err {
            Error::Api(api) => assert_eq!(api.status, status),
            other => panic!("Expected API error, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_unclassified_status() {
    let mut server = Server::new_async().await;
    let cache = TempDir::new().unwrap();

    server
        .mock("GET", "/metadata/json")
        .match_query(Matcher::Any)
        .with_status(418)
        .create_async()
        .await;

    let client = SpringerClient::new(test_config(&server, &cache)).unwrap();
    let err = client
        .metadata(&Query::keyword("teapot"), RetrieveOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.api_kind(), Some(ApiErrorKind::Unclassified));
    assert!(err.to_string().contains("Unhandled error occurred"));
}

#[tokio::test]
async fn test_open_access_xml_merge() {
    let mut server = Server::new_async().await;
    let cache = TempDir::new().unwrap();

    let article = |i: u64| {
        format!(
            r#"<article><front><article-meta><article-id pub-id-type="doi">10.1000/{i}</article-id><title-group><article-title>Article {i}</article-title></title-group></article-meta></front></article>"#
        )
    };
    let page = |start: u64, end: u64| {
        let records: String = (start..=end).map(article).collect();
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><response><result><total>12</total></result><records>{}</records></response>",
            records
        )
    };

    let first = server
        .mock("GET", "/openaccess/jats")
        .match_query(window("eigenvalues", 1, 10))
        .with_status(200)
        .with_header("content-type", "application/xml")
        .with_body(page(1, 10))
        .expect(1)
        .create_async()
        .await;
    let second = server
        .mock("GET", "/openaccess/jats")
        .match_query(window("eigenvalues", 11, 2))
        .with_status(200)
        .with_header("content-type", "application/xml")
        .with_body(page(11, 12))
        .expect(1)
        .create_async()
        .await;

    let client = SpringerClient::new(test_config(&server, &cache)).unwrap();
    let retrieval = client
        .open_access(&Query::keyword("eigenvalues"), RetrieveOptions::default().count(12))
        .await
        .unwrap();

    first.assert_async().await;
    second.assert_async().await;

    let documents = OpenAccessRecords::parse(&retrieval.envelope).unwrap();
    assert_eq!(documents.len(), 12);
    assert!(documents
        .iter()
        .all(|d| matches!(d, OpenAccessDocument::Article(_))));
    let dois: Vec<&str> = documents.iter().filter_map(|d| d.doi()).collect();
    assert_eq!(dois.first(), Some(&"10.1000/1"));
    assert_eq!(dois.last(), Some(&"10.1000/12"));

    let cached = std::fs::read_dir(cache.path().join("open_access"))
        .unwrap()
        .count();
    assert_eq!(cached, 2);
}

#[tokio::test]
async fn test_connection_failure_is_network_error() {
    let cache = TempDir::new().unwrap();
    let config = Config {
        base_url: "http://127.0.0.1:1".to_string(),
        directories: Directories::under(cache.path()),
        ..Config::default()
    }
    .with_api_key(API_KEY);

    let client = SpringerClient::new(config).unwrap();
    let err = client
        .metadata(&Query::keyword("offline"), RetrieveOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Network(_)));
}

#[test]
fn test_missing_api_key_at_initialization() {
    let cache = TempDir::new().unwrap();
    let config = Config {
        api_key: None,
        directories: Directories::under(cache.path()),
        ..Config::default()
    };
    assert!(matches!(
        SpringerClient::new(config),
        Err(Error::MissingApiKey)
    ));
}
