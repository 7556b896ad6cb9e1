//! Tag fetch, photo download and liveness probe

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use phototag_core::domain::RemoteError;
use phototag_core::ports::IRemoteClient;

use crate::common;

#[tokio::test]
async fn test_fetch_tags_parses_wire_format() {
    let (server, client) = common::setup_server_mock().await;
    Mock::given(method("GET"))
        .and(path("/getMethodMyTags"))
        .and(query_param("id", "u1_"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::tags_json()))
        .expect(1)
        .mount(&server)
        .await;

    let tags = client.fetch_tags(&common::user()).await.expect("fetch_tags failed");

    assert_eq!(tags.number_of_tags(), 3);
    assert_eq!(tags.live_count(), 2);
    assert_eq!(tags.entry(0).unwrap().people, "Alice,Bob");
    assert!(tags.entry(1).unwrap().is_deleted());
}

#[tokio::test]
async fn test_fetch_tags_malformed_body_is_parse_failure() {
    let (server, client) = common::setup_server_mock().await;
    Mock::given(method("GET"))
        .and(path("/getMethodMyTags"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client.fetch_tags(&common::user()).await.unwrap_err();
    assert!(matches!(err, RemoteError::Parse(_)), "got {err:?}");
}

#[tokio::test]
async fn test_fetch_tags_error_status_is_rejection() {
    let (server, client) = common::setup_server_mock().await;
    Mock::given(method("GET"))
        .and(path("/getMethodMyTags"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client.fetch_tags(&common::user()).await.unwrap_err();
    assert!(matches!(err, RemoteError::Rejected(_)));
}

#[tokio::test]
async fn test_fetch_tags_unreachable() {
    let client = common::unreachable_client();
    let err = client.fetch_tags(&common::user()).await.unwrap_err();
    assert!(err.is_connectivity());
}

#[tokio::test]
async fn test_download_photo() {
    let (server, client) = common::setup_server_mock().await;
    Mock::given(method("GET"))
        .and(path("/getMethodDownloadPhoto"))
        .and(query_param("fileName", "u1_0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("aGVsbG8="))
        .mount(&server)
        .await;

    let photo = client.download_photo("u1_0").await.expect("download failed");
    assert_eq!(photo.as_str(), "aGVsbG8=");
}

#[tokio::test]
async fn test_download_empty_body_is_failure() {
    let (server, client) = common::setup_server_mock().await;
    Mock::given(method("GET"))
        .and(path("/getMethodDownloadPhoto"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    assert!(client.download_photo("u1_9").await.is_err());
}

#[tokio::test]
async fn test_liveness_probe() {
    let (server, client) = common::setup_server_mock().await;
    Mock::given(method("GET"))
        .and(path("/getMethodTesting"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Hello"))
        .mount(&server)
        .await;

    assert!(client.is_server_reachable().await);
}

#[tokio::test]
async fn test_liveness_probe_error_status_is_unreachable() {
    let (server, client) = common::setup_server_mock().await;
    Mock::given(method("GET"))
        .and(path("/getMethodTesting"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    assert!(!client.is_server_reachable().await);
    assert!(!common::unreachable_client().is_server_reachable().await);
}
