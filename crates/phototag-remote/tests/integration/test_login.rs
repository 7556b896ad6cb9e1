//! Sign-in: form body and response handling

use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use phototag_core::domain::{Credentials, RemoteError};
use phototag_core::ports::IRemoteClient;

use crate::common;

fn credentials() -> Credentials {
    Credentials::new("ann@example.com", "password").unwrap()
}

#[tokio::test]
async fn test_login_sends_email_and_md5_digest() {
    let (server, client) = common::setup_server_mock().await;
    Mock::given(method("POST"))
        .and(path("/methodPostRemoteLogin"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("em=ann%40example.com"))
        .and(body_string_contains("ph=5f4dcc3b5aa765d61d8327deb882cf99"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "u1_",
            "firstName": "Ann",
            "lastName": "Lee",
            "passClear": "",
            "passHash": "5f4dcc3b5aa765d61d8327deb882cf99",
            "email": "ann@example.com",
            "livingCity": "Lund",
            "yearOfBirth": "1990"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let profile = client.login(&credentials()).await.expect("login failed");
    assert_eq!(profile.id, "u1_");
    assert_eq!(profile.living_city, "Lund");
}

#[tokio::test]
async fn test_login_empty_answer_is_rejection() {
    let (server, client) = common::setup_server_mock().await;
    common::mount_post(&server, "/methodPostRemoteLogin", 200, "").await;

    let err = client.login(&credentials()).await.unwrap_err();
    assert!(matches!(err, RemoteError::Rejected(_)));
}

#[tokio::test]
async fn test_login_garbage_is_parse_failure() {
    let (server, client) = common::setup_server_mock().await;
    common::mount_post(&server, "/methodPostRemoteLogin", 200, "<html>").await;

    let err = client.login(&credentials()).await.unwrap_err();
    assert!(matches!(err, RemoteError::Parse(_)));
}

#[tokio::test]
async fn test_login_server_down_is_connectivity() {
    let client = common::unreachable_client();
    let err = client.login(&credentials()).await.unwrap_err();
    assert!(err.is_connectivity());
}
