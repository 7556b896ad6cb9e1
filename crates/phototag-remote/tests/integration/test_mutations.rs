//! Upload, insert and update: request shape and three-way classification

use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use phototag_core::domain::{PhotoPayload, RemoteError, TagEntry};
use phototag_core::ports::{IRemoteClient, RemoteOutcome};

use crate::common;

fn entry() -> TagEntry {
    TagEntry::new("sunset", "u1_2", "10.0,20.0", "Alice")
}

#[tokio::test]
async fn test_upload_photo_sends_form() {
    let (server, client) = common::setup_server_mock().await;
    Mock::given(method("POST"))
        .and(path("/postMethodUploadPhoto"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("userId=u1_"))
        .and(body_string_contains("tagId=2"))
        .and(body_string_contains("fileName=u1_2"))
        .and(body_string_contains("imageStringBase64=aGVsbG8%3D"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .expect(1)
        .mount(&server)
        .await;

    let photo = PhotoPayload::new("aGVsbG8=").unwrap();
    client
        .upload_photo(&common::user(), 2, "u1_2", &photo)
        .await
        .expect("upload failed");
}

#[tokio::test]
async fn test_insert_new_tag_sends_form() {
    let (server, client) = common::setup_server_mock().await;
    Mock::given(method("POST"))
        .and(path("/postInsertNewTag"))
        .and(body_string_contains("indexUpdateTag=2"))
        .and(body_string_contains("newTagDes=sunset"))
        .and(body_string_contains("newTagPho=u1_2"))
        .and(body_string_contains("newTagLoc=10.0%2C20.0"))
        .and(body_string_contains("newTagPeopleName=Alice"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .expect(1)
        .mount(&server)
        .await;

    let result = client.insert_new_tag(&common::user(), 2, &entry()).await;
    assert_eq!(RemoteOutcome::classify(&result), RemoteOutcome::Success);
}

#[tokio::test]
async fn test_update_tag_sends_form() {
    let (server, client) = common::setup_server_mock().await;
    Mock::given(method("POST"))
        .and(path("/postUpdateTag"))
        .and(body_string_contains("indexUpdateTag=1"))
        .and(body_string_contains("updateTagDes=sunset"))
        .and(body_string_contains("updateTagPho=u1_2"))
        .and(body_string_contains("updateTagPeopleName=Alice"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .expect(1)
        .mount(&server)
        .await;

    client
        .update_tag(&common::user(), 1, &entry())
        .await
        .expect("update failed");
}

#[tokio::test]
async fn test_body_other_than_ok_is_hard_failure() {
    let (server, client) = common::setup_server_mock().await;
    common::mount_post(&server, "/postUpdateTag", 200, "NOT OK").await;

    let result = client.update_tag(&common::user(), 0, &entry()).await;
    assert!(matches!(result, Err(RemoteError::Rejected(_))));
    assert!(matches!(RemoteOutcome::classify(&result), RemoteOutcome::Hard(_)));
}

#[tokio::test]
async fn test_error_status_is_hard_failure() {
    let (server, client) = common::setup_server_mock().await;
    common::mount_post(&server, "/postInsertNewTag", 500, "OK").await;

    let result = client.insert_new_tag(&common::user(), 0, &entry()).await;
    assert!(matches!(RemoteOutcome::classify(&result), RemoteOutcome::Hard(_)));
}

#[tokio::test]
async fn test_connection_refused_is_connectivity_failure() {
    let client = common::unreachable_client();
    let photo = PhotoPayload::new("aGVsbG8=").unwrap();

    let upload = client.upload_photo(&common::user(), 0, "u1_0", &photo).await;
    assert_eq!(RemoteOutcome::classify(&upload), RemoteOutcome::Connectivity);

    let update = client.update_tag(&common::user(), 0, &entry()).await;
    assert!(matches!(update, Err(RemoteError::Unreachable(_))));
}
