//! Shared test helpers for photo server integration tests

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use phototag_core::domain::UserId;
use phototag_remote::{HttpRemoteClient, PhotoServerClient};

/// Starts a mock server and returns it with a client pointing at it
pub async fn setup_server_mock() -> (MockServer, HttpRemoteClient) {
    let server = MockServer::start().await;
    let client = HttpRemoteClient::new(PhotoServerClient::with_base_url(server.uri()));
    (server, client)
}

/// Returns a client whose base URL points at a port nobody listens on
pub fn unreachable_client() -> HttpRemoteClient {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    HttpRemoteClient::new(PhotoServerClient::with_base_url(format!(
        "http://127.0.0.1:{}",
        port
    )))
}

/// Mounts a POST endpoint that answers with the given status and body
pub async fn mount_post(server: &MockServer, endpoint: &str, status: u16, body: &str) {
    Mock::given(method("POST"))
        .and(path(endpoint))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

pub fn user() -> UserId {
    UserId::new("u1_").unwrap()
}

/// Tag set JSON with two live slots and one deleted
pub fn tags_json() -> serde_json::Value {
    serde_json::json!({
        "id": "u1_",
        "numberOfTags": "3",
        "tagId": ["0", "1", "2"],
        "tagDes": ["beach", "", "dog"],
        "tagPhoto": ["u1_0", "na", "u1_2"],
        "tagLocation": ["1.0,2.0", "", "3.0,4.0"],
        "tagPeopleName": ["Alice,Bob", "", ""]
    })
}
