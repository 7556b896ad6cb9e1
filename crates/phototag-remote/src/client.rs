//! Photo server HTTP client
//!
//! Provides a typed client for the photo server. Reads are plain GETs with
//! query parameters; mutations are form-encoded POSTs whose body must be
//! exactly `OK`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use phototag_core::domain::UserId;
//! use phototag_remote::client::PhotoServerClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = PhotoServerClient::new("http://10.0.2.2:8080", Duration::from_secs(30))?;
//! let tags = client.get_my_tags(&UserId::new("u1_")?).await?;
//! println!("{} slots allocated", tags.number_of_tags());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use anyhow::Context;
use reqwest::{Client, Method, RequestBuilder};
use tracing::debug;

use phototag_core::domain::{
    Credentials, PhotoPayload, RemoteError, TagEntry, TagSet, UserId, UserProfile,
};

use crate::classify_error;

/// Default base URL of the photo server
pub const DEFAULT_BASE_URL: &str = "http://10.0.2.2:8080";

/// Body the server sends for an accepted mutation
const ACCEPTED: &str = "OK";

// Endpoint paths
const LOGIN: &str = "/methodPostRemoteLogin";
const MY_TAGS: &str = "/getMethodMyTags";
const UPLOAD_PHOTO: &str = "/postMethodUploadPhoto";
const INSERT_NEW_TAG: &str = "/postInsertNewTag";
const UPDATE_TAG: &str = "/postUpdateTag";
const DOWNLOAD_PHOTO: &str = "/getMethodDownloadPhoto";
const TESTING: &str = "/getMethodTesting";

// ============================================================================
// PhotoServerClient
// ============================================================================

/// HTTP client for the photo server
#[derive(Debug, Clone)]
pub struct PhotoServerClient {
    /// The underlying HTTP client
    client: Client,
    /// Base URL for API requests
    base_url: String,
}

impl PhotoServerClient {
    /// Creates a client with a per-request timeout
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Creates a client with reqwest defaults (useful for testing)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Returns the configured base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Creates a request builder for the given method and path
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client.request(method, url)
    }

    /// Sends a form POST and requires the body to be exactly `OK`
    async fn post_expecting_ok(&self, path: &str, form: &[(&str, &str)]) -> Result<(), RemoteError> {
        let response = self
            .request(Method::POST, path)
            .form(form)
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status();
        let body = response.text().await.map_err(classify_error)?;

        if !status.is_success() {
            return Err(RemoteError::Rejected(format!(
                "POST {} returned {}",
                path, status
            )));
        }
        if body != ACCEPTED {
            return Err(RemoteError::Rejected(format!(
                "POST {} answered {:?}",
                path,
                truncate(&body)
            )));
        }

        debug!(path, "Server accepted mutation");
        Ok(())
    }

    /// Signs in with an email and password digest
    ///
    /// `POST /methodPostRemoteLogin` with `em, ph`. The server answers with
    /// the user record, or an empty body for unknown credentials.
    pub async fn login(&self, credentials: &Credentials) -> Result<UserProfile, RemoteError> {
        debug!(email = credentials.email(), "Signing in");

        let response = self
            .request(Method::POST, LOGIN)
            .form(&[
                ("em", credentials.email()),
                ("ph", credentials.password_hash()),
            ])
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Rejected(format!(
                "POST {} returned {}",
                LOGIN, status
            )));
        }

        let body = response.bytes().await.map_err(classify_error)?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(RemoteError::Rejected("unknown email or password".into()));
        }
        UserProfile::from_json(&body).map_err(|e| RemoteError::Parse(e.to_string()))
    }

    /// Fetches the tag set of `user`
    ///
    /// `GET /getMethodMyTags?id=<userId>`
    pub async fn get_my_tags(&self, user: &UserId) -> Result<TagSet, RemoteError> {
        debug!(user = %user, "Fetching tags");

        let response = self
            .request(Method::GET, MY_TAGS)
            .query(&[("id", user.as_str())])
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Rejected(format!(
                "GET {} returned {}",
                MY_TAGS, status
            )));
        }

        let body = response.bytes().await.map_err(classify_error)?;
        let tags = TagSet::from_json(&body).map_err(|e| RemoteError::Parse(e.to_string()))?;

        debug!(number_of_tags = tags.number_of_tags(), "Fetched tags");
        Ok(tags)
    }

    /// Uploads a photo
    ///
    /// `POST /postMethodUploadPhoto` with `userId, tagId, fileName, imageStringBase64`
    pub async fn upload_photo(
        &self,
        user: &UserId,
        slot: usize,
        file_name: &str,
        photo: &PhotoPayload,
    ) -> Result<(), RemoteError> {
        let tag_id = slot.to_string();
        self.post_expecting_ok(
            UPLOAD_PHOTO,
            &[
                ("userId", user.as_str()),
                ("tagId", &tag_id),
                ("fileName", file_name),
                ("imageStringBase64", photo.as_str()),
            ],
        )
        .await
    }

    /// Inserts a new tag
    ///
    /// `POST /postInsertNewTag` with `userId, indexUpdateTag, newTagDes,
    /// newTagPho, newTagLoc, newTagPeopleName`
    pub async fn insert_new_tag(
        &self,
        user: &UserId,
        slot: usize,
        entry: &TagEntry,
    ) -> Result<(), RemoteError> {
        let index = slot.to_string();
        self.post_expecting_ok(
            INSERT_NEW_TAG,
            &[
                ("userId", user.as_str()),
                ("indexUpdateTag", &index),
                ("newTagDes", &entry.description),
                ("newTagPho", &entry.photo),
                ("newTagLoc", &entry.location),
                ("newTagPeopleName", &entry.people),
            ],
        )
        .await
    }

    /// Updates an existing tag
    ///
    /// `POST /postUpdateTag` with `userId, indexUpdateTag, updateTagDes,
    /// updateTagPho, updateTagLoc, updateTagPeopleName`
    pub async fn update_tag(
        &self,
        user: &UserId,
        slot: usize,
        entry: &TagEntry,
    ) -> Result<(), RemoteError> {
        let index = slot.to_string();
        self.post_expecting_ok(
            UPDATE_TAG,
            &[
                ("userId", user.as_str()),
                ("indexUpdateTag", &index),
                ("updateTagDes", &entry.description),
                ("updateTagPho", &entry.photo),
                ("updateTagLoc", &entry.location),
                ("updateTagPeopleName", &entry.people),
            ],
        )
        .await
    }

    /// Downloads a photo by filename
    ///
    /// `GET /getMethodDownloadPhoto?fileName=<fileName>`; an empty body
    /// means the server has no such photo.
    pub async fn download_photo(&self, file_name: &str) -> Result<PhotoPayload, RemoteError> {
        let response = self
            .request(Method::GET, DOWNLOAD_PHOTO)
            .query(&[("fileName", file_name)])
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Rejected(format!(
                "GET {} returned {}",
                DOWNLOAD_PHOTO, status
            )));
        }

        let body = response.text().await.map_err(classify_error)?;
        if body.is_empty() {
            return Err(RemoteError::Rejected(format!(
                "no photo named {}",
                file_name
            )));
        }

        debug!(file_name, bytes = body.len(), "Downloaded photo");
        PhotoPayload::new(body).map_err(|e| RemoteError::Parse(e.to_string()))
    }

    /// Liveness probe: any 2xx from `GET /getMethodTesting` means reachable
    pub async fn ping(&self) -> bool {
        match self.request(Method::GET, TESTING).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "Liveness probe failed");
                false
            }
        }
    }
}

/// Shortens a response body for error messages
fn truncate(body: &str) -> String {
    const MAX: usize = 64;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
