//! PhotoTag Remote - Photo server client
//!
//! Provides:
//! - [`client::PhotoServerClient`] - typed HTTP client for the photo server endpoints
//! - [`provider::HttpRemoteClient`] - `IRemoteClient` adapter over the client
//! - [`probe::TcpNetworkProbe`] - `INetworkProbe` adapter using a TCP connect
//!
//! ## Failure classification
//!
//! Transport errors are mapped onto [`RemoteError`] so the sync engine can
//! tell "server down" apart from "server said no". Only a failure to
//! establish the connection counts as [`RemoteError::Unreachable`]; a
//! timeout after the request was sent is a rejection, since the server may
//! have applied it.

pub mod client;
pub mod probe;
pub mod provider;

pub use client::PhotoServerClient;
pub use probe::TcpNetworkProbe;
pub use provider::HttpRemoteClient;

use phototag_core::domain::RemoteError;

/// Maps a transport error onto the remote failure taxonomy
pub(crate) fn classify_error(err: reqwest::Error) -> RemoteError {
    if err.is_connect() {
        RemoteError::Unreachable(err.to_string())
    } else if err.is_decode() || err.is_body() {
        RemoteError::Parse(err.to_string())
    } else {
        RemoteError::Rejected(err.to_string())
    }
}
