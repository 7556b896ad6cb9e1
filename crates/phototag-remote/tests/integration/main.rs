//! Integration tests for phototag-remote
//!
//! Uses wiremock to simulate the photo server and verifies request shape
//! and failure classification of the HTTP client and its port adapter.

mod common;

mod test_login;
mod test_mutations;
mod test_reads;
