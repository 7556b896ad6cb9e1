//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. The sync engine depends on these interfaces;
//! their implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`ILocalStore`] - Durable key-value persistence for tags, photos and the queue
//! - [`IRemoteClient`] - Photo server operations and liveness probe
//! - [`INetworkProbe`] - Coarse "is any network up" check
//! - [`INotificationService`] - User-visible notices

pub mod local_store;
pub mod network_probe;
pub mod notification;
pub mod remote_client;

pub use local_store::{keys, ILocalStore};
pub use network_probe::INetworkProbe;
pub use notification::{INotificationService, Notification, NotificationPriority};
pub use remote_client::{IRemoteClient, RemoteOutcome};
