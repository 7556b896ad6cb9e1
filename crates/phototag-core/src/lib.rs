//! PhotoTag Core - Domain logic and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `TagSet`, `SyncItem`, `SyncOperation`, `UserId`, `PhotoPayload`
//! - **Port definitions** - Traits for adapters: `ILocalStore`, `IRemoteClient`,
//!   `INetworkProbe`, `INotificationService`
//! - **Configuration** - YAML-backed settings shared by the daemon and CLI
//!
//! # Architecture
//!
//! The domain module contains pure data and invariants with no I/O.
//! Ports define the trait interfaces that adapter crates implement
//! (`phototag-store`, `phototag-remote`). The synchronization engine in
//! `phototag-sync` orchestrates domain types through these ports.

pub mod config;
pub mod domain;
pub mod ports;
