//! Persistence collaborator for the job vault.
//!
//! The vault core only ever sees the [`Store`] trait. This crate provides
//! two implementations of it:
//!
//! - [`SqliteStore`]: SQLite through an `r2d2` pool in WAL mode. Opening it
//!   upgrades the schema. What the server runs on.
//! - [`MemoryStore`]: everything in a mutex-guarded map. What unit and
//!   integration tests run on.
//!
//! # Design decisions
//!
//! - **Synchronous trait**: `rusqlite` is blocking, so the trait is too.
//!   Async callers go through `tokio::task::spawn_blocking`.
//! - **Tenant-scoped keys**: job and connection ids come from the protocol
//!   agency and are only unique per tenant, so every lookup takes the
//!   tenant id.
//! - **Versioned schema**: upgrade steps are SQL files compiled in with
//!   `include_str!`. The applied version is SQLite's `user_version`.

mod error;
mod memory;
mod schema;
mod sqlite;
mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use sqlite::{SqliteSettings, SqliteStore};
pub use store::Store;
