//! Protocol bridge for the job vault.
//!
//! The protocol agency reports progress through callbacks, one per protocol
//! and action. [`Listener`] applies each one:
//!
//! 1. store or update the protocol record (connection, message, credential,
//!    proof),
//! 2. derive the job's status from the record's milestones,
//! 3. create or move the job through the [`Updater`](vault_events::Updater),
//!    which journals an event and notifies the tenant's live subscribers.
//!
//! Entrypoints never fail: each returns a [`CallbackOutcome`] and logs it.

mod error;
mod listener;
mod outcome;

pub use error::ListenerError;
pub use listener::Listener;
pub use outcome::CallbackOutcome;
