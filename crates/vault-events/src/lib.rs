//! Event journal and live fan-out for the job vault.
//!
//! [`Updater`] is the only path by which tenant-visible state changes are
//! recorded. It persists an [`Event`](vault_types::Event) through the
//! [`Store`](vault_db::Store) and then hands it to the
//! [`SubscriberRegistry`], which pushes an
//! [`EventView`](vault_types::EventView) to every live subscription of that
//! tenant.
//!
//! # Delivery
//!
//! Each subscription owns a queue with room for exactly one event. What
//! happens when that slot is still full is a [`DeliveryPolicy`]:
//!
//! | Policy | Full slot |
//! |--------|-----------|
//! | `Block` | wait until the subscriber drains it |
//! | `DropAfter(d)` | wait up to `d`, then skip that subscriber |
//!
//! Neither policy ever loses a persisted event; only the live push can be
//! skipped. Tenants can always re-read the journal.

mod error;
mod registry;
mod stream;
mod updater;

pub use error::EventError;
pub use registry::{
    DeliveryPolicy, NotifyReport, SubscriberRegistry, SubscriptionId, DELIVERY_QUEUE_CAPACITY,
};
pub use stream::EventStream;
pub use updater::Updater;
