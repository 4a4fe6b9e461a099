//! Tenant-scoped live subscriber registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc::{self, error::SendTimeoutError};
use tokio::sync::RwLock;
use vault_types::{Event, EventView};

/// Each subscriber holds at most one undelivered event.
pub const DELIVERY_QUEUE_CAPACITY: usize = 1;

/// Identifies one live subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What `notify` does when a subscriber's slot is still occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryPolicy {
    /// Wait until the subscriber drains its slot, however long that takes.
    /// A stalled subscriber stalls the caller.
    Block,
    /// Wait at most this long per subscriber, then drop the event for that
    /// subscriber only.
    DropAfter(Duration),
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self::DropAfter(Duration::from_secs(5))
    }
}

/// Per-call delivery counts returned by [`SubscriberRegistry::notify`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifyReport {
    /// Subscribers that received the event.
    pub delivered: usize,
    /// Subscribers whose slot stayed full past the policy's wait.
    pub dropped: usize,
    /// Subscribers whose receiving side was already gone.
    pub closed: usize,
}

struct Subscription {
    tenant_id: String,
    tx: mpsc::Sender<EventView>,
}

#[derive(Default)]
struct Index {
    /// Registration order is delivery order.
    by_tenant: HashMap<String, Vec<SubscriptionId>>,
    subscriptions: HashMap<SubscriptionId, Subscription>,
}

/// Fan-out directory: tenant → live subscriptions → delivery queues.
///
/// One `RwLock` guards both indexes. `add` and `remove` take it
/// exclusively, `notify` takes it shared and only long enough to snapshot
/// the tenant's queues, so a stalled subscriber never holds the lock.
pub struct SubscriberRegistry {
    index: RwLock<Index>,
    policy: DeliveryPolicy,
    sequence: AtomicU64,
}

impl SubscriberRegistry {
    pub fn new(policy: DeliveryPolicy) -> Self {
        Self {
            index: RwLock::new(Index::default()),
            policy,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn policy(&self) -> DeliveryPolicy {
        self.policy
    }

    /// Registers a new subscription for `tenant_id`.
    ///
    /// Returns its id and the receiving side of its capacity-1 queue.
    pub async fn add(&self, tenant_id: &str) -> (SubscriptionId, mpsc::Receiver<EventView>) {
        let id = self.next_id(tenant_id);
        let (tx, rx) = mpsc::channel(DELIVERY_QUEUE_CAPACITY);

        let mut index = self.index.write().await;
        index
            .by_tenant
            .entry(tenant_id.to_string())
            .or_default()
            .push(id.clone());
        index.subscriptions.insert(
            id.clone(),
            Subscription {
                tenant_id: tenant_id.to_string(),
                tx,
            },
        );

        tracing::debug!(tenant_id, subscription_id = %id, "subscription added");
        (id, rx)
    }

    /// Removes exactly the subscription `id` from both indexes.
    ///
    /// Unknown ids are logged and ignored. Returns whether anything was
    /// removed.
    pub async fn remove(&self, id: &SubscriptionId) -> bool {
        let mut index = self.index.write().await;
        let Some(subscription) = index.subscriptions.remove(id) else {
            tracing::warn!(subscription_id = %id, "ignoring removal of unknown subscription");
            return false;
        };

        if let Some(ids) = index.by_tenant.get_mut(&subscription.tenant_id) {
            ids.retain(|candidate| candidate != id);
            if ids.is_empty() {
                index.by_tenant.remove(&subscription.tenant_id);
            }
        }

        tracing::debug!(
            tenant_id = %subscription.tenant_id,
            subscription_id = %id,
            "subscription removed"
        );
        true
    }

    /// Pushes a projection of `event` to every subscription of `tenant_id`,
    /// in registration order.
    ///
    /// The senders are cloned under the read lock and delivery happens after
    /// it is released, so a stalled subscriber never blocks `add` or
    /// `remove`. A subscription removed mid-delivery is reported as `closed`
    /// once its receiver is gone.
    pub async fn notify(&self, tenant_id: &str, event: &Event) -> NotifyReport {
        let targets: Vec<(SubscriptionId, mpsc::Sender<EventView>)> = {
            let index = self.index.read().await;
            let Some(ids) = index.by_tenant.get(tenant_id) else {
                return NotifyReport::default();
            };
            ids.iter()
                .filter_map(|id| {
                    index
                        .subscriptions
                        .get(id)
                        .map(|sub| (id.clone(), sub.tx.clone()))
                })
                .collect()
        };

        let view = EventView::from(event);
        let mut report = NotifyReport::default();

        for (id, tx) in targets {
            match self.deliver(&tx, view.clone()).await {
                Delivery::Delivered => report.delivered += 1,
                Delivery::Dropped => {
                    tracing::warn!(
                        tenant_id,
                        subscription_id = %id,
                        event_id = %event.id,
                        "subscriber did not drain its queue in time; event dropped for it"
                    );
                    report.dropped += 1;
                }
                Delivery::Closed => {
                    tracing::debug!(tenant_id, subscription_id = %id, "subscriber already gone");
                    report.closed += 1;
                }
            }
        }

        report
    }

    /// Number of live subscriptions for `tenant_id`.
    pub async fn subscription_count(&self, tenant_id: &str) -> usize {
        self.index
            .read()
            .await
            .by_tenant
            .get(tenant_id)
            .map_or(0, Vec::len)
    }

    /// Number of tenants with at least one live subscription.
    pub async fn tenant_count(&self) -> usize {
        self.index.read().await.by_tenant.len()
    }

    async fn deliver(&self, tx: &mpsc::Sender<EventView>, view: EventView) -> Delivery {
        match self.policy {
            DeliveryPolicy::Block => match tx.send(view).await {
                Ok(()) => Delivery::Delivered,
                Err(_) => Delivery::Closed,
            },
            DeliveryPolicy::DropAfter(wait) => match tx.send_timeout(view, wait).await {
                Ok(()) => Delivery::Delivered,
                Err(SendTimeoutError::Timeout(_)) => Delivery::Dropped,
                Err(SendTimeoutError::Closed(_)) => Delivery::Closed,
            },
        }
    }

    /// `<tenant>-<unix nanos>-<sequence>`; the sequence keeps ids unique when
    /// two subscriptions share a clock reading.
    fn next_id(&self, tenant_id: &str) -> SubscriptionId {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        SubscriptionId(format!("{tenant_id}-{nanos:020}-{seq}"))
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new(DeliveryPolicy::default())
    }
}

enum Delivery {
    Delivered,
    Dropped,
    Closed,
}
