//! Journal writes paired with live notification.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::oneshot;
use vault_db::{Store, StoreError};
use vault_types::{Event, Job, NewEvent, NewJob};

use crate::error::EventError;
use crate::registry::SubscriberRegistry;
use crate::stream::EventStream;

/// Couples the store with the subscriber registry.
///
/// Every state change worth telling a tenant about goes through here: the
/// row is persisted first, then the freshly stored event is pushed to the
/// tenant's live subscribers.
#[derive(Clone)]
pub struct Updater {
    store: Arc<dyn Store>,
    registry: Arc<SubscriberRegistry>,
}

impl Updater {
    pub fn new(store: Arc<dyn Store>, registry: Arc<SubscriberRegistry>) -> Self {
        Self { store, registry }
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Runs a synchronous store call on the blocking pool.
    pub async fn with_store<T, F>(&self, f: F) -> Result<T, EventError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn Store) -> Result<T, StoreError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        Ok(tokio::task::spawn_blocking(move || f(store.as_ref())).await??)
    }

    /// Appends an event to the tenant's journal and notifies its subscribers.
    ///
    /// When the write fails nothing is notified.
    pub async fn add_event(
        &self,
        tenant_id: &str,
        job: Option<&Job>,
        description: &str,
    ) -> Result<Event, EventError> {
        let new_event = NewEvent::new(tenant_id, job, description);
        let event = self
            .with_store(move |store| store.add_event(&new_event))
            .await
            .inspect_err(|e| tracing::warn!(tenant_id, error = %e, "failed to append event"))?;

        let report = self.registry.notify(tenant_id, &event).await;
        tracing::debug!(
            tenant_id,
            event_id = %event.id,
            delivered = report.delivered,
            dropped = report.dropped,
            closed = report.closed,
            "event appended"
        );

        Ok(event)
    }

    /// Persists a new job, then records `description` against it.
    ///
    /// Not atomic: if the event write fails the job stays persisted and the
    /// error is returned.
    pub async fn add_job(&self, job: NewJob, description: &str) -> Result<Job, EventError> {
        let stored = self.with_store(move |store| store.add_job(&job)).await?;
        tracing::info!(
            tenant_id = %stored.tenant_id,
            job_id = %stored.id,
            protocol = %stored.protocol_type,
            status = %stored.status,
            "job created"
        );
        self.add_event(&stored.tenant_id, Some(&stored), description)
            .await?;
        Ok(stored)
    }

    /// Persists changes to an existing job, then records `description`
    /// against it. Same non-atomic contract as [`add_job`](Self::add_job).
    pub async fn update_job(&self, job: &Job, description: &str) -> Result<Job, EventError> {
        let changed = job.clone();
        let stored = self.with_store(move |store| store.update_job(&changed)).await?;
        tracing::info!(
            tenant_id = %stored.tenant_id,
            job_id = %stored.id,
            status = %stored.status,
            result = %stored.result,
            "job updated"
        );
        self.add_event(&stored.tenant_id, Some(&stored), description)
            .await?;
        Ok(stored)
    }

    /// Opens a live subscription for `tenant_id`.
    ///
    /// The subscription is registered before this returns. Once `cancel`
    /// completes it is removed from the registry and the stream ends.
    pub async fn subscribe_to_events<F>(&self, tenant_id: &str, cancel: F) -> EventStream
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (id, rx) = self.registry.add(tenant_id).await;

        let registry = Arc::clone(&self.registry);
        let removal = id.clone();
        tokio::spawn(async move {
            cancel.await;
            registry.remove(&removal).await;
        });

        EventStream::new(id, rx)
    }

    /// Like [`subscribe_to_events`](Self::subscribe_to_events), cancelled
    /// when the returned stream is dropped.
    pub async fn subscribe_until_dropped(&self, tenant_id: &str) -> EventStream {
        let (guard, dropped) = oneshot::channel::<()>();
        self.subscribe_to_events(tenant_id, async move {
            let _ = dropped.await;
        })
        .await
        .with_guard(guard)
    }
}
