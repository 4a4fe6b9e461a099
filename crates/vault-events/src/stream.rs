//! The receiving side of a live subscription.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::{Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use vault_types::EventView;

use crate::registry::SubscriptionId;

/// Events delivered to one subscription, in notification order.
///
/// Ends once the subscription has been removed from the registry and any
/// in-flight deliveries have been drained.
pub struct EventStream {
    id: SubscriptionId,
    inner: ReceiverStream<EventView>,
    /// Dropping this sender cancels the subscription.
    guard: Option<oneshot::Sender<()>>,
}

impl EventStream {
    pub(crate) fn new(id: SubscriptionId, rx: mpsc::Receiver<EventView>) -> Self {
        Self {
            id,
            inner: ReceiverStream::new(rx),
            guard: None,
        }
    }

    pub(crate) fn with_guard(mut self, guard: oneshot::Sender<()>) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn subscription_id(&self) -> &SubscriptionId {
        &self.id
    }
}

impl Stream for EventStream {
    type Item = EventView;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().inner.poll_next_unpin(cx)
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("id", &self.id)
            .field("cancel_on_drop", &self.guard.is_some())
            .finish()
    }
}
