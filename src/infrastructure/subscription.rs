// Subscription handles delivered by a RemoteStore

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::core::StorePath;

/// Complete value at a subscribed path at one point in time. `None` means absent.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub path: StorePath,
    pub value: Option<Value>,
}

impl Snapshot {
    pub fn new(path: StorePath, value: Option<Value>) -> Self {
        Self { path, value }
    }

    pub fn exists(&self) -> bool {
        !matches!(self.value, None | Some(Value::Null))
    }
}

pub type SubscriptionId = u64;

/// Live stream of snapshots. Dropping it unsubscribes; the store prunes the
/// closed channel on its next notification.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    path: StorePath,
    receiver: mpsc::UnboundedReceiver<Snapshot>,
}

impl Subscription {
    pub fn new(id: SubscriptionId, path: StorePath, receiver: mpsc::UnboundedReceiver<Snapshot>) -> Self {
        Self { id, path, receiver }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn path(&self) -> &StorePath {
        &self.path
    }

    /// Waits for the next snapshot; `None` once the store side is gone
    pub async fn next_snapshot(&mut self) -> Option<Snapshot> {
        self.receiver.recv().await
    }

    /// Drains whatever is already queued without waiting
    pub fn try_next(&mut self) -> Option<Snapshot> {
        self.receiver.try_recv().ok()
    }

    pub fn unsubscribe(mut self) {
        self.receiver.close();
    }
}

impl Stream for Subscription {
    type Item = Snapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
