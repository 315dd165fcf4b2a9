//! Per-node change notification fan-out.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::node::NodeId;

struct Subscriber {
    id: u64,
    tx: mpsc::UnboundedSender<()>,
}

#[derive(Default)]
struct HubState {
    next_id: u64,
    subscribers: HashMap<NodeId, Vec<Subscriber>>,
}

/// Fan-out of flag change notifications to watchers, keyed by node.
///
/// Stores publish only after a write has been committed and only when the
/// stored value actually changed.
#[derive(Clone, Default)]
pub(crate) struct WatchHub {
    state: Arc<Mutex<HubState>>,
}

impl WatchHub {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Subscribe to changes of any of `nodes`.
    ///
    /// The returned watcher already holds the initial event.
    pub(crate) fn subscribe(&self, nodes: &[NodeId]) -> FlagWatcher {
        let (tx, rx) = mpsc::unbounded_channel();
        // Cannot fail: we hold the receiver.
        let _ = tx.send(());

        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        for node in nodes {
            state
                .subscribers
                .entry(node.clone())
                .or_default()
                .push(Subscriber { id, tx: tx.clone() });
        }

        tracing::trace!(nodes = ?nodes, subscriber = id, "Subscribed to flag changes");

        FlagWatcher {
            nodes: nodes.to_vec(),
            subscriber: id,
            rx,
            hub: Arc::downgrade(&self.state),
        }
    }

    /// Notify every watcher of `node`.
    pub(crate) fn publish(&self, node: &NodeId) {
        let mut state = self.state.lock();
        let Some(subscribers) = state.subscribers.get_mut(node) else {
            return;
        };

        subscribers.retain(|sub| sub.tx.send(()).is_ok());
        let remaining = subscribers.len();
        if remaining == 0 {
            state.subscribers.remove(node);
        }

        tracing::trace!(node_id = %node, watchers = remaining, "Published flag change");
    }

    #[cfg(test)]
    pub(crate) fn watcher_count(&self, node: &NodeId) -> usize {
        self.state
            .lock()
            .subscribers
            .get(node)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

fn unsubscribe(hub: &Weak<Mutex<HubState>>, nodes: &[NodeId], subscriber: u64) {
    let Some(state) = hub.upgrade() else {
        return;
    };
    let mut state = state.lock();
    for node in nodes {
        if let Some(subscribers) = state.subscribers.get_mut(node) {
            subscribers.retain(|sub| sub.id != subscriber);
            if subscribers.is_empty() {
                state.subscribers.remove(node);
            }
        }
    }
}

/// Handle on a flag change feed for one or more nodes.
///
/// Each event means "a watched flag changed"; it carries no value, so
/// watchers re-read whatever they need. The feed ends (`None`)
/// once the watcher is closed or the store that produced it is gone.
/// Dropping the watcher releases the subscription.
pub struct FlagWatcher {
    nodes: Vec<NodeId>,
    subscriber: u64,
    rx: mpsc::UnboundedReceiver<()>,
    hub: Weak<Mutex<HubState>>,
}

impl FlagWatcher {
    /// Nodes this watcher follows, the watched node first.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Wait for the next change. Returns `None` once the feed has ended.
    pub async fn changed(&mut self) -> Option<()> {
        self.rx.recv().await
    }

    /// Take an already-delivered change without waiting.
    pub fn try_changed(&mut self) -> Option<()> {
        self.rx.try_recv().ok()
    }

    /// Stop receiving changes.
    ///
    /// Events delivered before closing can still be drained.
    pub fn close(&mut self) {
        unsubscribe(&self.hub, &self.nodes, self.subscriber);
        self.rx.close();
    }
}

impl futures::Stream for FlagWatcher {
    type Item = ();

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<()>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for FlagWatcher {
    fn drop(&mut self) {
        unsubscribe(&self.hub, &self.nodes, self.subscriber);
    }
}

impl std::fmt::Debug for FlagWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlagWatcher")
            .field("nodes", &self.nodes)
            .field("subscriber", &self.subscriber)
            .finish()
    }
}
