//! Download events and the per-downloader subscriber registry.
//!
//! Every [`Downloader`](super::Downloader) owns one [`EventBus`]. Any number
//! of callbacks can subscribe to all events or to one kind of event; they are
//! invoked synchronously, in subscription order, on the task driving the
//! run. Callbacks should be quick and must not block.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::error::DownloadError;

/// Progress of a run after one more item was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// Items to download in this run.
    pub total: usize,
    /// Items written so far.
    pub loaded: usize,
    /// Name of the item just written.
    pub current: String,
}

impl Progress {
    /// Completion ratio in `0.0..=1.0`.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.loaded as f64 / self.total as f64
        }
    }
}

/// Something that happened during a run.
#[derive(Debug, Clone)]
pub enum DownloadEvent {
    /// One item was written.
    Progress(Progress),
    /// The run failed.
    Error(Arc<DownloadError>),
    /// The run was aborted by the caller.
    Abort,
    /// The run completed with nothing left to download.
    Finish,
}

impl DownloadEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Progress(_) => EventKind::Progress,
            Self::Error(_) => EventKind::Error,
            Self::Abort => EventKind::Abort,
            Self::Finish => EventKind::Finish,
        }
    }
}

/// Discriminant of [`DownloadEvent`], used to filter subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Progress,
    Error,
    Abort,
    Finish,
}

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Arc<dyn Fn(&DownloadEvent) + Send + Sync>;

struct Subscriber {
    id: SubscriptionId,
    kind: Option<EventKind>,
    callback: Callback,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: Vec<Subscriber>,
}

/// Registry of event subscribers.
#[derive(Default)]
pub struct EventBus {
    registry: RwLock<Registry>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every event.
    pub fn subscribe(
        &self,
        callback: impl Fn(&DownloadEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.register(None, Arc::new(callback))
    }

    /// Receive progress events.
    pub fn on_progress(
        &self,
        callback: impl Fn(&Progress) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.register(
            Some(EventKind::Progress),
            Arc::new(move |event: &DownloadEvent| {
                if let DownloadEvent::Progress(progress) = event {
                    callback(progress);
                }
            }),
        )
    }

    /// Receive run failures.
    pub fn on_error(
        &self,
        callback: impl Fn(&DownloadError) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.register(
            Some(EventKind::Error),
            Arc::new(move |event: &DownloadEvent| {
                if let DownloadEvent::Error(error) = event {
                    callback(error);
                }
            }),
        )
    }

    /// Receive abort notifications.
    pub fn on_abort(&self, callback: impl Fn() + Send + Sync + 'static) -> SubscriptionId {
        self.register(Some(EventKind::Abort), Arc::new(move |_: &DownloadEvent| callback()))
    }

    /// Receive finish notifications.
    pub fn on_finish(&self, callback: impl Fn() + Send + Sync + 'static) -> SubscriptionId {
        self.register(Some(EventKind::Finish), Arc::new(move |_: &DownloadEvent| callback()))
    }

    /// Forward every event into an unbounded channel.
    ///
    /// Pass the returned id to [`unsubscribe`](Self::unsubscribe) once the
    /// receiver is no longer read; sends to a closed channel are ignored.
    pub fn channel(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<DownloadEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.subscribe(move |event| {
            let _ = tx.send(event.clone());
        });
        (id, rx)
    }

    /// Remove a subscription. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = self.registry.write();
        let before = registry.subscribers.len();
        registry.subscribers.retain(|s| s.id != id);
        registry.subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.read().subscribers.len()
    }

    /// Deliver `event` to every matching subscriber.
    ///
    /// The registry lock is released before callbacks run, so a callback may
    /// itself subscribe or unsubscribe.
    pub fn emit(&self, event: &DownloadEvent) {
        let kind = event.kind();
        let callbacks: Vec<Callback> = self
            .registry
            .read()
            .subscribers
            .iter()
            .filter(|s| s.kind.map_or(true, |k| k == kind))
            .map(|s| Arc::clone(&s.callback))
            .collect();

        for callback in callbacks {
            callback(event);
        }
    }

    fn register(&self, kind: Option<EventKind>, callback: Callback) -> SubscriptionId {
        let mut registry = self.registry.write();
        let id = SubscriptionId(registry.next_id);
        registry.next_id += 1;
        registry.subscribers.push(Subscriber { id, kind, callback });
        id
    }
}
