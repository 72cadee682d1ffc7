//! Asynchronously loaded, re-fetchable, observable values.
//!
//! A [`Resource`] wraps one host query. It starts loading as soon as it is
//! created and can be re-fetched at any time. While a re-fetch is in flight
//! the last successfully loaded value stays readable (stale-while-revalidate)
//! and [`Snapshot::loading`] is raised. Only the most recently *issued* fetch
//! may settle the cell; slower responses of older fetches are dropped.

use std::{
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
};

use chrono::{DateTime, Utc};
use futures::{future::BoxFuture, FutureExt};
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::error::GatewayError;

pub type ResourceError = Arc<GatewayError>;

#[derive(Debug, Clone)]
pub enum ResourceState<T> {
    /// Nothing loaded yet, or the last load failed and a new one is running
    Pending,
    Ready { value: T, loaded_at: DateTime<Utc> },
    Failed(ResourceError),
}

/// What observers of a [`Resource`] see.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    pub state: ResourceState<T>,
    /// A fetch is in flight
    pub loading: bool,
}

impl<T> Snapshot<T> {
    /// The current value; kept during a re-fetch.
    pub fn value(&self) -> Option<&T> {
        match &self.state {
            ResourceState::Ready { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ResourceError> {
        match &self.state {
            ResourceState::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, ResourceState::Pending)
    }
}

type Fetcher<T> = Box<dyn Fn() -> BoxFuture<'static, Result<T, GatewayError>> + Send + Sync>;

struct Inner<T> {
    name: &'static str,
    fetcher: Fetcher<T>,
    /// Sequence number of the latest issued fetch
    issued: AtomicU64,
    state: watch::Sender<Snapshot<T>>,
}

impl<T: Clone + Send + Sync + 'static> Inner<T> {
    fn refetch(self: &Arc<Self>) {
        let mut generation = 0;
        self.state.send_modify(|snapshot| {
            generation = self.issued.fetch_add(1, Ordering::AcqRel) + 1;
            snapshot.loading = true;
            if !matches!(snapshot.state, ResourceState::Ready { .. }) {
                snapshot.state = ResourceState::Pending;
            }
        });
        trace!(resource = self.name, generation, "Fetch issued");

        let fetch = (self.fetcher)();
        let cell = Arc::downgrade(self);
        tokio::spawn(async move {
            let result = fetch.await;
            Self::settle(&cell, generation, result);
        });
    }

    fn settle(cell: &Weak<Self>, generation: u64, result: Result<T, GatewayError>) {
        let Some(inner) = cell.upgrade() else {
            trace!(generation, "Fetch settled after its resource was dropped");
            return;
        };

        let applied = inner.state.send_if_modified(|snapshot| {
            if inner.issued.load(Ordering::Acquire) != generation {
                return false;
            }

            snapshot.loading = false;
            snapshot.state = match result {
                Ok(value) => ResourceState::Ready {
                    value,
                    loaded_at: Utc::now(),
                },
                Err(err) => {
                    debug!(resource = inner.name, "Fetch failed: {err}");
                    ResourceState::Failed(Arc::new(err))
                }
            };
            true
        });

        if !applied {
            trace!(resource = inner.name, generation, "Discarding superseded fetch");
        }
    }
}

/// An observable cell around one asynchronous host query.
///
/// Must be created inside a Tokio runtime: creation and every
/// [`refetch`](Self::refetch) spawn the fetch as a task.
pub struct Resource<T> {
    inner: Arc<Inner<T>>,
}

impl<T: Clone + Send + Sync + 'static> Resource<T> {
    pub fn new<F, Fut>(name: &'static str, fetcher: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, GatewayError>> + Send + 'static,
    {
        let (state, _) = watch::channel(Snapshot {
            state: ResourceState::Pending,
            loading: true,
        });

        let inner = Arc::new(Inner {
            name,
            fetcher: Box::new(move || fetcher().boxed()),
            issued: AtomicU64::new(0),
            state,
        });
        inner.refetch();

        Self { inner }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    pub fn refetch(&self) {
        self.inner.refetch();
    }

    /// A refetch trigger that does not keep the resource alive.
    pub fn handle(&self) -> RefetchHandle<T> {
        RefetchHandle {
            cell: Arc::downgrade(&self.inner),
        }
    }

    pub fn snapshot(&self) -> Snapshot<T> {
        self.inner.state.borrow().clone()
    }

    pub fn state(&self) -> ResourceState<T> {
        self.inner.state.borrow().state.clone()
    }

    pub fn value(&self) -> Option<T> {
        self.inner.state.borrow().value().cloned()
    }

    pub fn loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    /// Notified on every state transition.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot<T>> {
        self.inner.state.subscribe()
    }

    /// Waits until no fetch is in flight and returns the resulting snapshot.
    pub async fn settled(&self) -> Snapshot<T> {
        let mut receiver = self.subscribe();
        let settled = receiver
            .wait_for(|snapshot| !snapshot.loading)
            .await
            .map(|snapshot| snapshot.clone());

        settled.unwrap_or_else(|_| self.snapshot())
    }
}

impl<T> std::fmt::Debug for Resource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("name", &self.inner.name)
            .field("issued", &self.inner.issued.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Weak refetch trigger, handed to event subscriptions.
pub struct RefetchHandle<T> {
    cell: Weak<Inner<T>>,
}

impl<T> Clone for RefetchHandle<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> RefetchHandle<T> {
    /// Returns `false` when the resource is already gone.
    pub fn refetch(&self) -> bool {
        let Some(inner) = self.cell.upgrade() else {
            return false;
        };
        inner.refetch();
        true
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::VecDeque, sync::Mutex, time::Duration};

    use tokio::sync::oneshot;

    use super::*;

    type Reply = oneshot::Sender<Result<u32, GatewayError>>;

    /// A fetcher whose every call waits for a reply sent by the test.
    fn scripted() -> (
        impl Fn() -> BoxFuture<'static, Result<u32, GatewayError>> + Send + Sync + 'static,
        Arc<Mutex<VecDeque<Reply>>>,
    ) {
        let replies: Arc<Mutex<VecDeque<Reply>>> = Arc::default();
        let queue = replies.clone();
        let fetcher = move || -> BoxFuture<'static, Result<u32, GatewayError>> {
            let (tx, rx) = oneshot::channel();
            queue.lock().unwrap().push_back(tx);
            Box::pin(async move {
                rx.await.unwrap_or_else(|_| {
                    Err(GatewayError::EventStream("reply dropped".to_owned()))
                })
            })
        };
        (fetcher, replies)
    }

    fn reply(replies: &Arc<Mutex<VecDeque<Reply>>>, result: Result<u32, GatewayError>) {
        let tx = replies.lock().unwrap().pop_front().expect("no fetch in flight");
        tx.send(result).ok();
    }

    fn rejected() -> GatewayError {
        GatewayError::Rejected {
            command: "list_drinks",
            message: "boom".to_owned(),
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn starts_pending_then_becomes_ready() {
        let (fetcher, replies) = scripted();
        let resource = Resource::new("count", fetcher);

        let snapshot = resource.snapshot();
        assert!(snapshot.is_pending());
        assert!(snapshot.loading);

        reply(&replies, Ok(7));
        let snapshot = resource.settled().await;

        assert_eq!(snapshot.value(), Some(&7));
        assert!(!snapshot.loading);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_is_contained_in_the_cell() {
        let (fetcher, replies) = scripted();
        let resource = Resource::new("count", fetcher);

        reply(&replies, Err(rejected()));
        let snapshot = resource.settled().await;

        assert!(snapshot.error().is_some());
        assert_eq!(resource.value(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn refetch_keeps_last_value_visible() {
        let (fetcher, replies) = scripted();
        let resource = Resource::new("count", fetcher);
        reply(&replies, Ok(1));
        resource.settled().await;

        resource.refetch();

        assert!(resource.loading());
        assert_eq!(resource.value(), Some(1));

        reply(&replies, Ok(2));
        assert_eq!(resource.settled().await.value(), Some(&2));
    }

    #[tokio::test(start_paused = true)]
    async fn refetch_after_failure_hides_the_error() {
        let (fetcher, replies) = scripted();
        let resource = Resource::new("count", fetcher);
        reply(&replies, Err(rejected()));
        resource.settled().await;

        resource.refetch();

        let snapshot = resource.snapshot();
        assert!(snapshot.is_pending());
        assert!(snapshot.loading);
        assert_eq!(snapshot.value(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn latest_issued_fetch_wins() {
        let (fetcher, replies) = scripted();
        let resource = Resource::new("count", fetcher);
        reply(&replies, Ok(0));
        resource.settled().await;

        resource.refetch(); // A
        resource.refetch(); // B
        let fetch_a = replies.lock().unwrap().pop_front().unwrap();

        // B settles first, then the slow A
        reply(&replies, Ok(2));
        settle().await;
        fetch_a.send(Ok(1)).ok();
        settle().await;

        let snapshot = resource.snapshot();
        assert_eq!(snapshot.value(), Some(&2));
        assert!(!snapshot.loading);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_response_does_not_end_loading() {
        let (fetcher, replies) = scripted();
        let resource = Resource::new("count", fetcher);

        resource.refetch();
        // The initial fetch settles while the refetch is still running
        reply(&replies, Ok(1));
        settle().await;

        assert!(resource.loading());
        assert!(resource.snapshot().is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn handle_outliving_resource_is_a_no_op() {
        let (fetcher, replies) = scripted();
        let resource = Resource::new("count", fetcher);
        let handle = resource.handle();
        assert!(handle.refetch());

        drop(resource);
        assert!(!handle.refetch());

        // Fetches started before the drop settle into nothing
        reply(&replies, Ok(1));
        reply(&replies, Ok(2));
        settle().await;
    }

    #[tokio::test(start_paused = true)]
    async fn observers_see_transitions() {
        let (fetcher, replies) = scripted();
        let resource = Resource::new("count", fetcher);
        let mut observer = resource.subscribe();

        reply(&replies, Ok(3));
        observer.changed().await.unwrap();

        assert_eq!(observer.borrow().value(), Some(&3));
    }
}
