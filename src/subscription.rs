//! Event subscriptions scoped to the lifetime of a mounted view.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use tracing::{instrument, trace, warn};

use crate::{
    events::{Event, EventSource, Handler, Unlisten},
    resource::Resource,
};

#[derive(Default)]
struct MountState {
    subscriptions: HashMap<String, Unlisten>,
    /// Latest binding id per topic, so a slow setup can tell it was replaced
    latest: HashMap<String, u64>,
    next_binding: u64,
}

/// Owns every subscription a view made while mounted.
///
/// There is at most one live subscription per topic. [`unmount`](Self::unmount)
/// (or dropping the `Mount`) cancels all of them, including ones whose setup
/// is still in flight: those are cancelled as soon as the setup resolves
/// instead of being stored.
pub struct Mount {
    source: Arc<dyn EventSource>,
    unmounted: Arc<AtomicBool>,
    state: Arc<Mutex<MountState>>,
}

impl Mount {
    pub fn new(source: Arc<dyn EventSource>) -> Self {
        Self {
            source,
            unmounted: Arc::new(AtomicBool::new(false)),
            state: Arc::default(),
        }
    }

    fn lock(state: &Mutex<MountState>) -> MutexGuard<'_, MountState> {
        state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_mounted(&self) -> bool {
        !self.unmounted.load(Ordering::Acquire)
    }

    /// Number of subscriptions whose setup completed and that are still live.
    pub fn active_subscriptions(&self) -> usize {
        Self::lock(&self.state)
            .subscriptions
            .values()
            .filter(|unlisten| unlisten.is_active())
            .count()
    }

    /// Subscribes `handler` to `topic` for as long as this view is mounted.
    ///
    /// Binding a topic again replaces the previous subscription. Must be
    /// called inside a Tokio runtime.
    #[instrument(skip(self, handler))]
    pub fn bind_on_mount(&self, topic: &str, handler: impl Fn(&Event) + Send + Sync + 'static) {
        if !self.is_mounted() {
            warn!("Ignoring subscription to {topic} on an unmounted view");
            return;
        }

        let binding = {
            let mut state = Self::lock(&self.state);
            if let Some(mut previous) = state.subscriptions.remove(topic) {
                previous.cancel();
            }
            state.next_binding += 1;
            let binding = state.next_binding;
            state.latest.insert(topic.to_owned(), binding);
            binding
        };

        let guarded: Handler = {
            let unmounted = self.unmounted.clone();
            Arc::new(move |event| {
                if !unmounted.load(Ordering::Acquire) {
                    handler(event);
                }
            })
        };

        let source = self.source.clone();
        let unmounted = self.unmounted.clone();
        let state = self.state.clone();
        let topic = topic.to_owned();

        tokio::spawn(async move {
            let mut unlisten = match source.listen(&topic, guarded).await {
                Ok(unlisten) => unlisten,
                Err(err) => {
                    warn!("Unable to subscribe to {topic}: {err}");
                    return;
                }
            };

            let mut state = Self::lock(&state);
            let superseded = state.latest.get(&topic) != Some(&binding);
            if unmounted.load(Ordering::Acquire) || superseded {
                drop(state);
                trace!("Subscription to {topic} resolved after it was abandoned");
                unlisten.cancel();
                return;
            }

            trace!("Subscribed to {topic}");
            state.subscriptions.insert(topic, unlisten);
        });
    }

    /// Re-fetches `resource` whenever `topic` fires.
    pub fn bind_refetch<T>(&self, topic: &str, resource: &Resource<T>)
    where
        T: Clone + Send + Sync + 'static,
    {
        let handle = resource.handle();
        let name = resource.name();
        self.bind_on_mount(topic, move |event| {
            trace!("Received {} event, refetching {name}", event.topic);
            handle.refetch();
        });
    }

    /// Cancels every subscription. Safe to call more than once.
    pub fn unmount(&self) {
        if self.unmounted.swap(true, Ordering::AcqRel) {
            return;
        }

        let subscriptions: Vec<Unlisten> = {
            let mut state = Self::lock(&self.state);
            state.latest.clear();
            state.subscriptions.drain().map(|(_, unlisten)| unlisten).collect()
        };

        trace!("Unmounting view with {} subscriptions", subscriptions.len());
        for mut unlisten in subscriptions {
            unlisten.cancel();
        }
    }
}

impl Drop for Mount {
    fn drop(&mut self) {
        self.unmount();
    }
}
