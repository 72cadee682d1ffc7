//! Topic-addressed push events coming from the host.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
};

use async_trait::async_trait;
use serde_json::Value;
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{trace, warn};

use crate::error::GatewayError;

/// Emitted by the host whenever the drink history changed.
pub const DRINK: &str = "drink";

const BUS_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub topic: String,
    pub payload: Value,
}

impl Event {
    pub fn new(topic: impl Into<String>, payload: Value) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }
}

pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Something a view can subscribe to for push events.
#[async_trait]
pub trait EventSource: Send + Sync + 'static {
    /// Starts delivering events of `topic` to `handler` until the returned
    /// [`Unlisten`] is cancelled or dropped.
    async fn listen(&self, topic: &str, handler: Handler) -> Result<Unlisten, GatewayError>;
}

/// Cancel capability of one live subscription.
///
/// Cancelling is synchronous: once `cancel` returns the handler is never
/// invoked again. Dropping an `Unlisten` cancels it.
pub struct Unlisten {
    cancelled: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
    on_cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Unlisten {
    pub fn new(cancelled: Arc<AtomicBool>, task: JoinHandle<()>) -> Self {
        Self {
            cancelled,
            task: Some(task),
            on_cancel: None,
        }
    }

    #[must_use]
    pub fn on_cancel(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_cancel = Some(Box::new(f));
        self
    }

    pub fn is_active(&self) -> bool {
        !self.cancelled.load(Ordering::Acquire)
    }

    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some(on_cancel) = self.on_cancel.take() {
            on_cancel();
        }
    }
}

impl Drop for Unlisten {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Unlisten {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unlisten")
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

/// Process-wide broadcast channel for host events.
///
/// Every listener gets every event of its topic, in publish order.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    listeners: Arc<Mutex<HashMap<String, usize>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self {
            sender,
            listeners: Arc::default(),
        }
    }

    /// Publishes an event, returning how many listeners of any topic saw it.
    pub fn emit(&self, event: Event) -> usize {
        trace!("Emitting {} event", event.topic);
        self.sender.send(event).unwrap_or(0)
    }

    /// Number of live subscriptions for `topic`.
    pub fn listener_count(&self, topic: &str) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .copied()
            .unwrap_or(0)
    }

    fn track(&self, topic: &str, delta: isize) {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let count = listeners.entry(topic.to_owned()).or_insert(0);
        *count = count.saturating_add_signed(delta);
        if *count == 0 {
            listeners.remove(topic);
        }
    }
}

#[async_trait]
impl EventSource for EventBus {
    async fn listen(&self, topic: &str, handler: Handler) -> Result<Unlisten, GatewayError> {
        let mut receiver = self.sender.subscribe();
        let cancelled = Arc::new(AtomicBool::new(false));

        let task = tokio::spawn({
            let topic = topic.to_owned();
            let cancelled = cancelled.clone();
            async move {
                loop {
                    let event = match receiver.recv().await {
                        Ok(event) if event.topic == topic => event,
                        Ok(_) => continue,
                        // Whatever got skipped may have been ours, so treat it as one event
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("Listener of {topic} lagged behind by {skipped} events");
                            Event::new(topic.clone(), Value::Null)
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    };

                    if cancelled.load(Ordering::Acquire) {
                        break;
                    }
                    handler(&event);
                }
            }
        });

        self.track(topic, 1);
        let bus = self.clone();
        let topic = topic.to_owned();

        Ok(Unlisten::new(cancelled, task).on_cancel(move || bus.track(&topic, -1)))
    }
}

/// Incremental parser for a `text/event-stream` body.
///
/// Only `event:` and `data:` fields are understood; an event without an
/// `event:` field is ignored since every host event is named.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Event> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                events.extend(self.dispatch());
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = line.split_once(':').unwrap_or((line, ""));
            let value = value.strip_prefix(' ').unwrap_or(value);
            match field {
                "event" => self.event = Some(value.to_owned()),
                "data" => self.data.push(value.to_owned()),
                _ => {}
            }
        }

        events
    }

    fn dispatch(&mut self) -> Option<Event> {
        let data = std::mem::take(&mut self.data).join("\n");
        let topic = self.event.take()?;
        let payload = serde_json::from_str(&data).unwrap_or(Value::String(data));

        Some(Event::new(topic, payload))
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::atomic::AtomicUsize, time::Duration};

    use serde_json::json;

    use super::*;

    fn counting_handler(counter: &Arc<AtomicUsize>) -> Handler {
        let counter = counter.clone();
        Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn delivers_only_matching_topic() {
        let bus = EventBus::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let _unlisten = bus.listen(DRINK, counting_handler(&fired)).await.unwrap();

        bus.emit(Event::new(DRINK, Value::Null));
        bus.emit(Event::new("settings", Value::Null));
        bus.emit(Event::new(DRINK, Value::Null));
        settle().await;

        assert_eq!(fired.load(Ordering::SeqCst), 2);
        assert_eq!(bus.listener_count(DRINK), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_listener_stops_firing() {
        let bus = EventBus::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let mut unlisten = bus.listen(DRINK, counting_handler(&fired)).await.unwrap();

        unlisten.cancel();
        unlisten.cancel();
        bus.emit(Event::new(DRINK, Value::Null));
        settle().await;

        assert!(!unlisten.is_active());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(bus.listener_count(DRINK), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn handler_sees_events_in_publish_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let _unlisten = bus
            .listen(DRINK, {
                let seen = seen.clone();
                Arc::new(move |event: &Event| seen.lock().unwrap().push(event.payload.clone()))
            })
            .await
            .unwrap();

        for amount in 0..20 {
            bus.emit(Event::new(DRINK, json!(amount)));
            bus.emit(Event::new("settings", json!(-1)));
        }
        settle().await;

        let expected: Vec<Value> = (0..20).map(|amount| json!(amount)).collect();
        assert_eq!(*seen.lock().unwrap(), expected);
    }

    #[test]
    fn parses_events_split_across_chunks() {
        let mut parser = SseParser::default();

        assert!(parser.push(b": keep-alive\n\nevent: dri").is_empty());
        assert!(parser.push(b"nk\r\ndata: {\"amount\":").is_empty());
        let events = parser.push(b" 200}\n\ndata: orphan\n\n");

        assert_eq!(events, vec![Event::new(DRINK, json!({ "amount": 200 }))]);
    }
}
