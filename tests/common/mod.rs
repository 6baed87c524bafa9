//! Общие помощники интеграционных тестов.

#![allow(dead_code)]

use std::{
    collections::BTreeSet,
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use pubwait::{
    pubsub::{ListenerId, LocalTransport, LocalTransportConfig, DEFAULT_MAX_MESSAGE_SIZE},
    Channel, StatusEvent, SubscribeListener, Timetoken, Transport, TransportError,
};
use serde_json::Value;

/// Синхронный транспорт для тестов: хранит набор подписок в памяти,
/// считает вызовы и записывает публикации. События статуса доставляются
/// только через [`RecordingTransport::emit_status`].
#[derive(Default)]
pub struct RecordingTransport {
    subscriptions: Mutex<BTreeSet<Channel>>,
    listeners: Mutex<Vec<(ListenerId, Arc<dyn SubscribeListener>)>>,
    next_id: AtomicU64,
    pub published: Mutex<Vec<(String, Value)>>,
    pub subscribe_calls: AtomicUsize,
    pub unsubscribe_calls: AtomicUsize,
    pub fail_publish: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Синхронно вызывает `on_status` у всех слушателей.
    pub fn emit_status(
        &self,
        event: &StatusEvent,
    ) {
        let listeners: Vec<_> = self.listeners.lock().iter().map(|(_, l)| l.clone()).collect();
        for listener in listeners {
            listener.on_status(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn transport_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst) + self.unsubscribe_calls.load(Ordering::SeqCst)
    }

    pub fn published(&self) -> Vec<(String, Value)> {
        self.published.lock().clone()
    }
}

impl Transport for RecordingTransport {
    fn publish(
        &self,
        channel: &str,
        payload: Value,
    ) -> Result<Timetoken, TransportError> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(TransportError::Rejected {
                operation: "publish",
                reason: "network unreachable".to_string(),
            });
        }
        let mut published = self.published.lock();
        published.push((channel.to_string(), payload));
        Ok(Timetoken(published.len() as u64))
    }

    fn subscribe(
        &self,
        channels: &BTreeSet<Channel>,
    ) -> Result<(), TransportError> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        self.subscriptions.lock().extend(channels.iter().cloned());
        Ok(())
    }

    fn unsubscribe(
        &self,
        channels: &BTreeSet<Channel>,
    ) -> Result<(), TransportError> {
        self.unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
        let mut subscriptions = self.subscriptions.lock();
        for channel in channels {
            subscriptions.remove(channel);
        }
        Ok(())
    }

    fn subscribed_channels(&self) -> Result<BTreeSet<Channel>, TransportError> {
        Ok(self.subscriptions.lock().clone())
    }

    fn add_listener(
        &self,
        listener: Arc<dyn SubscribeListener>,
    ) -> Result<ListenerId, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().push((id, listener));
        Ok(id)
    }

    fn remove_listener(
        &self,
        id: ListenerId,
    ) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }
}

pub fn local_transport() -> Arc<LocalTransport> {
    Arc::new(LocalTransport::new(LocalTransportConfig {
        uuid: "integration".to_string(),
        max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        ..Default::default()
    }))
}

pub fn channels(names: &[&str]) -> BTreeSet<Channel> {
    names.iter().map(|n| Channel::from(*n)).collect()
}

/// Ждёт выполнения условия не дольше `timeout`.
pub fn eventually(
    timeout: Duration,
    check: impl Fn() -> bool,
) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    check()
}
