use std::{
    collections::BTreeSet,
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    thread,
};

use dashmap::{DashMap, DashSet};
use pubwait_error::TransportError;
use serde_json::{json, Value};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace, warn};

use super::{
    Channel, InboundMessage, ListenerId, OperationKind, PresenceEvent, StatusCategory, StatusEvent,
    SubscribeListener, Timetoken, TimetokenClock, Transport,
};

/// Лимит размера сообщения по умолчанию (сериализованный JSON).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 32 * 1024;

/// UUID транспорта по умолчанию.
pub const DEFAULT_TRANSPORT_UUID: &str = "pubwait-backend";

/// Ёмкость входящей очереди потока доставки по умолчанию.
pub const DEFAULT_INBOX_CAPACITY: usize = 1024;

/// Настройки локального транспорта.
#[derive(Debug, Clone)]
pub struct LocalTransportConfig {
    /// UUID клиента, попадает в presence-события
    pub uuid: String,
    /// Максимальный размер сериализованного payload в байтах
    pub max_message_size: usize,
    /// Сколько событий ждёт в очереди каждого потока доставки, пока
    /// слушатель занят
    pub inbox_capacity: usize,
}

/// Внутрипроцессный транспорт pub/sub.
///
/// Каждому слушателю выделяется собственный поток доставки с ограниченной
/// входящей очередью: слушатель, заблокированный на backpressure, тормозит
/// только себя. Когда его очередь заполнена, новые события для него
/// отбрасываются и считаются в `dropped_count`; остальные слушатели их
/// получают.
pub struct LocalTransport {
    config: LocalTransportConfig,
    /// Живой набор подписок
    subscriptions: DashSet<Channel>,
    /// Зарегистрированные слушатели
    listeners: DashMap<ListenerId, ListenerSlot>,
    next_id: AtomicU64,
    clock: TimetokenClock,
    closed: AtomicBool,
    /// Общее количество успешных `publish`
    pub publish_count: AtomicUsize,
    /// Количество сообщений, реально разосланных слушателям
    pub delivered_count: AtomicUsize,
    /// Событий, отброшенных из-за переполненной очереди слушателя
    pub dropped_count: AtomicUsize,
}

struct ListenerSlot {
    tx: mpsc::Sender<Delivery>,
    active: Arc<AtomicBool>,
}

#[derive(Clone)]
enum Delivery {
    Status(Arc<StatusEvent>),
    Message(InboundMessage),
    Presence(PresenceEvent),
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Delivery {
    fn kind(&self) -> &'static str {
        match self {
            Self::Status(_) => "status",
            Self::Message(_) => "message",
            Self::Presence(_) => "presence",
        }
    }
}

impl LocalTransport {
    pub fn new(config: LocalTransportConfig) -> Self {
        Self {
            config,
            subscriptions: DashSet::new(),
            listeners: DashMap::new(),
            next_id: AtomicU64::new(1),
            clock: TimetokenClock::new(),
            closed: AtomicBool::new(false),
            publish_count: AtomicUsize::new(0),
            delivered_count: AtomicUsize::new(0),
            dropped_count: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &LocalTransportConfig {
        &self.config
    }

    /// Количество зарегистрированных слушателей.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Рассылает событие статуса всем слушателям (имитация удалённого
    /// перехода, например неожиданного разрыва).
    pub fn emit_status(
        &self,
        event: StatusEvent,
    ) {
        self.dispatch(Delivery::Status(Arc::new(event)));
    }

    /// Рассылает событие присутствия всем слушателям.
    pub fn emit_presence(
        &self,
        event: PresenceEvent,
    ) {
        self.dispatch(Delivery::Presence(event));
    }

    /// Останавливает транспорт: слушатели снимаются, потоки доставки
    /// завершаются, дальнейшие операции возвращают `TransportError::Closed`.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let ids: Vec<ListenerId> = self.listeners.iter().map(|e| *e.key()).collect();
        for id in ids {
            self.remove_listener(id);
        }
        debug!("local transport shut down");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        Ok(())
    }

    fn validate_channels(channels: &BTreeSet<Channel>) -> Result<(), TransportError> {
        match channels.iter().find(|c| c.is_empty()) {
            Some(_) => Err(TransportError::InvalidChannel {
                channel: String::new(),
                reason: "channel name is empty".to_string(),
            }),
            None => Ok(()),
        }
    }

    fn presence(
        &self,
        channel: Channel,
        action: &str,
    ) -> PresenceEvent {
        PresenceEvent::new(channel, json!({ "action": action, "uuid": self.config.uuid }))
    }

    /// Рассылка во все входящие очереди. Не блокируется.
    fn dispatch(
        &self,
        delivery: Delivery,
    ) {
        let mut stale = Vec::new();
        for entry in self.listeners.iter() {
            match entry.value().tx.try_send(delivery.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(dropped)) => {
                    self.dropped_count.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        listener = *entry.key(),
                        kind = dropped.kind(),
                        capacity = self.config.inbox_capacity,
                        "listener inbox full, event dropped"
                    );
                }
                Err(TrySendError::Closed(_)) => stale.push(*entry.key()),
            }
        }
        for id in stale {
            self.listeners.remove(&id);
        }
    }

    fn delivery_loop(
        id: ListenerId,
        listener: Arc<dyn SubscribeListener>,
        mut rx: mpsc::Receiver<Delivery>,
        active: Arc<AtomicBool>,
    ) {
        while let Some(delivery) = rx.blocking_recv() {
            if !active.load(Ordering::Acquire) {
                break;
            }
            match delivery {
                Delivery::Status(event) => listener.on_status(&event),
                Delivery::Message(message) => {
                    trace!(listener = id, channel = %message.channel, "delivering message");
                    listener.on_message(message);
                }
                Delivery::Presence(event) => listener.on_presence(event),
            }
        }
        trace!(listener = id, "delivery thread finished");
    }
}

////////////////////////////////////////////////////////////////////////////////
// Реализация Transport
////////////////////////////////////////////////////////////////////////////////

impl Transport for LocalTransport {
    fn publish(
        &self,
        channel: &str,
        payload: Value,
    ) -> Result<Timetoken, TransportError> {
        self.ensure_open()?;
        if channel.is_empty() {
            return Err(TransportError::InvalidChannel {
                channel: String::new(),
                reason: "channel name is empty".to_string(),
            });
        }

        let size = serde_json::to_vec(&payload)
            .map_err(|e| TransportError::Serialization {
                reason: e.to_string(),
            })?
            .len();
        if size > self.config.max_message_size {
            return Err(TransportError::MessageTooLarge {
                size,
                max: self.config.max_message_size,
            });
        }

        let timetoken = self.clock.next();
        self.publish_count.fetch_add(1, Ordering::Relaxed);

        let subscribed = self.subscriptions.get(channel).map(|c| c.key().clone());
        if let Some(channel) = subscribed {
            self.delivered_count.fetch_add(1, Ordering::Relaxed);
            self.dispatch(Delivery::Message(InboundMessage::new(
                channel, payload, timetoken,
            )));
        }

        Ok(timetoken)
    }

    fn subscribe(
        &self,
        channels: &BTreeSet<Channel>,
    ) -> Result<(), TransportError> {
        self.ensure_open()?;
        Self::validate_channels(channels)?;

        let added: Vec<Channel> = channels
            .iter()
            .filter(|c| self.subscriptions.insert((*c).clone()))
            .cloned()
            .collect();

        debug!(requested = channels.len(), added = added.len(), "subscribed");

        self.emit_status(
            StatusEvent::new(OperationKind::Subscribe, StatusCategory::Connected)
                .with_channels(channels.iter().cloned()),
        );
        for channel in added {
            let event = self.presence(channel, "join");
            self.emit_presence(event);
        }
        Ok(())
    }

    fn unsubscribe(
        &self,
        channels: &BTreeSet<Channel>,
    ) -> Result<(), TransportError> {
        self.ensure_open()?;
        Self::validate_channels(channels)?;

        let removed: Vec<Channel> = channels
            .iter()
            .filter_map(|c| self.subscriptions.remove(c))
            .collect();

        debug!(requested = channels.len(), removed = removed.len(), "unsubscribed");

        self.emit_status(
            StatusEvent::new(OperationKind::Unsubscribe, StatusCategory::Acknowledgment)
                .with_channels(channels.iter().cloned()),
        );
        for channel in removed {
            let event = self.presence(channel, "leave");
            self.emit_presence(event);
        }
        Ok(())
    }

    fn subscribed_channels(&self) -> Result<BTreeSet<Channel>, TransportError> {
        self.ensure_open()?;
        Ok(self.subscriptions.iter().map(|c| c.key().clone()).collect())
    }

    fn add_listener(
        &self,
        listener: Arc<dyn SubscribeListener>,
    ) -> Result<ListenerId, TransportError> {
        self.ensure_open()?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        // mpsc::channel паникует на нулевой ёмкости
        let (tx, rx) = mpsc::channel(self.config.inbox_capacity.max(1));
        let active = Arc::new(AtomicBool::new(true));

        let thread_active = active.clone();
        thread::Builder::new()
            .name(format!("pubwait-delivery-{id}"))
            .spawn(move || Self::delivery_loop(id, listener, rx, thread_active))
            .map_err(|e| TransportError::Rejected {
                operation: "add_listener",
                reason: e.to_string(),
            })?;

        self.listeners.insert(id, ListenerSlot { tx, active });
        debug!(listener = id, "listener registered");
        Ok(id)
    }

    fn remove_listener(
        &self,
        id: ListenerId,
    ) -> bool {
        match self.listeners.remove(&id) {
            Some((_, slot)) => {
                slot.active.store(false, Ordering::Release);
                debug!(listener = id, "listener removed");
                true
            }
            None => false,
        }
    }
}

impl Default for LocalTransportConfig {
    fn default() -> Self {
        Self {
            uuid: DEFAULT_TRANSPORT_UUID.to_string(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
        }
    }
}

impl Drop for LocalTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}
