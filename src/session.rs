//! Сессия: идентичность, канал статуса, status relay и запросы ожидания.
//!
//! На сессию приходится ровно один [`StatusRelay`], зарегистрированный в
//! конструкторе и снимаемый в `Drop`. Каждый запрос ожидания получает
//! свежий [`BlockingEventListener`] под [`ListenerGuard`].

use std::{
    collections::BTreeSet,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc,
    },
    thread,
    time::Duration,
};

use pubwait_error::SessionError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::pubsub::{
    BlockingEventListener, Channel, InboundMessage, Interrupter, ListenerGuard, ListenerId,
    PresenceEvent, StatusRelay, SubscriptionRegistry, Timetoken, Transport,
    DEFAULT_QUEUE_CAPACITY,
};

/// Имя канала статуса в режиме с общим именем по умолчанию.
pub const DEFAULT_STATUS_CHANNEL: &str = "pubwait-status";

/// Идентификатор сессии (он же ключ приложения).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(Arc<str>);

/// Канал, в который relay публикует классификацию статусов.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatusChannel(Channel);

/// Как выбирается канал статуса.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusMode {
    /// `status-<session-id>`
    #[default]
    PerSession,
    /// Одно имя на все сессии
    Fixed,
}

/// Параметры сессии.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Фиксированный идентификатор; `None` — сгенерировать.
    pub id: Option<String>,
    pub status_mode: StatusMode,
    /// Имя канала статуса для [`StatusMode::Fixed`]
    pub fixed_status_channel: String,
    /// Ёмкость очередей слушателя запроса
    pub queue_capacity: usize,
}

/// Сессия поверх транспорта.
pub struct Session {
    id: SessionId,
    status_channel: StatusChannel,
    transport: Arc<dyn Transport>,
    registry: SubscriptionRegistry,
    relay: Arc<StatusRelay>,
    relay_id: ListenerId,
    queue_capacity: usize,
}

/// Зарегистрированный слушатель, ожидание на котором ещё не началось.
///
/// Позволяет получить [`Interrupter`] до блокировки.
pub struct PendingWait {
    guard: ListenerGuard,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl SessionId {
    /// Новый идентификатор из UUID v4.
    pub fn generate() -> Self {
        Self(Arc::from(Uuid::new_v4().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl StatusChannel {
    pub fn for_session(id: &SessionId) -> Self {
        Self(Channel::from(format!("status-{id}")))
    }

    pub fn fixed(name: &str) -> Self {
        Self(Channel::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn channel(&self) -> &Channel {
        &self.0
    }
}

impl Session {
    /// Создаёт сессию и регистрирует её status relay.
    pub fn new(
        transport: Arc<dyn Transport>,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        if config.queue_capacity == 0 {
            return Err(SessionError::InvalidArgument(
                "queue capacity must be positive".to_string(),
            ));
        }

        let id = match config.id.as_deref() {
            Some(id) if !id.is_empty() => SessionId(Arc::from(id)),
            Some(_) => {
                return Err(SessionError::InvalidArgument(
                    "session id must not be empty".to_string(),
                ))
            }
            None => SessionId::generate(),
        };

        let status_channel = match config.status_mode {
            StatusMode::PerSession => StatusChannel::for_session(&id),
            StatusMode::Fixed if config.fixed_status_channel.is_empty() => {
                return Err(SessionError::InvalidArgument(
                    "fixed status channel name must not be empty".to_string(),
                ))
            }
            StatusMode::Fixed => StatusChannel::fixed(&config.fixed_status_channel),
        };

        let relay = Arc::new(StatusRelay::new(&transport, status_channel.channel().clone()));
        let relay_id = transport.add_listener(relay.clone())?;

        info!(session = %id, status_channel = %status_channel, "session started");

        Ok(Self {
            id,
            status_channel,
            registry: SubscriptionRegistry::new(transport.clone()),
            transport,
            relay,
            relay_id,
            queue_capacity: config.queue_capacity,
        })
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Ключ приложения, выдаваемый клиентам.
    pub fn app_key(&self) -> &str {
        self.id.as_str()
    }

    pub fn status_channel(&self) -> &StatusChannel {
        &self.status_channel
    }

    pub fn relay(&self) -> &StatusRelay {
        &self.relay
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    pub fn add_channels(
        &self,
        names: &BTreeSet<Channel>,
    ) -> Result<BTreeSet<Channel>, SessionError> {
        self.registry.add_channels(names)
    }

    pub fn remove_channels(
        &self,
        names: &BTreeSet<Channel>,
    ) -> Result<BTreeSet<Channel>, SessionError> {
        self.registry.remove_channels(names)
    }

    pub fn list_channels(&self) -> Result<BTreeSet<Channel>, SessionError> {
        self.registry.list_channels()
    }

    /// Публикует сообщение в канал.
    pub fn publish(
        &self,
        channel: &str,
        payload: Value,
    ) -> Result<Timetoken, SessionError> {
        if channel.is_empty() {
            return Err(SessionError::InvalidArgument(
                "channel name must not be empty".to_string(),
            ));
        }
        let timetoken = self.transport.publish(channel, payload)?;
        debug!(session = %self.id, channel, %timetoken, "published");
        Ok(timetoken)
    }

    /// Регистрирует свежий слушатель запроса.
    pub fn begin_wait(&self) -> Result<PendingWait, SessionError> {
        let listener = Arc::new(BlockingEventListener::new(self.queue_capacity));
        let guard = ListenerGuard::register(self.transport.clone(), listener)?;
        Ok(PendingWait { guard })
    }

    /// Ждёт первое сообщение на любом из подписанных каналов.
    pub fn listen(&self) -> Result<InboundMessage, SessionError> {
        self.begin_wait()?.wait_for_message()
    }

    /// Ждёт первое событие присутствия.
    pub fn listen_presence(&self) -> Result<PresenceEvent, SessionError> {
        self.begin_wait()?.wait_for_presence()
    }

    /// Как [`Self::listen`], но не дольше `timeout`. `None` означает, что
    /// время вышло.
    pub fn listen_timeout(
        &self,
        timeout: Duration,
    ) -> Result<Option<InboundMessage>, SessionError> {
        self.wait_timeout(timeout, "message", PendingWait::wait_for_message)
    }

    /// Как [`Self::listen_presence`], но не дольше `timeout`.
    pub fn listen_presence_timeout(
        &self,
        timeout: Duration,
    ) -> Result<Option<PresenceEvent>, SessionError> {
        self.wait_timeout(timeout, "presence", PendingWait::wait_for_presence)
    }

    /// Таймаут поверх прерывания: поток-таймер прерывает ожидание, если
    /// `wait` не вернулся за `timeout`.
    fn wait_timeout<T>(
        &self,
        timeout: Duration,
        what: &'static str,
        wait: impl FnOnce(PendingWait) -> Result<T, SessionError>,
    ) -> Result<Option<T>, SessionError> {
        let pending = self.begin_wait()?;
        let interrupter = pending.interrupter();
        let expired = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let timer = {
            let expired = expired.clone();
            thread::spawn(move || {
                if let Err(mpsc::RecvTimeoutError::Timeout) = done_rx.recv_timeout(timeout) {
                    expired.store(true, Ordering::Release);
                    interrupter.interrupt();
                }
            })
        };

        let outcome = wait(pending);
        drop(done_tx);
        if timer.join().is_err() {
            warn!(session = %self.id, what, "wait timer thread panicked");
        }

        match outcome {
            Ok(item) => Ok(Some(item)),
            Err(SessionError::Interrupted) if expired.load(Ordering::Acquire) => {
                debug!(session = %self.id, what, ?timeout, "wait timed out");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Ждёт ближайшее подтверждение подписки.
    pub fn await_connect(&self) -> Result<(), SessionError> {
        self.begin_wait()?.guard.wait_for_connect()
    }

    /// Ждёт ближайшее подтверждение отписки.
    pub fn await_unsubscribe(&self) -> Result<(), SessionError> {
        self.begin_wait()?.guard.wait_for_unsubscribe()
    }

    /// Подписывается и ждёт подтверждения `Connected` от транспорта.
    pub fn subscribe_confirmed(
        &self,
        names: &BTreeSet<Channel>,
    ) -> Result<BTreeSet<Channel>, SessionError> {
        let pending = self.begin_wait()?;
        let seen = pending.guard.connect_generation();
        self.registry.add_channels(names)?;
        pending.guard.wait_for_connect_after(seen)?;
        drop(pending);
        self.registry.list_channels()
    }

    /// Отписывается и ждёт подтверждения `Disconnected` от транспорта.
    pub fn unsubscribe_confirmed(
        &self,
        names: &BTreeSet<Channel>,
    ) -> Result<BTreeSet<Channel>, SessionError> {
        let pending = self.begin_wait()?;
        let seen = pending.guard.unsubscribe_generation();
        self.registry.remove_channels(names)?;
        pending.guard.wait_for_unsubscribe_after(seen)?;
        drop(pending);
        self.registry.list_channels()
    }
}

impl PendingWait {
    pub fn interrupter(&self) -> Interrupter {
        self.guard.interrupter()
    }

    pub fn listener(&self) -> &Arc<BlockingEventListener> {
        self.guard.listener()
    }

    /// Ждёт первое сообщение; слушатель снимается по выходу.
    pub fn wait_for_message(self) -> Result<InboundMessage, SessionError> {
        let result = self.guard.wait_for_message();
        if let Err(SessionError::Interrupted) = &result {
            warn!(listener = ?self.guard.id(), "wait for message interrupted");
        }
        result
    }

    /// Ждёт первое событие присутствия; слушатель снимается по выходу.
    pub fn wait_for_presence(self) -> Result<PresenceEvent, SessionError> {
        let result = self.guard.wait_for_presence();
        if let Err(SessionError::Interrupted) = &result {
            warn!(listener = ?self.guard.id(), "wait for presence interrupted");
        }
        result
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            id: None,
            status_mode: StatusMode::PerSession,
            fixed_status_channel: DEFAULT_STATUS_CHANNEL.to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl fmt::Display for SessionId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for StatusChannel {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let removed = self.transport.remove_listener(self.relay_id);
        debug!(session = %self.id, removed, "status relay deregistered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pubsub::{LocalTransport, LocalTransportConfig, DEFAULT_MAX_MESSAGE_SIZE};

    fn transport() -> Arc<LocalTransport> {
        Arc::new(LocalTransport::new(LocalTransportConfig {
            uuid: "session-test".to_string(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            ..Default::default()
        }))
    }

    /// Тест проверяет канал статуса в режиме на сессию.
    #[test]
    fn test_per_session_status_channel() {
        let t = transport();
        let session = Session::new(t, SessionConfig {
            id: Some("abc".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(session.app_key(), "abc");
        assert_eq!(session.status_channel().as_str(), "status-abc");
    }

    /// Тест проверяет канал статуса с фиксированным именем.
    #[test]
    fn test_fixed_status_channel() {
        let session = Session::new(transport(), SessionConfig {
            status_mode: StatusMode::Fixed,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(session.status_channel().as_str(), DEFAULT_STATUS_CHANNEL);
        assert_eq!(session.app_key().len(), 36);
    }

    /// Тест проверяет отказ на некорректной конфигурации.
    #[test]
    fn test_invalid_config_rejected() {
        let zero = SessionConfig {
            queue_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(
            Session::new(transport(), zero),
            Err(SessionError::InvalidArgument(_))
        ));

        let empty_fixed = SessionConfig {
            status_mode: StatusMode::Fixed,
            fixed_status_channel: String::new(),
            ..Default::default()
        };
        assert!(Session::new(transport(), empty_fixed).is_err());
    }

    /// Тест проверяет, что relay регистрируется один раз и снимается при
    /// уничтожении сессии.
    #[test]
    fn test_relay_lifetime() {
        let t = transport();
        let session = Session::new(t.clone(), SessionConfig::default()).unwrap();
        assert_eq!(t.listener_count(), 1);
        drop(session);
        assert_eq!(t.listener_count(), 0);
    }

    /// Тест проверяет отказ публикации в пустой канал.
    #[test]
    fn test_publish_empty_channel() {
        let session = Session::new(transport(), SessionConfig::default()).unwrap();
        assert!(matches!(
            session.publish("", Value::from("hey")),
            Err(SessionError::InvalidArgument(_))
        ));
    }

    /// Тест проверяет таймаут ожидания без сообщений.
    #[test]
    fn test_listen_timeout_expires() {
        let t = transport();
        let session = Session::new(t.clone(), SessionConfig::default()).unwrap();
        let outcome = session.listen_timeout(Duration::from_millis(50)).unwrap();
        assert!(outcome.is_none());
        assert_eq!(t.listener_count(), 1, "остаётся только relay");
    }

    /// Тест проверяет ожидание присутствия с таймаутом: истечение и
    /// событие, пришедшее вовремя.
    #[test]
    fn test_listen_presence_timeout() {
        let t = transport();
        let session = Session::new(t.clone(), SessionConfig::default()).unwrap();

        let outcome = session.listen_presence_timeout(Duration::from_millis(50)).unwrap();
        assert!(outcome.is_none());
        assert_eq!(t.listener_count(), 1);

        let injector = {
            let t = t.clone();
            thread::spawn(move || {
                while t.listener_count() < 2 {
                    thread::sleep(Duration::from_millis(5));
                }
                t.emit_presence(PresenceEvent::new(
                    "lobby",
                    serde_json::json!({ "action": "join", "uuid": "peer" }),
                ));
            })
        };

        let event = session
            .listen_presence_timeout(Duration::from_secs(5))
            .unwrap()
            .expect("событие должно прийти до таймаута");
        injector.join().unwrap();
        assert_eq!(&*event.channel, "lobby");
        assert_eq!(event.action(), Some("join"));
    }
}
