//! Граница с транспортным клиентом pub/sub.
//!
//! Транспорт владеет соединением и живым набором подписок, а события
//! доставляет зарегистрированным слушателям на своих потоках.

use std::{collections::BTreeSet, sync::Arc};

use pubwait_error::TransportError;
use serde_json::Value;

use super::{Channel, InboundMessage, PresenceEvent, StatusEvent, Timetoken};

/// Идентификатор зарегистрированного слушателя.
pub type ListenerId = u64;

/// Наблюдатель событий транспорта.
///
/// Методы вызываются на потоках доставки транспорта, в произвольном
/// чередовании между разными слушателями.
pub trait SubscribeListener: Send + Sync + 'static {
    /// Переход статуса соединения.
    fn on_status(
        &self,
        status: &StatusEvent,
    );
    /// Входящее сообщение.
    fn on_message(
        &self,
        message: InboundMessage,
    );
    /// Событие присутствия.
    fn on_presence(
        &self,
        event: PresenceEvent,
    );
}

/// Транспортный клиент pub/sub.
///
/// `publish` обязан быть безопасным при конкурентных вызовах из колбэков
/// нескольких слушателей.
pub trait Transport: Send + Sync + 'static {
    /// Публикация сообщения, возвращает маркер последовательности.
    fn publish(
        &self,
        channel: &str,
        payload: Value,
    ) -> Result<Timetoken, TransportError>;

    /// Подписка на каналы.
    fn subscribe(
        &self,
        channels: &BTreeSet<Channel>,
    ) -> Result<(), TransportError>;

    /// Отписка от каналов.
    fn unsubscribe(
        &self,
        channels: &BTreeSet<Channel>,
    ) -> Result<(), TransportError>;

    /// Текущий набор подписок (свежий запрос, без кэша).
    fn subscribed_channels(&self) -> Result<BTreeSet<Channel>, TransportError>;

    /// Регистрирует слушателя.
    fn add_listener(
        &self,
        listener: Arc<dyn SubscribeListener>,
    ) -> Result<ListenerId, TransportError>;

    /// Снимает слушателя с регистрации. `false`, если его уже нет.
    fn remove_listener(
        &self,
        id: ListenerId,
    ) -> bool;
}
