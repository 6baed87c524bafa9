//! Слушатель, превращающий колбэки транспорта в блокирующие ожидания.
//!
//! Экземпляр создаётся на один запрос, регистрируется через
//! [`ListenerGuard`] непосредственно перед ожиданием и снимается с
//! регистрации при уничтожении guard'а, каким бы путём ни завершилось
//! ожидание.

use std::{
    ops::Deref,
    sync::{Arc, Weak},
};

use pubwait_error::SessionError;
use tracing::{debug, trace};

use super::{
    BoundedQueue, InboundMessage, Interrupt, ListenerId, PresenceEvent, Signal, StatusEvent,
    StatusTransition, SubscribeListener, Transport, DEFAULT_QUEUE_CAPACITY,
};

/// Буферизующий слушатель одного запроса.
#[derive(Debug)]
pub struct BlockingEventListener {
    messages: BoundedQueue<InboundMessage>,
    presence: BoundedQueue<PresenceEvent>,
    connected: Signal,
    disconnected: Signal,
    interrupt: Interrupt,
}

/// Клонируемый хэндл для прерывания ожидания из другого потока.
#[derive(Debug, Clone)]
pub struct Interrupter {
    listener: Weak<BlockingEventListener>,
}

/// Регистрация слушателя в транспорте на время одного запроса.
///
/// Снимает слушателя с регистрации ровно один раз при `drop` и закрывает
/// его очереди, освобождая заблокированный поток доставки.
pub struct ListenerGuard {
    transport: Arc<dyn Transport>,
    listener: Arc<BlockingEventListener>,
    id: Option<ListenerId>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl BlockingEventListener {
    /// Создаёт слушателя с очередями заданной ёмкости.
    pub fn new(capacity: usize) -> Self {
        Self {
            messages: BoundedQueue::new(capacity),
            presence: BoundedQueue::new(capacity),
            connected: Signal::new(),
            disconnected: Signal::new(),
            interrupt: Interrupt::new(),
        }
    }

    /// Ждёт следующее сообщение (FIFO).
    pub fn wait_for_message(&self) -> Result<InboundMessage, SessionError> {
        Ok(self.messages.pop(&self.interrupt)?)
    }

    /// Ждёт следующее событие присутствия (FIFO).
    pub fn wait_for_presence(&self) -> Result<PresenceEvent, SessionError> {
        Ok(self.presence.pop(&self.interrupt)?)
    }

    /// Ждёт подтверждения подписки, пришедшего после начала вызова.
    pub fn wait_for_connect(&self) -> Result<(), SessionError> {
        self.connected.wait(&self.interrupt)?;
        Ok(())
    }

    /// Ждёт подтверждения отписки, пришедшего после начала вызова.
    pub fn wait_for_unsubscribe(&self) -> Result<(), SessionError> {
        self.disconnected.wait(&self.interrupt)?;
        Ok(())
    }

    /// Снимок сигнала подписки для [`Self::wait_for_connect_after`].
    pub fn connect_generation(&self) -> u64 {
        self.connected.generation()
    }

    /// Снимок сигнала отписки для [`Self::wait_for_unsubscribe_after`].
    pub fn unsubscribe_generation(&self) -> u64 {
        self.disconnected.generation()
    }

    /// Ждёт подтверждения подписки, пришедшего после снимка `seen`.
    pub fn wait_for_connect_after(
        &self,
        seen: u64,
    ) -> Result<(), SessionError> {
        self.connected.wait_after(seen, &self.interrupt)?;
        Ok(())
    }

    /// Ждёт подтверждения отписки, пришедшего после снимка `seen`.
    pub fn wait_for_unsubscribe_after(
        &self,
        seen: u64,
    ) -> Result<(), SessionError> {
        self.disconnected.wait_after(seen, &self.interrupt)?;
        Ok(())
    }

    /// Прерывает текущее (или ближайшее) ожидание.
    pub fn interrupt(&self) {
        self.interrupt.raise();
        self.messages.wake();
        self.presence.wake();
        self.connected.wake();
        self.disconnected.wake();
    }

    /// Закрывает слушателя: буферы очищаются, дальнейшие элементы
    /// отбрасываются, ожидающие получают `SessionError::Closed`.
    pub fn close(&self) {
        self.messages.close();
        self.presence.close();
        self.connected.close();
        self.disconnected.close();
    }

    pub fn is_closed(&self) -> bool {
        self.messages.is_closed()
    }

    /// Количество сообщений в буфере.
    pub fn buffered_messages(&self) -> usize {
        self.messages.len()
    }

    pub fn capacity(&self) -> usize {
        self.messages.capacity()
    }
}

impl Interrupter {
    /// Прерывает ожидание. `false`, если слушатель уже уничтожен.
    pub fn interrupt(&self) -> bool {
        match self.listener.upgrade() {
            Some(listener) => {
                listener.interrupt();
                true
            }
            None => false,
        }
    }
}

impl ListenerGuard {
    /// Регистрирует слушателя в транспорте.
    pub fn register(
        transport: Arc<dyn Transport>,
        listener: Arc<BlockingEventListener>,
    ) -> Result<Self, SessionError> {
        let id = transport.add_listener(listener.clone())?;
        debug!(listener = id, "blocking listener registered");
        Ok(Self {
            transport,
            listener,
            id: Some(id),
        })
    }

    pub fn id(&self) -> Option<ListenerId> {
        self.id
    }

    pub fn listener(&self) -> &Arc<BlockingEventListener> {
        &self.listener
    }

    pub fn interrupter(&self) -> Interrupter {
        Interrupter {
            listener: Arc::downgrade(&self.listener),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl Default for BlockingEventListener {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl SubscribeListener for BlockingEventListener {
    fn on_status(
        &self,
        status: &StatusEvent,
    ) {
        match status.transition() {
            StatusTransition::Connected => self.connected.fire(),
            StatusTransition::Disconnected => self.disconnected.fire(),
            StatusTransition::Undefined => {}
        }
    }

    fn on_message(
        &self,
        message: InboundMessage,
    ) {
        if self.messages.push(message).is_err() {
            trace!("message dropped: listener closed");
        }
    }

    fn on_presence(
        &self,
        event: PresenceEvent,
    ) {
        if self.presence.push(event).is_err() {
            trace!("presence event dropped: listener closed");
        }
    }
}

impl Deref for ListenerGuard {
    type Target = BlockingEventListener;

    fn deref(&self) -> &Self::Target {
        &self.listener
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            let removed = self.transport.remove_listener(id);
            self.listener.close();
            debug!(listener = id, removed, "blocking listener deregistered");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{thread, time::Duration};

    use serde_json::json;

    use super::*;
    use crate::pubsub::{OperationKind, StatusCategory, Timetoken};

    fn msg(n: u64) -> InboundMessage {
        InboundMessage::new("ch", json!(n), Timetoken(n))
    }

    /// Тест проверяет FIFO-порядок сообщений.
    #[test]
    fn test_messages_fifo() {
        let l = BlockingEventListener::new(8);
        for n in 1..=3 {
            l.on_message(msg(n));
        }
        assert_eq!(l.wait_for_message().unwrap().timetoken, Timetoken(1));
        assert_eq!(l.wait_for_message().unwrap().timetoken, Timetoken(2));
        assert_eq!(l.wait_for_message().unwrap().timetoken, Timetoken(3));
    }

    /// Тест проверяет, что подписка и отписка освобождают разные ожидания.
    #[test]
    fn test_connect_and_unsubscribe_are_distinct() {
        let l = Arc::new(BlockingEventListener::default());

        let unsub_waiter = {
            let l = l.clone();
            thread::spawn(move || l.wait_for_unsubscribe())
        };
        thread::sleep(Duration::from_millis(50));

        l.on_status(&StatusEvent::new(
            OperationKind::Subscribe,
            StatusCategory::Connected,
        ));
        thread::sleep(Duration::from_millis(50));
        assert!(!unsub_waiter.is_finished(), "connect не должен освобождать отписку");

        l.on_status(&StatusEvent::new(
            OperationKind::Unsubscribe,
            StatusCategory::Acknowledgment,
        ));
        assert_eq!(unsub_waiter.join().unwrap(), Ok(()));
    }

    /// Тест проверяет, что `Undefined` игнорируется.
    #[test]
    fn test_undefined_ignored() {
        let l = BlockingEventListener::default();
        l.on_status(&StatusEvent::new(
            OperationKind::Subscribe,
            StatusCategory::Reconnected,
        ));
        assert_eq!(l.connect_generation(), 0);
        assert_eq!(l.unsubscribe_generation(), 0);
    }

    /// Тест проверяет снимок поколения сигнала.
    #[test]
    fn test_wait_for_connect_after_snapshot() {
        let l = BlockingEventListener::default();
        let seen = l.connect_generation();
        l.on_status(&StatusEvent::new(
            OperationKind::Subscribe,
            StatusCategory::Connected,
        ));
        assert_eq!(l.wait_for_connect_after(seen), Ok(()));
    }

    /// Тест проверяет прерывание через `Interrupter`.
    #[test]
    fn test_interrupter_releases_presence_wait() {
        let l = Arc::new(BlockingEventListener::default());
        let interrupter = Interrupter {
            listener: Arc::downgrade(&l),
        };

        let waiter = {
            let l = l.clone();
            thread::spawn(move || l.wait_for_presence())
        };
        thread::sleep(Duration::from_millis(50));
        assert!(interrupter.interrupt());
        assert_eq!(waiter.join().unwrap(), Err(SessionError::Interrupted));

        drop(l);
        assert!(!interrupter.interrupt());
    }

    /// Тест проверяет, что после закрытия элементы отбрасываются.
    #[test]
    fn test_closed_listener_discards() {
        let l = BlockingEventListener::new(1);
        l.on_message(msg(1));
        l.close();
        l.on_message(msg(2));
        assert!(l.is_closed());
        assert_eq!(l.buffered_messages(), 0);
        assert_eq!(l.wait_for_message(), Err(SessionError::Closed));
    }
}
