use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Weak,
};

use pubwait_error::{ErrorExt, SessionError, TransportError};
use serde_json::Value;
use tracing::{trace, warn};

use super::{Channel, InboundMessage, PresenceEvent, StatusEvent, SubscribeListener, Transport};

/// Долгоживущий слушатель сессии: классифицирует переходы статуса и
/// публикует классификацию в канал статуса.
///
/// Ошибки публикации только логируются и считаются: колбэк работает на
/// потоке доставки транспорта, и вернуть ошибку некому.
pub struct StatusRelay {
    transport: Weak<dyn Transport>,
    status_channel: Channel,
    /// Количество успешных публикаций классификации
    published: AtomicUsize,
    /// Количество проглоченных ошибок публикации
    failed: AtomicUsize,
}

impl StatusRelay {
    pub fn new(
        transport: &Arc<dyn Transport>,
        status_channel: Channel,
    ) -> Self {
        Self {
            transport: Arc::downgrade(transport),
            status_channel,
            published: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    pub fn status_channel(&self) -> &Channel {
        &self.status_channel
    }

    pub fn published(&self) -> usize {
        self.published.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }

    /// Публикует классификацию. Ошибка возвращается вызывающему
    /// (`on_status`), который её проглатывает.
    fn relay(
        &self,
        status: &'static str,
    ) -> Result<(), SessionError> {
        let transport = self
            .transport
            .upgrade()
            .ok_or_else(|| SessionError::RelayPublish {
                channel: self.status_channel.to_string(),
                status,
                source: TransportError::Closed,
            })?;

        transport
            .publish(&self.status_channel, Value::from(status))
            .map(|timetoken| {
                trace!(channel = %self.status_channel, status, %timetoken, "status relayed");
            })
            .map_err(|source| SessionError::RelayPublish {
                channel: self.status_channel.to_string(),
                status,
                source,
            })
    }
}

impl SubscribeListener for StatusRelay {
    fn on_status(
        &self,
        status: &StatusEvent,
    ) {
        let transition = status.transition();
        match self.relay(transition.as_str()) {
            Ok(()) => {
                self.published.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    channel = %self.status_channel,
                    status = transition.as_str(),
                    code = %err.status_code(),
                    "{}",
                    err.log_message()
                );
            }
        }
    }

    fn on_message(
        &self,
        _message: InboundMessage,
    ) {
    }

    fn on_presence(
        &self,
        _event: PresenceEvent,
    ) {
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use parking_lot::Mutex;

    use super::*;
    use crate::pubsub::{
        ListenerId, OperationKind, StatusCategory, SubscribeListener, Timetoken,
    };

    /// Транспорт, запоминающий публикации; может отказывать.
    #[derive(Default)]
    struct PublishLog {
        published: Mutex<Vec<(String, Value)>>,
        fail: bool,
    }

    impl Transport for PublishLog {
        fn publish(
            &self,
            channel: &str,
            payload: Value,
        ) -> Result<Timetoken, TransportError> {
            if self.fail {
                return Err(TransportError::Rejected {
                    operation: "publish",
                    reason: "offline".into(),
                });
            }
            let mut published = self.published.lock();
            published.push((channel.to_string(), payload));
            Ok(Timetoken(published.len() as u64))
        }

        fn subscribe(
            &self,
            _channels: &BTreeSet<Channel>,
        ) -> Result<(), TransportError> {
            Ok(())
        }

        fn unsubscribe(
            &self,
            _channels: &BTreeSet<Channel>,
        ) -> Result<(), TransportError> {
            Ok(())
        }

        fn subscribed_channels(&self) -> Result<BTreeSet<Channel>, TransportError> {
            Ok(BTreeSet::new())
        }

        fn add_listener(
            &self,
            _listener: Arc<dyn SubscribeListener>,
        ) -> Result<ListenerId, TransportError> {
            Ok(1)
        }

        fn remove_listener(
            &self,
            _id: ListenerId,
        ) -> bool {
            true
        }
    }

    /// Тест проверяет публикацию классификации в канал статуса.
    #[test]
    fn test_relays_classification() {
        let log = Arc::new(PublishLog::default());
        let transport: Arc<dyn Transport> = log.clone();
        let relay = StatusRelay::new(&transport, Channel::from("status-s1"));

        relay.on_status(&StatusEvent::new(
            OperationKind::Subscribe,
            StatusCategory::Connected,
        ));
        relay.on_status(&StatusEvent::new(
            OperationKind::Heartbeat,
            StatusCategory::Timeout,
        ));

        let published = log.published.lock();
        assert_eq!(
            *published,
            vec![
                ("status-s1".to_string(), Value::from("subscribed")),
                ("status-s1".to_string(), Value::from("UNDEFINED")),
            ]
        );
        assert_eq!(relay.published(), 2);
        assert_eq!(relay.failed(), 0);
    }

    /// Тест проверяет, что ошибка публикации проглатывается и считается.
    #[test]
    fn test_failure_is_swallowed() {
        let transport: Arc<dyn Transport> = Arc::new(PublishLog {
            fail: true,
            ..Default::default()
        });
        let relay = StatusRelay::new(&transport, Channel::from("status-s1"));

        relay.on_status(&StatusEvent::new(
            OperationKind::Unsubscribe,
            StatusCategory::Acknowledgment,
        ));
        assert_eq!(relay.published(), 0);
        assert_eq!(relay.failed(), 1);
    }

    /// Тест проверяет поведение после уничтожения транспорта.
    #[test]
    fn test_dropped_transport_counts_as_failure() {
        let transport: Arc<dyn Transport> = Arc::new(PublishLog::default());
        let relay = StatusRelay::new(&transport, Channel::from("status-s1"));
        drop(transport);

        relay.on_status(&StatusEvent::new(
            OperationKind::Subscribe,
            StatusCategory::Connected,
        ));
        assert_eq!(relay.failed(), 1);
    }
}
