use std::{collections::BTreeSet, sync::Arc};

use pubwait_error::SessionError;
use tracing::debug;

use super::{Channel, Transport};

/// Операции над живым набором подписок транспорта.
///
/// Собственного состояния нет: каждый ответ это свежий запрос к
/// транспорту сразу после вызова subscribe/unsubscribe. Асинхронное
/// распространение внутри транспорта может отставать от ответа.
#[derive(Clone)]
pub struct SubscriptionRegistry {
    transport: Arc<dyn Transport>,
}

impl SubscriptionRegistry {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Подписывается на `names` и возвращает полный набор подписок.
    pub fn add_channels(
        &self,
        names: &BTreeSet<Channel>,
    ) -> Result<BTreeSet<Channel>, SessionError> {
        Self::ensure_non_empty(names)?;
        self.transport.subscribe(names)?;
        debug!(channels = ?names, "channels added");
        self.list_channels()
    }

    /// Отписывается от `names` и возвращает полный набор подписок.
    pub fn remove_channels(
        &self,
        names: &BTreeSet<Channel>,
    ) -> Result<BTreeSet<Channel>, SessionError> {
        Self::ensure_non_empty(names)?;
        self.transport.unsubscribe(names)?;
        debug!(channels = ?names, "channels removed");
        self.list_channels()
    }

    pub fn list_channels(&self) -> Result<BTreeSet<Channel>, SessionError> {
        Ok(self.transport.subscribed_channels()?)
    }

    fn ensure_non_empty(names: &BTreeSet<Channel>) -> Result<(), SessionError> {
        if names.is_empty() {
            return Err(SessionError::InvalidArgument(
                "channel set must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Собирает набор каналов из произвольных строк.
pub fn channel_set<I, S>(names: I) -> BTreeSet<Channel>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names.into_iter().map(|n| Channel::from(n.as_ref())).collect()
}
