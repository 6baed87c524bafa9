use std::fmt;

use serde::Serialize;

use super::Channel;

/// Операция транспорта, к которой относится статус.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Subscribe,
    Unsubscribe,
    Publish,
    Heartbeat,
}

/// Категория статуса, сообщённая транспортом.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    /// Подписка подтверждена
    Connected,
    /// Операция подтверждена (например, отписка)
    Acknowledgment,
    Reconnected,
    Disconnected,
    UnexpectedDisconnect,
    AccessDenied,
    Timeout,
    Unknown,
}

/// Событие статуса, как его доставляет транспорт.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEvent {
    pub operation: OperationKind,
    pub category: StatusCategory,
    /// Каналы, которых касается событие (может быть пусто).
    pub affected_channels: Vec<Channel>,
}

/// Классифицированный переход жизненного цикла соединения.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusTransition {
    Connected,
    Disconnected,
    Undefined,
}

impl StatusEvent {
    pub fn new(
        operation: OperationKind,
        category: StatusCategory,
    ) -> Self {
        Self {
            operation,
            category,
            affected_channels: Vec::new(),
        }
    }

    pub fn with_channels<I, C>(
        mut self,
        channels: I,
    ) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Channel>,
    {
        self.affected_channels = channels.into_iter().map(Into::into).collect();
        self
    }

    /// Классификация этого события.
    pub fn transition(&self) -> StatusTransition {
        StatusTransition::classify(self)
    }
}

impl StatusTransition {
    /// `(Subscribe, Connected) -> Connected`,
    /// `(Unsubscribe, Acknowledgment) -> Disconnected`, остальное —
    /// `Undefined`.
    pub fn classify(event: &StatusEvent) -> Self {
        Self::from_parts(event.operation, event.category)
    }

    pub const fn from_parts(
        operation: OperationKind,
        category: StatusCategory,
    ) -> Self {
        match (operation, category) {
            (OperationKind::Subscribe, StatusCategory::Connected) => Self::Connected,
            (OperationKind::Unsubscribe, StatusCategory::Acknowledgment) => Self::Disconnected,
            _ => Self::Undefined,
        }
    }

    /// Строка, публикуемая в канал статуса.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "subscribed",
            Self::Disconnected => "unsubscribed",
            Self::Undefined => "UNDEFINED",
        }
    }
}

impl fmt::Display for StatusTransition {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    /// Тест проверяет таблицу классификации статусов.
    #[rstest]
    #[case(OperationKind::Subscribe, StatusCategory::Connected, StatusTransition::Connected)]
    #[case(OperationKind::Unsubscribe, StatusCategory::Acknowledgment, StatusTransition::Disconnected)]
    #[case(OperationKind::Subscribe, StatusCategory::Acknowledgment, StatusTransition::Undefined)]
    #[case(OperationKind::Unsubscribe, StatusCategory::Connected, StatusTransition::Undefined)]
    #[case(OperationKind::Subscribe, StatusCategory::Reconnected, StatusTransition::Undefined)]
    #[case(OperationKind::Heartbeat, StatusCategory::Connected, StatusTransition::Undefined)]
    #[case(OperationKind::Publish, StatusCategory::Acknowledgment, StatusTransition::Undefined)]
    #[case(OperationKind::Subscribe, StatusCategory::UnexpectedDisconnect, StatusTransition::Undefined)]
    #[case(OperationKind::Unsubscribe, StatusCategory::Disconnected, StatusTransition::Undefined)]
    #[case(OperationKind::Subscribe, StatusCategory::AccessDenied, StatusTransition::Undefined)]
    #[case(OperationKind::Subscribe, StatusCategory::Timeout, StatusTransition::Undefined)]
    #[case(OperationKind::Subscribe, StatusCategory::Unknown, StatusTransition::Undefined)]
    fn test_classify(
        #[case] operation: OperationKind,
        #[case] category: StatusCategory,
        #[case] expected: StatusTransition,
    ) {
        let event = StatusEvent::new(operation, category);
        assert_eq!(event.transition(), expected);
    }

    /// Тест проверяет строки, которые видят внешние наблюдатели.
    #[test]
    fn test_wire_strings() {
        assert_eq!(StatusTransition::Connected.as_str(), "subscribed");
        assert_eq!(StatusTransition::Disconnected.to_string(), "unsubscribed");
        assert_eq!(StatusTransition::Undefined.as_str(), "UNDEFINED");
    }

    /// Тест проверяет, что список каналов события заполняется.
    #[test]
    fn test_with_channels() {
        let event = StatusEvent::new(OperationKind::Subscribe, StatusCategory::Connected)
            .with_channels(["a", "b"]);
        assert_eq!(event.affected_channels.len(), 2);
        assert_eq!(&*event.affected_channels[1], "b");
    }
}
