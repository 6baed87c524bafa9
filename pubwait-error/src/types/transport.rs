use std::any::Any;

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Ошибки транспортного клиента (publish / subscribe / unsubscribe).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Сериализованный payload превышает лимит транспорта
    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// Имя канала не принято транспортом
    #[error("invalid channel '{channel}': {reason}")]
    InvalidChannel { channel: String, reason: String },

    /// Payload не удалось сериализовать
    #[error("payload serialization failed: {reason}")]
    Serialization { reason: String },

    /// Транспорт остановлен или уничтожен
    #[error("transport is closed")]
    Closed,

    /// Транспорт отклонил операцию
    #[error("{operation} rejected by transport: {reason}")]
    Rejected {
        operation: &'static str,
        reason: String,
    },
}

impl ErrorExt for TransportError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::MessageTooLarge { .. } => StatusCode::SizeLimit,
            Self::InvalidChannel { .. } => StatusCode::InvalidChannel,
            Self::Serialization { .. } => StatusCode::SerializationFailed,
            Self::Closed => StatusCode::ConnectionClosed,
            Self::Rejected { .. } => StatusCode::TransportFailed,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn client_message(&self) -> String {
        match self {
            Self::MessageTooLarge { max, .. } => format!("Message size exceeds limit ({max} bytes)"),
            Self::InvalidChannel { channel, .. } => format!("Invalid channel: {channel}"),
            Self::Serialization { .. } => "Message format error".to_string(),
            Self::Closed => "Transport closed".to_string(),
            Self::Rejected { reason, .. } => reason.clone(),
        }
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", "transport".to_string()),
            ("status_code", self.status_code().to_string()),
        ];

        match self {
            Self::MessageTooLarge { size, max } => {
                tags.push(("message_size", size.to_string()));
                tags.push(("max_size", max.to_string()));
            }
            Self::InvalidChannel { channel, .. } => tags.push(("channel", channel.clone())),
            Self::Rejected { operation, .. } => tags.push(("operation", operation.to_string())),
            _ => {}
        }

        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_too_large() {
        let err = TransportError::MessageTooLarge {
            size: 40_000,
            max: 32_768,
        };
        assert_eq!(err.status_code(), StatusCode::SizeLimit);
        assert!(err.to_string().contains("40000 bytes"));

        let tags = err.metrics_tags();
        assert!(tags.iter().any(|(k, v)| *k == "max_size" && v == "32768"));
    }

    #[test]
    fn test_rejected_keeps_transport_detail() {
        let err = TransportError::Rejected {
            operation: "subscribe",
            reason: "403 forbidden".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::TransportFailed);
        assert_eq!(err.client_message(), "403 forbidden");
        assert_eq!(err.to_string(), "subscribe rejected by transport: 403 forbidden");
    }
}
