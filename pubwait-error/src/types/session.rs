use std::any::Any;

use thiserror::Error;

use crate::{ErrorExt, StatusCode, TransportError};

/// Ошибки сессии: ожидание событий и операции над подписками.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Некорректный аргумент (например, пустой набор каналов)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Транспорт вернул ошибку; деталь сохраняется как есть
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Ожидание прервано вызывающим
    #[error("wait interrupted")]
    Interrupted,

    /// Слушатель уже снят с регистрации и закрыт
    #[error("listener is closed")]
    Closed,

    /// Status relay не смог опубликовать классификацию.
    ///
    /// Никогда не возвращается вызывающему: только логируется.
    #[error("status relay failed to publish '{status}' to {channel}: {source}")]
    RelayPublish {
        channel: String,
        status: &'static str,
        #[source]
        source: TransportError,
    },
}

impl ErrorExt for SessionError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidArgument(_) => StatusCode::InvalidArgs,
            Self::Transport(inner) => inner.status_code(),
            Self::Interrupted => StatusCode::Interrupted,
            Self::Closed => StatusCode::ConnectionClosed,
            Self::RelayPublish { .. } => StatusCode::RelayFailed,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn client_message(&self) -> String {
        match self {
            Self::InvalidArgument(reason) => reason.clone(),
            Self::Transport(inner) => inner.client_message(),
            Self::Interrupted => "Wait interrupted".to_string(),
            Self::Closed => "Listener closed".to_string(),
            Self::RelayPublish { .. } => "Internal server error".to_string(),
        }
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Transport(inner) => inner.metrics_tags(),
            Self::RelayPublish {
                channel, status, ..
            } => vec![
                ("error_type", "status_relay".to_string()),
                ("status_code", self.status_code().to_string()),
                ("channel", channel.clone()),
                ("status", status.to_string()),
            ],
            _ => vec![
                ("error_type", "session".to_string()),
                ("status_code", self.status_code().to_string()),
            ],
        }
    }
}
