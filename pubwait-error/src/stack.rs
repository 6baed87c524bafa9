use std::{fmt, panic::Location, sync::Arc};

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::{ErrorExt, LogLevel, StatusCode};

/// Ошибка слоя запросов: корневая ошибка домена и цепочка шагов, через
/// которые она поднялась.
///
/// Шаг записывает, что делал обработчик (`"add channels"`,
/// `"publish to news"`), и место вызова.
#[derive(Clone)]
pub struct StackError {
    root: Arc<dyn ErrorExt>,
    trail: Vec<Frame>,
}

/// Один шаг цепочки.
#[derive(Debug, Clone)]
pub struct Frame {
    pub message: String,
    pub location: &'static Location<'static>,
}

/// Тело ответа об ошибке: `{"message": "..."}`.
///
/// HTTP-статус идёт отдельно от тела и не сериализуется.
#[cfg(feature = "serde")]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    #[serde(skip)]
    pub status: u16,
    pub message: String,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StackError {
    pub fn new<E: ErrorExt>(err: E) -> Self {
        Self {
            root: Arc::new(err),
            trail: Vec::new(),
        }
    }

    /// Добавляет шаг к цепочке.
    #[track_caller]
    pub fn context(
        mut self,
        msg: impl Into<String>,
    ) -> Self {
        self.trail.push(Frame {
            message: msg.into(),
            location: Location::caller(),
        });
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.root.status_code()
    }

    pub fn client_message(&self) -> String {
        self.root.client_message()
    }

    /// Шаги от самого внутреннего к внешнему.
    pub fn frames(&self) -> &[Frame] {
        &self.trail
    }

    pub fn log_level(&self) -> LogLevel {
        self.status_code().log_level()
    }

    pub fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        self.root.metrics_tags()
    }

    /// Строка для логов: шаги с местами вызова и отладочный вид корня.
    pub fn log_message(&self) -> String {
        let mut out = String::new();
        for frame in self.trail.iter().rev() {
            out.push_str(&format!("{frame} <- "));
        }
        out.push_str(&self.root.log_message());
        out
    }

    /// Тело ответа для слоя запросов.
    #[cfg(feature = "serde")]
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            status: self.status_code().http_status(),
            message: self.client_message(),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl fmt::Display for Frame {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(
            f,
            "{} ({}:{})",
            self.message,
            self.location.file(),
            self.location.line()
        )
    }
}

impl fmt::Debug for StackError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("StackError")
            .field("status_code", &self.status_code())
            .field("root", &self.root.to_string())
            .field("trail", &self.trail)
            .finish()
    }
}

/// Внешний шаг первым: `add channels: publish to news: <корень>`.
impl fmt::Display for StackError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        for frame in self.trail.iter().rev() {
            write!(f, "{}: ", frame.message)?;
        }
        write!(f, "{}", self.root)
    }
}

impl std::error::Error for StackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.root.as_ref())
    }
}

impl<E: ErrorExt> From<E> for StackError {
    fn from(e: E) -> Self {
        StackError::new(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SessionError, TransportError};

    /// Тест проверяет порядок шагов и место вызова.
    #[test]
    fn test_trail_order() {
        let err = StackError::new(SessionError::Interrupted)
            .context("wait for message")
            .context("listen");

        let frames = err.frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].message, "wait for message");
        assert!(frames[0].location.file().ends_with("stack.rs"));
        assert_eq!(err.status_code(), StatusCode::Interrupted);
        assert_eq!(err.to_string(), "listen: wait for message: wait interrupted");
    }

    /// Тест проверяет, что строка для логов содержит места вызова, а
    /// клиентское сообщение нет.
    #[test]
    fn test_log_message_vs_client_message() {
        let err = StackError::new(TransportError::Rejected {
            operation: "subscribe",
            reason: "403 forbidden".to_string(),
        })
        .context("add channels");

        let log = err.log_message();
        assert!(log.starts_with("add channels (") && log.contains("stack.rs:"));
        assert!(log.contains("Rejected"));
        assert_eq!(err.client_message(), "403 forbidden");
        assert_eq!(err.log_level(), LogLevel::Error);
    }

    /// Тест проверяет тело ответа: только сообщение, статус отдельно.
    #[cfg(feature = "serde")]
    #[test]
    fn test_body() {
        let err = StackError::new(TransportError::MessageTooLarge {
            size: 40_000,
            max: 32_768,
        })
        .context("publish to news");

        let body = err.to_body();
        assert_eq!(body.status, 413);
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({ "message": "Message size exceeds limit (32768 bytes)" })
        );
    }
}
