use std::fmt;

use num_enum::TryFromPrimitive;
#[cfg(feature = "serde_repr")]
use serde_repr::{Deserialize_repr, Serialize_repr};
#[cfg(feature = "strum")]
use strum_macros::{AsRefStr, EnumIter};

/// Коды статуса для категоризации ошибок.
///
/// # Диапазоны:
/// - 0xxx: Успех
/// - 1xxx: Общие ошибки
/// - 2xxx: Ошибки данных (каналы, payload)
/// - 4xxx: Ограничения
/// - 6xxx: Транспорт / ожидание
/// - 8xxx: Протокольные ограничения
///
/// # Реализация:
/// - `num_enum::TryFromPrimitive` даёт нативную реализацию `TryFrom<u32>`.
/// - опционально: `strum` для `AsRefStr`/`EnumIter` (feature = "strum").
/// - опционально: `serde_repr` для сериализации в виде числового значения
///   (feature = "serde_repr").
#[cfg_attr(feature = "strum", derive(AsRefStr, EnumIter))]
#[cfg_attr(feature = "serde_repr", derive(Serialize_repr, Deserialize_repr))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
#[non_exhaustive]
pub enum StatusCode {
    // === 0xxx: Успех ===
    Success = 0,

    // === 1xxx: Общие ошибки ===
    Unknown = 1000,
    Unsupported = 1001,
    Unexpected = 1002,
    Internal = 1003,
    InvalidArgs = 1004,
    NotImplemented = 1005,

    // === 2xxx: Ошибки данных ===
    NotFound = 2000,
    InvalidChannel = 2001,
    InvalidValue = 2002,
    SerializationFailed = 2003,

    // === 4xxx: Ограничения ===
    RateLimited = 4000,
    QueueFull = 4001,

    // === 6xxx: Транспорт/ожидание ===
    ConnectionClosed = 6001,
    Timeout = 6002,
    TransportFailed = 6003,
    Interrupted = 6004,
    RelayFailed = 6005,

    // === 8xxx: Протокол ===
    SizeLimit = 8000,
    InvalidUtf8 = 8001,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StatusCode {
    /// Числовое представление кода статуса.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Возвращает `true`, если операцию с этим кодом имеет смысл повторить.
    ///
    /// Ядро само ничего не повторяет: решение остаётся за вызывающим.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::RateLimited | Self::TransportFailed | Self::Interrupted
        )
    }

    /// Рекомендуемый уровень логирования для данного кода.
    pub fn log_level(&self) -> LogLevel {
        match self {
            Self::Success => LogLevel::Trace,
            Self::NotFound | Self::Interrupted => LogLevel::Debug,
            Self::InvalidArgs | Self::InvalidChannel | Self::InvalidValue | Self::SizeLimit => {
                LogLevel::Info
            }
            Self::RateLimited
            | Self::QueueFull
            | Self::Timeout
            | Self::ConnectionClosed
            | Self::RelayFailed => LogLevel::Warn,
            Self::Internal | Self::Unexpected | Self::TransportFailed => LogLevel::Error,
            _ => LogLevel::Warn,
        }
    }

    /// HTTP-статус, соответствующий коду статуса.
    ///
    /// Используется слоем запросов при формировании ответов.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Success => 200,
            Self::NotFound => 404,
            Self::InvalidArgs
            | Self::InvalidChannel
            | Self::InvalidValue
            | Self::InvalidUtf8
            | Self::SerializationFailed => 400,
            Self::SizeLimit => 413,
            Self::RateLimited | Self::QueueFull => 429,
            Self::Timeout => 408,
            Self::NotImplemented | Self::Unsupported => 501,
            Self::TransportFailed => 502,
            Self::ConnectionClosed => 503,
            _ => 500,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для StatusCode
////////////////////////////////////////////////////////////////////////////////

impl From<StatusCode> for u32 {
    fn from(c: StatusCode) -> Self {
        c.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        #[cfg(feature = "strum")]
        {
            write!(f, "{} ({})", self.as_ref(), self.code())
        }
        #[cfg(not(feature = "strum"))]
        {
            write!(f, "{:?} ({})", self, self.code())
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
