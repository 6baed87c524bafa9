use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{SystemTime, UNIX_EPOCH},
};

use serde::Serialize;
use serde_json::Value;

/// Имя канала. Ядро не интерпретирует его структуру.
pub type Channel = Arc<str>;

/// Маркер последовательности, выдаваемый транспортом при публикации.
///
/// Единица — 1/10 мкс от Unix epoch (17 десятичных цифр).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Timetoken(pub u64);

/// Источник строго возрастающих [`Timetoken`].
#[derive(Debug, Default)]
pub struct TimetokenClock {
    last: AtomicU64,
}

/// Сообщение, доставленное транспортом слушателям.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InboundMessage {
    pub channel: Channel,
    pub payload: Value,
    pub timetoken: Timetoken,
}

/// Событие присутствия (join/leave/...), отдельный логический поток.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresenceEvent {
    pub channel: Channel,
    pub payload: Value,
}

impl Timetoken {
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Timetoken {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TimetokenClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Следующий токен: текущее время, но не меньше предыдущего + 1.
    pub fn next(&self) -> Timetoken {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| (d.as_nanos() / 100) as u64)
            .unwrap_or_default();

        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(prev + 1);
            match self.last.compare_exchange_weak(
                prev,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Timetoken(candidate),
                Err(actual) => prev = actual,
            }
        }
    }
}

impl InboundMessage {
    pub fn new(
        channel: impl Into<Channel>,
        payload: Value,
        timetoken: Timetoken,
    ) -> Self {
        Self {
            channel: channel.into(),
            payload,
            timetoken,
        }
    }
}

impl PresenceEvent {
    pub fn new(
        channel: impl Into<Channel>,
        payload: Value,
    ) -> Self {
        Self {
            channel: channel.into(),
            payload,
        }
    }

    /// Значение поля `action` (`join`, `leave`, ...), если оно есть.
    pub fn action(&self) -> Option<&str> {
        self.payload.get("action").and_then(Value::as_str)
    }
}
