use std::{path::Path, time::Duration};

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    logging::LoggingConfig,
    pubsub::{
        LocalTransportConfig, DEFAULT_INBOX_CAPACITY, DEFAULT_MAX_MESSAGE_SIZE,
        DEFAULT_QUEUE_CAPACITY, DEFAULT_TRANSPORT_UUID,
    },
    session::{SessionConfig, StatusMode, DEFAULT_STATUS_CHANNEL},
};

/// Таймаут ожидания консоли, если он не указан в команде.
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 30_000;

/// Ошибки загрузки настроек.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] ConfigError),
    #[error("invalid settings: {0}")]
    Invalid(String),
}

/// Настройки процесса.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub session: SessionSettings,
    pub transport: TransportSettings,
    pub listener: ListenerSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Фиксированный идентификатор сессии
    pub id: Option<String>,
    pub status_mode: StatusMode,
    /// Имя канала статуса для `status_mode = "fixed"`
    pub status_channel: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportSettings {
    pub uuid: String,
    pub max_message_size: usize,
    /// Ёмкость входящей очереди потока доставки
    pub inbox_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerSettings {
    pub queue_capacity: usize,
    /// Таймаут `listen`/`presence` в консоли, если он не указан явно
    pub default_timeout_ms: u64,
}

impl Settings {
    /// Значения по умолчанию, затем файл (если задан), затем переменные
    /// окружения `PUBWAIT_<SECTION>__<KEY>`.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut builder = Config::builder()
            // Добавляем значения по умолчанию
            .set_default("session.status_mode", "per_session")?
            .set_default("session.status_channel", DEFAULT_STATUS_CHANNEL)?
            .set_default("transport.uuid", DEFAULT_TRANSPORT_UUID)?
            .set_default("transport.max_message_size", DEFAULT_MAX_MESSAGE_SIZE as u64)?
            .set_default("transport.inbox_capacity", DEFAULT_INBOX_CAPACITY as u64)?
            .set_default("listener.queue_capacity", DEFAULT_QUEUE_CAPACITY as u64)?
            .set_default("listener.default_timeout_ms", DEFAULT_WAIT_TIMEOUT_MS)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let cfg = builder
            .add_source(
                Environment::with_prefix("PUBWAIT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        // Десериализуем конфигурацию в нашу структуру
        let settings: Settings = cfg.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.listener.queue_capacity == 0 {
            return Err(SettingsError::Invalid(
                "listener.queue_capacity must be greater than zero".to_string(),
            ));
        }
        if self.session.status_mode == StatusMode::Fixed && self.session.status_channel.is_empty() {
            return Err(SettingsError::Invalid(
                "session.status_channel must not be empty in fixed mode".to_string(),
            ));
        }
        if self.listener.default_timeout_ms == 0 {
            return Err(SettingsError::Invalid(
                "listener.default_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.transport.inbox_capacity == 0 {
            return Err(SettingsError::Invalid(
                "transport.inbox_capacity must be greater than zero".to_string(),
            ));
        }
        if self.transport.max_message_size == 0 {
            return Err(SettingsError::Invalid(
                "transport.max_message_size must be greater than zero".to_string(),
            ));
        }
        self.logging
            .validate()
            .map_err(|e| SettingsError::Invalid(e.to_string()))
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            id: self.session.id.clone(),
            status_mode: self.session.status_mode,
            fixed_status_channel: self.session.status_channel.clone(),
            queue_capacity: self.listener.queue_capacity,
        }
    }

    pub fn transport_config(&self) -> LocalTransportConfig {
        LocalTransportConfig {
            uuid: self.transport.uuid.clone(),
            max_message_size: self.transport.max_message_size,
            inbox_capacity: self.transport.inbox_capacity,
        }
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.listener.default_timeout_ms)
    }
}
