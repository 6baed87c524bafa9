use std::{fs, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Уровни, допустимые в `logging.level`.
const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Ошибки инициализации логирования.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log level '{0}', expected one of trace|debug|info|warn|error")]
    InvalidLevel(String),
    #[error("log file name must not be empty")]
    EmptyFileName,
    #[error("failed to prepare log directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("global subscriber already set: {0}")]
    AlreadyInitialized(String),
}

/// Формат вывода событий.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

/// Конфигурация логирования.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Уровень для крейтов `pubwait*`; остальные пишут от `warn`
    pub level: String,
    pub console: ConsoleConfig,
    pub file: FileConfig,
}

/// Вывод в stdout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    pub format: LogFormat,
    pub with_ansi: bool,
    pub with_target: bool,
    pub with_thread_ids: bool,
    pub with_line_numbers: bool,
}

/// Ежедневно ротируемый файл.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub enabled: bool,
    pub format: LogFormat,
    pub dir: PathBuf,
    pub filename: String,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), LoggingError> {
        if !LEVELS.contains(&self.level.to_ascii_lowercase().as_str()) {
            return Err(LoggingError::InvalidLevel(self.level.clone()));
        }
        if self.file.enabled && self.file.filename.is_empty() {
            return Err(LoggingError::EmptyFileName);
        }
        Ok(())
    }

    /// Директива для `EnvFilter`, если `RUST_LOG` не задан.
    pub fn build_filter_directive(&self) -> String {
        let level = self.level.to_ascii_lowercase();
        format!("warn,pubwait={level},pubwait_error={level}")
    }

    /// Создаёт каталог логов, если файловый вывод включён.
    pub fn ensure_log_dir(&self) -> Result<(), LoggingError> {
        if self.file.enabled {
            fs::create_dir_all(&self.file.dir)?;
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console: ConsoleConfig::default(),
            file: FileConfig::default(),
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            format: LogFormat::Compact,
            with_ansi: true,
            with_target: true,
            with_thread_ids: false,
            with_line_numbers: false,
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            format: LogFormat::Json,
            dir: PathBuf::from("logs"),
            filename: "pubwait.log".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    /// Тест проверяет значения по умолчанию.
    #[test]
    fn test_defaults() {
        let cfg = LoggingConfig::default();
        assert!(cfg.validate().is_ok());
        assert!(cfg.console.enabled);
        assert!(!cfg.file.enabled);
        assert_eq!(cfg.build_filter_directive(), "warn,pubwait=info,pubwait_error=info");
    }

    /// Тест проверяет отказ на неизвестном уровне.
    #[test]
    fn test_invalid_level() {
        let cfg = LoggingConfig {
            level: "loud".to_string(),
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(LoggingError::InvalidLevel(l)) if l == "loud"));
    }

    /// Тест проверяет, что каталог логов создаётся только при включённом
    /// файловом выводе.
    #[test]
    fn test_ensure_log_dir() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path().join("nested/logs");

        let mut cfg = LoggingConfig::default();
        cfg.file.dir = dir.clone();
        cfg.ensure_log_dir().unwrap();
        assert!(!dir.exists());

        cfg.file.enabled = true;
        cfg.ensure_log_dir().unwrap();
        assert!(dir.is_dir());
    }

    /// Тест проверяет разбор формата из нижнего регистра.
    #[test]
    fn test_format_deserialize() {
        let f: LogFormat = serde_json::from_str("\"pretty\"").unwrap();
        assert_eq!(f, LogFormat::Pretty);
    }
}
