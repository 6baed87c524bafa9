use std::{
    path::PathBuf,
    sync::atomic::{AtomicBool, Ordering},
    time::Instant,
};

use tracing_appender::non_blocking::WorkerGuard;

/// Handle для управления lifecycle логирования.
///
/// Держит guard файлового writer'а: пока handle жив, фоновый поток
/// дописывает буфер в файл.
pub struct LoggingHandle {
    file_guard: Option<WorkerGuard>,
    file_dir: Option<PathBuf>,
    shutdown: AtomicBool,
}

impl LoggingHandle {
    pub fn new(
        file_guard: Option<WorkerGuard>,
        file_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            file_guard,
            file_dir,
            shutdown: AtomicBool::new(false),
        }
    }

    /// Handle без файлового вывода.
    pub fn console_only() -> Self {
        Self::new(None, None)
    }

    pub fn has_file_sink(&self) -> bool {
        self.file_guard.is_some()
    }

    pub fn file_dir(&self) -> Option<&PathBuf> {
        self.file_dir.as_ref()
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Сбрасывает файловый буфер и завершает фоновый writer.
    pub fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::Release);
        tracing::info!(file_sink = self.has_file_sink(), "logging shutdown");

        let start = Instant::now();
        drop(self.file_guard.take());
        tracing::debug!(
            shutdown_duration_ms = start.elapsed().as_millis() as u64,
            "logging shutdown completed"
        );
    }
}
