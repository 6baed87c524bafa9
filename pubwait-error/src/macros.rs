/// Немедленно возвращает ошибку (аналогично `anyhow::bail!`).
///
/// Макрос возвращает `Err(StackError)` из текущей функции. Поддерживает три
/// формы:
/// - `bail!(err)` — принимает уже готовый тип ошибки или
///   `StackError`-совместимый тип;
/// - `bail!(code, "msg")` — создаёт `GenericError` с кодом и сообщением;
/// - `bail!(code, "fmt {}", arg)` — форматирует сообщение.
///
/// Пример:
///
/// ```ignore
/// use pubwait_error::{bail, StatusCode};
///
/// fn validate_channel(channel: &str) -> Result<(), crate::StackError> {
///     if channel.is_empty() {
///         bail!(StatusCode::InvalidChannel, "Channel cannot be empty");
///     }
///     if channel.len() > 92 {
///         bail!(StatusCode::InvalidChannel, "Channel too long: {} bytes", channel.len());
///     }
///     Ok(())
/// }
/// ```
#[macro_export]
macro_rules! bail {
    ($err:expr) => {
        return Err($crate::StackError::from($err))
    };
    ($code:expr, $msg:expr) => {
        return Err($crate::StackError::new(
            $crate::types::GenericError::new($code, $msg)
        ))
    };
    ($code:expr, $fmt:expr, $($arg:tt)*) => {
        return Err($crate::StackError::new(
            $crate::types::GenericError::new($code, format!($fmt, $($arg)*))
        ))
    };
}

/// Проверяет условие и вызывает `bail!`, если условие ложно.
///
/// Формы аналогичны `bail!`:
/// - `ensure!(cond, err)` — если `cond` ложно, выполняется `bail!(err)`.
/// - `ensure!(cond, code, "msg")` — если `cond` ложно, выполняется `bail!(code,
///   "msg")`.
/// - `ensure!(cond, code, "fmt {}", arg)` — форматированная форма.
///
/// Пример:
///
/// ```ignore
/// use pubwait_error::{ensure, StatusCode};
///
/// fn check_channels(channels: &[String]) -> Result<(), crate::StackError> {
///     ensure!(!channels.is_empty(), StatusCode::InvalidArgs, "Channel missing");
///     ensure!(channels.len() <= 64, StatusCode::InvalidArgs, "Too many channels: {}", channels.len());
///     Ok(())
/// }
/// ```
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !($cond) {
            $crate::bail!($err);
        }
    };
    ($cond:expr, $code:expr, $msg:expr) => {
        if !($cond) {
            $crate::bail!($code, $msg);
        }
    };
    ($cond:expr, $code:expr, $fmt:expr, $($arg:tt)*) => {
        if !($cond) {
            $crate::bail!($code, $fmt, $($arg)*);
        }
    };
}

/// Трейт-расширение для `Result`, добавляющее удобные методы контекстирования.
///
/// Позволяет вызывать `.context(...)` и `.with_context(...)` на результатах,
/// превращая ошибку в [`StackError`] и приклеивая к ней контекст.
pub trait ResultExt<T> {
    /// Добавляет контекст к ошибке: если `self` — `Err`, оборачивает ошибку в
    /// `StackError` и добавляет указанный контекст.
    fn context<C>(
        self,
        ctx: C,
    ) -> Result<T, crate::StackError>
    where
        C: Into<String>;

    /// Добавляет ленивый контекст (вызывается только в случае ошибки).
    ///
    /// Полезно, если формирование строки контекста дорогостоящее.
    fn with_context<C, F>(
        self,
        f: F,
    ) -> Result<T, crate::StackError>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<crate::StackError>,
{
    #[track_caller]
    fn context<C>(
        self,
        ctx: C,
    ) -> Result<T, crate::StackError>
    where
        C: Into<String>,
    {
        match self {
            Ok(val) => Ok(val),
            Err(e) => Err(e.into().context(ctx)),
        }
    }

    #[track_caller]
    fn with_context<C, F>(
        self,
        f: F,
    ) -> Result<T, crate::StackError>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        match self {
            Ok(val) => Ok(val),
            Err(e) => Err(e.into().context(f())),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GenericError, PubwaitResult, SessionError, StatusCode};

    #[test]
    fn test_bail_with_session_error() {
        fn example() -> PubwaitResult<()> {
            bail!(SessionError::Interrupted);
        }

        let err = example().unwrap_err();
        assert_eq!(err.status_code(), StatusCode::Interrupted);
    }

    #[test]
    fn test_bail_with_format() {
        fn example(len: usize) -> PubwaitResult<()> {
            bail!(StatusCode::InvalidChannel, "Channel too long: {} bytes", len);
        }

        let err = example(120).unwrap_err();
        assert!(err.to_string().contains("Channel too long: 120 bytes"));
    }

    #[test]
    fn test_ensure_channel_missing() {
        fn validate(channels: &[&str]) -> PubwaitResult<()> {
            ensure!(!channels.is_empty(), StatusCode::InvalidArgs, "Channel missing");
            Ok(())
        }

        assert!(validate(&["news"]).is_ok());
        let err = validate(&[]).unwrap_err();
        assert_eq!(err.client_message(), "Channel missing");
        assert_eq!(err.status_code().http_status(), 400);
    }

    #[test]
    fn test_result_ext_context() {
        fn inner() -> Result<(), SessionError> {
            Err(SessionError::Closed)
        }

        fn outer() -> PubwaitResult<()> {
            inner().context("listen")?;
            Ok(())
        }

        let err = outer().unwrap_err();
        assert_eq!(err.frames().len(), 1);
        assert_eq!(err.frames()[0].message, "listen");
        assert!(err.frames()[0].location.file().ends_with("macros.rs"));
        assert_eq!(err.frames()[0].location.line(), line!() - 8);
    }

    #[test]
    fn test_with_context_lazy() {
        let mut called = false;
        let ok: Result<(), GenericError> = Ok(());
        assert!(ok
            .with_context(|| {
                called = true;
                "never built"
            })
            .is_ok());
        assert!(!called);

        let res: Result<(), GenericError> = Err(GenericError::new(StatusCode::Internal, "boom"));
        let err = res.with_context(|| "publish").unwrap_err();
        assert_eq!(err.frames()[0].message, "publish");
    }
}
