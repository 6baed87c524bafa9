//! Слой запросов поверх [`Session`].
//!
//! Каждый обработчик отвечает [`Reply`] с HTTP-статусом и JSON-телом.
//! Ошибки проходят через [`StackError`]: статус берётся из
//! [`StatusCode::http_status`], текст из `client_message`.

use std::{collections::BTreeSet, time::Duration};

use pubwait_error::{bail, ensure, LogLevel, PubwaitResult, ResultExt, StackError, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, trace, warn};

use crate::{
    pubsub::{channel_set, Channel},
    session::Session,
};

/// Сообщение, публикуемое `publish_sync` без явного payload.
pub const DEFAULT_PUBLISH_PAYLOAD: &str = "hey";

/// Ответ обработчика.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub status: u16,
    pub body: Value,
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    /// Ответ об ошибке. Уровень лога берётся из кода статуса, клиент видит
    /// только `client_message`.
    pub fn from_error(err: &StackError) -> Self {
        let tags = err.metrics_tags();
        let retryable = err.status_code().is_retryable();
        let detail = err.log_message();
        match err.log_level() {
            LogLevel::Error => error!(?tags, retryable, "{detail}"),
            LogLevel::Warn => warn!(?tags, retryable, "{detail}"),
            LogLevel::Info => info!(?tags, retryable, "{detail}"),
            LogLevel::Debug => debug!(?tags, retryable, "{detail}"),
            LogLevel::Trace => trace!(?tags, retryable, "{detail}"),
        }

        let body = err.to_body();
        Self {
            status: body.status,
            body: serde_json::to_value(&body)
                .unwrap_or_else(|_| json!({ "message": body.message })),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

fn respond(result: PubwaitResult<Value>) -> Reply {
    match result {
        Ok(body) => Reply::ok(body),
        Err(err) => Reply::from_error(&err),
    }
}

fn channels_body(channels: &BTreeSet<Channel>) -> Value {
    let names: Vec<&str> = channels.iter().map(|c| &**c).collect();
    json!({ "subscribed_channels": names })
}

fn required_channels(channels: &[String]) -> PubwaitResult<BTreeSet<Channel>> {
    ensure!(!channels.is_empty(), StatusCode::InvalidArgs, "Channel missing");
    Ok(channel_set(channels))
}

/// Публикует payload (по умолчанию `"hey"`) в первый из переданных каналов.
pub fn publish_sync(
    session: &Session,
    channels: &[String],
    payload: Option<Value>,
) -> Reply {
    respond(try_publish(session, channels, payload))
}

fn try_publish(
    session: &Session,
    channels: &[String],
    payload: Option<Value>,
) -> PubwaitResult<Value> {
    let Some(channel) = channels.first() else {
        bail!(StatusCode::InvalidArgs, "Channel missing");
    };
    let payload = payload.unwrap_or_else(|| Value::from(DEFAULT_PUBLISH_PAYLOAD));
    let timetoken = session
        .publish(channel, payload)
        .with_context(|| format!("publish to {channel}"))?;
    Ok(json!({ "original_result": timetoken.to_string() }))
}

/// Асинхронная публикация не поддерживается.
pub fn publish_async() -> Reply {
    Reply {
        status: StatusCode::NotImplemented.http_status(),
        body: Value::Null,
    }
}

pub fn app_key(session: &Session) -> Reply {
    Reply::ok(json!({ "app_key": session.app_key() }))
}

/// Ждёт первое сообщение на любом из подписанных каналов.
pub fn listen(session: &Session) -> Reply {
    respond(
        session
            .listen()
            .context("listen")
            .map(|message| json!({ "message": message.payload })),
    )
}

/// Как [`listen`], но не дольше `timeout`; по истечении 408.
pub fn listen_timeout(
    session: &Session,
    timeout: Duration,
) -> Reply {
    respond(try_listen_timeout(session, timeout))
}

fn try_listen_timeout(
    session: &Session,
    timeout: Duration,
) -> PubwaitResult<Value> {
    let Some(message) = session.listen_timeout(timeout).context("listen")? else {
        bail!(StatusCode::Timeout, "Listen timed out");
    };
    Ok(json!({ "message": message.payload }))
}

/// Ждёт событие присутствия не дольше `timeout`; по истечении 408.
pub fn presence(
    session: &Session,
    timeout: Duration,
) -> Reply {
    respond(try_presence(session, timeout))
}

fn try_presence(
    session: &Session,
    timeout: Duration,
) -> PubwaitResult<Value> {
    let Some(event) = session
        .listen_presence_timeout(timeout)
        .context("listen presence")?
    else {
        bail!(StatusCode::Timeout, "Presence wait timed out");
    };
    Ok(json!({ "channel": &*event.channel, "payload": event.payload }))
}

pub fn status_channel(session: &Session) -> Reply {
    Reply::ok(json!({ "status_channel": session.status_channel().as_str() }))
}

/// Список текущих подписок.
pub fn index(session: &Session) -> Reply {
    respond(
        session
            .list_channels()
            .context("list subscribed channels")
            .map(|channels| channels_body(&channels)),
    )
}

pub fn add_channel(
    session: &Session,
    channels: &[String],
) -> Reply {
    respond(required_channels(channels).and_then(|names| {
        session
            .add_channels(&names)
            .context("add channels")
            .map(|channels| channels_body(&channels))
    }))
}

pub fn remove_channel(
    session: &Session,
    channels: &[String],
) -> Reply {
    respond(required_channels(channels).and_then(|names| {
        session
            .remove_channels(&names)
            .context("remove channels")
            .map(|channels| channels_body(&channels))
    }))
}
