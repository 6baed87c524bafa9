/// Process settings loading (defaults, file, environment).
pub mod config;
/// Request-layer façade over a session: JSON replies with HTTP statuses.
pub mod handlers;
/// Logging initialization (filters, formats, sinks).
pub mod logging;
/// Subscription event synchronizer: transport boundary, status relay,
/// blocking listener, subscription registry.
pub mod pubsub;
/// Session identity, status channel and wait requests.
pub mod session;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// Settings.
pub use config::{Settings, SettingsError};
/// Request handlers.
pub use handlers::Reply;
/// Logging.
pub use logging::{init_logging, LoggingConfig, LoggingHandle};
/// Pub/Sub core.
pub use pubsub::{
    BlockingEventListener, Channel, InboundMessage, Interrupter, ListenerGuard, LocalTransport,
    LocalTransportConfig, PresenceEvent, StatusEvent, StatusRelay, StatusTransition,
    SubscribeListener, SubscriptionRegistry, Timetoken, Transport,
};
/// Errors.
pub use pubwait_error::{PubwaitResult, SessionError, StackError, TransportError};
/// Session.
pub use session::{PendingWait, Session, SessionConfig, SessionId, StatusChannel, StatusMode};
