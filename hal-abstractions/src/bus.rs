//! Message bus contract
//!
//! Inbound delivery is pull-driven: the owner calls [`MessageBus::pump`] with
//! the handler that should see buffered messages. There is no process-wide
//! callback registration, so several independent controllers can share a
//! test binary.

/// Bus operation errors
///
/// Every variant is transient. Callers recover by reconnecting on a later
/// attempt; none of them is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// Operation attempted without an established session
    NotConnected,
    /// Broker refused or did not answer the connect request
    ConnectFailed,
    /// Subscription was not acknowledged
    SubscribeFailed,
    /// Publish could not be queued or sent
    PublishFailed,
    /// Session dropped while the operation was in progress
    Disconnected,
}

impl core::fmt::Display for BusError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "Bus not connected"),
            Self::ConnectFailed => write!(f, "Bus connect failed"),
            Self::SubscribeFailed => write!(f, "Bus subscribe failed"),
            Self::PublishFailed => write!(f, "Bus publish failed"),
            Self::Disconnected => write!(f, "Bus disconnected"),
        }
    }
}

impl core::error::Error for BusError {}

/// Receiver of inbound bus messages
///
/// The payload slice is only valid for the duration of the call.
pub trait MessageHandler {
    fn on_message(&mut self, topic: &str, payload: &[u8]);
}

/// Publish/subscribe message bus
///
/// # Example Implementation
/// ```ignore
/// struct MqttBus { client: Client<'static, ..> }
///
/// impl MessageBus for MqttBus {
///     fn pump(&mut self, handler: &mut dyn MessageHandler) -> Result<(), BusError> {
///         while let Some(publish) = self.client.poll()? {
///             handler.on_message(publish.topic(), publish.payload());
///         }
///         Ok(())
///     }
///     // ...
/// }
/// ```
pub trait MessageBus {
    /// Open a session with the broker using `client_id`
    fn connect(&mut self, client_id: &str) -> Result<(), BusError>;

    /// Subscribe to `topic`
    ///
    /// Called again after every reconnect; implementations should treat a
    /// repeated subscription as a no-op.
    fn subscribe(&mut self, topic: &str) -> Result<(), BusError>;

    /// Publish `payload` on `topic` (at-most-once)
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BusError>;

    /// Whether a session is currently established
    fn is_connected(&self) -> bool;

    /// Deliver every buffered inbound message to `handler`, then return
    ///
    /// Must not block waiting for new traffic.
    fn pump(&mut self, handler: &mut dyn MessageHandler) -> Result<(), BusError>;
}
