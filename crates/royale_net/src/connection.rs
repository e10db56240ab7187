//! NATS connection management.
//!
//! Provides a thin wrapper around `async-nats` with royale defaults.

use tracing::info;

use crate::error::NetError;
use crate::pool::PooledBuffer;

/// Default NATS server URL.
pub const DEFAULT_NATS_URL: &str = "nats://localhost:4222";

/// The environment variable used to override the NATS URL.
pub const NATS_URL_ENV: &str = "NATS_URL";

/// A wrapper around an `async-nats` client.
#[derive(Debug, Clone)]
pub struct NatsConnection {
    client: async_nats::Client,
}

impl NatsConnection {
    /// Connect to NATS at the specified URL.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Connect`] if the connection cannot be established.
    pub async fn connect_to(url: &str) -> Result<Self, NetError> {
        info!(url, "connecting to NATS");
        let client = async_nats::connect(url).await?;
        info!("NATS connection established");
        Ok(Self { client })
    }

    /// Publish a JSON-encoded control message.
    ///
    /// # Errors
    ///
    /// Returns [`NetError`] if encoding or publishing fails.
    pub async fn publish<T: serde::Serialize>(
        &self,
        subject: &str,
        message: &T,
    ) -> Result<(), NetError> {
        let payload = serde_json::to_vec(message)?;
        self.client
            .publish(subject.to_string(), payload.into())
            .await?;
        Ok(())
    }

    /// Publish an encoded frame.
    ///
    /// The frame's buffer becomes the payload as-is and goes back to its pool
    /// once the client has written it out.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Publish`] if publishing fails.
    pub async fn publish_frame(&self, subject: &str, frame: PooledBuffer) -> Result<(), NetError> {
        self.client
            .publish(subject.to_string(), frame.into_bytes())
            .await?;
        Ok(())
    }

    /// Subscribe to a subject.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Subscribe`] if the subscription fails.
    pub async fn subscribe(&self, subject: &str) -> Result<async_nats::Subscriber, NetError> {
        let sub = self.client.subscribe(subject.to_string()).await?;
        Ok(sub)
    }
}
