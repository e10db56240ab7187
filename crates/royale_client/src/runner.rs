//! Client runner — connects a [`Dispatcher`] to a royale server over NATS.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use futures::StreamExt;
use royale_net::messages::{ClientEnvelope, ClientMessage, ServerMessage};
use royale_net::{NatsConnection, NetError, subjects};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::dispatch::{Dispatcher, Event};

/// Drives one client connection.
#[derive(Debug)]
pub struct ClientRunner {
    config: ClientConfig,
    client_id: Uuid,
}

impl ClientRunner {
    /// Create a runner with a fresh connection id.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            client_id: Uuid::new_v4(),
        }
    }

    /// This connection's id.
    #[must_use]
    pub fn client_id(&self) -> Uuid {
        self.client_id
    }

    /// Wrap a report for the server.
    #[must_use]
    pub fn envelope(&self, message: ClientMessage) -> ClientEnvelope {
        ClientEnvelope {
            client_id: self.client_id,
            message,
        }
    }

    /// Run the client lifecycle.
    ///
    /// 1. Connect to NATS.
    /// 2. Subscribe to this client's control and frame subjects.
    /// 3. Publish a join.
    /// 4. Loop: feed control messages, frames, ticks, and `inputs` to the
    ///    dispatcher and publish its reports.
    /// 5. On `shutdown` or when `inputs` closes, publish a leave.
    ///
    /// # Errors
    ///
    /// Returns an error if the NATS connection, a subscription, or the join or
    /// leave publish fails. A failed report publish is logged and skipped.
    pub async fn run<S>(self, mut inputs: mpsc::UnboundedReceiver<Event>, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        let url = self.config.nats_url();
        info!(client_id = %self.client_id, url, "client starting");
        let conn = NatsConnection::connect_to(url).await?;

        let mut control = conn.subscribe(&subjects::client_control(self.client_id)).await?;
        let mut frames = conn.subscribe(&subjects::client_frames(self.client_id)).await?;
        self.publish(&conn, ClientMessage::Join).await?;
        info!(client_id = %self.client_id, "join sent");

        let mut dispatcher = Dispatcher::new(self.config.clone());
        let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / self.config.tick_rate));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            let event = tokio::select! {
                () = &mut shutdown => break,
                Some(msg) = control.next() => {
                    match ServerMessage::from_json(&msg.payload) {
                        Ok(ServerMessage::StartGame(start)) => Event::StartGame(start),
                        Err(e) => {
                            warn!(error = %e, "malformed control message");
                            continue;
                        }
                    }
                }
                Some(msg) = frames.next() => Event::Frame(msg.payload.to_vec()),
                _ = ticker.tick() => Event::Tick,
                input = inputs.recv() => match input {
                    Some(event) => event,
                    None => break,
                },
            };

            self.forward(&conn, dispatcher.dispatch(event)).await;
        }

        self.publish(&conn, ClientMessage::Leave).await?;
        info!(client_id = %self.client_id, passes = dispatcher.passes(), "client left");
        Ok(())
    }

    async fn publish(&self, sink: &impl ReportSink, message: ClientMessage) -> Result<()> {
        debug!(client_id = %self.client_id, ?message, "sending report");
        sink.send_report(&self.envelope(message)).await?;
        Ok(())
    }

    /// Publish `reports` in order. Returns how many went out.
    async fn forward(&self, sink: &impl ReportSink, reports: Vec<ClientMessage>) -> usize {
        let mut sent = 0;
        for report in reports {
            match self.publish(sink, report).await {
                Ok(()) => sent += 1,
                Err(e) => warn!(client_id = %self.client_id, error = %e, "report publish failed"),
            }
        }
        sent
    }
}

/// Where client reports go.
trait ReportSink {
    async fn send_report(&self, envelope: &ClientEnvelope) -> Result<(), NetError>;
}

impl ReportSink for NatsConnection {
    async fn send_report(&self, envelope: &ClientEnvelope) -> Result<(), NetError> {
        self.publish(subjects::SESSION_INBOUND, envelope).await
    }
}
