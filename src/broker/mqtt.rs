//! MQTT over secure WebSocket
//!
//! Each session gets its own `rumqttc` client. The event loop runs on a
//! dedicated task that feeds inbound publishes into the session's bounded
//! queue and hands subscribe acknowledgements back to the caller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Outgoing,
    Packet, QoS, SubAck, SubscribeReasonCode, Transport,
};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{BrokerConnector, BrokerLink, BrokerMessage};
use crate::error::{Error, Result};
use crate::upstream::BrokerCredentials;

type Sink = Arc<Mutex<Option<broadcast::Sender<BrokerMessage>>>>;

/// MQTT client options
#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub keep_alive: Duration,
    /// Capacity of the client request channel
    pub request_capacity: usize,
    /// Largest packet accepted or sent, in bytes
    pub max_packet_size: usize,
    /// How long `disconnect` waits for the event loop to flush
    pub disconnect_grace: Duration,
    /// Prepended to the session id to form the client id
    pub client_id_prefix: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            keep_alive: Duration::from_secs(30),
            request_capacity: 64,
            max_packet_size: 256 * 1024,
            disconnect_grace: Duration::from_secs(2),
            client_id_prefix: "backend_".to_string(),
        }
    }
}

impl MqttConfig {
    pub fn keep_alive(mut self, interval: Duration) -> Self {
        self.keep_alive = interval;
        self
    }

    pub fn max_packet_size(mut self, size: usize) -> Self {
        self.max_packet_size = size;
        self
    }

    pub fn disconnect_grace(mut self, grace: Duration) -> Self {
        self.disconnect_grace = grace;
        self
    }

    pub fn client_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.client_id_prefix = prefix.into();
        self
    }
}

/// Connector producing [`MqttLink`]s
#[derive(Debug, Clone, Default)]
pub struct MqttConnector {
    config: MqttConfig,
}

impl MqttConnector {
    pub fn new(config: MqttConfig) -> Self {
        Self { config }
    }

    fn client_id(&self, session_id: u64) -> String {
        format!("{}{}", self.config.client_id_prefix, session_id)
    }

    fn options(&self, credentials: &BrokerCredentials, session_id: u64) -> MqttOptions {
        let mut options =
            MqttOptions::new(self.client_id(session_id), credentials.url(), credentials.port);
        options
            .set_transport(Transport::wss_with_default_config())
            .set_credentials(credentials.username.clone(), credentials.passcode.clone())
            .set_keep_alive(self.config.keep_alive)
            .set_max_packet_size(self.config.max_packet_size, self.config.max_packet_size)
            .set_clean_session(true);
        options
    }
}

#[async_trait]
impl BrokerConnector for MqttConnector {
    async fn connect(
        &self,
        credentials: &BrokerCredentials,
        session_id: u64,
    ) -> Result<Arc<dyn BrokerLink>> {
        let options = self.options(credentials, session_id);
        let (client, mut eventloop) = AsyncClient::new(options, self.config.request_capacity);

        wait_for_connack(&mut eventloop).await?;

        tracing::info!(
            session_id = session_id,
            broker = %credentials.url(),
            "Broker connection established"
        );

        Ok(Arc::new(MqttLink::spawn(
            client,
            eventloop,
            session_id,
            self.config.disconnect_grace,
        )))
    }
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<()> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => return Ok(()),
            Ok(_) => {}
            Err(e) => return Err(map_connection_error(e)),
        }
    }
}

fn map_connection_error(e: ConnectionError) -> Error {
    match e {
        ConnectionError::ConnectionRefused(
            code @ (ConnectReturnCode::BadUserNamePassword | ConnectReturnCode::NotAuthorized),
        ) => Error::UpstreamAuth(format!("broker refused credentials: {:?}", code)),
        ConnectionError::ConnectionRefused(code) => {
            Error::UpstreamConnect(format!("broker refused connection: {:?}", code))
        }
        other => Error::UpstreamConnect(other.to_string()),
    }
}

/// Live MQTT connection owned by one session
pub struct MqttLink {
    client: AsyncClient,
    sink: Sink,
    subacks: tokio::sync::Mutex<mpsc::Receiver<SubAck>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    grace: Duration,
}

impl MqttLink {
    fn spawn(client: AsyncClient, eventloop: EventLoop, session_id: u64, grace: Duration) -> Self {
        let sink: Sink = Arc::new(Mutex::new(None));
        let (suback_tx, suback_rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_event_loop(
            eventloop,
            Arc::clone(&sink),
            suback_tx,
            cancel.clone(),
            session_id,
        ));

        Self {
            client,
            sink,
            subacks: tokio::sync::Mutex::new(suback_rx),
            cancel,
            task: Mutex::new(Some(task)),
            grace,
        }
    }
}

async fn run_event_loop(
    mut eventloop: EventLoop,
    sink: Sink,
    subacks: mpsc::Sender<SubAck>,
    cancel: CancellationToken,
    session_id: u64,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = eventloop.poll() => event,
        };

        match event {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = BrokerMessage {
                    topic: publish.topic,
                    payload: publish.payload,
                };
                if let Some(tx) = sink.lock().as_ref() {
                    // Err only means nobody is listening yet
                    let _ = tx.send(message);
                }
            }
            Ok(Event::Incoming(Packet::SubAck(ack))) => {
                let _ = subacks.try_send(ack);
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                tracing::debug!(session_id = session_id, "Broker disconnect sent");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(session_id = session_id, error = %e, "Broker event loop stopped");
                break;
            }
        }
    }

    // Dropping the sender closes the session's queue
    sink.lock().take();
}

#[async_trait]
impl BrokerLink for MqttLink {
    async fn subscribe(
        &self,
        topic: &str,
        capacity: usize,
    ) -> Result<broadcast::Receiver<BrokerMessage>> {
        let (tx, rx) = broadcast::channel(capacity.max(1));
        *self.sink.lock() = Some(tx);

        self.client
            .subscribe(topic, QoS::AtMostOnce)
            .await
            .map_err(|e| Error::UpstreamConnect(e.to_string()))?;

        let ack = self.subacks.lock().await.recv().await.ok_or_else(|| {
            Error::UpstreamConnect("connection closed before subscribe ack".to_string())
        })?;

        if ack
            .return_codes
            .iter()
            .any(|code| matches!(code, SubscribeReasonCode::Failure))
        {
            return Err(Error::UpstreamAuth(format!("subscription refused: {}", topic)));
        }

        Ok(rx)
    }

    async fn publish(&self, topic: &str, payload: Bytes) -> Result<()> {
        self.client
            .publish_bytes(topic, QoS::AtMostOnce, false, payload)
            .await
            .map_err(|e| Error::UpstreamConnect(e.to_string()))
    }

    async fn disconnect(&self) -> Result<()> {
        let result = self
            .client
            .disconnect()
            .await
            .map_err(|e| Error::UpstreamConnect(e.to_string()));

        let task = self.task.lock().take();
        if let Some(mut task) = task {
            if tokio::time::timeout(self.grace, &mut task).await.is_err() {
                task.abort();
            }
        }
        self.cancel.cancel();

        result
    }
}

impl Drop for MqttLink {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> BrokerCredentials {
        BrokerCredentials {
            host: "broker.example.com".into(),
            port: 8084,
            path: "/mqtt".into(),
            username: "user".into(),
            passcode: "secret".into(),
            expires_at: 0,
        }
    }

    #[test]
    fn test_default_config() {
        let config = MqttConfig::default();
        assert_eq!(config.keep_alive, Duration::from_secs(30));
        assert_eq!(config.request_capacity, 64);
        assert_eq!(config.disconnect_grace, Duration::from_secs(2));
        assert_eq!(config.client_id_prefix, "backend_");
    }

    #[test]
    fn test_client_id_uses_prefix() {
        let connector = MqttConnector::default();
        assert_eq!(connector.client_id(17), "backend_17");

        let connector = MqttConnector::new(MqttConfig::default().client_id_prefix("relay-"));
        assert_eq!(connector.client_id(3), "relay-3");
    }

    #[test]
    fn test_options_target_websocket_url() {
        let connector = MqttConnector::new(MqttConfig::default().keep_alive(Duration::from_secs(20)));
        let options = connector.options(&credentials(), 5);

        assert_eq!(options.client_id(), "backend_5");
        assert_eq!(
            options.broker_address(),
            ("wss://broker.example.com:8084/mqtt".to_string(), 8084)
        );
        assert_eq!(options.keep_alive(), Duration::from_secs(20));
    }

    #[test]
    fn test_refused_credentials_map_to_auth() {
        let err = map_connection_error(ConnectionError::ConnectionRefused(
            ConnectReturnCode::BadUserNamePassword,
        ));
        assert!(matches!(err, Error::UpstreamAuth(_)));

        let err = map_connection_error(ConnectionError::ConnectionRefused(
            ConnectReturnCode::NotAuthorized,
        ));
        assert!(matches!(err, Error::UpstreamAuth(_)));

        let err = map_connection_error(ConnectionError::ConnectionRefused(
            ConnectReturnCode::ServiceUnavailable,
        ));
        assert!(matches!(err, Error::UpstreamConnect(_)));
    }

    #[test]
    fn test_other_failures_map_to_connect() {
        let err = map_connection_error(ConnectionError::RequestsDone);
        assert!(matches!(err, Error::UpstreamConnect(_)));
    }
}
