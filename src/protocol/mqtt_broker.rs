// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT broker connection implementing [`Transport`].
//!
//! This module provides a persistent MQTT connection shared by every entity
//! of a hub. Subscriptions from all entities go through one [`TopicRouter`]:
//! the broker only sees one SUBSCRIBE per filter, and every incoming PUBLISH
//! is fanned out to the callbacks registered for matching filters.
//!
//! # Examples
//!
//! ```no_run
//! use opp_mqtt::protocol::{MqttBroker, Transport};
//! use opp_mqtt::subscription::message_callback;
//! use opp_mqtt::types::{Encoding, QosLevel};
//!
//! # async fn example() -> opp_mqtt::Result<()> {
//! let broker = MqttBroker::builder()
//!     .host("192.168.1.50")
//!     .port(1883)
//!     .credentials("user", "password")
//!     .build()
//!     .await?;
//!
//! let id = broker
//!     .subscribe(
//!         "home/kitchen/light/state",
//!         message_callback(|msg| println!("{:?}", msg.payload)),
//!         QosLevel::AtMostOnce,
//!         Encoding::Utf8,
//!     )
//!     .await?;
//!
//! broker.unsubscribe(id).await?;
//! broker.disconnect().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use rumqttc::{AsyncClient, EventLoop, MqttOptions};
use tokio::sync::oneshot;

use crate::error::{Error, ProtocolError};
use crate::subscription::{MessageCallback, SubscriptionId};
use crate::types::{Encoding, QosLevel};

use super::Transport;
use super::topic::validate_subscribe_topic;
use super::topic_router::{Removal, TopicRouter};

/// Global counter for generating unique client IDs.
static BROKER_CLIENT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Delay before polling again after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Configuration for an MQTT broker connection.
#[derive(Debug, Clone)]
pub struct MqttBrokerConfig {
    host: String,
    port: u16,
    credentials: Option<(String, String)>,
    keep_alive: Duration,
    connection_timeout: Duration,
    client_id_prefix: String,
    request_capacity: usize,
}

impl Default for MqttBrokerConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 1883,
            credentials: None,
            keep_alive: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
            client_id_prefix: "opp_mqtt".to_string(),
            request_capacity: 10,
        }
    }
}

/// An MQTT broker connection shared by every entity of a hub.
///
/// `MqttBroker` is cheaply cloneable (via `Arc`).
#[derive(Clone)]
pub struct MqttBroker {
    inner: Arc<MqttBrokerInner>,
}

struct MqttBrokerInner {
    /// The MQTT async client for broker requests.
    client: AsyncClient,
    /// Subscriber table for every entity on this connection.
    router: TopicRouter,
    /// Configuration used for this connection.
    config: MqttBrokerConfig,
    /// Connection status.
    connected: AtomicBool,
    /// Set once `disconnect` was requested; stops the event loop.
    closing: AtomicBool,
}

impl MqttBroker {
    /// Creates a new builder for configuring an MQTT broker connection.
    #[must_use]
    pub fn builder() -> MqttBrokerBuilder {
        MqttBrokerBuilder::default()
    }

    /// Returns whether the broker is currently connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    /// Returns the host address of the broker.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.inner.config.host
    }

    /// Returns the port of the broker.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.inner.config.port
    }

    /// Returns whether authentication is configured.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        self.inner.config.credentials.is_some()
    }

    /// Returns the number of registered subscription callbacks.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.inner.router.subscriber_count()
    }

    /// Returns the number of filters subscribed at the broker.
    #[must_use]
    pub fn filter_count(&self) -> usize {
        self.inner.router.filter_count()
    }

    /// Sends SUBSCRIBE for every active filter.
    ///
    /// Used after reconnecting without a persistent session.
    async fn resubscribe_all(&self) {
        for (filter, qos) in self.inner.router.active_filters() {
            if let Err(e) = self.inner.client.subscribe(&filter, qos.into()).await {
                tracing::warn!(topic = %filter, error = %e, "Failed to resubscribe topic");
            }
        }
    }

    /// Disconnects from the broker.
    ///
    /// This will close the connection and drop all subscriptions.
    ///
    /// # Errors
    ///
    /// Returns error if the disconnect operation fails.
    pub async fn disconnect(&self) -> Result<(), ProtocolError> {
        tracing::info!(
            host = %self.inner.config.host,
            port = %self.inner.config.port,
            "Disconnecting from MQTT broker"
        );

        self.inner.closing.store(true, Ordering::Release);
        self.inner.router.clear();

        self.inner
            .client
            .disconnect()
            .await
            .map_err(ProtocolError::Mqtt)?;

        self.inner.connected.store(false, Ordering::Release);
        Ok(())
    }
}

impl Transport for MqttBroker {
    async fn subscribe(
        &self,
        topic: &str,
        callback: MessageCallback,
        qos: QosLevel,
        encoding: Encoding,
    ) -> Result<SubscriptionId, Error> {
        validate_subscribe_topic(topic)?;

        let registration = self.inner.router.add(topic, callback, qos, encoding);

        if let Some(broker_qos) = registration.broker_subscribe {
            if let Err(e) = self.inner.client.subscribe(topic, broker_qos.into()).await {
                self.inner.router.remove(registration.id);
                return Err(ProtocolError::Mqtt(e).into());
            }
            tracing::debug!(topic = %topic, qos = %broker_qos, "Subscribed to broker topic");
        }

        Ok(registration.id)
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<(), Error> {
        if let Removal::LastSubscriber { filter } = self.inner.router.remove(id) {
            self.inner
                .client
                .unsubscribe(&filter)
                .await
                .map_err(ProtocolError::Mqtt)?;
            tracing::debug!(topic = %filter, "Unsubscribed from broker topic");
        }
        Ok(())
    }
}

impl std::fmt::Debug for MqttBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttBroker")
            .field("host", &self.inner.config.host)
            .field("port", &self.inner.config.port)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Builder for creating an MQTT broker connection.
///
/// # Examples
///
/// ```no_run
/// use opp_mqtt::protocol::MqttBroker;
/// use std::time::Duration;
///
/// # async fn example() -> opp_mqtt::Result<()> {
/// let broker = MqttBroker::builder()
///     .host("192.168.1.50")
///     .port(1883)
///     .credentials("user", "password")
///     .keep_alive(Duration::from_secs(60))
///     .connection_timeout(Duration::from_secs(5))
///     .client_id_prefix("hub")
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MqttBrokerBuilder {
    config: MqttBrokerConfig,
}

impl MqttBrokerBuilder {
    /// Sets the broker host address.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Sets the broker port (default: 1883).
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sets authentication credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.credentials = Some((username.into(), password.into()));
        self
    }

    /// Sets the keep-alive interval (default: 30 seconds).
    #[must_use]
    pub fn keep_alive(mut self, duration: Duration) -> Self {
        self.config.keep_alive = duration;
        self
    }

    /// Sets the connection timeout (default: 10 seconds).
    #[must_use]
    pub fn connection_timeout(mut self, duration: Duration) -> Self {
        self.config.connection_timeout = duration;
        self
    }

    /// Sets the prefix of the generated client ID (default: `opp_mqtt`).
    #[must_use]
    pub fn client_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.client_id_prefix = prefix.into();
        self
    }

    /// Sets the capacity of the outgoing request queue (default: 10).
    #[must_use]
    pub fn request_capacity(mut self, capacity: usize) -> Self {
        self.config.request_capacity = capacity.max(1);
        self
    }

    /// Builds and connects to the MQTT broker.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Host is not set
    /// - Connection fails
    /// - Connection times out (`ProtocolError::Timeout`)
    pub async fn build(self) -> Result<MqttBroker, ProtocolError> {
        if self.config.host.is_empty() {
            return Err(ProtocolError::InvalidAddress(
                "MQTT broker host is required".to_string(),
            ));
        }

        let counter = BROKER_CLIENT_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        let client_id = format!(
            "{}_{}_{}",
            self.config.client_id_prefix,
            std::process::id(),
            counter
        );

        let mut mqtt_options = MqttOptions::new(&client_id, &self.config.host, self.config.port);
        mqtt_options.set_keep_alive(self.config.keep_alive);
        mqtt_options.set_clean_session(true);

        if let Some((ref username, ref password)) = self.config.credentials {
            mqtt_options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(mqtt_options, self.config.request_capacity);

        let inner = MqttBrokerInner {
            client,
            router: TopicRouter::new(),
            config: self.config.clone(),
            connected: AtomicBool::new(false),
            closing: AtomicBool::new(false),
        };

        let broker = MqttBroker {
            inner: Arc::new(inner),
        };

        let broker_clone = broker.clone();
        let (connack_tx, connack_rx) = oneshot::channel();

        tokio::spawn(async move {
            handle_broker_events(event_loop, broker_clone, connack_tx).await;
        });

        let timeout = self.config.connection_timeout;
        match tokio::time::timeout(timeout, connack_rx).await {
            Ok(Ok(())) => {
                broker.inner.connected.store(true, Ordering::Release);
                tracing::info!(
                    host = %self.config.host,
                    port = %self.config.port,
                    client_id = %client_id,
                    "Connected to MQTT broker"
                );
            }
            Ok(Err(_)) => {
                return Err(ProtocolError::ConnectionFailed(
                    "MQTT event loop terminated unexpectedly".to_string(),
                ));
            }
            Err(_) => {
                broker.inner.closing.store(true, Ordering::Release);
                return Err(ProtocolError::Timeout(
                    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                ));
            }
        }

        Ok(broker)
    }
}

/// Handles MQTT events for the broker connection.
///
/// Errors before the first CONNACK end the loop so `build` can fail; later
/// errors are retried, and filters are re-subscribed when the broker comes
/// back without a session.
async fn handle_broker_events(
    mut event_loop: EventLoop,
    broker: MqttBroker,
    connack_tx: oneshot::Sender<()>,
) {
    use rumqttc::{Event, Packet};

    let mut connack_tx = Some(connack_tx);

    loop {
        if broker.inner.closing.load(Ordering::Acquire) {
            break;
        }

        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                tracing::debug!(?connack, "MQTT broker connected");
                broker.inner.connected.store(true, Ordering::Release);
                if let Some(tx) = connack_tx.take() {
                    let _ = tx.send(());
                } else if !connack.session_present {
                    let broker = broker.clone();
                    tokio::spawn(async move { broker.resubscribe_all().await });
                }
            }
            Ok(Event::Incoming(Packet::SubAck(suback))) => {
                tracing::debug!(?suback, "MQTT subscription acknowledged");
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let delivered = broker.inner.router.route(
                    &publish.topic,
                    &publish.payload,
                    publish.qos.into(),
                    publish.retain,
                );
                tracing::debug!(
                    topic = %publish.topic,
                    bytes = publish.payload.len(),
                    delivered,
                    "MQTT message received"
                );
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                tracing::info!("MQTT broker disconnected");
                broker.inner.connected.store(false, Ordering::Release);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                broker.inner.connected.store(false, Ordering::Release);
                if connack_tx.is_some() || broker.inner.closing.load(Ordering::Acquire) {
                    tracing::error!(error = %e, "MQTT broker event loop error");
                    break;
                }
                tracing::warn!(error = %e, "MQTT connection lost, reconnecting");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}
