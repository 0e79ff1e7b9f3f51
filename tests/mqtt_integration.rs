// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the MQTT broker transport using mockforge-mqtt.

#![cfg(feature = "mqtt")]

use std::sync::Arc;
use std::time::Duration;

use mockforge_mqtt::broker::MqttConfig;
use mockforge_mqtt::start_mqtt_server;
use opp_mqtt::debug_info::DebugInfoRegistry;
use opp_mqtt::subscription::{DesiredTopics, EntitySubscriptions, TopicSpec, message_callback};
use opp_mqtt::types::{Encoding, EntityId, QosLevel};
use opp_mqtt::{Error, MqttBroker, Transport, ValueError};
use tokio::time::sleep;

/// Helper to find an available port for testing.
fn get_test_port() -> u16 {
    use std::sync::atomic::{AtomicU16, Ordering};
    static PORT_COUNTER: AtomicU16 = AtomicU16::new(18950);
    PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Starts a mock MQTT broker on the given port.
async fn start_mock_broker(port: u16) {
    let config = MqttConfig {
        port,
        host: "127.0.0.1".to_string(),
        ..Default::default()
    };

    tokio::spawn(async move {
        let _ = start_mqtt_server(config).await;
    });

    // Give the broker time to bind and accept connections
    sleep(Duration::from_millis(500)).await;
}

async fn connect(port: u16) -> MqttBroker {
    MqttBroker::builder()
        .host("127.0.0.1")
        .port(port)
        .connection_timeout(Duration::from_secs(5))
        .build()
        .await
        .expect("broker connection")
}

// ============================================================================
// Connection Tests
// ============================================================================

mod broker_connection {
    use super::*;

    #[tokio::test]
    async fn connect_to_broker() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let broker = connect(port).await;

        assert!(broker.is_connected());
        assert_eq!(broker.host(), "127.0.0.1");
        assert_eq!(broker.port(), port);
        assert!(!broker.has_credentials());
    }

    #[tokio::test]
    async fn disconnect_clears_subscriptions() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let broker = connect(port).await;
        broker
            .subscribe("home/+/state", message_callback(|_| {}), QosLevel::AtMostOnce, Encoding::Utf8)
            .await
            .unwrap();
        assert_eq!(broker.subscription_count(), 1);

        broker.disconnect().await.unwrap();
        assert_eq!(broker.subscription_count(), 0);
    }

    #[tokio::test]
    async fn connection_refused_fails() {
        let result = MqttBroker::builder()
            .host("127.0.0.1")
            .port(1)
            .connection_timeout(Duration::from_secs(2))
            .build()
            .await;

        assert!(result.is_err());
    }
}

// ============================================================================
// Transport Tests
// ============================================================================

mod broker_transport {
    use super::*;

    #[tokio::test]
    async fn shared_filter_counts_once() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let broker = connect(port).await;
        let first = broker
            .subscribe("shared/topic", message_callback(|_| {}), QosLevel::AtMostOnce, Encoding::Utf8)
            .await
            .unwrap();
        let second = broker
            .subscribe("shared/topic", message_callback(|_| {}), QosLevel::AtLeastOnce, Encoding::Raw)
            .await
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(broker.subscription_count(), 2);
        assert_eq!(broker.filter_count(), 1);

        broker.unsubscribe(first).await.unwrap();
        assert_eq!(broker.filter_count(), 1);
        broker.unsubscribe(second).await.unwrap();
        assert_eq!(broker.filter_count(), 0);
    }

    #[tokio::test]
    async fn invalid_filter_is_rejected() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let broker = connect(port).await;
        let result = broker
            .subscribe("bad/#/filter", message_callback(|_| {}), QosLevel::AtMostOnce, Encoding::Utf8)
            .await;

        assert!(matches!(
            result,
            Err(Error::Value(ValueError::InvalidTopic { .. }))
        ));
        assert_eq!(broker.subscription_count(), 0);
    }
}

// ============================================================================
// Entity Tests
// ============================================================================

mod entity_over_broker {
    use super::*;

    #[tokio::test]
    async fn entity_lifecycle() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let broker = Arc::new(connect(port).await);
        let debug_info = Arc::new(DebugInfoRegistry::new());
        let light = EntitySubscriptions::new(
            EntityId::new("light.bench").unwrap(),
            Arc::clone(&broker),
            Arc::clone(&debug_info),
        );

        let desired = DesiredTopics::new()
            .with("state_topic", TopicSpec::new("bench/light/state", message_callback(|_| {})))
            .with(
                "availability_topic",
                TopicSpec::new("bench/light/status", message_callback(|_| {})),
            );
        light.update(desired).await.unwrap();
        assert_eq!(broker.subscription_count(), 2);

        light
            .update(DesiredTopics::new().with(
                "state_topic",
                TopicSpec::new("bench/light/state", message_callback(|_| {})),
            ))
            .await
            .unwrap();
        assert_eq!(broker.subscription_count(), 1);
        assert_eq!(
            debug_info.subscription_count(light.entity_id(), "bench/light/status"),
            0
        );

        light.remove().await.unwrap();
        assert_eq!(broker.subscription_count(), 0);
        assert_eq!(debug_info.entity_count(), 0);
    }
}

// NOTE: The mockforge-mqtt broker doesn't forward publishes between
// clients, so message delivery is covered by the router unit tests and by
// tests/reconcile.rs over the in-memory transport.
