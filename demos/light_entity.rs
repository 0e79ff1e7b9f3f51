// SPDX-License-Identifier: MPL-2.0

//! Demo program: subscribe a light entity, reconfigure it, then remove it.
//!
//! Prints every state message for 20 seconds on `<base>/state`, then moves
//! the entity to `<base>/status` and keeps the availability topic untouched
//! for another 20 seconds, printing the debug history at the end.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example light_entity -- <host> <base_topic> [<username> <password>]
//! ```
//!
//! # Example
//!
//! ```bash
//! cargo run --example light_entity -- 192.168.1.50 home/kitchen/light
//! ```

use std::env;
use std::sync::Arc;
use std::time::Duration;

use opp_mqtt::subscription::{DesiredTopics, TopicSpec, message_callback};
use opp_mqtt::{DebugInfoRegistry, EntityId, EntitySubscriptions, MqttBroker, QosLevel};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();

    if args.len() != 3 && args.len() != 5 {
        eprintln!("Usage: {} <host> <base_topic> [<username> <password>]", args[0]);
        eprintln!();
        eprintln!("Example:");
        eprintln!("  cargo run --example light_entity -- 192.168.1.50 home/kitchen/light");
        std::process::exit(1);
    }

    let host = &args[1];
    let base = &args[2];

    println!("Connecting to MQTT broker {host}...");

    let mut builder = MqttBroker::builder().host(host);
    if let [_, _, _, username, password] = args.as_slice() {
        builder = builder.credentials(username, password);
    }
    let broker = Arc::new(builder.build().await?);
    let debug_info = Arc::new(DebugInfoRegistry::new());

    let light = EntitySubscriptions::new(
        EntityId::new("light.demo")?,
        Arc::clone(&broker),
        Arc::clone(&debug_info),
    );

    let availability = message_callback(|msg| {
        println!("[availability] {}", msg.payload.to_text_lossy());
    });

    light
        .update(
            DesiredTopics::new()
                .with(
                    "state_topic",
                    TopicSpec::new(
                        format!("{base}/state"),
                        message_callback(|msg| println!("[state] {}", msg.payload.to_text_lossy())),
                    ),
                )
                .with(
                    "availability_topic",
                    TopicSpec::new(format!("{base}/LWT"), Arc::clone(&availability))
                        .with_qos(QosLevel::AtLeastOnce),
                ),
        )
        .await?;
    println!("Subscribed, listening for 20 seconds...");
    tokio::time::sleep(Duration::from_secs(20)).await;

    light
        .update(
            DesiredTopics::new()
                .with(
                    "state_topic",
                    TopicSpec::new(
                        format!("{base}/status"),
                        message_callback(|msg| println!("[status] {}", msg.payload.to_text_lossy())),
                    ),
                )
                .with(
                    "availability_topic",
                    TopicSpec::new(format!("{base}/LWT"), availability)
                        .with_qos(QosLevel::AtLeastOnce),
                ),
        )
        .await?;
    println!("Moved state topic, listening for 20 seconds...");
    tokio::time::sleep(Duration::from_secs(20)).await;

    if let Some(info) = debug_info.entity_info(light.entity_id()) {
        println!("{}", serde_json::to_string_pretty(&info)?);
    }

    light.remove().await?;
    broker.disconnect().await?;
    println!("Done!");

    Ok(())
}
