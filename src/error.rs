// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `opp_mqtt` library.
//!
//! This module provides the error hierarchy for value validation, transport
//! communication and payload parsing, plus [`ReconcileError`] which carries
//! the partially reconciled subscription state when a transport call fails.

use thiserror::Error;

use crate::subscription::SubscriptionState;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred during value validation.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// Error occurred during transport communication.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Error occurred while parsing a payload.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
}

/// Errors related to value validation and constraints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A QoS level outside 0-2 was provided.
    #[error("qos {0} is out of range [0, 2]")]
    InvalidQos(u8),

    /// A topic filter is not a valid MQTT subscribe topic.
    #[error("invalid topic {topic:?}: {reason}")]
    InvalidTopic {
        /// The rejected topic.
        topic: String,
        /// Why the topic was rejected.
        reason: &'static str,
    },

    /// A payload encoding other than `utf-8` was requested.
    #[error("unsupported payload encoding: {0}")]
    UnsupportedEncoding(String),

    /// An entity id was empty.
    #[error("entity id must not be empty")]
    EmptyEntityId,
}

/// Errors related to transport communication.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// MQTT connection or communication failed.
    #[cfg(feature = "mqtt")]
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// Connection to the broker failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Request timed out.
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// Invalid broker address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// Errors related to parsing payloads.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A reconciliation pass stopped on a transport failure.
///
/// The carried state lists exactly the subscriptions that are still live, so
/// the owner can store it and repair it on the next pass.
#[derive(Debug, Error)]
#[error("reconciliation failed: {source}")]
pub struct ReconcileError {
    /// The transport error that stopped the pass.
    #[source]
    pub source: Error,
    /// The partially reconciled state.
    pub state: SubscriptionState,
}

impl ReconcileError {
    /// Splits the error into its source error and the partial state.
    #[must_use]
    pub fn into_parts(self) -> (Error, SubscriptionState) {
        (self.source, self.state)
    }
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
