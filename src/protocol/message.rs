// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Messages delivered to subscription callbacks.

use std::borrow::Cow;

use chrono::{DateTime, Utc};

use crate::types::QosLevel;

/// Payload of a delivered message, decoded per the subscriber's encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// UTF-8 decoded text.
    Text(String),
    /// Raw bytes, for subscribers that asked for no decoding.
    Bytes(Vec<u8>),
}

impl Payload {
    /// Returns the payload as text if it was decoded.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Bytes(_) => None,
        }
    }

    /// Returns the payload bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Bytes(bytes) => bytes,
        }
    }

    /// Returns the payload as text, replacing invalid UTF-8 sequences.
    #[must_use]
    pub fn to_text_lossy(&self) -> Cow<'_, str> {
        match self {
            Self::Text(text) => Cow::Borrowed(text),
            Self::Bytes(bytes) => String::from_utf8_lossy(bytes),
        }
    }
}

/// A message received on a subscribed topic.
///
/// `subscribed_topic` is the filter the callback was registered under, which
/// may contain wildcards; `topic` is the concrete topic the message was
/// published to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveMessage {
    /// Topic the message was published to.
    pub topic: String,
    /// Decoded payload.
    pub payload: Payload,
    /// Delivery QoS.
    pub qos: QosLevel,
    /// Whether the broker flagged the message as retained.
    pub retain: bool,
    /// Filter the receiving callback subscribed with.
    pub subscribed_topic: String,
    /// Time the message was received.
    pub timestamp: DateTime<Utc>,
}

impl ReceiveMessage {
    /// Creates a message stamped with the current time.
    #[must_use]
    pub fn new(
        topic: impl Into<String>,
        payload: Payload,
        qos: QosLevel,
        retain: bool,
        subscribed_topic: impl Into<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            payload,
            qos,
            retain,
            subscribed_topic: subscribed_topic.into(),
            timestamp: Utc::now(),
        }
    }
}
