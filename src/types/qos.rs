// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT quality-of-service level.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// Delivery guarantee requested for a subscription.
///
/// MQTT defines three levels: 0 (at most once), 1 (at least once) and
/// 2 (exactly once). Subscriptions default to level 0.
///
/// # Examples
///
/// ```
/// use opp_mqtt::types::QosLevel;
///
/// let qos = QosLevel::try_from(1).unwrap();
/// assert_eq!(qos, QosLevel::AtLeastOnce);
/// assert_eq!(qos.value(), 1);
///
/// assert_eq!(QosLevel::default(), QosLevel::AtMostOnce);
/// assert!(QosLevel::try_from(3).is_err());
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum QosLevel {
    /// Level 0, fire and forget.
    #[default]
    AtMostOnce,
    /// Level 1, acknowledged delivery.
    AtLeastOnce,
    /// Level 2, assured single delivery.
    ExactlyOnce,
}

impl QosLevel {
    /// Returns the numeric level (0-2).
    #[must_use]
    pub const fn value(self) -> u8 {
        match self {
            Self::AtMostOnce => 0,
            Self::AtLeastOnce => 1,
            Self::ExactlyOnce => 2,
        }
    }
}

impl TryFrom<u8> for QosLevel {
    type Error = ValueError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::AtMostOnce),
            1 => Ok(Self::AtLeastOnce),
            2 => Ok(Self::ExactlyOnce),
            other => Err(ValueError::InvalidQos(other)),
        }
    }
}

impl From<QosLevel> for u8 {
    fn from(qos: QosLevel) -> Self {
        qos.value()
    }
}

impl fmt::Display for QosLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

#[cfg(feature = "mqtt")]
impl From<QosLevel> for rumqttc::QoS {
    fn from(qos: QosLevel) -> Self {
        match qos {
            QosLevel::AtMostOnce => Self::AtMostOnce,
            QosLevel::AtLeastOnce => Self::AtLeastOnce,
            QosLevel::ExactlyOnce => Self::ExactlyOnce,
        }
    }
}

#[cfg(feature = "mqtt")]
impl From<rumqttc::QoS> for QosLevel {
    fn from(qos: rumqttc::QoS) -> Self {
        match qos {
            rumqttc::QoS::AtMostOnce => Self::AtMostOnce,
            rumqttc::QoS::AtLeastOnce => Self::AtLeastOnce,
            rumqttc::QoS::ExactlyOnce => Self::ExactlyOnce,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_level_zero() {
        assert_eq!(QosLevel::default().value(), 0);
    }

    #[test]
    fn try_from_valid_levels() {
        assert_eq!(QosLevel::try_from(0), Ok(QosLevel::AtMostOnce));
        assert_eq!(QosLevel::try_from(1), Ok(QosLevel::AtLeastOnce));
        assert_eq!(QosLevel::try_from(2), Ok(QosLevel::ExactlyOnce));
    }

    #[test]
    fn try_from_out_of_range() {
        assert_eq!(QosLevel::try_from(3), Err(ValueError::InvalidQos(3)));
    }

    #[test]
    fn ordering_follows_level() {
        assert!(QosLevel::ExactlyOnce > QosLevel::AtLeastOnce);
        assert!(QosLevel::AtLeastOnce > QosLevel::AtMostOnce);
    }

    #[test]
    fn serde_uses_numeric_level() {
        let json = serde_json::to_string(&QosLevel::AtLeastOnce).unwrap();
        assert_eq!(json, "1");

        let qos: QosLevel = serde_json::from_str("2").unwrap();
        assert_eq!(qos, QosLevel::ExactlyOnce);

        assert!(serde_json::from_str::<QosLevel>("5").is_err());
    }

    #[cfg(feature = "mqtt")]
    #[test]
    fn converts_to_rumqttc() {
        assert_eq!(
            rumqttc::QoS::from(QosLevel::ExactlyOnce),
            rumqttc::QoS::ExactlyOnce
        );
        assert_eq!(
            QosLevel::from(rumqttc::QoS::AtLeastOnce),
            QosLevel::AtLeastOnce
        );
    }
}
