// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT topic filter validation and matching.

use crate::error::ValueError;

/// Maximum length of an MQTT topic in bytes.
pub const MAX_TOPIC_LEN: usize = 65_535;

/// Validates a topic filter used for subscribing.
///
/// A valid filter is non-empty, at most [`MAX_TOPIC_LEN`] bytes, contains no
/// NUL character, and uses wildcards only as whole levels (`#` only as the
/// last level).
///
/// # Errors
///
/// Returns `ValueError::InvalidTopic` describing the first violation.
///
/// # Examples
///
/// ```
/// use opp_mqtt::protocol::validate_subscribe_topic;
///
/// assert!(validate_subscribe_topic("home/+/light/#").is_ok());
/// assert!(validate_subscribe_topic("home/#/light").is_err());
/// assert!(validate_subscribe_topic("home/li+ght").is_err());
/// ```
pub fn validate_subscribe_topic(topic: &str) -> Result<(), ValueError> {
    let invalid = |reason| ValueError::InvalidTopic {
        topic: topic.to_string(),
        reason,
    };

    if topic.is_empty() {
        return Err(invalid("topic must not be empty"));
    }
    if topic.len() > MAX_TOPIC_LEN {
        return Err(invalid("topic is longer than 65535 bytes"));
    }
    if topic.contains('\0') {
        return Err(invalid("topic must not contain NUL"));
    }

    let levels: Vec<&str> = topic.split('/').collect();
    let last = levels.len() - 1;
    for (idx, level) in levels.iter().enumerate() {
        if level.contains('#') && (*level != "#" || idx != last) {
            return Err(invalid("'#' must be the whole last level"));
        }
        if level.contains('+') && *level != "+" {
            return Err(invalid("'+' must be a whole level"));
        }
    }

    Ok(())
}

/// Returns true if `topic` is matched by the subscribe filter `filter`.
///
/// `+` matches exactly one level, `#` matches the parent level and every
/// level below it. Filters starting with a wildcard never match topics
/// starting with `$`.
#[must_use]
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    if topic.starts_with('$') && (filter.starts_with('+') || filter.starts_with('#')) {
        return false;
    }

    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}
