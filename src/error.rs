// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the bridge.
//!
//! Failures are grouped by where they come from: value encoding, cloud or
//! bus communication, payload parsing, and the bridge's own bookkeeping.
//! Device-local failures (a poll or a command that went wrong) are never
//! returned from the poll loop; they are published as events carrying the
//! rendered message instead.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// A value could not be encoded for the appliance.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// Error occurred while talking to the cloud service or the MQTT broker.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Error occurred while parsing a payload.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// No device with the requested identifier is registered.
    #[error("device not found: {0}")]
    DeviceNotFound(u64),

    /// A command was issued before the device reported its state once.
    #[error("device {0} has not been read yet")]
    NotSynchronized(u64),

    /// A cloud request was issued before the first successful login.
    #[error("no cloud session, login has not completed")]
    NotLoggedIn,

    /// The operation was interrupted by a shutdown signal.
    #[error("shutdown requested")]
    Shutdown,

    /// The process configuration is incomplete or malformed.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised while encoding or decoding appliance control values.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValueError {
    /// A fractional value is outside `[0, 1]`.
    #[error("value {0} is out of range [0, 1]")]
    OutOfRange(f64),

    /// A word that is not one of the accepted sentinels.
    #[error("unknown {kind} value: {value}")]
    UnknownWord {
        /// What was being parsed (`fan`, `vane`, `mode`).
        kind: &'static str,
        /// The rejected word.
        value: String,
    },
}

/// Errors related to cloud (HTTP) and bus (MQTT) communication.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// MQTT client request failed.
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// The remote answered with a non-success status.
    #[error("request failed: {0}")]
    ConnectionFailed(String),

    /// The cloud rejected the credentials.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Hostname resolution failed.
    #[error("DNS lookup failed for {host}: {message}")]
    Dns {
        /// The hostname being resolved.
        host: String,
        /// Resolver error description.
        message: String,
    },

    /// Invalid URL or address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Internal channel was closed.
    #[error("channel closed: {0}")]
    ChannelClosed(String),
}

/// Errors related to parsing cloud responses and bus payloads.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unexpected response format.
    #[error("unexpected response format: {0}")]
    UnexpectedFormat(String),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_error_display() {
        let err = ValueError::OutOfRange(1.5);
        assert_eq!(err.to_string(), "value 1.5 is out of range [0, 1]");

        let err = ValueError::UnknownWord {
            kind: "vane",
            value: "wobble".to_string(),
        };
        assert_eq!(err.to_string(), "unknown vane value: wobble");
    }

    #[test]
    fn error_from_value_error() {
        let err: Error = ValueError::OutOfRange(2.0).into();
        assert!(matches!(err, Error::Value(ValueError::OutOfRange(_))));
    }

    #[test]
    fn parse_error_display() {
        let err = ParseError::UnexpectedFormat("expected an object".to_string());
        assert_eq!(err.to_string(), "unexpected response format: expected an object");
    }

    #[test]
    fn device_not_found_display() {
        assert_eq!(Error::DeviceNotFound(42).to_string(), "device not found: 42");
    }

    #[test]
    fn dns_error_display() {
        let err = ProtocolError::Dns {
            host: "app.melcloud.com".to_string(),
            message: "no records".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "DNS lookup failed for app.melcloud.com: no records"
        );
    }
}
