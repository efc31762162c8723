// ABOUTME: Configuration surface for the token factory, claim values, and remote claims
// ABOUTME: Deserializes issuer options with validation of value sources and durations
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Tokensmith Contributors

//! Issuer configuration.
//!
//! These types are the unmarshalling target for the injected configuration
//! reader; the rest of the crate consumes only the parsed [`Options`].

use crate::errors::{AppError, AppResult};
use crate::keys::Descriptor;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

/// One configured claim or metadata value.
///
/// Every value resolves to exactly one source: HTTP-derived (`header`,
/// `parameter`, or `variable`) or static (`value` or `json`). HTTP-derived
/// values are pulled from the inbound request before the claim pipeline runs;
/// static ones are fixed at construction time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Value {
    /// Claim or metadata key this value populates
    pub key: String,
    /// Request header to read, tried before `parameter`
    pub header: Option<String>,
    /// Query or form parameter to read
    pub parameter: Option<String>,
    /// URI path variable to read
    pub variable: Option<String>,
    /// Whether absence of an HTTP-derived value is a hard error
    pub required: bool,
    /// Literal value
    pub value: Option<serde_json::Value>,
    /// JSON text parsed into a value at construction time
    pub json: Option<String>,
}

impl Value {
    /// Request header name, when configured non-empty
    #[must_use]
    pub fn header(&self) -> Option<&str> {
        self.header.as_deref().filter(|s| !s.is_empty())
    }

    /// Parameter name, when configured non-empty
    #[must_use]
    pub fn parameter(&self) -> Option<&str> {
        self.parameter.as_deref().filter(|s| !s.is_empty())
    }

    /// Path variable name, when configured non-empty
    #[must_use]
    pub fn variable(&self) -> Option<&str> {
        self.variable.as_deref().filter(|s| !s.is_empty())
    }

    /// Whether this value is resolved from the inbound HTTP request
    #[must_use]
    pub fn is_http_derived(&self) -> bool {
        self.header().is_some() || self.parameter().is_some() || self.variable().is_some()
    }

    /// Validate source exclusivity rules.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty, if `variable` is combined with
    /// `header` or `parameter`, or if the value has neither an HTTP source
    /// nor a static value.
    pub fn validate(&self) -> AppResult<()> {
        if self.key.is_empty() {
            return Err(AppError::config("claim value is missing a key"));
        }
        if self.variable().is_some() && (self.header().is_some() || self.parameter().is_some()) {
            return Err(AppError::config(format!(
                "value {} combines a path variable with a header or parameter source",
                self.key
            )));
        }
        if !self.is_http_derived() && self.value.is_none() && self.json.is_none() {
            return Err(AppError::config(format!(
                "value {} has neither an HTTP source nor a static value",
                self.key
            )));
        }
        Ok(())
    }

    /// Resolve the static value for a non-HTTP-derived entry
    ///
    /// # Errors
    /// Returns an error if neither `value` nor parseable `json` is present
    pub fn static_value(&self) -> AppResult<serde_json::Value> {
        if let Some(value) = &self.value {
            return Ok(value.clone());
        }
        if let Some(json) = &self.json {
            return serde_json::from_str(json).map_err(|e| {
                AppError::config(format!("value {} has unparseable JSON: {e}", self.key))
            });
        }
        Err(AppError::config(format!(
            "value {} has neither an HTTP source nor a static value",
            self.key
        )))
    }
}

/// External claims endpoint configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteOptions {
    /// HTTP method, defaulting to POST
    pub method: Option<String>,
    /// Endpoint URL
    pub url: String,
}

/// Token factory configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Options {
    /// Signing algorithm name, defaulting to RS256
    pub alg: Option<String>,
    /// Descriptor for the factory's signing key
    pub key: Descriptor,
    /// Configured claim values, in order
    pub claims: Vec<Value>,
    /// Configured metadata values, in order
    pub metadata: Vec<Value>,
    /// Whether to add a `jti` nonce claim
    pub nonce: bool,
    /// Disable the `iat`/`exp`/`nbf` time claims entirely
    pub disable_time: bool,
    /// Token lifetime; `exp` is only written when positive
    #[serde(with = "humantime_serde")]
    pub duration: Option<Duration>,
    /// Disable only the `nbf` claim
    pub disable_not_before: bool,
    /// Offset applied to `iat` to produce `nbf`; may be zero or negative
    pub not_before_delta: SignedDuration,
    /// Optional external claims endpoint
    pub remote: Option<RemoteOptions>,
}

/// A duration that may be negative, written as a humantime string with an
/// optional leading minus ("30s", "-1m")
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignedDuration(i64);

impl SignedDuration {
    /// Construct from whole seconds
    #[must_use]
    pub const fn from_seconds(seconds: i64) -> Self {
        Self(seconds)
    }

    /// Whole seconds, negative when the duration points backwards
    #[must_use]
    pub const fn seconds(self) -> i64 {
        self.0
    }
}

impl Serialize for SignedDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let magnitude = Duration::from_secs(self.0.unsigned_abs());
        let formatted = humantime::format_duration(magnitude).to_string();
        if self.0 < 0 {
            serializer.serialize_str(&format!("-{formatted}"))
        } else {
            serializer.serialize_str(&formatted)
        }
    }
}

impl<'de> Deserialize<'de> for SignedDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        let (negative, magnitude) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text.as_str()),
        };

        let duration = humantime::parse_duration(magnitude).map_err(serde::de::Error::custom)?;
        let seconds = i64::try_from(duration.as_secs()).map_err(serde::de::Error::custom)?;

        Ok(Self(if negative { -seconds } else { seconds }))
    }
}
