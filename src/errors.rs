// ABOUTME: Unified error handling with standard error codes and HTTP response formatting
// ABOUTME: Maps issuance pipeline failures to consistent HTTP statuses and JSON error bodies
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Tokensmith Contributors

//! # Unified Error Handling System
//!
//! This module provides a centralized error handling system for the token
//! issuance service. It defines standard error types, error codes, and HTTP
//! response formatting so that every pipeline stage reports failures the same
//! way, and so the transport layer can map them to status codes without
//! inspecting error strings.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Standard error codes used throughout the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Request decoding (1000-1999)
    #[serde(rename = "MISSING_VALUE")]
    MissingValue = 1000,
    #[serde(rename = "MISSING_VARIABLE")]
    MissingVariable = 1001,

    // Key lifecycle (2000-2999)
    #[serde(rename = "KEY_NOT_FOUND")]
    KeyNotFound = 2000,
    #[serde(rename = "DUPLICATE_KEY")]
    DuplicateKey = 2001,
    #[serde(rename = "KEY_MATERIAL_INVALID")]
    KeyMaterialInvalid = 2002,

    // Claim building (3000-3999)
    #[serde(rename = "REMOTE_CLAIMS_ERROR")]
    RemoteClaimsError = 3000,
    #[serde(rename = "NONCE_ERROR")]
    NonceError = 3001,
    #[serde(rename = "SIGNING_ERROR")]
    SigningError = 3002,

    // Configuration (6000-6999)
    #[serde(rename = "CONFIG_INVALID")]
    ConfigInvalid = 6000,

    // Internal (9000-9999)
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError = 9000,
}

impl ErrorCode {
    /// Get the HTTP status code for this error
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            // 400 Bad Request: the client omitted a value it was required to send
            Self::MissingValue => 400,

            // 404 Not Found
            Self::KeyNotFound => 404,

            // 409 Conflict
            Self::DuplicateKey => 409,

            // 502 Bad Gateway: the remote claims endpoint failed us
            Self::RemoteClaimsError => 502,

            // 500 Internal Server Error: a missing path variable means the
            // route table and the value configuration disagree, which is an
            // operator problem rather than bad client input
            Self::MissingVariable
            | Self::KeyMaterialInvalid
            | Self::NonceError
            | Self::SigningError
            | Self::ConfigInvalid
            | Self::InternalError => 500,
        }
    }

    /// Get a user-friendly description of this error
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::MissingValue => "A required header or parameter is missing from the request",
            Self::MissingVariable => "A required path variable is missing from the route",
            Self::KeyNotFound => "The requested key was not found",
            Self::DuplicateKey => "A key with this identifier is already registered",
            Self::KeyMaterialInvalid => "Key material could not be generated or parsed",
            Self::RemoteClaimsError => "The remote claims endpoint returned an error",
            Self::NonceError => "Nonce generation failed",
            Self::SigningError => "Token signing failed",
            Self::ConfigInvalid => "Configuration is invalid",
            Self::InternalError => "An internal server error occurred",
        }
    }
}

/// Unified error type for the application
#[derive(Debug, Error)]
pub struct AppError {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Additional key-value context
    pub details: serde_json::Value,
    /// Source error for error chaining
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new `AppError` with the given code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: serde_json::Value::Null,
            source: None,
        }
    }

    /// Add details to the error
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    /// Add a source error for error chaining
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the HTTP status code for this error
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        self.code.http_status()
    }

    /// A required header or parameter yielded no value
    pub fn missing_value(source_name: impl Into<String>) -> Self {
        let source_name = source_name.into();
        Self::new(
            ErrorCode::MissingValue,
            format!("missing required value: {source_name}"),
        )
        .with_details(serde_json::json!({ "name": source_name }))
    }

    /// A required path variable was absent, which indicates a route/config mismatch
    pub fn missing_variable(variable: impl Into<String>) -> Self {
        let variable = variable.into();
        Self::new(
            ErrorCode::MissingVariable,
            format!("missing path variable: {variable}"),
        )
        .with_details(serde_json::json!({ "variable": variable }))
    }

    /// No key registered under the given identifier
    pub fn key_not_found(kid: impl Into<String>) -> Self {
        let kid = kid.into();
        Self::new(ErrorCode::KeyNotFound, format!("no such key: {kid}"))
    }

    /// A key with this identifier already exists in the registry
    pub fn duplicate_key(kid: impl Into<String>) -> Self {
        let kid = kid.into();
        Self::new(
            ErrorCode::DuplicateKey,
            format!("key already registered: {kid}"),
        )
    }

    /// Key generation or parsing failed
    pub fn key_material(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::KeyMaterialInvalid, message)
    }

    /// Remote claims call failed; carries the endpoint URL and HTTP status so
    /// operators can tell "remote service down" from "remote returned garbage"
    pub fn remote_claims(
        url: impl Into<String>,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        let url = url.into();
        Self::new(ErrorCode::RemoteClaimsError, message).with_details(serde_json::json!({
            "url": url,
            "status": status,
        }))
    }

    /// Random source failure during nonce generation
    pub fn nonce(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NonceError, message)
    }

    /// Token signing failure
    pub fn signing(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SigningError, message)
    }

    /// Configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigInvalid, message)
    }

    /// Internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.description(), self.message)
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// HTTP error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorResponseDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponseDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        Self {
            error: ErrorResponseDetails {
                code: error.code,
                message: error.message,
                details: error.details,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!("request failed: {self}");
        }
        (status, Json(ErrorResponse::from(self))).into_response()
    }
}
