// ABOUTME: Main library entry point for the tokensmith credential-issuance service
// ABOUTME: Provides signing key lifecycle, claim building, token signing, and HTTP transport
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Tokensmith Contributors

#![deny(unsafe_code)]

//! # Tokensmith
//!
//! A JWT credential-issuance service. Tokensmith is the trust root for a
//! fleet of clients that present signed, short-lived tokens to other
//! services: it manages signing keys, assembles per-request claim sets from
//! configuration, request data, and optionally a remote claims endpoint, and
//! signs tokens.
//!
//! ## Architecture
//!
//! Data flows through the crate in one direction:
//!
//! HTTP request → request builders → [`request::Request`] → claim pipeline
//! (request copy, remote, static, nonce, time) → merged claim map →
//! [`token::TokenFactory`] signs with the registry's active key → signed
//! token → HTTP response with optional claim-to-header projections.
//!
//! All components are safe under arbitrary concurrent invocation: the key
//! registry serializes only its map mutations, and the factory's active key
//! is swapped with a single atomic store so rotation never contends with
//! signing.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokensmith::config::Options;
//! use tokensmith::keys::Registry;
//! use tokensmith::noncer::UrlSafeNoncer;
//! use tokensmith::routes::{IssueRoutes, IssueState, KeyRoutes};
//!
//! # fn main() -> anyhow::Result<()> {
//! let options = Options::default();
//! let registry = Arc::new(Registry::new());
//! let state = IssueState::new(
//!     &options,
//!     &registry,
//!     Arc::new(UrlSafeNoncer::default()),
//!     reqwest::Client::new(),
//! )?;
//!
//! let app = axum::Router::new()
//!     .merge(IssueRoutes::routes(Arc::new(state)))
//!     .merge(KeyRoutes::routes(registry));
//! # let _ = app;
//! # Ok(())
//! # }
//! ```

/// Ordered claim-building pipeline with static, nonce, time, and remote claims
pub mod claims;

/// Issuer configuration surface
pub mod config;

/// Unified error handling system with standard error codes and HTTP responses
pub mod errors;

/// Signing key lifecycle: descriptors, pairs, and the registry
pub mod keys;

/// Production logging and structured output
pub mod logging;

/// Cryptographically random nonce generation
pub mod noncer;

/// Per-issuance request state and request builders
pub mod request;

/// `HTTP` routes for issuance, claims preview, and key distribution
pub mod routes;

/// Token factory signing assembled claims with the active key
pub mod token;
