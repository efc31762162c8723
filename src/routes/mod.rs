// ABOUTME: Route module organization for the token issuance HTTP surface
// ABOUTME: Groups endpoint definitions by domain with thin handlers delegating to the core
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Tokensmith Contributors

//! HTTP routes.
//!
//! Each domain module contains only route definitions and thin handler
//! functions that decode the request, delegate to the core, and encode the
//! result. Routers are plain values; the hosting server decides where to
//! mount them.

/// Health check and system status routes
pub mod health;

/// Token issuance and claims preview routes
pub mod issue;

/// Public key distribution routes
pub mod keys;

pub use health::HealthRoutes;
pub use issue::{IssueRoutes, IssueState};
pub use keys::KeyRoutes;
