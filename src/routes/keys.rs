// ABOUTME: Public key distribution route handlers serving PEM, JWK, and JWKS documents
// ABOUTME: Looks up registered key pairs by KID and encodes their verification material
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Tokensmith Contributors

//! Public key routes.
//!
//! Clients that verify issued tokens fetch verification material here:
//! a single key as PEM or JWK, or the whole registry as a JWKS document.

use crate::errors::{AppError, AppResult};
use crate::keys::Registry;
use axum::body::Body;
use axum::extract::{RawPathParams, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;

/// PEM content type for public key bodies
const PEM_CONTENT_TYPE: &str = "application/x-pem-file";

/// Public key routes implementation
pub struct KeyRoutes;

impl KeyRoutes {
    /// Create all key distribution routes
    pub fn routes(registry: Arc<Registry>) -> Router {
        Router::new()
            .route("/keys", get(Self::handle_key_set))
            .route("/keys/:kid", get(Self::handle_public_pem))
            .route("/keys/:kid/key.json", get(Self::handle_jwk))
            .with_state(registry)
    }

    /// Serve one key's verification material as PEM
    async fn handle_public_pem(
        State(registry): State<Arc<Registry>>,
        params: RawPathParams,
    ) -> Result<Response, AppError> {
        let pair = Self::lookup(&registry, &params)?;

        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, PEM_CONTENT_TYPE)
            .body(Body::from(pair.public_pem().to_owned()))
            .map_err(|e| AppError::internal(format!("failed to build PEM response: {e}")))
    }

    /// Serve one key's verification material as a JWK document
    async fn handle_jwk(
        State(registry): State<Arc<Registry>>,
        params: RawPathParams,
    ) -> Result<Response, AppError> {
        let pair = Self::lookup(&registry, &params)?;

        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(pair.jwk_json().to_owned()))
            .map_err(|e| AppError::internal(format!("failed to build JWK response: {e}")))
    }

    /// Serve the JWKS document covering every registered key
    async fn handle_key_set(State(registry): State<Arc<Registry>>) -> Json<serde_json::Value> {
        let key_set = registry.key_set();
        Json(serde_json::to_value(key_set).unwrap_or_else(|_| serde_json::json!({ "keys": [] })))
    }

    fn lookup(registry: &Registry, params: &RawPathParams) -> AppResult<Arc<crate::keys::KeyPair>> {
        // A route mounted without a kid variable is an operator problem, not
        // a client one
        let kid = params
            .iter()
            .find(|(name, _)| *name == "kid")
            .map(|(_, value)| value)
            .ok_or_else(|| AppError::missing_variable("kid"))?;

        registry.get(kid).ok_or_else(|| AppError::key_not_found(kid))
    }
}
