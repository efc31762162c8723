// ABOUTME: Token issuance and claims preview route handlers
// ABOUTME: Decodes HTTP inputs through request builders and encodes signed tokens or claim maps
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Tokensmith Contributors

//! Issuance routes.
//!
//! `/issue` returns a signed token with content type `application/jose` plus
//! any configured claim-to-header projections; `/claims` returns the
//! assembled claim map as JSON without ever invoking signing.

use crate::claims::{EXP, IAT, NBF};
use crate::config::Options;
use crate::errors::{AppError, AppResult};
use crate::keys::Registry;
use crate::noncer::Noncer;
use crate::request::{HttpInputs, RequestBuilders};
use crate::token::TokenFactory;
use axum::body::Body;
use axum::extract::{Query, RawForm, RawPathParams, State};
use axum::http::header::HeaderName;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use std::collections::HashMap;
use std::sync::Arc;

/// JOSE content type for signed token bodies
const JOSE_CONTENT_TYPE: &str = "application/jose";

/// Everything the issuance handlers need, constructed once from configuration
pub struct IssueState {
    factory: TokenFactory,
    builders: RequestBuilders,
    /// Claim name to response header projections
    header_claims: Vec<(String, HeaderName)>,
}

impl IssueState {
    /// Construct the issuance state.
    ///
    /// # Errors
    ///
    /// Returns an error for any invalid configured value, an unrecognized
    /// signing algorithm, or a key registration failure; a failed
    /// construction must keep the service from accepting issuance traffic
    /// for this configuration.
    pub fn new(
        options: &Options,
        registry: &Registry,
        noncer: Arc<dyn Noncer>,
        client: reqwest::Client,
    ) -> AppResult<Self> {
        let factory = TokenFactory::new(options, registry, noncer, client)?;
        let builders = RequestBuilders::new(options)?;

        let mut header_claims = Vec::new();
        for value in &options.claims {
            if let Some(name) = value.header() {
                let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                    AppError::config(format!("value {} has invalid header name {name}: {e}", value.key))
                })?;
                header_claims.push((value.key.clone(), header_name));
            }
        }

        Ok(Self {
            factory,
            builders,
            header_claims,
        })
    }

    /// The token factory, exposed for rotation by the hosting server
    #[must_use]
    pub const fn factory(&self) -> &TokenFactory {
        &self.factory
    }
}

/// Issuance routes implementation
pub struct IssueRoutes;

impl IssueRoutes {
    /// Create the issuance and claims preview routes
    pub fn routes(state: Arc<IssueState>) -> Router {
        Router::new()
            .route("/issue", get(Self::handle_issue).post(Self::handle_issue))
            .route("/claims", get(Self::handle_claims).post(Self::handle_claims))
            .with_state(state)
    }

    /// Handle token issuance
    async fn handle_issue(
        State(state): State<Arc<IssueState>>,
        headers: HeaderMap,
        path: RawPathParams,
        Query(query): Query<HashMap<String, String>>,
        form: Option<RawForm>,
    ) -> Result<Response, AppError> {
        let inputs = collect_inputs(headers, &path, query, form);
        let request = state.builders.build_request(&inputs)?;

        let claims = state.factory.claims(&request).await?;
        let token = state.factory.sign(&claims)?;

        let mut response = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, JOSE_CONTENT_TYPE);

        for (claim, name) in &state.header_claims {
            if let Some(value) = claims.get(claim).and_then(|v| projected_header(claim, v)) {
                response = response.header(name, value);
            }
        }

        response
            .body(Body::from(token))
            .map_err(|e| AppError::internal(format!("failed to build issue response: {e}")))
    }

    /// Handle claims preview: the assembled claim map, never signed
    async fn handle_claims(
        State(state): State<Arc<IssueState>>,
        headers: HeaderMap,
        path: RawPathParams,
        Query(query): Query<HashMap<String, String>>,
        form: Option<RawForm>,
    ) -> Result<Json<serde_json::Value>, AppError> {
        let inputs = collect_inputs(headers, &path, query, form);
        let request = state.builders.build_request(&inputs)?;

        let claims = state.factory.claims(&request).await?;
        Ok(Json(serde_json::Value::Object(claims)))
    }
}

/// Assemble builder inputs from the decoded request parts, merging form
/// parameters over query parameters
fn collect_inputs(
    headers: HeaderMap,
    path: &RawPathParams,
    query: HashMap<String, String>,
    form: Option<RawForm>,
) -> HttpInputs {
    let mut parameters = query;
    if let Some(RawForm(bytes)) = form {
        for (key, value) in url::form_urlencoded::parse(&bytes) {
            parameters.insert(key.into_owned(), value.into_owned());
        }
    }

    let variables = path
        .iter()
        .map(|(name, value)| (name.to_owned(), value.to_owned()))
        .collect();

    HttpInputs {
        headers,
        parameters,
        variables,
    }
}

/// Render a claim for response-header projection.
///
/// Strings project verbatim; the time claims project as HTTP dates. Other
/// claim types are skipped here but remain in the claim map.
fn projected_header(claim: &str, value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(text) => Some(text.clone()),
        serde_json::Value::Number(number) if matches!(claim, IAT | EXP | NBF) => {
            let timestamp = chrono::DateTime::from_timestamp(number.as_i64()?, 0)?;
            Some(timestamp.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
        }
        _ => None,
    }
}
