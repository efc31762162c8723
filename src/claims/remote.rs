// ABOUTME: Remote claims builder invoking an external HTTP endpoint at issuance time
// ABOUTME: Posts request metadata as JSON and merges the JSON object response into the claim set
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Tokensmith Contributors

//! Remote claims.
//!
//! The remote builder makes one synchronous (per-request) HTTP call inside
//! the pipeline. It has no timeout or retry of its own; the caller supplies a
//! `reqwest::Client` configured with whatever latency bound it needs. A slow
//! remote endpoint stalls only the one issuance that is waiting on it.

use super::ClaimMap;
use crate::config::RemoteOptions;
use crate::errors::{AppError, AppResult};
use crate::request::Request;
use reqwest::Method;
use tracing::debug;
use url::Url;

impl std::fmt::Debug for RemoteClaims {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteClaims")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("base_metadata", &self.base_metadata)
            .finish_non_exhaustive()
    }
}

/// Claim builder backed by an external HTTP claims endpoint
pub struct RemoteClaims {
    client: reqwest::Client,
    method: Method,
    url: Url,
    /// Statically configured metadata, computed once at construction
    base_metadata: ClaimMap,
}

impl RemoteClaims {
    /// Construct the builder from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is empty or unparseable, or if the method
    /// name is not a valid HTTP method.
    pub fn new(
        client: reqwest::Client,
        options: &RemoteOptions,
        base_metadata: ClaimMap,
    ) -> AppResult<Self> {
        if options.url.is_empty() {
            return Err(AppError::config("remote claims URL is empty"));
        }

        let url = Url::parse(&options.url).map_err(|e| {
            AppError::config(format!("unparseable remote claims URL {}: {e}", options.url))
        })?;

        let method = match options.method.as_deref().filter(|m| !m.is_empty()) {
            Some(name) => Method::from_bytes(name.to_uppercase().as_bytes()).map_err(|e| {
                AppError::config(format!("invalid remote claims method {name}: {e}"))
            })?,
            None => Method::POST,
        };

        Ok(Self {
            client,
            method,
            url,
            base_metadata,
        })
    }

    /// Fetch claims from the remote endpoint and merge them into the target.
    ///
    /// The request body is the static metadata overlaid with the per-request
    /// metadata. An empty response body contributes zero claims. The target
    /// is only written after the full response decodes, so a failing call
    /// leaves it exactly as it was.
    ///
    /// # Errors
    ///
    /// Returns an error carrying the endpoint URL and HTTP status if the
    /// call fails, the status is outside 2xx, or a non-empty body is not a
    /// JSON object.
    pub async fn add_claims(&self, request: &Request, target: &mut ClaimMap) -> AppResult<()> {
        let mut body = self.base_metadata.clone();
        for (key, value) in &request.metadata {
            body.insert(key.clone(), value.clone());
        }

        debug!(url = %self.url, method = %self.method, "fetching remote claims");

        let response = self
            .client
            .request(self.method.clone(), self.url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                AppError::remote_claims(
                    self.url.as_str(),
                    None,
                    format!("remote claims call failed: {e}"),
                )
            })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| {
            AppError::remote_claims(
                self.url.as_str(),
                Some(status.as_u16()),
                format!("failed to read remote claims response: {e}"),
            )
        })?;

        if !status.is_success() {
            return Err(AppError::remote_claims(
                self.url.as_str(),
                Some(status.as_u16()),
                format!("remote claims endpoint returned {status}"),
            ));
        }

        if bytes.is_empty() {
            return Ok(());
        }

        let decoded: serde_json::Value = serde_json::from_slice(&bytes).map_err(|e| {
            AppError::remote_claims(
                self.url.as_str(),
                Some(status.as_u16()),
                format!("remote claims response is not valid JSON: {e}"),
            )
        })?;

        let serde_json::Value::Object(claims) = decoded else {
            return Err(AppError::remote_claims(
                self.url.as_str(),
                Some(status.as_u16()),
                "remote claims response is not a JSON object",
            ));
        };

        for (key, value) in claims {
            target.insert(key, value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_url_rejected() {
        let options = RemoteOptions::default();
        let error =
            RemoteClaims::new(reqwest::Client::new(), &options, ClaimMap::new()).unwrap_err();
        assert!(error.message.contains("empty"));
    }

    #[test]
    fn test_unparseable_url_rejected() {
        let options = RemoteOptions {
            url: "::not a url::".to_owned(),
            ..RemoteOptions::default()
        };
        assert!(RemoteClaims::new(reqwest::Client::new(), &options, ClaimMap::new()).is_err());
    }

    #[test]
    fn test_method_defaults_to_post() {
        let options = RemoteOptions {
            url: "http://claims.local/ext".to_owned(),
            ..RemoteOptions::default()
        };
        let remote = RemoteClaims::new(reqwest::Client::new(), &options, ClaimMap::new()).unwrap();
        assert_eq!(remote.method, Method::POST);
    }

    #[test]
    fn test_method_is_uppercased() {
        let options = RemoteOptions {
            method: Some("get".to_owned()),
            url: "http://claims.local/ext".to_owned(),
        };
        let remote = RemoteClaims::new(reqwest::Client::new(), &options, ClaimMap::new()).unwrap();
        assert_eq!(remote.method, Method::GET);
    }
}
