// ABOUTME: Token factory signing assembled claim sets with the current key pair
// ABOUTME: Holds the active key in an atomically swappable cell for lock-free rotation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Tokensmith Contributors

//! The token factory.
//!
//! The factory holds one active [`KeyPair`] plus its prepared JWT encoding
//! key behind a cell whose write lock is held only for the pointer
//! assignment. Signing snapshots the cell once, so a rotation is a single
//! indivisible swap: the very next sign call sees the new pair, and a sign
//! already in flight never observes a half-updated one.

use crate::claims::{ClaimBuilders, ClaimMap};
use crate::config::Options;
use crate::errors::{AppError, AppResult};
use crate::keys::{KeyPair, Registry};
use crate::noncer::Noncer;
use crate::request::Request;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

/// Default signing algorithm name
pub const DEFAULT_ALG: &str = "RS256";

/// Registration name used when the key descriptor carries no KID
pub const DEFAULT_KEY_NAME: &str = "default";

/// The pair currently used for signing, together with its prepared encoding
/// key so the sign path never re-encodes private material
struct ActiveKey {
    pair: Arc<KeyPair>,
    encoding_key: EncodingKey,
}

impl std::fmt::Debug for TokenFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenFactory")
            .field("alg", &self.alg)
            .finish_non_exhaustive()
    }
}

/// Signs assembled claim sets into encoded JWT strings
pub struct TokenFactory {
    alg: Algorithm,
    active: RwLock<Arc<ActiveKey>>,
    builders: ClaimBuilders,
}

impl TokenFactory {
    /// Construct a factory from configuration.
    ///
    /// Registers the factory's own key descriptor with the registry and
    /// resolves the signing algorithm up front; per-call signing never
    /// re-validates either.
    ///
    /// # Errors
    ///
    /// Returns an error if the algorithm name is unrecognized, if key
    /// registration fails (including a duplicate KID), or if the claim
    /// pipeline configuration is invalid.
    pub fn new(
        options: &Options,
        registry: &Registry,
        noncer: Arc<dyn Noncer>,
        client: reqwest::Client,
    ) -> AppResult<Self> {
        let alg_name = options
            .alg
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_ALG);
        let alg = Algorithm::from_str(alg_name)
            .map_err(|_| AppError::config(format!("unrecognized signing algorithm: {alg_name}")))?;

        let pair = registry.register(DEFAULT_KEY_NAME, &options.key)?;
        let encoding_key = pair.encoding_key()?;
        let builders = ClaimBuilders::new(options, noncer, client)?;

        Ok(Self {
            alg,
            active: RwLock::new(Arc::new(ActiveKey { pair, encoding_key })),
            builders,
        })
    }

    /// Run the claim pipeline into a fresh map
    ///
    /// # Errors
    /// Returns the first pipeline error; the partial map is discarded by the
    /// caller
    pub async fn claims(&self, request: &Request) -> AppResult<ClaimMap> {
        let mut target = ClaimMap::new();
        self.builders.add_claims(request, &mut target).await?;
        Ok(target)
    }

    /// Sign an assembled claim set with the current key pair
    ///
    /// # Errors
    /// Returns an error if JWT encoding fails
    pub fn sign(&self, claims: &ClaimMap) -> AppResult<String> {
        let active = self.snapshot();

        let mut header = Header::new(self.alg);
        header.kid = Some(active.pair.kid().to_owned());

        jsonwebtoken::encode(&header, claims, &active.encoding_key)
            .map_err(|e| AppError::signing(format!("failed to encode JWT: {e}")))
    }

    /// Build the claim set for a request and sign it
    ///
    /// # Errors
    /// Returns an error if claim building or signing fails
    pub async fn new_token(&self, request: &Request) -> AppResult<String> {
        let claims = self.claims(request).await?;
        self.sign(&claims)
    }

    /// Swap the active signing pair.
    ///
    /// The encoding key is prepared outside the lock; the lock is held only
    /// for the single pointer assignment.
    ///
    /// # Errors
    /// Returns an error if the new pair's key cannot be prepared for signing
    pub fn rotate(&self, pair: Arc<KeyPair>) -> AppResult<()> {
        let encoding_key = pair.encoding_key()?;
        let next = Arc::new(ActiveKey { pair, encoding_key });

        *self.active.write().unwrap_or_else(PoisonError::into_inner) = next;
        Ok(())
    }

    /// KID of the pair currently used for signing
    #[must_use]
    pub fn current_kid(&self) -> String {
        self.snapshot().pair.kid().to_owned()
    }

    fn snapshot(&self) -> Arc<ActiveKey> {
        Arc::clone(&self.active.read().unwrap_or_else(PoisonError::into_inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Value;
    use crate::keys::{Descriptor, KeyMaterial, KeyType};
    use crate::noncer::UrlSafeNoncer;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use std::time::Duration;

    fn hs256_options() -> Options {
        Options {
            alg: Some("HS256".to_owned()),
            key: Descriptor {
                kid: "test-hmac".to_owned(),
                kind: KeyType::Secret,
                bits: 64,
                file: None,
            },
            ..Options::default()
        }
    }

    fn factory(options: &Options) -> (TokenFactory, Registry) {
        let registry = Registry::new();
        let factory = TokenFactory::new(
            options,
            &registry,
            Arc::new(UrlSafeNoncer::default()),
            reqwest::Client::new(),
        )
        .unwrap();
        (factory, registry)
    }

    fn decode_segment(token: &str, index: usize) -> serde_json::Value {
        let segment = token.split('.').nth(index).unwrap();
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(segment).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_token_header_carries_kid_and_alg() {
        let (factory, _registry) = factory(&hs256_options());

        let token = factory.new_token(&Request::new()).await.unwrap();
        assert_eq!(token.split('.').count(), 3);

        let header = decode_segment(&token, 0);
        assert_eq!(header["alg"], "HS256");
        assert_eq!(header["kid"], "test-hmac");
    }

    #[tokio::test]
    async fn test_tokens_are_independently_valid_but_distinct() {
        let options = Options {
            nonce: true,
            duration: Some(Duration::from_secs(60)),
            ..hs256_options()
        };
        let (factory, _registry) = factory(&options);

        let first = factory.new_token(&Request::new()).await.unwrap();
        let second = factory.new_token(&Request::new()).await.unwrap();

        assert_ne!(first, second);
        let first_claims = decode_segment(&first, 1);
        let second_claims = decode_segment(&second, 1);
        assert_ne!(first_claims["jti"], second_claims["jti"]);
    }

    #[tokio::test]
    async fn test_static_claims_flow_into_payload() {
        let options = Options {
            claims: vec![Value {
                key: "aud".to_owned(),
                value: Some(serde_json::json!("server")),
                ..Value::default()
            }],
            ..hs256_options()
        };
        let (factory, _registry) = factory(&options);

        let token = factory.new_token(&Request::new()).await.unwrap();
        let claims = decode_segment(&token, 1);
        assert_eq!(claims["aud"], "server");
    }

    #[test]
    fn test_unknown_algorithm_rejected_at_construction() {
        let options = Options {
            alg: Some("XX999".to_owned()),
            ..hs256_options()
        };
        let registry = Registry::new();

        let error = TokenFactory::new(
            &options,
            &registry,
            Arc::new(UrlSafeNoncer::default()),
            reqwest::Client::new(),
        )
        .unwrap_err();
        assert!(error.message.contains("XX999"));
    }

    #[tokio::test]
    async fn test_rotation_visible_to_next_token() {
        let (factory, registry) = factory(&hs256_options());
        assert_eq!(factory.current_kid(), "test-hmac");

        let next = Arc::new(KeyPair::new("rotated", KeyMaterial::from("new secret")).unwrap());
        assert!(registry.update("test-hmac", Arc::clone(&next)));
        factory.rotate(next).unwrap();

        let token = factory.new_token(&Request::new()).await.unwrap();
        let header = decode_segment(&token, 0);
        assert_eq!(header["kid"], "rotated");
    }

    #[tokio::test]
    async fn test_es256_signing() {
        let options = Options {
            alg: Some("ES256".to_owned()),
            key: Descriptor {
                kid: "test-ec".to_owned(),
                kind: KeyType::Ecdsa,
                bits: 256,
                file: None,
            },
            ..Options::default()
        };
        let (factory, _registry) = factory(&options);

        let token = factory.new_token(&Request::new()).await.unwrap();
        let header = decode_segment(&token, 0);
        assert_eq!(header["alg"], "ES256");
    }
}
