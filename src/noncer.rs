// ABOUTME: Cryptographically random nonce generation for unique token identifiers
// ABOUTME: Provides the jti claim source backed by the system secure random generator
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Tokensmith Contributors

//! Nonce generation for the claim pipeline.
//!
//! A [`Noncer`] is an explicit randomness capability: every construction site
//! that needs nonces receives one, rather than reaching for ambient global
//! state. The server assembles a single default instance at startup and
//! threads it through.

use crate::errors::{AppError, AppResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ring::rand::{SecureRandom, SystemRandom};

/// Default nonce width in bytes (128 bits of randomness)
const DEFAULT_NONCE_BYTES: usize = 16;

/// Source of cryptographically random, encoded nonce strings
pub trait Noncer: Send + Sync {
    /// Produce a fresh nonce
    ///
    /// # Errors
    /// Returns an error if the underlying random source fails
    fn nonce(&self) -> AppResult<String>;
}

/// Nonce source producing URL-safe base64 strings from the system RNG
pub struct UrlSafeNoncer {
    rng: SystemRandom,
    width: usize,
}

impl UrlSafeNoncer {
    /// Create a noncer producing `width` random bytes per nonce
    #[must_use]
    pub fn new(width: usize) -> Self {
        Self {
            rng: SystemRandom::new(),
            width,
        }
    }
}

impl Default for UrlSafeNoncer {
    fn default() -> Self {
        Self::new(DEFAULT_NONCE_BYTES)
    }
}

impl Noncer for UrlSafeNoncer {
    fn nonce(&self) -> AppResult<String> {
        let mut buf = vec![0u8; self.width];
        self.rng
            .fill(&mut buf)
            .map_err(|_| AppError::nonce("system random source failure"))?;
        Ok(URL_SAFE_NO_PAD.encode(&buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonce_width() {
        let noncer = UrlSafeNoncer::default();
        let nonce = noncer.nonce().unwrap();

        // 16 bytes -> 22 base64url characters without padding
        assert_eq!(nonce.len(), 22);
        assert!(!nonce.contains('='));
    }

    #[test]
    fn test_nonces_are_unique() {
        let noncer = UrlSafeNoncer::new(32);
        let first = noncer.nonce().unwrap();
        let second = noncer.nonce().unwrap();

        assert_ne!(first, second);
    }
}
