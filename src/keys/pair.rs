// ABOUTME: Immutable signing key pairs with exported PEM and JWK verification material
// ABOUTME: Wraps RSA, ECDSA, and secret keys behind one construction and export surface
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Tokensmith Contributors

//! Key pair construction and public-key export.
//!
//! A [`KeyPair`] is immutable once constructed: its PEM and JWK exports always
//! describe the public counterpart of the signing key it was built from.
//! Rotation supersedes a pair with a new one; pairs are never edited in place.

use crate::errors::{AppError, AppResult};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use jsonwebtoken::EncodingKey;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};

/// JWK (JSON Web Key) representation of a pair's verification material
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonWebKey {
    /// Key type ("RSA", "EC", or "oct")
    pub kty: String,
    /// Public key use (always "sig")
    #[serde(rename = "use")]
    pub key_use: String,
    /// Key ID
    pub kid: String,
    /// RSA modulus (base64url encoded)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    /// RSA exponent (base64url encoded)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    /// ECDSA curve name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    /// ECDSA x coordinate (base64url encoded)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    /// ECDSA y coordinate (base64url encoded)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    /// Symmetric key bytes (base64url encoded)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k: Option<String>,
}

impl JsonWebKey {
    fn new(kty: &str, kid: &str) -> Self {
        Self {
            kty: kty.to_owned(),
            key_use: "sig".to_owned(),
            kid: kid.to_owned(),
            n: None,
            e: None,
            crv: None,
            x: None,
            y: None,
            k: None,
        }
    }
}

/// JWKS (JSON Web Key Set) container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonWebKeySet {
    /// Array of public keys
    pub keys: Vec<JsonWebKey>,
}

/// ECDSA private key on one of the supported NIST curves
#[derive(Debug, Clone)]
pub enum EcdsaKey {
    P224(p224::SecretKey),
    P256(p256::SecretKey),
    P384(p384::SecretKey),
    P521(p521::SecretKey),
}

impl EcdsaKey {
    /// JWK curve name
    #[must_use]
    pub const fn curve(&self) -> &'static str {
        match self {
            Self::P224(_) => "P-224",
            Self::P256(_) => "P-256",
            Self::P384(_) => "P-384",
            Self::P521(_) => "P-521",
        }
    }

    fn public_key_pem(&self) -> AppResult<String> {
        let pem = match self {
            Self::P224(key) => key.public_key().to_public_key_pem(LineEnding::LF),
            Self::P256(key) => key.public_key().to_public_key_pem(LineEnding::LF),
            Self::P384(key) => key.public_key().to_public_key_pem(LineEnding::LF),
            Self::P521(key) => key.public_key().to_public_key_pem(LineEnding::LF),
        };
        pem.map_err(|e| AppError::key_material(format!("failed to export EC public key: {e}")))
    }

    fn private_key_pem(&self) -> AppResult<String> {
        let pem = match self {
            Self::P224(key) => key.to_pkcs8_pem(LineEnding::LF),
            Self::P256(key) => key.to_pkcs8_pem(LineEnding::LF),
            Self::P384(key) => key.to_pkcs8_pem(LineEnding::LF),
            Self::P521(key) => key.to_pkcs8_pem(LineEnding::LF),
        };
        pem.map(|pem| pem.to_string())
            .map_err(|e| AppError::key_material(format!("failed to export EC private key: {e}")))
    }

    fn coordinates(&self) -> AppResult<(String, String)> {
        fn encode(x: Option<&[u8]>, y: Option<&[u8]>) -> AppResult<(String, String)> {
            match (x, y) {
                (Some(x), Some(y)) => {
                    Ok((URL_SAFE_NO_PAD.encode(x), URL_SAFE_NO_PAD.encode(y)))
                }
                _ => Err(AppError::key_material("EC public key has no affine coordinates")),
            }
        }

        match self {
            Self::P224(key) => {
                let point = key.public_key().to_encoded_point(false);
                encode(point.x().map(|x| x.as_slice()), point.y().map(|y| y.as_slice()))
            }
            Self::P256(key) => {
                let point = key.public_key().to_encoded_point(false);
                encode(point.x().map(|x| x.as_slice()), point.y().map(|y| y.as_slice()))
            }
            Self::P384(key) => {
                let point = key.public_key().to_encoded_point(false);
                encode(point.x().map(|x| x.as_slice()), point.y().map(|y| y.as_slice()))
            }
            Self::P521(key) => {
                let point = key.public_key().to_encoded_point(false);
                encode(point.x().map(|x| x.as_slice()), point.y().map(|y| y.as_slice()))
            }
        }
    }
}

/// Resolved signing key material; exactly one variant per pair
#[derive(Debug, Clone)]
pub enum KeyMaterial {
    /// RSA private key
    Rsa(Box<RsaPrivateKey>),
    /// ECDSA private key
    Ecdsa(EcdsaKey),
    /// Raw symmetric secret bytes
    Secret(Vec<u8>),
}

impl From<&str> for KeyMaterial {
    fn from(secret: &str) -> Self {
        Self::Secret(secret.as_bytes().to_vec())
    }
}

impl From<String> for KeyMaterial {
    fn from(secret: String) -> Self {
        Self::Secret(secret.into_bytes())
    }
}

/// A signing key together with its exported verification material
pub struct KeyPair {
    kid: String,
    material: KeyMaterial,
    public_pem: String,
    jwk: JsonWebKey,
    jwk_json: String,
}

impl KeyPair {
    /// Construct a pair from resolved key material.
    ///
    /// The PEM and JWK exports are computed here, once, and never change for
    /// the lifetime of the pair.
    ///
    /// # Errors
    /// Returns an error if the verification material cannot be encoded
    pub fn new(kid: impl Into<String>, material: KeyMaterial) -> AppResult<Self> {
        let kid = kid.into();
        let public_pem = public_pem(&material)?;
        let jwk = to_jwk(&kid, &material)?;
        let jwk_json = serde_json::to_string_pretty(&jwk)
            .map_err(|e| AppError::key_material(format!("failed to serialize JWK: {e}")))?;

        Ok(Self {
            kid,
            material,
            public_pem,
            jwk,
            jwk_json,
        })
    }

    /// Key identifier
    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Signing key material
    #[must_use]
    pub const fn material(&self) -> &KeyMaterial {
        &self.material
    }

    /// PEM-encoded verification material
    ///
    /// For asymmetric keys this is the PKIX public key in a `PUBLIC KEY`
    /// block. A symmetric secret is its own verification material, so it is
    /// wrapped under the same label.
    #[must_use]
    pub fn public_pem(&self) -> &str {
        &self.public_pem
    }

    /// JWK representation of the verification material
    #[must_use]
    pub const fn jwk(&self) -> &JsonWebKey {
        &self.jwk
    }

    /// Indented JWK JSON document
    #[must_use]
    pub fn jwk_json(&self) -> &str {
        &self.jwk_json
    }

    /// Build the JWT encoding key for this pair
    ///
    /// # Errors
    /// Returns an error if the private key cannot be re-encoded for the JWT
    /// library, or if its curve has no supported signing algorithm
    pub fn encoding_key(&self) -> AppResult<EncodingKey> {
        match &self.material {
            KeyMaterial::Rsa(key) => {
                let pem = key
                    .to_pkcs8_pem(LineEnding::LF)
                    .map_err(|e| AppError::key_material(format!("failed to export RSA key: {e}")))?;
                EncodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| {
                    AppError::key_material(format!("RSA key rejected by JWT library: {e}"))
                })
            }
            KeyMaterial::Ecdsa(key) => {
                let pem = key.private_key_pem()?;
                EncodingKey::from_ec_pem(pem.as_bytes()).map_err(|e| {
                    AppError::key_material(format!(
                        "{} key rejected by JWT library: {e}",
                        key.curve()
                    ))
                })
            }
            KeyMaterial::Secret(secret) => Ok(EncodingKey::from_secret(secret)),
        }
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print private material
        f.debug_struct("KeyPair").field("kid", &self.kid).finish_non_exhaustive()
    }
}

fn public_pem(material: &KeyMaterial) -> AppResult<String> {
    match material {
        KeyMaterial::Rsa(key) => key
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| AppError::key_material(format!("failed to export RSA public key: {e}"))),
        KeyMaterial::Ecdsa(key) => key.public_key_pem(),
        KeyMaterial::Secret(secret) => Ok(pem_wrap("PUBLIC KEY", secret)),
    }
}

fn to_jwk(kid: &str, material: &KeyMaterial) -> AppResult<JsonWebKey> {
    match material {
        KeyMaterial::Rsa(key) => {
            let public_key = key.to_public_key();
            let mut jwk = JsonWebKey::new("RSA", kid);
            jwk.n = Some(URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()));
            jwk.e = Some(URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()));
            Ok(jwk)
        }
        KeyMaterial::Ecdsa(key) => {
            let (x, y) = key.coordinates()?;
            let mut jwk = JsonWebKey::new("EC", kid);
            jwk.crv = Some(key.curve().to_owned());
            jwk.x = Some(x);
            jwk.y = Some(y);
            Ok(jwk)
        }
        KeyMaterial::Secret(secret) => {
            let mut jwk = JsonWebKey::new("oct", kid);
            jwk.k = Some(URL_SAFE_NO_PAD.encode(secret));
            Ok(jwk)
        }
    }
}

/// Wrap raw bytes in a PEM block with 64-character lines
fn pem_wrap(label: &str, der: &[u8]) -> String {
    let encoded = STANDARD.encode(der);
    let mut out = format!("-----BEGIN {label}-----\n");
    for chunk in encoded.as_bytes().chunks(64) {
        out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
        out.push('\n');
    }
    out.push_str(&format!("-----END {label}-----\n"));
    out
}
