// ABOUTME: Integration tests for key registration from generated and on-disk material
// ABOUTME: Verifies descriptor KID precedence, PEM file parsing, and registry uniqueness

use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs8::{DecodePublicKey, EncodePrivateKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::io::Write;
use tokensmith::keys::{Descriptor, KeyType, Registry};

fn small_rsa() -> RsaPrivateKey {
    let mut rng = rand::rngs::OsRng;
    RsaPrivateKey::new(&mut rng, 512).unwrap()
}

#[test]
fn test_pkcs1_file_pair_keeps_descriptor_kid() {
    let private_key = small_rsa();
    let pem = private_key.to_pkcs1_pem(rsa::pkcs1::LineEnding::LF).unwrap();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(pem.as_bytes()).unwrap();

    let registry = Registry::new();
    let pair = registry
        .register(
            "ignored",
            &Descriptor {
                kid: "from-config".to_owned(),
                kind: KeyType::Rsa,
                bits: 0,
                file: Some(file.path().to_path_buf()),
            },
        )
        .unwrap();

    // The KID comes from the descriptor, never from the file contents
    assert_eq!(pair.kid(), "from-config");

    let decoded = RsaPublicKey::from_public_key_pem(pair.public_pem()).unwrap();
    assert_eq!(decoded, private_key.to_public_key());
}

#[test]
fn test_pkcs8_file_parses_after_pkcs1_fails() {
    let private_key = small_rsa();
    let pem = private_key
        .to_pkcs8_pem(rsa::pkcs8::LineEnding::LF)
        .unwrap();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(pem.as_bytes()).unwrap();

    let registry = Registry::new();
    let pair = registry
        .register(
            "pkcs8-key",
            &Descriptor {
                file: Some(file.path().to_path_buf()),
                ..Descriptor::default()
            },
        )
        .unwrap();

    let decoded = RsaPublicKey::from_public_key_pem(pair.public_pem()).unwrap();
    assert_eq!(decoded, private_key.to_public_key());
}

#[test]
fn test_missing_file_is_descriptive() {
    let registry = Registry::new();
    let error = registry
        .register(
            "missing",
            &Descriptor {
                file: Some("/nonexistent/key.pem".into()),
                ..Descriptor::default()
            },
        )
        .unwrap_err();

    assert!(error.message.contains("/nonexistent/key.pem"));
}

#[test]
fn test_same_descriptor_cannot_register_twice() {
    let descriptor = Descriptor {
        kid: "once".to_owned(),
        kind: KeyType::Secret,
        bits: 32,
        file: None,
    };

    let registry = Registry::new();
    registry.register("once", &descriptor).unwrap();
    let error = registry.register("once", &descriptor).unwrap_err();

    assert_eq!(error.code, tokensmith::errors::ErrorCode::DuplicateKey);
    assert_eq!(registry.key_set().keys.len(), 1);
}
