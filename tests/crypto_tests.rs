//! Integration tests for the PassVault crypto module.

use std::fs;

use passvault::crypto::escrow::WRAPPED_LEN;
use passvault::crypto::kdf::{KdfParams, DEFAULT_ITERATIONS, SALT_LEN};
use passvault::crypto::{
    decrypt, derive, derive_key, encrypt, open, read_key_file, seal, wrap, write_key_file,
    EscrowKeyPair, EscrowPublicKey, VaultKey,
};
use passvault::errors::{ErrorKind, PassVaultError};
use passvault::vault::VaultEntry;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Envelope cipher
// ---------------------------------------------------------------------------

#[test]
fn encrypt_decrypt_roundtrip() {
    let key = VaultKey::generate().unwrap();
    let plaintext = b"site=github user=octo password=hunter2";

    let blob = encrypt(&key, plaintext).expect("encrypt should succeed");
    assert_eq!(blob.iv.len(), 12);
    // Ciphertext carries the 16-byte tag.
    assert_eq!(blob.ciphertext.len(), plaintext.len() + 16);

    let recovered = decrypt(&key, &blob).expect("decrypt should succeed");
    assert_eq!(recovered.as_slice(), plaintext);
}

#[test]
fn encrypt_produces_fresh_nonce_each_time() {
    let key = VaultKey::generate().unwrap();
    let a = encrypt(&key, b"same").unwrap();
    let b = encrypt(&key, b"same").unwrap();
    assert_ne!(a.iv, b.iv);
    assert_ne!(a.ciphertext, b.ciphertext);
}

#[test]
fn decrypt_with_wrong_key_fails() {
    let blob = encrypt(&VaultKey::generate().unwrap(), b"secret").unwrap();
    let err = decrypt(&VaultKey::generate().unwrap(), &blob).unwrap_err();
    assert!(matches!(err, PassVaultError::DecryptionFailed));
    assert_eq!(err.kind(), ErrorKind::Authentication);
}

#[test]
fn tampered_ciphertext_fails() {
    let key = VaultKey::generate().unwrap();
    let mut blob = encrypt(&key, b"secret").unwrap();
    blob.ciphertext[0] ^= 0x01;
    assert!(decrypt(&key, &blob).is_err());
}

#[test]
fn truncated_nonce_fails() {
    let key = VaultKey::generate().unwrap();
    let mut blob = encrypt(&key, b"secret").unwrap();
    blob.iv.truncate(8);
    assert!(matches!(
        decrypt(&key, &blob),
        Err(PassVaultError::DecryptionFailed)
    ));
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Sample {
    name: String,
    tags: Vec<String>,
}

#[test]
fn seal_open_structured_roundtrip() {
    let key = VaultKey::generate().unwrap();
    let value = Sample {
        name: "github".into(),
        tags: vec!["work".into(), "2fa".into()],
    };
    let blob = seal(&key, &value).unwrap();
    let back: Sample = open(&key, &blob).unwrap();
    assert_eq!(back, value);
}

#[test]
fn open_of_non_json_payload_is_integrity_error() {
    let key = VaultKey::generate().unwrap();
    let blob = encrypt(&key, b"\xff\xfe not json").unwrap();
    let err = open::<Vec<VaultEntry>>(&key, &blob).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Integrity);
}

// ---------------------------------------------------------------------------
// Key derivation
// ---------------------------------------------------------------------------

#[test]
fn same_secret_and_salt_derive_identical_keys() {
    let first = derive("correct horse battery staple", None).unwrap();
    let again = derive("correct horse battery staple", Some(&first.salt)).unwrap();
    assert_eq!(first.key.as_bytes(), again.key.as_bytes());
}

#[test]
fn different_salts_derive_different_keys() {
    let a = derive("correct horse battery staple", Some(&[1u8; SALT_LEN])).unwrap();
    let b = derive("correct horse battery staple", Some(&[2u8; SALT_LEN])).unwrap();
    assert_ne!(a.key.as_bytes(), b.key.as_bytes());
}

#[test]
fn derived_key_decrypts_what_it_encrypted() {
    let params = KdfParams::generate(DEFAULT_ITERATIONS).unwrap();
    let key = derive_key(b"master", &params.salt, params.iterations).unwrap();
    let blob = encrypt(&key, b"entries").unwrap();

    let again = derive_key(b"master", &params.salt, params.iterations).unwrap();
    assert_eq!(decrypt(&again, &blob).unwrap().as_slice(), b"entries");

    let wrong = derive_key(b"masterx", &params.salt, params.iterations).unwrap();
    assert!(decrypt(&wrong, &blob).is_err());
}

#[test]
fn empty_master_password_is_rejected() {
    assert!(matches!(
        derive("", None),
        Err(PassVaultError::EmptyMasterPassword)
    ));
}

#[test]
fn iterations_below_floor_are_rejected() {
    assert!(derive_key(b"pw", &[7u8; SALT_LEN], DEFAULT_ITERATIONS - 1).is_err());
}

// ---------------------------------------------------------------------------
// Key files
// ---------------------------------------------------------------------------

#[test]
fn key_file_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vault_key_alice.bin");
    let key = VaultKey::generate().unwrap();

    write_key_file(&path, &key).unwrap();
    assert_eq!(fs::metadata(&path).unwrap().len(), 32);

    let loaded = read_key_file(&path).unwrap();
    assert_eq!(loaded.as_bytes(), key.as_bytes());
}

#[test]
fn key_file_of_wrong_length_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("short.bin");
    fs::write(&path, [0u8; 31]).unwrap();

    let err = read_key_file(&path).unwrap_err();
    assert!(matches!(
        err,
        PassVaultError::InvalidKeyFile {
            expected: 32,
            actual: 31
        }
    ));
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn key_file_is_never_overwritten() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("key.bin");
    write_key_file(&path, &VaultKey::generate().unwrap()).unwrap();
    assert!(write_key_file(&path, &VaultKey::generate().unwrap()).is_err());
}

// ---------------------------------------------------------------------------
// Escrow
// ---------------------------------------------------------------------------

#[test]
fn wrapped_key_has_fixed_length_and_is_randomized() {
    let server = EscrowKeyPair::generate();
    let key = VaultKey::generate().unwrap();

    let a = wrap(&server.public_key(), &key).unwrap();
    let b = wrap(&server.public_key(), &key).unwrap();
    assert_eq!(a.as_bytes().len(), WRAPPED_LEN);
    assert_ne!(a.as_bytes(), b.as_bytes());
    assert!(!a.as_bytes().windows(32).any(|w| w == key.as_bytes()));
}

#[test]
fn public_key_base64_roundtrip() {
    let server = EscrowKeyPair::generate();
    let encoded = server.public_key().to_base64();
    assert_eq!(
        EscrowPublicKey::from_base64(&encoded).unwrap(),
        server.public_key()
    );
}

#[test]
fn all_zero_public_key_is_rejected() {
    assert!(EscrowPublicKey::from_bytes(&[0u8; 32]).is_err());
    assert!(EscrowPublicKey::from_bytes(&[1u8; 31]).is_err());
}
