//! # SOPS Decryption Tests
//!
//! Decrypts real SOPS/age documents from `tests/fixtures`.
//!
//! These tests verify:
//! - Decryption of every scalar type, lists and nulls
//! - Recipient handling (first matching entry wins, unrelated keys, non-age documents)
//! - MAC verification and the ignore policy
//! - YAML and JSON wire formats

use kustomize_sops_age::sops::error::{DecryptError, FailureKind};
use kustomize_sops_age::sops::{decrypt_document, is_sops_encrypted, IdentitySet, MacPolicy};
use kustomize_sops_age::DocumentFormat;
use pretty_assertions::assert_eq;
use serde_yaml::Value;
use std::path::PathBuf;

const KEY_1: &str = "AGE-SECRET-KEY-1ZG7DTP6CK848WNETJZU6LT83DD6EVR9SJ32Y3CT7EZEUP7YFH0NQE2HPA4";
const KEY_2: &str = "AGE-SECRET-KEY-1P3XZ6S96208N9FVJUC6DQMR8M23EZ8AQ9400F0GH2E428G54EA9SNKA9CX";

/// Test helper: Read a fixture from tests/fixtures
fn fixture(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture {}: {e}", path.display()))
}

/// Test helper: The reference Secret without the pipeline-injected index annotation
fn reference_secret() -> String {
    fixture("secret.enc.yaml").replace("    config.kubernetes.io/index: \"1\"\n", "")
}

fn decrypt_yaml(raw: &str, keys: &[&str], policy: MacPolicy) -> Result<Value, DecryptError> {
    let identities = IdentitySet::parse(keys).expect("test keys are valid");
    let plaintext = decrypt_document(raw.as_bytes(), DocumentFormat::Yaml, &identities, policy)?;
    Ok(serde_yaml::from_slice(&plaintext).expect("plaintext is valid YAML"))
}

#[test]
fn test_fixtures_are_detected_as_encrypted() {
    for name in [
        "secret.enc.yaml",
        "app-settings.enc.yaml",
        "legacy.enc.yaml",
        "pgp-only.enc.yaml",
    ] {
        assert!(is_sops_encrypted(&fixture(name)), "{name} should be detected");
    }
}

#[test]
fn test_decrypt_reference_secret() {
    let identities = IdentitySet::parse(&[KEY_1]).unwrap();
    let plaintext = decrypt_document(
        reference_secret().as_bytes(),
        DocumentFormat::Yaml,
        &identities,
        MacPolicy::Verify,
    )
    .unwrap();

    assert_eq!(
        String::from_utf8(plaintext).unwrap(),
        "apiVersion: v1\nkind: Secret\nmetadata:\n  name: secret\n  annotations:\n    some.domain.com/foo: bar\nstringData:\n  foo: bar\n"
    );
}

#[test]
fn test_injected_annotation_breaks_mac() {
    // The index annotation was added by the pipeline after encryption
    let err = decrypt_yaml(&fixture("secret.enc.yaml"), &[KEY_1], MacPolicy::Verify).unwrap_err();
    assert_eq!(err.kind(), FailureKind::IntegrityCheckFailed);

    let value = decrypt_yaml(&fixture("secret.enc.yaml"), &[KEY_1], MacPolicy::Ignore).unwrap();
    assert_eq!(value["stringData"]["foo"], Value::from("bar"));
}

#[test]
fn test_decrypt_all_scalar_types() {
    let value = decrypt_yaml(&fixture("app-settings.enc.yaml"), &[KEY_2], MacPolicy::Verify).unwrap();
    let data = &value["data"];

    assert_eq!(data["DATABASE_URL"], Value::from("postgres://app:hunter2@db/app"));
    assert_eq!(data["POOL_SIZE"], Value::from(20));
    assert_eq!(data["RATIO"], Value::from(0.75));
    assert_eq!(data["FEATURE_ENABLED"], Value::Bool(true));
    assert_eq!(data["EMPTY"], Value::from(""));
    assert_eq!(
        data["hosts"],
        Value::Sequence(vec![Value::from("db-1.internal"), Value::from("db-2.internal")])
    );

    // Unselected fields are untouched
    assert_eq!(value["spec"]["replicas"], Value::from(3));
    assert_eq!(value["spec"]["paused"], Value::Bool(false));
    assert!(value["spec"]["note"].is_null());
    assert_eq!(value["metadata"]["namespace"], Value::from("payments"));
    assert!(value.get("sops").is_none());
}

#[test]
fn test_second_recipient_entry_is_tried() {
    // The first entry belongs to a key that is not configured
    let value = decrypt_yaml(
        &fixture("app-settings.enc.yaml"),
        &[KEY_1, KEY_2],
        MacPolicy::Verify,
    )
    .unwrap();
    assert_eq!(value["data"]["POOL_SIZE"], Value::from(20));
}

#[test]
fn test_no_matching_identity_reports_every_entry() {
    let err = decrypt_yaml(&fixture("app-settings.enc.yaml"), &[KEY_1], MacPolicy::Verify)
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::NoMatchingIdentity);
    match err {
        DecryptError::NoMatchingIdentity {
            tried, failures, ..
        } => {
            assert_eq!(tried, 2);
            assert_eq!(failures.len(), 2);
            assert!(failures[0].starts_with("age1p8j4kckw0emmlnga23rakxajpt5a376dnfcvnceauvswdhpad9fqqaw3y2"));
        }
        other => panic!("Expected NoMatchingIdentity, got {other:?}"),
    }
}

#[test]
fn test_unrelated_key_on_reference_secret() {
    let err = decrypt_yaml(&reference_secret(), &[KEY_2], MacPolicy::Verify).unwrap_err();
    assert_eq!(err.kind(), FailureKind::NoMatchingIdentity);
    assert!(err.to_string().contains("1 successful groups required, got 0"));
}

#[test]
fn test_corrupted_envelope_is_a_format_error() {
    let corrupted = reference_secret().replace("BEGIN AGE ENCRYPTED FILE", "BEGIN AGE GARBAGE");
    let err = decrypt_yaml(&corrupted, &[KEY_1], MacPolicy::Verify).unwrap_err();

    assert_eq!(err.kind(), FailureKind::FormatError);
    match err {
        DecryptError::InvalidMetadata { reason } => assert!(reason.contains(
            "age1ks0a8wkcdt74jp9l2chgny8e2pnjqta7rdwam4ju4ceqervn5ulq26q0wf: age envelope is malformed"
        )),
        other => panic!("Expected InvalidMetadata, got {other:?}"),
    }
}

#[test]
fn test_document_without_age_entries() {
    let err = decrypt_yaml(&fixture("pgp-only.enc.yaml"), &[KEY_1], MacPolicy::Verify).unwrap_err();
    assert!(matches!(
        err,
        DecryptError::InsufficientRecipientGroups {
            succeeded: 0,
            required: 1
        }
    ));
}

#[test]
fn test_unencrypted_suffix_and_mac_only_encrypted() {
    let value = decrypt_yaml(&fixture("legacy.enc.yaml"), &[KEY_1], MacPolicy::Verify).unwrap();
    assert_eq!(value["password"], Value::from("s3cr3t-pa55"));
    assert_eq!(value["username_unencrypted"], Value::from("admin"));
    assert_eq!(value["nested"]["token"], Value::from("tok-123"));
    assert_eq!(value["nested"]["port_unencrypted"], Value::from(5432));
}

#[test]
fn test_mac_only_encrypted_ignores_plain_field_changes() {
    // Plain fields are outside the MAC when mac_only_encrypted is set
    let edited = fixture("legacy.enc.yaml").replace("username_unencrypted: admin", "username_unencrypted: root");
    let value = decrypt_yaml(&edited, &[KEY_1], MacPolicy::Verify).unwrap();
    assert_eq!(value["username_unencrypted"], Value::from("root"));
}

#[test]
fn test_plain_field_change_detected() {
    let edited = reference_secret().replace("some.domain.com/foo: bar", "some.domain.com/foo: baz");
    let err = decrypt_yaml(&edited, &[KEY_1], MacPolicy::Verify).unwrap_err();
    assert_eq!(err.kind(), FailureKind::IntegrityCheckFailed);
}

#[test]
fn test_stale_mac() {
    let raw = fixture("secret-stale-mac.enc.yaml");
    match decrypt_yaml(&raw, &[KEY_1], MacPolicy::Verify).unwrap_err() {
        DecryptError::IntegrityCheckFailed { stored, computed } => {
            assert_eq!(
                stored,
                "633F306F2D0B07C99E2C426AE4A383E364328A4194138EEFFD4A14D6C7C6F82B3DEB466F108DFD9ADF07CB242944D8BDCA7586A9D4F332D5CDFB061EB3CE9909"
            );
            assert_eq!(
                computed,
                "13529523671A16CF1C03FEDC0E0E184CD621D7378C3405F7EC849D51B6260A1807FEF862F3C4E47668A9E1773307DA32FD38A2FAC4372A6A92C5C4D10AF98B41"
            );
        }
        other => panic!("Expected IntegrityCheckFailed, got {other:?}"),
    }

    let value = decrypt_yaml(&raw, &[KEY_1], MacPolicy::Ignore).unwrap();
    assert_eq!(value["stringData"]["foo"], Value::from("bar"));
}

#[test]
fn test_undecryptable_stored_mac_is_a_mismatch() {
    let tampered = reference_secret().replace("mac: ENC[AES256_GCM,data:04fF", "mac: ENC[AES256_GCM,data:14fF");
    let err = decrypt_yaml(&tampered, &[KEY_1], MacPolicy::Verify).unwrap_err();
    match err {
        DecryptError::IntegrityCheckFailed { stored, .. } => assert!(stored.is_empty()),
        other => panic!("Expected IntegrityCheckFailed, got {other:?}"),
    }

    assert!(decrypt_yaml(&tampered, &[KEY_1], MacPolicy::Ignore).is_ok());
}

#[test]
fn test_modified_ciphertext_is_a_cipher_error() {
    let tampered = reference_secret().replace("data:5Czb,", "data:6Czb,");
    let err = decrypt_yaml(&tampered, &[KEY_1], MacPolicy::Ignore).unwrap_err();
    match err {
        DecryptError::Cipher { path, .. } => assert_eq!(path, "stringData.foo"),
        other => panic!("Expected Cipher, got {other:?}"),
    }
}

#[test]
fn test_renamed_field_fails_authentication() {
    // The field path is bound into every leaf
    let moved = reference_secret().replace("  foo: ENC[", "  bar: ENC[");
    let err = decrypt_yaml(&moved, &[KEY_1], MacPolicy::Ignore).unwrap_err();
    assert_eq!(err.kind(), FailureKind::CipherError);
}

#[test]
fn test_decrypt_json_document() {
    let tree: Value = serde_yaml::from_str(&reference_secret()).unwrap();
    let json = serde_json::to_string(&tree).unwrap();

    let identities = IdentitySet::parse(&[KEY_1]).unwrap();
    let plaintext =
        decrypt_document(json.as_bytes(), DocumentFormat::Json, &identities, MacPolicy::Verify)
            .unwrap();

    let value: serde_json::Value = serde_json::from_slice(&plaintext).unwrap();
    assert_eq!(value["stringData"]["foo"], "bar");
    assert!(value.get("sops").is_none());
}

#[test]
fn test_multiple_key_groups_are_a_format_error() {
    let grouped = reference_secret().replace(
        "  age:\n",
        "  key_groups:\n    - age: []\n    - age: []\n  age:\n",
    );
    let err = decrypt_yaml(&grouped, &[KEY_1], MacPolicy::Verify).unwrap_err();
    assert_eq!(err.kind(), FailureKind::FormatError);
}

#[test]
fn test_conflicting_selectors_are_a_format_error() {
    let conflicting = reference_secret().replace(
        "  encrypted_regex: ^(data|stringData)$\n",
        "  encrypted_regex: ^(data|stringData)$\n  unencrypted_suffix: _plain\n",
    );
    let err = decrypt_yaml(&conflicting, &[KEY_1], MacPolicy::Verify).unwrap_err();
    assert!(matches!(err, DecryptError::InvalidMetadata { .. }));
}
