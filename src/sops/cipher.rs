//! # Leaf Cipher
//!
//! Decrypts SOPS leaf values of the form
//! `ENC[AES256_GCM,data:<b64>,iv:<b64>,tag:<b64>,type:<t>]`.

use crate::constants::{AES256_GCM, AES_GCM_NONCE_SIZE, DATA_KEY_SIZE};
use crate::sops::error::CipherError;
use aes::Aes256;
use aes_gcm::aead::consts::U32;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{AesGcm, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use regex::Regex;
use serde_yaml::{Number, Value};
use std::fmt;
use zeroize::Zeroizing;

/// AES-256-GCM with the 32-byte nonce SOPS writes
type SopsAesGcm = AesGcm<Aes256, U32>;

/// Cipher bound to one document's data key
///
/// The expanded key schedule is wiped when the cipher is dropped.
pub struct LeafCipher {
    aead: SopsAesGcm,
    pattern: Regex,
}

impl fmt::Debug for LeafCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeafCipher").finish_non_exhaustive()
    }
}

impl LeafCipher {
    /// # Errors
    ///
    /// Fails if the data key is not 32 bytes.
    pub fn new(data_key: &[u8]) -> Result<Self, CipherError> {
        let aead =
            SopsAesGcm::new_from_slice(data_key).map_err(|_invalid| CipherError::InvalidKeyLength {
                actual: data_key.len(),
                expected: DATA_KEY_SIZE,
            })?;
        let pattern = Regex::new(&format!(
            r"^ENC\[{AES256_GCM},data:(?P<data>.+),iv:(?P<iv>.+),tag:(?P<tag>.+),type:(?P<type>.+)\]"
        ))?;
        Ok(Self { aead, pattern })
    }

    /// Decrypt a leaf and restore its original scalar type
    ///
    /// # Errors
    ///
    /// Fails on a malformed envelope, an authentication failure (wrong key, modified value or
    /// wrong `additional_data`) or a plaintext that does not parse as the declared type.
    pub fn decrypt(&self, value: &str, additional_data: &str) -> Result<Value, CipherError> {
        if value.is_empty() {
            return Ok(Value::String(String::new()));
        }
        let (plaintext, datatype) = self.open(value, additional_data)?;
        restore_type(&plaintext, &datatype)
    }

    /// Decrypt a leaf as raw text, ignoring its declared type (used for the stored MAC)
    ///
    /// # Errors
    ///
    /// Same as [`LeafCipher::decrypt`].
    pub fn decrypt_str(&self, value: &str, additional_data: &str) -> Result<String, CipherError> {
        if value.is_empty() {
            return Ok(String::new());
        }
        let (plaintext, _) = self.open(value, additional_data)?;
        String::from_utf8(plaintext.to_vec()).map_err(|e| CipherError::InvalidPlaintext {
            datatype: "str".to_string(),
            reason: e.to_string(),
        })
    }

    fn open(&self, value: &str, additional_data: &str) -> Result<(Zeroizing<Vec<u8>>, String), CipherError> {
        let captures = self
            .pattern
            .captures(value)
            .ok_or(CipherError::MalformedValue)?;

        let decode = |field: &'static str| {
            STANDARD
                .decode(&captures[field])
                .map_err(|e| CipherError::Encoding {
                    field,
                    reason: e.to_string(),
                })
        };
        let mut ciphertext = decode("data")?;
        let iv = decode("iv")?;
        let tag = decode("tag")?;

        if iv.len() != AES_GCM_NONCE_SIZE {
            return Err(CipherError::InvalidNonceLength {
                actual: iv.len(),
                expected: AES_GCM_NONCE_SIZE,
            });
        }

        ciphertext.extend_from_slice(&tag);
        let plaintext = self
            .aead
            .decrypt(
                Nonce::<U32>::from_slice(&iv),
                Payload {
                    msg: &ciphertext,
                    aad: additional_data.as_bytes(),
                },
            )
            .map_err(|aes_gcm::Error| CipherError::Authentication)?;

        Ok((Zeroizing::new(plaintext), captures["type"].to_string()))
    }
}

fn restore_type(plaintext: &[u8], datatype: &str) -> Result<Value, CipherError> {
    let invalid = |reason: String| CipherError::InvalidPlaintext {
        datatype: datatype.to_string(),
        reason,
    };
    let text = || std::str::from_utf8(plaintext).map_err(|e| invalid(e.to_string()));
    match datatype {
        "str" | "bytes" => Ok(Value::String(text()?.to_string())),
        "int" => text()?
            .parse::<i64>()
            .map(|i| Value::Number(Number::from(i)))
            .map_err(|e| invalid(e.to_string())),
        "float" => text()?
            .parse::<f64>()
            .map(|f| Value::Number(Number::from(f)))
            .map_err(|e| invalid(e.to_string())),
        "bool" => {
            let text = text()?;
            parse_bool(text)
                .map(Value::Bool)
                .ok_or_else(|| invalid(format!("'{text}'")))
        }
        other => Err(CipherError::UnknownDatatype {
            datatype: other.to_string(),
        }),
    }
}

/// Boolean spellings SOPS accepts when restoring `type:bool` values
fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Data key and leaf from the reference Secret fixture (stringData.foo = "bar")
    const DATA_KEY: &str = "efd540e8eef91bfab303d41f7abec68b3040ee419109f864b3f078f8ef483c4e";
    const FOO: &str = "ENC[AES256_GCM,data:5Czb,iv:9pu0tjIJz5plxRZ0XAs1DJCZcO/vOdQWavPmrX1xOb8=,tag:/QYxcDIvpVKhHCltEAAtPA==,type:str]";

    #[test]
    fn test_rejects_short_key() {
        assert!(matches!(
            LeafCipher::new(&[0u8; 16]),
            Err(CipherError::InvalidKeyLength {
                actual: 16,
                expected: 32
            })
        ));
    }

    #[test]
    fn test_key_schedule_is_wiped_on_drop() {
        fn assert_zeroize_on_drop<T: zeroize::ZeroizeOnDrop>() {}
        assert_zeroize_on_drop::<Aes256>();
    }

    #[test]
    fn test_empty_value_stays_empty() {
        let cipher = LeafCipher::new(&[7u8; 32]).unwrap();
        assert_eq!(cipher.decrypt("", "a:").unwrap(), Value::String(String::new()));
    }

    #[test]
    fn test_non_envelope_rejected() {
        let cipher = LeafCipher::new(&[7u8; 32]).unwrap();
        assert!(matches!(
            cipher.decrypt("plain", "a:"),
            Err(CipherError::MalformedValue)
        ));
    }

    #[test]
    fn test_short_iv_rejected() {
        let cipher = LeafCipher::new(&[7u8; 32]).unwrap();
        let err = cipher
            .decrypt("ENC[AES256_GCM,data:AAAA,iv:AAAA,tag:AAAA,type:str]", "a:")
            .unwrap_err();
        assert!(matches!(
            err,
            CipherError::InvalidNonceLength {
                actual: 3,
                expected: 32
            }
        ));
    }

    #[test]
    fn test_wrong_key_fails_authentication() {
        let cipher = LeafCipher::new(&[7u8; 32]).unwrap();
        let err = cipher.decrypt(FOO, "stringData:foo:").unwrap_err();
        assert!(matches!(err, CipherError::Authentication));
        assert_eq!(err.to_string(), "could not decrypt with AES_GCM");
    }

    #[test]
    fn test_decrypt_reference_leaf() {
        let key = hex::decode(DATA_KEY).unwrap();
        let cipher = LeafCipher::new(&key).unwrap();
        assert_eq!(
            cipher.decrypt(FOO, "stringData:foo:").unwrap(),
            Value::String("bar".to_string())
        );
        // The path is bound as additional data
        assert!(cipher.decrypt(FOO, "stringData:bar:").is_err());
    }

    #[test]
    fn test_restore_types() {
        assert_eq!(restore_type(b"20", "int").unwrap(), Value::Number(20.into()));
        assert_eq!(
            restore_type(b"0.75", "float").unwrap(),
            Value::Number(Number::from(0.75))
        );
        assert_eq!(restore_type(b"True", "bool").unwrap(), Value::Bool(true));
        assert_eq!(restore_type(b"false", "bool").unwrap(), Value::Bool(false));
        assert!(matches!(
            restore_type(b"yes", "bool"),
            Err(CipherError::InvalidPlaintext { .. })
        ));
        assert!(matches!(
            restore_type(b"x", "complex"),
            Err(CipherError::UnknownDatatype { .. })
        ));
    }
}
