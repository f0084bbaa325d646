//! # Local Key-Unwrap Service
//!
//! Recovers a document's data key from its age recipient entries using in-memory identities.
//!
//! The service is deliberately narrow: it never shells out, never reads identity files from
//! disk or the environment and never contacts a remote key service. Any master key that is
//! not an age entry is refused with [`KeyServiceError::UnsupportedKeyType`].

use crate::sops::error::KeyServiceError;
use crate::sops::identity::IdentitySet;
use crate::sops::metadata::MasterKey;
use std::io::Read;
use tracing::debug;
use zeroize::Zeroizing;

/// Key service seam used by the decrypt engine
pub trait KeyService {
    /// Unwrap the data key held by `key`
    ///
    /// # Errors
    ///
    /// - [`KeyServiceError::MissingKey`] when no key is supplied
    /// - [`KeyServiceError::UnsupportedKeyType`] for master keys this service cannot handle
    fn decrypt(&self, key: Option<&MasterKey>) -> Result<Zeroizing<Vec<u8>>, KeyServiceError>;

    /// Wrap a data key for `key`
    ///
    /// # Errors
    ///
    /// The stage never encrypts, so implementations return [`KeyServiceError::NotSupported`].
    fn encrypt(&self, key: Option<&MasterKey>, plaintext: &[u8]) -> Result<String, KeyServiceError>;
}

/// Unwraps age envelopes with every identity of a borrowed [`IdentitySet`]
#[derive(Debug, Clone, Copy)]
pub struct LocalAgeKeyService<'a> {
    identities: &'a IdentitySet,
}

impl<'a> LocalAgeKeyService<'a> {
    pub fn new(identities: &'a IdentitySet) -> Self {
        Self { identities }
    }

    fn unwrap_age(&self, recipient: &str, enc: &str) -> Result<Zeroizing<Vec<u8>>, KeyServiceError> {
        let armored = age::armor::ArmoredReader::new(enc.trim().as_bytes());
        let decryptor =
            age::Decryptor::new(armored).map_err(|e| KeyServiceError::MalformedEnvelope {
                reason: e.to_string(),
            })?;

        if decryptor.is_scrypt() {
            return Err(KeyServiceError::MalformedEnvelope {
                reason: "passphrase-protected envelopes are not supported".to_string(),
            });
        }

        let mut reader = match decryptor.decrypt(self.identities.as_age_identities()) {
            Ok(reader) => reader,
            Err(age::DecryptError::NoMatchingKeys) => {
                return Err(KeyServiceError::NoMatchingIdentity {
                    recipient: recipient.to_string(),
                })
            }
            Err(e) => {
                return Err(KeyServiceError::MalformedEnvelope {
                    reason: e.to_string(),
                })
            }
        };

        let mut data_key = Zeroizing::new(Vec::new());
        reader
            .read_to_end(&mut *data_key)
            .map_err(|e| KeyServiceError::MalformedEnvelope {
                reason: e.to_string(),
            })?;

        debug!(recipient = %recipient, "Unwrapped data key from age recipient entry");
        Ok(data_key)
    }
}

impl KeyService for LocalAgeKeyService<'_> {
    fn decrypt(&self, key: Option<&MasterKey>) -> Result<Zeroizing<Vec<u8>>, KeyServiceError> {
        match key {
            None => Err(KeyServiceError::MissingKey),
            Some(MasterKey::Age { recipient, enc }) => self.unwrap_age(recipient, enc),
            Some(other) => Err(KeyServiceError::UnsupportedKeyType {
                key_type: other.key_type().to_string(),
            }),
        }
    }

    fn encrypt(&self, _key: Option<&MasterKey>, _plaintext: &[u8]) -> Result<String, KeyServiceError> {
        Err(KeyServiceError::NotSupported {
            operation: "encrypt",
        })
    }
}
