//! Sealed page tokens.
//!
//! A token is `base64url(nonce || AES-256-GCM(json(payload)))`. Clients can
//! neither read nor alter it; anything that fails to open is reported as a
//! malformed token.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use bookings_core::{Cursor, CursorDirection, Filter, PageToken, RepositoryError, Sort};

use crate::config::{ConfigError, PAGE_TOKEN_CIPHER_KEY};

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Contents of a page token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    pub cursor: Cursor,
    pub direction: CursorDirection,
    pub filter_fingerprint: String,
    pub page_size: u32,
}

/// SHA-256 (hex) over the canonical filter set and sort of a request.
///
/// Filters are compared as a set, so their order in the request does not
/// matter.
pub fn fingerprint(filters: &[Filter], sort: &Sort) -> String {
    let mut canonical: Vec<&Filter> = filters.iter().collect();
    canonical.sort();
    canonical.dedup();

    let mut hasher = Sha256::new();
    for filter in canonical {
        // Filters and sorts only hold strings, bools and enums.
        if let Ok(bytes) = serde_json::to_vec(filter) {
            hasher.update(&bytes);
        }
        hasher.update(b"\n");
    }
    if let Ok(bytes) = serde_json::to_vec(sort) {
        hasher.update(&bytes);
    }
    hex::encode(hasher.finalize())
}

/// Seals and opens page tokens with a server-held AES-256-GCM key.
#[derive(Clone)]
pub struct PageTokenCipher {
    cipher: Aes256Gcm,
}

impl core::fmt::Debug for PageTokenCipher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("PageTokenCipher(<redacted>)")
    }
}

impl PageTokenCipher {
    pub const KEY_LEN: usize = 32;

    pub fn new(key: &[u8]) -> Result<Self, ConfigError> {
        if key.len() != Self::KEY_LEN {
            return Err(ConfigError::invalid(
                PAGE_TOKEN_CIPHER_KEY,
                format!("expected {} bytes, got {}", Self::KEY_LEN, key.len()),
            ));
        }
        Ok(Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        })
    }

    /// Cipher with a fresh random key.
    pub fn generate() -> Self {
        let key = Aes256Gcm::generate_key(OsRng);
        Self {
            cipher: Aes256Gcm::new(&key),
        }
    }

    pub fn seal(&self, payload: &TokenPayload) -> Result<PageToken, RepositoryError> {
        let plaintext = serde_json::to_vec(payload)
            .map_err(|e| RepositoryError::storage(format!("encode page token: {e}")))?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_ref())
            .map_err(|_| RepositoryError::storage("seal page token"))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(PageToken::new(URL_SAFE_NO_PAD.encode(sealed)))
    }

    pub fn open(&self, token: &PageToken) -> Result<TokenPayload, RepositoryError> {
        let sealed = URL_SAFE_NO_PAD
            .decode(token.as_str())
            .map_err(|_| RepositoryError::malformed_token("not valid base64url"))?;
        if sealed.len() < NONCE_LEN + TAG_LEN {
            return Err(RepositoryError::malformed_token("token too short"));
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| RepositoryError::malformed_token("token failed authentication"))?;

        serde_json::from_slice(&plaintext)
            .map_err(|e| RepositoryError::malformed_token(format!("unreadable payload: {e}")))
    }
}
