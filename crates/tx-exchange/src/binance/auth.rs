//! Binance authentication and request signing utilities.
//!
//! Binance supports two signing methods:
//!
//! 1. **HMAC-SHA256**: the standard method. The secret key is the API
//!    secret string provided by Binance; the signature is lowercase hex.
//! 2. **Ed25519**: for Ed25519 API keys. The private key is loaded from a
//!    PEM file; the signature is Base64 and must be URL-encoded.
//!
//! Both methods produce a `signature` parameter that is appended to the
//! URL-encoded query string.

use anyhow::{Context, Result};
use base64::Engine;
use ed25519_dalek::SigningKey;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::http::encode_query;

type HmacSha256 = Hmac<Sha256>;

/// Compute an HMAC-SHA256 signature and return it as a lowercase hex string.
///
/// # Arguments
///
/// * `secret`: the API secret key (UTF-8 string).
/// * `message`: the data to sign (typically the query string).
pub fn hmac_sha256_sign(secret: &str, message: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(message.as_bytes());
    let result = mac.finalize();
    hex::encode(result.into_bytes())
}

/// Signing method for one Binance account.
pub enum RequestSigner {
    Hmac { secret: String },
    Ed25519 { key: Box<SigningKey> },
}

impl RequestSigner {
    pub fn hmac(secret: impl Into<String>) -> Self {
        Self::Hmac {
            secret: secret.into(),
        }
    }

    /// Build an Ed25519 signer from a PEM-encoded (PKCS#8) private key.
    ///
    /// # Errors
    ///
    /// Returns an error if the PEM cannot be parsed or the key is invalid.
    pub fn ed25519_from_pem(private_key_pem: &str) -> Result<Self> {
        use ed25519_dalek::pkcs8::DecodePrivateKey;

        let key = SigningKey::from_pkcs8_pem(private_key_pem)
            .context("failed to parse Ed25519 private key from PEM")?;
        Ok(Self::Ed25519 { key: Box::new(key) })
    }

    /// Sign `message`, returning the value ready to be placed in a query
    /// string (hex for HMAC, URL-encoded Base64 for Ed25519).
    pub fn sign(&self, message: &str) -> String {
        match self {
            Self::Hmac { secret } => hmac_sha256_sign(secret, message),
            Self::Ed25519 { key } => {
                use ed25519_dalek::Signer;

                let signature = key.sign(message.as_bytes());
                let encoded = base64::engine::general_purpose::STANDARD.encode(signature.to_bytes());
                urlencoding::encode(&encoded).into_owned()
            }
        }
    }

    /// Build a URL-encoded, signed query string.
    ///
    /// Takes a slice of `(key, value)` parameter pairs, joins them with `&`,
    /// signs the resulting string, and appends `&signature=<sig>`.
    ///
    /// `params` must already include `timestamp`.
    pub fn signed_query(&self, params: &[(&str, &str)]) -> String {
        let query = encode_query(params);
        let signature = self.sign(&query);
        format!("{query}&signature={signature}")
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Hmac { .. } => "hmac-sha256",
            Self::Ed25519 { .. } => "ed25519",
        }
    }
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
