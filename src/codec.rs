//! Compact JWT encoding and verification, delegated to `jsonwebtoken`.
//!
//! Decoding is split in two so the service can order its checks: the
//! structural decode reads the claims without looking at the signature,
//! and [`TokenCodec::verify_signature`] checks the signature alone.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::claims::Claims;
use crate::config::SigningKey;
use crate::error::AuthError;

/// Why a token string could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("bad header: {0}")]
    Header(#[from] jsonwebtoken::errors::Error),

    #[error("expected 3 segments, found {0}")]
    Segments(usize),

    #[error("bad payload encoding: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("bad payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Signing and verification keys for one algorithm.
#[derive(Clone)]
pub struct TokenCodec {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    /// Load the keys.  Every failure here is a configuration error.
    pub fn from_key(key: &SigningKey) -> Result<Self, AuthError> {
        match key {
            SigningKey::Secret(secret) => {
                if secret.is_empty() {
                    return Err(AuthError::ConfigError("JWT secret must not be empty".into()));
                }
                Ok(Self::build(
                    Algorithm::HS256,
                    EncodingKey::from_secret(secret.as_bytes()),
                    DecodingKey::from_secret(secret.as_bytes()),
                ))
            }
            SigningKey::RsaPem {
                private_pem,
                public_pem,
            } => Self::rsa(private_pem, public_pem.as_deref()),
            SigningKey::RsaFiles {
                private_key_path,
                public_key_path,
            } => {
                let private_pem = read_pem(private_key_path)?;
                let public_pem = public_key_path.as_deref().map(read_pem).transpose()?;
                Self::rsa(&private_pem, public_pem.as_deref())
            }
        }
    }

    fn rsa(private_pem: &str, public_pem: Option<&str>) -> Result<Self, AuthError> {
        let encoding_key = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .map_err(|e| AuthError::ConfigError(format!("invalid RSA private key: {e}")))?;

        let public_pem = match public_pem {
            Some(pem) => pem.to_owned(),
            None => derive_public_pem(private_pem)?,
        };
        let decoding_key = DecodingKey::from_rsa_pem(public_pem.as_bytes())
            .map_err(|e| AuthError::ConfigError(format!("invalid RSA public key: {e}")))?;

        Ok(Self::build(Algorithm::RS256, encoding_key, decoding_key))
    }

    fn build(algorithm: Algorithm, encoding_key: EncodingKey, decoding_key: DecodingKey) -> Self {
        // Signature only: claims and time windows are the service's call.
        let mut validation = Validation::new(algorithm);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        Self {
            algorithm,
            encoding_key,
            decoding_key,
            validation,
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Sign `claims` into a compact token.
    pub fn encode(&self, claims: &Claims) -> Result<String, AuthError> {
        jsonwebtoken::encode(&Header::new(self.algorithm), claims, &self.encoding_key)
            .map_err(|e| AuthError::ConfigError(format!("token signing failed: {e}")))
    }

    /// Read the header and claims without checking the signature.
    pub fn decode_unverified(&self, token: &str) -> Result<Claims, DecodeError> {
        let segments: Vec<&str> = token.split('.').collect();
        let [_, payload, _] = segments.as_slice() else {
            return Err(DecodeError::Segments(segments.len()));
        };
        jsonwebtoken::decode_header(token)?;

        let bytes = URL_SAFE_NO_PAD.decode(payload)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Check the signature, and that the token uses this codec's algorithm.
    pub fn verify_signature(&self, token: &str) -> Result<(), jsonwebtoken::errors::Error> {
        jsonwebtoken::decode::<serde::de::IgnoredAny>(token, &self.decoding_key, &self.validation)
            .map(|_| ())
    }
}

fn read_pem(path: &Path) -> Result<String, AuthError> {
    let path = path
        .to_str()
        .and_then(|p| p.strip_prefix("file://"))
        .map(Path::new)
        .unwrap_or(path);

    std::fs::read_to_string(path).map_err(|e| {
        AuthError::ConfigError(format!("cannot read key file {}: {e}", path.display()))
    })
}

fn derive_public_pem(private_pem: &str) -> Result<String, AuthError> {
    use rsa::pkcs1::DecodeRsaPrivateKey;
    use rsa::pkcs8::{DecodePrivateKey, EncodePublicKey, LineEnding};

    let private = rsa::RsaPrivateKey::from_pkcs8_pem(private_pem)
        .ok()
        .or_else(|| rsa::RsaPrivateKey::from_pkcs1_pem(private_pem).ok())
        .ok_or_else(|| AuthError::ConfigError("unsupported RSA private key encoding".into()))?;

    rsa::RsaPublicKey::from(&private)
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| AuthError::ConfigError(format!("cannot derive RSA public key: {e}")))
}
