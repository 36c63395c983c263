//! Session token verification.
//!
//! Tokens are HS256 JWTs issued by the sign-in service. The gate only reads
//! them: it checks the structure, the signature and the expiry, then hands the
//! decoded [`SessionPayload`] to the role router. Verification never performs
//! I/O and takes the current time as an argument, so the same inputs always
//! produce the same result.

use std::fmt;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::security::roles::RoleId;

/// Minimum accepted length of the signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Deployment problem with the signing secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SecretError {
    #[error("signing secret is not configured")]
    Absent,
    #[error("signing secret is {len} bytes, at least {MIN_SECRET_LEN} required")]
    TooShort { len: usize },
}

/// Why a request could not be tied to a usable session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// The gate itself is misconfigured; not the caller's fault.
    #[error("gate misconfigured: {0}")]
    Config(SecretError),
    #[error("no session token")]
    Missing,
    #[error("session token is malformed")]
    Malformed,
    #[error("session token signature is invalid")]
    InvalidSignature,
    #[error("session token has expired")]
    Expired,
}

impl TokenError {
    /// Label used for metrics and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Missing => "missing",
            Self::Malformed => "malformed",
            Self::InvalidSignature => "invalid_signature",
            Self::Expired => "expired",
        }
    }
}

/// Token signing secret. The bytes never appear in `Debug` output.
#[derive(Clone, Default)]
pub struct Secret(Option<Vec<u8>>);

impl Secret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Some(bytes.into()))
    }

    pub fn absent() -> Self {
        Self(None)
    }

    /// Read the secret from an environment variable. Unset or empty is absent.
    pub fn from_env(var: &str) -> Self {
        match std::env::var(var) {
            Ok(value) if !value.is_empty() => Self::new(value),
            _ => Self::absent(),
        }
    }

    /// The secret bytes, if they are usable for verification.
    pub fn check(&self) -> Result<&[u8], SecretError> {
        match &self.0 {
            None => Err(SecretError::Absent),
            Some(bytes) if bytes.len() < MIN_SECRET_LEN => {
                Err(SecretError::TooShort { len: bytes.len() })
            }
            Some(bytes) => Ok(bytes),
        }
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(bytes) => write!(f, "Secret(<{} bytes>)", bytes.len()),
            None => f.write_str("Secret(<absent>)"),
        }
    }
}

/// Decoded, verified session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPayload {
    pub subject_id: String,
    pub role: RoleId,
    pub dashboard_override: Option<String>,
    /// Expiry, seconds since the Unix epoch.
    pub expires_at: u64,
}

/// JWT claims as issued by the sign-in service.
#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    role: String,
    #[serde(default)]
    dashboard: Option<String>,
    exp: u64,
}

/// Anything able to turn a raw cookie value into a session.
pub trait SessionVerifier: Send + Sync {
    /// Verify `raw` as of `now` (seconds since the Unix epoch).
    fn verify(&self, raw: Option<&str>, now: u64) -> Result<SessionPayload, TokenError>;
}

/// HS256 verifier bound to one secret.
pub struct TokenVerifier {
    key: Result<DecodingKey, SecretError>,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &Secret) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the caller-supplied clock below.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;

        Self {
            key: secret.check().map(DecodingKey::from_secret),
            validation,
        }
    }

    /// The secret problem, if this verifier can never succeed.
    pub fn config_error(&self) -> Option<SecretError> {
        self.key.as_ref().err().copied()
    }
}

impl SessionVerifier for TokenVerifier {
    fn verify(&self, raw: Option<&str>, now: u64) -> Result<SessionPayload, TokenError> {
        let key = self.key.as_ref().map_err(|e| TokenError::Config(*e))?;

        let raw = match raw {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Err(TokenError::Missing),
        };

        if !has_jwt_shape(raw) {
            return Err(TokenError::Malformed);
        }

        let claims = jsonwebtoken::decode::<Claims>(raw, key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    TokenError::InvalidSignature
                }
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            })?;

        if claims.exp <= now {
            return Err(TokenError::Expired);
        }

        Ok(SessionPayload {
            subject_id: claims.sub,
            role: RoleId::parse(&claims.role),
            dashboard_override: claims.dashboard,
            expires_at: claims.exp,
        })
    }
}

/// Verify a raw token against `secret` as of `now`.
pub fn verify(raw: Option<&str>, secret: &Secret, now: u64) -> Result<SessionPayload, TokenError> {
    TokenVerifier::new(secret).verify(raw, now)
}

fn has_jwt_shape(raw: &str) -> bool {
    let mut parts = 0;
    for part in raw.split('.') {
        if part.is_empty() {
            return false;
        }
        parts += 1;
    }
    parts == 3
}
