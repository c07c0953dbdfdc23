use std::fmt;

use crate::claims::{self, Claims, CustomClaims};
use crate::codec::TokenCodec;
use crate::config::JwtConfig;
use crate::error::AuthError;
use crate::middleware::TOKEN_COOKIE;
use crate::request::TokenRequest;

/// A signed token: the compact string and the claims it carries.
///
/// Never mutated; a refresh produces a new `Token`.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    raw: String,
    claims: Claims,
}

impl Token {
    /// The compact `header.claims.signature` string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    pub fn jti(&self) -> Option<&str> {
        self.claims.jti.as_deref()
    }

    pub fn into_string(self) -> String {
        self.raw
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Result of checking a token string, in check order.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationOutcome {
    Valid(Token),
    Missing,
    /// Not a decodable JWT.
    MalformedStructure,
    /// `iss`, `sub` or `aud` differs from the configuration, or `nbf` lies
    /// in the future.
    ClaimsMismatch,
    BadSignature,
    /// Signed correctly and otherwise valid, but past `exp`.
    Expired(Token),
}

impl VerificationOutcome {
    /// The error this outcome is reported as, `None` when valid.
    ///
    /// `Expired` maps to [`AuthError::TokenExpired`]; whether it is
    /// refreshable instead is for the caller to decide.
    pub fn rejection(&self) -> Option<AuthError> {
        match self {
            Self::Valid(_) => None,
            Self::Missing => Some(AuthError::TokenNotFound),
            Self::MalformedStructure | Self::ClaimsMismatch => Some(AuthError::InvalidToken),
            Self::BadSignature => Some(AuthError::InvalidTokenSignature),
            Self::Expired(_) => Some(AuthError::TokenExpired),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

/// Token lifecycle policy: creation, extraction, verification and refresh.
///
/// Build one per process and share it behind an `Arc`; it holds no
/// mutable state.
#[derive(Clone)]
pub struct TokenService {
    config: JwtConfig,
    codec: TokenCodec,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("config", &self.config)
            .field("algorithm", &self.codec.algorithm())
            .finish()
    }
}

impl TokenService {
    /// Load key material and validate the configuration.
    ///
    /// This is the only place key files are read.  An error here means the
    /// process must not serve authenticated routes.
    pub fn new(config: JwtConfig) -> Result<Self, AuthError> {
        config.validate()?;
        let codec = TokenCodec::from_key(&config.signing_key)?;
        tracing::debug!(algorithm = ?codec.algorithm(), "JWT token service ready");
        Ok(Self { config, codec })
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    /// Create and sign a token issued now.
    ///
    /// `jti` is passed through untouched.  Every custom claim is written
    /// into the payload and listed in `customClaims` so a later refresh
    /// can carry it forward.
    pub fn create_token(
        &self,
        jti: Option<&str>,
        custom_claims: &CustomClaims,
    ) -> Result<Token, AuthError> {
        self.create_token_at(unix_now(), jti, custom_claims)
    }

    /// [`create_token`](Self::create_token) with an explicit issue time.
    pub fn create_token_at(
        &self,
        now: i64,
        jti: Option<&str>,
        custom_claims: &CustomClaims,
    ) -> Result<Token, AuthError> {
        let mut extra = CustomClaims::new();
        for (name, value) in custom_claims {
            if !claims::is_valid_custom_name(name) {
                tracing::warn!(claim = %name, "skipping reserved or malformed custom claim name");
            } else if !value.is_encodable() {
                tracing::warn!(claim = %name, "skipping non-finite custom claim value");
            } else {
                extra.insert(name.clone(), value.clone());
            }
        }

        let custom_names = (!extra.is_empty())
            .then(|| extra.keys().map(String::as_str).collect::<Vec<_>>().join(","));

        let claims = Claims {
            iss: self.config.issuer.clone(),
            sub: self.config.subject.clone(),
            aud: self.config.audience.clone(),
            iat: now,
            nbf: self.config.not_before_secs.map(|secs| offset(now, secs)),
            exp: self.config.expiry_secs.map(|secs| offset(now, secs)),
            jti: jti.map(str::to_owned),
            custom_claims: custom_names,
            extra,
        };

        let raw = self.codec.encode(&claims)?;
        Ok(Token { raw, claims })
    }

    /// Find the token string in a request.
    ///
    /// The configured header takes precedence and must hold
    /// `Bearer <token>`.  Without it the query (or form) parameter is used,
    /// then the `token` cookie when cookies are the configured transport.
    pub fn extract_token_string<R>(&self, request: &R) -> Result<String, AuthError>
    where
        R: TokenRequest + ?Sized,
    {
        if let Some(value) = request.header(&self.config.header_name) {
            return match value.strip_prefix("Bearer ").map(str::trim) {
                Some(token) if !token.is_empty() => Ok(token.to_owned()),
                _ => Err(AuthError::InvalidToken),
            };
        }

        if let Some(token) = request.param(&self.config.param_name).filter(|t| !t.is_empty()) {
            return Ok(token);
        }

        if self.config.transport.uses_cookie() {
            if let Some(token) = request.cookie(TOKEN_COOKIE).filter(|t| !t.is_empty()) {
                return Ok(token.to_owned());
            }
        }

        Err(AuthError::TokenNotFound)
    }

    /// Check a token string now.
    pub fn verify(&self, token: &str) -> VerificationOutcome {
        self.verify_at(token, unix_now())
    }

    /// Check a token string at time `now`.
    ///
    /// Checks run in a fixed order: structure, registered claims,
    /// signature, expiry.  The first failure decides the outcome.
    pub fn verify_at(&self, token: &str, now: i64) -> VerificationOutcome {
        if token.is_empty() {
            return VerificationOutcome::Missing;
        }

        let claims = match self.codec.decode_unverified(token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(error = %e, "malformed token");
                return VerificationOutcome::MalformedStructure;
            }
        };

        if let Some(claim) = self.mismatched_claim(&claims, now) {
            tracing::debug!(claim, "token claim mismatch");
            return VerificationOutcome::ClaimsMismatch;
        }

        if let Err(e) = self.codec.verify_signature(token) {
            tracing::debug!(error = %e, "token signature rejected");
            return VerificationOutcome::BadSignature;
        }

        let expired = claims.exp.is_some_and(|exp| now > exp);
        let token = Token {
            raw: token.to_owned(),
            claims,
        };
        if expired {
            VerificationOutcome::Expired(token)
        } else {
            VerificationOutcome::Valid(token)
        }
    }

    /// Name of the first registered claim that fails, if any.
    fn mismatched_claim(&self, claims: &Claims, now: i64) -> Option<&'static str> {
        let expected = [
            ("iss", &self.config.issuer, &claims.iss),
            ("sub", &self.config.subject, &claims.sub),
            ("aud", &self.config.audience, &claims.aud),
        ];
        for (name, want, got) in expected {
            if want.is_some() && want != got {
                return Some(name);
            }
        }

        if claims.nbf.is_some_and(|nbf| now < nbf) {
            return Some("nbf");
        }
        None
    }

    /// Whether an expired token may still be exchanged for a new one.
    pub fn is_refreshable(&self, token: &Token) -> bool {
        self.is_refreshable_at(token, unix_now())
    }

    /// True while `now <= iat + refresh_window_secs`.
    pub fn is_refreshable_at(&self, token: &Token, now: i64) -> bool {
        now <= offset(token.claims.iat, self.config.refresh_window_secs)
    }

    /// Mint a replacement for `token`, keeping its `jti` and declared
    /// custom claims.
    ///
    /// Does not check refreshability; see [`is_refreshable`](Self::is_refreshable).
    pub fn refresh(&self, token: &Token) -> Result<Token, AuthError> {
        self.refresh_at(token, unix_now())
    }

    pub fn refresh_at(&self, token: &Token, now: i64) -> Result<Token, AuthError> {
        let carried = token.claims.declared_custom_claims();
        self.create_token_at(now, token.jti(), &carried)
    }
}

/// `base + secs`, clamped to the `i64` range.
fn offset(base: i64, secs: u64) -> i64 {
    base.saturating_add(i64::try_from(secs).unwrap_or(i64::MAX))
}

pub(crate) fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
