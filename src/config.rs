use std::path::PathBuf;

use crate::error::AuthError;

/// Default token lifetime: one hour.
pub const DEFAULT_EXPIRY_SECS: u64 = 3600;

/// Default refresh window: fifteen days from `iat`.
pub const DEFAULT_REFRESH_WINDOW_SECS: u64 = 15 * 86_400;

/// Key material used to sign and verify tokens.
///
/// The variant decides the algorithm: a shared secret signs HS256, an RSA
/// private key signs RS256.
#[derive(Clone)]
pub enum SigningKey {
    /// Shared HS256 secret.
    Secret(String),
    /// In-memory PEM keys.  Without `public_pem` the public key is derived
    /// from the private one.
    RsaPem {
        private_pem: String,
        public_pem: Option<String>,
    },
    /// PEM files read once when the [`TokenService`](crate::TokenService)
    /// is built.  A leading `file://` is accepted.
    RsaFiles {
        private_key_path: PathBuf,
        public_key_path: Option<PathBuf>,
    },
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Secret(_) => f.write_str("Secret(..)"),
            Self::RsaPem { public_pem, .. } => f
                .debug_struct("RsaPem")
                .field("public_pem", &public_pem.is_some())
                .finish_non_exhaustive(),
            Self::RsaFiles {
                private_key_path,
                public_key_path,
            } => f
                .debug_struct("RsaFiles")
                .field("private_key_path", private_key_path)
                .field("public_key_path", public_key_path)
                .finish(),
        }
    }
}

/// Where the middleware puts the current token on outgoing responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenTransport {
    /// `Token` response header.
    #[default]
    Header,
    /// `token` cookie.
    Cookie,
    Both,
}

impl TokenTransport {
    pub fn uses_header(self) -> bool {
        matches!(self, Self::Header | Self::Both)
    }

    pub fn uses_cookie(self) -> bool {
        matches!(self, Self::Cookie | Self::Both)
    }
}

impl std::str::FromStr for TokenTransport {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "header" => Ok(Self::Header),
            "cookie" => Ok(Self::Cookie),
            "both" => Ok(Self::Both),
            other => Err(AuthError::ConfigError(format!(
                "unknown token transport {other:?}"
            ))),
        }
    }
}

/// Configuration for token creation, verification and refresh.
///
/// Build with [`new`](Self::new), [`rsa_files`](Self::rsa_files),
/// [`rsa_pem`](Self::rsa_pem) or [`from_env`](Self::from_env), then chain
/// the setters.  The config is read-only once handed to a
/// [`TokenService`](crate::TokenService).
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub signing_key: SigningKey,
    /// `iss`, written into new tokens and enforced on verification.
    pub issuer: Option<String>,
    /// `sub`, written into new tokens and enforced on verification.
    pub subject: Option<String>,
    /// `aud`, written into new tokens and enforced on verification.
    pub audience: Option<String>,
    /// `exp = iat + expiry_secs`.  `None` issues tokens that never expire.
    pub expiry_secs: Option<u64>,
    /// `nbf = iat + not_before_secs`.  `None` omits `nbf`.
    pub not_before_secs: Option<u64>,
    /// An expired token may be refreshed while `now <= iat + refresh_window_secs`.
    pub refresh_window_secs: u64,
    /// Request header carrying `Bearer <token>`.
    pub header_name: String,
    /// Query or form parameter used when the header is absent.
    pub param_name: String,
    /// Where rejected non-JSON requests are redirected.
    pub redirect_path: String,
    pub transport: TokenTransport,
    /// Mark the token cookie `Secure`.
    pub secure_cookies: bool,
}

impl JwtConfig {
    /// HS256 config with the default windows and request keys.
    pub fn new(secret: impl Into<String>) -> Self {
        Self::with_key(SigningKey::Secret(secret.into()))
    }

    /// RS256 config reading PEM files.
    pub fn rsa_files(
        private_key_path: impl Into<PathBuf>,
        public_key_path: Option<PathBuf>,
    ) -> Self {
        Self::with_key(SigningKey::RsaFiles {
            private_key_path: private_key_path.into(),
            public_key_path,
        })
    }

    /// RS256 config from PEM strings.
    pub fn rsa_pem(private_pem: impl Into<String>, public_pem: Option<String>) -> Self {
        Self::with_key(SigningKey::RsaPem {
            private_pem: private_pem.into(),
            public_pem,
        })
    }

    fn with_key(signing_key: SigningKey) -> Self {
        Self {
            signing_key,
            issuer: None,
            subject: None,
            audience: None,
            expiry_secs: Some(DEFAULT_EXPIRY_SECS),
            not_before_secs: Some(0),
            refresh_window_secs: DEFAULT_REFRESH_WINDOW_SECS,
            header_name: "Authorization".into(),
            param_name: "token".into(),
            redirect_path: "/".into(),
            transport: TokenTransport::Header,
            secure_cookies: false,
        }
    }

    /// Build from environment variables already set in the process.
    ///
    /// | Variable               | Required        | Default         | Notes                                 |
    /// |------------------------|-----------------|-----------------|---------------------------------------|
    /// | `JWT_SECRET`           | unless RSA      | —               | HS256 secret                          |
    /// | `JWT_PRIVATE_KEY_PATH` | no              | *(unset)*       | Switches to RS256                     |
    /// | `JWT_PUBLIC_KEY_PATH`  | no              | *(derived)*     | Only read with a private key          |
    /// | `JWT_ISSUER`           | no              | *(unset)*       | Sets and validates `iss`              |
    /// | `JWT_SUBJECT`          | no              | *(unset)*       | Sets and validates `sub`              |
    /// | `JWT_AUDIENCE`         | no              | *(unset)*       | Sets and validates `aud`              |
    /// | `JWT_TTL_SECS`         | no              | `3600`          | `none` disables `exp`                 |
    /// | `JWT_NBF_SECS`         | no              | `0`             | `none` disables `nbf`                 |
    /// | `JWT_REFRESH_TTL_SECS` | no              | `1296000`       |                                       |
    /// | `JWT_HEADER_KEY`       | no              | `Authorization` |                                       |
    /// | `JWT_REQUEST_KEY`      | no              | `token`         | Query / form fallback                 |
    /// | `JWT_REDIRECT`         | no              | `/`             |                                       |
    /// | `JWT_TRANSPORT`        | no              | `header`        | `header`, `cookie` or `both`          |
    /// | `JWT_SECURE_COOKIES`   | no              | `false`         | `true`/`1` or `false`/`0`             |
    pub fn from_env() -> Result<Self, AuthError> {
        let signing_key = match non_empty_var("JWT_PRIVATE_KEY_PATH") {
            Some(private) => SigningKey::RsaFiles {
                private_key_path: private.into(),
                public_key_path: non_empty_var("JWT_PUBLIC_KEY_PATH").map(PathBuf::from),
            },
            None => SigningKey::Secret(non_empty_var("JWT_SECRET").ok_or_else(|| {
                AuthError::ConfigError("JWT_SECRET or JWT_PRIVATE_KEY_PATH must be set".into())
            })?),
        };

        let mut config = Self::with_key(signing_key);
        config.issuer = non_empty_var("JWT_ISSUER");
        config.subject = non_empty_var("JWT_SUBJECT");
        config.audience = non_empty_var("JWT_AUDIENCE");
        config.expiry_secs = optional_secs("JWT_TTL_SECS", config.expiry_secs)?;
        config.not_before_secs = optional_secs("JWT_NBF_SECS", config.not_before_secs)?;
        if let Some(v) = non_empty_var("JWT_REFRESH_TTL_SECS") {
            config.refresh_window_secs = parse_secs("JWT_REFRESH_TTL_SECS", &v)?;
        }
        if let Some(v) = non_empty_var("JWT_HEADER_KEY") {
            config.header_name = v;
        }
        if let Some(v) = non_empty_var("JWT_REQUEST_KEY") {
            config.param_name = v;
        }
        if let Some(v) = non_empty_var("JWT_REDIRECT") {
            config.redirect_path = v;
        }
        if let Some(v) = non_empty_var("JWT_TRANSPORT") {
            config.transport = v.parse()?;
        }
        if let Some(v) = non_empty_var("JWT_SECURE_COOKIES") {
            config.secure_cookies = parse_flag("JWT_SECURE_COOKIES", &v)?;
        }

        Ok(config)
    }

    pub fn issuer(mut self, v: impl Into<String>) -> Self {
        self.issuer = Some(v.into());
        self
    }
    pub fn subject(mut self, v: impl Into<String>) -> Self {
        self.subject = Some(v.into());
        self
    }
    pub fn audience(mut self, v: impl Into<String>) -> Self {
        self.audience = Some(v.into());
        self
    }
    pub fn expiry_secs(mut self, v: Option<u64>) -> Self {
        self.expiry_secs = v;
        self
    }
    pub fn not_before_secs(mut self, v: Option<u64>) -> Self {
        self.not_before_secs = v;
        self
    }
    pub fn refresh_window_secs(mut self, v: u64) -> Self {
        self.refresh_window_secs = v;
        self
    }
    pub fn header_name(mut self, v: impl Into<String>) -> Self {
        self.header_name = v.into();
        self
    }
    pub fn param_name(mut self, v: impl Into<String>) -> Self {
        self.param_name = v.into();
        self
    }
    pub fn redirect_path(mut self, v: impl Into<String>) -> Self {
        self.redirect_path = v.into();
        self
    }
    pub fn transport(mut self, v: TokenTransport) -> Self {
        self.transport = v;
        self
    }
    pub fn secure_cookies(mut self, v: bool) -> Self {
        self.secure_cookies = v;
        self
    }

    /// Reject combinations that would break `iat <= nbf <= exp`.
    pub(crate) fn validate(&self) -> Result<(), AuthError> {
        for (name, secs) in [
            ("expiry_secs", self.expiry_secs),
            ("not_before_secs", self.not_before_secs),
        ] {
            if secs.is_some_and(|s| i64::try_from(s).is_err()) {
                return Err(AuthError::ConfigError(format!(
                    "{name} does not fit a timestamp"
                )));
            }
        }
        if let (Some(nbf), Some(exp)) = (self.not_before_secs, self.expiry_secs) {
            if nbf > exp {
                return Err(AuthError::ConfigError(format!(
                    "not_before_secs ({nbf}) exceeds expiry_secs ({exp})"
                )));
            }
        }
        if self.header_name.is_empty() || self.param_name.is_empty() {
            return Err(AuthError::ConfigError(
                "header and parameter names must not be empty".into(),
            ));
        }
        Ok(())
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn optional_secs(name: &str, default: Option<u64>) -> Result<Option<u64>, AuthError> {
    match std::env::var(name) {
        Err(_) => Ok(default),
        Ok(v) if v.trim().is_empty() || v.trim().eq_ignore_ascii_case("none") => Ok(None),
        Ok(v) => parse_secs(name, &v).map(Some),
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool, AuthError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(AuthError::ConfigError(format!(
            "{name} must be true, false, 1 or 0: {value:?}"
        ))),
    }
}

fn parse_secs(name: &str, value: &str) -> Result<u64, AuthError> {
    value
        .trim()
        .parse()
        .map_err(|_| AuthError::ConfigError(format!("{name} is not a number of seconds: {value:?}")))
}
