use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Claim names owned by the service.  Custom claims may not shadow them.
pub const REGISTERED_CLAIMS: [&str; 8] =
    ["iss", "sub", "aud", "iat", "nbf", "exp", "jti", CUSTOM_CLAIMS_KEY];

/// Name of the claim listing which custom claims a token carries.
pub const CUSTOM_CLAIMS_KEY: &str = "customClaims";

/// A custom claim value.
///
/// Closed set: anything outside these four shapes (arrays,
/// objects, `null`) makes the payload undecodable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaimValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl ClaimValue {
    /// False for NaN and infinite floats, which JSON cannot carry.
    pub fn is_encodable(&self) -> bool {
        match self {
            Self::Float(v) => v.is_finite(),
            _ => true,
        }
    }
}

impl From<&str> for ClaimValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for ClaimValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<i64> for ClaimValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for ClaimValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for ClaimValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl std::fmt::Display for ClaimValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
        }
    }
}

/// Custom claims keyed by name.
pub type CustomClaims = BTreeMap<String, ClaimValue>;

/// Registered JWT claims plus the custom claim bag.
///
/// Registered claims the configuration leaves unset are omitted from the
/// payload.  Custom claims are flattened next to them, and the
/// `customClaims` claim names which of them a refresh should carry forward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,

    pub iat: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    /// Comma-joined names of the custom claims below.
    #[serde(
        rename = "customClaims",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub custom_claims: Option<String>,

    #[serde(flatten)]
    pub extra: CustomClaims,
}

impl Claims {
    /// Look up a custom claim by name.
    pub fn get(&self, name: &str) -> Option<&ClaimValue> {
        self.extra.get(name)
    }

    /// Names listed in the `customClaims` claim, in declaration order.
    pub fn custom_claim_names(&self) -> impl Iterator<Item = &str> {
        self.custom_claims
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .filter(|name| !name.is_empty())
    }

    /// The declared custom claims that are actually present.
    ///
    /// Undeclared extras are left behind, so a refresh only copies what the
    /// issuer asked to keep.
    pub fn declared_custom_claims(&self) -> CustomClaims {
        self.custom_claim_names()
            .filter_map(|name| Some((name.to_owned(), self.extra.get(name)?.clone())))
            .collect()
    }
}

/// Whether `name` can be stored as a custom claim.
pub(crate) fn is_valid_custom_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(',') && !REGISTERED_CLAIMS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Claims {
        Claims {
            iss: Some("https://api.example.com".into()),
            sub: None,
            aud: None,
            iat: 100,
            nbf: Some(100),
            exp: Some(3700),
            jti: Some("abc".into()),
            custom_claims: Some("role,level".into()),
            extra: CustomClaims::from([
                ("role".to_string(), ClaimValue::from("admin")),
                ("level".to_string(), ClaimValue::from(3i64)),
                ("stray".to_string(), ClaimValue::from(true)),
            ]),
        }
    }

    #[test]
    fn unset_claims_are_omitted() {
        let claims = Claims {
            iss: None,
            sub: None,
            aud: None,
            iat: 1,
            nbf: None,
            exp: None,
            jti: None,
            custom_claims: None,
            extra: CustomClaims::new(),
        };
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json, serde_json::json!({ "iat": 1 }));
    }

    #[test]
    fn custom_claims_flatten_into_payload() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["role"], "admin");
        assert_eq!(json["level"], 3);
        assert_eq!(json["customClaims"], "role,level");
        assert!(json.get("extra").is_none());
    }

    #[test]
    fn payload_decodes_with_typed_values() {
        let claims: Claims = serde_json::from_value(serde_json::json!({
            "iat": 10,
            "exp": 20,
            "customClaims": "role,ratio,beta",
            "role": "admin",
            "ratio": 0.5,
            "beta": false,
        }))
        .unwrap();
        assert_eq!(claims.get("role"), Some(&ClaimValue::String("admin".into())));
        assert_eq!(claims.get("ratio"), Some(&ClaimValue::Float(0.5)));
        assert_eq!(claims.get("beta"), Some(&ClaimValue::Bool(false)));
        assert!(claims.get("iat").is_none());
    }

    #[test]
    fn open_values_are_rejected() {
        let res: Result<Claims, _> = serde_json::from_value(serde_json::json!({
            "iat": 10,
            "roles": ["a", "b"],
        }));
        assert!(res.is_err());
    }

    #[test]
    fn only_finite_floats_are_encodable() {
        assert!(ClaimValue::Float(1.5).is_encodable());
        assert!(ClaimValue::from("x").is_encodable());
        assert!(!ClaimValue::Float(f64::NAN).is_encodable());
        assert!(!ClaimValue::Float(f64::NEG_INFINITY).is_encodable());
    }

    #[test]
    fn declared_claims_skip_strays_and_missing() {
        let mut claims = sample();
        claims.custom_claims = Some("role,missing".into());
        let declared = claims.declared_custom_claims();
        assert_eq!(declared.len(), 1);
        assert_eq!(declared["role"], ClaimValue::from("admin"));
    }

    #[test]
    fn reserved_names_are_not_custom() {
        assert!(is_valid_custom_name("role"));
        assert!(!is_valid_custom_name("exp"));
        assert!(!is_valid_custom_name("customClaims"));
        assert!(!is_valid_custom_name("a,b"));
        assert!(!is_valid_custom_name(""));
    }
}
