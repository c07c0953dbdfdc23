//! Generate and verify JWTs from the command line.
//!
//! Loads `.env` automatically if present, otherwise reads from the environment.
//!
//! ```bash
//! cargo run --example token -- generate session-1 role=admin level=3
//! cargo run --example token -- verify eyJhbG...
//! ```

use axum_jwt_refresh::{ClaimValue, CustomClaims, JwtConfig, TokenService, VerificationOutcome};

fn main() {
    // Load .env if present; silently ignore if absent.
    dotenvy::dotenv().ok();

    let config = JwtConfig::from_env().expect("JWT_SECRET or JWT_PRIVATE_KEY_PATH must be set");
    let service = TokenService::new(config).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        usage();
    }

    match args[0].as_str() {
        "generate" => {
            let jti = args.get(1).map(String::as_str).filter(|j| *j != "-");
            let custom: CustomClaims = args.iter().skip(2).map(|kv| parse_claim(kv)).collect();
            match service.create_token(jti, &custom) {
                Ok(token) => println!("{token}"),
                Err(e) => {
                    eprintln!("Error: {e}");
                    std::process::exit(1);
                }
            }
        }
        "verify" => {
            let token = args.get(1).unwrap_or_else(|| usage());
            let (status, token) = match service.verify(token) {
                VerificationOutcome::Valid(t) => ("Valid", t),
                VerificationOutcome::Expired(t) if service.is_refreshable(&t) => {
                    ("Expired (refreshable)", t)
                }
                VerificationOutcome::Expired(t) => ("Expired", t),
                other => {
                    eprintln!("Failed: {other:?}");
                    std::process::exit(1);
                }
            };

            let c = token.claims();
            println!("{status}\n");
            for (name, value) in [("iss", &c.iss), ("sub", &c.sub), ("aud", &c.aud), ("jti", &c.jti)] {
                if let Some(v) = value {
                    println!("  {name} : {v}");
                }
            }
            println!("  iat : {}", c.iat);
            if let Some(nbf) = c.nbf {
                println!("  nbf : {nbf}");
            }
            if let Some(exp) = c.exp {
                println!("  exp : {exp}");
            }
            for (name, value) in &c.extra {
                println!("  {name} : {value}");
            }
        }
        _ => usage(),
    }
}

/// `key=value`, with integers, floats and booleans recognised.
fn parse_claim(kv: &str) -> (String, ClaimValue) {
    let (key, value) = kv.split_once('=').unwrap_or_else(|| usage());
    let value = if let Ok(b) = value.parse::<bool>() {
        ClaimValue::Bool(b)
    } else if let Ok(i) = value.parse::<i64>() {
        ClaimValue::Integer(i)
    } else if let Ok(f) = value.parse::<f64>() {
        ClaimValue::Float(f)
    } else {
        ClaimValue::from(value)
    };
    (key.to_string(), value)
}

fn usage() -> ! {
    eprintln!("Usage:");
    eprintln!("  cargo run --example token -- generate <jti|-> [key=value ...]");
    eprintln!("  cargo run --example token -- verify   <token>");
    std::process::exit(1);
}
