use anyhow::{anyhow, Result};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct JwtClaims {
    exp: i64,
}

/// Reads the `exp` claim of a JWT without verifying its signature.
/// Only used for diagnostics, the api remains the authority on expiry.
pub fn jwt_expiration(token: &str) -> Result<DateTime<Utc>> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(anyhow!("invalid JWT format"));
    }

    let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|e| anyhow!("base64 decode error: {}", e))?;

    let claims = serde_json::from_slice::<JwtClaims>(&decoded)
        .map_err(|e| anyhow!("invalid JWT payload: {}", e))?;

    DateTime::from_timestamp(claims.exp, 0)
        .ok_or_else(|| anyhow!("JWT exp {} out of range", claims.exp))
}

#[cfg(test)]
pub(crate) fn sample_jwt(exp: i64) -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    // minimal unsigned JWT for tests: {"exp": exp}
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{},"sub":"alice"}}"#, exp));
    format!("{}.{}.", header, payload)
}
