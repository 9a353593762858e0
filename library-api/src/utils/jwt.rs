use base64::{engine::general_purpose, Engine as _};
use library_core::error::AppError;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct TokenClaims {
    pub sub: Option<String>,
    pub email: Option<String>,
    pub exp: Option<i64>,
}

/// Decode JWT claims without validating the signature.
///
/// Signature and revocation are checked by the auth provider; this only lets us
/// reject malformed or already expired tokens without a round trip.
pub fn decode_claims(token: &str) -> anyhow::Result<TokenClaims> {
    let parts: Vec<&str> = token.split('.').collect();

    if parts.len() != 3 {
        return Err(anyhow::anyhow!("Invalid JWT format"));
    }

    let payload = general_purpose::URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|e| anyhow::anyhow!("Failed to decode JWT payload: {}", e))?;

    let claims: TokenClaims = serde_json::from_slice(&payload)
        .map_err(|e| anyhow::anyhow!("Failed to parse JWT claims: {}", e))?;

    Ok(claims)
}

pub fn ensure_not_expired(token: &str) -> Result<TokenClaims, AppError> {
    let claims = decode_claims(token)
        .map_err(|e| AppError::Unauthorized(anyhow::anyhow!("Invalid token: {}", e)))?;

    if let Some(exp) = claims.exp {
        if exp <= chrono::Utc::now().timestamp() {
            return Err(AppError::Unauthorized(anyhow::anyhow!("Token has expired")));
        }
    }

    Ok(claims)
}

/// Build an unsigned JWT-shaped token. Used by the in-memory auth provider.
pub fn encode_unsigned(claims: &serde_json::Value) -> String {
    let header = general_purpose::URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = general_purpose::URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.unsigned", header, payload)
}
