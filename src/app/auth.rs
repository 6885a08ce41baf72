use anyhow::{anyhow, Result};
use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::{local, version4::V4, Local};
use thiserror::Error;
use uuid::Uuid;

const TOKEN_ISSUER: &str = "tether";
const TOKEN_AUDIENCE: &str = "tether";
const ACCESS_TOKEN_TYPE: &str = "access";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing credential")]
    MissingCredential,
    #[error("invalid credential")]
    InvalidCredential,
    #[error("verifier failure: {0}")]
    Internal(String),
}

/// Turns a bearer token into the caller's user id. Runs once per request,
/// before any graph or feed logic.
#[axum::async_trait]
pub trait AuthVerifier: Send + Sync {
    async fn verify(&self, bearer_token: &str) -> Result<Uuid, AuthError>;
}

/// v4.local PASETO access tokens sharing a symmetric key with the identity provider.
#[derive(Clone)]
pub struct PasetoVerifier {
    access_key: [u8; 32],
}

impl PasetoVerifier {
    pub fn new(access_key: [u8; 32]) -> Self {
        Self { access_key }
    }

    /// Mints an access token for `user_id`, valid for `ttl_minutes`.
    pub fn issue(&self, user_id: Uuid, ttl_minutes: u64) -> Result<String> {
        let duration = std::time::Duration::from_secs(ttl_minutes * 60);
        let mut claims = Claims::new_expires_in(&duration)?;
        claims.issuer(TOKEN_ISSUER)?;
        claims.audience(TOKEN_AUDIENCE)?;
        claims.subject(&user_id.to_string())?;
        claims.add_additional("typ", ACCESS_TOKEN_TYPE)?;

        let key = SymmetricKey::<V4>::from(&self.access_key)?;
        Ok(local::encrypt(&key, &claims, None, None)?)
    }

    fn decrypt_claims(&self, token: &str) -> Result<Option<Claims>> {
        let key = SymmetricKey::<V4>::from(&self.access_key)?;
        let mut rules = ClaimsValidationRules::new();
        rules.validate_issuer_with(TOKEN_ISSUER);
        rules.validate_audience_with(TOKEN_AUDIENCE);

        let untrusted = match UntrustedToken::<Local, V4>::try_from(token) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        let trusted = match local::decrypt(&key, &untrusted, &rules, None, None) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        Ok(trusted.payload_claims().cloned())
    }
}

#[axum::async_trait]
impl AuthVerifier for PasetoVerifier {
    async fn verify(&self, bearer_token: &str) -> Result<Uuid, AuthError> {
        if bearer_token.trim().is_empty() {
            return Err(AuthError::MissingCredential);
        }

        let claims = self
            .decrypt_claims(bearer_token)
            .map_err(|err| AuthError::Internal(err.to_string()))?
            .ok_or(AuthError::InvalidCredential)?;

        if !has_token_type(&claims, ACCESS_TOKEN_TYPE) {
            return Err(AuthError::InvalidCredential);
        }

        claim_uuid(&claims, "sub").map_err(|_| AuthError::InvalidCredential)
    }
}

fn claim_uuid(claims: &Claims, name: &str) -> Result<Uuid> {
    let value = claims
        .get_claim(name)
        .and_then(|value| value.as_str())
        .ok_or_else(|| anyhow!("missing {} claim", name))?;
    Ok(Uuid::parse_str(value)?)
}

fn has_token_type(claims: &Claims, expected: &str) -> bool {
    claims
        .get_claim("typ")
        .and_then(|value| value.as_str())
        .map(|value| value == expected)
        .unwrap_or(false)
}
