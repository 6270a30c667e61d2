//! Signed, time-limited password reset tokens.

use crate::error::{AppError, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

/// Purpose salt mixed into the signing key and carried in the claims.
pub const PASSWORD_RESET_PURPOSE: &str = "password-reset";

#[derive(Debug, Serialize, Deserialize)]
struct ResetClaims {
    sub: String,
    purpose: String,
    iat: i64,
    exp: i64,
}

/// Issues and verifies password reset tokens.
///
/// Tokens are HS256 JWTs keyed with the application secret plus the purpose
/// salt, so a token signed for another purpose never verifies here.
#[derive(Clone)]
pub struct ResetTokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    max_age: Duration,
}

impl ResetTokenSigner {
    /// Create a signer from the application secret.
    pub fn new(secret: &[u8], max_age: Duration) -> Self {
        Self::with_purpose(secret, PASSWORD_RESET_PURPOSE, max_age)
    }

    fn with_purpose(secret: &[u8], purpose: &str, max_age: Duration) -> Self {
        let mut key = secret.to_vec();
        key.push(b':');
        key.extend_from_slice(purpose.as_bytes());

        Self {
            encoding: EncodingKey::from_secret(&key),
            decoding: DecodingKey::from_secret(&key),
            max_age,
        }
    }

    /// Token lifetime.
    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Issue a token for `email` as of `now`.
    pub fn issue_at(&self, email: &str, now: DateTime<Utc>) -> Result<String> {
        let claims = ResetClaims {
            sub: email.to_string(),
            purpose: PASSWORD_RESET_PURPOSE.to_string(),
            iat: now.timestamp(),
            exp: (now + self.max_age).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Failed to sign reset token: {}", e)))
    }

    /// Issue a token for `email` valid from now.
    pub fn issue(&self, email: &str) -> Result<String> {
        self.issue_at(email, Utc::now())
    }

    /// Verify `token` as of `now` and return the email it was issued for.
    ///
    /// Every failure maps to [`AppError::InvalidResetToken`]; the cause is logged.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<String> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below against the injected clock.
        validation.validate_exp = false;
        validation.leeway = 0;

        let claims = decode::<ResetClaims>(token, &self.decoding, &validation)
            .map_err(|e| {
                tracing::warn!(error = %e, "Rejected reset token");
                AppError::InvalidResetToken
            })?
            .claims;

        if claims.purpose != PASSWORD_RESET_PURPOSE {
            tracing::warn!(purpose = %claims.purpose, "Rejected reset token for another purpose");
            return Err(AppError::InvalidResetToken);
        }

        if now.timestamp() >= claims.exp {
            tracing::warn!(expired_at = claims.exp, "Rejected expired reset token");
            return Err(AppError::InvalidResetToken);
        }

        Ok(claims.sub)
    }

    /// Verify `token` against the current time.
    pub fn verify(&self, token: &str) -> Result<String> {
        self.verify_at(token, Utc::now())
    }
}
