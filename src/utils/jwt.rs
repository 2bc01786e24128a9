use std::collections::HashSet;

use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use thiserror::Error;

use crate::routes::auth::claims::Claims;

/// Minimum acceptable size for the shared signing secret in bytes.
pub const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_UNIQUE_JWT_BYTES: usize = 8;

#[derive(Debug, Error)]
pub enum JwtSecretError {
    #[error("JWT_SECRET must be at least {required} bytes, but {actual} bytes were provided")]
    TooShort { actual: usize, required: usize },
    #[error(
        "JWT_SECRET must contain sufficient entropy (at least {required} unique bytes); only {actual} unique bytes found"
    )]
    LowEntropy { actual: usize, required: usize },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionTokenError {
    #[error("session token has expired")]
    Expired,
    #[error("session token was not issued for this portal")]
    WrongAudienceOrIssuer,
    #[error("session token is invalid")]
    Invalid,
}

/// Verifies the HS256 session tokens minted by the portal's auth provider.
/// The portal never issues tokens itself.
#[derive(Clone)]
pub struct SessionVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for SessionVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionVerifier")
            .field("issuer", &self.validation.iss)
            .finish_non_exhaustive()
    }
}

impl SessionVerifier {
    pub fn new(
        secret: impl AsRef<[u8]>,
        issuer: &str,
        audience: &str,
    ) -> Result<Self, JwtSecretError> {
        let bytes = secret.as_ref();
        validate_secret(bytes)?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[audience]);
        validation.iss = Some(HashSet::from([issuer.to_owned()]));
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
        validation.leeway = 0;

        Ok(Self {
            key: DecodingKey::from_secret(bytes),
            validation,
        })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, SessionTokenError> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => SessionTokenError::Expired,
                ErrorKind::InvalidAudience | ErrorKind::InvalidIssuer => {
                    SessionTokenError::WrongAudienceOrIssuer
                }
                _ => SessionTokenError::Invalid,
            })
    }
}

/// Implemented by router state so the session extractor can verify tokens.
pub trait SessionVerifierProvider {
    fn session_verifier(&self) -> &SessionVerifier;
}

fn validate_secret(secret: &[u8]) -> Result<(), JwtSecretError> {
    if secret.len() < MIN_JWT_SECRET_LENGTH {
        return Err(JwtSecretError::TooShort {
            actual: secret.len(),
            required: MIN_JWT_SECRET_LENGTH,
        });
    }

    let unique = secret.iter().copied().collect::<HashSet<_>>().len();
    if unique < MIN_UNIQUE_JWT_BYTES {
        return Err(JwtSecretError::LowEntropy {
            actual: unique,
            required: MIN_UNIQUE_JWT_BYTES,
        });
    }

    Ok(())
}

/// Mints a token the way the auth provider does.
#[cfg(test)]
pub(crate) fn sign_session_token(secret: &str, claims: &Claims) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}
