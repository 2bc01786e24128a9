use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use axum_extra::extract::cookie::CookieJar;

use crate::routes::auth::claims::Claims;
use crate::utils::jwt::SessionVerifierProvider;

#[derive(Debug, PartialEq)]
pub struct AuthSession(pub Claims);

impl<S> FromRequestParts<S> for AuthSession
where
    S: SessionVerifierProvider + Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar.get("auth_token").ok_or(StatusCode::UNAUTHORIZED)?;

        let claims = state
            .session_verifier()
            .verify(token.value())
            .map_err(|err| {
                tracing::debug!(error = %err, "rejected session token");
                StatusCode::UNAUTHORIZED
            })?;

        Ok(AuthSession(claims))
    }
}
