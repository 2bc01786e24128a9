use axum::{
    body::Body,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{prelude::BASE64_URL_SAFE_NO_PAD, Engine};
use rand_core::RngCore;
use serde_json::json;

use crate::responses::JsonResponse;

pub const CSRF_COOKIE: &str = "csrf_token";
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Double-submit check: every state-changing request must echo the
/// `csrf_token` cookie in the `x-csrf-token` header.
pub async fn validate_csrf(req: Request<Body>, next: Next) -> Response {
    if req.method().is_safe() {
        return next.run(req).await;
    }

    let jar = CookieJar::from_headers(req.headers());
    let sent = req
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let expected = jar.get(CSRF_COOKIE).map(|c| c.value().to_owned());

    match (&sent, &expected) {
        (Some(sent), Some(expected)) if !sent.is_empty() && sent == expected => {
            next.run(req).await
        }
        _ => {
            tracing::warn!(
                method = %req.method(),
                uri = %req.uri(),
                has_header = sent.is_some(),
                has_cookie = expected.is_some(),
                "csrf validation failed"
            );
            JsonResponse::forbidden_with_code("Missing or invalid CSRF token", "CSRF_MISMATCH")
                .into_response()
        }
    }
}

pub fn generate_csrf_token() -> String {
    let mut bytes = [0u8; 32];
    rand_core::OsRng.fill_bytes(&mut bytes);
    BASE64_URL_SAFE_NO_PAD.encode(bytes)
}

/// Issues a fresh token as a cookie and echoes it in the body for the
/// frontend to send back in the header.
pub async fn get_csrf_token(jar: CookieJar) -> Response {
    let token = generate_csrf_token();
    let cookie = Cookie::build((CSRF_COOKIE, token.clone()))
        .path("/")
        .same_site(SameSite::Strict)
        .http_only(true)
        .secure(true)
        .build();

    (
        jar.add(cookie),
        Json(json!({ "success": true, "csrf_token": token })),
    )
        .into_response()
}
