use axum::{
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};

use crate::access;
use crate::auth::{AppState, run_blocking, user_ref};
use crate::error::BlogError;
use crate::session::{SESSION_COOKIE, Session};

/// Session token claims. `sub` is the user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub name: String,
    pub exp: usize,
}

/// Session resolved from the request's cookie. The user row is reloaded so a
/// token naming a missing user reads as anonymous.
pub struct CurrentSession(pub Session);

impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = BlogError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let Some(claims) = jar
            .get(SESSION_COOKIE)
            .and_then(|cookie| state.session.read_token(cookie.value()))
        else {
            return Ok(Self(Session::anonymous()));
        };

        let user = run_blocking(state, move |app| Ok(app.db.get_user_by_id(claims.sub)?)).await?;

        Ok(Self(match user {
            Some(row) => Session::authenticated(user_ref(row)),
            None => Session::anonymous(),
        }))
    }
}

/// Admin-only gate for the post management routes. Rejects with 403 before
/// the handler runs and hands the admin identity on as an extension.
pub async fn require_admin(
    CurrentSession(session): CurrentSession,
    mut req: Request,
    next: Next,
) -> Result<Response, BlogError> {
    let admin = access::ensure_admin(session.current())?.clone();
    req.extensions_mut().insert(admin);
    Ok(next.run(req).await)
}
