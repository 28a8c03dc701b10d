use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use quill_types::models::UserRef;
use tracing::debug;

use crate::middleware::Claims;

pub const SESSION_COOKIE: &str = "quill_session";

/// Identity bound to the current request. Passed explicitly to every
/// operation that needs to know who is acting.
#[derive(Debug, Clone, Default)]
pub struct Session {
    user: Option<UserRef>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(user: UserRef) -> Self {
        Self { user: Some(user) }
    }

    pub fn current(&self) -> Option<&UserRef> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn bind(&mut self, user: UserRef) {
        self.user = Some(user);
    }

    pub fn clear(&mut self) {
        self.user = None;
    }
}

/// Signs and reads the session cookie.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secret: String,
    pub ttl_days: i64,
}

impl SessionConfig {
    pub fn new(secret: impl Into<String>, ttl_days: i64) -> Self {
        Self {
            secret: secret.into(),
            ttl_days,
        }
    }

    pub fn create_token(&self, user: &UserRef) -> anyhow::Result<String> {
        let claims = Claims {
            sub: user.id,
            name: user.name.clone(),
            exp: (chrono::Utc::now() + chrono::Duration::days(self.ttl_days)).timestamp() as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;

        Ok(token)
    }

    /// Invalid or expired tokens read as "no session".
    pub fn read_token(&self, token: &str) -> Option<Claims> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| debug!("Ignoring session cookie: {}", e))
        .ok()
    }

    /// Write the session into the cookie jar: a signed cookie when someone is
    /// logged in, a removal cookie otherwise.
    pub fn persist(&self, jar: CookieJar, session: &Session) -> anyhow::Result<CookieJar> {
        let Some(user) = session.current() else {
            return Ok(jar.remove(Cookie::build(SESSION_COOKIE).path("/")));
        };

        let cookie = Cookie::build((SESSION_COOKIE, self.create_token(user)?))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax);

        Ok(jar.add(cookie))
    }
}
