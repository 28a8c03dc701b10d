//! One-shot notices carried across a redirect in a cookie.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;

pub const FLASH_COOKIE: &str = "quill_flash";

pub fn set(jar: CookieJar, message: impl AsRef<str>) -> CookieJar {
    let cookie = Cookie::build((FLASH_COOKIE, B64.encode(message.as_ref())))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    jar.add(cookie)
}

/// Read the pending notice, if any, and schedule its removal.
pub fn take(jar: CookieJar) -> (CookieJar, Option<String>) {
    let Some(raw) = jar.get(FLASH_COOKIE).map(|c| c.value().to_owned()) else {
        return (jar, None);
    };

    let message = B64
        .decode(raw)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok());

    (jar.remove(Cookie::build(FLASH_COOKIE).path("/")), message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notice_is_read_once() {
        let jar = set(CookieJar::new(), "Incorrect password, try again!");
        let (jar, message) = take(jar);
        assert_eq!(message.as_deref(), Some("Incorrect password, try again!"));

        let (_, again) = take(jar);
        assert!(again.is_none());
    }

    #[test]
    fn garbage_cookie_is_dropped() {
        let jar = CookieJar::new().add(Cookie::new(FLASH_COOKIE, "%%%"));
        let (jar, message) = take(jar);
        assert!(message.is_none());
        assert!(jar.get(FLASH_COOKIE).is_none());
    }
}
