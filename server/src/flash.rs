//! One-shot notification messages carried across a redirect in a signed
//! cookie: set on a mutation, rendered and cleared by the next page.

use axum_extra::extract::cookie::{Cookie, SignedCookieJar};

pub const FLASH_COOKIE: &str = "flash";

#[derive(Debug, Clone, PartialEq)]
pub struct Flash {
    pub level: String,
    pub message: String,
}

fn encode(level: &str, message: &str) -> String {
    format!("{level}:{message}")
}

fn decode(raw: &str) -> Option<Flash> {
    let (level, message) = raw.split_once(':')?;
    Some(Flash {
        level: level.to_owned(),
        message: message.to_owned(),
    })
}

pub fn set(jar: SignedCookieJar, level: &str, message: &str) -> SignedCookieJar {
    jar.add(
        Cookie::build((FLASH_COOKIE, encode(level, message)))
            .path("/")
            .http_only(true),
    )
}

/// Pops the pending flash, if any. The returned jar clears the cookie so
/// the message is shown exactly once.
pub fn take(jar: SignedCookieJar) -> (SignedCookieJar, Option<Flash>) {
    match jar.get(FLASH_COOKIE) {
        Some(cookie) => {
            let flash = decode(cookie.value());
            (jar.remove(Cookie::build(FLASH_COOKIE).path("/")), flash)
        }
        None => (jar, None),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_flash_round_trip() {
        let raw = encode("success", "Post created");
        assert_eq!(
            decode(&raw),
            Some(Flash {
                level: "success".to_owned(),
                message: "Post created".to_owned(),
            })
        );
    }

    #[test]
    fn test_message_may_contain_separator() {
        let flash = decode(&encode("error", "bad: worse")).unwrap();
        assert_eq!(flash.level, "error");
        assert_eq!(
            flash.message, "bad: worse",
            "only the first colon separates level from message"
        );
    }

    #[test]
    fn test_garbage_cookie_is_ignored() {
        assert_eq!(decode("no separator"), None);
    }
}
