//! One-shot messages carried across a redirect in a cookie.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const FLASH_COOKIE: &str = "bloodshare_flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub level: Level,
    pub text: String,
}

impl Flash {
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            text: text.into(),
        }
    }
}

/// Queue a message for the next rendered page.
pub fn push(jar: CookieJar, level: Level, text: impl Into<String>) -> CookieJar {
    let mut queued = jar.get(FLASH_COOKIE).map(|c| decode(c.value())).unwrap_or_default();
    queued.push(Flash {
        level,
        text: text.into(),
    });

    let cookie = Cookie::build((FLASH_COOKIE, encode(&queued)))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    jar.add(cookie)
}

/// Drain queued messages, clearing the cookie if one was set.
pub fn take(jar: CookieJar) -> (CookieJar, Vec<Flash>) {
    let Some(cookie) = jar.get(FLASH_COOKIE) else {
        return (jar, Vec::new());
    };
    let messages = decode(cookie.value());
    (jar.remove(Cookie::build(FLASH_COOKIE).path("/")), messages)
}

fn encode(messages: &[Flash]) -> String {
    // Serializing plain enums and strings cannot fail.
    B64.encode(serde_json::to_vec(messages).unwrap_or_default())
}

fn decode(raw: &str) -> Vec<Flash> {
    B64.decode(raw)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .unwrap_or_else(|| {
            warn!("Discarding unreadable flash cookie");
            Vec::new()
        })
}
