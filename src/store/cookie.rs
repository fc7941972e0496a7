//! Cookie codec for the persisted refresh token.
//!
//! The refresh token lives in an origin-scoped cookie: `name=value; path=/; expires=<HTTP date>`.
//! Name and value are form-urlencoded so a token can never break the attribute list.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use url::form_urlencoded;

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshCookie {
    pub name: String,
    pub value: String,
    pub path: String,
    /// None for a session cookie
    pub expires: Option<DateTime<Utc>>,
    /// save that wrote this cookie, see [`crate::store::backend::FileBackend`]
    pub generation: Option<u64>,
}

impl RefreshCookie {
    pub fn new(name: &str, value: &str, path: &str, expires: Option<DateTime<Utc>>) -> Self {
        Self {
            name: name.to_owned(),
            value: value.to_owned(),
            path: path.to_owned(),
            expires,
            generation: None,
        }
    }

    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = Some(generation);
        self
    }

    pub fn to_cookie_string(&self) -> String {
        let mut cookie = format!("{}={}; path={}", encode(&self.name), encode(&self.value), self.path);
        if let Some(expires) = self.expires {
            cookie.push_str("; expires=");
            cookie.push_str(&expires.format(HTTP_DATE_FORMAT).to_string());
        }
        if let Some(generation) = self.generation {
            cookie.push_str(&format!("; generation={}", generation));
        }
        cookie
    }

    /// Parses one `Set-Cookie`-style line written by [`RefreshCookie::to_cookie_string`]
    pub fn parse(line: &str) -> Result<Self> {
        let mut parts = line.trim().split(';').map(str::trim);

        let pair = parts.next().filter(|p| !p.is_empty()).ok_or_else(|| anyhow!("empty cookie"))?;
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("cookie '{}' has no value", pair))?;

        let mut cookie = RefreshCookie::new(&decode(name), &decode(value), "/", None);
        for attribute in parts {
            let (key, val) = attribute.split_once('=').unwrap_or((attribute, ""));
            match key.to_ascii_lowercase().as_str() {
                "path" => cookie.path = val.to_owned(),
                "expires" => {
                    let expires = DateTime::parse_from_rfc2822(val)
                        .map_err(|e| anyhow!("invalid cookie expires '{}': {}", val, e))?;
                    cookie.expires = Some(expires.with_timezone(&Utc));
                }
                "generation" => {
                    let generation = val
                        .parse()
                        .map_err(|e| anyhow!("invalid cookie generation '{}': {}", val, e))?;
                    cookie.generation = Some(generation);
                }
                _ => {}
            }
        }
        Ok(cookie)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires.map(|expires| expires <= now).unwrap_or(false)
    }
}

fn encode(raw: &str) -> String {
    form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

// an encoded component holds no '&' or '=', so it decodes back as a single key
fn decode(encoded: &str) -> String {
    form_urlencoded::parse(encoded.as_bytes())
        .map(|(key, _)| key.into_owned())
        .next()
        .unwrap_or_default()
}
