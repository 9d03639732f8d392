//! Cookie-backed segment store.
//!
//! Writes `name=value; expires=...; domain=.<main domain>; path=/` lines into
//! a [`CookieJar`] the way a page writes `document.cookie`, and reads the
//! jar's `name=value; name=value` rendering back. Cookie values are treated
//! as case-lossy, so reads are upper-cased.
//!
//! Names and values are percent-encoded like `encodeURI`, so a space is
//! `%20` and cookies written by page scripts are found again.
//!
//! The `expires` attribute carries whole seconds. The stored expiry is
//! truncated to the second, so a cookie can disappear up to 999 ms before
//! the millisecond expiry the memory and local-storage backends keep.

use std::sync::Arc;

use anyhow::{anyhow, Context};
use chrono::{DateTime, TimeZone, Utc};
use dashmap::DashMap;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use segmab_core::types::MS_PER_DAY;
use segmab_core::Clock;
use tracing::{debug, warn};

use crate::SegmentStore;

const COOKIE_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Characters `encodeURI` escapes. Non-ASCII is always escaped.
const URI_ESCAPED: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Browser cookie access, shaped like `document.cookie`.
pub trait CookieJar: Send + Sync {
    /// All live cookies as `name=value` pairs joined by `"; "`.
    fn read(&self) -> String;

    /// Apply one `Set-Cookie`-style line.
    fn write(&self, cookie: &str);
}

/// A cookie as held by [`InMemoryCookieJar`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JarCookie {
    pub value: String,
    pub expires_at_ms: Option<i64>,
    pub domain: Option<String>,
    pub path: Option<String>,
}

/// Cookie jar with browser expiry semantics: expired cookies are dropped on
/// write and never rendered on read.
pub struct InMemoryCookieJar {
    cookies: DashMap<String, JarCookie>,
    clock: Arc<dyn Clock>,
}

impl InMemoryCookieJar {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            cookies: DashMap::new(),
            clock,
        }
    }

    /// Stored cookie by its encoded name, including attributes.
    pub fn cookie(&self, name: &str) -> Option<JarCookie> {
        self.cookies.get(name).map(|c| c.value().clone())
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

impl CookieJar for InMemoryCookieJar {
    fn read(&self) -> String {
        let now = self.clock.now_ms();
        self.cookies
            .retain(|_, c| c.expires_at_ms.map_or(true, |exp| exp > now));

        let mut pairs: Vec<String> = self
            .cookies
            .iter()
            .map(|c| format!("{}={}", c.key(), c.value().value))
            .collect();
        pairs.sort();
        pairs.join("; ")
    }

    fn write(&self, cookie: &str) {
        let mut parts = cookie.split(';').map(str::trim);
        let Some((name, value)) = parts.next().and_then(|p| p.split_once('=')) else {
            warn!(cookie, "ignoring cookie line without name=value");
            return;
        };

        let mut parsed = JarCookie {
            value: value.to_string(),
            expires_at_ms: None,
            domain: None,
            path: None,
        };
        for attr in parts {
            let (attr_name, attr_value) = attr.split_once('=').unwrap_or((attr, ""));
            match attr_name.to_ascii_lowercase().as_str() {
                "expires" => {
                    parsed.expires_at_ms = DateTime::parse_from_rfc2822(attr_value)
                        .ok()
                        .map(|d| d.timestamp_millis());
                }
                "max-age" => {
                    parsed.expires_at_ms = attr_value
                        .parse::<i64>()
                        .ok()
                        .map(|secs| self.clock.now_ms() + secs * 1_000);
                }
                "domain" => parsed.domain = Some(attr_value.to_string()),
                "path" => parsed.path = Some(attr_value.to_string()),
                _ => {}
            }
        }

        let expired = parsed
            .expires_at_ms
            .is_some_and(|exp| exp <= self.clock.now_ms());
        if expired {
            self.cookies.remove(name);
        } else {
            self.cookies.insert(name.to_string(), parsed);
        }
    }
}

impl<J: CookieJar + ?Sized> CookieJar for Arc<J> {
    fn read(&self) -> String {
        (**self).read()
    }

    fn write(&self, cookie: &str) {
        (**self).write(cookie)
    }
}

pub struct CookieStore<J> {
    jar: J,
    domain: String,
    path: String,
    clock: Arc<dyn Clock>,
}

impl<J: CookieJar> CookieStore<J> {
    /// Scope cookies to an explicit domain.
    pub fn with_domain(jar: J, domain: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        let domain = domain.into();
        Self {
            jar,
            domain: domain.trim_start_matches('.').to_string(),
            path: "/".to_string(),
            clock,
        }
    }

    /// Scope cookies to the main domain of the page at `page_url`.
    pub fn for_page_url(jar: J, page_url: &str, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        let url = url::Url::parse(page_url)
            .with_context(|| format!("invalid page url {page_url}"))?;
        let host = url
            .host_str()
            .ok_or_else(|| anyhow!("page url {page_url} has no host"))?;
        Ok(Self::with_domain(jar, main_domain(host), clock))
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn jar(&self) -> &J {
        &self.jar
    }

    fn write_cookie(&self, key: &str, value: &str, expires: DateTime<Utc>) {
        let line = format!(
            "{}={}; expires={}; domain=.{}; path={}",
            encode(key),
            encode(value),
            expires.format(COOKIE_DATE_FORMAT),
            self.domain,
            self.path
        );
        self.jar.write(&line);
    }
}

impl<J: CookieJar> SegmentStore for CookieStore<J> {
    fn get(&self, key: &str) -> Option<String> {
        let name_eq = format!("{}=", encode(key));
        let cookies = self.jar.read();
        cookies
            .split(';')
            .map(str::trim)
            .find_map(|c| c.strip_prefix(name_eq.as_str()))
            .map(|raw| decode(raw).to_uppercase())
    }

    fn set(&self, key: &str, value: &str, retention_days: u32) {
        let expires_ms = self.clock.now_ms() + i64::from(retention_days) * MS_PER_DAY;
        let expires = Utc
            .timestamp_millis_opt(expires_ms)
            .single()
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.write_cookie(key, value, expires);
    }

    fn remove(&self, key: &str) {
        debug!(key, domain = %self.domain, "expiring segment cookie");
        self.write_cookie(key, "", DateTime::<Utc>::default());
    }
}

/// Last two labels of `host`, or `host` itself when it has a single label.
pub fn main_domain(host: &str) -> String {
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() > 1 {
        labels[labels.len() - 2..].join(".")
    } else {
        host.to_string()
    }
}

fn encode(raw: &str) -> String {
    utf8_percent_encode(raw, URI_ESCAPED).to_string()
}

fn decode(encoded: &str) -> String {
    percent_decode_str(encoded).decode_utf8_lossy().into_owned()
}
