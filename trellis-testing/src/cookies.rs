// Set-Cookie parsing and rendering

use chrono::{DateTime, Duration, Utc};
use cookie::Cookie;
use time::OffsetDateTime;
use trellis_core::HeaderMap;

pub use cookie::SameSite;

/// Format used when rendering `Expires`.
pub const EXPIRES_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// One cookie as sent in a `Set-Cookie` response header.
///
/// Values are percent-decoded on parse and percent-encoded on render.
#[derive(Debug, Clone, PartialEq)]
pub struct SetCookie {
    inner: Cookie<'static>,
}

/// Where a cookie stands relative to a reference time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieExpiry {
    /// Expired at the given instant (or is expiring right now)
    Expired(DateTime<Utc>),
    /// Still valid until the given instant
    NotExpired(DateTime<Utc>),
    /// Neither `Expires` nor `Max-Age` was set
    Unknown,
}

impl SetCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            inner: Cookie::new(name.into(), value.into()),
        }
    }

    pub fn with_expires(mut self, expires: DateTime<Utc>) -> Self {
        self.inner.set_expires(to_offset(expires));
        self
    }

    pub fn with_max_age(mut self, seconds: i64) -> Self {
        self.inner.set_max_age(time::Duration::seconds(seconds));
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.inner.set_path(path.into());
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.inner.set_domain(domain.into());
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.inner.set_secure(secure);
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.inner.set_http_only(http_only);
        self
    }

    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.inner.set_same_site(same_site);
        self
    }

    /// Parse a `Set-Cookie` header value.
    ///
    /// Returns `None` when the value has no `name=value` pair. Unknown
    /// attributes are ignored, as are `Expires` dates that cannot be parsed.
    pub fn parse(header: &str) -> Option<Self> {
        Cookie::parse_encoded(header.to_string())
            .ok()
            .map(|inner| Self { inner })
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Decoded value, without surrounding double quotes.
    pub fn value(&self) -> &str {
        self.inner.value_trimmed()
    }

    /// The `Expires` attribute, when it holds a date.
    pub fn expires(&self) -> Option<DateTime<Utc>> {
        self.inner.expires_datetime().and_then(from_offset)
    }

    /// The `Max-Age` attribute in seconds; negative values read as zero.
    pub fn max_age(&self) -> Option<i64> {
        self.inner.max_age().map(|age| age.whole_seconds())
    }

    pub fn path(&self) -> Option<&str> {
        self.inner.path()
    }

    pub fn domain(&self) -> Option<&str> {
        self.inner.domain()
    }

    pub fn is_secure(&self) -> bool {
        self.inner.secure().unwrap_or(false)
    }

    pub fn is_http_only(&self) -> bool {
        self.inner.http_only().unwrap_or(false)
    }

    pub fn same_site(&self) -> Option<SameSite> {
        self.inner.same_site()
    }

    /// Absolute expiry relative to `now`; `Max-Age` wins over `Expires`.
    pub fn expires_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.max_age() {
            Some(seconds) if seconds <= 0 => DateTime::from_timestamp(0, 0),
            Some(seconds) => Duration::try_seconds(seconds).and_then(|d| now.checked_add_signed(d)),
            None => self.expires(),
        }
    }

    pub fn expiry(&self, now: DateTime<Utc>) -> CookieExpiry {
        match self.expires_at(now) {
            Some(at) if at > now => CookieExpiry::NotExpired(at),
            Some(at) => CookieExpiry::Expired(at),
            None => CookieExpiry::Unknown,
        }
    }
}

impl std::fmt::Display for SetCookie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner.encoded())
    }
}

fn to_offset(at: DateTime<Utc>) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(at.timestamp()).ok()
}

fn from_offset(at: OffsetDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(at.unix_timestamp(), at.nanosecond())
}

/// Every cookie set by `headers`, in header order.
pub fn from_headers(headers: &HeaderMap) -> Vec<SetCookie> {
    headers
        .get_all("Set-Cookie")
        .into_iter()
        .filter_map(SetCookie::parse)
        .collect()
}

/// The cookie named `name`; when it is set more than once the last one wins.
pub fn find(headers: &HeaderMap, name: &str) -> Option<SetCookie> {
    from_headers(headers).into_iter().rev().find(|c| c.name() == name)
}
