//! Ordered, case-insensitive header storage.
//!
//! Headers keep their insertion order and may repeat (`Set-Cookie`), while
//! lookups ignore ASCII case. Storage is a `SmallVec`, so the handful of
//! headers a synthetic request or a handler response carries never touches
//! the heap.

use smallvec::SmallVec;
use std::fmt;

/// Number of headers stored inline before spilling to the heap.
pub const INLINE_HEADERS: usize = 12;

/// A single header line.
#[derive(Clone, PartialEq, Eq)]
pub struct Header {
    /// Header name as it was inserted
    pub name: String,
    /// Header value
    pub value: String,
}

impl Header {
    #[inline]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Check if name matches (case-insensitive)
    #[inline]
    pub fn name_eq(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.value)
    }
}

/// Rewrite a header name to canonical header case.
///
/// ```rust
/// use trellis_core::headers::canonical_name;
///
/// assert_eq!(canonical_name("content-type"), "Content-Type");
/// assert_eq!(canonical_name("X-REQUEST-ID"), "X-Request-Id");
/// ```
pub fn canonical_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Multi-value header map with case-insensitive lookup.
///
/// # Example
///
/// ```rust
/// use trellis_core::HeaderMap;
///
/// let mut headers = HeaderMap::new();
/// headers.insert("Content-Type", "application/json");
/// headers.append("Set-Cookie", "a=1");
/// headers.append("Set-Cookie", "b=2");
///
/// assert_eq!(headers.get("content-type"), Some("application/json"));
/// assert_eq!(headers.get_all("set-cookie"), vec!["a=1", "b=2"]);
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    inner: SmallVec<[Header; INLINE_HEADERS]>,
}

impl HeaderMap {
    #[inline]
    pub const fn new() -> Self {
        Self {
            inner: SmallVec::new_const(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Get the first value for a header name (case-insensitive).
    #[inline]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|h| h.name_eq(name))
            .map(|h| h.value.as_str())
    }

    /// Get every value for a header name, in insertion order.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.inner
            .iter()
            .filter(|h| h.name_eq(name))
            .map(|h| h.value.as_str())
            .collect()
    }

    /// Get all values of a header joined by a comma, or an empty string.
    pub fn get_line(&self, name: &str) -> String {
        self.get_all(name).join(", ")
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.inner.iter().any(|h| h.name_eq(name))
    }

    /// Insert a header, replacing every existing value with the same name.
    ///
    /// Returns the first replaced value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let name = name.into();
        let value = value.into();

        match self.inner.iter().position(|h| h.name_eq(&name)) {
            Some(pos) => {
                let old = std::mem::replace(&mut self.inner[pos].value, value);
                let mut index = pos + 1;
                while index < self.inner.len() {
                    if self.inner[index].name_eq(&name) {
                        self.inner.remove(index);
                    } else {
                        index += 1;
                    }
                }
                Some(old)
            }
            None => {
                self.inner.push(Header { name, value });
                None
            }
        }
    }

    /// Append a header without replacing existing values.
    #[inline]
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.push(Header::new(name, value));
    }

    /// Remove every value for a header name; returns how many were removed.
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.inner.len();
        self.inner.retain(|h| !h.name_eq(name));
        before - self.inner.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|h| (h.name.as_str(), h.value.as_str()))
    }

    /// Distinct header names, first spelling wins.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for h in &self.inner {
            if !names.iter().any(|n| n.eq_ignore_ascii_case(&h.name)) {
                names.push(&h.name);
            }
        }
        names
    }

    #[inline]
    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Get Content-Type header.
    #[inline]
    pub fn content_type(&self) -> Option<&str> {
        self.get("Content-Type")
    }

    /// Get Location header.
    #[inline]
    pub fn location(&self) -> Option<&str> {
        self.get("Location")
    }
}

impl fmt::Debug for HeaderMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.inner.iter().map(|h| (&h.name, &h.value)))
            .finish()
    }
}

impl<K, V> FromIterator<(K, V)> for HeaderMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = HeaderMap::new();
        for (k, v) in iter {
            map.append(k, v);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut headers = HeaderMap::new();
        headers.insert("Content-Type", "application/json");
        headers.insert("Accept", "text/html");

        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("Content-Type"), Some("application/json"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("application/json"));
    }

    #[test]
    fn test_insert_replaces_all_values() {
        let mut headers = HeaderMap::new();
        headers.append("Vary", "Accept");
        headers.append("vary", "Origin");
        let old = headers.insert("VARY", "Cookie");

        assert_eq!(old, Some("Accept".to_string()));
        assert_eq!(headers.get_all("Vary"), vec!["Cookie"]);
    }

    #[test]
    fn test_append_keeps_order() {
        let mut headers = HeaderMap::new();
        headers.append("Set-Cookie", "session=abc");
        headers.append("X-Other", "1");
        headers.append("Set-Cookie", "user=123");

        assert_eq!(headers.get_all("set-cookie"), vec!["session=abc", "user=123"]);
        assert_eq!(headers.get_line("Set-Cookie"), "session=abc, user=123");
        assert_eq!(headers.names(), vec!["Set-Cookie", "X-Other"]);
    }

    #[test]
    fn test_remove() {
        let mut headers = HeaderMap::new();
        headers.append("Set-Cookie", "a=1");
        headers.append("Set-Cookie", "b=2");
        headers.insert("Accept", "*/*");

        assert_eq!(headers.remove("set-cookie"), 2);
        assert!(!headers.contains("Set-Cookie"));
        assert_eq!(headers.remove("missing"), 0);
    }

    #[test]
    fn test_get_line_missing_is_empty() {
        assert_eq!(HeaderMap::new().get_line("Location"), "");
    }

    #[test]
    fn test_canonical_name() {
        assert_eq!(canonical_name("user-agent"), "User-Agent");
        assert_eq!(canonical_name("ACCEPT"), "Accept");
        assert_eq!(canonical_name("x--y"), "X--Y");
    }
}
