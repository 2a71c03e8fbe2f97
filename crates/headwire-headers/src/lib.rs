use std::fmt;

use thiserror::Error;

/// Pseudo-header field names shared by the parser and serializer.
///
/// Borrowed from the HTTP/2 representation: request and response metadata
/// travel through the same multimap as ordinary fields, under names that can
/// never collide with a wire field name because `:` is not a token character.
pub mod pseudo {
    pub const METHOD: &str = ":method";
    pub const PATH: &str = ":path";
    pub const AUTHORITY: &str = ":authority";
    pub const SCHEME: &str = ":scheme";
    pub const PROTOCOL: &str = ":protocol";
    pub const STATUS: &str = ":status";
    pub const REASON: &str = ":reason";
}

/// RFC 7230 tchar set: `!#$%&'*+-.^_\`|~`, digits, ASCII letters.
pub fn is_token_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
        || matches!(
            byte,
            b'!' | b'#'
                | b'$'
                | b'%'
                | b'&'
                | b'\''
                | b'*'
                | b'+'
                | b'-'
                | b'.'
                | b'^'
                | b'_'
                | b'`'
                | b'|'
                | b'~'
        )
}

/// A wire-legal field name: non-empty and token characters only.
pub fn is_field_name(name: &[u8]) -> bool {
    !name.is_empty() && name.iter().all(|byte| is_token_char(*byte))
}

/// A stored name: either a wire-legal field name or a pseudo-header.
fn is_storable_name(name: &str) -> bool {
    name.strip_prefix(':')
        .map(|rest| is_field_name(rest.as_bytes()))
        .unwrap_or_else(|| is_field_name(name.as_bytes()))
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("field {name:?} appears more than once")]
pub struct AmbiguousField {
    pub name: String,
}

/// One field entry. The name is stored lowercase; `sensitive` marks values
/// that must never be indexed or logged (authorization material and the
/// like), mirroring the HPACK never-index flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderEntry {
    pub name: String,
    pub value: Vec<u8>,
    pub sensitive: bool,
}

impl HeaderEntry {
    /// Lossy UTF-8 view of the value, for diagnostics and test equality.
    pub fn value_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.value)
    }
}

/// Ordered, case-insensitive multimap of HTTP fields.
///
/// Insertion order is preserved across duplicate names, `len` counts entries
/// rather than unique names, and lookups are lowercase-exact: names are
/// canonicalized on insert, not on query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<HeaderEntry>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Appends a field, copying both parts and lowercasing the name.
    pub fn append(&mut self, name: &str, value: &[u8], sensitive: bool) {
        self.append_owned(name.to_ascii_lowercase(), value.to_vec(), sensitive);
    }

    /// Appends a field taking ownership of already-allocated storage. The
    /// name must already be lowercase.
    pub fn append_owned(&mut self, name: String, value: Vec<u8>, sensitive: bool) {
        debug_assert!(is_storable_name(&name), "unstorable field name {name:?}");
        debug_assert!(
            !name.bytes().any(|byte| byte.is_ascii_uppercase()),
            "field name {name:?} must be lowercase"
        );
        self.entries.push(HeaderEntry {
            name,
            value,
            sensitive,
        });
    }

    /// The single entry under `name`, `None` when absent, an error when the
    /// name is duplicated.
    pub fn get_only(&self, name: &str) -> Result<Option<&HeaderEntry>, AmbiguousField> {
        let mut found = None;
        for entry in &self.entries {
            if entry.name == name {
                if found.is_some() {
                    return Err(AmbiguousField {
                        name: name.to_string(),
                    });
                }
                found = Some(entry);
            }
        }
        Ok(found)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|entry| entry.name == name)
    }

    /// Total entry count, duplicates included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, HeaderEntry> {
        self.entries.iter()
    }

    /// Entries under `name` in insertion order.
    pub fn values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a HeaderEntry> {
        self.entries.iter().filter(move |entry| entry.name == name)
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = &'a HeaderEntry;
    type IntoIter = std::slice::Iter<'a, HeaderEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{}: {}", entry.name, entry.value_text())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{is_field_name, is_token_char, pseudo, Headers};

    #[test]
    fn append_lowercases_names_and_preserves_insertion_order() {
        let mut headers = Headers::new();
        headers.append("Content-Type", b"text/plain", false);
        headers.append("X-Trace", b"abc", false);
        headers.append("content-type", b"text/html", false);

        let names = headers
            .iter()
            .map(|entry| entry.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["content-type", "x-trace", "content-type"]);
    }

    #[test]
    fn len_counts_entries_not_unique_names() {
        let mut headers = Headers::new();
        headers.append("accept", b"text/html", false);
        headers.append("accept", b"text/plain", false);
        assert_eq!(headers.len(), 2);
        assert!(!headers.is_empty());
    }

    #[test]
    fn get_only_distinguishes_missing_single_and_duplicated() {
        let mut headers = Headers::new();
        headers.append("host", b"example.com", false);
        headers.append("accept", b"a", false);
        headers.append("accept", b"b", false);

        assert!(headers.get_only("absent").expect("absent is fine").is_none());
        let host = headers
            .get_only("host")
            .expect("single host")
            .expect("host present");
        assert_eq!(host.value, b"example.com");

        let error = headers.get_only("accept").expect_err("duplicate accept");
        assert_eq!(error.name, "accept");
    }

    #[test]
    fn lookups_are_lowercase_exact() {
        let mut headers = Headers::new();
        headers.append("Host", b"example.com", false);
        assert!(headers.contains("host"));
        assert!(!headers.contains("Host"));
    }

    #[test]
    fn pseudo_headers_are_ordinary_entries() {
        let mut headers = Headers::new();
        headers.append(pseudo::METHOD, b"GET", false);
        headers.append(pseudo::PATH, b"/index", false);
        headers.append("foo", b"bar", false);

        assert_eq!(headers.len(), 3);
        assert!(headers.contains(pseudo::METHOD));
        assert_eq!(
            headers.to_string(),
            ":method: GET\n:path: /index\nfoo: bar\n"
        );
    }

    #[test]
    fn values_yields_duplicates_in_order() {
        let mut headers = Headers::new();
        headers.append("via", b"a", false);
        headers.append("other", b"x", false);
        headers.append("via", b"b", false);

        let via = headers
            .values("via")
            .map(|entry| entry.value.clone())
            .collect::<Vec<_>>();
        assert_eq!(via, vec![b"a".to_vec(), b"b".to_vec()]);
    }

    #[test]
    fn sensitive_flag_travels_with_the_entry() {
        let mut headers = Headers::new();
        headers.append("authorization", b"Bearer t", true);
        let entry = headers
            .get_only("authorization")
            .expect("single")
            .expect("present");
        assert!(entry.sensitive);
    }

    #[test]
    fn token_character_table_matches_rfc7230() {
        for byte in [b'a', b'Z', b'0', b'!', b'#', b'~', b'|', b'.', b'-'] {
            assert!(is_token_char(byte), "{byte} should be a token char");
        }
        for byte in [b' ', b'\t', b':', b';', b'(', b')', b'/', b'\r', b'\n', 0x7f] {
            assert!(!is_token_char(byte), "{byte} must not be a token char");
        }
        assert!(is_field_name(b"content-length"));
        assert!(!is_field_name(b""));
        assert!(!is_field_name(b"bad name"));
    }
}
