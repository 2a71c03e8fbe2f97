use std::io::Read;

use headwire_h1::{BufferedSource, Connection, Headers, Limits, Role, Version};
use proptest::prelude::*;

/// Hands out the payload in reads no larger than `chunk`.
struct ChunkedReader {
    data: Vec<u8>,
    at: usize,
    chunk: usize,
}

impl Read for ChunkedReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.at == self.data.len() || buf.is_empty() {
            return Ok(0);
        }
        let take = self.chunk.min(buf.len()).min(self.data.len() - self.at);
        buf[..take].copy_from_slice(&self.data[self.at..self.at + take]);
        self.at += take;
        Ok(take)
    }
}

fn method_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[A-Z]{1,7}")
        .expect("method regex")
        .prop_filter("CONNECT changes the target pseudo-header", |method| {
            method != "CONNECT"
        })
}

fn path_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("/[a-z0-9/._-]{0,20}").expect("path regex")
}

// A hyphen is mandatory so `host` can never be generated; that name is
// rewritten to `:authority` and would change the expected entry list.
fn name_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-z]{1,8}-[a-z0-9]{1,4}").expect("name regex")
}

fn value_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-zA-Z0-9/=;+]{1,16}").expect("value regex")
}

fn render_head(method: &str, path: &str, fields: &[(String, String)]) -> Vec<u8> {
    let mut head = format!("{method} {path} HTTP/1.1\r\n").into_bytes();
    for (name, value) in fields {
        head.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
    }
    head.extend_from_slice(b"\r\n");
    head
}

fn parse(raw: Vec<u8>, chunk: usize, limits: Limits) -> Result<Headers, headwire_h1::H1Error> {
    let mut conn = Connection::with_limits(Role::Server, Version::Http11, limits);
    let mut src = BufferedSource::new(ChunkedReader {
        data: raw,
        at: 0,
        chunk,
    });
    conn.new_stream().read_request_headers(&mut src)
}

proptest! {
    #[test]
    fn well_formed_heads_parse_to_their_fields(
        method in method_strategy(),
        path in path_strategy(),
        fields in proptest::collection::vec((name_strategy(), value_strategy()), 0..8),
    ) {
        let raw = render_head(&method, &path, &fields);
        let headers = parse(raw, 4096, Limits::default()).expect("well-formed head");

        prop_assert_eq!(headers.len(), fields.len() + 2);
        let mut entries = headers.iter();
        let first = entries.next().expect(":method entry");
        prop_assert_eq!(first.name.as_str(), ":method");
        prop_assert_eq!(first.value.as_slice(), method.as_bytes());
        let second = entries.next().expect(":path entry");
        prop_assert_eq!(second.name.as_str(), ":path");
        prop_assert_eq!(second.value.as_slice(), path.as_bytes());
        for (entry, (name, value)) in entries.zip(&fields) {
            prop_assert_eq!(entry.name.as_str(), name.as_str());
            prop_assert_eq!(entry.value.as_slice(), value.as_bytes());
        }
    }

    #[test]
    fn delivery_chunking_never_changes_the_parse(
        method in method_strategy(),
        path in path_strategy(),
        fields in proptest::collection::vec((name_strategy(), value_strategy()), 0..6),
        chunk in 1_usize..32,
    ) {
        let raw = render_head(&method, &path, &fields);
        let whole = parse(raw.clone(), raw.len().max(1), Limits::default())
            .expect("well-formed head");
        let trickled = parse(raw, chunk, Limits::default()).expect("same head, smaller reads");
        prop_assert_eq!(whole, trickled);
    }

    #[test]
    fn header_count_limit_is_exact(
        fields in proptest::collection::vec((name_strategy(), value_strategy()), 0..8),
        max_headers in 0_usize..10,
    ) {
        let raw = render_head("GET", "/", &fields);
        let result = parse(raw, 4096, Limits { max_headers });

        // The start line itself contributes two pseudo-header entries.
        if fields.len() + 2 > max_headers {
            prop_assert!(matches!(result, Err(headwire_h1::H1Error::TooManyHeaders)));
        } else {
            prop_assert!(result.is_ok());
        }
    }

    #[test]
    fn whitespace_before_the_colon_is_always_rejected(
        method in method_strategy(),
        name in name_strategy(),
        value in value_strategy(),
        pad in proptest::sample::select(vec![" ", "\t"]),
    ) {
        let raw = format!("{method} / HTTP/1.1\r\n{name}{pad}: {value}\r\n\r\n").into_bytes();
        let result = parse(raw, 4096, Limits::default());
        prop_assert!(matches!(result, Err(headwire_h1::H1Error::InvalidRequest)));
    }

    #[test]
    fn arbitrary_bytes_never_panic_the_parser(
        raw in proptest::collection::vec(any::<u8>(), 0..256),
        chunk in 1_usize..32,
    ) {
        let _ = parse(raw, chunk, Limits::default());
    }
}
