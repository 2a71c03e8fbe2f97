use std::io::Write;

use headwire_headers::{pseudo, HeaderEntry, Headers};

use crate::conn::{Connection, Role, Version};
use crate::error::H1Error;
use crate::source::ByteSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    ReadingHeaders,
    AfterHeaders,
    WritingHeaders,
    AfterWriting,
    Trailers,
    Closed,
}

/// One request/response exchange on a connection.
///
/// The stream drives the connection's line primitives in the legal order,
/// applies the role-specific pseudo-header rules, and owns the header
/// storage of the exchange: dropping the stream (or the `Headers` it
/// returned) releases everything the exchange allocated.
#[derive(Debug)]
pub struct Stream<'c> {
    conn: &'c mut Connection,
    state: StreamState,
    is_trailers: bool,
}

impl<'c> Stream<'c> {
    pub(crate) fn new(conn: &'c mut Connection) -> Self {
        Self {
            conn,
            state: StreamState::Idle,
            is_trailers: false,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_trailers(&self) -> bool {
        self.is_trailers
    }

    /// Reads a complete request head into a fresh `Headers`. The consumed
    /// prefix is discarded from the source only once the whole head has
    /// validated, so a rejected head leaves the cursor untouched. Server
    /// role only.
    pub fn read_request_headers<S: ByteSource>(
        &mut self,
        src: &mut S,
    ) -> Result<Headers, H1Error> {
        debug_assert!(self.conn.role() == Role::Server, "servers read requests");
        debug_assert!(self.state == StreamState::Idle, "head already read");
        self.state = StreamState::ReadingHeaders;

        let result = (|| {
            let mut headers = Headers::new();
            let offset = self.conn.read_request_line(&mut headers, src, 0)?;
            let end = self.conn.read_header_block(&mut headers, src, offset)?;
            src.discard(end);
            Ok(headers)
        })();
        self.finish_read("request", result)
    }

    /// Reads a complete response head into a fresh `Headers`. Client role
    /// only.
    pub fn read_response_headers<S: ByteSource>(
        &mut self,
        src: &mut S,
    ) -> Result<Headers, H1Error> {
        debug_assert!(self.conn.role() == Role::Client, "clients read responses");
        debug_assert!(self.state == StreamState::Idle, "head already read");
        self.state = StreamState::ReadingHeaders;

        let result = (|| {
            let mut headers = Headers::new();
            let offset = self.conn.read_status_line(&mut headers, src, 0)?;
            let end = self.conn.read_header_block(&mut headers, src, offset)?;
            src.discard(end);
            Ok(headers)
        })();
        self.finish_read("response", result)
    }

    /// Reads a trailing header block (no start line) after a chunked body.
    pub fn read_trailers<S: ByteSource>(&mut self, src: &mut S) -> Result<Headers, H1Error> {
        self.is_trailers = true;

        let result = (|| {
            let mut headers = Headers::new();
            let end = self.conn.read_header_block(&mut headers, src, 0)?;
            src.discard(end);
            Ok(headers)
        })();
        match result {
            Ok(headers) => {
                self.state = StreamState::Trailers;
                Ok(headers)
            }
            Err(error) => {
                self.state = StreamState::Closed;
                tracing::warn!(error = %error, "trailer block rejected");
                Err(error)
            }
        }
    }

    fn finish_read(
        &mut self,
        kind: &'static str,
        result: Result<Headers, H1Error>,
    ) -> Result<Headers, H1Error> {
        match result {
            Ok(headers) => {
                self.state = StreamState::AfterHeaders;
                tracing::debug!(fields = headers.len(), "{kind} head parsed");
                Ok(headers)
            }
            Err(error) => {
                self.state = StreamState::Closed;
                tracing::warn!(error = %error, "{kind} head rejected");
                Err(error)
            }
        }
    }

    /// Serializes a complete head from `headers` onto `sink`: start line,
    /// field lines in insertion order with pseudo-headers suppressed, and
    /// the terminating CRLF. Missing or duplicated required pseudo-headers
    /// are caller bugs and panic rather than emit a smuggleable head.
    pub fn write_header_block<W: Write>(
        &mut self,
        headers: &Headers,
        sink: &mut W,
    ) -> Result<(), H1Error> {
        self.state = StreamState::WritingHeaders;
        let result = match self.conn.role() {
            Role::Client => self.write_request_head(headers, sink),
            Role::Server => self.write_response_head(headers, sink),
        };
        match result {
            Ok(()) => {
                self.state = StreamState::AfterWriting;
                Ok(())
            }
            Err(error) => {
                self.state = StreamState::Closed;
                Err(error)
            }
        }
    }

    fn write_request_head<W: Write>(
        &self,
        headers: &Headers,
        sink: &mut W,
    ) -> Result<(), H1Error> {
        let method = require_only(headers, pseudo::METHOD);
        let authority = match headers.get_only(pseudo::AUTHORITY) {
            Ok(entry) => entry,
            Err(_) => panic!("header block carries duplicate :authority"),
        };

        let target = if method.value == b"CONNECT" {
            assert!(
                !headers.contains(pseudo::PATH),
                "CONNECT must not carry :path"
            );
            match authority {
                Some(entry) => entry,
                None => panic!("CONNECT requires :authority"),
            }
        } else {
            assert!(
                authority.is_some() || self.conn.version() == Version::Http10,
                "HTTP/1.1 requests must carry :authority"
            );
            require_only(headers, pseudo::PATH)
        };

        self.conn
            .write_request_line(&method.value, &target.value, sink)?;
        for entry in headers {
            if entry.name.starts_with(':') {
                continue;
            }
            self.conn
                .write_header_line(entry.name.as_bytes(), &entry.value, sink)?;
        }
        // :authority goes on the wire under its HTTP/1 field name.
        if let Some(authority) = authority {
            self.conn.write_header_line(b"host", &authority.value, sink)?;
        }
        self.conn.write_headers_done(sink)?;
        Ok(())
    }

    fn write_response_head<W: Write>(
        &self,
        headers: &Headers,
        sink: &mut W,
    ) -> Result<(), H1Error> {
        let status = require_only(headers, pseudo::STATUS);
        assert!(
            status.value.len() == 3 && status.value.iter().all(|byte| byte.is_ascii_digit()),
            ":status must be exactly three ASCII digits"
        );
        assert!(
            !(status.value[0] == b'1' && self.conn.peer_version() == Some(Version::Http10)),
            "informational responses cannot be sent to an HTTP/1.0 peer"
        );

        let reason = match headers.get_only(pseudo::REASON) {
            Ok(Some(entry)) => entry.value.clone(),
            Ok(None) => canonical_reason(&status.value).as_bytes().to_vec(),
            Err(_) => panic!("header block carries duplicate :reason"),
        };

        self.conn.write_status_line(&status.value, &reason, sink)?;
        for entry in headers {
            if entry.name.starts_with(':') {
                continue;
            }
            self.conn
                .write_header_line(entry.name.as_bytes(), &entry.value, sink)?;
        }
        self.conn.write_headers_done(sink)?;
        Ok(())
    }
}

fn require_only<'h>(headers: &'h Headers, name: &str) -> &'h HeaderEntry {
    match headers.get_only(name) {
        Ok(Some(entry)) => entry,
        Ok(None) => panic!("header block is missing {name}"),
        Err(_) => panic!("header block carries duplicate {name}"),
    }
}

/// RFC 7231 reason phrase for a known status code, empty otherwise.
fn canonical_reason(status: &[u8]) -> &'static str {
    std::str::from_utf8(status)
        .ok()
        .and_then(|text| text.parse::<u16>().ok())
        .and_then(|code| http::StatusCode::from_u16(code).ok())
        .and_then(|code| code.canonical_reason())
        .unwrap_or("")
}
