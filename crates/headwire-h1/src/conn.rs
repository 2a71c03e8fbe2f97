use std::io::{self, Write};

use headwire_headers::{is_token_char, pseudo, Headers};

use crate::error::H1Error;
use crate::source::ByteSource;
use crate::stream::Stream;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Http10,
    Http11,
}

impl Version {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http10 => "1.0",
            Self::Http11 => "1.1",
        }
    }

    fn from_digit(digit: u8) -> Option<Self> {
        match digit {
            b'0' => Some(Self::Http10),
            b'1' => Some(Self::Http11),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_headers: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self { max_headers: 100 }
    }
}

// "M / HTTP/1.X\r" is the shortest request line that can carry all parts.
const MIN_REQUEST_LINE: usize = 13;
// "HTTP/1.X SSS\r" likewise for a status line with an empty reason.
const MIN_STATUS_LINE: usize = 13;
const VERSION_SUFFIX: &[u8] = b" HTTP/1.";

/// HTTP/1 connection state: role, pinned version, observed peer version,
/// and parse limits. Stateless across exchanges except for `peer_version`,
/// which is recorded by the first start line parsed and re-checked on every
/// subsequent one.
#[derive(Debug)]
pub struct Connection {
    pub(crate) role: Role,
    pub(crate) version: Version,
    pub(crate) peer_version: Option<Version>,
    pub(crate) limits: Limits,
}

impl Connection {
    pub fn new(role: Role, version: Version) -> Self {
        Self::with_limits(role, version, Limits::default())
    }

    pub fn with_limits(role: Role, version: Version, limits: Limits) -> Self {
        Self {
            role,
            version,
            peer_version: None,
            limits,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn peer_version(&self) -> Option<Version> {
        self.peer_version
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Binds one request/response exchange to this connection.
    pub fn new_stream(&mut self) -> Stream<'_> {
        Stream::new(self)
    }

    /// Reads a CRLF-terminated request line at `offset`, appending
    /// `:method` and `:path` (or `:authority` for CONNECT) and recording the
    /// peer version. Returns the index one past the LF. Server role only.
    pub fn read_request_line<S: ByteSource>(
        &mut self,
        headers: &mut Headers,
        src: &mut S,
        offset: usize,
    ) -> Result<usize, H1Error> {
        debug_assert!(self.role == Role::Server, "request lines arrive at servers");

        let mut offset = offset;
        let mut lf = src.fill_until(offset, b'\n')?;
        // One empty CRLF before the request line is tolerated (RFC 7230
        // section 3.5).
        if lf - offset == 1 && src.peek(offset) == b'\r' {
            offset += 2;
            lf = src.fill_until(offset, b'\n')?;
        }

        let line_len = lf - offset;
        if line_len < MIN_REQUEST_LINE {
            return Err(H1Error::InvalidRequest);
        }
        if src.peek(lf - 1) != b'\r' {
            return Err(H1Error::InvalidRequest);
        }

        let (method, target, peer) = {
            let line = src.slice(offset, line_len);
            if &line[line_len - 10..line_len - 2] != VERSION_SUFFIX {
                return Err(H1Error::InvalidRequest);
            }

            let mut method_len = None;
            for (i, byte) in line.iter().enumerate() {
                if *byte == b' ' {
                    method_len = Some(i);
                    break;
                }
                if !is_token_char(*byte) {
                    return Err(H1Error::InvalidRequest);
                }
            }
            // The version suffix starts with a space, so one is always found.
            let method_len = match method_len {
                Some(0) | None => return Err(H1Error::InvalidRequest),
                Some(at) => at,
            };

            let target = &line[method_len + 1..line_len - 10];
            if target.is_empty() || target.contains(&b' ') || has_bare_cr(target) {
                return Err(H1Error::InvalidRequest);
            }

            let Some(peer) = Version::from_digit(line[line_len - 2]) else {
                return Err(H1Error::InvalidRequest);
            };

            (line[..method_len].to_vec(), target.to_vec(), peer)
        };

        if self.version == Version::Http10 && peer == Version::Http11 {
            return Err(H1Error::VersionMismatch);
        }
        self.peer_version = Some(peer);

        headers.append(pseudo::METHOD, &method, false);
        if method == b"CONNECT" {
            headers.append(pseudo::AUTHORITY, &target, false);
        } else {
            headers.append(pseudo::PATH, &target, false);
        }
        Ok(lf + 1)
    }

    /// Reads a CRLF-terminated status line at `offset`, appending `:status`
    /// (and `:reason` when a phrase is present) and recording the peer
    /// version. Returns the index one past the LF. Client role only.
    pub fn read_status_line<S: ByteSource>(
        &mut self,
        headers: &mut Headers,
        src: &mut S,
        offset: usize,
    ) -> Result<usize, H1Error> {
        debug_assert!(self.role == Role::Client, "status lines arrive at clients");

        let lf = src.fill_until(offset, b'\n')?;
        let line_len = lf - offset;
        if line_len < MIN_STATUS_LINE {
            return Err(H1Error::InvalidRequest);
        }
        if src.peek(lf - 1) != b'\r' {
            return Err(H1Error::InvalidRequest);
        }

        let (status, reason, peer) = {
            let line = src.slice(offset, line_len);
            if &line[..7] != b"HTTP/1." {
                return Err(H1Error::InvalidRequest);
            }
            let Some(peer) = Version::from_digit(line[7]) else {
                return Err(H1Error::InvalidRequest);
            };
            if line[8] != b' ' {
                return Err(H1Error::InvalidRequest);
            }

            let status = &line[9..12];
            if !status.iter().all(|byte| byte.is_ascii_digit()) {
                return Err(H1Error::InvalidRequest);
            }

            // Anything after the status code must be a space-separated
            // reason phrase; a bare "HTTP/1.1 200\r\n" is also accepted.
            let reason = if line_len > MIN_STATUS_LINE {
                if line[12] != b' ' {
                    return Err(H1Error::InvalidRequest);
                }
                &line[13..line_len - 1]
            } else {
                &[][..]
            };
            if has_bare_cr(reason) {
                return Err(H1Error::InvalidRequest);
            }

            (status.to_vec(), reason.to_vec(), peer)
        };

        if self.version == Version::Http10 && peer == Version::Http11 {
            return Err(H1Error::VersionMismatch);
        }
        self.peer_version = Some(peer);

        headers.append(pseudo::STATUS, &status, false);
        if !reason.is_empty() {
            headers.append(pseudo::REASON, &reason, false);
        }
        Ok(lf + 1)
    }

    /// Reads one field line at `offset`, folding obs-fold continuations into
    /// a single-space-joined value. Returns `None` on the terminal empty
    /// line, otherwise the offset past the logical end of the folded line.
    pub fn read_header_line<S: ByteSource>(
        &self,
        headers: &mut Headers,
        src: &mut S,
        offset: usize,
    ) -> Result<Option<usize>, H1Error> {
        let lf = src.fill_until(offset, b'\n')?;
        if lf == offset || src.peek(lf - 1) != b'\r' {
            return Err(H1Error::InvalidRequest);
        }
        let line_len = lf - offset;
        if line_len == 1 {
            return Ok(None);
        }
        // "f:\r" is the shortest field line.
        if line_len < 3 {
            return Err(H1Error::InvalidRequest);
        }

        let (name, mut value) = {
            let line = src.slice(offset, line_len - 1);
            let mut colon = None;
            for (i, byte) in line.iter().enumerate() {
                if *byte == b':' {
                    colon = Some(i);
                    break;
                }
                // Covers SP and HTAB before the colon, the smuggling vector
                // RFC 7230 section 3.2.4 exists for.
                if !is_token_char(*byte) {
                    return Err(H1Error::InvalidRequest);
                }
            }
            let colon = match colon {
                Some(0) | None => return Err(H1Error::InvalidRequest),
                Some(at) => at,
            };
            let name = line[..colon].to_ascii_lowercase();
            let value = trim_ows(&line[colon + 1..]).to_vec();
            (name, value)
        };

        let mut end = lf + 1;
        loop {
            src.fill(end + 1)?;
            let next = src.peek(end);
            if next != b' ' && next != b'\t' {
                break;
            }
            let cont_lf = src.fill_until(end, b'\n')?;
            if src.peek(cont_lf - 1) != b'\r' {
                return Err(H1Error::InvalidRequest);
            }
            {
                let continuation = src.slice(end, cont_lf - end - 1);
                value.push(b' ');
                value.extend_from_slice(trim_ows(continuation));
            }
            end = cont_lf + 1;
        }

        // The line slices carry no LF, so any CR left in the folded value
        // is bare.
        if has_bare_cr(&value) {
            return Err(H1Error::InvalidRequest);
        }

        let name = if name == b"host" {
            pseudo::AUTHORITY.to_string()
        } else {
            String::from_utf8(name).map_err(|_| H1Error::InvalidRequest)?
        };
        headers.append_owned(name, value, false);
        Ok(Some(end))
    }

    /// Reads field lines until the terminal empty line, bounding the entry
    /// count by `limits.max_headers`. Returns the offset past the
    /// terminating CRLF. A source that ends mid-block is a malformed head,
    /// not a clean close.
    pub fn read_header_block<S: ByteSource>(
        &self,
        headers: &mut Headers,
        src: &mut S,
        offset: usize,
    ) -> Result<usize, H1Error> {
        let mut offset = offset;
        loop {
            match self.read_header_line(headers, src, offset) {
                Ok(Some(next)) => {
                    if headers.len() > self.limits.max_headers {
                        return Err(H1Error::TooManyHeaders);
                    }
                    offset = next;
                }
                Ok(None) => {
                    // Start-line pseudo-headers count toward the bound even
                    // when no field line followed them.
                    if headers.len() > self.limits.max_headers {
                        return Err(H1Error::TooManyHeaders);
                    }
                    return Ok(offset + 2);
                }
                Err(H1Error::EndOfStream) => return Err(H1Error::InvalidRequest),
                Err(error) => return Err(error),
            }
        }
    }

    /// Emits `METHOD SP TARGET SP HTTP/<ver> CRLF`. Client role only; the
    /// parts must be free of request-line delimiters, which is asserted
    /// because a violation is header injection, not a recoverable error.
    pub fn write_request_line<W: Write>(
        &self,
        method: &[u8],
        target: &[u8],
        sink: &mut W,
    ) -> io::Result<()> {
        debug_assert!(self.role == Role::Client, "clients write request lines");
        assert!(
            !method.iter().any(|byte| matches!(byte, b' ' | b'\r' | b'\n')),
            "method must not contain SP, CR, or LF"
        );
        assert!(
            !target.iter().any(|byte| matches!(byte, b' ' | b'\r' | b'\n')),
            "target must not contain SP, CR, or LF"
        );
        sink.write_all(method)?;
        sink.write_all(b" ")?;
        sink.write_all(target)?;
        write!(sink, " HTTP/{}\r\n", self.version.as_str())
    }

    /// Emits `HTTP/<ver> SP SSS SP reason CRLF`. Server role only.
    pub fn write_status_line<W: Write>(
        &self,
        status: &[u8],
        reason: &[u8],
        sink: &mut W,
    ) -> io::Result<()> {
        debug_assert!(self.role == Role::Server, "servers write status lines");
        assert!(
            status.len() == 3 && status.iter().all(|byte| byte.is_ascii_digit()),
            "status must be exactly three ASCII digits"
        );
        assert!(
            !reason.iter().any(|byte| matches!(byte, b'\r' | b'\n')),
            "reason must not contain CR or LF"
        );
        write!(sink, "HTTP/{} ", self.version.as_str())?;
        sink.write_all(status)?;
        sink.write_all(b" ")?;
        sink.write_all(reason)?;
        sink.write_all(b"\r\n")
    }

    /// Emits `name: value CRLF`. An LF inside the value is only legal as a
    /// preserved obs-fold, i.e. when followed by SP or HTAB.
    pub fn write_header_line<W: Write>(
        &self,
        name: &[u8],
        value: &[u8],
        sink: &mut W,
    ) -> io::Result<()> {
        assert!(
            !name.iter().any(|byte| matches!(byte, b':' | b'\r' | b'\n')),
            "field name must not contain colon, CR, or LF"
        );
        assert!(
            valid_obs_fold(value),
            "LF in a field value must be followed by SP or HTAB"
        );
        assert!(
            !has_bare_cr(value),
            "CR in a field value must be followed by LF"
        );
        sink.write_all(name)?;
        sink.write_all(b": ")?;
        sink.write_all(value)?;
        sink.write_all(b"\r\n")
    }

    /// Emits the bare CRLF terminating a header block.
    pub fn write_headers_done<W: Write>(&self, sink: &mut W) -> io::Result<()> {
        sink.write_all(b"\r\n")
    }
}

pub(crate) fn trim_ows(mut bytes: &[u8]) -> &[u8] {
    while let [b' ' | b'\t', rest @ ..] = bytes {
        bytes = rest;
    }
    while let [rest @ .., b' ' | b'\t'] = bytes {
        bytes = rest;
    }
    bytes
}

fn valid_obs_fold(value: &[u8]) -> bool {
    for (i, byte) in value.iter().enumerate() {
        if *byte == b'\n' && !matches!(value.get(i + 1), Some(b' ') | Some(b'\t')) {
            return false;
        }
    }
    true
}

// A CR not immediately followed by LF: raw on the wire it reads as a line
// terminator to sloppy peers, which is the request-splitting primitive.
fn has_bare_cr(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .enumerate()
        .any(|(i, byte)| *byte == b'\r' && bytes.get(i + 1) != Some(&b'\n'))
}
