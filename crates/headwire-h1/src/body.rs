use headwire_headers::{pseudo, Headers};

use crate::conn::{trim_ows, Version};
use crate::error::H1Error;

/// How the message body after a head is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    None,
    ContentLength(u64),
    Chunked,
    CloseDelimited,
}

/// Classifies a request body from its parsed head. `Transfer-Encoding:
/// chunked` wins over `Content-Length`; anything ambiguous about either
/// field is rejected outright rather than guessed at, since disagreement
/// between two framing signals is the request-smuggling primitive.
pub fn request_body_mode(headers: &Headers) -> Result<BodyMode, H1Error> {
    if chunked_transfer_encoding(headers)? {
        return Ok(BodyMode::Chunked);
    }
    if let Some(length) = content_length(headers)? {
        return Ok(if length == 0 {
            BodyMode::None
        } else {
            BodyMode::ContentLength(length)
        });
    }
    Ok(BodyMode::None)
}

/// Classifies a response body from its parsed head and the request method
/// it answers. Reads `:status` from the head itself.
pub fn response_body_mode(headers: &Headers, request_method: &[u8]) -> Result<BodyMode, H1Error> {
    let status = headers
        .get_only(pseudo::STATUS)
        .map_err(|_| H1Error::InvalidRequest)?
        .ok_or(H1Error::InvalidRequest)?;
    let code = parse_status_code(&status.value)?;

    if request_method.eq_ignore_ascii_case(b"HEAD")
        || (100..200).contains(&code)
        || code == 204
        || code == 304
    {
        return Ok(BodyMode::None);
    }

    if chunked_transfer_encoding(headers)? {
        return Ok(BodyMode::Chunked);
    }
    if let Some(length) = content_length(headers)? {
        return Ok(if length == 0 {
            BodyMode::None
        } else {
            BodyMode::ContentLength(length)
        });
    }
    Ok(BodyMode::CloseDelimited)
}

/// Whether the peer will close the connection after this exchange:
/// an explicit `Connection: close`, or HTTP/1.0 without `keep-alive`.
pub fn connection_close(version: Version, headers: &Headers) -> bool {
    if has_field_token(headers, "connection", b"close") {
        return true;
    }
    version == Version::Http10 && !has_field_token(headers, "connection", b"keep-alive")
}

fn parse_status_code(value: &[u8]) -> Result<u16, H1Error> {
    if value.len() != 3 || !value.iter().all(|byte| byte.is_ascii_digit()) {
        return Err(H1Error::InvalidRequest);
    }
    let mut code = 0_u16;
    for byte in value {
        code = code * 10 + u16::from(byte - b'0');
    }
    Ok(code)
}

fn content_length(headers: &Headers) -> Result<Option<u64>, H1Error> {
    let mut length = None;
    for entry in headers.values("content-length") {
        for member in entry.value.split(|byte| *byte == b',') {
            let member = trim_ows(member);
            if member.is_empty() || !member.iter().all(|byte| byte.is_ascii_digit()) {
                return Err(H1Error::InvalidRequest);
            }
            let parsed = std::str::from_utf8(member)
                .ok()
                .and_then(|text| text.parse::<u64>().ok())
                .ok_or(H1Error::InvalidRequest)?;
            match length {
                Some(existing) if existing != parsed => return Err(H1Error::InvalidRequest),
                _ => length = Some(parsed),
            }
        }
    }
    Ok(length)
}

fn chunked_transfer_encoding(headers: &Headers) -> Result<bool, H1Error> {
    let mut chunked = false;
    for entry in headers.values("transfer-encoding") {
        for coding in entry.value.split(|byte| *byte == b',') {
            let token = trim_ows(
                coding
                    .split(|byte| *byte == b';')
                    .next()
                    .unwrap_or_default(),
            );
            if token.is_empty() {
                return Err(H1Error::InvalidRequest);
            }
            if token.eq_ignore_ascii_case(b"chunked") {
                // chunked may appear once, and only as the final coding.
                if chunked {
                    return Err(H1Error::InvalidRequest);
                }
                chunked = true;
                continue;
            }
            return Err(H1Error::InvalidRequest);
        }
    }
    Ok(chunked)
}

fn has_field_token(headers: &Headers, name: &str, token: &[u8]) -> bool {
    headers
        .values(name)
        .flat_map(|entry| entry.value.split(|byte| *byte == b','))
        .any(|member| trim_ows(member).eq_ignore_ascii_case(token))
}
