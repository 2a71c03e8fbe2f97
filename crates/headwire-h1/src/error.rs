use std::io;

use thiserror::Error;

/// Fatal outcomes of reading or writing an HTTP/1 head.
///
/// Every parse-side variant poisons the exchange: the caller must close the
/// connection without retrying, since resynchronizing after a malformed head
/// is exactly the opening request smuggling needs.
#[derive(Debug, Error)]
pub enum H1Error {
    /// Malformed bytes anywhere in the head: missing CR, non-token name
    /// character, whitespace before the colon, bad version digit, empty
    /// method or target, truncated block.
    #[error("malformed HTTP/1 message head")]
    InvalidRequest,
    /// The peer declared HTTP/1.1 on a connection pinned to HTTP/1.0.
    #[error("peer HTTP version exceeds the connection version")]
    VersionMismatch,
    /// The head carried more fields than the configured bound.
    #[error("header count exceeded the configured limit")]
    TooManyHeaders,
    /// The source closed cleanly before a full line arrived. Surfaced only
    /// at the start-line boundary so the caller can tell "no request ever
    /// arrived" from "malformed request"; inside a header block it is
    /// promoted to [`H1Error::InvalidRequest`].
    #[error("byte source ended before the message head completed")]
    EndOfStream,
    /// The head outgrew the buffered source's fill limit.
    #[error("message head exceeded the configured size limit")]
    HeadTooLarge,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Failures of the buffered byte source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("byte source reached end of stream")]
    EndOfStream,
    #[error("byte source fill limit exceeded")]
    LimitExceeded,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<SourceError> for H1Error {
    fn from(error: SourceError) -> Self {
        match error {
            SourceError::EndOfStream => Self::EndOfStream,
            SourceError::LimitExceeded => Self::HeadTooLarge,
            SourceError::Io(inner) => Self::Io(inner),
        }
    }
}
