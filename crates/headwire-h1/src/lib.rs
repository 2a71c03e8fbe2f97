//! HTTP/1.x head framing over buffered byte sources.
//!
//! Requests and responses are normalized into the pseudo-header
//! representation carried by [`Headers`]: `:method`, `:path`, `:authority`,
//! `:scheme`, `:status` travel through the same ordered multimap as wire
//! fields. The [`Connection`] owns the line-level parsers and writers, a
//! [`Stream`] drives them for one exchange, and everything reads through the
//! [`ByteSource`] contract so a head is only consumed once it has fully
//! validated.

mod body;
mod conn;
mod error;
mod source;
mod stream;

pub use body::{connection_close, request_body_mode, response_body_mode, BodyMode};
pub use conn::{Connection, Limits, Role, Version};
pub use error::{H1Error, SourceError};
pub use source::{BufferedSource, ByteSource, DEFAULT_MAX_HEAD_BYTES};
pub use stream::{Stream, StreamState};

pub use headwire_headers::{pseudo, AmbiguousField, HeaderEntry, Headers};
