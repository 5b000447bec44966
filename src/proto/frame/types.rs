use bytes::Bytes;

/// A single RESP2 value as sent or received on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Status reply (`+OK`).
    Simple(Bytes),
    /// Error reply (`-ERR ...`).
    Error(Bytes),
    /// Integer reply (`:1`).
    Integer(i64),
    /// Binary-safe string (`$5\r\nhello`).
    Bulk(Bytes),
    /// Array of nested frames (`*2\r\n...`).
    Array(Vec<Frame>),
    /// Null bulk string or null array (`$-1`, `*-1`).
    Null,
}

impl Frame {
    /// Builds a bulk frame from anything convertible to [`Bytes`].
    pub fn bulk(data: impl Into<Bytes>) -> Self {
        Frame::Bulk(data.into())
    }

    /// Returns the payload of a simple or bulk string.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Frame::Simple(b) | Frame::Bulk(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the payload as UTF-8 text, replacing invalid sequences.
    pub fn to_text(&self) -> Option<String> {
        self.as_bytes()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }

    /// Returns the integer value if this is an integer frame.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Frame::Integer(n) => Some(*n),
            _ => None,
        }
    }
}
