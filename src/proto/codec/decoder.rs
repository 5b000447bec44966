use bytes::{Buf, Bytes, BytesMut};

use crate::proto::error::{Error, Result};
use crate::proto::frame::Frame;

const DEFAULT_MAX_FRAME_SIZE: usize = 512 * 1024 * 1024;

/// Incremental RESP2 decoder.
///
/// Bytes are fed in with [`append`](Decoder::append) as they arrive from the
/// socket. [`decode`](Decoder::decode) only consumes input once a complete
/// frame is buffered, so a frame split across reads is never half-consumed.
#[derive(Debug)]
pub struct Decoder {
    buf: BytesMut,
    max_frame_size: usize,
}

impl Decoder {
    /// Creates a decoder with the default 512 MiB frame limit.
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Creates a decoder that rejects frames larger than `max_frame_size`.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            max_frame_size,
        }
    }

    /// Appends raw bytes read from the network.
    pub fn append(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    #[cfg(test)]
    fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Decodes the next complete frame.
    ///
    /// Returns `Ok(None)` when more input is needed.
    pub fn decode(&mut self) -> Result<Option<Frame>> {
        if self.buf.is_empty() {
            return Ok(None);
        }

        match parse(&self.buf, 0, self.max_frame_size)? {
            Some((frame, end)) => {
                self.buf.advance(end);
                Ok(Some(frame))
            }
            None if self.buf.len() > self.max_frame_size => Err(Error::Protocol {
                message: "buffered frame exceeds maximum frame size".to_string(),
            }),
            None => Ok(None),
        }
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses one frame starting at `pos`, returning it with the offset just past it.
fn parse(buf: &[u8], pos: usize, max: usize) -> Result<Option<(Frame, usize)>> {
    let Some(&tag) = buf.get(pos) else {
        return Ok(None);
    };
    let Some(line_end) = find_crlf(buf, pos + 1) else {
        return Ok(None);
    };
    let line = &buf[pos + 1..line_end];
    let next = line_end + 2;

    let frame = match tag {
        b'+' => Frame::Simple(Bytes::copy_from_slice(line)),
        b'-' => Frame::Error(Bytes::copy_from_slice(line)),
        b':' => Frame::Integer(parse_int(line)?),
        b'$' => {
            let Some(len) = parse_len(line, max, "bulk string")? else {
                return Ok(Some((Frame::Null, next)));
            };
            let end = next + len;
            if buf.len() < end + 2 {
                return Ok(None);
            }
            if &buf[end..end + 2] != b"\r\n" {
                return Err(Error::Protocol {
                    message: "bulk string not terminated by CRLF".to_string(),
                });
            }
            return Ok(Some((Frame::Bulk(Bytes::copy_from_slice(&buf[next..end])), end + 2)));
        }
        b'*' => {
            let Some(len) = parse_len(line, max, "array")? else {
                return Ok(Some((Frame::Null, next)));
            };
            let mut items = Vec::with_capacity(len.min(64));
            let mut cursor = next;
            for _ in 0..len {
                match parse(buf, cursor, max)? {
                    Some((item, end)) => {
                        items.push(item);
                        cursor = end;
                    }
                    None => return Ok(None),
                }
            }
            return Ok(Some((Frame::Array(items), cursor)));
        }
        other => {
            return Err(Error::Protocol {
                message: format!("unknown frame type byte 0x{other:02x}"),
            })
        }
    };

    Ok(Some((frame, next)))
}

fn find_crlf(buf: &[u8], from: usize) -> Option<usize> {
    buf[from..]
        .windows(2)
        .position(|w| w == b"\r\n")
        .map(|i| from + i)
}

fn parse_int(line: &[u8]) -> Result<i64> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| Error::Protocol {
            message: format!("invalid integer {:?}", String::from_utf8_lossy(line)),
        })
}

/// `None` means a null (`-1`) length.
fn parse_len(line: &[u8], max: usize, what: &str) -> Result<Option<usize>> {
    match parse_int(line)? {
        -1 => Ok(None),
        n if n < 0 => Err(Error::Protocol {
            message: format!("negative {what} length {n}"),
        }),
        n if n as u64 > max as u64 => Err(Error::Protocol {
            message: format!("{what} length {n} exceeds maximum frame size"),
        }),
        n => Ok(Some(n as usize)),
    }
}
