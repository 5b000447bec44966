//! Typed decoding of cluster error replies.
//!
//! - `MOVED <slot> <host>:<port>` - slot owner changed
//! - `ASK <slot> <host>:<port>` - slot is migrating
//! - `CLUSTERDOWN ...` - cluster cannot serve requests

use crate::Error;

/// Converts the text of an error reply into an [`Error`].
pub fn parse_redis_error(reply: &[u8]) -> Error {
    let text = String::from_utf8_lossy(reply);
    let text = text.trim();

    if let Some(rest) = text.strip_prefix("MOVED ") {
        if let Some((slot, address)) = parse_redirect(rest) {
            return Error::Moved { slot, address };
        }
    }
    if let Some(rest) = text.strip_prefix("ASK ") {
        if let Some((slot, address)) = parse_redirect(rest) {
            return Error::Ask { slot, address };
        }
    }
    if let Some(rest) = text.strip_prefix("CLUSTERDOWN") {
        return Error::ClusterDown {
            message: rest.trim().to_string(),
        };
    }

    Error::Server {
        message: text.to_string(),
    }
}

/// Parses `"<slot> <address>"`.
fn parse_redirect(args: &str) -> Option<(u16, String)> {
    let mut parts = args.split_whitespace();
    let slot = parts.next()?.parse().ok()?;
    let address = parts.next()?.to_string();
    if parts.next().is_some() {
        return None;
    }
    Some((slot, address))
}
