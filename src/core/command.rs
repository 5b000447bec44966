use bytes::Bytes;

use crate::proto::frame::Frame;
use crate::{Error, Result};

/// A command ready to be sent to a node.
///
/// # Example
///
/// ```ignore
/// let cmd = Cmd::new("SET").arg("test:hello").arg("Redis Cluster Works!");
/// ```
#[derive(Debug, Clone)]
pub struct Cmd {
    args: Vec<Bytes>,
}

impl Cmd {
    /// Creates a command with the given name.
    #[inline]
    pub fn new(name: impl Into<Bytes>) -> Self {
        Self {
            args: vec![name.into()],
        }
    }

    /// Appends an argument.
    #[inline]
    pub fn arg(mut self, arg: impl Into<Bytes>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Command name, upper-cased as given.
    pub fn name(&self) -> String {
        String::from_utf8_lossy(&self.args[0]).into_owned()
    }

    /// Converts the command to a RESP array of bulk strings.
    #[inline]
    pub fn into_frame(self) -> Frame {
        Frame::Array(self.args.into_iter().map(Frame::Bulk).collect())
    }
}

/// `PING`
#[inline]
pub fn ping() -> Cmd {
    Cmd::new("PING")
}

/// `CLUSTER INFO`
#[inline]
pub fn cluster_info() -> Cmd {
    Cmd::new("CLUSTER").arg("INFO")
}

/// `CLUSTER SLOTS`, used for topology discovery.
#[inline]
pub fn cluster_slots() -> Cmd {
    Cmd::new("CLUSTER").arg("SLOTS")
}

/// `ASKING`, sent before retrying a command after an ASK redirect.
#[inline]
pub fn asking() -> Cmd {
    Cmd::new("ASKING")
}

/// `AUTH [username] password`
#[inline]
pub fn auth(username: Option<&str>, password: &str) -> Cmd {
    let cmd = Cmd::new("AUTH");
    let cmd = match username {
        Some(user) => cmd.arg(user.to_string()),
        None => cmd,
    };
    cmd.arg(password.to_string())
}

/// `GET key`
#[inline]
pub fn get(key: impl Into<Bytes>) -> Cmd {
    Cmd::new("GET").arg(key)
}

/// `SET key value`
#[inline]
pub fn set(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Cmd {
    Cmd::new("SET").arg(key).arg(value)
}

/// `DEL key`
#[inline]
pub fn del(key: impl Into<Bytes>) -> Cmd {
    Cmd::new("DEL").arg(key)
}

/// Accepts a `+OK` style status reply.
pub fn expect_status(frame: Frame) -> Result<Bytes> {
    match frame {
        Frame::Simple(s) => Ok(s),
        other => Err(unexpected("status", &other)),
    }
}

/// Accepts a bulk or null reply.
pub fn expect_bulk(frame: Frame) -> Result<Option<Bytes>> {
    match frame {
        Frame::Bulk(b) => Ok(Some(b)),
        Frame::Null => Ok(None),
        other => Err(unexpected("bulk string", &other)),
    }
}

/// Accepts an integer reply.
pub fn expect_integer(frame: Frame) -> Result<i64> {
    match frame {
        Frame::Integer(n) => Ok(n),
        other => Err(unexpected("integer", &other)),
    }
}

fn unexpected(wanted: &str, got: &Frame) -> Error {
    Error::Protocol {
        message: format!("expected {wanted} reply, got {got:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(cmd: Cmd) -> Vec<Frame> {
        match cmd.into_frame() {
            Frame::Array(items) => items,
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn test_cluster_info_cmd() {
        assert_eq!(
            args(cluster_info()),
            vec![Frame::bulk("CLUSTER"), Frame::bulk("INFO")]
        );
    }

    #[test]
    fn test_auth_with_and_without_username() {
        assert_eq!(
            args(auth(None, "secret")),
            vec![Frame::bulk("AUTH"), Frame::bulk("secret")]
        );
        assert_eq!(
            args(auth(Some("probe"), "secret")),
            vec![Frame::bulk("AUTH"), Frame::bulk("probe"), Frame::bulk("secret")]
        );
    }

    #[test]
    fn test_set_cmd() {
        assert_eq!(
            args(set("test:hello", "Redis Cluster Works!")),
            vec![
                Frame::bulk("SET"),
                Frame::bulk("test:hello"),
                Frame::bulk("Redis Cluster Works!")
            ]
        );
    }

    #[test]
    fn test_name() {
        assert_eq!(del("k").name(), "DEL");
    }

    #[test]
    fn test_expect_helpers() {
        assert_eq!(
            expect_status(Frame::Simple(Bytes::from_static(b"OK"))).unwrap(),
            Bytes::from_static(b"OK")
        );
        assert_eq!(expect_bulk(Frame::Null).unwrap(), None);
        assert_eq!(expect_integer(Frame::Integer(1)).unwrap(), 1);
        assert!(matches!(
            expect_integer(Frame::Null),
            Err(Error::Protocol { .. })
        ));
    }
}
