//! Server addresses and the streams used to reach them.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
#[cfg(unix)]
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::client::Client;
use crate::error::{Error, Result};

/// Where a Neovim server listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// Unix domain socket path.
    Unix(PathBuf),
    /// `host:port` TCP address.
    Tcp(String),
}

impl Address {
    /// Interprets an address as passed to `nvim --listen` or found in `$NVIM`.
    ///
    /// Anything that exists on disk, starts with a path separator or `.`, or
    /// has no `:` is a socket path; everything else is `host:port`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let path = Path::new(raw);
        let looks_like_path = raw.starts_with('/') || raw.starts_with('.') || path.exists();
        if looks_like_path || !raw.contains(':') {
            Self::Unix(path.to_path_buf())
        } else {
            Self::Tcp(raw.to_string())
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "{}", path.display()),
            Self::Tcp(addr) => f.write_str(addr),
        }
    }
}

/// A connected socket of either kind.
#[derive(Debug)]
pub enum Stream {
    /// Unix domain socket.
    #[cfg(unix)]
    Unix(UnixStream),
    /// TCP socket.
    Tcp(TcpStream),
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            #[cfg(unix)]
            Self::Unix(stream) => stream.read(buf),
            Self::Tcp(stream) => stream.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            #[cfg(unix)]
            Self::Unix(stream) => stream.write(buf),
            Self::Tcp(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            #[cfg(unix)]
            Self::Unix(stream) => stream.flush(),
            Self::Tcp(stream) => stream.flush(),
        }
    }
}

/// Connects to `address`, applying `timeout` to the connect (TCP only), to
/// every read and write, and to each call.
///
/// # Errors
///
/// Returns [`Error::Io`] if the connection cannot be established and
/// [`Error::Unsupported`] for Unix sockets on non-Unix platforms.
pub fn connect(address: &Address, timeout: Duration) -> Result<Client<Stream>> {
    debug!(%address, ?timeout, "connecting to nvim");
    let stream = match address {
        Address::Unix(path) => connect_unix(path, timeout)?,
        Address::Tcp(addr) => {
            let socket_addr = addr.to_socket_addrs()?.next().ok_or_else(|| {
                Error::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{addr} did not resolve"),
                ))
            })?;
            let stream = TcpStream::connect_timeout(&socket_addr, timeout)?;
            stream.set_read_timeout(Some(timeout))?;
            stream.set_write_timeout(Some(timeout))?;
            Stream::Tcp(stream)
        }
    };
    Ok(Client::new(stream, timeout))
}

#[cfg(unix)]
fn connect_unix(path: &Path, timeout: Duration) -> Result<Stream> {
    let stream = UnixStream::connect(path)?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;
    Ok(Stream::Unix(stream))
}

#[cfg(not(unix))]
fn connect_unix(path: &Path, _timeout: Duration) -> Result<Stream> {
    Err(Error::Unsupported(format!(
        "unix socket {} on this platform",
        path.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_path_is_unix() {
        assert_eq!(
            Address::parse("/run/user/1000/nvim.123.0"),
            Address::Unix(PathBuf::from("/run/user/1000/nvim.123.0"))
        );
    }

    #[test]
    fn host_port_is_tcp() {
        assert_eq!(
            Address::parse("127.0.0.1:6666"),
            Address::Tcp("127.0.0.1:6666".to_string())
        );
        assert_eq!(
            Address::parse("localhost:7777"),
            Address::Tcp("localhost:7777".to_string())
        );
    }

    #[test]
    fn bare_name_is_unix() {
        assert_eq!(
            Address::parse("nvim.sock"),
            Address::Unix(PathBuf::from("nvim.sock"))
        );
    }

    #[test]
    fn display_matches_input() {
        assert_eq!(Address::parse("/tmp/nvim.sock").to_string(), "/tmp/nvim.sock");
        assert_eq!(Address::parse("host:1").to_string(), "host:1");
    }

    #[cfg(unix)]
    #[test]
    fn connect_to_missing_socket_fails() {
        let dir = std::env::temp_dir().join("nvim-rpc-missing-socket-test");
        let err = connect(&Address::Unix(dir.join("nope.sock")), Duration::from_millis(50))
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[cfg(unix)]
    #[test]
    fn connect_to_listening_unix_socket() {
        use std::os::unix::net::UnixListener;

        let path = std::env::temp_dir().join(format!("nvim-rpc-test-{}.sock", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path).unwrap();

        let client = connect(&Address::Unix(path.clone()), Duration::from_millis(50));
        assert!(client.is_ok());
        drop(listener);
        let _ = std::fs::remove_file(&path);
    }
}
