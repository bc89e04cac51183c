//! Blocking request/response client with message-id correlation.

use std::io::{BufReader, ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::message::{Message, read_message, write_message};

/// Default per-call deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// msgpack-RPC client over any bidirectional byte stream.
///
/// Calls are strictly sequential: [`Client::call`] writes one request and
/// reads until the response carrying the same id arrives, skipping
/// notifications, stale responses and server-initiated requests on the way.
#[derive(Debug)]
pub struct Client<S> {
    stream: BufReader<S>,
    next_id: u32,
    timeout: Duration,
}

impl<S: Read + Write> Client<S> {
    /// Wraps `stream` with the given per-call deadline.
    ///
    /// The deadline only bounds how long the client keeps skipping
    /// unrelated messages; individual reads block until the stream's own
    /// read timeout (if any) fires.
    pub fn new(stream: S, timeout: Duration) -> Self {
        Self {
            stream: BufReader::new(stream),
            next_id: 1,
            timeout,
        }
    }

    /// Calls `method` with positional `params` and returns its result.
    ///
    /// # Errors
    ///
    /// - [`Error::Remote`] if the peer answered with an error
    /// - [`Error::Timeout`] if no matching response arrived in time
    /// - [`Error::Disconnected`] if the peer closed the connection
    /// - [`Error::Decode`] / [`Error::Protocol`] for malformed messages
    pub fn call(&mut self, method: &str, params: Vec<Value>) -> Result<Value> {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);

        let request = Message::Request {
            id,
            method: method.to_string(),
            params,
        };
        write_message(self.stream.get_mut(), &request)?;
        debug!(id, method, "sent request");

        let deadline = Instant::now() + self.timeout;
        loop {
            if Instant::now() >= deadline {
                return Err(Error::Timeout {
                    method: method.to_string(),
                });
            }

            match read_message(&mut self.stream).map_err(|err| classify(err, method))? {
                Message::Response {
                    id: response_id,
                    error,
                    result,
                } if response_id == id => {
                    return match error {
                        Some(error) => Err(Error::Remote {
                            method: method.to_string(),
                            message: remote_message(&error),
                        }),
                        None => Ok(result),
                    };
                }
                Message::Response { id: other, .. } => {
                    debug!(expected = id, got = other, "skipping stale response");
                }
                Message::Notification { method: event, .. } => {
                    debug!(event, "skipping notification");
                }
                Message::Request { method: inbound, .. } => {
                    debug!(method = inbound, "ignoring request from peer");
                }
            }
        }
    }

    /// Runs a Lua chunk via `nvim_exec_lua` and returns its value.
    ///
    /// # Errors
    ///
    /// Same as [`Client::call`].
    pub fn exec_lua(&mut self, code: &str, args: Vec<Value>) -> Result<Value> {
        self.call(
            "nvim_exec_lua",
            vec![Value::String(code.to_string()), Value::Array(args)],
        )
    }

    /// Queries the channel id and version via `nvim_get_api_info`.
    ///
    /// # Errors
    ///
    /// Same as [`Client::call`], plus [`Error::Protocol`] or
    /// [`Error::Json`] if the answer is not shaped as expected.
    pub fn api_info(&mut self) -> Result<ApiInfo> {
        let value = self.call("nvim_get_api_info", Vec::new())?;
        ApiInfo::from_value(value)
    }
}

/// Maps read failures caused by timeouts and EOF to dedicated variants.
fn classify(err: Error, method: &str) -> Error {
    let io_kind = match &err {
        Error::Decode(
            rmp_serde::decode::Error::InvalidMarkerRead(io)
            | rmp_serde::decode::Error::InvalidDataRead(io),
        ) => Some(io.kind()),
        Error::Io(io) => Some(io.kind()),
        _ => None,
    };

    match io_kind {
        Some(ErrorKind::WouldBlock | ErrorKind::TimedOut) => Error::Timeout {
            method: method.to_string(),
        },
        Some(ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset | ErrorKind::BrokenPipe) => {
            Error::Disconnected
        }
        _ => err,
    }
}

/// Neovim reports errors as `[type, message]`.
fn remote_message(error: &Value) -> String {
    match error {
        Value::Array(parts) => match parts.get(1) {
            Some(Value::String(message)) => message.clone(),
            _ => error.to_string(),
        },
        Value::String(message) => message.clone(),
        other => other.to_string(),
    }
}

/// Neovim version as reported by `nvim_get_api_info`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[non_exhaustive]
pub struct Version {
    /// Major version.
    pub major: u64,
    /// Minor version.
    pub minor: u64,
    /// Patch version.
    pub patch: u64,
    /// `true` for development builds.
    #[serde(default)]
    pub prerelease: bool,
    /// API level.
    #[serde(default)]
    pub api_level: u64,
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if self.prerelease {
            write!(f, "-dev")?;
        }
        Ok(())
    }
}

/// Channel id and version metadata of the connected Neovim.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ApiInfo {
    /// Channel id assigned to this connection.
    pub channel_id: u64,
    /// Neovim version.
    pub version: Version,
}

impl ApiInfo {
    fn from_value(value: Value) -> Result<Self> {
        let Value::Array(mut parts) = value else {
            return Err(Error::Protocol(
                "nvim_get_api_info did not return an array".to_string(),
            ));
        };
        if parts.len() != 2 {
            return Err(Error::Protocol(format!(
                "nvim_get_api_info returned {} elements",
                parts.len()
            )));
        }

        let mut metadata = parts.pop().unwrap_or(Value::Null);
        let channel_id = parts
            .pop()
            .as_ref()
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::Protocol("invalid channel id".to_string()))?;
        let version = metadata
            .get_mut("version")
            .map(Value::take)
            .ok_or_else(|| Error::Protocol("api metadata has no version".to_string()))?;
        let version = serde_json::from_value(version)?;

        Ok(Self {
            channel_id,
            version,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::net::UnixStream;
    use std::sync::mpsc;
    use std::thread;

    use serde_json::json;

    use super::*;

    /// Reads one request on the server side of the pair.
    fn expect_request(stream: &mut UnixStream) -> (u32, String, Vec<Value>) {
        match read_message(stream).unwrap() {
            Message::Request { id, method, params } => (id, method, params),
            other => panic!("expected request, got {other:?}"),
        }
    }

    fn client_pair(timeout: Duration) -> (Client<UnixStream>, UnixStream) {
        let (client, server) = UnixStream::pair().unwrap();
        client
            .set_read_timeout(Some(Duration::from_millis(200)))
            .unwrap();
        (Client::new(client, timeout), server)
    }

    #[test]
    fn call_returns_matching_result() {
        let (mut client, mut server) = client_pair(DEFAULT_TIMEOUT);
        let peer = thread::spawn(move || {
            let (id, method, params) = expect_request(&mut server);
            assert_eq!(method, "nvim_exec_lua");
            assert_eq!(params, vec![json!("return 1 + 1"), json!([])]);
            write_message(
                &mut server,
                &Message::Response {
                    id,
                    error: None,
                    result: json!(2),
                },
            )
            .unwrap();
        });

        let result = client.exec_lua("return 1 + 1", vec![]).unwrap();
        assert_eq!(result, json!(2));
        peer.join().unwrap();
    }

    #[test]
    fn notifications_and_stale_responses_are_skipped() {
        let (mut client, mut server) = client_pair(DEFAULT_TIMEOUT);
        let peer = thread::spawn(move || {
            let (id, _, _) = expect_request(&mut server);
            let noise = [
                Message::Notification {
                    method: "nvim_buf_lines_event".to_string(),
                    params: vec![json!(1)],
                },
                Message::Response {
                    id: id + 100,
                    error: None,
                    result: json!("stale"),
                },
                Message::Request {
                    id: 9,
                    method: "peer_request".to_string(),
                    params: vec![],
                },
                Message::Response {
                    id,
                    error: None,
                    result: json!("fresh"),
                },
            ];
            for message in &noise {
                write_message(&mut server, message).unwrap();
            }
        });

        assert_eq!(client.call("nvim_eval", vec![]).unwrap(), json!("fresh"));
        peer.join().unwrap();
    }

    #[test]
    fn ids_increase_between_calls() {
        let (mut client, mut server) = client_pair(DEFAULT_TIMEOUT);
        let peer = thread::spawn(move || {
            let mut seen = Vec::new();
            for _ in 0..2 {
                let (id, _, _) = expect_request(&mut server);
                seen.push(id);
                write_message(
                    &mut server,
                    &Message::Response {
                        id,
                        error: None,
                        result: Value::Null,
                    },
                )
                .unwrap();
            }
            seen
        });

        client.call("a", vec![]).unwrap();
        client.call("b", vec![]).unwrap();
        let seen = peer.join().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[1] > seen[0]);
    }

    #[test]
    fn remote_error_is_reported() {
        let (mut client, mut server) = client_pair(DEFAULT_TIMEOUT);
        let peer = thread::spawn(move || {
            let (id, _, _) = expect_request(&mut server);
            write_message(
                &mut server,
                &Message::Response {
                    id,
                    error: Some(json!([1, "Invalid method: nvim_nope"])),
                    result: Value::Null,
                },
            )
            .unwrap();
        });

        let err = client.call("nvim_nope", vec![]).unwrap_err();
        match err {
            Error::Remote { method, message } => {
                assert_eq!(method, "nvim_nope");
                assert_eq!(message, "Invalid method: nvim_nope");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        peer.join().unwrap();
    }

    #[test]
    fn silent_peer_times_out() {
        let (mut client, mut server) = client_pair(Duration::from_millis(100));
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let peer = thread::spawn(move || {
            let _ = expect_request(&mut server);
            // hold the connection open until the client gave up
            let _ = done_rx.recv();
        });

        let err = client.call("nvim_get_api_info", vec![]).unwrap_err();
        assert!(matches!(err, Error::Timeout { ref method } if method == "nvim_get_api_info"));
        done_tx.send(()).unwrap();
        peer.join().unwrap();
    }

    #[test]
    fn closed_peer_is_disconnected() {
        let (mut client, mut server) = client_pair(DEFAULT_TIMEOUT);
        let peer = thread::spawn(move || {
            let _ = expect_request(&mut server);
            drop(server);
        });

        let err = client.call("nvim_get_api_info", vec![]).unwrap_err();
        assert!(matches!(err, Error::Disconnected));
        peer.join().unwrap();
    }

    #[test]
    fn api_info_parses_version() {
        let (mut client, mut server) = client_pair(DEFAULT_TIMEOUT);
        let peer = thread::spawn(move || {
            let (id, method, _) = expect_request(&mut server);
            assert_eq!(method, "nvim_get_api_info");
            write_message(
                &mut server,
                &Message::Response {
                    id,
                    error: None,
                    result: json!([
                        3,
                        {
                            "version": {
                                "major": 0,
                                "minor": 10,
                                "patch": 2,
                                "api_level": 12,
                                "prerelease": false
                            },
                            "functions": []
                        }
                    ]),
                },
            )
            .unwrap();
        });

        let info = client.api_info().unwrap();
        assert_eq!(info.channel_id, 3);
        assert_eq!(info.version.to_string(), "0.10.2");
        assert_eq!(info.version.api_level, 12);
        peer.join().unwrap();
    }

    #[test]
    fn prerelease_version_has_dev_suffix() {
        let version: Version =
            serde_json::from_value(json!({"major": 0, "minor": 11, "patch": 0, "prerelease": true}))
                .unwrap();
        assert_eq!(version.to_string(), "0.11.0-dev");
    }
}
