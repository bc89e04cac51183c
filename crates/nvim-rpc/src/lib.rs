//! Minimal blocking msgpack-RPC client for talking to a running Neovim.
//!
//! ```no_run
//! use std::time::Duration;
//! use nvim_rpc::{Address, connect};
//!
//! let mut client = connect(&Address::parse("/tmp/nvim.sock"), Duration::from_secs(2))?;
//! let info = client.api_info()?;
//! println!("Neovim {}", info.version);
//! # Ok::<(), nvim_rpc::Error>(())
//! ```

mod client;
mod error;
mod message;
mod transport;

pub use client::{ApiInfo, Client, DEFAULT_TIMEOUT, Version};
pub use error::{Error, Result};
pub use message::{Message, read_message, write_message};
pub use transport::{Address, Stream, connect};
