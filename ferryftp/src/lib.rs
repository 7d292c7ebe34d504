#![crate_name = "ferryftp"]
#![crate_type = "lib"]

//! # ferryftp
//!
//! ferryftp is a blocking FTP (RFC 959) client engine. It takes care of the split
//! control/data connection model of the protocol and gives the host application:
//!
//! - Passive (`PASV`) and active (`PORT`) data connections
//! - A wall-clock timeout on every operation, covering each protocol step it performs
//! - Cancellation of a running transfer from another thread, through an [`AbortHandle`]
//! - A parser for the **LIST** command output, for both POSIX and MS-DOS servers
//! - Errors which tell whether the session is still usable ([`ErrorKind`])
//! - Optional tunnelling of the control connection through an HTTP proxy
//!
//! ## Get started
//!
//! To get started, first add **ferryftp** to your dependencies:
//!
//! ```toml
//! ferryftp = "^0.4"
//! ```
//!
//! ## Usage
//!
//! Here is a basic usage example:
//!
//! ```rust,no_run
//! use std::io::Cursor;
//! use std::time::Duration;
//!
//! use ferryftp::{FtpClient, FtpError};
//!
//! let timeout = Duration::from_secs(30);
//! let mut client = FtpClient::new();
//! client.connect(timeout, "127.0.0.1", 21).unwrap();
//! client.login(timeout, "test", "test").unwrap();
//!
//! let mut reader = Cursor::new("hello, world!".as_bytes());
//! client.put_file(timeout, "hello.txt", &mut reader).unwrap();
//! match client.get_file(timeout, "missing.txt") {
//!     Err(err) if !err.is_fatal() => println!("refused: {err}"),
//!     Err(err) => panic!("session is gone: {err}"),
//!     Ok(data) => println!("got {} bytes", data.len()),
//! }
//!
//! // Disconnect from server
//! assert!(client.disconnect(timeout).is_ok());
//! ```
//!
//! ## Aborting a transfer
//!
//! ```rust,no_run
//! use std::thread;
//! use std::time::Duration;
//!
//! use ferryftp::FtpClient;
//!
//! let timeout = Duration::from_secs(300);
//! let mut client = FtpClient::new();
//! client.connect(timeout, "127.0.0.1", 21).unwrap();
//! client.login(timeout, "test", "test").unwrap();
//! let handle = client.abort_handle();
//! thread::spawn(move || {
//!     thread::sleep(Duration::from_secs(5));
//!     let _ = handle.abort();
//! });
//! // fails with FtpError::Aborted if the download takes more than 5 seconds
//! let _ = client.get_file(timeout, "huge.iso");
//! ```
//!

// -- common deps
#[macro_use]
extern crate lazy_regex;
#[macro_use]
extern crate log;

// -- private
mod client;
pub(crate) mod command;
mod deadline;
mod regex;
mod response;
mod status;
#[cfg(test)]
mod test_server;

// -- public
pub mod list;
pub mod proxy;
pub mod types;

// -- export
pub use client::{AbortHandle, FtpClient, DEFAULT_PORT};
pub use list::{DirectoryItem, ItemKind};
pub use proxy::{ProxyCredentials, ProxyInfo};
pub use status::{ReplyClass, Status};
pub use types::{ErrorKind, FileType, FtpError, FtpResult, Mode, Response, SessionState};

// -- test logging
#[cfg(test)]
pub fn log_init() {
    let _ = env_logger::builder().is_test(true).try_init();
}
