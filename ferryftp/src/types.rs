//! # Types
//!
//! Errors, replies and the other values shared by every layer of the client

use std::fmt;

use thiserror::Error;

use crate::status::{ReplyClass, Status};

/// A shorthand for a Result whose error type is always an FtpError.
pub type FtpResult<T> = std::result::Result<T, FtpError>;

/// `FtpError` is a library-global error type to describe the different kinds of
/// errors that might occur while using FTP.
///
/// Every variant is either [`ErrorKind::Recoverable`], which leaves the session usable,
/// or [`ErrorKind::Fatal`], after which the control connection has been closed and the
/// client must connect again. See [`FtpError::kind`].
#[derive(Debug, Error)]
pub enum FtpError {
    /// The server refused the request (4xx or 5xx reply). The control connection is still usable.
    #[error("Request rejected: {0}")]
    Rejected(Response),
    /// The operation is not allowed in the current session state. Nothing was sent to the server.
    #[error("Invalid session state: operation requires {expected}, session is {actual}")]
    InvalidState {
        expected: SessionState,
        actual: SessionState,
    },
    /// A command argument can't be sent on the control connection (it contains CR or LF).
    /// Nothing was sent to the server.
    #[error("Invalid command argument: {0}")]
    InvalidArgument(String),
    /// Abort was requested while no data transfer was running
    #[error("No data transfer in progress")]
    NoTransferInProgress,
    /// The proxy URL could not be parsed
    #[error("Invalid proxy configuration: {0}")]
    InvalidProxy(String),
    /// Connection error on the control or the data socket
    #[error("Connection error: {0}")]
    ConnectionError(std::io::Error),
    /// The operation did not complete within the given timeout
    #[error("Operation timed out")]
    Timeout,
    /// The transfer was cancelled through an abort request
    #[error("Transfer aborted")]
    Aborted,
    /// The server asked for account information which wasn't provided
    #[error("Server requires account information: {0}")]
    AccountRequired(Response),
    /// The server refused the `REST` command
    #[error("Server doesn't support restarting transfers: {0}")]
    RestartNotSupported(Response),
    /// The server announced it is closing the control connection (421)
    #[error("Service not available: {0}")]
    ServiceClosing(Response),
    /// The server replied with a code which makes no sense at this point of the exchange
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(Response),
    /// The response syntax is invalid
    #[error("Response contains an invalid syntax: {0}")]
    BadResponse(String),
    /// The proxy refused or broke the tunnel
    #[error("Proxy error: {0}")]
    ProxyError(String),
}

/// Tells whether an error leaves the session usable
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request failed but the control connection can be used for other commands
    Recoverable,
    /// The control connection has been closed; a new connection is required
    Fatal,
}

impl FtpError {
    /// Returns whether retrying on the same session makes sense
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Rejected(_)
            | Self::InvalidState { .. }
            | Self::InvalidArgument(_)
            | Self::NoTransferInProgress
            | Self::InvalidProxy(_) => ErrorKind::Recoverable,
            _ => ErrorKind::Fatal,
        }
    }

    /// Shorthand for `kind() == ErrorKind::Fatal`
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Fatal
    }

    /// Server response carried by this error, if any
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Rejected(response)
            | Self::AccountRequired(response)
            | Self::RestartNotSupported(response)
            | Self::ServiceClosing(response)
            | Self::UnexpectedResponse(response) => Some(response),
            _ => None,
        }
    }

    /// Reply code carried by this error, if any
    pub fn code(&self) -> Option<u32> {
        self.response().map(Response::code)
    }
}

/// Defines a response from the ftp server.
///
/// `lines` holds every line of the reply as received, without the line terminator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    code: u32,
    lines: Vec<String>,
}

impl Response {
    /// Instantiates a new `Response`
    pub fn new(code: u32, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// Three-digit reply code
    pub fn code(&self) -> u32 {
        self.code
    }

    /// Reply code as a known [`Status`]
    pub fn status(&self) -> Status {
        Status::from(self.code)
    }

    /// Reply class (first digit of the code)
    pub fn class(&self) -> ReplyClass {
        ReplyClass::of(self.code)
    }

    /// Raw lines of the reply
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Reply text without the code prefixes, lines joined with `\n`
    pub fn text(&self) -> String {
        let code = self.code.to_string();
        self.lines
            .iter()
            .map(|line| match line.strip_prefix(code.as_str()) {
                Some(rest) if rest.is_empty() => "",
                Some(rest) if rest.starts_with([' ', '-']) => &rest[1..],
                _ => line.as_str(),
            })
            .collect::<Vec<&str>>()
            .join("\n")
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.text().trim_end())
    }
}

/// File Type used in `TYPE` command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// ASCII text, non-print format control
    Ascii,
    /// Image (binary) transfer
    Binary,
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileType::Ascii => write!(f, "A N"),
            FileType::Binary => write!(f, "I"),
        }
    }
}

/// Connection mode for data channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// The client listens and sends `PORT`; the server connects back
    Active,
    /// The client sends `PASV` and connects to the address returned by the server
    Passive,
}

/// Lifecycle of an FTP session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SessionState {
    Disconnected,
    Connected,
    Authenticated,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connected => write!(f, "connected"),
            Self::Authenticated => write!(f, "authenticated"),
        }
    }
}
