//! # Deadline
//!
//! Wall-clock budget of one public operation. The budget is fixed when the operation
//! starts and every blocking step (connect, accept, read, write) draws from it.

use std::io;
use std::time::{Duration, Instant};

use crate::types::{FtpError, FtpResult};

#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires_at: Instant,
}

impl Deadline {
    /// Deadline expiring `budget` from now
    pub fn after(budget: Duration) -> Self {
        Self {
            expires_at: Instant::now() + budget,
        }
    }

    /// Time left; [`FtpError::Timeout`] once expired
    pub fn remaining(&self) -> FtpResult<Duration> {
        self.remaining_io().map_err(|_| FtpError::Timeout)
    }

    /// Same as [`Deadline::remaining`] but with an I/O error, for use inside `Read`/`Write` impls
    pub fn remaining_io(&self) -> io::Result<Duration> {
        match self.expires_at.checked_duration_since(Instant::now()) {
            Some(left) if !left.is_zero() => Ok(left),
            _ => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "operation deadline expired",
            )),
        }
    }
}

/// Whether `err` is the outcome of a socket timeout
pub fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

/// Convert an I/O error into the matching [`FtpError`]
pub fn io_error(err: io::Error) -> FtpError {
    if is_timeout(&err) {
        FtpError::Timeout
    } else {
        FtpError::ConnectionError(err)
    }
}
