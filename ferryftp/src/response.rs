//! # Response
//!
//! Assembles the lines read from the control connection into a [`Response`].
//!
//! A reply is either a single line `"<code> text"` or a multi-line block opened by
//! `"<code>-text"` and closed by the first line starting with `"<code> "`.
//! Lines in between are kept verbatim, even when they begin with digits.

use std::io::{self, BufRead};

use crate::types::{FtpError, FtpResult, Response};

/// Read one complete reply from `reader`.
///
/// I/O errors are returned as [`FtpError::ConnectionError`] with their original kind,
/// so the caller can tell a read timeout from a broken socket.
pub fn read_response<R: BufRead>(reader: &mut R) -> FtpResult<Response> {
    let first = match read_line(reader)? {
        Some(line) => line,
        None => {
            return Err(FtpError::ConnectionError(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "control connection closed by server",
            )))
        }
    };
    trace!("CC IN: {:?}", first);
    let code = parse_code(&first)?;

    let multiline = match first.as_bytes().get(3) {
        None | Some(b' ') => false,
        Some(b'-') => true,
        Some(other) => {
            return Err(FtpError::BadResponse(format!(
                "unexpected separator {:?} after reply code",
                *other as char
            )))
        }
    };

    let mut lines = vec![first];
    if multiline {
        let terminator = format!("{code:03} ");
        let bare_terminator = format!("{code:03}");
        loop {
            let line = read_line(reader)?.ok_or_else(|| {
                FtpError::BadResponse(format!(
                    "connection closed before the end of the {code} reply"
                ))
            })?;
            trace!("CC IN: {:?}", line);
            let done = line.starts_with(terminator.as_str()) || line == bare_terminator;
            lines.push(line);
            if done {
                break;
            }
        }
    }

    Ok(Response::new(code, lines))
}

/// Read a line up to `\n`, stripping the line terminator. Returns `None` on EOF.
fn read_line<R: BufRead>(reader: &mut R) -> FtpResult<Option<String>> {
    let mut buf = Vec::new();
    let read = reader
        .read_until(b'\n', &mut buf)
        .map_err(FtpError::ConnectionError)?;
    if read == 0 {
        return Ok(None);
    }
    if buf.ends_with(b"\n") {
        buf.pop();
    }
    if buf.ends_with(b"\r") {
        buf.pop();
    }
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

/// Get the three-digit code at the start of `line`
fn parse_code(line: &str) -> FtpResult<u32> {
    let digits = line
        .get(0..3)
        .filter(|code| code.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| FtpError::BadResponse(format!("reply doesn't start with a code: {line:?}")))?;
    digits
        .parse::<u32>()
        .map_err(|_| FtpError::BadResponse(format!("invalid reply code: {digits:?}")))
}
