//! # Control connection
//!
//! Owns the TCP stream to the command port. Commands are written as CRLF-terminated lines
//! and replies are assembled by [`crate::response::read_response`].

use std::io::{self, BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};

use crate::command::Command;
use crate::deadline::{io_error, Deadline};
use crate::proxy::ProxyInfo;
use crate::response::read_response;
use crate::status::Status;
use crate::types::{FtpError, FtpResult, Response};

#[derive(Debug)]
pub(crate) struct ControlConnection {
    reader: BufReader<TcpStream>,
}

impl ControlConnection {
    /// Connect to `host:port`, directly or through `proxy`.
    /// The greeting is not read here.
    pub fn open(
        host: &str,
        port: u16,
        proxy: Option<&ProxyInfo>,
        deadline: &Deadline,
    ) -> FtpResult<Self> {
        let stream = match proxy {
            Some(proxy) => {
                let mut stream = connect_any(proxy.host(), proxy.port(), deadline)?;
                proxy.establish_tunnel(&mut stream, host, port, deadline)?;
                stream
            }
            None => connect_any(host, port, deadline)?,
        };
        stream.set_nodelay(true).map_err(FtpError::ConnectionError)?;
        debug!(
            "Control connection established with {}",
            stream
                .peer_addr()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| format!("{host}:{port}"))
        );
        Ok(Self {
            reader: BufReader::new(stream),
        })
    }

    /// Write `command` to the server
    pub fn send(&mut self, command: &Command, deadline: &Deadline) -> FtpResult<()> {
        command.check_argument()?;
        trace!("CC OUT: {}", command.redacted());
        let stream = self.reader.get_mut();
        stream
            .set_write_timeout(Some(deadline.remaining()?))
            .map_err(FtpError::ConnectionError)?;
        stream
            .write_all(command.to_line().as_bytes())
            .and_then(|_| stream.flush())
            .map_err(io_error)
    }

    /// Read the next reply, whatever its code
    pub fn read_reply(&mut self, deadline: &Deadline) -> FtpResult<Response> {
        self.reader
            .get_ref()
            .set_read_timeout(Some(deadline.remaining()?))
            .map_err(FtpError::ConnectionError)?;
        read_response(&mut self.reader).map_err(|err| match err {
            FtpError::ConnectionError(err) => io_error(err),
            err => err,
        })
    }

    /// Read the next reply and check its code is in `expected`
    pub fn expect(&mut self, expected: &[Status], deadline: &Deadline) -> FtpResult<Response> {
        let response = self.read_reply(deadline)?;
        check_reply(response, expected)
    }

    /// Send `command` and check the reply code is in `expected`
    pub fn execute(
        &mut self,
        command: &Command,
        expected: &[Status],
        deadline: &Deadline,
    ) -> FtpResult<Response> {
        self.send(command, deadline)?;
        self.expect(expected, deadline)
    }

    pub fn local_addr(&self) -> FtpResult<SocketAddr> {
        self.reader
            .get_ref()
            .local_addr()
            .map_err(FtpError::ConnectionError)
    }

    /// Close the socket
    pub fn close(self) {
        if let Err(err) = self.reader.get_ref().shutdown(Shutdown::Both) {
            debug!("Control connection shutdown failed: {err}");
        }
        debug!("Control connection closed");
    }
}

/// Match a reply against the codes an exchange expects.
///
/// Refusals (4xx, 5xx) are recoverable, except 421 which means the server is hanging up.
/// Any other code is out of sequence.
pub(crate) fn check_reply(response: Response, expected: &[Status]) -> FtpResult<Response> {
    if expected.iter().any(|status| status.code() == response.code()) {
        return Ok(response);
    }
    if response.status() == Status::NotAvailable {
        return Err(FtpError::ServiceClosing(response));
    }
    if response.class().is_negative() {
        return Err(FtpError::Rejected(response));
    }
    Err(FtpError::UnexpectedResponse(response))
}

/// Try each resolved address in turn, returning the last failure
fn connect_any(host: &str, port: u16, deadline: &Deadline) -> FtpResult<TcpStream> {
    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(FtpError::ConnectionError)?;
    let mut last_error = None;
    for addr in addrs {
        trace!("Connecting to {addr}");
        match TcpStream::connect_timeout(&addr, deadline.remaining()?) {
            Ok(stream) => return Ok(stream),
            Err(err) => {
                debug!("Connection to {addr} failed: {err}");
                last_error = Some(err);
            }
        }
    }
    Err(io_error(last_error.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("{host} did not resolve to any address"),
        )
    })))
}

#[cfg(test)]
mod test {

    use std::io::{BufRead, BufReader as StdBufReader};
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;

    fn response(code: u32) -> Response {
        Response::new(code, vec![format!("{code} text")])
    }

    #[test]
    fn should_check_reply_codes() {
        assert!(check_reply(response(250), &[Status::RequestedFileActionOk]).is_ok());
        let err = check_reply(response(550), &[Status::RequestedFileActionOk])
            .err()
            .unwrap();
        assert!(matches!(err, FtpError::Rejected(_)));
        assert_eq!(err.is_fatal(), false);
        assert!(matches!(
            check_reply(response(421), &[Status::CommandOk]).err().unwrap(),
            FtpError::ServiceClosing(_)
        ));
        let err = check_reply(response(150), &[Status::CommandOk]).err().unwrap();
        assert!(matches!(err, FtpError::UnexpectedResponse(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn should_send_command_lines_and_read_replies() {
        crate::log_init();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut writer = stream.try_clone().unwrap();
            let mut reader = StdBufReader::new(stream);
            writer.write_all(b"220 hello\r\n").unwrap();
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            writer.write_all(b"200 noop ok\r\n").unwrap();
            line
        });
        let deadline = Deadline::after(Duration::from_secs(10));
        let mut control = ControlConnection::open("127.0.0.1", port, None, &deadline).unwrap();
        assert_eq!(
            control
                .expect(&[Status::Ready], &deadline)
                .unwrap()
                .text()
                .as_str(),
            "hello"
        );
        assert_eq!(
            control
                .execute(&Command::Noop, &[Status::CommandOk], &deadline)
                .unwrap()
                .code(),
            200
        );
        assert_eq!(server.join().unwrap().as_str(), "NOOP\r\n");
        control.close();
    }

    #[test]
    fn should_time_out_reading_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_millis(800));
            drop(stream);
        });
        let deadline = Deadline::after(Duration::from_millis(300));
        let mut control = ControlConnection::open("127.0.0.1", port, None, &deadline).unwrap();
        assert!(matches!(
            control.read_reply(&deadline).err().unwrap(),
            FtpError::Timeout
        ));
        server.join().unwrap();
    }

    #[test]
    fn should_fail_connecting_to_closed_port() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let deadline = Deadline::after(Duration::from_secs(5));
        let err = ControlConnection::open("127.0.0.1", port, None, &deadline)
            .err()
            .unwrap();
        assert!(err.is_fatal());
    }
}
