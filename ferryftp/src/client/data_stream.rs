//! # Data Stream
//!
//! Negotiation of the data connection, in passive or active mode, and the stream
//! where bytes must be written to/read from.

use std::io::{self, Read, Write};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use super::control::{check_reply, ControlConnection};
use super::session::TransferGuard;
use crate::command::Command;
use crate::deadline::{io_error, Deadline};
use crate::regex::PASV_PORT_RE;
use crate::status::Status;
use crate::types::{FtpError, FtpResult, Mode, Response};

/// Interval between two `accept` attempts in active mode
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Time given to the server to answer `ABOR`
const ABORT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Replies announcing the data connection is open
pub(crate) const TRANSFER_STARTING: &[Status] = &[Status::AboutToSend, Status::AlreadyOpen];
/// Replies closing a successful transfer
pub(crate) const TRANSFER_COMPLETE: &[Status] =
    &[Status::ClosingDataConnection, Status::RequestedFileActionOk];

/// Data connection of a single transfer. Every read or write is bounded by the
/// deadline of the operation that opened it.
#[derive(Debug)]
pub(crate) struct DataStream {
    stream: TcpStream,
    deadline: Deadline,
}

impl DataStream {
    fn new(stream: TcpStream, deadline: Deadline) -> Self {
        Self { stream, deadline }
    }
}

impl Read for DataStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream
            .set_read_timeout(Some(self.deadline.remaining_io()?))?;
        self.stream.read(buf)
    }
}

impl Write for DataStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream
            .set_write_timeout(Some(self.deadline.remaining_io()?))?;
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

/// Open the data connection for `command`, send it and read the preliminary reply.
pub(crate) fn open(
    control: &mut ControlConnection,
    mode: Mode,
    command: Command,
    guard: &TransferGuard,
    deadline: &Deadline,
) -> FtpResult<(DataStream, Response)> {
    match mode {
        Mode::Passive => open_passive(control, command, guard, deadline),
        Mode::Active => open_active(control, command, guard, deadline),
    }
}

fn open_passive(
    control: &mut ControlConnection,
    command: Command,
    guard: &TransferGuard,
    deadline: &Deadline,
) -> FtpResult<(DataStream, Response)> {
    debug!("PASV command");
    let response = control.execute(&Command::Pasv, &[Status::PassiveMode], deadline)?;
    let addr = parse_passive_address(&response)?;
    trace!("Passive address: {addr}");
    control.send(&command, deadline)?;
    let stream = match TcpStream::connect_timeout(&addr, deadline.remaining()?) {
        Ok(stream) => stream,
        Err(err) => {
            debug!("Failed to connect to data port {addr}: {err}");
            // the server may have refused the command and dropped the listener
            if let Ok(reply) = control.read_reply(deadline) {
                if reply.class().is_negative() {
                    check_reply(reply, TRANSFER_STARTING)?;
                }
            }
            return Err(io_error(err));
        }
    };
    guard.attach(&stream)?;
    let preliminary = control.expect(TRANSFER_STARTING, deadline)?;
    Ok((DataStream::new(stream, *deadline), preliminary))
}

fn open_active(
    control: &mut ControlConnection,
    command: Command,
    guard: &TransferGuard,
    deadline: &Deadline,
) -> FtpResult<(DataStream, Response)> {
    let listener = listen(control, deadline)?;
    control.send(&command, deadline)?;
    let preliminary = control.expect(TRANSFER_STARTING, deadline)?;
    let stream = accept(&listener, guard, deadline)?;
    guard.attach(&stream)?;
    Ok((DataStream::new(stream, *deadline), preliminary))
}

/// Create a new tcp listener on the control connection's local address and send a PORT command for it
fn listen(control: &mut ControlConnection, deadline: &Deadline) -> FtpResult<TcpListener> {
    debug!("Starting local tcp listener...");
    let ip = match control.local_addr()?.ip() {
        IpAddr::V4(ip) => ip,
        IpAddr::V6(ip) => ip.to_ipv4_mapped().ok_or_else(|| {
            FtpError::ConnectionError(io::Error::new(
                io::ErrorKind::Unsupported,
                "active mode requires an IPv4 control connection",
            ))
        })?,
    };
    let listener =
        TcpListener::bind(SocketAddr::new(IpAddr::V4(ip), 0)).map_err(FtpError::ConnectionError)?;
    listener
        .set_nonblocking(true)
        .map_err(FtpError::ConnectionError)?;
    let port = listener
        .local_addr()
        .map_err(FtpError::ConnectionError)?
        .port();
    debug!("Active mode, listening on {}:{}", ip, port);

    control.execute(
        &Command::Port(port_argument(ip, port)),
        &[Status::CommandOk],
        deadline,
    )?;
    Ok(listener)
}

/// Wait for the server to connect back, polling until the deadline
fn accept(
    listener: &TcpListener,
    guard: &TransferGuard,
    deadline: &Deadline,
) -> FtpResult<TcpStream> {
    loop {
        match listener.accept() {
            Ok((stream, peer)) => {
                trace!("Accepted data connection from {peer}");
                stream
                    .set_nonblocking(false)
                    .map_err(FtpError::ConnectionError)?;
                return Ok(stream);
            }
            Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => {
                if guard.is_abort_requested() {
                    return Err(FtpError::Aborted);
                }
                let left = deadline.remaining()?;
                thread::sleep(left.min(ACCEPT_POLL_INTERVAL));
            }
            Err(err) => return Err(FtpError::ConnectionError(err)),
        }
    }
}

/// `h1,h2,h3,h4,p1,p2` argument of `PORT`
fn port_argument(ip: Ipv4Addr, port: u16) -> String {
    let [h1, h2, h3, h4] = ip.octets();
    format!("{},{},{},{},{},{}", h1, h2, h3, h4, port >> 8, port & 0xff)
}

/// Parse the address of a `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2)` reply
pub(crate) fn parse_passive_address(response: &Response) -> FtpResult<SocketAddr> {
    let text = response.text();
    let bad_reply = || FtpError::UnexpectedResponse(response.clone());
    let caps = PASV_PORT_RE.captures(&text).ok_or_else(bad_reply)?;
    let mut fields = [0u8; 6];
    for (idx, field) in fields.iter_mut().enumerate() {
        *field = caps[idx + 1].parse::<u8>().map_err(|_| bad_reply())?;
    }
    let [h1, h2, h3, h4, msb, lsb] = fields;
    let ip = Ipv4Addr::new(h1, h2, h3, h4);
    let port = (u16::from(msb) << 8) | u16::from(lsb);
    Ok(SocketAddr::new(ip.into(), port))
}

/// Send `ABOR` and drain the replies of the aborted transfer (426 then 226, or just 226).
/// Failures are logged only; the caller drops the session anyway.
pub(crate) fn abort(control: &mut ControlConnection) {
    let deadline = Deadline::after(ABORT_DRAIN_TIMEOUT);
    if let Err(err) = control.send(&Command::Abor, &deadline) {
        warn!("Failed to send ABOR: {err}");
        return;
    }
    for _ in 0..2 {
        match control.read_reply(&deadline) {
            Ok(reply) if reply.status() == Status::TransferAborted => {
                debug!("Transfer aborted by server: {reply}");
            }
            Ok(reply) => {
                debug!("ABOR completed: {reply}");
                return;
            }
            Err(FtpError::Timeout) => {
                warn!("Server did not answer ABOR in time");
                return;
            }
            Err(err) => {
                warn!("Failed to read ABOR reply: {err}");
                return;
            }
        }
    }
}

#[cfg(test)]
mod test {

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn should_parse_passive_address_from_response() {
        let response = Response::new(
            227,
            vec!["227 Entering Passive Mode (127,0,0,1,200,10)".to_string()],
        );
        assert_eq!(
            parse_passive_address(&response).unwrap(),
            "127.0.0.1:51210".parse::<SocketAddr>().unwrap()
        );
        let response = Response::new(
            227,
            vec!["227 Entering Passive Mode (213,229,112,130,216,4)".to_string()],
        );
        assert_eq!(
            parse_passive_address(&response).unwrap(),
            "213.229.112.130:55300".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn should_reject_bad_passive_address() {
        for text in [
            "227 Entering Passive Mode",
            "227 Entering Passive Mode (256,0,0,1,4,1)",
            "227 Entering Passive Mode (10,0,0,1,4,300)",
        ] {
            let response = Response::new(227, vec![text.to_string()]);
            let err = parse_passive_address(&response).err().unwrap();
            assert!(matches!(err, FtpError::UnexpectedResponse(_)));
            assert!(err.is_fatal());
        }
    }

    #[test]
    fn should_format_port_argument() {
        assert_eq!(
            port_argument(Ipv4Addr::new(192, 168, 1, 10), 51210).as_str(),
            "192,168,1,10,200,10"
        );
        assert_eq!(port_argument(Ipv4Addr::LOCALHOST, 21).as_str(), "127,0,0,1,0,21");
    }
}
