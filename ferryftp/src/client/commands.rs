//! # Commands
//!
//! One function per logical operation. Each function runs the whole exchange over the
//! control connection, opening a data connection when the operation needs one.

use std::io::{self, Read, Write};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::control::{check_reply, ControlConnection};
use super::data_stream::{self, DataStream, TRANSFER_COMPLETE};
use super::session::Session;
use crate::command::Command;
use crate::deadline::{io_error, Deadline};
use crate::list::{self, DirectoryItem};
use crate::proxy::ProxyInfo;
use crate::regex::{MDTM_RE, QUOTED_NAME_RE, SIZE_RE, STOU_FILE_RE, STOU_UNIQUE_RE};
use crate::status::Status;
use crate::types::{FileType, FtpError, FtpResult, Mode, Response};

/// What a data transfer needs besides the control connection
#[derive(Debug)]
pub(crate) struct DataChannel<'a> {
    pub mode: Mode,
    pub session: &'a Arc<Session>,
}

/// Outcome of a data transfer
struct Transfer<T> {
    value: T,
    preliminary: Response,
    completion: Response,
}

/// Open the control connection and read the greeting
pub(crate) fn connect(
    host: &str,
    port: u16,
    proxy: Option<&ProxyInfo>,
    deadline: &Deadline,
) -> FtpResult<(ControlConnection, Response)> {
    debug!("Connecting to {host}:{port}");
    let mut control = ControlConnection::open(host, port, proxy, deadline)?;
    loop {
        let greeting = control.expect(&[Status::ReadyMinute, Status::Ready], deadline)?;
        if greeting.status() == Status::Ready {
            debug!("Server is ready: {}", greeting);
            return Ok((control, greeting));
        }
        info!("Server not ready yet: {}", greeting);
    }
}

/// `USER`, then `PASS` and `ACCT` when the server asks for them
pub(crate) fn login(
    control: &mut ControlConnection,
    user: &str,
    password: &str,
    account: Option<&str>,
    deadline: &Deadline,
) -> FtpResult<()> {
    debug!("Signing in with user '{user}'");
    Command::Pass(password.to_string()).check_argument()?;
    if let Some(account) = account {
        Command::Acct(account.to_string()).check_argument()?;
    }
    let mut reply = control.execute(
        &Command::User(user.to_string()),
        &[Status::LoggedIn, Status::NeedPassword, Status::LoginNeedAccount],
        deadline,
    )?;
    if reply.status() == Status::NeedPassword {
        debug!("Password is required");
        reply = control.execute(
            &Command::Pass(password.to_string()),
            &[Status::LoggedIn, Status::CommandNotImplemented, Status::LoginNeedAccount],
            deadline,
        )?;
    }
    if reply.status() == Status::LoginNeedAccount {
        let account = account.ok_or(FtpError::AccountRequired(reply))?;
        debug!("Account is required");
        control.execute(
            &Command::Acct(account.to_string()),
            &[Status::LoggedIn, Status::CommandNotImplemented],
            deadline,
        )?;
    }
    debug!("Login OK");
    Ok(())
}

/// Set the representation type for the next transfers
pub(crate) fn transfer_type(
    control: &mut ControlConnection,
    file_type: FileType,
    deadline: &Deadline,
) -> FtpResult<()> {
    debug!("Setting transfer type {}", file_type);
    control
        .execute(&Command::Type(file_type), &[Status::CommandOk], deadline)
        .map(|_| ())
}

/// `LIST` the given path and resolve the body into directory items
pub(crate) fn get_directory_list(
    control: &mut ControlConnection,
    channel: &DataChannel<'_>,
    path: Option<&str>,
    deadline: &Deadline,
) -> FtpResult<Vec<DirectoryItem>> {
    debug!("Reading {} directory content", path.unwrap_or("working"));
    let command = Command::List(path.map(String::from));
    command.check_argument()?;
    transfer_type(control, FileType::Ascii, deadline)?;
    let transfer = run_transfer(control, channel, command, deadline, read_body)?;
    let body = String::from_utf8_lossy(&transfer.value);
    let items: Vec<DirectoryItem> = list::resolve(&body).collect();
    debug!("Resolved {} directory items", items.len());
    Ok(items)
}

/// `NLST` the given path
pub(crate) fn name_list(
    control: &mut ControlConnection,
    channel: &DataChannel<'_>,
    path: Option<&str>,
    deadline: &Deadline,
) -> FtpResult<Vec<String>> {
    debug!("Getting file names for {} directory", path.unwrap_or("working"));
    let command = Command::Nlst(path.map(String::from));
    command.check_argument()?;
    transfer_type(control, FileType::Ascii, deadline)?;
    let transfer = run_transfer(control, channel, command, deadline, read_body)?;
    Ok(String::from_utf8_lossy(&transfer.value)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(String::from)
        .collect())
}

/// `RETR` the file at `path` into `sink`, from `offset` when resuming.
/// Returns the amount of bytes written.
pub(crate) fn get_file(
    control: &mut ControlConnection,
    channel: &DataChannel<'_>,
    path: &str,
    offset: Option<u64>,
    sink: &mut dyn Write,
    deadline: &Deadline,
) -> FtpResult<u64> {
    debug!("Retrieving '{path}'");
    let command = Command::Retr(path.to_string());
    command.check_argument()?;
    transfer_type(control, FileType::Binary, deadline)?;
    if let Some(offset) = offset {
        restart_at(control, offset, deadline)?;
    }
    let transfer = run_transfer(control, channel, command, deadline, |stream| {
        io::copy(stream, sink)
    })?;
    debug!("Retrieved {} bytes", transfer.value);
    Ok(transfer.value)
}

/// `STOR` the content of `source` at `path`. Returns the amount of bytes sent.
pub(crate) fn put_file(
    control: &mut ControlConnection,
    channel: &DataChannel<'_>,
    path: &str,
    source: &mut dyn Read,
    deadline: &Deadline,
) -> FtpResult<u64> {
    debug!("Storing '{path}'");
    let command = Command::Store(path.to_string());
    command.check_argument()?;
    transfer_type(control, FileType::Binary, deadline)?;
    let transfer = run_transfer(control, channel, command, deadline, |stream| {
        send_body(source, stream)
    })?;
    debug!("Stored {} bytes", transfer.value);
    Ok(transfer.value)
}

/// `STOU` the content of `source`; returns the name the server chose
pub(crate) fn put_file_unique(
    control: &mut ControlConnection,
    channel: &DataChannel<'_>,
    hint: &str,
    source: &mut dyn Read,
    deadline: &Deadline,
) -> FtpResult<String> {
    debug!("Storing unique file (hint: '{hint}')");
    let command = Command::StoreUnique(Some(hint.to_string()).filter(|hint| !hint.is_empty()));
    command.check_argument()?;
    transfer_type(control, FileType::Binary, deadline)?;
    let transfer = run_transfer(control, channel, command, deadline, |stream| {
        send_body(source, stream)
    })?;
    let name = unique_name(&transfer.preliminary)
        .or_else(|| unique_name(&transfer.completion))
        .ok_or_else(|| {
            FtpError::BadResponse(format!(
                "no file name in STOU replies: {} / {}",
                transfer.preliminary, transfer.completion
            ))
        })?;
    debug!("Stored {} bytes as '{name}'", transfer.value);
    Ok(name)
}

/// `RNFR` then `RNTO`; nothing is sent after a refused `RNFR`
pub(crate) fn rename(
    control: &mut ControlConnection,
    from: &str,
    to: &str,
    deadline: &Deadline,
) -> FtpResult<()> {
    debug!("Renaming '{from}' to '{to}'");
    let rename_to = Command::RenameTo(to.to_string());
    rename_to.check_argument()?;
    control.execute(
        &Command::RenameFrom(from.to_string()),
        &[Status::RequestFilePending],
        deadline,
    )?;
    control
        .execute(&rename_to, &[Status::RequestedFileActionOk], deadline)
        .map(|_| ())
}

/// Removes the remote file
pub(crate) fn delete_file(
    control: &mut ControlConnection,
    path: &str,
    deadline: &Deadline,
) -> FtpResult<()> {
    debug!("Removing file {path}");
    control
        .execute(
            &Command::Dele(path.to_string()),
            &[Status::RequestedFileActionOk],
            deadline,
        )
        .map(|_| ())
}

pub(crate) fn cwd(control: &mut ControlConnection, path: &str, deadline: &Deadline) -> FtpResult<()> {
    debug!("Changing working directory to {path}");
    control
        .execute(
            &Command::Cwd(path.to_string()),
            &[Status::RequestedFileActionOk],
            deadline,
        )
        .map(|_| ())
}

pub(crate) fn cdup(control: &mut ControlConnection, deadline: &Deadline) -> FtpResult<()> {
    debug!("Going to parent directory");
    control
        .execute(
            &Command::Cdup,
            &[Status::CommandOk, Status::RequestedFileActionOk],
            deadline,
        )
        .map(|_| ())
}

/// Gets the current directory
pub(crate) fn pwd(control: &mut ControlConnection, deadline: &Deadline) -> FtpResult<String> {
    debug!("Getting working directory");
    let response = control.execute(&Command::Pwd, &[Status::PathCreated], deadline)?;
    let body = response.text();
    match (body.find('"'), body.rfind('"')) {
        (Some(begin), Some(end)) if begin < end => Ok(body[begin + 1..end].replace("\"\"", "\"")),
        _ => Err(FtpError::UnexpectedResponse(response)),
    }
}

pub(crate) fn mkdir(control: &mut ControlConnection, path: &str, deadline: &Deadline) -> FtpResult<()> {
    debug!("Creating directory at {path}");
    control
        .execute(&Command::Mkd(path.to_string()), &[Status::PathCreated], deadline)
        .map(|_| ())
}

pub(crate) fn rmdir(control: &mut ControlConnection, path: &str, deadline: &Deadline) -> FtpResult<()> {
    debug!("Removing directory {path}");
    control
        .execute(
            &Command::Rmd(path.to_string()),
            &[Status::RequestedFileActionOk],
            deadline,
        )
        .map(|_| ())
}

/// This does nothing. This is usually just used to keep the connection open.
pub(crate) fn noop(control: &mut ControlConnection, deadline: &Deadline) -> FtpResult<()> {
    debug!("Pinging server");
    control
        .execute(&Command::Noop, &[Status::CommandOk], deadline)
        .map(|_| ())
}

/// Retrieves the size of the file in bytes at `path`
pub(crate) fn size(control: &mut ControlConnection, path: &str, deadline: &Deadline) -> FtpResult<u64> {
    debug!("Getting file size for {path}");
    let response = control.execute(&Command::Size(path.to_string()), &[Status::File], deadline)?;
    let body = response.text();
    SIZE_RE
        .captures(body.trim_end())
        .and_then(|caps| caps[1].parse::<u64>().ok())
        .ok_or(FtpError::UnexpectedResponse(response))
}

/// Retrieves the modification time of the file at `path`
pub(crate) fn mdtm(
    control: &mut ControlConnection,
    path: &str,
    deadline: &Deadline,
) -> FtpResult<NaiveDateTime> {
    debug!("Getting modification time for {path}");
    let response = control.execute(&Command::Mdtm(path.to_string()), &[Status::File], deadline)?;
    parse_mdtm(&response.text()).ok_or(FtpError::UnexpectedResponse(response))
}

/// `QUIT`; the caller closes the connection whatever the outcome
pub(crate) fn quit(control: &mut ControlConnection, deadline: &Deadline) -> FtpResult<()> {
    debug!("Quitting stream");
    control
        .execute(&Command::Quit, &[Status::Closing], deadline)
        .map(|_| ())
}

// -- private

/// Send `REST`; a refusal means the server can't resume transfers
fn restart_at(control: &mut ControlConnection, offset: u64, deadline: &Deadline) -> FtpResult<()> {
    debug!("Restarting transfer at offset {offset}");
    match control.execute(&Command::Rest(offset), &[Status::RequestFilePending], deadline) {
        Ok(_) => Ok(()),
        Err(FtpError::Rejected(response)) => Err(FtpError::RestartNotSupported(response)),
        Err(err) => Err(err),
    }
}

/// Run a data transfer for `command`, handing the data stream to `body`.
///
/// When an abort was requested the transfer is cancelled with `ABOR` and
/// [`FtpError::Aborted`] is returned, whatever `body` reported.
fn run_transfer<T, F>(
    control: &mut ControlConnection,
    channel: &DataChannel<'_>,
    command: Command,
    deadline: &Deadline,
    body: F,
) -> FtpResult<Transfer<T>>
where
    F: FnOnce(&mut DataStream) -> io::Result<T>,
{
    let guard = channel.session.begin_transfer();
    let opened = data_stream::open(control, channel.mode, command, &guard, deadline);
    if guard.is_abort_requested() {
        data_stream::abort(control);
        return Err(FtpError::Aborted);
    }
    let (mut stream, preliminary) = opened?;
    let outcome = body(&mut stream);
    // closing the data connection ends uploads
    drop(stream);
    if guard.is_abort_requested() {
        data_stream::abort(control);
        return Err(FtpError::Aborted);
    }
    let value = match outcome {
        Ok(value) => value,
        Err(err) => {
            error!("Data transfer failed: {err}");
            return Err(transfer_failure(control, deadline, err));
        }
    };
    let completion = control.expect(TRANSFER_COMPLETE, deadline)?;
    trace!("Transfer completed: {}", completion);
    Ok(Transfer {
        value,
        preliminary,
        completion,
    })
}

/// Error of a data transfer broken on the data socket. The server may have refused the
/// transfer and closed the data connection, in which case its negative reply is returned.
fn transfer_failure(
    control: &mut ControlConnection,
    deadline: &Deadline,
    err: io::Error,
) -> FtpError {
    let err = io_error(err);
    if matches!(err, FtpError::Timeout) {
        return err;
    }
    match control.read_reply(deadline) {
        Ok(reply) if reply.class().is_negative() => {
            debug!("Transfer refused by server: {reply}");
            check_reply(reply, &[]).err().unwrap_or(err)
        }
        Ok(reply) => {
            debug!("Unexpected reply after a broken transfer: {reply}");
            err
        }
        Err(read_err) => {
            debug!("No reply after a broken transfer: {read_err}");
            err
        }
    }
}

fn read_body(stream: &mut DataStream) -> io::Result<Vec<u8>> {
    let mut body = Vec::new();
    stream.read_to_end(&mut body)?;
    Ok(body)
}

fn send_body(source: &mut dyn Read, stream: &mut DataStream) -> io::Result<u64> {
    let written = io::copy(source, stream)?;
    stream.flush()?;
    Ok(written)
}

/// Name assigned by the server in a `STOU` reply
fn unique_name(response: &Response) -> Option<String> {
    let text = response.text();
    text.lines().find_map(|line| {
        STOU_FILE_RE
            .captures(line)
            .or_else(|| STOU_UNIQUE_RE.captures(line))
            .map(|caps| caps[1].to_string())
            .or_else(|| {
                QUOTED_NAME_RE.captures(line).and_then(|caps| {
                    caps.get(1)
                        .or_else(|| caps.get(2))
                        .map(|name| name.as_str().to_string())
                })
            })
    })
}

/// Parse a `YYYYMMDDhhmmss` timestamp
fn parse_mdtm(body: &str) -> Option<NaiveDateTime> {
    let caps = MDTM_RE.captures(body)?;
    let date = NaiveDate::from_ymd_opt(
        caps[1].parse::<i32>().ok()?,
        caps[2].parse::<u32>().ok()?,
        caps[3].parse::<u32>().ok()?,
    )?;
    let time = NaiveTime::from_hms_opt(
        caps[4].parse::<u32>().ok()?,
        caps[5].parse::<u32>().ok()?,
        caps[6].parse::<u32>().ok()?,
    )?;
    Some(NaiveDateTime::new(date, time))
}

#[cfg(test)]
mod test {

    use pretty_assertions::assert_eq;

    use super::*;

    fn response(code: u32, line: &str) -> Response {
        Response::new(code, vec![line.to_string()])
    }

    #[test]
    fn should_extract_unique_name() {
        assert_eq!(
            unique_name(&response(150, "150 FILE: upload.txt.1")).as_deref(),
            Some("upload.txt.1")
        );
        assert_eq!(
            unique_name(&response(
                226,
                "226 Transfer complete (unique file name:ftp4x2Ab)."
            ))
            .as_deref(),
            Some("ftp4x2Ab")
        );
        assert_eq!(
            unique_name(&response(
                150,
                "150 Opening BINARY mode data connection for 'data.bin.2'."
            ))
            .as_deref(),
            Some("data.bin.2")
        );
        assert_eq!(
            unique_name(&response(150, "150 Ok to send data.")),
            None
        );
    }

    #[test]
    fn should_parse_mdtm() {
        assert_eq!(
            parse_mdtm("20230201111632").unwrap(),
            NaiveDate::from_ymd_opt(2023, 2, 1)
                .unwrap()
                .and_hms_opt(11, 16, 32)
                .unwrap()
        );
        assert!(parse_mdtm("20231301111632").is_none());
        assert!(parse_mdtm("yesterday").is_none());
    }
}
