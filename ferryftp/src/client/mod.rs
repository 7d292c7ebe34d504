//! # Client
//!
//! The [`FtpClient`] facade: one instance is one FTP session.
//!
//! Every operation takes a timeout, measured from the moment the call starts and covering
//! every protocol step of the operation. Operations check the session state before touching
//! the network; a fatal error closes the control connection and brings the session back to
//! [`SessionState::Disconnected`].

mod commands;
mod control;
mod data_stream;
mod session;

use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;

use self::commands::DataChannel;
use self::control::ControlConnection;
use self::session::Session;
// export
pub use self::session::AbortHandle;
use crate::deadline::Deadline;
use crate::list::DirectoryItem;
use crate::proxy::ProxyInfo;
use crate::types::{FtpError, FtpResult, Mode, SessionState};

/// Default FTP command port
pub const DEFAULT_PORT: u16 = 21;

/// Blocking FTP client.
///
/// ```rust,no_run
/// use std::io::Cursor;
/// use std::time::Duration;
/// use ferryftp::FtpClient;
///
/// let timeout = Duration::from_secs(30);
/// let mut client = FtpClient::new();
/// client.connect(timeout, "127.0.0.1", 21).unwrap();
/// client.login(timeout, "test", "test").unwrap();
/// client.put_file(timeout, "hello.txt", &mut Cursor::new(b"hello".to_vec())).unwrap();
/// for item in client.get_directory_list(timeout, None).unwrap() {
///     println!("{} {:?}", item.name(), item.size());
/// }
/// client.disconnect(timeout).unwrap();
/// ```
#[derive(Debug)]
pub struct FtpClient {
    control: Option<ControlConnection>,
    session: Arc<Session>,
    mode: Mode,
    proxy: Option<ProxyInfo>,
    welcome_msg: Option<String>,
}

impl Default for FtpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FtpClient {
    /// A disconnected client, in passive mode and without proxy
    pub fn new() -> Self {
        Self {
            control: None,
            session: Arc::new(Session::new()),
            mode: Mode::Passive,
            proxy: None,
            welcome_msg: None,
        }
    }

    // -- configuration

    /// Enable or disable passive mode; when disabled the client uses active mode (`PORT`)
    pub fn set_passive_mode(&mut self, passive: bool) {
        self.set_mode(if passive { Mode::Passive } else { Mode::Active });
    }

    /// Set the data connection mode
    pub fn set_mode(&mut self, mode: Mode) {
        debug!("Changed mode to {:?}", mode);
        self.mode = mode;
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_passive(&self) -> bool {
        self.mode == Mode::Passive
    }

    /// Set the HTTP proxy used by the next [`FtpClient::connect`]
    pub fn set_proxy(&mut self, proxy: Option<ProxyInfo>) {
        self.proxy = proxy;
    }

    pub fn proxy(&self) -> Option<&ProxyInfo> {
        self.proxy.as_ref()
    }

    // -- session

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Get the greeting sent by the server on connect
    pub fn welcome_message(&self) -> Option<&str> {
        self.welcome_msg.as_deref()
    }

    /// Handle to abort the running transfer from another thread
    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle::new(Arc::clone(&self.session))
    }

    /// Abort the transfer in progress.
    ///
    /// Only meaningful from another thread, through [`FtpClient::abort_handle`]; the calling
    /// thread never has a transfer in progress at this point.
    pub fn abort(&self) -> FtpResult<()> {
        self.abort_handle().abort()
    }

    /// Connect to the FTP server at `host:port` and read its greeting
    pub fn connect(&mut self, timeout: Duration, host: &str, port: u16) -> FtpResult<()> {
        self.check_state(SessionState::Disconnected)?;
        let deadline = Deadline::after(timeout);
        match commands::connect(host, port, self.proxy.as_ref(), &deadline) {
            Ok((control, greeting)) => {
                self.welcome_msg = Some(greeting.text());
                self.control = Some(control);
                self.session.set_state(SessionState::Connected);
                Ok(())
            }
            Err(err) => {
                error!("Connection to {host}:{port} failed: {err}");
                self.teardown();
                Err(err)
            }
        }
    }

    /// Log in with `user` and `password`
    pub fn login(&mut self, timeout: Duration, user: &str, password: &str) -> FtpResult<()> {
        self.authenticate(timeout, user, password, None)
    }

    /// Log in, giving `account` when the server asks for it (332)
    pub fn login_with_account(
        &mut self,
        timeout: Duration,
        user: &str,
        password: &str,
        account: &str,
    ) -> FtpResult<()> {
        self.authenticate(timeout, user, password, Some(account))
    }

    /// Send `QUIT` and close the connection. A missing or bad `221` is only logged.
    pub fn disconnect(&mut self, timeout: Duration) -> FtpResult<()> {
        let Some(mut control) = self.control.take() else {
            debug!("Already disconnected");
            self.session.set_state(SessionState::Disconnected);
            return Ok(());
        };
        let deadline = Deadline::after(timeout);
        if let Err(err) = commands::quit(&mut control, &deadline) {
            warn!("QUIT failed: {err}");
        }
        control.close();
        self.session.set_state(SessionState::Disconnected);
        Ok(())
    }

    // -- directories

    /// List `path` (working directory when `None`)
    pub fn get_directory_list(
        &mut self,
        timeout: Duration,
        path: Option<&str>,
    ) -> FtpResult<Vec<DirectoryItem>> {
        self.run(timeout, |control, channel, deadline| {
            commands::get_directory_list(control, channel, path, deadline)
        })
    }

    /// Names of the entries in `path` (`NLST`)
    pub fn name_list(&mut self, timeout: Duration, path: Option<&str>) -> FtpResult<Vec<String>> {
        self.run(timeout, |control, channel, deadline| {
            commands::name_list(control, channel, path, deadline)
        })
    }

    /// Change the current directory to the path specified
    pub fn cwd(&mut self, timeout: Duration, path: &str) -> FtpResult<()> {
        self.run(timeout, |control, _, deadline| commands::cwd(control, path, deadline))
    }

    /// Move the current directory to the parent directory
    pub fn cdup(&mut self, timeout: Duration) -> FtpResult<()> {
        self.run(timeout, |control, _, deadline| commands::cdup(control, deadline))
    }

    /// Gets the current directory
    pub fn pwd(&mut self, timeout: Duration) -> FtpResult<String> {
        self.run(timeout, |control, _, deadline| commands::pwd(control, deadline))
    }

    pub fn mkdir(&mut self, timeout: Duration, path: &str) -> FtpResult<()> {
        self.run(timeout, |control, _, deadline| commands::mkdir(control, path, deadline))
    }

    pub fn rmdir(&mut self, timeout: Duration, path: &str) -> FtpResult<()> {
        self.run(timeout, |control, _, deadline| commands::rmdir(control, path, deadline))
    }

    // -- files

    /// Download `remote` into memory
    pub fn get_file(&mut self, timeout: Duration, remote: &str) -> FtpResult<Vec<u8>> {
        let mut buffer = Vec::new();
        self.get_file_to(timeout, remote, &mut buffer)?;
        Ok(buffer)
    }

    /// Download `remote` into `sink`; returns the amount of bytes written
    pub fn get_file_to<W: Write>(
        &mut self,
        timeout: Duration,
        remote: &str,
        sink: &mut W,
    ) -> FtpResult<u64> {
        self.run(timeout, |control, channel, deadline| {
            commands::get_file(control, channel, remote, None, sink, deadline)
        })
    }

    /// Download `remote` from `offset` on (`REST`), appending to `sink`
    pub fn resume_file<W: Write>(
        &mut self,
        timeout: Duration,
        remote: &str,
        offset: u64,
        sink: &mut W,
    ) -> FtpResult<u64> {
        self.run(timeout, |control, channel, deadline| {
            commands::get_file(control, channel, remote, Some(offset), sink, deadline)
        })
    }

    /// Upload the content of `source` to `remote`; returns the amount of bytes sent
    pub fn put_file<R: Read>(
        &mut self,
        timeout: Duration,
        remote: &str,
        source: &mut R,
    ) -> FtpResult<u64> {
        self.run(timeout, |control, channel, deadline| {
            commands::put_file(control, channel, remote, source, deadline)
        })
    }

    /// Upload `source` under a name chosen by the server, which is returned.
    /// `remote` is sent as a hint when not empty.
    pub fn put_file_unique<R: Read>(
        &mut self,
        timeout: Duration,
        remote: &str,
        source: &mut R,
    ) -> FtpResult<String> {
        self.run(timeout, |control, channel, deadline| {
            commands::put_file_unique(control, channel, remote, source, deadline)
        })
    }

    /// Renames the file `from` to `to`
    pub fn rename(&mut self, timeout: Duration, from: &str, to: &str) -> FtpResult<()> {
        self.run(timeout, |control, _, deadline| {
            commands::rename(control, from, to, deadline)
        })
    }

    /// Removes the remote file
    pub fn delete_file(&mut self, timeout: Duration, path: &str) -> FtpResult<()> {
        self.run(timeout, |control, _, deadline| {
            commands::delete_file(control, path, deadline)
        })
    }

    /// Retrieves the size of the file in bytes
    pub fn size(&mut self, timeout: Duration, path: &str) -> FtpResult<u64> {
        self.run(timeout, |control, _, deadline| commands::size(control, path, deadline))
    }

    /// Retrieves the modification time of the file
    pub fn mdtm(&mut self, timeout: Duration, path: &str) -> FtpResult<NaiveDateTime> {
        self.run(timeout, |control, _, deadline| commands::mdtm(control, path, deadline))
    }

    /// This does nothing. This is usually just used to keep the connection open.
    pub fn noop(&mut self, timeout: Duration) -> FtpResult<()> {
        self.run(timeout, |control, _, deadline| commands::noop(control, deadline))
    }

    // -- private

    fn authenticate(
        &mut self,
        timeout: Duration,
        user: &str,
        password: &str,
        account: Option<&str>,
    ) -> FtpResult<()> {
        self.run_in(SessionState::Connected, timeout, |control, _, deadline| {
            commands::login(control, user, password, account, deadline)
        })?;
        self.session.set_state(SessionState::Authenticated);
        Ok(())
    }

    /// Run an operation which requires an authenticated session
    fn run<T, F>(&mut self, timeout: Duration, op: F) -> FtpResult<T>
    where
        F: FnOnce(&mut ControlConnection, &DataChannel<'_>, &Deadline) -> FtpResult<T>,
    {
        self.run_in(SessionState::Authenticated, timeout, op)
    }

    /// Run `op` when the session is in `required` state; tear the session down on fatal errors
    fn run_in<T, F>(&mut self, required: SessionState, timeout: Duration, op: F) -> FtpResult<T>
    where
        F: FnOnce(&mut ControlConnection, &DataChannel<'_>, &Deadline) -> FtpResult<T>,
    {
        self.check_state(required)?;
        let deadline = Deadline::after(timeout);
        let Some(control) = self.control.as_mut() else {
            self.teardown();
            return Err(FtpError::InvalidState {
                expected: required,
                actual: SessionState::Disconnected,
            });
        };
        let channel = DataChannel {
            mode: self.mode,
            session: &self.session,
        };
        let result = op(control, &channel, &deadline);
        if let Err(err) = &result {
            if err.is_fatal() {
                error!("Fatal error, closing session: {err}");
                self.teardown();
            } else {
                debug!("Request failed: {err}");
            }
        }
        result
    }

    fn check_state(&self, required: SessionState) -> FtpResult<()> {
        let actual = self.session.state();
        if actual == required {
            Ok(())
        } else {
            Err(FtpError::InvalidState {
                expected: required,
                actual,
            })
        }
    }

    /// Drop the control connection and go back to disconnected
    fn teardown(&mut self) {
        if let Some(control) = self.control.take() {
            control.close();
        }
        self.session.set_state(SessionState::Disconnected);
    }
}
