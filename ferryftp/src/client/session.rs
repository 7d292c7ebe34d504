//! # Session
//!
//! State shared between the thread running an operation and an [`AbortHandle`].

use std::net::{Shutdown, TcpStream};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::types::{FtpError, FtpResult, SessionState};

/// Lifecycle state and the registry of the data transfer in flight
#[derive(Debug)]
pub(crate) struct Session {
    state: Mutex<SessionState>,
    transfer: Mutex<Option<ActiveTransfer>>,
}

#[derive(Debug, Default)]
struct ActiveTransfer {
    /// Clone of the data socket, once connected
    socket: Option<TcpStream>,
    abort_requested: bool,
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SessionState::Disconnected),
            transfer: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SessionState {
        *lock(&self.state)
    }

    pub fn set_state(&self, state: SessionState) {
        let mut current = lock(&self.state);
        if *current != state {
            trace!("Session state {} -> {}", *current, state);
            *current = state;
        }
    }

    /// Register a new data transfer; it's unregistered when the guard is dropped
    pub fn begin_transfer(self: &Arc<Self>) -> TransferGuard {
        *lock(&self.transfer) = Some(ActiveTransfer::default());
        TransferGuard {
            session: Arc::clone(self),
        }
    }

    /// Flag the running transfer as aborted and unblock its data socket
    fn request_abort(&self) -> FtpResult<()> {
        let mut slot = lock(&self.transfer);
        let transfer = slot.as_mut().ok_or(FtpError::NoTransferInProgress)?;
        if transfer.abort_requested {
            debug!("Abort already requested");
            return Ok(());
        }
        transfer.abort_requested = true;
        info!("Aborting data transfer");
        if let Some(socket) = transfer.socket.as_ref() {
            shutdown(socket);
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn shutdown(socket: &TcpStream) {
    if let Err(err) = socket.shutdown(Shutdown::Both) {
        debug!("Failed to shutdown data socket: {err}");
    }
}

/// Keeps the transfer registered while a data connection is in use
#[derive(Debug)]
pub(crate) struct TransferGuard {
    session: Arc<Session>,
}

impl TransferGuard {
    /// Publish the data socket so that an abort from another thread can close it.
    /// If the abort came first, the socket is shut down right away.
    pub fn attach(&self, socket: &TcpStream) -> FtpResult<()> {
        let clone = socket.try_clone().map_err(FtpError::ConnectionError)?;
        let mut slot = lock(&self.session.transfer);
        let transfer = slot.get_or_insert_with(ActiveTransfer::default);
        if transfer.abort_requested {
            shutdown(&clone);
        }
        transfer.socket = Some(clone);
        Ok(())
    }

    pub fn is_abort_requested(&self) -> bool {
        lock(&self.session.transfer)
            .as_ref()
            .is_some_and(|transfer| transfer.abort_requested)
    }
}

impl Drop for TransferGuard {
    fn drop(&mut self) {
        lock(&self.session.transfer).take();
    }
}

/// Cancels the transfer running on a [`crate::FtpClient`] from any thread.
///
/// The handle only closes the data socket; the thread that owns the control connection
/// notices it, sends `ABOR` and returns [`FtpError::Aborted`].
#[derive(Debug, Clone)]
pub struct AbortHandle {
    session: Arc<Session>,
}

impl AbortHandle {
    pub(crate) fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Request the abort of the transfer in progress.
    ///
    /// Fails with [`FtpError::NoTransferInProgress`] when no transfer is running.
    pub fn abort(&self) -> FtpResult<()> {
        self.session.request_abort()
    }

    /// Current state of the session this handle belongs to
    pub fn state(&self) -> SessionState {
        self.session.state()
    }
}

#[cfg(test)]
mod test {

    use std::net::TcpListener;

    use pretty_assertions::assert_eq;

    use super::*;

    fn socket_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        (client, server)
    }

    #[test]
    fn should_track_state() {
        let session = Session::new();
        assert_eq!(session.state(), SessionState::Disconnected);
        session.set_state(SessionState::Connected);
        assert_eq!(session.state(), SessionState::Connected);
    }

    #[test]
    fn should_refuse_abort_without_transfer() {
        let handle = AbortHandle::new(Arc::new(Session::new()));
        assert!(matches!(
            handle.abort().err().unwrap(),
            FtpError::NoTransferInProgress
        ));
    }

    #[test]
    fn should_flag_and_shutdown_transfer() {
        use std::io::Read;

        let session = Arc::new(Session::new());
        let handle = AbortHandle::new(Arc::clone(&session));
        let guard = session.begin_transfer();
        let (mut client, _server) = socket_pair();
        guard.attach(&client).unwrap();
        assert_eq!(guard.is_abort_requested(), false);
        assert!(handle.abort().is_ok());
        assert!(guard.is_abort_requested());
        // reading from the shut down socket doesn't block
        let mut buf = [0u8; 8];
        assert_eq!(client.read(&mut buf).unwrap_or(0), 0);
        drop(guard);
        assert!(handle.abort().is_err());
    }

    #[test]
    fn should_shutdown_socket_attached_after_abort() {
        use std::io::Read;

        let session = Arc::new(Session::new());
        let guard = session.begin_transfer();
        AbortHandle::new(Arc::clone(&session)).abort().unwrap();
        let (mut client, _server) = socket_pair();
        guard.attach(&client).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(client.read(&mut buf).unwrap_or(0), 0);
    }
}
