//! # Command
//!
//! The set of FTP commands sent on the control connection

use std::fmt;

use crate::types::{FileType, FtpError, FtpResult};

#[derive(Debug, Clone, PartialEq, Eq)]
/// Ftp commands with their arguments
pub enum Command {
    /// Abort an active file transfer
    Abor,
    /// Provide account information
    Acct(String),
    /// Change working directory to parent directory
    Cdup,
    /// Change working directory
    Cwd(String),
    /// Remove file at specified path
    Dele(String),
    /// List entries at specified path. If path is not provided list entries at current working directory
    List(Option<String>),
    /// Get modification time for file at specified path
    Mdtm(String),
    /// Make directory
    Mkd(String),
    /// Get the list of file names at specified path
    Nlst(Option<String>),
    /// Ping server
    Noop,
    /// Provide login password
    Pass(String),
    /// Passive mode
    Pasv,
    /// Specifies an address and port to which the server should connect (active mode)
    Port(String),
    /// Print working directory
    Pwd,
    /// Quit
    Quit,
    /// Select file to rename
    RenameFrom(String),
    /// Rename selected file to
    RenameTo(String),
    /// Resume transfer from offset
    Rest(u64),
    /// Retrieve file
    Retr(String),
    /// Remove directory
    Rmd(String),
    /// Get file size of specified path
    Size(String),
    /// Put file at specified path
    Store(String),
    /// Put file under a name chosen by the server; the argument is a hint some servers honour
    StoreUnique(Option<String>),
    /// Set transfer type
    Type(FileType),
    /// Provide user to login as
    User(String),
}

impl Command {
    /// Line to write on the control connection, CRLF included
    pub fn to_line(&self) -> String {
        format!("{self}\r\n")
    }

    /// Fails with [`FtpError::InvalidArgument`] when the argument contains CR or LF,
    /// which would end the command line early and put another command on the wire
    pub fn check_argument(&self) -> FtpResult<()> {
        match self.argument() {
            Some(arg) if arg.contains(['\r', '\n']) => Err(FtpError::InvalidArgument(format!(
                "line break in {:?}",
                self.redacted()
            ))),
            _ => Ok(()),
        }
    }

    fn argument(&self) -> Option<&str> {
        match self {
            Self::Acct(arg)
            | Self::Cwd(arg)
            | Self::Dele(arg)
            | Self::Mdtm(arg)
            | Self::Mkd(arg)
            | Self::Pass(arg)
            | Self::Port(arg)
            | Self::RenameFrom(arg)
            | Self::RenameTo(arg)
            | Self::Retr(arg)
            | Self::Rmd(arg)
            | Self::Size(arg)
            | Self::Store(arg)
            | Self::User(arg) => Some(arg.as_str()),
            Self::List(arg) | Self::Nlst(arg) | Self::StoreUnique(arg) => arg.as_deref(),
            Self::Abor
            | Self::Cdup
            | Self::Noop
            | Self::Pasv
            | Self::Pwd
            | Self::Quit
            | Self::Rest(_)
            | Self::Type(_) => None,
        }
    }

    /// Text safe to log; secrets are masked
    pub fn redacted(&self) -> String {
        match self {
            Self::Pass(_) => "PASS ******".to_string(),
            Self::Acct(_) => "ACCT ******".to_string(),
            cmd => cmd.to_string(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abor => write!(f, "ABOR"),
            Self::Acct(a) => write!(f, "ACCT {a}"),
            Self::Cdup => write!(f, "CDUP"),
            Self::Cwd(d) => write!(f, "CWD {d}"),
            Self::Dele(p) => write!(f, "DELE {p}"),
            Self::List(Some(p)) => write!(f, "LIST {p}"),
            Self::List(None) => write!(f, "LIST"),
            Self::Mdtm(p) => write!(f, "MDTM {p}"),
            Self::Mkd(p) => write!(f, "MKD {p}"),
            Self::Nlst(Some(p)) => write!(f, "NLST {p}"),
            Self::Nlst(None) => write!(f, "NLST"),
            Self::Noop => write!(f, "NOOP"),
            Self::Pass(p) => write!(f, "PASS {p}"),
            Self::Pasv => write!(f, "PASV"),
            Self::Port(p) => write!(f, "PORT {p}"),
            Self::Pwd => write!(f, "PWD"),
            Self::Quit => write!(f, "QUIT"),
            Self::RenameFrom(p) => write!(f, "RNFR {p}"),
            Self::RenameTo(p) => write!(f, "RNTO {p}"),
            Self::Rest(offset) => write!(f, "REST {offset}"),
            Self::Retr(p) => write!(f, "RETR {p}"),
            Self::Rmd(p) => write!(f, "RMD {p}"),
            Self::Size(p) => write!(f, "SIZE {p}"),
            Self::Store(p) => write!(f, "STOR {p}"),
            Self::StoreUnique(Some(p)) => write!(f, "STOU {p}"),
            Self::StoreUnique(None) => write!(f, "STOU"),
            Self::Type(t) => write!(f, "TYPE {t}"),
            Self::User(u) => write!(f, "USER {u}"),
        }
    }
}
