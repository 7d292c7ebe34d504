//! # Status
//!
//! Reply codes defined by RFC 959 which the client knows how to interpret

use thiserror::Error;

#[derive(Debug, Copy, Clone, Error, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u32)]
/// Reply code returned by the server on the control connection
pub enum Status {
    // 1xx: Positive Preliminary Reply
    #[error("restart marker reply")]
    RestartMarker = 110,
    #[error("service ready in (n) minutes")]
    ReadyMinute = 120,
    #[error("data connection already open, transfer starting")]
    AlreadyOpen = 125,
    #[error("file status okay, about to open data connection")]
    AboutToSend = 150,
    // 2xx: Positive Completion Reply
    #[error("command okay")]
    CommandOk = 200,
    #[error("command not implemented, superfluous at this site")]
    CommandNotImplemented = 202,
    #[error("system status, or system help reply")]
    System = 211,
    #[error("file status")]
    File = 213,
    #[error("service ready for new user")]
    Ready = 220,
    #[error("service closing control connection")]
    Closing = 221,
    #[error("data connection open; no transfer in progress")]
    DataConnectionOpen = 225,
    #[error("closing data connection")]
    ClosingDataConnection = 226,
    #[error("entering passive mode")]
    PassiveMode = 227,
    #[error("user logged in, proceed")]
    LoggedIn = 230,
    #[error("requested file action okay")]
    RequestedFileActionOk = 250,
    #[error("pathname created")]
    PathCreated = 257,
    // 3xx: Positive intermediate Reply
    #[error("user name okay, need password")]
    NeedPassword = 331,
    #[error("need account for login")]
    LoginNeedAccount = 332,
    #[error("requested file action pending further information")]
    RequestFilePending = 350,
    // 4xx: Transient Negative Completion Reply
    #[error("service not available, closing control connection")]
    NotAvailable = 421,
    #[error("can't open data connection")]
    CannotOpenDataConnection = 425,
    #[error("connection closed; transfer aborted")]
    TransferAborted = 426,
    #[error("requested file action not taken")]
    RequestFileActionIgnored = 450,
    #[error("requested action aborted: local error in processing")]
    ActionAborted = 451,
    #[error("requested action not taken; insufficient storage space")]
    RequestedActionNotTaken = 452,
    // 5xx: Permanent Negative Completion Reply
    #[error("syntax error, command unrecognized")]
    BadCommand = 500,
    #[error("syntax error in parameters or arguments")]
    BadArguments = 501,
    #[error("command not implemented")]
    NotImplemented = 502,
    #[error("bad sequence of commands")]
    BadSequence = 503,
    #[error("command not implemented for that parameter")]
    NotImplementedParameter = 504,
    #[error("user not logged in")]
    NotLoggedIn = 530,
    #[error("need account for storing files")]
    StoringNeedAccount = 532,
    #[error("requested action not taken; file unavailable")]
    FileUnavailable = 550,
    #[error("requested action aborted; page type unknown")]
    PageTypeUnknown = 551,
    #[error("requested file action aborted; exceeded storage allocation")]
    ExceededStorage = 552,
    #[error("requested action not taken; file name not allowed")]
    BadFilename = 553,
    #[error("unknown reply code")]
    Unknown = 0,
}

/// The reply class, given by the first digit of the code
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReplyClass {
    /// 1xx
    Preliminary,
    /// 2xx
    Completion,
    /// 3xx
    Intermediate,
    /// 4xx
    TransientNegative,
    /// 5xx
    PermanentNegative,
    /// Anything else; not a valid RFC 959 code
    Invalid,
}

impl Status {
    /// Get status code
    pub fn code(&self) -> u32 {
        *self as u32
    }

    /// Get status description
    pub fn desc(&self) -> String {
        self.to_string()
    }
}

impl ReplyClass {
    /// Classify a raw three-digit reply code
    pub fn of(code: u32) -> Self {
        match code / 100 {
            1 => Self::Preliminary,
            2 => Self::Completion,
            3 => Self::Intermediate,
            4 => Self::TransientNegative,
            5 => Self::PermanentNegative,
            _ => Self::Invalid,
        }
    }

    /// Whether the server refused the request (4xx or 5xx)
    pub fn is_negative(&self) -> bool {
        matches!(self, Self::TransientNegative | Self::PermanentNegative)
    }
}

impl From<u32> for Status {
    fn from(code: u32) -> Self {
        match code {
            110 => Self::RestartMarker,
            120 => Self::ReadyMinute,
            125 => Self::AlreadyOpen,
            150 => Self::AboutToSend,
            200 => Self::CommandOk,
            202 => Self::CommandNotImplemented,
            211 => Self::System,
            213 => Self::File,
            220 => Self::Ready,
            221 => Self::Closing,
            225 => Self::DataConnectionOpen,
            226 => Self::ClosingDataConnection,
            227 => Self::PassiveMode,
            230 => Self::LoggedIn,
            250 => Self::RequestedFileActionOk,
            257 => Self::PathCreated,
            331 => Self::NeedPassword,
            332 => Self::LoginNeedAccount,
            350 => Self::RequestFilePending,
            421 => Self::NotAvailable,
            425 => Self::CannotOpenDataConnection,
            426 => Self::TransferAborted,
            450 => Self::RequestFileActionIgnored,
            451 => Self::ActionAborted,
            452 => Self::RequestedActionNotTaken,
            500 => Self::BadCommand,
            501 => Self::BadArguments,
            502 => Self::NotImplemented,
            503 => Self::BadSequence,
            504 => Self::NotImplementedParameter,
            530 => Self::NotLoggedIn,
            532 => Self::StoringNeedAccount,
            550 => Self::FileUnavailable,
            551 => Self::PageTypeUnknown,
            552 => Self::ExceededStorage,
            553 => Self::BadFilename,
            _ => Self::Unknown,
        }
    }
}

#[cfg(test)]
mod test {

    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn should_return_code_for_status() {
        assert_eq!(Status::BadFilename.code(), 553);
        assert_eq!(Status::PassiveMode.code(), 227);
    }

    #[test]
    fn should_return_desc_for_status() {
        assert_eq!(
            Status::BadArguments.desc().as_str(),
            "syntax error in parameters or arguments"
        );
    }

    #[test]
    fn should_convert_u32_to_status() {
        assert_eq!(Status::from(120), Status::ReadyMinute);
        assert_eq!(Status::from(150), Status::AboutToSend);
        assert_eq!(Status::from(220), Status::Ready);
        assert_eq!(Status::from(226), Status::ClosingDataConnection);
        assert_eq!(Status::from(227), Status::PassiveMode);
        assert_eq!(Status::from(331), Status::NeedPassword);
        assert_eq!(Status::from(332), Status::LoginNeedAccount);
        assert_eq!(Status::from(421), Status::NotAvailable);
        assert_eq!(Status::from(426), Status::TransferAborted);
        assert_eq!(Status::from(532), Status::StoringNeedAccount);
        assert_eq!(Status::from(550), Status::FileUnavailable);
        assert_eq!(Status::from(999), Status::Unknown);
        assert_eq!(Status::from(214), Status::Unknown);
    }

    #[test]
    fn should_classify_reply_codes() {
        assert_eq!(ReplyClass::of(150), ReplyClass::Preliminary);
        assert_eq!(ReplyClass::of(226), ReplyClass::Completion);
        assert_eq!(ReplyClass::of(331), ReplyClass::Intermediate);
        assert_eq!(ReplyClass::of(425), ReplyClass::TransientNegative);
        assert_eq!(ReplyClass::of(550), ReplyClass::PermanentNegative);
        assert_eq!(ReplyClass::of(999), ReplyClass::Invalid);
        assert!(ReplyClass::of(452).is_negative());
        assert!(ReplyClass::of(553).is_negative());
        assert!(!ReplyClass::of(257).is_negative());
    }
}
