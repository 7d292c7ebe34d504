//! # List
//!
//! This module exposes the resolver for the LIST command output.
//! There's no specification regarding the LIST output, so the format depends on the remote
//! FTP server. Two families are understood: the POSIX `ls -l` style used by nearly every
//! unix server and the MS-DOS style used by IIS and other Windows servers.
//!
//! Lines which match neither family (blank lines, `total 24` headers, banners...) are skipped.
//!
//! ```rust
//! use ferryftp::list::{resolve, ItemKind};
//!
//! let body = "total 8\r\n-rw-r--r-- 1 ftp ftp 8192 Nov 5 2018 omar.txt\r\n04-08-14  03:09PM <DIR> docs\r\n";
//! let items: Vec<_> = resolve(body).collect();
//! assert_eq!(items.len(), 2);
//! assert_eq!(items[0].kind(), ItemKind::File);
//! assert_eq!(items[1].kind(), ItemKind::Directory);
//! ```

use std::str::FromStr;

use chrono::prelude::{NaiveDate, NaiveDateTime, Utc};
use chrono::{Datelike, Duration};
use lazy_regex::{Lazy, Regex};
use thiserror::Error;

// -- Regex

/// POSIX system regex to parse list output
static POSIX_LS_RE: Lazy<Regex> = lazy_regex!(
    r#"^([\-ldbcps])[\-rwxsStT]{9}[+@.]?\s+(\d+)\s+([^ ]+)\s+([^ ]+)\s+(\d+)\s+([^ ]+\s+\d{1,2}\s+(?:\d{1,2}:\d{1,2}|\d{4}))\s+(.+)$"#
);
/// DOS system regex to parse list output
static DOS_LS_RE: Lazy<Regex> = lazy_regex!(
    r#"^(\d{2}-\d{2}-(?:\d{4}|\d{2}))\s+(\d{1,2}:\d{2}\s*(?:[AaPp][Mm])?)\s+(?:(<DIR>)|([\d,]+))\s+(.+)$"#
);

/// Kind of a directory entry
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ItemKind {
    File,
    Directory,
    Symlink,
    /// Devices, pipes, sockets
    Unknown,
}

/// Describes an entry of a remote directory, as resolved from a LIST output line
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct DirectoryItem {
    name: String,
    kind: ItemKind,
    size: Option<u64>,
    modified: Option<NaiveDateTime>,
    link_target: Option<String>,
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum ParseError {
    #[error("Syntax error: invalid line")]
    SyntaxError,
    #[error("Invalid date")]
    InvalidDate,
    #[error("Bad file size")]
    BadSize,
}

/// Resolve a LIST body into directory items, lazily. Unparseable lines are skipped.
pub fn resolve(body: &str) -> impl Iterator<Item = DirectoryItem> + '_ {
    body.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match DirectoryItem::from_line(line) {
            Ok(item) => Some(item),
            Err(err) => {
                trace!("Skipping LIST line {:?}: {}", line, err);
                None
            }
        })
}

impl DirectoryItem {
    // -- getters

    /// Get file name
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    pub fn is_directory(&self) -> bool {
        self.kind == ItemKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == ItemKind::File
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == ItemKind::Symlink
    }

    /// Size in bytes; not reported for MS-DOS directories
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// Last modification time, as reported by the server (server local time)
    pub fn modified(&self) -> Option<NaiveDateTime> {
        self.modified
    }

    /// Target of a symlink, when the listing shows `name -> target`
    pub fn link_target(&self) -> Option<&str> {
        self.link_target.as_deref()
    }

    // -- parsers

    /// Parse one LIST line, trying the POSIX format first and then the DOS one
    pub fn from_line(line: &str) -> Result<Self, ParseError> {
        match Self::from_posix_line(line) {
            Ok(item) => Ok(item),
            Err(ParseError::SyntaxError) => Self::from_dos_line(line),
            Err(err) => Err(err),
        }
    }

    /// Parse a POSIX LIST output line
    ///
    /// ```text
    /// -rw-rw-r-- 1 0  1  8192 Nov 5 2018 omar.txt
    /// lrwxrwxrwx 1 root root 7 Nov 5 13:46 www -> /var/www
    /// ```
    pub fn from_posix_line(line: &str) -> Result<Self, ParseError> {
        let metadata = POSIX_LS_RE
            .captures(line)
            .ok_or(ParseError::SyntaxError)?;
        trace!("Parsed POSIX line {}", line);
        // NOTE: metadata fmt: (regex, file_type, link_count, owner, group, size, mtime, name)
        let kind = match &metadata[1] {
            "-" => ItemKind::File,
            "d" => ItemKind::Directory,
            "l" => ItemKind::Symlink,
            _ => ItemKind::Unknown,
        };
        let size = metadata[5]
            .parse::<u64>()
            .map_err(|_| ParseError::BadSize)?;
        let modified = Self::parse_lstime(&metadata[6])?;
        let (name, link_target) = match kind {
            ItemKind::Symlink => Self::get_name_and_link(&metadata[7]),
            _ => (metadata[7].to_string(), None),
        };
        trace!(
            "Found item with name {}, kind: {:?}, size: {}",
            name,
            kind,
            size
        );
        Ok(Self {
            name,
            kind,
            size: Some(size),
            modified: Some(modified),
            link_target,
        })
    }

    /// Try to parse a "LIST" output command line in DOS format.
    ///
    /// ```text
    /// {DATE} {TIME} {<DIR> | SIZE} {FILENAME}
    /// 10-19-20  03:19PM <DIR> pub
    /// 04-08-14  03:09PM 403   readme.txt
    /// 2023-less servers: 11-02-2023  17:45  1,024 report.pdf
    /// ```
    pub fn from_dos_line(line: &str) -> Result<Self, ParseError> {
        let metadata = DOS_LS_RE.captures(line).ok_or(ParseError::SyntaxError)?;
        trace!("Parsed DOS line {}", line);
        // NOTE: metadata fmt: (regex, date, time, <DIR>?, size?, name)
        let modified = Self::parse_dostime(&metadata[1], &metadata[2])?;
        let (kind, size) = match (metadata.get(3), metadata.get(4)) {
            (Some(_), _) => (ItemKind::Directory, None),
            (None, Some(size)) => (
                ItemKind::File,
                Some(
                    size.as_str()
                        .replace(',', "")
                        .parse::<u64>()
                        .map_err(|_| ParseError::BadSize)?,
                ),
            ),
            (None, None) => return Err(ParseError::SyntaxError),
        };
        let name = metadata[5].to_string();
        trace!("Found item with name {}, kind: {:?}, size: {:?}", name, kind, size);
        Ok(Self {
            name,
            kind,
            size,
            modified: Some(modified),
            link_target: None,
        })
    }

    /// Returns from a `ls -l` command output file name token, the name of the file and the symbolic link (if there is any)
    fn get_name_and_link(token: &str) -> (String, Option<String>) {
        match token.split_once(" -> ") {
            Some((name, target)) => (name.to_string(), Some(target.to_string())),
            None => (token.to_string(), None),
        }
    }

    /// Convert ls syntax time to a date time.
    /// ls time has two possible syntax:
    /// 1. if the file is recent: %b %d %H:%M (e.g. Nov 5 13:46); the year is the current one,
    ///    or the previous one when that would put the date in the future
    /// 2. else: %b %d %Y (e.g. Nov 5 2019)
    fn parse_lstime(tm: &str) -> Result<NaiveDateTime, ParseError> {
        let tm = tm.split_whitespace().collect::<Vec<&str>>().join(" ");
        if let Ok(date) = NaiveDate::parse_from_str(&tm, "%b %d %Y") {
            return date.and_hms_opt(0, 0, 0).ok_or(ParseError::InvalidDate);
        }
        Self::parse_recent_lstime(&tm, Utc::now().naive_utc())
    }

    /// `%b %d %H:%M` relative to `now`: the current year, unless the date doesn't exist in it
    /// (Feb 29) or lies more than a day ahead, in which case the previous year
    fn parse_recent_lstime(tm: &str, now: NaiveDateTime) -> Result<NaiveDateTime, ParseError> {
        let parse_in = |year: i32| {
            NaiveDateTime::parse_from_str(&format!("{tm} {year}"), "%b %d %H:%M %Y")
                .map_err(|_| ParseError::InvalidDate)
        };
        match parse_in(now.year()) {
            Ok(datetime) if datetime <= now + Duration::days(1) => Ok(datetime),
            _ => parse_in(now.year() - 1),
        }
    }

    /// Parse date and time in DOS representation (`%m-%d-%y` or `%m-%d-%Y`, 12 or 24 hours)
    fn parse_dostime(date: &str, time: &str) -> Result<NaiveDateTime, ParseError> {
        let time: String = time.chars().filter(|c| !c.is_whitespace()).collect();
        let tm = format!("{date} {}", time.to_ascii_uppercase());
        let year_fmt = if date.len() == 10 { "%m-%d-%Y" } else { "%m-%d-%y" };
        let time_fmt = if tm.ends_with('M') { "%I:%M%p" } else { "%H:%M" };
        NaiveDateTime::parse_from_str(&tm, &format!("{year_fmt} {time_fmt}"))
            .map_err(|_| ParseError::InvalidDate)
    }
}

impl FromStr for DirectoryItem {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_line(s)
    }
}

impl TryFrom<&str> for DirectoryItem {
    type Error = ParseError;

    fn try_from(line: &str) -> Result<Self, Self::Error> {
        Self::from_line(line)
    }
}
