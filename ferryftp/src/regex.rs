//! # FTP Regex
//!
//! Regular expressions to parse FTP response

use lazy_regex::{Lazy, Regex};

/// This regex extracts IP and Port details from PASV command response.
/// The regex looks for the pattern (h1,h2,h3,h4,p1,p2).
pub static PASV_PORT_RE: Lazy<Regex> =
    lazy_regex!(r"\(?\s*(\d+),(\d+),(\d+),(\d+),(\d+),(\d+)\s*\)?");

/// This regex extracts modification time from MDTM command response.
pub static MDTM_RE: Lazy<Regex> = lazy_regex!(r"\b(\d{4})(\d{2})(\d{2})(\d{2})(\d{2})(\d{2})\b");

/// This regex extracts file size from SIZE command response.
pub static SIZE_RE: Lazy<Regex> = lazy_regex!(r"\s*(\d+)\s*$");

/// `150 FILE: name` as defined by RFC 1123 for STOU
pub static STOU_FILE_RE: Lazy<Regex> = lazy_regex!(r"(?i)\bFILE:\s*(.+?)\s*$");

/// `unique file name: name` as sent in completion replies by some servers
pub static STOU_UNIQUE_RE: Lazy<Regex> = lazy_regex!(r"(?i)unique\s+file\s*name\s*:?\s*([^\s()]+)");

/// File name between double or single quotes
pub static QUOTED_NAME_RE: Lazy<Regex> = lazy_regex!(r#""([^"]+)"|'([^']+)'"#);

#[cfg(test)]
mod test {

    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn should_match_pasv_port() {
        let response = "227 Entering Passive Mode (213,229,112,130,216,4)";
        let caps = PASV_PORT_RE.captures(response).unwrap();
        let (oct1, oct2, oct3, oct4) = (
            caps[1].parse::<u8>().unwrap(),
            caps[2].parse::<u8>().unwrap(),
            caps[3].parse::<u8>().unwrap(),
            caps[4].parse::<u8>().unwrap(),
        );
        let (msb, lsb) = (
            caps[5].parse::<u8>().unwrap(),
            caps[6].parse::<u8>().unwrap(),
        );
        assert_eq!(oct1, 213);
        assert_eq!(oct2, 229);
        assert_eq!(oct3, 112);
        assert_eq!(oct4, 130);
        assert_eq!(msb, 216);
        assert_eq!(lsb, 4);
    }

    #[test]
    fn should_match_pasv_port_without_parenthesis() {
        let response = "227 Entering Passive Mode 10,0,0,7,4,1";
        let caps = PASV_PORT_RE.captures(response).unwrap();
        assert_eq!(&caps[1], "10");
        assert_eq!(&caps[6], "1");
    }

    #[test]
    fn should_match_mdtm() {
        let response = "213 20230201111632";
        let caps = MDTM_RE.captures(response).unwrap();
        assert_eq!(caps[1].parse::<i32>().unwrap(), 2023);
        assert_eq!(caps[2].parse::<u32>().unwrap(), 2);
        assert_eq!(caps[3].parse::<u32>().unwrap(), 1);
        assert_eq!(caps[4].parse::<u32>().unwrap(), 11);
        assert_eq!(caps[5].parse::<u32>().unwrap(), 16);
        assert_eq!(caps[6].parse::<u32>().unwrap(), 32);
    }

    #[test]
    fn should_match_size() {
        let caps = SIZE_RE.captures(" 512 1024 2048").unwrap();
        assert_eq!(caps[1].parse::<u64>().unwrap(), 2048);
        let caps = SIZE_RE.captures("2048").unwrap();
        assert_eq!(caps[1].parse::<u64>().unwrap(), 2048);
    }

    #[test]
    fn should_match_stou_names() {
        let caps = STOU_FILE_RE.captures("FILE: a.txt.1").unwrap();
        assert_eq!(&caps[1], "a.txt.1");
        let caps = STOU_UNIQUE_RE
            .captures("Transfer complete (unique file name:a.txt.2).")
            .unwrap();
        assert_eq!(&caps[1], "a.txt.2");
        let caps = QUOTED_NAME_RE
            .captures("Opening BINARY mode data connection for 'ftp4x2'")
            .unwrap();
        assert_eq!(caps.get(2).unwrap().as_str(), "ftp4x2");
    }
}
