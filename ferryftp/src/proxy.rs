//! # Proxy
//!
//! HTTP `CONNECT` tunnelling for the control connection.
//!
//! The proxy only changes how the control socket is opened; once the tunnel is up
//! the FTP exchange runs unchanged over it.

use std::env;
use std::fmt;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::deadline::{io_error, Deadline};
use crate::types::{FtpError, FtpResult};

/// Environment variables looked up by [`ProxyInfo::from_env`], in order
const PROXY_ENV_VARS: [&str; 2] = ["FTP_PROXY", "ftp_proxy"];

/// Longest status or header line accepted from the proxy
const MAX_PROXY_LINE: usize = 8192;

/// Proxy used to establish the control connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyInfo {
    host: String,
    port: u16,
    credentials: Option<ProxyCredentials>,
}

/// Basic-auth credentials for the proxy
#[derive(Clone, PartialEq, Eq)]
pub struct ProxyCredentials {
    username: String,
    password: String,
}

impl fmt::Debug for ProxyCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyCredentials")
            .field("username", &self.username)
            .field("password", &"******")
            .finish()
    }
}

impl ProxyCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

impl ProxyInfo {
    /// Proxy without authentication
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            credentials: None,
        }
    }

    /// Set basic-auth credentials
    pub fn with_credentials(mut self, credentials: ProxyCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn credentials(&self) -> Option<&ProxyCredentials> {
        self.credentials.as_ref()
    }

    /// Read the proxy from `FTP_PROXY` or `ftp_proxy`; `None` when neither is set or empty
    pub fn from_env() -> FtpResult<Option<Self>> {
        for var in PROXY_ENV_VARS {
            match env::var(var) {
                Ok(value) if !value.trim().is_empty() => {
                    debug!("Using proxy from {var}");
                    return value.parse().map(Some);
                }
                Ok(_) | Err(env::VarError::NotPresent) => continue,
                Err(env::VarError::NotUnicode(_)) => {
                    return Err(FtpError::InvalidProxy(format!(
                        "{var} value must be valid UTF-8"
                    )))
                }
            }
        }
        Ok(None)
    }

    /// Value of the `Proxy-Authorization` header, if credentials are set
    fn authorization(&self) -> Option<String> {
        self.credentials.as_ref().map(|c| {
            format!(
                "Basic {}",
                STANDARD.encode(format!("{}:{}", c.username, c.password))
            )
        })
    }

    /// Ask the proxy, already connected on `stream`, to open a tunnel to `host:port`.
    ///
    /// The proxy reply is read one byte at a time so nothing past the header block
    /// (such as the FTP greeting) is consumed.
    pub(crate) fn establish_tunnel(
        &self,
        stream: &mut TcpStream,
        host: &str,
        port: u16,
        deadline: &Deadline,
    ) -> FtpResult<()> {
        debug!("Opening tunnel to {host}:{port} through proxy {self}");
        let mut request = format!("CONNECT {host}:{port} HTTP/1.1\r\nHost: {host}:{port}\r\n");
        if let Some(authorization) = self.authorization() {
            request.push_str("Proxy-Authorization: ");
            request.push_str(&authorization);
            request.push_str("\r\n");
        }
        request.push_str("\r\n");

        stream
            .set_write_timeout(Some(deadline.remaining()?))
            .map_err(FtpError::ConnectionError)?;
        stream.write_all(request.as_bytes()).map_err(io_error)?;
        stream.flush().map_err(io_error)?;

        let status = read_proxy_line(stream, deadline)?;
        trace!("PROXY IN: {status:?}");
        let mut parts = status.split_whitespace();
        let version = parts.next().unwrap_or_default();
        if !version
            .get(..5)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("HTTP/"))
        {
            return Err(FtpError::ProxyError(format!(
                "proxy response did not start with HTTP/: {status}"
            )));
        }
        let code = parts.next().ok_or_else(|| {
            FtpError::ProxyError(format!("proxy response missing status code: {status}"))
        })?;
        if !code.starts_with('2') {
            return Err(FtpError::ProxyError(format!(
                "proxy rejected CONNECT with status {status}"
            )));
        }

        // skip headers up to the blank line
        loop {
            let header = read_proxy_line(stream, deadline)?;
            if header.is_empty() {
                break;
            }
            trace!("PROXY IN: {header:?}");
        }
        debug!("Proxy tunnel established");
        Ok(())
    }
}

impl fmt::Display for ProxyInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Parses `[http://][user:password@]host:port`
impl FromStr for ProxyInfo {
    type Err = FtpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = s.trim();
        let remainder = match url.find("://") {
            Some(idx) => {
                let scheme = &url[..idx];
                if !scheme.eq_ignore_ascii_case("http") {
                    return Err(FtpError::InvalidProxy(format!(
                        "unsupported proxy scheme {scheme}://"
                    )));
                }
                &url[idx + 3..]
            }
            None => url,
        };
        let remainder = remainder.trim_end_matches('/');
        if remainder.is_empty() {
            return Err(FtpError::InvalidProxy(
                "proxy must specify a host".to_string(),
            ));
        }
        if remainder.contains('/') {
            return Err(FtpError::InvalidProxy(
                "proxy must not include a path component".to_string(),
            ));
        }

        let (credentials, host_port) = match remainder.rfind('@') {
            Some(idx) => {
                let (userinfo, host_port) = (&remainder[..idx], &remainder[idx + 1..]);
                let (username, password) = userinfo.split_once(':').ok_or_else(|| {
                    FtpError::InvalidProxy(
                        "proxy credentials must use user:password@host:port".to_string(),
                    )
                })?;
                if username.is_empty() {
                    return Err(FtpError::InvalidProxy(
                        "proxy user must be non-empty".to_string(),
                    ));
                }
                (Some(ProxyCredentials::new(username, password)), host_port)
            }
            None => (None, remainder),
        };

        let (host, port) = host_port.rsplit_once(':').ok_or_else(|| {
            FtpError::InvalidProxy("proxy must be in host:port form".to_string())
        })?;
        if host.is_empty() {
            return Err(FtpError::InvalidProxy(
                "proxy must specify a host".to_string(),
            ));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| FtpError::InvalidProxy(format!("invalid proxy port {port:?}")))?;

        Ok(Self {
            host: host.to_string(),
            port,
            credentials,
        })
    }
}

/// Read a CRLF-terminated line from the proxy, without the terminator
fn read_proxy_line(stream: &mut TcpStream, deadline: &Deadline) -> FtpResult<String> {
    let mut line = Vec::with_capacity(128);
    let mut byte = [0u8; 1];
    loop {
        stream
            .set_read_timeout(Some(deadline.remaining()?))
            .map_err(FtpError::ConnectionError)?;
        match stream.read(&mut byte).map_err(io_error)? {
            0 => {
                return Err(FtpError::ProxyError(
                    "proxy closed the connection during the handshake".to_string(),
                ))
            }
            _ if byte[0] == b'\n' => break,
            _ => line.push(byte[0]),
        }
        if line.len() > MAX_PROXY_LINE {
            return Err(FtpError::ProxyError("proxy line too long".to_string()));
        }
    }
    if line.ends_with(b"\r") {
        line.pop();
    }
    String::from_utf8(line)
        .map_err(|_| FtpError::ProxyError("proxy response contained invalid UTF-8".to_string()))
}

#[cfg(test)]
mod test {

    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn should_parse_proxy_url() {
        let proxy: ProxyInfo = "http://squid.local:3128".parse().unwrap();
        assert_eq!(proxy.host(), "squid.local");
        assert_eq!(proxy.port(), 3128);
        assert!(proxy.credentials().is_none());

        let proxy: ProxyInfo = "omar:s3cret@10.0.0.1:8080/".parse().unwrap();
        assert_eq!(proxy.host(), "10.0.0.1");
        assert_eq!(proxy.port(), 8080);
        assert_eq!(proxy.credentials().unwrap().username(), "omar");
        assert_eq!(
            proxy.authorization().unwrap().as_str(),
            "Basic b21hcjpzM2NyZXQ="
        );
    }

    #[test]
    fn should_reject_bad_proxy_url() {
        assert!("socks5://host:1080".parse::<ProxyInfo>().is_err());
        assert!("host".parse::<ProxyInfo>().is_err());
        assert!("host:port".parse::<ProxyInfo>().is_err());
        assert!(":8080".parse::<ProxyInfo>().is_err());
        assert!("user@host:8080".parse::<ProxyInfo>().is_err());
        assert!("http://host:8080/path".parse::<ProxyInfo>().is_err());
        assert!("".parse::<ProxyInfo>().is_err());
    }

    #[test]
    fn should_not_print_password() {
        let proxy = ProxyInfo::new("proxy", 3128)
            .with_credentials(ProxyCredentials::new("omar", "s3cret"));
        assert!(!format!("{proxy:?}").contains("s3cret"));
        assert_eq!(proxy.to_string().as_str(), "proxy:3128");
    }

    #[test]
    fn should_establish_tunnel_and_keep_greeting() {
        crate::log_init();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut request = Vec::new();
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" {
                    break;
                }
                request.push(line.trim_end().to_string());
            }
            stream
                .write_all(b"HTTP/1.1 200 Connection established\r\nVia: test\r\n\r\n220 ready\r\n")
                .unwrap();
            request
        });

        let mut stream = TcpStream::connect(addr).unwrap();
        let proxy = ProxyInfo::new("127.0.0.1", addr.port())
            .with_credentials(ProxyCredentials::new("omar", "s3cret"));
        let deadline = Deadline::after(Duration::from_secs(5));
        proxy
            .establish_tunnel(&mut stream, "ftp.example.com", 21, &deadline)
            .unwrap();
        let request = server.join().unwrap();
        assert_eq!(request[0].as_str(), "CONNECT ftp.example.com:21 HTTP/1.1");
        assert!(request
            .iter()
            .any(|h| h == "Proxy-Authorization: Basic b21hcjpzM2NyZXQ="));
        // greeting is still in the socket
        let mut rest = String::new();
        BufReader::new(stream).read_line(&mut rest).unwrap();
        assert_eq!(rest.as_str(), "220 ready\r\n");
    }

    #[test]
    fn should_fail_when_proxy_refuses() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 512];
            let _ = stream.read(&mut buf);
            stream
                .write_all(b"HTTP/1.1 407 Proxy Authentication Required\r\n\r\n")
                .unwrap();
        });
        let mut stream = TcpStream::connect(addr).unwrap();
        let deadline = Deadline::after(Duration::from_secs(5));
        let err = ProxyInfo::new("127.0.0.1", addr.port())
            .establish_tunnel(&mut stream, "ftp.example.com", 21, &deadline)
            .err()
            .unwrap();
        assert!(matches!(err, FtpError::ProxyError(_)));
        assert!(err.is_fatal());
        server.join().unwrap();
    }
}
