//! # Test server
//!
//! A scripted FTP server running on a local thread. It replays a list of [`Step`]s on the
//! first connection it accepts and records what the client sent.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const IO_TIMEOUT: Duration = Duration::from_secs(10);

/// One action of the server script
#[derive(Debug, Clone)]
pub enum Step {
    /// Write `220` greeting
    Greet,
    /// Write the given reply; lines are separated by `\n`
    Reply(&'static str),
    /// Read a command line, then write the reply
    Command(&'static str),
    /// Read a command (`PASV`), open a data listener and answer `227` with its address
    Pasv,
    /// Read a command (`PORT`), remember the address and answer `200`
    Port,
    /// Open the data connection, write the bytes and close it
    Send(Vec<u8>),
    /// Open the data connection and read it until the client closes it
    Receive,
    /// Open the data connection, write the bytes and wait for the client to close it
    Hold(Vec<u8>),
    /// Open the data connection, read `n` bytes at most and close it
    Discard(usize),
    /// Read an HTTP `CONNECT` request and establish the tunnel
    Tunnel,
    /// Read a command line without answering, then sleep
    Stall(Duration),
    /// Sleep without reading
    Sleep(Duration),
}

/// What the server got from the client
#[derive(Debug, Default)]
pub struct Transcript {
    pub commands: Vec<String>,
    pub received: Vec<Vec<u8>>,
}

impl Transcript {
    /// Commands' verbs, in order
    pub fn verbs(&self) -> Vec<&str> {
        self.commands
            .iter()
            .map(|cmd| cmd.split_whitespace().next().unwrap_or_default())
            .collect()
    }
}

pub struct TestServer {
    port: u16,
    handle: JoinHandle<Transcript>,
}

enum DataEndpoint {
    Listener(TcpListener),
    Client(SocketAddr),
}

impl TestServer {
    /// Bind on a random local port and run `script` on the first client
    pub fn start(script: Vec<Step>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            run_script(stream, script)
        });
        Self { port, handle }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Wait for the script to complete
    pub fn join(self) -> Transcript {
        self.handle.join().unwrap()
    }
}

fn run_script(stream: TcpStream, script: Vec<Step>) -> Transcript {
    stream.set_read_timeout(Some(IO_TIMEOUT)).unwrap();
    let mut writer = stream.try_clone().unwrap();
    let mut reader = BufReader::new(stream);
    let mut transcript = Transcript::default();
    let mut endpoint: Option<DataEndpoint> = None;

    for step in script {
        match step {
            Step::Greet => reply(&mut writer, "220 ferryftp test server ready"),
            Step::Reply(text) => reply(&mut writer, text),
            Step::Command(text) => {
                if !read_command(&mut reader, &mut transcript) {
                    break;
                }
                reply(&mut writer, text);
            }
            Step::Pasv => {
                if !read_command(&mut reader, &mut transcript) {
                    break;
                }
                let listener = TcpListener::bind("127.0.0.1:0").unwrap();
                let port = listener.local_addr().unwrap().port();
                let text = format!(
                    "227 Entering Passive Mode (127,0,0,1,{},{})",
                    port >> 8,
                    port & 0xff
                );
                reply(&mut writer, &text);
                endpoint = Some(DataEndpoint::Listener(listener));
            }
            Step::Port => {
                if !read_command(&mut reader, &mut transcript) {
                    break;
                }
                let addr = transcript
                    .commands
                    .last()
                    .and_then(|cmd| parse_port(cmd))
                    .unwrap();
                reply(&mut writer, "200 PORT command successful");
                endpoint = Some(DataEndpoint::Client(addr));
            }
            Step::Send(data) => {
                let mut data_stream = open_data(endpoint.take());
                let _ = data_stream.write_all(&data);
            }
            Step::Receive => {
                let mut data_stream = open_data(endpoint.take());
                let mut data = Vec::new();
                let _ = data_stream.read_to_end(&mut data);
                transcript.received.push(data);
            }
            Step::Hold(data) => {
                let mut data_stream = open_data(endpoint.take());
                let _ = data_stream.write_all(&data);
                let mut buf = [0u8; 1024];
                while let Ok(read) = data_stream.read(&mut buf) {
                    if read == 0 {
                        break;
                    }
                }
            }
            Step::Discard(limit) => {
                let data_stream = open_data(endpoint.take());
                let mut data = Vec::new();
                let _ = data_stream.take(limit as u64).read_to_end(&mut data);
                transcript.received.push(data);
            }
            Step::Tunnel => {
                loop {
                    if !read_command(&mut reader, &mut transcript) {
                        break;
                    }
                    if transcript.commands.last().is_some_and(|line| line.is_empty()) {
                        transcript.commands.pop();
                        break;
                    }
                }
                reply(&mut writer, "HTTP/1.1 200 Connection established\n");
            }
            Step::Stall(duration) => {
                if !read_command(&mut reader, &mut transcript) {
                    break;
                }
                thread::sleep(duration);
            }
            Step::Sleep(duration) => thread::sleep(duration),
        }
    }
    transcript
}

fn reply(writer: &mut TcpStream, text: &str) {
    for line in text.split('\n') {
        let _ = writer.write_all(format!("{line}\r\n").as_bytes());
    }
}

/// Read a command line into the transcript; false on EOF
fn read_command(reader: &mut BufReader<TcpStream>, transcript: &mut Transcript) -> bool {
    let mut line = String::new();
    match reader.read_line(&mut line) {
        Ok(0) | Err(_) => false,
        Ok(_) => {
            transcript
                .commands
                .push(line.trim_end_matches(['\r', '\n']).to_string());
            true
        }
    }
}

fn open_data(endpoint: Option<DataEndpoint>) -> TcpStream {
    let stream = match endpoint {
        Some(DataEndpoint::Listener(listener)) => listener.accept().unwrap().0,
        Some(DataEndpoint::Client(addr)) => TcpStream::connect(addr).unwrap(),
        None => panic!("data connection was not negotiated"),
    };
    stream.set_read_timeout(Some(IO_TIMEOUT)).unwrap();
    stream
}

/// Address of `PORT h1,h2,h3,h4,p1,p2`
fn parse_port(command: &str) -> Option<SocketAddr> {
    let fields = command
        .strip_prefix("PORT ")?
        .split(',')
        .map(|field| field.trim().parse::<u8>().ok())
        .collect::<Option<Vec<u8>>>()?;
    if fields.len() != 6 {
        return None;
    }
    let port = (u16::from(fields[4]) << 8) | u16::from(fields[5]);
    Some(SocketAddr::from((
        [fields[0], fields[1], fields[2], fields[3]],
        port,
    )))
}
