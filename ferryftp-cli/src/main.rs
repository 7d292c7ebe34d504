//! # ferryftp client
//!
//! This is a client you can install via `cargo install ferryftp-cli` on your system to connect and work with FTP servers
//!

// -- mods
mod actions;
mod args;
mod command;

use std::io;
use std::io::Write;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;

use actions::*;
use args::Args;
use command::Command;
use env_logger::Builder as LogBuilder;
use ferryftp::{FtpClient, ProxyInfo, SessionState};
use log::LevelFilter;

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
const APP_AUTHORS: &str = env!("CARGO_PKG_AUTHORS");

fn usage() {
    println!("Available commands:");
    println!("CDUP                                Go to parent directory");
    println!("CONNECT <host[:port]>               Connect to remote host");
    println!("CWD <dir>                           Change working directory");
    println!("GET <file> <dest>                   Download `file` to `dest`; resumes if `dest` exists");
    println!("HELP                                Print this help");
    println!("LIST [dir]                          List files. If directory is not provided, current directory is used");
    println!("LOGIN                               Login to remote");
    println!("MDTM <file>                         Get modification time for `file`");
    println!("MKDIR <dir>                         Create directory");
    println!("MODE <PASSIVE|ACTIVE>               Set mode");
    println!("NOOP                                Ping server");
    println!("PUT <file> <dest>                   Upload local file `file` to `dest`");
    println!("PUTU <file>                         Upload local file `file` with a name chosen by the server");
    println!("PWD                                 Print working directory");
    println!("QUIT                                Quit ferryftp");
    println!("RENAME <source> <dest>              Rename file `source` to `dest`");
    println!("RM <file>                           Remove file");
    println!("RMDIR <dir>                         Remove directory");
    println!("SIZE <file>                         Get `file` size");
}

/// Read the next command; `None` on end of input
fn input() -> Option<Command> {
    loop {
        print!(">> ");
        let _ = io::stdout().flush();
        let mut input: String = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(0) => return None,
            Ok(_) => {}
            Err(err) => {
                eprintln!("Failed to read stdin: {}", err);
                return None;
            }
        }
        // Try to create command
        match Command::from_str(input.as_str()) {
            Ok(cmd) => return Some(cmd),
            Err(err) => println!("{}", err),
        }
    }
}

fn main() -> ExitCode {
    let args: Args = argh::from_env();
    // print version
    if args.version {
        println!("ferryftp {APP_VERSION} - developed by {APP_AUTHORS}")
    }
    // init logger
    LogBuilder::new()
        .filter_level(if args.debug {
            LevelFilter::Trace
        } else if args.verbose {
            LevelFilter::Info
        } else {
            LevelFilter::Off
        })
        .init();
    // setup client
    let proxy = match args.proxy.as_deref() {
        Some(url) => ProxyInfo::from_str(url).map(Some),
        None => ProxyInfo::from_env(),
    };
    let mut ftp = FtpClient::new();
    match proxy {
        Ok(proxy) => ftp.set_proxy(proxy),
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::FAILURE;
        }
    }
    ftp.set_passive_mode(!args.active);
    let timeout = Duration::from_secs(args.timeout);

    // connect if host is specified
    if let Some(host) = args.host {
        connect(&mut ftp, timeout, host.as_str());
    }

    // Main loop
    while let Some(command) = input() {
        match command {
            Command::Quit => break,
            Command::Help => usage(),
            cmd => perform(&mut ftp, timeout, cmd),
        }
    }
    if ftp.state() != SessionState::Disconnected {
        quit(&mut ftp, timeout);
    }
    ExitCode::SUCCESS
}

fn perform(ftp: &mut FtpClient, timeout: Duration, command: Command) {
    match command {
        Command::Cdup => cdup(ftp, timeout),
        Command::Connect(remote) => connect(ftp, timeout, remote.as_str()),
        Command::Cwd(dir) => cwd(ftp, timeout, dir.as_str()),
        Command::Get(file, dest) => get(ftp, timeout, file.as_str(), dest.as_path()),
        Command::List(p) => list(ftp, timeout, p.as_deref()),
        Command::Login => login(ftp, timeout),
        Command::Mdtm(p) => mdtm(ftp, timeout, p.as_str()),
        Command::Mkdir(p) => mkdir(ftp, timeout, p.as_str()),
        Command::Mode(m) => set_mode(ftp, m),
        Command::Noop => noop(ftp, timeout),
        Command::Put(src, dest) => put(ftp, timeout, src.as_path(), dest.as_str()),
        Command::PutUnique(src) => put_unique(ftp, timeout, src.as_path()),
        Command::Pwd => pwd(ftp, timeout),
        Command::Rename(src, dest) => rename(ftp, timeout, src.as_str(), dest.as_str()),
        Command::Rm(file) => rm(ftp, timeout, file.as_str()),
        Command::Rmdir(file) => rmdir(ftp, timeout, file.as_str()),
        Command::Size(file) => size(ftp, timeout, file.as_str()),
        Command::Help | Command::Quit => {
            eprintln!("Something unexpected happened")
        }
    }
}
