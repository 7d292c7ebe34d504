use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use ferryftp::{FtpClient, ItemKind, Mode, DEFAULT_PORT};

pub fn quit(ftp: &mut FtpClient, timeout: Duration) {
    match ftp.disconnect(timeout) {
        Ok(_) => println!("OK"),
        Err(err) => eprintln!("Failed to disconnect from remote: {}", err),
    }
}

pub fn cdup(ftp: &mut FtpClient, timeout: Duration) {
    match ftp.cdup(timeout) {
        Ok(_) => println!("OK"),
        Err(err) => eprintln!("CDUP error: {}", err),
    }
}

pub fn connect(ftp: &mut FtpClient, timeout: Duration, remote: &str) {
    let (host, port) = match remote.rsplit_once(':') {
        Some((host, port)) => match port.parse::<u16>() {
            Ok(port) => (host, port),
            Err(_) => {
                eprintln!("Invalid port: {}", port);
                return;
            }
        },
        None => (remote, DEFAULT_PORT),
    };
    // drop the previous session, if any
    if let Err(err) = ftp.disconnect(timeout) {
        eprintln!("Failed to disconnect from remote: {}", err);
    }
    match ftp.connect(timeout, host, port) {
        Ok(_) => {
            if let Some(welcome) = ftp.welcome_message() {
                println!("{}", welcome);
            }
            println!("OK");
        }
        Err(err) => eprintln!("Failed to connect to remote: {}", err),
    }
}

pub fn cwd(ftp: &mut FtpClient, timeout: Duration, dir: &str) {
    match ftp.cwd(timeout, dir) {
        Ok(_) => println!("OK"),
        Err(err) => eprintln!("CWD error: {}", err),
    }
}

pub fn list(ftp: &mut FtpClient, timeout: Duration, p: Option<&str>) {
    match ftp.get_directory_list(timeout, p) {
        Ok(items) => items.iter().for_each(|item| {
            let kind = match item.kind() {
                ItemKind::Directory => 'd',
                ItemKind::File => '-',
                ItemKind::Symlink => 'l',
                ItemKind::Unknown => '?',
            };
            let size = item.size().map(|s| s.to_string()).unwrap_or_default();
            let modified = item
                .modified()
                .map(|m| m.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            match item.link_target() {
                Some(target) => println!(
                    "{} {:>12} {:16} {} -> {}",
                    kind,
                    size,
                    modified,
                    item.name(),
                    target
                ),
                None => println!("{} {:>12} {:16} {}", kind, size, modified, item.name()),
            }
        }),
        Err(err) => eprintln!("LIST error: {}", err),
    }
}

pub fn login(ftp: &mut FtpClient, timeout: Duration) {
    // Read username
    print!("Username: ");
    let _ = io::stdout().flush();
    let mut username = String::new();
    if let Err(err) = io::stdin().read_line(&mut username) {
        eprintln!("Could not read username: {}", err);
        return;
    }
    // Read password
    let password: String = match rpassword::prompt_password("Password: ") {
        Ok(p) => p,
        Err(err) => {
            eprintln!("Could not read password: {}", err);
            return;
        }
    };
    // Login
    match ftp.login(timeout, username.trim(), password.as_str()) {
        Ok(_) => println!("OK"),
        Err(err) => eprintln!("LOGIN error: {}", err),
    }
}

pub fn mdtm(ftp: &mut FtpClient, timeout: Duration, f: &str) {
    match ftp.mdtm(timeout, f) {
        Ok(time) => println!("OK: {}", time),
        Err(err) => eprintln!("MDTM error: {}", err),
    }
}

pub fn mkdir(ftp: &mut FtpClient, timeout: Duration, f: &str) {
    match ftp.mkdir(timeout, f) {
        Ok(_) => println!("OK"),
        Err(err) => eprintln!("MKDIR error: {}", err),
    }
}

pub fn set_mode(ftp: &mut FtpClient, mode: Mode) {
    ftp.set_mode(mode);
    println!("OK");
}

pub fn noop(ftp: &mut FtpClient, timeout: Duration) {
    match ftp.noop(timeout) {
        Ok(_) => println!("OK"),
        Err(err) => eprintln!("NOOP error: {}", err),
    }
}

pub fn put(ftp: &mut FtpClient, timeout: Duration, local: &Path, dest: &str) {
    let mut reader = match File::open(local) {
        Ok(r) => r,
        Err(err) => {
            eprintln!("Failed to open local file for read: {}", err);
            return;
        }
    };
    match ftp.put_file(timeout, dest, &mut reader) {
        Ok(bytes) => println!("OK: {} bytes", bytes),
        Err(err) => eprintln!("PUT error: {}", err),
    }
}

pub fn put_unique(ftp: &mut FtpClient, timeout: Duration, local: &Path) {
    let mut reader = match File::open(local) {
        Ok(r) => r,
        Err(err) => {
            eprintln!("Failed to open local file for read: {}", err);
            return;
        }
    };
    let hint = local
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    match ftp.put_file_unique(timeout, hint.as_str(), &mut reader) {
        Ok(name) => println!("OK: stored as {}", name),
        Err(err) => eprintln!("PUTU error: {}", err),
    }
}

pub fn pwd(ftp: &mut FtpClient, timeout: Duration) {
    match ftp.pwd(timeout) {
        Ok(p) => println!("OK: {}", p),
        Err(err) => eprintln!("PWD error: {}", err),
    }
}

pub fn rename(ftp: &mut FtpClient, timeout: Duration, src: &str, dest: &str) {
    match ftp.rename(timeout, src, dest) {
        Ok(_) => println!("OK"),
        Err(err) => eprintln!("RENAME error: {}", err),
    }
}

/// Download `file` to `dest`; an existing `dest` is resumed from its current size
pub fn get(ftp: &mut FtpClient, timeout: Duration, file: &str, dest: &Path) {
    let mut dest: File = match OpenOptions::new().create(true).append(true).open(dest) {
        Ok(d) => d,
        Err(err) => {
            eprintln!("Failed to open destination file: {}", err);
            return;
        }
    };
    let offset = dest.metadata().map(|m| m.len()).unwrap_or(0);
    let result = if offset > 0 {
        println!("Resuming from {} bytes", offset);
        ftp.resume_file(timeout, file, offset, &mut dest)
    } else {
        ftp.get_file_to(timeout, file, &mut dest)
    };
    match result {
        Ok(bytes) => println!("OK: {} bytes", bytes),
        Err(err) => eprintln!("GET error: {}", err),
    }
}

pub fn rm(ftp: &mut FtpClient, timeout: Duration, file: &str) {
    match ftp.delete_file(timeout, file) {
        Ok(_) => println!("OK"),
        Err(err) => eprintln!("RM error: {}", err),
    }
}

pub fn rmdir(ftp: &mut FtpClient, timeout: Duration, dir: &str) {
    match ftp.rmdir(timeout, dir) {
        Ok(_) => println!("OK"),
        Err(err) => eprintln!("RMDIR error: {}", err),
    }
}

pub fn size(ftp: &mut FtpClient, timeout: Duration, file: &str) {
    match ftp.size(timeout, file) {
        Ok(size) => println!("OK: {}", size),
        Err(err) => eprintln!("SIZE error: {}", err),
    }
}
