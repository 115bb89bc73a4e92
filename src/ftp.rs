//! Blocking FTP client for the archive's bulk transfer service.
//!
//! The transfer side of the archive is plain anonymous FTP: log in, walk
//! down `user/order_id`, list or fetch files in binary mode, log out.
//! Sessions are strictly per-call: callers open a fresh [`FtpSession`],
//! run one operation, and drop it. `Drop` sends a best-effort `QUIT`, so
//! the server sees a logout on every exit path, including when a transfer
//! fails halfway through a batch.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, trace};

use crate::error::{Error, Result};

pub(crate) struct FtpSession {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    timeout: Duration,
    alive: bool,
}

pub(crate) struct Reply {
    pub(crate) code: u16,
    pub(crate) text: String,
}

impl FtpSession {
    /// Connects to `host` (port 21 unless one is given) and reads the
    /// greeting. Read and write timeouts apply to the whole session,
    /// data connections included.
    pub(crate) fn connect(host: &str, timeout: Duration) -> Result<Self> {
        let authority = if host.contains(':') {
            host.to_string()
        } else {
            format!("{host}:21")
        };
        let addr = authority.to_socket_addrs()?.next().ok_or_else(|| Error::Ftp {
            detail: format!("cannot resolve {authority}"),
        })?;
        let stream = TcpStream::connect_timeout(&addr, timeout)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        let writer = stream.try_clone()?;

        let mut session = FtpSession {
            reader: BufReader::new(stream),
            writer,
            timeout,
            alive: true,
        };
        let greeting = session.read_reply()?;
        if greeting.code != 220 {
            return Err(refused("connect", &greeting));
        }
        debug!(host = %authority, "ftp session opened");
        Ok(session)
    }

    /// Anonymous login followed by `TYPE I`; the archive's transfer
    /// service takes no credentials.
    pub(crate) fn login_anonymous(&mut self) -> Result<()> {
        let reply = self.command("USER anonymous")?;
        match reply.code {
            230 => {}
            331 => {
                self.expect("PASS anonymous@", &[230])?;
            }
            _ => return Err(refused("USER", &reply)),
        }
        self.expect("TYPE I", &[200])?;
        Ok(())
    }

    pub(crate) fn cwd(&mut self, dir: &str) -> Result<()> {
        self.expect(&format!("CWD {dir}"), &[250])?;
        Ok(())
    }

    /// Names in the current directory, in the order the server lists them.
    pub(crate) fn nlst(&mut self) -> Result<Vec<String>> {
        let data = self.passive()?;
        self.expect("NLST", &[125, 150])?;

        let mut names = Vec::new();
        for line in BufReader::new(data).lines() {
            let line = line?;
            let name = line.trim_end_matches('\r');
            if !name.is_empty() {
                names.push(name.to_string());
            }
        }

        self.read_final()?;
        Ok(names)
    }

    /// Server-reported size of `name`, where supported.
    pub(crate) fn size(&mut self, name: &str) -> Result<Option<u64>> {
        let reply = self.command(&format!("SIZE {name}"))?;
        if reply.code == 213 {
            Ok(reply.text.trim().parse().ok())
        } else {
            Ok(None)
        }
    }

    /// Retrieves `name` in binary mode into `sink`, returning the byte
    /// count. A refusal or a mid-stream I/O failure is terminal for the
    /// call; whatever `sink` already received is left as is.
    pub(crate) fn retr(&mut self, name: &str, sink: &mut dyn Write) -> Result<u64> {
        let mut data = self.passive()?;
        self.expect(&format!("RETR {name}"), &[125, 150])?;

        let mut buf = [0u8; 64 * 1024];
        let mut total = 0u64;
        loop {
            let n = data.read(&mut buf)?;
            if n == 0 {
                break;
            }
            sink.write_all(&buf[..n])?;
            total += n as u64;
        }
        sink.flush()?;
        drop(data);

        self.read_final()?;
        trace!(file = name, bytes = total, "retrieved");
        Ok(total)
    }

    /// Clean logout.
    pub(crate) fn quit(mut self) -> Result<()> {
        self.alive = false;
        let reply = self.command("QUIT")?;
        if reply.code != 221 {
            debug!(code = reply.code, "unexpected QUIT reply");
        }
        Ok(())
    }

    fn command(&mut self, cmd: &str) -> Result<Reply> {
        trace!(cmd, "ftp command");
        self.writer.write_all(cmd.as_bytes())?;
        self.writer.write_all(b"\r\n")?;
        self.writer.flush()?;
        self.read_reply()
    }

    fn expect(&mut self, cmd: &str, accept: &[u16]) -> Result<Reply> {
        let reply = self.command(cmd)?;
        if accept.contains(&reply.code) {
            Ok(reply)
        } else {
            Err(refused(cmd, &reply))
        }
    }

    /// Completion reply after a data transfer.
    fn read_final(&mut self) -> Result<()> {
        let reply = self.read_reply()?;
        if matches!(reply.code, 226 | 250) {
            Ok(())
        } else {
            Err(refused("transfer", &reply))
        }
    }

    fn read_reply(&mut self) -> Result<Reply> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(Error::Ftp {
                detail: "connection closed by server".to_string(),
            });
        }
        let bytes = line.as_bytes();
        if bytes.len() < 4 || !bytes[..3].iter().all(u8::is_ascii_digit) {
            return Err(Error::Ftp {
                detail: format!("malformed reply: {}", line.trim_end()),
            });
        }
        let code = line[..3].parse::<u16>().map_err(|_| Error::Ftp {
            detail: format!("malformed reply: {}", line.trim_end()),
        })?;
        let mut text = line[4..].trim_end().to_string();

        // nnn- opens a multi-line reply terminated by "nnn ".
        if bytes[3] == b'-' {
            let prefix = line[..3].to_string();
            loop {
                let mut next = String::new();
                if self.reader.read_line(&mut next)? == 0 {
                    return Err(Error::Ftp {
                        detail: "connection closed mid-reply".to_string(),
                    });
                }
                let done =
                    next.len() >= 4 && next.starts_with(&prefix) && next.as_bytes()[3] == b' ';
                text.push('\n');
                text.push_str(next.trim_end());
                if done {
                    break;
                }
            }
        }

        trace!(code, "ftp reply");
        Ok(Reply { code, text })
    }

    /// Opens the data connection advertised by a `PASV` reply.
    fn passive(&mut self) -> Result<TcpStream> {
        let reply = self.expect("PASV", &[227])?;
        let (host, port) = parse_passive(&reply.text).ok_or_else(|| Error::Ftp {
            detail: format!("unparseable PASV reply: {}", reply.text),
        })?;
        let addr = (host.as_str(), port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| Error::Ftp {
                detail: format!("cannot resolve data address {host}:{port}"),
            })?;
        let stream = TcpStream::connect_timeout(&addr, self.timeout)?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;
        Ok(stream)
    }
}

impl Drop for FtpSession {
    fn drop(&mut self) {
        if self.alive {
            // Logout when an operation bailed out mid-session; the reply
            // is not waited for.
            let _ = self.writer.write_all(b"QUIT\r\n");
            let _ = self.writer.flush();
        }
    }
}

fn refused(what: &str, reply: &Reply) -> Error {
    Error::Ftp {
        detail: format!("{what} refused: {} {}", reply.code, reply.text),
    }
}

fn parse_passive(text: &str) -> Option<(String, u16)> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| {
        Regex::new(r"(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3})")
            .expect("PASV pattern compiles")
    });
    let caps = re.captures(text)?;
    let mut fields = [0u8; 6];
    for (i, field) in fields.iter_mut().enumerate() {
        *field = caps[i + 1].parse().ok()?;
    }
    let host = format!("{}.{}.{}.{}", fields[0], fields[1], fields[2], fields[3]);
    let port = u16::from(fields[4]) * 256 + u16::from(fields[5]);
    Some((host, port))
}

/// Scripted loopback FTP server used by this module's tests and by the
/// client workflow tests.
#[cfg(test)]
pub(crate) mod mock {
    use std::io::{BufRead, BufReader, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread::{self, JoinHandle};

    #[derive(Default)]
    pub(crate) struct MockFtp {
        /// Directory names `CWD` accepts, regardless of nesting.
        pub(crate) dirs: Vec<String>,
        /// Files served by `NLST`, `SIZE` and `RETR`, in listing order.
        pub(crate) files: Vec<(String, Vec<u8>)>,
        /// File name whose `RETR` is refused with 550.
        pub(crate) fail_retr: Option<String>,
    }

    pub(crate) struct MockFtpHandle {
        pub(crate) addr: String,
        handle: JoinHandle<Vec<String>>,
    }

    impl MockFtpHandle {
        /// Waits for the session to end and returns the command log.
        pub(crate) fn finish(self) -> Vec<String> {
            self.handle.join().expect("mock ftp thread")
        }
    }

    pub(crate) fn spawn(cfg: MockFtp) -> MockFtpHandle {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = format!("127.0.0.1:{}", listener.local_addr().unwrap().port());
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            serve(stream, cfg)
        });
        MockFtpHandle { addr, handle }
    }

    fn serve(stream: TcpStream, cfg: MockFtp) -> Vec<String> {
        let mut log = Vec::new();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut control = stream;
        let mut data_listener: Option<TcpListener> = None;

        reply(&mut control, "220 mock archive transfer service");

        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).unwrap_or(0) == 0 {
                break;
            }
            let line = line.trim_end().to_string();
            log.push(line.clone());
            let (cmd, arg) = match line.split_once(' ') {
                Some((c, a)) => (c, a),
                None => (line.as_str(), ""),
            };

            match cmd {
                "USER" => reply(&mut control, "331 anonymous ok, send email as password"),
                "PASS" => reply(&mut control, "230 logged in"),
                "TYPE" => reply(&mut control, "200 type set"),
                "CWD" => {
                    if cfg.dirs.iter().any(|d| d == arg) {
                        reply(&mut control, "250 directory changed");
                    } else {
                        reply(&mut control, "550 No such directory");
                    }
                }
                "PASV" => {
                    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
                    let port = listener.local_addr().unwrap().port();
                    reply(
                        &mut control,
                        &format!(
                            "227 Entering Passive Mode (127,0,0,1,{},{}).",
                            port / 256,
                            port % 256
                        ),
                    );
                    data_listener = Some(listener);
                }
                "NLST" => {
                    reply(&mut control, "150 listing follows");
                    let listener = data_listener.take().unwrap();
                    let (mut data, _) = listener.accept().unwrap();
                    for (name, _) in &cfg.files {
                        write!(data, "{name}\r\n").unwrap();
                    }
                    drop(data);
                    reply(&mut control, "226 listing complete");
                }
                "SIZE" => match cfg.files.iter().find(|(name, _)| name == arg) {
                    Some((_, content)) => {
                        reply(&mut control, &format!("213 {}", content.len()));
                    }
                    None => reply(&mut control, "550 Could not get file size"),
                },
                "RETR" => {
                    if cfg.fail_retr.as_deref() == Some(arg) {
                        drop(data_listener.take());
                        reply(&mut control, "550 Failed to open file");
                    } else if let Some((_, content)) =
                        cfg.files.iter().find(|(name, _)| name == arg)
                    {
                        reply(&mut control, "150 opening binary connection");
                        let listener = data_listener.take().unwrap();
                        let (mut data, _) = listener.accept().unwrap();
                        data.write_all(content).unwrap();
                        drop(data);
                        reply(&mut control, "226 transfer complete");
                    } else {
                        drop(data_listener.take());
                        reply(&mut control, "550 No such file");
                    }
                }
                "QUIT" => {
                    reply(&mut control, "221 goodbye");
                    break;
                }
                _ => reply(&mut control, "502 command not implemented"),
            }
        }

        log
    }

    fn reply(control: &mut TcpStream, line: &str) {
        // The client may have dropped the control socket already (quit on
        // Drop does not wait for a reply), so write errors are ignored.
        let _ = write!(control, "{line}\r\n");
        let _ = control.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{MockFtp, spawn};
    use super::*;

    fn timeout() -> Duration {
        Duration::from_secs(5)
    }

    fn file(name: &str, content: &[u8]) -> (String, Vec<u8>) {
        (name.to_string(), content.to_vec())
    }

    fn open(addr: &str) -> FtpSession {
        let mut session = FtpSession::connect(addr, timeout()).unwrap();
        session.login_anonymous().unwrap();
        session
    }

    #[test]
    fn login_navigate_and_list_preserves_remote_order() {
        let server = spawn(MockFtp {
            dirs: vec!["jdoe".to_string(), "75000".to_string()],
            files: vec![file("f2.nc", b"two"), file("f1.nc", b"one")],
            ..Default::default()
        });

        let mut session = open(&server.addr);
        session.cwd("jdoe").unwrap();
        session.cwd("75000").unwrap();
        assert_eq!(session.nlst().unwrap(), vec!["f2.nc", "f1.nc"]);
        session.quit().unwrap();

        let log = server.finish();
        assert!(log.iter().any(|c| c == "QUIT"));
    }

    #[test]
    fn cwd_to_unknown_directory_is_an_error() {
        let server = spawn(MockFtp {
            dirs: vec!["jdoe".to_string()],
            ..Default::default()
        });

        let mut session = open(&server.addr);
        let err = session.cwd("nobody").unwrap_err();
        assert!(matches!(err, Error::Ftp { .. }));
        session.quit().unwrap();
        server.finish();
    }

    #[test]
    fn retr_streams_the_file_body() {
        let server = spawn(MockFtp {
            files: vec![file("sgpmetE13.b1.20200101.000000.cdf", b"binary bytes")],
            ..Default::default()
        });

        let mut session = open(&server.addr);
        let mut sink: Vec<u8> = Vec::new();
        let total = session
            .retr("sgpmetE13.b1.20200101.000000.cdf", &mut sink)
            .unwrap();
        assert_eq!(total, 12);
        assert_eq!(sink, b"binary bytes");
        session.quit().unwrap();
        server.finish();
    }

    #[test]
    fn size_is_best_effort() {
        let server = spawn(MockFtp {
            files: vec![file("f1.nc", b"12345")],
            ..Default::default()
        });

        let mut session = open(&server.addr);
        assert_eq!(session.size("f1.nc").unwrap(), Some(5));
        assert_eq!(session.size("missing.nc").unwrap(), None);
        session.quit().unwrap();
        server.finish();
    }

    #[test]
    fn dropped_session_still_logs_out() {
        let server = spawn(MockFtp {
            files: vec![file("f1.nc", b"one")],
            fail_retr: Some("f1.nc".to_string()),
            ..Default::default()
        });

        let mut session = open(&server.addr);
        let mut sink: Vec<u8> = Vec::new();
        let err = session.retr("f1.nc", &mut sink).unwrap_err();
        assert!(matches!(err, Error::Ftp { .. }));
        drop(session);

        let log = server.finish();
        assert!(log.iter().any(|c| c == "QUIT"));
    }
}
