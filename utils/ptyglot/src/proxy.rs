//! The translator proper: converter mode, child spawning and the
//! poll-driven proxy loop between the user's tty and the child's pty.

use crate::options::Options;
use crate::pty::{self, Pty, ReadResult};
use ptyglot_charset::Iso2022;
use snafu::{prelude::*, Whatever};
use std::ffi::CString;
use std::fs::File;
use std::io::{Error, Read, Write};
use std::sync::atomic::Ordering;

type Result<T, E = Whatever> = std::result::Result<T, E>;

const BUFFER_SIZE: usize = 8192;

/// `-c`: transcode stdin to stdout, no terminal involved.
pub fn convert(output: &mut Iso2022) -> Result<i32> {
    let mut stdin = std::io::stdin().lock();
    let mut stdout = std::io::stdout().lock();
    let mut buf = [0u8; BUFFER_SIZE];
    let mut converted = Vec::with_capacity(BUFFER_SIZE * 2);

    loop {
        let n = stdin
            .read(&mut buf)
            .whatever_context("read error on stdin")?;
        if n == 0 {
            break;
        }
        converted.clear();
        output.copy_out(&buf[..n], &mut converted);
        stdout
            .write_all(&converted)
            .whatever_context("write error on stdout")?;
        stdout.flush().whatever_context("write error on stdout")?;
    }
    Ok(0)
}

/// The `-p` rendezvous pipes: the child reports once it owns its tty,
/// the parent replies once the terminal is set up.
struct Handshake {
    p2c: [libc::c_int; 2],
    c2p: [libc::c_int; 2],
}

impl Handshake {
    fn new() -> Result<Self> {
        let mut p2c = [0; 2];
        let mut c2p = [0; 2];
        unsafe {
            if libc::pipe(p2c.as_mut_ptr()) != 0 || libc::pipe(c2p.as_mut_ptr()) != 0 {
                whatever!("couldn't create handshake pipes: {}", Error::last_os_error());
            }
        }
        Ok(Self { p2c, c2p })
    }

    fn wait(fd: libc::c_int) {
        let mut byte = [0u8; 1];
        unsafe {
            libc::read(fd, byte.as_mut_ptr().cast(), 1);
        }
    }

    fn signal(fd: libc::c_int) {
        unsafe {
            libc::write(fd, b"1".as_ptr().cast(), 1);
        }
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Resolve the child command line: the rest of our arguments, or the
/// user's shell.
fn child_command(opts: &Options) -> (String, Vec<String>) {
    let (path, rest) = if opts.child.is_empty() {
        let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
        (shell, &[] as &[String])
    } else {
        (opts.child[0].clone(), &opts.child[1..])
    };

    let argv0 = opts
        .child_argv0
        .clone()
        .unwrap_or_else(|| basename(&path).to_string());
    let mut argv = vec![argv0];
    argv.extend(rest.iter().cloned());
    (path, argv)
}

/// Child half of the fork: become a session leader on the pty slave,
/// rewire stdio and exec. Never returns.
fn child_exec(pty: &Pty, path: &str, argv: &[String], handshake: Option<&Handshake>) -> ! {
    unsafe {
        libc::close(pty.master);
        if let Some(hs) = handshake {
            libc::close(hs.p2c[1]);
            libc::close(hs.c2p[0]);
        }

        if libc::setsid() < 0 {
            libc::_exit(1);
        }
        libc::ioctl(pty.slave, libc::TIOCSCTTY, 0);

        if let Some(hs) = handshake {
            Handshake::signal(hs.c2p[1]);
        }

        libc::dup2(pty.slave, 0);
        libc::dup2(pty.slave, 1);
        libc::dup2(pty.slave, 2);
        if pty.slave > 2 {
            libc::close(pty.slave);
        }

        if let Some(hs) = handshake {
            Handshake::wait(hs.p2c[0]);
            libc::close(hs.p2c[0]);
            libc::close(hs.c2p[1]);
        }

        let Ok(path_c) = CString::new(path) else {
            libc::_exit(1);
        };
        let args_c: Vec<CString> = argv
            .iter()
            .filter_map(|a| CString::new(a.as_str()).ok())
            .collect();
        let mut arg_ptrs: Vec<*const libc::c_char> = args_c.iter().map(|a| a.as_ptr()).collect();
        arg_ptrs.push(std::ptr::null());

        libc::execvp(path_c.as_ptr(), arg_ptrs.as_ptr());
        let _ = writeln!(
            std::io::stderr(),
            "Couldn't exec {path}: {}",
            Error::last_os_error()
        );
        libc::_exit(1);
    }
}

struct RawLog(Option<File>);

impl RawLog {
    fn open(path: &Option<String>) -> Result<Self> {
        match path {
            Some(path) => Ok(Self(Some(File::create(path).with_whatever_context(
                |e| format!("couldn't open log {path}: {e}"),
            )?))),
            None => Ok(Self(None)),
        }
    }

    fn log(&mut self, bytes: &[u8]) {
        if let Some(f) = &mut self.0 {
            let _ = f.write_all(bytes);
        }
    }
}

/// Allocate a pty, spawn the child on it and shuttle bytes between the
/// user's terminal and the child until one side goes away.
pub fn run(opts: &Options, input: &mut Iso2022, output: &mut Iso2022) -> Result<i32> {
    let (path, argv) = child_command(opts);
    let mut input_log = RawLog::open(&opts.input_log)?;
    let mut output_log = RawLog::open(&opts.output_log)?;

    let pty = pty::open_pty()?;
    pty::copy_termios(0, pty.slave)?;
    pty::propagate_window_size(0, pty.slave);

    let handshake = if opts.pipe_handshake {
        Some(Handshake::new()?)
    } else {
        None
    };

    let pid = unsafe { libc::fork() };
    if pid < 0 {
        whatever!("couldn't fork: {}", Error::last_os_error());
    }
    if pid == 0 {
        child_exec(&pty, &path, &argv, handshake.as_ref());
    }

    unsafe {
        libc::close(pty.slave);
        if let Some(hs) = &handshake {
            libc::close(hs.p2c[0]);
            libc::close(hs.c2p[1]);
        }
    }

    if let Some(hs) = &handshake {
        Handshake::wait(hs.c2p[0]);
    }

    pty::install_signal_handlers()?;
    let raw_guard = pty::set_raw(0)?;
    pty::set_nonblocking(0, true);
    pty::set_nonblocking(pty.master, true);

    if let Some(hs) = &handshake {
        Handshake::signal(hs.p2c[1]);
        unsafe {
            libc::close(hs.p2c[1]);
            libc::close(hs.c2p[0]);
        }
    }

    let result = proxy_loop(opts, input, output, pty.master, &mut input_log, &mut output_log);

    drop(raw_guard);
    pty::set_nonblocking(0, false);
    unsafe {
        libc::close(pty.master);
    }

    result.map(|_| 0)
}

fn proxy_loop(
    opts: &Options,
    input: &mut Iso2022,
    output: &mut Iso2022,
    master: libc::c_int,
    input_log: &mut RawLog,
    output_log: &mut RawLog,
) -> Result<()> {
    let mut buf = [0u8; BUFFER_SIZE];
    let mut converted = Vec::with_capacity(BUFFER_SIZE * 2);

    loop {
        let mut fds = [
            libc::pollfd {
                fd: 0,
                events: libc::POLLIN,
                revents: 0,
            },
            libc::pollfd {
                fd: master,
                events: libc::POLLIN,
                revents: 0,
            },
        ];
        let rc = unsafe { libc::poll(fds.as_mut_ptr(), 2, -1) };

        if pty::SIGWINCH_SEEN.swap(false, Ordering::Relaxed) {
            pty::propagate_window_size(0, master);
        }
        if pty::SIGCHLD_SEEN.swap(false, Ordering::Relaxed) && opts.exit_on_child {
            return Ok(());
        }

        if rc < 0 {
            let err = Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                continue;
            }
            whatever!("poll error: {err}");
        }

        // Child output first: it tends to be the bulk of the traffic.
        if fds[1].revents & (libc::POLLIN | libc::POLLHUP) != 0 {
            match pty::read_fd(master, &mut buf)? {
                ReadResult::Closed => return Ok(()),
                ReadResult::WouldBlock => {}
                ReadResult::Data(n) => {
                    output_log.log(&buf[..n]);
                    converted.clear();
                    output.copy_out(&buf[..n], &mut converted);
                    pty::write_all(1, &converted)?;
                }
            }
        }

        if fds[0].revents & (libc::POLLIN | libc::POLLHUP) != 0 {
            match pty::read_fd(0, &mut buf)? {
                ReadResult::Closed => return Ok(()),
                ReadResult::WouldBlock => {}
                ReadResult::Data(n) => {
                    input_log.log(&buf[..n]);
                    converted.clear();
                    input.copy_in(&buf[..n], &mut converted);
                    pty::write_all(master, &converted)?;
                }
            }
        }
    }
}
