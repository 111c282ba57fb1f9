//! Thin wrappers over the tty, pty and signal plumbing.

use snafu::{prelude::*, Whatever};
use std::io::Error;
use std::sync::atomic::{AtomicBool, Ordering};

type Result<T, E = Whatever> = std::result::Result<T, E>;

pub static SIGWINCH_SEEN: AtomicBool = AtomicBool::new(false);
pub static SIGCHLD_SEEN: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigwinch(_: libc::c_int) {
    SIGWINCH_SEEN.store(true, Ordering::Relaxed);
}

extern "C" fn on_sigchld(_: libc::c_int) {
    SIGCHLD_SEEN.store(true, Ordering::Relaxed);
}

fn install(signal: libc::c_int, handler: extern "C" fn(libc::c_int)) -> Result<()> {
    // No SA_RESTART: a signal must break poll() so the flags get seen.
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = handler as libc::sighandler_t;
        action.sa_flags = 0;
        libc::sigemptyset(&mut action.sa_mask);
        if libc::sigaction(signal, &action, std::ptr::null_mut()) != 0 {
            whatever!("sigaction failed: {}", Error::last_os_error());
        }
    }
    Ok(())
}

pub fn install_signal_handlers() -> Result<()> {
    install(libc::SIGWINCH, on_sigwinch)?;
    install(libc::SIGCHLD, on_sigchld)
}

pub struct Pty {
    pub master: libc::c_int,
    pub slave: libc::c_int,
}

pub fn open_pty() -> Result<Pty> {
    let mut master = 0;
    let mut slave = 0;
    let rc = unsafe {
        libc::openpty(
            &mut master,
            &mut slave,
            std::ptr::null_mut(),
            std::ptr::null(),
            std::ptr::null(),
        )
    };
    if rc != 0 {
        whatever!("couldn't allocate pty: {}", Error::last_os_error());
    }
    Ok(Pty { master, slave })
}

pub fn copy_termios(from: libc::c_int, to: libc::c_int) -> Result<()> {
    unsafe {
        let mut t: libc::termios = std::mem::zeroed();
        if libc::tcgetattr(from, &mut t) != 0 {
            whatever!("couldn't read terminal settings: {}", Error::last_os_error());
        }
        if libc::tcsetattr(to, libc::TCSAFLUSH, &t) != 0 {
            whatever!("couldn't copy terminal settings: {}", Error::last_os_error());
        }
    }
    Ok(())
}

/// Puts a tty into raw mode; the saved settings come back on drop.
pub struct RawModeGuard {
    fd: libc::c_int,
    saved: libc::termios,
}

pub fn set_raw(fd: libc::c_int) -> Result<RawModeGuard> {
    unsafe {
        let mut saved: libc::termios = std::mem::zeroed();
        if libc::tcgetattr(fd, &mut saved) != 0 {
            whatever!("couldn't read terminal settings: {}", Error::last_os_error());
        }
        let mut raw = saved;
        libc::cfmakeraw(&mut raw);
        if libc::tcsetattr(fd, libc::TCSANOW, &raw) != 0 {
            whatever!("couldn't set terminal to raw: {}", Error::last_os_error());
        }
        Ok(RawModeGuard { fd, saved })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        unsafe {
            libc::tcsetattr(self.fd, libc::TCSANOW, &self.saved);
        }
    }
}

pub fn set_nonblocking(fd: libc::c_int, on: bool) {
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL, 0);
        if flags >= 0 {
            let flags = if on {
                flags | libc::O_NONBLOCK
            } else {
                flags & !libc::O_NONBLOCK
            };
            libc::fcntl(fd, libc::F_SETFL, flags);
        }
    }
}

/// Mirror the window size of `from` onto `to`; the kernel raises
/// SIGWINCH in the foreground process group of `to` by itself.
pub fn propagate_window_size(from: libc::c_int, to: libc::c_int) {
    unsafe {
        let mut size: libc::winsize = std::mem::zeroed();
        if libc::ioctl(from, libc::TIOCGWINSZ, &mut size) == 0 {
            libc::ioctl(to, libc::TIOCSWINSZ, &size);
        }
    }
}

pub enum ReadResult {
    Data(usize),
    WouldBlock,
    Closed,
}

pub fn read_fd(fd: libc::c_int, buf: &mut [u8]) -> Result<ReadResult> {
    loop {
        let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
        if n > 0 {
            return Ok(ReadResult::Data(n as usize));
        }
        if n == 0 {
            return Ok(ReadResult::Closed);
        }
        let err = Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EINTR) => continue,
            Some(libc::EAGAIN) => return Ok(ReadResult::WouldBlock),
            // A pty master reports EIO once the child side is gone.
            Some(libc::EIO) => return Ok(ReadResult::Closed),
            _ => whatever!("read error: {err}"),
        }
    }
}

pub fn write_all(fd: libc::c_int, buf: &[u8]) -> Result<()> {
    let mut rest = buf;
    while !rest.is_empty() {
        let n = unsafe { libc::write(fd, rest.as_ptr().cast(), rest.len()) };
        if n >= 0 {
            rest = &rest[n as usize..];
            continue;
        }
        let err = Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EINTR) => continue,
            Some(libc::EAGAIN) => {
                let mut fds = [libc::pollfd {
                    fd,
                    events: libc::POLLOUT,
                    revents: 0,
                }];
                unsafe {
                    libc::poll(fds.as_mut_ptr(), 1, -1);
                }
            }
            _ => whatever!("write error: {err}"),
        }
    }
    Ok(())
}
