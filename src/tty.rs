//! Serial console backed by a tty device node

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};
use std::{io, mem};

use tracing::debug;

use crate::console::Console;

/// Raw-mode serial port
///
/// Reads never block, an empty input queue polls as `None` and a hangup is an `UnexpectedEof`
/// error. Writes block until the driver takes the byte.
pub struct Tty {
    fd: RawFd,
    path: PathBuf,
}

impl Tty {
    /// Opens a serial device node in raw mode at `baud` bits per second
    ///
    /// # Arguments
    ///
    /// * `path` - Device node, e.g. `/dev/ttyUSB0`
    /// * `baud` - Line rate, one of the standard rates up to 230400
    pub fn open<P: AsRef<Path>>(path: P, baud: u32) -> io::Result<Self> {
        let path = path.as_ref();
        let speed = speed(baud)?;
        let fd = open(path, libc::O_RDWR | libc::O_NOCTTY | libc::O_NONBLOCK)?;
        let tty = Tty {
            fd,
            path: PathBuf::from(path),
        };

        unsafe {
            let mut termios: libc::termios = mem::zeroed();
            check(libc::tcgetattr(tty.fd, &mut termios))?;
            libc::cfmakeraw(&mut termios);
            termios.c_cflag |= libc::CLOCAL | libc::CREAD;
            check(libc::cfsetispeed(&mut termios, speed))?;
            check(libc::cfsetospeed(&mut termios, speed))?;
            check(libc::tcsetattr(tty.fd, libc::TCSANOW, &termios))?;
        }

        debug!(path = %tty.path.display(), baud, "Opened serial console");
        Ok(tty)
    }

    /// Returns the device node path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the raw fd of the device
    pub fn fd(&self) -> RawFd {
        self.fd
    }

    /// Wait until the fd reports `events` or `timeout_ms` passed (-1 waits forever)
    ///
    /// Returns the number of ready descriptors, 0 on timeout.
    fn poll(&self, events: libc::c_short, timeout_ms: libc::c_int) -> io::Result<usize> {
        let mut pollfd = libc::pollfd {
            fd: self.fd,
            events,
            revents: 0,
        };
        match unsafe { libc::poll(&mut pollfd, 1, timeout_ms) } {
            -1 => Err(io::Error::last_os_error()),
            ret => Ok(ret as usize),
        }
    }
}

impl Drop for Tty {
    fn drop(&mut self) {
        unsafe {
            // ignore errors
            let _ = libc::close(self.fd);
        }
    }
}

impl Console for Tty {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = 0u8;
        let ret = unsafe { libc::read(self.fd, &mut byte as *mut u8 as *mut libc::c_void, 1) };
        match ret {
            1 => Ok(Some(byte)),
            // hangup, e.g. an unplugged USB adapter
            0 => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "serial link hung up")),
            _ => {
                let e = io::Error::last_os_error();
                if e.kind() == io::ErrorKind::WouldBlock {
                    Ok(None)
                } else {
                    Err(e)
                }
            }
        }
    }

    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        loop {
            let ret = unsafe { libc::write(self.fd, &byte as *const u8 as *const libc::c_void, 1) };
            if ret == 1 {
                return Ok(());
            }

            let e = io::Error::last_os_error();
            match e.kind() {
                io::ErrorKind::WouldBlock => {
                    self.poll(libc::POLLOUT, -1)?;
                }
                io::ErrorKind::Interrupted => {}
                _ => return Err(e),
            }
        }
    }
}

fn open(path: &Path, flags: i32) -> io::Result<RawFd> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let fd = unsafe { libc::open(c_path.as_ptr(), flags) };
    if fd == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(fd)
    }
}

fn check(ret: libc::c_int) -> io::Result<()> {
    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

fn speed(baud: u32) -> io::Result<libc::speed_t> {
    Ok(match baud {
        9600 => libc::B9600,
        19200 => libc::B19200,
        38400 => libc::B38400,
        57600 => libc::B57600,
        115200 => libc::B115200,
        230400 => libc::B230400,
        _ => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unsupported baud rate {}", baud),
            ))
        }
    })
}
