//! # Serial / RFCOMM Printer
//!
//! Sends StarPRNT raster jobs to a character device such as `/dev/rfcomm0`
//! (Bluetooth SPP) or `/dev/ttyUSB0`.
//!
//! ## Exclusive Access
//!
//! `open()` takes a non-blocking exclusive `flock` on the device. If another
//! process holds it the call fails with [`DeviceError::Busy`]; the dispatcher
//! decides whether to wait.
//!
//! ## TTY Configuration
//!
//! TTY devices are switched to raw mode so binary raster data passes through
//! unmodified: no input/output processing, 8-bit characters, no echo, no
//! canonical mode, and no XON/XOFF (0x11/0x13 occur in raster data).
//! Regular files (useful for capturing jobs) are written as-is.
//!
//! ## Write Deadline
//!
//! The device is opened `O_NONBLOCK`. When flow control stalls the link the
//! writer polls for room until the write timeout passes, then fails with
//! [`DeviceError::Timeout`]. Bytes already queued stay queued.
//!
//! ## Completion
//!
//! The device has no return channel here, so "complete" means the kernel's
//! output queue has drained to the printer (`tcdrain`). The drain runs on a
//! helper thread and is bounded by the acknowledgment timeout.
//!
//! A drain that times out is kept on the handle. The next completion wait
//! resumes it instead of starting another thread, so a handle never has
//! more than one drain in flight. `close()` flushes pending TTY output,
//! which releases a stuck `tcdrain`, and joins the thread. If the thread
//! still hasn't finished after a short grace period it is left to exit on
//! its own.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::starprnt;
use super::{Ack, DeviceError, PrinterProfile, PrinterSink};
use crate::render::TicketBitmap;

/// Default RFCOMM device path
pub const DEFAULT_DEVICE: &str = "/dev/rfcomm0";

/// Default chunk size for writes (bytes)
const CHUNK_SIZE: usize = 4096;

/// Delay between chunks (milliseconds)
const CHUNK_DELAY_MS: u64 = 2;

/// Default limit on a single job write
const WRITE_TIMEOUT: Duration = Duration::from_secs(15);

/// How long `close()` waits for a flushed drain thread
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// A printer reached through a character device.
#[derive(Debug, Clone)]
pub struct SerialPrinter {
    device: PathBuf,
    profile: PrinterProfile,
    chunk_size: usize,
    chunk_delay: Duration,
    write_timeout: Duration,
}

/// Open, locked device.
#[derive(Debug)]
pub struct SerialHandle {
    file: File,
    is_tty: bool,
    drain: Option<Drain>,
}

/// A completion wait running on a helper thread.
#[derive(Debug)]
struct Drain {
    rx: mpsc::Receiver<io::Result<()>>,
    thread: JoinHandle<()>,
}

impl Drain {
    fn spawn<F>(wait: F) -> Self
    where
        F: FnOnce() -> io::Result<()> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let thread = thread::spawn(move || {
            // Receiver is gone if the handle was dropped
            let _ = tx.send(wait());
        });
        Self { rx, thread }
    }

    /// Result of the wait, or the still-running drain if `deadline` passes.
    fn wait_until(self, deadline: Instant) -> Result<io::Result<()>, Drain> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match self.rx.recv_timeout(remaining) {
            Ok(result) => {
                let _ = self.thread.join();
                Ok(result)
            }
            Err(RecvTimeoutError::Timeout) => Err(self),
            Err(RecvTimeoutError::Disconnected) => {
                let _ = self.thread.join();
                Ok(Err(io::Error::other("drain thread exited")))
            }
        }
    }
}

impl SerialPrinter {
    pub fn new<P: AsRef<Path>>(device: P, profile: PrinterProfile) -> Self {
        Self {
            device: device.as_ref().to_path_buf(),
            profile,
            chunk_size: CHUNK_SIZE,
            chunk_delay: Duration::from_millis(CHUNK_DELAY_MS),
            write_timeout: WRITE_TIMEOUT,
        }
    }

    pub fn device(&self) -> &Path {
        &self.device
    }

    pub fn profile(&self) -> &PrinterProfile {
        &self.profile
    }

    /// Set the chunk size for large writes. Default is 4096 bytes.
    pub fn set_chunk_size(&mut self, size: usize) {
        self.chunk_size = size.max(1);
    }

    /// Set the delay between chunks. Default is 2ms.
    pub fn set_chunk_delay(&mut self, delay: Duration) {
        self.chunk_delay = delay;
    }

    /// Limit on writing one job. Default is 15s.
    pub fn set_write_timeout(&mut self, timeout: Duration) {
        self.write_timeout = timeout;
    }

    fn write_chunked(&self, file: &mut File, data: &[u8]) -> io::Result<()> {
        let deadline = Instant::now() + self.write_timeout;
        for chunk in data.chunks(self.chunk_size) {
            write_all_before(file, chunk, deadline)?;
            if !self.chunk_delay.is_zero() {
                thread::sleep(self.chunk_delay);
            }
        }
        file.flush()
    }
}

impl PrinterSink for SerialPrinter {
    type Handle = SerialHandle;

    fn open(&mut self) -> Result<SerialHandle, DeviceError> {
        let file = OpenOptions::new()
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(&self.device)
            .map_err(|e| DeviceError::Io(format!("open {}: {}", self.device.display(), e)))?;

        lock_exclusive(&file)?;

        let is_tty = unsafe { libc::isatty(file.as_raw_fd()) } == 1;
        if is_tty {
            configure_tty_raw(file.as_raw_fd())?;
        }

        debug!(device = %self.device.display(), is_tty, "opened printer");
        Ok(SerialHandle {
            file,
            is_tty,
            drain: None,
        })
    }

    fn write(
        &mut self,
        handle: &mut SerialHandle,
        bitmap: &TicketBitmap,
    ) -> Result<Ack, DeviceError> {
        let job = starprnt::encode_ticket(bitmap, &self.profile)?;
        self.write_chunked(&mut handle.file, &job)
            .map_err(|e| match e.kind() {
                io::ErrorKind::TimedOut => {
                    warn!(
                        bytes = job.len(),
                        timeout = ?self.write_timeout,
                        "printer stopped accepting data"
                    );
                    DeviceError::Timeout(self.write_timeout)
                }
                _ => DeviceError::Io(format!("write failed: {}", e)),
            })?;
        Ok(Ack { bytes: job.len() })
    }

    fn await_completion(
        &mut self,
        handle: &mut SerialHandle,
        ack: Ack,
        timeout: Duration,
    ) -> Result<(), DeviceError> {
        let deadline = Instant::now() + timeout;

        if let Some(earlier) = handle.drain.take() {
            debug!("resuming earlier drain");
            match earlier.wait_until(deadline) {
                Ok(result) => {
                    result.map_err(|e| DeviceError::Io(format!("drain failed: {}", e)))?
                }
                Err(still_running) => {
                    handle.drain = Some(still_running);
                    warn!(bytes = ack.bytes, ?timeout, "printer did not drain in time");
                    return Err(DeviceError::Timeout(timeout));
                }
            }
        }

        let file = handle.file.try_clone()?;
        let drain = if handle.is_tty {
            Drain::spawn(move || drain_tty(file.as_raw_fd()))
        } else {
            Drain::spawn(move || file.sync_data())
        };

        match drain.wait_until(deadline) {
            Ok(Ok(())) => {
                debug!(bytes = ack.bytes, "printer drained");
                Ok(())
            }
            Ok(Err(e)) => Err(DeviceError::Io(format!("drain failed: {}", e))),
            Err(still_running) => {
                handle.drain = Some(still_running);
                warn!(bytes = ack.bytes, ?timeout, "printer did not drain in time");
                Err(DeviceError::Timeout(timeout))
            }
        }
    }

    fn close(&mut self, mut handle: SerialHandle) {
        if let Some(drain) = handle.drain.take() {
            if handle.is_tty {
                discard_output(handle.file.as_raw_fd());
            }
            if drain.wait_until(Instant::now() + CLOSE_GRACE).is_err() {
                warn!(device = %self.device.display(), "drain thread still blocked at close");
            }
        }
        if let Err(e) = unlock(&handle.file) {
            warn!(device = %self.device.display(), error = %e, "failed to unlock printer");
        }
    }
}

fn lock_exclusive(file: &File) -> Result<(), DeviceError> {
    let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if result == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    if err.kind() == io::ErrorKind::WouldBlock {
        Err(DeviceError::Busy)
    } else {
        Err(DeviceError::Io(format!("flock failed: {}", err)))
    }
}

fn unlock(file: &File) -> io::Result<()> {
    if unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_UN) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Write all of `data`, polling for room while the device is full.
fn write_all_before(file: &mut File, mut data: &[u8], deadline: Instant) -> io::Result<()> {
    while !data.is_empty() {
        match file.write(data) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => data = &data[n..],
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                wait_writable(file.as_raw_fd(), deadline)?
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn wait_writable(fd: i32, deadline: Instant) -> io::Result<()> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return Err(io::ErrorKind::TimedOut.into());
    }
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLOUT,
        revents: 0,
    };
    let millis = remaining.as_millis().clamp(1, i32::MAX as u128) as i32;
    match unsafe { libc::poll(&mut pfd, 1, millis) } {
        0 => Err(io::ErrorKind::TimedOut.into()),
        n if n > 0 => Ok(()),
        _ => {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                Ok(())
            } else {
                Err(err)
            }
        }
    }
}

fn discard_output(fd: i32) {
    if unsafe { libc::tcflush(fd, libc::TCOFLUSH) } != 0 {
        warn!(error = %io::Error::last_os_error(), "tcflush failed");
    }
}

fn drain_tty(fd: i32) -> io::Result<()> {
    if unsafe { libc::tcdrain(fd) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Put a TTY into raw mode so binary raster data passes through unmodified.
///
/// ## What Gets Disabled
///
/// - **Input flags**: IGNBRK, BRKINT, PARMRK, ISTRIP, INLCR, IGNCR, ICRNL, IXON, IXOFF, IXANY
/// - **Output flags**: OPOST
/// - **Local flags**: ECHO, ECHONL, ICANON, ISIG, IEXTEN
/// - **Control flags**: CSIZE, PARENB (then CS8 is set)
///
/// Note: IXON/IXOFF/IXANY disable XON/XOFF software flow control. This is critical
/// because 0x11 (XON/DC1) and 0x13 (XOFF/DC3) appear in raster bytes and would
/// otherwise pause or resume the link mid-image.
fn configure_tty_raw(fd: i32) -> Result<(), DeviceError> {
    use std::mem::MaybeUninit;

    let mut termios = MaybeUninit::uninit();
    if unsafe { libc::tcgetattr(fd, termios.as_mut_ptr()) } != 0 {
        return Err(DeviceError::Io(format!(
            "tcgetattr failed: {}",
            io::Error::last_os_error()
        )));
    }
    let mut termios = unsafe { termios.assume_init() };

    // No input processing and no software flow control
    termios.c_iflag &= !(libc::IGNBRK
        | libc::BRKINT
        | libc::PARMRK
        | libc::ISTRIP
        | libc::INLCR
        | libc::IGNCR
        | libc::ICRNL
        | libc::IXON
        | libc::IXOFF
        | libc::IXANY);
    termios.c_oflag &= !libc::OPOST;
    // No echo or canonical processing
    termios.c_lflag &= !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);
    // 8 bits, no parity
    termios.c_cflag &= !(libc::CSIZE | libc::PARENB);
    termios.c_cflag |= libc::CS8;

    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &termios) } != 0 {
        return Err(DeviceError::Io(format!(
            "tcsetattr failed: {}",
            io::Error::last_os_error()
        )));
    }
    Ok(())
}
