//! Collaborators the session talks through: the serial line and the clock.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// A byte channel to the module that can be reopened at another baud rate.
pub trait SerialChannel: Send {
    /// Number of bytes waiting to be read.
    fn bytes_available(&mut self) -> io::Result<usize>;

    /// Read every byte currently available without blocking.
    fn read_available(&mut self) -> io::Result<Vec<u8>>;

    /// Write all bytes.
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Discard pending input and flush pending output.
    fn flush_io(&mut self) -> io::Result<()>;

    /// Close and reopen the channel at `baud`.
    fn reopen(&mut self, baud: u32) -> io::Result<()>;

    /// Current baud rate.
    fn baud_rate(&self) -> u32;
}

impl<T: SerialChannel + ?Sized> SerialChannel for Box<T> {
    fn bytes_available(&mut self) -> io::Result<usize> {
        (**self).bytes_available()
    }

    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        (**self).read_available()
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        (**self).write_all(data)
    }

    fn flush_io(&mut self) -> io::Result<()> {
        (**self).flush_io()
    }

    fn reopen(&mut self, baud: u32) -> io::Result<()> {
        (**self).reopen(baud)
    }

    fn baud_rate(&self) -> u32 {
        (**self).baud_rate()
    }
}

/// Source of time for guard intervals and deadlines.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;

    /// Block for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Wall-clock time and real sleeping.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Virtual time: `sleep` advances the clock and returns immediately.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    elapsed_nanos: AtomicU64,
}

impl ManualClock {
    /// Create a clock starting now.
    pub fn new() -> Self {
        ManualClock {
            origin: Instant::now(),
            elapsed_nanos: AtomicU64::new(0),
        }
    }

    /// Move time forward.
    pub fn advance(&self, duration: Duration) {
        self.elapsed_nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Total virtual time elapsed since creation.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_nanos.load(Ordering::SeqCst))
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        ManualClock::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}
