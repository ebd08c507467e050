//! Real-time safe logging for the audio path.
//!
//! `eg_log!` formats into a fixed-size entry and pushes it onto a bounded SPSC
//! queue; nothing on that path allocates, waits on a lock or does I/O. A
//! non-real-time thread calls [`drain_to_log`] to forward queued entries to the
//! `log` facade.
//!
//! The queue only exists with the `debug` feature. Without it `eg_log!` compiles
//! to nothing and `drain_to_log` is a no-op.

use std::fmt;

#[cfg(feature = "debug")]
pub mod rt_log {
    use ringbuf::{Consumer, Producer, RingBuffer};
    use std::fmt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Mutex, OnceLock};

    const LOG_CAP: usize = 256;
    const LOG_MSG_MAX: usize = 256;

    /// Preformatted message, copied by value through the queue.
    #[derive(Copy, Clone)]
    pub(super) struct LogEntry {
        len: usize,
        bytes: [u8; LOG_MSG_MAX],
    }

    impl LogEntry {
        pub(super) fn empty() -> Self {
            Self {
                len: 0,
                bytes: [0; LOG_MSG_MAX],
            }
        }

        pub(super) fn as_str(&self) -> &str {
            std::str::from_utf8(&self.bytes[..self.len]).unwrap_or("<invalid>")
        }
    }

    impl fmt::Write for LogEntry {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            let mut n = s.len().min(LOG_MSG_MAX - self.len);
            // Truncate on a char boundary.
            while n > 0 && !s.is_char_boundary(n) {
                n -= 1;
            }
            self.bytes[self.len..self.len + n].copy_from_slice(&s.as_bytes()[..n]);
            self.len += n;
            Ok(())
        }
    }

    struct LogQueue {
        tx: Mutex<Producer<LogEntry>>,
        rx: Mutex<Consumer<LogEntry>>,
        dropped: AtomicUsize,
    }

    static QUEUE: OnceLock<LogQueue> = OnceLock::new();

    /// Allocate the queue. Call once from a non-real-time thread before processing.
    pub fn init() {
        QUEUE.get_or_init(|| {
            let (tx, rx) = RingBuffer::<LogEntry>::new(LOG_CAP).split();
            LogQueue {
                tx: Mutex::new(tx),
                rx: Mutex::new(rx),
                dropped: AtomicUsize::new(0),
            }
        });
    }

    /// Audio-thread side. Never waits: a full queue or a contended producer
    /// drops the entry and counts it.
    pub fn log_args(args: fmt::Arguments) {
        let Some(queue) = QUEUE.get() else {
            return;
        };
        let mut entry = LogEntry::empty();
        let _ = fmt::write(&mut entry, args);

        let pushed = match queue.tx.try_lock() {
            Ok(mut tx) => tx.push(entry).is_ok(),
            Err(_) => false,
        };
        if !pushed {
            queue.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn drain() -> usize {
        let Some(queue) = QUEUE.get() else {
            return 0;
        };
        let mut n = 0;
        if let Ok(mut rx) = queue.rx.lock() {
            while let Some(entry) = rx.pop() {
                if entry.len > 0 {
                    log::debug!(target: "earguard::rt", "{}", entry.as_str());
                    n += 1;
                }
            }
        }
        let dropped = queue.dropped.swap(0, Ordering::Relaxed);
        if dropped > 0 {
            log::warn!(target: "earguard::rt", "{} real-time log entries dropped", dropped);
        }
        n
    }
}

#[cfg(feature = "debug")]
#[doc(hidden)]
pub fn eg_log_inner(args: fmt::Arguments) {
    rt_log::log_args(args);
}

#[cfg(not(feature = "debug"))]
#[doc(hidden)]
pub fn eg_log_inner(_args: fmt::Arguments) {}

/// Set up the real-time log queue. Call once, off the audio thread.
#[cfg(feature = "debug")]
pub fn init_rt_log() {
    rt_log::init();
}

#[cfg(not(feature = "debug"))]
pub fn init_rt_log() {}

/// Forward queued real-time log entries to the `log` facade.
/// Returns how many were forwarded.
#[cfg(feature = "debug")]
pub fn drain_to_log() -> usize {
    rt_log::drain()
}

#[cfg(not(feature = "debug"))]
pub fn drain_to_log() -> usize {
    0
}

#[macro_export]
macro_rules! eg_log {
    ($($arg:tt)*) => {
        $crate::debug::eg_log_inner(format_args!($($arg)*))
    };
}
