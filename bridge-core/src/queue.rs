//! Fixed-capacity byte queue between the UART receiver and the USB sender.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{with_timeout, Duration};
use heapless::Deque;

/// Single-producer/single-consumer byte stream with a fixed capacity of `N`.
///
/// Chunks are accepted whole or not at all, but the queue keeps no chunk
/// boundaries: a pop may return part of a chunk or the tail of one chunk
/// followed by the head of the next.
///
/// The blocking variants ([`push`](Self::push), [`pop_up_to`](Self::pop_up_to))
/// are bounded by a timeout and never wait forever.
///
/// # Example
///
/// ```
/// use bridge_core::ByteQueue;
/// use embassy_sync::blocking_mutex::raw::NoopRawMutex;
///
/// let queue: ByteQueue<NoopRawMutex, 8> = ByteQueue::new();
/// assert!(queue.try_push(b"hello"));
/// assert!(!queue.try_push(b"world"));
///
/// let mut out = [0u8; 3];
/// assert_eq!(queue.try_pop(&mut out), 3);
/// assert_eq!(&out, b"hel");
/// assert_eq!(queue.free_space(), 6);
/// ```
pub struct ByteQueue<M: RawMutex, const N: usize> {
    ring: Mutex<M, RefCell<Deque<u8, N>>>,
    /// Raised by the producer after bytes were added.
    readable: Signal<M, ()>,
    /// Raised by the consumer after bytes were removed.
    writable: Signal<M, ()>,
}

impl<M: RawMutex, const N: usize> ByteQueue<M, N> {
    /// Create an empty queue.
    pub const fn new() -> Self {
        Self {
            ring: Mutex::new(RefCell::new(Deque::new())),
            readable: Signal::new(),
            writable: Signal::new(),
        }
    }

    /// Total capacity in bytes.
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of bytes currently queued.
    pub fn len(&self) -> usize {
        self.ring.lock(|ring| ring.borrow().len())
    }

    /// Check if no bytes are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Free space in bytes.
    pub fn free_space(&self) -> usize {
        N - self.len()
    }

    /// Enqueue the whole chunk if it fits, without waiting.
    ///
    /// Returns `false` and leaves the queue untouched when there is not
    /// enough free space for all of `bytes`.
    pub fn try_push(&self, bytes: &[u8]) -> bool {
        let pushed = self.ring.lock(|ring| {
            let mut ring = ring.borrow_mut();
            if N - ring.len() < bytes.len() {
                return false;
            }
            for &byte in bytes {
                // Cannot fail, free space was checked above.
                let _ = ring.push_back(byte);
            }
            true
        });

        if pushed && !bytes.is_empty() {
            self.readable.signal(());
        }
        pushed
    }

    /// Dequeue up to `buf.len()` bytes into `buf`, without waiting.
    ///
    /// Returns the number of bytes copied, zero if the queue is empty.
    pub fn try_pop(&self, buf: &mut [u8]) -> usize {
        let popped = self.ring.lock(|ring| {
            let mut ring = ring.borrow_mut();
            let mut count = 0;
            while count < buf.len() {
                match ring.pop_front() {
                    Some(byte) => {
                        buf[count] = byte;
                        count += 1;
                    }
                    None => break,
                }
            }
            count
        });

        if popped > 0 {
            self.writable.signal(());
        }
        popped
    }

    /// Enqueue the whole chunk, waiting up to `timeout` for free space.
    ///
    /// Returns `false` if the space did not become available in time. A chunk
    /// larger than the capacity can never fit and fails immediately.
    pub async fn push(&self, bytes: &[u8], timeout: Duration) -> bool {
        if bytes.len() > N {
            return false;
        }

        with_timeout(timeout, async {
            loop {
                if self.try_push(bytes) {
                    return;
                }
                self.writable.wait().await;
            }
        })
        .await
        .is_ok()
    }

    /// Dequeue up to `buf.len()` bytes, waiting up to `timeout` while empty.
    ///
    /// Returns the number of bytes copied. Zero means the timeout elapsed
    /// with nothing to read, which is not an error.
    pub async fn pop_up_to(&self, buf: &mut [u8], timeout: Duration) -> usize {
        if buf.is_empty() {
            return 0;
        }

        with_timeout(timeout, async {
            loop {
                let popped = self.try_pop(buf);
                if popped > 0 {
                    return popped;
                }
                self.readable.wait().await;
            }
        })
        .await
        .unwrap_or(0)
    }
}

impl<M: RawMutex, const N: usize> Default for ByteQueue<M, N> {
    fn default() -> Self {
        Self::new()
    }
}
