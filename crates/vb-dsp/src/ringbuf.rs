//! Lock-Free Ring Buffer for Interleaved Audio
//!
//! Single-producer single-consumer storage shared between the thread that
//! feeds a rate matcher and the thread that drains it.
//!
//! CRITICAL: the audio thread must NEVER block. Push and pop are wait-free.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

use vb_core::Sample;

// ═══════════════════════════════════════════════════════════════════════════════
// SPSC AUDIO RING BUFFER
// ═══════════════════════════════════════════════════════════════════════════════

/// SPSC ring of interleaved samples
///
/// Unlike a power-of-two ring, the capacity is exact: an elastic buffer sized
/// from a latency target must never hold more than it was asked to.
#[repr(align(64))]
pub struct AudioRingBuffer {
    /// Buffer storage
    buffer: Box<[UnsafeCell<Sample>]>,
    /// Buffer capacity in samples
    capacity: usize,
    /// Total samples ever written (only modified by producer)
    write_pos: AtomicUsize,
    /// Total samples ever read (only modified by consumer)
    read_pos: AtomicUsize,
}

// SAFETY: a slot is written only by the single producer while it lies in the
// free region and read only by the single consumer while it lies in the
// filled region; the release/acquire pairs on the positions order the two.
unsafe impl Sync for AudioRingBuffer {}
unsafe impl Send for AudioRingBuffer {}

impl AudioRingBuffer {
    /// Create a new ring buffer holding exactly `capacity` samples (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let buffer = (0..capacity)
            .map(|_| UnsafeCell::new(0.0))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            buffer,
            capacity,
            write_pos: AtomicUsize::new(0),
            read_pos: AtomicUsize::new(0),
        }
    }

    /// Free slots (samples)
    #[inline]
    pub fn available_write(&self) -> usize {
        self.capacity - self.available_read()
    }

    /// Readable samples
    #[inline]
    pub fn available_read(&self) -> usize {
        let write = self.write_pos.load(Ordering::Acquire);
        let read = self.read_pos.load(Ordering::Acquire);
        write.wrapping_sub(read)
    }

    /// Producer side; returns how many samples fit
    #[inline]
    pub fn push(&self, samples: &[Sample]) -> usize {
        let to_write = samples.len().min(self.available_write());
        if to_write == 0 {
            return 0;
        }

        let write = self.write_pos.load(Ordering::Relaxed);
        for (i, &sample) in samples[..to_write].iter().enumerate() {
            let idx = write.wrapping_add(i) % self.capacity;
            // SAFETY: idx lies in the free region owned by the producer
            unsafe { *self.buffer[idx].get() = sample };
        }

        self.write_pos
            .store(write.wrapping_add(to_write), Ordering::Release);
        to_write
    }

    /// Producer side: append up to `count` zeros
    pub fn push_silence(&self, count: usize) -> usize {
        let to_write = count.min(self.available_write());
        let write = self.write_pos.load(Ordering::Relaxed);
        for i in 0..to_write {
            let idx = write.wrapping_add(i) % self.capacity;
            // SAFETY: idx lies in the free region owned by the producer
            unsafe { *self.buffer[idx].get() = 0.0 };
        }
        self.write_pos
            .store(write.wrapping_add(to_write), Ordering::Release);
        to_write
    }

    /// Consumer side; returns how many samples were copied out
    #[inline]
    pub fn pop(&self, output: &mut [Sample]) -> usize {
        let to_read = output.len().min(self.available_read());
        if to_read == 0 {
            return 0;
        }

        let read = self.read_pos.load(Ordering::Relaxed);
        for (i, sample) in output[..to_read].iter_mut().enumerate() {
            let idx = read.wrapping_add(i) % self.capacity;
            // SAFETY: idx lies in the filled region owned by the consumer
            *sample = unsafe { *self.buffer[idx].get() };
        }

        self.read_pos
            .store(read.wrapping_add(to_read), Ordering::Release);
        to_read
    }

    /// Discard everything currently readable (consumer side)
    pub fn clear(&self) {
        let write = self.write_pos.load(Ordering::Acquire);
        self.read_pos.store(write, Ordering::Release);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.available_read() == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.available_write() == 0
    }

    /// Capacity in samples
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
