//! Double-buffered presentation slots
//!
//! Each window owns a [`BufferPool`] of two slots so one frame can be on
//! screen while the next is drawn. A slot handed to the server stays busy
//! until the server releases it; [`BufferPool::acquire`] never returns a
//! busy slot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, trace};

use crate::error::Result;

/// Number of slots per window
pub const SLOT_COUNT: usize = 2;

/// Byte written over freshly allocated buffer memory
pub const FILL_BYTE: u8 = 0xff;

/// Busy flag shared between a buffer and its server-side release handler
#[derive(Debug, Clone, Default)]
pub struct BusyFlag(Arc<AtomicBool>);

impl BusyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark as handed to the server
    pub fn mark(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Server released the buffer
    pub fn release(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A presentable pixel buffer
pub trait SlotBuffer {
    /// Dimensions in pixels
    fn size(&self) -> (u32, u32);
    /// Busy flag of this buffer
    fn busy(&self) -> &BusyFlag;
    /// Pixel memory, `width * height * 4` bytes
    fn pixels_mut(&mut self) -> &mut [u8];
}

/// Creates buffers for a pool
pub trait Allocator {
    type Buffer: SlotBuffer;

    /// Allocate a buffer of the given size
    fn allocate(&mut self, width: u32, height: u32) -> Result<Self::Buffer>;
}

/// Two-slot buffer pool
#[derive(Debug)]
pub struct BufferPool<B> {
    slots: [Option<B>; SLOT_COUNT],
}

impl<B: SlotBuffer> BufferPool<B> {
    pub fn new() -> Self {
        Self {
            slots: [None, None],
        }
    }

    /// Index of the first slot the server is not holding
    fn free_slot(&self) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().map_or(true, |b| !b.busy().is_busy()))
    }

    /// Block until a slot is free and return it sized `width` x `height`.
    ///
    /// `roundtrip` is called before every check; it must make progress on
    /// server traffic so release notifications can arrive. There is no
    /// timeout: if the server never releases a buffer this never returns.
    pub fn acquire<A>(
        &mut self,
        width: u32,
        height: u32,
        allocator: &mut A,
        mut roundtrip: impl FnMut() -> Result<()>,
    ) -> Result<Frame<'_, B>>
    where
        A: Allocator<Buffer = B>,
    {
        let index = loop {
            roundtrip()?;
            if let Some(index) = self.free_slot() {
                break index;
            }
            trace!("Both buffers busy, waiting for release");
        };

        let slot = &mut self.slots[index];
        let buffer = match slot.take() {
            Some(buffer) if buffer.size() == (width, height) => buffer,
            stale => {
                // Release the old buffer before allocating its replacement
                drop(stale);
                let mut buffer = allocator.allocate(width, height)?;
                buffer.pixels_mut().fill(FILL_BYTE);
                debug!("Allocated buffer slot {} at {}x{}", index, width, height);
                buffer
            }
        };

        Ok(Frame {
            index,
            buffer: slot.insert(buffer),
        })
    }

    /// Number of slots currently held by the server
    pub fn busy_count(&self) -> usize {
        self.slots
            .iter()
            .flatten()
            .filter(|b| b.busy().is_busy())
            .count()
    }

    /// Number of allocated slots
    pub fn allocated(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Drop both buffers
    pub fn reset(&mut self) {
        self.slots = [None, None];
    }
}

impl<B: SlotBuffer> Default for BufferPool<B> {
    fn default() -> Self {
        Self::new()
    }
}

/// A free slot, ready to be filled and submitted
pub struct Frame<'a, B> {
    index: usize,
    buffer: &'a mut B,
}

impl<'a, B: SlotBuffer> Frame<'a, B> {
    /// Slot index within the pool
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        self.buffer.pixels_mut()
    }

    /// Hand the buffer to the server and mark it busy
    pub fn submit(self, present: impl FnOnce(&B)) {
        present(self.buffer);
        self.buffer.busy().mark();
    }
}
