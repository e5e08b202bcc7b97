//! wl_shm backed buffers
//!
//! Buffers live in anonymous memfd files mapped into this process and shared
//! with the server through a transient `wl_shm_pool`.

use std::collections::BTreeSet;
use std::fs::File;
use std::os::unix::io::AsFd;

use log::debug;
use memmap2::MmapMut;
use rustix::fs::{ftruncate, memfd_create, MemfdFlags};
use wayland_client::protocol::{wl_buffer, wl_shm};
use wayland_client::QueueHandle;

use super::pixels::BYTES_PER_PIXEL;
use super::pool::{Allocator, BusyFlag, SlotBuffer};
use crate::error::{Error, Result};
use crate::protocol::ClientState;

/// Supported pixel formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ShmFormat {
    /// 32-bit ARGB (A in high byte)
    Argb8888,
    /// 32-bit XRGB (X in high byte, alpha ignored)
    Xrgb8888,
    /// Other format with raw value
    Other(u32),
}

impl ShmFormat {
    /// Create from Wayland format value
    pub fn from_wayland(format: u32) -> Self {
        match format {
            0 => ShmFormat::Argb8888,
            1 => ShmFormat::Xrgb8888,
            other => ShmFormat::Other(other),
        }
    }

    /// Convert to Wayland format value
    pub fn to_wayland(&self) -> u32 {
        match self {
            ShmFormat::Argb8888 => 0,
            ShmFormat::Xrgb8888 => 1,
            ShmFormat::Other(v) => *v,
        }
    }
}

/// Formats announced by the server's `wl_shm`.
///
/// Legacy codes below 64 accumulate in a bitmask; fourcc codes go to a set.
#[derive(Debug, Clone, Default)]
pub struct ShmFormats {
    mask: u64,
    fourcc: BTreeSet<u32>,
}

impl ShmFormats {
    pub fn insert(&mut self, format: ShmFormat) {
        match format.to_wayland() {
            code @ 0..=63 => self.mask |= 1 << code,
            code => {
                self.fourcc.insert(code);
            }
        }
    }

    pub fn contains(&self, format: ShmFormat) -> bool {
        match format.to_wayland() {
            code @ 0..=63 => self.mask & (1 << code) != 0,
            code => self.fourcc.contains(&code),
        }
    }

    /// Bitmask over the legacy format codes
    pub fn mask(&self) -> u64 {
        self.mask
    }

    pub fn is_empty(&self) -> bool {
        self.mask == 0 && self.fourcc.is_empty()
    }
}

/// An XRGB8888 buffer in shared memory
pub struct ShmBuffer {
    buffer: wl_buffer::WlBuffer,
    mmap: MmapMut,
    width: u32,
    height: u32,
    busy: BusyFlag,
}

impl ShmBuffer {
    /// Server-side buffer object
    pub fn wl_buffer(&self) -> &wl_buffer::WlBuffer {
        &self.buffer
    }
}

impl SlotBuffer for ShmBuffer {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn busy(&self) -> &BusyFlag {
        &self.busy
    }

    fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.mmap
    }
}

impl Drop for ShmBuffer {
    fn drop(&mut self) {
        self.buffer.destroy();
        debug!("Destroyed shm buffer {}x{}", self.width, self.height);
    }
}

impl std::fmt::Debug for ShmBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShmBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("busy", &self.busy.is_busy())
            .finish()
    }
}

/// Allocates [`ShmBuffer`]s through the bound `wl_shm`
pub struct ShmAllocator<'a> {
    pub shm: &'a wl_shm::WlShm,
    pub qh: &'a QueueHandle<ClientState>,
}

impl Allocator for ShmAllocator<'_> {
    type Buffer = ShmBuffer;

    fn allocate(&mut self, width: u32, height: u32) -> Result<ShmBuffer> {
        let stride = width as usize * BYTES_PER_PIXEL;
        let size = stride * height as usize;
        let (stride, size_i32) = match (i32::try_from(stride), i32::try_from(size)) {
            (Ok(stride), Ok(size)) if size > 0 => (stride, size),
            _ => return Err(Error::InvalidImage("buffer size out of range")),
        };

        let fd = memfd_create("wlgui-buffer", MemfdFlags::CLOEXEC)?;
        ftruncate(&fd, size as u64)?;
        let file = File::from(fd);
        // SAFETY: the memfd is private to this process and the server, and
        // is never truncated while mapped.
        let mmap = unsafe { MmapMut::map_mut(&file)? };

        let busy = BusyFlag::new();
        let pool = self.shm.create_pool(file.as_fd(), size_i32, self.qh, ());
        let buffer = pool.create_buffer(
            0,
            width as i32,
            height as i32,
            stride,
            wl_shm::Format::Xrgb8888,
            self.qh,
            busy.clone(),
        );
        pool.destroy();

        debug!("Created shm buffer {}x{} ({} bytes)", width, height, size);
        Ok(ShmBuffer {
            buffer,
            mmap,
            width,
            height,
            busy,
        })
    }
}
