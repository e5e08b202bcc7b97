//! Presentation buffers
//!
//! - Two-slot buffer pool with busy tracking
//! - Shared-memory backed buffers for the display server
//! - Host image conversion into the presentation format

pub mod pixels;
pub mod pool;
pub mod shm;

pub use pixels::{ChannelOrder, ImageView};
pub use pool::{Allocator, BufferPool, BusyFlag, Frame, SlotBuffer};
pub use shm::{ShmAllocator, ShmBuffer};
