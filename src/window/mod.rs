//! Window management
//!
//! A [`Window`] is one toplevel: a `wl_surface` with its `xdg_surface` and
//! `xdg_toplevel` roles, a two-slot buffer pool and the mouse state of the
//! host callback.

pub mod mouse;
pub mod registry;

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, trace};
use wayland_client::protocol::wl_surface;
use wayland_protocols::xdg::shell::client::{xdg_surface, xdg_toplevel};

use crate::backend::Connection;
use crate::config::BackendConfig;
use crate::error::Result;
use crate::input::PointerEvent;
use crate::surface::{BufferPool, ImageView, ShmAllocator, ShmBuffer};

pub use mouse::{MouseCallback, MouseEvent, MouseEventKind, MouseFlags, MouseState};
pub use registry::WindowRegistry;

/// Unique identifier for windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(pub u64);

impl WindowId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        WindowId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Opaque window handle handed to the host library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(NonZeroU64);

impl WindowHandle {
    pub fn get(self) -> u64 {
        self.0.get()
    }

    /// Rebuild a handle from its raw value; zero is never a handle
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(WindowHandle)
    }
}

/// Shell state shared with the xdg dispatch handlers
#[derive(Debug)]
pub struct SurfaceData {
    pub id: WindowId,
    configured: AtomicBool,
    close_requested: AtomicBool,
}

impl SurfaceData {
    pub fn new(id: WindowId) -> Self {
        Self {
            id,
            configured: AtomicBool::new(false),
            close_requested: AtomicBool::new(false),
        }
    }

    pub fn set_configured(&self) {
        self.configured.store(true, Ordering::Release);
    }

    /// Whether the first configure has been acknowledged
    pub fn configured(&self) -> bool {
        self.configured.load(Ordering::Acquire)
    }

    pub fn request_close(&self) {
        self.close_requested.store(true, Ordering::Release);
    }

    pub fn close_requested(&self) -> bool {
        self.close_requested.load(Ordering::Acquire)
    }
}

/// A toplevel window
pub struct Window {
    /// Unique identifier
    pub id: WindowId,
    /// Window name, also the toplevel title
    pub name: String,
    /// Creation flags passed through from the host
    pub flags: i32,
    /// Size of the most recently shown image
    pub width: u32,
    pub height: u32,
    /// Mouse state and callback
    pub mouse: MouseState,
    surface: wl_surface::WlSurface,
    xdg_surface: xdg_surface::XdgSurface,
    toplevel: xdg_toplevel::XdgToplevel,
    data: Arc<SurfaceData>,
    pool: BufferPool<ShmBuffer>,
}

impl Window {
    /// Create the surface and its toplevel role and commit it once so the
    /// server sends the first configure
    pub fn new(conn: &Connection, name: &str, flags: i32, config: &BackendConfig) -> Self {
        let id = WindowId::new();
        let globals = conn.globals();
        let qh = conn.qh();

        let data = Arc::new(SurfaceData::new(id));
        let surface = globals.compositor.create_surface(qh, id);
        let xdg_surface = globals.wm_base.get_xdg_surface(&surface, qh, data.clone());
        let toplevel = xdg_surface.get_toplevel(qh, data.clone());
        toplevel.set_title(name.to_string());
        toplevel.set_app_id(config.app_id.clone());
        surface.commit();

        debug!("Created window {:?} '{}' (flags {:#x})", id, name, flags);
        Self {
            id,
            name: name.to_string(),
            flags,
            width: config.default_width,
            height: config.default_height,
            mouse: MouseState::new(),
            surface,
            xdg_surface,
            toplevel,
            data,
            pool: BufferPool::new(),
        }
    }

    /// Whether the server asked for this window to be closed
    pub fn close_requested(&self) -> bool {
        self.data.close_requested()
    }

    pub fn set_mouse_callback(&mut self, callback: Option<MouseCallback>) {
        self.mouse.set_callback(callback);
    }

    /// Present `image`, resizing the window to its dimensions.
    ///
    /// Blocks until the first configure has arrived and one of the two
    /// buffers is free.
    pub fn show(&mut self, image: &ImageView<'_>, conn: &mut Connection) -> Result<()> {
        image.validate()?;
        self.width = image.width;
        self.height = image.height;

        while !self.data.configured() {
            trace!("Waiting for first configure of {:?}", self.id);
            conn.roundtrip()?;
        }

        let shm = conn.globals().shm.clone();
        let qh = conn.qh().clone();
        let mut allocator = ShmAllocator { shm: &shm, qh: &qh };
        let mut frame = self
            .pool
            .acquire(self.width, self.height, &mut allocator, || conn.roundtrip())?;
        image.write_xrgb8888(frame.pixels_mut())?;

        let surface = &self.surface;
        let (width, height) = (self.width as i32, self.height as i32);
        let index = frame.index();
        frame.submit(|buffer| {
            surface.attach(Some(buffer.wl_buffer()), 0, 0);
            surface.damage(0, 0, width, height);
            surface.commit();
        });
        trace!("{:?} presented slot {} at {}x{}", self.id, index, width, height);
        Ok(())
    }

    /// Buffers still held by the server
    pub fn busy_buffers(&self) -> usize {
        self.pool.busy_count()
    }

    /// Deliver a routed pointer event to the mouse callback
    pub fn handle_pointer(&mut self, event: PointerEvent) {
        self.mouse.handle(event);
    }
}

impl Drop for Window {
    fn drop(&mut self) {
        self.toplevel.destroy();
        self.xdg_surface.destroy();
        self.pool.reset();
        self.surface.destroy();
        debug!("Destroyed window {:?} '{}'", self.id, self.name);
    }
}

impl std::fmt::Debug for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Window")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("size", &(self.width, self.height))
            .field("configured", &self.data.configured())
            .field("buffers", &self.pool)
            .finish()
    }
}
