//! Display server connection
//!
//! Owns the socket, the event queue and the dispatch state. Bootstrap binds
//! the required globals and checks the shm format before anything else can
//! use the connection; [`Connection::run_once`] is the single place where
//! socket readiness turns into dispatched protocol events.

use std::env;
use std::io;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;

use log::{debug, info, trace, warn};
use wayland_client::backend::WaylandError;
use wayland_client::{ConnectError, EventQueue, QueueHandle};

use super::event_loop::{EventLoop, Readiness};
use crate::config::BackendConfig;
use crate::error::{Error, Result};
use crate::input::PointerEvent;
use crate::protocol::{BoundGlobals, ClientState};
use crate::surface::shm::ShmFormat;
use crate::window::WindowId;

fn would_block(err: &WaylandError) -> bool {
    matches!(err, WaylandError::Io(e) if e.kind() == io::ErrorKind::WouldBlock)
}

/// A bootstrapped connection to the display server
pub struct Connection {
    event_loop: EventLoop,
    queue: EventQueue<ClientState>,
    qh: QueueHandle<ClientState>,
    state: ClientState,
    globals: BoundGlobals,
    conn: wayland_client::Connection,
}

impl Connection {
    /// Connect and bind every capability the backend needs.
    ///
    /// Fails if the server is unreachable, lacks one of the compositor, shm,
    /// xdg_wm_base or seat globals, or does not offer XRGB8888 buffers.
    pub fn connect(config: &BackendConfig) -> Result<Self> {
        let runtime_dir = env::var_os("XDG_RUNTIME_DIR").map(PathBuf::from);
        let conn = match config.socket_path(runtime_dir) {
            Some(path) => {
                debug!("Connecting to {}", path.display());
                let stream = UnixStream::connect(&path).map_err(|err| {
                    warn!("Cannot reach display at {}: {}", path.display(), err);
                    Error::Connect(ConnectError::NoCompositor)
                })?;
                wayland_client::Connection::from_socket(stream)?
            }
            None => wayland_client::Connection::connect_to_env()?,
        };
        Self::bootstrap(conn)
    }

    /// Bootstrap over an already connected socket
    pub fn from_socket(stream: UnixStream) -> Result<Self> {
        Self::bootstrap(wayland_client::Connection::from_socket(stream)?)
    }

    fn bootstrap(conn: wayland_client::Connection) -> Result<Self> {
        let mut queue = conn.new_event_queue::<ClientState>();
        let qh = queue.handle();
        let _registry = conn.display().get_registry(&qh, ());

        let mut state = ClientState::new();
        queue.roundtrip(&mut state)?;
        let globals = state.globals.require()?;
        if state.input.is_none() {
            return Err(Error::MissingGlobal("wl_seat"));
        }

        // Second round-trip collects shm formats and seat capabilities
        queue.roundtrip(&mut state)?;
        if !state.formats.contains(ShmFormat::Xrgb8888) {
            return Err(Error::MissingShmFormat);
        }

        let mut event_loop = EventLoop::new(conn.backend().poll_fd())?;
        event_loop.arm_write()?;

        info!(
            "Connected to display server (shm formats {:#x})",
            state.formats.mask()
        );
        Ok(Self {
            event_loop,
            queue,
            qh,
            state,
            globals,
            conn,
        })
    }

    /// Bound capability handles
    pub fn globals(&self) -> &BoundGlobals {
        &self.globals
    }

    pub fn qh(&self) -> &QueueHandle<ClientState> {
        &self.qh
    }

    /// Send all requests and wait until the server has answered them
    pub fn roundtrip(&mut self) -> Result<()> {
        self.queue.roundtrip(&mut self.state)?;
        Ok(())
    }

    /// Flush outgoing requests, tolerating a full socket
    pub fn flush(&mut self) -> Result<()> {
        match self.conn.flush() {
            Err(err) if would_block(&err) => {
                self.event_loop.arm_write()?;
                Ok(())
            }
            other => Ok(other?),
        }
    }

    /// One pass of the event loop.
    ///
    /// Dispatches anything already queued, flushes, waits for readiness for
    /// at most `timeout` (`None` waits forever), then reads and dispatches
    /// incoming events or finishes a blocked flush. Returns the readiness
    /// the wait reported; an empty set means the wait timed out.
    pub fn run_once(&mut self, timeout: Option<Duration>) -> Result<Readiness> {
        self.queue.dispatch_pending(&mut self.state)?;

        match self.queue.flush() {
            Ok(()) => {}
            Err(err) if would_block(&err) => self.event_loop.arm_write()?,
            Err(err) => {
                warn!("Flush failed: {}", err);
                return Ok(Readiness::empty());
            }
        }

        let fired = self.event_loop.wait(timeout)?;

        if fired.intersects(Readiness::READABLE | Readiness::ERROR) {
            if let Some(guard) = self.queue.prepare_read() {
                match guard.read() {
                    Ok(count) => trace!("Read {} events", count),
                    Err(err) if would_block(&err) => {}
                    Err(err) => return Err(err.into()),
                }
            }
            self.queue.dispatch_pending(&mut self.state)?;
        }

        if fired.contains(Readiness::WRITABLE) {
            match self.queue.flush() {
                Ok(()) => self.event_loop.disarm_write()?,
                Err(err) if would_block(&err) => {}
                Err(err) => return Err(err.into()),
            }
        }

        Ok(fired)
    }

    /// Take the pointer events routed during dispatch
    pub fn take_pointer_events(&mut self) -> Vec<(WindowId, PointerEvent)> {
        self.state
            .input
            .as_mut()
            .map(|input| input.take_pending())
            .unwrap_or_default()
    }

    /// Most recent decoded key, discarding older ones
    pub fn get_key(&mut self) -> Option<u8> {
        self.state.input.as_mut()?.keyboard().get_key()
    }

    /// Drop input state held for a destroyed window
    pub fn forget_window(&mut self, window: WindowId) {
        if let Some(input) = self.state.input.as_mut() {
            input.forget(window);
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // Input devices and the seat go before the shell
        self.state.input = None;
        self.globals.wm_base.destroy();
        if let Err(err) = self.conn.flush() {
            debug!("Final flush failed: {}", err);
        }
        info!("Disconnected from display server");
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("globals", &self.globals)
            .field("formats", &self.state.formats)
            .field("write_armed", &self.event_loop.write_armed())
            .finish()
    }
}
