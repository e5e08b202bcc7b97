//! Backend module
//!
//! This module ties the pieces together:
//! - [`Connection`]: socket, bootstrap and the dispatch pass
//! - [`EventLoop`]: calloop readiness multiplexer behind the connection
//! - [`Backend`]: the window registry driven by one connection

pub mod connection;
pub mod event_loop;

pub use connection::Connection;
pub use event_loop::{EventLoop, Readiness};

use std::time::{Duration, Instant};

use log::{debug, info, trace};

use crate::config::BackendConfig;
use crate::error::{Error, Result};
use crate::surface::ImageView;
use crate::window::{MouseCallback, Window, WindowHandle, WindowRegistry};

/// Windows and the connection they share
pub struct Backend {
    // Windows must be destroyed before the connection goes away
    windows: WindowRegistry<Window>,
    connection: Connection,
    config: BackendConfig,
}

impl Backend {
    /// Connect to the display server described by `config`
    pub fn new(config: BackendConfig) -> Result<Self> {
        let connection = Connection::connect(&config)?;
        Ok(Self::with_connection(connection, config))
    }

    /// Drive windows over an already bootstrapped connection
    pub fn with_connection(connection: Connection, config: BackendConfig) -> Self {
        Self {
            windows: WindowRegistry::new(),
            connection,
            config,
        }
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Create a window. Returns `false` if the name is already taken.
    pub fn create_window(&mut self, name: &str, flags: i32) -> bool {
        if self.windows.contains(name) {
            debug!("Window '{}' already exists", name);
            return false;
        }
        let window = Window::new(&self.connection, name, flags, &self.config);
        let id = window.id;
        self.windows.insert(name, id, window).is_some()
    }

    /// Destroy a window by name
    pub fn destroy_window(&mut self, name: &str) -> Result<()> {
        let (id, window) = self
            .windows
            .remove(name)
            .ok_or_else(|| Error::NoSuchWindow(name.to_string()))?;
        self.connection.forget_window(id);
        drop(window);
        self.connection.flush()
    }

    /// Destroy every window. Safe to call repeatedly.
    pub fn destroy_all_windows(&mut self) -> Result<()> {
        let windows = self.windows.drain();
        if windows.is_empty() {
            return Ok(());
        }
        for (id, window) in windows {
            self.connection.forget_window(id);
            drop(window);
        }
        self.connection.flush()
    }

    pub fn get_window_handle(&self, name: &str) -> Option<WindowHandle> {
        self.windows.handle(name)
    }

    pub fn get_window_name(&self, handle: WindowHandle) -> Option<&str> {
        self.windows.name_of(handle)
    }

    /// Replace the mouse callback of a window
    pub fn set_mouse_callback(&mut self, name: &str, callback: Option<MouseCallback>) -> Result<()> {
        let window = self
            .windows
            .get_mut(name)
            .ok_or_else(|| Error::NoSuchWindow(name.to_string()))?;
        window.set_mouse_callback(callback);
        Ok(())
    }

    /// Present an image in a window.
    ///
    /// Presenting dispatches events while it waits on the server, so routed
    /// pointer events are delivered here as well.
    pub fn show_image(&mut self, name: &str, image: &ImageView<'_>) -> Result<()> {
        let window = self
            .windows
            .get_mut(name)
            .ok_or_else(|| Error::NoSuchWindow(name.to_string()))?;
        let shown = window.show(image, &mut self.connection);
        self.deliver_pointer_events();
        shown
    }

    /// Whether the server asked for a window to be closed
    pub fn window_close_requested(&self, name: &str) -> Result<bool> {
        self.windows
            .get(name)
            .map(Window::close_requested)
            .ok_or_else(|| Error::NoSuchWindow(name.to_string()))
    }

    /// One event loop pass, then delivery of routed pointer events
    pub fn run_once(&mut self, timeout: Option<Duration>) -> Result<Readiness> {
        let fired = self.connection.run_once(timeout)?;
        self.deliver_pointer_events();
        Ok(fired)
    }

    fn deliver_pointer_events(&mut self) {
        for (id, event) in self.connection.take_pointer_events() {
            match self.windows.by_id_mut(id) {
                Some(window) => window.handle_pointer(event),
                None => trace!("Dropping {:?} for gone window {:?}", event, id),
            }
        }
    }

    /// Pump events until a key is decoded.
    ///
    /// A positive `timeout_ms` bounds the whole wait and yields `None` once
    /// it passes; zero or negative waits forever.
    pub fn wait_key(&mut self, timeout_ms: i32) -> Result<Option<u8>> {
        let deadline = u64::try_from(timeout_ms)
            .ok()
            .filter(|&ms| ms > 0)
            .map(|ms| Instant::now() + Duration::from_millis(ms));

        loop {
            if let Some(key) = self.connection.get_key() {
                return Ok(Some(key));
            }
            let timeout = match deadline {
                Some(deadline) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        return Ok(None);
                    }
                    Some(left)
                }
                None => None,
            };
            self.run_once(timeout)?;
        }
    }
}

impl Drop for Backend {
    fn drop(&mut self) {
        let count = self.windows.len();
        if let Err(err) = self.destroy_all_windows() {
            debug!("Window teardown failed: {}", err);
        }
        info!("Backend shut down ({} windows closed)", count);
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("windows", &self.windows.len())
            .field("connection", &self.connection)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::input::pointer::BTN_LEFT;
    use crate::test_server::{us_keymap, ServerOptions, TestServer};
    use crate::window::{MouseEvent, MouseEventKind};
    use std::cell::RefCell;
    use std::rc::Rc;

    const TICK: Duration = Duration::from_millis(20);

    fn backend(options: ServerOptions) -> (TestServer, Backend) {
        let (server, stream) = TestServer::start(options);
        let connection = Connection::from_socket(stream).unwrap();
        (server, Backend::with_connection(connection, BackendConfig::default()))
    }

    fn record_mouse(backend: &mut Backend, name: &str) -> Rc<RefCell<Vec<MouseEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        backend
            .set_mouse_callback(name, Some(Box::new(move |e| sink.borrow_mut().push(e))))
            .unwrap();
        events
    }

    fn red_bgr(width: u32, height: u32) -> Vec<u8> {
        [0u8, 0, 255].repeat((width * height) as usize)
    }

    #[test]
    fn test_create_and_destroy_window() {
        let (server, mut backend) = backend(ServerOptions::default());
        assert!(backend.create_window("w", 0));
        assert!(!backend.create_window("w", 0));
        let handle = backend.get_window_handle("w").unwrap();
        assert_eq!(backend.get_window_name(handle), Some("w"));

        backend.connection.roundtrip().unwrap();
        let seen = server.observed();
        assert_eq!(seen.titles, vec!["w".to_string()]);
        assert_eq!(seen.app_ids, vec![backend.config().app_id.clone()]);

        backend.destroy_window("w").unwrap();
        let err = backend.destroy_window("w").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lookup);
        assert!(backend.get_window_handle("w").is_none());

        backend.destroy_all_windows().unwrap();
        backend.destroy_all_windows().unwrap();
    }

    #[test]
    fn test_show_image_presents_pixels() {
        let (server, mut backend) = backend(ServerOptions::default());
        backend.create_window("w", 0);
        let pixels = red_bgr(4, 2);
        backend
            .show_image("w", &ImageView::bgr(4, 2, &pixels))
            .unwrap();
        backend.connection.roundtrip().unwrap();

        let seen = server.observed();
        assert!(!seen.acks.is_empty());
        assert_eq!(seen.commits, 1);
        let frame = seen.last_frame.unwrap();
        assert_eq!((frame.width, frame.height), (4, 2));
        assert!(frame.pixels.iter().all(|px| px & 0x00ff_ffff == 0x00ff_0000));
    }

    #[test]
    fn test_released_buffers_are_reused() {
        let (server, mut backend) = backend(ServerOptions::default());
        backend.create_window("w", 0);
        let pixels = red_bgr(4, 2);
        let image = ImageView::bgr(4, 2, &pixels);

        for _ in 0..4 {
            backend.show_image("w", &image).unwrap();
        }
        backend.connection.roundtrip().unwrap();

        assert_eq!(backend.windows.get("w").unwrap().busy_buffers(), 0);
        let seen = server.observed();
        assert_eq!(seen.commits, 4);
        assert!(seen.buffers_created <= 2);
    }

    #[test]
    fn test_unreleased_buffers_stay_busy() {
        let options = ServerOptions {
            release_on_commit: false,
            ..ServerOptions::default()
        };
        let (server, mut backend) = backend(options);
        backend.create_window("w", 0);
        let pixels = red_bgr(2, 2);
        let image = ImageView::bgr(2, 2, &pixels);

        backend.show_image("w", &image).unwrap();
        backend.show_image("w", &image).unwrap();
        backend.connection.roundtrip().unwrap();

        assert_eq!(backend.windows.get("w").unwrap().busy_buffers(), 2);
        assert_eq!(server.observed().buffers_created, 2);
    }

    #[test]
    fn test_mouse_callback_receives_events() {
        let (server, mut backend) = backend(ServerOptions::default());
        backend.create_window("w", 0);
        let events = record_mouse(&mut backend, "w");
        backend.connection.roundtrip().unwrap();

        server.run(|s| {
            s.pointer_enter(0, 5.0, 6.0);
            s.pointer_motion(7.0, 8.0);
            s.pointer_button(BTN_LEFT, true);
            s.pointer_button(BTN_LEFT, false);
        });
        for _ in 0..50 {
            if events.borrow().len() >= 4 {
                break;
            }
            backend.run_once(Some(TICK)).unwrap();
        }

        let events = events.borrow();
        let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                MouseEventKind::Move,
                MouseEventKind::Move,
                MouseEventKind::LeftButtonDown,
                MouseEventKind::LeftButtonUp,
            ]
        );
        assert_eq!((events[0].x, events[0].y), (5, 6));
        assert_eq!((events[1].x, events[1].y), (7, 8));
    }

    #[test]
    fn test_show_image_delivers_pointer_events() {
        let (server, mut backend) = backend(ServerOptions::default());
        backend.create_window("w", 0);
        let events = record_mouse(&mut backend, "w");
        backend.connection.roundtrip().unwrap();

        server.run(|s| {
            s.pointer_enter(0, 1.0, 1.0);
            s.pointer_motion(2.0, 3.0);
        });
        let pixels = red_bgr(2, 2);
        backend
            .show_image("w", &ImageView::bgr(2, 2, &pixels))
            .unwrap();

        // Delivered without a separate event loop pass
        assert_eq!(events.borrow().len(), 2);
        assert!(backend.connection.take_pointer_events().is_empty());
    }

    #[test]
    fn test_close_request_reported() {
        let (server, mut backend) = backend(ServerOptions::default());
        backend.create_window("w", 0);
        backend.connection.roundtrip().unwrap();
        assert!(!backend.window_close_requested("w").unwrap());

        server.run(|s| s.close(0));
        for _ in 0..50 {
            if backend.window_close_requested("w").unwrap() {
                break;
            }
            backend.run_once(Some(TICK)).unwrap();
        }
        assert!(backend.window_close_requested("w").unwrap());
        assert!(backend.window_close_requested("other").is_err());
    }

    #[test]
    fn test_wait_key_times_out() {
        let (_server, mut backend) = backend(ServerOptions::default());
        let start = Instant::now();
        assert_eq!(backend.wait_key(40).unwrap(), None);
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_wait_key_returns_key_sent_while_waiting() {
        let options = ServerOptions {
            keymap: Some(us_keymap()),
            ..ServerOptions::default()
        };
        let (server, mut backend) = backend(options);
        backend.connection.roundtrip().unwrap();

        // KEY_A
        server.run_after(Duration::from_millis(50), |s| {
            s.key(30, true);
            s.key(30, false);
        });
        assert_eq!(backend.wait_key(5000).unwrap(), Some(b'a'));

        // KEY_B, waiting without a limit
        server.run_after(Duration::from_millis(50), |s| {
            s.key(48, true);
            s.key(48, false);
        });
        assert_eq!(backend.wait_key(0).unwrap(), Some(b'b'));
    }
}
