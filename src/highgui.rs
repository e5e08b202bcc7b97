//! Host-facing window API
//!
//! Free functions backed by a lazily created, process-wide [`Backend`]. The
//! backend lives in thread-local storage of the GUI thread. Bootstrap is
//! attempted once; after a failure every call reports
//! [`Error::Unavailable`] until [`shutdown`] resets the slot.

use std::cell::RefCell;

use log::{debug, error, info};

use crate::backend::Backend;
use crate::config::BackendConfig;
use crate::error::{Error, Result};
use crate::surface::ImageView;
use crate::window::{MouseCallback, MouseEvent, WindowHandle};

enum Slot {
    Uninit,
    Failed,
    Ready(Box<Backend>),
}

thread_local! {
    static BACKEND: RefCell<Slot> = const { RefCell::new(Slot::Uninit) };
}

/// Bring the backend up from the environment. Idempotent.
pub fn init() -> Result<()> {
    init_with(BackendConfig::from_env())
}

/// Bring the backend up with an explicit configuration.
///
/// Does nothing if a backend is already running. A failed bootstrap is not
/// retried.
pub fn init_with(config: BackendConfig) -> Result<()> {
    BACKEND.with(|slot| {
        let mut slot = slot.try_borrow_mut().map_err(|_| Error::Reentrant)?;
        match &*slot {
            Slot::Ready(_) => Ok(()),
            Slot::Failed => Err(Error::Unavailable),
            Slot::Uninit => match Backend::new(config) {
                Ok(backend) => {
                    *slot = Slot::Ready(Box::new(backend));
                    info!("Window backend ready");
                    Ok(())
                }
                Err(err) => {
                    error!("Window backend unavailable: {}", err);
                    *slot = Slot::Failed;
                    Err(err)
                }
            },
        }
    })
}

/// Tear the backend down, destroying every window
pub fn shutdown() -> Result<()> {
    let previous = BACKEND.with(|slot| {
        let mut slot = slot.try_borrow_mut().map_err(|_| Error::Reentrant)?;
        Ok::<_, Error>(std::mem::replace(&mut *slot, Slot::Uninit))
    })?;
    // Dropped outside the borrow so window teardown cannot observe it
    if let Slot::Ready(backend) = previous {
        drop(backend);
        debug!("Window backend released");
    }
    Ok(())
}

fn with_backend<T>(f: impl FnOnce(&mut Backend) -> Result<T>) -> Result<T> {
    BACKEND.with(|slot| {
        let mut slot = slot.try_borrow_mut().map_err(|_| Error::Reentrant)?;
        match &mut *slot {
            Slot::Ready(backend) => f(backend),
            Slot::Uninit | Slot::Failed => Err(Error::Unavailable),
        }
    })
}

/// Create a window, starting the backend if needed.
///
/// Returns `false` if a window with this name already exists.
pub fn create_window(name: &str, flags: i32) -> Result<bool> {
    init()?;
    with_backend(|backend| Ok(backend.create_window(name, flags)))
}

pub fn destroy_window(name: &str) -> Result<()> {
    with_backend(|backend| backend.destroy_window(name))
}

/// Destroy every window; a stopped backend has none to destroy
pub fn destroy_all_windows() -> Result<()> {
    match with_backend(|backend| backend.destroy_all_windows()) {
        Err(Error::Unavailable) => Ok(()),
        other => other,
    }
}

pub fn get_window_handle(name: &str) -> Result<WindowHandle> {
    with_backend(|backend| {
        backend
            .get_window_handle(name)
            .ok_or_else(|| Error::NoSuchWindow(name.to_string()))
    })
}

/// Reverse lookup of [`get_window_handle`]
pub fn get_window_name(handle: WindowHandle) -> Result<String> {
    with_backend(|backend| {
        backend
            .get_window_name(handle)
            .map(str::to_string)
            .ok_or_else(|| Error::NoSuchWindow(format!("handle {}", handle.get())))
    })
}

/// Register the mouse callback of a window, replacing any previous one
pub fn set_mouse_callback<F>(name: &str, callback: F) -> Result<()>
where
    F: FnMut(MouseEvent) + 'static,
{
    let callback: MouseCallback = Box::new(callback);
    with_backend(|backend| backend.set_mouse_callback(name, Some(callback)))
}

/// Remove the mouse callback of a window
pub fn clear_mouse_callback(name: &str) -> Result<()> {
    with_backend(|backend| backend.set_mouse_callback(name, None))
}

pub fn show_image(name: &str, image: &ImageView<'_>) -> Result<()> {
    with_backend(|backend| backend.show_image(name, image))
}

/// Wait for a key press.
///
/// A positive `delay_ms` gives up after that long with `None`; zero or
/// negative waits until a key arrives.
pub fn wait_key(delay_ms: i32) -> Result<Option<u8>> {
    with_backend(|backend| backend.wait_key(delay_ms))
}

/// Whether the user asked the compositor to close a window
pub fn window_close_requested(name: &str) -> Result<bool> {
    with_backend(|backend| backend.window_close_requested(name))
}

// Geometry belongs to the compositor; these are accepted and ignored.

pub fn move_window(name: &str, x: i32, y: i32) {
    debug!("move_window('{}', {}, {}) ignored", name, x, y);
}

pub fn resize_window(name: &str, width: i32, height: i32) {
    debug!("resize_window('{}', {}, {}) ignored", name, width, height);
}

/// Trackbars are not supported; creation is accepted and reports success
pub fn create_trackbar(trackbar: &str, window: &str, _value: Option<&mut i32>, count: i32) -> bool {
    debug!(
        "create_trackbar('{}' on '{}', max {}) ignored",
        trackbar, window, count
    );
    true
}

pub fn get_trackbar_pos(_trackbar: &str, _window: &str) -> i32 {
    0
}

pub fn set_trackbar_pos(_trackbar: &str, _window: &str, _pos: i32) {}

pub fn set_opengl_draw_callback(name: &str) {
    debug!("set_opengl_draw_callback('{}') ignored", name);
}

/// Events are pumped by [`wait_key`]; there is no separate thread
pub fn start_window_thread() -> i32 {
    0
}
