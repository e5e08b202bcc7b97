//! wlgui - Wayland window backend for image display
//!
//! wlgui shows pixel buffers in plain toplevel windows and reports mouse and
//! keyboard input back to its caller. One connection to the display server
//! is shared by every window; all work happens on the calling thread.
//!
//! # Architecture
//!
//! - **Protocol Layer**: `Dispatch` handlers for the client side of the
//!   core protocol and the xdg shell, using wayland-client
//! - **Backend**: connection bootstrap and a calloop driven event loop
//! - **Surfaces**: double-buffered shm presentation with busy tracking
//! - **Input**: pointer focus routing and XKB key decoding
//! - **Host API**: the [`highgui`] free functions
//!
//! # Example
//!
//! ```no_run
//! use wlgui::highgui;
//! use wlgui::surface::ImageView;
//!
//! let pixels = vec![0u8; 64 * 48 * 3];
//! highgui::create_window("preview", 0)?;
//! highgui::show_image("preview", &ImageView::bgr(64, 48, &pixels))?;
//! highgui::wait_key(0)?;
//! # Ok::<(), wlgui::Error>(())
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod highgui;
pub mod input;
pub mod protocol;
pub mod surface;
pub mod window;

#[cfg(test)]
pub(crate) mod test_server;

pub use config::BackendConfig;
pub use error::{Error, ErrorKind, Result};
