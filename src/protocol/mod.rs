//! Wayland client protocol state
//!
//! [`ClientState`] is the dispatch target of the connection's event queue.
//! It holds the bound globals, the announced shm formats and the input
//! router. Windows live outside of it; anything the server tells a window
//! travels through object user data or the router's pending queue.

mod dispatch;
mod globals;

pub use globals::{BoundGlobals, Globals};

use crate::input::InputRouter;
use crate::surface::shm::ShmFormats;

/// State passed to Wayland dispatch handlers
#[derive(Default)]
pub struct ClientState {
    /// Globals bound from the registry
    pub globals: Globals,
    /// Formats announced by `wl_shm`
    pub formats: ShmFormats,
    /// Input routing, present once a seat is bound
    pub input: Option<InputRouter>,
}

impl ClientState {
    pub fn new() -> Self {
        Self::default()
    }
}
