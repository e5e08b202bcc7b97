//! Registry globals
//!
//! Binds the four capabilities the backend needs and checks they are all
//! present after the first round-trip.

use log::debug;
use wayland_client::protocol::{wl_compositor, wl_registry, wl_seat, wl_shm};
use wayland_client::QueueHandle;
use wayland_protocols::xdg::shell::client::xdg_wm_base;

use super::ClientState;
use crate::error::{Error, Result};
use crate::input::InputRouter;

/// Highest `wl_compositor` version used
pub const COMPOSITOR_VERSION: u32 = 4;
/// Highest `wl_shm` version used
pub const SHM_VERSION: u32 = 1;
/// Highest `xdg_wm_base` version used
pub const WM_BASE_VERSION: u32 = 2;
/// Highest `wl_seat` version used
pub const SEAT_VERSION: u32 = 5;

/// Globals bound so far
#[derive(Debug, Default)]
pub struct Globals {
    pub compositor: Option<wl_compositor::WlCompositor>,
    pub shm: Option<wl_shm::WlShm>,
    pub wm_base: Option<xdg_wm_base::XdgWmBase>,
}

/// The capability set a connection needs, all present
#[derive(Debug, Clone)]
pub struct BoundGlobals {
    pub compositor: wl_compositor::WlCompositor,
    pub shm: wl_shm::WlShm,
    pub wm_base: xdg_wm_base::XdgWmBase,
}

impl Globals {
    /// Check every required capability was bound
    pub fn require(&self) -> Result<BoundGlobals> {
        Ok(BoundGlobals {
            compositor: self
                .compositor
                .clone()
                .ok_or(Error::MissingGlobal("wl_compositor"))?,
            shm: self.shm.clone().ok_or(Error::MissingGlobal("wl_shm"))?,
            wm_base: self
                .wm_base
                .clone()
                .ok_or(Error::MissingGlobal("xdg_wm_base"))?,
        })
    }
}

/// Bind an advertised global if it is one the backend uses
pub(super) fn bind_global(
    state: &mut ClientState,
    registry: &wl_registry::WlRegistry,
    name: u32,
    interface: &str,
    version: u32,
    qh: &QueueHandle<ClientState>,
) {
    match interface {
        "wl_compositor" if state.globals.compositor.is_none() => {
            let compositor = registry.bind::<wl_compositor::WlCompositor, _, _>(
                name,
                version.min(COMPOSITOR_VERSION),
                qh,
                (),
            );
            state.globals.compositor = Some(compositor);
        }
        "wl_shm" if state.globals.shm.is_none() => {
            let shm = registry.bind::<wl_shm::WlShm, _, _>(name, version.min(SHM_VERSION), qh, ());
            state.globals.shm = Some(shm);
        }
        "xdg_wm_base" if state.globals.wm_base.is_none() => {
            let wm_base = registry.bind::<xdg_wm_base::XdgWmBase, _, _>(
                name,
                version.min(WM_BASE_VERSION),
                qh,
                (),
            );
            state.globals.wm_base = Some(wm_base);
        }
        "wl_seat" if state.input.is_none() => {
            let seat =
                registry.bind::<wl_seat::WlSeat, _, _>(name, version.min(SEAT_VERSION), qh, ());
            state.input = Some(InputRouter::new(seat));
        }
        _ => return,
    }
    debug!("Bound {} v{}", interface, version);
}
