//! Wayland protocol dispatch implementations
//!
//! Implements the Dispatch trait for each Wayland protocol object.

use std::sync::Arc;

use log::{debug, trace, warn};
use wayland_client::protocol::{
    wl_buffer, wl_compositor, wl_keyboard, wl_pointer, wl_registry, wl_seat, wl_shm, wl_shm_pool,
    wl_surface,
};
use wayland_client::{delegate_noop, Connection, Dispatch, Proxy, QueueHandle, WEnum};
use wayland_protocols::xdg::shell::client::{xdg_surface, xdg_toplevel, xdg_wm_base};

use super::globals::bind_global;
use super::ClientState;
use crate::input::keyboard::report_keymap_error;
use crate::input::SeatCapabilities;
use crate::surface::shm::ShmFormat;
use crate::surface::BusyFlag;
use crate::window::{SurfaceData, WindowId};

delegate_noop!(ClientState: ignore wl_compositor::WlCompositor);
delegate_noop!(ClientState: ignore wl_shm_pool::WlShmPool);

// ============================================================================
// wl_registry
// ============================================================================

impl Dispatch<wl_registry::WlRegistry, ()> for ClientState {
    fn event(
        state: &mut Self,
        registry: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        _data: &(),
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_registry::Event::Global {
                name,
                interface,
                version,
            } => {
                trace!("Global {} v{} ({})", interface, version, name);
                bind_global(state, registry, name, &interface, version, qh);
            }
            wl_registry::Event::GlobalRemove { name } => {
                debug!("Global {} removed", name);
            }
            _ => {}
        }
    }
}

// ============================================================================
// wl_shm
// ============================================================================

impl Dispatch<wl_shm::WlShm, ()> for ClientState {
    fn event(
        state: &mut Self,
        _proxy: &wl_shm::WlShm,
        event: wl_shm::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let wl_shm::Event::Format { format } = event {
            let raw = match format {
                WEnum::Value(format) => u32::from(format),
                WEnum::Unknown(raw) => raw,
            };
            trace!("shm format {:#x}", raw);
            state.formats.insert(ShmFormat::from_wayland(raw));
        }
    }
}

// ============================================================================
// wl_buffer
// ============================================================================

impl Dispatch<wl_buffer::WlBuffer, BusyFlag> for ClientState {
    fn event(
        _state: &mut Self,
        _proxy: &wl_buffer::WlBuffer,
        event: wl_buffer::Event,
        busy: &BusyFlag,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let wl_buffer::Event::Release = event {
            trace!("Buffer released");
            busy.release();
        }
    }
}

// ============================================================================
// xdg_wm_base
// ============================================================================

impl Dispatch<xdg_wm_base::XdgWmBase, ()> for ClientState {
    fn event(
        _state: &mut Self,
        wm_base: &xdg_wm_base::XdgWmBase,
        event: xdg_wm_base::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let xdg_wm_base::Event::Ping { serial } = event {
            trace!("Ping {}", serial);
            wm_base.pong(serial);
        }
    }
}

// ============================================================================
// wl_surface / xdg_surface / xdg_toplevel
// ============================================================================

impl Dispatch<wl_surface::WlSurface, WindowId> for ClientState {
    fn event(
        _state: &mut Self,
        _proxy: &wl_surface::WlSurface,
        event: wl_surface::Event,
        window: &WindowId,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        trace!("Surface event for {:?}: {:?}", window, event);
    }
}

impl Dispatch<xdg_surface::XdgSurface, Arc<SurfaceData>> for ClientState {
    fn event(
        _state: &mut Self,
        xdg_surface: &xdg_surface::XdgSurface,
        event: xdg_surface::Event,
        data: &Arc<SurfaceData>,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let xdg_surface::Event::Configure { serial } = event {
            xdg_surface.ack_configure(serial);
            data.set_configured();
            debug!("{:?} configured (serial {})", data.id, serial);
        }
    }
}

impl Dispatch<xdg_toplevel::XdgToplevel, Arc<SurfaceData>> for ClientState {
    fn event(
        _state: &mut Self,
        _proxy: &xdg_toplevel::XdgToplevel,
        event: xdg_toplevel::Event,
        data: &Arc<SurfaceData>,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            xdg_toplevel::Event::Configure { width, height, .. } => {
                // Size suggestions are ignored; the shown image decides
                trace!("{:?} suggested size {}x{}", data.id, width, height);
            }
            xdg_toplevel::Event::Close => {
                debug!("Close requested for {:?}", data.id);
                data.request_close();
            }
            _ => {}
        }
    }
}

// ============================================================================
// wl_seat
// ============================================================================

impl Dispatch<wl_seat::WlSeat, ()> for ClientState {
    fn event(
        state: &mut Self,
        _proxy: &wl_seat::WlSeat,
        event: wl_seat::Event,
        _data: &(),
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        let Some(input) = state.input.as_mut() else {
            return;
        };
        match event {
            wl_seat::Event::Capabilities {
                capabilities: WEnum::Value(caps),
            } => {
                input.set_capabilities(SeatCapabilities::from_wayland(caps), qh);
            }
            wl_seat::Event::Name { name } => input.set_name(name),
            _ => {}
        }
    }
}

// ============================================================================
// wl_pointer
// ============================================================================

impl Dispatch<wl_pointer::WlPointer, ()> for ClientState {
    fn event(
        state: &mut Self,
        _proxy: &wl_pointer::WlPointer,
        event: wl_pointer::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let Some(input) = state.input.as_mut() else {
            return;
        };
        match event {
            wl_pointer::Event::Enter {
                surface,
                surface_x,
                surface_y,
                ..
            } => {
                // Surfaces without a window id are not ours
                if let Some(&window) = surface.data::<WindowId>() {
                    let routed = input.focus.enter(window, surface_x as i32, surface_y as i32);
                    input.route(Some(routed));
                }
            }
            wl_pointer::Event::Leave { surface, .. } => {
                if let Some(&window) = surface.data::<WindowId>() {
                    input.focus.leave(window);
                }
            }
            wl_pointer::Event::Motion {
                surface_x,
                surface_y,
                ..
            } => {
                let routed = input.focus.motion(surface_x as i32, surface_y as i32);
                input.route(routed);
            }
            wl_pointer::Event::Button { button, state, .. } => {
                let pressed = matches!(state, WEnum::Value(wl_pointer::ButtonState::Pressed));
                let routed = input.focus.button(button, pressed);
                input.route(routed);
            }
            wl_pointer::Event::Axis { axis, value, .. } => {
                trace!("Axis {:?} value {} ignored", axis, value);
            }
            _ => {}
        }
    }
}

// ============================================================================
// wl_keyboard
// ============================================================================

impl Dispatch<wl_keyboard::WlKeyboard, ()> for ClientState {
    fn event(
        state: &mut Self,
        _proxy: &wl_keyboard::WlKeyboard,
        event: wl_keyboard::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let Some(input) = state.input.as_mut() else {
            return;
        };
        let keyboard = input.keyboard();
        match event {
            wl_keyboard::Event::Keymap { format, fd, size } => match format {
                WEnum::Value(wl_keyboard::KeymapFormat::XkbV1) => {
                    if let Err(err) = keyboard.load_keymap_fd(fd, size) {
                        report_keymap_error(&err);
                    }
                }
                other => warn!("Unsupported keymap format {:?}", other),
            },
            wl_keyboard::Event::Key { key, state, .. } => {
                let pressed = matches!(state, WEnum::Value(wl_keyboard::KeyState::Pressed));
                keyboard.key(key, pressed);
            }
            wl_keyboard::Event::Modifiers {
                mods_depressed,
                mods_latched,
                mods_locked,
                group,
                ..
            } => {
                trace!(
                    "Modifiers depressed {}, latched {}, locked {}, group {}",
                    mods_depressed,
                    mods_latched,
                    mods_locked,
                    group
                );
                keyboard.modifiers(mods_depressed, mods_latched, mods_locked, group);
            }
            _ => {}
        }
    }
}
