//! Input seat coordination
//!
//! The [`InputRouter`] owns the seat's pointer and keyboard objects, the
//! pointer focus stack and the keyboard state. Pointer events are resolved
//! to windows and queued; the backend delivers them after dispatch.

use std::collections::VecDeque;

use log::{debug, trace};
use wayland_client::protocol::{wl_keyboard, wl_pointer, wl_seat};
use wayland_client::{Proxy, QueueHandle};

use super::{Keyboard, PointerEvent, PointerFocus};
use crate::protocol::ClientState;
use crate::window::WindowId;

/// Seat capabilities
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeatCapabilities {
    pub keyboard: bool,
    pub pointer: bool,
    pub touch: bool,
}

impl SeatCapabilities {
    /// Decode Wayland capability flags
    pub fn from_wayland(caps: wl_seat::Capability) -> Self {
        Self {
            pointer: caps.contains(wl_seat::Capability::Pointer),
            keyboard: caps.contains(wl_seat::Capability::Keyboard),
            touch: caps.contains(wl_seat::Capability::Touch),
        }
    }
}

/// Routed pointer events kept between deliveries; older ones are dropped
pub const MAX_PENDING_POINTER_EVENTS: usize = 256;

/// Pointer events awaiting delivery, bounded by
/// [`MAX_PENDING_POINTER_EVENTS`]
#[derive(Debug, Default)]
pub struct PendingPointerEvents {
    events: VecDeque<(WindowId, PointerEvent)>,
}

impl PendingPointerEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, routed: (WindowId, PointerEvent)) {
        if self.events.len() == MAX_PENDING_POINTER_EVENTS {
            let dropped = self.events.pop_front();
            trace!("Pointer backlog full, dropping {:?}", dropped);
        }
        self.events.push_back(routed);
    }

    pub fn take(&mut self) -> Vec<(WindowId, PointerEvent)> {
        self.events.drain(..).collect()
    }

    pub fn forget(&mut self, window: WindowId) {
        self.events.retain(|(w, _)| *w != window);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Routes a single seat's input to windows
pub struct InputRouter {
    seat: wl_seat::WlSeat,
    pointer: Option<wl_pointer::WlPointer>,
    keyboard_proxy: Option<wl_keyboard::WlKeyboard>,
    capabilities: SeatCapabilities,
    name: Option<String>,
    pub(crate) focus: PointerFocus,
    pub(crate) keyboard: Keyboard,
    pending: PendingPointerEvents,
}

impl InputRouter {
    /// Router for a freshly bound seat
    pub fn new(seat: wl_seat::WlSeat) -> Self {
        debug!("Input router created for seat {:?}", seat.id());
        Self {
            seat,
            pointer: None,
            keyboard_proxy: None,
            capabilities: SeatCapabilities::default(),
            name: None,
            focus: PointerFocus::new(),
            keyboard: Keyboard::new(),
            pending: PendingPointerEvents::new(),
        }
    }

    /// Apply a capability announcement, creating or releasing devices
    pub fn set_capabilities(&mut self, caps: SeatCapabilities, qh: &QueueHandle<ClientState>) {
        if caps.pointer && self.pointer.is_none() {
            self.pointer = Some(self.seat.get_pointer(qh, ()));
            debug!("Pointer available");
        } else if !caps.pointer {
            if let Some(pointer) = self.pointer.take() {
                if pointer.version() >= 3 {
                    pointer.release();
                }
                self.focus = PointerFocus::new();
                debug!("Pointer removed");
            }
        }

        if caps.keyboard && self.keyboard_proxy.is_none() {
            self.keyboard_proxy = Some(self.seat.get_keyboard(qh, ()));
            debug!("Keyboard available");
        } else if !caps.keyboard {
            if let Some(keyboard) = self.keyboard_proxy.take() {
                if keyboard.version() >= 3 {
                    keyboard.release();
                }
                self.keyboard.clear_keymap();
                debug!("Keyboard removed");
            }
        }

        self.capabilities = caps;
    }

    pub fn capabilities(&self) -> SeatCapabilities {
        self.capabilities
    }

    pub fn set_name(&mut self, name: String) {
        debug!("Seat name: {}", name);
        self.name = Some(name);
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Queue a routed pointer event for delivery
    pub fn route(&mut self, routed: Option<(WindowId, PointerEvent)>) {
        if let Some(routed) = routed {
            self.pending.push(routed);
        }
    }

    /// Take every pointer event routed since the last call
    pub fn take_pending(&mut self) -> Vec<(WindowId, PointerEvent)> {
        self.pending.take()
    }

    /// Forget a destroyed window, including queued events for it
    pub fn forget(&mut self, window: WindowId) {
        self.focus.forget(window);
        self.pending.forget(window);
    }

    pub fn keyboard(&mut self) -> &mut Keyboard {
        &mut self.keyboard
    }
}

impl Drop for InputRouter {
    fn drop(&mut self) {
        if let Some(pointer) = self.pointer.take() {
            if pointer.version() >= 3 {
                pointer.release();
            }
        }
        if let Some(keyboard) = self.keyboard_proxy.take() {
            if keyboard.version() >= 3 {
                keyboard.release();
            }
        }
        if self.seat.version() >= 5 {
            self.seat.release();
        }
        debug!("Input router dropped");
    }
}
