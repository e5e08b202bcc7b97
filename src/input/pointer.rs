//! Pointer focus tracking and event routing

use log::{debug, trace};

use crate::window::WindowId;

/// Linux evdev code of the left button
pub const BTN_LEFT: u32 = 0x110;
/// Linux evdev code of the right button
pub const BTN_RIGHT: u32 = 0x111;
/// Linux evdev code of the middle button
pub const BTN_MIDDLE: u32 = 0x112;

/// Logical mouse button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    /// Translate a raw button code; unknown codes map to `None`
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            BTN_LEFT => Some(MouseButton::Left),
            BTN_RIGHT => Some(MouseButton::Right),
            BTN_MIDDLE => Some(MouseButton::Middle),
            _ => None,
        }
    }
}

/// A pointer event resolved to a window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    /// Pointer entered the window at a position
    Enter { x: i32, y: i32 },
    /// Pointer moved within the window
    Motion { x: i32, y: i32 },
    /// A button changed state
    Button { code: u32, pressed: bool },
}

/// Stack of windows the pointer is currently over.
///
/// Enter pushes, leave pops; motion and buttons go to the top. A leave for a
/// window that is not on top only removes that window.
#[derive(Debug, Default)]
pub struct PointerFocus {
    entered: Vec<WindowId>,
}

impl PointerFocus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pointer entered `window`
    pub fn enter(&mut self, window: WindowId, x: i32, y: i32) -> (WindowId, PointerEvent) {
        self.entered.push(window);
        debug!("Pointer entered {:?} at ({}, {})", window, x, y);
        (window, PointerEvent::Enter { x, y })
    }

    /// Pointer left `window`. Nothing is forwarded.
    ///
    /// Returns the window popped off the top, if `window` was the focus.
    pub fn leave(&mut self, window: WindowId) -> Option<WindowId> {
        if self.focus() == Some(window) {
            debug!("Pointer left {:?}", window);
            return self.entered.pop();
        }
        debug!("Pointer left {:?} while not focused", window);
        self.entered.retain(|&w| w != window);
        None
    }

    /// Pointer moved over the top window
    pub fn motion(&self, x: i32, y: i32) -> Option<(WindowId, PointerEvent)> {
        let window = self.focus()?;
        trace!("Pointer motion on {:?} at ({}, {})", window, x, y);
        Some((window, PointerEvent::Motion { x, y }))
    }

    /// A button changed state over the top window
    pub fn button(&self, code: u32, pressed: bool) -> Option<(WindowId, PointerEvent)> {
        let window = self.focus()?;
        debug!("Button {:#x} pressed={} on {:?}", code, pressed, window);
        Some((window, PointerEvent::Button { code, pressed }))
    }

    /// Window on top of the focus stack
    pub fn focus(&self) -> Option<WindowId> {
        self.entered.last().copied()
    }

    /// Forget a destroyed window
    pub fn forget(&mut self, window: WindowId) {
        self.entered.retain(|&w| w != window);
    }

    /// Depth of the focus stack
    pub fn depth(&self) -> usize {
        self.entered.len()
    }
}
