//! Per-window mouse state and callback translation

use bitflags::bitflags;

use crate::input::{MouseButton, PointerEvent};

/// Mouse event kinds, numbered as the host library numbers them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum MouseEventKind {
    Move = 0,
    LeftButtonDown = 1,
    RightButtonDown = 2,
    MiddleButtonDown = 3,
    LeftButtonUp = 4,
    RightButtonUp = 5,
    MiddleButtonUp = 6,
}

impl MouseEventKind {
    fn button(button: MouseButton, pressed: bool) -> Self {
        match (button, pressed) {
            (MouseButton::Left, true) => MouseEventKind::LeftButtonDown,
            (MouseButton::Right, true) => MouseEventKind::RightButtonDown,
            (MouseButton::Middle, true) => MouseEventKind::MiddleButtonDown,
            (MouseButton::Left, false) => MouseEventKind::LeftButtonUp,
            (MouseButton::Right, false) => MouseEventKind::RightButtonUp,
            (MouseButton::Middle, false) => MouseEventKind::MiddleButtonUp,
        }
    }
}

bitflags! {
    /// Button flags carried by mouse events
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MouseFlags: i32 {
        const LBUTTON = 1;
        const RBUTTON = 2;
        const MBUTTON = 4;
    }
}

impl From<MouseButton> for MouseFlags {
    fn from(button: MouseButton) -> Self {
        match button {
            MouseButton::Left => MouseFlags::LBUTTON,
            MouseButton::Right => MouseFlags::RBUTTON,
            MouseButton::Middle => MouseFlags::MBUTTON,
        }
    }
}

/// A translated mouse event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    pub kind: MouseEventKind,
    pub x: i32,
    pub y: i32,
    pub flags: MouseFlags,
}

/// Mouse callback; any host context is captured by the closure
pub type MouseCallback = Box<dyn FnMut(MouseEvent)>;

/// Drag and position state of one window
#[derive(Default)]
pub struct MouseState {
    drag: bool,
    button: Option<MouseButton>,
    last_x: i32,
    last_y: i32,
    callback: Option<MouseCallback>,
}

impl MouseState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the registered callback
    pub fn set_callback(&mut self, callback: Option<MouseCallback>) {
        self.callback = callback;
    }

    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    /// Whether a button is held
    pub fn dragging(&self) -> bool {
        self.drag
    }

    /// Last pointer position
    pub fn position(&self) -> (i32, i32) {
        (self.last_x, self.last_y)
    }

    /// Translate a routed pointer event. Unknown buttons yield nothing.
    pub fn translate(&mut self, event: PointerEvent) -> Option<MouseEvent> {
        match event {
            PointerEvent::Enter { x, y } => {
                self.last_x = x;
                self.last_y = y;
                Some(MouseEvent {
                    kind: MouseEventKind::Move,
                    x,
                    y,
                    flags: MouseFlags::empty(),
                })
            }
            PointerEvent::Motion { x, y } => {
                self.last_x = x;
                self.last_y = y;
                let flags = match (self.drag, self.button) {
                    (true, Some(button)) => button.into(),
                    _ => MouseFlags::empty(),
                };
                Some(MouseEvent {
                    kind: MouseEventKind::Move,
                    x,
                    y,
                    flags,
                })
            }
            PointerEvent::Button { code, pressed } => {
                let button = MouseButton::from_code(code)?;
                self.button = Some(button);
                self.drag = pressed;
                Some(MouseEvent {
                    kind: MouseEventKind::button(button, pressed),
                    x: self.last_x,
                    y: self.last_y,
                    flags: button.into(),
                })
            }
        }
    }

    /// Translate and deliver to the callback, if one is registered
    pub fn handle(&mut self, event: PointerEvent) {
        if let Some(event) = self.translate(event) {
            if let Some(callback) = self.callback.as_mut() {
                callback(event);
            }
        }
    }
}

impl std::fmt::Debug for MouseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MouseState")
            .field("drag", &self.drag)
            .field("button", &self.button)
            .field("position", &(self.last_x, self.last_y))
            .field("callback", &self.callback.is_some())
            .finish()
    }
}
