//! Input handling module
//!
//! This module provides keyboard decoding, pointer focus routing, and seat
//! management.

pub mod keyboard;
pub mod pointer;
pub mod seat;

pub use keyboard::{KeyQueue, Keyboard};
pub use pointer::{MouseButton, PointerEvent, PointerFocus};
pub use seat::{InputRouter, SeatCapabilities};
