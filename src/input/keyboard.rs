//! Keyboard handling and XKB integration

use std::collections::VecDeque;
use std::fs::File;
use std::os::unix::io::OwnedFd;

use log::{debug, warn};
use memmap2::MmapOptions;
use xkbcommon::xkb;

use crate::error::{Error, Result};

/// Evdev key codes are offset by 8 in XKB
const EVDEV_OFFSET: u32 = 8;

/// Decoded keys awaiting consumption.
///
/// Consumption takes the newest key and drops the backlog.
#[derive(Debug, Default)]
pub struct KeyQueue {
    keys: VecDeque<u8>,
}

impl KeyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: u8) {
        self.keys.push_back(key);
    }

    /// Newest key, if any. The queue is empty afterwards.
    pub fn take_latest(&mut self) -> Option<u8> {
        let key = self.keys.back().copied();
        self.keys.clear();
        key
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Modifier masks derived from the keymap
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierMasks {
    pub control: xkb::ModMask,
    pub alt: xkb::ModMask,
    pub shift: xkb::ModMask,
}

impl ModifierMasks {
    fn from_keymap(keymap: &xkb::Keymap) -> Self {
        let mask = |name: &str| match keymap.mod_get_index(name) {
            xkb::MOD_INVALID => 0,
            index => 1 << index,
        };
        Self {
            control: mask(xkb::MOD_NAME_CTRL),
            alt: mask(xkb::MOD_NAME_ALT),
            shift: mask(xkb::MOD_NAME_SHIFT),
        }
    }
}

/// Compiled keymap and its live state
struct Xkb {
    _keymap: xkb::Keymap,
    state: xkb::State,
    masks: ModifierMasks,
}

/// Keyboard state: keymap, modifiers and the key queue
pub struct Keyboard {
    context: xkb::Context,
    xkb: Option<Xkb>,
    /// Effective modifiers from the last modifiers event
    modifiers: xkb::ModMask,
    queue: KeyQueue,
}

impl Keyboard {
    pub fn new() -> Self {
        Self {
            context: xkb::Context::new(xkb::CONTEXT_NO_FLAGS),
            xkb: None,
            modifiers: 0,
            queue: KeyQueue::new(),
        }
    }

    /// Compile an XKB text keymap. Only the first keymap is kept.
    pub fn load_keymap_str(&mut self, keymap: &str) -> Result<()> {
        if self.xkb.is_some() {
            debug!("Keymap already compiled, ignoring new one");
            return Ok(());
        }
        let text = keymap.trim_end_matches('\0').to_string();
        let keymap = xkb::Keymap::new_from_string(
            &self.context,
            text,
            xkb::KEYMAP_FORMAT_TEXT_V1,
            xkb::KEYMAP_COMPILE_NO_FLAGS,
        )
        .ok_or_else(|| Error::Keymap("failed to compile keymap".into()))?;

        let masks = ModifierMasks::from_keymap(&keymap);
        let state = xkb::State::new(&keymap);
        debug!("Compiled keymap, modifier masks {:?}", masks);
        self.xkb = Some(Xkb {
            _keymap: keymap,
            state,
            masks,
        });
        Ok(())
    }

    /// Map and compile a keymap handed over as a file descriptor
    pub fn load_keymap_fd(&mut self, fd: OwnedFd, size: u32) -> Result<()> {
        let file = File::from(fd);
        // SAFETY: read-only private mapping of a keymap the server will not
        // modify while we hold it.
        let map = unsafe { MmapOptions::new().len(size as usize).map(&file)? };
        let text = std::str::from_utf8(&map)
            .map_err(|_| Error::Keymap("keymap is not valid UTF-8".into()))?;
        self.load_keymap_str(text)
    }

    /// Whether a keymap has been compiled
    pub fn has_keymap(&self) -> bool {
        self.xkb.is_some()
    }

    /// Modifier masks of the compiled keymap
    pub fn masks(&self) -> Option<ModifierMasks> {
        self.xkb.as_ref().map(|xkb| xkb.masks)
    }

    /// Handle a key event. Only releases produce a queued key.
    pub fn key(&mut self, raw: u32, pressed: bool) {
        if pressed {
            return;
        }
        let Some(xkb) = &self.xkb else {
            debug!("Key {} released before any keymap", raw);
            return;
        };
        let Some(code) = raw.checked_add(EVDEV_OFFSET) else {
            debug!("Key code {:#x} out of range", raw);
            return;
        };
        let keysym = xkb.state.key_get_one_sym(xkb::Keycode::new(code));
        let key = keysym_to_ascii(u32::from(keysym));
        self.queue.push(key);
        debug!("Key {:#x} queued", key);
    }

    /// Update modifier state
    pub fn modifiers(&mut self, depressed: u32, latched: u32, locked: u32, group: u32) {
        self.modifiers = depressed | latched | locked;
        if let Some(xkb) = &mut self.xkb {
            xkb.state
                .update_mask(depressed, latched, locked, 0, 0, group);
        }
    }

    /// Whether control is held
    pub fn control(&self) -> bool {
        self.masks()
            .is_some_and(|m| m.control != 0 && self.modifiers & m.control != 0)
    }

    /// Whether alt is held
    pub fn alt(&self) -> bool {
        self.masks()
            .is_some_and(|m| m.alt != 0 && self.modifiers & m.alt != 0)
    }

    /// Whether shift is held
    pub fn shift(&self) -> bool {
        self.masks()
            .is_some_and(|m| m.shift != 0 && self.modifiers & m.shift != 0)
    }

    /// Newest decoded key; the backlog is discarded
    pub fn get_key(&mut self) -> Option<u8> {
        let key = self.queue.take_latest();
        if let Some(key) = key {
            debug!("Key {:#x} dequeued", key);
        }
        key
    }

    /// Queue a decoded key directly
    pub fn push_key(&mut self, key: u8) {
        self.queue.push(key);
    }

    /// Drop the compiled keymap
    pub fn clear_keymap(&mut self) {
        if self.xkb.take().is_some() {
            debug!("Keymap discarded");
        }
    }
}

impl Default for Keyboard {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Keyboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keyboard")
            .field("has_keymap", &self.has_keymap())
            .field("modifiers", &self.modifiers)
            .field("queue", &self.queue)
            .finish()
    }
}

/// Low byte of a keysym. Latin-1 keysyms equal their character code.
pub fn keysym_to_ascii(keysym: u32) -> u8 {
    (keysym & 0xff) as u8
}

/// Log and swallow a keymap problem; the keyboard stays inert
pub(crate) fn report_keymap_error(err: &Error) {
    warn!("Keyboard input unavailable: {}", err);
}
