//! Name and handle lookup for windows
//!
//! Windows are keyed by their unique name. Each one also gets an opaque
//! [`WindowHandle`] for the host library and is findable by [`WindowId`]
//! so routed input can reach it.

use std::collections::HashMap;
use std::num::NonZeroU64;

use super::{WindowHandle, WindowId};

#[derive(Debug)]
struct Entry<W> {
    id: WindowId,
    handle: WindowHandle,
    window: W,
}

/// Registry of live windows
#[derive(Debug)]
pub struct WindowRegistry<W> {
    windows: HashMap<String, Entry<W>>,
    /// Handle to name, populated at insertion
    names: HashMap<WindowHandle, String>,
    /// Window id to name
    ids: HashMap<WindowId, String>,
    next_handle: NonZeroU64,
}

impl<W> WindowRegistry<W> {
    pub fn new() -> Self {
        Self {
            windows: HashMap::new(),
            names: HashMap::new(),
            ids: HashMap::new(),
            next_handle: NonZeroU64::MIN,
        }
    }

    /// Register a window. Returns `None` if the name is taken.
    pub fn insert(&mut self, name: &str, id: WindowId, window: W) -> Option<WindowHandle> {
        if self.windows.contains_key(name) {
            return None;
        }
        let handle = WindowHandle(self.next_handle);
        self.next_handle = self.next_handle.saturating_add(1);

        self.names.insert(handle, name.to_string());
        self.ids.insert(id, name.to_string());
        self.windows.insert(
            name.to_string(),
            Entry {
                id,
                handle,
                window,
            },
        );
        Some(handle)
    }

    /// Remove a window by name, returning it
    pub fn remove(&mut self, name: &str) -> Option<(WindowId, W)> {
        let entry = self.windows.remove(name)?;
        self.names.remove(&entry.handle);
        self.ids.remove(&entry.id);
        Some((entry.id, entry.window))
    }

    /// Remove every window, returning them
    pub fn drain(&mut self) -> Vec<(WindowId, W)> {
        self.names.clear();
        self.ids.clear();
        self.windows
            .drain()
            .map(|(_, entry)| (entry.id, entry.window))
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&W> {
        self.windows.get(name).map(|entry| &entry.window)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut W> {
        self.windows.get_mut(name).map(|entry| &mut entry.window)
    }

    /// Look up a window by id
    pub fn by_id_mut(&mut self, id: WindowId) -> Option<&mut W> {
        let name = self.ids.get(&id)?;
        self.windows.get_mut(name).map(|entry| &mut entry.window)
    }

    pub fn handle(&self, name: &str) -> Option<WindowHandle> {
        self.windows.get(name).map(|entry| entry.handle)
    }

    /// Reverse lookup of a handle
    pub fn name_of(&self, handle: WindowHandle) -> Option<&str> {
        self.names.get(&handle).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.windows.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

impl<W> Default for WindowRegistry<W> {
    fn default() -> Self {
        Self::new()
    }
}
