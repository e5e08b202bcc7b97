//! Backend configuration
//!
//! Settings are plain values with defaults; [`BackendConfig::from_env`]
//! overlays the `WLGUI_*` environment variables.

use std::env;
use std::path::PathBuf;

/// Environment variable naming an explicit display target
pub const DISPLAY_ENV: &str = "WLGUI_DISPLAY";
/// Environment variable overriding the toplevel app id
pub const APP_ID_ENV: &str = "WLGUI_APP_ID";

/// Backend configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// Display target. `None` uses `WAYLAND_DISPLAY`/`WAYLAND_SOCKET`.
    pub display: Option<String>,
    /// App id announced for every toplevel
    pub app_id: String,
    /// Width of a window that has not shown an image yet
    pub default_width: u32,
    /// Height of a window that has not shown an image yet
    pub default_height: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            display: None,
            app_id: "wlgui".to_string(),
            default_width: 320,
            default_height: 240,
        }
    }
}

impl BackendConfig {
    /// Defaults overlaid with the `WLGUI_*` environment variables
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }

    fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(display) = lookup(DISPLAY_ENV).filter(|d| !d.is_empty()) {
            config.display = Some(display);
        }
        if let Some(app_id) = lookup(APP_ID_ENV).filter(|a| !a.is_empty()) {
            config.app_id = app_id;
        }
        config
    }

    /// Use an explicit display target
    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    /// Resolve the display target to a socket path.
    ///
    /// Absolute targets are used as is; anything else is a socket name
    /// inside `runtime_dir`. Returns `None` when no target is configured or
    /// a relative target has no runtime directory to live in.
    pub fn socket_path(&self, runtime_dir: Option<PathBuf>) -> Option<PathBuf> {
        let display = self.display.as_deref()?;
        let path = PathBuf::from(display);
        if path.is_absolute() {
            Some(path)
        } else {
            runtime_dir.map(|dir| dir.join(path))
        }
    }
}
