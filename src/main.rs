//! wlgui demo
//!
//! Shows a test pattern, logs mouse events and exits on `q` or Escape.

use log::info;
use wlgui::highgui;
use wlgui::surface::ImageView;
use wlgui::BackendConfig;

const WINDOW: &str = "wlgui";
const WIDTH: u32 = 320;
const HEIGHT: u32 = 240;
const KEY_ESCAPE: u8 = 0x1b;

/// BGR gradient with a white cross through the middle
fn test_pattern(width: u32, height: u32) -> Vec<u8> {
    let mut pixels = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            if x == width / 2 || y == height / 2 {
                pixels.extend_from_slice(&[0xff, 0xff, 0xff]);
            } else {
                let b = (x * 255 / width) as u8;
                let g = (y * 255 / height) as u8;
                pixels.extend_from_slice(&[b, g, 0x80]);
            }
        }
    }
    pixels
}

fn run() -> anyhow::Result<()> {
    let mut config = BackendConfig::from_env();
    if let Some(display) = std::env::args().nth(1) {
        config = config.with_display(display);
    }
    highgui::init_with(config)?;

    highgui::create_window(WINDOW, 0)?;
    highgui::set_mouse_callback(WINDOW, |event| {
        info!(
            "mouse {:?} at ({}, {}) flags {:?}",
            event.kind, event.x, event.y, event.flags
        );
    })?;

    let pixels = test_pattern(WIDTH, HEIGHT);
    highgui::show_image(WINDOW, &ImageView::bgr(WIDTH, HEIGHT, &pixels))?;
    info!("Press q or Escape to quit");

    loop {
        if highgui::window_close_requested(WINDOW)? {
            info!("Window closed");
            break;
        }
        match highgui::wait_key(100)? {
            Some(b'q') | Some(KEY_ESCAPE) => break,
            Some(key) => info!("key {:?} ({:#04x})", key as char, key),
            None => {}
        }
    }

    highgui::destroy_all_windows()?;
    highgui::shutdown()?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting wlgui demo");
    run()
}
