//! In-process display server for tests
//!
//! A minimal compositor on one end of a socket pair, running on its own
//! thread. It advertises compositor, shm, seat and xdg_wm_base globals,
//! answers the requests the client side makes and records what it saw.
//! Tests inject events by running closures against [`ServerState`].

use std::fs::File;
use std::io::Write;
use std::os::unix::io::AsFd;
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::debug;
use memmap2::Mmap;
use wayland_protocols::xdg::shell::server::{xdg_surface, xdg_toplevel, xdg_wm_base};
use wayland_server::protocol::{
    wl_buffer, wl_compositor, wl_keyboard, wl_pointer, wl_seat, wl_shm, wl_shm_pool, wl_surface,
};
use wayland_server::{
    Client, DataInit, Dispatch, Display, DisplayHandle, GlobalDispatch, New, Resource,
};
use xkbcommon::xkb;

type Task = Box<dyn FnOnce(&mut ServerState) + Send>;

/// Text of the default US keymap
pub fn us_keymap() -> String {
    let context = xkb::Context::new(xkb::CONTEXT_NO_FLAGS);
    let keymap = xkb::Keymap::new_from_names(
        &context,
        "",
        "",
        "us",
        "",
        None,
        xkb::KEYMAP_COMPILE_NO_FLAGS,
    )
    .expect("us keymap");
    keymap.get_as_string(xkb::KEYMAP_FORMAT_TEXT_V1)
}

/// What the server offers
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Advertise XRGB8888 next to ARGB8888
    pub advertise_xrgb: bool,
    /// Advertise a seat with pointer and keyboard
    pub seat: bool,
    /// XKB text keymap sent to every keyboard
    pub keymap: Option<String>,
    /// Release each buffer as soon as it is committed
    pub release_on_commit: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            advertise_xrgb: true,
            seat: true,
            keymap: None,
            release_on_commit: true,
        }
    }
}

/// A committed frame read back from shared memory
#[derive(Debug, Clone)]
pub struct CommittedFrame {
    pub width: i32,
    pub height: i32,
    pub pixels: Vec<u32>,
}

/// Requests recorded by the server
#[derive(Debug, Clone, Default)]
pub struct Observed {
    pub pongs: Vec<u32>,
    pub acks: Vec<u32>,
    pub titles: Vec<String>,
    pub app_ids: Vec<String>,
    pub buffers_created: usize,
    pub commits: usize,
    pub last_frame: Option<CommittedFrame>,
}

/// Shared memory behind a client buffer
pub struct ServerBuffer {
    map: Arc<Mmap>,
    offset: usize,
    width: i32,
    height: i32,
    stride: usize,
}

impl ServerBuffer {
    fn read(&self) -> CommittedFrame {
        let mut pixels = Vec::with_capacity((self.width * self.height) as usize);
        for row in 0..self.height as usize {
            let start = self.offset + row * self.stride;
            let line = &self.map[start..start + self.width as usize * 4];
            pixels.extend(
                line.chunks_exact(4)
                    .map(|px| u32::from_le_bytes([px[0], px[1], px[2], px[3]])),
            );
        }
        CommittedFrame {
            width: self.width,
            height: self.height,
            pixels,
        }
    }
}

/// Server side state, reachable from test closures
pub struct ServerState {
    options: ServerOptions,
    observed: Arc<Mutex<Observed>>,
    serial: u32,
    _keymap: Option<File>,
    attached: Option<wl_buffer::WlBuffer>,
    pub wm_base: Option<xdg_wm_base::XdgWmBase>,
    pub pointer: Option<wl_pointer::WlPointer>,
    pub keyboard: Option<wl_keyboard::WlKeyboard>,
    pub surfaces: Vec<wl_surface::WlSurface>,
    pub toplevels: Vec<xdg_toplevel::XdgToplevel>,
}

impl ServerState {
    pub fn next_serial(&mut self) -> u32 {
        self.serial += 1;
        self.serial
    }

    pub fn ping(&mut self, serial: u32) {
        if let Some(wm_base) = &self.wm_base {
            wm_base.ping(serial);
        }
    }

    pub fn pointer_enter(&mut self, surface: usize, x: f64, y: f64) {
        let serial = self.next_serial();
        if let (Some(pointer), Some(surface)) = (&self.pointer, self.surfaces.get(surface)) {
            pointer.enter(serial, surface, x, y);
        }
    }

    pub fn pointer_leave(&mut self, surface: usize) {
        let serial = self.next_serial();
        if let (Some(pointer), Some(surface)) = (&self.pointer, self.surfaces.get(surface)) {
            pointer.leave(serial, surface);
        }
    }

    pub fn pointer_motion(&mut self, x: f64, y: f64) {
        if let Some(pointer) = &self.pointer {
            pointer.motion(0, x, y);
        }
    }

    pub fn pointer_button(&mut self, code: u32, pressed: bool) {
        let serial = self.next_serial();
        let state = if pressed {
            wl_pointer::ButtonState::Pressed
        } else {
            wl_pointer::ButtonState::Released
        };
        if let Some(pointer) = &self.pointer {
            pointer.button(serial, 0, code, state);
        }
    }

    pub fn key(&mut self, code: u32, pressed: bool) {
        let serial = self.next_serial();
        let state = if pressed {
            wl_keyboard::KeyState::Pressed
        } else {
            wl_keyboard::KeyState::Released
        };
        if let Some(keyboard) = &self.keyboard {
            keyboard.key(serial, 0, code, state);
        }
    }

    pub fn close(&mut self, toplevel: usize) {
        if let Some(toplevel) = self.toplevels.get(toplevel) {
            toplevel.close();
        }
    }

    fn observe(&self, f: impl FnOnce(&mut Observed)) {
        f(&mut self.observed.lock().unwrap());
    }
}

/// Handle to the server thread. Dropping it stops the server.
pub struct TestServer {
    tasks: Sender<(Instant, Task)>,
    observed: Arc<Mutex<Observed>>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl TestServer {
    /// Start a server; the returned stream is the client end
    pub fn start(options: ServerOptions) -> (Self, UnixStream) {
        let (server_end, client_end) = UnixStream::pair().unwrap();
        let (tasks, queue) = mpsc::channel();
        let observed = Arc::new(Mutex::new(Observed::default()));
        let stop = Arc::new(AtomicBool::new(false));

        let thread = {
            let observed = observed.clone();
            let stop = stop.clone();
            thread::spawn(move || serve(server_end, options, observed, queue, stop))
        };

        let server = Self {
            tasks,
            observed,
            stop,
            thread: Some(thread),
        };
        (server, client_end)
    }

    /// Run `f` on the server thread and wait until it has run
    pub fn run(&self, f: impl FnOnce(&mut ServerState) + Send + 'static) {
        let (done, finished) = mpsc::channel();
        let task: Task = Box::new(move |state| {
            f(state);
            let _ = done.send(());
        });
        self.tasks.send((Instant::now(), task)).unwrap();
        finished.recv().unwrap();
    }

    /// Run `f` on the server thread once `delay` has passed
    pub fn run_after(&self, delay: Duration, f: impl FnOnce(&mut ServerState) + Send + 'static) {
        self.tasks
            .send((Instant::now() + delay, Box::new(f)))
            .unwrap();
    }

    pub fn observed(&self) -> Observed {
        self.observed.lock().unwrap().clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn serve(
    stream: UnixStream,
    options: ServerOptions,
    observed: Arc<Mutex<Observed>>,
    queue: Receiver<(Instant, Task)>,
    stop: Arc<AtomicBool>,
) {
    let mut display = Display::<ServerState>::new().unwrap();
    let mut dh = display.handle();
    dh.create_global::<ServerState, wl_compositor::WlCompositor, ()>(4, ());
    dh.create_global::<ServerState, wl_shm::WlShm, ()>(1, ());
    dh.create_global::<ServerState, xdg_wm_base::XdgWmBase, ()>(2, ());
    if options.seat {
        dh.create_global::<ServerState, wl_seat::WlSeat, ()>(5, ());
    }
    dh.insert_client(stream, Arc::new(())).unwrap();

    let mut state = ServerState {
        options,
        observed,
        serial: 0,
        _keymap: None,
        attached: None,
        wm_base: None,
        pointer: None,
        keyboard: None,
        surfaces: Vec::new(),
        toplevels: Vec::new(),
    };

    let mut scheduled: Vec<(Instant, Task)> = Vec::new();
    while !stop.load(Ordering::Relaxed) {
        scheduled.extend(queue.try_iter());
        let now = Instant::now();
        let (due, later): (Vec<_>, Vec<_>) =
            scheduled.drain(..).partition(|(at, _)| *at <= now);
        scheduled = later;
        for (_, task) in due {
            task(&mut state);
        }

        if let Err(err) = display.dispatch_clients(&mut state) {
            debug!("Test server dispatch failed: {}", err);
        }
        if let Err(err) = display.flush_clients() {
            debug!("Test server flush failed: {}", err);
        }
        thread::sleep(Duration::from_millis(1));
    }
}

impl GlobalDispatch<wl_compositor::WlCompositor, ()> for ServerState {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<wl_compositor::WlCompositor>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        data_init.init(resource, ());
    }
}

impl Dispatch<wl_compositor::WlCompositor, ()> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &wl_compositor::WlCompositor,
        request: wl_compositor::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        if let wl_compositor::Request::CreateSurface { id } = request {
            let surface = data_init.init(id, ());
            state.surfaces.push(surface);
        }
    }
}

impl Dispatch<wl_surface::WlSurface, ()> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &wl_surface::WlSurface,
        request: wl_surface::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            wl_surface::Request::Attach { buffer, .. } => {
                state.attached = buffer;
            }
            wl_surface::Request::Commit => {
                let Some(buffer) = state.attached.take() else {
                    return;
                };
                let frame = buffer.data::<ServerBuffer>().map(ServerBuffer::read);
                state.observe(|seen| {
                    seen.commits += 1;
                    if frame.is_some() {
                        seen.last_frame = frame;
                    }
                });
                if state.options.release_on_commit {
                    buffer.release();
                }
            }
            _ => {}
        }
    }
}

impl GlobalDispatch<wl_shm::WlShm, ()> for ServerState {
    fn bind(
        state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<wl_shm::WlShm>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        let shm = data_init.init(resource, ());
        shm.format(wl_shm::Format::Argb8888);
        if state.options.advertise_xrgb {
            shm.format(wl_shm::Format::Xrgb8888);
        }
    }
}

impl Dispatch<wl_shm::WlShm, ()> for ServerState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &wl_shm::WlShm,
        request: wl_shm::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        if let wl_shm::Request::CreatePool { id, fd, size } = request {
            debug!("Test server mapping pool of {} bytes", size);
            // SAFETY: read-only view of memory the client keeps mapped.
            let map = unsafe { Mmap::map(&File::from(fd)).unwrap() };
            data_init.init(id, Arc::new(map));
        }
    }
}

impl Dispatch<wl_shm_pool::WlShmPool, Arc<Mmap>> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &wl_shm_pool::WlShmPool,
        request: wl_shm_pool::Request,
        map: &Arc<Mmap>,
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        if let wl_shm_pool::Request::CreateBuffer {
            id,
            offset,
            width,
            height,
            stride,
            ..
        } = request
        {
            data_init.init(
                id,
                ServerBuffer {
                    map: map.clone(),
                    offset: offset as usize,
                    width,
                    height,
                    stride: stride as usize,
                },
            );
            state.observe(|seen| seen.buffers_created += 1);
        }
    }
}

impl Dispatch<wl_buffer::WlBuffer, ServerBuffer> for ServerState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &wl_buffer::WlBuffer,
        _request: wl_buffer::Request,
        _data: &ServerBuffer,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
    }
}

impl GlobalDispatch<wl_seat::WlSeat, ()> for ServerState {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<wl_seat::WlSeat>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        let seat = data_init.init(resource, ());
        seat.capabilities(wl_seat::Capability::Pointer | wl_seat::Capability::Keyboard);
        if seat.version() >= 2 {
            seat.name("seat0".into());
        }
    }
}

impl Dispatch<wl_seat::WlSeat, ()> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &wl_seat::WlSeat,
        request: wl_seat::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            wl_seat::Request::GetPointer { id } => {
                state.pointer = Some(data_init.init(id, ()));
            }
            wl_seat::Request::GetKeyboard { id } => {
                let keyboard = data_init.init(id, ());
                if let Some(keymap) = state.options.keymap.clone() {
                    let mut file = tempfile::tempfile().unwrap();
                    file.write_all(keymap.as_bytes()).unwrap();
                    file.write_all(b"\0").unwrap();
                    keyboard.keymap(
                        wl_keyboard::KeymapFormat::XkbV1,
                        file.as_fd(),
                        keymap.len() as u32 + 1,
                    );
                    state._keymap = Some(file);
                }
                state.keyboard = Some(keyboard);
            }
            _ => {}
        }
    }
}

impl Dispatch<wl_pointer::WlPointer, ()> for ServerState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &wl_pointer::WlPointer,
        _request: wl_pointer::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
    }
}

impl Dispatch<wl_keyboard::WlKeyboard, ()> for ServerState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &wl_keyboard::WlKeyboard,
        _request: wl_keyboard::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
    }
}

impl GlobalDispatch<xdg_wm_base::XdgWmBase, ()> for ServerState {
    fn bind(
        state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<xdg_wm_base::XdgWmBase>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        state.wm_base = Some(data_init.init(resource, ()));
    }
}

impl Dispatch<xdg_wm_base::XdgWmBase, ()> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &xdg_wm_base::XdgWmBase,
        request: xdg_wm_base::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            xdg_wm_base::Request::GetXdgSurface { id, .. } => {
                data_init.init(id, ());
            }
            xdg_wm_base::Request::Pong { serial } => {
                state.observe(|seen| seen.pongs.push(serial));
            }
            _ => {}
        }
    }
}

impl Dispatch<xdg_surface::XdgSurface, ()> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        resource: &xdg_surface::XdgSurface,
        request: xdg_surface::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            xdg_surface::Request::GetToplevel { id } => {
                let toplevel = data_init.init(id, ());
                toplevel.configure(0, 0, Vec::new());
                resource.configure(state.next_serial());
                state.toplevels.push(toplevel);
            }
            xdg_surface::Request::AckConfigure { serial } => {
                state.observe(|seen| seen.acks.push(serial));
            }
            _ => {}
        }
    }
}

impl Dispatch<xdg_toplevel::XdgToplevel, ()> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &xdg_toplevel::XdgToplevel,
        request: xdg_toplevel::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            xdg_toplevel::Request::SetTitle { title } => {
                state.observe(|seen| seen.titles.push(title));
            }
            xdg_toplevel::Request::SetAppId { app_id } => {
                state.observe(|seen| seen.app_ids.push(app_id));
            }
            _ => {}
        }
    }
}
