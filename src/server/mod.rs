//! Core X11 server implementation
//!
//! All shared protocol state lives in one [`Server`] value behind a single
//! mutex: the resource registry (and with it the window tree), atoms,
//! selections, input and device state. Connection threads lock it for the
//! duration of one request. The cooperative server grab is separate and is
//! only consulted between requests.

pub mod atoms;
pub mod client;
pub mod devices;
pub mod dispatch;
pub mod grab;
mod handlers;
pub mod input;
pub mod listener;
pub mod properties;
pub mod selections;
pub mod tree;

pub use client::ClientHandle;
pub use dispatch::Request;
pub use grab::ServerGrab;

use crate::backend::null::NullShell;
use crate::backend::{Backend, HostShell, WindowParams};
use crate::connection::Peer;
use crate::protocol::*;
use crate::resources::server_ids::*;
use crate::resources::{
    Colormap, Cursor, Font, ResourceData, ResourceKind, ResourceRegistry, Window,
};
use crate::security::AccessPolicy;
use atoms::AtomTable;
use devices::DeviceState;
use input::InputState;
use selections::SelectionTable;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Visual of the root window and every window created with CopyFromParent
pub const ROOT_VISUAL: u32 = 0x21;

/// Depth of the root window
pub const ROOT_DEPTH: u8 = 24;

pub const MIN_KEYCODE: u8 = 8;
pub const MAX_KEYCODE: u8 = 255;

/// Maximum request length in 4-byte units
pub const MAX_REQUEST_LENGTH: u16 = 0xffff;

pub const VENDOR: &str = "x11core";

/// Connection-level failures. Protocol errors are `X11Error`s and never end
/// a connection; these do.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("access denied for {0}")]
    AccessDenied(Peer),

    #[error("no resource id block available")]
    IdSpaceExhausted,

    #[error("backend error: {0}")]
    Backend(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

impl From<Box<dyn std::error::Error + Send + Sync>> for ServerError {
    fn from(e: Box<dyn std::error::Error + Send + Sync>) -> Self {
        ServerError::Backend(e.to_string())
    }
}

/// Static configuration of the single screen
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub width: u16,
    pub height: u16,
    pub width_mm: u16,
    pub height_mm: u16,
    pub vendor: String,
    pub release: u32,
    pub access: AccessPolicy,
}

impl ServerConfig {
    /// Screen of `width` x `height` pixels at 96 dpi
    pub fn with_size(width: u16, height: u16) -> Self {
        ServerConfig {
            width,
            height,
            width_mm: pixels_to_mm(width),
            height_mm: pixels_to_mm(height),
            vendor: VENDOR.to_string(),
            release: 11_000_000,
            access: AccessPolicy::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig::with_size(1024, 768)
    }
}

fn pixels_to_mm(pixels: u16) -> u16 {
    ((pixels as u32 * 254 + 480) / 960) as u16
}

/// The shared server state
pub struct Server {
    pub config: ServerConfig,
    pub registry: ResourceRegistry,
    pub atoms: AtomTable,
    pub selections: SelectionTable,
    pub input: InputState,
    pub devices: DeviceState,
    pub access: AccessPolicy,
    pub installed_colormaps: Vec<ResourceId>,
    pub font_path: Vec<String>,
    pub backend: Box<dyn Backend>,
    pub shell: Box<dyn HostShell>,
    pub grab: Arc<ServerGrab>,
    clients: BTreeMap<ClientId, Arc<ClientHandle>>,
    epoch: Instant,
}

impl Server {
    /// Create the server and install the initial state
    pub fn new(config: ServerConfig, backend: Box<dyn Backend>) -> Self {
        Server::with_shell(config, backend, Box::new(NullShell))
    }

    pub fn with_shell(
        config: ServerConfig,
        backend: Box<dyn Backend>,
        mut shell: Box<dyn HostShell>,
    ) -> Self {
        let mut access = config.access.clone();
        for host in shell.load_hosts() {
            access.add_host(host);
        }
        let root_rect = Rect::new(0, 0, config.width as i32, config.height as i32);
        let mut server = Server {
            registry: ResourceRegistry::new(),
            atoms: AtomTable::new(),
            selections: SelectionTable::new(),
            input: InputState::new(ROOT_WINDOW, root_rect),
            devices: DeviceState::new(),
            access,
            installed_colormaps: Vec::new(),
            font_path: Vec::new(),
            backend,
            shell,
            grab: Arc::new(ServerGrab::new()),
            clients: BTreeMap::new(),
            epoch: Instant::now(),
            config,
        };
        server.init();
        server
    }

    /// Install the predefined atoms and the server's own resources
    pub fn init(&mut self) {
        if let Err(e) = self.backend.init() {
            log::error!("Backend initialization failed: {}", e);
        }
        self.atoms.reset();
        self.selections.reset();
        self.font_path = vec!["built-ins".to_string()];

        let root_rect = Rect::new(0, 0, self.config.width as i32, self.config.height as i32);
        let mut root = Window::new(
            ROOT_WINDOW,
            None,
            root_rect,
            0,
            WindowClass::InputOutput,
            ROOT_DEPTH,
            ROOT_VISUAL,
        );
        root.mapped = true;
        root.attributes.colormap = DEFAULT_COLORMAP;
        root.attributes.cursor = DEFAULT_CURSOR;
        root.attributes.background = crate::resources::window::Fill::Pixel(0);
        self.registry.insert(ROOT_WINDOW, None, ResourceData::Window(root));
        self.registry.insert(
            DEFAULT_COLORMAP,
            None,
            ResourceData::Colormap(Colormap::new(ROOT_VISUAL, ROOT_WINDOW)),
        );
        self.registry
            .insert(DEFAULT_FONT, None, ResourceData::Font(Font::new("cursor")));
        self.registry.insert(
            DEFAULT_CURSOR,
            None,
            ResourceData::Cursor(Cursor::default_cursor(DEFAULT_FONT)),
        );
        self.installed_colormaps = vec![DEFAULT_COLORMAP];
        if let Ok(colormap) = self.registry.colormap_mut(DEFAULT_COLORMAP) {
            colormap.installed = true;
        }

        self.input = InputState::new(ROOT_WINDOW, root_rect);
        self.devices = DeviceState::new();

        let params = WindowParams {
            parent: NONE,
            rect: root_rect,
            border_width: 0,
            background_pixel: Some(0),
            input_only: false,
        };
        if let Err(e) = self.backend.create_window(ROOT_WINDOW, params) {
            log::warn!("Backend could not create the root window: {}", e);
        }
    }

    /// Return to the initial state after the last client has gone
    pub fn reset(&mut self) {
        log::info!("Resetting server state");
        self.registry.clear_client_resources();
        if let Ok(root) = self.registry.window_mut(ROOT_WINDOW) {
            root.properties.clear();
            root.event_masks.clear();
            root.button_grabs.clear();
            root.key_grabs.clear();
            root.children.clear();
        }
        self.atoms.reset();
        self.selections.reset();
        let root_rect = Rect::new(0, 0, self.config.width as i32, self.config.height as i32);
        self.input = InputState::new(ROOT_WINDOW, root_rect);
        self.devices = DeviceState::new();
        self.installed_colormaps = vec![DEFAULT_COLORMAP];
        self.font_path = vec!["built-ins".to_string()];
    }

    /// Milliseconds since the server started; never CurrentTime
    pub fn now(&self) -> Timestamp {
        (self.epoch.elapsed().as_millis() as u32).max(1)
    }

    pub fn root(&self) -> ResourceId {
        ROOT_WINDOW
    }

    /// Build the connection setup reply for a client with id block `block`
    pub fn setup_success(&self, block: &crate::resources::IdBlock) -> SetupSuccess {
        let root_mask = self
            .registry
            .window(ROOT_WINDOW)
            .map(|w| w.all_event_masks())
            .unwrap_or(0);
        SetupSuccess {
            protocol_major_version: PROTOCOL_MAJOR_VERSION,
            protocol_minor_version: PROTOCOL_MINOR_VERSION,
            release_number: self.config.release,
            resource_id_base: block.base,
            resource_id_mask: block.mask,
            motion_buffer_size: 0,
            maximum_request_length: MAX_REQUEST_LENGTH,
            image_byte_order: ByteOrder::LSBFirst,
            bitmap_format_bit_order: ByteOrder::LSBFirst,
            bitmap_format_scanline_unit: 32,
            bitmap_format_scanline_pad: 32,
            min_keycode: MIN_KEYCODE,
            max_keycode: MAX_KEYCODE,
            vendor: self.config.vendor.clone(),
            pixmap_formats: vec![
                Format {
                    depth: 1,
                    bits_per_pixel: 1,
                    scanline_pad: 32,
                },
                Format {
                    depth: 24,
                    bits_per_pixel: 32,
                    scanline_pad: 32,
                },
            ],
            roots: vec![Screen {
                root: ROOT_WINDOW,
                default_colormap: DEFAULT_COLORMAP,
                white_pixel: 0x00ff_ffff,
                black_pixel: 0,
                current_input_masks: root_mask,
                width_in_pixels: self.config.width,
                height_in_pixels: self.config.height,
                width_in_millimeters: self.config.width_mm,
                height_in_millimeters: self.config.height_mm,
                min_installed_maps: 1,
                max_installed_maps: 1,
                root_visual: ROOT_VISUAL,
                backing_stores: 0,
                save_unders: false,
                root_depth: ROOT_DEPTH,
                allowed_depths: vec![
                    Depth {
                        depth: 24,
                        visuals: vec![VisualType {
                            visual_id: ROOT_VISUAL,
                            class: VisualType::TRUE_COLOR,
                            bits_per_rgb_value: 8,
                            colormap_entries: 256,
                            red_mask: 0x00ff_0000,
                            green_mask: 0x0000_ff00,
                            blue_mask: 0x0000_00ff,
                        }],
                    },
                    Depth {
                        depth: 1,
                        visuals: Vec::new(),
                    },
                ],
            }],
        }
    }

    /// Accept a client: allocate its id block and record its handle.
    /// Returns the block so the caller can send the setup reply.
    pub fn register_client(
        &mut self,
        byte_order: ByteOrder,
        writer: Box<dyn Write + Send>,
        control: Option<crate::connection::Connection>,
        peer: Peer,
    ) -> ServerResult<Arc<ClientHandle>> {
        let block = self
            .registry
            .allocate_id_block()
            .ok_or(ServerError::IdSpaceExhausted)?;
        let handle = Arc::new(ClientHandle::new(block, byte_order, writer, control, peer));
        self.clients.insert(block.client, Arc::clone(&handle));
        log::info!(
            "Client {} connected from {} (base 0x{:08x})",
            block.client,
            peer,
            block.base
        );
        Ok(handle)
    }

    pub fn client(&self, id: ClientId) -> Option<&Arc<ClientHandle>> {
        self.clients.get(&id)
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn client_ids(&self) -> Vec<ClientId> {
        self.clients.keys().copied().collect()
    }

    /// Send an event to one client. Write failures are left for that
    /// client's own reader to discover.
    pub fn send_event(&self, client: ClientId, event: &Event) {
        if let Some(handle) = self.clients.get(&client) {
            if let Err(e) = handle.send_event(event) {
                log::debug!("Dropping event for client {}: {}", client, e);
            }
        }
    }

    /// Send an event to every connected client
    pub fn broadcast(&self, event: &Event) {
        for client in self.clients.keys() {
            self.send_event(*client, event);
        }
    }

    /// Deliver `event` to every client selecting `mask` on `window`.
    /// Returns true if anyone received it.
    pub fn deliver_to_selecting(&self, window: ResourceId, mask: u32, event: &Event) -> bool {
        let clients = match self.registry.window(window) {
            Ok(w) => w.clients_selecting(mask),
            Err(_) => return false,
        };
        for client in &clients {
            self.send_event(*client, event);
        }
        !clients.is_empty()
    }

    /// The one client other than `requester` selecting `mask` on `window`
    /// (used for the exclusive redirect selections)
    pub fn redirect_client(
        &self,
        window: ResourceId,
        mask: u32,
        requester: ClientId,
    ) -> Option<ClientId> {
        let w = self.registry.window(window).ok()?;
        w.clients_selecting(mask)
            .into_iter()
            .find(|c| *c != requester)
    }

    /// Tell the host shell the listeners for `display` are up
    pub fn start(&mut self, display: u16) {
        log::info!("Server started on display :{}", display);
        self.shell.on_start(display);
    }

    /// Disconnect every client, then tell the host shell the server is
    /// going away
    pub fn shutdown(&mut self) {
        log::info!("Shutting down, {} client(s) connected", self.clients.len());
        for client in self.client_ids() {
            self.disconnect_client(client);
        }
        self.shell.on_stop();
    }

    /// Run disconnect cleanup for `client`. Safe to call from the client's
    /// own thread and from KillClient; only the first call does anything.
    pub fn disconnect_client(&mut self, client: ClientId) {
        let handle = match self.clients.get(&client) {
            Some(handle) => Arc::clone(handle),
            None => return,
        };
        if !handle.begin_cleanup() {
            return;
        }
        handle.close();
        self.clients.remove(&client);
        log::info!("Client {} disconnected ({})", client, handle.peer);

        if self.grab.ungrab(client) {
            log::debug!("Server grab released by disconnect of client {}", client);
        }
        self.grab.wake_all();

        self.release_client_input(client);
        self.selections.clear_client(client);
        self.forget_client_everywhere(client);

        let mode = handle.close_down_mode();
        self.destroy_connection_resources(client, mode);
        self.registry.release_id_block(client);

        if self.clients.is_empty() {
            for id in self.registry.temporary_resources() {
                self.free_resource(id);
            }
            if !self.registry.has_retained_resources() {
                self.reset();
            }
        }
    }

    /// Remove event selections and passive grabs of `client` on every window
    fn forget_client_everywhere(&mut self, client: ClientId) {
        let mut stack = vec![ROOT_WINDOW];
        while let Some(id) = stack.pop() {
            if let Ok(window) = self.registry.window_mut(id) {
                window.forget_client(client);
                stack.extend(window.children.iter().copied());
            }
        }
    }

    /// Dispose of a departing client's resources according to `mode`
    pub fn destroy_connection_resources(&mut self, client: ClientId, mode: CloseDownMode) {
        match mode {
            CloseDownMode::Destroy => {
                for id in self.registry.owned_by(client) {
                    self.free_resource(id);
                }
            }
            CloseDownMode::RetainPermanent | CloseDownMode::RetainTemporary => {
                log::debug!("Retaining resources of client {} ({:?})", client, mode);
                self.registry.retain_client_resources(client, mode);
            }
        }
    }

    /// Free one resource with its kind-specific teardown
    pub fn free_resource(&mut self, id: ResourceId) {
        match self.registry.kind(id) {
            Some(ResourceKind::Window) => self.destroy_window(id),
            Some(ResourceKind::Pixmap) => {
                self.registry.free(id);
                if let Err(e) = self.backend.free_pixmap(id) {
                    log::debug!("Backend free_pixmap failed: {}", e);
                }
            }
            Some(ResourceKind::Colormap) => self.free_colormap(id),
            Some(_) => {
                self.registry.free(id);
            }
            None => {}
        }
    }

    /// Free a colormap, uninstalling it and pointing windows back at None
    pub fn free_colormap(&mut self, id: ResourceId) {
        if id == DEFAULT_COLORMAP {
            return;
        }
        if self.installed_colormaps.contains(&id) {
            self.uninstall_colormap(id);
        }
        self.registry.free(id);
        let mut stack = vec![ROOT_WINDOW];
        let mut affected = Vec::new();
        while let Some(wid) = stack.pop() {
            if let Ok(window) = self.registry.window_mut(wid) {
                if window.attributes.colormap == id {
                    window.attributes.colormap = NONE;
                    affected.push(wid);
                }
                stack.extend(window.children.iter().copied());
            }
        }
        for wid in affected {
            let event = Event::ColormapNotify(ColormapNotifyEvent {
                window: wid,
                colormap: NONE,
                new: true,
                installed: false,
            });
            self.deliver_to_selecting(wid, event_mask::COLORMAP_CHANGE, &event);
        }
    }

    /// Make `id` the installed colormap, notifying windows that use either map
    pub fn install_colormap(&mut self, id: ResourceId) {
        if self.installed_colormaps.contains(&id) {
            return;
        }
        let previous = std::mem::replace(&mut self.installed_colormaps, vec![id]);
        for old in &previous {
            if let Ok(cmap) = self.registry.colormap_mut(*old) {
                cmap.installed = false;
            }
        }
        if let Ok(cmap) = self.registry.colormap_mut(id) {
            cmap.installed = true;
        }
        for old in previous {
            self.notify_colormap_state(old, false);
        }
        self.notify_colormap_state(id, true);
    }

    /// Uninstall `id`; the default colormap takes its place
    pub fn uninstall_colormap(&mut self, id: ResourceId) {
        if !self.installed_colormaps.contains(&id) {
            return;
        }
        if id == DEFAULT_COLORMAP {
            return;
        }
        self.installed_colormaps.retain(|c| *c != id);
        if let Ok(cmap) = self.registry.colormap_mut(id) {
            cmap.installed = false;
        }
        self.notify_colormap_state(id, false);
        if self.installed_colormaps.is_empty() {
            self.install_colormap(DEFAULT_COLORMAP);
        }
    }

    fn notify_colormap_state(&self, colormap: ResourceId, installed: bool) {
        let mut stack = vec![ROOT_WINDOW];
        while let Some(wid) = stack.pop() {
            if let Ok(window) = self.registry.window(wid) {
                if window.attributes.colormap == colormap {
                    let event = Event::ColormapNotify(ColormapNotifyEvent {
                        window: wid,
                        colormap,
                        new: false,
                        installed,
                    });
                    self.deliver_to_selecting(wid, event_mask::COLORMAP_CHANGE, &event);
                }
                stack.extend(window.children.iter().copied());
            }
        }
    }

    /// KillClient: disconnect the owner of `resource`, or with AllTemporary
    /// (0) free every resource retained in RetainTemporary mode
    pub fn kill_client(&mut self, resource: ResourceId) -> X11Result<()> {
        if resource == 0 {
            for id in self.registry.temporary_resources() {
                self.free_resource(id);
            }
            return Ok(());
        }
        let owner = self
            .registry
            .owner(resource)
            .ok_or_else(|| X11Error::bad_value(resource))?;
        if self.clients.contains_key(&owner) {
            log::info!("KillClient: closing client {}", owner);
            self.disconnect_client(owner);
        } else {
            // Retained resources of a departed client
            for id in self.registry.owned_by(owner) {
                self.free_resource(id);
            }
            self.registry.release_id_block(owner);
        }
        Ok(())
    }

    /// Flush the backend, logging failures
    pub fn flush_backend(&mut self) {
        if let Err(e) = self.backend.flush() {
            log::debug!("Backend flush failed: {}", e);
        }
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::client::test_util::SharedBuffer;
    use super::*;
    use crate::backend::null::NullBackend;

    pub fn server() -> Server {
        Server::new(ServerConfig::default(), Box::new(NullBackend::new()))
    }

    /// Register an in-memory client and return its id with its output buffer
    pub fn connect(server: &mut Server) -> (ClientId, SharedBuffer) {
        let buffer = SharedBuffer::default();
        let handle = server
            .register_client(
                ByteOrder::LSBFirst,
                Box::new(buffer.clone()),
                None,
                Peer::Local,
            )
            .unwrap();
        (handle.id, buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::test_util::*;
    use super::*;
    use crate::backend::null::NullBackend;
    use crate::resources::Pixmap;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct RecordingShell(Arc<Mutex<Vec<String>>>);

    impl HostShell for RecordingShell {
        fn on_start(&mut self, display: u16) {
            self.0.lock().unwrap().push(format!("start :{}", display));
        }

        fn on_stop(&mut self) {
            self.0.lock().unwrap().push("stop".to_string());
        }
    }

    #[test]
    fn test_shell_lifecycle() {
        let shell = RecordingShell::default();
        let mut server = Server::with_shell(
            ServerConfig::default(),
            Box::new(NullBackend::new()),
            Box::new(shell.clone()),
        );
        server.start(3);
        let (_a, _) = connect(&mut server);
        let (_b, _) = connect(&mut server);
        assert_eq!(server.client_count(), 2);

        server.shutdown();
        assert_eq!(server.client_count(), 0);
        assert_eq!(*shell.0.lock().unwrap(), vec!["start :3", "stop"]);
    }

    #[test]
    fn test_init_installs_server_resources() {
        let server = server();
        assert!(server.registry.window(ROOT_WINDOW).unwrap().mapped);
        assert!(server.registry.colormap(DEFAULT_COLORMAP).is_ok());
        assert!(server.registry.font(DEFAULT_FONT).is_ok());
        assert!(server.registry.cursor(DEFAULT_CURSOR).is_ok());
        assert_eq!(server.atoms.len(), 68);
        assert_eq!(server.installed_colormaps, vec![DEFAULT_COLORMAP]);
    }

    #[test]
    fn test_setup_reply_describes_block() {
        let mut server = server();
        let (client, _) = connect(&mut server);
        let handle = server.client(client).unwrap();
        let setup = server.setup_success(&handle.block);
        assert_eq!(setup.resource_id_base, 0x0020_0000);
        assert_eq!(setup.resource_id_mask, 0x001f_ffff);
        assert_eq!(setup.roots[0].root, ROOT_WINDOW);
        assert_eq!(setup.roots[0].width_in_pixels, 1024);
        assert_eq!(setup.roots[0].width_in_millimeters, 271);
    }

    #[test]
    fn test_cleanup_runs_once_and_resets() {
        let mut server = server();
        let (client, _) = connect(&mut server);
        let base = server.client(client).unwrap().block.base;
        server
            .registry
            .create(
                base | 1,
                client,
                ResourceData::Pixmap(Pixmap::new(4, 4, 24, ROOT_WINDOW).unwrap()),
            )
            .unwrap();
        server.atoms.intern(b"CUSTOM", false);

        server.disconnect_client(client);
        server.disconnect_client(client);
        assert!(!server.registry.exists(base | 1));
        assert_eq!(server.client_count(), 0);
        // Last client gone: non-predefined atoms are dropped
        assert_eq!(server.atoms.intern(b"CUSTOM", true), None);
    }

    #[test]
    fn test_retained_resources_survive_disconnect() {
        let mut server = server();
        let (a, _) = connect(&mut server);
        let (b, _) = connect(&mut server);
        let base = server.client(a).unwrap().block.base;
        server
            .registry
            .create(
                base | 1,
                a,
                ResourceData::Pixmap(Pixmap::new(4, 4, 24, ROOT_WINDOW).unwrap()),
            )
            .unwrap();
        server
            .client(a)
            .unwrap()
            .set_close_down_mode(CloseDownMode::RetainTemporary);
        server.disconnect_client(a);
        assert!(server.registry.exists(base | 1));

        // AllTemporary sweeps it
        server.kill_client(0).unwrap();
        assert!(!server.registry.exists(base | 1));
        assert_eq!(server.client_count(), 1);
        let _ = b;
    }

    #[test]
    fn test_kill_client_disconnects_owner() {
        let mut server = server();
        let (a, _) = connect(&mut server);
        let (_b, _) = connect(&mut server);
        let base = server.client(a).unwrap().block.base;
        server
            .registry
            .create(
                base | 5,
                a,
                ResourceData::Pixmap(Pixmap::new(2, 2, 1, ROOT_WINDOW).unwrap()),
            )
            .unwrap();
        server.kill_client(base | 5).unwrap();
        assert!(server.client(a).is_none());
        assert!(!server.registry.exists(base | 5));
        assert_eq!(
            server.kill_client(0x0123_4567).unwrap_err().code,
            ErrorCode::Value
        );
    }
}
