//! Server-side resources and the id space they live in
//!
//! Every resource a client can name by id (windows, pixmaps, graphics
//! contexts, colormaps, cursors, fonts) is stored in one [`ResourceRegistry`].
//! The 29-bit id space is split into fixed-size blocks: block 0 belongs to
//! the server, block `n` to client `n`. A client can only create ids inside
//! its own block, so ids never collide across connections.

pub mod colormap;
pub mod cursor;
pub mod font;
pub mod gcontext;
pub mod pixmap;
pub mod window;

pub use colormap::Colormap;
pub use cursor::Cursor;
pub use font::Font;
pub use gcontext::GContext;
pub use pixmap::Pixmap;
pub use window::Window;

use crate::protocol::*;
use std::collections::{BTreeSet, HashMap};

/// Number of id bits a client may choose freely
pub const CLIENT_ID_BITS: u32 = 21;

/// Mask of the freely choosable bits of a client's block
pub const CLIENT_ID_MASK: u32 = (1 << CLIENT_ID_BITS) - 1;

/// Number of blocks in the 29-bit id space (block 0 is the server's)
pub const MAX_ID_BLOCKS: u32 = 1 << (29 - CLIENT_ID_BITS);

/// Ids of the resources the server creates at startup
pub mod server_ids {
    use crate::protocol::ResourceId;

    pub const DEFAULT_FONT: ResourceId = 1;
    pub const DEFAULT_CURSOR: ResourceId = 2;
    pub const ROOT_WINDOW: ResourceId = 3;
    pub const DEFAULT_COLORMAP: ResourceId = 4;
}

/// The closed set of resource kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Window,
    Pixmap,
    GContext,
    Colormap,
    Cursor,
    Font,
}

impl ResourceKind {
    /// Error reported when an id does not name a resource of this kind
    pub fn error(&self, id: ResourceId) -> X11Error {
        match self {
            ResourceKind::Window => X11Error::bad_window(id),
            ResourceKind::Pixmap => X11Error::bad_pixmap(id),
            ResourceKind::GContext => X11Error::bad_gc(id),
            ResourceKind::Colormap => X11Error::bad_colormap(id),
            ResourceKind::Cursor => X11Error::bad_cursor(id),
            ResourceKind::Font => X11Error::bad_font(id),
        }
    }
}

/// Kind-specific state of a resource
#[derive(Debug, Clone)]
pub enum ResourceData {
    Window(Window),
    Pixmap(Pixmap),
    GContext(GContext),
    Colormap(Colormap),
    Cursor(Cursor),
    Font(Font),
}

impl ResourceData {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceData::Window(_) => ResourceKind::Window,
            ResourceData::Pixmap(_) => ResourceKind::Pixmap,
            ResourceData::GContext(_) => ResourceKind::GContext,
            ResourceData::Colormap(_) => ResourceKind::Colormap,
            ResourceData::Cursor(_) => ResourceKind::Cursor,
            ResourceData::Font(_) => ResourceKind::Font,
        }
    }
}

/// A registered resource
#[derive(Debug, Clone)]
pub struct Resource {
    pub id: ResourceId,
    /// Creating client; `None` for server-created resources
    pub owner: Option<ClientId>,
    /// Set when the owner disconnected and the resource was retained
    pub close_down: CloseDownMode,
    pub data: ResourceData,
}

/// A client's slice of the id space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdBlock {
    pub client: ClientId,
    pub base: u32,
    pub mask: u32,
}

impl IdBlock {
    pub fn for_client(client: ClientId) -> Self {
        IdBlock {
            client,
            base: client << CLIENT_ID_BITS,
            mask: CLIENT_ID_MASK,
        }
    }

    pub fn contains(&self, id: ResourceId) -> bool {
        id & !self.mask == self.base
    }
}

/// Global map from resource id to resource
#[derive(Debug)]
pub struct ResourceRegistry {
    resources: HashMap<ResourceId, Resource>,

    /// Ids owned by each client, kept in sync with `resources`
    owned: HashMap<ClientId, BTreeSet<ResourceId>>,

    /// Next never-used block
    next_block: u32,

    /// Blocks whose client is gone and which hold no retained resources
    free_blocks: BTreeSet<u32>,

    /// Blocks of connected clients
    live_blocks: BTreeSet<u32>,
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceRegistry {
    pub fn new() -> Self {
        ResourceRegistry {
            resources: HashMap::new(),
            owned: HashMap::new(),
            next_block: 1,
            free_blocks: BTreeSet::new(),
            live_blocks: BTreeSet::new(),
        }
    }

    /// Assign a disjoint id block to a new connection.
    ///
    /// Blocks come from a monotonically increasing counter; once it is
    /// exhausted, blocks of departed clients are reused. Returns `None` when
    /// no block is available.
    pub fn allocate_id_block(&mut self) -> Option<IdBlock> {
        let block = if self.next_block < MAX_ID_BLOCKS {
            let b = self.next_block;
            self.next_block += 1;
            b
        } else {
            let b = *self.free_blocks.iter().next()?;
            self.free_blocks.remove(&b);
            b
        };
        self.live_blocks.insert(block);
        Some(IdBlock::for_client(block))
    }

    /// Give a departed client's block back once nothing in it survives
    pub fn release_id_block(&mut self, client: ClientId) {
        self.live_blocks.remove(&client);
        self.reclaim_block(client);
    }

    fn reclaim_block(&mut self, client: ClientId) {
        if self.live_blocks.contains(&client) {
            return;
        }
        if self.owned.get(&client).map_or(true, |ids| ids.is_empty()) {
            self.owned.remove(&client);
            if client != 0 && client < self.next_block {
                self.free_blocks.insert(client);
            }
        }
    }

    /// Check that `id` may be used by `owner` for a new resource
    pub fn validate_new_id(&self, id: ResourceId, owner: ClientId) -> X11Result<()> {
        let block = IdBlock::for_client(owner);
        if !block.contains(id) || self.resources.contains_key(&id) {
            return Err(X11Error::bad_id_choice(id));
        }
        Ok(())
    }

    /// Register a new client resource after validating its id
    pub fn create(&mut self, id: ResourceId, owner: ClientId, data: ResourceData) -> X11Result<()> {
        self.validate_new_id(id, owner)?;
        self.insert(id, Some(owner), data);
        Ok(())
    }

    /// Register a resource without id validation (server resources)
    pub fn insert(&mut self, id: ResourceId, owner: Option<ClientId>, data: ResourceData) {
        if let Some(client) = owner {
            self.owned.entry(client).or_default().insert(id);
        }
        self.resources.insert(
            id,
            Resource {
                id,
                owner,
                close_down: CloseDownMode::Destroy,
                data,
            },
        );
    }

    pub fn lookup(&self, id: ResourceId) -> Option<&Resource> {
        self.resources.get(&id)
    }

    pub fn lookup_mut(&mut self, id: ResourceId) -> Option<&mut Resource> {
        self.resources.get_mut(&id)
    }

    pub fn exists(&self, id: ResourceId) -> bool {
        self.resources.contains_key(&id)
    }

    pub fn kind(&self, id: ResourceId) -> Option<ResourceKind> {
        self.resources.get(&id).map(|r| r.data.kind())
    }

    pub fn owner(&self, id: ResourceId) -> Option<ClientId> {
        self.resources.get(&id).and_then(|r| r.owner)
    }

    /// Remove a resource from the registry. Kind-specific teardown is the
    /// caller's business.
    pub fn free(&mut self, id: ResourceId) -> Option<Resource> {
        let resource = self.resources.remove(&id)?;
        if let Some(client) = resource.owner {
            if let Some(ids) = self.owned.get_mut(&client) {
                ids.remove(&id);
            }
            self.reclaim_block(client);
        }
        Some(resource)
    }

    /// Ids currently owned by `client`, in ascending order
    pub fn owned_by(&self, client: ClientId) -> Vec<ResourceId> {
        self.owned
            .get(&client)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Mark everything `client` owns as retained under `mode`
    pub fn retain_client_resources(&mut self, client: ClientId, mode: CloseDownMode) {
        for id in self.owned_by(client) {
            if let Some(resource) = self.resources.get_mut(&id) {
                resource.close_down = mode;
            }
        }
    }

    /// Ids of resources retained in RetainTemporary mode
    pub fn temporary_resources(&self) -> Vec<ResourceId> {
        let mut ids: Vec<ResourceId> = self
            .resources
            .values()
            .filter(|r| r.owner.is_some() && r.close_down == CloseDownMode::RetainTemporary)
            .map(|r| r.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// True if any resource of a departed client is still registered
    pub fn has_retained_resources(&self) -> bool {
        self.owned
            .iter()
            .any(|(client, ids)| !self.live_blocks.contains(client) && !ids.is_empty())
    }

    /// Drop every client resource (server reset)
    pub fn clear_client_resources(&mut self) {
        self.resources.retain(|_, r| r.owner.is_none());
        let clients: Vec<ClientId> = self.owned.keys().copied().collect();
        self.owned.clear();
        for client in clients {
            self.reclaim_block(client);
        }
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

macro_rules! typed_accessors {
    ($($get:ident, $get_mut:ident, $variant:ident, $ty:ty;)*) => {
        impl ResourceRegistry {
            $(
                /// Look up a resource of this kind or fail with its error code
                pub fn $get(&self, id: ResourceId) -> X11Result<&$ty> {
                    match self.resources.get(&id).map(|r| &r.data) {
                        Some(ResourceData::$variant(v)) => Ok(v),
                        _ => Err(ResourceKind::$variant.error(id)),
                    }
                }

                pub fn $get_mut(&mut self, id: ResourceId) -> X11Result<&mut $ty> {
                    match self.resources.get_mut(&id).map(|r| &mut r.data) {
                        Some(ResourceData::$variant(v)) => Ok(v),
                        _ => Err(ResourceKind::$variant.error(id)),
                    }
                }
            )*
        }
    };
}

typed_accessors! {
    window, window_mut, Window, Window;
    pixmap, pixmap_mut, Pixmap, Pixmap;
    gcontext, gcontext_mut, GContext, GContext;
    colormap, colormap_mut, Colormap, Colormap;
    cursor, cursor_mut, Cursor, Cursor;
    font, font_mut, Font, Font;
}

/// Geometry of anything that can be drawn on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawableInfo {
    pub id: ResourceId,
    pub is_window: bool,
    pub depth: u8,
    /// Absolute origin of the drawable's content (0,0 for pixmaps)
    pub origin: (i32, i32),
    pub width: u16,
    pub height: u16,
}

impl ResourceRegistry {
    /// Resolve a window or pixmap id, failing with a Drawable error
    pub fn drawable(&self, id: ResourceId) -> X11Result<DrawableInfo> {
        match self.resources.get(&id).map(|r| &r.data) {
            Some(ResourceData::Window(w)) => {
                let inner = w.inner();
                Ok(DrawableInfo {
                    id,
                    is_window: true,
                    depth: w.depth,
                    origin: (inner.x, inner.y),
                    width: inner.width as u16,
                    height: inner.height as u16,
                })
            }
            Some(ResourceData::Pixmap(p)) => Ok(DrawableInfo {
                id,
                is_window: false,
                depth: p.depth,
                origin: (0, 0),
                width: p.width,
                height: p.height,
            }),
            _ => Err(X11Error::bad_drawable(id)),
        }
    }

    /// Fontable ids accept both fonts and graphics contexts
    pub fn fontable(&self, id: ResourceId) -> X11Result<&Font> {
        match self.resources.get(&id).map(|r| &r.data) {
            Some(ResourceData::Font(f)) => Ok(f),
            Some(ResourceData::GContext(gc)) => self.font(gc.font()),
            _ => Err(X11Error::bad_font(id)),
        }
    }
}
