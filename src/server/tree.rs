//! Window hierarchy and geometry
//!
//! Windows live in the resource registry; the tree is the `parent` /
//! `children` links between them. Geometry is absolute, so moving a window
//! walks its subtree and shifts every descendant by the same delta.
//! Structure events go to the window itself (StructureNotify) and to its
//! parent (SubstructureNotify).

use super::Server;
use crate::backend::WindowParams;
use crate::protocol::*;
use crate::resources::server_ids::ROOT_WINDOW;
use crate::resources::window::{cw, Fill};
use crate::resources::{ResourceData, Window};

/// Parameters of a CreateWindow request
#[derive(Debug, Clone)]
pub struct CreateWindowParams {
    pub id: ResourceId,
    pub parent: ResourceId,
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
    pub border_width: u16,
    pub class: u16,
    pub depth: u8,
    pub visual: u32,
    pub value_mask: u32,
    pub values: Vec<u32>,
}

/// Bits of the ConfigureWindow value mask
pub mod config_mask {
    pub const X: u16 = 1 << 0;
    pub const Y: u16 = 1 << 1;
    pub const WIDTH: u16 = 1 << 2;
    pub const HEIGHT: u16 = 1 << 3;
    pub const BORDER_WIDTH: u16 = 1 << 4;
    pub const SIBLING: u16 = 1 << 5;
    pub const STACK_MODE: u16 = 1 << 6;
}

/// The fields of a ConfigureWindow request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowChanges {
    pub x: Option<i16>,
    pub y: Option<i16>,
    pub width: Option<u16>,
    pub height: Option<u16>,
    pub border_width: Option<u16>,
    pub sibling: Option<ResourceId>,
    pub stack_mode: Option<StackMode>,
}

impl WindowChanges {
    pub fn value_mask(&self) -> u16 {
        let mut mask = 0;
        if self.x.is_some() {
            mask |= config_mask::X;
        }
        if self.y.is_some() {
            mask |= config_mask::Y;
        }
        if self.width.is_some() {
            mask |= config_mask::WIDTH;
        }
        if self.height.is_some() {
            mask |= config_mask::HEIGHT;
        }
        if self.border_width.is_some() {
            mask |= config_mask::BORDER_WIDTH;
        }
        if self.sibling.is_some() {
            mask |= config_mask::SIBLING;
        }
        if self.stack_mode.is_some() {
            mask |= config_mask::STACK_MODE;
        }
        mask
    }
}

/// A validated attribute assignment
#[derive(Debug, Clone, Copy)]
enum Attr {
    Background(Fill),
    Border(Fill),
    BitGravity(u8),
    WinGravity(u8),
    BackingStore(u8),
    BackingPlanes(u32),
    BackingPixel(u32),
    OverrideRedirect(bool),
    SaveUnder(bool),
    EventMask(u32),
    DoNotPropagate(u32),
    Colormap(ResourceId),
    Cursor(ResourceId),
}

/// Attributes an InputOnly window may carry
const INPUT_ONLY_ATTRS: u32 =
    cw::WIN_GRAVITY | cw::EVENT_MASK | cw::DONT_PROPAGATE | cw::OVERRIDE_REDIRECT | cw::CURSOR;

impl Server {
    pub fn is_viewable(&self, id: ResourceId) -> bool {
        let mut current = id;
        loop {
            match self.registry.window(current) {
                Ok(w) if w.mapped => match w.parent {
                    Some(parent) => current = parent,
                    None => return true,
                },
                _ => return false,
            }
        }
    }

    pub fn parent_of(&self, id: ResourceId) -> Option<ResourceId> {
        self.registry.window(id).ok().and_then(|w| w.parent)
    }

    /// Ancestors of `id`, nearest first, ending with the root
    pub fn ancestors(&self, id: ResourceId) -> Vec<ResourceId> {
        let mut out = Vec::new();
        let mut current = self.parent_of(id);
        while let Some(p) = current {
            out.push(p);
            current = self.parent_of(p);
        }
        out
    }

    /// True if `id` is a strict descendant of `ancestor`
    pub fn is_inferior(&self, ancestor: ResourceId, id: ResourceId) -> bool {
        self.ancestors(id).contains(&ancestor)
    }

    /// `id` and all of its descendants, parents before children
    pub fn subtree(&self, id: ResourceId) -> Vec<ResourceId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Ok(w) = self.registry.window(current) {
                out.push(current);
                stack.extend(w.children.iter().rev().copied());
            }
        }
        out
    }

    /// The child of `ancestor` on the path down to `descendant`, or NONE
    pub fn child_toward(&self, ancestor: ResourceId, descendant: ResourceId) -> ResourceId {
        let mut current = descendant;
        while let Some(parent) = self.parent_of(current) {
            if parent == ancestor {
                return current;
            }
            current = parent;
        }
        NONE
    }

    /// Topmost mapped child of `parent` whose outer rect contains the
    /// absolute point, or NONE
    pub fn child_containing(&self, parent: ResourceId, x: i32, y: i32) -> ResourceId {
        let Ok(window) = self.registry.window(parent) else {
            return NONE;
        };
        for child in window.children.iter().rev() {
            if let Ok(c) = self.registry.window(*child) {
                if c.mapped && c.outer.contains(x, y) {
                    return *child;
                }
            }
        }
        NONE
    }

    /// Deepest viewable window containing the absolute point
    pub fn window_at(&self, x: i32, y: i32) -> ResourceId {
        let mut current = ROOT_WINDOW;
        loop {
            let child = self.child_containing(current, x, y);
            if child == NONE {
                return current;
            }
            current = child;
        }
    }

    /// Absolute origin of a window's content area
    pub fn inner_origin(&self, id: ResourceId) -> (i32, i32) {
        self.registry
            .window(id)
            .map(|w| {
                let inner = w.inner();
                (inner.x, inner.y)
            })
            .unwrap_or((0, 0))
    }

    /// Translate a point from `src` to `dst` coordinates; also returns the
    /// mapped child of `dst` containing it
    pub fn translate_coordinates(
        &self,
        src: ResourceId,
        dst: ResourceId,
        x: i16,
        y: i16,
    ) -> (i16, i16, ResourceId) {
        let (sx, sy) = self.inner_origin(src);
        let (dx, dy) = self.inner_origin(dst);
        let abs_x = sx + x as i32;
        let abs_y = sy + y as i32;
        let child = self.child_containing(dst, abs_x, abs_y);
        ((abs_x - dx) as i16, (abs_y - dy) as i16, child)
    }

    fn translate_subtree(&mut self, id: ResourceId, dx: i32, dy: i32) {
        if dx == 0 && dy == 0 {
            return;
        }
        for wid in self.subtree(id) {
            if let Ok(w) = self.registry.window_mut(wid) {
                w.outer = w.outer.translate(dx, dy);
            }
        }
    }

    /// Send a structure event to `window` (StructureNotify) and its parent
    /// (SubstructureNotify). `build` receives the event window.
    fn notify_structure(&self, window: ResourceId, build: impl Fn(ResourceId) -> Event) {
        self.deliver_to_selecting(window, event_mask::STRUCTURE_NOTIFY, &build(window));
        if let Some(parent) = self.parent_of(window) {
            self.deliver_to_selecting(parent, event_mask::SUBSTRUCTURE_NOTIFY, &build(parent));
        }
    }

    fn log_backend<T>(&self, op: &str, result: crate::backend::BackendResult<T>) {
        if let Err(e) = result {
            log::debug!("Backend {} failed: {}", op, e);
        }
    }

    /// Check an attribute list against `window` (or, during creation, the
    /// window about to exist with `parent`, `depth` and `visual`)
    fn check_attributes(
        &self,
        parent: Option<ResourceId>,
        depth: u8,
        visual: u32,
        input_only: bool,
        value_mask: u32,
        values: &[u32],
    ) -> X11Result<Vec<Attr>> {
        if value_mask & !cw::ALL != 0 {
            return Err(X11Error::bad_value(value_mask));
        }
        if input_only && value_mask & !INPUT_ONLY_ATTRS != 0 {
            return Err(X11Error::bad_match());
        }
        if values.len() < value_mask.count_ones() as usize {
            return Err(X11Error::bad_length());
        }
        let parent_window = parent.and_then(|p| self.registry.window(p).ok());
        let mut attrs = Vec::new();
        let mut values = values.iter().copied();
        for bit in 0..15 {
            let flag = 1u32 << bit;
            if value_mask & flag == 0 {
                continue;
            }
            let value = values.next().unwrap_or(0);
            let attr = match flag {
                cw::BACK_PIXMAP => Attr::Background(match value {
                    0 => Fill::None,
                    1 => Fill::ParentRelative,
                    id => {
                        let pixmap = self.registry.pixmap(id)?;
                        if pixmap.depth != depth {
                            return Err(X11Error::bad_match());
                        }
                        Fill::Pixmap(id)
                    }
                }),
                cw::BACK_PIXEL => Attr::Background(Fill::Pixel(value)),
                cw::BORDER_PIXMAP => Attr::Border(match value {
                    0 => parent_window
                        .map(|p| p.attributes.border)
                        .unwrap_or(Fill::Pixel(0)),
                    id => {
                        let pixmap = self.registry.pixmap(id)?;
                        if pixmap.depth != depth {
                            return Err(X11Error::bad_match());
                        }
                        Fill::Pixmap(id)
                    }
                }),
                cw::BORDER_PIXEL => Attr::Border(Fill::Pixel(value)),
                cw::BIT_GRAVITY | cw::WIN_GRAVITY => {
                    if value > 10 {
                        return Err(X11Error::bad_value(value));
                    }
                    if flag == cw::BIT_GRAVITY {
                        Attr::BitGravity(value as u8)
                    } else {
                        Attr::WinGravity(value as u8)
                    }
                }
                cw::BACKING_STORE => {
                    if value > 2 {
                        return Err(X11Error::bad_value(value));
                    }
                    Attr::BackingStore(value as u8)
                }
                cw::BACKING_PLANES => Attr::BackingPlanes(value),
                cw::BACKING_PIXEL => Attr::BackingPixel(value),
                cw::OVERRIDE_REDIRECT | cw::SAVE_UNDER => {
                    if value > 1 {
                        return Err(X11Error::bad_value(value));
                    }
                    if flag == cw::OVERRIDE_REDIRECT {
                        Attr::OverrideRedirect(value == 1)
                    } else {
                        Attr::SaveUnder(value == 1)
                    }
                }
                cw::EVENT_MASK => {
                    if value & !event_mask::ALL != 0 {
                        return Err(X11Error::bad_value(value));
                    }
                    Attr::EventMask(value)
                }
                cw::DONT_PROPAGATE => {
                    if value & !event_mask::DEVICE_EVENTS != 0 {
                        return Err(X11Error::bad_value(value));
                    }
                    Attr::DoNotPropagate(value)
                }
                cw::COLORMAP => match value {
                    0 => Attr::Colormap(
                        parent_window
                            .map(|p| p.attributes.colormap)
                            .unwrap_or(NONE),
                    ),
                    id => {
                        let colormap = self.registry.colormap(id)?;
                        if colormap.visual != visual {
                            return Err(X11Error::bad_match());
                        }
                        Attr::Colormap(id)
                    }
                },
                _ => {
                    if value != NONE {
                        self.registry.cursor(value)?;
                    }
                    Attr::Cursor(value)
                }
            };
            attrs.push(attr);
        }
        Ok(attrs)
    }

    /// Apply checked attributes. The event mask goes first because it is
    /// the only assignment that can still fail (Access).
    fn apply_attributes(
        &mut self,
        client: ClientId,
        id: ResourceId,
        attrs: &[Attr],
    ) -> X11Result<()> {
        for attr in attrs {
            if let Attr::EventMask(mask) = attr {
                self.registry.window_mut(id)?.select_events(client, *mask)?;
            }
        }
        let mut colormap_changed = None;
        let mut cursor_changed = None;
        {
            let window = self.registry.window_mut(id)?;
            let a = &mut window.attributes;
            for attr in attrs {
                match *attr {
                    Attr::Background(fill) => a.background = fill,
                    Attr::Border(fill) => a.border = fill,
                    Attr::BitGravity(v) => a.bit_gravity = v,
                    Attr::WinGravity(v) => a.win_gravity = v,
                    Attr::BackingStore(v) => a.backing_store = v,
                    Attr::BackingPlanes(v) => a.backing_planes = v,
                    Attr::BackingPixel(v) => a.backing_pixel = v,
                    Attr::OverrideRedirect(v) => a.override_redirect = v,
                    Attr::SaveUnder(v) => a.save_under = v,
                    Attr::EventMask(_) => {}
                    Attr::DoNotPropagate(v) => a.do_not_propagate_mask = v,
                    Attr::Colormap(c) => {
                        if a.colormap != c {
                            a.colormap = c;
                            colormap_changed = Some(c);
                        }
                    }
                    Attr::Cursor(c) => {
                        a.cursor = c;
                        cursor_changed = Some(c);
                    }
                }
            }
        }
        if let Some(colormap) = colormap_changed {
            let event = Event::ColormapNotify(ColormapNotifyEvent {
                window: id,
                colormap,
                new: true,
                installed: self.installed_colormaps.contains(&colormap),
            });
            self.deliver_to_selecting(id, event_mask::COLORMAP_CHANGE, &event);
        }
        if let Some(cursor) = cursor_changed {
            let result = self.backend.set_window_cursor(id, cursor);
            self.log_backend("set_window_cursor", result);
        }
        Ok(())
    }

    /// Pixel the backend paints a window's background with
    pub fn background_pixel(&self, id: ResourceId) -> Option<u32> {
        let mut current = id;
        loop {
            let w = self.registry.window(current).ok()?;
            match w.attributes.background {
                Fill::Pixel(p) => return Some(p),
                Fill::ParentRelative => current = w.parent?,
                Fill::None | Fill::Pixmap(_) => return None,
            }
        }
    }

    /// CreateWindow
    pub fn create_window(&mut self, client: ClientId, p: CreateWindowParams) -> X11Result<()> {
        self.registry.validate_new_id(p.id, client)?;
        let parent = self.registry.window(p.parent)?;
        if p.width == 0 || p.height == 0 {
            return Err(X11Error::bad_value(0));
        }
        let class = match WindowClass::from_u16(p.class) {
            Some(WindowClass::CopyFromParent) => parent.class,
            Some(class) => class,
            None => return Err(X11Error::bad_value(p.class as u32)),
        };
        let (depth, visual) = match class {
            WindowClass::InputOnly => {
                if p.border_width != 0 || p.depth != 0 {
                    return Err(X11Error::bad_match());
                }
                (0, if p.visual == 0 { parent.visual } else { p.visual })
            }
            _ => {
                if parent.class == WindowClass::InputOnly {
                    return Err(X11Error::bad_match());
                }
                let depth = if p.depth == 0 { parent.depth } else { p.depth };
                let visual = if p.visual == 0 { parent.visual } else { p.visual };
                (depth, visual)
            }
        };
        if visual != super::ROOT_VISUAL || (class != WindowClass::InputOnly && depth != super::ROOT_DEPTH) {
            return Err(X11Error::bad_match());
        }
        let input_only = class == WindowClass::InputOnly;
        let attrs = self.check_attributes(
            Some(p.parent),
            depth,
            visual,
            input_only,
            p.value_mask,
            &p.values,
        )?;

        let parent = self.registry.window(p.parent)?;
        let parent_inner = parent.inner();
        let parent_colormap = parent.attributes.colormap;
        let bw = p.border_width as i32;
        let outer = Rect::new(
            parent_inner.x + p.x as i32,
            parent_inner.y + p.y as i32,
            p.width as i32 + 2 * bw,
            p.height as i32 + 2 * bw,
        );
        let mut window = Window::new(
            p.id,
            Some(p.parent),
            outer,
            p.border_width,
            class,
            depth,
            visual,
        );
        if !input_only {
            window.attributes.colormap = parent_colormap;
        }
        self.registry.create(p.id, client, ResourceData::Window(window))?;
        if let Err(e) = self.apply_attributes(client, p.id, &attrs) {
            self.registry.free(p.id);
            return Err(e);
        }
        if let Ok(parent) = self.registry.window_mut(p.parent) {
            parent.children.push(p.id);
        }

        let params = WindowParams {
            parent: p.parent,
            rect: outer.inset(bw),
            border_width: p.border_width,
            background_pixel: self.background_pixel(p.id),
            input_only,
        };
        let result = self.backend.create_window(p.id, params);
        self.log_backend("create_window", result);

        let override_redirect = self
            .registry
            .window(p.id)
            .map(|w| w.attributes.override_redirect)
            .unwrap_or(false);
        let event = Event::CreateNotify(CreateNotifyEvent {
            parent: p.parent,
            window: p.id,
            x: p.x,
            y: p.y,
            width: p.width,
            height: p.height,
            border_width: p.border_width,
            override_redirect,
        });
        self.deliver_to_selecting(p.parent, event_mask::SUBSTRUCTURE_NOTIFY, &event);
        log::debug!("Client {} created window {:#x} in {:#x}", client, p.id, p.parent);
        Ok(())
    }

    /// ChangeWindowAttributes
    pub fn change_window_attributes(
        &mut self,
        client: ClientId,
        id: ResourceId,
        value_mask: u32,
        values: &[u32],
    ) -> X11Result<()> {
        let window = self.registry.window(id)?;
        let attrs = self.check_attributes(
            window.parent,
            window.depth,
            window.visual,
            window.input_only(),
            value_mask,
            values,
        )?;
        self.apply_attributes(client, id, &attrs)?;
        if value_mask & (cw::BACK_PIXEL | cw::BACK_PIXMAP) != 0 {
            let rect = self.registry.window(id)?.inner();
            let result = self.backend.configure_window(id, rect, self.registry.window(id)?.border_width);
            self.log_backend("configure_window", result);
        }
        Ok(())
    }

    pub fn map_state(&self, id: ResourceId) -> MapState {
        match self.registry.window(id) {
            Ok(w) if !w.mapped => MapState::Unmapped,
            Ok(_) if self.is_viewable(id) => MapState::Viewable,
            _ => MapState::Unviewable,
        }
    }

    /// Send Expose for every viewable InputOutput window in `id`'s subtree
    fn expose_subtree(&mut self, id: ResourceId) {
        let mut stack = vec![id];
        while let Some(wid) = stack.pop() {
            let Ok(w) = self.registry.window(wid) else {
                continue;
            };
            if !w.mapped {
                continue;
            }
            stack.extend(w.children.iter().copied());
            if w.input_only() {
                continue;
            }
            let (width, height) = (w.width(), w.height());
            self.expose_area(wid, Rectangle::new(0, 0, width, height));
        }
    }

    /// Paint the background of part of a window and report it exposed
    pub fn expose_area(&mut self, id: ResourceId, rect: Rectangle) {
        let background = self.background_pixel(id);
        let result = self.backend.clear_area(id, rect, background);
        self.log_backend("clear_area", result);
        let event = Event::Expose(ExposeEvent {
            window: id,
            x: rect.x.max(0) as u16,
            y: rect.y.max(0) as u16,
            width: rect.width,
            height: rect.height,
            count: 0,
        });
        self.deliver_to_selecting(id, event_mask::EXPOSURE, &event);
    }

    /// MapWindow
    pub fn map_window(&mut self, client: ClientId, id: ResourceId) -> X11Result<()> {
        let window = self.registry.window(id)?;
        if window.mapped {
            return Ok(());
        }
        let Some(parent) = window.parent else {
            return Ok(());
        };
        let override_redirect = window.attributes.override_redirect;
        if !override_redirect {
            if let Some(wm) = self.redirect_client(parent, event_mask::SUBSTRUCTURE_REDIRECT, client) {
                let event = Event::MapRequest(MapRequestEvent { parent, window: id });
                self.send_event(wm, &event);
                return Ok(());
            }
        }

        self.registry.window_mut(id)?.mapped = true;
        let result = self.backend.map_window(id);
        self.log_backend("map_window", result);
        self.notify_structure(id, |event| {
            Event::MapNotify(MapNotifyEvent {
                event,
                window: id,
                override_redirect,
            })
        });
        if self.is_viewable(id) {
            self.expose_subtree(id);
            self.refresh_input();
        }
        Ok(())
    }

    /// MapSubwindows: unmapped children, top to bottom
    pub fn map_subwindows(&mut self, client: ClientId, id: ResourceId) -> X11Result<()> {
        let children = self.registry.window(id)?.children.clone();
        for child in children.into_iter().rev() {
            self.map_window(client, child)?;
        }
        Ok(())
    }

    /// UnmapWindow
    pub fn unmap_window(&mut self, id: ResourceId) -> X11Result<()> {
        self.unmap_window_internal(id, false)
    }

    fn unmap_window_internal(&mut self, id: ResourceId, from_configure: bool) -> X11Result<()> {
        let window = self.registry.window(id)?;
        if !window.mapped {
            return Ok(());
        }
        let Some(parent) = window.parent else {
            return Ok(());
        };
        let outer = window.outer;
        let was_viewable = self.is_viewable(id);

        self.registry.window_mut(id)?.mapped = false;
        let result = self.backend.unmap_window(id);
        self.log_backend("unmap_window", result);
        self.notify_structure(id, |event| {
            Event::UnmapNotify(UnmapNotifyEvent {
                event,
                window: id,
                from_configure,
            })
        });

        if was_viewable {
            let parent_window = self.registry.window(parent)?;
            if !parent_window.input_only() {
                let inner = parent_window.inner();
                let x = (outer.x - inner.x).max(0);
                let y = (outer.y - inner.y).max(0);
                let rect = Rectangle::new(x as i16, y as i16, outer.width as u16, outer.height as u16);
                self.expose_area(parent, rect);
            }
            self.refresh_input();
        }
        Ok(())
    }

    /// UnmapSubwindows: mapped children, bottom to top
    pub fn unmap_subwindows(&mut self, id: ResourceId) -> X11Result<()> {
        let children = self.registry.window(id)?.children.clone();
        for child in children {
            self.unmap_window(child)?;
        }
        Ok(())
    }

    /// DestroyWindow. Destroying the root (or an unknown id) does nothing.
    pub fn destroy_window(&mut self, id: ResourceId) {
        if id == ROOT_WINDOW || self.registry.window(id).is_err() {
            return;
        }
        // Unmapping first moves pointer, focus and grabs off the subtree
        let _ = self.unmap_window(id);
        let parent = self.parent_of(id);
        self.destroy_subtree(id);
        if let Some(parent) = parent {
            if let Ok(p) = self.registry.window_mut(parent) {
                p.children.retain(|c| *c != id);
            }
        }
        self.refresh_input();
    }

    /// DestroySubwindows: children top to bottom
    pub fn destroy_subwindows(&mut self, id: ResourceId) -> X11Result<()> {
        let children = self.registry.window(id)?.children.clone();
        for child in children.into_iter().rev() {
            self.destroy_window(child);
        }
        Ok(())
    }

    /// Depth first: every inferior gets its DestroyNotify before `id`
    fn destroy_subtree(&mut self, id: ResourceId) {
        let children = match self.registry.window(id) {
            Ok(w) => w.children.clone(),
            Err(_) => return,
        };
        for child in children.into_iter().rev() {
            self.destroy_subtree(child);
        }
        self.notify_structure(id, |event| {
            Event::DestroyNotify(DestroyNotifyEvent { event, window: id })
        });
        self.selections.clear_window(id);
        self.registry.free(id);
        let result = self.backend.destroy_window(id);
        self.log_backend("destroy_window", result);
    }

    /// Does `a` occlude `b`? Both must be mapped siblings, `a` stacked above
    /// `b`, with intersecting outer rects.
    fn occludes(&self, siblings: &[ResourceId], a: ResourceId, b: ResourceId) -> bool {
        let (Some(ia), Some(ib)) = (
            siblings.iter().position(|c| *c == a),
            siblings.iter().position(|c| *c == b),
        ) else {
            return false;
        };
        let (Ok(wa), Ok(wb)) = (self.registry.window(a), self.registry.window(b)) else {
            return false;
        };
        ia > ib && wa.mapped && wb.mapped && wa.outer.intersects(&wb.outer)
    }

    /// Apply a stack mode; returns true if the order changed
    fn restack(&mut self, id: ResourceId, mode: StackMode, sibling: Option<ResourceId>) -> bool {
        let Some(parent) = self.parent_of(id) else {
            return false;
        };
        let siblings = match self.registry.window(parent) {
            Ok(p) => p.children.clone(),
            Err(_) => return false,
        };
        let others: Vec<ResourceId> = siblings.iter().copied().filter(|c| *c != id).collect();
        let occluded_by = |s: ResourceId| self.occludes(&siblings, s, id);
        let occluding = |s: ResourceId| self.occludes(&siblings, id, s);

        enum Place {
            Top,
            Bottom,
            AboveOf(ResourceId),
            BelowOf(ResourceId),
        }
        let place = match (mode, sibling) {
            (StackMode::Above, Some(s)) => Some(Place::AboveOf(s)),
            (StackMode::Above, None) => Some(Place::Top),
            (StackMode::Below, Some(s)) => Some(Place::BelowOf(s)),
            (StackMode::Below, None) => Some(Place::Bottom),
            (StackMode::TopIf, Some(s)) => occluded_by(s).then_some(Place::Top),
            (StackMode::TopIf, None) => others.iter().any(|s| occluded_by(*s)).then_some(Place::Top),
            (StackMode::BottomIf, Some(s)) => occluding(s).then_some(Place::Bottom),
            (StackMode::BottomIf, None) => {
                others.iter().any(|s| occluding(*s)).then_some(Place::Bottom)
            }
            (StackMode::Opposite, Some(s)) => {
                if occluded_by(s) {
                    Some(Place::Top)
                } else if occluding(s) {
                    Some(Place::Bottom)
                } else {
                    None
                }
            }
            (StackMode::Opposite, None) => {
                if others.iter().any(|s| occluded_by(*s)) {
                    Some(Place::Top)
                } else if others.iter().any(|s| occluding(*s)) {
                    Some(Place::Bottom)
                } else {
                    None
                }
            }
        };
        let Some(place) = place else {
            return false;
        };

        let mut order = others;
        let index = match place {
            Place::Top => order.len(),
            Place::Bottom => 0,
            Place::AboveOf(s) => order.iter().position(|c| *c == s).map_or(order.len(), |i| i + 1),
            Place::BelowOf(s) => order.iter().position(|c| *c == s).unwrap_or(0),
        };
        order.insert(index, id);
        if order == siblings {
            return false;
        }
        if let Ok(p) = self.registry.window_mut(parent) {
            p.children = order;
        }
        true
    }

    /// Sibling directly below `id` in the stacking order, or NONE
    fn sibling_below(&self, id: ResourceId) -> ResourceId {
        self.parent_of(id)
            .and_then(|p| self.registry.window(p).ok())
            .and_then(|p| {
                let i = p.children.iter().position(|c| *c == id)?;
                i.checked_sub(1).map(|below| p.children[below])
            })
            .unwrap_or(NONE)
    }

    /// ConfigureWindow
    pub fn configure_window(
        &mut self,
        client: ClientId,
        id: ResourceId,
        mut changes: WindowChanges,
    ) -> X11Result<()> {
        let window = self.registry.window(id)?;
        if changes.width == Some(0) || changes.height == Some(0) {
            return Err(X11Error::bad_value(0));
        }
        if window.input_only() && changes.border_width.map_or(false, |bw| bw != 0) {
            return Err(X11Error::bad_match());
        }
        if let Some(sibling) = changes.sibling {
            if changes.stack_mode.is_none() {
                return Err(X11Error::bad_match());
            }
            let s = self.registry.window(sibling)?;
            if sibling == id || s.parent != window.parent {
                return Err(X11Error::bad_match());
            }
        }
        let Some(parent) = window.parent else {
            return Ok(());
        };
        let parent_inner = self.registry.window(parent)?.inner();
        let (cur_x, cur_y) = window.relative_position(&parent_inner);
        let (cur_w, cur_h, cur_bw) = (window.width(), window.height(), window.border_width);
        let override_redirect = window.attributes.override_redirect;

        if !override_redirect {
            if let Some(wm) = self.redirect_client(parent, event_mask::SUBSTRUCTURE_REDIRECT, client) {
                let event = Event::ConfigureRequest(ConfigureRequestEvent {
                    stack_mode: changes.stack_mode.map_or(StackMode::Above as u8, |m| m as u8),
                    parent,
                    window: id,
                    sibling: changes.sibling.unwrap_or(NONE),
                    x: changes.x.unwrap_or(cur_x),
                    y: changes.y.unwrap_or(cur_y),
                    width: changes.width.unwrap_or(cur_w),
                    height: changes.height.unwrap_or(cur_h),
                    border_width: changes.border_width.unwrap_or(cur_bw),
                    value_mask: changes.value_mask(),
                });
                self.send_event(wm, &event);
                return Ok(());
            }
        }

        let new_w = changes.width.unwrap_or(cur_w);
        let new_h = changes.height.unwrap_or(cur_h);
        if (new_w, new_h) != (cur_w, cur_h) {
            if let Some(owner) = self.redirect_client(id, event_mask::RESIZE_REDIRECT, client) {
                let event = Event::ResizeRequest(ResizeRequestEvent {
                    window: id,
                    width: new_w,
                    height: new_h,
                });
                self.send_event(owner, &event);
                changes.width = None;
                changes.height = None;
            }
        }

        let new_x = changes.x.unwrap_or(cur_x);
        let new_y = changes.y.unwrap_or(cur_y);
        let new_w = changes.width.unwrap_or(cur_w);
        let new_h = changes.height.unwrap_or(cur_h);
        let new_bw = changes.border_width.unwrap_or(cur_bw);
        let bw = new_bw as i32;
        let outer = Rect::new(
            parent_inner.x + new_x as i32,
            parent_inner.y + new_y as i32,
            new_w as i32 + 2 * bw,
            new_h as i32 + 2 * bw,
        );
        let (old_inner, new_inner) = {
            let w = self.registry.window_mut(id)?;
            let old_inner = w.inner();
            w.outer = outer;
            w.border_width = new_bw;
            (old_inner, w.inner())
        };
        let (dx, dy) = (new_inner.x - old_inner.x, new_inner.y - old_inner.y);
        let children = self.registry.window(id)?.children.clone();
        for child in children {
            self.translate_subtree(child, dx, dy);
        }
        if let Some(mode) = changes.stack_mode {
            self.restack(id, mode, changes.sibling);
        }

        let above_sibling = self.sibling_below(id);
        self.notify_structure(id, |event| {
            Event::ConfigureNotify(ConfigureNotifyEvent {
                event,
                window: id,
                above_sibling,
                x: new_x,
                y: new_y,
                width: new_w,
                height: new_h,
                border_width: new_bw,
                override_redirect,
            })
        });
        let result = self.backend.configure_window(id, new_inner, new_bw);
        self.log_backend("configure_window", result);

        if self.is_viewable(id) {
            if (new_w, new_h) != (cur_w, cur_h) && !self.registry.window(id)?.input_only() {
                self.expose_area(id, Rectangle::new(0, 0, new_w, new_h));
            }
            self.refresh_input();
        }
        Ok(())
    }

    /// CirculateWindow on the children of `id`. Direction 0 raises the
    /// lowest occluded child, 1 lowers the highest occluding child.
    pub fn circulate_window(
        &mut self,
        client: ClientId,
        id: ResourceId,
        direction: u8,
    ) -> X11Result<()> {
        if direction > 1 {
            return Err(X11Error::bad_value(direction as u32));
        }
        let children = self.registry.window(id)?.children.clone();
        let target = if direction == 0 {
            children.iter().copied().find(|c| {
                children
                    .iter()
                    .any(|s| self.occludes(&children, *s, *c))
            })
        } else {
            children.iter().rev().copied().find(|c| {
                children
                    .iter()
                    .any(|s| self.occludes(&children, *c, *s))
            })
        };
        let Some(target) = target else {
            return Ok(());
        };
        let place = if direction == 0 {
            circulate_place::ON_TOP
        } else {
            circulate_place::ON_BOTTOM
        };

        if let Some(wm) = self.redirect_client(id, event_mask::SUBSTRUCTURE_REDIRECT, client) {
            let event = Event::CirculateRequest(CirculateRequestEvent {
                parent: id,
                window: target,
                place,
            });
            self.send_event(wm, &event);
            return Ok(());
        }

        let mode = if direction == 0 {
            StackMode::Above
        } else {
            StackMode::Below
        };
        self.restack(target, mode, None);
        self.notify_structure(target, |event| {
            Event::CirculateNotify(CirculateNotifyEvent {
                event,
                window: target,
                place,
            })
        });
        if self.is_viewable(target) {
            if direction == 0 && !self.registry.window(target)?.input_only() {
                let (w, h) = {
                    let t = self.registry.window(target)?;
                    (t.width(), t.height())
                };
                self.expose_area(target, Rectangle::new(0, 0, w, h));
            }
            self.refresh_input();
        }
        Ok(())
    }

    /// ReparentWindow
    pub fn reparent_window(
        &mut self,
        client: ClientId,
        id: ResourceId,
        new_parent: ResourceId,
        x: i16,
        y: i16,
    ) -> X11Result<()> {
        let window = self.registry.window(id)?;
        let target = self.registry.window(new_parent)?;
        let Some(old_parent) = window.parent else {
            return Err(X11Error::bad_match());
        };
        if new_parent == id || self.is_inferior(id, new_parent) {
            return Err(X11Error::bad_match());
        }
        if target.input_only() && !window.input_only() {
            return Err(X11Error::bad_match());
        }
        let target_inner = target.inner();
        let was_mapped = window.mapped;
        let override_redirect = window.attributes.override_redirect;
        let old_outer = window.outer;

        if was_mapped {
            self.unmap_window(id)?;
        }
        if let Ok(p) = self.registry.window_mut(old_parent) {
            p.children.retain(|c| *c != id);
        }
        if let Ok(p) = self.registry.window_mut(new_parent) {
            p.children.push(id);
        }
        self.registry.window_mut(id)?.parent = Some(new_parent);
        let dx = target_inner.x + x as i32 - old_outer.x;
        let dy = target_inner.y + y as i32 - old_outer.y;
        self.translate_subtree(id, dx, dy);

        let build = |event| {
            Event::ReparentNotify(ReparentNotifyEvent {
                event,
                window: id,
                parent: new_parent,
                x,
                y,
                override_redirect,
            })
        };
        self.deliver_to_selecting(id, event_mask::STRUCTURE_NOTIFY, &build(id));
        self.deliver_to_selecting(old_parent, event_mask::SUBSTRUCTURE_NOTIFY, &build(old_parent));
        self.deliver_to_selecting(new_parent, event_mask::SUBSTRUCTURE_NOTIFY, &build(new_parent));

        let (inner, bw) = {
            let w = self.registry.window(id)?;
            (w.inner(), w.border_width)
        };
        let result = self.backend.configure_window(id, inner, bw);
        self.log_backend("configure_window", result);

        if was_mapped {
            self.map_window(client, id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::test_util::*;

    fn params(id: ResourceId, parent: ResourceId, x: i16, y: i16, w: u16, h: u16) -> CreateWindowParams {
        CreateWindowParams {
            id,
            parent,
            x,
            y,
            width: w,
            height: h,
            border_width: 0,
            class: 0,
            depth: 0,
            visual: 0,
            value_mask: 0,
            values: Vec::new(),
        }
    }

    #[test]
    fn test_create_window_geometry() {
        let mut server = server();
        let (client, _) = connect(&mut server);
        let mut p = params(0x0020_0001, ROOT_WINDOW, 10, 20, 100, 50);
        p.border_width = 2;
        server.create_window(client, p).unwrap();
        let w = server.registry.window(0x0020_0001).unwrap();
        assert_eq!(w.outer, Rect::new(10, 20, 104, 54));
        assert_eq!(w.inner(), Rect::new(12, 22, 100, 50));
        assert_eq!(w.attributes.colormap, crate::resources::server_ids::DEFAULT_COLORMAP);
        assert_eq!(
            server.registry.window(ROOT_WINDOW).unwrap().children,
            vec![0x0020_0001]
        );
    }

    #[test]
    fn test_create_window_errors() {
        let mut server = server();
        let (client, _) = connect(&mut server);
        let err = server
            .create_window(client, params(0x0040_0001, ROOT_WINDOW, 0, 0, 10, 10))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::IDChoice);
        let err = server
            .create_window(client, params(0x0020_0001, 0x0020_0099, 0, 0, 10, 10))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Window);
        let err = server
            .create_window(client, params(0x0020_0001, ROOT_WINDOW, 0, 0, 0, 10))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Value);
        let mut bad = params(0x0020_0001, ROOT_WINDOW, 0, 0, 10, 10);
        bad.class = WindowClass::InputOnly as u16;
        bad.border_width = 1;
        assert_eq!(server.create_window(client, bad).unwrap_err().code, ErrorCode::Match);
        assert!(!server.registry.exists(0x0020_0001));
    }

    #[test]
    fn test_move_translates_descendants() {
        let mut server = server();
        let (client, _) = connect(&mut server);
        server
            .create_window(client, params(0x0020_0001, ROOT_WINDOW, 10, 10, 200, 200))
            .unwrap();
        server
            .create_window(client, params(0x0020_0002, 0x0020_0001, 5, 5, 50, 50))
            .unwrap();
        server
            .create_window(client, params(0x0020_0003, 0x0020_0002, 1, 1, 10, 10))
            .unwrap();
        let before: Vec<Rect> = [0x0020_0002, 0x0020_0003]
            .iter()
            .map(|id| server.registry.window(*id).unwrap().outer)
            .collect();

        let changes = WindowChanges {
            x: Some(40),
            y: Some(30),
            ..Default::default()
        };
        server.configure_window(client, 0x0020_0001, changes).unwrap();
        for (i, id) in [0x0020_0002, 0x0020_0003].iter().enumerate() {
            let after = server.registry.window(*id).unwrap().outer;
            assert_eq!(after, before[i].translate(30, 20));
            let w = server.registry.window(*id).unwrap();
            assert!(w.outer.contains_rect(&w.inner()));
        }
    }

    #[test]
    fn test_border_change_shifts_children() {
        let mut server = server();
        let (client, _) = connect(&mut server);
        server
            .create_window(client, params(0x0020_0001, ROOT_WINDOW, 0, 0, 100, 100))
            .unwrap();
        server
            .create_window(client, params(0x0020_0002, 0x0020_0001, 5, 5, 10, 10))
            .unwrap();
        let changes = WindowChanges {
            border_width: Some(3),
            ..Default::default()
        };
        server.configure_window(client, 0x0020_0001, changes).unwrap();
        assert_eq!(
            server.registry.window(0x0020_0002).unwrap().outer,
            Rect::new(8, 8, 10, 10)
        );
    }

    fn stack(server: &Server) -> Vec<ResourceId> {
        server.registry.window(ROOT_WINDOW).unwrap().children.clone()
    }

    #[test]
    fn test_stack_modes() {
        let mut server = server();
        let (client, _) = connect(&mut server);
        for (i, x) in [(1, 0), (2, 10), (3, 500)] {
            server
                .create_window(client, params(0x0020_0000 | i, ROOT_WINDOW, x, 0, 50, 50))
                .unwrap();
            server.map_window(client, 0x0020_0000 | i).unwrap();
        }
        let (a, b, c) = (0x0020_0001, 0x0020_0002, 0x0020_0003);
        assert_eq!(stack(&server), vec![a, b, c]);

        // a is occluded by b, so TopIf raises it
        let top_if = WindowChanges {
            stack_mode: Some(StackMode::TopIf),
            ..Default::default()
        };
        server.configure_window(client, a, top_if.clone()).unwrap();
        assert_eq!(stack(&server), vec![b, c, a]);

        // c overlaps nobody: TopIf relative to c does nothing
        let top_if_c = WindowChanges {
            sibling: Some(c),
            ..top_if
        };
        server.configure_window(client, b, top_if_c).unwrap();
        assert_eq!(stack(&server), vec![b, c, a]);

        let below = WindowChanges {
            sibling: Some(b),
            stack_mode: Some(StackMode::Below),
            ..Default::default()
        };
        server.configure_window(client, c, below).unwrap();
        assert_eq!(stack(&server), vec![c, b, a]);

        // a occludes b: Opposite sends a to the bottom
        let opposite = WindowChanges {
            sibling: Some(b),
            stack_mode: Some(StackMode::Opposite),
            ..Default::default()
        };
        server.configure_window(client, a, opposite).unwrap();
        assert_eq!(stack(&server), vec![a, c, b]);

        let no_mode = WindowChanges {
            sibling: Some(b),
            ..Default::default()
        };
        assert_eq!(
            server.configure_window(client, a, no_mode).unwrap_err().code,
            ErrorCode::Match
        );
    }

    #[test]
    fn test_circulate() {
        let mut server = server();
        let (client, _) = connect(&mut server);
        for i in 1..=3 {
            server
                .create_window(client, params(0x0020_0000 | i, ROOT_WINDOW, 0, 0, 50, 50))
                .unwrap();
            server.map_window(client, 0x0020_0000 | i).unwrap();
        }
        server.circulate_window(client, ROOT_WINDOW, 0).unwrap();
        assert_eq!(stack(&server), vec![0x0020_0002, 0x0020_0003, 0x0020_0001]);
        server.circulate_window(client, ROOT_WINDOW, 1).unwrap();
        assert_eq!(stack(&server), vec![0x0020_0001, 0x0020_0002, 0x0020_0003]);
        assert_eq!(
            server.circulate_window(client, ROOT_WINDOW, 2).unwrap_err().code,
            ErrorCode::Value
        );
    }

    #[test]
    fn test_reparent_relocates_and_rejects_cycles() {
        let mut server = server();
        let (client, _) = connect(&mut server);
        server
            .create_window(client, params(0x0020_0001, ROOT_WINDOW, 100, 100, 300, 300))
            .unwrap();
        server
            .create_window(client, params(0x0020_0002, ROOT_WINDOW, 0, 0, 50, 50))
            .unwrap();
        server
            .create_window(client, params(0x0020_0003, 0x0020_0002, 1, 1, 5, 5))
            .unwrap();
        server.map_window(client, 0x0020_0002).unwrap();

        server
            .reparent_window(client, 0x0020_0002, 0x0020_0001, 10, 10)
            .unwrap();
        let w = server.registry.window(0x0020_0002).unwrap();
        assert_eq!(w.parent, Some(0x0020_0001));
        assert!(w.mapped);
        assert_eq!(w.outer, Rect::new(110, 110, 50, 50));
        assert_eq!(
            server.registry.window(0x0020_0003).unwrap().outer,
            Rect::new(111, 111, 5, 5)
        );
        assert_eq!(stack(&server), vec![0x0020_0001]);

        let err = server
            .reparent_window(client, 0x0020_0002, 0x0020_0003, 0, 0)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Match);
    }

    #[test]
    fn test_destroy_is_depth_first() {
        let mut server = server();
        let (client, out) = connect(&mut server);
        server
            .create_window(client, params(0x0020_0001, ROOT_WINDOW, 0, 0, 100, 100))
            .unwrap();
        server
            .create_window(client, params(0x0020_0002, 0x0020_0001, 0, 0, 10, 10))
            .unwrap();
        server
            .change_window_attributes(client, ROOT_WINDOW, cw::EVENT_MASK, &[event_mask::SUBSTRUCTURE_NOTIFY])
            .unwrap();
        server
            .change_window_attributes(client, 0x0020_0001, cw::EVENT_MASK, &[event_mask::SUBSTRUCTURE_NOTIFY])
            .unwrap();
        out.take_packets();

        server.destroy_window(0x0020_0001);
        let packets = out.take_packets();
        let destroyed: Vec<u32> = packets
            .iter()
            .filter(|p| p[0] == EventType::DestroyNotify as u8)
            .map(|p| u32::from_le_bytes([p[8], p[9], p[10], p[11]]))
            .collect();
        assert_eq!(destroyed, vec![0x0020_0002, 0x0020_0001]);
        assert!(!server.registry.exists(0x0020_0002));
        assert!(server.registry.window(ROOT_WINDOW).unwrap().children.is_empty());
    }

    #[test]
    fn test_map_redirect_to_other_client() {
        let mut server = server();
        let (wm, wm_out) = connect(&mut server);
        let (app, _) = connect(&mut server);
        server
            .change_window_attributes(wm, ROOT_WINDOW, cw::EVENT_MASK, &[event_mask::SUBSTRUCTURE_REDIRECT])
            .unwrap();
        server
            .create_window(app, params(0x0040_0001, ROOT_WINDOW, 0, 0, 10, 10))
            .unwrap();
        server.map_window(app, 0x0040_0001).unwrap();
        assert!(!server.registry.window(0x0040_0001).unwrap().mapped);
        let packets = wm_out.take_packets();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0][0], EventType::MapRequest as u8);

        // The redirecting client itself maps directly
        server.map_window(wm, 0x0040_0001).unwrap();
        assert!(server.registry.window(0x0040_0001).unwrap().mapped);
    }

    #[test]
    fn test_window_at_and_translate() {
        let mut server = server();
        let (client, _) = connect(&mut server);
        server
            .create_window(client, params(0x0020_0001, ROOT_WINDOW, 10, 10, 100, 100))
            .unwrap();
        server
            .create_window(client, params(0x0020_0002, 0x0020_0001, 20, 20, 10, 10))
            .unwrap();
        server.map_window(client, 0x0020_0001).unwrap();
        assert_eq!(server.window_at(35, 35), 0x0020_0001);
        server.map_window(client, 0x0020_0002).unwrap();
        assert_eq!(server.window_at(35, 35), 0x0020_0002);
        assert_eq!(server.window_at(500, 500), ROOT_WINDOW);

        let (x, y, child) = server.translate_coordinates(ROOT_WINDOW, 0x0020_0001, 35, 36);
        assert_eq!((x, y, child), (25, 26, 0x0020_0002));
        assert_eq!(server.map_state(0x0020_0002), MapState::Viewable);
    }
}
