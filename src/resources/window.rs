//! Window resource state
//!
//! A window owns its children (by id, back to front) and keeps a plain id
//! back-reference to its parent. Geometry is stored as the absolute outer
//! rectangle plus the border width; the inner rectangle is derived so it can
//! never escape the outer one.

use crate::protocol::*;
use crate::server::properties::PropertyMap;
use std::collections::BTreeMap;

/// Bits of the CreateWindow / ChangeWindowAttributes value mask
pub mod cw {
    pub const BACK_PIXMAP: u32 = 1 << 0;
    pub const BACK_PIXEL: u32 = 1 << 1;
    pub const BORDER_PIXMAP: u32 = 1 << 2;
    pub const BORDER_PIXEL: u32 = 1 << 3;
    pub const BIT_GRAVITY: u32 = 1 << 4;
    pub const WIN_GRAVITY: u32 = 1 << 5;
    pub const BACKING_STORE: u32 = 1 << 6;
    pub const BACKING_PLANES: u32 = 1 << 7;
    pub const BACKING_PIXEL: u32 = 1 << 8;
    pub const OVERRIDE_REDIRECT: u32 = 1 << 9;
    pub const SAVE_UNDER: u32 = 1 << 10;
    pub const EVENT_MASK: u32 = 1 << 11;
    pub const DONT_PROPAGATE: u32 = 1 << 12;
    pub const COLORMAP: u32 = 1 << 13;
    pub const CURSOR: u32 = 1 << 14;

    pub const ALL: u32 = (1 << 15) - 1;
}

/// Background or border fill source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    /// No background (contents left alone)
    None,
    /// Copy the parent's fill
    ParentRelative,
    Pixel(u32),
    Pixmap(ResourceId),
}

/// Independently settable window attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowAttributes {
    pub background: Fill,
    pub border: Fill,
    pub bit_gravity: u8,
    pub win_gravity: u8,
    pub backing_store: u8,
    pub backing_planes: u32,
    pub backing_pixel: u32,
    pub override_redirect: bool,
    pub save_under: bool,
    pub do_not_propagate_mask: u32,
    pub colormap: ResourceId,
    pub cursor: ResourceId,
}

impl Default for WindowAttributes {
    fn default() -> Self {
        WindowAttributes {
            background: Fill::None,
            border: Fill::Pixel(0),
            bit_gravity: 0,
            win_gravity: 1, // NorthWest
            backing_store: 0,
            backing_planes: 0xffff_ffff,
            backing_pixel: 0,
            override_redirect: false,
            save_under: false,
            do_not_propagate_mask: 0,
            colormap: NONE,
            cursor: NONE,
        }
    }
}

/// A registered (button-or-key, modifiers) pattern on a window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassiveGrab {
    pub client: ClientId,
    /// Button or keycode; 0 matches any
    pub detail: u8,
    /// Modifier state to match; `ANY_MODIFIER` matches any
    pub modifiers: u16,
    pub owner_events: bool,
    pub event_mask: u32,
    pub pointer_sync: bool,
    pub keyboard_sync: bool,
    pub confine_to: ResourceId,
    pub cursor: ResourceId,
}

impl PassiveGrab {
    pub fn matches(&self, detail: u8, state: u16) -> bool {
        (self.detail == 0 || self.detail == detail)
            && (self.modifiers == modifier_mask::ANY_MODIFIER
                || self.modifiers == state & modifier_mask::KEYS)
    }

    /// True if this grab is covered by an ungrab or regrab of `detail`/`modifiers`
    pub fn overlaps(&self, detail: u8, modifiers: u16) -> bool {
        (detail == 0 || self.detail == detail)
            && (modifiers == modifier_mask::ANY_MODIFIER || self.modifiers == modifiers)
    }
}

#[derive(Debug, Clone)]
pub struct Window {
    pub id: ResourceId,
    pub parent: Option<ResourceId>,
    /// Children in stacking order, bottom first
    pub children: Vec<ResourceId>,
    /// Absolute rectangle including the border
    pub outer: Rect,
    pub border_width: u16,
    pub class: WindowClass,
    pub depth: u8,
    pub visual: u32,
    pub attributes: WindowAttributes,
    /// Event selection of every interested client
    pub event_masks: BTreeMap<ClientId, u32>,
    pub mapped: bool,
    pub properties: PropertyMap,
    pub button_grabs: Vec<PassiveGrab>,
    pub key_grabs: Vec<PassiveGrab>,
}

impl Window {
    /// Create an unmapped window. `outer` is absolute and includes the border.
    pub fn new(
        id: ResourceId,
        parent: Option<ResourceId>,
        outer: Rect,
        border_width: u16,
        class: WindowClass,
        depth: u8,
        visual: u32,
    ) -> Self {
        Window {
            id,
            parent,
            children: Vec::new(),
            outer,
            border_width,
            class,
            depth,
            visual,
            attributes: WindowAttributes::default(),
            event_masks: BTreeMap::new(),
            mapped: false,
            properties: PropertyMap::new(),
            button_grabs: Vec::new(),
            key_grabs: Vec::new(),
        }
    }

    /// Content area: the outer rectangle minus the border
    pub fn inner(&self) -> Rect {
        self.outer.inset(self.border_width as i32)
    }

    pub fn width(&self) -> u16 {
        self.inner().width as u16
    }

    pub fn height(&self) -> u16 {
        self.inner().height as u16
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn input_only(&self) -> bool {
        self.class == WindowClass::InputOnly
    }

    /// Union of every client's selection
    pub fn all_event_masks(&self) -> u32 {
        self.event_masks.values().fold(0, |acc, m| acc | m)
    }

    pub fn event_mask_for(&self, client: ClientId) -> u32 {
        self.event_masks.get(&client).copied().unwrap_or(0)
    }

    /// Clients whose selection intersects `mask`
    pub fn clients_selecting(&self, mask: u32) -> Vec<ClientId> {
        self.event_masks
            .iter()
            .filter(|(_, m)| *m & mask != 0)
            .map(|(c, _)| *c)
            .collect()
    }

    pub fn selects(&self, mask: u32) -> bool {
        self.all_event_masks() & mask != 0
    }

    /// Replace `client`'s selection.
    ///
    /// SubstructureRedirect, ResizeRedirect and ButtonPress can be selected
    /// by one client at a time; a conflicting selection is an Access error.
    pub fn select_events(&mut self, client: ClientId, mask: u32) -> X11Result<()> {
        if mask & !event_mask::ALL != 0 {
            return Err(X11Error::bad_value(mask));
        }
        let exclusive = mask & event_mask::EXCLUSIVE;
        if exclusive != 0 {
            let taken = self
                .event_masks
                .iter()
                .filter(|(c, _)| **c != client)
                .fold(0, |acc, (_, m)| acc | m);
            if taken & exclusive != 0 {
                return Err(X11Error::bad_access());
            }
        }
        if mask == 0 {
            self.event_masks.remove(&client);
        } else {
            self.event_masks.insert(client, mask);
        }
        Ok(())
    }

    /// Forget everything tied to a departed client
    pub fn forget_client(&mut self, client: ClientId) {
        self.event_masks.remove(&client);
        self.button_grabs.retain(|g| g.client != client);
        self.key_grabs.retain(|g| g.client != client);
    }

    /// Position of the top-left outer corner relative to `parent_inner`
    pub fn relative_position(&self, parent_inner: &Rect) -> (i16, i16) {
        (
            (self.outer.x - parent_inner.x) as i16,
            (self.outer.y - parent_inner.y) as i16,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> Window {
        Window::new(
            0x0020_0001,
            Some(3),
            Rect::new(10, 10, 104, 54),
            2,
            WindowClass::InputOutput,
            24,
            0x21,
        )
    }

    #[test]
    fn test_inner_rect_within_outer() {
        let w = window();
        assert_eq!(w.inner(), Rect::new(12, 12, 100, 50));
        assert!(w.outer.contains_rect(&w.inner()));
        assert_eq!(w.width(), 100);
        assert_eq!(w.height(), 50);
    }

    #[test]
    fn test_exclusive_selection() {
        let mut w = window();
        w.select_events(1, event_mask::BUTTON_PRESS).unwrap();
        let err = w.select_events(2, event_mask::BUTTON_PRESS).unwrap_err();
        assert_eq!(err.code, ErrorCode::Access);

        // Non-exclusive events can be shared
        w.select_events(2, event_mask::BUTTON_RELEASE).unwrap();
        assert_eq!(w.clients_selecting(event_mask::BUTTON_RELEASE), vec![2]);

        // Owner can keep reselecting
        w.select_events(1, event_mask::BUTTON_PRESS | event_mask::EXPOSURE)
            .unwrap();
        assert_eq!(
            w.all_event_masks(),
            event_mask::BUTTON_PRESS | event_mask::EXPOSURE | event_mask::BUTTON_RELEASE
        );
    }

    #[test]
    fn test_passive_grab_matching() {
        let grab = PassiveGrab {
            client: 1,
            detail: 0,
            modifiers: modifier_mask::ANY_MODIFIER,
            owner_events: false,
            event_mask: 0,
            pointer_sync: false,
            keyboard_sync: false,
            confine_to: NONE,
            cursor: NONE,
        };
        assert!(grab.matches(3, modifier_mask::SHIFT));

        let exact = PassiveGrab {
            detail: 1,
            modifiers: modifier_mask::CONTROL,
            ..grab
        };
        assert!(exact.matches(1, modifier_mask::CONTROL | modifier_mask::BUTTON2));
        assert!(!exact.matches(1, 0));
        assert!(!exact.matches(2, modifier_mask::CONTROL));
    }
}
