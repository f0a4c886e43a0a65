//! Cursor resources
//!
//! The server only records what a cursor was built from; showing it is up to
//! the drawing backend.

use crate::protocol::*;

/// 16-bit RGB triple as used by cursor requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub red: u16,
    pub green: u16,
    pub blue: u16,
}

/// Image a cursor was created from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorShape {
    Pixmap {
        source: ResourceId,
        mask: ResourceId,
    },
    Glyph {
        source_font: ResourceId,
        source_char: u16,
        mask_font: ResourceId,
        mask_char: u16,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub shape: CursorShape,
    pub foreground: Rgb,
    pub background: Rgb,
    pub hotspot_x: u16,
    pub hotspot_y: u16,
}

impl Cursor {
    /// The server's default cursor (left pointer glyph of the cursor font)
    pub fn default_cursor(font: ResourceId) -> Self {
        Cursor {
            shape: CursorShape::Glyph {
                source_font: font,
                source_char: 68,
                mask_font: font,
                mask_char: 69,
            },
            foreground: Rgb::default(),
            background: Rgb {
                red: 0xffff,
                green: 0xffff,
                blue: 0xffff,
            },
            hotspot_x: 0,
            hotspot_y: 0,
        }
    }

    pub fn recolor(&mut self, foreground: Rgb, background: Rgb) {
        self.foreground = foreground;
        self.background = background;
    }
}
