//! Graphics contexts
//!
//! A GC is a bag of 23 drawing components addressed by bit position in the
//! CreateGC / ChangeGC value mask. Values are kept as raw 32-bit words; the
//! backend interprets them when drawing.

use crate::protocol::*;

/// Component indexes, matching the value-mask bit positions
pub mod gc {
    pub const FUNCTION: usize = 0;
    pub const PLANE_MASK: usize = 1;
    pub const FOREGROUND: usize = 2;
    pub const BACKGROUND: usize = 3;
    pub const LINE_WIDTH: usize = 4;
    pub const LINE_STYLE: usize = 5;
    pub const CAP_STYLE: usize = 6;
    pub const JOIN_STYLE: usize = 7;
    pub const FILL_STYLE: usize = 8;
    pub const FILL_RULE: usize = 9;
    pub const TILE: usize = 10;
    pub const STIPPLE: usize = 11;
    pub const TILE_STIPPLE_X_ORIGIN: usize = 12;
    pub const TILE_STIPPLE_Y_ORIGIN: usize = 13;
    pub const FONT: usize = 14;
    pub const SUBWINDOW_MODE: usize = 15;
    pub const GRAPHICS_EXPOSURES: usize = 16;
    pub const CLIP_X_ORIGIN: usize = 17;
    pub const CLIP_Y_ORIGIN: usize = 18;
    pub const CLIP_MASK: usize = 19;
    pub const DASH_OFFSET: usize = 20;
    pub const DASHES: usize = 21;
    pub const ARC_MODE: usize = 22;

    pub const COUNT: usize = 23;
    pub const ALL: u32 = (1 << COUNT) - 1;
}

/// Largest legal value of each enumerated component; `None` for free-form
/// words that are checked elsewhere (or not at all).
fn max_value(index: usize) -> Option<u32> {
    match index {
        gc::FUNCTION => Some(15),
        gc::LINE_WIDTH | gc::DASH_OFFSET => Some(0xffff),
        gc::LINE_STYLE | gc::JOIN_STYLE => Some(2),
        gc::CAP_STYLE | gc::FILL_STYLE => Some(3),
        gc::FILL_RULE | gc::SUBWINDOW_MODE | gc::GRAPHICS_EXPOSURES | gc::ARC_MODE => Some(1),
        gc::DASHES => Some(255),
        _ => None,
    }
}

fn is_int16(index: usize) -> bool {
    matches!(
        index,
        gc::TILE_STIPPLE_X_ORIGIN | gc::TILE_STIPPLE_Y_ORIGIN | gc::CLIP_X_ORIGIN | gc::CLIP_Y_ORIGIN
    )
}

/// Components decoded from a value list, in mask order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcValues {
    pub entries: Vec<(usize, u32)>,
}

impl GcValues {
    /// Read one word per set mask bit and range-check it
    pub fn parse(mask: u32, body: &mut RequestBody<'_>) -> X11Result<Self> {
        if mask & !gc::ALL != 0 {
            return Err(X11Error::bad_value(mask));
        }
        if body.remaining() != mask.count_ones() as usize * 4 {
            return Err(X11Error::bad_length());
        }
        let mut entries = Vec::new();
        for index in 0..gc::COUNT {
            if mask & (1 << index) == 0 {
                continue;
            }
            let raw = body.read_u32()?;
            let value = if is_int16(index) {
                raw as u16 as i16 as i32 as u32
            } else {
                raw
            };
            if let Some(max) = max_value(index) {
                if value > max {
                    return Err(X11Error::bad_value(value));
                }
            }
            if index == gc::DASHES && value == 0 {
                return Err(X11Error::bad_value(value));
            }
            entries.push((index, value));
        }
        Ok(GcValues { entries })
    }

    pub fn get(&self, index: usize) -> Option<u32> {
        self.entries
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, v)| *v)
    }

    /// Pixmap ids this list refers to (tile, stipple, non-None clip mask)
    pub fn pixmaps(&self) -> Vec<ResourceId> {
        self.entries
            .iter()
            .filter(|(i, v)| match *i {
                gc::TILE | gc::STIPPLE => true,
                gc::CLIP_MASK => *v != NONE,
                _ => false,
            })
            .map(|(_, v)| *v)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GContext {
    /// Drawable the GC was created for; determines its depth
    pub drawable: ResourceId,
    pub depth: u8,
    values: [u32; gc::COUNT],
    /// Dash list set by SetDashes, or `[dashes; 2]` after ChangeGC
    pub dash_list: Vec<u8>,
    /// Clip rectangles set by SetClipRectangles; cleared by a clip mask
    pub clip_rectangles: Option<Vec<Rectangle>>,
    pub clip_ordering: u8,
}

impl GContext {
    pub fn new(drawable: ResourceId, depth: u8, default_font: ResourceId) -> Self {
        let mut values = [0u32; gc::COUNT];
        values[gc::FUNCTION] = 3; // Copy
        values[gc::PLANE_MASK] = 0xffff_ffff;
        values[gc::BACKGROUND] = 1;
        values[gc::CAP_STYLE] = 1; // Butt
        values[gc::FONT] = default_font;
        values[gc::GRAPHICS_EXPOSURES] = 1;
        values[gc::DASHES] = 4;
        values[gc::ARC_MODE] = 1; // PieSlice
        GContext {
            drawable,
            depth,
            values,
            dash_list: vec![4, 4],
            clip_rectangles: None,
            clip_ordering: 0,
        }
    }

    pub fn value(&self, index: usize) -> u32 {
        self.values.get(index).copied().unwrap_or(0)
    }

    pub fn foreground(&self) -> u32 {
        self.values[gc::FOREGROUND]
    }

    pub fn background(&self) -> u32 {
        self.values[gc::BACKGROUND]
    }

    pub fn font(&self) -> ResourceId {
        self.values[gc::FONT]
    }

    pub fn graphics_exposures(&self) -> bool {
        self.values[gc::GRAPHICS_EXPOSURES] != 0
    }

    /// Store already validated components
    pub fn apply(&mut self, values: &GcValues) {
        for &(index, value) in &values.entries {
            self.values[index] = value;
            match index {
                gc::DASHES => self.dash_list = vec![value as u8, value as u8],
                gc::CLIP_MASK => self.clip_rectangles = None,
                _ => {}
            }
        }
    }

    /// CopyGC: take the components selected by `mask` from `src`
    pub fn copy_from(&mut self, src: &GContext, mask: u32) -> X11Result<()> {
        if mask & !gc::ALL != 0 {
            return Err(X11Error::bad_value(mask));
        }
        if src.depth != self.depth {
            return Err(X11Error::bad_match());
        }
        for index in 0..gc::COUNT {
            if mask & (1 << index) == 0 {
                continue;
            }
            self.values[index] = src.values[index];
            match index {
                gc::DASHES => self.dash_list = src.dash_list.clone(),
                gc::CLIP_MASK => {
                    self.clip_rectangles = src.clip_rectangles.clone();
                    self.clip_ordering = src.clip_ordering;
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn set_dashes(&mut self, offset: u16, dashes: &[u8]) -> X11Result<()> {
        if dashes.is_empty() || dashes.contains(&0) {
            return Err(X11Error::bad_value(0));
        }
        self.values[gc::DASH_OFFSET] = offset as u32;
        self.dash_list = dashes.to_vec();
        Ok(())
    }

    pub fn set_clip_rectangles(
        &mut self,
        x: i16,
        y: i16,
        ordering: u8,
        rectangles: Vec<Rectangle>,
    ) -> X11Result<()> {
        if ordering > 3 {
            return Err(X11Error::bad_value(ordering as u32));
        }
        self.values[gc::CLIP_X_ORIGIN] = x as i32 as u32;
        self.values[gc::CLIP_Y_ORIGIN] = y as i32 as u32;
        self.values[gc::CLIP_MASK] = NONE;
        self.clip_ordering = ordering;
        self.clip_rectangles = Some(rectangles);
        Ok(())
    }
}
