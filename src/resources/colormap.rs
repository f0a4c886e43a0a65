//! TrueColor colormaps
//!
//! The only visual is 24-bit TrueColor, so every colormap is read-only and a
//! pixel is simply the packed 8-bit components of the requested color.

use crate::protocol::*;

/// Builtin color database (name, 8-bit red, green, blue)
const NAMED_COLORS: &[(&str, u8, u8, u8)] = &[
    ("black", 0, 0, 0),
    ("white", 255, 255, 255),
    ("red", 255, 0, 0),
    ("green", 0, 255, 0),
    ("blue", 0, 0, 255),
    ("yellow", 255, 255, 0),
    ("cyan", 0, 255, 255),
    ("magenta", 255, 0, 255),
    ("gray", 190, 190, 190),
    ("grey", 190, 190, 190),
    ("darkgray", 169, 169, 169),
    ("darkgrey", 169, 169, 169),
    ("lightgray", 211, 211, 211),
    ("lightgrey", 211, 211, 211),
    ("dimgray", 105, 105, 105),
    ("slategray", 112, 128, 144),
    ("orange", 255, 165, 0),
    ("darkorange", 255, 140, 0),
    ("pink", 255, 192, 203),
    ("purple", 160, 32, 240),
    ("violet", 238, 130, 238),
    ("brown", 165, 42, 42),
    ("maroon", 176, 48, 96),
    ("navy", 0, 0, 128),
    ("navyblue", 0, 0, 128),
    ("darkblue", 0, 0, 139),
    ("lightblue", 173, 216, 230),
    ("skyblue", 135, 206, 235),
    ("steelblue", 70, 130, 180),
    ("royalblue", 65, 105, 225),
    ("darkgreen", 0, 100, 0),
    ("forestgreen", 34, 139, 34),
    ("lightgreen", 144, 238, 144),
    ("darkred", 139, 0, 0),
    ("gold", 255, 215, 0),
    ("beige", 245, 245, 220),
    ("wheat", 245, 222, 179),
    ("tan", 210, 180, 140),
    ("khaki", 240, 230, 140),
    ("salmon", 250, 128, 114),
    ("coral", 255, 127, 80),
    ("tomato", 255, 99, 71),
    ("turquoise", 64, 224, 208),
    ("ivory", 255, 255, 240),
    ("lavender", 230, 230, 250),
    ("linen", 250, 240, 230),
    ("snow", 255, 250, 250),
    ("gainsboro", 220, 220, 220),
    ("whitesmoke", 245, 245, 245),
];

/// Look up a color name (case-insensitive, blanks ignored).
/// Components are scaled to 16 bits.
pub fn lookup_named_color(name: &[u8]) -> Option<(u16, u16, u16)> {
    let key: String = name
        .iter()
        .filter(|b| !b.is_ascii_whitespace())
        .map(|b| b.to_ascii_lowercase() as char)
        .collect();
    if let Some(hex) = key.strip_prefix('#') {
        return parse_hex_color(hex);
    }
    NAMED_COLORS
        .iter()
        .find(|(n, ..)| *n == key)
        .map(|&(_, r, g, b)| (scale(r), scale(g), scale(b)))
}

/// `#rgb`, `#rrggbb`, `#rrrgggbbb` and `#rrrrggggbbbb`
fn parse_hex_color(hex: &str) -> Option<(u16, u16, u16)> {
    if hex.is_empty() || hex.len() % 3 != 0 || hex.len() > 12 {
        return None;
    }
    let digits = hex.len() / 3;
    let mut out = [0u16; 3];
    for (i, slot) in out.iter_mut().enumerate() {
        let v = u16::from_str_radix(&hex[i * digits..(i + 1) * digits], 16).ok()?;
        *slot = v << (16 - 4 * digits as u32);
    }
    Some((out[0], out[1], out[2]))
}

fn scale(c: u8) -> u16 {
    c as u16 * 257
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Colormap {
    pub visual: u32,
    /// Window whose screen the colormap is for
    pub window: ResourceId,
    pub installed: bool,
}

impl Colormap {
    pub fn new(visual: u32, window: ResourceId) -> Self {
        Colormap {
            visual,
            window,
            installed: false,
        }
    }

    /// AllocColor: the closest TrueColor pixel and the color it really shows
    pub fn alloc_color(&self, red: u16, green: u16, blue: u16) -> (u32, u16, u16, u16) {
        let pixel = ((red as u32 >> 8) << 16) | ((green as u32 >> 8) << 8) | (blue as u32 >> 8);
        let (r, g, b) = Self::query_pixel(pixel);
        (pixel, r, g, b)
    }

    /// QueryColors for one pixel
    pub fn query_pixel(pixel: u32) -> (u16, u16, u16) {
        (
            scale((pixel >> 16) as u8),
            scale((pixel >> 8) as u8),
            scale(pixel as u8),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_color_rounds_to_visual() {
        let cmap = Colormap::new(0x21, 3);
        let (pixel, r, g, b) = cmap.alloc_color(0xffff, 0x8000, 0x0012);
        assert_eq!(pixel, 0x00ff_8000);
        assert_eq!((r, g, b), (0xffff, 0x8080, 0));
    }

    #[test]
    fn test_named_color_lookup() {
        assert_eq!(lookup_named_color(b"White"), Some((0xffff, 0xffff, 0xffff)));
        assert_eq!(lookup_named_color(b"light gray"), lookup_named_color(b"LightGray"));
        assert_eq!(lookup_named_color(b"#f00"), Some((0xf000, 0, 0)));
        assert_eq!(lookup_named_color(b"#00ff00"), Some((0, 0xff00, 0)));
        assert_eq!(lookup_named_color(b"no such color"), None);
        assert_eq!(lookup_named_color(b"#12"), None);
    }
}
