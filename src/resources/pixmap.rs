//! Off-screen drawables

use crate::protocol::*;

/// Depths a pixmap may be created with (the root depth and bitmaps)
pub const SUPPORTED_DEPTHS: [u8; 2] = [1, 24];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pixmap {
    pub width: u16,
    pub height: u16,
    pub depth: u8,
    /// Root window of the screen the pixmap belongs to
    pub root: ResourceId,
}

impl Pixmap {
    /// Validate CreatePixmap parameters
    pub fn new(width: u16, height: u16, depth: u8, root: ResourceId) -> X11Result<Self> {
        if width == 0 {
            return Err(X11Error::bad_value(width as u32));
        }
        if height == 0 {
            return Err(X11Error::bad_value(height as u32));
        }
        if !SUPPORTED_DEPTHS.contains(&depth) {
            return Err(X11Error::bad_value(depth as u32));
        }
        Ok(Pixmap {
            width,
            height,
            depth,
            root,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixmap_validation() {
        assert!(Pixmap::new(16, 16, 24, 3).is_ok());
        assert!(Pixmap::new(16, 16, 1, 3).is_ok());
        assert_eq!(Pixmap::new(0, 16, 24, 3).unwrap_err().code, ErrorCode::Value);
        assert_eq!(Pixmap::new(16, 16, 8, 3).unwrap_err().bad_value, 8);
    }
}
