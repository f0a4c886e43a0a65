//! Backend trait definition
//!
//! This module defines the drawing-surface collaborator the server talks to.
//! The server owns the window tree and all protocol state; a backend only
//! mirrors the drawables it is told about and puts pixels on them.
//! Coordinates passed to drawing operations are relative to the drawable.

use crate::protocol::*;
use crate::resources::font::FontMetrics;
use crate::resources::gcontext::gc;
use crate::resources::GContext;
use std::error::Error;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// A window or pixmap, named by its resource id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendDrawable {
    Window(ResourceId),
    Pixmap(ResourceId),
}

impl BackendDrawable {
    pub fn id(&self) -> ResourceId {
        match self {
            BackendDrawable::Window(id) | BackendDrawable::Pixmap(id) => *id,
        }
    }
}

/// Drawing state handed to the backend, taken from a graphics context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendGC {
    pub function: u8,
    pub plane_mask: u32,
    pub foreground: u32,
    pub background: u32,
    pub line_width: u16,
    pub line_style: u8,
    pub cap_style: u8,
    pub join_style: u8,
    pub fill_style: u8,
    pub fill_rule: u8,
    pub arc_mode: u8,
    pub font: FontMetrics,
    pub clip_rectangles: Option<Vec<Rectangle>>,
    pub clip_origin: (i16, i16),
}

impl Default for BackendGC {
    fn default() -> Self {
        BackendGC {
            function: 3,
            plane_mask: 0xffff_ffff,
            foreground: 0,
            background: 0xffffff,
            line_width: 0,
            line_style: 0,
            cap_style: 1,
            join_style: 0,
            fill_style: 0,
            fill_rule: 0,
            arc_mode: 1,
            font: FontMetrics::default(),
            clip_rectangles: None,
            clip_origin: (0, 0),
        }
    }
}

impl BackendGC {
    pub fn from_gc(gcontext: &GContext, font: FontMetrics) -> Self {
        BackendGC {
            function: gcontext.value(gc::FUNCTION) as u8,
            plane_mask: gcontext.value(gc::PLANE_MASK),
            foreground: gcontext.foreground(),
            background: gcontext.background(),
            line_width: gcontext.value(gc::LINE_WIDTH) as u16,
            line_style: gcontext.value(gc::LINE_STYLE) as u8,
            cap_style: gcontext.value(gc::CAP_STYLE) as u8,
            join_style: gcontext.value(gc::JOIN_STYLE) as u8,
            fill_style: gcontext.value(gc::FILL_STYLE) as u8,
            fill_rule: gcontext.value(gc::FILL_RULE) as u8,
            arc_mode: gcontext.value(gc::ARC_MODE) as u8,
            font,
            clip_rectangles: gcontext.clip_rectangles.clone(),
            clip_origin: (
                gcontext.value(gc::CLIP_X_ORIGIN) as i16,
                gcontext.value(gc::CLIP_Y_ORIGIN) as i16,
            ),
        }
    }
}

/// Placement of a window as the backend sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowParams {
    pub parent: ResourceId,
    /// Absolute content rectangle
    pub rect: Rect,
    pub border_width: u16,
    pub background_pixel: Option<u32>,
    pub input_only: bool,
}

/// Overall metrics of a run of text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextExtents {
    pub font_ascent: i16,
    pub font_descent: i16,
    pub overall_ascent: i16,
    pub overall_descent: i16,
    pub overall_width: i32,
    pub overall_left: i32,
    pub overall_right: i32,
}

/// Input reported by the host window system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendEvent {
    /// Pointer moved to absolute root coordinates
    Motion { x: i16, y: i16, time: Timestamp },
    ButtonPress { button: u8, time: Timestamp },
    ButtonRelease { button: u8, time: Timestamp },
    KeyPress { keycode: u8, time: Timestamp },
    KeyRelease { keycode: u8, time: Timestamp },
}

/// The drawing-surface backend
///
/// Window lifecycle calls keep the backend's mirror of the tree current;
/// everything has a no-op default so a backend only implements what it can
/// show. Drawing coordinates are relative to the drawable's origin.
pub trait Backend: Send {
    /// Initialize the backend
    fn init(&mut self) -> BackendResult<()> {
        Ok(())
    }

    // Window operations

    fn create_window(&mut self, id: ResourceId, params: WindowParams) -> BackendResult<()> {
        let _ = (id, params);
        Ok(())
    }

    fn destroy_window(&mut self, id: ResourceId) -> BackendResult<()> {
        let _ = id;
        Ok(())
    }

    fn map_window(&mut self, id: ResourceId) -> BackendResult<()> {
        let _ = id;
        Ok(())
    }

    fn unmap_window(&mut self, id: ResourceId) -> BackendResult<()> {
        let _ = id;
        Ok(())
    }

    /// Window moved, resized or restacked; `rect` is the absolute content area
    fn configure_window(&mut self, id: ResourceId, rect: Rect, border_width: u16) -> BackendResult<()> {
        let _ = (id, rect, border_width);
        Ok(())
    }

    /// Window title changed (WM_NAME)
    fn set_window_title(&mut self, id: ResourceId, title: &str) -> BackendResult<()> {
        let _ = (id, title);
        Ok(())
    }

    // Pixmap operations

    fn create_pixmap(&mut self, id: ResourceId, width: u16, height: u16, depth: u8) -> BackendResult<()> {
        let _ = (id, width, height, depth);
        Ok(())
    }

    fn free_pixmap(&mut self, id: ResourceId) -> BackendResult<()> {
        let _ = id;
        Ok(())
    }

    // Drawing operations

    /// Fill an area of a window with its background
    fn clear_area(&mut self, window: ResourceId, rect: Rectangle, background: Option<u32>) -> BackendResult<()>;

    fn fill_rectangles(
        &mut self,
        drawable: BackendDrawable,
        gc: &BackendGC,
        rectangles: &[Rectangle],
    ) -> BackendResult<()>;

    /// Draw rectangle outlines
    fn draw_rectangles(
        &mut self,
        drawable: BackendDrawable,
        gc: &BackendGC,
        rectangles: &[Rectangle],
    ) -> BackendResult<()> {
        // Default implementation: four segments per rectangle
        let mut segments = Vec::with_capacity(rectangles.len() * 4);
        for r in rectangles {
            let right = r.x.saturating_add(r.width as i16);
            let bottom = r.y.saturating_add(r.height as i16);
            segments.push(Segment { x1: r.x, y1: r.y, x2: right, y2: r.y });
            segments.push(Segment { x1: right, y1: r.y, x2: right, y2: bottom });
            segments.push(Segment { x1: right, y1: bottom, x2: r.x, y2: bottom });
            segments.push(Segment { x1: r.x, y1: bottom, x2: r.x, y2: r.y });
        }
        self.draw_segments(drawable, gc, &segments)
    }

    /// Draw independent line segments
    fn draw_segments(
        &mut self,
        drawable: BackendDrawable,
        gc: &BackendGC,
        segments: &[Segment],
    ) -> BackendResult<()>;

    /// Draw connected lines through absolute points
    fn draw_lines(&mut self, drawable: BackendDrawable, gc: &BackendGC, points: &[Point]) -> BackendResult<()> {
        // Default implementation: draw segments
        let segments: Vec<Segment> = points
            .windows(2)
            .map(|p| Segment {
                x1: p[0].x,
                y1: p[0].y,
                x2: p[1].x,
                y2: p[1].y,
            })
            .collect();
        self.draw_segments(drawable, gc, &segments)
    }

    fn draw_points(&mut self, drawable: BackendDrawable, gc: &BackendGC, points: &[Point]) -> BackendResult<()>;

    fn draw_arcs(&mut self, drawable: BackendDrawable, gc: &BackendGC, arcs: &[Arc]) -> BackendResult<()>;

    fn fill_arcs(&mut self, drawable: BackendDrawable, gc: &BackendGC, arcs: &[Arc]) -> BackendResult<()>;

    fn fill_polygon(&mut self, drawable: BackendDrawable, gc: &BackendGC, points: &[Point]) -> BackendResult<()>;

    /// Copy area from one drawable to another
    #[allow(clippy::too_many_arguments)]
    fn copy_area(
        &mut self,
        src: BackendDrawable,
        dst: BackendDrawable,
        gc: &BackendGC,
        src_x: i16,
        src_y: i16,
        width: u16,
        height: u16,
        dst_x: i16,
        dst_y: i16,
    ) -> BackendResult<()>;

    /// Copy one bit plane of `src`, drawing set bits in the gc foreground
    /// and clear bits in the background. The default copies the area as is.
    #[allow(clippy::too_many_arguments)]
    fn copy_plane(
        &mut self,
        src: BackendDrawable,
        dst: BackendDrawable,
        gc: &BackendGC,
        src_x: i16,
        src_y: i16,
        width: u16,
        height: u16,
        dst_x: i16,
        dst_y: i16,
        bit_plane: u32,
    ) -> BackendResult<()> {
        let _ = bit_plane;
        self.copy_area(src, dst, gc, src_x, src_y, width, height, dst_x, dst_y)
    }

    /// Put image data to a drawable
    ///
    /// # Arguments
    /// * `drawable` - Target window or pixmap
    /// * `gc` - Graphics context (for clipping, etc.)
    /// * `rect` - Destination position and image size
    /// * `depth` - Depth of the image data
    /// * `format` - Bitmap, XYPixmap or ZPixmap
    /// * `data` - Raw image data
    fn put_image(
        &mut self,
        drawable: BackendDrawable,
        gc: &BackendGC,
        rect: Rectangle,
        depth: u8,
        format: ImageFormat,
        data: &[u8],
    ) -> BackendResult<()>;

    /// Get image data from a drawable in the requested format.
    /// ZPixmap data at depth 24 is 4 bytes per pixel.
    fn get_image(
        &mut self,
        drawable: BackendDrawable,
        rect: Rectangle,
        plane_mask: u32,
        format: ImageFormat,
    ) -> BackendResult<Vec<u8>>;

    /// Draw 8- or 16-bit characters with the baseline at `y`.
    /// `image` selects ImageText semantics (background box filled first).
    #[allow(clippy::too_many_arguments)]
    fn draw_text(
        &mut self,
        drawable: BackendDrawable,
        gc: &BackendGC,
        x: i16,
        y: i16,
        text: &[u16],
        image: bool,
    ) -> BackendResult<()>;

    /// Measure a run of characters. The default assumes every glyph has the
    /// font's fixed cell.
    fn text_extents(&self, font: &FontMetrics, text: &[u16]) -> TextExtents {
        let width = font.char_width as i32 * text.len() as i32;
        TextExtents {
            font_ascent: font.ascent,
            font_descent: font.descent,
            overall_ascent: font.ascent,
            overall_descent: font.descent,
            overall_width: width,
            overall_left: 0,
            overall_right: width,
        }
    }

    /// Sound the bell at `percent` (-100..=100) of the base volume
    fn bell(&mut self, percent: i8) -> BackendResult<()> {
        let _ = percent;
        Ok(())
    }

    /// Cursor shown over a window changed (NONE = inherit)
    fn set_window_cursor(&mut self, window: ResourceId, cursor: ResourceId) -> BackendResult<()> {
        let _ = (window, cursor);
        Ok(())
    }

    /// Move the host pointer (WarpPointer)
    fn warp_pointer(&mut self, x: i16, y: i16) -> BackendResult<()> {
        let _ = (x, y);
        Ok(())
    }

    // Event handling

    /// Poll for input from the host. This should not block; return an
    /// empty vec if nothing happened.
    fn poll_events(&mut self) -> BackendResult<Vec<BackendEvent>> {
        Ok(Vec::new())
    }

    /// Flush any pending operations to the display
    fn flush(&mut self) -> BackendResult<()> {
        Ok(())
    }
}

/// Process lifecycle and access-list persistence provided by the host
/// application embedding the server
pub trait HostShell: Send {
    /// Called once the listeners are up
    fn on_start(&mut self, display: u16) {
        let _ = display;
    }

    /// Called when the server shuts down
    fn on_stop(&mut self) {}

    /// Host list persisted from a previous run
    fn load_hosts(&mut self) -> Vec<crate::security::HostEntry> {
        Vec::new()
    }

    /// Persist the host list after a ChangeHosts
    fn save_hosts(&mut self, hosts: &[crate::security::HostEntry]) {
        let _ = hosts;
    }
}
