//! Null Backend - Minimal backend for testing
//!
//! This backend accepts all commands but doesn't perform any actual rendering.
//! It's useful for testing the protocol implementation without requiring a
//! real display system. An optional call log records the name of every
//! operation it receives.

use super::*;
use crate::protocol::*;
use std::sync::{Mutex, PoisonError};

/// Shared record of backend calls
pub type CallLog = std::sync::Arc<Mutex<Vec<String>>>;

#[derive(Default)]
pub struct NullBackend {
    log: Option<CallLog>,
}

impl NullBackend {
    pub fn new() -> Self {
        Self { log: None }
    }

    /// Record every call into `log`
    pub fn with_log(log: CallLog) -> Self {
        Self { log: Some(log) }
    }

    fn record(&self, call: impl Into<String>) {
        if let Some(log) = &self.log {
            log.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(call.into());
        }
    }
}

impl Backend for NullBackend {
    fn create_window(&mut self, id: ResourceId, _params: WindowParams) -> BackendResult<()> {
        self.record(format!("create_window {:#x}", id));
        Ok(())
    }

    fn destroy_window(&mut self, id: ResourceId) -> BackendResult<()> {
        self.record(format!("destroy_window {:#x}", id));
        Ok(())
    }

    fn clear_area(&mut self, window: ResourceId, _rect: Rectangle, _background: Option<u32>) -> BackendResult<()> {
        self.record(format!("clear_area {:#x}", window));
        Ok(())
    }

    fn fill_rectangles(
        &mut self,
        drawable: BackendDrawable,
        _gc: &BackendGC,
        rectangles: &[Rectangle],
    ) -> BackendResult<()> {
        self.record(format!("fill_rectangles {:#x} {}", drawable.id(), rectangles.len()));
        Ok(())
    }

    fn draw_segments(
        &mut self,
        drawable: BackendDrawable,
        _gc: &BackendGC,
        segments: &[Segment],
    ) -> BackendResult<()> {
        self.record(format!("draw_segments {:#x} {}", drawable.id(), segments.len()));
        Ok(())
    }

    fn draw_points(&mut self, drawable: BackendDrawable, _gc: &BackendGC, points: &[Point]) -> BackendResult<()> {
        self.record(format!("draw_points {:#x} {}", drawable.id(), points.len()));
        Ok(())
    }

    fn draw_arcs(&mut self, drawable: BackendDrawable, _gc: &BackendGC, arcs: &[Arc]) -> BackendResult<()> {
        self.record(format!("draw_arcs {:#x} {}", drawable.id(), arcs.len()));
        Ok(())
    }

    fn fill_arcs(&mut self, drawable: BackendDrawable, _gc: &BackendGC, arcs: &[Arc]) -> BackendResult<()> {
        self.record(format!("fill_arcs {:#x} {}", drawable.id(), arcs.len()));
        Ok(())
    }

    fn fill_polygon(&mut self, drawable: BackendDrawable, _gc: &BackendGC, points: &[Point]) -> BackendResult<()> {
        self.record(format!("fill_polygon {:#x} {}", drawable.id(), points.len()));
        Ok(())
    }

    fn copy_area(
        &mut self,
        src: BackendDrawable,
        dst: BackendDrawable,
        _gc: &BackendGC,
        _src_x: i16,
        _src_y: i16,
        _width: u16,
        _height: u16,
        _dst_x: i16,
        _dst_y: i16,
    ) -> BackendResult<()> {
        self.record(format!("copy_area {:#x} {:#x}", src.id(), dst.id()));
        Ok(())
    }

    fn put_image(
        &mut self,
        drawable: BackendDrawable,
        _gc: &BackendGC,
        _rect: Rectangle,
        _depth: u8,
        _format: ImageFormat,
        data: &[u8],
    ) -> BackendResult<()> {
        self.record(format!("put_image {:#x} {}", drawable.id(), data.len()));
        Ok(())
    }

    fn get_image(
        &mut self,
        drawable: BackendDrawable,
        rect: Rectangle,
        _plane_mask: u32,
        format: ImageFormat,
    ) -> BackendResult<Vec<u8>> {
        self.record(format!("get_image {:#x}", drawable.id()));
        let pixels = rect.width as usize * rect.height as usize;
        let size = match format {
            ImageFormat::ZPixmap => pixels * 4,
            // One bit per pixel per plane, rows padded to 32 bits
            ImageFormat::Bitmap | ImageFormat::XYPixmap => {
                let row = (rect.width as usize).div_ceil(32) * 4;
                row * rect.height as usize * if format == ImageFormat::XYPixmap { 24 } else { 1 }
            }
        };
        Ok(vec![0; size])
    }

    fn draw_text(
        &mut self,
        drawable: BackendDrawable,
        _gc: &BackendGC,
        _x: i16,
        _y: i16,
        text: &[u16],
        image: bool,
    ) -> BackendResult<()> {
        let op = if image { "image_text" } else { "poly_text" };
        self.record(format!("{} {:#x} {}", op, drawable.id(), text.len()));
        Ok(())
    }

    fn bell(&mut self, percent: i8) -> BackendResult<()> {
        self.record(format!("bell {}", percent));
        Ok(())
    }
}

/// Host shell that does nothing and persists nothing
#[derive(Debug, Default)]
pub struct NullShell;

impl HostShell for NullShell {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::font::FontMetrics;

    #[test]
    fn test_call_log() {
        let log = CallLog::default();
        let mut backend = NullBackend::with_log(log.clone());
        backend.bell(50).unwrap();
        backend
            .fill_rectangles(
                BackendDrawable::Window(3),
                &BackendGC::default(),
                &[Rectangle::new(0, 0, 1, 1)],
            )
            .unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["bell 50", "fill_rectangles 0x3 1"]);
    }

    #[test]
    fn test_get_image_size() {
        let mut backend = NullBackend::new();
        let data = backend
            .get_image(
                BackendDrawable::Pixmap(0x0020_0001),
                Rectangle::new(0, 0, 10, 2),
                !0,
                ImageFormat::ZPixmap,
            )
            .unwrap();
        assert_eq!(data.len(), 80);
    }

    #[test]
    fn test_default_text_extents() {
        let backend = NullBackend::new();
        let ext = backend.text_extents(&FontMetrics::default(), &[b'h' as u16, b'i' as u16]);
        assert_eq!(ext.overall_width, 16);
        assert_eq!(ext.font_ascent, 12);
    }
}
