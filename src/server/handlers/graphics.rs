//! Pixmaps, graphics contexts and drawing requests
//!
//! Drawing requests resolve their drawable and gc into the backend's view of
//! them and hand the decoded primitives over unchanged. The backend failing
//! to draw is logged and otherwise ignored; the client has no way to react
//! to it.

use super::{bool_field, char2b, log_backend, read_arcs, read_points, read_rectangles, read_segments};
use crate::backend::{BackendDrawable, BackendGC};
use crate::protocol::*;
use crate::resources::gcontext::{gc, GcValues};
use crate::resources::server_ids::DEFAULT_FONT;
use crate::resources::{DrawableInfo, GContext, Pixmap, ResourceData};
use crate::server::{Request, Server};

/// A drawable and gc resolved for the backend
struct Target {
    drawable: BackendDrawable,
    gc: BackendGC,
    info: DrawableInfo,
}

fn backend_drawable(info: &DrawableInfo) -> BackendDrawable {
    if info.is_window {
        BackendDrawable::Window(info.id)
    } else {
        BackendDrawable::Pixmap(info.id)
    }
}

fn target(server: &Server, drawable: ResourceId, gc_id: ResourceId) -> X11Result<Target> {
    let info = server.registry.drawable(drawable)?;
    let gcontext = server.registry.gcontext(gc_id)?;
    if info.is_window && server.registry.window(drawable)?.input_only() {
        return Err(X11Error::bad_match());
    }
    if gcontext.depth != info.depth {
        return Err(X11Error::bad_match());
    }
    let font = server
        .registry
        .font(gcontext.font())
        .map(|f| f.metrics)
        .unwrap_or_default();
    Ok(Target {
        drawable: backend_drawable(&info),
        gc: BackendGC::from_gc(gcontext, font),
        info,
    })
}

/// Read the drawable and gc ids every drawing request starts with
fn read_ids(req: &mut Request<'_>) -> X11Result<(ResourceId, ResourceId)> {
    Ok((req.body.read_u32()?, req.body.read_u32()?))
}

/// CoordMode Previous makes every point after the first relative to its
/// predecessor
fn absolute_points(mode: u8, mut points: Vec<Point>) -> X11Result<Vec<Point>> {
    match mode {
        0 => {}
        1 => {
            for i in 1..points.len() {
                points[i].x = points[i].x.wrapping_add(points[i - 1].x);
                points[i].y = points[i].y.wrapping_add(points[i - 1].y);
            }
        }
        m => return Err(X11Error::bad_value(m as u32)),
    }
    Ok(points)
}

/// Tile must match the gc depth, stipple and clip mask must be bitmaps and
/// the font must exist
fn check_gc_values(server: &Server, values: &GcValues, depth: u8) -> X11Result<()> {
    for id in values.pixmaps() {
        server.registry.pixmap(id)?;
    }
    if let Some(tile) = values.get(gc::TILE) {
        if server.registry.pixmap(tile)?.depth != depth {
            return Err(X11Error::bad_match());
        }
    }
    for index in [gc::STIPPLE, gc::CLIP_MASK] {
        if let Some(id) = values.get(index).filter(|id| *id != NONE) {
            if server.registry.pixmap(id)?.depth != 1 {
                return Err(X11Error::bad_match());
            }
        }
    }
    if let Some(font) = values.get(gc::FONT) {
        server.registry.font(font)?;
    }
    Ok(())
}

/// Bytes of image data for a `width` x `height` image. Scanlines are padded
/// to 32 bits; ZPixmap at depth 24 carries 32 bits per pixel.
fn image_size(format: ImageFormat, depth: u8, width: u16, height: u16, left_pad: u8) -> usize {
    let height = height as usize;
    let bitmap_row = (width as usize + left_pad as usize).div_ceil(32) * 4;
    match format {
        ImageFormat::Bitmap => bitmap_row * height,
        ImageFormat::XYPixmap => bitmap_row * height * depth as usize,
        ImageFormat::ZPixmap if depth == 1 => bitmap_row * height,
        ImageFormat::ZPixmap => width as usize * 4 * height,
    }
}

/// Parts of the copied source area that lie outside the source drawable,
/// moved to destination coordinates
fn unavailable_regions(
    source: &DrawableInfo,
    src_x: i16,
    src_y: i16,
    width: u16,
    height: u16,
    dst_x: i16,
    dst_y: i16,
) -> Vec<Rectangle> {
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let area = Rect::new(src_x as i32, src_y as i32, width as i32, height as i32);
    let left = area.x.max(0);
    let top = area.y.max(0);
    let right = area.right().min(source.width as i32);
    let bottom = area.bottom().min(source.height as i32);

    let mut strips = Vec::new();
    if left >= right || top >= bottom {
        strips.push(area);
    } else {
        if area.y < top {
            strips.push(Rect::new(area.x, area.y, area.width, top - area.y));
        }
        if bottom < area.bottom() {
            strips.push(Rect::new(area.x, bottom, area.width, area.bottom() - bottom));
        }
        if area.x < left {
            strips.push(Rect::new(area.x, top, left - area.x, bottom - top));
        }
        if right < area.right() {
            strips.push(Rect::new(right, top, area.right() - right, bottom - top));
        }
    }
    let (dx, dy) = (dst_x as i32 - src_x as i32, dst_y as i32 - src_y as i32);
    strips
        .into_iter()
        .map(|r| Rectangle::new((r.x + dx) as i16, (r.y + dy) as i16, r.width as u16, r.height as u16))
        .collect()
}

/// GraphicsExposure for every unavailable region, or one NoExposure
fn send_copy_exposures(
    server: &Server,
    client: ClientId,
    gc_id: ResourceId,
    drawable: ResourceId,
    regions: &[Rectangle],
    major_opcode: u8,
) {
    let wanted = server
        .registry
        .gcontext(gc_id)
        .map_or(false, GContext::graphics_exposures);
    if !wanted {
        return;
    }
    if regions.is_empty() {
        server.send_event(
            client,
            &Event::NoExposure(NoExposureEvent {
                drawable,
                minor_opcode: 0,
                major_opcode,
            }),
        );
        return;
    }
    for (i, r) in regions.iter().enumerate() {
        server.send_event(
            client,
            &Event::GraphicsExposure(GraphicsExposureEvent {
                drawable,
                x: r.x.max(0) as u16,
                y: r.y.max(0) as u16,
                width: r.width,
                height: r.height,
                minor_opcode: 0,
                count: (regions.len() - i - 1) as u16,
                major_opcode,
            }),
        );
    }
}

pub fn handle_create_pixmap(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let pid = req.body.read_u32()?;
    let drawable = req.body.read_u32()?;
    let width = req.body.read_u16()?;
    let height = req.body.read_u16()?;
    let depth = req.detail;
    server.registry.validate_new_id(pid, req.client)?;
    server.registry.drawable(drawable)?;
    let pixmap = Pixmap::new(width, height, depth, server.root())?;
    server
        .registry
        .create(pid, req.client, ResourceData::Pixmap(pixmap))?;
    log_backend(
        "create_pixmap",
        server.backend.create_pixmap(pid, width, height, depth),
    );
    Ok(())
}

pub fn handle_free_pixmap(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let pid = req.body.read_u32()?;
    server.registry.pixmap(pid)?;
    server.free_resource(pid);
    Ok(())
}

pub fn handle_create_gc(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let cid = req.body.read_u32()?;
    let drawable = req.body.read_u32()?;
    let mask = req.body.read_u32()?;
    server.registry.validate_new_id(cid, req.client)?;
    let info = server.registry.drawable(drawable)?;
    let values = GcValues::parse(mask, &mut req.body)?;
    check_gc_values(server, &values, info.depth)?;
    let mut gcontext = GContext::new(drawable, info.depth, DEFAULT_FONT);
    gcontext.apply(&values);
    server
        .registry
        .create(cid, req.client, ResourceData::GContext(gcontext))
}

pub fn handle_change_gc(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let gc_id = req.body.read_u32()?;
    let mask = req.body.read_u32()?;
    let depth = server.registry.gcontext(gc_id)?.depth;
    let values = GcValues::parse(mask, &mut req.body)?;
    check_gc_values(server, &values, depth)?;
    server.registry.gcontext_mut(gc_id)?.apply(&values);
    Ok(())
}

pub fn handle_copy_gc(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let src = req.body.read_u32()?;
    let dst = req.body.read_u32()?;
    let mask = req.body.read_u32()?;
    let source = server.registry.gcontext(src)?.clone();
    server.registry.gcontext_mut(dst)?.copy_from(&source, mask)
}

pub fn handle_set_dashes(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let gc_id = req.body.read_u32()?;
    let offset = req.body.read_u16()?;
    let count = req.body.read_u16()? as usize;
    let dashes = req.body.read_bytes(count)?;
    server.registry.gcontext_mut(gc_id)?.set_dashes(offset, dashes)
}

pub fn handle_set_clip_rectangles(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let gc_id = req.body.read_u32()?;
    let x = req.body.read_i16()?;
    let y = req.body.read_i16()?;
    let rectangles = read_rectangles(&mut req.body)?;
    server
        .registry
        .gcontext_mut(gc_id)?
        .set_clip_rectangles(x, y, req.detail, rectangles)
}

pub fn handle_free_gc(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let gc_id = req.body.read_u32()?;
    server.registry.gcontext(gc_id)?;
    server.free_resource(gc_id);
    Ok(())
}

/// A zero width or height extends to the window's far edge
pub fn handle_clear_area(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let exposures = bool_field(req.detail)?;
    let window = req.body.read_u32()?;
    let x = req.body.read_i16()?;
    let y = req.body.read_i16()?;
    let width = req.body.read_u16()?;
    let height = req.body.read_u16()?;

    let w = server.registry.window(window)?;
    if w.input_only() {
        return Err(X11Error::bad_match());
    }
    let inner = w.inner();
    let width = match width {
        0 => (inner.width - x as i32).clamp(0, u16::MAX as i32) as u16,
        w => w,
    };
    let height = match height {
        0 => (inner.height - y as i32).clamp(0, u16::MAX as i32) as u16,
        h => h,
    };
    if width == 0 || height == 0 {
        return Ok(());
    }
    let rect = Rectangle::new(x, y, width, height);
    if exposures && server.is_viewable(window) {
        server.expose_area(window, rect);
    } else {
        let background = server.background_pixel(window);
        log_backend("clear_area", server.backend.clear_area(window, rect, background));
    }
    Ok(())
}

pub fn handle_copy_area(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let src = req.body.read_u32()?;
    let dst = req.body.read_u32()?;
    let gc_id = req.body.read_u32()?;
    let src_x = req.body.read_i16()?;
    let src_y = req.body.read_i16()?;
    let dst_x = req.body.read_i16()?;
    let dst_y = req.body.read_i16()?;
    let width = req.body.read_u16()?;
    let height = req.body.read_u16()?;

    let source = server.registry.drawable(src)?;
    let t = target(server, dst, gc_id)?;
    if source.depth != t.info.depth {
        return Err(X11Error::bad_match());
    }
    log_backend(
        "copy_area",
        server.backend.copy_area(
            backend_drawable(&source),
            t.drawable,
            &t.gc,
            src_x,
            src_y,
            width,
            height,
            dst_x,
            dst_y,
        ),
    );
    let regions = unavailable_regions(&source, src_x, src_y, width, height, dst_x, dst_y);
    send_copy_exposures(server, req.client, gc_id, dst, &regions, req.opcode as u8);
    Ok(())
}

pub fn handle_copy_plane(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let src = req.body.read_u32()?;
    let dst = req.body.read_u32()?;
    let gc_id = req.body.read_u32()?;
    let src_x = req.body.read_i16()?;
    let src_y = req.body.read_i16()?;
    let dst_x = req.body.read_i16()?;
    let dst_y = req.body.read_i16()?;
    let width = req.body.read_u16()?;
    let height = req.body.read_u16()?;
    let bit_plane = req.body.read_u32()?;

    let source = server.registry.drawable(src)?;
    let t = target(server, dst, gc_id)?;
    if bit_plane.count_ones() != 1 || (bit_plane as u64) >> source.depth != 0 {
        return Err(X11Error::bad_value(bit_plane));
    }
    log_backend(
        "copy_plane",
        server.backend.copy_plane(
            backend_drawable(&source),
            t.drawable,
            &t.gc,
            src_x,
            src_y,
            width,
            height,
            dst_x,
            dst_y,
            bit_plane,
        ),
    );
    let regions = unavailable_regions(&source, src_x, src_y, width, height, dst_x, dst_y);
    send_copy_exposures(server, req.client, gc_id, dst, &regions, req.opcode as u8);
    Ok(())
}

pub fn handle_poly_point(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let (drawable, gc_id) = read_ids(req)?;
    let points = absolute_points(req.detail, read_points(&mut req.body)?)?;
    let t = target(server, drawable, gc_id)?;
    if !points.is_empty() {
        log_backend("draw_points", server.backend.draw_points(t.drawable, &t.gc, &points));
    }
    Ok(())
}

pub fn handle_poly_line(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let (drawable, gc_id) = read_ids(req)?;
    let points = absolute_points(req.detail, read_points(&mut req.body)?)?;
    let t = target(server, drawable, gc_id)?;
    if !points.is_empty() {
        log_backend("draw_lines", server.backend.draw_lines(t.drawable, &t.gc, &points));
    }
    Ok(())
}

pub fn handle_poly_segment(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let (drawable, gc_id) = read_ids(req)?;
    let segments = read_segments(&mut req.body)?;
    let t = target(server, drawable, gc_id)?;
    if !segments.is_empty() {
        log_backend("draw_segments", server.backend.draw_segments(t.drawable, &t.gc, &segments));
    }
    Ok(())
}

pub fn handle_poly_rectangle(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let (drawable, gc_id) = read_ids(req)?;
    let rectangles = read_rectangles(&mut req.body)?;
    let t = target(server, drawable, gc_id)?;
    if !rectangles.is_empty() {
        log_backend(
            "draw_rectangles",
            server.backend.draw_rectangles(t.drawable, &t.gc, &rectangles),
        );
    }
    Ok(())
}

pub fn handle_poly_arc(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let (drawable, gc_id) = read_ids(req)?;
    let arcs = read_arcs(&mut req.body)?;
    let t = target(server, drawable, gc_id)?;
    if !arcs.is_empty() {
        log_backend("draw_arcs", server.backend.draw_arcs(t.drawable, &t.gc, &arcs));
    }
    Ok(())
}

pub fn handle_fill_poly(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let (drawable, gc_id) = read_ids(req)?;
    let shape = req.body.read_u8()?;
    let mode = req.body.read_u8()?;
    req.body.skip(2)?;
    if shape > 2 {
        return Err(X11Error::bad_value(shape as u32));
    }
    let points = absolute_points(mode, read_points(&mut req.body)?)?;
    let t = target(server, drawable, gc_id)?;
    if points.len() >= 3 {
        log_backend("fill_polygon", server.backend.fill_polygon(t.drawable, &t.gc, &points));
    }
    Ok(())
}

pub fn handle_poly_fill_rectangle(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let (drawable, gc_id) = read_ids(req)?;
    let rectangles = read_rectangles(&mut req.body)?;
    let t = target(server, drawable, gc_id)?;
    if !rectangles.is_empty() {
        log_backend(
            "fill_rectangles",
            server.backend.fill_rectangles(t.drawable, &t.gc, &rectangles),
        );
    }
    Ok(())
}

pub fn handle_poly_fill_arc(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let (drawable, gc_id) = read_ids(req)?;
    let arcs = read_arcs(&mut req.body)?;
    let t = target(server, drawable, gc_id)?;
    if !arcs.is_empty() {
        log_backend("fill_arcs", server.backend.fill_arcs(t.drawable, &t.gc, &arcs));
    }
    Ok(())
}

pub fn handle_put_image(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let format = ImageFormat::from_u8(req.detail).ok_or(X11Error::bad_value(req.detail as u32))?;
    let (drawable, gc_id) = read_ids(req)?;
    let width = req.body.read_u16()?;
    let height = req.body.read_u16()?;
    let dst_x = req.body.read_i16()?;
    let dst_y = req.body.read_i16()?;
    let left_pad = req.body.read_u8()?;
    let depth = req.body.read_u8()?;
    req.body.skip(2)?;
    let data = req.body.rest();

    let t = target(server, drawable, gc_id)?;
    let depth_ok = match format {
        ImageFormat::Bitmap => depth == 1,
        _ => depth == t.info.depth,
    };
    if !depth_ok || left_pad >= 32 || (format == ImageFormat::ZPixmap && left_pad != 0) {
        return Err(X11Error::bad_match());
    }
    let size = image_size(format, depth, width, height, left_pad);
    if data.len() < size {
        return Err(X11Error::bad_length());
    }
    log_backend(
        "put_image",
        server.backend.put_image(
            t.drawable,
            &t.gc,
            Rectangle::new(dst_x, dst_y, width, height),
            depth,
            format,
            &data[..size],
        ),
    );
    Ok(())
}

/// Largest GetImage reply the server will build
const MAX_IMAGE_REPLY: usize = 64 << 20;

/// The area must lie inside the drawable; window contents are only
/// defined while it is viewable
pub fn handle_get_image(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let format = match req.detail {
        1 => ImageFormat::XYPixmap,
        2 => ImageFormat::ZPixmap,
        f => return Err(X11Error::bad_value(f as u32)),
    };
    let drawable = req.body.read_u32()?;
    let x = req.body.read_i16()?;
    let y = req.body.read_i16()?;
    let width = req.body.read_u16()?;
    let height = req.body.read_u16()?;
    let plane_mask = req.body.read_u32()?;

    let info = server.registry.drawable(drawable)?;
    let inside = x >= 0
        && y >= 0
        && x as i32 + width as i32 <= info.width as i32
        && y as i32 + height as i32 <= info.height as i32;
    if !inside || (info.is_window && !server.is_viewable(drawable)) {
        return Err(X11Error::bad_match());
    }
    let visual = match server.registry.window(drawable) {
        Ok(w) => w.visual,
        Err(_) => NONE,
    };
    let size = match format {
        ImageFormat::XYPixmap => {
            let depth_mask = if info.depth >= 32 { !0 } else { (1u32 << info.depth) - 1 };
            let planes = (plane_mask & depth_mask).count_ones() as u8;
            image_size(format, planes, width, height, 0)
        }
        _ => image_size(format, info.depth, width, height, 0),
    };
    if size > MAX_IMAGE_REPLY {
        return Err(X11Error::bad_alloc());
    }
    let rect = Rectangle::new(x, y, width, height);
    let mut data = log_backend(
        "get_image",
        server
            .backend
            .get_image(backend_drawable(&info), rect, plane_mask, format),
    )
    .unwrap_or_default();
    data.resize(size, 0);

    let mut w = req.reply_writer(info.depth);
    w.write_u32(visual);
    w.write_pad(20);
    w.write_padded(&data);
    req.respond(w.finish_reply());
    Ok(())
}

fn poly_text(server: &mut Server, req: &mut Request<'_>, wide: bool) -> X11Result<()> {
    let (drawable, gc_id) = read_ids(req)?;
    let mut x = req.body.read_i16()?;
    let y = req.body.read_i16()?;
    let mut t = target(server, drawable, gc_id)?;

    // A single leftover byte can only be padding
    while req.body.remaining() >= 2 {
        let len = req.body.read_u8()?;
        if len == 255 {
            // Font shift: four bytes, most significant first
            let b = req.body.read_bytes(4)?;
            let font = u32::from_be_bytes([b[0], b[1], b[2], b[3]]);
            server.registry.font(font)?;
            server
                .registry
                .gcontext_mut(gc_id)?
                .apply(&GcValues {
                    entries: vec![(gc::FONT, font)],
                });
            t = target(server, drawable, gc_id)?;
            continue;
        }
        let delta = req.body.read_u8()? as i8;
        let chars: Vec<u16> = if wide {
            char2b(req.body.read_bytes(len as usize * 2)?)
        } else {
            req.body.read_bytes(len as usize)?.iter().map(|c| *c as u16).collect()
        };
        x = x.wrapping_add(delta as i16);
        if chars.is_empty() {
            continue;
        }
        log_backend(
            "draw_text",
            server.backend.draw_text(t.drawable, &t.gc, x, y, &chars, false),
        );
        let advance = server.backend.text_extents(&t.gc.font, &chars).overall_width;
        x = x.wrapping_add(advance as i16);
    }
    Ok(())
}

pub fn handle_poly_text8(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    poly_text(server, req, false)
}

pub fn handle_poly_text16(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    poly_text(server, req, true)
}

fn image_text(server: &mut Server, req: &mut Request<'_>, wide: bool) -> X11Result<()> {
    let count = req.detail as usize;
    let (drawable, gc_id) = read_ids(req)?;
    let x = req.body.read_i16()?;
    let y = req.body.read_i16()?;
    let chars: Vec<u16> = if wide {
        char2b(req.body.read_bytes(count * 2)?)
    } else {
        req.body.read_bytes(count)?.iter().map(|c| *c as u16).collect()
    };
    let t = target(server, drawable, gc_id)?;
    if !chars.is_empty() {
        log_backend(
            "draw_text",
            server.backend.draw_text(t.drawable, &t.gc, x, y, &chars, true),
        );
    }
    Ok(())
}

pub fn handle_image_text8(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    image_text(server, req, false)
}

pub fn handle_image_text16(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    image_text(server, req, true)
}

#[cfg(test)]
mod tests {
    use super::super::test_util::*;
    use super::*;

    fn create_gc(h: &mut Harness, n: u32, drawable: u32) -> u32 {
        let id = h.id(n);
        h.send(55, 0, Body::new().u32(id).u32(drawable).u32(0));
        id
    }

    #[test]
    fn test_image_sizes() {
        assert_eq!(image_size(ImageFormat::ZPixmap, 24, 3, 2, 0), 24);
        assert_eq!(image_size(ImageFormat::Bitmap, 1, 33, 2, 0), 16);
        assert_eq!(image_size(ImageFormat::Bitmap, 1, 30, 1, 4), 8);
        assert_eq!(image_size(ImageFormat::XYPixmap, 24, 8, 1, 0), 96);
    }

    #[test]
    fn test_unavailable_regions() {
        let info = DrawableInfo {
            id: 1,
            is_window: false,
            depth: 24,
            origin: (0, 0),
            width: 10,
            height: 10,
        };
        assert!(unavailable_regions(&info, 0, 0, 10, 10, 50, 50).is_empty());
        let regions = unavailable_regions(&info, 5, 0, 10, 10, 0, 0);
        assert_eq!(regions, vec![Rectangle::new(5, 0, 5, 10)]);
        let outside = unavailable_regions(&info, 20, 20, 4, 4, 1, 1);
        assert_eq!(outside, vec![Rectangle::new(1, 1, 4, 4)]);
    }

    #[test]
    fn test_relative_points() {
        let points = vec![Point::new(10, 10), Point::new(5, 0), Point::new(0, -3)];
        let abs = absolute_points(1, points).unwrap();
        assert_eq!(abs, vec![Point::new(10, 10), Point::new(15, 10), Point::new(15, 7)]);
        assert!(absolute_points(2, Vec::new()).is_err());
    }

    #[test]
    fn test_fill_rectangles_reach_backend() {
        let (mut h, log) = Harness::logged();
        let w = h.window(1, 0, 0, 50, 50);
        let gc_id = create_gc(&mut h, 2, w);
        Harness::calls(&log);
        h.send(
            70,
            0,
            Body::new()
                .u32(w)
                .u32(gc_id)
                .i16(0)
                .i16(0)
                .u16(5)
                .u16(5)
                .i16(10)
                .i16(10)
                .u16(5)
                .u16(5),
        );
        assert!(h.packets().is_empty());
        assert_eq!(Harness::calls(&log), vec![format!("fill_rectangles {:#x} 2", w)]);
    }

    #[test]
    fn test_partial_rectangle_is_length_error() {
        let mut h = Harness::new();
        let w = h.window(1, 0, 0, 50, 50);
        let gc_id = create_gc(&mut h, 2, w);
        h.send(70, 0, Body::new().u32(w).u32(gc_id).i16(0).i16(0));
        assert_eq!(error_code(&h.packets()[0]), Some(ErrorCode::Length as u8));
    }

    #[test]
    fn test_gc_depth_mismatch() {
        let mut h = Harness::new();
        let w = h.window(1, 0, 0, 50, 50);
        let bitmap = h.id(2);
        h.send(53, 1, Body::new().u32(bitmap).u32(w).u16(8).u16(8));
        let gc_id = create_gc(&mut h, 3, bitmap);
        h.send(64, 0, Body::new().u32(w).u32(gc_id).i16(1).i16(1));
        assert_eq!(error_code(&h.packets()[0]), Some(ErrorCode::Match as u8));
    }

    #[test]
    fn test_create_gc_with_missing_font() {
        let mut h = Harness::new();
        let w = h.window(1, 0, 0, 50, 50);
        let id = h.id(2);
        h.send(55, 0, Body::new().u32(id).u32(w).u32(1 << gc::FONT).u32(0x0077_0000));
        assert_eq!(error_code(&h.packets()[0]), Some(ErrorCode::Font as u8));
        assert!(h.server.registry.gcontext(id).is_err());
    }

    #[test]
    fn test_create_gc_value_list_length() {
        let mut h = Harness::new();
        let w = h.window(1, 0, 0, 50, 50);
        let id = h.id(2);
        h.send(55, 0, Body::new().u32(id).u32(w).u32(1 << gc::FOREGROUND).u32(1).u32(2).u32(3));
        assert_eq!(error_code(&h.packets()[0]), Some(ErrorCode::Length as u8));
        assert!(h.server.registry.gcontext(id).is_err());

        h.send(55, 0, Body::new().u32(id).u32(w).u32(1 << gc::FOREGROUND).u32(7));
        assert!(h.packets().is_empty());
        h.send(56, 0, Body::new().u32(id).u32(1 << gc::FOREGROUND | 1 << gc::BACKGROUND).u32(9));
        assert_eq!(error_code(&h.packets()[0]), Some(ErrorCode::Length as u8));
        assert_eq!(h.server.registry.gcontext(id).unwrap().foreground(), 7);
    }

    #[test]
    fn test_get_image_too_large() {
        let mut h = Harness::new();
        let w = h.window(1, 0, 0, 50, 50);
        let pixmap = h.id(2);
        h.send(53, 24, Body::new().u32(pixmap).u32(w).u16(8192).u16(8192));
        assert!(h.packets().is_empty());
        h.send(73, 2, Body::new().u32(pixmap).i16(0).i16(0).u16(8192).u16(8192).u32(!0));
        assert_eq!(error_code(&h.packets()[0]), Some(ErrorCode::Alloc as u8));

        h.send(73, 2, Body::new().u32(pixmap).i16(0).i16(0).u16(16).u16(16).u32(!0));
        assert_eq!(h.output()[0], 1);
    }

    #[test]
    fn test_copy_area_reports_exposures() {
        let mut h = Harness::new();
        let w = h.window(1, 0, 0, 50, 50);
        let pixmap = h.id(2);
        h.send(53, 24, Body::new().u32(pixmap).u32(w).u16(10).u16(10));
        let gc_id = create_gc(&mut h, 3, w);

        // Entirely inside the source
        h.send(
            62,
            0,
            Body::new().u32(pixmap).u32(w).u32(gc_id).i16(0).i16(0).i16(0).i16(0).u16(10).u16(10),
        );
        let p = h.packets();
        assert_eq!(p.len(), 1);
        assert_eq!(p[0][0], 14);
        assert_eq!(p[0][10], 62);

        // Hanging off the right edge
        h.send(
            62,
            0,
            Body::new().u32(pixmap).u32(w).u32(gc_id).i16(5).i16(0).i16(0).i16(0).u16(10).u16(10),
        );
        let p = h.packets();
        assert_eq!(p.len(), 1);
        assert_eq!(p[0][0], 13);
        assert_eq!(u16::from_le_bytes([p[0][8], p[0][9]]), 5);
        assert_eq!(u16::from_le_bytes([p[0][12], p[0][13]]), 5);
    }

    #[test]
    fn test_put_and_get_image() {
        let (mut h, log) = Harness::logged();
        let w = h.window(1, 0, 0, 50, 50);
        let gc_id = create_gc(&mut h, 2, w);
        Harness::calls(&log);
        let pixels = vec![0xffu8; 4 * 4 * 2];
        h.send(
            72,
            2,
            Body::new()
                .u32(w)
                .u32(gc_id)
                .u16(4)
                .u16(2)
                .i16(0)
                .i16(0)
                .u8(0)
                .u8(24)
                .u16(0)
                .bytes(&pixels),
        );
        assert!(h.packets().is_empty());
        assert_eq!(Harness::calls(&log), vec![format!("put_image {:#x} 32", w)]);

        h.send(73, 2, Body::new().u32(w).i16(0).i16(0).u16(4).u16(2).u32(!0));
        let out = h.output();
        assert_eq!(out[1], 24);
        assert_eq!(u32::from_le_bytes([out[4], out[5], out[6], out[7]]), 8);
        assert_eq!(out.len(), 64);

        // Outside the window
        h.send(73, 2, Body::new().u32(w).i16(48).i16(0).u16(4).u16(2).u32(!0));
        assert_eq!(error_code(&h.packets()[0]), Some(ErrorCode::Match as u8));
    }

    #[test]
    fn test_poly_text_advances_and_shifts_font() {
        let (mut h, log) = Harness::logged();
        let w = h.window(1, 0, 0, 200, 50);
        let gc_id = create_gc(&mut h, 2, w);
        let font = h.id(3);
        h.send(45, 0, Body::new().u32(font).u16(4).u16(0).bytes(b"9x15"));
        Harness::calls(&log);

        let mut items = vec![2u8, 0, b'h', b'i', 255];
        items.extend_from_slice(&font.to_be_bytes());
        items.extend_from_slice(&[1, 3, b'!']);
        h.send(74, 0, Body::new().u32(w).u32(gc_id).i16(10).i16(20).bytes(&items));
        assert!(h.packets().is_empty());
        assert_eq!(Harness::calls(&log).len(), 2);
        assert_eq!(h.server.registry.gcontext(gc_id).unwrap().font(), font);
    }
}
