//! Colormap and cursor requests
//!
//! The single visual is TrueColor, so colormaps are read-only: allocation
//! requests are answered from the pixel layout and any request that wants a
//! writable cell fails.

use super::read_word_list;
use crate::protocol::*;
use crate::resources::colormap::lookup_named_color;
use crate::resources::cursor::{CursorShape, Rgb};
use crate::resources::{Colormap, Cursor, ResourceData};
use crate::server::{Request, Server, ROOT_VISUAL};

/// Largest cursor the server reports through QueryBestSize
const MAX_CURSOR_SIZE: u16 = 64;

fn read_rgb(req: &mut Request<'_>) -> X11Result<Rgb> {
    Ok(Rgb {
        red: req.body.read_u16()?,
        green: req.body.read_u16()?,
        blue: req.body.read_u16()?,
    })
}

fn read_color_name<'a>(req: &mut Request<'a>) -> X11Result<&'a [u8]> {
    let len = req.body.read_u16()? as usize;
    req.body.skip(2)?;
    req.body.read_bytes(len)
}

pub fn handle_create_colormap(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let alloc = req.detail;
    let mid = req.body.read_u32()?;
    let window = req.body.read_u32()?;
    let visual = req.body.read_u32()?;
    match alloc {
        0 => {}
        // AllocAll has nothing to allocate on a read-only visual
        1 => return Err(X11Error::bad_match()),
        a => return Err(X11Error::bad_value(a as u32)),
    }
    server.registry.window(window)?;
    server.registry.validate_new_id(mid, req.client)?;
    if visual != ROOT_VISUAL {
        return Err(X11Error::bad_match());
    }
    server
        .registry
        .create(mid, req.client, ResourceData::Colormap(Colormap::new(visual, window)))
}

pub fn handle_free_colormap(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let cmap = req.body.read_u32()?;
    server.registry.colormap(cmap)?;
    if server.registry.owner(cmap).is_some() {
        server.free_colormap(cmap);
    }
    Ok(())
}

/// Nothing was ever allocated from a read-only map, so the copy starts out
/// identical and the source keeps nothing to give up
pub fn handle_copy_colormap_and_free(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let mid = req.body.read_u32()?;
    let src = req.body.read_u32()?;
    let source = server.registry.colormap(src)?;
    let copy = Colormap::new(source.visual, source.window);
    server.registry.validate_new_id(mid, req.client)?;
    server
        .registry
        .create(mid, req.client, ResourceData::Colormap(copy))
}

pub fn handle_install_colormap(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let cmap = req.body.read_u32()?;
    server.registry.colormap(cmap)?;
    log::debug!("Client {} installs colormap {:#x}", req.client, cmap);
    server.install_colormap(cmap);
    Ok(())
}

pub fn handle_uninstall_colormap(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let cmap = req.body.read_u32()?;
    server.registry.colormap(cmap)?;
    server.uninstall_colormap(cmap);
    Ok(())
}

pub fn handle_list_installed_colormaps(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let window = req.body.read_u32()?;
    server.registry.window(window)?;
    let bytes = req
        .encoder()
        .encode_id_list_reply(req.sequence, &server.installed_colormaps);
    req.respond(bytes);
    Ok(())
}

pub fn handle_alloc_color(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let cmap = req.body.read_u32()?;
    let rgb = read_rgb(req)?;
    let (pixel, red, green, blue) = server
        .registry
        .colormap(cmap)?
        .alloc_color(rgb.red, rgb.green, rgb.blue);

    let mut w = req.reply_writer(0);
    w.write_u16(red);
    w.write_u16(green);
    w.write_u16(blue);
    w.write_pad(2);
    w.write_u32(pixel);
    req.respond(w.finish_reply());
    Ok(())
}

pub fn handle_alloc_named_color(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let cmap = req.body.read_u32()?;
    let name = read_color_name(req)?;
    let colormap = server.registry.colormap(cmap)?;
    let (red, green, blue) = lookup_named_color(name).ok_or_else(X11Error::bad_name)?;
    let (pixel, vred, vgreen, vblue) = colormap.alloc_color(red, green, blue);

    let mut w = req.reply_writer(0);
    w.write_u32(pixel);
    w.write_u16(red);
    w.write_u16(green);
    w.write_u16(blue);
    w.write_u16(vred);
    w.write_u16(vgreen);
    w.write_u16(vblue);
    req.respond(w.finish_reply());
    Ok(())
}

pub fn handle_alloc_color_cells(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let cmap = req.body.read_u32()?;
    server.registry.colormap(cmap)?;
    Err(X11Error::bad_alloc())
}

pub fn handle_alloc_color_planes(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let cmap = req.body.read_u32()?;
    server.registry.colormap(cmap)?;
    Err(X11Error::bad_alloc())
}

pub fn handle_free_colors(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let cmap = req.body.read_u32()?;
    let _plane_mask = req.body.read_u32()?;
    read_word_list(&mut req.body)?;
    server.registry.colormap(cmap)?;
    Ok(())
}

pub fn handle_store_colors(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let cmap = req.body.read_u32()?;
    if req.body.remaining() % 12 != 0 {
        return Err(X11Error::bad_length());
    }
    server.registry.colormap(cmap)?;
    Err(X11Error::bad_access())
}

pub fn handle_store_named_color(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let cmap = req.body.read_u32()?;
    let _pixel = req.body.read_u32()?;
    let name = read_color_name(req)?;
    server.registry.colormap(cmap)?;
    lookup_named_color(name).ok_or_else(X11Error::bad_name)?;
    Err(X11Error::bad_access())
}

pub fn handle_query_colors(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let cmap = req.body.read_u32()?;
    let pixels = read_word_list(&mut req.body)?;
    server.registry.colormap(cmap)?;
    let colors = pixels
        .iter()
        .map(|&p| {
            if p > 0x00ff_ffff {
                Err(X11Error::bad_value(p))
            } else {
                Ok(Colormap::query_pixel(p))
            }
        })
        .collect::<X11Result<Vec<_>>>()?;
    let bytes = req.encoder().encode_query_colors_reply(req.sequence, &colors);
    req.respond(bytes);
    Ok(())
}

pub fn handle_lookup_color(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let cmap = req.body.read_u32()?;
    let name = read_color_name(req)?;
    let colormap = server.registry.colormap(cmap)?;
    let (red, green, blue) = lookup_named_color(name).ok_or_else(X11Error::bad_name)?;
    let (_, vred, vgreen, vblue) = colormap.alloc_color(red, green, blue);

    let mut w = req.reply_writer(0);
    w.write_u16(red);
    w.write_u16(green);
    w.write_u16(blue);
    w.write_u16(vred);
    w.write_u16(vgreen);
    w.write_u16(vblue);
    req.respond(w.finish_reply());
    Ok(())
}

pub fn handle_create_cursor(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let cid = req.body.read_u32()?;
    let source = req.body.read_u32()?;
    let mask = req.body.read_u32()?;
    let foreground = read_rgb(req)?;
    let background = read_rgb(req)?;
    let hotspot_x = req.body.read_u16()?;
    let hotspot_y = req.body.read_u16()?;

    server.registry.validate_new_id(cid, req.client)?;
    let src = server.registry.pixmap(source)?;
    if src.depth != 1 {
        return Err(X11Error::bad_match());
    }
    if mask != NONE {
        let m = server.registry.pixmap(mask)?;
        if m.depth != 1 || m.width != src.width || m.height != src.height {
            return Err(X11Error::bad_match());
        }
    }
    if hotspot_x >= src.width || hotspot_y >= src.height {
        return Err(X11Error::bad_match());
    }
    let cursor = Cursor {
        shape: CursorShape::Pixmap { source, mask },
        foreground,
        background,
        hotspot_x,
        hotspot_y,
    };
    server
        .registry
        .create(cid, req.client, ResourceData::Cursor(cursor))
}

pub fn handle_create_glyph_cursor(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let cid = req.body.read_u32()?;
    let source_font = req.body.read_u32()?;
    let mask_font = req.body.read_u32()?;
    let source_char = req.body.read_u16()?;
    let mask_char = req.body.read_u16()?;
    let foreground = read_rgb(req)?;
    let background = read_rgb(req)?;

    server.registry.validate_new_id(cid, req.client)?;
    let metrics = server.registry.font(source_font)?.metrics;
    if source_char > metrics.max_char {
        return Err(X11Error::bad_value(source_char as u32));
    }
    if mask_font != NONE {
        let mask_metrics = server.registry.font(mask_font)?.metrics;
        if mask_char > mask_metrics.max_char {
            return Err(X11Error::bad_value(mask_char as u32));
        }
    }
    let cursor = Cursor {
        shape: CursorShape::Glyph {
            source_font,
            source_char,
            mask_font,
            mask_char,
        },
        foreground,
        background,
        hotspot_x: 0,
        hotspot_y: 0,
    };
    server
        .registry
        .create(cid, req.client, ResourceData::Cursor(cursor))
}

pub fn handle_free_cursor(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let cursor = req.body.read_u32()?;
    server.registry.cursor(cursor)?;
    if server.registry.owner(cursor).is_some() {
        server.free_resource(cursor);
    }
    Ok(())
}

pub fn handle_recolor_cursor(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let cursor = req.body.read_u32()?;
    let foreground = read_rgb(req)?;
    let background = read_rgb(req)?;
    server
        .registry
        .cursor_mut(cursor)?
        .recolor(foreground, background);
    Ok(())
}

/// Tiles and stipples of any size are fine; cursors are capped
pub fn handle_query_best_size(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let class = req.detail;
    let drawable = req.body.read_u32()?;
    let width = req.body.read_u16()?;
    let height = req.body.read_u16()?;
    if class > 2 {
        return Err(X11Error::bad_value(class as u32));
    }
    let info = server.registry.drawable(drawable)?;
    if class != 0 && info.is_window && server.registry.window(drawable)?.input_only() {
        return Err(X11Error::bad_match());
    }
    let (width, height) = match class {
        0 => (width.min(MAX_CURSOR_SIZE), height.min(MAX_CURSOR_SIZE)),
        _ => (width.max(1), height.max(1)),
    };

    let mut w = req.reply_writer(0);
    w.write_u16(width);
    w.write_u16(height);
    req.respond(w.finish_reply());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_util::*;
    use crate::protocol::*;
    use crate::resources::server_ids::DEFAULT_COLORMAP;
    use crate::server::ROOT_VISUAL;

    fn u16_at(p: &[u8], i: usize) -> u16 {
        u16::from_le_bytes([p[i], p[i + 1]])
    }

    fn u32_at(p: &[u8], i: usize) -> u32 {
        u32::from_le_bytes([p[i], p[i + 1], p[i + 2], p[i + 3]])
    }

    #[test]
    fn test_alloc_color_rounds_to_truecolor() {
        let mut h = Harness::new();
        h.send(
            84,
            0,
            Body::new().u32(DEFAULT_COLORMAP).u16(0xffff).u16(0x8000).u16(0x0100).u16(0),
        );
        let p = h.packets().remove(0);
        assert_eq!(p[0], 1);
        assert_eq!(u16_at(&p, 8), 0xffff);
        assert_eq!(u16_at(&p, 10), 0x8080);
        assert_eq!(u32_at(&p, 16), 0x00ff_8001);
    }

    #[test]
    fn test_alloc_named_color() {
        let mut h = Harness::new();
        h.send(85, 0, Body::new().u32(DEFAULT_COLORMAP).u16(3).u16(0).bytes(b"Red"));
        let p = h.packets().remove(0);
        assert_eq!(u32_at(&p, 8), 0x00ff_0000);
        assert_eq!(u16_at(&p, 12), 0xffff);

        h.send(85, 0, Body::new().u32(DEFAULT_COLORMAP).u16(5).u16(0).bytes(b"nonex"));
        assert_eq!(error_code(&h.packets()[0]), Some(ErrorCode::Name as u8));
    }

    #[test]
    fn test_read_only_cells() {
        let mut h = Harness::new();
        h.send(86, 0, Body::new().u32(DEFAULT_COLORMAP).u16(1).u16(0));
        assert_eq!(error_code(&h.packets()[0]), Some(ErrorCode::Alloc as u8));
        h.send(89, 0, Body::new().u32(DEFAULT_COLORMAP).u32(0).u16(0).u16(0).u16(0).u8(7).u8(0));
        assert_eq!(error_code(&h.packets()[0]), Some(ErrorCode::Access as u8));
        h.send(86, 0, Body::new().u32(0x1234).u16(1).u16(0));
        assert_eq!(error_code(&h.packets()[0]), Some(ErrorCode::Colormap as u8));
    }

    #[test]
    fn test_query_colors() {
        let mut h = Harness::new();
        h.send(91, 0, Body::new().u32(DEFAULT_COLORMAP).u32(0x0000_ff00).u32(0));
        let out = h.output();
        assert_eq!(u16_at(&out, 8), 2);
        assert_eq!(u16_at(&out, 34), 0xffff);

        h.send(91, 0, Body::new().u32(DEFAULT_COLORMAP).u32(0x0100_0000));
        assert_eq!(error_code(&h.packets()[0]), Some(ErrorCode::Value as u8));
    }

    #[test]
    fn test_colormap_lifecycle() {
        let mut h = Harness::new();
        let w = h.window(1, 0, 0, 10, 10);
        let cmap = h.id(2);
        h.send(78, 1, Body::new().u32(cmap).u32(w).u32(ROOT_VISUAL));
        assert_eq!(error_code(&h.packets()[0]), Some(ErrorCode::Match as u8));

        h.send(78, 0, Body::new().u32(cmap).u32(w).u32(ROOT_VISUAL));
        h.send(81, 0, Body::new().u32(cmap));
        h.send(83, 0, Body::new().u32(w));
        let out = h.output();
        assert_eq!(u16_at(&out, 8), 1);
        assert_eq!(u32_at(&out, 32), cmap);

        h.send(79, 0, Body::new().u32(cmap));
        assert!(h.server.registry.colormap(cmap).is_err());
        assert_eq!(h.server.installed_colormaps, vec![DEFAULT_COLORMAP]);
    }

    #[test]
    fn test_create_cursor_validation() {
        let mut h = Harness::new();
        let w = h.window(1, 0, 0, 10, 10);
        let (source, deep, cursor) = (h.id(2), h.id(3), h.id(4));
        h.send(53, 1, Body::new().u32(source).u32(w).u16(16).u16(16));
        h.send(53, 24, Body::new().u32(deep).u32(w).u16(16).u16(16));

        let create = |src: u32, hx: u16| {
            Body::new()
                .u32(cursor)
                .u32(src)
                .u32(NONE)
                .u16(0)
                .u16(0)
                .u16(0)
                .u16(0xffff)
                .u16(0xffff)
                .u16(0xffff)
                .u16(hx)
                .u16(0)
        };
        h.send(93, 0, create(deep, 0));
        assert_eq!(error_code(&h.packets()[0]), Some(ErrorCode::Match as u8));
        h.send(93, 0, create(source, 16));
        assert_eq!(error_code(&h.packets()[0]), Some(ErrorCode::Match as u8));
        h.send(93, 0, create(source, 15));
        assert!(h.packets().is_empty());
        assert!(h.server.registry.cursor(cursor).is_ok());
    }

    #[test]
    fn test_query_best_size_caps_cursors() {
        let mut h = Harness::new();
        let root = h.server.root();
        h.send(97, 0, Body::new().u32(root).u16(200).u16(32));
        let p = h.packets().remove(0);
        assert_eq!((u16_at(&p, 8), u16_at(&p, 10)), (64, 32));
        h.send(97, 3, Body::new().u32(root).u16(1).u16(1));
        assert_eq!(error_code(&h.packets()[0]), Some(ErrorCode::Value as u8));
    }
}
