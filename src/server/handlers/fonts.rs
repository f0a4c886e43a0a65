//! Font requests

use super::char2b;
use crate::protocol::*;
use crate::resources::font::{list_fonts, FontMetrics};
use crate::resources::{Font, ResourceData};
use crate::server::{Request, Server};

/// Path reported while no SetFontPath has been made
pub const DEFAULT_FONT_PATH: &str = "built-ins";

fn font_info(metrics: &FontMetrics) -> FontInfo {
    let default_char = if (metrics.min_char..=metrics.max_char).contains(&0x20) {
        0x20
    } else {
        metrics.min_char
    };
    FontInfo {
        min_char: metrics.min_char,
        max_char: metrics.max_char,
        default_char,
        ascent: metrics.ascent,
        descent: metrics.descent,
        char_width: metrics.char_width,
    }
}

/// Read a pattern preceded by a u16 length (and, for ListFonts, a maximum)
fn read_name(req: &mut Request<'_>, len: usize) -> X11Result<String> {
    let bytes = req.body.read_bytes(len)?;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

pub fn handle_open_font(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let fid = req.body.read_u32()?;
    let len = req.body.read_u16()? as usize;
    req.body.skip(2)?;
    let name = read_name(req, len)?;
    server.registry.validate_new_id(fid, req.client)?;
    let font = Font::open(&name)?;
    log::debug!("Client {} opened font {:?} as {:#x}", req.client, name, fid);
    server.registry.create(fid, req.client, ResourceData::Font(font))
}

pub fn handle_close_font(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let fid = req.body.read_u32()?;
    server.registry.font(fid)?;
    // The server's own default font outlives every close
    if server.registry.owner(fid).is_some() {
        server.free_resource(fid);
    }
    Ok(())
}

pub fn handle_query_font(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let id = req.body.read_u32()?;
    let info = font_info(&server.registry.fontable(id)?.metrics);
    let bytes = req.encoder().encode_query_font_reply(req.sequence, &info);
    req.respond(bytes);
    Ok(())
}

pub fn handle_query_text_extents(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let odd_length = req.detail != 0;
    let id = req.body.read_u32()?;
    let data = req.body.rest();
    if data.len() % 2 != 0 || (odd_length && data.len() < 2) {
        return Err(X11Error::bad_length());
    }
    let mut chars = char2b(data);
    if odd_length {
        chars.pop();
    }
    let metrics = server.registry.fontable(id)?.metrics;
    let extents = server.backend.text_extents(&metrics, &chars);

    let mut w = req.reply_writer(0); // LeftToRight
    w.write_i16(extents.font_ascent);
    w.write_i16(extents.font_descent);
    w.write_i16(extents.overall_ascent);
    w.write_i16(extents.overall_descent);
    w.write_i32(extents.overall_width);
    w.write_i32(extents.overall_left);
    w.write_i32(extents.overall_right);
    req.respond(w.finish_reply());
    Ok(())
}

pub fn handle_list_fonts(_server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let max_names = req.body.read_u16()?;
    let len = req.body.read_u16()? as usize;
    let pattern = read_name(req, len)?;
    let names: Vec<&[u8]> = list_fonts(&pattern, max_names)
        .into_iter()
        .map(str::as_bytes)
        .collect();
    let bytes = req.encoder().encode_string_list_reply(req.sequence, &names);
    req.respond(bytes);
    Ok(())
}

/// One reply per matching font, then the terminating empty reply
pub fn handle_list_fonts_with_info(_server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let max_names = req.body.read_u16()?;
    let len = req.body.read_u16()? as usize;
    let pattern = read_name(req, len)?;
    let names = list_fonts(&pattern, max_names);
    let encoder = req.encoder();
    for (i, name) in names.iter().enumerate() {
        let info = font_info(&FontMetrics::from_name(name));
        let remaining = (names.len() - i - 1) as u32;
        let bytes =
            encoder.encode_font_with_info_reply(req.sequence, &info, name.as_bytes(), remaining);
        req.respond(bytes);
    }
    let end = encoder.encode_font_with_info_end(req.sequence);
    req.respond(end);
    Ok(())
}

pub fn handle_set_font_path(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let count = req.body.read_u16()?;
    req.body.skip(2)?;
    let mut path = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let len = req.body.read_u8()? as usize;
        let element = req.body.read_bytes(len)?;
        path.push(String::from_utf8_lossy(element).into_owned());
    }
    server.font_path = if path.is_empty() {
        vec![DEFAULT_FONT_PATH.to_string()]
    } else {
        path
    };
    log::debug!("Font path is now {:?}", server.font_path);
    Ok(())
}

pub fn handle_get_font_path(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let path: Vec<&[u8]> = server.font_path.iter().map(|p| p.as_bytes()).collect();
    let bytes = req.encoder().encode_string_list_reply(req.sequence, &path);
    req.respond(bytes);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_util::*;
    use crate::protocol::*;
    use crate::resources::server_ids::DEFAULT_FONT;

    fn open(h: &mut Harness, fid: u32, name: &[u8]) {
        h.send(45, 0, Body::new().u32(fid).u16(name.len() as u16).u16(0).bytes(name));
    }

    #[test]
    fn test_open_query_close() {
        let mut h = Harness::new();
        let fid = h.id(1);
        open(&mut h, fid, b"8x16");
        assert!(h.packets().is_empty());

        h.send(47, 0, Body::new().u32(fid));
        let out = h.output();
        assert_eq!(out.len(), 60);
        // max_bounds character_width
        assert_eq!(i16::from_le_bytes([out[28], out[29]]), 8);
        // font ascent + descent
        let ascent = i16::from_le_bytes([out[52], out[53]]);
        let descent = i16::from_le_bytes([out[54], out[55]]);
        assert_eq!(ascent + descent, 16);

        h.send(46, 0, Body::new().u32(fid));
        assert!(h.server.registry.font(fid).is_err());
    }

    #[test]
    fn test_open_unknown_font_is_name_error() {
        let mut h = Harness::new();
        let fid = h.id(1);
        open(&mut h, fid, b"no-such-font");
        assert_eq!(error_code(&h.packets()[0]), Some(ErrorCode::Name as u8));
    }

    #[test]
    fn test_default_font_survives_close() {
        let mut h = Harness::new();
        h.send(46, 0, Body::new().u32(DEFAULT_FONT));
        assert!(h.packets().is_empty());
        assert!(h.server.registry.font(DEFAULT_FONT).is_ok());
    }

    #[test]
    fn test_text_extents_odd_length() {
        let mut h = Harness::new();
        let fid = h.id(1);
        open(&mut h, fid, b"6x13");
        // "abc" as CHAR2B with one pad char
        h.send(48, 1, Body::new().u32(fid).bytes(&[0, b'a', 0, b'b', 0, b'c', 0, 0]));
        let p = h.packets().remove(0);
        assert_eq!(p[0], 1);
        assert_eq!(i32::from_le_bytes([p[16], p[17], p[18], p[19]]), 18);
    }

    #[test]
    fn test_list_fonts_with_info_terminates() {
        let mut h = Harness::new();
        h.send(50, 0, Body::new().u16(10).u16(3).bytes(b"9x*"));
        let out = h.output();
        // Two font replies then the 60-byte terminator with name length 0
        let first_len = 32 + 4 * u32::from_le_bytes([out[4], out[5], out[6], out[7]]) as usize;
        assert_eq!(out[1], 4);
        let second = &out[first_len..];
        let second_len = 32 + 4 * u32::from_le_bytes([second[4], second[5], second[6], second[7]]) as usize;
        let end = &second[second_len..];
        assert_eq!(end.len(), 60);
        assert_eq!(end[1], 0);
    }

    #[test]
    fn test_font_path_round_trip() {
        let mut h = Harness::new();
        h.send(51, 0, Body::new().u16(2).u16(0).u8(3).bytes(b"foo").u8(4).bytes(b"/bar"));
        h.send(52, 0, Body::new());
        let out = h.output();
        assert_eq!(u16::from_le_bytes([out[8], out[9]]), 2);
        assert_eq!(&out[32..40], b"\x03foo\x04/ba");
    }
}
