//! Window lifecycle, hierarchy and geometry requests

use super::read_values;
use crate::protocol::*;
use crate::server::tree::{config_mask, CreateWindowParams, WindowChanges};
use crate::server::{Request, Server};

pub fn handle_create_window(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let b = &mut req.body;
    let id = b.read_u32()?;
    let parent = b.read_u32()?;
    let x = b.read_i16()?;
    let y = b.read_i16()?;
    let width = b.read_u16()?;
    let height = b.read_u16()?;
    let border_width = b.read_u16()?;
    let class = b.read_u16()?;
    let visual = b.read_u32()?;
    let value_mask = b.read_u32()?;
    let values = read_values(b, value_mask)?;
    server.create_window(
        req.client,
        CreateWindowParams {
            id,
            parent,
            x,
            y,
            width,
            height,
            border_width,
            class,
            depth: req.detail,
            visual,
            value_mask,
            values,
        },
    )
}

pub fn handle_change_window_attributes(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let window = req.body.read_u32()?;
    let mask = req.body.read_u32()?;
    let values = read_values(&mut req.body, mask)?;
    server.change_window_attributes(req.client, window, mask, &values)
}

pub fn handle_get_window_attributes(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let id = req.body.read_u32()?;
    let window = server.registry.window(id)?;
    let attrs = &window.attributes;
    let reply = WindowAttributesReply {
        backing_store: attrs.backing_store,
        visual: window.visual,
        class: window.class,
        bit_gravity: attrs.bit_gravity,
        win_gravity: attrs.win_gravity,
        backing_planes: attrs.backing_planes,
        backing_pixel: attrs.backing_pixel,
        save_under: attrs.save_under,
        map_is_installed: attrs.colormap != NONE
            && server.installed_colormaps.contains(&attrs.colormap),
        map_state: server.map_state(id),
        override_redirect: attrs.override_redirect,
        colormap: attrs.colormap,
        all_event_masks: window.all_event_masks(),
        your_event_mask: window.event_mask_for(req.client),
        do_not_propagate_mask: attrs.do_not_propagate_mask as u16,
    };
    let bytes = req.encoder().encode_get_window_attributes_reply(req.sequence, &reply);
    req.respond(bytes);
    Ok(())
}

pub fn handle_destroy_window(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let id = req.body.read_u32()?;
    server.registry.window(id)?;
    server.destroy_window(id);
    Ok(())
}

pub fn handle_destroy_subwindows(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let id = req.body.read_u32()?;
    server.destroy_subwindows(id)
}

/// Save sets only matter to reparenting window managers at client exit,
/// and clients here never leave windows behind reparented elsewhere
pub fn handle_change_save_set(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    if req.detail > 1 {
        return Err(X11Error::bad_value(req.detail as u32));
    }
    let id = req.body.read_u32()?;
    let owner = server.registry.window(id).map(|_| server.registry.owner(id))?;
    if owner == Some(req.client) {
        return Err(X11Error::bad_match());
    }
    Ok(())
}

pub fn handle_reparent_window(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let window = req.body.read_u32()?;
    let parent = req.body.read_u32()?;
    let x = req.body.read_i16()?;
    let y = req.body.read_i16()?;
    server.reparent_window(req.client, window, parent, x, y)
}

pub fn handle_map_window(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let id = req.body.read_u32()?;
    server.map_window(req.client, id)
}

pub fn handle_map_subwindows(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let id = req.body.read_u32()?;
    server.map_subwindows(req.client, id)
}

pub fn handle_unmap_window(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let id = req.body.read_u32()?;
    server.unmap_window(id)
}

pub fn handle_unmap_subwindows(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let id = req.body.read_u32()?;
    server.unmap_subwindows(id)
}

pub fn handle_configure_window(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let id = req.body.read_u32()?;
    let mask = req.body.read_u16()?;
    req.body.skip(2)?;
    if mask & !0x7f != 0 {
        return Err(X11Error::bad_value(mask as u32));
    }
    let values = read_values(&mut req.body, mask as u32)?;
    let mut values = values.into_iter();
    let mut next = |bit: u16| if mask & bit != 0 { values.next() } else { None };

    let mut changes = WindowChanges {
        x: next(config_mask::X).map(|v| v as i16),
        y: next(config_mask::Y).map(|v| v as i16),
        width: next(config_mask::WIDTH).map(|v| v as u16),
        height: next(config_mask::HEIGHT).map(|v| v as u16),
        border_width: next(config_mask::BORDER_WIDTH).map(|v| v as u16),
        sibling: next(config_mask::SIBLING),
        stack_mode: None,
    };
    if let Some(mode) = next(config_mask::STACK_MODE) {
        let stack_mode = u8::try_from(mode)
            .ok()
            .and_then(StackMode::from_u8)
            .ok_or(X11Error::bad_value(mode))?;
        changes.stack_mode = Some(stack_mode);
    }
    server.configure_window(req.client, id, changes)
}

pub fn handle_circulate_window(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let id = req.body.read_u32()?;
    server.circulate_window(req.client, id, req.detail)
}

pub fn handle_get_geometry(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let id = req.body.read_u32()?;
    let root = server.root();
    let reply = match server.registry.window(id) {
        Ok(window) => {
            let (x, y) = match window.parent.and_then(|p| server.registry.window(p).ok()) {
                Some(parent) => window.relative_position(&parent.inner()),
                None => (window.outer.x as i16, window.outer.y as i16),
            };
            GeometryReply {
                depth: window.depth,
                root,
                x,
                y,
                width: window.width(),
                height: window.height(),
                border_width: window.border_width,
            }
        }
        Err(_) => {
            let pixmap = server
                .registry
                .pixmap(id)
                .map_err(|_| X11Error::bad_drawable(id))?;
            GeometryReply {
                depth: pixmap.depth,
                root,
                x: 0,
                y: 0,
                width: pixmap.width,
                height: pixmap.height,
                border_width: 0,
            }
        }
    };
    let bytes = req.encoder().encode_get_geometry_reply(req.sequence, &reply);
    req.respond(bytes);
    Ok(())
}

pub fn handle_query_tree(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let id = req.body.read_u32()?;
    let window = server.registry.window(id)?;
    let bytes = req.encoder().encode_query_tree_reply(
        req.sequence,
        server.root(),
        window.parent.unwrap_or(NONE),
        &window.children,
    );
    req.respond(bytes);
    Ok(())
}

pub fn handle_translate_coordinates(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let src = req.body.read_u32()?;
    let dst = req.body.read_u32()?;
    let x = req.body.read_i16()?;
    let y = req.body.read_i16()?;
    server.registry.window(src)?;
    server.registry.window(dst)?;
    let (dst_x, dst_y, child) = server.translate_coordinates(src, dst, x, y);
    let bytes = req
        .encoder()
        .encode_translate_coordinates_reply(req.sequence, child, dst_x, dst_y);
    req.respond(bytes);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_util::*;
    use crate::protocol::*;

    #[test]
    fn test_create_and_query_geometry() {
        let mut h = Harness::new();
        let w = h.window(1, 10, 20, 100, 50);
        h.send(14, 0, Body::new().u32(w));
        let packets = h.packets();
        assert_eq!(packets.len(), 1);
        let p = &packets[0];
        assert_eq!(p[0], 1);
        assert_eq!(p[1], 24);
        assert_eq!(i16::from_le_bytes([p[12], p[13]]), 10);
        assert_eq!(i16::from_le_bytes([p[14], p[15]]), 20);
        assert_eq!(u16::from_le_bytes([p[16], p[17]]), 100);
        assert_eq!(u16::from_le_bytes([p[18], p[19]]), 50);
    }

    #[test]
    fn test_create_window_value_count_must_match_mask() {
        let mut h = Harness::new();
        let id = h.id(1);
        let root = h.server.root();
        // Mask names BackPixel but no value follows
        h.send(
            1,
            0,
            Body::new()
                .u32(id)
                .u32(root)
                .u32(0)
                .u16(10)
                .u16(10)
                .u16(0)
                .u16(1)
                .u32(0)
                .u32(2),
        );
        let packets = h.packets();
        assert_eq!(error_code(&packets[0]), Some(ErrorCode::Length as u8));
        assert!(h.server.registry.window(id).is_err());
    }

    #[test]
    fn test_query_tree_lists_children_bottom_to_top() {
        let mut h = Harness::new();
        let a = h.window(1, 0, 0, 10, 10);
        let b = h.window(2, 0, 0, 10, 10);
        let root = h.server.root();
        h.send(15, 0, Body::new().u32(root));
        let out = h.output();
        assert_eq!(u16::from_le_bytes([out[16], out[17]]), 2);
        assert_eq!(&out[32..36], &a.to_le_bytes());
        assert_eq!(&out[36..40], &b.to_le_bytes());
    }

    #[test]
    fn test_configure_rejects_bad_stack_mode() {
        let mut h = Harness::new();
        let w = h.window(1, 0, 0, 10, 10);
        h.send(12, 0, Body::new().u32(w).u16(0x40).u16(0).u32(9));
        let packets = h.packets();
        assert_eq!(error_code(&packets[0]), Some(ErrorCode::Value as u8));

        h.send(12, 0, Body::new().u32(w).u16(0x03).u16(0).u32(5).u32(7));
        assert!(h.packets().is_empty());
        let window = h.server.registry.window(w).unwrap();
        assert_eq!((window.outer.x, window.outer.y), (5, 7));
    }

    #[test]
    fn test_get_geometry_of_pixmap_and_bad_drawable() {
        let mut h = Harness::new();
        let p = h.id(3);
        let root = h.server.root();
        h.send(53, 1, Body::new().u32(p).u32(root).u16(8).u16(4));
        h.send(14, 0, Body::new().u32(p));
        h.send(14, 0, Body::new().u32(0x0999_0000));
        let packets = h.packets();
        assert_eq!(packets[0][1], 1);
        assert_eq!(u16::from_le_bytes([packets[0][16], packets[0][17]]), 8);
        assert_eq!(error_code(&packets[1]), Some(ErrorCode::Drawable as u8));
    }

    #[test]
    fn test_translate_between_siblings() {
        let mut h = Harness::new();
        let a = h.window(1, 10, 10, 50, 50);
        let b = h.window(2, 30, 40, 50, 50);
        h.send(40, 0, Body::new().u32(a).u32(b).i16(5).i16(5));
        let p = h.packets().remove(0);
        assert_eq!(p[1], 1);
        assert_eq!(i16::from_le_bytes([p[12], p[13]]), -15);
        assert_eq!(i16::from_le_bytes([p[14], p[15]]), -25);
    }
}
