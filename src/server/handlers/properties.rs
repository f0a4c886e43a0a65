//! Atom, property and selection requests

use super::{bool_field, existing_atom};
use crate::protocol::*;
use crate::server::properties::{PropertyMode, PropertyRead};
use crate::server::selections::OwnerChange;
use crate::server::{Request, Server};

const NEW_VALUE: u8 = 0;
const DELETED: u8 = 1;

fn notify_property(server: &Server, window: ResourceId, atom: Atom, state: u8) {
    let event = Event::PropertyNotify(PropertyNotifyEvent {
        window,
        atom,
        time: server.now(),
        state,
    });
    server.deliver_to_selecting(window, event_mask::PROPERTY_CHANGE, &event);
}

/// Keep the host window title in step with WM_NAME
fn update_title(server: &mut Server, window: ResourceId) {
    let title = match server.registry.window(window) {
        Ok(w) => match w.properties.get(Atom::WM_NAME) {
            Some(p) if p.format == 8 => String::from_utf8_lossy(&p.data).into_owned(),
            _ => return,
        },
        Err(_) => return,
    };
    super::log_backend("set_window_title", server.backend.set_window_title(window, &title));
}

pub fn handle_intern_atom(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let only_if_exists = bool_field(req.detail)?;
    let len = req.body.read_u16()? as usize;
    req.body.skip(2)?;
    let name = req.body.read_bytes(len)?;
    let atom = server.atoms.intern(name, only_if_exists).unwrap_or(Atom::NONE);
    let bytes = req.encoder().encode_intern_atom_reply(req.sequence, atom);
    req.respond(bytes);
    Ok(())
}

pub fn handle_get_atom_name(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let raw = req.body.read_u32()?;
    let name = server
        .atoms
        .name(Atom::new(raw))
        .ok_or(X11Error::bad_atom(raw))?;
    let bytes = req.encoder().encode_get_atom_name_reply(req.sequence, name);
    req.respond(bytes);
    Ok(())
}

pub fn handle_change_property(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let mode = PropertyMode::from_u8(req.detail).ok_or(X11Error::bad_value(req.detail as u32))?;
    let window = req.body.read_u32()?;
    let property = req.body.read_u32()?;
    let type_atom = req.body.read_u32()?;
    let format = req.body.read_u8()?;
    req.body.skip(3)?;
    let units = req.body.read_u32()?;

    server.registry.window(window)?;
    let property = existing_atom(server, property)?;
    let type_atom = existing_atom(server, type_atom)?;
    if !matches!(format, 8 | 16 | 32) {
        return Err(X11Error::bad_value(format as u32));
    }
    let len = (units as usize)
        .checked_mul(format as usize / 8)
        .ok_or(X11Error::bad_length())?;
    let data = req.body.read_bytes(len)?;

    server
        .registry
        .window_mut(window)?
        .properties
        .change(property, type_atom, format, mode, data)?;
    notify_property(server, window, property, NEW_VALUE);
    if property == Atom::WM_NAME {
        update_title(server, window);
    }
    Ok(())
}

pub fn handle_delete_property(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let window = req.body.read_u32()?;
    let property = req.body.read_u32()?;
    server.registry.window(window)?;
    let property = existing_atom(server, property)?;
    if server.registry.window_mut(window)?.properties.delete(property) {
        notify_property(server, window, property, DELETED);
    }
    Ok(())
}

pub fn handle_get_property(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let delete = bool_field(req.detail)?;
    let window = req.body.read_u32()?;
    let property = req.body.read_u32()?;
    let type_filter = req.body.read_u32()?;
    let long_offset = req.body.read_u32()?;
    let long_length = req.body.read_u32()?;

    server.registry.window(window)?;
    let property = existing_atom(server, property)?;
    let type_filter = if type_filter == 0 {
        Atom::NONE
    } else {
        existing_atom(server, type_filter)?
    };

    let read = server.registry.window_mut(window)?.properties.read(
        property,
        type_filter,
        long_offset,
        long_length,
        delete,
    )?;
    let encoder = req.encoder();
    let bytes = match read {
        PropertyRead::Missing => encoder.encode_get_property_reply(
            req.sequence,
            &PropertyReply {
                format: 0,
                type_atom: Atom::NONE,
                bytes_after: 0,
                value: &[],
            },
        ),
        PropertyRead::TypeMismatch {
            type_atom,
            format,
            bytes_after,
        } => encoder.encode_get_property_reply(
            req.sequence,
            &PropertyReply {
                format,
                type_atom,
                bytes_after,
                value: &[],
            },
        ),
        PropertyRead::Value {
            type_atom,
            format,
            bytes_after,
            data,
            deleted,
        } => {
            if deleted {
                notify_property(server, window, property, DELETED);
            }
            encoder.encode_get_property_reply(
                req.sequence,
                &PropertyReply {
                    format,
                    type_atom,
                    bytes_after,
                    value: &data,
                },
            )
        }
    };
    req.respond(bytes);
    Ok(())
}

pub fn handle_list_properties(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let window = req.body.read_u32()?;
    let names = server.registry.window(window)?.properties.names();
    let bytes = req.encoder().encode_list_properties_reply(req.sequence, &names);
    req.respond(bytes);
    Ok(())
}

pub fn handle_rotate_properties(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let window = req.body.read_u32()?;
    let count = req.body.read_u16()? as usize;
    let delta = req.body.read_i16()?;
    let raw = super::read_words(&mut req.body, count)?;

    server.registry.window(window)?;
    let names = raw
        .into_iter()
        .map(|a| existing_atom(server, a))
        .collect::<X11Result<Vec<_>>>()?;
    server
        .registry
        .window_mut(window)?
        .properties
        .rotate(&names, delta)?;
    if !names.is_empty() && (delta as i64).rem_euclid(names.len() as i64) != 0 {
        for name in names {
            notify_property(server, window, name, NEW_VALUE);
        }
    }
    Ok(())
}

pub fn handle_set_selection_owner(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let owner = req.body.read_u32()?;
    let selection = req.body.read_u32()?;
    let time = req.body.read_u32()?;
    if owner != NONE {
        server.registry.window(owner)?;
    }
    let selection = existing_atom(server, selection)?;
    let now = server.now();
    let change = server
        .selections
        .set_owner(selection, owner, req.client, time, now);
    if let OwnerChange::Changed {
        displaced: Some((client, window)),
        time,
    } = change
    {
        log::debug!(
            "Client {} loses selection {} to client {}",
            client,
            selection,
            req.client
        );
        server.send_event(
            client,
            &Event::SelectionClear(SelectionClearEvent {
                time,
                owner: window,
                selection,
            }),
        );
    }
    Ok(())
}

pub fn handle_get_selection_owner(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let selection = req.body.read_u32()?;
    let selection = existing_atom(server, selection)?;
    let owner = server.selections.owner(selection);
    let bytes = req.encoder().encode_single_value_reply(req.sequence, 0, owner);
    req.respond(bytes);
    Ok(())
}

pub fn handle_convert_selection(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let requestor = req.body.read_u32()?;
    let selection = req.body.read_u32()?;
    let target = req.body.read_u32()?;
    let property = req.body.read_u32()?;
    let time = req.body.read_u32()?;

    server.registry.window(requestor)?;
    let selection = existing_atom(server, selection)?;
    let target = existing_atom(server, target)?;
    let property = if property == 0 {
        Atom::NONE
    } else {
        existing_atom(server, property)?
    };

    let owner = server
        .selections
        .get(selection)
        .and_then(|s| s.client.map(|c| (c, s.window)));
    match owner {
        Some((client, owner)) => {
            log::debug!(
                "Selection {} request from client {} forwarded to client {}",
                selection,
                req.client,
                client
            );
            server.send_event(
                client,
                &Event::SelectionRequest(SelectionRequestEvent {
                    time,
                    owner,
                    requestor,
                    selection,
                    target,
                    property,
                }),
            );
        }
        None => server.send_event(
            req.client,
            &Event::SelectionNotify(SelectionNotifyEvent {
                time,
                requestor,
                selection,
                target,
                property: Atom::NONE,
            }),
        ),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_util::*;
    use crate::protocol::*;

    const PRIMARY: u32 = 1;
    const STRING: u32 = 31;
    const WM_NAME: u32 = 39;

    fn change(h: &mut Harness, mode: u8, window: u32, data: &[u8]) {
        h.send(
            18,
            mode,
            Body::new()
                .u32(window)
                .u32(WM_NAME)
                .u32(STRING)
                .u8(8)
                .bytes(&[0, 0, 0])
                .u32(data.len() as u32)
                .bytes(data),
        );
    }

    fn get(h: &mut Harness, delete: u8, window: u32, offset: u32, length: u32) -> Vec<u8> {
        h.send(
            20,
            delete,
            Body::new().u32(window).u32(WM_NAME).u32(0).u32(offset).u32(length),
        );
        h.output()
    }

    #[test]
    fn test_intern_atom_only_if_exists() {
        let mut h = Harness::new();
        h.send(16, 1, Body::new().u16(6).u16(0).bytes(b"BOGUS1"));
        h.send(16, 0, Body::new().u16(6).u16(0).bytes(b"BOGUS1"));
        h.send(16, 1, Body::new().u16(6).u16(0).bytes(b"BOGUS1"));
        let packets = h.packets();
        assert_eq!(&packets[0][8..12], &[0, 0, 0, 0]);
        let created = u32::from_le_bytes([packets[1][8], packets[1][9], packets[1][10], packets[1][11]]);
        assert!(created > 68);
        assert_eq!(&packets[2][8..12], &created.to_le_bytes());

        h.send(17, 0, Body::new().u32(created));
        let out = h.output();
        assert_eq!(u16::from_le_bytes([out[8], out[9]]), 6);
        assert_eq!(&out[32..38], b"BOGUS1");
    }

    #[test]
    fn test_append_and_partial_read() {
        let mut h = Harness::new();
        let w = h.window(1, 0, 0, 10, 10);
        change(&mut h, 0, w, b"hello");
        change(&mut h, 2, w, b" world");
        assert!(h.packets().is_empty());

        // Two words from offset 1: "o wo" "rld" split on word boundaries
        let out = get(&mut h, 0, w, 1, 1);
        assert_eq!(out[1], 8);
        assert_eq!(&out[8..12], &STRING.to_le_bytes());
        assert_eq!(u32::from_le_bytes([out[12], out[13], out[14], out[15]]), 3);
        assert_eq!(u32::from_le_bytes([out[16], out[17], out[18], out[19]]), 4);
        assert_eq!(&out[32..36], b"o wo");
    }

    #[test]
    fn test_prepend_with_other_type_is_match() {
        let mut h = Harness::new();
        let w = h.window(1, 0, 0, 10, 10);
        change(&mut h, 0, w, b"abc");
        h.send(
            18,
            1,
            Body::new()
                .u32(w)
                .u32(WM_NAME)
                .u32(PRIMARY)
                .u8(8)
                .bytes(&[0, 0, 0])
                .u32(1)
                .bytes(b"x"),
        );
        assert_eq!(error_code(&h.packets()[0]), Some(ErrorCode::Match as u8));
    }

    #[test]
    fn test_delete_on_read_notifies() {
        let mut h = Harness::new();
        let w = h.window(1, 0, 0, 10, 10);
        // Select PropertyChange
        h.send(2, 0, Body::new().u32(w).u32(0x800).u32(event_mask::PROPERTY_CHANGE));
        change(&mut h, 0, w, b"abc");
        let notify = h.packets();
        assert_eq!(notify[0][0], 28);
        assert_eq!(notify[0][16], 0);

        let out = get(&mut h, 1, w, 0, 10);
        // The PropertyNotify (Deleted) precedes the reply
        assert_eq!(out[0], 28);
        assert_eq!(out[16], 1);
        assert_eq!(out[32], 1);

        let out = get(&mut h, 0, w, 0, 10);
        assert_eq!(out[1], 0);
        assert_eq!(&out[8..12], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_offset_past_end_is_value_error() {
        let mut h = Harness::new();
        let w = h.window(1, 0, 0, 10, 10);
        change(&mut h, 0, w, b"abc");
        let out = get(&mut h, 0, w, 2, 1);
        assert_eq!(out[0], 0);
        assert_eq!(out[1], ErrorCode::Value as u8);
    }

    #[test]
    fn test_selection_handoff() {
        let mut h = Harness::new();
        let (other, other_out) = h.connect_another();
        let a = h.window(1, 0, 0, 10, 10);
        let b_base = h.server.client(other).unwrap().block.base;
        let b = b_base | 1;
        let root = h.server.root();
        h.send_as(
            other,
            1,
            0,
            Body::new().u32(b).u32(root).u32(0).u16(5).u16(5).u16(0).u16(1).u32(0).u32(0),
        );

        h.send(22, 0, Body::new().u32(a).u32(PRIMARY).u32(0));
        h.send(23, 0, Body::new().u32(PRIMARY));
        assert_eq!(&h.packets()[0][8..12], &a.to_le_bytes());

        // Second client takes over; the first gets SelectionClear
        h.send_as(other, 22, 0, Body::new().u32(b).u32(PRIMARY).u32(0));
        let packets = h.packets();
        assert_eq!(packets[0][0], 29);
        assert_eq!(&packets[0][8..12], &a.to_le_bytes());
        assert_eq!(&packets[0][12..16], &PRIMARY.to_le_bytes());

        // The first client's ConvertSelection reaches the new owner
        h.send(24, 0, Body::new().u32(a).u32(PRIMARY).u32(STRING).u32(WM_NAME).u32(0));
        assert!(h.packets().is_empty());
        let forwarded = other_out.take_packets();
        assert_eq!(forwarded[0][0], 30);
        assert_eq!(&forwarded[0][8..12], &b.to_le_bytes());
        assert_eq!(&forwarded[0][12..16], &a.to_le_bytes());
    }

    #[test]
    fn test_convert_unowned_selection_notifies_requestor() {
        let mut h = Harness::new();
        let w = h.window(1, 0, 0, 10, 10);
        h.send(24, 0, Body::new().u32(w).u32(PRIMARY).u32(STRING).u32(WM_NAME).u32(0));
        let p = h.packets().remove(0);
        assert_eq!(p[0], 31);
        assert_eq!(&p[8..12], &w.to_le_bytes());
        assert_eq!(&p[20..24], &[0, 0, 0, 0]);
    }
}
