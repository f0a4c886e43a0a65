//! Grabs, focus, pointer and event-injection requests

use super::bool_field;
use crate::protocol::*;
use crate::resources::window::PassiveGrab;
use crate::server::input::{PointerGrabRequest, Warp};
use crate::server::{Request, Server, MAX_KEYCODE, MIN_KEYCODE};

/// GrabMode: Synchronous is 0, Asynchronous is 1
fn sync_mode(mode: u8) -> X11Result<bool> {
    match mode {
        0 => Ok(true),
        1 => Ok(false),
        m => Err(X11Error::bad_value(m as u32)),
    }
}

fn check_modifiers(modifiers: u16) -> X11Result<()> {
    if modifiers != modifier_mask::ANY_MODIFIER && modifiers & !modifier_mask::KEYS != 0 {
        return Err(X11Error::bad_value(modifiers as u32));
    }
    Ok(())
}

pub fn handle_send_event(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let propagate = bool_field(req.detail)?;
    let destination = req.body.read_u32()?;
    let mask = req.body.read_u32()?;
    let mut event = [0u8; 32];
    event.copy_from_slice(req.body.read_bytes(32)?);
    server.send_client_event(propagate, destination, mask, event)
}

pub fn handle_grab_pointer(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let owner_events = bool_field(req.detail)?;
    let window = req.body.read_u32()?;
    let event_mask = req.body.read_u16()? as u32;
    let pointer_sync = sync_mode(req.body.read_u8()?)?;
    let keyboard_sync = sync_mode(req.body.read_u8()?)?;
    let confine_to = req.body.read_u32()?;
    let cursor = req.body.read_u32()?;
    let time = req.body.read_u32()?;
    let status = server.grab_pointer(
        req.client,
        PointerGrabRequest {
            window,
            owner_events,
            event_mask,
            pointer_sync,
            keyboard_sync,
            confine_to,
            cursor,
            time,
        },
    )?;
    let bytes = req.encoder().encode_grab_reply(req.sequence, status);
    req.respond(bytes);
    Ok(())
}

pub fn handle_ungrab_pointer(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let time = req.body.read_u32()?;
    server.ungrab_pointer(req.client, time);
    Ok(())
}

pub fn handle_grab_button(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let owner_events = bool_field(req.detail)?;
    let window = req.body.read_u32()?;
    let event_mask = req.body.read_u16()? as u32;
    let pointer_sync = sync_mode(req.body.read_u8()?)?;
    let keyboard_sync = sync_mode(req.body.read_u8()?)?;
    let confine_to = req.body.read_u32()?;
    let cursor = req.body.read_u32()?;
    let button = req.body.read_u8()?;
    req.body.skip(1)?;
    let modifiers = req.body.read_u16()?;

    server.registry.window(window)?;
    if event_mask & !event_mask::POINTER_EVENTS != 0 {
        return Err(X11Error::bad_value(event_mask));
    }
    if confine_to != NONE {
        server.registry.window(confine_to)?;
    }
    if cursor != NONE {
        server.registry.cursor(cursor)?;
    }
    check_modifiers(modifiers)?;
    server.add_passive_grab(
        window,
        PassiveGrab {
            client: req.client,
            detail: button,
            modifiers,
            owner_events,
            event_mask,
            pointer_sync,
            keyboard_sync,
            confine_to,
            cursor,
        },
        false,
    )
}

pub fn handle_ungrab_button(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let window = req.body.read_u32()?;
    let modifiers = req.body.read_u16()?;
    check_modifiers(modifiers)?;
    server.remove_passive_grab(req.client, window, req.detail, modifiers, false)
}

pub fn handle_change_active_pointer_grab(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let cursor = req.body.read_u32()?;
    let time = req.body.read_u32()?;
    let event_mask = req.body.read_u16()? as u32;
    server.change_active_pointer_grab(req.client, cursor, time, event_mask)
}

pub fn handle_grab_keyboard(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let owner_events = bool_field(req.detail)?;
    let window = req.body.read_u32()?;
    let time = req.body.read_u32()?;
    let pointer_sync = sync_mode(req.body.read_u8()?)?;
    let keyboard_sync = sync_mode(req.body.read_u8()?)?;
    let status = server.grab_keyboard(
        req.client,
        window,
        owner_events,
        pointer_sync,
        keyboard_sync,
        time,
    )?;
    let bytes = req.encoder().encode_grab_reply(req.sequence, status);
    req.respond(bytes);
    Ok(())
}

pub fn handle_ungrab_keyboard(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let time = req.body.read_u32()?;
    server.ungrab_keyboard(req.client, time);
    Ok(())
}

pub fn handle_grab_key(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let owner_events = bool_field(req.detail)?;
    let window = req.body.read_u32()?;
    let modifiers = req.body.read_u16()?;
    let key = req.body.read_u8()?;
    let pointer_sync = sync_mode(req.body.read_u8()?)?;
    let keyboard_sync = sync_mode(req.body.read_u8()?)?;

    server.registry.window(window)?;
    // Keycode 0 is AnyKey
    if key != 0 && !(MIN_KEYCODE..=MAX_KEYCODE).contains(&key) {
        return Err(X11Error::bad_value(key as u32));
    }
    check_modifiers(modifiers)?;
    server.add_passive_grab(
        window,
        PassiveGrab {
            client: req.client,
            detail: key,
            modifiers,
            owner_events,
            event_mask: 0,
            pointer_sync,
            keyboard_sync,
            confine_to: NONE,
            cursor: NONE,
        },
        true,
    )
}

pub fn handle_ungrab_key(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let window = req.body.read_u32()?;
    let modifiers = req.body.read_u16()?;
    if req.detail != 0 && req.detail < MIN_KEYCODE {
        return Err(X11Error::bad_value(req.detail as u32));
    }
    check_modifiers(modifiers)?;
    server.remove_passive_grab(req.client, window, req.detail, modifiers, true)
}

pub fn handle_allow_events(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let time = req.body.read_u32()?;
    server.allow_events(req.detail, time)
}

pub fn handle_grab_server(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    server.grab.grab(req.client);
    log::debug!("Client {} grabbed the server", req.client);
    Ok(())
}

pub fn handle_ungrab_server(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    if server.grab.ungrab(req.client) {
        log::debug!("Client {} released the server", req.client);
    }
    Ok(())
}

pub fn handle_query_pointer(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let window = req.body.read_u32()?;
    let reply = server.query_pointer(window)?;
    let bytes = req.encoder().encode_query_pointer_reply(req.sequence, &reply);
    req.respond(bytes);
    Ok(())
}

/// No motion history is kept
pub fn handle_get_motion_events(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let window = req.body.read_u32()?;
    server.registry.window(window)?;
    let mut w = req.reply_writer(0);
    w.write_u32(0);
    req.respond(w.finish_reply());
    Ok(())
}

pub fn handle_warp_pointer(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let b = &mut req.body;
    let warp = Warp {
        src_window: b.read_u32()?,
        dst_window: b.read_u32()?,
        src_x: b.read_i16()?,
        src_y: b.read_i16()?,
        src_width: b.read_u16()?,
        src_height: b.read_u16()?,
        dst_x: b.read_i16()?,
        dst_y: b.read_i16()?,
    };
    server.warp_pointer(warp)
}

pub fn handle_set_input_focus(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let focus = req.body.read_u32()?;
    let time = req.body.read_u32()?;
    server.set_input_focus(focus, req.detail, time)
}

pub fn handle_get_input_focus(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let mut w = req.reply_writer(server.input.revert_to);
    w.write_u32(server.input.focus.id());
    req.respond(w.finish_reply());
    Ok(())
}

pub fn handle_query_keymap(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let mut w = req.reply_writer(0);
    w.write_bytes(&server.input.keys);
    req.respond(w.finish_reply());
    Ok(())
}
