//! Extensions, device settings, host access and client lifecycle requests

use super::{bool_field, log_backend, read_values, read_word_list};
use crate::protocol::*;
use crate::security::{family, HostEntry};
use crate::server::devices::mapping_status;
use crate::server::{Request, Server};

/// MappingNotify request codes
const MAPPING_MODIFIER: u8 = 0;
const MAPPING_KEYBOARD: u8 = 1;
const MAPPING_POINTER: u8 = 2;

/// No extension is present
pub fn handle_query_extension(_server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let len = req.body.read_u16()? as usize;
    req.body.skip(2)?;
    let name = req.body.read_bytes(len)?;
    log::debug!("QueryExtension {:?}: absent", String::from_utf8_lossy(name));

    let mut w = req.reply_writer(0);
    w.write_bool(false);
    w.write_u8(0); // major opcode
    w.write_u8(0); // first event
    w.write_u8(0); // first error
    req.respond(w.finish_reply());
    Ok(())
}

pub fn handle_list_extensions(_server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let bytes = req.encoder().encode_list_extensions_reply(req.sequence, &[]);
    req.respond(bytes);
    Ok(())
}

pub fn handle_change_keyboard_mapping(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let count = req.detail;
    let first = req.body.read_u8()?;
    let per = req.body.read_u8()?;
    req.body.skip(2)?;
    let keysyms = read_word_list(&mut req.body)?;
    if keysyms.len() != count as usize * per as usize {
        return Err(X11Error::bad_length());
    }
    if count == 0 {
        return Err(X11Error::bad_value(0));
    }
    server.devices.change_keyboard_mapping(first, per, &keysyms)?;
    log::debug!("Keyboard mapping changed for {} keycodes from {}", count, first);
    server.broadcast(&Event::MappingNotify(MappingNotifyEvent {
        request: MAPPING_KEYBOARD,
        first_keycode: first,
        count,
    }));
    Ok(())
}

pub fn handle_get_keyboard_mapping(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let first = req.body.read_u8()?;
    let count = req.body.read_u8()?;
    let per = server.devices.keysyms_per_keycode;
    let keysyms = server.devices.keysyms(first, count)?;
    let bytes = req
        .encoder()
        .encode_keyboard_mapping_reply(req.sequence, per, keysyms);
    req.respond(bytes);
    Ok(())
}

pub fn handle_change_keyboard_control(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let mask = req.body.read_u32()?;
    let values = read_values(&mut req.body, mask)?;
    server.devices.change_keyboard_control(mask, &values)
}

pub fn handle_get_keyboard_control(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let control = &server.devices.keyboard;
    let mut w = req.reply_writer(control.global_auto_repeat as u8);
    w.write_u32(control.led_mask);
    w.write_u8(control.key_click_percent);
    w.write_u8(control.bell_percent);
    w.write_u16(control.bell_pitch);
    w.write_u16(control.bell_duration);
    w.write_pad(2);
    w.write_bytes(&control.auto_repeats);
    req.respond(w.finish_reply());
    Ok(())
}

pub fn handle_bell(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let percent = req.detail as i8;
    if !(-100..=100).contains(&percent) {
        return Err(X11Error::bad_value(percent as u32));
    }
    log_backend("bell", server.backend.bell(percent));
    Ok(())
}

pub fn handle_change_pointer_control(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let numerator = req.body.read_i16()?;
    let denominator = req.body.read_i16()?;
    let threshold = req.body.read_i16()?;
    let do_acceleration = bool_field(req.body.read_u8()?)?;
    let do_threshold = bool_field(req.body.read_u8()?)?;
    server.devices.change_pointer_control(
        do_acceleration.then_some((numerator, denominator)),
        do_threshold.then_some(threshold),
    )
}

pub fn handle_get_pointer_control(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let control = server.devices.pointer;
    let mut w = req.reply_writer(0);
    w.write_u16(control.accel_numerator);
    w.write_u16(control.accel_denominator);
    w.write_u16(control.threshold);
    req.respond(w.finish_reply());
    Ok(())
}

pub fn handle_set_screen_saver(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let timeout = req.body.read_i16()?;
    let interval = req.body.read_i16()?;
    let prefer_blanking = req.body.read_u8()?;
    let allow_exposures = req.body.read_u8()?;
    server
        .devices
        .set_screen_saver(timeout, interval, prefer_blanking, allow_exposures)
}

pub fn handle_get_screen_saver(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let saver = &server.devices.screen_saver;
    let mut w = req.reply_writer(0);
    w.write_u16(saver.timeout as u16);
    w.write_u16(saver.interval as u16);
    w.write_u8(saver.prefer_blanking);
    w.write_u8(saver.allow_exposures);
    req.respond(w.finish_reply());
    Ok(())
}

pub fn handle_force_screen_saver(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    server.devices.force_screen_saver(req.detail)
}

/// Insert (0) or Delete (1) one host-list entry
pub fn handle_change_hosts(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let mode = req.detail;
    let host_family = req.body.read_u8()?;
    req.body.skip(1)?;
    let len = req.body.read_u16()? as usize;
    let address = req.body.read_bytes(len)?.to_vec();
    if mode > 1 {
        return Err(X11Error::bad_value(mode as u32));
    }
    let valid = match host_family {
        family::INTERNET => len == 4,
        family::INTERNET6 => len == 16,
        family::DECNET | family::CHAOS | family::SERVER_INTERPRETED => true,
        f => return Err(X11Error::bad_value(f as u32)),
    };
    if !valid {
        return Err(X11Error::bad_value(len as u32));
    }
    if !server.access.allow_client_changes {
        log::warn!("Client {} may not change the host list", req.client);
        return Err(X11Error::bad_access());
    }
    let entry = HostEntry {
        family: host_family,
        address,
    };
    log::debug!(
        "Client {} {} host {:?}",
        req.client,
        if mode == 0 { "adds" } else { "removes" },
        entry
    );
    if mode == 0 {
        server.access.add_host(entry);
    } else {
        server.access.remove_host(&entry);
    }
    server.shell.save_hosts(&server.access.hosts);
    Ok(())
}

pub fn handle_list_hosts(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let hosts: Vec<HostReply<'_>> = server
        .access
        .hosts
        .iter()
        .map(|h| HostReply {
            family: h.family,
            address: &h.address,
        })
        .collect();
    let bytes = req
        .encoder()
        .encode_list_hosts_reply(req.sequence, server.access.enabled, &hosts);
    req.respond(bytes);
    Ok(())
}

pub fn handle_set_access_control(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let enabled = bool_field(req.detail)?;
    if !server.access.allow_client_changes {
        log::warn!("Client {} may not change access control", req.client);
        return Err(X11Error::bad_access());
    }
    log::debug!(
        "Access control {} by client {}",
        if enabled { "enabled" } else { "disabled" },
        req.client
    );
    server.access.enabled = enabled;
    Ok(())
}

pub fn handle_set_close_down_mode(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let mode = CloseDownMode::from_u8(req.detail).ok_or(X11Error::bad_value(req.detail as u32))?;
    if let Some(client) = server.client(req.client) {
        client.set_close_down_mode(mode);
    }
    Ok(())
}

pub fn handle_kill_client(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let resource = req.body.read_u32()?;
    server.kill_client(resource)
}

pub fn handle_set_pointer_mapping(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let len = req.detail as usize;
    let map = req.body.read_bytes(len)?;
    let status = server
        .devices
        .set_pointer_mapping(map, server.input.buttons)?;
    if status == mapping_status::SUCCESS {
        server.broadcast(&Event::MappingNotify(MappingNotifyEvent {
            request: MAPPING_POINTER,
            first_keycode: 0,
            count: 0,
        }));
    }
    let w = req.reply_writer(status);
    req.respond(w.finish_reply());
    Ok(())
}

pub fn handle_get_pointer_mapping(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let map = &server.devices.pointer_map;
    let bytes = req
        .encoder()
        .encode_byte_list_reply(req.sequence, map.len() as u8, map);
    req.respond(bytes);
    Ok(())
}

pub fn handle_set_modifier_mapping(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let per_modifier = req.detail;
    let keycodes = req.body.read_bytes(8 * per_modifier as usize)?;
    let keys = server.input.keys;
    let status = server
        .devices
        .set_modifier_mapping(per_modifier, keycodes, &keys)?;
    if status == mapping_status::SUCCESS {
        log::debug!("Modifier mapping changed by client {}", req.client);
        server.broadcast(&Event::MappingNotify(MappingNotifyEvent {
            request: MAPPING_MODIFIER,
            first_keycode: 0,
            count: 0,
        }));
    }
    let w = req.reply_writer(status);
    req.respond(w.finish_reply());
    Ok(())
}

pub fn handle_get_modifier_mapping(server: &mut Server, req: &mut Request<'_>) -> X11Result<()> {
    let bytes = req.encoder().encode_byte_list_reply(
        req.sequence,
        server.devices.keycodes_per_modifier,
        server.devices.modifier_map(),
    );
    req.respond(bytes);
    Ok(())
}

pub fn handle_no_operation(_server: &mut Server, _req: &mut Request<'_>) -> X11Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_util::*;
    use crate::protocol::*;
    use crate::security::AccessPolicy;
    use crate::server::devices::kb;

    fn u16_at(p: &[u8], i: usize) -> u16 {
        u16::from_le_bytes([p[i], p[i + 1]])
    }

    #[test]
    fn test_query_extension_absent() {
        let mut h = Harness::new();
        h.send(98, 0, Body::new().u16(5).u16(0).bytes(b"SHAPE"));
        let p = h.packets().remove(0);
        assert_eq!(p[0], 1);
        assert_eq!(p[8], 0);

        h.send(99, 0, Body::new());
        let p = h.packets().remove(0);
        assert_eq!(p[1], 0);
    }

    #[test]
    fn test_keyboard_mapping_notifies_everyone() {
        let mut h = Harness::new();
        let (_, other) = h.connect_another();
        h.send(100, 1, Body::new().u8(38).u8(2).u16(0).u32(0x61).u32(0x41));
        for out in [h.packets(), other.take_packets()] {
            assert_eq!(out.len(), 1);
            assert_eq!(out[0][0], 34);
            assert_eq!((out[0][4], out[0][5], out[0][6]), (1, 38, 1));
        }

        h.send(101, 0, Body::new().u8(38).u8(1));
        let out = h.output();
        assert_eq!(out[1], 2);
        assert_eq!(u32::from_le_bytes([out[32], out[33], out[34], out[35]]), 0x61);

        // Two keysyms declared, three sent
        h.send(100, 1, Body::new().u8(38).u8(2).u16(0).u32(1).u32(2).u32(3));
        assert_eq!(error_code(&h.packets()[0]), Some(ErrorCode::Length as u8));
    }

    #[test]
    fn test_keyboard_control_round_trip() {
        let mut h = Harness::new();
        h.send(
            102,
            0,
            Body::new().u32(kb::BELL_PERCENT | kb::BELL_PITCH).u32(75).u32(880),
        );
        h.send(103, 0, Body::new());
        let out = h.output();
        assert_eq!(out.len(), 52);
        assert_eq!(out[13], 75);
        assert_eq!(u16_at(&out, 14), 880);

        h.send(102, 0, Body::new().u32(kb::BELL_PERCENT).u32(101));
        assert_eq!(error_code(&h.packets()[0]), Some(ErrorCode::Value as u8));
    }

    #[test]
    fn test_bell_range() {
        let (mut h, log) = Harness::logged();
        Harness::calls(&log);
        h.send(104, 50, Body::new());
        assert!(h.packets().is_empty());
        assert_eq!(Harness::calls(&log), vec!["bell 50".to_string()]);
        h.send(104, 101, Body::new());
        assert_eq!(error_code(&h.packets()[0]), Some(ErrorCode::Value as u8));
    }

    #[test]
    fn test_screen_saver_round_trip() {
        let mut h = Harness::new();
        h.send(107, 0, Body::new().i16(300).i16(60).u8(0).u8(1).u16(0));
        h.send(108, 0, Body::new());
        let p = h.packets().remove(0);
        assert_eq!((u16_at(&p, 8), u16_at(&p, 10)), (300, 60));
        assert_eq!((p[12], p[13]), (0, 1));
        h.send(107, 0, Body::new().i16(-2).i16(0).u8(0).u8(0).u16(0));
        assert_eq!(error_code(&h.packets()[0]), Some(ErrorCode::Value as u8));
    }

    #[test]
    fn test_change_and_list_hosts() {
        let mut h = Harness::new();
        h.send(109, 0, Body::new().u8(0).u8(0).u16(4).bytes(&[10, 0, 0, 7]));
        h.send(110, 0, Body::new());
        let out = h.output();
        assert_eq!(out[1], 1);
        assert_eq!(u16_at(&out, 8), 1);
        assert_eq!(&out[32..40], &[0, 0, 4, 0, 10, 0, 0, 7]);

        // Wrong address length for the family
        h.send(109, 0, Body::new().u8(0).u8(0).u16(3).bytes(&[1, 2, 3]));
        assert_eq!(error_code(&h.packets()[0]), Some(ErrorCode::Value as u8));

        h.send(109, 1, Body::new().u8(0).u8(0).u16(4).bytes(&[10, 0, 0, 7]));
        assert!(h.server.access.hosts.is_empty());
    }

    #[test]
    fn test_strict_policy_refuses_changes() {
        let mut h = Harness::new();
        h.server.access = AccessPolicy::strict();
        h.send(111, 0, Body::new());
        assert_eq!(error_code(&h.packets()[0]), Some(ErrorCode::Access as u8));
        assert!(h.server.access.enabled);
    }

    #[test]
    fn test_pointer_mapping() {
        let mut h = Harness::new();
        h.send(116, 5, Body::new().bytes(&[3, 2, 1, 4, 5]));
        let p = h.packets();
        assert_eq!(p[0][0], 34);
        assert_eq!(p[0][4], 2);
        assert_eq!((p[1][0], p[1][1]), (1, 0));

        h.send(117, 0, Body::new());
        let out = h.output();
        assert_eq!(out[1], 5);
        assert_eq!(&out[32..37], &[3, 2, 1, 4, 5]);

        h.send(116, 5, Body::new().bytes(&[1, 1, 2, 3, 4]));
        assert_eq!(error_code(&h.packets()[0]), Some(ErrorCode::Value as u8));
    }

    #[test]
    fn test_modifier_mapping_round_trip() {
        let mut h = Harness::new();
        let keycodes = [50, 0, 66, 0, 37, 0, 64, 0, 77, 0, 0, 0, 133, 0, 0, 0];
        h.send(118, 2, Body::new().bytes(&keycodes));
        let p = h.packets();
        assert_eq!(p[0][0], 34);
        assert_eq!(p[1][1], 0);

        h.send(119, 0, Body::new());
        let out = h.output();
        assert_eq!(out[1], 2);
        assert_eq!(&out[32..48], &keycodes);
    }

    #[test]
    fn test_kill_client_disconnects_owner() {
        let mut h = Harness::new();
        let (other, _out) = h.connect_another();
        let window = h.server.client(other).unwrap().block.base | 1;
        let root = h.server.root();
        h.send_as(
            other,
            1,
            0,
            Body::new().u32(window).u32(root).i16(0).i16(0).u16(5).u16(5).u16(0).u16(1).u32(0).u32(0),
        );
        h.send(113, 0, Body::new().u32(window));
        assert!(h.packets().is_empty());
        assert!(h.server.client(other).is_none());
        assert!(h.server.registry.window(window).is_err());

        h.send(113, 0, Body::new().u32(0x0ff0_0001));
        assert_eq!(error_code(&h.packets()[0]), Some(ErrorCode::Value as u8));
    }
}
