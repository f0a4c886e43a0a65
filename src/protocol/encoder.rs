//! X11 reply encoder
//!
//! Encoders for the replies whose layout is more than a handful of fields.
//! Small replies are built directly with [`WireWriter::reply`].

use super::*;

/// Fields of a GetWindowAttributes reply
#[derive(Debug, Clone)]
pub struct WindowAttributesReply {
    pub backing_store: u8,
    pub visual: u32,
    pub class: WindowClass,
    pub bit_gravity: u8,
    pub win_gravity: u8,
    pub backing_planes: u32,
    pub backing_pixel: u32,
    pub save_under: bool,
    pub map_is_installed: bool,
    pub map_state: MapState,
    pub override_redirect: bool,
    pub colormap: ResourceId,
    pub all_event_masks: u32,
    pub your_event_mask: u32,
    pub do_not_propagate_mask: u16,
}

/// Fields of a GetGeometry reply
#[derive(Debug, Clone, Copy)]
pub struct GeometryReply {
    pub depth: u8,
    pub root: ResourceId,
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
    pub border_width: u16,
}

/// Fields of a QueryPointer reply
#[derive(Debug, Clone, Copy)]
pub struct PointerReply {
    pub same_screen: bool,
    pub root: ResourceId,
    pub child: ResourceId,
    pub root_x: i16,
    pub root_y: i16,
    pub win_x: i16,
    pub win_y: i16,
    pub mask: u16,
}

/// Fields of a GetProperty reply
#[derive(Debug, Clone)]
pub struct PropertyReply<'a> {
    pub format: u8,
    pub type_atom: Atom,
    pub bytes_after: u32,
    pub value: &'a [u8],
}

/// Metrics shared by QueryFont and ListFontsWithInfo. Every glyph of the
/// builtin fonts has the same box, so min and max bounds coincide and no
/// per-character table is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontInfo {
    pub min_char: u16,
    pub max_char: u16,
    pub default_char: u16,
    pub ascent: i16,
    pub descent: i16,
    pub char_width: i16,
}

impl FontInfo {
    fn write_char_info(&self, w: &mut WireWriter) {
        w.write_i16(0);
        w.write_i16(self.char_width);
        w.write_i16(self.char_width);
        w.write_i16(self.ascent);
        w.write_i16(self.descent);
        w.write_u16(0);
    }

    /// Bounds, character range and font extents (bytes 8..56 of the reply)
    fn write_header(&self, w: &mut WireWriter) {
        self.write_char_info(w);
        w.write_pad(4);
        self.write_char_info(w);
        w.write_pad(4);
        w.write_u16(self.min_char);
        w.write_u16(self.max_char);
        w.write_u16(self.default_char);
        w.write_u16(0); // properties
        w.write_u8(0); // LeftToRight
        w.write_u8(0);
        w.write_u8(0);
        w.write_bool(true);
        w.write_i16(self.ascent);
        w.write_i16(self.descent);
    }
}

/// One entry of a ListHosts reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostReply<'a> {
    pub family: u8,
    pub address: &'a [u8],
}

/// Reply encoder
pub struct ProtocolEncoder {
    byte_order: ByteOrder,
}

impl ProtocolEncoder {
    pub fn new(byte_order: ByteOrder) -> Self {
        ProtocolEncoder { byte_order }
    }

    /// Encode GetWindowAttributes reply
    pub fn encode_get_window_attributes_reply(
        &self,
        sequence: u16,
        attrs: &WindowAttributesReply,
    ) -> Vec<u8> {
        let mut w = WireWriter::reply(self.byte_order, attrs.backing_store, sequence);
        w.write_u32(attrs.visual);
        w.write_u16(attrs.class as u16);
        w.write_u8(attrs.bit_gravity);
        w.write_u8(attrs.win_gravity);
        w.write_u32(attrs.backing_planes);
        w.write_u32(attrs.backing_pixel);
        w.write_bool(attrs.save_under);
        w.write_bool(attrs.map_is_installed);
        w.write_u8(attrs.map_state as u8);
        w.write_bool(attrs.override_redirect);
        w.write_u32(attrs.colormap);
        w.write_u32(attrs.all_event_masks);
        w.write_u32(attrs.your_event_mask);
        w.write_u16(attrs.do_not_propagate_mask);
        w.write_pad(2);
        w.finish_reply()
    }

    /// Encode GetGeometry reply
    pub fn encode_get_geometry_reply(&self, sequence: u16, geom: &GeometryReply) -> Vec<u8> {
        let mut w = WireWriter::reply(self.byte_order, geom.depth, sequence);
        w.write_u32(geom.root);
        w.write_i16(geom.x);
        w.write_i16(geom.y);
        w.write_u16(geom.width);
        w.write_u16(geom.height);
        w.write_u16(geom.border_width);
        w.finish_reply()
    }

    /// Encode QueryTree reply; children are listed bottom to top
    pub fn encode_query_tree_reply(
        &self,
        sequence: u16,
        root: ResourceId,
        parent: ResourceId,
        children: &[ResourceId],
    ) -> Vec<u8> {
        let mut w = WireWriter::reply(self.byte_order, 0, sequence);
        w.write_u32(root);
        w.write_u32(parent);
        w.write_u16(children.len() as u16);
        w.write_pad(14);
        for child in children {
            w.write_u32(*child);
        }
        w.finish_reply()
    }

    /// Encode InternAtom reply
    pub fn encode_intern_atom_reply(&self, sequence: u16, atom: Atom) -> Vec<u8> {
        let mut w = WireWriter::reply(self.byte_order, 0, sequence);
        w.write_u32(atom.get());
        w.finish_reply()
    }

    /// Encode GetAtomName reply
    pub fn encode_get_atom_name_reply(&self, sequence: u16, name: &[u8]) -> Vec<u8> {
        let mut w = WireWriter::reply(self.byte_order, 0, sequence);
        w.write_u16(name.len() as u16);
        w.write_pad(22);
        w.write_padded(name);
        w.finish_reply()
    }

    /// Encode GetProperty reply. The value length field counts format units.
    pub fn encode_get_property_reply(&self, sequence: u16, prop: &PropertyReply<'_>) -> Vec<u8> {
        let units = match prop.format {
            16 => prop.value.len() / 2,
            32 => prop.value.len() / 4,
            _ => prop.value.len(),
        };
        let mut w = WireWriter::reply(self.byte_order, prop.format, sequence);
        w.write_u32(prop.type_atom.get());
        w.write_u32(prop.bytes_after);
        w.write_u32(units as u32);
        w.write_pad(12);
        w.write_padded(prop.value);
        w.finish_reply()
    }

    /// Encode ListProperties reply
    pub fn encode_list_properties_reply(&self, sequence: u16, atoms: &[Atom]) -> Vec<u8> {
        let mut w = WireWriter::reply(self.byte_order, 0, sequence);
        w.write_u16(atoms.len() as u16);
        w.write_pad(22);
        for atom in atoms {
            w.write_u32(atom.get());
        }
        w.finish_reply()
    }

    /// Encode a reply carrying a single 32-bit value (selection owner, ...)
    pub fn encode_single_value_reply(&self, sequence: u16, data: u8, value: u32) -> Vec<u8> {
        let mut w = WireWriter::reply(self.byte_order, data, sequence);
        w.write_u32(value);
        w.finish_reply()
    }

    /// Encode QueryPointer reply
    pub fn encode_query_pointer_reply(&self, sequence: u16, ptr: &PointerReply) -> Vec<u8> {
        let mut w = WireWriter::reply(self.byte_order, ptr.same_screen as u8, sequence);
        w.write_u32(ptr.root);
        w.write_u32(ptr.child);
        w.write_i16(ptr.root_x);
        w.write_i16(ptr.root_y);
        w.write_i16(ptr.win_x);
        w.write_i16(ptr.win_y);
        w.write_u16(ptr.mask);
        w.finish_reply()
    }

    /// Encode TranslateCoordinates reply
    pub fn encode_translate_coordinates_reply(
        &self,
        sequence: u16,
        child: ResourceId,
        dst_x: i16,
        dst_y: i16,
    ) -> Vec<u8> {
        let mut w = WireWriter::reply(self.byte_order, 1, sequence);
        w.write_u32(child);
        w.write_i16(dst_x);
        w.write_i16(dst_y);
        w.finish_reply()
    }

    /// Encode GrabPointer / GrabKeyboard reply
    pub fn encode_grab_reply(&self, sequence: u16, status: GrabStatus) -> Vec<u8> {
        WireWriter::reply(self.byte_order, status as u8, sequence).finish_reply()
    }

    /// Encode QueryFont reply
    pub fn encode_query_font_reply(&self, sequence: u16, info: &FontInfo) -> Vec<u8> {
        let mut w = WireWriter::reply(self.byte_order, 0, sequence);
        info.write_header(&mut w);
        w.write_u32(0); // no per-character metrics
        w.finish_reply()
    }

    /// Encode one ListFontsWithInfo reply for `name`
    pub fn encode_font_with_info_reply(
        &self,
        sequence: u16,
        info: &FontInfo,
        name: &[u8],
        replies_hint: u32,
    ) -> Vec<u8> {
        let mut w = WireWriter::reply(self.byte_order, name.len() as u8, sequence);
        info.write_header(&mut w);
        w.write_u32(replies_hint);
        w.write_padded(name);
        w.finish_reply()
    }

    /// The empty reply closing a ListFontsWithInfo series
    pub fn encode_font_with_info_end(&self, sequence: u16) -> Vec<u8> {
        let mut w = WireWriter::reply(self.byte_order, 0, sequence);
        w.write_pad(52);
        w.finish_reply()
    }

    /// Encode a reply carrying a count and a list of STRs (ListFonts,
    /// GetFontPath)
    pub fn encode_string_list_reply(&self, sequence: u16, names: &[&[u8]]) -> Vec<u8> {
        let mut w = WireWriter::reply(self.byte_order, 0, sequence);
        w.write_u16(names.len() as u16);
        w.write_pad(22);
        write_strings(&mut w, names);
        w.finish_reply()
    }

    /// Encode ListExtensions reply; the count travels in the data byte
    pub fn encode_list_extensions_reply(&self, sequence: u16, names: &[&[u8]]) -> Vec<u8> {
        let mut w = WireWriter::reply(self.byte_order, names.len() as u8, sequence);
        w.write_pad(24);
        write_strings(&mut w, names);
        w.finish_reply()
    }

    /// Encode QueryColors reply
    pub fn encode_query_colors_reply(&self, sequence: u16, colors: &[(u16, u16, u16)]) -> Vec<u8> {
        let mut w = WireWriter::reply(self.byte_order, 0, sequence);
        w.write_u16(colors.len() as u16);
        w.write_pad(22);
        for &(red, green, blue) in colors {
            w.write_u16(red);
            w.write_u16(green);
            w.write_u16(blue);
            w.write_pad(2);
        }
        w.finish_reply()
    }

    /// Encode a list of 32-bit ids with a 16-bit count
    /// (ListInstalledColormaps)
    pub fn encode_id_list_reply(&self, sequence: u16, ids: &[u32]) -> Vec<u8> {
        let mut w = WireWriter::reply(self.byte_order, 0, sequence);
        w.write_u16(ids.len() as u16);
        w.write_pad(22);
        for id in ids {
            w.write_u32(*id);
        }
        w.finish_reply()
    }

    /// Encode GetKeyboardMapping reply
    pub fn encode_keyboard_mapping_reply(
        &self,
        sequence: u16,
        keysyms_per_keycode: u8,
        keysyms: &[u32],
    ) -> Vec<u8> {
        let mut w = WireWriter::reply(self.byte_order, keysyms_per_keycode, sequence);
        w.write_pad(24);
        for keysym in keysyms {
            w.write_u32(*keysym);
        }
        w.finish_reply()
    }

    /// Encode a reply whose data byte is a count and whose body is a byte
    /// list (GetPointerMapping, GetModifierMapping)
    pub fn encode_byte_list_reply(&self, sequence: u16, data: u8, bytes: &[u8]) -> Vec<u8> {
        let mut w = WireWriter::reply(self.byte_order, data, sequence);
        w.write_pad(24);
        w.write_padded(bytes);
        w.finish_reply()
    }

    /// Encode ListHosts reply
    pub fn encode_list_hosts_reply(
        &self,
        sequence: u16,
        enabled: bool,
        hosts: &[HostReply<'_>],
    ) -> Vec<u8> {
        let mut w = WireWriter::reply(self.byte_order, enabled as u8, sequence);
        w.write_u16(hosts.len() as u16);
        w.write_pad(22);
        for host in hosts {
            w.write_u8(host.family);
            w.write_pad(1);
            w.write_u16(host.address.len() as u16);
            w.write_padded(host.address);
        }
        w.finish_reply()
    }
}

/// Length-prefixed strings, padded as a whole
fn write_strings(w: &mut WireWriter, names: &[&[u8]]) {
    let mut total = 0;
    for name in names {
        let name = &name[..name.len().min(255)];
        w.write_u8(name.len() as u8);
        w.write_bytes(name);
        total += name.len() + 1;
    }
    w.write_pad(pad(total));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_attributes_reply_length() {
        let enc = ProtocolEncoder::new(ByteOrder::LSBFirst);
        let reply = enc.encode_get_window_attributes_reply(
            1,
            &WindowAttributesReply {
                backing_store: 0,
                visual: 0x21,
                class: WindowClass::InputOutput,
                bit_gravity: 0,
                win_gravity: 1,
                backing_planes: 0xffff_ffff,
                backing_pixel: 0,
                save_under: false,
                map_is_installed: true,
                map_state: MapState::Viewable,
                override_redirect: false,
                colormap: 4,
                all_event_masks: 0,
                your_event_mask: 0,
                do_not_propagate_mask: 0,
            },
        );
        assert_eq!(reply.len(), 44);
        assert_eq!(&reply[4..8], &[3, 0, 0, 0]);
        assert_eq!(reply[26], 2);
    }

    #[test]
    fn test_property_reply_units() {
        let enc = ProtocolEncoder::new(ByteOrder::MSBFirst);
        let reply = enc.encode_get_property_reply(
            2,
            &PropertyReply {
                format: 16,
                type_atom: Atom::INTEGER,
                bytes_after: 0,
                value: &[0, 1, 0, 2, 0, 3],
            },
        );
        assert_eq!(reply[1], 16);
        assert_eq!(&reply[16..20], &[0, 0, 0, 3]);
        assert_eq!(&reply[4..8], &[0, 0, 0, 2]);
        assert_eq!(reply.len(), 40);
    }

    #[test]
    fn test_atom_name_reply() {
        let enc = ProtocolEncoder::new(ByteOrder::LSBFirst);
        let reply = enc.encode_get_atom_name_reply(3, b"WM_NAME");
        assert_eq!(&reply[8..10], &[7, 0]);
        assert_eq!(&reply[32..39], b"WM_NAME");
        assert_eq!(reply.len(), 40);
    }

    #[test]
    fn test_query_font_reply_layout() {
        let enc = ProtocolEncoder::new(ByteOrder::LSBFirst);
        let info = FontInfo {
            min_char: 0,
            max_char: 255,
            default_char: 32,
            ascent: 10,
            descent: 3,
            char_width: 6,
        };
        let reply = enc.encode_query_font_reply(4, &info);
        assert_eq!(reply.len(), 60);
        assert_eq!(&reply[4..8], &[7, 0, 0, 0]);
        // max_bounds.character_width
        assert_eq!(&reply[28..30], &[6, 0]);
        assert_eq!(&reply[52..54], &[10, 0]);

        let end = enc.encode_font_with_info_end(4);
        assert_eq!(end.len(), 60);
        assert_eq!(end[1], 0);
    }

    #[test]
    fn test_string_list_padding() {
        let enc = ProtocolEncoder::new(ByteOrder::LSBFirst);
        let reply = enc.encode_string_list_reply(1, &[b"fixed", b"6x13"]);
        assert_eq!(&reply[8..10], &[2, 0]);
        assert_eq!(reply[32], 5);
        assert_eq!(&reply[33..38], b"fixed");
        assert_eq!(reply[38], 4);
        // 11 bytes of strings padded to 12
        assert_eq!(reply.len(), 44);
    }
}
