//! X11 connection setup protocol
//!
//! This module handles the initial connection handshake between client and server.

use super::*;
use std::io::{self, Read, Write};

/// Connection setup request from client
///
/// Authorization name and data are read and discarded: the server does not
/// authenticate clients.
#[derive(Debug, Clone)]
pub struct SetupRequest {
    pub byte_order: ByteOrder,
    pub protocol_major_version: u16,
    pub protocol_minor_version: u16,
}

impl SetupRequest {
    /// Parse setup request from stream
    pub fn parse<R: Read>(stream: &mut R) -> io::Result<Self> {
        let mut marker = [0u8; 1];
        stream.read_exact(&mut marker)?;

        // Byte 0: byte order ('B' = MSB, 'l' = LSB)
        let byte_order = ByteOrder::from_marker(marker[0]).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid byte order marker 0x{:02x}", marker[0]),
            )
        })?;

        let mut reader = WireReader::new(stream, byte_order);
        reader.skip(1)?;
        let protocol_major_version = reader.read_u16()?;
        let protocol_minor_version = reader.read_u16()?;
        let auth_name_len = reader.read_u16()? as usize;
        let auth_data_len = reader.read_u16()? as usize;
        reader.skip(2)?;

        reader.skip(padded_len(auth_name_len))?;
        reader.skip(padded_len(auth_data_len))?;

        Ok(SetupRequest {
            byte_order,
            protocol_major_version,
            protocol_minor_version,
        })
    }
}

/// Setup response status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStatus {
    Failed = 0,
    Success = 1,
    Authenticate = 2,
}

/// Format information
#[derive(Debug, Clone)]
pub struct Format {
    pub depth: u8,
    pub bits_per_pixel: u8,
    pub scanline_pad: u8,
}

impl Format {
    pub fn encode(&self, w: &mut WireWriter) {
        w.write_u8(self.depth);
        w.write_u8(self.bits_per_pixel);
        w.write_u8(self.scanline_pad);
        w.write_pad(5);
    }
}

/// Visual type information
#[derive(Debug, Clone)]
pub struct VisualType {
    pub visual_id: u32,
    pub class: u8,
    pub bits_per_rgb_value: u8,
    pub colormap_entries: u16,
    pub red_mask: u32,
    pub green_mask: u32,
    pub blue_mask: u32,
}

impl VisualType {
    pub const TRUE_COLOR: u8 = 4;

    pub fn encode(&self, w: &mut WireWriter) {
        w.write_u32(self.visual_id);
        w.write_u8(self.class);
        w.write_u8(self.bits_per_rgb_value);
        w.write_u16(self.colormap_entries);
        w.write_u32(self.red_mask);
        w.write_u32(self.green_mask);
        w.write_u32(self.blue_mask);
        w.write_pad(4);
    }
}

/// Depth information
#[derive(Debug, Clone)]
pub struct Depth {
    pub depth: u8,
    pub visuals: Vec<VisualType>,
}

impl Depth {
    pub fn encode(&self, w: &mut WireWriter) {
        w.write_u8(self.depth);
        w.write_pad(1);
        w.write_u16(self.visuals.len() as u16);
        w.write_pad(4);
        for visual in &self.visuals {
            visual.encode(w);
        }
    }
}

/// Screen information
#[derive(Debug, Clone)]
pub struct Screen {
    pub root: ResourceId,
    pub default_colormap: ResourceId,
    pub white_pixel: u32,
    pub black_pixel: u32,
    pub current_input_masks: u32,
    pub width_in_pixels: u16,
    pub height_in_pixels: u16,
    pub width_in_millimeters: u16,
    pub height_in_millimeters: u16,
    pub min_installed_maps: u16,
    pub max_installed_maps: u16,
    pub root_visual: u32,
    pub backing_stores: u8,
    pub save_unders: bool,
    pub root_depth: u8,
    pub allowed_depths: Vec<Depth>,
}

impl Screen {
    pub fn encode(&self, w: &mut WireWriter) {
        w.write_u32(self.root);
        w.write_u32(self.default_colormap);
        w.write_u32(self.white_pixel);
        w.write_u32(self.black_pixel);
        w.write_u32(self.current_input_masks);
        w.write_u16(self.width_in_pixels);
        w.write_u16(self.height_in_pixels);
        w.write_u16(self.width_in_millimeters);
        w.write_u16(self.height_in_millimeters);
        w.write_u16(self.min_installed_maps);
        w.write_u16(self.max_installed_maps);
        w.write_u32(self.root_visual);
        w.write_u8(self.backing_stores);
        w.write_bool(self.save_unders);
        w.write_u8(self.root_depth);
        w.write_u8(self.allowed_depths.len() as u8);
        for depth in &self.allowed_depths {
            depth.encode(w);
        }
    }
}

/// Setup reply (success case)
#[derive(Debug, Clone)]
pub struct SetupSuccess {
    pub protocol_major_version: u16,
    pub protocol_minor_version: u16,
    pub release_number: u32,
    pub resource_id_base: u32,
    pub resource_id_mask: u32,
    pub motion_buffer_size: u32,
    pub maximum_request_length: u16,
    pub image_byte_order: ByteOrder,
    pub bitmap_format_bit_order: ByteOrder,
    pub bitmap_format_scanline_unit: u8,
    pub bitmap_format_scanline_pad: u8,
    pub min_keycode: u8,
    pub max_keycode: u8,
    pub vendor: String,
    pub pixmap_formats: Vec<Format>,
    pub roots: Vec<Screen>,
}

impl SetupSuccess {
    pub fn encode(&self, byte_order: ByteOrder) -> Vec<u8> {
        let mut w = WireWriter::new(byte_order);

        w.write_u8(SetupStatus::Success as u8);
        w.write_pad(1);
        w.write_u16(self.protocol_major_version);
        w.write_u16(self.protocol_minor_version);

        // Filled in once the full record is known
        let length_pos = w.len();
        w.write_u16(0);

        w.write_u32(self.release_number);
        w.write_u32(self.resource_id_base);
        w.write_u32(self.resource_id_mask);
        w.write_u32(self.motion_buffer_size);
        w.write_u16(self.vendor.len() as u16);
        w.write_u16(self.maximum_request_length);
        w.write_u8(self.roots.len() as u8);
        w.write_u8(self.pixmap_formats.len() as u8);
        w.write_u8(self.image_byte_order as u8);
        w.write_u8(self.bitmap_format_bit_order as u8);
        w.write_u8(self.bitmap_format_scanline_unit);
        w.write_u8(self.bitmap_format_scanline_pad);
        w.write_u8(self.min_keycode);
        w.write_u8(self.max_keycode);
        w.write_pad(4);
        w.write_padded(self.vendor.as_bytes());

        for format in &self.pixmap_formats {
            format.encode(&mut w);
        }
        for screen in &self.roots {
            screen.encode(&mut w);
        }

        // Length in 4-byte units, excluding the first 8 bytes
        let length = ((w.len() - 8) / 4) as u16;
        w.patch_u16(length_pos, length);
        w.into_inner()
    }
}

/// Setup failed response
#[derive(Debug, Clone)]
pub struct SetupFailed {
    pub protocol_major_version: u16,
    pub protocol_minor_version: u16,
    pub reason: String,
}

impl SetupFailed {
    pub fn encode(&self, byte_order: ByteOrder) -> Vec<u8> {
        let reason = &self.reason.as_bytes()[..self.reason.len().min(255)];
        let mut w = WireWriter::new(byte_order);
        w.write_u8(SetupStatus::Failed as u8);
        w.write_u8(reason.len() as u8);
        w.write_u16(self.protocol_major_version);
        w.write_u16(self.protocol_minor_version);
        w.write_u16((padded_len(reason.len()) / 4) as u16);
        w.write_padded(reason);
        w.into_inner()
    }
}

/// Setup response
#[derive(Debug, Clone)]
pub enum SetupResponse {
    Success(SetupSuccess),
    Failed(SetupFailed),
}

impl SetupResponse {
    pub fn encode(&self, byte_order: ByteOrder) -> Vec<u8> {
        match self {
            SetupResponse::Success(success) => success.encode(byte_order),
            SetupResponse::Failed(failed) => failed.encode(byte_order),
        }
    }

    pub fn write_to<W: Write>(&self, stream: &mut W, byte_order: ByteOrder) -> io::Result<()> {
        stream.write_all(&self.encode(byte_order))?;
        stream.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_discards_authorization() {
        let mut data = vec![b'l', 0, 11, 0, 0, 0, 3, 0, 5, 0, 0, 0];
        data.extend_from_slice(b"abc\0");
        data.extend_from_slice(b"12345\0\0\0");
        data.push(0x99);
        let mut cursor = Cursor::new(data);
        let req = SetupRequest::parse(&mut cursor).unwrap();
        assert_eq!(req.byte_order, ByteOrder::LSBFirst);
        assert_eq!(req.protocol_major_version, 11);
        assert_eq!(cursor.position(), 24);
    }

    #[test]
    fn test_parse_rejects_bad_marker() {
        let mut cursor = Cursor::new(vec![b'x'; 12]);
        assert!(SetupRequest::parse(&mut cursor).is_err());
    }

    #[test]
    fn test_failed_record_length() {
        let failed = SetupFailed {
            protocol_major_version: 11,
            protocol_minor_version: 0,
            reason: "nope".to_string(),
        };
        let bytes = failed.encode(ByteOrder::MSBFirst);
        assert_eq!(bytes[0], 0);
        assert_eq!(bytes[1], 4);
        assert_eq!(&bytes[6..8], &[0, 1]);
        assert_eq!(bytes.len(), 12);
    }
}
