//! Byte-order aware reader and writer for the X11 wire format
//!
//! A connection fixes its byte order once, from the first byte of the
//! connection setup. Every multi-byte integer read or written afterwards goes
//! through one of the types in this module so the order can never drift.

use super::errors::{X11Error, X11Result};
use super::types::ByteOrder;
use super::pad;
use byteorder::{BigEndian, ByteOrder as _, LittleEndian};
use std::io::{self, Read, Write};

/// Streaming reader over a connection
///
/// Short reads are reported as `UnexpectedEof` and are fatal for the
/// connection; nothing is ever zero-filled.
pub struct WireReader<R> {
    inner: R,
    order: ByteOrder,
}

impl<R: Read> WireReader<R> {
    pub fn new(inner: R, order: ByteOrder) -> Self {
        WireReader { inner, order }
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn read_u8(&mut self) -> io::Result<u8> {
        let mut b = [0u8; 1];
        self.inner.read_exact(&mut b)?;
        Ok(b[0])
    }

    pub fn read_u16(&mut self) -> io::Result<u16> {
        let mut b = [0u8; 2];
        self.inner.read_exact(&mut b)?;
        Ok(match self.order {
            ByteOrder::LSBFirst => LittleEndian::read_u16(&b),
            ByteOrder::MSBFirst => BigEndian::read_u16(&b),
        })
    }

    pub fn read_u32(&mut self) -> io::Result<u32> {
        let mut b = [0u8; 4];
        self.inner.read_exact(&mut b)?;
        Ok(match self.order {
            ByteOrder::LSBFirst => LittleEndian::read_u32(&b),
            ByteOrder::MSBFirst => BigEndian::read_u32(&b),
        })
    }

    pub fn read_u64(&mut self) -> io::Result<u64> {
        let mut b = [0u8; 8];
        self.inner.read_exact(&mut b)?;
        Ok(match self.order {
            ByteOrder::LSBFirst => LittleEndian::read_u64(&b),
            ByteOrder::MSBFirst => BigEndian::read_u64(&b),
        })
    }

    pub fn read_bytes(&mut self, n: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Read `n` bytes followed by their padding to a 4-byte boundary
    pub fn read_padded(&mut self, n: usize) -> io::Result<Vec<u8>> {
        let buf = self.read_bytes(n)?;
        self.skip(pad(n))?;
        Ok(buf)
    }

    /// Discard exactly `n` bytes
    pub fn skip(&mut self, n: usize) -> io::Result<()> {
        let copied = io::copy(&mut (&mut self.inner).take(n as u64), &mut io::sink())?;
        if copied as usize != n {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed while skipping",
            ));
        }
        Ok(())
    }
}

/// Message builder for replies, events and setup records
#[derive(Debug, Clone)]
pub struct WireWriter {
    buf: Vec<u8>,
    order: ByteOrder,
}

impl WireWriter {
    pub fn new(order: ByteOrder) -> Self {
        WireWriter {
            buf: Vec::new(),
            order,
        }
    }

    pub fn with_capacity(order: ByteOrder, capacity: usize) -> Self {
        WireWriter {
            buf: Vec::with_capacity(capacity),
            order,
        }
    }

    /// Start a reply: type 1, the reply-specific byte and the sequence.
    /// The length field is filled in by [`WireWriter::finish_reply`].
    pub fn reply(order: ByteOrder, data: u8, sequence: u16) -> Self {
        let mut w = WireWriter::with_capacity(order, 32);
        w.write_u8(1);
        w.write_u8(data);
        w.write_u16(sequence);
        w.write_u32(0);
        w
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.buf.push(v as u8);
    }

    pub fn write_u16(&mut self, v: u16) {
        let mut b = [0u8; 2];
        match self.order {
            ByteOrder::LSBFirst => LittleEndian::write_u16(&mut b, v),
            ByteOrder::MSBFirst => BigEndian::write_u16(&mut b, v),
        }
        self.buf.extend_from_slice(&b);
    }

    pub fn write_i16(&mut self, v: i16) {
        self.write_u16(v as u16);
    }

    pub fn write_u32(&mut self, v: u32) {
        let mut b = [0u8; 4];
        match self.order {
            ByteOrder::LSBFirst => LittleEndian::write_u32(&mut b, v),
            ByteOrder::MSBFirst => BigEndian::write_u32(&mut b, v),
        }
        self.buf.extend_from_slice(&b);
    }

    pub fn write_i32(&mut self, v: i32) {
        self.write_u32(v as u32);
    }

    pub fn write_u64(&mut self, v: u64) {
        let mut b = [0u8; 8];
        match self.order {
            ByteOrder::LSBFirst => LittleEndian::write_u64(&mut b, v),
            ByteOrder::MSBFirst => BigEndian::write_u64(&mut b, v),
        }
        self.buf.extend_from_slice(&b);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_pad(&mut self, n: usize) {
        self.buf.resize(self.buf.len() + n, 0);
    }

    /// Write a byte string followed by padding to a 4-byte boundary
    pub fn write_padded(&mut self, bytes: &[u8]) {
        self.write_bytes(bytes);
        self.write_pad(pad(bytes.len()));
    }

    /// Overwrite a 16-bit field already written at `offset`
    pub fn patch_u16(&mut self, offset: usize, v: u16) {
        if let Some(slot) = self.buf.get_mut(offset..offset + 2) {
            match self.order {
                ByteOrder::LSBFirst => LittleEndian::write_u16(slot, v),
                ByteOrder::MSBFirst => BigEndian::write_u16(slot, v),
            }
        }
    }

    /// Overwrite a 32-bit field already written at `offset`
    pub fn patch_u32(&mut self, offset: usize, v: u32) {
        if let Some(slot) = self.buf.get_mut(offset..offset + 4) {
            match self.order {
                ByteOrder::LSBFirst => LittleEndian::write_u32(slot, v),
                ByteOrder::MSBFirst => BigEndian::write_u32(slot, v),
            }
        }
    }

    /// Complete a reply started with [`WireWriter::reply`]: pad to at least
    /// 32 bytes and a multiple of 4, then store the extra length in words.
    pub fn finish_reply(mut self) -> Vec<u8> {
        if self.buf.len() < 32 {
            self.buf.resize(32, 0);
        }
        let extra = pad(self.buf.len());
        self.write_pad(extra);
        let words = ((self.buf.len() - 32) / 4) as u32;
        self.patch_u32(4, words);
        self.buf
    }

    /// Finish a fixed 32-byte message (event or error)
    pub fn into_event(self) -> [u8; 32] {
        let mut out = [0u8; 32];
        let n = self.buf.len().min(32);
        out[..n].copy_from_slice(&self.buf[..n]);
        out
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    /// Flush the accumulated bytes to `out` in one write
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(&self.buf)?;
        out.flush()
    }
}

/// Cursor over the body of one request
///
/// The dispatcher reads the whole declared request before handing it over,
/// so running off the end of the body is a Length error, never an I/O error.
pub struct RequestBody<'a> {
    data: &'a [u8],
    pos: usize,
    order: ByteOrder,
}

impl<'a> RequestBody<'a> {
    pub fn new(data: &'a [u8], order: ByteOrder) -> Self {
        RequestBody {
            data,
            pos: 0,
            order,
        }
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// Total body length in bytes (excluding the 4-byte header)
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> X11Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(X11Error::bad_length());
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> X11Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> X11Result<u16> {
        let b = self.take(2)?;
        Ok(match self.order {
            ByteOrder::LSBFirst => LittleEndian::read_u16(b),
            ByteOrder::MSBFirst => BigEndian::read_u16(b),
        })
    }

    pub fn read_i16(&mut self) -> X11Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_u32(&mut self) -> X11Result<u32> {
        let b = self.take(4)?;
        Ok(match self.order {
            ByteOrder::LSBFirst => LittleEndian::read_u32(b),
            ByteOrder::MSBFirst => BigEndian::read_u32(b),
        })
    }

    pub fn read_bytes(&mut self, n: usize) -> X11Result<&'a [u8]> {
        self.take(n)
    }

    /// Read `n` bytes and the padding that follows them
    pub fn read_padded(&mut self, n: usize) -> X11Result<&'a [u8]> {
        let bytes = self.take(n)?;
        self.skip(pad(n))?;
        Ok(bytes)
    }

    pub fn skip(&mut self, n: usize) -> X11Result<()> {
        self.take(n).map(|_| ())
    }

    /// Everything not consumed yet
    pub fn rest(&mut self) -> &'a [u8] {
        let slice = &self.data[self.pos..];
        self.pos = self.data.len();
        slice
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ErrorCode;
    use std::io::Cursor;

    #[test]
    fn test_reader_respects_byte_order() {
        let data = [0x01, 0x02, 0x03, 0x04];
        let mut le = WireReader::new(Cursor::new(data), ByteOrder::LSBFirst);
        assert_eq!(le.read_u32().unwrap(), 0x0403_0201);
        let mut be = WireReader::new(Cursor::new(data), ByteOrder::MSBFirst);
        assert_eq!(be.read_u16().unwrap(), 0x0102);
        assert_eq!(be.read_u16().unwrap(), 0x0304);
    }

    #[test]
    fn test_short_read_is_an_error() {
        let mut r = WireReader::new(Cursor::new([0u8; 3]), ByteOrder::LSBFirst);
        let err = r.read_u32().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        let mut r = WireReader::new(Cursor::new([0u8; 3]), ByteOrder::LSBFirst);
        assert!(r.skip(4).is_err());
    }

    #[test]
    fn test_read_padded_consumes_padding() {
        let data = [b'a', b'b', b'c', 0, 0x2a];
        let mut r = WireReader::new(Cursor::new(data), ByteOrder::LSBFirst);
        assert_eq!(r.read_padded(3).unwrap(), b"abc");
        assert_eq!(r.read_u8().unwrap(), 0x2a);
    }

    #[test]
    fn test_reply_length_field() {
        let mut w = WireWriter::reply(ByteOrder::LSBFirst, 7, 3);
        w.write_pad(24);
        w.write_bytes(b"hello");
        let reply = w.finish_reply();
        assert_eq!(reply.len(), 40);
        assert_eq!(reply[1], 7);
        assert_eq!(&reply[4..8], &[2, 0, 0, 0]);
    }

    #[test]
    fn test_short_reply_is_padded_to_32() {
        let reply = WireWriter::reply(ByteOrder::MSBFirst, 0, 1).finish_reply();
        assert_eq!(reply.len(), 32);
        assert_eq!(&reply[2..4], &[0, 1]);
        assert_eq!(&reply[4..8], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_request_body_underflow_is_length_error() {
        let data = [1u8, 0, 0];
        let mut body = RequestBody::new(&data, ByteOrder::LSBFirst);
        assert_eq!(body.read_u16().unwrap(), 1);
        let err = body.read_u16().unwrap_err();
        assert_eq!(err.code, ErrorCode::Length);
        assert_eq!(body.remaining(), 1);
    }
}
