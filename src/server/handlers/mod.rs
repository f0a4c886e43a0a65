//! Request handlers, grouped by protocol area
//!
//! Every handler has the [`Handler`](super::dispatch::Handler) signature and
//! decodes its own arguments from the request body. Fixed-size requests were
//! already length-checked by the dispatcher; list-carrying requests validate
//! their lists here.

pub mod colors;
pub mod fonts;
pub mod graphics;
pub mod input;
pub mod misc;
pub mod properties;
pub mod windows;

use super::Server;
use crate::backend::BackendResult;
use crate::protocol::*;

/// Read a LISTofVALUE holding exactly one word per bit of `mask`
pub(crate) fn read_values(body: &mut RequestBody<'_>, mask: u32) -> X11Result<Vec<u32>> {
    let count = mask.count_ones() as usize;
    if body.remaining() != count * 4 {
        return Err(X11Error::bad_length());
    }
    (0..count).map(|_| body.read_u32()).collect()
}

/// Read `count` CARD32s
pub(crate) fn read_words(body: &mut RequestBody<'_>, count: usize) -> X11Result<Vec<u32>> {
    if body.remaining() < count * 4 {
        return Err(X11Error::bad_length());
    }
    (0..count).map(|_| body.read_u32()).collect()
}

/// Number of whole `size`-byte items left in the body
fn item_count(body: &RequestBody<'_>, size: usize) -> X11Result<usize> {
    if body.remaining() % size != 0 {
        return Err(X11Error::bad_length());
    }
    Ok(body.remaining() / size)
}

pub(crate) fn read_points(body: &mut RequestBody<'_>) -> X11Result<Vec<Point>> {
    let count = item_count(body, 4)?;
    (0..count)
        .map(|_| Ok(Point::new(body.read_i16()?, body.read_i16()?)))
        .collect()
}

pub(crate) fn read_rectangles(body: &mut RequestBody<'_>) -> X11Result<Vec<Rectangle>> {
    let count = item_count(body, 8)?;
    (0..count)
        .map(|_| {
            Ok(Rectangle::new(
                body.read_i16()?,
                body.read_i16()?,
                body.read_u16()?,
                body.read_u16()?,
            ))
        })
        .collect()
}

pub(crate) fn read_segments(body: &mut RequestBody<'_>) -> X11Result<Vec<Segment>> {
    let count = item_count(body, 8)?;
    (0..count)
        .map(|_| {
            Ok(Segment {
                x1: body.read_i16()?,
                y1: body.read_i16()?,
                x2: body.read_i16()?,
                y2: body.read_i16()?,
            })
        })
        .collect()
}

pub(crate) fn read_arcs(body: &mut RequestBody<'_>) -> X11Result<Vec<Arc>> {
    let count = item_count(body, 12)?;
    (0..count)
        .map(|_| {
            Ok(Arc {
                x: body.read_i16()?,
                y: body.read_i16()?,
                width: body.read_u16()?,
                height: body.read_u16()?,
                angle1: body.read_i16()?,
                angle2: body.read_i16()?,
            })
        })
        .collect()
}

/// Read the rest of the body as CARD32s
pub(crate) fn read_word_list(body: &mut RequestBody<'_>) -> X11Result<Vec<u32>> {
    let count = item_count(body, 4)?;
    read_words(body, count)
}

/// Decode a counted string of STRING16 (CHAR2B, always high byte first)
pub(crate) fn char2b(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect()
}

/// A BOOL request field; anything but 0 or 1 is a Value error
pub(crate) fn bool_field(value: u8) -> X11Result<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        v => Err(X11Error::bad_value(v as u32)),
    }
}

/// An ATOM request field that must name an existing atom
pub(crate) fn existing_atom(server: &Server, raw: u32) -> X11Result<Atom> {
    let atom = Atom::new(raw);
    if server.atoms.exists(atom) {
        Ok(atom)
    } else {
        Err(X11Error::bad_atom(raw))
    }
}

/// Backend failures never reach the client
pub(crate) fn log_backend<T>(op: &str, result: BackendResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            log::debug!("Backend {} failed: {}", op, e);
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use crate::server::dispatch::process_request;
    use crate::server::test_util::*;
    use crate::backend::null::{CallLog, NullBackend};
    use crate::server::client::test_util::SharedBuffer;
    use crate::server::ServerConfig;

    /// Builds request bodies in the client's (LSB first) byte order
    #[derive(Default)]
    pub struct Body(pub Vec<u8>);

    impl Body {
        pub fn new() -> Self {
            Body(Vec::new())
        }

        pub fn u8(mut self, v: u8) -> Self {
            self.0.push(v);
            self
        }

        pub fn u16(mut self, v: u16) -> Self {
            self.0.extend_from_slice(&v.to_le_bytes());
            self
        }

        pub fn i16(self, v: i16) -> Self {
            self.u16(v as u16)
        }

        pub fn u32(mut self, v: u32) -> Self {
            self.0.extend_from_slice(&v.to_le_bytes());
            self
        }

        pub fn bytes(mut self, b: &[u8]) -> Self {
            self.0.extend_from_slice(b);
            self
        }

        /// Pad to a multiple of four
        pub fn pad(mut self) -> Self {
            while self.0.len() % 4 != 0 {
                self.0.push(0);
            }
            self
        }
    }

    /// A server with one connected client, driven through the dispatcher
    pub struct Harness {
        pub server: Server,
        pub client: ClientId,
        pub out: SharedBuffer,
    }

    impl Harness {
        pub fn new() -> Self {
            let mut server = server();
            let (client, out) = connect(&mut server);
            Harness { server, client, out }
        }

        /// Like `new`, recording every backend call into the returned log
        pub fn logged() -> (Self, CallLog) {
            let log = CallLog::default();
            let mut server = Server::new(
                ServerConfig::default(),
                Box::new(NullBackend::with_log(log.clone())),
            );
            let (client, out) = connect(&mut server);
            (Harness { server, client, out }, log)
        }

        /// Drain the backend log
        pub fn calls(log: &CallLog) -> Vec<String> {
            std::mem::take(&mut *log.lock().unwrap())
        }

        pub fn connect_another(&mut self) -> (ClientId, SharedBuffer) {
            connect(&mut self.server)
        }

        /// First id of this client's block plus `n`
        pub fn id(&self, n: u32) -> ResourceId {
            self.server.client(self.client).unwrap().block.base | n
        }

        pub fn send_as(&mut self, client: ClientId, opcode: u8, detail: u8, body: Body) {
            let body = body.pad().0;
            let header = RequestHeader {
                opcode,
                detail,
                length: (body.len() / 4 + 1) as u16,
            };
            process_request(&mut self.server, client, header, &body);
        }

        pub fn send(&mut self, opcode: u8, detail: u8, body: Body) {
            self.send_as(self.client, opcode, detail, body);
        }

        /// Output produced since the last call, split into 32-byte units
        pub fn packets(&self) -> Vec<[u8; 32]> {
            self.out.take_packets()
        }

        /// Raw output produced since the last call
        pub fn output(&self) -> Vec<u8> {
            self.out.take()
        }

        /// Create a mapped InputOutput child of the root
        pub fn window(&mut self, n: u32, x: i16, y: i16, w: u16, h: u16) -> ResourceId {
            let id = self.id(n);
            let root = self.server.root();
            self.send(
                1,
                0,
                Body::new()
                    .u32(id)
                    .u32(root)
                    .i16(x)
                    .i16(y)
                    .u16(w)
                    .u16(h)
                    .u16(0)
                    .u16(1)
                    .u32(0)
                    .u32(0),
            );
            self.send(8, 0, Body::new().u32(id));
            self.output();
            id
        }
    }

    pub fn error_code(packet: &[u8; 32]) -> Option<u8> {
        (packet[0] == 0).then_some(packet[1])
    }
}
