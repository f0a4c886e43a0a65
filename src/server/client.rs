//! Client session handles
//!
//! A [`ClientHandle`] is the part of a connection that other threads need:
//! the write half of the socket, the byte order, the sequence number of the
//! request being processed and the lifecycle flags. Every write goes through
//! one mutex, so a reply and an event raised by another client can never
//! interleave on the wire.

use crate::connection::{Connection, Peer};
use crate::protocol::*;
use crate::resources::IdBlock;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::{Mutex, PoisonError};

/// Represents a connected X11 client
pub struct ClientHandle {
    /// Client index; also the index of its id block
    pub id: ClientId,

    /// Byte order for this client (from setup request)
    pub byte_order: ByteOrder,

    pub block: IdBlock,

    pub peer: Peer,

    writer: Mutex<Box<dyn Write + Send>>,

    /// Socket handle used to force the reader awake on KillClient
    control: Option<Connection>,

    /// Sequence number of the last request read
    sequence: AtomicU32,

    close_down: AtomicU8,

    closed: AtomicBool,

    cleaned_up: AtomicBool,
}

impl ClientHandle {
    pub fn new(
        block: IdBlock,
        byte_order: ByteOrder,
        writer: Box<dyn Write + Send>,
        control: Option<Connection>,
        peer: Peer,
    ) -> Self {
        ClientHandle {
            id: block.client,
            byte_order,
            block,
            peer,
            writer: Mutex::new(writer),
            control,
            sequence: AtomicU32::new(0),
            close_down: AtomicU8::new(CloseDownMode::Destroy as u8),
            closed: AtomicBool::new(false),
            cleaned_up: AtomicBool::new(false),
        }
    }

    /// Count a new request and return its sequence number
    pub fn next_sequence(&self) -> u32 {
        self.sequence.fetch_add(1, Ordering::SeqCst).wrapping_add(1)
    }

    /// Low 16 bits of the current sequence number, as sent on the wire
    pub fn sequence(&self) -> u16 {
        self.sequence.load(Ordering::SeqCst) as u16
    }

    pub fn close_down_mode(&self) -> CloseDownMode {
        CloseDownMode::from_u8(self.close_down.load(Ordering::SeqCst)).unwrap_or_default()
    }

    pub fn set_close_down_mode(&self, mode: CloseDownMode) {
        self.close_down.store(mode as u8, Ordering::SeqCst);
    }

    /// Write one complete message and flush it
    pub fn send(&self, bytes: &[u8]) -> io::Result<()> {
        if self.is_closed() {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "client closed"));
        }
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(bytes)?;
        writer.flush()
    }

    /// Encode `event` in this client's byte order with its current sequence
    pub fn send_event(&self, event: &Event) -> io::Result<()> {
        let bytes = event.encode(self.byte_order, self.sequence());
        log::trace!("Event {:?} -> client {}", event.code(), self.id);
        self.send(&bytes)
    }

    /// Send a protocol error stamped with the current sequence
    pub fn send_error(&self, error: &X11Error) -> io::Result<()> {
        self.send(&error.encode(self.byte_order, self.sequence()))
    }

    /// Mark the connection closed and wake its reader
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(control) = &self.control {
            let _ = control.shutdown();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// True exactly once per client: the caller that gets `true` owns cleanup
    pub fn begin_cleanup(&self) -> bool {
        !self.cleaned_up.swap(true, Ordering::SeqCst)
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use std::sync::Arc;

    /// In-memory writer standing in for a socket
    #[derive(Clone, Default)]
    pub struct SharedBuffer(pub Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        /// Split the captured bytes into 32-byte packets and clear the buffer
        pub fn take_packets(&self) -> Vec<[u8; 32]> {
            let mut buf = self.0.lock().unwrap();
            let packets = buf
                .chunks(32)
                .filter(|c| c.len() == 32)
                .map(|c| {
                    let mut p = [0u8; 32];
                    p.copy_from_slice(c);
                    p
                })
                .collect();
            buf.clear();
            packets
        }

        /// Everything captured so far, clearing the buffer
        pub fn take(&self) -> Vec<u8> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    pub fn handle(client: ClientId) -> (Arc<ClientHandle>, SharedBuffer) {
        let buffer = SharedBuffer::default();
        let handle = ClientHandle::new(
            IdBlock::for_client(client),
            ByteOrder::LSBFirst,
            Box::new(buffer.clone()),
            None,
            Peer::Local,
        );
        (Arc::new(handle), buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::test_util::*;
    use super::*;

    #[test]
    fn test_sequence_and_error_stamp() {
        let (client, buffer) = handle(1);
        assert_eq!(client.next_sequence(), 1);
        assert_eq!(client.next_sequence(), 2);
        client
            .send_error(&X11Error::bad_window(0x1234).with_opcode(4))
            .unwrap();
        let packets = buffer.take_packets();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0][0], 0);
        assert_eq!(packets[0][1], ErrorCode::Window as u8);
        assert_eq!(&packets[0][2..4], &[2, 0]);
        assert_eq!(packets[0][10], 4);
    }

    #[test]
    fn test_cleanup_runs_once() {
        let (client, _) = handle(1);
        assert!(client.begin_cleanup());
        assert!(!client.begin_cleanup());
    }

    #[test]
    fn test_closed_client_rejects_writes() {
        let (client, buffer) = handle(1);
        client.close();
        assert!(client.send(&[0; 32]).is_err());
        assert!(buffer.take_packets().is_empty());
    }
}
