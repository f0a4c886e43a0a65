//! Server listener and connection handling
//!
//! Every accepted connection gets its own thread. The thread performs the
//! setup handshake, then reads requests without holding the server lock and
//! runs each one with the lock held. A separate pump thread feeds backend
//! input into the server.

use std::io::{BufReader, ErrorKind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;
use std::time::Duration;

use super::dispatch::process_request;
use super::{ClientHandle, Server, ServerError, ServerResult};
use crate::connection::{Connection, Listener};
use crate::protocol::*;

/// The server state shared by every connection thread
pub type SharedServer = Arc<Mutex<Server>>;

/// How often the input pump polls the backend
pub const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Lock the server, recovering the state if a connection thread panicked
pub fn lock_server(server: &Mutex<Server>) -> MutexGuard<'_, Server> {
    server.lock().unwrap_or_else(PoisonError::into_inner)
}

/// TCP port of display `display`
pub fn tcp_port(display: u16) -> u16 {
    6000 + display
}

/// Filesystem (and abstract namespace) socket path of display `display`
pub fn unix_socket_path(display: u16) -> String {
    format!("/tmp/.X11-unix/X{}", display)
}

/// Accept connections forever, one thread per client
pub fn serve(listener: Listener, server: SharedServer) {
    loop {
        match listener.accept() {
            Ok(conn) => {
                let server = Arc::clone(&server);
                thread::spawn(move || {
                    if let Err(e) = handle_client(conn, server) {
                        log::debug!("Connection ended: {}", e);
                    }
                });
            }
            Err(e) => {
                log::error!("Accept failed: {}", e);
                thread::sleep(Duration::from_millis(100));
            }
        }
    }
}

/// Run `serve` on a background thread
pub fn spawn_listener(listener: Listener, server: SharedServer) -> thread::JoinHandle<()> {
    thread::spawn(move || serve(listener, server))
}

/// Refuse the connection with a SetupFailed carrying `reason`
fn refuse(conn: &mut Connection, order: ByteOrder, reason: &str) -> ServerResult<()> {
    let failed = SetupResponse::Failed(SetupFailed {
        protocol_major_version: PROTOCOL_MAJOR_VERSION,
        protocol_minor_version: PROTOCOL_MINOR_VERSION,
        reason: reason.to_string(),
    });
    failed.write_to(conn, order)?;
    Ok(())
}

/// Handshake: read the setup request, check access and register the client.
/// The setup reply is written with the server locked so no event can reach
/// the client ahead of it.
fn setup_client(conn: &mut Connection, server: &SharedServer) -> ServerResult<Arc<ClientHandle>> {
    let peer = conn.peer();
    if let Err(e) = conn.set_nodelay() {
        log::debug!("Could not disable Nagle for {}: {}", peer, e);
    }
    let setup = SetupRequest::parse(conn)?;
    let order = setup.byte_order;
    log::debug!(
        "Setup request from {}: {:?}, protocol {}.{}",
        peer,
        order,
        setup.protocol_major_version,
        setup.protocol_minor_version
    );
    if setup.protocol_major_version != PROTOCOL_MAJOR_VERSION {
        log::warn!(
            "Refusing {}: protocol version {}",
            peer,
            setup.protocol_major_version
        );
        refuse(conn, order, "unsupported protocol version")?;
        return Err(ServerError::Handshake(format!(
            "protocol version {}",
            setup.protocol_major_version
        )));
    }

    let mut guard = lock_server(server);
    if !guard.access.allows(&peer) {
        log::warn!("Refusing {}: host not in access list", peer);
        refuse(conn, order, "access denied")?;
        return Err(ServerError::AccessDenied(peer));
    }
    let writer = Box::new(conn.try_clone()?);
    let control = conn.try_clone()?;
    let handle = match guard.register_client(order, writer, Some(control), peer) {
        Ok(handle) => handle,
        Err(e) => {
            log::warn!("Refusing {}: {}", peer, e);
            refuse(conn, order, "maximum number of clients reached")?;
            return Err(e);
        }
    };
    let reply = SetupResponse::Success(guard.setup_success(&handle.block)).encode(order);
    if let Err(e) = handle.send(&reply) {
        guard.disconnect_client(handle.id);
        return Err(e.into());
    }
    Ok(handle)
}

/// Read one request header and its body. `None` at a clean end of stream.
fn read_request<R: std::io::Read>(
    reader: &mut WireReader<R>,
) -> ServerResult<Option<(RequestHeader, Vec<u8>)>> {
    let opcode = match reader.read_u8() {
        Ok(opcode) => opcode,
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let detail = reader.read_u8()?;
    let length = reader.read_u16()?;
    let header = RequestHeader {
        opcode,
        detail,
        length,
    };
    let body = reader.read_bytes(header.body_len())?;
    Ok(Some((header, body)))
}

/// Serve one connection until it closes or is killed
pub fn handle_client(mut conn: Connection, server: SharedServer) -> ServerResult<()> {
    let handle = setup_client(&mut conn, &server)?;
    let client = handle.id;
    let grab = Arc::clone(&lock_server(&server).grab);

    let mut reader = WireReader::new(BufReader::new(conn), handle.byte_order);
    let result = loop {
        let (header, body) = match read_request(&mut reader) {
            Ok(Some(request)) => request,
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        };
        if handle.is_closed() {
            break Ok(());
        }

        // A grab may be taken between the wait and the lock; check again
        // with the server locked.
        loop {
            if !grab.wait_for_turn(client, || handle.is_closed()) {
                break;
            }
            let mut guard = lock_server(&server);
            if grab.allows(client) {
                if !handle.is_closed() {
                    process_request(&mut guard, client, header, &body);
                }
                break;
            }
        }
        if handle.is_closed() {
            break Ok(());
        }
    };

    lock_server(&server).disconnect_client(client);
    result
}

/// Feed one batch of backend input to the server
pub fn pump_input(server: &mut Server) -> ServerResult<usize> {
    let events = server.backend.poll_events()?;
    let count = events.len();
    for event in events {
        server.process_input(event);
    }
    Ok(count)
}

/// Poll the backend for input every `interval` until the server is dropped
pub fn spawn_input_pump(server: &SharedServer, interval: Duration) -> thread::JoinHandle<()> {
    let server: Weak<Mutex<Server>> = Arc::downgrade(server);
    thread::spawn(move || loop {
        thread::sleep(interval);
        let Some(server) = server.upgrade() else {
            break;
        };
        let result = pump_input(&mut lock_server(&server));
        if let Err(e) = result {
            log::debug!("Input pump: {}", e);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::null::NullBackend;
    use crate::server::ServerConfig;
    use std::io::{Read, Write};
    use std::net::TcpStream;

    fn start() -> (SharedServer, std::net::SocketAddr) {
        let server = Arc::new(Mutex::new(Server::new(
            ServerConfig::default(),
            Box::new(NullBackend::new()),
        )));
        let listener = Listener::tcp_addr("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        spawn_listener(listener, Arc::clone(&server));
        (server, addr)
    }

    fn setup_bytes(major: u16) -> Vec<u8> {
        let mut bytes = vec![b'l', 0];
        bytes.extend_from_slice(&major.to_le_bytes());
        bytes.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 0]);
        bytes
    }

    #[test]
    fn test_display_addresses() {
        assert_eq!(tcp_port(2), 6002);
        assert_eq!(unix_socket_path(0), "/tmp/.X11-unix/X0");
    }

    #[test]
    fn test_handshake_and_disconnect() {
        let (server, addr) = start();
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(&setup_bytes(11)).unwrap();
        let mut head = [0u8; 8];
        stream.read_exact(&mut head).unwrap();
        assert_eq!(head[0], 1);
        let extra = u16::from_le_bytes([head[6], head[7]]) as usize * 4;
        let mut rest = vec![0u8; extra];
        stream.read_exact(&mut rest).unwrap();
        assert_eq!(lock_server(&server).client_count(), 1);

        drop(stream);
        for _ in 0..100 {
            if lock_server(&server).client_count() == 0 {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("client was never cleaned up");
    }

    #[test]
    fn test_pump_with_idle_backend() {
        let mut server = Server::new(ServerConfig::default(), Box::new(NullBackend::new()));
        assert_eq!(pump_input(&mut server).unwrap(), 0);
    }

    #[test]
    fn test_wrong_protocol_version_refused() {
        let (_server, addr) = start();
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(&setup_bytes(10)).unwrap();
        let mut head = [0u8; 8];
        stream.read_exact(&mut head).unwrap();
        assert_eq!(head[0], 0);
        assert!(head[1] > 0);
    }
}
