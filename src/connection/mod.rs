//! Connection layer
//!
//! This module handles network connections from X11 clients via TCP and Unix
//! sockets. A connection is split into a read half used by the client's
//! request loop and a write half shared with every thread that delivers
//! events to that client.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::{IpAddr, Shutdown, SocketAddr, TcpListener, TcpStream};

#[cfg(unix)]
use std::os::unix::net::{UnixListener, UnixStream};

/// Where a connection came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Peer {
    Tcp(SocketAddr),
    /// Unix-domain socket (filesystem or abstract namespace)
    Local,
}

impl Peer {
    /// Remote address for host based access control, `None` for local peers
    pub fn ip(&self) -> Option<IpAddr> {
        match self {
            Peer::Tcp(addr) => Some(addr.ip()),
            Peer::Local => None,
        }
    }

    pub fn is_local(&self) -> bool {
        match self {
            Peer::Tcp(addr) => addr.ip().is_loopback(),
            Peer::Local => true,
        }
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Peer::Tcp(addr) => write!(f, "{}", addr),
            Peer::Local => write!(f, "local"),
        }
    }
}

/// Connection type
pub enum Connection {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Connection {
    /// Open a second handle on the same socket
    pub fn try_clone(&self) -> io::Result<Connection> {
        match self {
            Connection::Tcp(stream) => Ok(Connection::Tcp(stream.try_clone()?)),
            #[cfg(unix)]
            Connection::Unix(stream) => Ok(Connection::Unix(stream.try_clone()?)),
        }
    }

    /// Close both directions; a thread blocked reading the socket wakes up
    /// with an error or end of stream
    pub fn shutdown(&self) -> io::Result<()> {
        match self {
            Connection::Tcp(stream) => stream.shutdown(Shutdown::Both),
            #[cfg(unix)]
            Connection::Unix(stream) => stream.shutdown(Shutdown::Both),
        }
    }

    pub fn peer(&self) -> Peer {
        match self {
            Connection::Tcp(stream) => match stream.peer_addr() {
                Ok(addr) => Peer::Tcp(addr),
                Err(_) => Peer::Local,
            },
            #[cfg(unix)]
            Connection::Unix(_) => Peer::Local,
        }
    }

    /// Disable Nagle on TCP; replies are small and latency bound
    pub fn set_nodelay(&self) -> io::Result<()> {
        match self {
            Connection::Tcp(stream) => stream.set_nodelay(true),
            #[cfg(unix)]
            Connection::Unix(_) => Ok(()),
        }
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Connection::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            Connection::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Connection::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            Connection::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Connection::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            Connection::Unix(stream) => stream.flush(),
        }
    }
}

/// Connection listener
pub enum Listener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

impl Listener {
    /// Create a TCP listener on all interfaces
    pub fn tcp(port: u16) -> io::Result<Self> {
        let addr = format!("0.0.0.0:{}", port);
        let listener = TcpListener::bind(addr)?;
        Ok(Listener::Tcp(listener))
    }

    /// Create a TCP listener on an explicit address (port 0 picks one)
    pub fn tcp_addr(addr: SocketAddr) -> io::Result<Self> {
        Ok(Listener::Tcp(TcpListener::bind(addr)?))
    }

    /// Create a Unix socket listener
    #[cfg(unix)]
    pub fn unix(path: &str) -> io::Result<Self> {
        if let Some(dir) = std::path::Path::new(path).parent() {
            std::fs::create_dir_all(dir)?;
        }
        // Remove a stale socket file left by a previous run
        let _ = std::fs::remove_file(path);
        let listener = UnixListener::bind(path)?;
        Ok(Listener::Unix(listener))
    }

    /// Create a listener in the Linux abstract socket namespace
    #[cfg(target_os = "linux")]
    pub fn abstract_unix(name: &str) -> io::Result<Self> {
        use nix::sys::socket::*;
        use std::os::fd::AsRawFd;

        let fd = socket(
            AddressFamily::Unix,
            SockType::Stream,
            SockFlag::SOCK_CLOEXEC,
            None,
        )?;
        let addr = UnixAddr::new_abstract(name.as_bytes())?;
        bind(fd.as_raw_fd(), &addr)?;
        listen(&fd, Backlog::new(128)?)?;
        Ok(Listener::Unix(UnixListener::from(fd)))
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self {
            Listener::Tcp(listener) => listener.local_addr().ok(),
            #[cfg(unix)]
            Listener::Unix(_) => None,
        }
    }

    /// Accept a new connection
    pub fn accept(&self) -> io::Result<Connection> {
        match self {
            Listener::Tcp(listener) => {
                let (stream, _) = listener.accept()?;
                Ok(Connection::Tcp(stream))
            }
            #[cfg(unix)]
            Listener::Unix(listener) => {
                let (stream, _) = listener.accept()?;
                Ok(Connection::Unix(stream))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tcp_roundtrip_and_shutdown() {
        let listener = Listener::tcp_addr("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let mut client = TcpStream::connect(addr).unwrap();
        let server_side = listener.accept().unwrap();

        assert!(server_side.peer().is_local());
        assert!(server_side.peer().ip().is_some());

        let mut writer = server_side.try_clone().unwrap();
        writer.write_all(b"ping").unwrap();
        let mut buf = [0u8; 4];
        client.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");

        server_side.shutdown().unwrap();
        let mut reader = server_side;
        assert_eq!(reader.read(&mut buf).unwrap_or(0), 0);
    }
}
