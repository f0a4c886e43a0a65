//! Host based access control
//!
//! Connections over Unix sockets or loopback TCP are always accepted. Remote
//! TCP peers are checked against the host list while access control is
//! enabled.

use crate::connection::Peer;
use std::net::IpAddr;

/// Host family codes used by ListHosts / ChangeHosts
pub mod family {
    pub const INTERNET: u8 = 0;
    pub const DECNET: u8 = 1;
    pub const CHAOS: u8 = 2;
    pub const SERVER_INTERPRETED: u8 = 5;
    pub const INTERNET6: u8 = 6;
}

/// One entry of the host list as it appears on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    pub family: u8,
    pub address: Vec<u8>,
}

impl HostEntry {
    pub fn from_ip(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) => HostEntry {
                family: family::INTERNET,
                address: v4.octets().to_vec(),
            },
            IpAddr::V6(v6) => HostEntry {
                family: family::INTERNET6,
                address: v6.octets().to_vec(),
            },
        }
    }

    fn matches(&self, ip: IpAddr) -> bool {
        *self == HostEntry::from_ip(ip)
    }
}

/// Access control configuration and state
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    /// Whether remote peers must appear in `hosts`
    pub enabled: bool,

    /// Hosts allowed to connect while access control is enabled
    pub hosts: Vec<HostEntry>,

    /// Whether clients may edit the host list or toggle access control
    pub allow_client_changes: bool,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        AccessPolicy {
            enabled: true,
            hosts: Vec::new(),
            allow_client_changes: true,
        }
    }
}

impl AccessPolicy {
    /// Accept every peer (for testing)
    pub fn permissive() -> Self {
        AccessPolicy {
            enabled: false,
            hosts: Vec::new(),
            allow_client_changes: true,
        }
    }

    /// Local peers only, and clients cannot change that
    pub fn strict() -> Self {
        AccessPolicy {
            enabled: true,
            hosts: Vec::new(),
            allow_client_changes: false,
        }
    }

    /// Decide whether a new connection may proceed to the setup reply
    pub fn allows(&self, peer: &Peer) -> bool {
        if !self.enabled || peer.is_local() {
            return true;
        }
        match peer.ip() {
            Some(ip) => self.hosts.iter().any(|h| h.matches(ip)),
            None => true,
        }
    }

    pub fn add_host(&mut self, entry: HostEntry) {
        if !self.hosts.contains(&entry) {
            self.hosts.push(entry);
        }
    }

    pub fn remove_host(&mut self, entry: &HostEntry) {
        self.hosts.retain(|h| h != entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    fn remote(addr: &str) -> Peer {
        Peer::Tcp(addr.parse::<SocketAddr>().unwrap())
    }

    #[test]
    fn test_local_peers_always_allowed() {
        let policy = AccessPolicy::strict();
        assert!(policy.allows(&Peer::Local));
        assert!(policy.allows(&remote("127.0.0.1:4000")));
        assert!(!policy.allows(&remote("192.168.1.7:4000")));
    }

    #[test]
    fn test_host_list() {
        let mut policy = AccessPolicy::default();
        let peer = remote("10.0.0.5:4000");
        assert!(!policy.allows(&peer));

        let entry = HostEntry::from_ip("10.0.0.5".parse().unwrap());
        policy.add_host(entry.clone());
        policy.add_host(entry.clone());
        assert_eq!(policy.hosts.len(), 1);
        assert!(policy.allows(&peer));

        policy.remove_host(&entry);
        assert!(!policy.allows(&peer));

        policy.enabled = false;
        assert!(policy.allows(&peer));
    }
}
