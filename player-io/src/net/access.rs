//! Peer access control
//!
//! Peers are admitted by host name. The name is obtained by reverse lookup of
//! the peer address and must match an allow-list entry exactly.

use std::net::IpAddr;

/// Resolves a peer address to the name checked against the allow-list
pub trait HostResolver {
    fn resolve(&self, addr: IpAddr) -> String;
}

/// Reverse DNS lookup, falling back to the textual address
#[derive(Debug, Clone, Copy, Default)]
pub struct ReverseDnsResolver;

impl HostResolver for ReverseDnsResolver {
    fn resolve(&self, addr: IpAddr) -> String {
        match dns_lookup::lookup_addr(&addr) {
            Ok(name) => name,
            Err(e) => {
                log::debug!("Reverse lookup of {} failed: {}", addr, e);
                addr.to_string()
            }
        }
    }
}

/// Host names allowed to connect
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    hosts: Vec<String>,
}

impl AllowList {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: hosts.into_iter().map(Into::into).collect(),
        }
    }

    /// Exact match; an empty list admits nobody
    pub fn allows(&self, host: &str) -> bool {
        self.hosts.iter().any(|allowed| allowed == host)
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}
