//! Network utilities for IP detection and port probing

use std::net::{IpAddr, Ipv4Addr, TcpListener};

/// Network utility functions
pub struct NetworkUtils;

impl NetworkUtils {
    /// Get list of non-loopback local IP addresses
    pub fn get_local_ips() -> Vec<IpAddr> {
        let mut ips: Vec<IpAddr> = local_ip_address::list_afinet_netifas()
            .map(|interfaces| {
                interfaces
                    .into_iter()
                    .map(|(_, ip)| ip)
                    .filter(|ip| !ip.is_loopback() && !Self::is_link_local(ip))
                    .collect()
            })
            .unwrap_or_default();

        ips.sort();
        ips.dedup();
        ips
    }

    /// Best guess for the address the host is reached on
    ///
    /// The default-route address wins; otherwise the first non-private
    /// interface address, then any interface address.
    pub fn detect_primary_ip() -> Option<IpAddr> {
        if let Ok(ip) = local_ip_address::local_ip()
            && !ip.is_loopback()
        {
            return Some(ip);
        }
        Self::pick_primary(&Self::get_local_ips())
    }

    fn pick_primary(candidates: &[IpAddr]) -> Option<IpAddr> {
        candidates
            .iter()
            .find(|ip| !Self::is_private(ip))
            .or_else(|| candidates.first())
            .copied()
    }

    fn is_private(ip: &IpAddr) -> bool {
        match ip {
            IpAddr::V4(v4) => v4.is_private(),
            IpAddr::V6(v6) => (v6.segments()[0] & 0xfe00) == 0xfc00,
        }
    }

    fn is_link_local(ip: &IpAddr) -> bool {
        match ip {
            IpAddr::V4(v4) => v4.is_link_local(),
            IpAddr::V6(v6) => (v6.segments()[0] & 0xffc0) == 0xfe80,
        }
    }

    /// Whether a TCP port can currently be bound on all interfaces
    pub fn is_port_free(port: u16) -> bool {
        TcpListener::bind((IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)).is_ok()
    }
}
