//! Realtime-blacklist query helpers.

use std::net::Ipv4Addr;

use super::types::RblServer;

/// Zones consulted by default. An address counts as listed only when every
/// zone has a record for it.
pub(crate) fn default_servers() -> Vec<RblServer> {
    vec![
        RblServer::new("zen.spamhaus.org", "https://check.spamhaus.org/query"),
        RblServer::new("bl.spamcop.net", "https://www.spamcop.net/bl.shtml"),
    ]
}

/// `192.0.2.44` → `44.2.0.192`, the label order RBL zones expect.
pub(crate) fn reverse_octets(ip: Ipv4Addr) -> String {
    let [a, b, c, d] = ip.octets();
    format!("{d}.{c}.{b}.{a}")
}

/// The review page for a listing, with the original address appended.
pub(crate) fn listing_url(server: &RblServer, ip: Ipv4Addr) -> String {
    format!("{}?ip={ip}", server.lookup_url)
}
