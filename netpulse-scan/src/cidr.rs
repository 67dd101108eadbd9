// ---------------------------------------------------------------------------
// CIDR parsing and host expansion
// ---------------------------------------------------------------------------

use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;

use crate::ScanError;

/// Parse strict `a.b.c.d/prefix` notation into a normalized network.
///
/// The prefix is mandatory (a bare address is rejected) and must be in
/// `[0, 32]`. Host bits below the prefix are zeroed so `10.0.0.7/24`
/// normalizes to `10.0.0.0/24`.
pub fn parse(cidr: &str) -> Result<Ipv4Network, ScanError> {
    let cidr = cidr.trim();
    if !cidr.contains('/') {
        return Err(ScanError::InvalidCidr(cidr.to_string()));
    }

    let network: Ipv4Network = cidr
        .parse()
        .map_err(|_| ScanError::InvalidCidr(cidr.to_string()))?;

    // Re-anchor on the network address so expansion starts at the base.
    Ipv4Network::new(network.network(), network.prefix())
        .map_err(|_| ScanError::InvalidCidr(cidr.to_string()))
}

/// Whether an address is the network or broadcast address of its range.
pub fn is_special_address(ip: Ipv4Addr, network: &Ipv4Network) -> bool {
    ip == network.network() || ip == network.broadcast()
}

/// Enumerate the usable host addresses of a network, ascending.
///
/// For prefixes up to /30 the network and broadcast addresses are
/// excluded; /31 point-to-point pairs and /32 single hosts include every
/// address.
pub fn expand(network: &Ipv4Network) -> Vec<Ipv4Addr> {
    if network.prefix() <= 30 {
        network
            .iter()
            .filter(|ip| !is_special_address(*ip, network))
            .collect()
    } else {
        network.iter().collect()
    }
}

/// Parse and expand in one step.
pub fn expand_cidr(cidr: &str) -> Result<Vec<Ipv4Addr>, ScanError> {
    let network = parse(cidr)?;
    Ok(expand(&network))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_normalizes_host_bits() {
        let network = parse("192.168.1.77/24").unwrap();
        assert_eq!(network.network(), Ipv4Addr::new(192, 168, 1, 0));
        assert_eq!(network.prefix(), 24);
    }

    #[test]
    fn parse_rejects_garbage() {
        for bad in [
            "",
            "10.0.0.0",
            "10.0.0.0/33",
            "10.0.0/24",
            "256.0.0.1/8",
            "hosts/24",
            "10.0.0.0/24/8",
            "10.0.0.0/-1",
        ] {
            assert!(parse(bad).is_err(), "expected rejection of {bad:?}");
        }
    }

    #[test]
    fn parse_trims_whitespace() {
        assert!(parse("  10.0.0.0/24  ").is_ok());
    }

    #[test]
    fn slash_24_has_254_hosts() {
        let hosts = expand_cidr("192.168.1.0/24").unwrap();
        assert_eq!(hosts.len(), 254);
        assert_eq!(hosts[0], Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(hosts[253], Ipv4Addr::new(192, 168, 1, 254));
    }

    #[test]
    fn slash_30_excludes_network_and_broadcast() {
        let hosts = expand_cidr("10.0.0.0/30").unwrap();
        assert_eq!(
            hosts,
            vec![Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2)]
        );
    }

    #[test]
    fn slash_31_keeps_both_addresses() {
        let hosts = expand_cidr("10.0.0.0/31").unwrap();
        assert_eq!(
            hosts,
            vec![Ipv4Addr::new(10, 0, 0, 0), Ipv4Addr::new(10, 0, 0, 1)]
        );
    }

    #[test]
    fn slash_32_is_single_host() {
        let hosts = expand_cidr("172.16.5.9/32").unwrap();
        assert_eq!(hosts, vec![Ipv4Addr::new(172, 16, 5, 9)]);
    }

    #[test]
    fn expansion_is_ascending() {
        let hosts = expand_cidr("10.1.0.0/23").unwrap();
        assert_eq!(hosts.len(), 510);
        assert!(hosts.windows(2).all(|w| u32::from(w[0]) < u32::from(w[1])));
    }
}
