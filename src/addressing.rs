//! Address planning — turns one range pattern into per-node identities.
//!
//! A range pattern is a CIDR interface address with a direction sign,
//! e.g. `192.168.1.100/24+`. Node `i` gets `base ± i` as a 32-bit
//! integer, and the whole batch must stay inside the usable hosts of
//! the base network or the plan is rejected before anything is written.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnetwork::Ipv4Network;
use serde::Serialize;

use crate::error::PlanError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increment,
    Decrement,
}

/// Parsed form of the `--ip-pattern` argument: the base interface
/// address with its network, plus the stepping direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSpec {
    pub range: Ipv4Network,
    pub direction: Direction,
}

impl FromStr for RangeSpec {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = |reason: &str| PlanError::MalformedPattern {
            pattern: s.to_string(),
            reason: reason.to_string(),
        };

        let s = s.trim();
        let (cidr, direction) = match s.strip_suffix('+') {
            Some(rest) => (rest, Direction::Increment),
            None => match s.strip_suffix('-') {
                Some(rest) => (rest, Direction::Decrement),
                None => return Err(malformed("must end with '+' or '-'")),
            },
        };

        let (addr, prefix) = cidr
            .split_once('/')
            .ok_or_else(|| malformed("expected 'A.B.C.D/N' before the direction sign"))?;

        let base_address: Ipv4Addr = addr
            .parse()
            .map_err(|_| malformed("not a valid IPv4 address"))?;

        let prefix_length: u8 = prefix
            .parse()
            .map_err(|_| malformed("prefix length must be 0-32"))?;

        let range = Ipv4Network::new(base_address, prefix_length)
            .map_err(|_| malformed("prefix length must be 0-32"))?;

        Ok(RangeSpec { range, direction })
    }
}

impl fmt::Display for RangeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = match self.direction {
            Direction::Increment => '+',
            Direction::Decrement => '-',
        };
        write!(f, "{}{}", self.range, sign)
    }
}

impl RangeSpec {
    pub fn base_address(&self) -> Ipv4Addr {
        self.range.ip()
    }

    pub fn prefix_length(&self) -> u8 {
        self.range.prefix()
    }

    /// Network address of the base /N.
    pub fn network(&self) -> Ipv4Addr {
        self.range.network()
    }

    /// Whether this range may hand out `addr`. The network and
    /// broadcast addresses are reserved for prefixes up to /30; /31
    /// and /32 networks have no such reservations (RFC 3021).
    fn is_usable(&self, addr: Ipv4Addr) -> bool {
        if !self.range.contains(addr) {
            return false;
        }
        self.range.prefix() >= 31
            || (addr != self.range.network() && addr != self.range.broadcast())
    }
}

/// One node's resolved addressing, ready for template rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkIdentity {
    pub address: Ipv4Addr,
    pub prefix_length: u8,
    pub gateway: Ipv4Addr,
    pub interface_name: String,
}

/// Resolve a pattern, gateway and node count into an ordered identity
/// sequence. Ordering is by ascending offset and is part of the
/// contract: downstream output directories are named in that order.
pub fn plan(
    pattern: &str,
    node_count: u32,
    gateway: &str,
    interface: &str,
) -> Result<Vec<NetworkIdentity>, PlanError> {
    let spec: RangeSpec = pattern.parse()?;
    let gateway: Ipv4Addr = gateway
        .parse()
        .map_err(|_| PlanError::InvalidGateway(gateway.to_string()))?;
    allocate(&spec, node_count, gateway, interface)
}

fn allocate(
    spec: &RangeSpec,
    node_count: u32,
    gateway: Ipv4Addr,
    interface: &str,
) -> Result<Vec<NetworkIdentity>, PlanError> {
    if node_count == 0 {
        return Err(PlanError::InvalidNodeCount);
    }

    let base = u32::from(spec.base_address());
    let mut identities = Vec::with_capacity(node_count as usize);

    for offset in 0..node_count {
        let value = match spec.direction {
            Direction::Increment => base.checked_add(offset),
            Direction::Decrement => base.checked_sub(offset),
        };
        let address = match value.map(Ipv4Addr::from) {
            Some(addr) if spec.is_usable(addr) => addr,
            _ => {
                return Err(PlanError::RangeExhausted {
                    offset,
                    network: spec.network(),
                    prefix_length: spec.prefix_length(),
                })
            }
        };
        identities.push(NetworkIdentity {
            address,
            prefix_length: spec.prefix_length(),
            gateway,
            interface_name: interface.to_string(),
        });
    }

    if let (Some(first), Some(last)) = (identities.first(), identities.last()) {
        tracing::debug!(
            pattern = %spec,
            nodes = node_count,
            first = %first.address,
            last = %last.address,
            "address plan resolved"
        );
    }

    Ok(identities)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addrs(identities: &[NetworkIdentity]) -> Vec<String> {
        identities.iter().map(|i| i.address.to_string()).collect()
    }

    #[test]
    fn increments_from_base() {
        let plan = plan("192.168.1.100/24+", 3, "192.168.1.1", "enp1s0").unwrap();
        assert_eq!(addrs(&plan), ["192.168.1.100", "192.168.1.101", "192.168.1.102"]);
        for identity in &plan {
            assert_eq!(identity.prefix_length, 24);
            assert_eq!(identity.gateway, Ipv4Addr::new(192, 168, 1, 1));
            assert_eq!(identity.interface_name, "enp1s0");
        }
    }

    #[test]
    fn decrements_from_base() {
        let plan = plan("10.0.0.50/24-", 2, "10.0.0.1", "enp1s0").unwrap();
        assert_eq!(addrs(&plan), ["10.0.0.50", "10.0.0.49"]);
    }

    #[test]
    fn addresses_are_pairwise_distinct() {
        let plan = plan("10.1.2.10/16+", 50, "10.1.0.1", "enp1s0").unwrap();
        assert_eq!(plan.len(), 50);
        let mut seen: Vec<_> = plan.iter().map(|i| i.address).collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 50);
    }

    #[test]
    fn plan_is_deterministic() {
        let a = plan("172.16.0.5/20+", 7, "172.16.0.1", "eth0").unwrap();
        let b = plan("172.16.0.5/20+", 7, "172.16.0.1", "eth0").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn octet_carry_follows_integer_arithmetic() {
        let plan = plan("10.0.0.254/16+", 3, "10.0.0.1", "enp1s0").unwrap();
        assert_eq!(addrs(&plan), ["10.0.0.254", "10.0.0.255", "10.0.1.0"]);
    }

    #[test]
    fn last_usable_host_succeeds() {
        let plan = plan("192.168.1.254/24+", 1, "192.168.1.1", "enp1s0").unwrap();
        assert_eq!(addrs(&plan), ["192.168.1.254"]);
    }

    #[test]
    fn stepping_onto_broadcast_is_exhausted() {
        let err = plan("192.168.1.254/24+", 2, "192.168.1.1", "enp1s0").unwrap_err();
        match err {
            PlanError::RangeExhausted { offset, network, prefix_length } => {
                assert_eq!(offset, 1);
                assert_eq!(network, Ipv4Addr::new(192, 168, 1, 0));
                assert_eq!(prefix_length, 24);
            }
            other => panic!("expected RangeExhausted, got {other:?}"),
        }
    }

    #[test]
    fn stepping_onto_network_address_is_exhausted() {
        let err = plan("10.0.0.1/24-", 2, "10.0.0.254", "enp1s0").unwrap_err();
        assert!(matches!(err, PlanError::RangeExhausted { offset: 1, .. }));
    }

    #[test]
    fn base_outside_usable_hosts_fails_at_offset_zero() {
        let err = plan("192.168.1.0/24+", 1, "192.168.1.1", "enp1s0").unwrap_err();
        assert!(matches!(err, PlanError::RangeExhausted { offset: 0, .. }));
    }

    #[test]
    fn slash_31_and_32_allocate_every_address() {
        let plan31 = plan("10.0.0.0/31+", 2, "10.0.0.2", "enp1s0").unwrap();
        assert_eq!(addrs(&plan31), ["10.0.0.0", "10.0.0.1"]);

        let plan32 = plan("10.0.0.7/32+", 1, "10.0.0.1", "enp1s0").unwrap();
        assert_eq!(addrs(&plan32), ["10.0.0.7"]);
        assert!(plan("10.0.0.7/32+", 2, "10.0.0.1", "enp1s0").is_err());
    }

    #[test]
    fn leaving_the_base_network_is_exhausted() {
        // 10.0.0.254 is usable under /24 but /25's range ends at .127.
        let err = plan("10.0.0.100/25+", 50, "10.0.0.1", "enp1s0").unwrap_err();
        assert!(matches!(err, PlanError::RangeExhausted { offset: 27, .. }));
    }

    #[test]
    fn u32_underflow_is_exhausted_not_wrapped() {
        // /31 makes 0.0.0.0 itself allocatable, so the second step is a
        // genuine checked_sub underflow rather than a reserved address.
        let err = plan("0.0.0.0/31-", 2, "10.0.0.1", "enp1s0").unwrap_err();
        assert!(matches!(err, PlanError::RangeExhausted { offset: 1, .. }));
    }

    #[test]
    fn u32_overflow_is_exhausted_not_wrapped() {
        let err = plan("255.255.255.255/31+", 2, "10.0.0.1", "enp1s0").unwrap_err();
        assert!(matches!(err, PlanError::RangeExhausted { offset: 1, .. }));
    }

    #[test]
    fn zero_nodes_is_invalid() {
        assert!(matches!(
            plan("192.168.1.100/24+", 0, "192.168.1.1", "enp1s0"),
            Err(PlanError::InvalidNodeCount)
        ));
    }

    #[test]
    fn pattern_without_direction_sign_is_malformed() {
        assert!(matches!(
            plan("192.168.1.100/24", 1, "192.168.1.1", "enp1s0"),
            Err(PlanError::MalformedPattern { .. })
        ));
    }

    #[test]
    fn malformed_patterns_are_rejected() {
        for pattern in [
            "192.168.1.100+",      // no prefix
            "192.168.1.300/24+",   // octet out of range
            "192.168.1/24+",       // too few octets
            "192.168.1.100/33+",   // prefix out of range
            "192.168.1.100/ab+",   // non-numeric prefix
            "+",
            "",
        ] {
            assert!(
                matches!(
                    plan(pattern, 1, "192.168.1.1", "enp1s0"),
                    Err(PlanError::MalformedPattern { .. })
                ),
                "expected malformed-pattern for {pattern:?}"
            );
        }
    }

    #[test]
    fn gateway_must_be_an_address() {
        assert!(matches!(
            plan("192.168.1.100/24+", 1, "not-an-ip", "enp1s0"),
            Err(PlanError::InvalidGateway(g)) if g == "not-an-ip"
        ));
    }

    #[test]
    fn range_spec_round_trips_through_display() {
        let spec: RangeSpec = "192.168.1.100/24+".parse().unwrap();
        assert_eq!(spec.to_string(), "192.168.1.100/24+");
        assert_eq!(spec.direction, Direction::Increment);
        assert_eq!(spec.network(), Ipv4Addr::new(192, 168, 1, 0));
    }
}
