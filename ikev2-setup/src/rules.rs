//! UFW rule blocks and sysctl toggles that route VPN client traffic.

use ipnetwork::Ipv4Network;
use ufw_patch_core::{AnchorPoint, LinePattern, RuleBlock, SysctlToggle};

pub const FILTER_HEADER: &str = "*filter";
pub const NOT_LOCAL_CHAIN: &str = ":ufw-not-local - [0:0]";
pub const FORWARD_IN_MARKER: &str = "-A ufw-before-forward --match policy --pol ipsec --dir in";

/// Blocks for `/etc/ufw/before.rules`, in insertion order.
///
/// The NAT and mangle tables go in front of `*filter`; the two ESP
/// policy-match accepts go right after the `ufw-not-local` chain declaration.
pub fn before_rules_blocks(subnet: &Ipv4Network, iface: &str) -> Vec<RuleBlock> {
    vec![nat_block(subnet, iface), mangle_block(subnet, iface), forward_block(subnet)]
}

pub fn nat_block(subnet: &Ipv4Network, iface: &str) -> RuleBlock {
    RuleBlock::new(
        "nat",
        LinePattern::exact("*nat"),
        AnchorPoint::before(LinePattern::prefix(FILTER_HEADER)),
        [
            "*nat".to_string(),
            format!("-A POSTROUTING -s {subnet} -o {iface} -m policy --pol ipsec --dir out -j ACCEPT"),
            format!("-A POSTROUTING -s {subnet} -o {iface} -j MASQUERADE"),
            "COMMIT".to_string(),
            String::new(),
        ],
    )
}

pub fn mangle_block(subnet: &Ipv4Network, iface: &str) -> RuleBlock {
    RuleBlock::new(
        "mangle",
        LinePattern::exact("*mangle"),
        AnchorPoint::before(LinePattern::prefix(FILTER_HEADER)),
        [
            "*mangle".to_string(),
            format!(
                "-A FORWARD --match policy --pol ipsec --dir in -s {subnet} -o {iface} -p tcp -m tcp --tcp-flags SYN,RST SYN -m tcpmss --mss 1361:1536 -j TCPMSS --set-mss 1360"
            ),
            "COMMIT".to_string(),
            String::new(),
        ],
    )
}

pub fn forward_block(subnet: &Ipv4Network) -> RuleBlock {
    RuleBlock::new(
        "ipsec-forward",
        LinePattern::contains(FORWARD_IN_MARKER),
        AnchorPoint::after(LinePattern::contains(NOT_LOCAL_CHAIN)),
        [
            format!("{FORWARD_IN_MARKER} --proto esp -s {subnet} -j ACCEPT"),
            format!("-A ufw-before-forward --match policy --pol ipsec --dir out --proto esp -d {subnet} -j ACCEPT"),
        ],
    )
}

/// Kernel switches for `/etc/ufw/sysctl.conf`: forward packets, ignore and
/// don't send ICMP redirects, and skip path MTU discovery.
pub fn sysctl_toggles() -> Vec<SysctlToggle> {
    vec![
        SysctlToggle::new("net/ipv4/ip_forward", "1"),
        SysctlToggle::new("net/ipv4/conf/all/accept_redirects", "0"),
        SysctlToggle::new("net/ipv4/conf/all/send_redirects", "0"),
        SysctlToggle::new("net/ipv4/ip_no_pmtu_disc", "1"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subnet() -> Ipv4Network {
        "10.10.10.0/24".parse().expect("cidr")
    }

    #[test]
    fn nat_block_substitutes_subnet_and_interface() {
        let block = nat_block(&subnet(), "ens3");
        assert_eq!(
            block.lines[2],
            "-A POSTROUTING -s 10.10.10.0/24 -o ens3 -j MASQUERADE"
        );
        assert_eq!(block.lines[3], "COMMIT");
    }

    #[test]
    fn forward_block_contains_its_own_marker() {
        let block = forward_block(&subnet());
        assert!(block.marker.matches(&block.lines[0]));
        assert!(!block.marker.matches(&block.lines[1]));
    }

    #[test]
    fn every_block_is_detected_by_its_marker() {
        for block in before_rules_blocks(&subnet(), "eth0") {
            assert_eq!(block.marker.count(&block.lines), 1, "{}", block.name);
        }
    }
}
