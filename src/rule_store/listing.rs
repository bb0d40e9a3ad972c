use crate::rule_store::{Rule, RuleAction, RuleSource};
use crate::source_address::SourceAddress;
use ipnet::Ipv4Net;
use std::str::FromStr;

/// Extracts the guarded-port rules from `iptables -L <chain> -n --line-numbers` output.
///
/// Positions are chain positions, so they can be passed straight back to `-I` / `-D`.
pub fn parse_listing(output: &str, port: u16) -> Vec<Rule> {
    let port_match = format!("dpt:{}", port);

    output
        .lines()
        .filter_map(|line| {
            let tokens = line.split_whitespace().collect::<Vec<_>>();

            // Skips the "Chain ..." and column header lines
            let position = usize::from_str(tokens.first()?).ok()?;

            if !tokens.iter().any(|t| *t == port_match) {
                return None;
            }

            let action = match *tokens.get(1)? {
                "ACCEPT" => RuleAction::Accept,
                "DROP" => RuleAction::Drop,
                _ => return None,
            };

            // The "opt" column may be blank, so take the first address after "prot"
            let source = tokens.iter().skip(3).find_map(|t| parse_source(t))?;

            Some(Rule {
                position,
                action,
                source,
                port,
            })
        })
        .collect()
}

fn parse_source(token: &str) -> Option<RuleSource> {
    let net = if token.contains('/') {
        Ipv4Net::from_str(token).ok()?
    } else {
        Ipv4Net::from(std::net::Ipv4Addr::from_str(token).ok()?)
    };

    if net.prefix_len() == 0 {
        Some(RuleSource::Any)
    } else {
        Some(RuleSource::Address(SourceAddress::from_net(net)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
Chain INPUT (policy ACCEPT)
num  target     prot opt source               destination
1    ACCEPT     all  --  0.0.0.0/0            0.0.0.0/0            state RELATED,ESTABLISHED
2    ACCEPT     tcp  --  0.0.0.0/0            0.0.0.0/0            tcp dpt:22
3    ACCEPT     tcp  --  203.0.113.7          0.0.0.0/0            tcp dpt:1080
4    ACCEPT     tcp  --  198.51.100.0/24      0.0.0.0/0            tcp dpt:1080
5    REJECT     tcp  --  192.0.2.1            0.0.0.0/0            tcp dpt:1080 reject-with icmp-port-unreachable
6    ACCEPT     tcp  --  192.0.2.9            0.0.0.0/0            tcp dpt:10800
7    DROP       tcp  --  0.0.0.0/0            0.0.0.0/0            tcp dpt:1080
";

    fn address(s: &str) -> RuleSource {
        RuleSource::Address(SourceAddress::parse(s).unwrap())
    }

    #[test]
    fn guarded_port_rules_only() {
        let rules = parse_listing(LISTING, 1080);

        assert_eq!(
            rules,
            vec![
                Rule {
                    position: 3,
                    action: RuleAction::Accept,
                    source: address("203.0.113.7"),
                    port: 1080,
                },
                Rule {
                    position: 4,
                    action: RuleAction::Accept,
                    source: address("198.51.100.0/24"),
                    port: 1080,
                },
                Rule {
                    position: 7,
                    action: RuleAction::Drop,
                    source: RuleSource::Any,
                    port: 1080,
                },
            ]
        );
    }

    #[test]
    fn port_must_match_exactly() {
        let rules = parse_listing(LISTING, 10800);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].position, 6);
    }

    #[test]
    fn blank_opt_column() {
        let listing = "\
Chain INPUT (policy ACCEPT)
num  target     prot opt source               destination
1    ACCEPT     6        203.0.113.7          0.0.0.0/0            tcp dpt:1080
";
        let rules = parse_listing(listing, 1080);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].source, address("203.0.113.7"));
    }

    #[test]
    fn empty_chain() {
        assert!(parse_listing("Chain INPUT (policy DROP)\nnum  target     prot opt source               destination\n", 1080).is_empty());
        assert!(parse_listing("", 1080).is_empty());
    }
}
