use crate::error::CoreError;
use ipnet::Ipv4Net;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// A validated IPv4 source: a single host or a CIDR block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceAddress {
    net: Ipv4Net,
}

impl SourceAddress {
    /// Accepts a strict dotted quad, optionally followed by `/0` to `/32`.
    pub fn parse(input: &str) -> Result<Self, CoreError> {
        let invalid = || CoreError::InvalidAddress(input.to_string());

        let (address, prefix) = match input.split_once('/') {
            Some((address, prefix)) => (address, Some(prefix)),
            None => (input, None),
        };

        let address = Ipv4Addr::from_str(address).map_err(|_| invalid())?;

        let prefix_len = match prefix {
            None => 32,
            Some(prefix) => {
                // u8::from_str would accept "+8" and "08"
                if prefix.is_empty()
                    || prefix.len() > 2
                    || (prefix.len() > 1 && prefix.starts_with('0'))
                    || !prefix.bytes().all(|b| b.is_ascii_digit())
                {
                    return Err(invalid());
                }
                prefix.parse::<u8>().map_err(|_| invalid())?
            }
        };

        let net = Ipv4Net::new(address, prefix_len).map_err(|_| invalid())?;
        Ok(Self { net })
    }

    pub fn from_net(net: Ipv4Net) -> Self {
        Self { net }
    }

    /// The network this source covers, with host bits cleared. This is how iptables reports it.
    pub fn network(&self) -> Ipv4Net {
        self.net.trunc()
    }

    /// `true` for any `/0` block, which covers every address.
    pub fn is_any(&self) -> bool {
        self.net.prefix_len() == 0
    }

    pub fn matches(&self, other: &SourceAddress) -> bool {
        self.network() == other.network()
    }
}

impl fmt::Display for SourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.net.prefix_len() == 32 {
            write!(f, "{}", self.net.addr())
        } else {
            write!(f, "{}", self.net)
        }
    }
}
