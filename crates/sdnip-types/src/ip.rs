//! IP address and prefix types with safe parsing.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// An IP address that can be either IPv4 or IPv6.
///
/// Ordering puts every IPv4 address before every IPv6 address, which keeps
/// table dumps stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum IpAddress {
    V4(Ipv4Addr),
    V6(Ipv6Addr),
}

impl IpAddress {
    pub const fn is_ipv4(&self) -> bool {
        matches!(self, IpAddress::V4(_))
    }

    pub const fn is_ipv6(&self) -> bool {
        matches!(self, IpAddress::V6(_))
    }

    /// Returns true for 0.0.0.0 and ::.
    pub fn is_unspecified(&self) -> bool {
        match self {
            IpAddress::V4(addr) => addr.is_unspecified(),
            IpAddress::V6(addr) => addr.is_unspecified(),
        }
    }

    /// Width of the address in bits (32 or 128).
    pub const fn width(&self) -> u8 {
        match self {
            IpAddress::V4(_) => 32,
            IpAddress::V6(_) => 128,
        }
    }

    fn to_bits(self) -> u128 {
        match self {
            IpAddress::V4(addr) => u32::from(addr) as u128,
            IpAddress::V6(addr) => u128::from(addr),
        }
    }

    fn from_bits(template: IpAddress, bits: u128) -> IpAddress {
        match template {
            IpAddress::V4(_) => IpAddress::V4(Ipv4Addr::from(bits as u32)),
            IpAddress::V6(_) => IpAddress::V6(Ipv6Addr::from(bits)),
        }
    }
}

impl fmt::Display for IpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpAddress::V4(addr) => addr.fmt(f),
            IpAddress::V6(addr) => addr.fmt(f),
        }
    }
}

impl FromStr for IpAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<IpAddr>()
            .map(IpAddress::from)
            .map_err(|_| ParseError::InvalidIpAddress(s.to_string()))
    }
}

impl TryFrom<String> for IpAddress {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<IpAddress> for String {
    fn from(addr: IpAddress) -> String {
        addr.to_string()
    }
}

impl From<IpAddr> for IpAddress {
    fn from(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(v4) => IpAddress::V4(v4),
            IpAddr::V6(v6) => IpAddress::V6(v6),
        }
    }
}

impl From<Ipv4Addr> for IpAddress {
    fn from(addr: Ipv4Addr) -> Self {
        IpAddress::V4(addr)
    }
}

impl From<Ipv6Addr> for IpAddress {
    fn from(addr: Ipv6Addr) -> Self {
        IpAddress::V6(addr)
    }
}

/// An IP prefix in CIDR notation (e.g., 10.0.0.0/24 or 2001:db8::/32).
///
/// The address is kept exactly as given; [`IpPrefix::network`] yields the
/// masked form. Equality is structural, so `10.0.0.1/24 != 10.0.0.0/24`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IpPrefix {
    address: IpAddress,
    prefix_len: u8,
}

impl IpPrefix {
    /// Creates a new IP prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix length exceeds the address width.
    pub fn new(address: IpAddress, prefix_len: u8) -> Result<Self, ParseError> {
        if prefix_len > address.width() {
            return Err(ParseError::InvalidIpPrefix(format!(
                "prefix length {} exceeds maximum {} for address type",
                prefix_len,
                address.width()
            )));
        }

        Ok(IpPrefix {
            address,
            prefix_len,
        })
    }

    /// Creates a host prefix (/32 or /128) covering exactly `address`.
    pub fn host(address: IpAddress) -> Self {
        IpPrefix {
            address,
            prefix_len: address.width(),
        }
    }

    pub const fn address(&self) -> &IpAddress {
        &self.address
    }

    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    pub const fn is_ipv4(&self) -> bool {
        self.address.is_ipv4()
    }

    pub const fn is_host_route(&self) -> bool {
        self.prefix_len == self.address.width()
    }

    pub fn is_default(&self) -> bool {
        self.prefix_len == 0
    }

    fn mask(&self) -> u128 {
        let width = u32::from(self.address.width());
        let full = if width == 128 {
            u128::MAX
        } else {
            (1u128 << width) - 1
        };
        if self.prefix_len == 0 {
            return 0;
        }
        let host_bits = width - u32::from(self.prefix_len);
        full & !((1u128 << host_bits) - 1)
    }

    /// Returns the prefix with all host bits cleared.
    pub fn network(&self) -> IpPrefix {
        let bits = self.address.to_bits() & self.mask();
        IpPrefix {
            address: IpAddress::from_bits(self.address, bits),
            prefix_len: self.prefix_len,
        }
    }

    /// Returns the dotted netmask for this prefix.
    pub fn netmask(&self) -> IpAddress {
        IpAddress::from_bits(self.address, self.mask())
    }

    /// Returns true if `addr` falls inside this prefix.
    ///
    /// Addresses of the other family are never contained.
    pub fn contains(&self, addr: &IpAddress) -> bool {
        if addr.is_ipv4() != self.address.is_ipv4() {
            return false;
        }
        let mask = self.mask();
        (addr.to_bits() & mask) == (self.address.to_bits() & mask)
    }

    /// Returns true if `other` is equal to or a subnet of this prefix.
    pub fn covers(&self, other: &IpPrefix) -> bool {
        other.prefix_len >= self.prefix_len && self.contains(&other.address)
    }
}

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

impl FromStr for IpPrefix {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // A bare address is accepted as a host route
        let Some((addr_str, len_str)) = s.rsplit_once('/') else {
            return s.parse().map(IpPrefix::host);
        };

        let address: IpAddress = addr_str.parse()?;
        let prefix_len: u8 = len_str
            .parse()
            .map_err(|_| ParseError::InvalidIpPrefix(s.to_string()))?;

        IpPrefix::new(address, prefix_len)
    }
}

impl TryFrom<String> for IpPrefix {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<IpPrefix> for String {
    fn from(prefix: IpPrefix) -> String {
        prefix.to_string()
    }
}
