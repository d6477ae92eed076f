//! Gateway network interface topology and subnet resolution.
//!
//! The gateway interface definition file declares, per subnet, a broadcast
//! address and one interface address per gateway host:
//!
//! ```text
//! export MFX_BC=172.21.75.255
//! export MFX_IF01=172.21.72.10
//! ```
//!
//! `<SUBNET>_BC` lines define subnets, `<SUBNET>_IF<NN>` lines attach an
//! interface on that subnet to gateway host `<prefix><NN>`. Netmasks are not
//! declared and are back-filled by guessing against the known broadcast
//! address.

mod cache;

use std::collections::{BTreeMap, HashMap};
use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};
use std::path::Path;
use std::sync::Mutex;

use ipnetwork::Ipv4Network;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::{GatewayError, Result};
use cache::BoundedCache;

static IP_VARIABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^export\s+([^= ]+)\s*=\s*(\d+\.\d+\.\d+\.\d+)").unwrap());
static BROADCAST: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.+)_BC$").unwrap());
static INTERFACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.+)_IF(\d{2})$").unwrap());

/// Subnets reserved for accelerator-side traffic; never candidates here
const IGNORE_SUBNETS: &[&str] = &["mcc", "mcc1", "mcc2"];

/// Netmasks in use on the gateway networks, tried in order when back-filling
const MASK_GUESSES: [Ipv4Addr; 2] = [
    Ipv4Addr::new(255, 255, 252, 0),
    Ipv4Addr::new(255, 255, 255, 0),
];

const DEFAULT_GATEWAY_HOST_PREFIX: &str = "pscag";
const HOSTNAME_CACHE_CAPACITY: usize = 1000;

/// Hostname to IPv4 address resolution seam.
///
/// Production uses the operating system's resolver; tests supply a fixed
/// table. Client identity is always passed explicitly, never read from or
/// written to process-global state.
pub trait HostResolver: Send + Sync {
    fn resolve(&self, hostname: &str) -> Result<Ipv4Addr>;
}

/// Resolver backed by the operating system name service
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl HostResolver for SystemResolver {
    fn resolve(&self, hostname: &str) -> Result<Ipv4Addr> {
        let addrs = (hostname, 0u16)
            .to_socket_addrs()
            .map_err(|err| GatewayError::subnet(format!("could not resolve {hostname}: {err}")))?;
        for addr in addrs {
            if let IpAddr::V4(ip) = addr.ip() {
                return Ok(ip);
            }
        }
        Err(GatewayError::subnet(format!(
            "no IPv4 address found for {hostname}"
        )))
    }
}

/// Fixed-table resolver for tests and offline evaluation
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    table: HashMap<String, Ipv4Addr>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<S: Into<String>>(&mut self, hostname: S, ip: Ipv4Addr) {
        self.table.insert(hostname.into(), ip);
    }
}

impl<S: Into<String>> FromIterator<(S, Ipv4Addr)> for StaticResolver {
    fn from_iter<I: IntoIterator<Item = (S, Ipv4Addr)>>(iter: I) -> Self {
        Self {
            table: iter.into_iter().map(|(host, ip)| (host.into(), ip)).collect(),
        }
    }
}

impl HostResolver for StaticResolver {
    fn resolve(&self, hostname: &str) -> Result<Ipv4Addr> {
        self.table.get(hostname).copied().ok_or_else(|| {
            GatewayError::subnet(format!("could not resolve {hostname}: unknown host"))
        })
    }
}

/// One named network segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetInfo {
    pub name: String,
    pub mask: Ipv4Addr,
    pub bcaddr: Ipv4Addr,
}

impl SubnetInfo {
    /// True if the given IP is on this subnet
    pub fn contains_ip(&self, ipaddr: Ipv4Addr) -> bool {
        broadcast_of(ipaddr, self.mask) == Some(self.bcaddr)
    }
}

fn broadcast_of(ipaddr: Ipv4Addr, mask: Ipv4Addr) -> Option<Ipv4Addr> {
    Ipv4Network::with_netmask(ipaddr, mask)
        .ok()
        .map(|net| net.broadcast())
}

fn guess_mask(ipaddr: Ipv4Addr, bcaddr: Ipv4Addr) -> Option<Ipv4Addr> {
    MASK_GUESSES
        .into_iter()
        .find(|mask| broadcast_of(ipaddr, *mask) == Some(bcaddr))
}

/// Parsed gateway interface topology with a bounded hostname lookup cache.
///
/// Immutable once constructed; reloading the interface file means building a
/// new instance, which also starts the cache fresh.
pub struct InterfaceConfig {
    subnets: BTreeMap<String, SubnetInfo>,
    /// gateway host -> subnet name -> interface address
    hosts: BTreeMap<String, BTreeMap<String, Ipv4Addr>>,
    hostname_cache: Mutex<BoundedCache>,
    resolver: Box<dyn HostResolver>,
}

impl std::fmt::Debug for InterfaceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterfaceConfig")
            .field("subnets", &self.subnets)
            .field("hosts", &self.hosts)
            .finish()
    }
}

impl InterfaceConfig {
    /// Load the interface definition file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse interface definitions with the default gateway host prefix
    pub fn parse(contents: &str) -> Result<Self> {
        Self::parse_with_host_prefix(contents, DEFAULT_GATEWAY_HOST_PREFIX)
    }

    /// Parse interface definitions, naming gateway hosts `<prefix><NN>`
    pub fn parse_with_host_prefix(contents: &str, host_prefix: &str) -> Result<Self> {
        let lines: Vec<&str> = contents.lines().map(str::trim).collect();

        // Subnet broadcast definitions come first
        let mut bcaddrs: BTreeMap<String, Ipv4Addr> = BTreeMap::new();
        for line in &lines {
            let Some(captures) = IP_VARIABLE.captures(line) else {
                continue;
            };
            let var = &captures[1];
            let Some(subnet_match) = BROADCAST.captures(var) else {
                continue;
            };
            let subnet = subnet_match[1].to_lowercase();
            if IGNORE_SUBNETS.contains(&subnet.as_str()) {
                continue;
            }
            let bcaddr = parse_ipv4(&captures[2])?;
            bcaddrs.insert(subnet, bcaddr);
        }

        // Then the per-host interface definitions
        let mut hosts: BTreeMap<String, BTreeMap<String, Ipv4Addr>> = BTreeMap::new();
        for line in &lines {
            let Some(captures) = IP_VARIABLE.captures(line) else {
                continue;
            };
            let var = &captures[1];
            let Some(if_match) = INTERFACE.captures(var) else {
                continue;
            };
            let subnet = if_match[1].to_lowercase();
            if IGNORE_SUBNETS.contains(&subnet.as_str()) {
                continue;
            }
            if !bcaddrs.contains_key(&subnet) {
                warn!(subnet = %subnet, "interface on a subnet with no broadcast definition");
                continue;
            }
            let host = format!("{host_prefix}{}", &if_match[2]);
            let ipaddr = parse_ipv4(&captures[2])?;
            hosts.entry(host).or_default().insert(subnet, ipaddr);
        }

        // Back-fill netmasks from any interface address on each subnet;
        // subnets with no gateway interface are dropped
        let mut subnets = BTreeMap::new();
        for (name, bcaddr) in &bcaddrs {
            let Some(if_addr) = hosts
                .values()
                .filter_map(|interfaces| interfaces.get(name))
                .next()
            else {
                continue;
            };
            let mask = guess_mask(*if_addr, *bcaddr).ok_or_else(|| {
                GatewayError::subnet(format!(
                    "could not find a valid netmask for ip={if_addr}, bc={bcaddr}"
                ))
            })?;
            subnets.insert(
                name.clone(),
                SubnetInfo {
                    name: name.clone(),
                    mask,
                    bcaddr: *bcaddr,
                },
            );
        }

        Ok(Self {
            subnets,
            hosts,
            hostname_cache: Mutex::new(BoundedCache::new(HOSTNAME_CACHE_CAPACITY)),
            resolver: Box::new(SystemResolver),
        })
    }

    /// Replace the hostname resolver, for tests or custom name services
    pub fn with_resolver(mut self, resolver: Box<dyn HostResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Known subnets by name
    pub fn subnets(&self) -> impl Iterator<Item = &SubnetInfo> {
        self.subnets.values()
    }

    pub fn subnet(&self, name: &str) -> Option<&SubnetInfo> {
        self.subnets.get(name)
    }

    /// Name of the subnet containing the given address
    pub fn subnet_from_ip(&self, ipaddr: Ipv4Addr) -> Result<&str> {
        self.subnets
            .values()
            .find(|info| info.contains_ip(ipaddr))
            .map(|info| info.name.as_str())
            .ok_or_else(|| {
                GatewayError::subnet(format!("received address {ipaddr} outside known subnets"))
            })
    }

    /// Name of the subnet the given host lives on.
    ///
    /// Results are memoized in a bounded cache; negative results are not
    /// cached, so a host added to DNS later resolves on retry.
    pub fn subnet_from_hostname(&self, hostname: &str) -> Result<String> {
        if let Ok(cached) = self.hostname_cache.lock() {
            if let Some(subnet) = cached.get(hostname) {
                return Ok(subnet.to_string());
            }
        }
        let ipaddr = self.resolver.resolve(hostname)?;
        let subnet = self.subnet_from_ip(ipaddr)?.to_string();
        debug!(host = %hostname, %ipaddr, subnet = %subnet, "resolved host subnet");
        if let Ok(mut cache) = self.hostname_cache.lock() {
            cache.insert(hostname.to_string(), subnet.clone());
        }
        Ok(subnet)
    }

    /// The gateway host carrying an interface on the given subnet
    pub fn gateway_host_for_subnet(&self, subnet: &str) -> Option<&str> {
        self.hosts
            .iter()
            .find(|(_, interfaces)| interfaces.contains_key(subnet))
            .map(|(host, _)| host.as_str())
    }

    /// Attribute a pvlist file to a subnet by its basename prefix.
    ///
    /// The longest matching subnet name wins so e.g. `kfe2` files are not
    /// claimed by a `kfe` subnet.
    pub fn attributed_subnet(&self, file: &Path) -> Option<&str> {
        self.subnets
            .keys()
            .filter(|name| crate::model::file_matches_subnet(file, name))
            .max_by_key(|name| name.len())
            .map(String::as_str)
    }
}

fn parse_ipv4(text: &str) -> Result<Ipv4Addr> {
    text.parse()
        .map_err(|_| GatewayError::subnet(format!("invalid IPv4 address {text:?}")))
}
