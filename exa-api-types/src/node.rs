use std::fmt;
use std::net::IpAddr;

use anyhow::{bail, format_err, Error};

#[derive(Debug, Clone, PartialEq, Eq)]
/// Address of a node in one network, either a whole network in CIDR notation
/// or a single IP whose netmask is managed elsewhere.
pub enum NetAddress {
    Net(String),
    Ip(String),
}

impl NetAddress {
    /// Create a network address, replacing `x`/`X` in the address part with the node id.
    pub fn net_for_node(template: &str, node_id: u64) -> Result<Self, Error> {
        let (addr, prefix) = template
            .split_once('/')
            .ok_or_else(|| format_err!("missing netmask in network '{}'", template))?;

        let id = node_id.to_string();
        let addr = addr.replace(['x', 'X'], &id);

        let cidr = format!("{}/{}", addr, prefix);
        Self::net(&cidr)
    }

    pub fn net(cidr: &str) -> Result<Self, Error> {
        let (addr, prefix) = cidr
            .split_once('/')
            .ok_or_else(|| format_err!("missing netmask in network '{}'", cidr))?;

        let addr: IpAddr = addr
            .parse()
            .map_err(|err| format_err!("invalid network '{}' - {}", cidr, err))?;
        let prefix: u8 = prefix
            .parse()
            .map_err(|err| format_err!("invalid netmask in network '{}' - {}", cidr, err))?;

        let max = if addr.is_ipv4() { 32 } else { 128 };
        if prefix > max {
            bail!("invalid netmask in network '{}' - must be <= {}", cidr, max);
        }

        Ok(NetAddress::Net(cidr.to_string()))
    }

    pub fn ip(addr: &str) -> Result<Self, Error> {
        if let Err(err) = addr.parse::<IpAddr>() {
            bail!("invalid IP address '{}' - {}", addr, err);
        }
        Ok(NetAddress::Ip(addr.to_string()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            NetAddress::Net(s) | NetAddress::Ip(s) => s,
        }
    }
}

impl fmt::Display for NetAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A storage disk of a node, made of devices.
pub struct Disk {
    pub name: String,
    pub component: String,
    pub devices: Vec<String>,
    pub drives: Vec<String>,
    /// Directory for devices not located in the default storage directory.
    pub mapping: Vec<(String, String)>,
}

impl Disk {
    pub fn new(name: &str, component: &str) -> Self {
        Self {
            name: name.to_string(),
            component: component.to_string(),
            devices: Vec::new(),
            drives: Vec::new(),
            mapping: Vec::new(),
        }
    }

    pub fn has_device(&self, device: &str) -> bool {
        self.devices.iter().any(|d| d == device)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Cluster node.
pub struct Node {
    pub id: u64,
    pub name: String,
    pub uuid: String,
    pub private: Option<NetAddress>,
    pub public: Option<NetAddress>,
    pub disks: Vec<Disk>,
}

impl Node {
    pub fn disk(&self, name: &str) -> Option<&Disk> {
        self.disks.iter().find(|d| d.name == name)
    }

    pub fn disk_mut(&mut self, name: &str) -> Option<&mut Disk> {
        self.disks.iter_mut().find(|d| d.name == name)
    }
}
