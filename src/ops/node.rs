use std::collections::HashSet;

use exa_api_types::{Disk, NetAddress, Node};
use exa_buildcfg::{DEFAULT_DISK_COMPONENT, FIRST_NODE_ID};
use exa_config::{config_parse_err, integrity_err, not_found, ConfigError, ExaConf};
use exa_tools::crypt::generate_node_uuid;

use super::{check_unused, select_keys};

/// Disk selector of [`remove_node_disk`] matching every disk of the node.
pub const ALL_DISKS: &str = "all";

#[derive(Debug, Default, Clone)]
/// Network changes applied by [`modify_node`].
pub struct NodeUpdate {
    pub priv_net: Option<String>,
    pub priv_ip: Option<String>,
    pub pub_net: Option<String>,
    pub pub_ip: Option<String>,
}

fn next_node_id(conf: &ExaConf) -> Result<u64, ConfigError> {
    let used: HashSet<u64> = conf.nodes()?.iter().map(|n| n.id).collect();
    let mut id = FIRST_NODE_ID;
    while used.contains(&id) {
        id += 1;
    }
    Ok(id)
}

fn node_net(template: &str, id: u64) -> Result<NetAddress, ConfigError> {
    NetAddress::net_for_node(template, id).map_err(|err| config_parse_err!("{}", err))
}

fn node_ip(addr: &str) -> Result<NetAddress, ConfigError> {
    NetAddress::ip(addr).map_err(|err| config_parse_err!("{}", err))
}

/// Add a node, returning its ID.
///
/// Without an explicit ID the lowest unused one is taken. `x`/`X` in the
/// networks are replaced with the node ID.
pub fn add_node(
    conf: &mut ExaConf,
    node_id: Option<u64>,
    priv_net: &str,
    pub_net: Option<&str>,
) -> Result<u64, ConfigError> {
    let id = match node_id {
        Some(id) => {
            if conf.nodes()?.iter().any(|n| n.id == id) {
                return Err(integrity_err!("node {} already exists", id));
            }
            id
        }
        None => next_node_id(conf)?,
    };

    let node = Node {
        id,
        name: format!("n{}", id),
        uuid: generate_node_uuid()?,
        private: Some(node_net(priv_net, id)?),
        public: pub_net.map(|net| node_net(net, id)).transpose()?,
        disks: Vec::new(),
    };

    conf.upsert_node(&node)?;
    Ok(id)
}

/// Change the networks of one node, or of all nodes with `_all`.
///
/// Setting the network of a side clears its IP and vice versa.
pub fn modify_node(conf: &mut ExaConf, selector: &str, update: &NodeUpdate) -> Result<(), ConfigError> {
    if (update.priv_net.is_some() && update.priv_ip.is_some())
        || (update.pub_net.is_some() && update.pub_ip.is_some())
    {
        return Err(config_parse_err!(
            "you can either change the IP or the network, not both"
        ));
    }

    let ids: Vec<u64> = conf.nodes()?.iter().map(|n| n.id).collect();
    for id in select_keys(ids, selector, selector.parse().ok(), "node")? {
        let mut node = conf.node(id)?;

        if let Some(net) = &update.priv_net {
            node.private = Some(node_net(net, id)?);
        }
        if let Some(ip) = &update.priv_ip {
            node.private = Some(node_ip(ip)?);
        }
        if let Some(net) = &update.pub_net {
            node.public = Some(node_net(net, id)?);
        }
        if let Some(ip) = &update.pub_ip {
            node.public = Some(node_ip(ip)?);
        }

        conf.upsert_node(&node)?;
    }
    Ok(())
}

/// Remove a node. Without `force`, nodes used by volumes or databases are kept.
pub fn remove_node(conf: &mut ExaConf, id: u64, force: bool) -> Result<Node, ConfigError> {
    conf.node(id)?;
    let users = conf.node_references(id)?;
    check_unused(&format!("node {}", id), &users, force)?;
    conf.remove_node(id)
}

/// Add a disk to a node, replacing a disk of the same name if `overwrite_existing` is set.
pub fn add_node_disk(
    conf: &mut ExaConf,
    node_id: u64,
    disk: Disk,
    overwrite_existing: bool,
) -> Result<(), ConfigError> {
    if disk.name == ALL_DISKS {
        return Err(integrity_err!("disk name '{}' is reserved", ALL_DISKS));
    }

    let mut node = conf.node(node_id)?;

    match node.disk_mut(&disk.name) {
        Some(existing) if overwrite_existing => *existing = disk,
        Some(_) => {
            return Err(integrity_err!(
                "disk '{}' already exists on node {}",
                disk.name,
                node_id
            ))
        }
        None => node.disks.push(disk),
    }

    conf.upsert_node(&node)
}

/// Remove a disk (or every disk, see [`ALL_DISKS`]) from a node, returning the removed names.
pub fn remove_node_disk(
    conf: &mut ExaConf,
    node_id: u64,
    disk: &str,
    force: bool,
) -> Result<Vec<String>, ConfigError> {
    let mut node = conf.node(node_id)?;

    let names: Vec<String> = if disk == ALL_DISKS {
        node.disks.iter().map(|d| d.name.clone()).collect()
    } else if node.disk(disk).is_some() {
        vec![disk.to_string()]
    } else {
        return Err(not_found!("disk '{}' on node {}", disk, node_id));
    };

    for name in names.iter() {
        let users = conf.disk_references(node_id, name)?;
        check_unused(&format!("disk '{}' of node {}", name, node_id), &users, force)?;
    }

    node.disks.retain(|d| !names.contains(&d.name));
    conf.upsert_node(&node)?;
    Ok(names)
}

/// Add a device to a disk of a node, creating the disk if needed.
///
/// `path` maps the device to a directory outside of the default storage location.
pub fn add_node_device(
    conf: &mut ExaConf,
    node_id: u64,
    disk: &str,
    device: &str,
    path: Option<&str>,
) -> Result<(), ConfigError> {
    let mut node = conf.node(node_id)?;

    let pos = match node.disks.iter().position(|d| d.name == disk) {
        Some(pos) => pos,
        None => {
            node.disks.push(Disk::new(disk, DEFAULT_DISK_COMPONENT));
            node.disks.len() - 1
        }
    };

    let entry = &mut node.disks[pos];
    if entry.has_device(device) {
        return Err(integrity_err!(
            "device '{}' already exists in disk '{}' of node {}",
            device,
            disk,
            node_id
        ));
    }
    entry.devices.push(device.to_string());
    if let Some(path) = path {
        entry.mapping.push((device.to_string(), path.to_string()));
    }

    conf.upsert_node(&node)
}

/// Remove a device from a disk of a node. Returns true if the disk went away with its last device.
pub fn remove_node_device(
    conf: &mut ExaConf,
    node_id: u64,
    disk: &str,
    device: &str,
) -> Result<bool, ConfigError> {
    let mut node = conf.node(node_id)?;

    let pos = node
        .disks
        .iter()
        .position(|d| d.name == disk)
        .ok_or_else(|| not_found!("disk '{}' on node {}", disk, node_id))?;

    let entry = &mut node.disks[pos];
    if !entry.has_device(device) {
        return Err(not_found!(
            "device '{}' in disk '{}' of node {}",
            device,
            disk,
            node_id
        ));
    }
    entry.devices.retain(|d| d != device);
    entry.mapping.retain(|(d, _)| d != device);

    let disk_removed = entry.devices.is_empty();
    if disk_removed {
        let users = conf.disk_references(node_id, disk)?;
        check_unused(&format!("disk '{}' of node {}", disk, node_id), &users, false)?;
        node.disks.remove(pos);
    }

    conf.upsert_node(&node)?;
    Ok(disk_removed)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ops::test_util::base_config;

    #[test]
    fn test_add_and_modify_node() -> Result<(), ConfigError> {
        let mut conf = ExaConf::create("/nonexistent/EXAConf", "cl1");

        let id = add_node(&mut conf, None, "10.10.10.X/24", None)?;
        assert_eq!(id, 11);
        let node = conf.node(id)?;
        assert_eq!(node.name, "n11");
        assert_eq!(node.uuid.len(), 40);
        assert_eq!(node.private, Some(NetAddress::Net("10.10.10.11/24".into())));
        assert_eq!(node.public, None);

        let update = NodeUpdate {
            priv_ip: Some("10.10.10.99".into()),
            ..Default::default()
        };
        modify_node(&mut conf, "11", &update)?;
        assert_eq!(conf.node(id)?.private, Some(NetAddress::Ip("10.10.10.99".into())));

        let text = String::try_from(&conf)?;
        assert!(text.contains("PrivateIP = 10.10.10.99"));
        assert!(!text.contains("PrivateNet"));
        Ok(())
    }

    #[test]
    fn test_add_node_ids() -> Result<(), ConfigError> {
        let mut conf = base_config();
        assert_eq!(add_node(&mut conf, None, "10.10.10.x/24", Some("192.168.1.x/24"))?, 13);
        assert_eq!(
            conf.node(13)?.public,
            Some(NetAddress::Net("192.168.1.13/24".into()))
        );

        assert!(matches!(
            add_node(&mut conf, Some(12), "10.10.10.x/24", None),
            Err(ConfigError::Integrity(_))
        ));
        assert!(matches!(
            add_node(&mut conf, Some(20), "10.10.10.x", None),
            Err(ConfigError::Parse(_))
        ));

        conf.remove_node(11)?;
        assert_eq!(add_node(&mut conf, None, "10.10.10.x/24", None)?, 11);
        Ok(())
    }

    #[test]
    fn test_modify_node_conflicts() -> Result<(), ConfigError> {
        let mut conf = base_config();

        let update = NodeUpdate {
            pub_net: Some("192.168.1.x/24".into()),
            pub_ip: Some("192.168.1.7".into()),
            ..Default::default()
        };
        assert!(matches!(
            modify_node(&mut conf, "11", &update),
            Err(ConfigError::Parse(_))
        ));

        let update = NodeUpdate {
            pub_net: Some("192.168.1.x/24".into()),
            ..Default::default()
        };
        assert!(matches!(
            modify_node(&mut conf, "42", &update),
            Err(ConfigError::NotFound(_))
        ));

        modify_node(&mut conf, "_all", &update)?;
        assert_eq!(conf.node(11)?.public, Some(NetAddress::Net("192.168.1.11/24".into())));
        assert_eq!(conf.node(12)?.public, Some(NetAddress::Net("192.168.1.12/24".into())));
        Ok(())
    }

    #[test]
    fn test_remove_node_in_use() -> Result<(), ConfigError> {
        let mut conf = base_config();

        match remove_node(&mut conf, 11, false) {
            Err(ConfigError::InUse { users, .. }) => {
                assert_eq!(users, "volume 'DataVolume1', database 'DB1'")
            }
            other => panic!("unexpected result {:?}", other.err()),
        }
        assert!(conf.node(11).is_ok());

        remove_node(&mut conf, 11, true)?;
        assert!(matches!(conf.node(11), Err(ConfigError::NotFound(_))));
        // dangling reference is left to the caller
        assert_eq!(conf.volume("DataVolume1")?.nodes, vec![11, 12]);
        Ok(())
    }

    #[test]
    fn test_node_disks() -> Result<(), ConfigError> {
        let mut conf = base_config();

        let mut disk = Disk::new("disk2", "exastorage");
        disk.devices = vec!["dev.2".into(), "dev.3".into()];
        add_node_disk(&mut conf, 11, disk.clone(), false)?;
        assert!(matches!(
            add_node_disk(&mut conf, 11, disk.clone(), false),
            Err(ConfigError::Integrity(_))
        ));

        disk.devices = vec!["dev.4".into()];
        add_node_disk(&mut conf, 11, disk, true)?;
        assert_eq!(conf.node(11)?.disk("disk2").map(|d| d.devices.clone()), Some(vec!["dev.4".to_string()]));

        assert!(matches!(
            remove_node_disk(&mut conf, 11, "disk1", false),
            Err(ConfigError::InUse { .. })
        ));
        assert!(matches!(
            remove_node_disk(&mut conf, 11, "disk9", false),
            Err(ConfigError::NotFound(_))
        ));
        assert_eq!(remove_node_disk(&mut conf, 11, "disk2", false)?, vec!["disk2"]);
        assert_eq!(remove_node_disk(&mut conf, 12, ALL_DISKS, true)?, vec!["disk1"]);
        assert!(conf.node(12)?.disks.is_empty());
        Ok(())
    }

    #[test]
    fn test_reserved_disk_name() -> Result<(), ConfigError> {
        let mut conf = base_config();

        assert!(matches!(
            add_node_disk(&mut conf, 11, Disk::new(ALL_DISKS, "exastorage"), false),
            Err(ConfigError::Integrity(_))
        ));
        assert!(matches!(
            add_node_disk(&mut conf, 11, Disk::new("disk]]\n[Global", "exastorage"), false),
            Err(ConfigError::Integrity(_))
        ));
        assert!(conf.node(11)?.disk(ALL_DISKS).is_none());
        assert!(!conf.is_dirty());
        Ok(())
    }

    #[test]
    fn test_node_devices() -> Result<(), ConfigError> {
        let mut conf = base_config();

        add_node_device(&mut conf, 11, "disk3", "dev.7", Some("/exa/data/ssd"))?;
        let node = conf.node(11)?;
        let disk = node.disk("disk3").unwrap();
        assert_eq!(disk.component, DEFAULT_DISK_COMPONENT);
        assert_eq!(disk.mapping, vec![("dev.7".to_string(), "/exa/data/ssd".to_string())]);

        assert!(matches!(
            add_node_device(&mut conf, 11, "disk3", "dev.7", None),
            Err(ConfigError::Integrity(_))
        ));
        add_node_device(&mut conf, 11, "disk3", "dev.8", None)?;

        assert!(!remove_node_device(&mut conf, 11, "disk3", "dev.7")?);
        assert!(conf.node(11)?.disk("disk3").unwrap().mapping.is_empty());
        assert!(remove_node_device(&mut conf, 11, "disk3", "dev.8")?);
        assert!(conf.node(11)?.disk("disk3").is_none());

        // the last device of a disk used by a volume stays
        assert!(matches!(
            remove_node_device(&mut conf, 11, "disk1", "dev.1"),
            Err(ConfigError::InUse { .. })
        ));
        assert!(matches!(
            remove_node_device(&mut conf, 11, "disk1", "dev.9"),
            Err(ConfigError::NotFound(_))
        ));
        Ok(())
    }
}
